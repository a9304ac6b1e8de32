pub mod blockstore;
pub mod exchange;
pub mod logging;
pub mod provider;

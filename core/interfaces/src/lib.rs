mod blockstore;
mod config;
mod exchange;
mod provider;
pub mod types;

pub use blockstore::*;
pub use config::*;
pub use exchange::*;
pub use provider::*;
pub use types::{Block, BlockError};

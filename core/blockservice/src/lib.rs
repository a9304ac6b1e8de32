//! The block service: one place to get and put content addressed blocks, whether they
//! are already held locally or have to be retrieved through the network exchange.

mod blockservice;
pub mod config;
mod error;
mod fetcher;
mod session;
pub mod verifcid;

pub use blockservice::{BlockGetter, BlockService};
pub use config::Config;
pub use error::BlockServiceError;
pub use fetcher::Fetcher;
pub use session::Session;

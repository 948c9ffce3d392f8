pub mod config;
pub mod error;
pub mod logging;
pub mod module;
pub mod registry;
pub mod server;

pub use error::{Error, Result};

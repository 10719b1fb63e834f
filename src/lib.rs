mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
mod mcp;
pub mod model;
pub mod session;
pub mod table;
pub mod upload;
mod utils;


pub use api::{Backend, Mode, TEST_MODE_ENV};
pub use config::Config;
pub use error::Error;
pub use error::ErrorType;
pub use error::Result;

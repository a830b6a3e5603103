pub mod api;
pub mod config;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod registry;
pub mod security;

pub use config::Config;
pub use error::{Error, Result};

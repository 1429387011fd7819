//! docgate - HTTP gateway translating REST and action requests into document database operations

pub mod config;
pub mod error;
pub mod types;

pub mod store;
pub mod dispatch;
pub mod api;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

pub mod config;
pub mod error;

pub use config::TrackerConfig;
pub use error::{CoreError, Result};

pub mod config;
pub mod error;
pub mod types;

pub use config::ScopticsConfig;
pub use error::{Result, ScopticsError};
pub use types::*;

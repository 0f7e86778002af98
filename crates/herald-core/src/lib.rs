pub mod config;
pub mod error;

pub use config::{EngineConfig, GeneralConfig, HeraldConfig, OnError, RetryConfig};
pub use error::{HeraldError, Result};

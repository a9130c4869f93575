//! gitpulse core - shared data structures and infrastructure
//!
//! Error taxonomy, configuration, logging and async helpers used by the
//! analytics pipeline and the command-line front end

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tokio;
pub use tracing;

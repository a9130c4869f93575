//! gitpulse repository analysis
//!
//! GraphQL and REST clients, clone workspaces, the code volume scanner, the
//! metric aggregators and the per-repository and batch drivers built on them.

pub mod api;
pub mod batch;
pub mod filter;
pub mod metrics;
pub mod orchestrator;
pub mod scanner;
pub mod workspace;

pub use api::*;
pub use batch::*;
pub use filter::*;
pub use metrics::*;
pub use orchestrator::*;
pub use scanner::*;
pub use workspace::*;

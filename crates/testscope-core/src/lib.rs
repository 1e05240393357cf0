//! Testscope core: the shared data model and configuration consumed by the
//! indexer, graph builder, and impact resolver.

pub mod config;
pub mod error;
pub mod types;

pub use config::*;
pub use error::*;
pub use types::*;

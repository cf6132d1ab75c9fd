//! Core data model, error taxonomy, and port traits for the Amber
//! multi-tenant GraphRAG service. Every other Amber crate depends on
//! this one; this crate depends on nothing Amber-specific.

pub mod error;
pub mod ports;
pub mod types;

pub mod prelude {
    pub use crate::error::{AmberError, ErrorBody, Result};
    pub use crate::ports::*;
    pub use crate::types::*;
}

//! Composition root for the Amber multi-tenant GraphRAG service: wires
//! every port/adapter pair built across the workspace into a runnable
//! whole (spec §9's "explicit composition root" redesign).

pub mod adapters;
pub mod composition;

pub use composition::CompositionRoot;

//! Read-only registries consulted during contextualization.
//!
//! All registries are built once on first use and never mutated afterwards,
//! so they can be shared freely across sessions.
pub mod charset;
pub mod engine;
pub mod sysvar;

//! Statement contextualization for a MySQL-dialect SQL front end.
//!
//! Takes a syntax tree (see [`ast`]) and walks it against a per-statement
//! [`context::StatementContext`], resolving table references into join trees,
//! threading name-resolution scopes through clauses, accumulating DDL
//! descriptors and SET assignments, and finally producing a
//! [`command::Command`] for an execution layer.
pub mod ast;
pub mod command;
pub mod config;
pub mod context;
pub mod contextualize;
pub mod ddl;
pub mod diagnostics;
pub mod expr;
pub mod registry;
pub mod resolver;
pub mod session;

#[cfg(test)]
pub(crate) mod testutil;

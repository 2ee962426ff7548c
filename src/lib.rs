//! Energy provider adapter library.
//!
//! The binary in `main.rs` wires these modules into an axum server; the
//! integration tests in `tests/` drive them directly.

pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod jobs;
pub mod models;
pub mod provider;
pub mod store;

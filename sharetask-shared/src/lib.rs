//! # ShareTask Shared Library
//!
//! This crate contains the domain types, persistence and access-control logic
//! used by the ShareTask API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their SQL operations
//! - `visibility`: Which tasks a user may read (owned ∪ shared-with)
//! - `auth`: Password hashing, JWT tokens, request authentication and
//!   authorization rules
//! - `db`: Connection pool and migrations

pub mod auth;
pub mod db;
pub mod models;
pub mod visibility;

/// Current version of the ShareTask shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! # ShareTask API Server Library
//!
//! The HTTP surface of ShareTask: a multi-user task API where tasks can be
//! shared read-only with other users.
//!
//! ## Modules
//!
//! - `app`: Application state, router builder and bearer authentication
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: Extractors that reject with the JSON error format
//! - `middleware`: Security headers
//! - `pagination`: Page-number pagination
//! - `routes`: API route handlers
//! - `validation`: Field validators shared by the routes

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod pagination;
pub mod routes;
pub mod validation;

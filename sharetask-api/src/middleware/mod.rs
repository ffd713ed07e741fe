/// Middleware modules for the API server
///
/// - `security`: security response headers
///
/// Bearer authentication lives in [`crate::app`] next to the router it guards.

pub mod security;

/// API route handlers
///
/// Organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login and token refresh
/// - `users`: User directory
/// - `categories`: Category CRUD (owner-scoped)
/// - `tasks`: Task CRUD with sharing

pub mod auth;
pub mod categories;
pub mod health;
pub mod tasks;
pub mod users;

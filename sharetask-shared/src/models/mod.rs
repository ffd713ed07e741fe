/// Database models for ShareTask
///
/// Each model owns its SQL. Functions take a `&PgPool`, an open transaction
/// connection, or any `PgExecutor` where both are useful.
///
/// # Models
///
/// - `user`: accounts and public profiles
/// - `category`: per-user colored labels
/// - `task`: tasks, list filters and ordering
/// - `share`: the task/sharee join table

pub mod category;
pub mod share;
pub mod task;
pub mod user;

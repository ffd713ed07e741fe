//! Task visibility resolver
//!
//! A user's *visibility set* is every task they own plus every task shared
//! with them. In SQL it is
//!
//! ```sql
//! t.owner_id = $user
//! OR t.id IN (SELECT s.task_id FROM task_shares s WHERE s.user_id = $user)
//! ```
//!
//! The shared half is a semi-join, not a join, so a task that is both owned
//! by and (incorrectly) shared with the caller still yields one row; no
//! `DISTINCT` is needed. Categories have no visibility rule beyond ownership.

use sqlx::{Postgres, QueryBuilder};
use std::collections::HashSet;
use uuid::Uuid;

/// How a caller relates to a task they can see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAccess {
    /// Caller created the task
    Owner,

    /// Task is shared with the caller
    Sharee,
}

impl TaskAccess {
    pub fn can_write(&self) -> bool {
        matches!(self, TaskAccess::Owner)
    }
}

/// Access to a task already fetched through the visibility predicate
///
/// Anything visible that the caller does not own is shared with them.
pub fn access_to_visible(user_id: Uuid, owner_id: Uuid) -> TaskAccess {
    if user_id == owner_id {
        TaskAccess::Owner
    } else {
        TaskAccess::Sharee
    }
}

/// Appends the visibility predicate for `user_id`, qualified with alias `t`
pub fn push_visible_to(builder: &mut QueryBuilder<'_, Postgres>, user_id: Uuid) {
    builder
        .push("(t.owner_id = ")
        .push_bind(user_id)
        .push(" OR t.id IN (SELECT s.task_id FROM task_shares s WHERE s.user_id = ")
        .push_bind(user_id)
        .push("))");
}

/// Normalizes a requested share set
///
/// Drops the owner (a task is never shared with its own owner) and duplicate
/// ids, keeping first-seen order.
///
/// ```
/// use sharetask_shared::visibility::normalize_shares;
/// use uuid::Uuid;
///
/// let (owner, bob) = (Uuid::new_v4(), Uuid::new_v4());
/// assert_eq!(normalize_shares(owner, &[bob, owner, bob]), vec![bob]);
/// ```
pub fn normalize_shares(owner_id: Uuid, requested: &[Uuid]) -> Vec<Uuid> {
    let mut seen = HashSet::with_capacity(requested.len());

    requested
        .iter()
        .copied()
        .filter(|id| *id != owner_id)
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Escapes `%`, `_` and `\` so a search term matches literally inside `ILIKE`
pub fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());

    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

/// Builds a case-insensitive "contains" pattern for `ILIKE`
pub fn contains_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_to_visible_task() {
        let owner = Uuid::new_v4();
        assert_eq!(access_to_visible(owner, owner), TaskAccess::Owner);
        assert_eq!(access_to_visible(Uuid::new_v4(), owner), TaskAccess::Sharee);
    }

    #[test]
    fn test_only_owner_can_write() {
        assert!(TaskAccess::Owner.can_write());
        assert!(!TaskAccess::Sharee.can_write());
    }

    #[test]
    fn test_normalize_shares_drops_owner_and_duplicates() {
        let owner = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(normalize_shares(owner, &[a, owner, b, a]), vec![a, b]);
        assert!(normalize_shares(owner, &[owner]).is_empty());
        assert!(normalize_shares(owner, &[]).is_empty());
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("milk"), "milk");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\tmp"), "c:\\\\tmp");
        assert_eq!(contains_pattern("buy"), "%buy%");
    }

    #[test]
    fn test_visibility_predicate_sql() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT t.id FROM tasks t WHERE ");
        push_visible_to(&mut builder, Uuid::new_v4());

        assert_eq!(
            builder.sql(),
            "SELECT t.id FROM tasks t WHERE (t.owner_id = $1 OR t.id IN \
             (SELECT s.task_id FROM task_shares s WHERE s.user_id = $2))"
        );
    }
}

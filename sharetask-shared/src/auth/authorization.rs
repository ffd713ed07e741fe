/// Authorization rules
///
/// Reading is governed by the visibility resolver ([`crate::visibility`]);
/// this module answers the second question: may the caller *change* what
/// they can see?
///
/// # Permission Model
///
/// | Resource | Read | Write / delete / re-share |
/// |---|---|---|
/// | Task | owner, sharees | owner only |
/// | Category | owner only | owner only |
///
/// A sharee has no partial-write tier: toggling `completed` is a write like
/// any other.

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::visibility::TaskAccess;

/// Error type for authorization checks
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// Caller can read the task but does not own it
    #[error("Only the task owner can modify or delete this task")]
    NotTaskOwner,

    /// Caller referenced a category that belongs to another user
    #[error("Category {0} does not belong to you")]
    ForeignCategory(Uuid),
}

/// Requires write access to a task the caller can already see
///
/// ```
/// use sharetask_shared::auth::authorization::{require_task_write, AuthzError};
/// use sharetask_shared::visibility::TaskAccess;
///
/// assert!(require_task_write(TaskAccess::Owner).is_ok());
/// assert_eq!(require_task_write(TaskAccess::Sharee), Err(AuthzError::NotTaskOwner));
/// ```
pub fn require_task_write(access: TaskAccess) -> Result<(), AuthzError> {
    if !access.can_write() {
        return Err(AuthzError::NotTaskOwner);
    }

    Ok(())
}

/// Requires that a category referenced by a task payload is the caller's own
pub fn require_category_owner(
    auth: &AuthContext,
    category_id: Uuid,
    category_owner_id: Uuid,
) -> Result<(), AuthzError> {
    if auth.user_id != category_owner_id {
        return Err(AuthzError::ForeignCategory(category_id));
    }

    Ok(())
}

/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and strength validation
/// - [`jwt`]: Access/refresh token generation and validation
/// - [`middleware`]: Bearer-token authentication producing an [`middleware::AuthContext`]
/// - [`authorization`]: Owner-only write rules for tasks and categories
///
/// # Example
///
/// ```no_run
/// use sharetask_shared::auth::password::{hash_password, verify_password};
/// use sharetask_shared::auth::jwt::{issue_token_pair, TokenLifetimes};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let pair = issue_token_pair(Uuid::new_v4(), "secret-key", &TokenLifetimes::default())?;
/// # Ok(())
/// # }
/// ```

pub mod password;
pub mod jwt;
pub mod middleware;
pub mod authorization;

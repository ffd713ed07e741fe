/// Credential hashing for the identity store
///
/// Passwords are stored as Argon2id PHC strings (`$argon2id$v=19$m=65536,t=3,p=4$...`).
/// Parameters are embedded in every hash, so verification keeps working if the
/// cost settings below change later.
///
/// # Example
///
/// ```
/// use sharetask_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Sup3r$ecret")?;
///
/// assert!(verify_password("Sup3r$ecret", &hash)?);
/// assert!(!verify_password("wrong", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, ParamsBuilder, Version,
};
use std::sync::OnceLock;

/// Argon2 memory cost in KiB (64 MB)
const MEMORY_COST_KIB: u32 = 65536;

/// Argon2 passes
const TIME_COST: u32 = 3;

/// Argon2 lanes
const PARALLELISM: u32 = 4;

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Error type for password hashing operations
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    /// Failed to hash password
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Failed to verify password
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Stored hash is not a valid PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

/// Reasons a registration password is refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WeakPassword {
    #[error("Password must be at least 8 characters long")]
    TooShort,

    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,

    #[error("Password must contain at least one lowercase letter")]
    MissingLowercase,

    #[error("Password must contain at least one digit")]
    MissingDigit,

    #[error("Password must contain at least one special character")]
    MissingSpecial,
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = ParamsBuilder::new()
        .m_cost(MEMORY_COST_KIB)
        .t_cost(TIME_COST)
        .p_cost(PARALLELISM)
        .output_len(32)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
///
/// # Errors
///
/// Returns `PasswordError::HashError` if hashing fails
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(format!("Hash generation failed: {}", e)))?;

    Ok(password_hash.to_string())
}

/// Verifies a password against a stored PHC hash
///
/// `Ok(false)` means the password is wrong; `Err` means the stored hash is
/// unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| PasswordError::InvalidHash(format!("Failed to parse hash: {}", e)))?;

    if parsed_hash.hash.is_none() {
        return Err(PasswordError::InvalidHash("Hash has no output".to_string()));
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(_) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(format!("Verification failed: {}", e))),
    }
}

/// Burns the same Argon2 work as a real verification and always fails
///
/// Called by the login exchange when the username does not exist, so an
/// unknown user and a wrong password take comparable time.
pub fn verify_against_dummy(password: &str) -> Result<bool, PasswordError> {
    static DUMMY_HASH: OnceLock<String> = OnceLock::new();

    if DUMMY_HASH.get().is_none() {
        let hash = hash_password("dummy-password-for-unknown-users")?;
        let _ = DUMMY_HASH.set(hash);
    }

    match DUMMY_HASH.get() {
        Some(hash) => verify_password(password, hash).map(|_| false),
        None => Ok(false),
    }
}

/// Checks a password against the registration policy
///
/// At least [`MIN_PASSWORD_LENGTH`] characters with an uppercase letter, a
/// lowercase letter, a digit and a non-alphanumeric character.
///
/// ```
/// use sharetask_shared::auth::password::{validate_password_strength, WeakPassword};
///
/// assert!(validate_password_strength("MyP@ssw0rd!").is_ok());
/// assert_eq!(validate_password_strength("Sh0rt!"), Err(WeakPassword::TooShort));
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), WeakPassword> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(WeakPassword::TooShort);
    }

    if !password.chars().any(char::is_uppercase) {
        return Err(WeakPassword::MissingUppercase);
    }

    if !password.chars().any(char::is_lowercase) {
        return Err(WeakPassword::MissingLowercase);
    }

    if !password.chars().any(char::is_numeric) {
        return Err(WeakPassword::MissingDigit);
    }

    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err(WeakPassword::MissingSpecial);
    }

    Ok(())
}

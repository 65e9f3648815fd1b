//! Account creation and password verification.
//!
//! Passwords are hashed with Argon2id using fixed cost constants and a fresh
//! random salt per account. The stored value is the PHC string
//! (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so verification reads the
//! parameters back from the hash itself.
//!
//! Both operations are synchronous and CPU-heavy; handlers call them from
//! `spawn_blocking`.

use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::{SaltString, rand_core::OsRng},
};
use std::sync::OnceLock;

use thiserror::Error;
use uuid::Uuid;

use adopto_db::{Database, is_unique_violation};

/// Memory cost in KiB.
const HASH_MEMORY_KIB: u32 = 19 * 1024;
/// Iteration count ("rounds").
const HASH_ROUNDS: u32 = 2;
const HASH_PARALLELISM: u32 = 1;

#[derive(Debug, Error)]
pub enum CredentialError {
    /// Unknown username or wrong password. Callers cannot tell which.
    #[error("invalid username or password")]
    AuthFailure,

    #[error("username or email already registered")]
    DuplicateKey,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

/// An authenticated account, without its password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

fn hasher() -> Result<Argon2<'static>, CredentialError> {
    let params = Params::new(HASH_MEMORY_KIB, HASH_ROUNDS, HASH_PARALLELISM, None)
        .map_err(|e| CredentialError::Hashing(e.to_string()))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

pub fn hash_password(password: &str) -> Result<String, CredentialError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| CredentialError::Hashing(e.to_string()))?;
    Ok(hash.to_string())
}

/// Hash `password` and insert the account. Returns the new account id.
pub fn create(
    db: &Database,
    username: &str,
    email: &str,
    password: &str,
) -> Result<Uuid, CredentialError> {
    let password_hash = hash_password(password)?;
    let id = Uuid::new_v4();

    db.create_user(&id.to_string(), username, email, &password_hash)
        .map_err(|e| {
            if is_unique_violation(&e) {
                CredentialError::DuplicateKey
            } else {
                CredentialError::Database(e)
            }
        })?;

    Ok(id)
}

/// Hash checked when the username is unknown, so a miss costs as much as a
/// wrong password.
fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("adopto-unknown-user").ok())
        .as_deref()
}

pub fn verify(db: &Database, username: &str, password: &str) -> Result<Account, CredentialError> {
    let Some(user) = db.get_user_by_username(username)? else {
        if let Some(parsed) = dummy_hash().and_then(|h| PasswordHash::new(h).ok()) {
            let _ = hasher()?.verify_password(password.as_bytes(), &parsed);
        }
        return Err(CredentialError::AuthFailure);
    };

    let parsed =
        PasswordHash::new(&user.password).map_err(|e| CredentialError::Hashing(e.to_string()))?;

    match hasher()?.verify_password(password.as_bytes(), &parsed) {
        Ok(()) => {}
        Err(argon2::password_hash::Error::Password) => return Err(CredentialError::AuthFailure),
        Err(e) => return Err(CredentialError::Hashing(e.to_string())),
    }

    let id = user
        .id
        .parse::<Uuid>()
        .map_err(|e| anyhow::anyhow!("Corrupt user id '{}': {}", user.id, e))?;

    Ok(Account {
        id,
        username: user.username,
        email: user.email,
    })
}

//! Password hashes are stored as PHC strings, so each one carries its own
//! algorithm, version and cost parameters. A hash made with anything other than
//! the current Argon2id defaults is replaced the next time its password verifies.
//! A well-formed hash from a non-Argon2 algorithm never matches.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params,
};

pub use argon2::password_hash::Error as HashError;

#[derive(Debug, PartialEq, Eq)]
pub enum Verification {
    Mismatch,
    /// `rehash` is set when the stored hash is outdated and should be replaced.
    Match { rehash: Option<String> },
}

pub fn hash_password(password: &str) -> Result<String, HashError> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

pub fn needs_rehash(hash: &PasswordHash<'_>) -> bool {
    if hash.algorithm != Algorithm::Argon2id.ident() {
        return true;
    }
    match Params::try_from(hash) {
        Ok(params) => {
            let current = Params::default();
            params.m_cost() != current.m_cost()
                || params.t_cost() != current.t_cost()
                || params.p_cost() != current.p_cost()
        }
        Err(_) => true,
    }
}

pub fn verify_password(password: &str, stored: &str) -> Result<Verification, HashError> {
    let parsed = PasswordHash::new(stored)?;
    if Algorithm::try_from(parsed.algorithm).is_err() {
        return Ok(Verification::Mismatch);
    }

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => {
            let rehash = if needs_rehash(&parsed) {
                Some(hash_password(password)?)
            } else {
                None
            };
            Ok(Verification::Match { rehash })
        }
        Err(HashError::Password) => Ok(Verification::Mismatch),
        Err(e) => Err(e),
    }
}

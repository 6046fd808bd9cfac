use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tokio::sync::OnceCell;
use tracing::{error, warn};

use super::errors::AuthError;
use crate::config::HashConfig;

const DUMMY_PASSWORD: &str = "farmwise-timing-equalizer";

/// Argon2id hashing with configurable cost.
///
/// Work runs on the blocking pool so a login never stalls the runtime.
pub struct CredentialHasher {
    params: Params,
    dummy_hash: OnceCell<String>,
}

impl CredentialHasher {
    pub fn new(cfg: &HashConfig) -> Result<Self, AuthError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, cfg.parallelism, None)
            .map_err(|e| {
                error!(error = %e, "argon2 params rejected");
                AuthError::HashingUnavailable(e.to_string())
            })?;
        Ok(Self {
            params,
            dummy_hash: OnceCell::new(),
        })
    }

    pub async fn hash(&self, plain: &str) -> Result<String, AuthError> {
        let params = self.params.clone();
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hash_password(params, &plain))
            .await
            .map_err(|e| AuthError::HashingUnavailable(e.to_string()))?
    }

    /// Index of the first candidate whose stored hash accepts `plain`.
    ///
    /// With no candidates a throwaway verification still runs, so an
    /// unknown email costs about as much as a wrong password.
    pub async fn find_match(
        &self,
        plain: &str,
        candidates: Vec<(usize, String)>,
    ) -> Result<Option<usize>, AuthError> {
        let candidates = if candidates.is_empty() {
            let dummy = self
                .dummy_hash
                .get_or_try_init(|| self.hash(DUMMY_PASSWORD))
                .await?;
            vec![(usize::MAX, dummy.clone())]
        } else {
            candidates
        };

        let plain = plain.to_owned();
        let found = tokio::task::spawn_blocking(move || {
            candidates
                .into_iter()
                .find(|(_, stored)| verify_password(&plain, stored))
                .map(|(idx, _)| idx)
        })
        .await
        .map_err(|e| AuthError::HashingUnavailable(e.to_string()))?;

        Ok(found.filter(|idx| *idx != usize::MAX))
    }
}

fn hash_password(params: Params, plain: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            AuthError::HashingUnavailable(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

/// Checks `plain` against an Argon2 PHC string or a legacy SHA-256 hex digest.
///
/// A stored value that is neither is treated as a non-match.
pub fn verify_password(plain: &str, stored: &str) -> bool {
    if let Some(expected) = legacy_digest_bytes(stored) {
        let actual = Sha256::digest(plain.as_bytes());
        return actual.as_slice().ct_eq(&expected).into();
    }
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored credential hash is malformed");
            false
        }
    }
}

/// Unsalted SHA-256 hex digest written by the browser client.
pub fn legacy_digest(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}

// A 64-char hex string is a legacy digest; anything else goes to argon2.
fn legacy_digest_bytes(stored: &str) -> Option<Vec<u8>> {
    if stored.len() != 64 {
        return None;
    }
    hex::decode(stored).ok()
}

#[cfg(test)]
pub(crate) fn test_hasher() -> CredentialHasher {
    CredentialHasher::new(&HashConfig {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    })
    .expect("cheap params are valid")
}

use serde::{Deserialize, Serialize};

use crate::session::{SessionUser, UserId};

/// Stored account. Only the auth service ever sees `password_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: UserId,
    pub name: String,
    pub email: String, // normalized at signup
    pub password_hash: String, // Argon2id PHC string or legacy SHA-256 hex
}

impl CredentialRecord {
    pub fn redacted(&self) -> SessionUser {
        SessionUser {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

//! The shared "who is signed in on this device" cell.
//!
//! [`AuthService`](crate::auth::services::AuthService) is the only writer;
//! [`ProfileService`](crate::profile::services::ProfileService) reads it to
//! decide which profile it is bound to.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Opaque, stable account identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn generate() -> Self {
        Self(format!("user-{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Redacted view of an account: everything but the credential hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    pub name: String,
    pub email: String,
}

impl SessionUser {
    /// A stored session is only usable if every field is filled in.
    pub fn is_complete(&self) -> bool {
        !self.id.as_str().is_empty() && !self.name.is_empty() && !self.email.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    current: Arc<RwLock<Option<SessionUser>>>,
}

impl SessionHandle {
    pub async fn current(&self) -> Option<SessionUser> {
        self.current.read().await.clone()
    }

    pub async fn identity(&self) -> Option<UserId> {
        self.current.read().await.as_ref().map(|u| u.id.clone())
    }

    pub(crate) async fn replace(&self, user: Option<SessionUser>) {
        *self.current.write().await = user;
    }
}

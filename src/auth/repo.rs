use serde_json::Value;
use tracing::warn;

use crate::auth::repo_types::CredentialRecord;
use crate::session::SessionUser;
use crate::storage::{load_document, save_document, KvStore};

pub const USERS_KEY: &str = "pris.auth.users";
pub const CURRENT_USER_KEY: &str = "pris.auth.currentUser";

/// Load the stored user list.
///
/// `None` means the document is missing or is not a JSON array; the caller
/// substitutes the built-in defaults. Individual malformed entries are
/// dropped rather than discarding the whole list.
pub async fn load_users(store: &dyn KvStore) -> anyhow::Result<Option<Vec<CredentialRecord>>> {
    let Some(entries) = load_document::<Vec<Value>>(store, USERS_KEY).await? else {
        return Ok(None);
    };
    let users = entries
        .into_iter()
        .enumerate()
        .filter_map(|(idx, entry)| match serde_json::from_value::<CredentialRecord>(entry) {
            Ok(user) => Some(user),
            Err(e) => {
                warn!(index = idx, error = %e, "skipping malformed stored user");
                None
            }
        })
        .collect();
    Ok(Some(users))
}

pub async fn save_users(store: &dyn KvStore, users: &[CredentialRecord]) -> anyhow::Result<()> {
    save_document(store, USERS_KEY, users).await
}

/// A stored session that is missing, malformed, or incomplete means
/// "signed out".
pub async fn load_session(store: &dyn KvStore) -> anyhow::Result<Option<SessionUser>> {
    let session = load_document::<SessionUser>(store, CURRENT_USER_KEY).await?;
    Ok(session.filter(|s| {
        let complete = s.is_complete();
        if !complete {
            warn!("stored session is incomplete; ignoring it");
        }
        complete
    }))
}

pub async fn save_session(store: &dyn KvStore, user: &SessionUser) -> anyhow::Result<()> {
    save_document(store, CURRENT_USER_KEY, user).await
}

pub async fn clear_session(store: &dyn KvStore) -> anyhow::Result<()> {
    store.delete(CURRENT_USER_KEY).await
}

use serde_json::Value;

use crate::profile::repo_types::Profile;
use crate::session::UserId;
use crate::storage::{load_document, save_document, KvStore};

pub const PROFILE_KEY_PREFIX: &str = "pris.userData";

pub fn profile_key(id: &UserId) -> String {
    format!("{PROFILE_KEY_PREFIX}.{id}")
}

/// Stored profile for `id`, merged against defaults, or `None` if nothing
/// readable is stored.
pub async fn load_profile(store: &dyn KvStore, id: &UserId) -> anyhow::Result<Option<Profile>> {
    let doc = load_document::<Value>(store, &profile_key(id)).await?;
    Ok(doc.map(Profile::from_document))
}

pub async fn save_profile(store: &dyn KvStore, id: &UserId, profile: &Profile) -> anyhow::Result<()> {
    save_document(store, &profile_key(id), profile).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn key_is_prefix_dot_identity() {
        assert_eq!(profile_key(&UserId::from("user-42")), "pris.userData.user-42");
    }

    #[tokio::test]
    async fn unparseable_document_reads_as_missing() {
        let store = MemoryStore::default();
        let id = UserId::from("user-1");
        store.put(&profile_key(&id), "{{{").await.unwrap();
        assert!(load_profile(&store, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_is_identity() {
        let store = MemoryStore::default();
        let id = UserId::from("user-1");
        let mut profile = Profile::default();
        profile.toggle_task("task-3");
        save_profile(&store, &id, &profile).await.unwrap();
        assert_eq!(load_profile(&store, &id).await.unwrap(), Some(profile));
    }
}

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use tokio::fs;
use uuid::Uuid;

use super::KvStore;

/// One `<key>.json` file per document under a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub async fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create data dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

// Keys are mostly our own ("pris.userData.user-..."), but the identity part
// may come from a stored document, so anything outside a safe set is mapped
// to '_' to keep every key inside the data dir.
fn file_stem(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
        }
    }

    async fn put(&self, key: &str, document: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", file_stem(key), Uuid::new_v4().simple()));
        fs::write(&tmp, document)
            .await
            .with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("rename into {}", path.display()))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn documents_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path()).await.unwrap();
        store.put("pris.auth.users", "[]").await.unwrap();

        let reopened = FileStore::open(tmp.path()).await.unwrap();
        assert_eq!(
            reopened.get("pris.auth.users").await.unwrap().as_deref(),
            Some("[]")
        );
        assert!(tmp.path().join("pris.auth.users.json").exists());
    }

    #[tokio::test]
    async fn missing_and_deleted_keys_read_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileStore::open(tmp.path().join("nested")).await.unwrap();
        assert!(store.get("absent").await.unwrap().is_none());

        store.put("k", "1").await.unwrap();
        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[test]
    fn hostile_keys_stay_inside_the_dir() {
        assert_eq!(file_stem("pris.userData.user-1"), "pris.userData.user-1");
        assert_eq!(file_stem("../../etc/passwd"), "_.._etc_passwd");
        assert!(!file_stem("a/b").contains('/'));
    }
}

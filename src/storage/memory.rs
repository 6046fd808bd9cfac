use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::KvStore;

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, String>>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn len(&self) -> usize {
        self.docs.lock().map(|d| d.len()).unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .docs
            .lock()
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let docs = self
            .docs
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(docs.get(key).cloned())
    }

    async fn put(&self, key: &str, document: &str) -> anyhow::Result<()> {
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        docs.insert(key.to_string(), document.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut docs = self
            .docs
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        docs.remove(key);
        Ok(())
    }
}

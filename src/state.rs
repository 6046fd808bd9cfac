use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::auth::password::CredentialHasher;
use crate::auth::services::AuthService;
use crate::config::{AppConfig, StorageBackend};
use crate::profile::services::ProfileService;
use crate::session::SessionHandle;
use crate::storage::{FileStore, KvStore, MemoryStore, PgStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn KvStore>,
    pub auth: Arc<AuthService>,
    pub profiles: Arc<ProfileService>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn KvStore> = match config.storage {
            StorageBackend::Memory => Arc::new(MemoryStore::default()),
            StorageBackend::File => Arc::new(FileStore::open(&config.data_dir).await?),
            StorageBackend::Postgres => {
                let url = config
                    .database_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("DATABASE_URL is required for postgres storage"))?;
                let pg = PgStore::connect(url).await?;
                sqlx::migrate!("./migrations")
                    .run(pg.pool())
                    .await
                    .context("run kv_documents migrations")?;
                Arc::new(pg)
            }
        };
        info!(backend = ?config.storage, "storage ready");

        Self::from_parts(Arc::new(config), store).await
    }

    pub async fn from_parts(config: Arc<AppConfig>, store: Arc<dyn KvStore>) -> anyhow::Result<Self> {
        let hasher = CredentialHasher::new(&config.hashing)?;
        let session = SessionHandle::default();
        let auth = AuthService::load(store.clone(), session.clone(), hasher).await?;
        let profiles = ProfileService::new(store.clone(), session);

        Ok(Self {
            config,
            store,
            auth: Arc::new(auth),
            profiles: Arc::new(profiles),
        })
    }

    /// In-memory state with cheap hashing, for tests.
    #[cfg(test)]
    pub async fn fake() -> Self {
        use crate::config::HashConfig;

        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            storage: StorageBackend::Memory,
            data_dir: "./data".into(),
            database_url: None,
            hashing: HashConfig {
                memory_kib: 256,
                iterations: 1,
                parallelism: 1,
            },
        });
        Self::from_parts(config, Arc::new(MemoryStore::default()))
            .await
            .expect("fake state")
    }
}

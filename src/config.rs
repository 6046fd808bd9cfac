use std::path::PathBuf;

/// Argon2id cost parameters used for new credential hashes.
#[derive(Debug, Clone)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        // argon2 crate defaults (OWASP minimum for Argon2id)
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    File,
    Postgres,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub data_dir: PathBuf,
    pub database_url: Option<String>,
    pub hashing: HashConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());

        let storage = match lookup("STORAGE_BACKEND").as_deref().map(str::trim) {
            Some("memory") => StorageBackend::Memory,
            Some("file") => StorageBackend::File,
            Some("postgres") => StorageBackend::Postgres,
            Some(other) if !other.is_empty() => {
                anyhow::bail!("unknown STORAGE_BACKEND {other:?} (expected memory, file or postgres)")
            }
            _ if database_url.is_some() => StorageBackend::Postgres,
            _ => StorageBackend::File,
        };

        if storage == StorageBackend::Postgres && database_url.is_none() {
            anyhow::bail!("STORAGE_BACKEND=postgres requires DATABASE_URL");
        }

        let defaults = HashConfig::default();
        let hashing = HashConfig {
            memory_kib: parse_or(&lookup, "HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&lookup, "HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&lookup, "HASH_PARALLELISM", defaults.parallelism)?,
        };

        Ok(Self {
            host: lookup("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&lookup, "APP_PORT", 8080)?,
            storage,
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            database_url,
            hashing,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid {key} {raw:?}: {e}")),
        None => Ok(default),
    }
}

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use super::KvStore;

/// Documents kept in the `kv_documents` table.
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }

    pub fn pool(&self) -> &PgPool {
        &self.db
    }
}

#[async_trait]
impl KvStore for PgStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT value
            FROM kv_documents
            WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("select document {key}"))?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, document: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_documents (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(key)
        .bind(document)
        .execute(&self.db)
        .await
        .with_context(|| format!("upsert document {key}"))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query(r#"DELETE FROM kv_documents WHERE key = $1"#)
            .bind(key)
            .execute(&self.db)
            .await
            .with_context(|| format!("delete document {key}"))?;
        Ok(())
    }
}

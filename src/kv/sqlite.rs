use std::str::FromStr as _;

use tracing::error;

use super::{DEFAULT_LIST_LIMIT, ListKey, ListOptions, ListResult, Store};

/// Durable local storage backed by a SQLite database.
pub struct LocalStorage {
    pool: sqlx::SqlitePool,
}

/// One namespace of a [`LocalStorage`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: sqlx::SqlitePool,
    namespace: String,
}

impl LocalStorage {
    pub async fn open(url: &str) -> Result<Self, sqlx::Error> {
        let options = sqlx::sqlite::SqliteConnectOptions::from_str(url)
            .inspect_err(|error| error!(%error, %url, "Failed to open local storage db"))?
            .create_if_missing(true);
        let pool = sqlx::pool::PoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .inspect_err(|error| error!(%error, %url, "Failed to open local storage db"))?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv(
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY(namespace, key)
            );
        "#,
        )
        .execute(&pool)
        .await
        .inspect_err(|error| error!(%error, %url, "Failed to execute DDL to storage db"))?;
        Ok(Self { pool })
    }

    pub fn kv(&self, namespace: impl Into<String>) -> SqliteStore {
        SqliteStore {
            pool: self.pool.clone(),
            namespace: namespace.into(),
        }
    }
}

impl Store for SqliteStore {
    type Error = sqlx::Error;

    async fn get(&self, key: &str) -> Result<Option<String>, Self::Error> {
        sqlx::query_scalar("SELECT value FROM kv WHERE namespace = ? AND key = ?")
            .bind(&self.namespace)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        sqlx::query(
            r#"
            INSERT INTO kv(namespace, key, value)
            VALUES (?, ?, ?)
            ON CONFLICT(namespace, key)
            DO UPDATE SET
                value = EXCLUDED.value
        "#,
        )
        .bind(&self.namespace)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Error> {
        sqlx::query("DELETE FROM kv WHERE namespace = ? AND key = ?")
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, options: ListOptions) -> Result<ListResult, Self::Error> {
        let limit = options.limit.unwrap_or(DEFAULT_LIST_LIMIT).max(1);
        let prefix = options.prefix.unwrap_or_default();
        let mut keys: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT key FROM kv
            WHERE namespace = ?
                AND substr(key, 1, length(?)) = ?
                AND key > ?
            ORDER BY key
            LIMIT ?
        "#,
        )
        .bind(&self.namespace)
        .bind(&prefix)
        .bind(&prefix)
        .bind(options.cursor.unwrap_or_default())
        .bind(limit as i64 + 1)
        .fetch_all(&self.pool)
        .await?;
        let list_complete = keys.len() <= limit;
        keys.truncate(limit);
        let cursor = (!list_complete).then(|| keys.last().cloned()).flatten();
        Ok(ListResult {
            keys: keys.into_iter().map(|name| ListKey { name }).collect(),
            list_complete,
            cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let storage = LocalStorage::open("sqlite::memory:").await.unwrap();
        let content = storage.kv("content");
        let settings = storage.kv("settings");
        content.put("llms.txt", "# Site").await.unwrap();
        content.put("llms.txt", "# Site v2").await.unwrap();
        settings.put("settings", "{}").await.unwrap();

        assert_eq!(
            content.get("llms.txt").await.unwrap().as_deref(),
            Some("# Site v2")
        );
        assert_eq!(settings.get("llms.txt").await.unwrap(), None);

        let listed = content.list(ListOptions::prefix("llms")).await.unwrap();
        assert!(listed.list_complete);
        assert_eq!(listed.keys.len(), 1);

        content.delete("llms.txt").await.unwrap();
        assert_eq!(content.get("llms.txt").await.unwrap(), None);
    }
}

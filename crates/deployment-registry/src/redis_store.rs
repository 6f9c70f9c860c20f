//! Redis storage for deployment records
//!
//! Data model:
//! - deployment:{slug} → JSON-encoded DeploymentRecord
//! - deployments:all → Set of live slugs

use async_trait::async_trait;
use launchpad_common::DeploymentRecord;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use crate::error::Result;
use crate::store::RegistryStore;

const INDEX_KEY: &str = "deployments:all";

fn record_key(slug: &str) -> String {
    format!("deployment:{}", slug)
}

/// Registry store backed by Redis
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Create a new store instance
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;

        let conn = ConnectionManager::new(client).await?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self { conn })
    }

    /// Count live deployments
    pub async fn count(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        let count: usize = conn.scard(INDEX_KEY).await?;
        Ok(count)
    }
}

#[async_trait]
impl RegistryStore for RedisStore {
    async fn insert(&self, record: &DeploymentRecord) -> Result<bool> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(record)?;

        // SET NX keeps the slug check and the write atomic
        let created: bool = conn.set_nx(record_key(&record.slug), json).await?;
        if !created {
            debug!("Slug already registered: {}", record.slug);
            return Ok(false);
        }

        let _: () = conn.sadd(INDEX_KEY, &record.slug).await?;

        info!("Stored deployment record: {}", record.slug);
        Ok(true)
    }

    async fn get(&self, slug: &str) -> Result<Option<DeploymentRecord>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn.get(record_key(slug)).await?;

        match json {
            Some(data) => {
                let record: DeploymentRecord = serde_json::from_str(&data)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<DeploymentRecord>> {
        let mut conn = self.conn.clone();
        let slugs: Vec<String> = conn.smembers(INDEX_KEY).await?;

        let mut records = Vec::with_capacity(slugs.len());
        for slug in slugs {
            if let Some(record) = self.get(&slug).await? {
                records.push(record);
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete(&self, slug: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: bool = conn.del(record_key(slug)).await?;

        if deleted {
            let _: () = conn.srem(INDEX_KEY, slug).await?;
            info!("Deleted deployment record: {}", slug);
        }

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchpad_common::BackendKind;

    async fn get_test_store() -> RedisStore {
        RedisStore::new("redis://127.0.0.1:6379/15")
            .await
            .expect("Failed to connect to test Redis")
    }

    fn record(slug: &str) -> DeploymentRecord {
        DeploymentRecord::new(
            slug.to_string(),
            BackendKind::ObjectStore,
            format!("https://storage.googleapis.com/site-bucket/{}/index.html", slug),
            3,
            "demo".to_string(),
            "user-1".to_string(),
        )
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_insert_get_delete() {
        let store = get_test_store().await;
        let record = record("redis-demo-0a0b0c");

        assert!(store.insert(&record).await.unwrap());

        let found = store
            .get("redis-demo-0a0b0c")
            .await
            .unwrap()
            .expect("Record not found");
        assert_eq!(found.deployment_id, record.deployment_id);
        assert_eq!(found.backend, BackendKind::ObjectStore);

        let listed = store.list().await.unwrap();
        assert!(listed.iter().any(|r| r.slug == "redis-demo-0a0b0c"));

        assert!(store.delete("redis-demo-0a0b0c").await.unwrap());
        assert!(store.get("redis-demo-0a0b0c").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore] // Requires Redis to be running
    async fn test_duplicate_insert() {
        let store = get_test_store().await;

        assert!(store.insert(&record("redis-dup-1a2b3c")).await.unwrap());
        assert!(!store.insert(&record("redis-dup-1a2b3c")).await.unwrap());

        // Clean up
        store.delete("redis-dup-1a2b3c").await.unwrap();
    }

    #[test]
    fn test_record_key() {
        assert_eq!(record_key("demo-ab12cd"), "deployment:demo-ab12cd");
    }
}

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashSet;
use tracing::info;

use super::{CacheError, CacheStore};

/// Redis-backed cache store.
///
/// Uses a [`ConnectionManager`] so a dropped connection is re-established
/// transparently; individual commands still surface errors to the caller.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis and verify the connection with a PING.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;

        let mut ping_conn = conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut ping_conn).await?;
        info!("Connected to Redis at {}", url);

        Ok(RedisStore { conn })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_string(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key, value).await?;
        Ok(())
    }

    async fn get_hash_field(
        &self,
        key: &str,
        field: &str,
    ) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.hget(key, field).await?;
        Ok(value)
    }

    async fn set_hash_field(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(key, field, value).await?;
        Ok(())
    }

    async fn add_set_member(&self, set: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(set, member).await?;
        Ok(())
    }

    async fn remove_set_member(&self, set: &str, member: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.srem(set, member).await?;
        Ok(())
    }

    async fn list_set_members(&self, set: &str) -> Result<HashSet<String>, CacheError> {
        let mut conn = self.conn.clone();
        let members: HashSet<String> = conn.smembers(set).await?;
        Ok(members)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("FLUSHALL").query_async(&mut conn).await?;
        Ok(())
    }
}

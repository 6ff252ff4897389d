//! Redis fence store using a bb8 connection pool.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client, Script};

use crate::config::settings::RedisConfig;
use crate::store::{FenceStore, StoreError, StoreResult};

type RedisPool = Pool<Client>;

const UNLOCK_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
"#;

/// Redis-backed fence store.
///
/// Locks are plain keys written with `SET NX PX`; release and renewal are
/// compare-and-act Lua scripts so a holder can never touch a lock that
/// expired and was taken over by someone else.
pub struct RedisStore {
    pool: RedisPool,
    key_prefix: String,
    unlock_script: Script,
    extend_script: Script,
}

impl RedisStore {
    pub async fn new(config: &RedisConfig) -> StoreResult<Self> {
        let client =
            Client::open(config.url.as_str()).map_err(|e| StoreError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout))
            .build(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
            unlock_script: Script::new(UNLOCK_SCRIPT),
            extend_script: Script::new(EXTEND_SCRIPT),
        })
    }

    fn prefixed_key(&self, key: &str) -> String {
        format!("{}:{}", self.key_prefix, key)
    }

    async fn get_conn(&self) -> StoreResult<PooledConnection<'_, Client>> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // PX 0 is rejected by Redis
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl FenceStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let value: Option<String> = conn_ref.get(self.prefixed_key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;

        let mut cmd = redis::cmd("SET");
        cmd.arg(self.prefixed_key(key)).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: () = cmd.query_async(conn_ref).await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> StoreResult<bool> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;

        let mut cmd = redis::cmd("SET");
        cmd.arg(self.prefixed_key(key)).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let reply: Option<String> = cmd.query_async(conn_ref).await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let removed: i64 = conn_ref.del(self.prefixed_key(key)).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let exists: bool = conn_ref.exists(self.prefixed_key(key)).await?;
        Ok(exists)
    }

    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let members: HashSet<String> = conn_ref.smembers(self.prefixed_key(key)).await?;
        Ok(members)
    }

    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let _: i64 = conn_ref.sadd(self.prefixed_key(key), member).await?;
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let _: i64 = conn_ref.srem(self.prefixed_key(key), member).await?;
        Ok(())
    }

    async fn try_lock(&self, name: &str, token: &str, ttl: Duration) -> StoreResult<bool> {
        self.set_if_absent(name, token.to_string(), Some(ttl)).await
    }

    async fn extend_lock(&self, name: &str, token: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let extended: i64 = self
            .extend_script
            .key(self.prefixed_key(name))
            .arg(token)
            .arg(ttl_millis(ttl))
            .invoke_async(conn_ref)
            .await?;
        Ok(extended == 1)
    }

    async fn unlock(&self, name: &str, token: &str) -> StoreResult<bool> {
        let mut conn = self.get_conn().await?;
        let conn_ref: &mut MultiplexedConnection = &mut conn;
        let removed: i64 = self
            .unlock_script
            .key(self.prefixed_key(name))
            .arg(token)
            .invoke_async(conn_ref)
            .await?;
        Ok(removed == 1)
    }

    async fn lock_token(&self, name: &str) -> StoreResult<Option<String>> {
        self.get(name).await
    }
}

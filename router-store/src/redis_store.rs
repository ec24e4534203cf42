use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::debug;

use async_trait::async_trait;

use crate::error::Result;
use crate::store::CoordinationStore;

/// Redis-backed [`CoordinationStore`]. The two compare-and-set operations
/// are Lua scripts registered once and executed atomically server-side —
/// the same approach the original coordination layer used, just expressed
/// as `redis::Script` instead of a client-side `register_script` call.
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
    acquire_script: Script,
    release_script: Script,
    key_acquire_script: Script,
}

impl RedisStore {
    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            prefix: prefix.into(),
            acquire_script: Script::new(ACQUIRE_SCRIPT),
            release_script: Script::new(RELEASE_SCRIPT),
            key_acquire_script: Script::new(KEY_ACQUIRE_SCRIPT),
        })
    }

    fn k(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

/// Mirrors the original `_acquire_script`: treat a missing field or the
/// literal string `"false"` as free, atomically claim it.
const ACQUIRE_SCRIPT: &str = r#"
local cur = redis.call('HGET', KEYS[1], ARGV[1])
if cur == false or cur == 'false' then
    redis.call('HSET', KEYS[1], ARGV[1], 'true')
    return 1
end
return 0
"#;

const RELEASE_SCRIPT: &str = r#"
redis.call('HDEL', KEYS[1], ARGV[1])
return 1
"#;

const KEY_ACQUIRE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('SET', KEYS[1], ARGV[1])
return 1
"#;

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let v: Option<String> = conn.hget(self.k(key), field).await?;
        Ok(v)
    }

    async fn hash_set_if_absent_or_false(&self, key: &str, field: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let won: i64 = self
            .acquire_script
            .key(self.k(key))
            .arg(field)
            .invoke_async(&mut conn)
            .await?;
        debug!(key, field, won, "acquire attempt");
        Ok(won == 1)
    }

    async fn hash_del(&self, key: &str, field: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = self
            .release_script
            .key(self.k(key))
            .arg(field)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.hset(self.k(key), field, value).await?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>> {
        let mut conn = self.conn.clone();
        let v: Vec<(String, String)> = conn.hgetall(self.k(key)).await?;
        Ok(v)
    }

    async fn key_set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let won: i64 = self
            .key_acquire_script
            .key(self.k(key))
            .arg(value)
            .invoke_async(&mut conn)
            .await?;
        Ok(won == 1)
    }

    async fn key_set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(self.k(key), value).await?;
        Ok(())
    }

    async fn key_get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let v: Option<String> = conn.get(self.k(key)).await?;
        Ok(v)
    }

    async fn key_del(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.del(self.k(key)).await?;
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.sadd(self.k(key), member).await?;
        Ok(())
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let v: Vec<String> = conn.smembers(self.k(key)).await?;
        Ok(v)
    }

    async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.zadd(self.k(key), member, score).await?;
        Ok(())
    }

    async fn sorted_set_range_by_score(&self, key: &str, max_score: f64) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let v: Vec<String> = conn.zrangebyscore(self.k(key), f64::NEG_INFINITY, max_score).await?;
        Ok(v)
    }

    async fn sorted_set_rem(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.zrem(self.k(key), member).await?;
        Ok(())
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        let full_pattern = self.k(pattern);
        let keys: Vec<String> = conn.keys(full_pattern).await?;
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let full: Vec<String> = keys.iter().map(|k| self.k(k)).collect();
        let _: i64 = conn.del(full).await?;
        Ok(())
    }
}

use async_trait::async_trait;

use crate::error::Result;

/// Typed wrapper over a key/value store supporting atomic compare-and-set on
/// hash fields and sorted-set operations — sufficient for every load-balancing
/// strategy and the keep-alive scheduler, and nothing more.
///
/// `hash_set_if_absent_or_false` and `key_set_if_absent` are the two
/// operations that must be server-side atomic; both implementations below
/// guarantee that with a Lua script (Redis) or an entry-API compare-and-set
/// (in-memory).
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Atomically sets `field` to `"true"` iff it is currently absent or the
    /// literal string `"false"`. Returns whether this call won the race.
    async fn hash_set_if_absent_or_false(&self, key: &str, field: &str) -> Result<bool>;

    async fn hash_del(&self, key: &str, field: &str) -> Result<()>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<()>;

    async fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>>;

    /// Atomically sets `key` iff absent. Used for `HostLock`.
    async fn key_set_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Unconditional set, overwriting whatever was there. Used for bookkeeping
    /// keys like `last_host` where the most recent writer should always win.
    async fn key_set(&self, key: &str, value: &str) -> Result<()>;

    async fn key_get(&self, key: &str) -> Result<Option<String>>;

    async fn key_del(&self, key: &str) -> Result<()>;

    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// Members with score in `(-inf, max_score]`.
    async fn sorted_set_range_by_score(&self, key: &str, max_score: f64) -> Result<Vec<String>>;

    async fn sorted_set_rem(&self, key: &str, member: &str) -> Result<()>;

    /// Glob-style key scan, e.g. `"*:last_host"`.
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>>;

    async fn delete(&self, keys: &[String]) -> Result<()>;
}

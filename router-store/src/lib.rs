//! Coordination store client: a typed wrapper over a key/value + pub-sub
//! store supporting atomic compare-and-set on hash fields and sorted-set
//! operations, used by every load-balancing strategy, the health monitor,
//! and the keep-alive scheduler.

pub mod error;
pub mod in_memory;
pub mod keys;
pub mod redis_store;
pub mod store;

pub use error::StoreError;
pub use in_memory::InMemoryStore;
pub use redis_store::RedisStore;
pub use store::CoordinationStore;

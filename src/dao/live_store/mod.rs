/// Key builders for the live store.
pub mod keys;
/// In-process live store.
pub mod memory;
/// Redis live store.
#[cfg(feature = "redis-store")]
pub mod redis;

use std::time::Duration;

use futures::future::BoxFuture;

use crate::dao::storage::StorageResult;

/// Outcome of an atomic queue claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueClaim {
    /// Another player was waiting at the head and has been removed from the queue.
    Paired(String),
    /// The caller now waits at the tail.
    Enqueued,
    /// The caller was already queued; nothing changed.
    AlreadyQueued,
}

/// Low-latency shared store holding queues, live games, pointers and tournament sets.
///
/// Values are opaque strings. Operations that must not interleave with other writers
/// (`take_or_enqueue`, `set_nx_ex`, `delete_if_equals`) are atomic on the backend.
pub trait LiveStore: Send + Sync {
    fn get(&self, key: String) -> BoxFuture<'static, StorageResult<Option<String>>>;
    fn set(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<()>>;
    fn set_ex(
        &self,
        key: String,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Set only when absent; `true` when this call created the key.
    fn set_nx_ex(
        &self,
        key: String,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete `key` only while it still holds `expected`.
    fn delete_if_equals(
        &self,
        key: String,
        expected: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Delete keys, returning how many existed.
    fn delete(&self, keys: Vec<String>) -> BoxFuture<'static, StorageResult<u64>>;

    /// Pop the queue head when it is someone else, otherwise enqueue `player` at the tail.
    fn take_or_enqueue(
        &self,
        queue: String,
        player: String,
    ) -> BoxFuture<'static, StorageResult<QueueClaim>>;
    /// Remove every occurrence of `value`; returns the number removed.
    fn list_remove(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<u64>>;
    fn list_contains(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<bool>>;

    /// `true` when the member was newly added.
    fn set_add(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<bool>>;
    /// `true` when the member was present.
    fn set_remove(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<bool>>;
    fn set_is_member(
        &self,
        key: String,
        member: String,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    fn set_size(&self, key: String) -> BoxFuture<'static, StorageResult<u64>>;
    fn set_members(&self, key: String) -> BoxFuture<'static, StorageResult<Vec<String>>>;

    /// Increment a counter, (re)arming its expiry; returns the new value.
    fn incr_with_expiry(&self, key: String, ttl: Duration)
    -> BoxFuture<'static, StorageResult<i64>>;
    fn hash_get(
        &self,
        key: String,
        field: String,
    ) -> BoxFuture<'static, StorageResult<Option<String>>>;
    /// Keys matching a glob pattern (`*` wildcard only).
    fn scan_keys(&self, pattern: String) -> BoxFuture<'static, StorageResult<Vec<String>>>;
    fn ping(&self) -> BoxFuture<'static, StorageResult<()>>;
}

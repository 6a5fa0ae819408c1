use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use tokio::time::Instant;

use super::{LiveStore, QueueClaim};
use crate::dao::storage::{StorageError, StorageResult};

#[derive(Debug, Clone)]
enum Value {
    Text(String),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<Instant>,
}

impl Slot {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

fn wrong_type(key: &str, expected: &str) -> StorageError {
    StorageError::corrupted(key, format!("value is not a {expected}"))
}

/// Glob match supporting the `*` wildcard.
fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == candidate;
    }

    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remainder) = candidate.strip_prefix(first) else {
        return false;
    };
    let last = rest[rest.len() - 1];
    for part in &rest[..rest.len() - 1] {
        match remainder.find(part) {
            Some(at) => remainder = &remainder[at + part.len()..],
            None => return false,
        }
    }
    remainder.len() >= last.len() && remainder.ends_with(last)
}

/// [`LiveStore`] kept in process memory; expiry is evaluated lazily on access.
#[derive(Clone, Default)]
pub struct MemoryLiveStore {
    entries: Arc<DashMap<String, Slot>>,
}

impl MemoryLiveStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one hash field, creating the hash when needed.
    pub fn hash_set(&self, key: &str, field: &str, value: &str) -> StorageResult<()> {
        let mut slot = self
            .live_entry(key)
            .or_insert_with(|| Slot::new(Value::Hash(HashMap::new())));
        match &mut slot.value {
            Value::Hash(map) => {
                map.insert(field.to_owned(), value.to_owned());
                Ok(())
            }
            _ => Err(wrong_type(key, "hash")),
        }
    }

    /// Remaining time to live of a key, `None` when absent or persistent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let slot = self.entries.get(key)?;
        let at = slot.expires_at?;
        (at > now).then(|| at - now)
    }

    /// Entry for `key` with an expired value already evicted.
    fn live_entry(&self, key: &str) -> Entry<'_, String, Slot> {
        let now = Instant::now();
        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(occupied) if occupied.get().is_expired(now) => {
                let vacant_key = occupied.key().clone();
                occupied.remove();
                self.entries.entry(vacant_key)
            }
            other => other,
        }
    }

    fn read<T>(&self, key: &str, read: impl FnOnce(&Value) -> T) -> Option<T> {
        let now = Instant::now();
        let slot = self.entries.get(key)?;
        if slot.is_expired(now) {
            drop(slot);
            self.entries.remove_if(key, |_, slot| slot.is_expired(now));
            return None;
        }
        Some(read(&slot.value))
    }

    fn get_sync(&self, key: &str) -> StorageResult<Option<String>> {
        match self.read(key, |value| match value {
            Value::Text(text) => Ok(text.clone()),
            _ => Err(wrong_type(key, "string")),
        }) {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }

    fn set_sync(&self, key: String, value: String, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries.insert(
            key,
            Slot {
                value: Value::Text(value),
                expires_at,
            },
        );
    }

    fn set_nx_sync(&self, key: &str, value: String, ttl: Duration) -> bool {
        match self.live_entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: Value::Text(value),
                    expires_at: Some(Instant::now() + ttl),
                });
                true
            }
        }
    }

    fn delete_if_equals_sync(&self, key: &str, expected: &str) -> bool {
        let now = Instant::now();
        self.entries
            .remove_if(key, |_, slot| {
                !slot.is_expired(now) && matches!(&slot.value, Value::Text(text) if text == expected)
            })
            .is_some()
    }

    fn take_or_enqueue_sync(&self, queue: &str, player: String) -> StorageResult<QueueClaim> {
        let mut slot = self
            .live_entry(queue)
            .or_insert_with(|| Slot::new(Value::List(VecDeque::new())));
        let Value::List(list) = &mut slot.value else {
            return Err(wrong_type(queue, "list"));
        };

        let head_is_other = list.front().is_some_and(|head| *head != player);
        if head_is_other {
            if let Some(opponent) = list.pop_front() {
                return Ok(QueueClaim::Paired(opponent));
            }
        }
        if list.contains(&player) {
            return Ok(QueueClaim::AlreadyQueued);
        }
        list.push_back(player);
        Ok(QueueClaim::Enqueued)
    }

    fn list_remove_sync(&self, key: &str, value: &str) -> StorageResult<u64> {
        let Some(mut slot) = self.entries.get_mut(key) else {
            return Ok(0);
        };
        let Value::List(list) = &mut slot.value else {
            return Err(wrong_type(key, "list"));
        };
        let before = list.len();
        list.retain(|entry| entry != value);
        Ok((before - list.len()) as u64)
    }

    fn set_add_sync(&self, key: &str, member: String) -> StorageResult<bool> {
        let mut slot = self
            .live_entry(key)
            .or_insert_with(|| Slot::new(Value::Set(BTreeSet::new())));
        match &mut slot.value {
            Value::Set(set) => Ok(set.insert(member)),
            _ => Err(wrong_type(key, "set")),
        }
    }

    fn set_remove_sync(&self, key: &str, member: &str) -> StorageResult<bool> {
        let Some(mut slot) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        match &mut slot.value {
            Value::Set(set) => Ok(set.remove(member)),
            _ => Err(wrong_type(key, "set")),
        }
    }

    fn set_read<T>(
        &self,
        key: &str,
        empty: T,
        read: impl FnOnce(&BTreeSet<String>) -> T,
    ) -> StorageResult<T> {
        match self.read(key, |value| match value {
            Value::Set(set) => Ok(read(set)),
            _ => Err(wrong_type(key, "set")),
        }) {
            Some(result) => result,
            None => Ok(empty),
        }
    }

    fn incr_sync(&self, key: &str, ttl: Duration) -> StorageResult<i64> {
        let mut slot = self
            .live_entry(key)
            .or_insert_with(|| Slot::new(Value::Text("0".to_owned())));
        let Value::Text(text) = &mut slot.value else {
            return Err(wrong_type(key, "counter"));
        };
        let current: i64 = text
            .parse()
            .map_err(|_| StorageError::corrupted(key, "value is not an integer"))?;
        let next = current + 1;
        *text = next.to_string();
        slot.expires_at = Some(Instant::now() + ttl);
        Ok(next)
    }
}

impl LiveStore for MemoryLiveStore {
    fn get(&self, key: String) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        Box::pin(async move { store.get_sync(&key) })
    }

    fn set(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.set_sync(key, value, None);
            Ok(())
        })
    }

    fn set_ex(
        &self,
        key: String,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.set_sync(key, value, Some(ttl));
            Ok(())
        })
    }

    fn set_nx_ex(
        &self,
        key: String,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.set_nx_sync(&key, value, ttl)) })
    }

    fn delete_if_equals(
        &self,
        key: String,
        expected: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.delete_if_equals_sync(&key, &expected)) })
    }

    fn delete(&self, keys: Vec<String>) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let now = Instant::now();
            let removed = keys
                .iter()
                .filter_map(|key| store.entries.remove(key))
                .filter(|(_, slot)| !slot.is_expired(now))
                .count();
            Ok(removed as u64)
        })
    }

    fn take_or_enqueue(
        &self,
        queue: String,
        player: String,
    ) -> BoxFuture<'static, StorageResult<QueueClaim>> {
        let store = self.clone();
        Box::pin(async move { store.take_or_enqueue_sync(&queue, player) })
    }

    fn list_remove(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.list_remove_sync(&key, &value) })
    }

    fn list_contains(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            match store.read(&key, |slot| match slot {
                Value::List(list) => Ok(list.contains(&value)),
                _ => Err(wrong_type(&key, "list")),
            }) {
                Some(result) => result,
                None => Ok(false),
            }
        })
    }

    fn set_add(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.set_add_sync(&key, member) })
    }

    fn set_remove(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.set_remove_sync(&key, &member) })
    }

    fn set_is_member(
        &self,
        key: String,
        member: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.set_read(&key, false, |set| set.contains(&member)) })
    }

    fn set_size(&self, key: String) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.set_read(&key, 0, |set| set.len() as u64) })
    }

    fn set_members(&self, key: String) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move {
            store.set_read(&key, Vec::new(), |set| set.iter().cloned().collect())
        })
    }

    fn incr_with_expiry(
        &self,
        key: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<i64>> {
        let store = self.clone();
        Box::pin(async move { store.incr_sync(&key, ttl) })
    }

    fn hash_get(
        &self,
        key: String,
        field: String,
    ) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let store = self.clone();
        Box::pin(async move {
            match store.read(&key, |value| match value {
                Value::Hash(map) => Ok(map.get(&field).cloned()),
                _ => Err(wrong_type(&key, "hash")),
            }) {
                Some(result) => result,
                None => Ok(None),
            }
        })
    }

    fn scan_keys(&self, pattern: String) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move {
            let now = Instant::now();
            Ok(store
                .entries
                .iter()
                .filter(|entry| !entry.value().is_expired(now))
                .filter(|entry| glob_matches(&pattern, entry.key()))
                .map(|entry| entry.key().clone())
                .collect())
        })
    }

    fn ping(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_wildcards() {
        assert!(glob_matches(
            "chess:tournament:t1:player:*:games",
            "chess:tournament:t1:player:alice:games"
        ));
        assert!(!glob_matches(
            "chess:tournament:t1:player:*:games",
            "chess:tournament:t2:player:alice:games"
        ));
        assert!(glob_matches("chess:*", "chess:game:1"));
        assert!(glob_matches("exact", "exact"));
        assert!(!glob_matches("a*b*c", "ac"));
    }

    #[tokio::test]
    async fn take_or_enqueue_pairs_with_waiting_player() {
        let store = MemoryLiveStore::new();
        let queue = "q".to_owned();

        let first = store
            .take_or_enqueue(queue.clone(), "alice".into())
            .await
            .unwrap();
        let again = store
            .take_or_enqueue(queue.clone(), "alice".into())
            .await
            .unwrap();
        let second = store
            .take_or_enqueue(queue.clone(), "bob".into())
            .await
            .unwrap();

        assert_eq!(first, QueueClaim::Enqueued);
        assert_eq!(again, QueueClaim::AlreadyQueued);
        assert_eq!(second, QueueClaim::Paired("alice".into()));
        assert!(!store.list_contains(queue, "alice".into()).await.unwrap());
    }

    #[tokio::test]
    async fn set_nx_respects_existing_value_until_expiry() {
        let store = MemoryLiveStore::new();
        let ttl = Duration::from_millis(20);

        assert!(store.set_nx_ex("lock".into(), "a".into(), ttl).await.unwrap());
        assert!(!store.set_nx_ex("lock".into(), "b".into(), ttl).await.unwrap());
        assert!(!store.delete_if_equals("lock".into(), "b".into()).await.unwrap());
        assert!(store.delete_if_equals("lock".into(), "a".into()).await.unwrap());
        assert!(store.set_nx_ex("lock".into(), "b".into(), ttl).await.unwrap());

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.get("lock".into()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn counter_increments_and_arms_expiry() {
        let store = MemoryLiveStore::new();
        let ttl = Duration::from_secs(60);

        assert_eq!(store.incr_with_expiry("c".into(), ttl).await.unwrap(), 1);
        assert_eq!(store.incr_with_expiry("c".into(), ttl).await.unwrap(), 2);
        assert!(store.ttl("c").is_some());
    }
}

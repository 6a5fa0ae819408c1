use std::time::Duration;

use futures::future::BoxFuture;
use redis::{AsyncCommands, Client, Script, aio::ConnectionManager};
use tracing::info;

use super::{
    config::RedisConfig,
    error::{RedisDaoError, RedisResult},
    scripts,
};
use crate::dao::{
    live_store::{LiveStore, QueueClaim},
    storage::StorageResult,
};

const SCAN_BATCH: u32 = 200;

fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Redis-backed [`LiveStore`]; the connection manager reconnects on its own.
#[derive(Clone)]
pub struct RedisLiveStore {
    conn: ConnectionManager,
    take_or_enqueue: Script,
    delete_if_equals: Script,
    incr_with_expiry: Script,
}

impl RedisLiveStore {
    /// Open a managed connection to `config.url`.
    pub async fn connect(config: RedisConfig) -> RedisResult<Self> {
        let client = Client::open(config.url.as_str()).map_err(|source| {
            RedisDaoError::InvalidUrl {
                url: config.url.clone(),
                source,
            }
        })?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|source| RedisDaoError::Connect {
                url: config.url.clone(),
                source,
            })?;
        info!(url = %config.url, "connected to Redis");

        Ok(Self {
            conn,
            take_or_enqueue: Script::new(scripts::TAKE_OR_ENQUEUE),
            delete_if_equals: Script::new(scripts::DELETE_IF_EQUALS),
            incr_with_expiry: Script::new(scripts::INCR_WITH_EXPIRY),
        })
    }

    async fn take_or_enqueue(&self, queue: String, player: String) -> RedisResult<QueueClaim> {
        let mut conn = self.conn.clone();
        let reply: Vec<String> = self
            .take_or_enqueue
            .key(&queue)
            .arg(&player)
            .invoke_async(&mut conn)
            .await
            .map_err(RedisDaoError::command("EVALSHA take_or_enqueue", &queue))?;

        match reply.as_slice() {
            [tag, opponent] if tag == "paired" => Ok(QueueClaim::Paired(opponent.clone())),
            [tag, _] if tag == "queued" => Ok(QueueClaim::AlreadyQueued),
            [tag, _] if tag == "enqueued" => Ok(QueueClaim::Enqueued),
            other => Err(RedisDaoError::UnexpectedReply {
                key: queue,
                reply: format!("{other:?}"),
            }),
        }
    }

    async fn scan_keys(&self, pattern: String) -> RedisResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(RedisDaoError::command("SCAN", &pattern))?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

impl LiveStore for RedisLiveStore {
    fn get(&self, key: String) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let value: Option<String> = conn
                .get(&key)
                .await
                .map_err(RedisDaoError::command("GET", &key))?;
            Ok(value)
        })
    }

    fn set(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<()>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let _: () = conn
                .set(&key, value)
                .await
                .map_err(RedisDaoError::command("SET", &key))?;
            Ok(())
        })
    }

    fn set_ex(
        &self,
        key: String,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let _: () = redis::cmd("SET")
                .arg(&key)
                .arg(value)
                .arg("PX")
                .arg(millis(ttl))
                .query_async(&mut conn)
                .await
                .map_err(RedisDaoError::command("SET PX", &key))?;
            Ok(())
        })
    }

    fn set_nx_ex(
        &self,
        key: String,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let reply: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(value)
                .arg("NX")
                .arg("PX")
                .arg(millis(ttl))
                .query_async(&mut conn)
                .await
                .map_err(RedisDaoError::command("SET NX", &key))?;
            Ok(reply.is_some())
        })
    }

    fn delete_if_equals(
        &self,
        key: String,
        expected: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            let mut conn = store.conn.clone();
            let deleted: i64 = store
                .delete_if_equals
                .key(&key)
                .arg(expected)
                .invoke_async(&mut conn)
                .await
                .map_err(RedisDaoError::command("EVALSHA delete_if_equals", &key))?;
            Ok(deleted > 0)
        })
    }

    fn delete(&self, keys: Vec<String>) -> BoxFuture<'static, StorageResult<u64>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            if keys.is_empty() {
                return Ok(0);
            }
            let removed: u64 = conn
                .del(&keys)
                .await
                .map_err(RedisDaoError::command("DEL", &keys.join(",")))?;
            Ok(removed)
        })
    }

    fn take_or_enqueue(
        &self,
        queue: String,
        player: String,
    ) -> BoxFuture<'static, StorageResult<QueueClaim>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .take_or_enqueue(queue, player)
                .await
                .map_err(Into::into)
        })
    }

    fn list_remove(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<u64>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let removed: u64 = conn
                .lrem(&key, 0, value)
                .await
                .map_err(RedisDaoError::command("LREM", &key))?;
            Ok(removed)
        })
    }

    fn list_contains(&self, key: String, value: String) -> BoxFuture<'static, StorageResult<bool>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let position: Option<i64> = redis::cmd("LPOS")
                .arg(&key)
                .arg(value)
                .query_async(&mut conn)
                .await
                .map_err(RedisDaoError::command("LPOS", &key))?;
            Ok(position.is_some())
        })
    }

    fn set_add(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<bool>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let added: u64 = conn
                .sadd(&key, member)
                .await
                .map_err(RedisDaoError::command("SADD", &key))?;
            Ok(added > 0)
        })
    }

    fn set_remove(&self, key: String, member: String) -> BoxFuture<'static, StorageResult<bool>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let removed: u64 = conn
                .srem(&key, member)
                .await
                .map_err(RedisDaoError::command("SREM", &key))?;
            Ok(removed > 0)
        })
    }

    fn set_is_member(
        &self,
        key: String,
        member: String,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let present: bool = conn
                .sismember(&key, member)
                .await
                .map_err(RedisDaoError::command("SISMEMBER", &key))?;
            Ok(present)
        })
    }

    fn set_size(&self, key: String) -> BoxFuture<'static, StorageResult<u64>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let size: u64 = conn
                .scard(&key)
                .await
                .map_err(RedisDaoError::command("SCARD", &key))?;
            Ok(size)
        })
    }

    fn set_members(&self, key: String) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let members: Vec<String> = conn
                .smembers(&key)
                .await
                .map_err(RedisDaoError::command("SMEMBERS", &key))?;
            Ok(members)
        })
    }

    fn incr_with_expiry(
        &self,
        key: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StorageResult<i64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut conn = store.conn.clone();
            let value: i64 = store
                .incr_with_expiry
                .key(&key)
                .arg(millis(ttl))
                .invoke_async(&mut conn)
                .await
                .map_err(RedisDaoError::command("EVALSHA incr_with_expiry", &key))?;
            Ok(value)
        })
    }

    fn hash_get(
        &self,
        key: String,
        field: String,
    ) -> BoxFuture<'static, StorageResult<Option<String>>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let value: Option<String> = conn
                .hget(&key, field)
                .await
                .map_err(RedisDaoError::command("HGET", &key))?;
            Ok(value)
        })
    }

    fn scan_keys(&self, pattern: String) -> BoxFuture<'static, StorageResult<Vec<String>>> {
        let store = self.clone();
        Box::pin(async move { store.scan_keys(pattern).await.map_err(Into::into) })
    }

    fn ping(&self) -> BoxFuture<'static, StorageResult<()>> {
        let mut conn = self.conn.clone();
        Box::pin(async move {
            let _: String = redis::cmd("PING")
                .query_async(&mut conn)
                .await
                .map_err(RedisDaoError::command("PING", ""))?;
            Ok(())
        })
    }
}

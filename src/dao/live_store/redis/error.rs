use redis::RedisError;
use thiserror::Error;

/// Result alias of the Redis layer.
pub type RedisResult<T> = std::result::Result<T, RedisDaoError>;

/// Failures of the Redis live store.
#[derive(Debug, Error)]
pub enum RedisDaoError {
    #[error("failed to open Redis client for `{url}`")]
    InvalidUrl {
        url: String,
        #[source]
        source: RedisError,
    },
    #[error("failed to connect to Redis at `{url}`")]
    Connect {
        url: String,
        #[source]
        source: RedisError,
    },
    #[error("Redis `{command}` failed on `{key}`")]
    Command {
        command: &'static str,
        key: String,
        #[source]
        source: RedisError,
    },
    #[error("unexpected Redis reply for `{key}`: {reply}")]
    UnexpectedReply { key: String, reply: String },
}

impl RedisDaoError {
    pub(super) fn command(command: &'static str, key: &str) -> impl FnOnce(RedisError) -> Self {
        let key = key.to_owned();
        move |source| RedisDaoError::Command {
            command,
            key,
            source,
        }
    }
}

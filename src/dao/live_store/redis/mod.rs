mod config;
mod error;
mod scripts;
/// Redis implementation of the live store.
pub mod store;

pub use config::RedisConfig;
pub use error::RedisDaoError;
pub use store::RedisLiveStore;

use crate::dao::storage::StorageError;

impl From<RedisDaoError> for StorageError {
    fn from(err: RedisDaoError) -> Self {
        match err {
            RedisDaoError::UnexpectedReply { key, reply } => StorageError::corrupted(key, reply),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}

mod config;
mod connection;
mod error;
mod models;
/// MongoDB implementation of the record store.
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoRecordStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::Decode {
                collection,
                id,
                message,
            } => StorageError::corrupted(format!("{collection}/{id}"), message),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}

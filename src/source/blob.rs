use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BoxError;

/// Read access to an object store (bucket + object name).
///
/// `Ok(None)` means the object does not exist; `Err` is reserved for the
/// store being unreachable or refusing the request.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Bytes>, BoxError>;
}

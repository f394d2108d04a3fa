use async_trait::async_trait;
use bytes::Bytes;

use chemist_report::error::BoxError;
use chemist_report::source::BlobStore;

/// Reads objects from S3 using the ambient AWS configuration.
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
}

impl S3BlobStore {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[tracing::instrument(skip(self))]
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Bytes>, BoxError> {
        let resp = match self.client.get_object().bucket(bucket).key(key).send().await {
            Ok(resp) => resp,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let body = resp.body.collect().await?.into_bytes();
        tracing::debug!(bytes = body.len(), "Object read");
        Ok(Some(body))
    }
}

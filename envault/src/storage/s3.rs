//! S3-compatible adapter for [`ObjectStore`] (AWS S3, MinIO, ...).

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::instrument;

use crate::config::StorageConfig;
use crate::storage::{ObjectStore, StorageError};

pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(&config.access_key, &config.secret_key, None, None, "envault-config");

        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .credentials_provider(credentials)
            .force_path_style(config.force_path_style)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), err)]
    async fn ensure_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        let exists = self.client.head_bucket().bucket(bucket).send().await.is_ok();
        if exists {
            return Ok(());
        }

        tracing::info!(bucket, "Creating storage bucket");
        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                // Another instance may have created it between the check and
                // the create call.
                let service_err = e.into_service_error();
                if service_err.is_bucket_already_owned_by_you() || service_err.is_bucket_already_exists() {
                    Ok(())
                } else {
                    Err(StorageError::Sdk(service_err.to_string()))
                }
            }
        }
    }

    #[instrument(skip(self, bytes), fields(size = bytes.len()), err)]
    async fn upload(&self, bucket: &str, key: &str, bytes: Bytes, content_type: &str) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Sdk(e.to_string()))?;

        Ok(format!("{bucket}/{key}"))
    }

    #[instrument(skip(self), err)]
    async fn download(&self, bucket: &str, key: &str) -> Result<Bytes, StorageError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                if service_err.is_no_such_key() {
                    StorageError::NotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Sdk(service_err.to_string())
                }
            })?;

        let data = output.body.collect().await.map_err(|e| StorageError::Sdk(e.to_string()))?;
        Ok(data.into_bytes())
    }

    #[instrument(skip(self), err)]
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Sdk(e.to_string()))?;

        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn presigned_url(&self, bucket: &str, key: &str, ttl: Duration) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(|e| StorageError::Presign(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(request.uri().to_string())
    }
}

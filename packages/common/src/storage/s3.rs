use async_trait::async_trait;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::{Bucket, Region};
use tokio::io::AsyncReadExt;

use super::error::StorageError;
use super::traits::{BoxReader, ObjectMetadata, ObjectStore, validate_object_key};

/// S3-compatible object store (AWS S3, MinIO, etc.).
pub struct S3ObjectStore {
    bucket: Box<Bucket>,
    max_size: u64,
}

impl S3ObjectStore {
    /// Connect to a bucket. `endpoint` selects a custom S3-compatible
    /// service; without it the named AWS region is used.
    pub fn new(
        bucket_name: &str,
        region: &str,
        endpoint: Option<&str>,
        access_key: &str,
        secret_key: &str,
        max_size: u64,
    ) -> Result<Self, StorageError> {
        let region = match endpoint {
            Some(endpoint) => Region::Custom {
                region: region.to_string(),
                endpoint: endpoint.to_string(),
            },
            None => region
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid region: {e}")))?,
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Backend(e.to_string()))?
            .with_path_style();

        Ok(Self { bucket, max_size })
    }

    fn map_err(key: &str, err: S3Error) -> StorageError {
        match err {
            S3Error::HttpFailWithBody(404, _) => StorageError::NotFound(key.to_string()),
            other => StorageError::Backend(other.to_string()),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_stream(
        &self,
        key: &str,
        mut reader: BoxReader,
        content_type: Option<&str>,
    ) -> Result<u64, StorageError> {
        validate_object_key(key)?;

        // Uploads here are bounded form documents, so buffering is fine; the
        // limit is enforced before anything leaves the process.
        let mut data = Vec::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            if (data.len() + n) as u64 > self.max_size {
                return Err(StorageError::SizeLimitExceeded {
                    actual: (data.len() + n) as u64,
                    limit: self.max_size,
                });
            }
            data.extend_from_slice(&buf[..n]);
        }

        let content_type = content_type.unwrap_or("application/octet-stream");
        self.bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(|e| Self::map_err(key, e))?;

        Ok(data.len() as u64)
    }

    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError> {
        validate_object_key(key)?;
        let response = self
            .bucket
            .get_object(key)
            .await
            .map_err(|e| Self::map_err(key, e))?;
        let bytes = response.to_vec();
        Ok(Box::new(std::io::Cursor::new(bytes)))
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        validate_object_key(key)?;
        let (head, code) = self
            .bucket
            .head_object(key)
            .await
            .map_err(|e| Self::map_err(key, e))?;

        if code == 404 {
            return Err(StorageError::NotFound(key.to_string()));
        }

        Ok(ObjectMetadata {
            size: head.content_length.unwrap_or_default().max(0) as u64,
            content_type: head.content_type,
        })
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_object_key(key)?;
        match self.bucket.delete_object(key).await {
            Ok(_) => Ok(true),
            Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }
}

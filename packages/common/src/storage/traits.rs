use std::io::Cursor;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::error::StorageError;

/// Type alias for a boxed async reader.
pub type BoxReader = Box<dyn AsyncRead + Unpin + Send>;

/// Size and declared content type of a stored object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub size: u64,
    pub content_type: Option<String>,
}

/// Key-addressed object storage.
///
/// Keys are slash-separated paths chosen by the caller (e.g.
/// `applications/42/personal.studentIdProof/<uuid>`); the store itself
/// attaches no meaning to them beyond [`validate_object_key`].
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store bytes under `key`, replacing any existing object.
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: Option<&str>,
    ) -> Result<(), StorageError> {
        let reader: BoxReader = Box::new(Cursor::new(data.to_vec()));
        self.put_stream(key, reader, content_type).await.map(|_| ())
    }

    /// Store data from an async reader under `key`. Returns the byte count
    /// written.
    async fn put_stream(
        &self,
        key: &str,
        reader: BoxReader,
        content_type: Option<&str>,
    ) -> Result<u64, StorageError>;

    /// Retrieve all bytes for an object.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let mut reader = self.get_stream(key).await?;
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Retrieve an object as a streaming async reader.
    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError>;

    /// Size and content type without fetching the body.
    async fn head(&self, key: &str) -> Result<ObjectMetadata, StorageError>;

    /// Check whether an object exists.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete an object.
    ///
    /// Returns `true` if the object was deleted, `false` if it did not exist.
    async fn delete(&self, key: &str) -> Result<bool, StorageError>;
}

/// Reject keys that could escape the store's namespace or confuse backends.
pub fn validate_object_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key.len() <= 512
        && !key.starts_with('/')
        && !key.ends_with('/')
        && !key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '/'));

    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation() {
        assert!(validate_object_key("applications/42/personal.studentIdProof/abc").is_ok());
        assert!(validate_object_key("a").is_ok());

        for bad in ["", "/leading", "trailing/", "a//b", "a/../b", "a/./b", "spa ce", "tab\there"] {
            assert!(validate_object_key(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}

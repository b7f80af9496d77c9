use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::{AsyncReadExt, BufReader};

use super::error::StorageError;
use super::traits::{BoxReader, ObjectMetadata, ObjectStore, validate_object_key};

/// Sidecar metadata persisted next to each object's bytes.
#[derive(Serialize, Deserialize)]
struct SidecarMeta {
    content_type: Option<String>,
}

/// Filesystem-backed object store.
///
/// Object bytes live under `{base_path}/data/{key}`, the declared content
/// type under `{base_path}/meta/{key}`. Writes stream through a temp file and
/// land via rename.
pub struct FilesystemObjectStore {
    base_path: PathBuf,
    max_size: u64,
}

impl FilesystemObjectStore {
    /// Create a new filesystem object store.
    pub async fn new(base_path: PathBuf, max_size: u64) -> Result<Self, StorageError> {
        fs::create_dir_all(base_path.join("data")).await?;
        fs::create_dir_all(base_path.join("meta")).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self { base_path, max_size })
    }

    fn data_path(&self, key: &str) -> PathBuf {
        self.base_path.join("data").join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.base_path.join("meta").join(key)
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }

    async fn read_sidecar(&self, key: &str) -> Option<SidecarMeta> {
        let raw = fs::read(self.meta_path(key)).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn put_stream(
        &self,
        key: &str,
        mut reader: BoxReader,
        content_type: Option<&str>,
    ) -> Result<u64, StorageError> {
        validate_object_key(key)?;

        let temp_path = self.temp_path();
        let mut total_bytes: u64 = 0;

        let mut buf = vec![0u8; 64 * 1024]; // 64KB read buffer
        let mut temp_file = fs::File::create(&temp_path).await?;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }

            total_bytes += n as u64;
            if total_bytes > self.max_size {
                drop(temp_file);
                let _ = fs::remove_file(&temp_path).await;
                return Err(StorageError::SizeLimitExceeded {
                    actual: total_bytes,
                    limit: self.max_size,
                });
            }

            tokio::io::AsyncWriteExt::write_all(&mut temp_file, &buf[..n]).await?;
        }

        tokio::io::AsyncWriteExt::flush(&mut temp_file).await?;
        drop(temp_file);

        let data_path = self.data_path(key);
        if let Some(parent) = data_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        if let Err(e) = fs::rename(&temp_path, &data_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        let meta_path = self.meta_path(key);
        if let Some(parent) = meta_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let sidecar = SidecarMeta {
            content_type: content_type.map(str::to_string),
        };
        fs::write(&meta_path, serde_json::to_vec(&sidecar).unwrap_or_default()).await?;

        Ok(total_bytes)
    }

    async fn get_stream(&self, key: &str) -> Result<BoxReader, StorageError> {
        validate_object_key(key)?;
        match fs::File::open(self.data_path(key)).await {
            Ok(file) => Ok(Box::new(BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata, StorageError> {
        validate_object_key(key)?;
        let meta = match fs::metadata(self.data_path(key)).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let content_type = match self.read_sidecar(key).await {
            Some(sidecar) => sidecar.content_type,
            // Sidecar lost or predates this layout: fall back to the extension.
            None => mime_guess::from_path(key).first().map(|m| m.to_string()),
        };

        Ok(ObjectMetadata {
            size: meta.len(),
            content_type,
        })
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        validate_object_key(key)?;
        let _ = fs::remove_file(self.meta_path(key)).await;
        match fs::remove_file(self.data_path(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (FilesystemObjectStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path().join("objects"), 10 * 1024 * 1024)
            .await
            .unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn put_get_round_trip() {
        let (store, _dir) = temp_store().await;
        let data = b"%PDF-1.7 pretend payslip";
        store
            .put("applications/1/slot/doc1", data, Some("application/pdf"))
            .await
            .unwrap();
        let retrieved = store.get("applications/1/slot/doc1").await.unwrap();
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn head_reports_size_and_declared_type() {
        let (store, _dir) = temp_store().await;
        let data = b"binary image bytes";
        store.put("a/b/c", data, Some("image/png")).await.unwrap();

        let meta = store.head("a/b/c").await.unwrap();
        assert_eq!(meta.size, data.len() as u64);
        assert_eq!(meta.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn head_falls_back_to_extension_without_sidecar() {
        let (store, dir) = temp_store().await;
        store.put("docs/scan.pdf", b"x", None).await.unwrap();
        // Simulate a sidecar lost out-of-band.
        std::fs::remove_file(dir.path().join("objects/meta/docs/scan.pdf")).unwrap();

        let meta = store.head("docs/scan.pdf").await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn put_replaces_existing_object() {
        let (store, _dir) = temp_store().await;
        store.put("k", b"first", Some("text/plain")).await.unwrap();
        store.put("k", b"second!", Some("text/plain")).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), b"second!");
        assert_eq!(store.head("k").await.unwrap().size, 7);
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let (store, _dir) = temp_store().await;
        assert!(matches!(
            store.get("nope").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            store.head("nope").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn size_limit_enforced_mid_stream() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path().join("objects"), 10)
            .await
            .unwrap();

        let data = b"this is more than 10 bytes".to_vec();
        let reader: BoxReader = Box::new(std::io::Cursor::new(data));
        let result = store.put_stream("big", reader, None).await;
        assert!(matches!(result, Err(StorageError::SizeLimitExceeded { .. })));

        // Temp file cleaned up, nothing landed.
        let tmp_entries: Vec<_> = std::fs::read_dir(dir.path().join("objects/.tmp"))
            .unwrap()
            .collect();
        assert_eq!(tmp_entries.len(), 0);
        assert!(!store.exists("big").await.unwrap());
    }

    #[tokio::test]
    async fn delete_removes_object() {
        let (store, _dir) = temp_store().await;
        store.put("gone", b"bye", None).await.unwrap();

        assert!(store.delete("gone").await.unwrap());
        assert!(!store.exists("gone").await.unwrap());
        assert!(!store.delete("gone").await.unwrap());
    }

    #[tokio::test]
    async fn traversal_keys_rejected() {
        let (store, _dir) = temp_store().await;
        assert!(matches!(
            store.put("../escape", b"x", None).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.get("/etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}

//! Typed JSON document with atomic write-through
//!
//! A [`JsonDocument`] owns one file on disk. Loading a missing file yields the
//! type's default value; writing goes through a temporary sibling that is
//! flushed and renamed over the target, so readers never observe a torn file.

use crate::error::StoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// A single persisted JSON document
#[derive(Debug)]
pub struct JsonDocument<T> {
    path: PathBuf,
    /// Serializes writers so temporary files never interleave
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Bind a document to a path. Nothing is read until [`load`](Self::load).
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    /// Document path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document
    ///
    /// A missing file is not an error: the default value is returned and the
    /// file is created on the first write.
    ///
    /// # Errors
    /// - `StoreError::Io` if the file exists but cannot be read
    /// - `StoreError::Malformed` if the content does not decode as `T`
    pub async fn load(&self) -> Result<T, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "document missing, starting empty");
                return Ok(T::default());
            }
            Err(e) => return Err(StoreError::io_error(&self.path, e)),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(T::default());
        }

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    /// Write the document, replacing the file atomically
    ///
    /// Returns only after the new content is flushed and renamed into place.
    ///
    /// # Errors
    /// - `StoreError::Encode` if `value` cannot be serialized
    /// - `StoreError::Io` if the temporary file cannot be written or renamed
    pub async fn write(&self, value: &T) -> Result<(), StoreError> {
        let mut encoded =
            serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
                path: self.path.clone(),
                source,
            })?;
        encoded.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let tmp = self.temp_path();

        let result = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&encoded).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&tmp).await;
            tracing::error!(path = %self.path.display(), error = %e, "document write failed");
            return Err(StoreError::io_error(&self.path, e));
        }

        tracing::debug!(path = %self.path.display(), bytes = encoded.len(), "document written");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

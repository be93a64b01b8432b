//! Public-disk asset storage: weekday images, visitor photos, credential templates.

use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};

use crate::errors::AppError;

/// Storage-layer failures.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid asset path: {0}")]
    InvalidPath(String),

    #[error("Asset read failed for {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Raw asset bytes and their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
}

impl Asset {
    /// `data:<mime>;base64,<payload>` URI for inline embedding.
    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Read access to named assets.
///
/// `Ok(None)` means the asset does not exist.
pub trait AssetStore: Send + Sync {
    fn read(&self, path: &str) -> Result<Option<Asset>, StorageError>;

    /// Read a UTF-8 text asset (templates).
    fn read_text(&self, path: &str) -> Result<Option<String>, StorageError> {
        let Some(asset) = self.read(path)? else {
            return Ok(None);
        };
        String::from_utf8(asset.bytes)
            .map(Some)
            .map_err(|e| StorageError::Read {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::InvalidData, e),
            })
    }
}

/// Asset store rooted at a directory on local disk.
#[derive(Debug, Clone)]
pub struct LocalDiskStore {
    root: PathBuf,
}

impl LocalDiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative asset path under the root, rejecting traversal.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if path.trim().is_empty() || !safe {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl AssetStore for LocalDiskStore {
    fn read(&self, path: &str) -> Result<Option<Asset>, StorageError> {
        let full_path = self.resolve(path)?;
        match std::fs::read(&full_path) {
            Ok(bytes) => {
                tracing::debug!(path, size = bytes.len(), "Asset read from storage");
                Ok(Some(Asset {
                    bytes,
                    mime: mime_for(path),
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path, full_path = %full_path.display(), "Asset not found");
                Ok(None)
            }
            Err(e) => Err(StorageError::Read {
                path: path.to_string(),
                source: e,
            }),
        }
    }
}

/// Run disk-bound work against `store` on the blocking thread pool.
pub async fn with_store<T, F>(store: Arc<LocalDiskStore>, work: F) -> Result<T, AppError>
where
    F: FnOnce(&LocalDiskStore) -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || work(&store))
        .await
        .map_err(|e| AppError::Internal(format!("Storage task failed: {e}")))
}

/// MIME type from a file extension.
pub fn mime_for(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("bmp") => "image/bmp",
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_existing_asset_with_mime() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("weekdays")).unwrap();
        std::fs::write(dir.path().join("weekdays/sun.png"), [1u8, 2, 3]).unwrap();

        let store = LocalDiskStore::new(dir.path());
        let asset = store.read("weekdays/sun.png").unwrap().unwrap();
        assert_eq!(asset.bytes, vec![1, 2, 3]);
        assert_eq!(asset.mime, "image/png");
        assert_eq!(asset.data_uri(), "data:image/png;base64,AQID");
    }

    #[test]
    fn missing_asset_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDiskStore::new(dir.path());
        assert!(store.read("weekdays/none.png").unwrap().is_none());
    }

    #[test]
    fn leading_slash_is_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        let store = LocalDiskStore::new(dir.path());
        let asset = store.read("/a.jpg").unwrap().unwrap();
        assert_eq!(asset.mime, "image/jpeg");
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalDiskStore::new(dir.path());
        assert!(matches!(
            store.read("../etc/passwd"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(store.read(""), Err(StorageError::InvalidPath(_))));
    }

    #[test]
    fn reading_a_directory_is_a_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("templates")).unwrap();
        let store = LocalDiskStore::new(dir.path());
        assert!(matches!(
            store.read("templates"),
            Err(StorageError::Read { .. })
        ));
    }

    #[test]
    fn read_text_decodes_utf8() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("templates/badge")).unwrap();
        std::fs::write(
            dir.path().join("templates/badge/index.html"),
            "<p class=\"tpl-name\">Visitante</p>",
        )
        .unwrap();
        let store = LocalDiskStore::new(dir.path());
        let html = store.read_text("templates/badge/index.html").unwrap().unwrap();
        assert!(html.contains("tpl-name"));
    }

    #[tokio::test]
    async fn with_store_reads_off_the_runtime() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo.png"), [7u8]).unwrap();
        let store = Arc::new(LocalDiskStore::new(dir.path()));

        let asset = with_store(store, |store| store.read("logo.png"))
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(asset.bytes, vec![7]);
    }

    #[tokio::test]
    async fn with_store_maps_panics_to_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalDiskStore::new(dir.path()));

        let result: Result<(), AppError> = with_store(store, |_| panic!("disk gone")).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        assert_eq!(mime_for("file.bin"), "application/octet-stream");
        assert_eq!(mime_for("PHOTO.JPEG"), "image/jpeg");
    }
}

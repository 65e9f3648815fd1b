use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::multipart::{Field, MultipartError},
    http::StatusCode,
};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Public URL prefix (and stored path prefix) for uploaded files.
pub const PUBLIC_PREFIX: &str = "uploads";

/// Longest original extension kept on a generated filename.
const MAX_EXTENSION_LEN: usize = 10;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload exceeds the size limit")]
    TooLarge,

    #[error("failed to read upload: {0}")]
    Read(String),

    #[error("failed to store upload: {0}")]
    Storage(#[from] std::io::Error),
}

/// A stored attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Generated name inside the uploads directory.
    pub file_name: String,
    /// `uploads/<file_name>`; stored in the DB and served at `/<path>`.
    pub path: String,
}

impl ImageReference {
    fn new(file_name: String) -> Self {
        let path = format!("{}/{}", PUBLIC_PREFIX, file_name);
        Self { file_name, path }
    }

    pub fn public_url(&self) -> String {
        format!("/{}", self.path)
    }
}

/// Anything an upload body can be pulled from, one chunk at a time.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> impl Future<Output = Result<Option<Bytes>, UploadError>> + Send;
}

impl ChunkSource for Field<'_> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        self.chunk().await.map_err(read_error)
    }
}

fn read_error(e: MultipartError) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge
    } else {
        UploadError::Read(e.body_text())
    }
}

/// Flat on-disk store for form attachments.
///
/// Each upload lands at `{dir}/{uuid}{ext}`. Names never collide, so
/// concurrent requests write independent files.
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: u64,
}

impl UploadStore {
    pub async fn new(dir: PathBuf, max_bytes: u64) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Uploads directory: {} (limit {} bytes)", dir.display(), max_bytes);
        Ok(Self { dir, max_bytes })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn file_path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Stream one attachment to disk.
    ///
    /// Returns `Ok(None)` when there is no file: an empty filename with an
    /// empty body, which is what browsers send for an untouched file input.
    /// On any error the partial file is removed.
    pub async fn accept<S: ChunkSource>(
        &self,
        original_filename: Option<&str>,
        source: &mut S,
    ) -> Result<Option<ImageReference>, UploadError> {
        let original_filename = original_filename.unwrap_or_default();

        let mut first = source.next_chunk().await?;
        while matches!(&first, Some(chunk) if chunk.is_empty()) {
            first = source.next_chunk().await?;
        }
        if first.is_none() && original_filename.is_empty() {
            return Ok(None);
        }

        let reference = ImageReference::new(generate_file_name(original_filename));
        let path = self.file_path(&reference.file_name);

        match self.write_stream(&path, first, source).await {
            Ok(written) => {
                info!("Stored upload {} ({} bytes)", reference.file_name, written);
                Ok(Some(reference))
            }
            Err(e) => {
                if let Err(rm) = fs::remove_file(&path).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove partial upload {}: {}", path.display(), rm);
                    }
                }
                Err(e)
            }
        }
    }

    async fn write_stream<S: ChunkSource>(
        &self,
        path: &Path,
        first: Option<Bytes>,
        source: &mut S,
    ) -> Result<u64, UploadError> {
        let mut file = fs::File::create(path).await?;
        let mut written: u64 = 0;
        let mut next = first;

        while let Some(chunk) = next {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(UploadError::TooLarge);
            }
            file.write_all(&chunk).await?;
            next = source.next_chunk().await?;
        }

        file.flush().await?;
        Ok(written)
    }

    /// Delete a stored upload. A file that is already gone is not an error.
    pub async fn discard(&self, reference: &ImageReference) -> Result<()> {
        self.delete_file(&reference.file_name).await
    }

    pub async fn delete_file(&self, file_name: &str) -> Result<()> {
        let path = self.file_path(file_name);
        match fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted upload {}", file_name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Upload {} already gone", file_name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Names of all files currently in the uploads directory.
    pub async fn list_files(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }
}

/// `<uuid><ext>`, keeping the original extension only when it is short and
/// plain ASCII alphanumeric.
pub fn generate_file_name(original_filename: &str) -> String {
    let ext = Path::new(original_filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| {
            !e.is_empty()
                && e.len() <= MAX_EXTENSION_LEN
                && e.bytes().all(|b| b.is_ascii_alphanumeric())
        })
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default();

    format!("{}{}", Uuid::new_v4(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Chunks(VecDeque<Bytes>);

    impl Chunks {
        fn of(parts: &[&[u8]]) -> Self {
            Self(parts.iter().map(|p| Bytes::copy_from_slice(p)).collect())
        }
    }

    impl ChunkSource for Chunks {
        async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
            Ok(self.0.pop_front())
        }
    }

    struct Failing;

    impl ChunkSource for Failing {
        async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
            Err(UploadError::Read("connection reset".into()))
        }
    }

    async fn store(max_bytes: u64) -> (tempfile::TempDir, UploadStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = UploadStore::new(tmp.path().join("uploads"), max_bytes).await.unwrap();
        (tmp, store)
    }

    #[test]
    fn test_generated_names() {
        let name = generate_file_name("Buddy.JPG");
        assert!(name.ends_with(".jpg"));
        assert_eq!(name.len(), 36 + 4);

        assert_eq!(generate_file_name("noext").len(), 36);
        assert_eq!(generate_file_name("").len(), 36);
        assert_eq!(generate_file_name("evil.p/h/p").len(), 36);
        assert_eq!(generate_file_name("x.averyveryverylongext").len(), 36);
        assert_ne!(generate_file_name("a.png"), generate_file_name("a.png"));
    }

    #[tokio::test]
    async fn test_stored_bytes_read_back_identical() {
        let (_tmp, store) = store(1024).await;
        let mut chunks = Chunks::of(&[b"\x89PNG\r\n", b"", b"rest-of-image"]);

        let reference = store.accept(Some("cat.png"), &mut chunks).await.unwrap().unwrap();
        assert!(reference.path.starts_with("uploads/"));
        assert!(reference.path.ends_with(".png"));
        assert_eq!(reference.public_url(), format!("/{}", reference.path));

        let stored = std::fs::read(store.file_path(&reference.file_name)).unwrap();
        assert_eq!(stored, b"\x89PNG\r\nrest-of-image");
    }

    #[tokio::test]
    async fn test_empty_file_input_is_no_file() {
        let (_tmp, store) = store(1024).await;
        let result = store.accept(Some(""), &mut Chunks::of(&[])).await.unwrap();
        assert!(result.is_none());
        assert!(store.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_named_empty_file_is_stored() {
        let (_tmp, store) = store(1024).await;
        let reference = store.accept(Some("empty.txt"), &mut Chunks::of(&[])).await.unwrap();
        assert!(reference.is_some());
        assert_eq!(store.list_files().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_too_large_leaves_nothing_behind() {
        let (_tmp, store) = store(8).await;
        let mut chunks = Chunks::of(&[b"12345", b"67890"]);

        let err = store.accept(Some("big.bin"), &mut chunks).await.unwrap_err();
        assert!(matches!(err, UploadError::TooLarge));
        assert!(store.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_error_propagates() {
        let (_tmp, store) = store(8).await;
        let err = store.accept(Some("x.png"), &mut Failing).await.unwrap_err();
        assert!(matches!(err, UploadError::Read(_)));
    }

    #[tokio::test]
    async fn test_missing_dir_is_storage_error() {
        let (_tmp, store) = store(1024).await;
        std::fs::remove_dir_all(store.dir()).unwrap();

        let mut chunks = Chunks::of(&[b"GIF89a"]);
        let err = store.accept(Some("a.gif"), &mut chunks).await.unwrap_err();
        assert!(matches!(err, UploadError::Storage(_)));

        std::fs::create_dir_all(store.dir()).unwrap();
        assert!(store.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_discard_is_idempotent() {
        let (_tmp, store) = store(1024).await;
        let reference = store
            .accept(Some("a.gif"), &mut Chunks::of(&[b"GIF89a"]))
            .await
            .unwrap()
            .unwrap();

        store.discard(&reference).await.unwrap();
        store.discard(&reference).await.unwrap();
        assert!(store.list_files().await.unwrap().is_empty());
    }
}

//! Filesystem blob storage for materialized city images

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::Result;

/// Blob store keeping image bytes under a single storage root.
///
/// Blobs are named `{epoch-millis}-{name-hint}{extension}`.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Create the root directory if needed and canonicalize it
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        let root = std::fs::canonicalize(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store content under a freshly generated path and return that path
    pub async fn put(&self, content: &[u8], name_hint: &str, extension: &str) -> Result<PathBuf> {
        self.put_at(epoch_millis(), content, name_hint, extension).await
    }

    async fn put_at(
        &self,
        millis: i128,
        content: &[u8],
        name_hint: &str,
        extension: &str,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root).await?;

        let stem = format!("{}-{}", millis, sanitize_file_name(name_hint));
        let extension = sanitize_extension(extension);

        let path = self.root.join(format!("{stem}{extension}"));
        if write_new(&path, content).await? {
            return Ok(path);
        }

        // Same name within the same millisecond: disambiguate by content
        let hash = blake3::hash(content).to_hex();
        let path = self
            .root
            .join(format!("{stem}-{}{extension}", &hash.as_str()[..12]));
        if !write_new(&path, content).await? {
            debug!(path = %path.display(), "identical blob already stored");
        }

        Ok(path)
    }

    /// Read a blob back. Missing, unreadable or out-of-root paths yield `None`.
    pub async fn get(&self, location: impl AsRef<Path>) -> Option<Vec<u8>> {
        let location = location.as_ref();

        let resolved = match tokio::fs::canonicalize(location).await {
            Ok(path) => path,
            Err(e) => {
                warn!(location = %location.display(), error = %e, "image not found in storage");
                return None;
            }
        };

        if !resolved.starts_with(&self.root) {
            warn!(
                location = %location.display(),
                root = %self.root.display(),
                "refusing to read image outside the storage root"
            );
            return None;
        }

        match tokio::fs::read(&resolved).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(location = %resolved.display(), error = %e, "failed to read stored image");
                None
            }
        }
    }
}

/// Write `content` to `path` only if nothing exists there yet.
///
/// Returns `false` when the path is already taken.
async fn write_new(path: &Path, content: &[u8]) -> Result<bool> {
    let mut file = match tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let written: std::io::Result<()> = async {
        file.write_all(content).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;

    if let Err(e) = written {
        drop(file);
        let _ = tokio::fs::remove_file(path).await;
        return Err(e.into());
    }

    Ok(true)
}

fn epoch_millis() -> i128 {
    OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000
}

/// Replace characters that are not safe in a file name
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

fn sanitize_extension(extension: &str) -> String {
    if extension.is_empty() {
        return String::new();
    }
    let body = sanitize_file_name(extension.trim_start_matches('.'));
    format!(".{body}")
}

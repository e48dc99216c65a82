use axum::http::StatusCode;
use megaphone_common::model::post::Attachment;
use rand::Rng;
use std::path::{Path, PathBuf};
use thiserror::Error;
use time::UtcDateTime;

pub const MAX_FILES: usize = 5;
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Only image and PDF files are allowed, got {0:?}")]
    FileType(String),
    #[error("File {name:?} is {size} bytes, above the {MAX_FILE_SIZE_BYTES} byte limit")]
    FileSize { name: String, size: u64 },
    #[error("At most {MAX_FILES} files can be attached")]
    TooManyFiles,
    #[error("Storing the file failed: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    pub fn status(&self) -> StatusCode {
        match self {
            UploadError::FileType(_)
            | UploadError::FileSize { .. }
            | UploadError::TooManyFiles => StatusCode::BAD_REQUEST,
            UploadError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[must_use]
pub fn is_allowed_media_type(media_type: &str) -> bool {
    media_type.starts_with("image/") || media_type == "application/pdf"
}

/// Writes attachment bytes into the upload directory under generated unique
/// filenames and hands back the metadata that gets persisted with the post.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Validates and stores one uploaded file. Validation happens before
    /// anything touches the filesystem.
    pub async fn store(
        &self,
        original_name: &str,
        media_type: &str,
        bytes: &[u8],
    ) -> Result<Attachment, UploadError> {
        if !is_allowed_media_type(media_type) {
            return Err(UploadError::FileType(media_type.to_owned()));
        }

        let size = bytes.len() as u64;
        if size > MAX_FILE_SIZE_BYTES {
            return Err(UploadError::FileSize {
                name: original_name.to_owned(),
                size,
            });
        }

        let stored_name = generate_stored_name(original_name);
        let path = self.dir.join(&stored_name);
        tokio::fs::write(&path, bytes).await?;

        Ok(Attachment {
            stored_name,
            original_name: original_name.to_owned(),
            media_type: media_type.to_owned(),
            size_bytes: size,
            path: path.display().to_string(),
        })
    }
}

/// Unique stored filename: timestamp plus random suffix, keeping the
/// original extension so static serving gets a sensible name.
fn generate_stored_name(original_name: &str) -> String {
    let millis = UtcDateTime::now().unix_timestamp_nanos() / 1_000_000;
    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);

    match Path::new(original_name).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("files-{millis}-{suffix}.{ext}"),
        None => format!("files-{millis}-{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use crate::server::upload::{
        MAX_FILE_SIZE_BYTES, UploadError, UploadStore, generate_stored_name, is_allowed_media_type,
    };

    #[test]
    fn media_type_filter() {
        assert!(is_allowed_media_type("image/png"));
        assert!(is_allowed_media_type("image/jpeg"));
        assert!(is_allowed_media_type("application/pdf"));

        assert!(!is_allowed_media_type("application/zip"));
        assert!(!is_allowed_media_type("text/html"));
        assert!(!is_allowed_media_type("video/mp4"));
    }

    #[test]
    fn stored_name_keeps_extension() {
        let name = generate_stored_name("photo.png");
        assert!(name.starts_with("files-"));
        assert!(name.ends_with(".png"));

        let bare = generate_stored_name("no-extension");
        assert!(bare.starts_with("files-"));
        assert!(!bare.contains('.'));
    }

    #[tokio::test]
    async fn store_writes_bytes_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_owned());

        let attachment = store
            .store("photo.png", "image/png", b"not really a png")
            .await
            .unwrap();

        assert_eq!(attachment.original_name, "photo.png");
        assert_eq!(attachment.media_type, "image/png");
        assert_eq!(attachment.size_bytes, 16);

        let written = std::fs::read(dir.path().join(&attachment.stored_name)).unwrap();
        assert_eq!(written, b"not really a png");
    }

    #[tokio::test]
    async fn disallowed_type_rejected_before_write() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_owned());

        let result = store.store("evil.exe", "application/x-msdownload", b"mz").await;
        assert!(matches!(result, Err(UploadError::FileType(_))));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path().to_owned());

        let bytes = vec![0_u8; usize::try_from(MAX_FILE_SIZE_BYTES).unwrap() + 1];
        let result = store.store("big.png", "image/png", &bytes).await;
        assert!(matches!(result, Err(UploadError::FileSize { .. })));
    }
}

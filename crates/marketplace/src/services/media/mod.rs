//! Image uploads.
//!
//! Uploads are validated here (declared type, magic bytes, size) and then
//! handed to a [`MediaStore`] backend: [`LocalDiskStore`] for development and
//! single-host deployments, [`GcsStore`] for Google Cloud Storage.
//!
//! Object keys look like `products/2026/06/0b5c....webp`.

mod gcs;
mod local;

pub use gcs::GcsStore;
pub use local::{LocalDiskStore, PUBLIC_PREFIX as LOCAL_PUBLIC_PREFIX};

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{UploadBackend, UploadConfig};

/// Errors raised while accepting or storing an upload.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("a file field is required")]
    MissingFile,

    #[error("only one file can be uploaded per request")]
    MultipleFiles,

    #[error("unknown upload folder: {0}")]
    InvalidFolder(String),

    #[error("unsupported content type: {0}")]
    UnsupportedType(String),

    #[error("file contents do not match the declared content type")]
    ContentMismatch,

    #[error("file is empty")]
    Empty,

    #[error("file exceeds the {max} byte limit")]
    TooLarge { max: usize },

    #[error("malformed multipart body: {0}")]
    Multipart(String),

    #[error("storage backend error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Whether the failure happened after validation, while storing.
    #[must_use]
    pub const fn is_storage_failure(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }
}

/// Top-level folder an upload is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadFolder {
    Products,
    Vehicles,
    Stores,
    Avatars,
    Posts,
    Banners,
    Messages,
    #[default]
    Misc,
}

impl UploadFolder {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::Vehicles => "vehicles",
            Self::Stores => "stores",
            Self::Avatars => "avatars",
            Self::Posts => "posts",
            Self::Banners => "banners",
            Self::Messages => "messages",
            Self::Misc => "misc",
        }
    }
}

impl FromStr for UploadFolder {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "products" => Ok(Self::Products),
            "vehicles" => Ok(Self::Vehicles),
            "stores" => Ok(Self::Stores),
            "avatars" => Ok(Self::Avatars),
            "posts" => Ok(Self::Posts),
            "banners" => Ok(Self::Banners),
            "messages" => Ok(Self::Messages),
            "" | "misc" => Ok(Self::Misc),
            other => Err(MediaError::InvalidFolder(other.to_string())),
        }
    }
}

/// Accepted image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageType {
    /// Parse a declared `Content-Type`, ignoring parameters.
    ///
    /// # Errors
    ///
    /// Returns `MediaError::UnsupportedType` for anything but the four
    /// accepted image types.
    pub fn from_content_type(value: &str) -> Result<Self, MediaError> {
        let essence = value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Ok(Self::Jpeg),
            "image/png" => Ok(Self::Png),
            "image/webp" => Ok(Self::Webp),
            "image/gif" => Ok(Self::Gif),
            _ => Err(MediaError::UnsupportedType(value.to_string())),
        }
    }

    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Gif => "gif",
        }
    }

    /// Whether `bytes` start with this format's signature.
    #[must_use]
    pub fn matches(&self, bytes: &[u8]) -> bool {
        match self {
            Self::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
            Self::Png => bytes.starts_with(b"\x89PNG\r\n\x1a\n"),
            Self::Gif => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
            Self::Webp => {
                bytes.len() >= 12
                    && bytes.starts_with(b"RIFF")
                    && bytes.get(8..12) == Some(b"WEBP".as_slice())
            }
        }
    }
}

/// Check an upload before it reaches storage.
///
/// # Errors
///
/// Returns the first failing rule: unsupported type, empty file, oversize
/// file, or content that does not match the declared type.
pub fn validate_upload(
    declared_content_type: &str,
    bytes: &[u8],
    max_bytes: usize,
) -> Result<ImageType, MediaError> {
    let image_type = ImageType::from_content_type(declared_content_type)?;

    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    if bytes.len() > max_bytes {
        return Err(MediaError::TooLarge { max: max_bytes });
    }
    if !image_type.matches(bytes) {
        return Err(MediaError::ContentMismatch);
    }

    Ok(image_type)
}

/// Build the storage key `{folder}/{yyyy}/{mm}/{id}.{ext}`.
#[must_use]
pub fn object_key(folder: UploadFolder, image_type: ImageType, now: DateTime<Utc>, id: Uuid) -> String {
    format!(
        "{}/{:04}/{:02}/{}.{}",
        folder.as_str(),
        now.year(),
        now.month(),
        id,
        image_type.extension()
    )
}

/// A stored upload as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct StoredMedia {
    pub url: String,
    pub key: String,
    pub content_type: &'static str,
    pub size: usize,
}

/// Storage backend for validated uploads.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `bytes` under `key` and return the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, MediaError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Validates uploads and writes them to the configured backend.
#[derive(Clone)]
pub struct MediaService {
    store: Arc<dyn MediaStore>,
    max_bytes: usize,
}

impl MediaService {
    #[must_use]
    pub fn new(store: Arc<dyn MediaStore>, max_bytes: usize) -> Self {
        Self { store, max_bytes }
    }

    /// Build the backend selected in configuration.
    #[must_use]
    pub fn from_config(config: &UploadConfig, http: reqwest::Client) -> Self {
        let store: Arc<dyn MediaStore> = match &config.backend {
            UploadBackend::Local { dir } => Arc::new(LocalDiskStore::new(dir.clone())),
            UploadBackend::Gcs {
                bucket,
                public_base_url,
                access_token,
            } => Arc::new(GcsStore::new(
                http,
                bucket.clone(),
                public_base_url.clone(),
                access_token.clone(),
            )),
        };
        Self::new(store, config.max_bytes)
    }

    /// Largest accepted file in bytes.
    #[must_use]
    pub const fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Validate and store one image.
    ///
    /// # Errors
    ///
    /// Returns a validation error from [`validate_upload`] or a storage error
    /// from the backend.
    #[tracing::instrument(skip(self, bytes), fields(backend = self.store.name(), size = bytes.len()))]
    pub async fn upload(
        &self,
        folder: UploadFolder,
        declared_content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredMedia, MediaError> {
        let image_type = validate_upload(declared_content_type, &bytes, self.max_bytes)?;
        let key = object_key(folder, image_type, Utc::now(), Uuid::new_v4());
        let size = bytes.len();

        let url = self.store.put(&key, bytes, image_type.content_type()).await?;

        tracing::info!(key = %key, "Media stored");
        Ok(StoredMedia {
            url,
            key,
            content_type: image_type.content_type(),
            size,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];

    #[test]
    fn test_folder_parsing() {
        assert_eq!("products".parse::<UploadFolder>().unwrap(), UploadFolder::Products);
        assert_eq!("".parse::<UploadFolder>().unwrap(), UploadFolder::Misc);
        assert!(matches!(
            "../etc".parse::<UploadFolder>(),
            Err(MediaError::InvalidFolder(_))
        ));
    }

    #[test]
    fn test_content_type_ignores_parameters() {
        assert_eq!(
            ImageType::from_content_type("image/PNG; charset=binary").unwrap(),
            ImageType::Png
        );
        assert!(ImageType::from_content_type("image/svg+xml").is_err());
        assert!(ImageType::from_content_type("text/html").is_err());
    }

    #[test]
    fn test_magic_bytes() {
        assert!(ImageType::Png.matches(PNG));
        assert!(ImageType::Jpeg.matches(JPEG));
        assert!(!ImageType::Png.matches(JPEG));
        assert!(ImageType::Gif.matches(b"GIF89a\x01\x00"));
        assert!(ImageType::Webp.matches(b"RIFF\x24\0\0\0WEBPVP8 "));
        assert!(!ImageType::Webp.matches(b"RIFF\x24\0\0\0WAVE"));
    }

    #[test]
    fn test_validate_upload_rules() {
        assert!(matches!(
            validate_upload("image/png", b"", 100),
            Err(MediaError::Empty)
        ));
        assert!(matches!(
            validate_upload("image/png", PNG, 4),
            Err(MediaError::TooLarge { max: 4 })
        ));
        assert!(matches!(
            validate_upload("image/png", JPEG, 100),
            Err(MediaError::ContentMismatch)
        ));
        assert_eq!(validate_upload("image/jpeg", JPEG, 100).unwrap(), ImageType::Jpeg);
    }

    #[test]
    fn test_object_key_layout() {
        let now = Utc.with_ymd_and_hms(2026, 3, 9, 12, 0, 0).unwrap();
        let id = Uuid::nil();
        assert_eq!(
            object_key(UploadFolder::Vehicles, ImageType::Webp, now, id),
            "vehicles/2026/03/00000000-0000-0000-0000-000000000000.webp"
        );
    }

    #[tokio::test]
    async fn test_service_stores_on_local_disk() {
        let dir = tempfile::tempdir().unwrap();
        let service = MediaService::new(Arc::new(LocalDiskStore::new(dir.path().to_path_buf())), 1024);

        let stored = service
            .upload(UploadFolder::Avatars, "image/png", PNG.to_vec())
            .await
            .unwrap();

        assert!(stored.key.starts_with("avatars/"));
        assert!(stored.url.starts_with("/uploads/avatars/"));
        assert_eq!(stored.size, PNG.len());
        let on_disk = std::fs::read(dir.path().join(&stored.key)).unwrap();
        assert_eq!(on_disk, PNG);
    }

    #[tokio::test]
    async fn test_service_rejects_before_storing() {
        let dir = tempfile::tempdir().unwrap();
        let service = MediaService::new(Arc::new(LocalDiskStore::new(dir.path().to_path_buf())), 1024);

        let err = service
            .upload(UploadFolder::Misc, "image/gif", PNG.to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ContentMismatch));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}

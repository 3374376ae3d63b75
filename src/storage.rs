//! # Image Storage Module
//!
//! Object storage for cocktail images: the [`ObjectStorage`] collaborator
//! trait, a Supabase-style REST implementation, upload validation and
//! unique object naming.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use rand::Rng;
use reqwest::{Client, RequestBuilder};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;

/// Number of random base36 characters in generated object names
const OBJECT_SUFFIX_LENGTH: usize = 7;
/// Cache lifetime of uploaded images
const CACHE_CONTROL: &str = "max-age=3600";

/// Storage and upload validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("unsupported image type {content_type} (JPEG, PNG and WebP only)")]
    UnsupportedType { content_type: String },
    #[error("image is too large ({size} bytes, limit {max} bytes)")]
    TooLarge { size: u64, max: u64 },
    #[error("image is empty")]
    Empty,
    #[error("image content does not match {content_type}")]
    ContentMismatch { content_type: String },
    #[error("image payload is not valid base64: {0}")]
    InvalidBase64(String),
    #[error("storage returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("storage request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Transport(err.to_string())
    }
}

/// Object storage collaborator
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path`; returns the public URL
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError>;

    async fn remove(&self, path: &str) -> Result<(), StorageError>;

    fn public_url(&self, path: &str) -> String;
}

/// Supabase Storage REST client for a single bucket
#[derive(Debug, Clone)]
pub struct SupabaseStorage {
    http: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            bucket: config.bucket.clone(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    fn upload_request(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> RequestBuilder {
        self.http
            .post(self.object_url(path))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("content-type", content_type)
            .header("cache-control", CACHE_CONTROL)
            .header("x-upsert", "false")
            .body(bytes)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        let size = bytes.len();
        let res = self.upload_request(path, bytes, content_type).send().await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            warn!(path, status = status.as_u16(), body = %body, "Image upload failed");
            return Err(StorageError::Http {
                status: status.as_u16(),
                body,
            });
        }

        info!(path, size, "Image uploaded");
        Ok(self.public_url(path))
    }

    async fn remove(&self, path: &str) -> Result<(), StorageError> {
        let res = self
            .http
            .delete(self.object_url(path))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(StorageError::Http {
                status: status.as_u16(),
                body,
            });
        }

        info!(path, "Image removed");
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, path)
    }
}

/// Content type detected from the leading magic bytes, if it is an accepted image
pub fn sniff_content_type(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        image::ImageFormat::Jpeg => Some("image/jpeg"),
        image::ImageFormat::Png => Some("image/png"),
        image::ImageFormat::WebP => Some("image/webp"),
        _ => None,
    }
}

/// File extension used for stored objects of `content_type`
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Check an upload against the allow-list, the size limit and its magic bytes
pub fn validate_image_upload(
    config: &StorageConfig,
    bytes: &[u8],
    content_type: &str,
) -> Result<(), StorageError> {
    if !config.allowed_content_types.iter().any(|allowed| allowed == content_type) {
        return Err(StorageError::UnsupportedType {
            content_type: content_type.to_string(),
        });
    }

    if bytes.is_empty() {
        return Err(StorageError::Empty);
    }

    let size = bytes.len() as u64;
    if size > config.max_image_size {
        return Err(StorageError::TooLarge {
            size,
            max: config.max_image_size,
        });
    }

    match sniff_content_type(bytes) {
        Some(detected) if detected == content_type => Ok(()),
        detected => {
            debug!(
                declared = content_type,
                ?detected,
                "Image content does not match declared type"
            );
            Err(StorageError::ContentMismatch {
                content_type: content_type.to_string(),
            })
        }
    }
}

/// `<unix millis>-<7 random base36 chars>.<ext>`
pub fn unique_object_name(extension: &str) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let mut rng = rand::thread_rng();
    let suffix: String = (0..OBJECT_SUFFIX_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();

    format!("{}-{}.{}", chrono::Utc::now().timestamp_millis(), suffix, extension)
}

/// Object name of a stored image, taken from its public URL
pub fn object_name_from_url(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Validate and upload an image; returns its public URL
pub async fn upload_image<S>(
    storage: &S,
    config: &StorageConfig,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<String, StorageError>
where
    S: ObjectStorage + ?Sized,
{
    validate_image_upload(config, &bytes, content_type)?;

    let extension = extension_for(content_type).ok_or_else(|| StorageError::UnsupportedType {
        content_type: content_type.to_string(),
    })?;
    let name = unique_object_name(extension);

    storage.upload(&name, bytes, content_type).await
}

/// Decode an AI-generated base64 image and upload it
pub async fn store_base64_image<S>(
    storage: &S,
    config: &StorageConfig,
    data: &str,
) -> Result<String, StorageError>
where
    S: ObjectStorage + ?Sized,
{
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|e| StorageError::InvalidBase64(e.to_string()))?;

    let content_type = sniff_content_type(&bytes).ok_or_else(|| StorageError::UnsupportedType {
        content_type: "unknown".to_string(),
    })?;

    upload_image(storage, config, bytes, content_type).await
}

/// Best-effort removal of the object behind a public URL
pub async fn remove_image_by_url<S>(storage: &S, url: &str)
where
    S: ObjectStorage + ?Sized,
{
    let Some(name) = object_name_from_url(url) else {
        warn!(url, "Could not derive object name from image URL");
        return;
    };

    if let Err(e) = storage.remove(name).await {
        warn!(url, error = %e, "Failed to remove image");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    pub const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
    pub const JPEG_HEADER: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    /// Storage keeping uploads in memory
    #[derive(Default)]
    pub struct MemoryStorage {
        pub objects: Mutex<Vec<(String, Vec<u8>, String)>>,
        pub removed: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStorage for MemoryStorage {
        async fn upload(
            &self,
            path: &str,
            bytes: Vec<u8>,
            content_type: &str,
        ) -> Result<String, StorageError> {
            self.objects
                .lock()
                .unwrap()
                .push((path.to_string(), bytes, content_type.to_string()));
            Ok(self.public_url(path))
        }

        async fn remove(&self, path: &str) -> Result<(), StorageError> {
            self.removed.lock().unwrap().push(path.to_string());
            Ok(())
        }

        fn public_url(&self, path: &str) -> String {
            format!("https://cdn.example.test/cocktail-images/{path}")
        }
    }
}

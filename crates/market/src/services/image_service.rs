//! Item image storage.
//!
//! Images live under `{item_id}/{unix_millis}.{ext}` in the configured
//! bucket. Items reference them by storage key and display them through
//! short-lived signed URLs requested on every render.

use std::sync::Arc;

use bazaar_backend::{Backend, UploadOptions};
use bazaar_config::StorageConfig;
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::types::{MarketError, MarketResult};

const ACCEPTED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
];

/// A file picked for upload
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Extension for the accepted content type, else taken from the file name.
    fn extension(&self) -> String {
        ACCEPTED_TYPES
            .iter()
            .find(|(content_type, _)| *content_type == self.content_type)
            .map(|(_, ext)| ext.to_string())
            .or_else(|| {
                self.file_name
                    .rsplit_once('.')
                    .map(|(_, ext)| ext.to_lowercase())
                    .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            })
            .unwrap_or_else(|| "bin".to_string())
    }
}

/// The image list of one item together with its main image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageSet {
    pub images: Vec<String>,
    pub main_image: Option<String>,
}

impl ImageSet {
    pub fn new(images: Vec<String>, main_image: Option<String>) -> Self {
        Self { images, main_image }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.images.iter().any(|image| image == key)
    }
}

pub struct ImageService {
    backend: Arc<dyn Backend>,
    config: StorageConfig,
}

impl ImageService {
    pub fn new(backend: Arc<dyn Backend>, config: StorageConfig) -> Self {
        Self { backend, config }
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    fn check_file(&self, file: &ImageFile) -> MarketResult<()> {
        if !ACCEPTED_TYPES
            .iter()
            .any(|(content_type, _)| *content_type == file.content_type)
        {
            return Err(MarketError::UnsupportedImageType {
                content_type: file.content_type.clone(),
            });
        }
        if file.bytes.len() > self.config.max_image_bytes {
            return Err(MarketError::ImageTooLarge {
                file_name: file.file_name.clone(),
                max_bytes: self.config.max_image_bytes,
            });
        }
        Ok(())
    }

    /// Upload `files` for `item_id` and append their keys to `current`.
    ///
    /// The whole submission is refused before any upload when it would take
    /// the item past the image limit or contains an unacceptable file.
    pub async fn upload_images(
        &self,
        item_id: &str,
        current: ImageSet,
        files: Vec<ImageFile>,
    ) -> MarketResult<ImageSet> {
        let max = self.config.max_images;
        if current.images.len() + files.len() > max {
            return Err(MarketError::TooManyImages { max });
        }
        for file in &files {
            self.check_file(file)?;
        }

        let mut set = current;
        let stamp = Utc::now().timestamp_millis();
        for (index, file) in files.into_iter().enumerate() {
            let path = format!("{item_id}/{}.{}", stamp + index as i64, file.extension());
            let options = UploadOptions::new(file.content_type.clone());
            let key = self
                .backend
                .upload(&self.config.bucket, &path, file.bytes, options)
                .await?;
            debug!(item_id, key = %key, "image uploaded");

            if set.main_image.is_none() {
                set.main_image = Some(key.clone());
            }
            set.images.push(key);
        }

        info!(item_id, count = set.images.len(), "item images updated");
        Ok(set)
    }

    /// Delete one image. When it was the main image, the first remaining one takes over.
    pub async fn remove_image(&self, mut set: ImageSet, key: &str) -> MarketResult<ImageSet> {
        if !set.contains(key) {
            return Err(MarketError::UnknownImage);
        }

        if is_remote(key) {
            debug!(key, "image is an external url, nothing to delete");
        } else {
            self.backend
                .remove(&self.config.bucket, &[key.to_string()])
                .await?;
        }

        set.images.retain(|image| image != key);
        if set.main_image.as_deref() == Some(key) {
            set.main_image = set.images.first().cloned();
        }
        Ok(set)
    }

    /// Choose the main image. Only membership in the list is checked.
    pub fn set_main_image(&self, mut set: ImageSet, key: &str) -> MarketResult<ImageSet> {
        if !set.contains(key) {
            return Err(MarketError::UnknownImage);
        }
        set.main_image = Some(key.to_string());
        Ok(set)
    }

    /// URL to render an image. External URLs pass through; storage keys are
    /// signed on every call.
    pub async fn display_url(&self, key: &str) -> MarketResult<String> {
        if is_remote(key) {
            return Ok(key.to_string());
        }
        let url = self
            .backend
            .create_signed_url(&self.config.bucket, key, self.config.signed_url_ttl_seconds)
            .await?;
        Ok(url)
    }

    /// Signed URLs for several keys; keys that fail to sign are skipped.
    pub async fn display_urls(&self, keys: &[String]) -> Vec<String> {
        let mut urls = Vec::with_capacity(keys.len());
        for key in keys {
            match self.display_url(key).await {
                Ok(url) => urls.push(url),
                Err(err) => warn!(key = %key, error = %err, "could not sign image url"),
            }
        }
        urls
    }

    /// Delete every stored image of an item. Failures are logged.
    pub async fn purge(&self, keys: &[String]) {
        let stored: Vec<String> = keys.iter().filter(|key| !is_remote(key)).cloned().collect();
        if stored.is_empty() {
            return;
        }
        if let Err(err) = self.backend.remove(&self.config.bucket, &stored).await {
            warn!(error = %err, count = stored.len(), "failed to delete item images");
        }
    }
}

fn is_remote(key: &str) -> bool {
    key.starts_with("http://") || key.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_follows_content_type() {
        let file = ImageFile::new("Photo.JPEG", "image/jpeg", Vec::<u8>::new());
        assert_eq!(file.extension(), "jpg");

        let file = ImageFile::new("upload", "image/webp", Vec::<u8>::new());
        assert_eq!(file.extension(), "webp");

        let file = ImageFile::new("photo.exe", "image/png", Vec::<u8>::new());
        assert_eq!(file.extension(), "png");
    }

    #[test]
    fn unknown_content_type_falls_back_to_file_name() {
        let file = ImageFile::new("scan.TIFF", "image/tiff", Vec::<u8>::new());
        assert_eq!(file.extension(), "tiff");

        let file = ImageFile::new("blob", "application/octet-stream", Vec::<u8>::new());
        assert_eq!(file.extension(), "bin");
    }

    #[test]
    fn remote_keys_are_detected() {
        assert!(is_remote("https://cdn.example.com/a.jpg"));
        assert!(!is_remote("item-1/123.jpg"));
    }
}

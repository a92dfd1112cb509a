//! Thumbnail fetching and downscaling.
//!
//! Thumbnails are optional: every failure here is logged and collapsed to
//! "no thumbnail" so the upload continues without one.

use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::core::config;
use crate::download::error::ThumbnailError;

/// Fetches remote thumbnails and fits them into the platform's bounding box.
#[derive(Debug, Clone)]
pub struct ThumbnailProcessor {
    client: reqwest::Client,
    max_dimension: u32,
}

impl Default for ThumbnailProcessor {
    fn default() -> Self {
        Self::new(config::thumbnail::MAX_DIMENSION)
    }
}

impl ThumbnailProcessor {
    pub fn new(max_dimension: u32) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config::thumbnail::fetch_timeout())
            .build()
            .unwrap_or_default();
        Self { client, max_dimension }
    }

    /// Downloads `url` and writes a bounded JPEG to `target`.
    ///
    /// Returns `None` on any failure.
    pub async fn process(&self, url: &str, target: &Path) -> Option<PathBuf> {
        match self.try_process(url, target).await {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Thumbnail unavailable for {}: {}", url, e);
                None
            }
        }
    }

    pub async fn try_process(&self, url: &str, target: &Path) -> Result<PathBuf, ThumbnailError> {
        let bytes = self.client.get(url).send().await?.error_for_status()?.bytes().await?;
        log::debug!("Fetched thumbnail {} ({} bytes)", url, bytes.len());

        let bound = self.max_dimension;
        let target = target.to_path_buf();
        // Decoding and resizing are CPU-bound
        tokio::task::spawn_blocking(move || write_bounded_jpeg(&bytes, bound, &target).map(|_| target))
            .await
            .map_err(|e| ThumbnailError::Io(std::io::Error::other(e)))?
    }
}

/// Scales `img` down so neither side exceeds `bound`, keeping the aspect
/// ratio. Images already within the box are returned unchanged.
pub fn fit_within(img: DynamicImage, bound: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w <= bound && h <= bound {
        return img;
    }
    img.resize(bound, bound, image::imageops::FilterType::Triangle)
}

/// Decodes `bytes`, bounds the image and saves it as JPEG at `target`.
pub fn write_bounded_jpeg(bytes: &[u8], bound: u32, target: &Path) -> Result<(u32, u32), ThumbnailError> {
    let img = image::load_from_memory(bytes)?;
    let fitted = fit_within(img, bound);
    let dims = fitted.dimensions();
    DynamicImage::ImageRgb8(fitted.to_rgb8()).save_with_format(target, ImageFormat::Jpeg)?;
    Ok(dims)
}

//! URL → image resolution with memoization.
//!
//! The [`IconResolver`] trait is the narrow contract the core consumes from
//! the external image cache: resolve a URL into a decoded image at a target
//! size. The trait is injectable so tests can substitute a deterministic
//! in-memory resolver.
//!
//! [`HttpIconResolver`] is the default implementation: a blocking reqwest
//! client driven through `spawn_blocking`, decoding via the `image` crate,
//! memoized in a moka cache keyed by `(url, width, height)`. Moka's
//! `try_get_with` coalesces concurrent lookups of the same key, so repeated
//! requests for one URL never trigger redundant fetches.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use image::imageops::FilterType;
use image::RgbaImage;
use thiserror::Error;
use tracing::debug;

/// Cache entries expire after a week, matching the disk-age policy of the
/// production image cache.
const ICON_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Small fast cache; icons are tiny and few.
const ICON_CACHE_CAPACITY: u64 = 32;

/// Errors from resolving a single icon URL.
///
/// These never escape a batch: the pipeline logs and skips the failing
/// entry. They are caller-visible only for direct single-icon lookups.
#[derive(Debug, Clone, Error)]
pub enum IconError {
    /// Network-level failure (connect, timeout, non-success status).
    #[error("http error: {0}")]
    Http(String),

    /// The payload could not be decoded as an image.
    #[error("decode error: {0}")]
    Decode(String),

    /// The background fetch task failed to run to completion.
    #[error("fetch task failed: {0}")]
    Runtime(String),
}

/// A decoded, resized icon image.
#[derive(Debug, Clone)]
pub struct IconImage {
    image: RgbaImage,
}

impl IconImage {
    /// Wrap a decoded RGBA image.
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Pixel width.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Pixel height.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw RGBA bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}

/// Contract for resolving an icon URL to an image.
///
/// Implementations must be safe to call concurrently for distinct URLs and
/// must memoize per `(url, size)` so resolution is idempotent.
pub trait IconResolver: Send + Sync {
    /// Resolve `url` to an image resized to `width`×`height`.
    fn resolve(
        &self,
        url: &str,
        width: u32,
        height: u32,
    ) -> BoxFuture<'_, Result<Arc<IconImage>, IconError>>;
}

#[derive(Clone, Hash, PartialEq, Eq)]
struct IconKey {
    url: String,
    width: u32,
    height: u32,
}

/// Default resolver: HTTP fetch, decode, resize, memoize.
pub struct HttpIconResolver {
    client: reqwest::blocking::Client,
    cache: moka::future::Cache<IconKey, Arc<IconImage>>,
}

impl HttpIconResolver {
    /// Create a resolver with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, IconError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IconError::Http(format!("failed to create http client: {e}")))?;

        let cache = moka::future::Cache::builder()
            .max_capacity(ICON_CACHE_CAPACITY)
            .time_to_live(ICON_CACHE_TTL)
            .build();

        Ok(Self { client, cache })
    }

    fn fetch_blocking(client: &reqwest::blocking::Client, url: &str) -> Result<Vec<u8>, IconError> {
        let response = client
            .get(url)
            .send()
            .map_err(|e| IconError::Http(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(IconError::Http(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| IconError::Http(format!("failed to read response: {e}")))
    }

    fn decode_and_resize(bytes: &[u8], width: u32, height: u32) -> Result<IconImage, IconError> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| IconError::Decode(e.to_string()))?
            .to_rgba8();

        let resized = if decoded.width() == width && decoded.height() == height {
            decoded
        } else {
            image::imageops::resize(&decoded, width, height, FilterType::Lanczos3)
        };

        Ok(IconImage::new(resized))
    }
}

impl IconResolver for HttpIconResolver {
    fn resolve(
        &self,
        url: &str,
        width: u32,
        height: u32,
    ) -> BoxFuture<'_, Result<Arc<IconImage>, IconError>> {
        let key = IconKey {
            url: url.to_string(),
            width,
            height,
        };

        Box::pin(async move {
            let client = self.client.clone();
            let url = key.url.clone();

            self.cache
                .try_get_with(key, async move {
                    let fetched = tokio::task::spawn_blocking(move || {
                        let bytes = Self::fetch_blocking(&client, &url)?;
                        let icon = Self::decode_and_resize(&bytes, width, height)?;
                        debug!(url = %url, width, height, "icon resolved");
                        Ok::<_, IconError>(Arc::new(icon))
                    })
                    .await
                    .map_err(|e| IconError::Runtime(e.to_string()))??;
                    Ok::<_, IconError>(fetched)
                })
                .await
                .map_err(|e: Arc<IconError>| (*e).clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_and_resize() {
        let bytes = png_bytes(64, 64);
        let icon = HttpIconResolver::decode_and_resize(&bytes, 30, 30).unwrap();
        assert_eq!(icon.width(), 30);
        assert_eq!(icon.height(), 30);
    }

    #[test]
    fn test_decode_skips_resize_when_sized() {
        let bytes = png_bytes(30, 30);
        let icon = HttpIconResolver::decode_and_resize(&bytes, 30, 30).unwrap();
        assert_eq!(icon.width(), 30);
        assert_eq!(icon.as_raw()[0], 10);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let err = HttpIconResolver::decode_and_resize(b"not an image", 30, 30).unwrap_err();
        assert!(matches!(err, IconError::Decode(_)));
    }

    #[test]
    fn test_icon_error_display() {
        let err = IconError::Http("HTTP 404 from x".to_string());
        assert!(err.to_string().contains("404"));
    }
}

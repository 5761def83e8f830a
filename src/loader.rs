//! Image-load primitive used by the resolver.
//!
//! The resolver only depends on the [`ImageLoader`] contract: fetch a URL,
//! decode it as an image, and report its pixel size or an
//! [`AttemptError`]. [`HttpImageLoader`] is the production implementation;
//! tests inject stubs.
//!
//! # Cross-origin mode
//!
//! Some hosts are requested in anonymous cross-origin mode. The loader then
//! sends an `Origin` header and requires an `Access-Control-Allow-Origin`
//! response that admits it. A host that does not answer with one fails the
//! attempt, which is why the host table only enables the mode for hosts
//! known to support it.

use std::io::Cursor;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN};

use crate::config::LoaderConfig;
use crate::error::AttemptError;
use crate::models::Dimensions;

/// Per-attempt request options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub timeout: Duration,
    pub cross_origin: bool,
}

/// Fetch-and-decode primitive.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    /// Load `url` and return the decoded image size.
    ///
    /// Implementations should honour `options.timeout`, but the resolver
    /// enforces it independently.
    async fn attempt_load(&self, url: &str, options: LoadOptions)
        -> Result<Dimensions, AttemptError>;
}

/// Loads covers over HTTPS with `reqwest` and decodes them with `image`.
pub struct HttpImageLoader {
    client: reqwest::Client,
    origin: String,
    max_bytes: usize,
}

impl HttpImageLoader {
    pub fn new(config: &LoaderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            client,
            origin: config.origin.clone(),
            max_bytes: config.max_bytes,
        })
    }

    async fn fetch_and_decode(
        &self,
        url: &str,
        cross_origin: bool,
    ) -> Result<Dimensions, AttemptError> {
        let mut request = self.client.get(url);
        if cross_origin {
            request = request.header(ORIGIN, self.origin.as_str());
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| AttemptError::fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AttemptError::fetch(format!("HTTP {}", status)));
        }

        if cross_origin && !allows_origin(response.headers(), &self.origin) {
            return Err(AttemptError::fetch(
                "cross-origin response without a matching Access-Control-Allow-Origin",
            ));
        }

        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(AttemptError::fetch(format!(
                    "body of {} bytes exceeds limit of {}",
                    len, self.max_bytes
                )));
            }
        }

        // Content-Length is absent on chunked responses; cap while reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AttemptError::fetch(e.to_string()))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(AttemptError::fetch(format!(
                    "body exceeds limit of {} bytes",
                    self.max_bytes
                )));
            }
            bytes.extend_from_slice(&chunk);
        }
        if bytes.is_empty() {
            return Err(AttemptError::decode("empty body"));
        }

        tokio::task::spawn_blocking(move || decode_dimensions(&bytes))
            .await
            .map_err(|e| AttemptError::decode(format!("decode task failed: {}", e)))?
    }
}

#[async_trait]
impl ImageLoader for HttpImageLoader {
    async fn attempt_load(
        &self,
        url: &str,
        options: LoadOptions,
    ) -> Result<Dimensions, AttemptError> {
        match tokio::time::timeout(options.timeout, self.fetch_and_decode(url, options.cross_origin))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(AttemptError::Timeout {
                timeout_ms: options.timeout.as_millis() as u64,
            }),
        }
    }
}

/// Fully decode `bytes` and return the image size.
pub fn decode_dimensions(bytes: &[u8]) -> Result<Dimensions, AttemptError> {
    let image = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| AttemptError::decode(e.to_string()))?
        .decode()
        .map_err(|e| AttemptError::decode(e.to_string()))?;
    Ok(Dimensions {
        width: image.width(),
        height: image.height(),
    })
}

fn allows_origin(headers: &HeaderMap, origin: &str) -> bool {
    headers
        .get(ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "*" || v.trim().eq_ignore_ascii_case(origin))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_dimensions() {
        let dims = decode_dimensions(&png(40, 60)).unwrap();
        assert_eq!(dims, Dimensions { width: 40, height: 60 });
    }

    #[test]
    fn test_decode_rejects_non_images() {
        let err = decode_dimensions(b"<html>Access Denied</html>").unwrap_err();
        assert!(matches!(err, AttemptError::DecodeFailure { .. }));
    }

    #[test]
    fn test_decode_rejects_truncated_image() {
        let bytes = png(40, 60);
        let err = decode_dimensions(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, AttemptError::DecodeFailure { .. }));
    }

    #[test]
    fn test_allows_origin() {
        let mut headers = HeaderMap::new();
        assert!(!allows_origin(&headers, "https://libflix.app"));
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        assert!(allows_origin(&headers, "https://libflix.app"));
        headers.insert(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("https://other.example"),
        );
        assert!(!allows_origin(&headers, "https://libflix.app"));
    }
}

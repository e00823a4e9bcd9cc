//! Remote image fetching

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::Url;

/// Source of remote image bytes
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Download the image behind `url`.
    ///
    /// Invalid URLs, non-success responses and transport errors are errors;
    /// an empty body is returned as an empty vector.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Whether `s` is an absolute http(s) URL with a host, as opposed to a local path
pub fn is_fetchable_url(s: &str) -> bool {
    match Url::parse(s.trim()) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https")
                && url.host_str().is_some_and(|host| !host.is_empty())
        }
        Err(_) => false,
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    pub max_bytes: usize,
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_bytes: 20 * 1024 * 1024,
            user_agent: format!("cities/{} (image cache)", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// `ImageFetcher` over HTTP(S) with a bounded timeout and payload size
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(options: FetchOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(options.user_agent)
            .timeout(options.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_bytes: options.max_bytes,
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if !is_fetchable_url(url) {
            bail!("Not a fetchable URL: {}", url);
        }

        let mut response = self
            .client
            .get(url.trim())
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", url))?;

        if !response.status().is_success() {
            bail!("HTTP error {}: {}", response.status().as_u16(), url);
        }

        if let Some(length) = response.content_length()
            && length > self.max_bytes as u64
        {
            bail!(
                "Image at {} is {} bytes, limit is {}",
                url,
                length,
                self.max_bytes
            );
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Failed while reading bytes from {}", url))?
        {
            if body.len() + chunk.len() > self.max_bytes {
                bail!("Image at {} exceeds {} bytes", url, self.max_bytes);
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

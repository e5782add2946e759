//! Source archive downloads
//!
//! Archives are streamed to `<dest>.part`, hashed on the way, and renamed
//! into place only once the body is complete. Transient failures (connection
//! errors, 5xx, 429) are retried with exponential backoff; anything else fails
//! on the first attempt.

use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::defaults;
use crate::error::DownloadError;

/// How often and how patiently a download is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Delay before the second attempt; doubled after each failure
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A single attempt with no waiting
    pub fn once() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay after the `failed`-th failed attempt (1-based)
    pub fn delay_after(&self, failed: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: defaults::MAX_DOWNLOAD_RETRIES,
            base_delay: Duration::from_millis(defaults::DOWNLOAD_RETRY_DELAY_MS),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// A completed download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub path: PathBuf,
    pub bytes: u64,
    /// Lowercase hex SHA-256 of the body
    pub sha256: String,
}

/// HTTP downloader shared by all archive stages
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl DownloadManager {
    pub fn new() -> Self {
        Self::with_retry(RetryPolicy::default())
    }

    pub fn with_retry(retry: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("ffstack/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .timeout(Duration::from_secs(600))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, retry }
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Download `url` to `dest`
    ///
    /// On failure neither `dest` nor the partial file is left behind.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<Fetched, DownloadError> {
        let part = partial_path(dest);
        let mut attempt = 1;

        loop {
            match self.stream_to(url, &part).await {
                Ok((bytes, sha256)) => {
                    tokio::fs::rename(&part, dest)
                        .await
                        .map_err(|e| io_failure(dest, &e))?;
                    return Ok(Fetched {
                        path: dest.to_path_buf(),
                        bytes,
                        sha256,
                    });
                }
                Err(err) if err.is_transient() && attempt < self.retry.attempts => {
                    let delay = self.retry.delay_after(attempt);
                    debug!("attempt {attempt} for {url} failed ({err}), retrying in {delay:?}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    let _ = tokio::fs::remove_file(&part).await;
                    return Err(err);
                }
            }
        }
    }

    /// One GET, streamed into `part`; returns size and digest
    async fn stream_to(&self, url: &str, part: &Path) -> Result<(u64, String), DownloadError> {
        let network = |e: reqwest::Error| DownloadError::NetworkError {
            url: url.to_string(),
            error: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = part.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_failure(parent, &e))?;
        }
        let mut file = tokio::fs::File::create(part)
            .await
            .map_err(|e| io_failure(part, &e))?;

        let mut hasher = Sha256::new();
        let mut bytes = 0u64;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(network)?;
            hasher.update(&chunk);
            bytes += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| io_failure(part, &e))?;
        }
        file.flush().await.map_err(|e| io_failure(part, &e))?;

        Ok((bytes, hex::encode(hasher.finalize())))
    }
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::new()
    }
}

fn io_failure(path: &Path, e: &io::Error) -> DownloadError {
    DownloadError::IoError {
        path: path.to_path_buf(),
        error: e.to_string(),
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// SHA-256 of a file as lowercase hex, streamed from disk
pub fn file_digest(path: &Path) -> Result<String, DownloadError> {
    let mut file = fs::File::open(path).map_err(|e| io_failure(path, &e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| io_failure(path, &e))?;
    Ok(hex::encode(hasher.finalize()))
}

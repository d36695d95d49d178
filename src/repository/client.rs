// src/repository/client.rs

//! Channel transport
//!
//! `ChannelClient` is the default `Transport`: HTTP(S) through a blocking
//! reqwest client with retry, and `file://` URLs or plain paths copied from
//! local disk.

use crate::download::Transport;
use crate::error::{Error, Result};
use crate::packages::PackageRecord;
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

const CHUNK_SIZE: usize = 64 * 1024;

/// Where a record's archive comes from
///
/// The record's own `url` wins; otherwise the archive name is appended to
/// its channel.
pub fn resolve_url(record: &PackageRecord) -> Result<String> {
    if let Some(url) = &record.url {
        return Ok(url.clone());
    }

    match &record.channel {
        Some(channel) => Ok(format!(
            "{}/{}",
            channel.trim_end_matches('/'),
            record.archive_name()
        )),
        None => Err(Error::DownloadError(format!(
            "No URL or channel known for {}",
            record
        ))),
    }
}

/// HTTP client wrapper with retry support
pub struct ChannelClient {
    client: Client,
    max_retries: u32,
}

impl ChannelClient {
    /// Create a new channel client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Download `url` to `dest`, reporting the fraction of bytes written
    pub fn download_file(&self, url: &str, dest: &Path, progress: &dyn Fn(f64)) -> Result<()> {
        if let Some(path) = local_path(url) {
            return copy_local(&path, dest, progress);
        }

        info!("Downloading {}", url);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }

                    let total = response.content_length();
                    return write_stream(response, total, dest, progress);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to download {} after {} attempts: {}",
                            url, attempt, e
                        )));
                    }
                    warn!("Download attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

impl Transport for ChannelClient {
    fn fetch(&self, record: &PackageRecord, dest: &Path, progress: &dyn Fn(f64)) -> Result<()> {
        let url = resolve_url(record)?;
        self.download_file(&url, dest, progress)?;

        if let Some(expected) = &record.sha256 {
            verify_checksum(dest, expected)?;
        }
        Ok(())
    }
}

/// `file://` URLs and anything without a scheme are read from disk
fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.contains("://") {
        return None;
    }
    Some(PathBuf::from(url))
}

fn copy_local(source: &Path, dest: &Path, progress: &dyn Fn(f64)) -> Result<()> {
    debug!("Copying {} from local disk", source.display());

    let file = File::open(source)
        .map_err(|e| Error::DownloadError(format!("Failed to open {}: {}", source.display(), e)))?;
    let total = file.metadata().ok().map(|m| m.len());

    write_stream(file, total, dest, progress)
}

fn write_stream<R: Read>(
    mut reader: R,
    total: Option<u64>,
    dest: &Path,
    progress: &dyn Fn(f64),
) -> Result<()> {
    let mut file = File::create(dest)
        .map_err(|e| Error::IoError(format!("Failed to create file {}: {}", dest.display(), e)))?;

    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;

    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| Error::DownloadError(format!("Failed to read download stream: {}", e)))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .map_err(|e| Error::IoError(format!("Failed to write downloaded data: {}", e)))?;
        written += n as u64;

        if let Some(total) = total.filter(|t| *t > 0) {
            progress((written as f64 / total as f64).min(1.0));
        }
    }

    file.sync_all()?;
    debug!("Wrote {} bytes to {}", written, dest.display());
    Ok(())
}

/// Verify file checksum matches expected value
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    debug!("Verifying checksum for {}", path.display());

    let mut file = File::open(path)
        .map_err(|e| Error::IoError(format!("Failed to open file for checksum: {}", e)))?;

    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| Error::IoError(format!("Failed to read file for checksum: {}", e)))?;

    let actual = format!("{:x}", hasher.finalize());

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    debug!("Checksum verified: {}", expected);
    Ok(())
}

use async_trait::async_trait;
use log::{debug, trace, warn};
use reqwest::{Client, StatusCode};
use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::ReadAt;
use anyhow::{Result, anyhow, bail};

/// Smallest span fetched per request.
///
/// Header walks read 512 bytes at a time; fetching a wider window lets
/// consecutive small entries share one round trip.
const READ_AHEAD: u64 = 64 * 1024;

/// Last window fetched from the server.
struct Window {
    start: u64,
    data: Vec<u8>,
}

impl Window {
    /// Copy the part of `[offset, offset + buf.len())` this window holds,
    /// if it holds the start of it.
    fn copy_to(&self, offset: u64, buf: &mut [u8]) -> Option<usize> {
        let end = self.start + self.data.len() as u64;
        if offset < self.start || offset >= end {
            return None;
        }
        let from = (offset - self.start) as usize;
        let n = buf.len().min(self.data.len() - from);
        buf[..n].copy_from_slice(&self.data[from..from + n]);
        Some(n)
    }
}

/// Tar archive served over HTTP, read with Range requests
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    window: Mutex<Option<Window>>,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpRangeReader {
    /// Probe `url` with a HEAD request.
    ///
    /// Fails unless the server advertises byte ranges and a Content-Length.
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let resp = client.head(&url).send().await?;
        if !resp.status().is_success() {
            bail!("HEAD {} failed with status: {}", url, resp.status());
        }

        let ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");
        if !ranges.contains("bytes") {
            bail!("{} does not accept byte Range requests", url);
        }

        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("{} did not report a Content-Length", url))?;
        debug!("remote archive {} is {} bytes", url, size);

        Ok(Self {
            client,
            url,
            size,
            window: Mutex::new(None),
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Fetch `[start, end]` inclusive, retrying connection failures.
    async fn fetch(&self, start: u64, end: u64) -> io::Result<Vec<u8>> {
        let range = format!("bytes={}-{}", start, end);
        let mut attempt = 0;

        loop {
            match self.client.get(&self.url).header("Range", &range).send().await {
                Ok(resp) if resp.status() == StatusCode::PARTIAL_CONTENT => {
                    let body = resp.bytes().await.map_err(io::Error::other)?;
                    self.transferred_bytes
                        .fetch_add(body.len() as u64, Ordering::Relaxed);
                    trace!("fetched {} bytes at {}", body.len(), start);
                    return Ok(body.to_vec());
                }
                Ok(resp) => {
                    return Err(io::Error::other(format!(
                        "Range request {} answered with status: {}",
                        range,
                        resp.status()
                    )));
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    attempt += 1;
                    if attempt >= self.max_retry {
                        return Err(io::Error::new(io::ErrorKind::TimedOut, e));
                    }
                    warn!("connection error, retry {}/{}: {}", attempt, self.max_retry, e);
                    tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
                }
                Err(e) => return Err(io::Error::other(e)),
            }
        }
    }

    fn cached(&self, offset: u64, buf: &mut [u8]) -> Option<usize> {
        let window = self.window.lock().ok()?;
        window.as_ref()?.copy_to(offset, buf)
    }
}

#[async_trait]
impl ReadAt for HttpRangeReader {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || offset >= self.size {
            return Ok(0);
        }
        if let Some(n) = self.cached(offset, buf) {
            return Ok(n);
        }

        let span = (buf.len() as u64).max(READ_AHEAD);
        let end = (offset + span - 1).min(self.size - 1);
        let data = self.fetch(offset, end).await?;

        let window = Window {
            start: offset,
            data,
        };
        let n = window.copy_to(offset, buf).unwrap_or(0);
        if let Ok(mut slot) = self.window.lock() {
            *slot = Some(window);
        }
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

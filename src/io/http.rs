use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::{info, warn};

use super::{Volume, VolumeSource};
use anyhow::{Result, bail};

/// Opens volumes with a streaming HTTP GET
pub struct HttpSource {
    client: Client,
    max_retry: u32,
}

impl HttpSource {
    /// Create a source that retries a failed open up to `max_retry` times.
    ///
    /// Retries only happen before any byte of the volume has been handed
    /// out; a failure while reading the body is always final.
    pub fn new(max_retry: u32) -> Result<Self> {
        // no total timeout, volumes can stream for hours
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .read_timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self { client, max_retry })
    }
}

struct HttpVolume {
    response: Response,
    pending: Bytes,
    /// Taken at open; the response's own hint shrinks as the body is read
    content_length: Option<u64>,
}

#[async_trait]
impl Volume for HttpVolume {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        while self.pending.is_empty() {
            match self.response.chunk().await? {
                Some(chunk) => self.pending = chunk,
                None => return Ok(0),
            }
        }

        let n = buf.len().min(self.pending.len());
        let chunk = self.pending.split_to(n);
        buf[..n].copy_from_slice(&chunk);
        Ok(n)
    }

    fn content_length(&self) -> Option<u64> {
        self.content_length
    }
}

#[async_trait]
impl VolumeSource for HttpSource {
    async fn open(&self, locator: &str) -> Result<Box<dyn Volume>> {
        let mut retry_count = 0;

        loop {
            let result = self.client.get(locator).send().await;

            let reason = match result {
                Ok(resp) if resp.status().is_success() => {
                    let content_length = resp.content_length();
                    info!(url = locator, content_length = ?content_length, "Volume opened");
                    return Ok(Box::new(HttpVolume {
                        response: resp,
                        pending: Bytes::new(),
                        content_length,
                    }));
                }
                Ok(resp) if resp.status().is_server_error() => {
                    format!("HTTP status {}", resp.status())
                }
                Ok(resp) => bail!("HTTP request failed with status: {}", resp.status()),
                Err(e) if e.is_timeout() || e.is_connect() => e.to_string(),
                Err(e) => return Err(e.into()),
            };

            retry_count += 1;
            if retry_count > self.max_retry {
                bail!("Max retries exceeded opening {locator}: {reason}");
            }
            warn!(
                url = locator,
                "Open failed, retry {}/{}: {}", retry_count, self.max_retry, reason
            );
            tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
        }
    }
}

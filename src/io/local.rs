use super::{Volume, VolumeSource};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::AsyncReadExt;

/// Opens volumes from the local filesystem
pub struct LocalFileSource;

struct LocalVolume {
    file: File,
    len: u64,
}

#[async_trait]
impl Volume for LocalVolume {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.file.read(buf).await?)
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.len)
    }
}

#[async_trait]
impl VolumeSource for LocalFileSource {
    async fn open(&self, locator: &str) -> Result<Box<dyn Volume>> {
        let file = File::open(locator)
            .await
            .with_context(|| format!("cannot open {locator}"))?;
        let len = file.metadata().await?.len();
        Ok(Box::new(LocalVolume { file, len }))
    }
}

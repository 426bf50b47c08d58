//! Where the ordered volume list comes from.

mod hyp;

pub use hyp::{Channel, Game, HypResolver};

use anyhow::{Result, bail};
use async_trait::async_trait;

/// Supplies the ordered list of volume locators for a run.
#[async_trait]
pub trait VolumeResolver: Send + Sync {
    async fn resolve(&self) -> Result<Vec<String>>;
}

/// A locator list given up front, e.g. on the command line.
pub struct StaticResolver {
    locators: Vec<String>,
}

impl StaticResolver {
    pub fn new(locators: Vec<String>) -> Self {
        Self { locators }
    }
}

#[async_trait]
impl VolumeResolver for StaticResolver {
    async fn resolve(&self) -> Result<Vec<String>> {
        if self.locators.is_empty() {
            bail!("No volumes given");
        }
        Ok(self.locators.clone())
    }
}

/// 7z packages (`.7z`, `.7z.001`, ...) share distribution channels with the
/// ZIP ones but cannot be streamed by this reader.
pub fn is_7z_locator(locator: &str) -> bool {
    let path = locator.split(['?', '#']).next().unwrap_or(locator);
    if path.ends_with(".7z") {
        return true;
    }
    match path.rsplit_once('.') {
        Some((stem, ext)) => {
            ext.len() == 3 && ext.bytes().all(|b| b.is_ascii_digit()) && stem.ends_with(".7z")
        }
        None => false,
    }
}

/// Refuse the run before any volume is opened if a locator is not ZIP.
pub fn reject_unsupported_locators(locators: &[String]) -> Result<()> {
    if let Some(bad) = locators.iter().find(|l| is_7z_locator(l)) {
        bail!("7z archives are not supported: {bad}");
    }
    Ok(())
}

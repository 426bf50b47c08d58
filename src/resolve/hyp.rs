//! Launcher package API lookup: game + channel to the ordered package URLs.

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use clap::ValueEnum;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use super::VolumeResolver;

const API_URL: &str = "https://hyp-api.mihoyo.com/hyp/hyp-connect/api/getGamePackages";
const LAUNCHER_ID: &str = "jGHBHlcOq1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Game {
    Genshin,
    Zzz,
    Bh3,
    Sr,
}

impl Game {
    pub fn game_id(&self) -> &'static str {
        match self {
            Game::Bh3 => "osvnlOc0S8",
            Game::Genshin => "1Z8W5NHUQb",
            Game::Sr => "64kMb5iAWu",
            Game::Zzz => "x6znKlJ0xK",
        }
    }
}

/// Full install package or the latest incremental patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Channel {
    #[default]
    Major,
    Patch,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    message: String,
    data: Option<PackagesData>,
}

#[derive(Debug, Deserialize)]
struct PackagesData {
    game_packages: Vec<GamePackage>,
}

#[derive(Debug, Deserialize)]
struct GamePackage {
    main: MainPackage,
}

#[derive(Debug, Deserialize)]
struct MainPackage {
    major: Option<PackageSet>,
    #[serde(default)]
    patches: Vec<PackageSet>,
}

#[derive(Debug, Deserialize)]
struct PackageSet {
    game_pkgs: Vec<PackageFile>,
}

#[derive(Debug, Deserialize)]
struct PackageFile {
    url: String,
}

/// Resolves volumes through the launcher's `getGamePackages` endpoint.
pub struct HypResolver {
    client: Client,
    game: Game,
    channel: Channel,
}

impl HypResolver {
    pub fn new(game: Game, channel: Channel) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self {
            client,
            game,
            channel,
        })
    }
}

#[async_trait]
impl VolumeResolver for HypResolver {
    async fn resolve(&self) -> Result<Vec<String>> {
        let resp = self
            .client
            .get(API_URL)
            .query(&[("game_ids[]", self.game.game_id()), ("launcher_id", LAUNCHER_ID)])
            .send()
            .await?
            .error_for_status()?;

        let body: ApiResponse = resp
            .json()
            .await
            .context("Unexpected package API response")?;

        let urls = select_urls(body, self.channel)?;
        info!(game = ?self.game, channel = ?self.channel, volumes = urls.len(), "Resolved package volumes");
        Ok(urls)
    }
}

fn select_urls(body: ApiResponse, channel: Channel) -> Result<Vec<String>> {
    if body.retcode != 0 {
        bail!("Package API error {}: {}", body.retcode, body.message);
    }

    let main = body
        .data
        .and_then(|d| d.game_packages.into_iter().next())
        .map(|p| p.main)
        .ok_or_else(|| anyhow!("Package API returned no game packages"))?;

    // TODO: let the caller pick an older patch once the API exposes the version it patches from
    let set = match channel {
        Channel::Major => main.major,
        Channel::Patch => main.patches.into_iter().next(),
    }
    .ok_or_else(|| anyhow!("No {channel:?} package available"))?;

    if set.game_pkgs.is_empty() {
        bail!("{channel:?} package lists no volumes");
    }
    Ok(set.game_pkgs.into_iter().map(|p| p.url).collect())
}

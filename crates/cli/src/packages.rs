//! GitHub release packages
//!
//! `owner/repo[@tag]` is looked up through the releases API and unpacked
//! into `<cache>/<owner>/<repo>/<tag>/`. Pinned tags that are already cached
//! never touch the network; `latest` is always re-checked so a new release
//! is picked up on the next resolve.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tether_core::PackageKind;
use tether_project::{PackageRef, PackageResolver};
use tracing::{debug, info};

pub const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    zipball_url: String,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
    browser_download_url: String,
}

pub struct GitHubPackages {
    cache: PathBuf,
    api: String,
    client: OnceLock<reqwest::blocking::Client>,
}

impl GitHubPackages {
    pub fn new(cache: &Path) -> Self {
        Self::with_api(cache, GITHUB_API)
    }

    /// Resolver talking to another API host
    pub fn with_api(cache: &Path, api: &str) -> Self {
        Self {
            cache: cache.to_path_buf(),
            api: api.trim_end_matches('/').to_string(),
            client: OnceLock::new(),
        }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("tether/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(self.client.get_or_init(|| client))
    }

    fn release_dir(&self, package: &PackageRef, tag: &str) -> PathBuf {
        self.cache.join(&package.owner).join(&package.repo).join(tag)
    }

    fn fetch_release(&self, package: &PackageRef) -> Result<Release> {
        let url = match &package.tag {
            Some(tag) => format!("{}/repos/{}/{}/releases/tags/{}", self.api, package.owner, package.repo, tag),
            None => format!("{}/repos/{}/{}/releases/latest", self.api, package.owner, package.repo),
        };
        debug!("Fetching release {}", url);
        self.client()?
            .get(&url)
            .send()
            .and_then(|response| response.error_for_status())
            .with_context(|| format!("Failed to fetch release {}", package))?
            .json()
            .with_context(|| format!("Invalid release response for {}", package))
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .client()?
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.bytes())
            .with_context(|| format!("Failed to download {}", url))?;
        Ok(bytes.to_vec())
    }

    /// Download a release into its cache directory, replacing any partial copy
    fn install(&self, package: &PackageRef, release: &Release, dir: &Path) -> Result<PathBuf> {
        let (name, url) = select_download(release, package.kind)?;
        info!("Downloading {} ({})", package, name);
        let bytes = self.download(&url)?;

        let staging = self.release_dir(package, &format!("{}.partial", release.tag_name));
        if staging.exists() {
            fs::remove_dir_all(&staging).with_context(|| format!("Failed to clear {}", staging.display()))?;
        }
        fs::create_dir_all(&staging).with_context(|| format!("Failed to create {}", staging.display()))?;

        match package.kind {
            PackageKind::Repo | PackageKind::Zip => unpack(&bytes, &staging)?,
            _ => fs::write(staging.join(&name), &bytes)
                .with_context(|| format!("Failed to store {}", name))?,
        }

        if dir.exists() {
            fs::remove_dir_all(dir).with_context(|| format!("Failed to clear {}", dir.display()))?;
        }
        fs::rename(&staging, dir).with_context(|| format!("Failed to install {}", dir.display()))?;

        cached_asset(dir, package.kind).ok_or_else(|| anyhow!("{} has no {} asset", package, kind_name(package.kind)))
    }
}

impl PackageResolver for GitHubPackages {
    fn resolve(&self, package: &PackageRef) -> Result<PathBuf> {
        if let Some(tag) = &package.tag {
            if let Some(cached) = cached_asset(&self.release_dir(package, tag), package.kind) {
                debug!("Using cached {}", package);
                return Ok(cached);
            }
        }

        let release = self.fetch_release(package)?;
        let dir = self.release_dir(package, &release.tag_name);
        if let Some(cached) = cached_asset(&dir, package.kind) {
            debug!("{} is up to date ({})", package, release.tag_name);
            return Ok(cached);
        }
        self.install(package, &release, &dir)
    }
}

fn kind_name(kind: PackageKind) -> &'static str {
    match kind {
        PackageKind::Repo => "source",
        PackageKind::Zip => "zip",
        PackageKind::Lua => "lua",
        PackageKind::Luau => "luau",
        PackageKind::Rbxm => "rbxm",
        PackageKind::Rbxmx => "rbxmx",
    }
}

/// File name and URL to download for a release
fn select_download(release: &Release, kind: PackageKind) -> Result<(String, String)> {
    if kind == PackageKind::Repo {
        return Ok((format!("{}.zip", release.tag_name), release.zipball_url.clone()));
    }

    let suffix = format!(".{}", kind.extension());
    release
        .assets
        .iter()
        .find(|asset| asset.name.to_ascii_lowercase().ends_with(&suffix))
        .map(|asset| (asset.name.clone(), asset.browser_download_url.clone()))
        .ok_or_else(|| anyhow!("Release {} has no {} asset", release.tag_name, suffix))
}

/// Installed asset path inside a release directory, if present
fn cached_asset(dir: &Path, kind: PackageKind) -> Option<PathBuf> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .collect();
    entries.sort();

    match kind {
        PackageKind::Repo | PackageKind::Zip => {
            if entries.is_empty() {
                return None;
            }
            Some(single_top_level(dir, &entries))
        }
        _ => {
            let suffix = format!(".{}", kind.extension());
            entries.into_iter().find(|entry| {
                entry.is_file()
                    && entry
                        .file_name()
                        .is_some_and(|name| name.to_string_lossy().to_ascii_lowercase().ends_with(&suffix))
            })
        }
    }
}

/// Archives wrapping everything in one directory resolve to that directory
fn single_top_level(dir: &Path, entries: &[PathBuf]) -> PathBuf {
    match entries {
        [only] if only.is_dir() => only.clone(),
        _ => dir.to_path_buf(),
    }
}

/// Extract a zip archive, refusing entries that escape `dest`
fn unpack(bytes: &[u8], dest: &Path) -> Result<()> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("Invalid zip archive")?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).context("Invalid zip entry")?;
        let Some(relative) = file.enclosed_name() else {
            bail!("Zip entry escapes the archive: {}", file.name());
        };
        let target = dest.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target).with_context(|| format!("Failed to create {}", target.display()))?;
        io::copy(&mut file, &mut out)?;
    }
    Ok(())
}

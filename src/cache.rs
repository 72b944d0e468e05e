//! Artifact cache: downloads each artifact once into a directory.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::config::DependencyConfig;
use crate::error::{DependencyError, Result};
use crate::manifest::ArtifactMap;

/// Suffix of in-progress downloads; never matches an artifact extension.
const PARTIAL_SUFFIX: &str = ".part";

/// Result of a single `ensure` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// File already present, nothing fetched
    Hit,
    /// File fetched from its URL
    Downloaded {
        /// Bytes written
        bytes: u64,
    },
}

/// Summary of an `ensure_all` batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheReport {
    pub hits: usize,
    pub downloaded: usize,
    pub bytes: u64,
}

/// Directory of downloaded artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
    dir: PathBuf,
    client: reqwest::Client,
}

impl ArtifactCache {
    /// Create a cache for `config.libs_dir()` with a client honoring the
    /// configured timeout and user agent.
    pub fn new(config: &DependencyConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(timeout) = config.download_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DependencyError::Io(std::io::Error::other(e)))?;

        Ok(Self::with_client(config.libs_dir(), client))
    }

    /// Create a cache using an existing HTTP client.
    pub fn with_client(dir: impl Into<PathBuf>, client: reqwest::Client) -> Self {
        Self {
            dir: dir.into(),
            client,
        }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Make sure `dir/name` exists, downloading it from `url` if absent.
    ///
    /// Presence of the file is the only cache check; its content is never
    /// compared against the remote.
    pub async fn ensure(&self, name: &str, url: &str) -> Result<CacheOutcome> {
        if !self.dir.is_dir() {
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(|source| DependencyError::DirectoryCreation {
                    path: self.dir.clone(),
                    source,
                })?;
        }

        let target = self.dir.join(name);
        if tokio::fs::try_exists(&target).await? {
            tracing::debug!("Dependency {} already cached", name);
            return Ok(CacheOutcome::Hit);
        }

        tracing::info!("Downloading dependency {} from {}", name, url);

        let bytes = self.download(name, url, &target).await?;
        tracing::info!("Downloaded dependency {} ({} bytes)", name, bytes);
        Ok(CacheOutcome::Downloaded { bytes })
    }

    /// Fetch `url` into `target` through a partial file in the cache directory.
    async fn download(&self, name: &str, url: &str, target: &Path) -> Result<u64> {
        let partial = self
            .dir
            .join(format!(".{}.{}{}", name, std::process::id(), PARTIAL_SUFFIX));
        let result = self.fetch(name, url, &partial, target).await;

        // The link (or the failure) leaves the partial file behind either way.
        if let Err(e) = tokio::fs::remove_file(&partial).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove partial download {:?}: {}", partial, e);
            }
        }

        result
    }

    /// Remove partial downloads left behind by interrupted runs.
    async fn sweep_partials(&self) -> Result<()> {
        if !self.dir.is_dir() {
            return Ok(());
        }

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !file_name.starts_with('.') || !file_name.ends_with(PARTIAL_SUFFIX) {
                continue;
            }

            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => tracing::debug!("Removed stale partial download {}", file_name),
                Err(e) => tracing::warn!("Failed to remove {}: {}", file_name, e),
            }
        }

        Ok(())
    }

    async fn fetch(&self, name: &str, url: &str, partial: &Path, target: &Path) -> Result<u64> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| DependencyError::download(name, e))?;

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|e| DependencyError::download(name, e))?;

        let mut bytes = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DependencyError::download(name, e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| DependencyError::download(name, e))?;
            bytes += chunk.len() as u64;
        }

        file.flush()
            .await
            .map_err(|e| DependencyError::download(name, e))?;
        file.sync_all()
            .await
            .map_err(|e| DependencyError::download(name, e))?;
        drop(file);

        // Linking refuses to replace an existing file, so a concurrent writer
        // that finished first surfaces as an error instead of a clobber.
        tokio::fs::hard_link(partial, target)
            .await
            .map_err(|e| DependencyError::download(name, e))?;

        Ok(bytes)
    }

    /// Ensure every artifact in the map, in map order. Stops at the first failure;
    /// artifacts fetched before it stay cached.
    pub async fn ensure_all(&self, artifacts: &ArtifactMap) -> Result<CacheReport> {
        let mut report = CacheReport::default();
        self.sweep_partials().await?;

        for (name, url) in artifacts.iter() {
            match self.ensure(name, url).await? {
                CacheOutcome::Hit => report.hits += 1,
                CacheOutcome::Downloaded { bytes } => {
                    report.downloaded += 1;
                    report.bytes += bytes;
                }
            }
        }

        Ok(report)
    }
}

//! Dependency loading pipeline: manifest, cache, resolver chain.

use std::io::Read;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::ArtifactCache;
use crate::config::DependencyConfig;
use crate::context::ResolutionContext;
use crate::error::Result;
use crate::loader::{extend_with, ArtifactLoader, NativeLoader};
use crate::manifest::load_manifest;
use crate::resolver::SymbolResolver;

/// Progress of a dependency load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing done yet
    Uninitialized,
    /// Manifest parsed
    ManifestLoaded {
        /// Number of distinct artifacts
        artifacts: usize,
    },
    /// Every artifact present on disk
    ArtifactsCached,
    /// Resolver chain built over the cache
    ContextExtended,
    /// Finished successfully
    Ready,
    /// Stopped at an error
    Failed {
        /// Error message
        error: String,
    },
}

impl LoadState {
    /// Check if loading finished successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self, LoadState::Ready)
    }

    /// Check if loading failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, LoadState::Failed { .. })
    }
}

/// Downloads the manifest's artifacts and chains them into a resolver.
pub struct DependencyLoader {
    config: DependencyConfig,
    cache: ArtifactCache,
    loader: Box<dyn ArtifactLoader>,
    state: LoadState,
}

impl DependencyLoader {
    /// Create a loader for native libraries cached under `config.libs_dir()`.
    pub fn new(config: DependencyConfig) -> Result<Self> {
        let cache = ArtifactCache::new(&config)?;
        let loader = Box::new(NativeLoader::new(config.artifact_extensions.clone()));

        Ok(Self {
            config,
            cache,
            loader,
            state: LoadState::Uninitialized,
        })
    }

    /// Use a custom HTTP client for downloads.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.cache = ArtifactCache::with_client(self.config.libs_dir(), client);
        self
    }

    /// Use a custom artifact loader.
    pub fn with_loader(mut self, loader: impl ArtifactLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    /// Current state.
    pub fn state(&self) -> &LoadState {
        &self.state
    }

    /// Load every dependency in `manifest` and return `base` extended with them.
    ///
    /// `manifest` is the bundled manifest stream, `None` if the resource is
    /// missing. Any failure stops the pipeline; artifacts already downloaded
    /// stay in the cache for the next run.
    pub async fn load_dependencies<R: Read>(
        &mut self,
        manifest: Option<R>,
        base: Arc<dyn SymbolResolver>,
    ) -> Result<Arc<dyn SymbolResolver>> {
        let started = Instant::now();

        tracing::info!("Loading dependencies...");
        tracing::info!("(If this is the first time it may take a while to download all the dependencies)");

        let result = self.run(manifest, base).await;
        match &result {
            Ok(_) => {
                self.state = LoadState::Ready;
                tracing::info!(
                    "Loaded dependencies in {}ms",
                    started.elapsed().as_millis()
                );
            }
            Err(e) => {
                self.state = LoadState::Failed {
                    error: e.to_string(),
                };
            }
        }

        result
    }

    async fn run<R: Read>(
        &mut self,
        manifest: Option<R>,
        base: Arc<dyn SymbolResolver>,
    ) -> Result<Arc<dyn SymbolResolver>> {
        let artifacts = load_manifest(manifest)?;
        self.state = LoadState::ManifestLoaded {
            artifacts: artifacts.len(),
        };

        if artifacts.is_empty() {
            tracing::debug!("Dependency manifest is empty");
            return Ok(base);
        }

        let report = self.cache.ensure_all(&artifacts).await?;
        self.state = LoadState::ArtifactsCached;
        tracing::info!(
            "Dependencies cached: {} downloaded ({} bytes), {} already present",
            report.downloaded,
            report.bytes,
            report.hits
        );

        let extended = extend_with(
            self.cache.dir(),
            base,
            self.loader.as_ref(),
            self.config.lookup_order,
        )?;
        self.state = LoadState::ContextExtended;

        Ok(extended)
    }

    /// Load dependencies into `context`.
    ///
    /// On failure the error is logged and `context` keeps its current
    /// resolver, so the host can continue without the extra symbols.
    /// Returns whether the load succeeded.
    pub async fn load_into<R: Read>(
        &mut self,
        manifest: Option<R>,
        context: &ResolutionContext,
    ) -> bool {
        let base = context.current();

        match self.load_dependencies(manifest, base.clone()).await {
            Ok(resolver) => {
                if !Arc::ptr_eq(&resolver, &base) {
                    context.install(resolver);
                }
                true
            }
            Err(e) => {
                tracing::error!("Failed to load dependencies: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DependencyError;
    use crate::resolver::ProcessResolver;

    fn loader(tmp: &tempfile::TempDir) -> DependencyLoader {
        DependencyLoader::new(DependencyConfig::new(tmp.path().to_path_buf())).unwrap()
    }

    #[test]
    fn test_state_helpers() {
        assert!(LoadState::Ready.is_ready());
        assert!(!LoadState::ArtifactsCached.is_ready());
        assert!(LoadState::Failed {
            error: "x".into()
        }
        .is_failed());
    }

    #[tokio::test]
    async fn test_missing_manifest_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let mut loader = loader(&tmp);
        assert_eq!(loader.state(), &LoadState::Uninitialized);

        let err = match loader
            .load_dependencies(None::<&[u8]>, Arc::new(ProcessResolver::empty()))
            .await
        {
            Ok(_) => panic!("missing manifest accepted"),
            Err(e) => e,
        };
        assert!(matches!(err, DependencyError::ManifestMissing));
        assert!(loader.state().is_failed());
        assert!(!tmp.path().join("libs").exists());
    }

    #[tokio::test]
    async fn test_empty_manifest_keeps_base() {
        let tmp = tempfile::tempdir().unwrap();
        let mut loader = loader(&tmp);
        let base: Arc<dyn SymbolResolver> = Arc::new(ProcessResolver::empty());

        let resolver = match loader
            .load_dependencies(Some("[]".as_bytes()), base.clone())
            .await
        {
            Ok(r) => r,
            Err(e) => panic!("empty manifest failed: {}", e),
        };

        assert!(Arc::ptr_eq(&resolver, &base));
        assert!(loader.state().is_ready());
    }

    #[tokio::test]
    async fn test_load_into_degrades() {
        let tmp = tempfile::tempdir().unwrap();
        let mut loader = loader(&tmp);
        let base: Arc<dyn SymbolResolver> = Arc::new(ProcessResolver::empty());
        let context = ResolutionContext::new(base.clone());

        let ok = loader
            .load_into(Some("not json".as_bytes()), &context)
            .await;

        assert!(!ok);
        assert!(Arc::ptr_eq(&context.current(), &base));
        assert!(loader.state().is_failed());
    }
}

//! Extends a resolver chain with the artifacts in a directory.

use std::path::Path;
use std::sync::Arc;

use libloading::Library;

use crate::config::native_extension;
use crate::error::{DependencyError, Result};
use crate::resolver::{
    ChainedResolver, LoadedArtifact, LookupOrder, NativeArtifact, SymbolResolver,
};

/// Opens artifact files for symbol lookup.
pub trait ArtifactLoader: Send + Sync {
    /// Whether a file looks like an artifact this loader can open.
    fn is_artifact(&self, path: &Path) -> bool;

    /// Open an artifact.
    fn load(&self, path: &Path) -> Result<Box<dyn LoadedArtifact>>;
}

/// Loader for native shared libraries.
#[derive(Debug, Clone)]
pub struct NativeLoader {
    extensions: Vec<String>,
}

impl NativeLoader {
    /// Recognize files with any of the given extensions (without the dot).
    pub fn new(extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl Default for NativeLoader {
    fn default() -> Self {
        Self::new([native_extension()])
    }
}

impl ArtifactLoader for NativeLoader {
    fn is_artifact(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }

    fn load(&self, path: &Path) -> Result<Box<dyn LoadedArtifact>> {
        // Safety: initializers of cached artifacts run here. The artifacts come
        // from the host's own bundled manifest.
        let library = unsafe { Library::new(path) }.map_err(|e| DependencyError::ArtifactLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(NativeArtifact::new(library, path.to_path_buf())))
    }
}

/// Extend `parent` with the native libraries found in `dir`.
pub fn extend(dir: &Path, parent: Arc<dyn SymbolResolver>) -> Result<Arc<dyn SymbolResolver>> {
    extend_with(dir, parent, &NativeLoader::default(), LookupOrder::default())
}

/// Extend `parent` with the artifacts `loader` recognizes in `dir`.
///
/// Returns `parent` itself when `dir` is missing or not a directory. Only
/// direct entries are considered; anything the loader does not recognize
/// (other extensions, partial downloads, subdirectories) is skipped.
pub fn extend_with(
    dir: &Path,
    parent: Arc<dyn SymbolResolver>,
    loader: &dyn ArtifactLoader,
    order: LookupOrder,
) -> Result<Arc<dyn SymbolResolver>> {
    if !dir.is_dir() {
        tracing::debug!("No dependency directory at {:?}", dir);
        return Ok(parent);
    }

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if !path.is_file() || !loader.is_artifact(&path) {
            tracing::debug!("Skipping {:?}", path);
            continue;
        }

        paths.push(path);
    }
    paths.sort();

    let mut artifacts = Vec::with_capacity(paths.len());
    for path in &paths {
        artifacts.push(loader.load(path)?);
        tracing::debug!("Loaded dependency {:?}", path);
    }

    tracing::info!("Chained {} dependencies from {:?}", artifacts.len(), dir);

    Ok(Arc::new(ChainedResolver::new(artifacts, parent).with_order(order)))
}

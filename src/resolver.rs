//! Symbol resolvers and resolver chaining.
//!
//! A resolver answers "where does symbol X live?". Resolvers form a chain.
//! By default each link asks its parent first and only answers from its own
//! artifacts on a miss, so a link can only add symbols, never hide the
//! parent's. `LookupOrder::LocalFirst` opts into artifacts taking precedence.

use std::ffi::c_void;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;

/// Where a resolved symbol came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOrigin {
    /// The running process image
    Process,
    /// A loaded artifact file
    Artifact(PathBuf),
}

/// A successfully resolved symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSymbol {
    pub name: String,
    /// Address of the symbol in this process
    pub address: usize,
    pub origin: SymbolOrigin,
}

/// A scope that can look up symbols by name.
pub trait SymbolResolver: Send + Sync {
    /// Look up a symbol, falling back to the parent on a miss.
    fn resolve(&self, symbol: &str) -> Option<ResolvedSymbol>;

    /// Fallback scope, if any.
    fn parent(&self) -> Option<&Arc<dyn SymbolResolver>> {
        None
    }

    /// Artifact files owned by this scope (not its parents).
    fn artifacts(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// A single artifact opened for symbol lookup.
pub trait LoadedArtifact: Send + Sync {
    /// File the artifact was loaded from.
    fn path(&self) -> &Path;

    /// Address of an exported symbol.
    fn symbol(&self, name: &str) -> Option<usize>;
}

/// Native shared library opened with libloading.
pub struct NativeArtifact {
    /// The dynamic library handle (must be kept alive)
    library: Library,
    path: PathBuf,
}

impl NativeArtifact {
    pub(crate) fn new(library: Library, path: PathBuf) -> Self {
        Self { library, path }
    }
}

impl LoadedArtifact for NativeArtifact {
    fn path(&self) -> &Path {
        &self.path
    }

    fn symbol(&self, name: &str) -> Option<usize> {
        // Reading the symbol's address never calls into the library.
        let symbol = unsafe { self.library.get::<*mut c_void>(name.as_bytes()) }.ok()?;
        Some(*symbol as usize)
    }
}

/// Base scope: symbols already linked into the running process.
pub struct ProcessResolver {
    library: Option<Library>,
}

impl ProcessResolver {
    /// Resolver over the current process image.
    pub fn new() -> Self {
        Self {
            library: this_process(),
        }
    }

    /// Resolver that knows no symbols. Useful as the root of a chain
    /// that should only expose artifacts.
    pub fn empty() -> Self {
        Self { library: None }
    }
}

impl Default for ProcessResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn this_process() -> Option<Library> {
    Some(libloading::os::unix::Library::this().into())
}

#[cfg(windows)]
fn this_process() -> Option<Library> {
    match libloading::os::windows::Library::this() {
        Ok(lib) => Some(lib.into()),
        Err(e) => {
            tracing::warn!("Cannot open process image for symbol lookup: {}", e);
            None
        }
    }
}

impl SymbolResolver for ProcessResolver {
    fn resolve(&self, symbol: &str) -> Option<ResolvedSymbol> {
        let library = self.library.as_ref()?;
        let address = unsafe { library.get::<*mut c_void>(symbol.as_bytes()) }.ok()?;
        Some(ResolvedSymbol {
            name: symbol.to_string(),
            address: *address as usize,
            origin: SymbolOrigin::Process,
        })
    }
}

/// Which scope a chain link consults first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookupOrder {
    /// Parent, then own artifacts; the parent's symbols can never be shadowed
    #[default]
    ParentFirst,
    /// Own artifacts, then the parent
    LocalFirst,
}

/// A scope over a set of artifacts with a parent fallback.
pub struct ChainedResolver {
    artifacts: Vec<Box<dyn LoadedArtifact>>,
    parent: Arc<dyn SymbolResolver>,
    order: LookupOrder,
}

impl ChainedResolver {
    /// Chain `artifacts` in front of `parent`.
    pub fn new(artifacts: Vec<Box<dyn LoadedArtifact>>, parent: Arc<dyn SymbolResolver>) -> Self {
        Self {
            artifacts,
            parent,
            order: LookupOrder::default(),
        }
    }

    /// Set the lookup order.
    pub fn with_order(mut self, order: LookupOrder) -> Self {
        self.order = order;
        self
    }

    pub fn order(&self) -> LookupOrder {
        self.order
    }

    /// Look up a symbol in this scope only.
    pub fn resolve_local(&self, symbol: &str) -> Option<ResolvedSymbol> {
        self.artifacts.iter().find_map(|artifact| {
            artifact.symbol(symbol).map(|address| ResolvedSymbol {
                name: symbol.to_string(),
                address,
                origin: SymbolOrigin::Artifact(artifact.path().to_path_buf()),
            })
        })
    }
}

impl SymbolResolver for ChainedResolver {
    fn resolve(&self, symbol: &str) -> Option<ResolvedSymbol> {
        match self.order {
            LookupOrder::LocalFirst => self
                .resolve_local(symbol)
                .or_else(|| self.parent.resolve(symbol)),
            LookupOrder::ParentFirst => self
                .parent
                .resolve(symbol)
                .or_else(|| self.resolve_local(symbol)),
        }
    }

    fn parent(&self) -> Option<&Arc<dyn SymbolResolver>> {
        Some(&self.parent)
    }

    fn artifacts(&self) -> Vec<PathBuf> {
        self.artifacts.iter().map(|a| a.path().to_path_buf()).collect()
    }
}

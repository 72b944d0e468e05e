//! Dependency loader configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::resolver::LookupOrder;

/// Default subdirectory of the data directory holding cached artifacts.
pub const DEFAULT_LIBS_DIR: &str = "libs";

/// Default per-request download timeout.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Shared library extension for the current platform.
pub fn native_extension() -> &'static str {
    if cfg!(target_os = "macos") {
        "dylib"
    } else if cfg!(target_os = "windows") {
        "dll"
    } else {
        "so"
    }
}

/// Configuration for the dependency loader.
#[derive(Debug, Clone)]
pub struct DependencyConfig {
    /// Host data directory
    pub data_dir: PathBuf,

    /// Subdirectory of `data_dir` used as the artifact cache
    pub libs_dir_name: String,

    /// File extensions recognized as loadable artifacts (without the dot)
    pub artifact_extensions: Vec<String>,

    /// Timeout for a single download (None = wait forever)
    pub download_timeout: Option<Duration>,

    /// User-Agent header sent with downloads
    pub user_agent: String,

    /// Lookup order of the chain link built over the cache
    pub lookup_order: LookupOrder,
}

impl DependencyConfig {
    /// Create a new configuration rooted at a data directory.
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            libs_dir_name: DEFAULT_LIBS_DIR.to_string(),
            artifact_extensions: vec![native_extension().to_string()],
            download_timeout: Some(DEFAULT_DOWNLOAD_TIMEOUT),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            lookup_order: LookupOrder::default(),
        }
    }

    /// Set the cache subdirectory name.
    pub fn with_libs_dir(mut self, name: impl Into<String>) -> Self {
        self.libs_dir_name = name.into();
        self
    }

    /// Replace the recognized artifact extensions.
    pub fn with_extensions(mut self, exts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.artifact_extensions = exts
            .into_iter()
            .map(|e| e.into().trim_start_matches('.').to_string())
            .collect();
        self
    }

    /// Set the download timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.download_timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Set the lookup order of the extended scope.
    pub fn with_lookup_order(mut self, order: LookupOrder) -> Self {
        self.lookup_order = order;
        self
    }

    /// Directory where artifacts are cached.
    pub fn libs_dir(&self) -> PathBuf {
        self.data_dir.join(&self.libs_dir_name)
    }

    /// Ensure directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.libs_dir())
    }
}

impl Default for DependencyConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(data_dir)
    }
}

//! Runtime dependency loading for plugin hosts.
//!
//! Reads a bundled manifest of `{name, url}` records, downloads any artifact
//! missing from the host's `libs` directory, and chains the cached shared
//! libraries in front of the host's symbol resolver.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lib_plugin_deps::{DependencyConfig, DependencyLoader, ProcessResolver, ResolutionContext};
//!
//! const MANIFEST: &str = include_str!("../dependencies.json");
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DependencyConfig::new("/var/lib/myhost".into());
//!     let context = ResolutionContext::new(Arc::new(ProcessResolver::new()));
//!
//!     let mut loader = DependencyLoader::new(config)?;
//!     loader.load_into(Some(MANIFEST.as_bytes()), &context).await;
//!
//!     if let Some(symbol) = context.resolve("extension_entry") {
//!         println!("found at {:#x}", symbol.address);
//!     }
//!
//!     Ok(())
//! }
//! ```

mod cache;
mod config;
mod context;
mod error;
mod loader;
mod manifest;
mod pipeline;
mod resolver;

pub use cache::*;
pub use config::*;
pub use context::*;
pub use error::*;
pub use loader::*;
pub use manifest::*;
pub use pipeline::*;
pub use resolver::*;

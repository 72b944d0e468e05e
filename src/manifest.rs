//! Dependency manifest parsing.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component, Path};

use serde::Deserialize;

use crate::error::{DependencyError, Result};

/// A single manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactRecord {
    /// File name of the artifact in the cache directory
    pub name: String,
    /// Download location
    pub url: String,
}

impl ArtifactRecord {
    fn validate(&self) -> Result<()> {
        let mut components = Path::new(&self.name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(c)), None) if c == self.name.as_str() => Ok(()),
            _ => Err(DependencyError::ManifestParse(format!(
                "invalid artifact name: {:?}",
                self.name
            ))),
        }
    }
}

/// Artifact name to download URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactMap {
    entries: BTreeMap<String, String>,
}

impl ArtifactMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from records. Later records replace earlier ones with the same name.
    pub fn from_records(records: impl IntoIterator<Item = ArtifactRecord>) -> Self {
        let mut map = Self::new();
        for record in records {
            map.insert(record);
        }
        map
    }

    /// Insert a record, returning the URL it replaced.
    pub fn insert(&mut self, record: ArtifactRecord) -> Option<String> {
        self.entries.insert(record.name, record.url)
    }

    /// Look up the URL for an artifact.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Iterate over `(name, url)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a manifest stream: a JSON array of `{"name", "url"}` objects.
pub fn parse_manifest(reader: impl Read) -> Result<ArtifactMap> {
    let records: Vec<ArtifactRecord> = serde_json::from_reader(reader)
        .map_err(|e| DependencyError::ManifestParse(e.to_string()))?;

    for record in &records {
        record.validate()?;
    }

    Ok(ArtifactMap::from_records(records))
}

/// Load the bundled manifest. `None` means the resource is not bundled.
pub fn load_manifest<R: Read>(stream: Option<R>) -> Result<ArtifactMap> {
    match stream {
        Some(reader) => parse_manifest(reader),
        None => Err(DependencyError::ManifestMissing),
    }
}

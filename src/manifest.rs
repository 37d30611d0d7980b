//! Manifest support for combine archives
//!
//! The manifest is the index of artifacts: one entry per artifact, mapping its
//! archive path to its declared content type (a MIME type or a format URI).
//!
//! # Manifest Scope
//!
//! The manifest file itself and the metadata file live inside the archive
//! filesystem but are never listed as entries. Only artifacts created through
//! [`CombineArchive`](crate::CombineArchive) are.
//!
//! # Stored Form
//!
//! [`JsonManifest`] keeps the index at `/manifest.json` by default:
//!
//! ```text
//! {
//!   "version": "1.0",
//!   "entries": [
//!     { "location": "/models/model1.xml", "format": "application/xml" }
//!   ]
//! }
//! ```

use crate::config::ArchiveOptions;
use crate::error::{CombineError, Result};
use crate::fs::{ArchivePath, VirtualFs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use tracing::debug;

/// Manifest document version written by this crate
pub const MANIFEST_VERSION: &str = "1.0";

/// Persistent mapping of artifact path to content type
///
/// Stores receive the filesystem on `load` and `save` instead of holding a
/// handle of their own; the archive facade is the only owner of the
/// filesystem.
pub trait ManifestStore {
    /// Read the manifest from `fs`. Once loaded, further calls are no-ops.
    fn load<F: VirtualFs>(&mut self, fs: &F) -> Result<()>;

    /// Write the in-memory manifest to `fs`
    fn save<F: VirtualFs>(&mut self, fs: &mut F) -> Result<()>;

    /// Record `path` with `content_type`, replacing any previous type
    fn add_entry(&mut self, path: &str, content_type: &str);

    /// Forget `path`; returns whether an entry was present
    fn remove_entry(&mut self, path: &str) -> bool;

    /// Declared content type of `path`
    fn file_type(&self, path: &str) -> Option<&str>;

    /// Paths of all entries
    fn file_paths(&self) -> Box<dyn Iterator<Item = &str> + '_>;

    fn is_loaded(&self) -> bool;
}

/// One manifest entry as stored on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Archive path of the artifact
    pub location: String,

    /// Declared content type
    pub format: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManifestDocument {
    version: String,

    #[serde(default)]
    entries: Vec<ManifestEntry>,
}

/// Manifest persisted as JSON inside the archive
#[derive(Debug, Clone)]
pub struct JsonManifest {
    location: String,
    entries: BTreeMap<String, String>,
    loaded: bool,
}

impl JsonManifest {
    pub fn new(options: &ArchiveOptions) -> Self {
        Self::at(&options.manifest_path)
    }

    /// Manifest stored at a specific archive path
    pub fn at(location: &str) -> Self {
        Self {
            location: location.to_string(),
            entries: BTreeMap::new(),
            loaded: false,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of all entries in path order
    pub fn entries(&self) -> Vec<ManifestEntry> {
        self.entries
            .iter()
            .map(|(location, format)| ManifestEntry {
                location: location.clone(),
                format: format.clone(),
            })
            .collect()
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let doc = ManifestDocument {
            version: MANIFEST_VERSION.to_string(),
            entries: self.entries(),
        };
        serde_json::to_vec_pretty(&doc).map_err(CombineError::from)
    }

    /// Replace the in-memory entries with a parsed JSON document
    pub fn read_json(&mut self, data: &[u8]) -> Result<()> {
        let doc: ManifestDocument = serde_json::from_slice(data)?;
        let mut entries = BTreeMap::new();
        for entry in doc.entries {
            let path = ArchivePath::parse(&entry.location)?;
            if entries
                .insert(path.as_str().to_string(), entry.format)
                .is_some()
            {
                return Err(CombineError::InvalidFormat(format!(
                    "duplicate manifest entry: {}",
                    path
                )));
            }
        }
        self.entries = entries;
        Ok(())
    }
}

impl ManifestStore for JsonManifest {
    fn load<F: VirtualFs>(&mut self, fs: &F) -> Result<()> {
        if self.loaded {
            return Ok(());
        }

        let path = fs.resolve(&self.location)?;
        if fs.exists(&path) {
            let mut data = Vec::new();
            fs.open_read(&path)?.read_to_end(&mut data)?;
            self.read_json(&data)?;
        } else {
            self.entries.clear();
        }

        self.loaded = true;
        debug!(location = %path, entries = self.entries.len(), "manifest loaded");
        Ok(())
    }

    fn save<F: VirtualFs>(&mut self, fs: &mut F) -> Result<()> {
        let path = fs.resolve(&self.location)?;
        if let Some(parent) = path.parent() {
            fs.create_directories(&parent)?;
        }

        let json = self.to_json()?;
        let mut out = fs.open_write(&path)?;
        out.write_all(&json)?;
        out.flush()?;

        debug!(location = %path, entries = self.entries.len(), "manifest saved");
        Ok(())
    }

    fn add_entry(&mut self, path: &str, content_type: &str) {
        self.entries
            .insert(path.to_string(), content_type.to_string());
    }

    fn remove_entry(&mut self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    fn file_type(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    fn file_paths(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        Box::new(self.entries.keys().map(String::as_str))
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::DirFs;

    #[test]
    fn test_missing_file_loads_empty() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fs = DirFs::new(temp.path())?;
        let mut manifest = JsonManifest::new(&ArchiveOptions::default());

        manifest.load(&fs)?;
        assert!(manifest.is_loaded());
        assert!(manifest.is_empty());
        Ok(())
    }

    #[test]
    fn test_save_then_load() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut fs = DirFs::new(temp.path())?;

        let mut manifest = JsonManifest::at("/meta/manifest.json");
        manifest.load(&fs)?;
        manifest.add_entry("/models/model1.xml", "application/xml");
        manifest.add_entry("/data/readme.txt", "text/plain");
        manifest.save(&mut fs)?;

        let mut reloaded = JsonManifest::at("/meta/manifest.json");
        reloaded.load(&fs)?;
        let paths: Vec<&str> = reloaded.file_paths().collect();
        assert_eq!(paths, vec!["/data/readme.txt", "/models/model1.xml"]);
        assert_eq!(reloaded.file_type("/models/model1.xml"), Some("application/xml"));
        assert_eq!(reloaded.file_type("/nope"), None);
        Ok(())
    }

    #[test]
    fn test_load_is_idempotent() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut fs = DirFs::new(temp.path())?;

        let mut manifest = JsonManifest::new(&ArchiveOptions::default());
        manifest.load(&fs)?;
        manifest.add_entry("/a.txt", "text/plain");
        manifest.save(&mut fs)?;

        let mut other = JsonManifest::new(&ArchiveOptions::default());
        other.load(&fs)?;
        let once: Vec<String> = other.file_paths().map(String::from).collect();
        other.load(&fs)?;
        let twice: Vec<String> = other.file_paths().map(String::from).collect();
        assert_eq!(once, twice);
        Ok(())
    }

    #[test]
    fn test_add_replaces_and_remove_reports() {
        let mut manifest = JsonManifest::at("/manifest.json");
        manifest.add_entry("/a.txt", "text/plain");
        manifest.add_entry("/a.txt", "text/markdown");
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest.file_type("/a.txt"), Some("text/markdown"));

        assert!(manifest.remove_entry("/a.txt"));
        assert!(!manifest.remove_entry("/a.txt"));
    }

    #[test]
    fn test_duplicate_and_traversal_rejected() {
        let mut manifest = JsonManifest::at("/manifest.json");

        let dup = br#"{"version":"1.0","entries":[
            {"location":"/a.txt","format":"text/plain"},
            {"location":"a.txt","format":"text/plain"}]}"#;
        assert!(matches!(
            manifest.read_json(dup),
            Err(CombineError::InvalidFormat(_))
        ));

        let evil = br#"{"version":"1.0","entries":[{"location":"../x","format":"t"}]}"#;
        assert!(matches!(
            manifest.read_json(evil),
            Err(CombineError::InvalidPath(_))
        ));

        assert!(matches!(
            manifest.read_json(b"not json"),
            Err(CombineError::Json(_))
        ));
    }
}

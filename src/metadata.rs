//! Archive-level metadata
//!
//! One [`MetadataRecord`] per archive: creation and modification timestamps,
//! creators, and free-form annotations. The archive facade only needs
//! [`MetadataStore`]'s load/save/update-timestamp; everything else is for
//! callers reaching the store through
//! [`CombineArchive::metadata_mut`](crate::CombineArchive::metadata_mut).

use crate::config::ArchiveOptions;
use crate::error::{CombineError, Result};
use crate::fs::VirtualFs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Persistent archive-level record
pub trait MetadataStore {
    /// Read the record from `fs`. Once loaded, further calls are no-ops.
    fn load<F: VirtualFs>(&mut self, fs: &F) -> Result<()>;

    /// Write the in-memory record to `fs`
    fn save<F: VirtualFs>(&mut self, fs: &mut F) -> Result<()>;

    /// Stamp the record as modified now; never moves the timestamp backwards
    fn update_modified_timestamp(&mut self);
}

/// Person or organisation credited with the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
}

impl Creator {
    /// Create a new creator with just a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            organization: None,
        }
    }
}

/// Archive provenance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Creation timestamp (Unix epoch seconds)
    pub created: u64,

    /// Last modified timestamp (Unix epoch seconds)
    pub modified: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub creators: Vec<Creator>,

    /// Free-form key/value annotations
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl MetadataRecord {
    /// Fresh record stamped with the current time
    pub fn new() -> Self {
        let now = unix_now();
        Self {
            created: now,
            modified: now,
            description: None,
            creators: Vec::new(),
            annotations: BTreeMap::new(),
        }
    }
}

impl Default for MetadataRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Metadata persisted as JSON inside the archive
#[derive(Debug, Clone)]
pub struct JsonMetadata {
    location: String,
    record: MetadataRecord,
    loaded: bool,
}

impl JsonMetadata {
    pub fn new(options: &ArchiveOptions) -> Self {
        Self::at(&options.metadata_path)
    }

    /// Metadata stored at a specific archive path
    pub fn at(location: &str) -> Self {
        Self {
            location: location.to_string(),
            record: MetadataRecord::new(),
            loaded: false,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn record(&self) -> &MetadataRecord {
        &self.record
    }

    pub fn record_mut(&mut self) -> &mut MetadataRecord {
        &mut self.record
    }

    pub fn created(&self) -> u64 {
        self.record.created
    }

    pub fn modified(&self) -> u64 {
        self.record.modified
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.record.annotations.get(key).map(String::as_str)
    }

    /// Set an annotation, returning the previous value
    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.record.annotations.insert(key.into(), value.into())
    }

    pub fn add_creator(&mut self, creator: Creator) {
        self.record.creators.push(creator);
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.record.description = Some(description.into());
    }
}

impl MetadataStore for JsonMetadata {
    fn load<F: VirtualFs>(&mut self, fs: &F) -> Result<()> {
        if self.loaded {
            return Ok(());
        }

        let path = fs.resolve(&self.location)?;
        if fs.exists(&path) {
            let mut data = Vec::new();
            fs.open_read(&path)?.read_to_end(&mut data)?;
            self.record = serde_json::from_slice(&data)?;
            if self.record.modified < self.record.created {
                return Err(CombineError::InvalidFormat(format!(
                    "{}: modified {} precedes created {}",
                    path, self.record.modified, self.record.created
                )));
            }
        }

        self.loaded = true;
        debug!(location = %path, modified = self.record.modified, "metadata loaded");
        Ok(())
    }

    fn save<F: VirtualFs>(&mut self, fs: &mut F) -> Result<()> {
        let path = fs.resolve(&self.location)?;
        if let Some(parent) = path.parent() {
            fs.create_directories(&parent)?;
        }

        let json = serde_json::to_vec_pretty(&self.record)?;
        let mut out = fs.open_write(&path)?;
        out.write_all(&json)?;
        out.flush()?;

        debug!(location = %path, "metadata saved");
        Ok(())
    }

    fn update_modified_timestamp(&mut self) {
        self.record.modified = self.record.modified.max(unix_now());
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::DirFs;

    #[test]
    fn test_missing_file_starts_fresh() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fs = DirFs::new(temp.path())?;
        let mut metadata = JsonMetadata::new(&ArchiveOptions::default());

        metadata.load(&fs)?;
        assert!(metadata.is_loaded());
        assert!(metadata.created() > 0);
        assert_eq!(metadata.created(), metadata.modified());
        Ok(())
    }

    #[test]
    fn test_annotations_persist() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let mut fs = DirFs::new(temp.path())?;

        let mut metadata = JsonMetadata::at("/metadata.json");
        metadata.load(&fs)?;
        metadata.set_description("Repressilator model bundle");
        metadata.add_creator(Creator::new("Ada Lovelace"));
        assert_eq!(metadata.annotate("license", "CC0"), None);
        assert_eq!(metadata.annotate("license", "CC-BY-4.0"), Some("CC0".to_string()));
        metadata.save(&mut fs)?;

        let mut reloaded = JsonMetadata::at("/metadata.json");
        reloaded.load(&fs)?;
        assert_eq!(reloaded.record(), metadata.record());
        assert_eq!(reloaded.annotation("license"), Some("CC-BY-4.0"));
        Ok(())
    }

    #[test]
    fn test_modified_never_goes_backwards() {
        let mut metadata = JsonMetadata::at("/metadata.json");
        let future = unix_now() + 10_000;
        metadata.record_mut().modified = future;

        metadata.update_modified_timestamp();
        assert_eq!(metadata.modified(), future);

        metadata.record_mut().modified = 0;
        metadata.update_modified_timestamp();
        assert!(metadata.modified() >= metadata.created());
    }

    #[test]
    fn test_inconsistent_timestamps_rejected() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let fs = DirFs::new(temp.path())?;
        std::fs::write(
            temp.path().join("metadata.json"),
            br#"{"created": 200, "modified": 100}"#,
        )?;

        let mut metadata = JsonMetadata::at("/metadata.json");
        assert!(matches!(
            metadata.load(&fs),
            Err(CombineError::InvalidFormat(_))
        ));
        Ok(())
    }
}

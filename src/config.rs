//! Archive configuration
//!
//! Options are plain serde structs so they can be embedded in an application's
//! own configuration or loaded from a standalone TOML file:
//!
//! ```toml
//! manifest_path = "/manifest.json"
//! metadata_path = "/metadata.json"
//! compression = "zstd"
//! ```

use crate::container::CompressionMethod;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default location of the manifest inside the archive
pub const DEFAULT_MANIFEST_PATH: &str = "/manifest.json";

/// Default location of the metadata record inside the archive
pub const DEFAULT_METADATA_PATH: &str = "/metadata.json";

/// How container payloads are compressed when a packed archive is written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionPolicy {
    /// Pick per entry from its extension and size
    #[default]
    Auto,
    None,
    Lz4,
    Zstd,
}

impl CompressionPolicy {
    /// Resolve the policy to a concrete method for one entry
    pub fn method_for(self, path: &str, size: u64) -> CompressionMethod {
        match self {
            Self::Auto => CompressionMethod::choose_for_file(path, size),
            Self::None => CompressionMethod::None,
            Self::Lz4 => CompressionMethod::Lz4,
            Self::Zstd => CompressionMethod::Zstd,
        }
    }
}

/// Options shared by the filesystem and the sidecar stores of one archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    /// Archive path of the manifest file
    pub manifest_path: String,

    /// Archive path of the metadata file
    pub metadata_path: String,

    /// Compression used when repacking a container
    pub compression: CompressionPolicy,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
            metadata_path: DEFAULT_METADATA_PATH.to_string(),
            compression: CompressionPolicy::Auto,
        }
    }
}

impl ArchiveOptions {
    /// Parse options from TOML text; missing keys fall back to defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load options from a TOML file on the host
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Serialize options back to TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn with_compression(mut self, compression: CompressionPolicy) -> Self {
        self.compression = compression;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let options = ArchiveOptions::from_toml_str("").unwrap();
        assert_eq!(options, ArchiveOptions::default());
        assert_eq!(options.manifest_path, "/manifest.json");
        assert_eq!(options.compression, CompressionPolicy::Auto);
    }

    #[test]
    fn test_partial_toml() {
        let options = ArchiveOptions::from_toml_str(
            r#"
            metadata_path = "/meta/record.json"
            compression = "lz4"
            "#,
        )
        .unwrap();

        assert_eq!(options.manifest_path, DEFAULT_MANIFEST_PATH);
        assert_eq!(options.metadata_path, "/meta/record.json");
        assert_eq!(options.compression, CompressionPolicy::Lz4);
    }

    #[test]
    fn test_bad_compression_rejected() {
        let result = ArchiveOptions::from_toml_str(r#"compression = "brotli""#);
        assert!(matches!(result, Err(crate::CombineError::Toml(_))));
    }

    #[test]
    fn test_toml_roundtrip() {
        let options = ArchiveOptions::default().with_compression(CompressionPolicy::Zstd);
        let text = options.to_toml_string().unwrap();
        assert_eq!(ArchiveOptions::from_toml_str(&text).unwrap(), options);
    }

    #[test]
    fn test_policy_resolution() {
        assert_eq!(
            CompressionPolicy::None.method_for("big.txt", 1 << 20),
            CompressionMethod::None
        );
        assert_eq!(
            CompressionPolicy::Auto.method_for("big.txt", 1 << 20),
            CompressionMethod::Zstd
        );
        assert_eq!(
            CompressionPolicy::Auto.method_for("tiny.txt", 10),
            CompressionMethod::None
        );
    }
}

use crate::error::{CombineError, Result};
use std::fmt;

/// Maximum normalized path length in bytes (UTF-8)
pub const MAX_PATH_LENGTH: usize = 255;

/// A validated path inside an archive
///
/// Always absolute with respect to the archive root: `/models/model1.xml`.
/// Backslashes are treated as separators, empty and `.` segments are dropped,
/// and `..` is rejected outright so a path can never climb out of the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchivePath {
    normalized: String,
}

impl ArchivePath {
    /// Parse and normalize a raw path string
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.contains('\0') {
            return Err(CombineError::InvalidPath(format!(
                "path contains NUL byte: {:?}",
                raw
            )));
        }

        let unified = raw.replace('\\', "/");
        let mut segments = Vec::new();
        for segment in unified.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(CombineError::InvalidPath(format!(
                        "parent segments are not allowed: {}",
                        raw
                    )))
                }
                // Windows drive prefixes ("C:") have no meaning inside an archive
                s if s.len() == 2 && s.ends_with(':') => {
                    return Err(CombineError::InvalidPath(format!(
                        "drive prefixes are not allowed: {}",
                        raw
                    )))
                }
                s => segments.push(s),
            }
        }

        if segments.is_empty() {
            return Err(CombineError::InvalidPath(format!(
                "path does not name an entry: {:?}",
                raw
            )));
        }

        let normalized = format!("/{}", segments.join("/"));
        if normalized.len() > MAX_PATH_LENGTH {
            return Err(CombineError::InvalidPath(format!(
                "path too long: {} bytes (max {})",
                normalized.len(),
                MAX_PATH_LENGTH
            )));
        }

        Ok(Self { normalized })
    }

    /// Normalized form, starting with `/`
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// Form without the leading `/`, used for host paths and container entries
    pub fn relative(&self) -> &str {
        &self.normalized[1..]
    }

    /// Parent directory, or `None` for entries directly under the root
    pub fn parent(&self) -> Option<ArchivePath> {
        let idx = self.normalized.rfind('/')?;
        if idx == 0 {
            return None;
        }
        Some(Self {
            normalized: self.normalized[..idx].to_string(),
        })
    }

    /// Last path segment
    pub fn file_name(&self) -> &str {
        match self.normalized.rfind('/') {
            Some(idx) => &self.normalized[idx + 1..],
            None => &self.normalized,
        }
    }

    /// Iterate over every proper ancestor, outermost first
    pub fn ancestors(&self) -> Vec<ArchivePath> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(path) = current {
            current = path.parent();
            out.push(path);
        }
        out.reverse();
        out
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.normalized
    }
}

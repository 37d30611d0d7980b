use crate::error::{CombineError, Result};
use std::fmt;

/// One artifact: its archive path and declared content type
///
/// A view over a manifest entry, never stored on its own. Paths are always in
/// normalized form (`/models/model1.xml`) regardless of how the caller spelled
/// them when the artifact was created.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactInfo {
    path: String,
    content_type: String,
}

impl ArtifactInfo {
    pub fn new(path: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content_type: content_type.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

impl fmt::Display for ArtifactInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path, self.content_type)
    }
}

/// Artifacts listed by the manifest when the iterator was created
///
/// Later changes to the archive are not observed. Removal goes through
/// [`CombineArchive::remove_artifact`](crate::CombineArchive::remove_artifact).
#[derive(Debug, Clone)]
pub struct ArtifactIter {
    inner: std::vec::IntoIter<ArtifactInfo>,
}

impl ArtifactIter {
    pub(crate) fn new(snapshot: Vec<ArtifactInfo>) -> Self {
        Self {
            inner: snapshot.into_iter(),
        }
    }

    /// Always fails: the sequence is a read-only snapshot
    pub fn remove(&mut self) -> Result<()> {
        Err(CombineError::Unsupported(
            "removal through the artifact iterator; use remove_artifact".to_string(),
        ))
    }
}

impl Iterator for ArtifactIter {
    type Item = ArtifactInfo;

    fn next(&mut self) -> Option<ArtifactInfo> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ArtifactIter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_includes_type() {
        let a = ArtifactInfo::new("/a.xml", "application/xml");
        assert_eq!(a, ArtifactInfo::new("/a.xml", "application/xml"));
        assert_ne!(a, ArtifactInfo::new("/a.xml", "text/plain"));
        assert_eq!(a.to_string(), "/a.xml (application/xml)");
    }

    #[test]
    fn test_iterator_is_snapshot() {
        let mut iter = ArtifactIter::new(vec![
            ArtifactInfo::new("/a", "t"),
            ArtifactInfo::new("/b", "t"),
        ]);
        assert_eq!(iter.len(), 2);
        assert!(matches!(iter.remove(), Err(CombineError::Unsupported(_))));
        assert_eq!(iter.next().unwrap().path(), "/a");
        assert_eq!(iter.len(), 1);
    }
}

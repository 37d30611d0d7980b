//! Consistency when the manifest cannot be saved
//!
//! Uses a manifest store that can be told to fail every save, to check that a
//! failed creation leaves neither a file nor a manifest entry behind, and that
//! a manifest left stale by a failed removal is repaired before close.

use combine_archive::{
    ArchiveOptions, ArtifactInfo, CombineArchive, CombineError, DirFs, JsonManifest, JsonMetadata,
    ManifestStore, Result, VirtualFs, DEFAULT_MANIFEST_PATH, DEFAULT_METADATA_PATH,
};
use std::cell::Cell;
use std::io::{self, Read};
use std::rc::Rc;

/// JSON manifest whose saves fail while the shared switch is on
struct FlakyManifest {
    inner: JsonManifest,
    fail_saves: Rc<Cell<bool>>,
}

impl ManifestStore for FlakyManifest {
    fn load<F: VirtualFs>(&mut self, fs: &F) -> Result<()> {
        self.inner.load(fs)
    }

    fn save<F: VirtualFs>(&mut self, fs: &mut F) -> Result<()> {
        if self.fail_saves.get() {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full").into());
        }
        self.inner.save(fs)
    }

    fn add_entry(&mut self, path: &str, content_type: &str) {
        self.inner.add_entry(path, content_type)
    }

    fn remove_entry(&mut self, path: &str) -> bool {
        self.inner.remove_entry(path)
    }

    fn file_type(&self, path: &str) -> Option<&str> {
        self.inner.file_type(path)
    }

    fn file_paths(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        self.inner.file_paths()
    }

    fn is_loaded(&self) -> bool {
        self.inner.is_loaded()
    }
}

fn flaky_archive(
    root: &std::path::Path,
) -> (CombineArchive<DirFs, FlakyManifest>, Rc<Cell<bool>>) {
    let switch = Rc::new(Cell::new(false));
    let manifest = FlakyManifest {
        inner: JsonManifest::at(DEFAULT_MANIFEST_PATH),
        fail_saves: Rc::clone(&switch),
    };
    let archive = CombineArchive::new(
        DirFs::new(root).unwrap(),
        manifest,
        JsonMetadata::at(DEFAULT_METADATA_PATH),
        &[DEFAULT_MANIFEST_PATH, DEFAULT_METADATA_PATH],
    )
    .unwrap();
    (archive, switch)
}

#[test]
fn test_failed_save_leaves_no_orphan() {
    println!("\n🔍 Testing rollback of a creation whose manifest save fails...");

    let temp = tempfile::tempdir().unwrap();
    let (mut archive, fail_saves) = flaky_archive(temp.path());

    archive.create_artifact("/kept.txt", "text/plain").unwrap();

    fail_saves.set(true);
    let err = archive
        .create_artifact_from("/lost.txt", "text/plain", &b"never stored"[..])
        .unwrap_err();
    assert!(err.is_io(), "unexpected error: {}", err);

    assert!(!temp.path().join("lost.txt").exists());
    assert_eq!(archive.get_artifact("/lost.txt").unwrap(), None);
    assert!(archive.can_create_artifact("/lost.txt"));
    assert_eq!(
        archive.artifacts().unwrap().collect::<Vec<_>>(),
        vec![ArtifactInfo::new("/kept.txt", "text/plain")]
    );

    // The same path works once saving recovers
    fail_saves.set(false);
    archive
        .create_artifact_from("/lost.txt", "text/plain", &b"stored"[..])
        .unwrap();
    assert_eq!(std::fs::read(temp.path().join("lost.txt")).unwrap(), b"stored");
    archive.close().unwrap();

    println!("  ✓ No orphan file and no stale entry after rollback");
}

#[test]
fn test_failed_save_keeps_created_parents() {
    println!("\n🔍 Testing rollback inside a new directory...");

    let temp = tempfile::tempdir().unwrap();
    let (mut archive, fail_saves) = flaky_archive(temp.path());

    fail_saves.set(true);
    assert!(archive.create_artifact("/new/dir/a.txt", "text/plain").is_err());

    assert!(!temp.path().join("new/dir/a.txt").exists());
    assert!(temp.path().join("new/dir").is_dir());
    assert_eq!(archive.artifacts().unwrap().count(), 0);

    fail_saves.set(false);
    archive.close().unwrap();

    println!("  ✓ File rolled back; parent directories left in place");
}

#[test]
fn test_failed_save_during_removal() {
    println!("\n🔍 Testing removal whose manifest save fails...");

    let temp = tempfile::tempdir().unwrap();
    let (mut archive, fail_saves) = flaky_archive(temp.path());
    let info = archive.create_artifact("/a.txt", "text/plain").unwrap();

    fail_saves.set(true);
    assert!(archive.remove_artifact(&info).unwrap_err().is_io());

    // Filesystem first: the file is gone and the in-memory entry with it
    assert!(!archive.exists(&info).unwrap());
    assert_eq!(archive.get_artifact("/a.txt").unwrap(), None);

    fail_saves.set(false);
    archive.close().unwrap();
    assert!(matches!(archive.close(), Err(CombineError::Closed)));

    println!("  ✓ Removal ordering preserved");
}

#[test]
fn test_stale_manifest_repaired_on_close() {
    println!("\n🔍 Testing close after a removal whose manifest save failed...");

    let temp = tempfile::tempdir().unwrap();
    {
        let (mut archive, fail_saves) = flaky_archive(temp.path());
        let info = archive.create_artifact("/a.txt", "text/plain").unwrap();
        archive.create_artifact("/b.txt", "text/plain").unwrap();

        fail_saves.set(true);
        assert!(archive.remove_artifact(&info).is_err());

        // Saving still fails, so close must fail and leave the archive open
        assert!(archive.close().unwrap_err().is_io());
        assert!(!archive.is_closed());

        fail_saves.set(false);
        archive.close().unwrap();
    }

    let mut reopened = CombineArchive::in_directory(temp.path(), ArchiveOptions::default()).unwrap();
    assert!(!temp.path().join("a.txt").exists());
    assert_eq!(reopened.get_artifact("/a.txt").unwrap(), None);
    assert_eq!(
        reopened.artifacts().unwrap().collect::<Vec<_>>(),
        vec![ArtifactInfo::new("/b.txt", "text/plain")]
    );
    reopened.close().unwrap();

    println!("  ✓ Stored manifest no longer lists the deleted file");
}

#[test]
fn test_stale_manifest_repaired_by_save_metadata() {
    println!("\n🔍 Testing save_metadata after a failed removal...");

    let temp = tempfile::tempdir().unwrap();
    let (mut archive, fail_saves) = flaky_archive(temp.path());
    let info = archive.create_artifact("/a.txt", "text/plain").unwrap();

    fail_saves.set(true);
    assert!(archive.remove_artifact(&info).is_err());
    fail_saves.set(false);
    archive.save_metadata().unwrap();

    let stored = std::fs::read_to_string(temp.path().join("manifest.json")).unwrap();
    assert!(!stored.contains("/a.txt"), "stale entry kept: {}", stored);
    archive.close().unwrap();

    println!("  ✓ Manifest rewritten alongside the metadata");
}

/// Yields a few chunks, then fails
struct FailingSource {
    chunks_left: usize,
}

impl Read for FailingSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.chunks_left == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "source went away"));
        }
        self.chunks_left -= 1;
        let n = buf.len().min(16);
        buf[..n].fill(b'x');
        Ok(n)
    }
}

#[test]
fn test_failed_copy_leaves_no_orphan() {
    println!("\n🔍 Testing creation from a source that fails mid-copy...");

    let temp = tempfile::tempdir().unwrap();
    let mut archive = CombineArchive::in_directory(temp.path(), ArchiveOptions::default()).unwrap();

    let err = archive
        .create_artifact_from("/data/partial.bin", "application/octet-stream", FailingSource {
            chunks_left: 3,
        })
        .unwrap_err();
    assert!(err.is_io(), "unexpected error: {}", err);

    assert!(!temp.path().join("data/partial.bin").exists());
    assert_eq!(archive.get_artifact("/data/partial.bin").unwrap(), None);
    assert!(archive.can_create_artifact("/data/partial.bin"));
    assert_eq!(archive.artifacts().unwrap().count(), 0);
    archive.close().unwrap();

    println!("  ✓ Partially written file removed; no manifest entry");
}

//! The archive facade
//!
//! [`CombineArchive`] is the single entry point for the artifact lifecycle. It
//! owns the filesystem handle for the archive's lifetime and keeps three
//! things in step: filesystem entries, the manifest, and the metadata record.
//!
//! # Consistency
//!
//! Creation and removal are the only operations that change the set of
//! artifacts, and both follow the same order: load the manifest, change the
//! filesystem, change the manifest, save the manifest. The filesystem is
//! always changed first, so it stays the ground truth a manifest can be rebuilt
//! from.
//!
//! If saving the manifest fails during creation, the new entry is dropped
//! from the in-memory manifest and the new file is deleted before the error is
//! returned. Parent directories created on the way are left in place. If
//! saving fails during removal, the file is already gone and the on-disk
//! manifest still lists it. The archive remembers that the stored manifest is
//! stale and saves it again on the next creation, removal,
//! [`save_metadata`](CombineArchive::save_metadata) or
//! [`close`](CombineArchive::close).
//!
//! # Concurrency
//!
//! There is no internal locking. Every mutating operation takes `&mut self`,
//! so one instance is driven by one thread at a time. Streams handed out by
//! [`read_artifact`](CombineArchive::read_artifact) and
//! [`write_artifact`](CombineArchive::write_artifact) are independent owned
//! values; removing an artifact while a stream to it is open behaves however
//! the host platform does.

use crate::artifact::{ArtifactInfo, ArtifactIter};
use crate::config::ArchiveOptions;
use crate::error::{CombineError, Result};
use crate::fs::{ArchivePath, DirFs, PackedFs, VirtualFs};
use crate::manifest::{JsonManifest, ManifestStore};
use crate::metadata::{JsonMetadata, MetadataStore};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

/// A combine archive: artifacts plus manifest plus metadata
///
/// Lifecycle is `Open -> Closed`. [`close`](Self::close) saves the metadata
/// and releases the filesystem; afterwards every operation fails with
/// [`CombineError::Closed`]. An archive dropped while open is closed by its
/// `Drop` impl, with failures logged rather than returned.
pub struct CombineArchive<F = PackedFs, M = JsonManifest, D = JsonMetadata>
where
    F: VirtualFs,
    M: ManifestStore,
    D: MetadataStore,
{
    fs: Option<F>,
    manifest: M,
    metadata: D,
    reserved: Vec<ArchivePath>,
    /// Stored manifest lags the in-memory one
    manifest_dirty: bool,
}

impl CombineArchive<PackedFs, JsonManifest, JsonMetadata> {
    /// Start a new packed archive at `path` with default options
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with(path, ArchiveOptions::default())
    }

    pub fn create_with<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self> {
        let fs = PackedFs::create(path, options.clone())?;
        Self::with_options(fs, &options)
    }

    /// Open an existing packed archive at `path` with default options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, ArchiveOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self> {
        let fs = PackedFs::open(path, options.clone())?;
        Self::with_options(fs, &options)
    }
}

impl CombineArchive<DirFs, JsonManifest, JsonMetadata> {
    /// Use a host directory as an unpacked archive
    pub fn in_directory<P: AsRef<Path>>(root: P, options: ArchiveOptions) -> Result<Self> {
        let fs = DirFs::new(root)?;
        Self::with_options(fs, &options)
    }
}

impl<F: VirtualFs> CombineArchive<F, JsonManifest, JsonMetadata> {
    /// Wrap `fs` with JSON stores at the locations named in `options`
    pub fn with_options(fs: F, options: &ArchiveOptions) -> Result<Self> {
        Self::new(
            fs,
            JsonManifest::new(options),
            JsonMetadata::new(options),
            &[options.manifest_path.as_str(), options.metadata_path.as_str()],
        )
    }
}

impl<F, M, D> CombineArchive<F, M, D>
where
    F: VirtualFs,
    M: ManifestStore,
    D: MetadataStore,
{
    /// Assemble an archive from its collaborators
    ///
    /// `reserved` lists archive paths owned by the stores; artifacts may not
    /// be created at them, beneath them, or at one of their ancestors. The metadata record is loaded here so
    /// edits through [`metadata_mut`](Self::metadata_mut) start from the
    /// stored record; the manifest loads on first use.
    pub fn new(fs: F, manifest: M, mut metadata: D, reserved: &[&str]) -> Result<Self> {
        let reserved = reserved
            .iter()
            .map(|raw| fs.resolve(raw))
            .collect::<Result<Vec<_>>>()?;
        metadata.load(&fs)?;

        Ok(Self {
            fs: Some(fs),
            manifest,
            metadata,
            reserved,
            manifest_dirty: false,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.fs.is_none()
    }

    /// True iff `path` resolves, is not reserved, and nothing exists there.
    /// A closed archive answers `false`.
    pub fn can_create_artifact(&self, path: &str) -> bool {
        self.validate_new(path).is_ok()
    }

    /// Create an empty artifact
    pub fn create_artifact(&mut self, path: &str, content_type: &str) -> Result<ArtifactInfo> {
        self.insert(path, content_type, None)
    }

    /// Create an artifact holding every byte of `source`
    pub fn create_artifact_from<R: Read>(
        &mut self,
        path: &str,
        content_type: &str,
        mut source: R,
    ) -> Result<ArtifactInfo> {
        self.insert(path, content_type, Some(&mut source as &mut dyn Read))
    }

    /// Create an artifact from a file on the host
    pub fn create_artifact_from_file<P: AsRef<Path>>(
        &mut self,
        path: &str,
        content_type: &str,
        host_path: P,
    ) -> Result<ArtifactInfo> {
        self.validate_new(path)?;
        let file = File::open(host_path)?;
        self.create_artifact_from(path, content_type, file)
    }

    /// Delete an artifact's file and its manifest entry
    pub fn remove_artifact(&mut self, info: &ArtifactInfo) -> Result<()> {
        let target = self.existing(info)?;
        let (fs, manifest, _) = self.parts()?;

        manifest.load(&*fs)?;
        fs.delete(&target)?;
        manifest.remove_entry(target.as_str());
        if let Err(e) = manifest.save(fs) {
            warn!(path = %target, error = %e, "manifest save failed after artifact was deleted");
            self.manifest_dirty = true;
            return Err(e);
        }
        self.manifest_dirty = false;

        debug!(path = %target, "artifact removed");
        Ok(())
    }

    /// Open an artifact for reading from the start
    pub fn read_artifact(&self, info: &ArtifactInfo) -> Result<F::Reader> {
        let target = self.existing(info)?;
        self.fs()?.open_read(&target)
    }

    /// Open an artifact for writing; existing content is discarded
    pub fn write_artifact(&mut self, info: &ArtifactInfo) -> Result<F::Writer> {
        let target = self.existing(info)?;
        self.fs_mut()?.open_write(&target)
    }

    /// Whether anything exists at `info.path()` on the filesystem
    ///
    /// The manifest is not consulted. A path that does not resolve yields
    /// `false`.
    pub fn exists(&self, info: &ArtifactInfo) -> Result<bool> {
        let fs = self.fs()?;
        Ok(match fs.resolve(info.path()) {
            Ok(path) => fs.exists(&path),
            Err(_) => false,
        })
    }

    /// Look an artifact up in the manifest
    pub fn get_artifact(&mut self, path: &str) -> Result<Option<ArtifactInfo>> {
        let (fs, manifest, _) = self.parts()?;
        let Ok(target) = fs.resolve(path) else {
            return Ok(None);
        };

        manifest.load(&*fs)?;
        Ok(manifest
            .file_type(target.as_str())
            .map(|content_type| ArtifactInfo::new(target.as_str(), content_type)))
    }

    /// Snapshot of the artifacts listed in the manifest
    ///
    /// Each call takes a fresh snapshot; changes made while iterating are not
    /// observed by an existing iterator.
    pub fn artifacts(&mut self) -> Result<ArtifactIter> {
        let (fs, manifest, _) = self.parts()?;
        manifest.load(&*fs)?;

        let snapshot = manifest
            .file_paths()
            .map(|path| ArtifactInfo::new(path, manifest.file_type(path).unwrap_or_default()))
            .collect();
        Ok(ArtifactIter::new(snapshot))
    }

    /// Hex SHA-256 of an artifact's content
    pub fn digest_artifact(&self, info: &ArtifactInfo) -> Result<String> {
        let mut reader = self.read_artifact(info)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    pub fn manifest(&self) -> &M {
        &self.manifest
    }

    pub fn metadata(&self) -> &D {
        &self.metadata
    }

    /// Metadata store for annotation edits; persisted by
    /// [`save_metadata`](Self::save_metadata) or [`close`](Self::close)
    pub fn metadata_mut(&mut self) -> &mut D {
        &mut self.metadata
    }

    /// Persist the metadata record without closing
    ///
    /// A manifest left stale by an earlier failed save is written first.
    pub fn save_metadata(&mut self) -> Result<()> {
        self.flush_manifest()?;
        let (fs, _, metadata) = self.parts()?;
        metadata.load(&*fs)?;
        metadata.save(fs)
    }

    /// Save a stale manifest, stamp and save the metadata, then release the
    /// filesystem
    ///
    /// Must be called once. A failed close leaves the archive open so the
    /// call can be retried; a second call after success fails with
    /// [`CombineError::Closed`].
    pub fn close(&mut self) -> Result<()> {
        self.flush_manifest()?;
        let (fs, _, metadata) = self.parts()?;

        metadata.load(&*fs)?;
        metadata.update_modified_timestamp();
        metadata.save(fs)?;
        fs.close()?;

        self.fs = None;
        info!("archive closed");
        Ok(())
    }

    fn fs(&self) -> Result<&F> {
        self.fs.as_ref().ok_or(CombineError::Closed)
    }

    fn fs_mut(&mut self) -> Result<&mut F> {
        self.fs.as_mut().ok_or(CombineError::Closed)
    }

    fn parts(&mut self) -> Result<(&mut F, &mut M, &mut D)> {
        let fs = self.fs.as_mut().ok_or(CombineError::Closed)?;
        Ok((fs, &mut self.manifest, &mut self.metadata))
    }

    /// Rewrite the stored manifest if a previous save failed
    fn flush_manifest(&mut self) -> Result<()> {
        if !self.manifest_dirty {
            return Ok(());
        }

        let (fs, manifest, _) = self.parts()?;
        manifest.save(fs)?;
        self.manifest_dirty = false;
        debug!("stale manifest saved");
        Ok(())
    }

    /// Store paths, anything beneath them, and the directories they need
    fn is_reserved(&self, path: &ArchivePath) -> bool {
        self.reserved.iter().any(|r| {
            r == path || path.ancestors().contains(r) || r.ancestors().contains(path)
        })
    }

    /// Precondition for creation: a free, valid, unreserved path
    fn validate_new(&self, raw: &str) -> Result<ArchivePath> {
        let fs = self.fs()?;
        let path = fs
            .resolve(raw)
            .map_err(|e| CombineError::InvalidArgument(format!("Invalid file location: {}", e)))?;

        if self.is_reserved(&path) || fs.exists(&path) {
            return Err(CombineError::InvalidArgument(format!(
                "Invalid file location: {} is occupied",
                path
            )));
        }
        Ok(path)
    }

    /// Precondition for access and removal: an existing artifact file
    fn existing(&self, info: &ArtifactInfo) -> Result<ArchivePath> {
        let fs = self.fs()?;
        let path = fs.resolve(info.path()).map_err(|e| {
            CombineError::InvalidArgument(format!("entry must exist: {}", e))
        })?;

        if self.is_reserved(&path) || !fs.exists(&path) || fs.is_dir(&path) {
            return Err(CombineError::InvalidArgument(format!(
                "entry must exist: {}",
                info.path()
            )));
        }
        Ok(path)
    }

    fn insert(
        &mut self,
        raw: &str,
        content_type: &str,
        source: Option<&mut dyn Read>,
    ) -> Result<ArtifactInfo> {
        let target = self.validate_new(raw)?;
        if content_type.trim().is_empty() {
            return Err(CombineError::InvalidArgument(format!(
                "content type of {} must not be empty",
                target
            )));
        }

        let (fs, manifest, _) = self.parts()?;
        manifest.load(&*fs)?;

        if let Some(parent) = target.parent() {
            if !fs.exists(&parent) {
                fs.create_directories(&parent)?;
            }
        }
        fs.create_file(&target)?;

        if let Some(source) = source {
            if let Err(e) = fs.copy(source, &target, true) {
                warn!(path = %target, error = %e, "copy into new artifact failed; rolling back");
                discard(fs, &target);
                return Err(e);
            }
        }

        manifest.add_entry(target.as_str(), content_type);
        if let Err(e) = manifest.save(fs) {
            warn!(path = %target, error = %e, "manifest save failed; rolling back new artifact");
            manifest.remove_entry(target.as_str());
            discard(fs, &target);
            return Err(e);
        }
        self.manifest_dirty = false;

        debug!(path = %target, content_type, "artifact created");
        Ok(ArtifactInfo::new(target.as_str(), content_type))
    }
}

fn discard<F: VirtualFs>(fs: &mut F, path: &ArchivePath) {
    if let Err(e) = fs.delete(path) {
        warn!(path = %path, error = %e, "rollback could not delete file; it is now orphaned");
    }
}

impl<F, M, D> Drop for CombineArchive<F, M, D>
where
    F: VirtualFs,
    M: ManifestStore,
    D: MetadataStore,
{
    fn drop(&mut self) {
        if self.fs.is_some() {
            warn!("archive dropped while open; closing");
            if let Err(e) = self.close() {
                warn!(error = %e, "close during drop failed");
            }
        }
    }
}

use crate::config::ArchiveOptions;
use crate::container::{ContainerReader, ContainerWriter};
use crate::error::{CombineError, Result};
use crate::fs::{ArchivePath, DirFs, VirtualFs};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};
use tracing::{debug, info, warn};

/// Virtual filesystem backed by a single packed container file
///
/// Entries are unpacked into a private staging directory on open and all
/// operations run against it. [`close`](VirtualFs::close) repacks the staging
/// directory into a temporary file next to the container and atomically
/// replaces the container with it, so an interrupted close leaves the previous
/// container intact.
///
/// Dropping an open `PackedFs` discards every change made since it was opened.
pub struct PackedFs {
    container: PathBuf,
    options: ArchiveOptions,
    staging: Option<TempDir>,
    inner: DirFs,
}

impl PackedFs {
    /// Start a new, empty container at `path`; fails if the file exists
    pub fn create<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self> {
        let container = path.as_ref().to_path_buf();
        if container.exists() {
            return Err(CombineError::InvalidArgument(format!(
                "container already exists: {}",
                container.display()
            )));
        }

        let staging = tempfile::tempdir()?;
        let inner = DirFs::new(staging.path())?;
        info!(container = %container.display(), "created packed archive");

        Ok(Self {
            container,
            options,
            staging: Some(staging),
            inner,
        })
    }

    /// Open an existing container and unpack it for editing
    pub fn open<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self> {
        let container = path.as_ref().to_path_buf();
        let mut reader = ContainerReader::open(&container)?;

        let staging = tempfile::tempdir()?;
        let inner = DirFs::new(staging.path())?;

        let entries = reader.entries().to_vec();
        for entry in &entries {
            let archive_path = ArchivePath::parse(&entry.path)?;
            let host = inner.host_path(&archive_path);
            if entry.is_dir() {
                fs::create_dir_all(&host)?;
                continue;
            }
            if let Some(parent) = host.parent() {
                fs::create_dir_all(parent)?;
            }
            let data = reader.read_entry(&entry.path)?;
            fs::write(&host, data)?;
        }

        info!(
            container = %container.display(),
            entries = entries.len(),
            "opened packed archive"
        );

        Ok(Self {
            container,
            options,
            staging: Some(staging),
            inner,
        })
    }

    /// Open `path` if it exists, otherwise start a new container there
    pub fn open_or_create<P: AsRef<Path>>(path: P, options: ArchiveOptions) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, options)
        } else {
            Self::create(path, options)
        }
    }

    pub fn container_path(&self) -> &Path {
        &self.container
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Write the staging directory to the container
    fn repack(&self) -> Result<usize> {
        let parent = match self.container.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut temp = NamedTempFile::new_in(&parent)?;
        let entries = self.inner.walk()?;
        {
            let mut writer = ContainerWriter::new(temp.as_file_mut(), self.options.compression)?;
            for (path, is_dir) in &entries {
                if *is_dir {
                    writer.add_directory(path.relative())?;
                } else {
                    let data = fs::read(self.inner.host_path(path))?;
                    writer.add_file(path.relative(), &data)?;
                }
            }
            writer.finish()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.container)?;

        Ok(entries.len())
    }
}

impl VirtualFs for PackedFs {
    type Reader = File;
    type Writer = File;

    fn exists(&self, path: &ArchivePath) -> bool {
        self.inner.exists(path)
    }

    fn is_dir(&self, path: &ArchivePath) -> bool {
        self.inner.is_dir(path)
    }

    fn create_directories(&mut self, path: &ArchivePath) -> Result<()> {
        self.inner.create_directories(path)
    }

    fn create_file(&mut self, path: &ArchivePath) -> Result<()> {
        self.inner.create_file(path)
    }

    fn delete(&mut self, path: &ArchivePath) -> Result<()> {
        self.inner.delete(path)
    }

    fn copy(
        &mut self,
        source: &mut dyn Read,
        dest: &ArchivePath,
        overwrite: bool,
    ) -> Result<u64> {
        self.inner.copy(source, dest, overwrite)
    }

    fn open_read(&self, path: &ArchivePath) -> Result<File> {
        self.inner.open_read(path)
    }

    fn open_write(&mut self, path: &ArchivePath) -> Result<File> {
        self.inner.open_write(path)
    }

    fn close(&mut self) -> Result<()> {
        if self.inner.is_closed() {
            return Err(CombineError::Closed);
        }

        let count = self.repack()?;
        self.inner.close()?;
        if let Some(staging) = self.staging.take() {
            if let Err(e) = staging.close() {
                // The container is already written; a leftover staging dir is harmless
                debug!(error = %e, "failed to remove staging directory");
            }
        }

        info!(
            container = %self.container.display(),
            entries = count,
            "repacked archive"
        );
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl Drop for PackedFs {
    fn drop(&mut self) {
        if !self.inner.is_closed() {
            warn!(
                container = %self.container.display(),
                "packed archive dropped without close; changes discarded"
            );
        }
    }
}

impl std::fmt::Debug for PackedFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackedFs")
            .field("container", &self.container)
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

use crate::error::{CombineError, Result};
use crate::fs::{ArchivePath, VirtualFs};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Virtual filesystem mapped onto a host directory
///
/// Archive path `/a/b.txt` lives at `<root>/a/b.txt`. Paths are validated by
/// [`ArchivePath`], so nothing outside the root is reachable through this type.
#[derive(Debug)]
pub struct DirFs {
    root: PathBuf,
    closed: bool,
}

impl DirFs {
    /// Use an existing host directory as the archive root
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(CombineError::InvalidArgument(format!(
                "archive root is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root,
            closed: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host location of an archive path
    pub fn host_path(&self, path: &ArchivePath) -> PathBuf {
        self.root.join(path.relative())
    }

    /// Every entry under the root, sorted, flagged `true` for directories
    pub fn walk(&self) -> Result<Vec<(ArchivePath, bool)>> {
        self.ensure_open()?;
        let mut out = Vec::new();
        walk_into(&self.root, "", &mut out)?;
        out.sort();
        Ok(out)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(CombineError::Closed);
        }
        Ok(())
    }
}

fn walk_into(dir: &Path, prefix: &str, out: &mut Vec<(ArchivePath, bool)>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_str().ok_or_else(|| {
            CombineError::InvalidPath(format!("non UTF-8 name under {}", dir.display()))
        })?;
        let relative = format!("{}/{}", prefix, name);
        let path = ArchivePath::parse(&relative)?;

        if entry.file_type()?.is_dir() {
            out.push((path, true));
            walk_into(&entry.path(), &relative, out)?;
        } else {
            out.push((path, false));
        }
    }
    Ok(())
}

impl VirtualFs for DirFs {
    type Reader = File;
    type Writer = File;

    fn exists(&self, path: &ArchivePath) -> bool {
        !self.closed && self.host_path(path).exists()
    }

    fn is_dir(&self, path: &ArchivePath) -> bool {
        !self.closed && self.host_path(path).is_dir()
    }

    fn create_directories(&mut self, path: &ArchivePath) -> Result<()> {
        self.ensure_open()?;
        fs::create_dir_all(self.host_path(path))?;
        Ok(())
    }

    fn create_file(&mut self, path: &ArchivePath) -> Result<()> {
        self.ensure_open()?;
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.host_path(path))?;
        Ok(())
    }

    fn delete(&mut self, path: &ArchivePath) -> Result<()> {
        self.ensure_open()?;
        let host = self.host_path(path);
        if host.is_dir() {
            fs::remove_dir(host)?;
        } else {
            fs::remove_file(host)?;
        }
        Ok(())
    }

    fn copy(
        &mut self,
        source: &mut dyn Read,
        dest: &ArchivePath,
        overwrite: bool,
    ) -> Result<u64> {
        self.ensure_open()?;
        let host = self.host_path(dest);
        if !overwrite && host.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", dest),
            )
            .into());
        }
        let mut file = File::create(host)?;
        Ok(io::copy(source, &mut file)?)
    }

    fn open_read(&self, path: &ArchivePath) -> Result<File> {
        self.ensure_open()?;
        Ok(File::open(self.host_path(path))?)
    }

    fn open_write(&mut self, path: &ArchivePath) -> Result<File> {
        self.ensure_open()?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.host_path(path))?;
        Ok(file)
    }

    fn close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.closed = true;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

use crate::config::CompressionPolicy;
use crate::container::end_record::EndRecord;
use crate::container::format::{EntryRecord, FileHeader, FLAG_DIRECTORY, HEADER_SIZE};
use crate::error::Result;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes a packed container in one pass
///
/// A placeholder header is written up front and patched in [`finish`](Self::finish)
/// once the central directory location is known.
pub struct ContainerWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    entries: Vec<EntryRecord>,
    current_offset: u64,
    policy: CompressionPolicy,
}

impl<W: Write + Seek> ContainerWriter<W> {
    pub fn new(inner: W, policy: CompressionPolicy) -> Result<Self> {
        let mut writer = BufWriter::new(inner);
        writer.seek(SeekFrom::Start(0))?;
        FileHeader::new().write_to(&mut writer)?;

        Ok(Self {
            writer,
            entries: Vec::new(),
            current_offset: HEADER_SIZE as u64,
            policy,
        })
    }

    /// Add a file entry; `path` is relative to the container root
    pub fn add_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        let requested = self.policy.method_for(path, data.len() as u64);
        let (payload, compression) = requested.compress(data)?;

        let entry = EntryRecord {
            path: path.to_string(),
            data_offset: self.current_offset,
            uncompressed_size: data.len() as u64,
            compressed_size: payload.len() as u64,
            crc32: crc32fast::hash(data),
            modified_time: now_secs(),
            compression,
            flags: 0,
        };

        self.current_offset += entry.write_local(&mut self.writer)? as u64;
        self.writer.write_all(&payload)?;
        self.current_offset += payload.len() as u64;
        self.entries.push(entry);
        Ok(())
    }

    /// Add a directory entry, stored as `path/` with no payload
    pub fn add_directory(&mut self, path: &str) -> Result<()> {
        let entry = EntryRecord {
            path: format!("{}/", path.trim_end_matches('/')),
            data_offset: self.current_offset,
            uncompressed_size: 0,
            compressed_size: 0,
            crc32: 0,
            modified_time: now_secs(),
            compression: crate::container::CompressionMethod::None,
            flags: FLAG_DIRECTORY,
        };

        self.current_offset += entry.write_local(&mut self.writer)? as u64;
        self.entries.push(entry);
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Write the central directory and end record, patch the header, and
    /// hand back the underlying writer
    pub fn finish(mut self) -> Result<W> {
        let cd_offset = self.current_offset;
        let mut cd_size = 0u64;
        for entry in &self.entries {
            cd_size += entry.write_central(&mut self.writer)? as u64;
        }

        let mut header = FileHeader::new();
        header.central_directory_offset = cd_offset;
        header.central_directory_size = cd_size;
        header.entry_count = self.entries.len() as u32;

        EndRecord::for_header(&header).write_to(&mut self.writer)?;
        self.writer.flush()?;

        let mut inner = self.writer.into_inner().map_err(|e| e.into_error())?;
        inner.seek(SeekFrom::Start(0))?;
        header.write_to(&mut inner)?;
        inner.flush()?;

        Ok(inner)
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

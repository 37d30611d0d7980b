use crate::container::end_record::{EndRecord, END_RECORD_SIZE};
use crate::container::format::{EntryRecord, FileHeader, HEADER_SIZE};
use crate::error::{CombineError, Result};
use crate::fs::ArchivePath;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// Reads a packed container
///
/// The header, end record and central directory are validated on open; entry
/// payloads are read and CRC-checked on demand.
pub struct ContainerReader<R: Read + Seek> {
    reader: R,
    header: FileHeader,
    container_len: u64,
    entries: Vec<EntryRecord>,
    index: HashMap<String, usize>,
}

impl ContainerReader<BufReader<File>> {
    /// Open a container file on the host
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(BufReader::new(File::open(path)?))
    }
}

impl<R: Read + Seek> ContainerReader<R> {
    pub fn new(mut reader: R) -> Result<Self> {
        let container_len = reader.seek(SeekFrom::End(0))?;
        if container_len < (HEADER_SIZE + END_RECORD_SIZE) as u64 {
            return Err(CombineError::InvalidFormat(format!(
                "Container too small: {} bytes",
                container_len
            )));
        }

        reader.seek(SeekFrom::Start(0))?;
        let header = FileHeader::read_from(&mut reader)?;
        header.validate_version()?;

        reader.seek(SeekFrom::Start(container_len - END_RECORD_SIZE as u64))?;
        EndRecord::read_from(&mut reader)?.validate_against(&header)?;

        let cd_end = header
            .central_directory_offset
            .checked_add(header.central_directory_size)
            .ok_or_else(|| CombineError::InvalidFormat("Central directory overflows".into()))?;
        if header.central_directory_offset < HEADER_SIZE as u64
            || cd_end > container_len - END_RECORD_SIZE as u64
        {
            return Err(CombineError::InvalidFormat(
                "Central directory lies outside the container".to_string(),
            ));
        }

        reader.seek(SeekFrom::Start(header.central_directory_offset))?;
        let mut entries = Vec::new();
        let mut index = HashMap::new();
        for _ in 0..header.entry_count {
            let entry = EntryRecord::read_central(&mut reader)?;
            // Every stored path must survive archive path validation
            ArchivePath::parse(&entry.path)?;
            if entry.data_offset >= header.central_directory_offset
                || entry.compressed_size > container_len
            {
                return Err(CombineError::InvalidFormat(format!(
                    "Entry {} points outside the payload area",
                    entry.path
                )));
            }
            index.insert(entry.path.clone(), entries.len());
            entries.push(entry);
        }

        Ok(Self {
            reader,
            header,
            container_len,
            entries,
            index,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn entries(&self) -> &[EntryRecord] {
        &self.entries
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn get_entry(&self, path: &str) -> Option<&EntryRecord> {
        self.index.get(path).map(|&i| &self.entries[i])
    }

    /// Read and verify the payload of a file entry
    pub fn read_entry(&mut self, path: &str) -> Result<Vec<u8>> {
        let entry = self
            .get_entry(path)
            .cloned()
            .ok_or_else(|| CombineError::InvalidArgument(format!("No such entry: {}", path)))?;
        if entry.is_dir() {
            return Ok(Vec::new());
        }

        self.reader.seek(SeekFrom::Start(entry.data_offset))?;
        let local = EntryRecord::read_local(&mut self.reader)?;
        if local.path != entry.path
            || local.compressed_size != entry.compressed_size
            || local.crc32 != entry.crc32
        {
            return Err(CombineError::InvalidFormat(format!(
                "Local header for {} disagrees with central directory",
                entry.path
            )));
        }

        let position = self.reader.stream_position()?;
        if position + entry.compressed_size > self.container_len {
            return Err(CombineError::InvalidFormat(format!(
                "Payload of {} is truncated",
                entry.path
            )));
        }

        let mut payload = vec![0u8; entry.compressed_size as usize];
        self.reader.read_exact(&mut payload)?;

        let data = entry.compression.decompress(payload)?;
        if data.len() as u64 != entry.uncompressed_size {
            return Err(CombineError::DecompressionFailed(format!(
                "{}: expected {} bytes, got {}",
                entry.path,
                entry.uncompressed_size,
                data.len()
            )));
        }

        let actual = crc32fast::hash(&data);
        if actual != entry.crc32 {
            return Err(CombineError::CrcMismatch {
                path: entry.path,
                expected: entry.crc32,
                actual,
            });
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionPolicy;
    use crate::container::ContainerWriter;
    use std::io::Cursor;

    fn build(policy: CompressionPolicy, files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ContainerWriter::new(Cursor::new(Vec::new()), policy).unwrap();
        writer.add_directory("models").unwrap();
        for (path, data) in files {
            writer.add_file(path, data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_read_back_all_policies() {
        let big = b"<model id=\"m\"/>".repeat(1000);
        for policy in [
            CompressionPolicy::Auto,
            CompressionPolicy::None,
            CompressionPolicy::Lz4,
            CompressionPolicy::Zstd,
        ] {
            let bytes = build(policy, &[("models/m.xml", &big), ("readme.txt", b"hi")]);
            let mut reader = ContainerReader::new(Cursor::new(bytes)).unwrap();

            assert_eq!(reader.entry_count(), 3);
            assert!(reader.get_entry("models/").unwrap().is_dir());
            assert_eq!(reader.read_entry("models/m.xml").unwrap(), big);
            assert_eq!(reader.read_entry("readme.txt").unwrap(), b"hi");
        }
    }

    #[test]
    fn test_truncated_container_rejected() {
        let bytes = build(CompressionPolicy::None, &[("a.txt", b"hello world")]);
        for cut in [10, bytes.len() / 2, bytes.len() - 1] {
            let result = ContainerReader::new(Cursor::new(bytes[..cut].to_vec()));
            assert!(result.is_err(), "truncation at {} accepted", cut);
        }
    }

    #[test]
    fn test_payload_corruption_detected() {
        let mut bytes = build(CompressionPolicy::None, &[("a.txt", b"hello world")]);
        // Payload of the only file follows the directory and file local headers
        let pos = bytes
            .windows(11)
            .position(|w| w == b"hello world")
            .unwrap();
        bytes[pos] ^= 0xFF;

        let mut reader = ContainerReader::new(Cursor::new(bytes)).unwrap();
        assert!(matches!(
            reader.read_entry("a.txt"),
            Err(CombineError::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_traversal_entry_rejected() {
        let mut writer =
            ContainerWriter::new(Cursor::new(Vec::new()), CompressionPolicy::None).unwrap();
        writer.add_file("../escape.txt", b"x").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(matches!(
            ContainerReader::new(Cursor::new(bytes)),
            Err(CombineError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_missing_entry() {
        let bytes = build(CompressionPolicy::None, &[]);
        let mut reader = ContainerReader::new(Cursor::new(bytes)).unwrap();
        assert!(reader.read_entry("nope.txt").is_err());
    }
}

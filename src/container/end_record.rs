use crate::container::format::{read_u16, read_u32, read_u64, FileHeader};
use crate::error::{CombineError, Result};
use std::io::{Read, Write};

/// Signature of the end record ("ENDR")
pub const END_RECORD_SIGNATURE: [u8; 4] = *b"ENDR";

/// End record size in bytes
pub const END_RECORD_SIZE: usize = 32;

/// Trailer repeating the central directory location
///
/// A container whose trailer is missing or disagrees with its header was not
/// written to completion and is rejected.
///
/// Structure (32 bytes):
/// - Signature: "ENDR" (4 bytes)
/// - Version Major / Minor: uint16 each
/// - Central Directory Offset: uint64
/// - Central Directory Size: uint64
/// - Entry Count: uint32
/// - Reserved: 4 bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndRecord {
    pub version_major: u16,
    pub version_minor: u16,
    pub central_directory_offset: u64,
    pub central_directory_size: u64,
    pub entry_count: u32,
}

impl EndRecord {
    pub fn for_header(header: &FileHeader) -> Self {
        Self {
            version_major: header.version_major,
            version_minor: header.version_minor,
            central_directory_offset: header.central_directory_offset,
            central_directory_size: header.central_directory_size,
            entry_count: header.entry_count,
        }
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        writer.write_all(&END_RECORD_SIGNATURE)?;
        writer.write_all(&self.version_major.to_le_bytes())?;
        writer.write_all(&self.version_minor.to_le_bytes())?;
        writer.write_all(&self.central_directory_offset.to_le_bytes())?;
        writer.write_all(&self.central_directory_size.to_le_bytes())?;
        writer.write_all(&self.entry_count.to_le_bytes())?;
        writer.write_all(&[0u8; 4])?;
        Ok(END_RECORD_SIZE)
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        if sig != END_RECORD_SIGNATURE {
            return Err(CombineError::InvalidFormat(
                "Invalid end record signature (expected ENDR)".to_string(),
            ));
        }

        let record = Self {
            version_major: read_u16(&mut reader)?,
            version_minor: read_u16(&mut reader)?,
            central_directory_offset: read_u64(&mut reader)?,
            central_directory_size: read_u64(&mut reader)?,
            entry_count: read_u32(&mut reader)?,
        };

        let mut reserved = [0u8; 4];
        reader.read_exact(&mut reserved)?;

        Ok(record)
    }

    pub fn validate_against(&self, header: &FileHeader) -> Result<()> {
        if *self != Self::for_header(header) {
            return Err(CombineError::InvalidFormat(format!(
                "End record disagrees with header: directory at {} ({} entries) vs {} ({} entries)",
                self.central_directory_offset,
                self.entry_count,
                header.central_directory_offset,
                header.entry_count
            )));
        }
        Ok(())
    }
}

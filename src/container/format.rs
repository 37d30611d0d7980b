use crate::error::{CombineError, Result};
use std::io::{Read, Write};

/// Magic number: 0x89 'C' 'M' 'B' 0x0D 0x0A 0x1A 0x0A
/// Follows PNG pattern for corruption detection
pub const MAGIC_NUMBER: [u8; 8] = [0x89, b'C', b'M', b'B', 0x0D, 0x0A, 0x1A, 0x0A];

pub const FORMAT_VERSION_MAJOR: u16 = 1;
pub const FORMAT_VERSION_MINOR: u16 = 0;

/// Header size in bytes
pub const HEADER_SIZE: usize = 64;

/// Signature of a local entry header ("LOCA")
pub const LOCAL_ENTRY_SIGNATURE: [u8; 4] = *b"LOCA";

/// Signature of a central directory record ("CENT")
pub const CENTRAL_ENTRY_SIGNATURE: [u8; 4] = *b"CENT";

/// Entry flag: the entry is a directory and carries no payload
pub const FLAG_DIRECTORY: u8 = 0b0000_0001;

/// Files smaller than this are stored uncompressed
pub const MIN_COMPRESSION_SIZE: u64 = 4096;

/// Compression methods supported for entry payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressionMethod {
    None = 0,
    Lz4 = 1,
    Zstd = 2,
}

impl CompressionMethod {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            2 => Ok(Self::Zstd),
            _ => Err(CombineError::InvalidCompression(value)),
        }
    }

    /// Choose a method from the entry's extension and size
    pub fn choose_for_file(path: &str, size: u64) -> Self {
        if size < MIN_COMPRESSION_SIZE {
            return Self::None;
        }

        let extension = path.rsplit('.').next().unwrap_or("").to_lowercase();
        match extension.as_str() {
            // Already compressed
            "png" | "jpg" | "jpeg" | "gif" | "mp3" | "mp4" | "zip" | "omex" | "gz" | "7z" => {
                Self::None
            }
            // Models, notebooks and other structured text
            "xml" | "sbml" | "sedml" | "cellml" | "rdf" | "json" | "txt" | "md" | "csv" => {
                Self::Zstd
            }
            _ => Self::Lz4,
        }
    }

    /// Compress `data`; falls back to storing it raw when that is smaller
    pub fn compress(self, data: &[u8]) -> Result<(Vec<u8>, CompressionMethod)> {
        let compressed = match self {
            Self::None => return Ok((data.to_vec(), Self::None)),
            Self::Lz4 => lz4_flex::compress_prepend_size(data),
            Self::Zstd => zstd::encode_all(data, 6).map_err(|e| {
                CombineError::CompressionFailed(format!("Zstd compression failed: {}", e))
            })?,
        };

        if compressed.len() < data.len() {
            Ok((compressed, self))
        } else {
            Ok((data.to_vec(), Self::None))
        }
    }

    pub fn decompress(self, data: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(data),
            Self::Lz4 => lz4_flex::decompress_size_prepended(&data).map_err(|e| {
                CombineError::DecompressionFailed(format!("LZ4 decompression failed: {}", e))
            }),
            Self::Zstd => zstd::decode_all(data.as_slice()).map_err(|e| {
                CombineError::DecompressionFailed(format!("Zstd decompression failed: {}", e))
            }),
        }
    }
}

/// File header at the beginning of the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub version_major: u16,
    pub version_minor: u16,
    pub flags: u32,
    pub central_directory_offset: u64,
    pub central_directory_size: u64,
    pub entry_count: u32,
}

impl FileHeader {
    pub fn new() -> Self {
        Self {
            version_major: FORMAT_VERSION_MAJOR,
            version_minor: FORMAT_VERSION_MINOR,
            flags: 0,
            central_directory_offset: 0,
            central_directory_size: 0,
            entry_count: 0,
        }
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_all(&MAGIC_NUMBER)?;
        writer.write_all(&self.version_major.to_le_bytes())?;
        writer.write_all(&self.version_minor.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.central_directory_offset.to_le_bytes())?;
        writer.write_all(&self.central_directory_size.to_le_bytes())?;
        writer.write_all(&self.entry_count.to_le_bytes())?;
        writer.write_all(&[0u8; 28])?;
        Ok(())
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC_NUMBER {
            return Err(CombineError::InvalidMagic);
        }

        let header = Self {
            version_major: read_u16(&mut reader)?,
            version_minor: read_u16(&mut reader)?,
            flags: read_u32(&mut reader)?,
            central_directory_offset: read_u64(&mut reader)?,
            central_directory_size: read_u64(&mut reader)?,
            entry_count: read_u32(&mut reader)?,
        };

        let mut reserved = [0u8; 28];
        reader.read_exact(&mut reserved)?;

        Ok(header)
    }

    pub fn validate_version(&self) -> Result<()> {
        if self.version_major > FORMAT_VERSION_MAJOR {
            return Err(CombineError::UnsupportedVersion(
                self.version_major,
                self.version_minor,
            ));
        }
        Ok(())
    }
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// One container entry, as recorded in both the local header and the
/// central directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Entry path without leading slash; directories end with `/`
    pub path: String,
    /// Offset of the entry's local header
    pub data_offset: u64,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub crc32: u32,
    pub modified_time: u64,
    pub compression: CompressionMethod,
    pub flags: u8,
}

impl EntryRecord {
    pub fn is_dir(&self) -> bool {
        self.flags & FLAG_DIRECTORY != 0
    }

    /// Write the local header that precedes the payload; returns bytes written
    pub fn write_local<W: Write>(&self, mut writer: W) -> Result<usize> {
        let path_bytes = self.path_bytes()?;
        writer.write_all(&LOCAL_ENTRY_SIGNATURE)?;
        writer.write_all(&self.uncompressed_size.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        writer.write_all(&self.crc32.to_le_bytes())?;
        writer.write_all(&self.modified_time.to_le_bytes())?;
        writer.write_all(&[self.compression as u8, self.flags])?;
        writer.write_all(&(path_bytes.len() as u16).to_le_bytes())?;
        writer.write_all(path_bytes)?;
        Ok(36 + path_bytes.len())
    }

    /// Read a local header; `data_offset` is filled in by the caller
    pub fn read_local<R: Read>(mut reader: R) -> Result<Self> {
        expect_signature(&mut reader, LOCAL_ENTRY_SIGNATURE, "local entry")?;
        let uncompressed_size = read_u64(&mut reader)?;
        let compressed_size = read_u64(&mut reader)?;
        let crc32 = read_u32(&mut reader)?;
        let modified_time = read_u64(&mut reader)?;
        let (compression, flags) = read_method_and_flags(&mut reader)?;
        let path = read_path(&mut reader)?;

        Ok(Self {
            path,
            data_offset: 0,
            uncompressed_size,
            compressed_size,
            crc32,
            modified_time,
            compression,
            flags,
        })
    }

    /// Write the central directory record; returns bytes written
    pub fn write_central<W: Write>(&self, mut writer: W) -> Result<usize> {
        let path_bytes = self.path_bytes()?;
        writer.write_all(&CENTRAL_ENTRY_SIGNATURE)?;
        writer.write_all(&self.data_offset.to_le_bytes())?;
        writer.write_all(&self.uncompressed_size.to_le_bytes())?;
        writer.write_all(&self.compressed_size.to_le_bytes())?;
        writer.write_all(&self.crc32.to_le_bytes())?;
        writer.write_all(&self.modified_time.to_le_bytes())?;
        writer.write_all(&[self.compression as u8, self.flags])?;
        writer.write_all(&(path_bytes.len() as u16).to_le_bytes())?;
        writer.write_all(path_bytes)?;
        Ok(44 + path_bytes.len())
    }

    pub fn read_central<R: Read>(mut reader: R) -> Result<Self> {
        expect_signature(&mut reader, CENTRAL_ENTRY_SIGNATURE, "central directory")?;
        let data_offset = read_u64(&mut reader)?;
        let uncompressed_size = read_u64(&mut reader)?;
        let compressed_size = read_u64(&mut reader)?;
        let crc32 = read_u32(&mut reader)?;
        let modified_time = read_u64(&mut reader)?;
        let (compression, flags) = read_method_and_flags(&mut reader)?;
        let path = read_path(&mut reader)?;

        Ok(Self {
            path,
            data_offset,
            uncompressed_size,
            compressed_size,
            crc32,
            modified_time,
            compression,
            flags,
        })
    }

    fn path_bytes(&self) -> Result<&[u8]> {
        let bytes = self.path.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(CombineError::InvalidPath(format!(
                "entry path too long: {} bytes",
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

fn expect_signature<R: Read>(mut reader: R, expected: [u8; 4], what: &str) -> Result<()> {
    let mut sig = [0u8; 4];
    reader.read_exact(&mut sig)?;
    if sig != expected {
        return Err(CombineError::InvalidFormat(format!(
            "Invalid {} signature",
            what
        )));
    }
    Ok(())
}

fn read_method_and_flags<R: Read>(mut reader: R) -> Result<(CompressionMethod, u8)> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok((CompressionMethod::from_u8(buf[0])?, buf[1]))
}

fn read_path<R: Read>(mut reader: R) -> Result<String> {
    let len = read_u16(&mut reader)?;
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf)
        .map_err(|e| CombineError::InvalidFormat(format!("Invalid UTF-8 in entry path: {}", e)))
}

pub(crate) fn read_u16<R: Read>(mut reader: R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(mut reader: R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn read_u64<R: Read>(mut reader: R) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

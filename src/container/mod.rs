//! Packed container codec
//!
//! The on-disk layout behind [`PackedFs`](crate::fs::PackedFs):
//!
//! ```text
//! [header 64B][LOCA hdr][payload]...[LOCA hdr][payload][CENT]...[CENT][ENDR 32B]
//! ```

mod end_record;
mod format;
mod reader;
mod writer;

pub use end_record::{EndRecord, END_RECORD_SIGNATURE, END_RECORD_SIZE};
pub use format::{
    CompressionMethod, EntryRecord, FileHeader, CENTRAL_ENTRY_SIGNATURE, FLAG_DIRECTORY,
    FORMAT_VERSION_MAJOR, FORMAT_VERSION_MINOR, HEADER_SIZE, LOCAL_ENTRY_SIGNATURE, MAGIC_NUMBER,
    MIN_COMPRESSION_SIZE,
};
pub use reader::ContainerReader;
pub use writer::ContainerWriter;

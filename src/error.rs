//! Error type shared across the salvage pipeline.
#![forbid(unsafe_code)]

use std::io;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SalvageError>;

/// Errors produced while probing, reading, or rebuilding a store file.
#[derive(Debug, Error)]
pub enum SalvageError {
    /// Underlying file I/O failure.
    #[error("IO: {0}")]
    Io(#[from] io::Error),
    /// Neither meta slot of the source file could be read at the byte level.
    #[error("invalid database")]
    InvalidDatabase,
    /// Meta magic does not match the bolt marker value.
    #[error("invalid magic")]
    InvalidFormat,
    /// Meta version differs from the supported data file version.
    #[error("version mismatch")]
    VersionMismatch,
    /// Meta checksum does not match the hash of the preceding fields.
    #[error("checksum error")]
    ChecksumMismatch,
    /// A page read came up short of the requested span.
    #[error("unexpected end of file reading page {page_id}")]
    UnexpectedEof {
        /// Index of the page whose read was truncated.
        page_id: u64,
    },
    /// A page header carries an id different from its file position.
    #[error("unexpected page id: {got}, want: {want}")]
    IdMismatch {
        /// Id decoded from the page header.
        got: u64,
        /// Id implied by the read offset.
        want: u64,
    },
    /// A page's declared overflow span runs past the end of the file.
    #[error("page {page_id} with overflow {overflow} exceeds the file size {file_size}")]
    OverflowExceedsFile {
        /// Index of the offending page.
        page_id: u64,
        /// Overflow block count declared by the page.
        overflow: u32,
        /// Total size of the source file in bytes.
        file_size: u64,
    },
    /// A page header's type flags match none of the known page kinds.
    #[error("page {page_id} has unexpected page type {flags:#06x}")]
    UnknownPageType {
        /// Index of the offending page.
        page_id: u64,
        /// Raw type flags decoded from the header.
        flags: u16,
    },
    /// A codec access would fall outside the backing buffer.
    #[error("out of bounds: {0}")]
    OutOfBounds(&'static str),
    /// Invalid argument or misuse of a builder API.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),
}

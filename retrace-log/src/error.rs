use retrace_codec::{DecodeError, EncodeError};
use thiserror::Error;

/// Event log and buffer errors.
#[derive(Error, Debug)]
pub enum LogError {
    #[error("event encoding failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("event decoding failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("event index {index} out of range (log holds {len})")]
    OutOfRange { index: usize, len: usize },
}

/// Archive file errors.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive I/O: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a retrace archive")]
    BadMagic,
    #[error("archive header: {0}")]
    Header(String),
    #[error("unsupported format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u16, supported: u16 },
    #[error(transparent)]
    Log(#[from] LogError),
}

use retrace_codec::DecodeError;
use retrace_log::LogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("event {index} not found (log holds {len} playable events)")]
    EventNotFound { index: usize, len: usize },
    #[error("log is empty")]
    EmptyLog,
    #[error("first event must be a snapshot, found {found}")]
    MissingInitialSnapshot { found: &'static str },
    #[error("event {index} is not a snapshot")]
    NotASnapshot { index: usize },
    #[error(transparent)]
    Log(#[from] LogError),
    #[error("event decoding failed: {0}")]
    Decode(#[from] DecodeError),
}

//! Passive telemetry captured alongside the document: network traffic,
//! console output and performance entries. None of it affects replayed
//! document or interaction state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum NetworkMessage {
    Request {
        request_id: String,
        method: String,
        url: String,
        headers: BTreeMap<String, String>,
        body: Option<Vec<u8>>,
    },
    Response {
        request_id: String,
        status: u16,
        headers: BTreeMap<String, String>,
        body: Option<Vec<u8>>,
    },
    Failure {
        request_id: String,
        reason: String,
    },
}

impl NetworkMessage {
    pub fn request_id(&self) -> &str {
        match self {
            NetworkMessage::Request { request_id, .. }
            | NetworkMessage::Response { request_id, .. }
            | NetworkMessage::Failure { request_id, .. } => request_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConsoleLevel {
    Debug = 0,
    Log = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl ConsoleLevel {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ConsoleLevel::Debug),
            1 => Some(ConsoleLevel::Log),
            2 => Some(ConsoleLevel::Info),
            3 => Some(ConsoleLevel::Warn),
            4 => Some(ConsoleLevel::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub args: Vec<String>,
    pub stack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PerformanceEntry {
    /// Heap usage in bytes.
    Memory { used: u32, total: u32, limit: u32 },
    /// A named span, in ms relative to recording start.
    Timing {
        name: String,
        start: u32,
        duration: u32,
    },
}

//! On-disk recording container with per-event integrity checks.
//!
//! Layout:
//! ```text
//! ┌──────────┬─────────────┬──────────────────────┐
//! │ "RTRC"   │ header len  │ bincode ArchiveHeader │
//! ├──────────┼─────────────┼───────────┬──────────┴───────────┐
//! │ "EVT1"   │ payload len │ checksum  │ encoded SourceEvent   │  × N
//! └──────────┴─────────────┴───────────┴──────────────────────┘
//! ```
//!
//! All integers are little-endian u32. Each frame payload is one event in
//! the wire format, decodable on its own. Recovery verifies every frame and,
//! on damage, scans forward to the next frame marker: a torn write or a
//! flipped byte costs the affected events, never the rest of the file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::{debug, warn};
use retrace_core::{Schema, SourceEvent, FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ArchiveError;
use crate::event_log::EventLog;
use crate::recorder::Recording;

pub const ARCHIVE_MAGIC: [u8; 4] = *b"RTRC";
pub const FRAME_MAGIC: [u8; 4] = *b"EVT1";

/// Frame prefix: magic + length + checksum.
const FRAME_HEADER_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveHeader {
    pub format_version: u16,
    pub session_id: Uuid,
    /// Host wall-clock time of recording start.
    pub started_at_ms: u64,
    /// Version of the library that wrote the file.
    pub writer: String,
}

impl ArchiveHeader {
    pub fn new(session_id: Uuid, started_at_ms: u64) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            session_id,
            started_at_ms,
            writer: concat!("retrace-log/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn for_recording(recording: &Recording) -> Self {
        Self::new(recording.session_id, recording.started_at_ms)
    }

    fn encode(&self) -> Result<Vec<u8>, ArchiveError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| ArchiveError::Header(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let (header, _): (Self, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| ArchiveError::Header(e.to_string()))?;
        Ok(header)
    }
}

/// FNV-1a over the payload, word at a time.
fn frame_checksum(payload: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    hash ^= payload.len() as u32;
    hash = hash.wrapping_mul(0x0100_0193);
    for chunk in payload.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        hash ^= u32::from_le_bytes(word);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

// ─── Writing ─────────────────────────────────────────────────────────────────

pub struct ArchiveWriter<W: Write> {
    out: W,
    frames: u64,
}

impl ArchiveWriter<BufWriter<File>> {
    /// Create (or truncate) an archive file.
    pub fn create(path: impl AsRef<Path>, header: &ArchiveHeader) -> Result<Self, ArchiveError> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), header)
    }
}

impl<W: Write> ArchiveWriter<W> {
    pub fn new(mut out: W, header: &ArchiveHeader) -> Result<Self, ArchiveError> {
        let encoded = header.encode()?;
        out.write_all(&ARCHIVE_MAGIC)?;
        out.write_all(&(encoded.len() as u32).to_le_bytes())?;
        out.write_all(&encoded)?;
        Ok(Self { out, frames: 0 })
    }

    /// Append one already-encoded event.
    pub fn append(&mut self, payload: &[u8]) -> Result<(), ArchiveError> {
        self.out.write_all(&FRAME_MAGIC)?;
        self.out.write_all(&(payload.len() as u32).to_le_bytes())?;
        self.out.write_all(&frame_checksum(payload).to_le_bytes())?;
        self.out.write_all(payload)?;
        self.frames += 1;
        Ok(())
    }

    pub fn append_event(&mut self, event: &SourceEvent) -> Result<(), ArchiveError> {
        let payload = event.encode().map_err(crate::error::LogError::from)?;
        self.append(&payload)
    }

    pub fn append_log(&mut self, log: &EventLog) -> Result<(), ArchiveError> {
        for i in 0..log.len() {
            self.append(&log.event_bytes(i)?)?;
        }
        Ok(())
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(mut self) -> Result<W, ArchiveError> {
        self.out.flush()?;
        debug!("archive finished with {} frames", self.frames);
        Ok(self.out)
    }
}

/// Write a finished recording to `path`.
pub fn write_recording(path: impl AsRef<Path>, recording: &Recording) -> Result<(), ArchiveError> {
    let mut writer = ArchiveWriter::create(path, &ArchiveHeader::for_recording(recording))?;
    writer.append_log(&recording.log)?;
    writer.finish()?;
    Ok(())
}

// ─── Reading ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Archive {
    pub header: ArchiveHeader,
    pub log: EventLog,
    /// Damaged regions skipped during recovery.
    pub corrupted_frames: usize,
}

impl Archive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parse an archive, keeping every frame that verifies.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArchiveError> {
        if bytes.len() < 8 || bytes[..4] != ARCHIVE_MAGIC {
            return Err(ArchiveError::BadMagic);
        }
        let header_len = read_u32(bytes, 4).ok_or(ArchiveError::BadMagic)? as usize;
        let header_end = 8 + header_len;
        let header_bytes = bytes
            .get(8..header_end)
            .ok_or_else(|| ArchiveError::Header("truncated header".into()))?;
        let header = ArchiveHeader::decode(header_bytes)?;
        if header.format_version > FORMAT_VERSION {
            return Err(ArchiveError::UnsupportedVersion {
                found: header.format_version,
                supported: FORMAT_VERSION,
            });
        }

        let (frames, corrupted_frames) = recover_frames(bytes, header_end);
        if corrupted_frames > 0 {
            warn!(
                "archive {}: skipped {corrupted_frames} damaged regions, kept {} events",
                header.session_id,
                frames.len()
            );
        }
        let log = EventLog::from_encoded(&frames)?;
        Ok(Self {
            header,
            log,
            corrupted_frames,
        })
    }
}

/// Walk frames from `start`. Returns verified payloads and the number of
/// damaged regions skipped.
fn recover_frames(bytes: &[u8], start: usize) -> (Vec<&[u8]>, usize) {
    let mut frames = Vec::new();
    let mut corrupted = 0;
    let mut pos = start;
    while pos < bytes.len() {
        match read_frame(bytes, pos) {
            Some((payload, next)) => {
                frames.push(payload);
                pos = next;
            }
            None => {
                corrupted += 1;
                pos = next_frame_marker(bytes, pos + 1);
            }
        }
    }
    (frames, corrupted)
}

/// A frame at `pos` whose checksum matches and whose payload decodes.
fn read_frame(bytes: &[u8], pos: usize) -> Option<(&[u8], usize)> {
    if bytes.get(pos..pos + 4)? != FRAME_MAGIC {
        return None;
    }
    let len = read_u32(bytes, pos + 4)? as usize;
    let checksum = read_u32(bytes, pos + 8)?;
    let start = pos + FRAME_HEADER_LEN;
    let payload = bytes.get(start..start.checked_add(len)?)?;
    if frame_checksum(payload) != checksum {
        return None;
    }
    if let Err(e) = SourceEvent::decode(payload) {
        warn!("frame at byte {pos} passed its checksum but does not decode: {e}");
        return None;
    }
    Some((payload, start + len))
}

fn next_frame_marker(bytes: &[u8], from: usize) -> usize {
    bytes
        .get(from..)
        .and_then(|rest| rest.windows(4).position(|w| w == FRAME_MAGIC))
        .map_or(bytes.len(), |i| from + i)
}

fn read_u32(bytes: &[u8], pos: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(pos..pos + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::{Interaction, Point, Snapshot};

    fn events() -> Vec<SourceEvent> {
        let mut events = vec![SourceEvent::snapshot(0, Snapshot::default())];
        for t in 1..5 {
            events.push(SourceEvent::interaction(
                t * 10,
                Interaction::Click {
                    target: None,
                    position: Point::new(t as i32, t as i32),
                },
            ));
        }
        events
    }

    fn header() -> ArchiveHeader {
        ArchiveHeader::new(Uuid::new_v4(), 1_700_000_000_000)
    }

    fn archive_bytes() -> Vec<u8> {
        let mut writer = ArchiveWriter::new(Vec::new(), &header()).unwrap();
        for ev in events() {
            writer.append_event(&ev).unwrap();
        }
        assert_eq!(writer.frames_written(), 5);
        writer.finish().unwrap()
    }

    fn frame_positions(bytes: &[u8]) -> Vec<usize> {
        bytes
            .windows(4)
            .enumerate()
            .filter(|(_, w)| *w == FRAME_MAGIC)
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_frame_checksum_detects_change() {
        let a = frame_checksum(b"payload");
        assert_eq!(a, frame_checksum(b"payload"));
        assert_ne!(a, frame_checksum(b"paylaod"));
        assert_ne!(frame_checksum(b"ab"), frame_checksum(b"ab\0"));
    }

    #[test]
    fn test_round_trip() {
        let archive = Archive::from_bytes(&archive_bytes()).unwrap();
        assert_eq!(archive.corrupted_frames, 0);
        assert_eq!(archive.header.format_version, FORMAT_VERSION);
        let decoded: Vec<_> = archive.log.iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(decoded, events());
    }

    #[test]
    fn test_corrupted_frame_is_skipped() {
        let mut bytes = archive_bytes();
        let frames = frame_positions(&bytes);
        assert_eq!(frames.len(), 5);
        // Flip a payload byte of the third frame.
        bytes[frames[2] + FRAME_HEADER_LEN] ^= 0xFF;
        let archive = Archive::from_bytes(&bytes).unwrap();
        assert_eq!(archive.corrupted_frames, 1);
        assert_eq!(archive.log.len(), 4);
        assert_eq!(archive.log.time_at(2).unwrap(), 30);
    }

    #[test]
    fn test_truncated_tail_is_skipped() {
        let mut bytes = archive_bytes();
        bytes.truncate(bytes.len() - 3);
        let archive = Archive::from_bytes(&bytes).unwrap();
        assert_eq!(archive.log.len(), 4);
        assert_eq!(archive.corrupted_frames, 1);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = archive_bytes();
        bytes[0] = b'X';
        assert!(matches!(Archive::from_bytes(&bytes), Err(ArchiveError::BadMagic)));
        assert!(matches!(Archive::from_bytes(&[]), Err(ArchiveError::BadMagic)));
    }

    #[test]
    fn test_newer_format_is_rejected() {
        let mut h = header();
        h.format_version = FORMAT_VERSION + 1;
        let bytes = ArchiveWriter::new(Vec::new(), &h).unwrap().finish().unwrap();
        assert!(matches!(
            Archive::from_bytes(&bytes),
            Err(ArchiveError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.rtrc");
        let recording = Recording {
            session_id: Uuid::new_v4(),
            started_at_ms: 42,
            log: EventLog::from_events(&events()).unwrap(),
        };
        write_recording(&path, &recording).unwrap();
        let archive = Archive::open(&path).unwrap();
        assert_eq!(archive.header.session_id, recording.session_id);
        assert_eq!(archive.header.started_at_ms, 42);
        assert_eq!(archive.log, recording.log);
    }
}

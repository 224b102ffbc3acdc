//! The exported log: one buffer holding `vector(SourceEvent)`.
//!
//! ```text
//! [count u32][offset u32 × count][event 0][event 1] ...
//! ```
//!
//! Any event is reachable in O(1) through the offset table, and reading an
//! event's time or kind touches only its first bytes. The buffer is
//! self-describing given the event descriptor, so it can be stored or
//! shipped as-is.

use std::sync::OnceLock;

use retrace_codec::{
    decode_lazy, encode_vector_from_items, Descriptor, Schema, View,
};
use retrace_core::{peek_kind, peek_time, EventKind, SourceEvent};

use crate::error::LogError;

/// Descriptor of a whole log buffer.
pub fn log_descriptor() -> &'static Descriptor {
    static D: OnceLock<Descriptor> = OnceLock::new();
    D.get_or_init(|| Descriptor::vector(SourceEvent::descriptor().clone()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    bytes: Vec<u8>,
    len: usize,
}

impl EventLog {
    /// Wrap an encoded log buffer. Only the event count is read here;
    /// individual events are checked when accessed.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, LogError> {
        let len = decode_lazy(log_descriptor(), &bytes).len()?;
        Ok(Self { bytes, len })
    }

    pub fn from_events(events: &[SourceEvent]) -> Result<Self, LogError> {
        let encoded = events
            .iter()
            .map(|e| e.encode())
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_encoded(&encoded)
    }

    /// Assemble from events that are already encoded.
    pub fn from_encoded<B: AsRef<[u8]>>(events: &[B]) -> Result<Self, LogError> {
        let bytes = encode_vector_from_items(events)?;
        Ok(Self {
            bytes,
            len: events.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Whole-log lazy view.
    pub fn view(&self) -> View<'_> {
        decode_lazy(log_descriptor(), &self.bytes)
    }

    /// Lazy view of event `index`.
    pub fn event_view(&self, index: usize) -> Result<View<'_>, LogError> {
        if index >= self.len {
            return Err(LogError::OutOfRange {
                index,
                len: self.len,
            });
        }
        Ok(self.view().item(index)?)
    }

    /// Fully decoded event `index`.
    pub fn get(&self, index: usize) -> Result<SourceEvent, LogError> {
        Ok(SourceEvent::from_view(self.event_view(index)?)?)
    }

    pub fn time_at(&self, index: usize) -> Result<u32, LogError> {
        Ok(peek_time(&self.event_view(index)?)?)
    }

    pub fn kind_at(&self, index: usize) -> Result<EventKind, LogError> {
        Ok(peek_kind(&self.event_view(index)?)?)
    }

    /// Byte offset of event `index` inside the buffer.
    pub fn offset_of(&self, index: usize) -> Result<usize, LogError> {
        Ok(self.event_view(index)?.offset())
    }

    /// Independent copy of event `index`'s encoded bytes.
    pub fn event_bytes(&self, index: usize) -> Result<Vec<u8>, LogError> {
        Ok(self.event_view(index)?.copy()?)
    }

    /// Decode every event in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<SourceEvent, LogError>> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// Time span from first to last event, or 0 for an empty log.
    pub fn duration(&self) -> Result<u32, LogError> {
        if self.len == 0 {
            return Ok(0);
        }
        let first = self.time_at(0)?;
        let last = self.time_at(self.len - 1)?;
        Ok(last.saturating_sub(first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::{Interaction, Point, Snapshot};

    fn events() -> Vec<SourceEvent> {
        vec![
            SourceEvent::snapshot(0, Snapshot::default()),
            SourceEvent::interaction(
                40,
                Interaction::Click {
                    target: None,
                    position: Point::new(1, 2),
                },
            ),
            SourceEvent::interaction(
                90,
                Interaction::PageTransition {
                    url: "https://example.test/b".into(),
                },
            ),
        ]
    }

    #[test]
    fn test_random_access() {
        let log = EventLog::from_events(&events()).unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.time_at(1).unwrap(), 40);
        assert_eq!(log.kind_at(0).unwrap(), EventKind::Snapshot);
        assert_eq!(log.get(2).unwrap(), events()[2]);
        assert_eq!(log.duration().unwrap(), 90);
    }

    #[test]
    fn test_bytes_round_trip() {
        let log = EventLog::from_events(&events()).unwrap();
        let again = EventLog::from_bytes(log.as_bytes().to_vec()).unwrap();
        assert_eq!(again, log);
        let decoded: Vec<SourceEvent> = again.iter().collect::<Result<_, _>>().unwrap();
        assert_eq!(decoded, events());
    }

    #[test]
    fn test_out_of_range() {
        let log = EventLog::from_events(&events()).unwrap();
        assert!(matches!(
            log.get(3),
            Err(LogError::OutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_empty_log() {
        let log = EventLog::from_events(&[]).unwrap();
        assert!(log.is_empty());
        assert_eq!(log.duration().unwrap(), 0);
        assert_eq!(log.as_bytes(), &[0, 0, 0, 0]);
    }
}

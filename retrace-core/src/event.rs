//! Source events: everything a recording contains, stamped with the
//! milliseconds elapsed since recording start.

use serde::{Deserialize, Serialize};

use crate::interaction::Interaction;
use crate::patch::Patch;
use crate::snapshot::Snapshot;
use crate::telemetry::{ConsoleMessage, NetworkMessage, PerformanceEntry};

/// Wire tag of each event variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    Snapshot = 0,
    DomPatch = 1,
    Interaction = 2,
    Network = 3,
    Console = 4,
    Performance = 5,
}

impl EventKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(EventKind::Snapshot),
            1 => Some(EventKind::DomPatch),
            2 => Some(EventKind::Interaction),
            3 => Some(EventKind::Network),
            4 => Some(EventKind::Console),
            5 => Some(EventKind::Performance),
            _ => None,
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            EventKind::Snapshot => "snapshot",
            EventKind::DomPatch => "dom-patch",
            EventKind::Interaction => "interaction",
            EventKind::Network => "network",
            EventKind::Console => "console",
            EventKind::Performance => "performance",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventData {
    Snapshot(Snapshot),
    DomPatch(Patch),
    Interaction(Interaction),
    Network(NetworkMessage),
    Console(ConsoleMessage),
    Performance(PerformanceEntry),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEvent {
    /// Milliseconds since recording start. Non-decreasing along a log.
    pub time: u32,
    #[serde(flatten)]
    pub data: EventData,
}

impl SourceEvent {
    pub fn new(time: u32, data: EventData) -> Self {
        Self { time, data }
    }

    pub fn snapshot(time: u32, snapshot: Snapshot) -> Self {
        Self::new(time, EventData::Snapshot(snapshot))
    }

    pub fn patch(time: u32, patch: Patch) -> Self {
        Self::new(time, EventData::DomPatch(patch))
    }

    pub fn interaction(time: u32, interaction: Interaction) -> Self {
        Self::new(time, EventData::Interaction(interaction))
    }

    pub fn kind(&self) -> EventKind {
        match &self.data {
            EventData::Snapshot(_) => EventKind::Snapshot,
            EventData::DomPatch(_) => EventKind::DomPatch,
            EventData::Interaction(_) => EventKind::Interaction,
            EventData::Network(_) => EventKind::Network,
            EventData::Console(_) => EventKind::Console,
            EventData::Performance(_) => EventKind::Performance,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self.data, EventData::Snapshot(_))
    }

    /// Duration of a continuous interaction sample, if any.
    pub fn sample_duration(&self) -> Option<u32> {
        match &self.data {
            EventData::Interaction(i) => i.sample_duration(),
            _ => None,
        }
    }

    /// `true` if this is a sample still in progress at `target`.
    pub fn straddles(&self, target: u32) -> bool {
        self.sample_duration()
            .is_some_and(|d| self.time as u64 + d as u64 > target as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{Point, Sample};

    #[test]
    fn test_straddling_rule() {
        let mv = SourceEvent::interaction(
            1000,
            Interaction::PointerMove {
                sample: Sample::new(Point::ZERO, Point::new(50, 0), 500),
            },
        );
        assert!(mv.straddles(1200));
        assert!(mv.straddles(1499));
        assert!(!mv.straddles(1500));

        let nav = SourceEvent::interaction(
            1000,
            Interaction::PageTransition {
                url: "https://example.test/".into(),
            },
        );
        assert!(!nav.straddles(900));
    }

    #[test]
    fn test_kind_tags_round_trip() {
        for tag in 0..6 {
            assert_eq!(EventKind::from_tag(tag).unwrap().tag(), tag);
        }
        assert!(EventKind::from_tag(6).is_none());
    }

    #[test]
    fn test_json_shape() {
        let ev = SourceEvent::snapshot(5, Snapshot::default());
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["time"], 5);
        assert_eq!(json["type"], "Snapshot");
        assert!(json["data"]["dom"].is_null());
    }
}

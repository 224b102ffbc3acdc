//! Time index over an event log, built in one pass. Only interaction
//! payloads are decoded, to learn how long their samples run.

use log::{debug, warn};
use retrace_core::EventKind;
use retrace_log::EventLog;

use crate::error::PlayerError;

/// A snapshot event's position in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Event index.
    pub index: usize,
    pub time: u32,
    /// Byte offset inside the log buffer.
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct LogIndex {
    times: Vec<u32>,
    snapshots: Vec<SnapshotEntry>,
    /// Per snapshot: earlier samples still running at its time.
    carried: Vec<Vec<usize>>,
}

impl LogIndex {
    /// Scan `log`. Indexing stops at the first event that fails to decode
    /// or goes back in time; everything before it stays playable.
    pub fn build(log: &EventLog) -> Result<Self, PlayerError> {
        if log.is_empty() {
            return Err(PlayerError::EmptyLog);
        }
        let first = log.kind_at(0)?;
        if first != EventKind::Snapshot {
            return Err(PlayerError::MissingInitialSnapshot { found: first.name() });
        }

        let mut times = Vec::with_capacity(log.len());
        let mut snapshots = Vec::new();
        let mut carried = Vec::new();
        // (index, end time) of samples seen so far that may still run.
        let mut running: Vec<(usize, u64)> = Vec::new();
        for i in 0..log.len() {
            let entry = log
                .time_at(i)
                .and_then(|time| Ok((time, log.kind_at(i)?, log.offset_of(i)?)));
            let (time, kind, offset) = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("event {i} is unreadable, playback stops before it: {e}");
                    break;
                }
            };
            if times.last().is_some_and(|&prev| time < prev) {
                warn!("event {i} goes back in time ({time}ms), playback stops before it");
                break;
            }
            match kind {
                EventKind::Snapshot => {
                    running.retain(|&(_, end)| end > u64::from(time));
                    carried.push(running.iter().map(|&(index, _)| index).collect());
                    snapshots.push(SnapshotEntry {
                        index: i,
                        time,
                        offset,
                    });
                }
                EventKind::Interaction => match log.get(i) {
                    Ok(event) => {
                        if let Some(duration) = event.sample_duration() {
                            running.push((i, u64::from(time) + u64::from(duration)));
                        }
                    }
                    Err(e) => warn!("interaction {i} does not decode, it will be skipped: {e}"),
                },
                _ => {}
            }
            times.push(time);
        }
        debug!(
            "indexed {} of {} events, {} snapshots",
            times.len(),
            log.len(),
            snapshots.len()
        );
        Ok(Self {
            times,
            snapshots,
            carried,
        })
    }

    /// Number of playable events.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn time(&self, index: usize) -> Option<u32> {
        self.times.get(index).copied()
    }

    pub fn first_time(&self) -> u32 {
        self.times.first().copied().unwrap_or(0)
    }

    pub fn last_time(&self) -> u32 {
        self.times.last().copied().unwrap_or(0)
    }

    pub fn duration(&self) -> u32 {
        self.last_time() - self.first_time()
    }

    pub fn snapshots(&self) -> &[SnapshotEntry] {
        &self.snapshots
    }

    /// Latest snapshot at or before absolute time `time`.
    pub fn snapshot_for_time(&self, time: u32) -> SnapshotEntry {
        let n = self.snapshots.partition_point(|s| s.time <= time);
        self.snapshots[n.saturating_sub(1)]
    }

    /// Latest snapshot at or before event `index`.
    pub fn snapshot_for_index(&self, index: usize) -> SnapshotEntry {
        let n = self.snapshots.partition_point(|s| s.index <= index);
        self.snapshots[n.saturating_sub(1)]
    }

    /// Samples from before `entry` still running at its time, in log order.
    pub fn samples_across(&self, entry: &SnapshotEntry) -> &[usize] {
        self.snapshots
            .binary_search_by_key(&entry.index, |s| s.index)
            .ok()
            .and_then(|pos| self.carried.get(pos))
            .map_or(&[], Vec::as_slice)
    }

    /// Stop using the snapshot at event `index` as a seek base and return
    /// the one before it. The first snapshot is never dropped.
    pub fn drop_snapshot(&mut self, index: usize) -> Option<SnapshotEntry> {
        let pos = self.snapshots.iter().position(|s| s.index == index)?;
        if pos == 0 {
            return None;
        }
        self.snapshots.remove(pos);
        self.carried.remove(pos);
        Some(self.snapshots[pos - 1])
    }

    /// Index one past the last event with time `<= time`.
    pub fn end_for_time(&self, time: u32) -> usize {
        self.times.partition_point(|&t| t <= time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::{Interaction, Point, Sample, Snapshot, SourceEvent};

    fn click(time: u32) -> SourceEvent {
        SourceEvent::interaction(
            time,
            Interaction::Click {
                target: None,
                position: Point::ZERO,
            },
        )
    }

    fn snap(time: u32) -> SourceEvent {
        SourceEvent::snapshot(time, Snapshot::default())
    }

    #[test]
    fn test_index_snapshots_and_duration() {
        let log =
            EventLog::from_events(&[snap(100), click(150), snap(200), click(250), click(250)])
                .unwrap();
        let index = LogIndex::build(&log).unwrap();
        assert_eq!(index.len(), 5);
        assert_eq!(index.duration(), 150);
        assert_eq!(index.snapshots().len(), 2);
        assert_eq!(index.snapshots()[1].offset, log.offset_of(2).unwrap());

        assert_eq!(index.snapshot_for_time(199).index, 0);
        assert_eq!(index.snapshot_for_time(200).index, 2);
        assert_eq!(index.snapshot_for_time(50).index, 0);
        assert_eq!(index.snapshot_for_index(4).index, 2);
        assert_eq!(index.end_for_time(250), 5);
        assert_eq!(index.end_for_time(249), 3);
    }

    #[test]
    fn test_samples_across_snapshots() {
        let sweep = |time: u32, duration: u32| {
            SourceEvent::interaction(
                time,
                Interaction::PointerMove {
                    sample: Sample::new(Point::ZERO, Point::new(10, 0), duration),
                },
            )
        };
        let log = EventLog::from_events(&[
            snap(0),
            sweep(100, 50),
            sweep(900, 500),
            snap(1000),
            snap(1400),
            snap(2000),
        ])
        .unwrap();
        let index = LogIndex::build(&log).unwrap();
        let across: Vec<&[usize]> = index
            .snapshots()
            .iter()
            .map(|s| index.samples_across(s))
            .collect();
        let expected: Vec<&[usize]> = vec![&[], &[2], &[], &[]];
        assert_eq!(across, expected);
    }

    #[test]
    fn test_drop_snapshot_falls_back() {
        let log = EventLog::from_events(&[snap(0), click(10), snap(20), snap(30)]).unwrap();
        let mut index = LogIndex::build(&log).unwrap();
        assert_eq!(index.drop_snapshot(3).map(|s| s.index), Some(2));
        assert_eq!(index.snapshot_for_time(35).index, 2);
        assert_eq!(index.drop_snapshot(0), None);
        assert_eq!(index.drop_snapshot(7), None);
        assert_eq!(index.snapshots().len(), 2);
    }

    #[test]
    fn test_requires_leading_snapshot() {
        let log = EventLog::from_events(&[click(0), snap(1)]).unwrap();
        assert!(matches!(
            LogIndex::build(&log),
            Err(PlayerError::MissingInitialSnapshot { .. })
        ));
        let empty = EventLog::from_events(&[]).unwrap();
        assert!(matches!(LogIndex::build(&empty), Err(PlayerError::EmptyLog)));
    }

    #[test]
    fn test_stops_at_time_regression() {
        let log = EventLog::from_events(&[snap(0), click(10), click(5), click(20)]).unwrap();
        let index = LogIndex::build(&log).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.duration(), 10);
    }

    #[test]
    fn test_stops_at_unreadable_event() {
        let log = EventLog::from_events(&[snap(0), click(10), click(20)]).unwrap();
        let mut bytes = log.into_bytes();
        // Corrupt the union tag of the last event.
        let offset = EventLog::from_bytes(bytes.clone()).unwrap().offset_of(2).unwrap();
        bytes[offset] = 0xEE;
        let damaged = EventLog::from_bytes(bytes).unwrap();
        let index = LogIndex::build(&damaged).unwrap();
        assert_eq!(index.len(), 2);
    }
}

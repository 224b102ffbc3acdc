//! Byte-budgeted event buffer with a rolling leading snapshot.
//!
//! ```text
//!   push(event) ──▸ encode ──▸ [ e0 | e1 | e2 | ... | eN ] ──▸ tail subscribers
//!                                 │
//!                  over budget?   ▼  pop oldest
//!                    fold into leading snapshot (at time of first retained)
//!
//!   slice():  [leading?] e_k .. e_N [current]   times rebased to 0
//! ```
//!
//! Every pushed event is also folded into `current`, so the buffer can
//! always close an export with a snapshot of the latest state. Samples still
//! in progress are re-folded at each later push, the same way playback
//! re-applies them every frame, so `current` follows pointer, scroll and
//! viewport motion rather than freezing at each sample's start. Eviction
//! never fails: capacity pressure only ever moves state from retained events
//! into the leading snapshot.

use std::collections::VecDeque;
use std::sync::Arc;

use log::{debug, trace, warn};
use retrace_core::{apply_event_to_snapshot, Schema, Snapshot, SourceEvent};
use tokio::sync::{broadcast, watch};

use crate::config::BufferConfig;
use crate::error::LogError;
use crate::event_log::EventLog;
use crate::tail::Tail;

/// One retained, encoded event.
#[derive(Debug, Clone)]
struct Entry {
    time: u32,
    bytes: Vec<u8>,
}

/// Buffer counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferStats {
    pub events_pushed: u64,
    pub events_evicted: u64,
    pub bytes_evicted: u64,
    /// Events whose fold into a snapshot failed (logged and skipped).
    pub fold_failures: u64,
}

pub struct EventBuffer {
    config: BufferConfig,
    entries: VecDeque<Entry>,
    total_bytes: usize,
    /// State as of the oldest retained entry.
    leading: Snapshot,
    /// State after the newest pushed event.
    current: Snapshot,
    /// Samples still in progress at `last_time`.
    running: Vec<SourceEvent>,
    /// Time of the newest pushed event.
    last_time: u32,
    sender: broadcast::Sender<Arc<SourceEvent>>,
    stats: BufferStats,
}

impl EventBuffer {
    pub fn new(config: BufferConfig) -> Self {
        let (sender, _) = broadcast::channel(config.tail_capacity.max(1));
        Self {
            config,
            entries: VecDeque::new(),
            total_bytes: 0,
            leading: Snapshot::default(),
            current: Snapshot::default(),
            running: Vec::new(),
            last_time: 0,
            sender,
            stats: BufferStats::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(BufferConfig::default())
    }

    /// Encode and append an event, evicting the oldest entries while the
    /// buffer is over its byte budget.
    pub fn push(&mut self, event: SourceEvent) -> Result<(), LogError> {
        let bytes = event.encode()?;

        self.fold_current(&event);

        self.total_bytes += bytes.len();
        self.entries.push_back(Entry {
            time: event.time,
            bytes,
        });
        self.stats.events_pushed += 1;

        self.evict();

        if self.sender.receiver_count() > 0 {
            // No receivers between the check and the send is fine.
            self.sender.send(Arc::new(event)).unwrap_or(0);
        }
        Ok(())
    }

    /// Re-fold running samples at `event.time`, then fold `event` itself.
    /// Samples that have not finished by then stay running.
    fn fold_current(&mut self, event: &SourceEvent) {
        let at = event.time;
        for sample in std::mem::take(&mut self.running) {
            // Interaction folds cannot fail.
            apply_event_to_snapshot(&mut self.current, &sample, at).unwrap_or(());
            if sample.straddles(at) {
                self.running.push(sample);
            }
        }
        if let Err(e) = apply_event_to_snapshot(&mut self.current, event, at) {
            warn!("event at {at}ms did not apply to current state: {e}");
            self.stats.fold_failures += 1;
        }
        if event.is_snapshot() {
            // Samples running across a snapshot keep moving after it.
            for sample in &self.running {
                apply_event_to_snapshot(&mut self.current, sample, at).unwrap_or(());
            }
        }
        if event.straddles(at) {
            self.running.push(event.clone());
        }
        self.last_time = self.last_time.max(at);
    }

    /// State at `time`: the current state with samples still running
    /// advanced to `time`. At or before the newest event this is exactly
    /// `current_snapshot()`.
    pub fn snapshot_at(&self, time: u32) -> Snapshot {
        let mut snapshot = self.current.clone();
        if time > self.last_time {
            for sample in &self.running {
                apply_event_to_snapshot(&mut snapshot, sample, time).unwrap_or(());
            }
        }
        snapshot
    }

    /// Pop entries until within budget, then fold them into the leading
    /// snapshot at the time of the first entry still retained.
    fn evict(&mut self) {
        let mut evicted = Vec::new();
        while self.total_bytes > self.config.max_bytes {
            let Some(entry) = self.entries.pop_front() else {
                break;
            };
            self.total_bytes -= entry.bytes.len();
            self.stats.events_evicted += 1;
            self.stats.bytes_evicted += entry.bytes.len() as u64;
            evicted.push(entry);
        }
        let Some(last) = evicted.last() else {
            return;
        };
        let at = self.entries.front().map_or(last.time, |e| e.time);
        debug!(
            "evicted {} events, folding at {at}ms ({} bytes retained)",
            evicted.len(),
            self.total_bytes
        );

        for entry in evicted {
            let event = match SourceEvent::decode(&entry.bytes) {
                Ok(event) => event,
                Err(e) => {
                    warn!("evicted event at {}ms failed to decode: {e}", entry.time);
                    self.stats.fold_failures += 1;
                    continue;
                }
            };
            trace!("folding evicted {} event", event.kind().name());
            if let Err(e) = apply_event_to_snapshot(&mut self.leading, &event, at) {
                warn!("evicted event at {}ms did not fold: {e}", entry.time);
                self.stats.fold_failures += 1;
            }
        }
    }

    /// Export the retained events as a self-contained recording: sorted by
    /// time, opened by a snapshot, closed by a snapshot of the current state,
    /// and rebased so the first event is at 0.
    pub fn slice(&self) -> Result<Vec<SourceEvent>, LogError> {
        let mut events = self
            .entries
            .iter()
            .map(|e| SourceEvent::decode(&e.bytes))
            .collect::<Result<Vec<_>, _>>()?;
        events.sort_by_key(|e| e.time);

        let Some(first) = events.first() else {
            return Ok(vec![SourceEvent::snapshot(0, self.snapshot_at(self.last_time))]);
        };
        let base = first.time;
        if !first.is_snapshot() {
            events.insert(0, SourceEvent::snapshot(base, self.leading.clone()));
        }
        let end = events.last().map_or(base, |e| e.time);
        events.push(SourceEvent::snapshot(end, self.snapshot_at(end)));

        for event in &mut events {
            event.time -= base;
        }
        Ok(events)
    }

    /// `slice()` packed into a single log buffer.
    pub fn export(&self) -> Result<EventLog, LogError> {
        EventLog::from_events(&self.slice()?)
    }

    /// Subscribe to events pushed from now on. The tail ends once `cancel`
    /// reads `true` (or its sender is dropped).
    pub fn tail(&self, cancel: watch::Receiver<bool>) -> Tail {
        Tail::new(self.sender.subscribe(), cancel)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encoded size of all retained events.
    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn leading_snapshot(&self) -> &Snapshot {
        &self.leading
    }

    pub fn current_snapshot(&self) -> &Snapshot {
        &self.current
    }

    /// Samples still in progress at the newest event.
    pub fn running_samples(&self) -> usize {
        self.running.len()
    }

    /// Time of the oldest retained event.
    pub fn first_time(&self) -> Option<u32> {
        self.entries.front().map(|e| e.time)
    }

    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }
}

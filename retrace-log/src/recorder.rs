//! Recording session: turns observation payloads into timed source events.
//!
//! ```text
//!   Observer::take_batch ─┐
//!   record_patch ─────────┼──▸ Recorder ──▸ SourceEvent { time } ──▸ EventBuffer
//!   record ───────────────┘        │
//!                                  └─ every snapshot_interval_ms: Snapshot(current)
//! ```
//!
//! Times are milliseconds since `start`, clamped so they never decrease even
//! if the host clock steps backwards. Observer callbacks run under
//! `catch_unwind`: a panicking observer is logged and its batch dropped, and
//! recording carries on.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use log::{error, info, warn};
use retrace_core::{EventData, Patch, Snapshot, SourceEvent};
use tokio::sync::watch;
use uuid::Uuid;

use crate::buffer::EventBuffer;
use crate::config::RecorderConfig;
use crate::error::LogError;
use crate::event_log::EventLog;
use crate::tail::Tail;

/// One payload captured by an observer, stamped with host wall-clock time.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub data: EventData,
    pub wall_clock_ms: u64,
}

impl Observation {
    pub fn new(data: EventData, wall_clock_ms: u64) -> Self {
        Self {
            data,
            wall_clock_ms,
        }
    }
}

/// A host capability that watches one source (DOM mutations, input,
/// network, console...) and hands over what it saw in batches.
pub trait Observer {
    fn name(&self) -> &str;

    /// Start watching. Called once when the observer is added.
    fn observe(&mut self);

    /// Stop watching and release host hooks. Called once on stop.
    fn disconnect(&mut self);

    /// Drain everything observed since the last call.
    fn take_batch(&mut self) -> Vec<Observation>;
}

/// A finished recording.
#[derive(Debug, Clone)]
pub struct Recording {
    pub session_id: Uuid,
    pub started_at_ms: u64,
    pub log: EventLog,
}

pub struct Recorder {
    config: RecorderConfig,
    session_id: Uuid,
    started_at_ms: u64,
    buffer: EventBuffer,
    last_time: u32,
    last_snapshot_at: u32,
    observers: Vec<Box<dyn Observer>>,
}

impl Recorder {
    /// Begin a session at `wall_clock_ms` with the host's initial state.
    /// The first event of every recording is this snapshot at time 0.
    pub fn start(
        config: RecorderConfig,
        initial: Snapshot,
        wall_clock_ms: u64,
    ) -> Result<Self, LogError> {
        let mut buffer = EventBuffer::new(config.buffer.clone());
        buffer.push(SourceEvent::snapshot(0, initial))?;
        let session_id = Uuid::new_v4();
        info!("recording session {session_id} started");
        Ok(Self {
            config,
            session_id,
            started_at_ms: wall_clock_ms,
            buffer,
            last_time: 0,
            last_snapshot_at: 0,
            observers: Vec::new(),
        })
    }

    /// Recording time for a host timestamp: relative to start, clamped to
    /// the `u32` range and never earlier than the previous event.
    fn relative_time(&mut self, wall_clock_ms: u64) -> u32 {
        let relative = wall_clock_ms.saturating_sub(self.started_at_ms);
        let time = u32::try_from(relative).unwrap_or(u32::MAX).max(self.last_time);
        self.last_time = time;
        time
    }

    /// Record one payload observed at `wall_clock_ms`.
    pub fn record(&mut self, data: EventData, wall_clock_ms: u64) -> Result<u32, LogError> {
        let time = self.relative_time(wall_clock_ms);
        let is_snapshot = matches!(data, EventData::Snapshot(_));
        self.buffer.push(SourceEvent::new(time, data))?;
        if is_snapshot {
            self.last_snapshot_at = time;
        } else {
            self.snapshot_if_due(time)?;
        }
        Ok(time)
    }

    pub fn record_patch(&mut self, patch: Patch, wall_clock_ms: u64) -> Result<u32, LogError> {
        self.record(EventData::DomPatch(patch), wall_clock_ms)
    }

    /// Run one host mutation batch through `translate`, which emits zero or
    /// more patches. A panic inside `translate` drops the batch. Returns the
    /// number of patches recorded.
    pub fn observe_batch<F>(&mut self, wall_clock_ms: u64, translate: F) -> Result<usize, LogError>
    where
        F: FnOnce(&mut dyn FnMut(Patch)),
    {
        let mut patches = Vec::new();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut emit = |patch: Patch| patches.push(patch);
            translate(&mut emit);
        }));
        if let Err(payload) = outcome {
            error!(
                "mutation batch at {wall_clock_ms}ms panicked, dropped: {}",
                panic_message(payload.as_ref())
            );
            return Ok(0);
        }
        let count = patches.len();
        for patch in patches {
            self.record_patch(patch, wall_clock_ms)?;
        }
        Ok(count)
    }

    /// Emit a periodic snapshot if one is due at `wall_clock_ms`. Hosts call
    /// this from their timer so idle sessions still get checkpoints.
    pub fn tick(&mut self, wall_clock_ms: u64) -> Result<bool, LogError> {
        let time = self.relative_time(wall_clock_ms);
        self.snapshot_if_due(time)
    }

    fn snapshot_if_due(&mut self, time: u32) -> Result<bool, LogError> {
        let interval = self.config.snapshot_interval_ms;
        if interval == 0 || time.saturating_sub(self.last_snapshot_at) < interval {
            return Ok(false);
        }
        let snapshot = self.buffer.snapshot_at(time);
        self.buffer.push(SourceEvent::snapshot(time, snapshot))?;
        self.last_snapshot_at = time;
        Ok(true)
    }

    /// Add an observer and start it.
    pub fn add_observer(&mut self, mut observer: Box<dyn Observer>) {
        let name = observer.name().to_string();
        if guarded(&name, "observe", || observer.observe()).is_some() {
            info!("observer {name} attached");
        }
        self.observers.push(observer);
    }

    /// Drain every observer's pending batch into the buffer. Returns the
    /// number of events recorded.
    pub fn poll_observers(&mut self) -> Result<usize, LogError> {
        let mut batches = Vec::with_capacity(self.observers.len());
        for observer in &mut self.observers {
            let name = observer.name().to_string();
            if let Some(batch) = guarded(&name, "take_batch", || observer.take_batch()) {
                batches.push(batch);
            }
        }
        let mut recorded = 0;
        for obs in batches.into_iter().flatten() {
            self.record(obs.data, obs.wall_clock_ms)?;
            recorded += 1;
        }
        Ok(recorded)
    }

    /// Disconnect all observers and export the recording.
    pub fn stop(mut self) -> Result<Recording, LogError> {
        for mut observer in self.observers.drain(..) {
            let name = observer.name().to_string();
            guarded(&name, "disconnect", || observer.disconnect());
        }
        let log = self.buffer.export()?;
        info!(
            "recording session {} stopped: {} events exported",
            self.session_id,
            log.len()
        );
        Ok(Recording {
            session_id: self.session_id,
            started_at_ms: self.started_at_ms,
            log,
        })
    }

    pub fn tail(&self, cancel: watch::Receiver<bool>) -> Tail {
        self.buffer.tail(cancel)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn buffer(&self) -> &EventBuffer {
        &self.buffer
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

/// Run an observer callback, logging instead of unwinding on panic.
fn guarded<T>(observer: &str, call: &str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            warn!(
                "observer {observer} panicked in {call}: {}",
                panic_message(payload.as_ref())
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::{
        ConsoleLevel, ConsoleMessage, EventKind, Interaction, NodeSplice, Point, Sample, VNode,
        VTree,
    };
    use std::sync::{Arc, Mutex};

    const T0: u64 = 1_700_000_000_000;

    fn initial() -> Snapshot {
        Snapshot::with_dom(VTree::new(VNode::element("root", None, "body")))
    }

    fn click(x: i32) -> EventData {
        EventData::Interaction(Interaction::Click {
            target: None,
            position: Point::new(x, 0),
        })
    }

    fn add(id: &str) -> Patch {
        Patch::AddNodes(NodeSplice {
            parent_id: "root".into(),
            previous_sibling_id: None,
            next_sibling_id: None,
            nodes: vec![VTree::new(VNode::element(id, None, "div"))],
        })
    }

    fn no_periodic() -> RecorderConfig {
        RecorderConfig {
            snapshot_interval_ms: 0,
            ..RecorderConfig::default()
        }
    }

    #[derive(Default)]
    struct Calls {
        observed: bool,
        disconnected: bool,
    }

    struct ScriptedObserver {
        calls: Arc<Mutex<Calls>>,
        pending: Vec<Observation>,
        panic_on_take: bool,
    }

    impl Observer for ScriptedObserver {
        fn name(&self) -> &str {
            "scripted"
        }
        fn observe(&mut self) {
            self.calls.lock().unwrap().observed = true;
        }
        fn disconnect(&mut self) {
            self.calls.lock().unwrap().disconnected = true;
        }
        fn take_batch(&mut self) -> Vec<Observation> {
            if self.panic_on_take {
                panic!("host hook failed");
            }
            std::mem::take(&mut self.pending)
        }
    }

    #[test]
    fn test_start_emits_initial_snapshot() {
        let rec = Recorder::start(no_periodic(), initial(), T0).unwrap();
        let log = rec.stop().unwrap().log;
        assert_eq!(log.kind_at(0).unwrap(), EventKind::Snapshot);
        assert_eq!(log.time_at(0).unwrap(), 0);
    }

    #[test]
    fn test_times_are_relative_and_non_decreasing() {
        let mut rec = Recorder::start(no_periodic(), initial(), T0).unwrap();
        assert_eq!(rec.record(click(1), T0 + 250).unwrap(), 250);
        // Clock stepped back.
        assert_eq!(rec.record(click(2), T0 + 100).unwrap(), 250);
        assert_eq!(rec.record(click(3), T0 + 400).unwrap(), 400);
    }

    #[test]
    fn test_periodic_snapshot() {
        let config = RecorderConfig {
            snapshot_interval_ms: 1_000,
            ..RecorderConfig::default()
        };
        let mut rec = Recorder::start(config, initial(), T0).unwrap();
        rec.record_patch(add("a"), T0 + 500).unwrap();
        assert!(!rec.tick(T0 + 900).unwrap());
        assert!(rec.tick(T0 + 1_000).unwrap());
        rec.record_patch(add("b"), T0 + 1_500).unwrap();
        rec.record_patch(add("c"), T0 + 2_100).unwrap();

        let log = rec.stop().unwrap().log;
        let kinds: Vec<EventKind> = (0..log.len()).map(|i| log.kind_at(i).unwrap()).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Snapshot,
                EventKind::DomPatch,
                EventKind::Snapshot,
                EventKind::DomPatch,
                EventKind::DomPatch,
                EventKind::Snapshot,
                EventKind::Snapshot,
            ]
        );
        assert_eq!(log.time_at(2).unwrap(), 1_000);
        assert_eq!(log.time_at(5).unwrap(), 2_100);
    }

    #[test]
    fn test_periodic_snapshot_advances_samples() {
        let config = RecorderConfig {
            snapshot_interval_ms: 1_000,
            ..RecorderConfig::default()
        };
        let mut rec = Recorder::start(config, initial(), T0).unwrap();
        let sweep = EventData::Interaction(Interaction::PointerMove {
            sample: Sample::new(Point::new(0, 0), Point::new(100, 0), 500),
        });
        rec.record(sweep, T0 + 900).unwrap();
        // Mid-sample and after it finished.
        assert!(rec.tick(T0 + 1_000).unwrap());
        assert!(rec.tick(T0 + 2_000).unwrap());

        let log = rec.stop().unwrap().log;
        let pointer_at = |time: u32| {
            (0..log.len())
                .map(|i| log.get(i).unwrap())
                .find_map(|ev| match ev.data {
                    EventData::Snapshot(s) if ev.time == time => {
                        Some(s.interaction.unwrap().pointer)
                    }
                    _ => None,
                })
                .unwrap()
        };
        assert_eq!(pointer_at(1_000), Point::new(20, 0));
        assert_eq!(pointer_at(2_000), Point::new(100, 0));
    }

    #[test]
    fn test_observe_batch_records_patches() {
        let mut rec = Recorder::start(no_periodic(), initial(), T0).unwrap();
        let n = rec
            .observe_batch(T0 + 10, |emit| {
                emit(add("a"));
                emit(add("b"));
            })
            .unwrap();
        assert_eq!(n, 2);
        let dom = rec.buffer().current_snapshot().dom.as_ref().unwrap();
        assert_eq!(dom.root().unwrap().children().len(), 2);
    }

    #[test]
    fn test_panicking_batch_does_not_stop_recording() {
        let mut rec = Recorder::start(no_periodic(), initial(), T0).unwrap();
        let n = rec
            .observe_batch(T0 + 10, |emit| {
                emit(add("a"));
                panic!("translator bug");
            })
            .unwrap();
        assert_eq!(n, 0);
        let n = rec.observe_batch(T0 + 20, |emit| emit(add("b"))).unwrap();
        assert_eq!(n, 1);
        assert_eq!(rec.buffer().len(), 2);
    }

    #[test]
    fn test_observer_lifecycle() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let mut rec = Recorder::start(no_periodic(), initial(), T0).unwrap();
        let console = EventData::Console(ConsoleMessage {
            level: ConsoleLevel::Warn,
            args: vec!["careful".into()],
            stack: None,
        });
        rec.add_observer(Box::new(ScriptedObserver {
            calls: calls.clone(),
            pending: vec![Observation::new(console, T0 + 5), Observation::new(click(1), T0 + 6)],
            panic_on_take: false,
        }));
        rec.add_observer(Box::new(ScriptedObserver {
            calls: Arc::new(Mutex::new(Calls::default())),
            pending: Vec::new(),
            panic_on_take: true,
        }));
        assert!(calls.lock().unwrap().observed);
        assert_eq!(rec.poll_observers().unwrap(), 2);
        assert_eq!(rec.poll_observers().unwrap(), 0);

        let recording = rec.stop().unwrap();
        assert!(calls.lock().unwrap().disconnected);
        assert_eq!(recording.log.kind_at(1).unwrap(), EventKind::Console);
        assert_eq!(recording.log.kind_at(2).unwrap(), EventKind::Interaction);
    }
}

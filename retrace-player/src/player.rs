//! Seekable, frame-driven replay of an event log.
//!
//! ```text
//!   snapshots:  S0 ─────────── S1 ─────────── S2
//!   events:     │ e e e e e e  │ e e e e e e  │ e e
//!                               ▲          ▲
//!                        closest snapshot  target
//!
//!   seek(target) = decode(S1) + fold(events in (S1, target])
//! ```
//!
//! A seek costs one snapshot decode plus the events since that snapshot,
//! independent of how long the log is. Samples still running at the
//! playhead (`time + duration > target`) stay pending and are re-applied on
//! every following frame until they finish. That includes samples that
//! started before the base snapshot and run across it.
//!
//! A snapshot that fails to decode is dropped from the index and the seek
//! retries from the one before it.

use std::time::Duration;

use log::{debug, warn};
use retrace_core::{apply_event_to_snapshot, EventData, Schema, Snapshot, SourceEvent};
use retrace_log::EventLog;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{clamp_speed, PlayerConfig};
use crate::error::PlayerError;
use crate::index::{LogIndex, SnapshotEntry};
use crate::state::{ControlFrame, PlaybackState, PlayerStatus};

pub struct Player {
    log: EventLog,
    index: LogIndex,
    config: PlayerConfig,
    /// Playhead in ms from the first event. Fractional so slow speeds
    /// still advance.
    position: f64,
    state: PlaybackState,
    control: ControlFrame,
    /// Last event folded into `snapshot`.
    active_index: usize,
    /// First event not yet folded.
    next_index: usize,
    snapshot: Snapshot,
    /// Samples still in progress at the playhead.
    pending: Vec<(usize, SourceEvent)>,
}

impl Player {
    /// Index `log` and position the playhead at its start.
    pub fn new(log: EventLog, config: PlayerConfig) -> Result<Self, PlayerError> {
        let index = LogIndex::build(&log)?;
        let config = PlayerConfig {
            speed: clamp_speed(config.speed),
            ..config
        };
        let mut player = Self {
            log,
            index,
            config,
            position: 0.0,
            state: PlaybackState::Paused,
            control: ControlFrame::Idle,
            active_index: 0,
            next_index: 0,
            snapshot: Snapshot::default(),
            pending: Vec::new(),
        };
        player.seek_to_time(0)?;
        player.control = ControlFrame::Idle;
        Ok(player)
    }

    pub fn from_events(events: &[SourceEvent], config: PlayerConfig) -> Result<Self, PlayerError> {
        Self::new(EventLog::from_events(events)?, config)
    }

    // ───────────────────────────────────────────────────────────────
    // Seeking
    // ───────────────────────────────────────────────────────────────

    /// Move the playhead to `time` ms from the start, clamped to
    /// `[0, duration]`.
    pub fn seek_to_time(&mut self, time: i64) -> Result<(), PlayerError> {
        let target = time.clamp(0, i64::from(self.duration())) as u32;
        let at = self.index.first_time() + target;
        let base = self.reset_near(self.index.snapshot_for_time(at))?;
        debug!("seek to {target}ms from snapshot at event {}", base.index);

        let end = self.index.end_for_time(at);
        self.advance(at, end);
        self.position = f64::from(target);
        self.control = ControlFrame::SeekToTime(target);
        Ok(())
    }

    /// Move the playhead to just after event `index` has been applied.
    /// Later events sharing its timestamp are not applied.
    pub fn seek_to_event(&mut self, index: usize) -> Result<(), PlayerError> {
        let at = self.index.time(index).ok_or(PlayerError::EventNotFound {
            index,
            len: self.index.len(),
        })?;
        let base = self.reset_near(self.index.snapshot_for_index(index))?;
        debug!("seek to event {index} from snapshot at event {}", base.index);

        self.advance(at, index + 1);
        self.position = f64::from(at - self.index.first_time());
        self.control = ControlFrame::SeekToEvent(index);
        Ok(())
    }

    /// `reset_to(base)`, falling back to earlier snapshots while `base`
    /// does not decode. Returns the snapshot actually used.
    fn reset_near(&mut self, mut base: SnapshotEntry) -> Result<SnapshotEntry, PlayerError> {
        loop {
            let err = match self.reset_to(base) {
                Ok(()) => return Ok(base),
                Err(e) => e,
            };
            let Some(previous) = self.index.drop_snapshot(base.index) else {
                return Err(err);
            };
            warn!(
                "snapshot at event {} is unreadable, using event {} instead: {err}",
                base.index, previous.index
            );
            base = previous;
        }
    }

    /// Replace the working state with the snapshot at `base` and queue the
    /// samples that run across it.
    fn reset_to(&mut self, base: SnapshotEntry) -> Result<(), PlayerError> {
        let event = match self.log.as_bytes().get(base.offset..) {
            Some(bytes) => SourceEvent::decode(bytes)?,
            None => self.log.get(base.index)?,
        };
        match event.data {
            EventData::Snapshot(snapshot) => self.snapshot = snapshot,
            _ => return Err(PlayerError::NotASnapshot { index: base.index }),
        }
        self.pending.clear();
        for &i in self.index.samples_across(&base) {
            match self.log.get(i) {
                Ok(event) => self.pending.push((i, event)),
                Err(e) => warn!("skipping sample {i}: {e}"),
            }
        }
        self.active_index = base.index;
        self.next_index = base.index + 1;
        Ok(())
    }

    /// Fold pending samples and events `next_index..end` at absolute time
    /// `at`, keeping samples that are still running.
    fn advance(&mut self, at: u32, end: usize) {
        let mut batch = std::mem::take(&mut self.pending);
        for i in self.next_index..end {
            match self.log.get(i) {
                Ok(event) => batch.push((i, event)),
                Err(e) => warn!("skipping event {i}: {e}"),
            }
        }
        if end > self.next_index {
            self.active_index = end - 1;
            self.next_index = end;
        }

        let mut samples: Vec<(usize, SourceEvent)> = Vec::new();
        for (i, event) in batch {
            if let Err(e) = apply_event_to_snapshot(&mut self.snapshot, &event, at) {
                warn!("event {i} did not apply, skipped: {e}");
                continue;
            }
            if event.is_snapshot() {
                // Samples running across the snapshot keep moving after it.
                for (_, sample) in samples.iter().filter(|(_, s)| s.straddles(event.time)) {
                    apply_event_to_snapshot(&mut self.snapshot, sample, at).unwrap_or(());
                }
            } else if event.sample_duration().is_some() {
                samples.push((i, event));
            }
        }
        self.pending = samples.into_iter().filter(|(_, s)| s.straddles(at)).collect();
    }

    // ───────────────────────────────────────────────────────────────
    // Playback
    // ───────────────────────────────────────────────────────────────

    /// Start playing. At the end of the log, playback restarts from 0.
    pub fn play(&mut self) -> Result<(), PlayerError> {
        if self.position >= f64::from(self.duration()) {
            self.seek_to_time(0)?;
        }
        self.state = PlaybackState::Playing;
        self.control = ControlFrame::Idle;
        Ok(())
    }

    /// Stop advancing. State stays where it is.
    pub fn pause(&mut self) {
        self.state = PlaybackState::Paused;
    }

    /// Advance one frame by `delta` of real time, scaled by speed. Reaching
    /// the end pauses.
    pub fn tick(&mut self, delta: Duration) -> PlaybackState {
        if self.state != PlaybackState::Playing {
            return self.state;
        }
        let duration = f64::from(self.duration());
        let advance = delta.as_micros() as f64 / 1000.0 * self.config.speed;
        self.position = (self.position + advance).min(duration);
        let at = self.index.first_time() + self.position as u32;
        let end = self.index.end_for_time(at);
        self.advance(at, end);
        if self.position >= duration {
            debug!("playback reached the end at {}ms", self.duration());
            self.state = PlaybackState::Paused;
        }
        self.state
    }

    /// Drive `tick` from a tokio interval until playback pauses, calling
    /// `on_frame` after every frame.
    pub async fn run<F>(&mut self, mut on_frame: F)
    where
        F: FnMut(&Player),
    {
        let period = self.config.frame_interval.max(Duration::from_millis(1));
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = interval.tick().await;
        while self.state == PlaybackState::Playing {
            let now = interval.tick().await;
            self.tick(now.duration_since(last));
            last = now;
            on_frame(self);
        }
    }

    /// Release the log and working state.
    pub fn close(self) {
        debug!("player closed at {}ms", self.elapsed());
    }

    // ───────────────────────────────────────────────────────────────
    // Accessors
    // ───────────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Playhead in whole ms from the start.
    pub fn elapsed(&self) -> u32 {
        self.position as u32
    }

    pub fn duration(&self) -> u32 {
        self.index.duration()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn control_frame(&self) -> ControlFrame {
        self.control
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn speed(&self) -> f64 {
        self.config.speed
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.config.speed = clamp_speed(speed);
    }

    /// Number of playable events.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn pending_samples(&self) -> usize {
        self.pending.len()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn index(&self) -> &LogIndex {
        &self.index
    }

    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            elapsed: self.elapsed(),
            duration: self.duration(),
            playback_state: self.state,
            control_frame: self.control,
            active_index: self.active_index,
            speed: self.config.speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::{Interaction, Point, Sample};

    fn pointer(player: &Player) -> Point {
        player.snapshot().interaction.as_ref().unwrap().pointer
    }

    fn events() -> Vec<SourceEvent> {
        vec![
            SourceEvent::snapshot(0, Snapshot::default()),
            SourceEvent::interaction(
                1000,
                Interaction::PointerMove {
                    sample: Sample::new(Point::new(0, 0), Point::new(100, 50), 500),
                },
            ),
            SourceEvent::interaction(
                2000,
                Interaction::Click {
                    target: None,
                    position: Point::new(7, 7),
                },
            ),
        ]
    }

    fn player() -> Player {
        Player::from_events(&events(), PlayerConfig::for_testing()).unwrap()
    }

    #[test]
    fn test_new_starts_paused_at_zero() {
        let p = player();
        assert_eq!(p.state(), PlaybackState::Paused);
        assert_eq!(p.control_frame(), ControlFrame::Idle);
        assert_eq!(p.elapsed(), 0);
        assert_eq!(p.duration(), 2000);
        assert_eq!(p.len(), 3);
    }

    #[test]
    fn test_straddling_sample_is_requeued() {
        let mut p = player();
        p.seek_to_time(1200).unwrap();
        assert_eq!(pointer(&p), Point::new(40, 20));
        assert_eq!(p.pending_samples(), 1);
        assert_eq!(p.control_frame(), ControlFrame::SeekToTime(1200));

        p.play().unwrap();
        p.tick(Duration::from_millis(100));
        assert_eq!(pointer(&p), Point::new(60, 30));
        assert_eq!(p.pending_samples(), 1);
        p.tick(Duration::from_millis(200));
        assert_eq!(pointer(&p), Point::new(100, 50));
        assert_eq!(p.pending_samples(), 0);
    }

    #[test]
    fn test_sample_running_across_snapshot_is_requeued() {
        let mid_sweep = Snapshot::new(
            None,
            Some(retrace_core::InteractionSnapshot {
                pointer: Point::new(20, 0),
                ..Default::default()
            }),
        );
        let events = vec![
            SourceEvent::snapshot(0, Snapshot::default()),
            SourceEvent::interaction(
                900,
                Interaction::PointerMove {
                    sample: Sample::new(Point::new(0, 0), Point::new(100, 0), 500),
                },
            ),
            SourceEvent::snapshot(1000, mid_sweep),
            SourceEvent::interaction(
                2000,
                Interaction::Click {
                    target: None,
                    position: Point::new(7, 7),
                },
            ),
        ];

        let mut continuous = Player::from_events(&events, PlayerConfig::for_testing()).unwrap();
        continuous.play().unwrap();
        continuous.tick(Duration::from_millis(1300));
        assert_eq!(pointer(&continuous), Point::new(80, 0));
        let mut stepped = Player::from_events(&events, PlayerConfig::for_testing()).unwrap();
        stepped.play().unwrap();
        stepped.tick(Duration::from_millis(1000));
        assert_eq!(pointer(&stepped), Point::new(20, 0));
        stepped.tick(Duration::from_millis(300));
        assert_eq!(stepped.snapshot(), continuous.snapshot());

        let mut p = Player::from_events(&events, PlayerConfig::for_testing()).unwrap();
        p.seek_to_time(1200).unwrap();
        assert_eq!(pointer(&p), Point::new(60, 0));
        assert_eq!(p.pending_samples(), 1);
        p.play().unwrap();
        p.tick(Duration::from_millis(100));
        assert_eq!(pointer(&p), continuous.snapshot().interaction.as_ref().unwrap().pointer);
    }

    #[test]
    fn test_seek_clamps() {
        let mut p = player();
        p.seek_to_time(-50).unwrap();
        assert_eq!(p.elapsed(), 0);
        p.seek_to_time(99_999).unwrap();
        assert_eq!(p.elapsed(), 2000);
        assert_eq!(pointer(&p), Point::new(7, 7));
        assert_eq!(p.active_index(), 2);
    }

    #[test]
    fn test_event_not_found() {
        let mut p = player();
        assert!(matches!(
            p.seek_to_event(3),
            Err(PlayerError::EventNotFound { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_seek_to_event_applies_through_index() {
        let mut p = player();
        p.seek_to_event(1).unwrap();
        // Applied at its own start time: the sample has not moved yet.
        assert_eq!(pointer(&p), Point::new(0, 0));
        assert_eq!(p.elapsed(), 1000);
        assert_eq!(p.active_index(), 1);
        assert_eq!(p.control_frame(), ControlFrame::SeekToEvent(1));
    }

    #[test]
    fn test_tick_is_scaled_and_stops_at_end() {
        let mut p = player();
        p.set_speed(4.0);
        p.play().unwrap();
        assert_eq!(p.tick(Duration::from_millis(250)), PlaybackState::Playing);
        assert_eq!(p.elapsed(), 1000);
        assert_eq!(p.tick(Duration::from_secs(10)), PlaybackState::Paused);
        assert_eq!(p.elapsed(), 2000);
        assert_eq!(pointer(&p), Point::new(7, 7));
    }

    #[test]
    fn test_paused_tick_does_nothing() {
        let mut p = player();
        p.tick(Duration::from_secs(1));
        assert_eq!(p.elapsed(), 0);
        p.play().unwrap();
        p.tick(Duration::from_millis(500));
        p.pause();
        p.tick(Duration::from_millis(500));
        assert_eq!(p.elapsed(), 500);
    }

    #[test]
    fn test_play_at_end_restarts() {
        let mut p = player();
        p.seek_to_time(2000).unwrap();
        p.play().unwrap();
        assert_eq!(p.elapsed(), 0);
        assert_eq!(p.state(), PlaybackState::Playing);
        assert_eq!(p.snapshot().interaction, None);
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut p = Player::from_events(&events(), PlayerConfig::default().with_speed(50.0)).unwrap();
        assert_eq!(p.speed(), 16.0);
        p.set_speed(0.0);
        assert_eq!(p.speed(), 0.1);
    }
}

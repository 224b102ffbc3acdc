//! Point-in-time state and the fold that advances it.
//!
//! [`apply_event_to_snapshot`] is the only place where events change state.
//! Recording uses it to keep the current state for periodic snapshots, the
//! event buffer uses it to roll evicted events into its leading snapshot,
//! and playback uses it to replay forward from a checkpoint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TreeIntegrityError;
use crate::event::{EventData, SourceEvent};
use crate::id::SyntheticId;
use crate::interaction::{Interaction, Point, PointerState};
use crate::patch::apply_patch;
use crate::vdom::VTree;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionSnapshot {
    pub pointer: Point,
    pub pointer_state: PointerState,
    /// Scroll offset per scrolled element.
    pub scroll: BTreeMap<SyntheticId, Point>,
    pub viewport: Point,
    #[serde(rename = "pageURL")]
    pub page_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub dom: Option<VTree>,
    pub interaction: Option<InteractionSnapshot>,
}

impl Snapshot {
    pub fn new(dom: Option<VTree>, interaction: Option<InteractionSnapshot>) -> Self {
        Self { dom, interaction }
    }

    pub fn with_dom(dom: VTree) -> Self {
        Self {
            dom: Some(dom),
            interaction: None,
        }
    }
}

/// Fold `event` into `snapshot` as observed at `time`.
///
/// `time` only matters for samples: a sample that started at `event.time`
/// contributes its value `time - event.time` ms in, clamped to its end.
/// Snapshot events replace the whole state. Network, console and
/// performance events leave the state alone.
///
/// On a `TreeIntegrityError` the document is unchanged; callers log and
/// carry on.
pub fn apply_event_to_snapshot(
    snapshot: &mut Snapshot,
    event: &SourceEvent,
    time: u32,
) -> Result<(), TreeIntegrityError> {
    match &event.data {
        EventData::Snapshot(s) => {
            snapshot.clone_from(s);
        }
        EventData::DomPatch(patch) => match snapshot.dom.as_mut() {
            Some(dom) => apply_patch(dom, patch, false)?,
            None => log::warn!("dropping patch at {}ms: no document yet", event.time),
        },
        EventData::Interaction(interaction) => {
            let elapsed = time.saturating_sub(event.time);
            let state = snapshot.interaction.get_or_insert_with(Default::default);
            apply_interaction(state, interaction, elapsed);
        }
        EventData::Network(_) | EventData::Console(_) | EventData::Performance(_) => {}
    }
    Ok(())
}

fn apply_interaction(state: &mut InteractionSnapshot, interaction: &Interaction, elapsed: u32) {
    match interaction {
        Interaction::PointerMove { sample } => state.pointer = sample.at(elapsed),
        Interaction::PointerState {
            state: pointer_state,
            position,
        } => {
            state.pointer_state = *pointer_state;
            state.pointer = *position;
        }
        Interaction::Click { position, .. } => state.pointer = *position,
        Interaction::Scroll { target, sample } => {
            state.scroll.insert(target.clone(), sample.at(elapsed));
        }
        Interaction::ViewportResize { sample } => state.viewport = sample.at(elapsed),
        Interaction::Key { .. } => {}
        Interaction::PageTransition { url } => state.page_url = Some(url.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::Sample;
    use crate::patch::{NodeSplice, Patch};
    use crate::telemetry::ConsoleMessage;
    use crate::telemetry::ConsoleLevel;
    use crate::vdom::VNode;

    fn id(s: &str) -> SyntheticId {
        SyntheticId::from(s)
    }

    fn div_snapshot() -> Snapshot {
        Snapshot::with_dom(VTree::new(VNode::element("1", None, "div")))
    }

    #[test]
    fn test_sample_interpolates_at_time() {
        let mut snap = Snapshot::default();
        let ev = SourceEvent::interaction(
            1000,
            Interaction::PointerMove {
                sample: Sample::new(Point::new(0, 0), Point::new(100, 50), 500),
            },
        );
        apply_event_to_snapshot(&mut snap, &ev, 1200).unwrap();
        assert_eq!(snap.interaction.as_ref().unwrap().pointer, Point::new(40, 20));
        apply_event_to_snapshot(&mut snap, &ev, 5000).unwrap();
        assert_eq!(snap.interaction.as_ref().unwrap().pointer, Point::new(100, 50));
        // A time before the event start counts as zero progress.
        apply_event_to_snapshot(&mut snap, &ev, 10).unwrap();
        assert_eq!(snap.interaction.as_ref().unwrap().pointer, Point::new(0, 0));
    }

    #[test]
    fn test_scroll_and_navigation() {
        let mut snap = Snapshot::default();
        let scroll = SourceEvent::interaction(
            0,
            Interaction::Scroll {
                target: id("7"),
                sample: Sample::new(Point::ZERO, Point::new(0, 300), 0),
            },
        );
        let nav = SourceEvent::interaction(
            10,
            Interaction::PageTransition {
                url: "https://example.test/next".into(),
            },
        );
        apply_event_to_snapshot(&mut snap, &scroll, 0).unwrap();
        apply_event_to_snapshot(&mut snap, &nav, 10).unwrap();
        let state = snap.interaction.unwrap();
        assert_eq!(state.scroll.get(&id("7")), Some(&Point::new(0, 300)));
        assert_eq!(state.page_url.as_deref(), Some("https://example.test/next"));
    }

    #[test]
    fn test_snapshot_event_replaces_state() {
        let mut snap = Snapshot::default();
        let replacement = div_snapshot();
        apply_event_to_snapshot(&mut snap, &SourceEvent::snapshot(0, replacement.clone()), 0)
            .unwrap();
        assert_eq!(snap, replacement);
    }

    #[test]
    fn test_telemetry_has_no_effect() {
        let mut snap = div_snapshot();
        let before = snap.clone();
        let ev = SourceEvent::new(
            3,
            EventData::Console(ConsoleMessage {
                level: ConsoleLevel::Warn,
                args: vec!["careful".into()],
                stack: None,
            }),
        );
        apply_event_to_snapshot(&mut snap, &ev, 3).unwrap();
        assert_eq!(snap, before);
    }

    #[test]
    fn test_patch_error_leaves_dom() {
        let mut snap = div_snapshot();
        let before = snap.clone();
        let ev = SourceEvent::patch(
            1,
            Patch::AddNodes(NodeSplice {
                parent_id: id("404"),
                previous_sibling_id: None,
                next_sibling_id: None,
                nodes: vec![VTree::new(VNode::element("2", None, "span"))],
            }),
        );
        assert!(apply_event_to_snapshot(&mut snap, &ev, 1).is_err());
        assert_eq!(snap, before);
    }

    #[test]
    fn test_patch_without_document_is_dropped() {
        let mut snap = Snapshot::default();
        let ev = SourceEvent::patch(
            1,
            Patch::Text {
                target_id: id("1"),
                value: "a".into(),
                old_value: "".into(),
            },
        );
        apply_event_to_snapshot(&mut snap, &ev, 1).unwrap();
        assert!(snap.dom.is_none());
    }
}

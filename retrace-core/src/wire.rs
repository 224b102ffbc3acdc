//! Wire schemas for the recording model.
//!
//! Each model type maps to a codec descriptor. Unions carry their variant in
//! a leading tag byte; every [`SourceEvent`] variant is a `{time, data}`
//! struct, so `time` is always field 0 and can be read from a lazy view
//! without touching the payload.
//!
//! ```text
//! SourceEvent  [tag u8][off time][off data][time u32][data ...]
//! ```
//!
//! Field order and tag numbers below are the format. Changing either
//! requires bumping [`FORMAT_VERSION`].

use std::collections::BTreeMap;
use std::sync::OnceLock;

use retrace_codec::{fields_exact, DecodeError, Descriptor, Schema, Value, Variant, View};

use crate::event::{EventData, EventKind, SourceEvent};
use crate::id::SyntheticId;
use crate::interaction::{Interaction, KeyState, Point, PointerState, Sample};
use crate::patch::{NodeSplice, Patch};
use crate::snapshot::{InteractionSnapshot, Snapshot};
use crate::telemetry::{ConsoleLevel, ConsoleMessage, NetworkMessage, PerformanceEntry};
use crate::vdom::{ElementNode, ElementProperties, VNode, VNodeKind, VTree};

pub const FORMAT_VERSION: u16 = 1;

// ───────────────────────────────────────────────────────────────────
// Descriptors
// ───────────────────────────────────────────────────────────────────

fn id_descriptor() -> Descriptor {
    Descriptor::string()
}

fn point_descriptor() -> Descriptor {
    Descriptor::structure([("x", Descriptor::i32()), ("y", Descriptor::i32())])
}

fn sample_descriptor() -> Descriptor {
    Descriptor::structure([
        ("from", point_descriptor()),
        ("to", point_descriptor()),
        ("duration", Descriptor::u32()),
    ])
}

fn vnode_descriptor() -> Descriptor {
    let head = || {
        [
            ("id", id_descriptor()),
            ("parentId", id_descriptor().nullable()),
        ]
    };
    let with = |extra: Vec<(&'static str, Descriptor)>| head().into_iter().chain(extra);
    Descriptor::union(
        "type",
        vec![
            Variant::new(
                0,
                "Document",
                with(vec![("children", Descriptor::vector(id_descriptor()))]),
            ),
            Variant::new(
                1,
                "DocType",
                with(vec![
                    ("name", Descriptor::string()),
                    ("publicId", Descriptor::string()),
                    ("systemId", Descriptor::string()),
                ]),
            ),
            Variant::new(
                2,
                "Element",
                with(vec![
                    ("tagName", Descriptor::string()),
                    (
                        "attributes",
                        Descriptor::dict(Descriptor::string(), Descriptor::string().nullable()),
                    ),
                    (
                        "properties",
                        Descriptor::structure([
                            ("checked", Descriptor::bool().nullable()),
                            ("value", Descriptor::string().nullable()),
                            ("selectedIndex", Descriptor::i32().nullable()),
                        ]),
                    ),
                    ("children", Descriptor::vector(id_descriptor())),
                    ("shadowRoot", Descriptor::bool()),
                ]),
            ),
            Variant::new(3, "Text", with(vec![("value", Descriptor::string())])),
        ],
    )
}

fn vtree_descriptor() -> Descriptor {
    Descriptor::structure([
        ("rootId", id_descriptor()),
        ("nodes", Descriptor::dict(id_descriptor(), vnode_descriptor())),
    ])
}

fn patch_descriptor() -> Descriptor {
    let value_patch = |tag: u8, name: &'static str, value: Descriptor| {
        Variant::new(
            tag,
            name,
            [
                ("targetId", id_descriptor()),
                ("name", Descriptor::string()),
                ("value", value.clone()),
                ("oldValue", value),
            ],
        )
    };
    let splice = |tag: u8, name: &'static str| {
        Variant::new(
            tag,
            name,
            [
                ("parentId", id_descriptor()),
                ("previousSiblingId", id_descriptor().nullable()),
                ("nextSiblingId", id_descriptor().nullable()),
                ("nodes", Descriptor::vector(vtree_descriptor())),
            ],
        )
    };
    Descriptor::union(
        "type",
        vec![
            value_patch(0, "Attribute", Descriptor::string().nullable()),
            Variant::new(
                1,
                "Text",
                [
                    ("targetId", id_descriptor()),
                    ("value", Descriptor::string()),
                    ("oldValue", Descriptor::string()),
                ],
            ),
            value_patch(2, "BooleanProperty", Descriptor::bool()),
            value_patch(3, "NumberProperty", Descriptor::i32()),
            value_patch(4, "TextProperty", Descriptor::string()),
            splice(5, "AddNodes"),
            splice(6, "RemoveNodes"),
        ],
    )
}

fn interaction_snapshot_descriptor() -> Descriptor {
    Descriptor::structure([
        ("pointer", point_descriptor()),
        ("pointerState", Descriptor::u8()),
        ("scroll", Descriptor::dict(id_descriptor(), point_descriptor())),
        ("viewport", point_descriptor()),
        ("pageURL", Descriptor::string().nullable()),
    ])
}

fn snapshot_descriptor() -> Descriptor {
    Descriptor::structure([
        ("dom", vtree_descriptor().nullable()),
        ("interaction", interaction_snapshot_descriptor().nullable()),
    ])
}

fn interaction_descriptor() -> Descriptor {
    Descriptor::union(
        "kind",
        vec![
            Variant::new(0, "PointerMove", [("sample", sample_descriptor())]),
            Variant::new(
                1,
                "PointerState",
                [("state", Descriptor::u8()), ("position", point_descriptor())],
            ),
            Variant::new(
                2,
                "Click",
                [
                    ("target", id_descriptor().nullable()),
                    ("position", point_descriptor()),
                ],
            ),
            Variant::new(
                3,
                "Scroll",
                [("target", id_descriptor()), ("sample", sample_descriptor())],
            ),
            Variant::new(4, "ViewportResize", [("sample", sample_descriptor())]),
            Variant::new(
                5,
                "Key",
                [
                    ("state", Descriptor::u8()),
                    ("key", Descriptor::string()),
                    ("target", id_descriptor().nullable()),
                ],
            ),
            Variant::new(6, "PageTransition", [("url", Descriptor::string())]),
        ],
    )
}

fn network_descriptor() -> Descriptor {
    let headers = || Descriptor::dict(Descriptor::string(), Descriptor::string());
    Descriptor::union(
        "kind",
        vec![
            Variant::new(
                0,
                "Request",
                [
                    ("requestId", Descriptor::string()),
                    ("method", Descriptor::string()),
                    ("url", Descriptor::string()),
                    ("headers", headers()),
                    ("body", Descriptor::buffer().nullable()),
                ],
            ),
            Variant::new(
                1,
                "Response",
                [
                    ("requestId", Descriptor::string()),
                    ("status", Descriptor::u16()),
                    ("headers", headers()),
                    ("body", Descriptor::buffer().nullable()),
                ],
            ),
            Variant::new(
                2,
                "Failure",
                [
                    ("requestId", Descriptor::string()),
                    ("reason", Descriptor::string()),
                ],
            ),
        ],
    )
}

fn console_descriptor() -> Descriptor {
    Descriptor::structure([
        ("level", Descriptor::u8()),
        ("args", Descriptor::vector(Descriptor::string())),
        ("stack", Descriptor::string().nullable()),
    ])
}

fn performance_descriptor() -> Descriptor {
    Descriptor::union(
        "kind",
        vec![
            Variant::new(
                0,
                "Memory",
                [
                    ("used", Descriptor::u32()),
                    ("total", Descriptor::u32()),
                    ("limit", Descriptor::u32()),
                ],
            ),
            Variant::new(
                1,
                "Timing",
                [
                    ("name", Descriptor::string()),
                    ("start", Descriptor::u32()),
                    ("duration", Descriptor::u32()),
                ],
            ),
        ],
    )
}

fn source_event_descriptor() -> Descriptor {
    let event = |kind: EventKind, name: &'static str, data: Descriptor| {
        Variant::new(kind.tag(), name, [("time", Descriptor::u32()), ("data", data)])
    };
    Descriptor::union(
        "type",
        vec![
            event(EventKind::Snapshot, "Snapshot", snapshot_descriptor()),
            event(EventKind::DomPatch, "DOMPatch", patch_descriptor()),
            event(EventKind::Interaction, "Interaction", interaction_descriptor()),
            event(EventKind::Network, "Network", network_descriptor()),
            event(EventKind::Console, "Console", console_descriptor()),
            event(EventKind::Performance, "Performance", performance_descriptor()),
        ],
    )
}

// ───────────────────────────────────────────────────────────────────
// Value helpers
// ───────────────────────────────────────────────────────────────────

fn id_v(id: &SyntheticId) -> Value {
    Value::from(id.as_str())
}

fn opt_id_v(id: Option<&SyntheticId>) -> Value {
    id.map_or(Value::Null, id_v)
}

fn ids_v(ids: &[SyntheticId]) -> Value {
    Value::List(ids.iter().map(id_v).collect())
}

fn opt_bytes_v(bytes: &Option<Vec<u8>>) -> Value {
    bytes.clone().map_or(Value::Null, Value::Bytes)
}

fn headers_v(headers: &BTreeMap<String, String>) -> Value {
    Value::Map(
        headers
            .iter()
            .map(|(k, v)| (Value::from(k.as_str()), Value::from(v.as_str())))
            .collect(),
    )
}

fn id_from(v: Value) -> Result<SyntheticId, DecodeError> {
    v.into_string().map(SyntheticId::from)
}

fn opt_id_from(v: Value) -> Result<Option<SyntheticId>, DecodeError> {
    v.into_option().map(id_from).transpose()
}

fn opt_string_from(v: Value) -> Result<Option<String>, DecodeError> {
    v.into_option().map(Value::into_string).transpose()
}

fn ids_from(v: Value) -> Result<Vec<SyntheticId>, DecodeError> {
    v.into_list()?.into_iter().map(id_from).collect()
}

fn opt_bytes_from(v: Value) -> Result<Option<Vec<u8>>, DecodeError> {
    v.into_option().map(Value::into_bytes).transpose()
}

fn headers_from(v: Value) -> Result<BTreeMap<String, String>, DecodeError> {
    v.into_map()?
        .into_iter()
        .map(|(k, v)| Ok((k.into_string()?, v.into_string()?)))
        .collect()
}

fn unknown_tag(what: &str, tag: u8) -> DecodeError {
    DecodeError::Invalid(format!("unknown {what} tag {tag}"))
}

// ───────────────────────────────────────────────────────────────────
// Conversions
// ───────────────────────────────────────────────────────────────────

fn point_to(p: &Point) -> Value {
    Value::Struct(vec![p.x.into(), p.y.into()])
}

fn point_from(v: Value) -> Result<Point, DecodeError> {
    let [x, y] = v.into_fields()?;
    Ok(Point::new(x.into_i32()?, y.into_i32()?))
}

fn sample_to(s: &Sample<Point>) -> Value {
    Value::Struct(vec![point_to(&s.from), point_to(&s.to), s.duration.into()])
}

fn sample_from(v: Value) -> Result<Sample<Point>, DecodeError> {
    let [from, to, duration] = v.into_fields()?;
    Ok(Sample::new(point_from(from)?, point_from(to)?, duration.into_u32()?))
}

fn vnode_to(n: &VNode) -> Value {
    let mut fields = vec![id_v(&n.id), opt_id_v(n.parent_id.as_ref())];
    let tag = match &n.kind {
        VNodeKind::Document { children } => {
            fields.push(ids_v(children));
            0
        }
        VNodeKind::DocType {
            name,
            public_id,
            system_id,
        } => {
            fields.extend([
                Value::from(name.as_str()),
                Value::from(public_id.as_str()),
                Value::from(system_id.as_str()),
            ]);
            1
        }
        VNodeKind::Element(el) => {
            let attributes = el
                .attributes
                .iter()
                .map(|(k, v)| (Value::from(k.as_str()), Value::nullable(v.clone())))
                .collect();
            let properties = Value::Struct(vec![
                Value::nullable(el.properties.checked),
                Value::nullable(el.properties.value.clone()),
                Value::nullable(el.properties.selected_index),
            ]);
            fields.extend([
                Value::from(el.tag_name.as_str()),
                Value::Map(attributes),
                properties,
                ids_v(&el.children),
                Value::from(el.shadow_root),
            ]);
            2
        }
        VNodeKind::Text { value } => {
            fields.push(Value::from(value.as_str()));
            3
        }
    };
    Value::Union { tag, fields }
}

fn vnode_from(v: Value) -> Result<VNode, DecodeError> {
    let (tag, mut fields) = v.into_union()?;
    if fields.len() < 2 {
        return Err(DecodeError::FieldCount {
            expected: 2,
            got: fields.len(),
        });
    }
    let rest = fields.split_off(2);
    let [id, parent] = fields_exact(fields)?;
    let kind = match tag {
        0 => {
            let [children] = fields_exact(rest)?;
            VNodeKind::Document {
                children: ids_from(children)?,
            }
        }
        1 => {
            let [name, public_id, system_id] = fields_exact(rest)?;
            VNodeKind::DocType {
                name: name.into_string()?,
                public_id: public_id.into_string()?,
                system_id: system_id.into_string()?,
            }
        }
        2 => {
            let [tag_name, attributes, properties, children, shadow_root] = fields_exact(rest)?;
            let attributes = attributes
                .into_map()?
                .into_iter()
                .map(|(k, v)| Ok((k.into_string()?, opt_string_from(v)?)))
                .collect::<Result<_, DecodeError>>()?;
            let [checked, value, selected_index] = properties.into_fields()?;
            VNodeKind::Element(ElementNode {
                tag_name: tag_name.into_string()?,
                attributes,
                properties: ElementProperties {
                    checked: checked.into_option().map(Value::into_bool).transpose()?,
                    value: opt_string_from(value)?,
                    selected_index: selected_index.into_option().map(Value::into_i32).transpose()?,
                },
                children: ids_from(children)?,
                shadow_root: shadow_root.into_bool()?,
            })
        }
        3 => {
            let [value] = fields_exact(rest)?;
            VNodeKind::Text {
                value: value.into_string()?,
            }
        }
        tag => return Err(unknown_tag("node", tag)),
    };
    Ok(VNode {
        id: id_from(id)?,
        parent_id: opt_id_from(parent)?,
        kind,
    })
}

fn vtree_to(t: &VTree) -> Value {
    let nodes = t
        .sorted_nodes()
        .into_iter()
        .map(|n| (id_v(&n.id), vnode_to(n)))
        .collect();
    Value::Struct(vec![id_v(&t.root_id), Value::Map(nodes)])
}

fn vtree_from(v: Value) -> Result<VTree, DecodeError> {
    let [root_id, nodes] = v.into_fields()?;
    let nodes = nodes
        .into_map()?
        .into_iter()
        .map(|(k, v)| Ok((id_from(k)?, vnode_from(v)?)))
        .collect::<Result<_, DecodeError>>()?;
    Ok(VTree {
        root_id: id_from(root_id)?,
        nodes,
    })
}

fn splice_to(tag: u8, s: &NodeSplice) -> Value {
    Value::Union {
        tag,
        fields: vec![
            id_v(&s.parent_id),
            opt_id_v(s.previous_sibling_id.as_ref()),
            opt_id_v(s.next_sibling_id.as_ref()),
            Value::List(s.nodes.iter().map(vtree_to).collect()),
        ],
    }
}

fn splice_from(fields: Vec<Value>) -> Result<NodeSplice, DecodeError> {
    let [parent, prev, next, nodes] = fields_exact(fields)?;
    Ok(NodeSplice {
        parent_id: id_from(parent)?,
        previous_sibling_id: opt_id_from(prev)?,
        next_sibling_id: opt_id_from(next)?,
        nodes: nodes
            .into_list()?
            .into_iter()
            .map(vtree_from)
            .collect::<Result<_, _>>()?,
    })
}

fn patch_to(p: &Patch) -> Value {
    let value_patch = |tag: u8, target: &SyntheticId, name: &str, value: Value, old: Value| Value::Union {
        tag,
        fields: vec![id_v(target), Value::from(name), value, old],
    };
    match p {
        Patch::Attribute {
            target_id,
            name,
            value,
            old_value,
        } => value_patch(
            0,
            target_id,
            name.as_str(),
            Value::nullable(value.clone()),
            Value::nullable(old_value.clone()),
        ),
        Patch::Text {
            target_id,
            value,
            old_value,
        } => Value::Union {
            tag: 1,
            fields: vec![
                id_v(target_id),
                Value::from(value.as_str()),
                Value::from(old_value.as_str()),
            ],
        },
        Patch::BooleanProperty {
            target_id,
            name,
            value,
            old_value,
        } => value_patch(2, target_id, name.as_str(), (*value).into(), (*old_value).into()),
        Patch::NumberProperty {
            target_id,
            name,
            value,
            old_value,
        } => value_patch(3, target_id, name.as_str(), (*value).into(), (*old_value).into()),
        Patch::TextProperty {
            target_id,
            name,
            value,
            old_value,
        } => value_patch(
            4,
            target_id,
            name.as_str(),
            Value::from(value.as_str()),
            Value::from(old_value.as_str()),
        ),
        Patch::AddNodes(s) => splice_to(5, s),
        Patch::RemoveNodes(s) => splice_to(6, s),
    }
}

fn patch_from(v: Value) -> Result<Patch, DecodeError> {
    let (tag, fields) = v.into_union()?;
    Ok(match tag {
        0 => {
            let [target, name, value, old] = fields_exact(fields)?;
            Patch::Attribute {
                target_id: id_from(target)?,
                name: name.into_string()?,
                value: opt_string_from(value)?,
                old_value: opt_string_from(old)?,
            }
        }
        1 => {
            let [target, value, old] = fields_exact(fields)?;
            Patch::Text {
                target_id: id_from(target)?,
                value: value.into_string()?,
                old_value: old.into_string()?,
            }
        }
        2 => {
            let [target, name, value, old] = fields_exact(fields)?;
            Patch::BooleanProperty {
                target_id: id_from(target)?,
                name: name.into_string()?,
                value: value.into_bool()?,
                old_value: old.into_bool()?,
            }
        }
        3 => {
            let [target, name, value, old] = fields_exact(fields)?;
            Patch::NumberProperty {
                target_id: id_from(target)?,
                name: name.into_string()?,
                value: value.into_i32()?,
                old_value: old.into_i32()?,
            }
        }
        4 => {
            let [target, name, value, old] = fields_exact(fields)?;
            Patch::TextProperty {
                target_id: id_from(target)?,
                name: name.into_string()?,
                value: value.into_string()?,
                old_value: old.into_string()?,
            }
        }
        5 => Patch::AddNodes(splice_from(fields)?),
        6 => Patch::RemoveNodes(splice_from(fields)?),
        tag => return Err(unknown_tag("patch", tag)),
    })
}

fn interaction_snapshot_to(s: &InteractionSnapshot) -> Value {
    Value::Struct(vec![
        point_to(&s.pointer),
        (s.pointer_state as u8).into(),
        Value::Map(
            s.scroll
                .iter()
                .map(|(id, p)| (id_v(id), point_to(p)))
                .collect(),
        ),
        point_to(&s.viewport),
        Value::nullable(s.page_url.clone()),
    ])
}

fn interaction_snapshot_from(v: Value) -> Result<InteractionSnapshot, DecodeError> {
    let [pointer, pointer_state, scroll, viewport, page_url] = v.into_fields()?;
    Ok(InteractionSnapshot {
        pointer: point_from(pointer)?,
        pointer_state: pointer_state_from(pointer_state)?,
        scroll: scroll
            .into_map()?
            .into_iter()
            .map(|(k, v)| Ok((id_from(k)?, point_from(v)?)))
            .collect::<Result<_, DecodeError>>()?,
        viewport: point_from(viewport)?,
        page_url: opt_string_from(page_url)?,
    })
}

fn pointer_state_from(v: Value) -> Result<PointerState, DecodeError> {
    let raw = v.into_u8()?;
    PointerState::from_u8(raw)
        .ok_or_else(|| DecodeError::Invalid(format!("pointer state {raw}")))
}

fn snapshot_to(s: &Snapshot) -> Value {
    Value::Struct(vec![
        s.dom.as_ref().map_or(Value::Null, vtree_to),
        s.interaction
            .as_ref()
            .map_or(Value::Null, interaction_snapshot_to),
    ])
}

fn snapshot_from(v: Value) -> Result<Snapshot, DecodeError> {
    let [dom, interaction] = v.into_fields()?;
    Ok(Snapshot {
        dom: dom.into_option().map(vtree_from).transpose()?,
        interaction: interaction
            .into_option()
            .map(interaction_snapshot_from)
            .transpose()?,
    })
}

fn interaction_to(i: &Interaction) -> Value {
    let (tag, fields) = match i {
        Interaction::PointerMove { sample } => (0, vec![sample_to(sample)]),
        Interaction::PointerState { state, position } => {
            (1, vec![(*state as u8).into(), point_to(position)])
        }
        Interaction::Click { target, position } => {
            (2, vec![opt_id_v(target.as_ref()), point_to(position)])
        }
        Interaction::Scroll { target, sample } => (3, vec![id_v(target), sample_to(sample)]),
        Interaction::ViewportResize { sample } => (4, vec![sample_to(sample)]),
        Interaction::Key { state, key, target } => (
            5,
            vec![
                (*state as u8).into(),
                Value::from(key.as_str()),
                opt_id_v(target.as_ref()),
            ],
        ),
        Interaction::PageTransition { url } => (6, vec![Value::from(url.as_str())]),
    };
    Value::Union { tag, fields }
}

fn interaction_from(v: Value) -> Result<Interaction, DecodeError> {
    let (tag, fields) = v.into_union()?;
    Ok(match tag {
        0 => {
            let [sample] = fields_exact(fields)?;
            Interaction::PointerMove {
                sample: sample_from(sample)?,
            }
        }
        1 => {
            let [state, position] = fields_exact(fields)?;
            Interaction::PointerState {
                state: pointer_state_from(state)?,
                position: point_from(position)?,
            }
        }
        2 => {
            let [target, position] = fields_exact(fields)?;
            Interaction::Click {
                target: opt_id_from(target)?,
                position: point_from(position)?,
            }
        }
        3 => {
            let [target, sample] = fields_exact(fields)?;
            Interaction::Scroll {
                target: id_from(target)?,
                sample: sample_from(sample)?,
            }
        }
        4 => {
            let [sample] = fields_exact(fields)?;
            Interaction::ViewportResize {
                sample: sample_from(sample)?,
            }
        }
        5 => {
            let [state, key, target] = fields_exact(fields)?;
            let raw = state.into_u8()?;
            Interaction::Key {
                state: KeyState::from_u8(raw)
                    .ok_or_else(|| DecodeError::Invalid(format!("key state {raw}")))?,
                key: key.into_string()?,
                target: opt_id_from(target)?,
            }
        }
        6 => {
            let [url] = fields_exact(fields)?;
            Interaction::PageTransition {
                url: url.into_string()?,
            }
        }
        tag => return Err(unknown_tag("interaction", tag)),
    })
}

fn network_to(n: &NetworkMessage) -> Value {
    let (tag, fields) = match n {
        NetworkMessage::Request {
            request_id,
            method,
            url,
            headers,
            body,
        } => (
            0,
            vec![
                Value::from(request_id.as_str()),
                Value::from(method.as_str()),
                Value::from(url.as_str()),
                headers_v(headers),
                opt_bytes_v(body),
            ],
        ),
        NetworkMessage::Response {
            request_id,
            status,
            headers,
            body,
        } => (
            1,
            vec![
                Value::from(request_id.as_str()),
                (*status).into(),
                headers_v(headers),
                opt_bytes_v(body),
            ],
        ),
        NetworkMessage::Failure { request_id, reason } => (
            2,
            vec![Value::from(request_id.as_str()), Value::from(reason.as_str())],
        ),
    };
    Value::Union { tag, fields }
}

fn network_from(v: Value) -> Result<NetworkMessage, DecodeError> {
    let (tag, fields) = v.into_union()?;
    Ok(match tag {
        0 => {
            let [request_id, method, url, headers, body] = fields_exact(fields)?;
            NetworkMessage::Request {
                request_id: request_id.into_string()?,
                method: method.into_string()?,
                url: url.into_string()?,
                headers: headers_from(headers)?,
                body: opt_bytes_from(body)?,
            }
        }
        1 => {
            let [request_id, status, headers, body] = fields_exact(fields)?;
            NetworkMessage::Response {
                request_id: request_id.into_string()?,
                status: status.into_u16()?,
                headers: headers_from(headers)?,
                body: opt_bytes_from(body)?,
            }
        }
        2 => {
            let [request_id, reason] = fields_exact(fields)?;
            NetworkMessage::Failure {
                request_id: request_id.into_string()?,
                reason: reason.into_string()?,
            }
        }
        tag => return Err(unknown_tag("network", tag)),
    })
}

fn console_to(c: &ConsoleMessage) -> Value {
    Value::Struct(vec![
        (c.level as u8).into(),
        Value::list(c.args.iter().map(String::as_str)),
        Value::nullable(c.stack.clone()),
    ])
}

fn console_from(v: Value) -> Result<ConsoleMessage, DecodeError> {
    let [level, args, stack] = v.into_fields()?;
    let raw = level.into_u8()?;
    Ok(ConsoleMessage {
        level: ConsoleLevel::from_u8(raw)
            .ok_or_else(|| DecodeError::Invalid(format!("console level {raw}")))?,
        args: args
            .into_list()?
            .into_iter()
            .map(Value::into_string)
            .collect::<Result<_, _>>()?,
        stack: opt_string_from(stack)?,
    })
}

fn performance_to(p: &PerformanceEntry) -> Value {
    match p {
        PerformanceEntry::Memory { used, total, limit } => Value::Union {
            tag: 0,
            fields: vec![(*used).into(), (*total).into(), (*limit).into()],
        },
        PerformanceEntry::Timing {
            name,
            start,
            duration,
        } => Value::Union {
            tag: 1,
            fields: vec![Value::from(name.as_str()), (*start).into(), (*duration).into()],
        },
    }
}

fn performance_from(v: Value) -> Result<PerformanceEntry, DecodeError> {
    let (tag, fields) = v.into_union()?;
    Ok(match tag {
        0 => {
            let [used, total, limit] = fields_exact(fields)?;
            PerformanceEntry::Memory {
                used: used.into_u32()?,
                total: total.into_u32()?,
                limit: limit.into_u32()?,
            }
        }
        1 => {
            let [name, start, duration] = fields_exact(fields)?;
            PerformanceEntry::Timing {
                name: name.into_string()?,
                start: start.into_u32()?,
                duration: duration.into_u32()?,
            }
        }
        tag => return Err(unknown_tag("performance", tag)),
    })
}

fn source_event_to(e: &SourceEvent) -> Value {
    let data = match &e.data {
        EventData::Snapshot(s) => snapshot_to(s),
        EventData::DomPatch(p) => patch_to(p),
        EventData::Interaction(i) => interaction_to(i),
        EventData::Network(n) => network_to(n),
        EventData::Console(c) => console_to(c),
        EventData::Performance(p) => performance_to(p),
    };
    Value::Union {
        tag: e.kind().tag(),
        fields: vec![e.time.into(), data],
    }
}

fn source_event_from(v: Value) -> Result<SourceEvent, DecodeError> {
    let (tag, fields) = v.into_union()?;
    let [time, data] = fields_exact(fields)?;
    let kind = EventKind::from_tag(tag).ok_or_else(|| unknown_tag("event", tag))?;
    let data = match kind {
        EventKind::Snapshot => EventData::Snapshot(snapshot_from(data)?),
        EventKind::DomPatch => EventData::DomPatch(patch_from(data)?),
        EventKind::Interaction => EventData::Interaction(interaction_from(data)?),
        EventKind::Network => EventData::Network(network_from(data)?),
        EventKind::Console => EventData::Console(console_from(data)?),
        EventKind::Performance => EventData::Performance(performance_from(data)?),
    };
    Ok(SourceEvent {
        time: time.into_u32()?,
        data,
    })
}

// ───────────────────────────────────────────────────────────────────
// Schema impls
// ───────────────────────────────────────────────────────────────────

macro_rules! schema {
    ($ty:ty, $descriptor:path, $to:path, $from:path) => {
        impl Schema for $ty {
            fn descriptor() -> &'static Descriptor {
                static D: OnceLock<Descriptor> = OnceLock::new();
                D.get_or_init($descriptor)
            }

            fn to_value(&self) -> Value {
                $to(self)
            }

            fn from_value(value: Value) -> Result<Self, DecodeError> {
                $from(value)
            }
        }
    };
}

schema!(Point, point_descriptor, point_to, point_from);
schema!(VNode, vnode_descriptor, vnode_to, vnode_from);
schema!(VTree, vtree_descriptor, vtree_to, vtree_from);
schema!(Patch, patch_descriptor, patch_to, patch_from);
schema!(Snapshot, snapshot_descriptor, snapshot_to, snapshot_from);
schema!(Interaction, interaction_descriptor, interaction_to, interaction_from);
schema!(NetworkMessage, network_descriptor, network_to, network_from);
schema!(ConsoleMessage, console_descriptor, console_to, console_from);
schema!(PerformanceEntry, performance_descriptor, performance_to, performance_from);
schema!(SourceEvent, source_event_descriptor, source_event_to, source_event_from);

// ───────────────────────────────────────────────────────────────────
// Lazy peeks
// ───────────────────────────────────────────────────────────────────

/// Time of an encoded event, read without decoding its payload.
pub fn peek_time(event: &View<'_>) -> Result<u32, DecodeError> {
    event.field(0)?.as_u32()
}

/// Kind of an encoded event, read from its tag byte.
pub fn peek_kind(event: &View<'_>) -> Result<EventKind, DecodeError> {
    let tag = event.tag()?;
    EventKind::from_tag(tag).ok_or(DecodeError::UnknownTag {
        tag,
        offset: event.offset(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_codec::decode_lazy;

    fn id(s: &str) -> SyntheticId {
        SyntheticId::from(s)
    }

    fn rich_tree() -> VTree {
        let mut input = VNode::element("3", Some(id("2")), "input").with_attribute("type", "checkbox");
        if let Some(el) = input.as_element_mut() {
            el.properties.checked = Some(true);
            el.properties.selected_index = Some(-1);
            el.attributes.insert("disabled".into(), None);
            el.shadow_root = true;
        }
        VTree::from_nodes([
            VNode::document("1"),
            VNode {
                id: id("d"),
                parent_id: Some(id("1")),
                kind: VNodeKind::DocType {
                    name: "html".into(),
                    public_id: "".into(),
                    system_id: "".into(),
                },
            },
            VNode::element("2", Some(id("1")), "body"),
            input,
            VNode::text("4", Some(id("2")), "café ☕"),
        ])
        .unwrap()
    }

    fn all_events() -> Vec<SourceEvent> {
        let tree = rich_tree();
        vec![
            SourceEvent::snapshot(
                0,
                Snapshot::new(
                    Some(tree.clone()),
                    Some(InteractionSnapshot {
                        pointer: Point::new(3, 4),
                        pointer_state: PointerState::Down,
                        scroll: [(id("2"), Point::new(0, 120))].into_iter().collect(),
                        viewport: Point::new(1280, 720),
                        page_url: Some("https://example.test/".into()),
                    }),
                ),
            ),
            SourceEvent::patch(
                5,
                Patch::AddNodes(NodeSplice {
                    parent_id: id("2"),
                    previous_sibling_id: Some(id("3")),
                    next_sibling_id: None,
                    nodes: vec![tree.subtree(&id("3")).unwrap()],
                }),
            ),
            SourceEvent::patch(
                6,
                Patch::Attribute {
                    target_id: id("3"),
                    name: "class".into(),
                    value: None,
                    old_value: Some("a".into()),
                },
            ),
            SourceEvent::patch(
                7,
                Patch::NumberProperty {
                    target_id: id("3"),
                    name: "selectedIndex".into(),
                    value: 2,
                    old_value: -1,
                },
            ),
            SourceEvent::interaction(
                8,
                Interaction::Key {
                    state: KeyState::Down,
                    key: "Enter".into(),
                    target: None,
                },
            ),
            SourceEvent::interaction(
                9,
                Interaction::Scroll {
                    target: id("2"),
                    sample: Sample::new(Point::ZERO, Point::new(0, -40), 100),
                },
            ),
            SourceEvent::new(
                10,
                EventData::Network(NetworkMessage::Request {
                    request_id: "r1".into(),
                    method: "POST".into(),
                    url: "https://example.test/api".into(),
                    headers: [("content-type".to_string(), "application/json".to_string())]
                        .into_iter()
                        .collect(),
                    body: Some(b"{}".to_vec()),
                }),
            ),
            SourceEvent::new(
                11,
                EventData::Network(NetworkMessage::Response {
                    request_id: "r1".into(),
                    status: 204,
                    headers: BTreeMap::new(),
                    body: None,
                }),
            ),
            SourceEvent::new(
                12,
                EventData::Console(ConsoleMessage {
                    level: ConsoleLevel::Error,
                    args: vec!["boom".into(), "42".into()],
                    stack: Some("at main".into()),
                }),
            ),
            SourceEvent::new(
                13,
                EventData::Performance(PerformanceEntry::Timing {
                    name: "paint".into(),
                    start: 2,
                    duration: 11,
                }),
            ),
        ]
    }

    #[test]
    fn test_every_event_round_trips() {
        for event in all_events() {
            let bytes = event.encode().unwrap();
            assert_eq!(SourceEvent::decode(&bytes).unwrap(), event);
        }
    }

    #[test]
    fn test_tree_encoding_is_deterministic() {
        let tree = rich_tree();
        let mut shuffled = VTree {
            root_id: tree.root_id.clone(),
            nodes: Default::default(),
        };
        for node in tree.sorted_nodes().into_iter().rev() {
            shuffled.nodes.insert(node.id.clone(), node.clone());
        }
        assert_eq!(tree.encode().unwrap(), shuffled.encode().unwrap());
    }

    #[test]
    fn test_peek_time_and_kind() {
        let events = all_events();
        let bytes = events[6].encode().unwrap();
        let view = decode_lazy(SourceEvent::descriptor(), &bytes);
        assert_eq!(peek_time(&view).unwrap(), 10);
        assert_eq!(peek_kind(&view).unwrap(), EventKind::Network);
    }

    #[test]
    fn test_invalid_enum_byte_rejected() {
        let snap = Snapshot::new(None, Some(InteractionSnapshot::default()));
        let mut value = snap.to_value();
        if let Value::Struct(fields) = &mut value {
            if let Value::Struct(inner) = &mut fields[1] {
                inner[1] = Value::Int(9);
            }
        }
        let bytes = retrace_codec::encode(Snapshot::descriptor(), &value).unwrap();
        assert!(matches!(
            Snapshot::decode(&bytes),
            Err(DecodeError::Invalid(_))
        ));
    }
}

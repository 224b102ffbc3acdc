//! retrace — inspect and replay recorded sessions.
//!
//! Reads archive files written by `retrace-log` (or bare exported log
//! buffers) and drives `retrace-player` over them.

mod load;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use retrace_core::{EventData, Patch, Snapshot, SourceEvent};
use retrace_player::{LogIndex, Player, PlayerConfig, PlayerStatus};
use serde::Serialize;

use load::load;

#[derive(Parser)]
#[command(name = "retrace")]
#[command(about = "Inspect and replay session recordings", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a recording
    Info {
        path: PathBuf,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List the events of a recording
    Events {
        path: PathBuf,
        /// Stop after this many events
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print one JSON object per event
        #[arg(long)]
        json: bool,
    },
    /// Reconstruct the recorded state at a time or event index
    Seek {
        path: PathBuf,
        /// Target time in ms from the start
        #[arg(short, long, conflicts_with = "event")]
        time: Option<i64>,
        /// Target event index
        #[arg(short, long)]
        event: Option<usize>,
        /// Print the full snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Play a recording in real time, reporting progress
    Play {
        path: PathBuf,
        /// Playback speed (0.1 to 16)
        #[arg(short, long, default_value_t = 1.0)]
        speed: f64,
        /// Start position in ms
        #[arg(long)]
        from: Option<i64>,
        /// Frame interval in ms
        #[arg(long, default_value_t = 16)]
        frame_ms: u64,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Info {
    session_id: Option<String>,
    format_version: Option<u16>,
    started_at_ms: Option<u64>,
    writer: Option<String>,
    bytes: usize,
    events: usize,
    playable_events: usize,
    snapshots: usize,
    duration_ms: u32,
    corrupted_frames: usize,
    kinds: BTreeMap<&'static str, usize>,
}

#[derive(Serialize)]
struct SeekOutput<'a> {
    status: PlayerStatus,
    snapshot: &'a Snapshot,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Info { path, json } => info_cmd(&path, json),
        Commands::Events { path, limit, json } => events_cmd(&path, limit, json),
        Commands::Seek {
            path,
            time,
            event,
            json,
        } => seek_cmd(&path, time, event, json),
        Commands::Play {
            path,
            speed,
            from,
            frame_ms,
        } => play_cmd(&path, speed, from, frame_ms).await,
    }
}

fn info_cmd(path: &Path, json: bool) -> Result<()> {
    let loaded = load(path)?;
    let log = &loaded.log;
    let index = LogIndex::build(log)?;

    let mut kinds = BTreeMap::new();
    for i in 0..index.len() {
        *kinds.entry(log.kind_at(i)?.name()).or_insert(0) += 1;
    }
    let header = loaded.header.as_ref();
    let info = Info {
        session_id: header.map(|h| h.session_id.to_string()),
        format_version: header.map(|h| h.format_version),
        started_at_ms: header.map(|h| h.started_at_ms),
        writer: header.map(|h| h.writer.clone()),
        bytes: log.as_bytes().len(),
        events: log.len(),
        playable_events: index.len(),
        snapshots: index.snapshots().len(),
        duration_ms: index.duration(),
        corrupted_frames: loaded.corrupted_frames,
        kinds,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }
    if let Some(id) = &info.session_id {
        println!("session     {id}");
    }
    if let Some(v) = info.format_version {
        println!("format      v{v}");
    }
    println!("bytes       {}", info.bytes);
    println!("events      {} ({} playable)", info.events, info.playable_events);
    println!("snapshots   {}", info.snapshots);
    println!("duration    {}", format_ms(info.duration_ms));
    if info.corrupted_frames > 0 {
        println!("corrupted   {} frames skipped", info.corrupted_frames);
    }
    for (kind, count) in &info.kinds {
        println!("  {kind:<12} {count}");
    }
    Ok(())
}

fn events_cmd(path: &Path, limit: Option<usize>, json: bool) -> Result<()> {
    let log = load(path)?.log;
    let count = limit.map_or(log.len(), |l| l.min(log.len()));
    for i in 0..count {
        let event = match log.get(i) {
            Ok(event) => event,
            Err(e) => {
                warn!("event {i} does not decode, stopping: {e}");
                break;
            }
        };
        if json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            let size = log.event_view(i)?.extent()?;
            println!(
                "{i:>6}  {:>10}  {:<12} {:>7}B  {}",
                format_ms(event.time),
                event.kind().name(),
                size,
                describe(&event)
            );
        }
    }
    Ok(())
}

fn seek_cmd(path: &Path, time: Option<i64>, event: Option<usize>, json: bool) -> Result<()> {
    let mut player = Player::new(load(path)?.log, PlayerConfig::default())?;
    match (time, event) {
        (Some(t), _) => player.seek_to_time(t)?,
        (None, Some(i)) => player.seek_to_event(i)?,
        (None, None) => bail!("pass --time or --event"),
    }

    if json {
        let out = SeekOutput {
            status: player.status(),
            snapshot: player.snapshot(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        let status = player.status();
        println!(
            "at {} of {} (event {})",
            format_ms(status.elapsed),
            format_ms(status.duration),
            status.active_index
        );
        print_state(player.snapshot());
        if player.pending_samples() > 0 {
            println!("{} samples in progress", player.pending_samples());
        }
    }
    player.close();
    Ok(())
}

async fn play_cmd(path: &Path, speed: f64, from: Option<i64>, frame_ms: u64) -> Result<()> {
    let config = PlayerConfig {
        speed,
        frame_interval: Duration::from_millis(frame_ms),
    };
    let mut player = Player::new(load(path)?.log, config)?;
    if let Some(t) = from {
        player.seek_to_time(t)?;
    }
    info!(
        "playing {} at {}x",
        format_ms(player.duration()),
        player.speed()
    );
    player.play()?;

    let mut last_second = None;
    player
        .run(|p| {
            let second = p.elapsed() / 1000;
            if last_second != Some(second) {
                last_second = Some(second);
                println!(
                    "{:>10}  event {:>6}  nodes {}",
                    format_ms(p.elapsed()),
                    p.active_index(),
                    p.snapshot().dom.as_ref().map_or(0, |d| d.len())
                );
            }
        })
        .await;

    print_state(player.snapshot());
    player.close();
    Ok(())
}

fn print_state(snapshot: &Snapshot) {
    match &snapshot.dom {
        Some(dom) => println!("document    {} nodes", dom.len()),
        None => println!("document    (none)"),
    }
    if let Some(i) = &snapshot.interaction {
        println!("pointer     {},{} ({:?})", i.pointer.x, i.pointer.y, i.pointer_state);
        println!("viewport    {}x{}", i.viewport.x, i.viewport.y);
        if let Some(url) = &i.page_url {
            println!("page        {url}");
        }
    }
}

fn describe(event: &SourceEvent) -> String {
    match &event.data {
        EventData::Snapshot(s) => {
            format!("{} nodes", s.dom.as_ref().map_or(0, |d| d.len()))
        }
        EventData::DomPatch(patch) => match patch {
            Patch::Attribute { target_id, name, .. } => format!("attribute {name} on {target_id}"),
            Patch::Text { target_id, .. } => format!("text of {target_id}"),
            Patch::BooleanProperty { target_id, name, .. }
            | Patch::NumberProperty { target_id, name, .. }
            | Patch::TextProperty { target_id, name, .. } => {
                format!("property {name} on {target_id}")
            }
            Patch::AddNodes(splice) => {
                format!("add {} under {}", splice.nodes.len(), splice.parent_id)
            }
            Patch::RemoveNodes(splice) => {
                format!("remove {} from {}", splice.nodes.len(), splice.parent_id)
            }
        },
        EventData::Interaction(i) => format!("{i:?}"),
        EventData::Network(n) => format!("{n:?}"),
        EventData::Console(c) => format!("{:?} {}", c.level, c.args.join(" ")),
        EventData::Performance(p) => format!("{p:?}"),
    }
}

fn format_ms(ms: u32) -> String {
    format!("{}.{:03}s", ms / 1000, ms % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::{NodeSplice, VNode, VTree};

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(0), "0.000s");
        assert_eq!(format_ms(61_005), "61.005s");
    }

    #[test]
    fn test_describe_patch() {
        let event = SourceEvent::patch(
            5,
            Patch::AddNodes(NodeSplice {
                parent_id: "body".into(),
                previous_sibling_id: None,
                next_sibling_id: None,
                nodes: vec![VTree::new(VNode::element("p1", None, "p"))],
            }),
        );
        assert_eq!(describe(&event), "add 1 under body");
    }

    #[test]
    fn test_cli_parses_seek() {
        let cli = Cli::try_parse_from(["retrace", "seek", "rec.rtrc", "--time", "1500", "--json"]).unwrap();
        match cli.command {
            Commands::Seek { time, event, json, .. } => {
                assert_eq!(time, Some(1500));
                assert_eq!(event, None);
                assert!(json);
            }
            _ => panic!("expected seek"),
        }
        assert!(Cli::try_parse_from(["retrace", "seek", "x", "--time", "1", "--event", "2"]).is_err());
    }
}

//! Reading recordings from disk: archives or bare log buffers.

use std::path::Path;

use anyhow::{Context, Result};
use retrace_log::archive::ARCHIVE_MAGIC;
use retrace_log::{Archive, ArchiveHeader, EventLog};

pub struct Loaded {
    pub log: EventLog,
    pub header: Option<ArchiveHeader>,
    pub corrupted_frames: usize,
}

/// Load `path`, detecting the archive container by its magic bytes.
pub fn load(path: &Path) -> Result<Loaded> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if bytes.starts_with(&ARCHIVE_MAGIC) {
        let archive = Archive::from_bytes(&bytes)
            .with_context(|| format!("opening archive {}", path.display()))?;
        return Ok(Loaded {
            log: archive.log,
            header: Some(archive.header),
            corrupted_frames: archive.corrupted_frames,
        });
    }
    let log = EventLog::from_bytes(bytes)
        .with_context(|| format!("{} is neither an archive nor an event log", path.display()))?;
    Ok(Loaded {
        log,
        header: None,
        corrupted_frames: 0,
    })
}

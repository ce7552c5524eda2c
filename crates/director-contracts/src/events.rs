use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::runs::session::TakeSeedMode;
use crate::world::Category;

/// What the director reports while it works, tagged by `type` on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DirectorEvent {
    SessionStarted {
        world: String,
        realm: Option<String>,
        seed_start: u64,
        take_count: u32,
        take_seed_mode: TakeSeedMode,
    },
    TakeRecorded {
        take_index: u32,
        seed: u64,
        score: Option<i64>,
        /// Categories pinned by freeze memory for this take.
        overrides: Vec<Category>,
    },
    SessionFinished {
        picked_take_index: u32,
        picked_score: Option<i64>,
        next_seed: u64,
    },
    SessionMerged {
        source_files: Vec<String>,
        take_count: u32,
        picked_take_index: u32,
        load_errors: Vec<String>,
    },
}

impl DirectorEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DirectorEvent::SessionStarted { .. } => "session_started",
            DirectorEvent::TakeRecorded { .. } => "take_recorded",
            DirectorEvent::SessionFinished { .. } => "session_finished",
            DirectorEvent::SessionMerged { .. } => "session_merged",
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    event: &'a DirectorEvent,
    session_id: &'a str,
    ts: String,
}

/// JSONL event log shared by every session that writes to the same path.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Appends one compact line stamped with the session id and UTC time.
    pub fn append(&self, session_id: &str, event: &DirectorEvent) -> anyhow::Result<()> {
        let line = serde_json::to_string(&Envelope {
            event,
            session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        })?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

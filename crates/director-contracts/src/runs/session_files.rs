use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use super::session::Session;

/// Serialize for the host: pretty uses two-space indentation, compact has no
/// whitespace after `,` or `:`.
pub fn render_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> anyhow::Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

pub fn file_stamp(now: DateTime<Local>) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}

pub fn now_local_iso() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Sibling output paths sharing one `<prefix>_<stamp>` base name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFiles {
    pub shots_json: PathBuf,
    pub picked_json: PathBuf,
    pub shots_txt: PathBuf,
}

impl SessionFiles {
    pub fn new(dir: &Path, prefix: &str, stamp: &str) -> Self {
        let base = file_base(prefix, stamp);
        Self {
            shots_json: dir.join(format!("{base}_shots.json")),
            picked_json: dir.join(format!("{base}_picked.json")),
            shots_txt: dir.join(format!("{base}_shots.txt")),
        }
    }

    pub fn merged(dir: &Path, prefix: &str, stamp: &str) -> Self {
        let base = file_base(prefix, stamp);
        Self {
            shots_json: dir.join(format!("{base}_merged_shots.json")),
            picked_json: dir.join(format!("{base}_merged_picked.json")),
            shots_txt: dir.join(format!("{base}_merged_shots.txt")),
        }
    }
}

pub fn write_session(
    files: &SessionFiles,
    session: &Session,
    pretty: bool,
    with_text: bool,
) -> anyhow::Result<()> {
    write_text(&files.shots_json, &render_json(session, pretty)?)?;
    let picked = session
        .picked()
        .ok_or_else(|| anyhow::anyhow!("session '{}' has no takes", session.session_id))?;
    write_text(&files.picked_json, &render_json(&picked, pretty)?)?;
    if with_text {
        write_text(&files.shots_txt, &render_shot_list_text(session))?;
    }
    Ok(())
}

/// Human-readable shot list: one block per take.
pub fn render_shot_list_text(session: &Session) -> String {
    let total = session.takes.len();
    let mut out = String::new();
    for take in &session.takes {
        out.push_str(&format!("===== TAKE {}/{} =====\n", take.take_index, total));
        out.push_str(take.notes.trim_end());
        out.push('\n');
        out.push_str("----- FINAL PROMPT -----\n");
        out.push_str(take.final_prompt.trim_end());
        out.push_str("\n\n");
    }
    out
}

pub(crate) fn write_text(path: &Path, body: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, body)?;
    Ok(())
}

fn file_base(prefix: &str, stamp: &str) -> String {
    format!("{prefix}_{stamp}").replace(' ', "_")
}

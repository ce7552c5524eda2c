use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use super::documents::{absolute_path, best_take_by_score, read_session_document, value_text};
use super::session::{Chosen, PickedResult};
use super::session_files::{now_local_iso, render_json, write_text, SessionFiles};

pub const MERGED_SESSION_TYPE: &str = "PFN_Director_MergedSession";

/// One merge input: where it came from and what reading it produced.
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub source: String,
    pub document: Result<Value, String>,
}

impl SessionInput {
    pub fn from_path(path: &str) -> Self {
        match read_session_document(path) {
            Ok((abs, document)) => Self {
                source: abs.to_string_lossy().to_string(),
                document: Ok(document),
            },
            Err(err) => Self {
                source: absolute_path(Path::new(path.trim()))
                    .to_string_lossy()
                    .to_string(),
                document: Err(err),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedSession {
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: String,
    pub source_files: Vec<String>,
    pub worlds: Vec<String>,
    pub take_count: u32,
    pub takes: Vec<Map<String, Value>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub load_errors: Vec<String>,
    #[serde(skip)]
    pub picked: PickedResult,
}

/// Host-facing outputs of a merge; failures show up as sentinel text with a
/// take count of 0 and picked index -1.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    pub merged_json: String,
    pub picked_json: String,
    pub take_count: u32,
    pub picked_take_index: i64,
    /// The merged document behind the rendered text, absent on failure.
    pub merged: Option<MergedSession>,
}

/// Split a multiline or `;`-separated path list, skipping blanks and `#`
/// comment lines.
pub fn parse_path_list(raw: &str) -> Vec<String> {
    raw.replace('\n', ";")
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty() && !part.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Concatenate the takes of every input in order and renumber them.
///
/// Inputs that fail to load are recorded in `load_errors`; the merge only
/// fails when no input contributes a take.
pub fn merge_sessions(
    inputs: Vec<SessionInput>,
    recompute_picked: bool,
) -> Result<MergedSession, String> {
    let mut takes: Vec<Map<String, Value>> = Vec::new();
    let mut load_errors: Vec<String> = Vec::new();
    let mut source_files: Vec<String> = Vec::new();
    let mut worlds: Vec<String> = Vec::new();

    for input in inputs {
        let document = match input.document {
            Ok(document) => document,
            Err(err) => {
                load_errors.push(err);
                continue;
            }
        };
        let Some(rows) = document.get("takes").and_then(Value::as_array) else {
            load_errors.push(format!("(bad takes array) {}", input.source));
            continue;
        };

        if let Some(world) = document.get("world").and_then(Value::as_str) {
            if !world.is_empty() {
                worlds.push(world.to_string());
            }
        }
        source_files.push(input.source.clone());

        for row in rows {
            let Some(take) = row.as_object() else {
                continue;
            };
            let mut take = take.clone();
            take.insert("source_file".to_string(), Value::String(input.source.clone()));
            takes.push(take);
        }
    }

    if takes.is_empty() {
        let mut message = "(no takes loaded)".to_string();
        for err in load_errors.iter().take(50) {
            message.push('\n');
            message.push_str(err);
        }
        return Err(message);
    }

    for (idx, take) in takes.iter_mut().enumerate() {
        take.insert("take_index".to_string(), Value::from(idx as u64 + 1));
    }

    // Keep-first reports no score, even when take 1 carries one.
    let (picked_idx, picked_score) = if recompute_picked {
        best_take_by_score(&takes)
    } else {
        (1, None)
    };
    let picked = picked_from_row(&takes[picked_idx as usize - 1], picked_idx, picked_score);
    tracing::debug!(
        take_count = takes.len(),
        picked = picked_idx,
        errors = load_errors.len(),
        "merged sessions"
    );

    Ok(MergedSession {
        kind: MERGED_SESSION_TYPE.to_string(),
        created_at: now_local_iso(),
        source_files,
        worlds,
        take_count: takes.len() as u32,
        takes,
        load_errors,
        picked,
    })
}

/// Run a merge over a raw path list and render the host outputs.
pub fn merge_report(raw_paths: &str, pretty: bool, recompute_picked: bool) -> MergeReport {
    let paths = parse_path_list(raw_paths);
    if paths.is_empty() {
        return failed_report("(no paths provided)".to_string());
    }
    let inputs = paths.iter().map(|path| SessionInput::from_path(path)).collect();
    match merge_sessions(inputs, recompute_picked) {
        Ok(merged) => match merged.render(pretty) {
            Ok((merged_json, picked_json)) => MergeReport {
                merged_json,
                picked_json,
                take_count: merged.take_count,
                picked_take_index: i64::from(merged.picked.picked_take_index),
                merged: Some(merged),
            },
            Err(err) => failed_report(format!("(render failed) {err}")),
        },
        Err(message) => failed_report(message),
    }
}

impl MergedSession {
    pub fn render(&self, pretty: bool) -> anyhow::Result<(String, String)> {
        Ok((render_json(self, pretty)?, render_json(&self.picked, pretty)?))
    }

    pub fn save(
        &self,
        dir: &Path,
        prefix: &str,
        stamp: &str,
        pretty: bool,
    ) -> anyhow::Result<(PathBuf, PathBuf)> {
        let files = SessionFiles::merged(dir, prefix, stamp);
        let (merged_json, picked_json) = self.render(pretty)?;
        write_text(&files.shots_json, &merged_json)?;
        write_text(&files.picked_json, &picked_json)?;
        Ok((files.shots_json, files.picked_json))
    }
}

fn picked_from_row(row: &Map<String, Value>, index: u32, score: Option<i64>) -> PickedResult {
    PickedResult {
        picked_take_index: index,
        picked_score: score,
        picked_seed: row.get("seed").and_then(Value::as_u64),
        picked_source_file: row
            .get("source_file")
            .and_then(Value::as_str)
            .map(str::to_string),
        picked_chosen: row.get("chosen").map(Chosen::from_json).unwrap_or_default(),
        picked_final_prompt: value_text(row.get("final_prompt")),
        picked_notes: value_text(row.get("notes")),
    }
}

fn failed_report(message: String) -> MergeReport {
    MergeReport {
        merged_json: message,
        picked_json: "{}".to_string(),
        take_count: 0,
        picked_take_index: -1,
        merged: None,
    }
}

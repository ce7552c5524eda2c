use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::runs::session_files::now_local_iso;

pub const SOURCE_GENERATED: &str = "generated";
pub const SOURCE_HISTORY_LOCK: &str = "history_lock";

static LABEL_INDEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*\|").expect("valid regex"));

/// One line of `prompt_history.jsonl`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub json_world: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub final_prompt: String,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub take_index: Option<u32>,
    #[serde(default)]
    pub node_version: String,
}

impl HistoryEntry {
    pub fn generated(world: &str, mode: &str, final_prompt: &str) -> Self {
        Self {
            timestamp: now_local_iso(),
            json_world: world.to_string(),
            system_prompt: mode.to_string(),
            source: SOURCE_GENERATED.to_string(),
            final_prompt: final_prompt.to_string(),
            seed: None,
            take_index: None,
            node_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn label(&self, idx: usize) -> String {
        let shown = |value: &str, fallback: &'static str| {
            if value.is_empty() {
                fallback.to_string()
            } else {
                value.to_string()
            }
        };
        format!(
            "{idx} | {} | {} | {} | {}",
            shown(&self.timestamp, "unknown-time"),
            shown(&self.json_world, "unknown-json"),
            shown(&self.system_prompt, "standard"),
            shown(&self.source, SOURCE_GENERATED),
        )
    }
}

/// Append-only writer for the prompt history log.
#[derive(Debug, Clone)]
pub struct HistoryWriter {
    path: PathBuf,
}

impl HistoryWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record(&self, entry: &HistoryEntry) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(serde_json::to_string(entry)?.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryFilter {
    pub max_entries: usize,
    /// `all`, `generated` or `history_lock`.
    pub source: String,
    pub world: String,
    pub system: String,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            max_entries: 80,
            source: "all".to_string(),
            world: String::new(),
            system: String::new(),
        }
    }
}

impl HistoryFilter {
    fn matches(&self, entry: &HistoryEntry) -> bool {
        if self.source != "all" && entry.source != self.source {
            return false;
        }
        contains_folded(&entry.json_world, &self.world)
            && contains_folded(&entry.system_prompt, &self.system)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayMiss {
    NoEntries,
    BadSelection,
    OutOfRange,
}

impl ReplayMiss {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplayMiss::NoEntries => "no_entries",
            ReplayMiss::BadSelection => "bad_selection",
            ReplayMiss::OutOfRange => "out_of_range",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Replay {
    pub prompt: String,
    pub meta: Value,
}

/// Filtered, most-recent-first view over the history log.
///
/// The view is owned by whoever browses; nothing is shared between browsers
/// and nothing changes until [`HistoryBrowser::reload`] is called.
#[derive(Debug, Clone)]
pub struct HistoryBrowser {
    path: PathBuf,
    entries: Vec<HistoryEntry>,
    options: Vec<String>,
}

impl HistoryBrowser {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
            options: Vec::new(),
        }
    }

    pub fn reload(&mut self, filter: &HistoryFilter) {
        self.entries.clear();
        self.options.clear();

        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            self.options.push("(no prompt_history.jsonl found)".to_string());
            return;
        };
        let mut matching: Vec<HistoryEntry> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| serde_json::from_str::<HistoryEntry>(line).ok())
            .filter(|entry| filter.matches(entry))
            .collect();
        if matching.is_empty() {
            self.options.push("(no entries match filters)".to_string());
            return;
        }

        let keep = filter.max_entries.max(1);
        if matching.len() > keep {
            matching.drain(..matching.len() - keep);
        }
        matching.reverse();
        self.options = matching
            .iter()
            .enumerate()
            .map(|(idx, entry)| entry.label(idx))
            .collect();
        self.entries = matching;
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn get(&self, idx: usize) -> Option<&HistoryEntry> {
        self.entries.get(idx)
    }

    /// Resolve a dropdown label (`"<idx> | ..."`) back to its entry.
    pub fn replay(&self, pick: &str) -> Result<Replay, ReplayMiss> {
        if self.entries.is_empty() {
            return Err(ReplayMiss::NoEntries);
        }
        let idx: usize = LABEL_INDEX_RE
            .captures(pick)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .ok_or(ReplayMiss::BadSelection)?;
        let entry = self.get(idx).ok_or(ReplayMiss::OutOfRange)?;
        tracing::debug!(world = %entry.json_world, source = %entry.source, "replayed prompt");
        Ok(Replay {
            prompt: entry.final_prompt.clone(),
            meta: json!({
                "timestamp": entry.timestamp,
                "json_world": entry.json_world,
                "system_prompt": entry.system_prompt,
                "source": entry.source,
                "seed": entry.seed,
                "take_index": entry.take_index,
                "node_version": entry.node_version,
            }),
        })
    }
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    needle.is_empty() || haystack.to_lowercase().contains(&needle)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        HistoryBrowser, HistoryEntry, HistoryFilter, HistoryWriter, ReplayMiss,
        SOURCE_HISTORY_LOCK,
    };

    fn entry(world: &str, mode: &str, source: &str, prompt: &str) -> HistoryEntry {
        HistoryEntry {
            timestamp: format!("2026-02-19T10:00:{:02}", prompt.len()),
            json_world: world.to_string(),
            system_prompt: mode.to_string(),
            source: source.to_string(),
            final_prompt: prompt.to_string(),
            seed: Some(7),
            take_index: Some(1),
            node_version: "0.1.0".to_string(),
        }
    }

    #[test]
    fn browser_lists_most_recent_first_with_labels() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("logs").join("prompt_history.jsonl");
        let writer = HistoryWriter::new(&path);
        writer.record(&entry("Noir.json", "standard", "generated", "first"))?;
        writer.record(&entry("Goth.json", "enhancer", "generated", "second"))?;
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut file| std::io::Write::write_all(&mut file, b"not json\n\n"))?;
        writer.record(&entry("Noir.json", "standard", SOURCE_HISTORY_LOCK, "third"))?;

        let mut browser = HistoryBrowser::new(&path);
        browser.reload(&HistoryFilter::default());
        assert_eq!(browser.options().len(), 3);
        assert!(browser.options()[0].starts_with("0 | "));
        assert!(browser.options()[0].ends_with("| Noir.json | standard | history_lock"));
        assert_eq!(browser.get(2).map(|e| e.final_prompt.as_str()), Some("first"));
        Ok(())
    }

    #[test]
    fn filters_and_max_entries_apply() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("prompt_history.jsonl");
        let writer = HistoryWriter::new(&path);
        for (world, prompt) in [("Noir.json", "a"), ("Goth.json", "bb"), ("noir_v2.json", "ccc")] {
            writer.record(&entry(world, "Enhancer_Mode", "generated", prompt))?;
        }

        let mut browser = HistoryBrowser::new(&path);
        browser.reload(&HistoryFilter {
            world: "NOIR".to_string(),
            system: "enhancer".to_string(),
            ..HistoryFilter::default()
        });
        assert_eq!(browser.options().len(), 2);
        assert_eq!(browser.get(0).map(|e| e.final_prompt.as_str()), Some("ccc"));

        browser.reload(&HistoryFilter {
            max_entries: 1,
            ..HistoryFilter::default()
        });
        assert_eq!(browser.options().len(), 1);
        assert_eq!(browser.get(0).map(|e| e.final_prompt.as_str()), Some("ccc"));

        browser.reload(&HistoryFilter {
            source: SOURCE_HISTORY_LOCK.to_string(),
            ..HistoryFilter::default()
        });
        assert_eq!(browser.options(), &["(no entries match filters)".to_string()]);
        assert_eq!(browser.replay("0 | x"), Err(ReplayMiss::NoEntries));
        Ok(())
    }

    #[test]
    fn replay_resolves_labels() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("prompt_history.jsonl");
        HistoryWriter::new(&path).record(&entry("Noir.json", "standard", "generated", "red dress"))?;

        let mut browser = HistoryBrowser::new(&path);
        browser.reload(&HistoryFilter::default());
        let label = browser.options()[0].clone();
        let replay = browser.replay(&label).map_err(|miss| anyhow::anyhow!(miss.as_str()))?;
        assert_eq!(replay.prompt, "red dress");
        assert_eq!(replay.meta["json_world"], json!("Noir.json"));
        assert_eq!(replay.meta["seed"], json!(7));

        assert_eq!(browser.replay("pick me"), Err(ReplayMiss::BadSelection));
        assert_eq!(browser.replay(" 4 | later"), Err(ReplayMiss::OutOfRange));
        Ok(())
    }

    #[test]
    fn missing_log_reports_placeholder_option() {
        let mut browser = HistoryBrowser::new("/definitely/not/prompt_history.jsonl");
        browser.reload(&HistoryFilter::default());
        assert_eq!(browser.options(), &["(no prompt_history.jsonl found)".to_string()]);
        assert!(browser.get(0).is_none());
    }
}

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::session::Chosen;

/// File-backed store for the "last chosen" snapshot of each director
/// instance, keyed by an instance id.
///
/// Every read refreshes from disk and every write merges only the touched
/// key into the on-disk payload, so two instances sharing one file do not
/// clobber each other.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: PathBuf,
    payload: Option<Map<String, Value>>,
    dirty_keys: Vec<String>,
}

impl MemoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            payload: None,
            dirty_keys: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&mut self, instance: &str) -> Option<Chosen> {
        let payload = self.refresh();
        let stored = payload.get(instance)?;
        let chosen = Chosen::from_json(stored);
        if chosen.is_empty() {
            None
        } else {
            Some(chosen)
        }
    }

    pub fn store(&mut self, instance: &str, chosen: Option<&Chosen>) -> anyhow::Result<()> {
        let snapshot = match chosen {
            Some(chosen) => serde_json::to_value(chosen)?,
            None => Value::Null,
        };
        let payload = self.refresh();
        if payload.get(instance) == Some(&snapshot) {
            return Ok(());
        }
        payload.insert(instance.to_string(), snapshot);
        if !self.dirty_keys.iter().any(|key| key == instance) {
            self.dirty_keys.push(instance.to_string());
        }
        self.flush()
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        if self.payload.is_none() || self.dirty_keys.is_empty() {
            return Ok(());
        }

        let mut on_disk = read_json_object(&self.path).unwrap_or_default();
        if let Some(payload) = &self.payload {
            for key in &self.dirty_keys {
                if let Some(value) = payload.get(key) {
                    on_disk.insert(key.clone(), value.clone());
                }
            }
        }
        write_json_object(&self.path, &on_disk)?;
        self.payload = Some(on_disk);
        self.dirty_keys.clear();
        Ok(())
    }

    fn refresh(&mut self) -> &mut Map<String, Value> {
        self.payload
            .insert(read_json_object(&self.path).unwrap_or_default())
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let raw = std::fs::read_to_string(path).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed.as_object().cloned()
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    Ok(())
}

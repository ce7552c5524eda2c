use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;

use super::error::WorldError;
use super::model::World;

/// Read one world file. Malformed categories are dropped with a warning;
/// only a missing file, a non-JSON suffix, unparsable JSON or a non-object
/// root fail the load.
pub fn load_world_file(path: &Path) -> Result<World, WorldError> {
    if !path.exists() {
        return Err(WorldError::NotFound(path.to_path_buf()));
    }
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(WorldError::NotJson(path.to_path_buf()));
    }

    let raw = std::fs::read_to_string(path).map_err(|source| WorldError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("world")
        .to_string();
    let value: Value = serde_json::from_str(&raw).map_err(|err| WorldError::Json {
        name: stem.clone(),
        message: err.to_string(),
    })?;
    let name = value
        .get("WORLD_NAME")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or(stem);

    let (world, issues) = World::from_value_lossy(&name, &value);
    for issue in issues {
        if matches!(issue, WorldError::NotObject(_)) {
            return Err(issue);
        }
        tracing::warn!(world = %name, path = %path.display(), "dropped world category: {issue}");
    }
    Ok(world)
}

/// Worlds found in one directory, loaded lazily and refreshed on demand.
///
/// Each registry owns its cache; callers that need fresh data call
/// [`WorldRegistry::reload`].
#[derive(Debug, Clone)]
pub struct WorldRegistry {
    dir: PathBuf,
    worlds: Option<IndexMap<String, World>>,
}

impl WorldRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            worlds: None,
        }
    }

    /// Registry over an in-memory set of worlds, keyed by world name.
    pub fn from_worlds(worlds: impl IntoIterator<Item = World>) -> Self {
        Self {
            dir: PathBuf::new(),
            worlds: Some(
                worlds
                    .into_iter()
                    .map(|world| (world.name.clone(), world))
                    .collect(),
            ),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn reload(&mut self) {
        let worlds = load_worlds_from_dir(&self.dir);
        tracing::debug!(count = worlds.len(), dir = %self.dir.display(), "loaded worlds");
        self.worlds = Some(worlds);
    }

    pub fn list_names(&mut self) -> Vec<String> {
        let mut names: Vec<String> = self.ensure_loaded().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get(&mut self, name: &str) -> Option<&World> {
        self.ensure_loaded().get(name)
    }

    fn ensure_loaded(&mut self) -> &IndexMap<String, World> {
        if self.worlds.is_none() {
            self.reload();
        }
        self.worlds.get_or_insert_with(IndexMap::new)
    }
}

fn load_worlds_from_dir(dir: &Path) -> IndexMap<String, World> {
    let mut worlds = IndexMap::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return worlds;
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
        })
        .collect();
    paths.sort();

    for path in paths {
        match load_world_file(&path) {
            Ok(world) => {
                worlds.insert(world.name.clone(), world);
            }
            Err(err) => tracing::warn!(path = %path.display(), "skipping world file: {err}"),
        }
    }
    worlds
}

use indexmap::IndexMap;
use serde_json::{Map, Value};

use super::category::Category;
use super::error::WorldError;

const LIST_SHAPE: &str = "a list of strings or an object of realm lists";
const INTRO_SHAPE: &str = "an object or a list of strings";

/// Normalized, read-only view of one world file.
///
/// Candidate lists never contain blank entries. Categories keyed by color
/// realm live in `realm_lists` until [`World::flatten`] picks a realm; the
/// selector only ever reads the flat `lists`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct World {
    pub name: String,
    pub system_prompt: String,
    pub custom_intro: IndexMap<String, String>,
    pub lists: IndexMap<Category, Vec<String>>,
    pub realm_lists: IndexMap<Category, IndexMap<String, Vec<String>>>,
    pub color_realms: Vec<String>,
}

impl World {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Strict load: any malformed category rejects the whole world.
    pub fn from_value(name: &str, value: &Value) -> Result<Self, WorldError> {
        let (world, mut issues) = Self::from_value_lossy(name, value);
        if issues.is_empty() {
            Ok(world)
        } else {
            Err(issues.remove(0))
        }
    }

    /// Lenient load used at file boundaries: malformed categories are dropped
    /// and reported, the rest of the world survives.
    pub fn from_value_lossy(name: &str, value: &Value) -> (Self, Vec<WorldError>) {
        let mut world = World::new(name);
        let mut issues = Vec::new();
        let Some(obj) = value.as_object() else {
            issues.push(WorldError::NotObject(name.to_string()));
            return (world, issues);
        };

        if let Some(raw) = obj.get("SYSTEM_PROMPT") {
            world.system_prompt = coerce_text(raw).unwrap_or_default();
        }

        if let Some(realms) = obj.get("COLOR_REALM").and_then(Value::as_array) {
            for realm in realms.iter().filter_map(coerce_text) {
                push_unique(&mut world.color_realms, realm);
            }
        }

        match obj.get(Category::CustomIntro.world_key()) {
            None | Some(Value::Null) => {}
            Some(Value::Object(entries)) => {
                for (key, raw) in entries {
                    if let Some(text) = coerce_text(raw) {
                        world.custom_intro.insert(key.trim().to_string(), text);
                    }
                }
            }
            Some(Value::Array(entries)) => {
                for (idx, raw) in entries.iter().enumerate() {
                    if let Some(text) = coerce_text(raw) {
                        world.custom_intro.insert(idx.to_string(), text);
                    }
                }
            }
            Some(other) => issues.push(WorldError::CategoryShape {
                key: Category::CustomIntro.world_key().to_string(),
                expected: INTRO_SHAPE,
                found: kind_of(other),
            }),
        }

        for category in Category::LISTED {
            match obj.get(category.world_key()) {
                None | Some(Value::Null) => {}
                Some(Value::Array(entries)) => {
                    world.lists.insert(category, coerce_list(entries));
                }
                Some(Value::Object(by_realm)) => {
                    let realms = parse_realm_lists(by_realm);
                    for realm in realms.keys() {
                        push_unique(&mut world.color_realms, realm.clone());
                    }
                    world.realm_lists.insert(category, realms);
                }
                Some(other) => issues.push(WorldError::CategoryShape {
                    key: category.world_key().to_string(),
                    expected: LIST_SHAPE,
                    found: kind_of(other),
                }),
            }
        }

        (world, issues)
    }

    /// Candidate list for a listed category; empty when the world lacks it.
    pub fn candidates(&self, category: Category) -> &[String] {
        self.lists
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether the world itself supplies values for `category`.
    pub fn provides(&self, category: Category) -> bool {
        match category {
            Category::CustomIntro => !self.custom_intro.is_empty(),
            other => !self.candidates(other).is_empty(),
        }
    }

    /// Collapse realm-keyed categories into flat lists.
    ///
    /// `Some(realm)` keeps only that realm's entries (an unknown realm yields
    /// empty lists, hence fallbacks); `None` takes the union of all realms in
    /// first-seen order.
    pub fn flatten(&self, realm: Option<&str>) -> World {
        let mut flat = self.clone();
        flat.realm_lists = IndexMap::new();
        for (category, by_realm) in &self.realm_lists {
            let mut merged: Vec<String> = Vec::new();
            for (name, entries) in by_realm {
                if realm.is_some_and(|wanted| wanted != name) {
                    continue;
                }
                for entry in entries {
                    push_unique(&mut merged, entry.clone());
                }
            }
            let slot = flat.lists.entry(*category).or_default();
            for entry in merged {
                push_unique(slot, entry);
            }
        }
        flat
    }
}

fn parse_realm_lists(by_realm: &Map<String, Value>) -> IndexMap<String, Vec<String>> {
    let mut out = IndexMap::new();
    for (realm, entries) in by_realm {
        let realm = realm.trim();
        if realm.is_empty() {
            continue;
        }
        if let Some(entries) = entries.as_array() {
            out.insert(realm.to_string(), coerce_list(entries));
        }
    }
    out
}

fn coerce_list(entries: &[Value]) -> Vec<String> {
    entries.iter().filter_map(coerce_text).collect()
}

fn coerce_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(text) => text.trim().to_string(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => {
            value.to_string().trim().to_string()
        }
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

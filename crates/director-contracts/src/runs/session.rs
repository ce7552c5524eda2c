use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::world::Category;

pub const SESSION_TYPE: &str = "PFN_Director_Session";

pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Values actually used for one take, keyed by category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Chosen(IndexMap<Category, String>);

impl Chosen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lenient read of a `chosen` object from a stored document; unknown keys
    /// and non-string values are skipped.
    pub fn from_json(value: &Value) -> Self {
        let mut chosen = Chosen::new();
        if let Some(obj) = value.as_object() {
            for (key, raw) in obj {
                let (Ok(category), Some(text)) = (key.parse::<Category>(), raw.as_str()) else {
                    continue;
                };
                chosen.insert(category, text);
            }
        }
        chosen
    }

    pub fn get(&self, category: Category) -> &str {
        self.0.get(&category).map(String::as_str).unwrap_or("")
    }

    pub fn insert(&mut self, category: Category, value: impl Into<String>) {
        self.0.insert(category, value.into());
    }

    pub fn contains(&self, category: Category) -> bool {
        self.0.contains_key(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &str)> {
        self.0.iter().map(|(category, value)| (*category, value.as_str()))
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(Category, String)> for Chosen {
    fn from_iter<I: IntoIterator<Item = (Category, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeSeedMode {
    Keep,
    #[default]
    Increment,
    Randomize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickRule {
    #[default]
    Balanced,
    Closeup,
    Lowlight,
    Profile,
    Keyword,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub rule: PickRule,
    #[serde(default)]
    pub keyword: String,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            rule: PickRule::Balanced,
            keyword: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Take {
    pub take_index: u32,
    pub seed: u64,
    pub chosen: Chosen,
    pub prompt: String,
    pub system_prompt: String,
    pub final_prompt: String,
    pub notes: String,
    pub score: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(rename = "type")]
    pub kind: String,
    pub session_id: String,
    pub created_at: String,
    pub world: String,
    #[serde(default)]
    pub realm: Option<String>,
    pub take_count: u32,
    pub seed_start: u64,
    pub take_seed_mode: TakeSeedMode,
    pub picker: PickerConfig,
    pub picked_take_index: u32,
    pub takes: Vec<Take>,
}

impl Session {
    pub fn picked_take(&self) -> Option<&Take> {
        let idx = usize::try_from(self.picked_take_index).ok()?;
        self.takes.get(idx.checked_sub(1)?)
    }

    pub fn picked(&self) -> Option<PickedResult> {
        self.picked_take().map(PickedResult::from_take)
    }
}

/// Best-take pointer derived from a session; never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickedResult {
    pub picked_take_index: u32,
    pub picked_score: Option<i64>,
    pub picked_seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picked_source_file: Option<String>,
    pub picked_chosen: Chosen,
    pub picked_final_prompt: String,
    pub picked_notes: String,
}

impl PickedResult {
    pub fn from_take(take: &Take) -> Self {
        Self {
            picked_take_index: take.take_index,
            picked_score: take.score,
            picked_seed: Some(take.seed),
            picked_source_file: None,
            picked_chosen: take.chosen.clone(),
            picked_final_prompt: take.final_prompt.clone(),
            picked_notes: take.notes.clone(),
        }
    }
}

macro_rules! snake_case_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = String;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                match raw.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($ty::$variant),)+
                    other => Err(format!(
                        "unknown {} '{}'",
                        stringify!($ty),
                        other
                    )),
                }
            }
        }
    };
}

snake_case_names!(TakeSeedMode {
    Keep => "keep",
    Increment => "increment",
    Randomize => "randomize",
});

snake_case_names!(PickRule {
    Balanced => "balanced",
    Closeup => "closeup",
    Lowlight => "lowlight",
    Profile => "profile",
    Keyword => "keyword",
});

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Chosen, PickRule, PickerConfig, Session, Take, TakeSeedMode, SESSION_TYPE};
    use crate::world::Category;

    fn take(index: u32, camera: &str, score: Option<i64>) -> Take {
        let mut chosen = Chosen::new();
        chosen.insert(Category::Camera, camera);
        Take {
            take_index: index,
            seed: 100 + u64::from(index),
            chosen,
            prompt: camera.to_string(),
            system_prompt: String::new(),
            final_prompt: camera.to_string(),
            notes: format!("take {index}"),
            score,
        }
    }

    #[test]
    fn chosen_serializes_as_slot_keyed_object() -> anyhow::Result<()> {
        let mut chosen = Chosen::new();
        chosen.insert(Category::CustomIntro, "a figure");
        chosen.insert(Category::Camera, "profile close-up");
        let value = serde_json::to_value(&chosen)?;
        assert_eq!(
            value,
            json!({"custom_intro": "a figure", "camera": "profile close-up"})
        );
        let back: Chosen = serde_json::from_value(value)?;
        assert_eq!(back, chosen);
        Ok(())
    }

    #[test]
    fn chosen_from_json_skips_unknown_entries() {
        let chosen = Chosen::from_json(&json!({"camera": "85mm", "weather": "rain", "pose": 4}));
        assert_eq!(chosen.len(), 1);
        assert_eq!(chosen.get(Category::Camera), "85mm");
        assert_eq!(chosen.get(Category::Pose), "");
    }

    #[test]
    fn mode_names_parse_and_render() {
        assert_eq!("KEEP".parse::<TakeSeedMode>(), Ok(TakeSeedMode::Keep));
        assert_eq!(PickRule::Lowlight.to_string(), "lowlight");
        assert!("loudest".parse::<PickRule>().is_err());
    }

    #[test]
    fn session_resolves_picked_take() {
        let session = Session {
            kind: SESSION_TYPE.to_string(),
            session_id: "s-1".to_string(),
            created_at: "2026-01-01T00:00:00".to_string(),
            world: "noir".to_string(),
            realm: None,
            take_count: 2,
            seed_start: 101,
            take_seed_mode: TakeSeedMode::Increment,
            picker: PickerConfig::default(),
            picked_take_index: 2,
            takes: vec![take(1, "24mm", Some(0)), take(2, "85mm", Some(10))],
        };
        let picked = session.picked().unwrap();
        assert_eq!(picked.picked_take_index, 2);
        assert_eq!(picked.picked_seed, Some(102));
        assert_eq!(picked.picked_score, Some(10));
        assert_eq!(picked.picked_final_prompt, "85mm");

        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(value["type"], json!(SESSION_TYPE));
        assert_eq!(value["take_seed_mode"], json!("increment"));
        assert_eq!(value["picker"]["rule"], json!("balanced"));
    }
}

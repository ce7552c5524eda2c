use std::fmt;
use std::str::FromStr;

use director_contracts::runs::session::Chosen;
use director_contracts::world::{Category, World};

use crate::seeds::TakeRng;

/// Custom intro keys tried, in order, by `auto` mode.
const AUTO_INTRO_KEYS: [&str; 7] = ["0", "1", "2", "3", "4", "5", "6"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomIntroMode {
    #[default]
    Auto,
    Index,
    Random,
}

impl CustomIntroMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CustomIntroMode::Auto => "auto",
            CustomIntroMode::Index => "index",
            CustomIntroMode::Random => "random",
        }
    }
}

impl fmt::Display for CustomIntroMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CustomIntroMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(CustomIntroMode::Auto),
            "index" => Ok(CustomIntroMode::Index),
            "random" => Ok(CustomIntroMode::Random),
            other => Err(format!("unknown custom_intro_mode '{other}'")),
        }
    }
}

/// Per-category determinism locks. A locked category draws from its own
/// stream derived from the seed, so its value does not depend on how many
/// draws other categories made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locks {
    pub camera: bool,
    pub lighting: bool,
    pub outfit: bool,
    pub pose: bool,
}

impl Default for Locks {
    fn default() -> Self {
        Self {
            camera: true,
            lighting: true,
            outfit: true,
            pose: false,
        }
    }
}

impl Locks {
    pub fn is_locked(&self, category: Category) -> bool {
        match category {
            Category::Camera => self.camera,
            Category::Lighting => self.lighting,
            Category::Outfit => self.outfit,
            Category::Pose => self.pose,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionConfig {
    pub seed: u64,
    pub custom_intro_mode: CustomIntroMode,
    pub custom_intro_index: Option<u32>,
    pub locks: Locks,
    /// Forced values; these win over every other rule.
    pub overrides: Chosen,
}

impl SelectionConfig {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}

/// Value for one category.
///
/// `rng_main` is only advanced by unlocked draws and by custom intro modes
/// that need randomness.
pub fn select(
    category: Category,
    world: &World,
    rng_main: &mut TakeRng,
    config: &SelectionConfig,
) -> String {
    if config.overrides.contains(category) {
        return config.overrides.get(category).to_string();
    }

    if category == Category::CustomIntro {
        return select_custom_intro(world, rng_main, config);
    }

    let candidates = world.candidates(category);
    let picked = if config.locks.is_locked(category) {
        TakeRng::derived(config.seed, category.as_str()).pick(candidates)
    } else {
        rng_main.pick(candidates)
    };
    picked
        .cloned()
        .unwrap_or_else(|| category.fallback().to_string())
}

fn select_custom_intro(world: &World, rng_main: &mut TakeRng, config: &SelectionConfig) -> String {
    let intros = &world.custom_intro;
    if intros.is_empty() {
        return Category::CustomIntro.fallback().to_string();
    }

    if config.custom_intro_mode == CustomIntroMode::Index {
        let hit = config
            .custom_intro_index
            .and_then(|idx| intros.get(idx.to_string().as_str()));
        if let Some(value) = hit {
            return value.clone();
        }
        // unknown index degrades to auto
    }

    if config.custom_intro_mode != CustomIntroMode::Random {
        if let Some(value) = AUTO_INTRO_KEYS.iter().find_map(|key| intros.get(*key)) {
            return value.clone();
        }
    }

    let values: Vec<&String> = intros.values().collect();
    rng_main
        .pick(values.as_slice())
        .map(|value| (*value).clone())
        .unwrap_or_default()
}

/// Selects every category in contract order with a fresh main stream.
pub fn select_all(world: &World, config: &SelectionConfig) -> Chosen {
    let mut rng_main = TakeRng::new(config.seed);
    Category::ALL
        .iter()
        .map(|category| {
            let value = select(*category, world, &mut rng_main, config);
            (*category, value)
        })
        .collect()
}

/// Joins the chosen values with `", "` in contract order.
///
/// Empty values are skipped, and so are fallback literals standing in for a
/// category the world does not provide.
pub fn assemble_prompt(world: &World, chosen: &Chosen) -> String {
    Category::ALL
        .iter()
        .filter_map(|category| {
            let value = chosen.get(*category).trim();
            if value.is_empty() {
                return None;
            }
            if !world.provides(*category) && value == category.fallback() {
                return None;
            }
            Some(value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

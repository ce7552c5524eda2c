use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One slot of an assembled prompt.
///
/// The declaration order is the assembly order: prompts join category values
/// in exactly this sequence, and the selector draws from the main stream in
/// this sequence too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    CustomIntro,
    Outfit,
    Lighting,
    Background,
    Objects,
    Pose,
    Expression,
    Camera,
    Atmosphere,
    Accessory,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::CustomIntro,
        Category::Outfit,
        Category::Lighting,
        Category::Background,
        Category::Objects,
        Category::Pose,
        Category::Expression,
        Category::Camera,
        Category::Atmosphere,
        Category::Accessory,
    ];

    /// Categories backed by a plain candidate list in the world file.
    pub const LISTED: [Category; 9] = [
        Category::Outfit,
        Category::Lighting,
        Category::Background,
        Category::Objects,
        Category::Pose,
        Category::Expression,
        Category::Camera,
        Category::Atmosphere,
        Category::Accessory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::CustomIntro => "custom_intro",
            Category::Outfit => "outfit",
            Category::Lighting => "lighting",
            Category::Background => "background",
            Category::Objects => "objects",
            Category::Pose => "pose",
            Category::Expression => "expression",
            Category::Camera => "camera",
            Category::Atmosphere => "atmosphere",
            Category::Accessory => "accessory",
        }
    }

    /// Top-level key of this category in a world JSON file.
    pub fn world_key(self) -> &'static str {
        match self {
            Category::CustomIntro => "CUSTOM_INTRO",
            Category::Outfit => "OUTFITS",
            Category::Lighting => "LIGHTING",
            Category::Background => "BACKGROUNDS",
            Category::Objects => "OBJECTS",
            Category::Pose => "POSES",
            Category::Expression => "EXPRESSIONS",
            Category::Camera => "CAMERA_ANGLES",
            Category::Atmosphere => "ATMOSPHERES",
            Category::Accessory => "ACCESSORIES",
        }
    }

    /// Literal used when the world has nothing to offer for this category.
    pub fn fallback(self) -> &'static str {
        match self {
            Category::CustomIntro => "",
            Category::Outfit => "simple dark outfit",
            Category::Lighting => "low ambient light",
            Category::Background => "intimate interior",
            Category::Objects => "personal items",
            Category::Pose => "relaxed pose",
            Category::Expression => "calm expression",
            Category::Camera => "eye-level framing",
            Category::Atmosphere => "quiet cinematic mood",
            Category::Accessory => "",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|category| {
                category.as_str() == normalized
                    || category.world_key().eq_ignore_ascii_case(&normalized)
            })
            .ok_or_else(|| format!("unknown category '{}'", raw.trim()))
    }
}

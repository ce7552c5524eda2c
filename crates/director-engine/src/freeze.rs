use std::fmt;
use std::str::FromStr;

use director_contracts::runs::session::Chosen;
use director_contracts::world::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreezeMode {
    #[default]
    Off,
    Freeze,
    Refresh,
}

impl FreezeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            FreezeMode::Off => "off",
            FreezeMode::Freeze => "freeze",
            FreezeMode::Refresh => "refresh",
        }
    }
}

impl fmt::Display for FreezeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FreezeMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(FreezeMode::Off),
            "freeze" => Ok(FreezeMode::Freeze),
            "refresh" => Ok(FreezeMode::Refresh),
            other => Err(format!("unknown freeze mode '{other}'")),
        }
    }
}

/// Which remembered categories a freeze pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreezeScope {
    #[default]
    All,
    CameraLighting,
    Camera,
    Nothing,
}

impl FreezeScope {
    pub fn as_str(self) -> &'static str {
        match self {
            FreezeScope::All => "all",
            FreezeScope::CameraLighting => "camera_lighting",
            FreezeScope::Camera => "camera",
            FreezeScope::Nothing => "none",
        }
    }

    pub fn covers(self, category: Category) -> bool {
        match self {
            FreezeScope::All => true,
            FreezeScope::CameraLighting => {
                matches!(category, Category::Camera | Category::Lighting)
            }
            FreezeScope::Camera => category == Category::Camera,
            FreezeScope::Nothing => false,
        }
    }
}

impl fmt::Display for FreezeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FreezeScope {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(FreezeScope::All),
            "camera_lighting" => Ok(FreezeScope::CameraLighting),
            "camera" => Ok(FreezeScope::Camera),
            "none" => Ok(FreezeScope::Nothing),
            other => Err(format!("unknown freeze scope '{other}'")),
        }
    }
}

/// Parses a change-one choice; `"none"` (or blank) means no category.
pub fn parse_change_one(raw: &str) -> Result<Option<Category>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    trimmed.parse::<Category>().map(Some)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FreezeSettings {
    pub mode: FreezeMode,
    pub scope: FreezeScope,
    pub change_one: Option<Category>,
}

impl FreezeSettings {
    pub fn change_one_label(&self) -> &'static str {
        self.change_one.map(Category::as_str).unwrap_or("none")
    }
}

/// Forced values for the next take given the remembered snapshot.
pub fn compute_overrides(last: Option<&Chosen>, settings: &FreezeSettings) -> Chosen {
    let Some(last) = last else {
        return Chosen::new();
    };
    if settings.mode != FreezeMode::Freeze {
        return Chosen::new();
    }
    last.iter()
        .filter(|(category, value)| {
            settings.scope.covers(*category)
                && !value.trim().is_empty()
                && settings.change_one != Some(*category)
        })
        .map(|(category, value)| (category, value.to_string()))
        .collect()
}

/// Caller-owned "last chosen" snapshot carried between evaluations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FreezeMemory {
    last: Option<Chosen>,
}

impl FreezeMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chosen(last: Option<Chosen>) -> Self {
        Self {
            last: last.filter(|chosen| !chosen.is_empty()),
        }
    }

    pub fn last(&self) -> Option<&Chosen> {
        self.last.as_ref()
    }

    pub fn overrides(&self, settings: &FreezeSettings) -> Chosen {
        compute_overrides(self.last(), settings)
    }

    /// Applies the memory rule after a take.
    ///
    /// Off and refresh overwrite. Freeze overwrites only when a change-one
    /// category is set, or when nothing has been remembered yet.
    pub fn remember(&mut self, settings: &FreezeSettings, chosen: &Chosen) {
        let overwrite = match settings.mode {
            FreezeMode::Off | FreezeMode::Refresh => true,
            FreezeMode::Freeze => settings.change_one.is_some() || self.last.is_none(),
        };
        if overwrite {
            self.last = Some(chosen.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use director_contracts::runs::session::Chosen;
    use director_contracts::world::Category;

    use super::{
        compute_overrides, parse_change_one, FreezeMemory, FreezeMode, FreezeScope,
        FreezeSettings,
    };

    fn remembered() -> Chosen {
        let mut chosen = Chosen::new();
        chosen.insert(Category::Outfit, "red dress");
        chosen.insert(Category::Lighting, "dim light");
        chosen.insert(Category::Camera, "close-up");
        chosen.insert(Category::Accessory, "  ");
        chosen
    }

    fn freeze(scope: FreezeScope, change_one: Option<Category>) -> FreezeSettings {
        FreezeSettings {
            mode: FreezeMode::Freeze,
            scope,
            change_one,
        }
    }

    #[test]
    fn off_and_refresh_force_nothing() {
        let last = remembered();
        for mode in [FreezeMode::Off, FreezeMode::Refresh] {
            let settings = FreezeSettings {
                mode,
                ..FreezeSettings::default()
            };
            assert!(compute_overrides(Some(&last), &settings).is_empty());
        }
    }

    #[test]
    fn freeze_scopes_select_subsets() {
        let last = remembered();
        let all = compute_overrides(Some(&last), &freeze(FreezeScope::All, None));
        assert_eq!(
            all.categories().collect::<Vec<_>>(),
            vec![Category::Outfit, Category::Lighting, Category::Camera]
        );

        let cl = compute_overrides(Some(&last), &freeze(FreezeScope::CameraLighting, None));
        assert_eq!(
            cl.categories().collect::<Vec<_>>(),
            vec![Category::Lighting, Category::Camera]
        );

        let cam = compute_overrides(Some(&last), &freeze(FreezeScope::Camera, None));
        assert_eq!(cam.get(Category::Camera), "close-up");
        assert_eq!(cam.len(), 1);

        assert!(compute_overrides(Some(&last), &freeze(FreezeScope::Nothing, None)).is_empty());
        assert!(compute_overrides(None, &freeze(FreezeScope::All, None)).is_empty());
    }

    #[test]
    fn change_one_is_left_free() {
        let last = remembered();
        let forced = compute_overrides(
            Some(&last),
            &freeze(FreezeScope::All, Some(Category::Camera)),
        );
        assert!(!forced.contains(Category::Camera));
        assert_eq!(forced.get(Category::Outfit), "red dress");
    }

    #[test]
    fn memory_rule_follows_mode() {
        let first = remembered();
        let mut next = remembered();
        next.insert(Category::Camera, "wide");

        let mut memory = FreezeMemory::from_chosen(Some(first.clone()));
        memory.remember(&freeze(FreezeScope::All, None), &next);
        assert_eq!(memory.last(), Some(&first));

        memory.remember(&freeze(FreezeScope::All, Some(Category::Camera)), &next);
        assert_eq!(memory.last(), Some(&next));

        memory.remember(&FreezeSettings::default(), &first);
        assert_eq!(memory.last(), Some(&first));

        let mut empty = FreezeMemory::new();
        empty.remember(&freeze(FreezeScope::All, None), &next);
        assert_eq!(empty.last(), Some(&next));
    }

    #[test]
    fn change_one_parses_none() {
        assert_eq!(parse_change_one("none"), Ok(None));
        assert_eq!(parse_change_one(""), Ok(None));
        assert_eq!(parse_change_one("camera"), Ok(Some(Category::Camera)));
        assert!(parse_change_one("weather").is_err());
        assert_eq!("camera_lighting".parse(), Ok(FreezeScope::CameraLighting));
    }
}

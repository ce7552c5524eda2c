use director_contracts::runs::session::{Chosen, PickRule, PickerConfig};
use director_contracts::world::Category;

const CLOSEUP_TERMS: [&str; 5] = ["close", "85mm", "105mm", "portrait", "tight"];
const LOWLIGHT_TERMS: [&str; 6] = ["low", "dim", "candle", "noir", "shadow", "dark"];
const BRIGHT_TERMS: [&str; 3] = ["bright", "daylight", "high key"];
const FRONTAL_TERMS: [&str; 2] = ["frontal", "centered frontal"];

fn contains_any(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| haystack.contains(term))
}

/// Heuristic score of one take under `rule`.
pub fn score(rule: PickRule, keyword: &str, chosen: &Chosen, final_prompt: &str) -> i64 {
    let camera = chosen.get(Category::Camera).to_lowercase();
    let lighting = chosen.get(Category::Lighting).to_lowercase();

    match rule {
        PickRule::Closeup => {
            let mut total = 0;
            if contains_any(&camera, &CLOSEUP_TERMS) {
                total += 10;
            }
            if camera.contains("24mm") {
                total -= 2;
            }
            total
        }
        PickRule::Lowlight => {
            let mut total = 0;
            if contains_any(&lighting, &LOWLIGHT_TERMS) {
                total += 10;
            }
            if contains_any(&lighting, &BRIGHT_TERMS) {
                total -= 3;
            }
            total
        }
        PickRule::Profile => {
            let mut total = 0;
            if camera.contains("profile") {
                total += 10;
            }
            if contains_any(&camera, &FRONTAL_TERMS) {
                total -= 1;
            }
            total
        }
        PickRule::Keyword => {
            let needle = keyword.trim().to_lowercase();
            if needle.is_empty() {
                return 0;
            }
            let hits = final_prompt.to_lowercase().matches(needle.as_str()).count();
            10 * i64::try_from(hits).unwrap_or(i64::MAX / 10)
        }
        PickRule::Balanced => {
            let mut total = 0;
            if contains_any(&camera, &CLOSEUP_TERMS) {
                total += 5;
            }
            if contains_any(&lighting, &LOWLIGHT_TERMS) {
                total += 5;
            }
            total
        }
    }
}

/// Score recorded on a take; `None` when the picker is disabled.
pub fn score_take(picker: &PickerConfig, chosen: &Chosen, final_prompt: &str) -> Option<i64> {
    picker
        .enabled
        .then(|| score(picker.rule, &picker.keyword, chosen, final_prompt))
}

/// 0-based position of the best score; ties keep the earliest entry and
/// unscored entries never win over the first one.
pub fn best_index(scores: &[Option<i64>]) -> usize {
    let mut best_idx = 0;
    let mut best: Option<i64> = None;
    for (idx, value) in scores.iter().enumerate() {
        let Some(value) = *value else {
            continue;
        };
        if best.map_or(true, |current| value > current) {
            best = Some(value);
            best_idx = idx;
        }
    }
    best_idx
}

#[cfg(test)]
mod tests {
    use director_contracts::runs::session::{Chosen, PickRule, PickerConfig};
    use director_contracts::world::Category;

    use super::{best_index, score, score_take};

    fn shot(camera: &str, lighting: &str) -> Chosen {
        let mut chosen = Chosen::new();
        chosen.insert(Category::Camera, camera);
        chosen.insert(Category::Lighting, lighting);
        chosen
    }

    #[test]
    fn closeup_prefers_long_lenses() {
        let tele = score(PickRule::Closeup, "", &shot("portrait 85mm", ""), "");
        let wide = score(PickRule::Closeup, "", &shot("wide 24mm", ""), "");
        assert_eq!(tele, 10);
        assert_eq!(wide, -2);
        assert!(tele >= wide + 10);
    }

    #[test]
    fn lowlight_and_profile_rules() {
        assert_eq!(score(PickRule::Lowlight, "", &shot("", "Candle glow"), ""), 10);
        assert_eq!(score(PickRule::Lowlight, "", &shot("", "bright daylight"), ""), -3);
        assert_eq!(score(PickRule::Lowlight, "", &shot("", "dim but bright"), ""), 7);
        assert_eq!(score(PickRule::Profile, "", &shot("Profile view", ""), ""), 10);
        assert_eq!(score(PickRule::Profile, "", &shot("centered frontal", ""), ""), -1);
    }

    #[test]
    fn keyword_counts_occurrences() {
        let chosen = Chosen::new();
        assert_eq!(score(PickRule::Keyword, "Veil", &chosen, "veil, lace veil, VEIL"), 30);
        assert_eq!(score(PickRule::Keyword, "  ", &chosen, "veil"), 0);
    }

    #[test]
    fn balanced_adds_both_halves() {
        assert_eq!(score(PickRule::Balanced, "", &shot("close-up", "dim light"), ""), 10);
        assert_eq!(score(PickRule::Balanced, "", &shot("wide", "dim light"), ""), 5);
    }

    #[test]
    fn disabled_picker_records_no_score() {
        let picker = PickerConfig {
            enabled: false,
            ..PickerConfig::default()
        };
        assert_eq!(score_take(&picker, &shot("close", "dim"), ""), None);
        assert_eq!(score_take(&PickerConfig::default(), &shot("close", "dim"), ""), Some(10));
    }

    #[test]
    fn best_index_keeps_earliest_tie() {
        assert_eq!(best_index(&[Some(5), Some(10), Some(10)]), 1);
        assert_eq!(best_index(&[None, None]), 0);
        assert_eq!(best_index(&[None, Some(-1)]), 1);
        assert_eq!(best_index(&[]), 0);
    }
}

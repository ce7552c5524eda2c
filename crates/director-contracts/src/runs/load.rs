use serde_json::{Map, Value};

use super::documents::{read_session_document, take_score, value_text};
use super::session_files::render_json;

/// Host-facing outputs of reopening a stored session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLoadReport {
    pub shot_list_json: String,
    pub picked_final_prompt: String,
    pub picked_notes: String,
    pub picked_take_index: i64,
    pub take_count: u32,
}

/// Reopen a session document and pull one take out of it.
///
/// `take_index > 0` asks for that take explicitly. Otherwise the stored
/// `picked_take_index` wins, then the best stored score, then the last take.
/// The result is clamped to the takes actually present.
pub fn load_session(path: &str, take_index: i64) -> SessionLoadReport {
    let document = match read_session_document(path) {
        Ok((_, document)) => document,
        Err(message) => return failed(message),
    };
    let shot_list_json = render_json(&document, true).unwrap_or_else(|_| document.to_string());

    let takes: Vec<Map<String, Value>> = document
        .get("takes")
        .and_then(Value::as_array)
        .map(|rows| rows.iter().filter_map(Value::as_object).cloned().collect())
        .unwrap_or_default();
    if takes.is_empty() {
        return SessionLoadReport {
            shot_list_json,
            picked_final_prompt: String::new(),
            picked_notes: "(no takes in json)".to_string(),
            picked_take_index: -1,
            take_count: 0,
        };
    }
    let take_count = takes.len() as i64;

    let requested = if take_index > 0 {
        take_index
    } else {
        let stored = document
            .get("picked_take_index")
            .and_then(Value::as_i64)
            .unwrap_or(-1);
        if stored > 0 {
            stored
        } else {
            best_scored_index(&takes).unwrap_or(take_count)
        }
    };
    let idx = requested.clamp(1, take_count);
    let take = &takes[(idx - 1) as usize];

    let notes = [value_text(take.get("notes")), value_text(take.get("director_notes"))]
        .into_iter()
        .find(|text| !text.is_empty())
        .unwrap_or_default();

    SessionLoadReport {
        shot_list_json,
        picked_final_prompt: value_text(take.get("final_prompt")),
        picked_notes: notes,
        picked_take_index: own_index(take).unwrap_or(idx),
        take_count: takes.len() as u32,
    }
}

fn best_scored_index(takes: &[Map<String, Value>]) -> Option<i64> {
    let mut best: Option<(i64, i64)> = None;
    for take in takes {
        let Some(score) = take_score(take) else {
            continue;
        };
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((own_index(take).unwrap_or(0), score));
        }
    }
    best.map(|(idx, _)| idx).filter(|idx| *idx > 0)
}

fn own_index(take: &Map<String, Value>) -> Option<i64> {
    take.get("take_index")
        .or_else(|| take.get("take"))
        .and_then(Value::as_i64)
        .filter(|idx| *idx > 0)
}

fn failed(message: String) -> SessionLoadReport {
    SessionLoadReport {
        shot_list_json: message.clone(),
        picked_final_prompt: String::new(),
        picked_notes: message,
        picked_take_index: -1,
        take_count: 0,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::{json, Value};

    use super::load_session;

    fn write(dir: &Path, name: &str, body: &Value) -> anyhow::Result<String> {
        let path = dir.join(name);
        std::fs::write(&path, body.to_string())?;
        Ok(path.to_string_lossy().to_string())
    }

    fn takes(scores: &[Option<i64>]) -> Value {
        Value::Array(
            scores
                .iter()
                .enumerate()
                .map(|(idx, score)| {
                    json!({
                        "take_index": idx + 1,
                        "final_prompt": format!("prompt {}", idx + 1),
                        "notes": format!("notes {}", idx + 1),
                        "score": score,
                    })
                })
                .collect(),
        )
    }

    #[test]
    fn explicit_take_index_wins_and_is_clamped() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = write(
            temp.path(),
            "s_shots.json",
            &json!({"picked_take_index": 1, "takes": takes(&[Some(1), Some(5), Some(2)])}),
        )?;
        let report = load_session(&path, 3);
        assert_eq!(report.picked_take_index, 3);
        assert_eq!(report.picked_final_prompt, "prompt 3");
        assert_eq!(report.take_count, 3);

        let report = load_session(&path, 99);
        assert_eq!(report.picked_take_index, 3);
        Ok(())
    }

    #[test]
    fn falls_back_from_stored_pick_to_score_to_last() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let stored = write(
            temp.path(),
            "stored.json",
            &json!({"picked_take_index": 1, "takes": takes(&[Some(1), Some(5)])}),
        )?;
        assert_eq!(load_session(&stored, -1).picked_final_prompt, "prompt 1");

        let scored = write(
            temp.path(),
            "scored.json",
            &json!({"takes": takes(&[Some(1), Some(5), Some(5)])}),
        )?;
        let report = load_session(&scored, -1);
        assert_eq!(report.picked_take_index, 2);
        assert_eq!(report.picked_notes, "notes 2");

        let unscored = write(temp.path(), "unscored.json", &json!({"takes": takes(&[None, None])}))?;
        assert_eq!(load_session(&unscored, 0).picked_take_index, 2);
        Ok(())
    }

    #[test]
    fn sentinels_for_missing_invalid_and_empty() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let missing = temp.path().join("nope.json");
        let report = load_session(&missing.to_string_lossy(), -1);
        assert!(report.shot_list_json.starts_with("(file not found)"));
        assert_eq!(report.picked_take_index, -1);
        assert_eq!(report.take_count, 0);

        let broken = temp.path().join("broken.json");
        std::fs::write(&broken, "not json")?;
        let report = load_session(&broken.to_string_lossy(), -1);
        assert!(report.picked_notes.starts_with("(invalid json)"));

        let empty = write(temp.path(), "empty.json", &json!({"takes": []}))?;
        let report = load_session(&empty, -1);
        assert_eq!(report.picked_notes, "(no takes in json)");
        assert!(report.shot_list_json.contains("\"takes\""));
        Ok(())
    }
}

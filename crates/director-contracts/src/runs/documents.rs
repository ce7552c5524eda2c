use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

/// Read a stored session document. Failures come back as the sentinel text
/// the host shows in place of output.
pub fn read_session_document(path: &str) -> Result<(PathBuf, Value), String> {
    let path = absolute_path(Path::new(path.trim()));
    if !path.is_file() {
        return Err(format!("(file not found) {}", path.display()));
    }
    let raw = std::fs::read_to_string(&path)
        .map_err(|err| format!("(invalid json) {} :: {err}", path.display()))?;
    let value = serde_json::from_str(&raw)
        .map_err(|err| format!("(invalid json) {} :: {err}", path.display()))?;
    Ok((path, value))
}

/// Integer score of a stored take, if it has a usable one.
pub fn take_score(take: &Map<String, Value>) -> Option<i64> {
    match take.get("score")? {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|value| value.trunc() as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// 1-based position of the highest score; earliest wins ties. Defaults to
/// take 1 with no score when nothing is scored.
pub fn best_take_by_score(takes: &[Map<String, Value>]) -> (u32, Option<i64>) {
    let mut best_idx = 1;
    let mut best_score: Option<i64> = None;
    for (idx, take) in takes.iter().enumerate() {
        let Some(score) = take_score(take) else {
            continue;
        };
        if best_score.map_or(true, |best| score > best) {
            best_score = Some(score);
            best_idx = idx as u32 + 1;
        }
    }
    (best_idx, best_score)
}

pub(crate) fn absolute_path(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

pub(crate) fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map, Value};

    use super::{best_take_by_score, read_session_document, take_score};

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn best_take_prefers_earliest_maximum() {
        let takes = vec![
            obj(json!({"score": 5})),
            obj(json!({"score": null})),
            obj(json!({"score": 9})),
            obj(json!({"score": 9})),
        ];
        assert_eq!(best_take_by_score(&takes), (3, Some(9)));
    }

    #[test]
    fn best_take_defaults_to_first_without_scores() {
        let takes = vec![obj(json!({})), obj(json!({"score": "n/a"}))];
        assert_eq!(best_take_by_score(&takes), (1, None));
    }

    #[test]
    fn scores_accept_numbers_and_numeric_text() {
        assert_eq!(take_score(&obj(json!({"score": 7.9}))), Some(7));
        assert_eq!(take_score(&obj(json!({"score": " 12 "}))), Some(12));
        assert_eq!(take_score(&obj(json!({"score": true}))), None);
    }

    #[test]
    fn read_session_document_returns_sentinels() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let missing = temp.path().join("missing.json");
        let err = read_session_document(&missing.to_string_lossy()).unwrap_err();
        assert!(err.starts_with("(file not found) "));

        let broken = temp.path().join("broken.json");
        std::fs::write(&broken, "{oops")?;
        let err = read_session_document(&broken.to_string_lossy()).unwrap_err();
        assert!(err.starts_with("(invalid json) "));
        assert!(err.contains(" :: "));
        Ok(())
    }
}

use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use regex::Regex;

static TEMPLATE_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{.*?\}\}").expect("valid regex"));

const STOPWORDS: &str = "a an the and or but if then else with without of in on at to for from by as \
is are was were be been being this that these those into over under near between among lora her \
face lora his faces woman girl man model character person wearing looking shown standing sitting \
posed figure body skin eyes lips hair their yet";

const PROMPT_BOILERPLATE: &str = "masterpiece best quality amazing 4k ultra detailed absurdres \
newest scenery depth field volumetric lighting high resolution aesthetic cinematic detailed ultra \
highres sharp focus";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOptions {
    pub top_k: usize,
    pub min_len: usize,
    /// Comma-separated words that get a ranking bonus.
    pub keep_csv: String,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            top_k: 30,
            min_len: 4,
            keep_csv: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tags {
    pub words: Vec<String>,
}

impl Tags {
    pub fn csv(&self) -> String {
        self.words.join(", ")
    }

    pub fn spaced(&self) -> String {
        self.words.join(" ")
    }
}

/// Rank the content words of a final prompt for gallery tagging.
pub fn extract_tags(prompt: &str, options: &TagOptions) -> Tags {
    let keep: BTreeSet<String> = options
        .keep_csv
        .split(',')
        .map(|word| word.trim().to_lowercase())
        .filter(|word| !word.is_empty())
        .collect();
    let stopwords: BTreeSet<&str> = STOPWORDS.split_whitespace().collect();
    let boilerplate: BTreeSet<&str> = PROMPT_BOILERPLATE.split_whitespace().collect();

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for word in clean_prompt(prompt).split_whitespace() {
        if word.chars().count() < options.min_len
            || stopwords.contains(word)
            || boilerplate.contains(word)
        {
            continue;
        }
        *counts.entry(word.to_string()).or_default() += 1;
    }

    let mut scored: Vec<(usize, String)> = counts
        .into_iter()
        .map(|(word, count)| {
            let bonus = if keep.contains(&word) { 3 } else { 0 };
            (count + bonus, word)
        })
        .collect();
    scored.sort_by(|a, b| b.cmp(a));

    Tags {
        words: scored
            .into_iter()
            .take(options.top_k)
            .map(|(_, word)| word)
            .collect(),
    }
}

fn clean_prompt(text: &str) -> String {
    let without_tokens = TEMPLATE_TOKEN_RE.replace_all(text, " ");
    let spaced: String = without_tokens
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{extract_tags, TagOptions};

    #[test]
    fn ranks_by_count_then_word() {
        let tags = extract_tags(
            "Masterpiece, a woman wearing a crimson latex dress, crimson candles, \
             {{LORA_TOKEN}} dimly-lit chapel, chapel",
            &TagOptions::default(),
        );
        assert_eq!(
            tags.words,
            vec!["crimson", "chapel", "latex", "dress", "dimly", "candles"]
        );
        assert_eq!(tags.csv(), "crimson, chapel, latex, dress, dimly, candles");
        assert!(tags.spaced().starts_with("crimson chapel"));
    }

    #[test]
    fn keep_list_boosts_and_limits_apply() {
        let tags = extract_tags(
            "veil veil ritual nun",
            &TagOptions {
                top_k: 2,
                min_len: 3,
                keep_csv: " Nun , ".to_string(),
            },
        );
        assert_eq!(tags.words, vec!["nun", "veil"]);
    }
}

// In crates/screening/src/cache.rs

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Key holding the symbol name inside an answer file.
const SYMBOL_KEY: &str = "symbol";

/// The value of one answer.
///
/// `Unknown` records that the answer could not be determined (for example a
/// network failure). It is stored as `null` and never counted in a score.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Bool(bool),
    Text(String),
    #[default]
    Unknown,
}

impl AnswerValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnswerValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnswerValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerValue::Bool(b) => write!(f, "{}", b),
            AnswerValue::Text(s) => f.write_str(s),
            AnswerValue::Unknown => f.write_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    #[serde(default)]
    pub value: AnswerValue,
    /// Unix seconds after which the answer must be recomputed.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub expiration_timestamp: i64,
    /// Copy of the question text, for display.
    #[serde(default)]
    pub question: String,
}

impl Answer {
    pub fn is_fresh(&self, now: i64) -> bool {
        now < self.expiration_timestamp
    }
}

/// Accepts integer or float seconds; `null` reads as 0.
fn lenient_timestamp<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = Option::<f64>::deserialize(deserializer)?;
    Ok(seconds.map_or(0, |s| s as i64))
}

/// Every answer recorded for one symbol, keyed by question uuid.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SymbolAnswers {
    pub symbol: String,
    answers: BTreeMap<String, Answer>,
}

impl SymbolAnswers {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            answers: BTreeMap::new(),
        }
    }

    pub fn get(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    /// The answer for a question if it has not expired at `now`.
    pub fn fresh(&self, question_id: &str, now: i64) -> Option<&Answer> {
        self.get(question_id).filter(|a| a.is_fresh(now))
    }

    /// Records an answer in memory. Call `AnswerCache::save` to persist.
    pub fn put_answer(
        &mut self,
        question_id: &str,
        value: AnswerValue,
        expiration_timestamp: i64,
        question: &str,
    ) {
        self.answers.insert(
            question_id.to_string(),
            Answer {
                value,
                expiration_timestamp,
                question: question.to_string(),
            },
        );
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Answer)> {
        self.answers.iter().map(|(id, a)| (id.as_str(), a))
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    fn to_json(&self) -> Result<Value> {
        let mut object = Map::new();
        object.insert(SYMBOL_KEY.to_string(), Value::String(self.symbol.clone()));
        for (id, answer) in &self.answers {
            object.insert(id.clone(), serde_json::to_value(answer)?);
        }
        Ok(Value::Object(object))
    }

    /// Builds the answer set from a parsed file. Entries that do not look
    /// like answers are dropped.
    fn from_json(symbol: &str, value: Value) -> Self {
        let mut answers = SymbolAnswers::new(symbol);
        let Value::Object(object) = value else {
            tracing::debug!(symbol, "Answer file is not a JSON object, ignoring it.");
            return answers;
        };

        for (key, entry) in object {
            if key == SYMBOL_KEY {
                if let Value::String(name) = entry {
                    answers.symbol = name;
                }
                continue;
            }
            match serde_json::from_value::<Answer>(entry) {
                Ok(answer) => {
                    answers.answers.insert(key, answer);
                }
                Err(e) => tracing::debug!(
                    symbol,
                    question = %key,
                    error = %e,
                    "Skipping malformed cached answer."
                ),
            }
        }
        answers
    }
}

/// File-backed store with one JSON document per symbol.
#[derive(Debug, Clone)]
pub struct AnswerCache {
    dir: PathBuf,
}

impl AnswerCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `{cache_dir}/{SYMBOL}.json`, with the symbol upper-cased.
    pub fn answer_file(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.json", symbol.to_uppercase()))
    }

    /// Reads every cached answer for a symbol.
    ///
    /// A missing, unreadable or malformed file yields an empty set; cache
    /// problems are never errors.
    pub fn get_all_answers(&self, symbol: &str) -> SymbolAnswers {
        let path = self.answer_file(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(symbol, path = %path.display(), error = %e, "No cached answers.");
                return SymbolAnswers::new(symbol);
            }
        };
        match serde_json::from_str::<Value>(&content) {
            Ok(value) => SymbolAnswers::from_json(symbol, value),
            Err(e) => {
                tracing::debug!(
                    symbol,
                    path = %path.display(),
                    error = %e,
                    "Cached answers are corrupt, ignoring them."
                );
                SymbolAnswers::new(symbol)
            }
        }
    }

    /// Rewrites the symbol's answer file in full.
    ///
    /// The document is written to a temporary file in the cache directory and
    /// renamed over the old one, so readers see either the old or the new file.
    pub fn save(&self, answers: &SymbolAnswers) -> Result<()> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| Error::Io { path, source }
        };

        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;
        let path = self.answer_file(&answers.symbol);
        let document = serde_json::to_string_pretty(&answers.to_json()?)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(io_err(&self.dir))?;
        tmp.write_all(document.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(io_err(tmp.path()))?;
        tmp.persist(&path).map_err(|e| Error::Io {
            path: path.clone(),
            source: e.error,
        })?;

        tracing::debug!(symbol = %answers.symbol, path = %path.display(), "Cached answers.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_bool_text_and_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnswerCache::new(dir.path().join("answers"));

        let mut answers = SymbolAnswers::new("xyz");
        answers.put_answer("q-bool", AnswerValue::Bool(false), 1_700_000_000, "Price ok?");
        answers.put_answer("q-text", AnswerValue::Text("Energy".into()), 1_700_000_100, "Sector?");
        answers.put_answer("q-none", AnswerValue::Unknown, 0, "Open interest?");
        cache.save(&answers).unwrap();

        assert!(dir.path().join("answers").join("XYZ.json").exists());
        let loaded = cache.get_all_answers("xyz");
        assert_eq!(loaded, answers);
    }

    #[test]
    fn file_layout_has_symbol_key_and_null_for_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnswerCache::new(dir.path());

        let mut answers = SymbolAnswers::new("ABC");
        answers.put_answer("q1", AnswerValue::Unknown, 5, "Q");
        cache.save(&answers).unwrap();

        let raw: Value =
            serde_json::from_str(&fs::read_to_string(cache.answer_file("ABC")).unwrap()).unwrap();
        assert_eq!(raw["symbol"], "ABC");
        assert_eq!(raw["q1"]["value"], Value::Null);
        assert_eq!(raw["q1"]["expiration_timestamp"], 5);
        assert_eq!(raw["q1"]["question"], "Q");
    }

    #[test]
    fn missing_or_corrupt_files_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnswerCache::new(dir.path());
        assert!(cache.get_all_answers("NONE").is_empty());

        fs::write(cache.answer_file("BAD"), "{ not json").unwrap();
        assert!(cache.get_all_answers("BAD").is_empty());

        fs::write(cache.answer_file("LIST"), "[1, 2, 3]").unwrap();
        assert!(cache.get_all_answers("LIST").is_empty());
    }

    #[test]
    fn reads_float_timestamps_and_skips_junk_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = AnswerCache::new(dir.path());
        fs::write(
            cache.answer_file("OLD"),
            r#"{
                "symbol": "OLD",
                "a": {"value": true, "expiration_timestamp": 2145848400.0, "question": "A"},
                "b": {"value": null, "expiration_timestamp": 0, "question": "B"},
                "c": 42
            }"#,
        )
        .unwrap();

        let answers = cache.get_all_answers("OLD");
        assert_eq!(answers.len(), 2);
        assert_eq!(answers.get("a").unwrap().expiration_timestamp, 2_145_848_400);
        assert_eq!(answers.get("b").unwrap().value, AnswerValue::Unknown);
    }

    #[test]
    fn freshness_is_strictly_before_expiration() {
        let mut answers = SymbolAnswers::new("XYZ");
        answers.put_answer("q", AnswerValue::Bool(true), 100, "Q");

        assert!(answers.fresh("q", 99).is_some());
        assert!(answers.fresh("q", 100).is_none());
        assert!(answers.fresh("missing", 0).is_none());
    }
}

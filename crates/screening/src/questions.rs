// In crates/screening/src/questions.rs

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::{Error, Result};

pub const DEFAULT_PRICE_MIN: f64 = 15.0;
pub const DEFAULT_PRICE_MAX: f64 = 375.0;
pub const DEFAULT_VOLUME_MIN: u64 = 400_000;
pub const DEFAULT_OPEN_INTEREST_MIN: u64 = 50;

/// A configured screening question.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Question {
    pub uuid: String,
    #[serde(rename = "question")]
    pub text: String,
    /// A false answer fails the symbol outright.
    #[serde(default)]
    pub blocker: bool,
    /// Lifetime of a fresh answer. 0 means it expires immediately.
    #[serde(default, deserialize_with = "whole_days")]
    pub expiration_days: i64,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// The evaluation strategy of a question, selected by its `type` key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    Boolean,
    PriceFilter {
        #[serde(default = "default_price_min")]
        price_min: f64,
        #[serde(default = "default_price_max")]
        price_max: f64,
    },
    VolumeFilter {
        #[serde(default = "default_volume_min", deserialize_with = "minimum_count")]
        volume_min: u64,
    },
    OpenInterestFilter {
        #[serde(
            default = "default_open_interest_min",
            deserialize_with = "minimum_count"
        )]
        open_interest_min: u64,
    },
    EarningsDate,
    SectorSelection {
        #[serde(default)]
        sector_file: Option<String>,
    },
    #[serde(other)]
    Unsupported,
}

fn default_price_min() -> f64 {
    DEFAULT_PRICE_MIN
}

fn default_price_max() -> f64 {
    DEFAULT_PRICE_MAX
}

fn default_volume_min() -> u64 {
    DEFAULT_VOLUME_MIN
}

fn default_open_interest_min() -> u64 {
    DEFAULT_OPEN_INTEREST_MIN
}

/// Accepts `7` or `7.0`. Fractional days are truncated.
fn whole_days<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(days) = number.as_i64() {
        return Ok(days);
    }
    match number.as_f64() {
        Some(days) if days.is_finite() => Ok(days as i64),
        _ => Err(D::Error::custom(format!("invalid day count {}", number))),
    }
}

/// Accepts integer or float thresholds. A fractional minimum rounds up, since
/// volumes and open interest are whole numbers.
fn minimum_count<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let number = serde_json::Number::deserialize(deserializer)?;
    if let Some(count) = number.as_u64() {
        return Ok(count);
    }
    match number.as_f64() {
        Some(count) if count.is_finite() => Ok(count.max(0.0).ceil() as u64),
        _ => Err(D::Error::custom(format!("invalid threshold {}", number))),
    }
}

/// One question file.
#[derive(Debug, Clone, Deserialize)]
pub struct Section {
    pub name: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// All loaded sections, iterated in section-name order.
#[derive(Debug, Clone, Default)]
pub struct QuestionRegistry {
    sections: BTreeMap<String, Vec<Question>>,
}

impl QuestionRegistry {
    pub fn from_sections(sections: impl IntoIterator<Item = Section>) -> Self {
        let mut registry = QuestionRegistry::default();
        for section in sections {
            registry.insert(section);
        }
        registry
    }

    fn insert(&mut self, section: Section) {
        if self.sections.contains_key(&section.name) {
            tracing::warn!(section = %section.name, "Duplicate section name, the later file wins.");
        }
        self.sections.insert(section.name, section.questions);
    }

    pub fn sections(&self) -> impl Iterator<Item = (&str, &[Question])> {
        self.sections.iter().map(|(n, q)| (n.as_str(), q.as_slice()))
    }

    /// Every question with its section name, sections sorted, questions in file order.
    pub fn questions(&self) -> impl Iterator<Item = (&str, &Question)> {
        self.sections()
            .flat_map(|(name, questions)| questions.iter().map(move |q| (name, q)))
    }

    pub fn get(&self, uuid: &str) -> Option<&Question> {
        self.questions().map(|(_, q)| q).find(|q| q.uuid == uuid)
    }

    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Loads every `*.json` file in `dir` as a question section.
///
/// Files that cannot be read or parsed are logged and skipped; only an
/// unreadable directory is an error.
pub fn load_questions(dir: &Path) -> Result<QuestionRegistry> {
    let entries = fs::read_dir(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<_> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut registry = QuestionRegistry::default();
    for file in files {
        let parsed = fs::read_to_string(&file)
            .map_err(|e| e.to_string())
            .and_then(|content| {
                serde_json::from_str::<Section>(&content).map_err(|e| e.to_string())
            });
        match parsed {
            Ok(section) => {
                tracing::debug!(
                    file = %file.display(),
                    section = %section.name,
                    count = section.questions.len(),
                    "Loaded questions."
                );
                registry.insert(section);
            }
            Err(e) => tracing::warn!(
                file = %file.display(),
                error = %e,
                "Could not read question file, skipping it."
            ),
        }
    }

    Ok(registry)
}

// In crates/screening/src/lib.rs

//! The symbol screening engine.
//!
//! Questions are loaded from section files, asked of each symbol (from the
//! cache when a fresh answer exists, otherwise by prompting or by querying
//! market data) and the answers are persisted per symbol. Blocker questions
//! fail a symbol outright; the remaining boolean answers make up its score.

pub mod cache;
pub mod calendar;
pub mod clock;
pub mod error;
pub mod evaluator;
pub mod prompt;
pub mod questions;
pub mod quotes;
pub mod report;
pub mod screener;
pub mod sectors;
pub mod symbols;

// Re-export public types
pub use cache::{Answer, AnswerCache, AnswerValue, SymbolAnswers};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{Error, Result};
pub use evaluator::Evaluation;
pub use prompt::{AnswerSource, ConsolePrompt, ScriptedAnswers};
pub use questions::{Question, QuestionKind, QuestionRegistry, Section, load_questions};
pub use report::{ScoreReport, ScoreRow};
pub use screener::{ScreenResult, Screener};
pub use symbols::load_symbols;

// In crates/screening/src/screener.rs

use api_client::MarketData;
use core_types::Quote;
use std::path::PathBuf;

use crate::cache::{AnswerCache, AnswerValue, SymbolAnswers};
use crate::clock::Clock;
use crate::evaluator::{self, EvalContext, Subject};
use crate::prompt::AnswerSource;
use crate::questions::{Question, QuestionRegistry};
use crate::quotes::QuoteCache;
use crate::Result;

/// The outcome of screening one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenResult {
    pub symbol: String,
    pub passed: bool,
    /// Percentage of boolean answers that were true. 0.0 for a failed symbol.
    pub score: f64,
    /// The uuid of the blocker that failed the symbol, if any.
    pub failed_blocker: Option<String>,
}

impl ScreenResult {
    fn passed(symbol: &str, score: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            passed: true,
            score,
            failed_blocker: None,
        }
    }

    fn failed(symbol: &str, blocker: &Question) -> Self {
        Self {
            symbol: symbol.to_string(),
            passed: false,
            score: 0.0,
            failed_blocker: Some(blocker.uuid.clone()),
        }
    }
}

/// `100 * true / total`, or 0.0 when nothing was counted.
pub fn score(true_count: u32, total_count: u32) -> f64 {
    if total_count == 0 {
        return 0.0;
    }
    100.0 * f64::from(true_count) / f64::from(total_count)
}

/// Runs the question registry against symbols.
///
/// One `Screener` serves one run: it owns the run's quote cache and borrows
/// everything else.
pub struct Screener<'a> {
    registry: &'a QuestionRegistry,
    cache: &'a AnswerCache,
    market: &'a dyn MarketData,
    input: &'a mut dyn AnswerSource,
    clock: &'a dyn Clock,
    sector_file: PathBuf,
    quotes: QuoteCache,
}

impl<'a> Screener<'a> {
    pub fn new(
        registry: &'a QuestionRegistry,
        cache: &'a AnswerCache,
        market: &'a dyn MarketData,
        input: &'a mut dyn AnswerSource,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            registry,
            cache,
            market,
            input,
            clock,
            sector_file: app_config::expand_path(app_config::types::DEFAULT_SECTOR_FILE),
            quotes: QuoteCache::new(),
        }
    }

    /// Sets the shared sector list used by sector questions without their own file.
    pub fn with_sector_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sector_file = path.into();
        self
    }

    /// Finds a blocker whose cached answer is a fresh `false`.
    ///
    /// Only cached answers are consulted; nothing is evaluated.
    pub fn fresh_blocker_screen(&self, cached: &SymbolAnswers, now: i64) -> Option<&'a Question> {
        self.registry
            .questions()
            .map(|(_, q)| q)
            .filter(|q| q.blocker)
            .find(|q| {
                cached
                    .fresh(&q.uuid, now)
                    .is_some_and(|a| a.value == AnswerValue::Bool(false))
            })
    }

    /// Screens one symbol: the fresh-blocker pre-check, then every question
    /// in order.
    ///
    /// A blocker that answers `false` (or cannot be determined) fails the
    /// symbol at once; the answers gathered so far are saved. Otherwise all
    /// answers are saved and the score is computed over boolean answers.
    pub async fn screen_symbol(&mut self, symbol: &str) -> Result<ScreenResult> {
        let registry = self.registry;
        let cache = self.cache;
        let cached = cache.get_all_answers(symbol);

        if let Some(blocker) = self.fresh_blocker_screen(&cached, self.clock.timestamp()) {
            tracing::debug!(
                symbol,
                question = %blocker.uuid,
                "'{}' is a blocker and is false, failing screen.",
                blocker.text
            );
            return Ok(ScreenResult::failed(symbol, blocker));
        }

        let mut answers = SymbolAnswers::new(symbol);
        let mut true_count = 0u32;
        let mut total_count = 0u32;
        let mut ctx = EvalContext {
            market: self.market,
            input: &mut *self.input,
            clock: self.clock,
            quotes: &mut self.quotes,
            sector_file: &self.sector_file,
        };

        for (section, question) in registry.questions() {
            let subject = Subject { symbol, section };
            let evaluation = evaluator::evaluate(&mut ctx, subject, question, &cached).await?;
            answers.put_answer(
                &question.uuid,
                evaluation.value.clone(),
                evaluation.expiration_timestamp,
                &question.text,
            );

            match evaluation.value {
                AnswerValue::Bool(true) => {
                    true_count += 1;
                    total_count += 1;
                }
                AnswerValue::Bool(false) => {
                    total_count += 1;
                    if question.blocker {
                        tracing::debug!(
                            symbol,
                            question = %question.uuid,
                            "Blocker question failed, skipping symbol."
                        );
                        cache.save(&answers)?;
                        return Ok(ScreenResult::failed(symbol, question));
                    }
                }
                AnswerValue::Unknown if question.blocker => {
                    tracing::warn!(
                        symbol,
                        question = %question.uuid,
                        "Blocker question could not be answered, failing symbol for this run."
                    );
                    cache.save(&answers)?;
                    return Ok(ScreenResult::failed(symbol, question));
                }
                AnswerValue::Unknown | AnswerValue::Text(_) => {}
            }
        }

        cache.save(&answers)?;
        let score = score(true_count, total_count);
        tracing::debug!(symbol, true_count, total_count, score, "Symbol passed.");
        Ok(ScreenResult::passed(symbol, score))
    }

    /// Screens symbols in iteration order and returns the passing ones.
    pub async fn screen_symbols<I, S>(&mut self, symbols: I) -> Result<Vec<ScreenResult>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut passing = Vec::new();
        for symbol in symbols {
            let result = self.screen_symbol(symbol.as_ref()).await?;
            if result.passed {
                tracing::info!(symbol = %result.symbol, score = result.score, "Passed screen.");
                passing.push(result);
            } else {
                tracing::info!(symbol = %result.symbol, "Failed screen.");
            }
        }
        Ok(passing)
    }

    /// A quote through the run's quote cache.
    pub async fn quote(&mut self, symbol: &str) -> api_client::Result<Quote> {
        self.quotes.get(self.market, symbol).await
    }
}

// In crates/screening/src/report.rs

use chrono::{Local, TimeZone};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;

use crate::cache::SymbolAnswers;
use crate::questions::QuestionRegistry;
use crate::screener::{self, ScreenResult, Screener};
use crate::{Error, Result};

/// One passing symbol in the summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRow {
    pub symbol: String,
    pub score: f64,
    pub price: Option<f64>,
}

/// The passing symbols of a run, in screening order.
#[derive(Debug, Clone, Default)]
pub struct ScoreReport {
    rows: Vec<ScoreRow>,
    include_price: bool,
}

impl ScoreReport {
    pub fn new(results: &[ScreenResult]) -> Self {
        Self {
            rows: results
                .iter()
                .filter(|r| r.passed)
                .map(|r| ScoreRow {
                    symbol: r.symbol.clone(),
                    score: r.score,
                    price: None,
                })
                .collect(),
            include_price: false,
        }
    }

    /// Adds the current price to every row. A failed quote leaves the price empty.
    pub async fn fill_prices(&mut self, screener: &mut Screener<'_>) {
        self.include_price = true;
        for row in &mut self.rows {
            match screener.quote(&row.symbol).await {
                Ok(quote) => row.price = Some(quote.price),
                Err(e) => tracing::warn!(
                    symbol = %row.symbol,
                    error = %e,
                    "Could not fetch quote for the summary."
                ),
            }
        }
    }

    pub fn rows(&self) -> &[ScoreRow] {
        &self.rows
    }

    /// The console summary.
    pub fn summary(&self) -> String {
        if self.rows.is_empty() {
            return "\nno valid symbols found".to_string();
        }

        let mut out = String::from("\nValid Symbols\n-------------");
        for row in &self.rows {
            let _ = write!(out, "\n\t{:5} (score={:6.2}%", row.symbol, row.score);
            if self.include_price {
                match row.price {
                    Some(price) => {
                        let _ = write!(out, ", price=${:7.2}", price);
                    }
                    None => out.push_str(", price=    n/a"),
                }
            }
            out.push(')');
        }
        out
    }

    /// Writes `Symbol,Score[,Price]` with two decimals. Never overwrites.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| match source.kind() {
                ErrorKind::AlreadyExists => Error::OutputExists(path.to_path_buf()),
                _ => Error::Io {
                    path: path.to_path_buf(),
                    source,
                },
            })?;

        let mut writer = csv::Writer::from_writer(file);
        if self.include_price {
            writer.write_record(["Symbol", "Score", "Price"])?;
        } else {
            writer.write_record(["Symbol", "Score"])?;
        }

        for row in &self.rows {
            let score = format!("{:.2}", row.score);
            if self.include_price {
                let price = row.price.map(|p| format!("{:.2}", p)).unwrap_or_default();
                writer.write_record([row.symbol.as_str(), score.as_str(), price.as_str()])?;
            } else {
                writer.write_record([row.symbol.as_str(), score.as_str()])?;
            }
        }

        writer.flush().map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), rows = self.rows.len(), "Wrote score report.");
        Ok(())
    }
}

/// Fails if `path` already exists.
pub fn ensure_new_output(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(Error::OutputExists(path.to_path_buf()));
    }
    Ok(())
}

fn format_timestamp(ts: i64) -> String {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Lists a symbol's cached answers with their expiry and freshness at `now`.
pub fn review(answers: &SymbolAnswers, now: i64) -> String {
    if answers.is_empty() {
        return format!("no cached answers for {}", answers.symbol);
    }

    let mut out = format!("{}: {} cached answers", answers.symbol, answers.len());
    for (_, answer) in answers.iter() {
        let status = if answer.is_fresh(now) { "fresh" } else { "expired" };
        let _ = write!(
            out,
            "\n  {:<7}  {}  {:<8}  {}",
            status,
            format_timestamp(answer.expiration_timestamp),
            answer.value.to_string(),
            answer.question
        );
    }
    out
}

/// Score from fresh cached boolean answers to questions still in the registry.
pub fn cached_score(registry: &QuestionRegistry, answers: &SymbolAnswers, now: i64) -> f64 {
    let mut true_count = 0u32;
    let mut total_count = 0u32;
    for (_, question) in registry.questions() {
        let Some(value) = answers
            .fresh(&question.uuid, now)
            .and_then(|a| a.value.as_bool())
        else {
            continue;
        };
        total_count += 1;
        if value {
            true_count += 1;
        }
    }
    screener::score(true_count, total_count)
}

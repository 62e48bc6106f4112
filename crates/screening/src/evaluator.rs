// In crates/screening/src/evaluator.rs

use api_client::MarketData;
use chrono::{DateTime, Local, NaiveDate};
use core_types::Symbol;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use crate::cache::{AnswerValue, SymbolAnswers};
use crate::calendar::{self, next_monthly_expiration};
use crate::clock::Clock;
use crate::prompt::AnswerSource;
use crate::questions::{Question, QuestionKind};
use crate::quotes::QuoteCache;
use crate::sectors;
use crate::Result;

pub const SECONDS_PER_DAY: i64 = 86_400;
/// Earnings answers stay fresh until a few days after the announcement.
pub const EARNINGS_GRACE_DAYS: i64 = 3;

static EARNINGS_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d{4})-(\d{2})-(\d{2})\s*$").expect("earnings date pattern is valid")
});

/// The outcome of evaluating one question.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: AnswerValue,
    pub expiration_timestamp: i64,
}

impl Evaluation {
    fn new(value: AnswerValue, expiration_timestamp: i64) -> Self {
        Self {
            value,
            expiration_timestamp,
        }
    }
}

/// Everything an evaluator may consult besides the question itself.
pub struct EvalContext<'c> {
    pub market: &'c dyn MarketData,
    pub input: &'c mut dyn AnswerSource,
    pub clock: &'c dyn Clock,
    pub quotes: &'c mut QuoteCache,
    /// Sector list used when a sector question does not name its own file.
    pub sector_file: &'c Path,
}

/// Where one question is being asked.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'s> {
    pub symbol: &'s str,
    pub section: &'s str,
}

/// `now + 86400 * expiration_days`, saturating at the `i64` bounds.
pub fn default_expiration(question: &Question, now: i64) -> i64 {
    now.saturating_add(SECONDS_PER_DAY.saturating_mul(question.expiration_days))
}

/// Evaluates a question for a symbol.
///
/// A fresh entry in `cached` is returned as-is, whatever its value, before
/// any prompt or network call.
pub async fn evaluate(
    ctx: &mut EvalContext<'_>,
    subject: Subject<'_>,
    question: &Question,
    cached: &SymbolAnswers,
) -> Result<Evaluation> {
    let now = ctx.clock.now();

    if question.kind != QuestionKind::Unsupported {
        if let Some(answer) = cached.fresh(&question.uuid, now.timestamp()) {
            tracing::debug!(
                symbol = subject.symbol,
                question = %question.uuid,
                value = %answer.value,
                "Using fresh cached answer."
            );
            return Ok(Evaluation::new(answer.value.clone(), answer.expiration_timestamp));
        }
    }

    match &question.kind {
        QuestionKind::Boolean => ask_boolean(ctx, subject, question, now),
        QuestionKind::PriceFilter {
            price_min,
            price_max,
        } => Ok(check_price(ctx, subject, question, now, *price_min, *price_max).await),
        QuestionKind::VolumeFilter { volume_min } => {
            Ok(check_volume(ctx, subject, question, now, *volume_min).await)
        }
        QuestionKind::OpenInterestFilter { open_interest_min } => {
            Ok(check_open_interest(ctx, subject, now, *open_interest_min).await)
        }
        QuestionKind::EarningsDate => ask_earnings_date(ctx, subject, question, now),
        QuestionKind::SectorSelection { sector_file } => {
            let path = sector_file
                .as_deref()
                .map(app_config::expand_path)
                .unwrap_or_else(|| ctx.sector_file.to_path_buf());
            ask_sector(ctx, subject, question, now, &path)
        }
        QuestionKind::Unsupported => {
            tracing::warn!(
                symbol = subject.symbol,
                section = subject.section,
                question = %question.uuid,
                text = %question.text,
                "Unknown question type, leaving it unanswered."
            );
            Ok(Evaluation::new(AnswerValue::Unknown, 0))
        }
    }
}

fn ask_boolean(
    ctx: &mut EvalContext<'_>,
    subject: Subject<'_>,
    question: &Question,
    now: DateTime<Local>,
) -> Result<Evaluation> {
    let reply = ctx.input.ask(&format!(
        "\t{}[{}] {} [y/N] ",
        subject.symbol, subject.section, question.text
    ))?;
    let value = reply.trim_start().to_lowercase().starts_with('y');
    Ok(Evaluation::new(
        AnswerValue::Bool(value),
        default_expiration(question, now.timestamp()),
    ))
}

async fn check_price(
    ctx: &mut EvalContext<'_>,
    subject: Subject<'_>,
    question: &Question,
    now: DateTime<Local>,
    price_min: f64,
    price_max: f64,
) -> Evaluation {
    let symbol = subject.symbol;
    let quote = match ctx.quotes.get(ctx.market, symbol).await {
        Ok(quote) => quote,
        Err(e) => return quote_failure(symbol, e, now),
    };

    let price = quote.price;
    let passed = price_min <= price && price <= price_max;
    if passed {
        tracing::debug!(symbol, price, price_min, price_max, "Price is in range.");
    } else {
        tracing::debug!(symbol, price, price_min, price_max, "Price is out of range.");
    }
    Evaluation::new(
        AnswerValue::Bool(passed),
        default_expiration(question, now.timestamp()),
    )
}

async fn check_volume(
    ctx: &mut EvalContext<'_>,
    subject: Subject<'_>,
    question: &Question,
    now: DateTime<Local>,
    volume_min: u64,
) -> Evaluation {
    let symbol = subject.symbol;
    let quote = match ctx.quotes.get(ctx.market, symbol).await {
        Ok(quote) => quote,
        Err(e) => return quote_failure(symbol, e, now),
    };

    let passed = quote.average_volume >= volume_min;
    tracing::debug!(
        symbol,
        average_volume = quote.average_volume,
        volume_min,
        passed,
        "Checked volume."
    );
    Evaluation::new(
        AnswerValue::Bool(passed),
        default_expiration(question, now.timestamp()),
    )
}

/// An unknown symbol is a definite, long-lived `false`. Anything else is
/// undetermined and retried next time.
fn quote_failure(symbol: &str, error: api_client::Error, now: DateTime<Local>) -> Evaluation {
    match error {
        api_client::Error::SymbolNotFound(_) => {
            tracing::debug!(symbol, "Symbol does not exist.");
            Evaluation::new(AnswerValue::Bool(false), calendar::sentinel_expiration())
        }
        e => {
            tracing::warn!(symbol, error = %e, "Could not fetch quote.");
            Evaluation::new(AnswerValue::Unknown, now.timestamp())
        }
    }
}

async fn check_open_interest(
    ctx: &mut EvalContext<'_>,
    subject: Subject<'_>,
    now: DateTime<Local>,
    open_interest_min: u64,
) -> Evaluation {
    let symbol = subject.symbol;
    let expiration = next_monthly_expiration(now);
    let expiry_date = expiration.date_naive();

    tracing::debug!(symbol, expiration = %expiry_date, "Fetching option chain.");
    let chain = match ctx
        .market
        .option_chain(&Symbol::from(symbol), expiry_date)
        .await
    {
        Ok(chain) => chain,
        Err(e) => {
            tracing::warn!(
                symbol,
                expiration = %expiry_date,
                error = %e,
                "Could not fetch option chain."
            );
            return Evaluation::new(AnswerValue::Unknown, now.timestamp());
        }
    };

    let liquid = chain
        .calls()
        .iter()
        .find(|call| call.open_interest >= open_interest_min);
    match liquid {
        Some(call) => tracing::debug!(
            symbol,
            strike = call.strike_price,
            open_interest = call.open_interest,
            "Found sufficient open interest."
        ),
        None => tracing::debug!(
            symbol,
            open_interest_min,
            "No strike has sufficient open interest."
        ),
    }
    Evaluation::new(AnswerValue::Bool(liquid.is_some()), expiration.timestamp())
}

/// Parses `YYYY-MM-DD` (surrounding whitespace allowed) into a real date.
pub fn parse_earnings_date(input: &str) -> Option<NaiveDate> {
    let caps = EARNINGS_DATE.captures(input)?;
    let year = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let day = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn ask_earnings_date(
    ctx: &mut EvalContext<'_>,
    subject: Subject<'_>,
    question: &Question,
    now: DateTime<Local>,
) -> Result<Evaluation> {
    let next_monthly = next_monthly_expiration(now);
    let prompt = format!(
        "\t{}[{}] {} (YYYY-MM-DD): ",
        subject.symbol, subject.section, question.text
    );

    loop {
        let reply = ctx.input.ask(&prompt)?;
        let Some(date) = parse_earnings_date(&reply) else {
            ctx.input.show("\n*** format error, try again YYYY-MM-DD ***");
            continue;
        };
        let Some(earnings) = date.and_hms_opt(0, 0, 1).map(calendar::to_local) else {
            continue;
        };

        // Earnings before the next expiration put the position at risk.
        let clear = earnings >= next_monthly;
        tracing::debug!(
            symbol = subject.symbol,
            earnings = %earnings,
            next_monthly = %next_monthly,
            clear,
            "Checked earnings date."
        );
        return Ok(Evaluation::new(
            AnswerValue::Bool(clear),
            earnings.timestamp() + SECONDS_PER_DAY * EARNINGS_GRACE_DAYS,
        ));
    }
}

fn ask_sector(
    ctx: &mut EvalContext<'_>,
    subject: Subject<'_>,
    question: &Question,
    now: DateTime<Local>,
    sector_file: &Path,
) -> Result<Evaluation> {
    let expiration = default_expiration(question, now.timestamp());
    let Subject { symbol, section } = subject;
    let name_prompt = format!("\t{}[{}] {} ", symbol, section, question.text);
    let mut sectors = sectors::load_sectors(sector_file);

    if sectors.is_empty() {
        let sector = ask_sector_name(ctx.input, &name_prompt)?;
        sectors.push(sector.clone());
        persist_sectors(sector_file, &sectors);
        return Ok(Evaluation::new(AnswerValue::Text(sector), expiration));
    }

    ctx.input.show(&format!("\n\tSelect a sector ({})\n", symbol));
    for (i, sector) in sectors.iter().enumerate() {
        ctx.input.show(&format!("\t{:2}. {}", i + 1, sector));
    }

    let choice_prompt = format!(
        "\n\t{}[{}] {} (or 'new' for a new sector) ",
        symbol, section, question.text
    );
    loop {
        let reply = ctx.input.ask(&choice_prompt)?;
        let choice = reply.trim();

        if choice == "new" {
            let sector = ask_sector_name(ctx.input, &name_prompt)?;
            if !sectors.contains(&sector) {
                sectors.push(sector.clone());
                sectors.sort();
                persist_sectors(sector_file, &sectors);
            }
            return Ok(Evaluation::new(AnswerValue::Text(sector), expiration));
        }

        match choice.parse::<usize>() {
            Ok(n) if (1..=sectors.len()).contains(&n) => {
                return Ok(Evaluation::new(AnswerValue::Text(sectors[n - 1].clone()), expiration));
            }
            _ => ctx.input.show(&format!(
                "\n*** enter a number from 1 to {} or 'new' ***",
                sectors.len()
            )),
        }
    }
}

fn ask_sector_name(input: &mut dyn AnswerSource, prompt: &str) -> Result<String> {
    loop {
        let name = input.ask(prompt)?.trim().to_string();
        if !name.is_empty() {
            return Ok(name);
        }
    }
}

fn persist_sectors(path: &Path, sectors: &[String]) {
    if let Err(e) = sectors::save_sectors(path, sectors) {
        tracing::warn!(path = %path.display(), error = %e, "Could not save the sector list.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::prompt::ScriptedAnswers;
    use async_trait::async_trait;
    use core_types::{OptionChain, OptionContract, Quote};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeMarket {
        price: f64,
        average_volume: u64,
        call_open_interest: Vec<u64>,
        missing_symbol: bool,
        offline: bool,
        quote_calls: AtomicUsize,
        chain_calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketData for FakeMarket {
        async fn quote(&self, symbol: &Symbol) -> api_client::Result<Quote> {
            self.quote_calls.fetch_add(1, Ordering::SeqCst);
            if self.missing_symbol {
                return Err(api_client::Error::SymbolNotFound(symbol.to_string()));
            }
            if self.offline {
                return Err(api_client::Error::NotAuthenticated);
            }
            Ok(Quote {
                symbol: symbol.clone(),
                price: self.price,
                average_volume: self.average_volume,
                ..Quote::default()
            })
        }

        async fn option_chain(
            &self,
            symbol: &Symbol,
            expiration: NaiveDate,
        ) -> api_client::Result<OptionChain> {
            self.chain_calls.fetch_add(1, Ordering::SeqCst);
            if self.offline {
                return Err(api_client::Error::OptionChainNotFound {
                    symbol: symbol.to_string(),
                    expiration,
                });
            }
            let calls = self
                .call_open_interest
                .iter()
                .enumerate()
                .map(|(i, &oi)| OptionContract {
                    display_symbol: String::new(),
                    strike_price: 10.0 * (i + 1) as f64,
                    bid: 0.0,
                    ask: 0.0,
                    last_price: 0.0,
                    volume: 0,
                    open_interest: oi,
                    delta: None,
                    theta: None,
                })
                .collect();
            Ok(OptionChain::new(symbol.clone(), expiration, calls, vec![]))
        }

        async fn option_expiration_dates(
            &self,
            _symbol: &Symbol,
        ) -> api_client::Result<Vec<NaiveDate>> {
            Ok(vec![])
        }
    }

    fn question(kind: QuestionKind, expiration_days: i64) -> Question {
        Question {
            uuid: "q".into(),
            text: "Question?".into(),
            blocker: false,
            expiration_days,
            kind,
        }
    }

    fn clock() -> FixedClock {
        FixedClock::at(
            NaiveDate::from_ymd_opt(2024, 3, 4)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        )
    }

    const SUBJECT: Subject<'static> = Subject {
        symbol: "XYZ",
        section: "basics",
    };

    async fn run(
        market: &FakeMarket,
        input: &mut ScriptedAnswers,
        sector_file: &Path,
        question: &Question,
        cached: &SymbolAnswers,
    ) -> Evaluation {
        let clock = clock();
        let mut quotes = QuoteCache::new();
        let mut ctx = EvalContext {
            market,
            input,
            clock: &clock,
            quotes: &mut quotes,
            sector_file,
        };
        evaluate(&mut ctx, SUBJECT, question, cached).await.unwrap()
    }

    async fn run_uncached(market: &FakeMarket, question: &Question) -> Evaluation {
        let mut input = ScriptedAnswers::default();
        let cached = SymbolAnswers::new("XYZ");
        run(market, &mut input, Path::new("unused"), question, &cached).await
    }

    fn now() -> i64 {
        clock().timestamp()
    }

    #[test]
    fn huge_expiration_days_saturate() {
        let q = question(QuestionKind::Boolean, i64::MAX / 2);
        assert_eq!(default_expiration(&q, now()), i64::MAX);
    }

    #[tokio::test]
    async fn price_outside_range_is_false_with_day_based_expiry() {
        let market = FakeMarket {
            price: 12.0,
            ..Default::default()
        };
        let q = question(
            QuestionKind::PriceFilter {
                price_min: 15.0,
                price_max: 375.0,
            },
            5,
        );
        let eval = run_uncached(&market, &q).await;

        assert_eq!(eval.value, AnswerValue::Bool(false));
        assert_eq!(eval.expiration_timestamp, now() + 5 * SECONDS_PER_DAY);
    }

    #[tokio::test]
    async fn price_bounds_are_inclusive() {
        let q = question(
            QuestionKind::PriceFilter {
                price_min: 15.0,
                price_max: 375.0,
            },
            1,
        );
        for price in [15.0, 375.0] {
            let market = FakeMarket {
                price,
                ..Default::default()
            };
            let eval = run_uncached(&market, &q).await;
            assert_eq!(eval.value, AnswerValue::Bool(true));
        }
    }

    #[tokio::test]
    async fn unknown_symbol_is_false_until_the_sentinel() {
        let market = FakeMarket {
            missing_symbol: true,
            ..Default::default()
        };
        let q = question(QuestionKind::VolumeFilter { volume_min: 1 }, 1);
        let eval = run_uncached(&market, &q).await;

        assert_eq!(eval.value, AnswerValue::Bool(false));
        assert_eq!(eval.expiration_timestamp, calendar::sentinel_expiration());
    }

    #[tokio::test]
    async fn network_failure_is_unknown_and_expires_now() {
        let market = FakeMarket {
            offline: true,
            ..Default::default()
        };
        let q = question(QuestionKind::VolumeFilter { volume_min: 1 }, 10);
        let eval = run_uncached(&market, &q).await;

        assert_eq!(eval.value, AnswerValue::Unknown);
        assert_eq!(eval.expiration_timestamp, now());
    }

    #[tokio::test]
    async fn open_interest_pins_expiry_to_the_monthly_chain() {
        let market = FakeMarket {
            call_open_interest: vec![10, 40, 60],
            ..Default::default()
        };
        let q = question(
            QuestionKind::OpenInterestFilter {
                open_interest_min: 50,
            },
            30,
        );
        let eval = run_uncached(&market, &q).await;

        let expected = calendar::to_local(
            NaiveDate::from_ymd_opt(2024, 3, 15)
                .unwrap()
                .and_hms_opt(23, 59, 59)
                .unwrap(),
        );
        assert_eq!(eval.value, AnswerValue::Bool(true));
        assert_eq!(eval.expiration_timestamp, expected.timestamp());
    }

    #[tokio::test]
    async fn missing_chain_is_unknown() {
        let market = FakeMarket {
            offline: true,
            ..Default::default()
        };
        let q = question(
            QuestionKind::OpenInterestFilter {
                open_interest_min: 50,
            },
            30,
        );
        let eval = run_uncached(&market, &q).await;
        assert_eq!(eval.value, AnswerValue::Unknown);
    }

    #[tokio::test]
    async fn fresh_false_is_reused_without_network() {
        let market = FakeMarket {
            price: 100.0,
            ..Default::default()
        };
        let q = question(
            QuestionKind::PriceFilter {
                price_min: 15.0,
                price_max: 375.0,
            },
            5,
        );
        let mut cached = SymbolAnswers::new("XYZ");
        cached.put_answer("q", AnswerValue::Bool(false), now() + 60, "Question?");

        let mut input = ScriptedAnswers::default();
        let eval = run(&market, &mut input, Path::new("unused"), &q, &cached).await;
        assert_eq!(eval.value, AnswerValue::Bool(false));
        assert_eq!(eval.expiration_timestamp, now() + 60);
        assert_eq!(market.quote_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_day_answers_are_always_recomputed() {
        let market = FakeMarket::default();
        let q = question(QuestionKind::Boolean, 0);
        let mut input = ScriptedAnswers::new(["y", "n"]);

        let empty = SymbolAnswers::new("XYZ");
        let first = run(&market, &mut input, Path::new("unused"), &q, &empty).await;
        assert_eq!(first.expiration_timestamp, now());

        let mut cached = SymbolAnswers::new("XYZ");
        cached.put_answer("q", first.value, first.expiration_timestamp, "Question?");
        let second = run(&market, &mut input, Path::new("unused"), &q, &cached).await;

        assert_eq!(second.value, AnswerValue::Bool(false));
        assert_eq!(input.prompts().len(), 2);
        assert_eq!(input.prompts()[0], "\tXYZ[basics] Question? [y/N] ");
    }

    #[tokio::test]
    async fn earnings_date_reprompts_until_valid() {
        let market = FakeMarket::default();
        let q = question(QuestionKind::EarningsDate, 0);
        let mut input = ScriptedAnswers::new(["next week", "2024-02-30", " 2024-03-12 "]);

        let empty = SymbolAnswers::new("XYZ");
        let eval = run(&market, &mut input, Path::new("unused"), &q, &empty).await;

        let earnings = calendar::to_local(
            NaiveDate::from_ymd_opt(2024, 3, 12)
                .unwrap()
                .and_hms_opt(0, 0, 1)
                .unwrap(),
        );
        // Before the 2024-03-15 expiration.
        assert_eq!(eval.value, AnswerValue::Bool(false));
        assert_eq!(
            eval.expiration_timestamp,
            earnings.timestamp() + 3 * SECONDS_PER_DAY
        );
        assert_eq!(input.prompts().len(), 3);
    }

    #[tokio::test]
    async fn earnings_after_expiration_is_clear() {
        let market = FakeMarket::default();
        let q = question(QuestionKind::EarningsDate, 0);
        let mut input = ScriptedAnswers::new(["2024-04-25"]);

        let empty = SymbolAnswers::new("XYZ");
        let eval = run(&market, &mut input, Path::new("unused"), &q, &empty).await;
        assert_eq!(eval.value, AnswerValue::Bool(true));
    }

    #[tokio::test]
    async fn first_sector_is_added_to_an_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sectors.json");
        let market = FakeMarket::default();
        let q = question(QuestionKind::SectorSelection { sector_file: None }, 90);
        let mut input = ScriptedAnswers::new(["Energy"]);

        let eval = run(&market, &mut input, &file, &q, &SymbolAnswers::new("XYZ")).await;
        assert_eq!(eval.value, AnswerValue::Text("Energy".into()));
        assert_eq!(sectors::load_sectors(&file), vec!["Energy"]);
    }

    #[tokio::test]
    async fn sector_menu_accepts_index_or_new() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("sectors.json");
        sectors::save_sectors(&file, &["Energy".into(), "Utilities".into()]).unwrap();
        let market = FakeMarket::default();
        let q = question(QuestionKind::SectorSelection { sector_file: None }, 90);

        let mut input = ScriptedAnswers::new(["7", "2"]);
        let eval = run(&market, &mut input, &file, &q, &SymbolAnswers::new("XYZ")).await;
        assert_eq!(eval.value, AnswerValue::Text("Utilities".into()));

        let mut input = ScriptedAnswers::new(["new", "Banking"]);
        let eval = run(&market, &mut input, &file, &q, &SymbolAnswers::new("XYZ")).await;
        assert_eq!(eval.value, AnswerValue::Text("Banking".into()));
        assert_eq!(sectors::load_sectors(&file), vec!["Banking", "Energy", "Utilities"]);
    }

    #[tokio::test]
    async fn unsupported_type_is_unknown_and_immediately_stale() {
        let market = FakeMarket::default();
        let q = question(QuestionKind::Unsupported, 10);
        let eval = run_uncached(&market, &q).await;
        assert_eq!(eval, Evaluation::new(AnswerValue::Unknown, 0));
    }

    #[test]
    fn parses_strict_earnings_dates() {
        assert_eq!(parse_earnings_date("2024-05-01"), NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(parse_earnings_date("  2024-05-01\t"), NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(parse_earnings_date("2024-5-01"), None);
        assert_eq!(parse_earnings_date("2024-13-01"), None);
        assert_eq!(parse_earnings_date("05/01/2024"), None);
    }
}

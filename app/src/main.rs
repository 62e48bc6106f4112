// In app/src/main.rs

use anyhow::{Context, Result};
use api_client::{ApiClient, MarketData, TokenStatus};
use app_config::{DEFAULT_CONFIG_FILE, Settings, expand_path};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use core_types::Symbol;
use screening::calendar::next_monthly_expiration;
use screening::{
    AnswerCache, ConsolePrompt, ScoreReport, Screener, SystemClock, load_questions, load_symbols,
    report,
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

mod brokerage;
mod display;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = "Screens stock symbols against configurable questionnaires."
)]
struct Cli {
    /// The screener configuration file (JSON or TOML).
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config_file: PathBuf,

    /// Increase verbosity.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Screens every configured symbol, or a single one.
    Screen {
        /// Screen only this symbol.
        #[arg(short, long)]
        symbol: Option<String>,

        /// Write the passing symbols to this CSV file (must not exist).
        #[arg(short, long)]
        output_csv: Option<PathBuf>,

        /// Include a live quote in the summary.
        #[arg(short, long)]
        quote: bool,

        /// Show the symbol's cached answers instead of screening.
        #[arg(short, long, requires = "symbol", conflicts_with_all = ["output_csv", "quote"])]
        review: bool,
    },

    /// Prints a symbol's score from fresh cached answers only.
    Score {
        #[arg(short, long)]
        symbol: String,
    },

    /// Fetches a quote.
    Quote {
        #[arg(short, long)]
        symbol: String,
    },

    /// Shows open interest per strike for a monthly option chain.
    Chain {
        #[arg(short, long)]
        symbol: String,

        /// Expiration date (YYYY-MM-DD). Defaults to the next monthly expiration.
        #[arg(short, long)]
        expiration: Option<NaiveDate>,
    },

    /// Lists the option expiration dates of a symbol.
    Expirations {
        #[arg(short, long)]
        symbol: String,
    },

    /// Lists the brokerage accounts.
    Accounts,

    /// Renews the brokerage access token.
    RenewToken {
        /// Renew even if the token is still fresh.
        #[arg(long)]
        force: bool,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from a .env file, if it exists.
    dotenvy::dotenv().ok();

    // Parse command-line arguments.
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = app_config::load_settings(&cli.config_file).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            cli.config_file.display()
        )
    })?;
    tracing::debug!(config = %cli.config_file.display(), "Settings loaded.");

    // Match on the parsed command and call the appropriate handler.
    match cli.command {
        Commands::Screen {
            symbol,
            output_csv,
            quote,
            review,
        } => {
            if review {
                handle_review(&settings, symbol.as_deref().unwrap_or_default())?;
            } else {
                handle_screen(&settings, symbol, output_csv, quote).await?;
            }
        }
        Commands::Score { symbol } => handle_score(&settings, &symbol)?,
        Commands::Quote { symbol } => handle_quote(&settings, &symbol, cli.verbose).await?,
        Commands::Chain { symbol, expiration } => {
            handle_chain(&settings, &symbol, expiration).await?
        }
        Commands::Expirations { symbol } => handle_expirations(&settings, &symbol).await?,
        Commands::Accounts => handle_accounts(&settings).await?,
        Commands::RenewToken { force } => handle_renew_token(&settings, force).await?,
    }

    Ok(())
}

/// Logs go to stderr; INFO by default, DEBUG with `--verbose`.
fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(
            Targets::new()
                .with_target("reqwest", Level::WARN) // Keep HTTP client internals quiet
                .with_target("hyper", Level::WARN)
                .with_target("hyper_util", Level::WARN)
                .with_default(level),
        );
    tracing_subscriber::registry().with(fmt_layer).init();
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn answer_cache(settings: &Settings) -> AnswerCache {
    AnswerCache::new(expand_path(&settings.screener.cache_dir))
}

// --- "Screen" Subcommand Logic ---

async fn handle_screen(
    settings: &Settings,
    symbol: Option<String>,
    output_csv: Option<PathBuf>,
    include_quote: bool,
) -> Result<()> {
    // Checked before any prompting.
    if let Some(path) = &output_csv {
        report::ensure_new_output(path)?;
    }

    let screener_settings = &settings.screener;
    let registry = load_questions(&expand_path(&screener_settings.questions_directory))?;
    if registry.is_empty() {
        tracing::warn!("No questions are configured; every symbol will pass with a score of 0.");
    }

    let symbols: BTreeSet<String> = match symbol {
        Some(symbol) => BTreeSet::from([normalize(&symbol)]),
        None => load_symbols(&expand_path(&screener_settings.symbols_directory))?,
    };
    tracing::info!(symbols = symbols.len(), questions = registry.len(), "Starting screen.");

    let client = brokerage::connect(&settings.brokerage).await?;
    let cache = answer_cache(settings);
    let clock = SystemClock;
    let mut prompt = ConsolePrompt;

    let mut screener = Screener::new(&registry, &cache, &client, &mut prompt, &clock)
        .with_sector_file(expand_path(&screener_settings.sector_file));
    let passing = screener.screen_symbols(&symbols).await?;

    let mut score_report = ScoreReport::new(&passing);
    if include_quote {
        score_report.fill_prices(&mut screener).await;
    }
    println!("{}", score_report.summary());

    if let Some(path) = output_csv {
        score_report.write_csv(&path)?;
    }
    Ok(())
}

fn handle_review(settings: &Settings, symbol: &str) -> Result<()> {
    let answers = answer_cache(settings).get_all_answers(&normalize(symbol));
    println!("{}", report::review(&answers, Utc::now().timestamp()));
    Ok(())
}

// --- "Score" Subcommand Logic ---

fn handle_score(settings: &Settings, symbol: &str) -> Result<()> {
    let symbol = normalize(symbol);
    let registry = load_questions(&expand_path(&settings.screener.questions_directory))?;
    let answers = answer_cache(settings).get_all_answers(&symbol);

    let score = report::cached_score(&registry, &answers, Utc::now().timestamp());
    println!("{} score: {:.2}%", symbol, score);
    Ok(())
}

// --- Brokerage Subcommands ---

async fn handle_quote(settings: &Settings, symbol: &str, verbose: bool) -> Result<()> {
    let symbol = normalize(symbol);
    let client = brokerage::connect(&settings.brokerage).await?;
    let quote = client.quote(&Symbol::from(symbol.as_str())).await?;

    let sector = settings.screener.sector_question_id.as_deref().and_then(|id| {
        answer_cache(settings)
            .get_all_answers(&symbol)
            .get(id)
            .and_then(|a| a.value.as_text().map(str::to_string))
    });

    println!("{}", display::render_quote(&quote, sector.as_deref(), verbose));
    Ok(())
}

async fn handle_chain(
    settings: &Settings,
    symbol: &str,
    expiration: Option<NaiveDate>,
) -> Result<()> {
    let symbol = normalize(symbol);
    let expiration =
        expiration.unwrap_or_else(|| next_monthly_expiration(Local::now()).date_naive());
    let client = brokerage::connect(&settings.brokerage).await?;

    match client.option_chain(&Symbol::from(symbol.as_str()), expiration).await {
        Ok(chain) => println!("{}", display::render_chain(&chain)),
        Err(api_client::Error::OptionChainNotFound { .. }) => {
            println!("no option chain found for {} expiring {}", symbol, expiration);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

async fn handle_expirations(settings: &Settings, symbol: &str) -> Result<()> {
    let symbol = normalize(symbol);
    let client = brokerage::connect(&settings.brokerage).await?;
    let dates = client
        .option_expiration_dates(&Symbol::from(symbol.as_str()))
        .await?;
    println!("{}", display::render_expirations(&symbol, &dates));
    Ok(())
}

async fn handle_accounts(settings: &Settings) -> Result<()> {
    let client = brokerage::connect(&settings.brokerage).await?;
    let accounts = client.list_accounts().await?;
    println!("{}", display::render_accounts(&accounts));
    Ok(())
}

async fn handle_renew_token(settings: &Settings, force: bool) -> Result<()> {
    let mut client = ApiClient::new(&settings.brokerage)?;

    match client.token_status(Utc::now().timestamp()) {
        TokenStatus::Missing | TokenStatus::Expired => {
            tracing::info!("Access token is missing or expired, authorizing instead of renewing.");
            brokerage::authorize(&mut client).await?;
        }
        TokenStatus::NeedsRenewal | TokenStatus::Valid => {
            if client.renew_token(force).await? {
                println!("Access token renewed.");
            } else {
                println!("Access token is recent; use --force to renew it anyway.");
            }
        }
    }
    Ok(())
}

// In app/src/display.rs

use chrono::NaiveDate;
use core_types::{Account, OptionChain, Quote};
use std::fmt::Write as _;

fn or_na<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

/// One-line quote, or the full detail block when `verbose`.
pub fn render_quote(quote: &Quote, sector: Option<&str>, verbose: bool) -> String {
    let headline = format!(
        "{:5} ${:8.2} ({:+.2}, {:+.2}%)  {}",
        quote.symbol.as_str(),
        quote.price,
        quote.change_close,
        quote.change_close_percentage,
        quote.company_name
    );
    if !verbose {
        return headline;
    }

    let mut out = headline;
    let _ = write!(
        out,
        "\n  Bid/Ask:        {:.2} x {} / {:.2} x {}\
         \n  Day range:      {:.2} - {:.2}\
         \n  52 week range:  {:.2} - {:.2}\
         \n  Previous close: {:.2}\
         \n  Volume:         {} (avg {})\
         \n  Beta:           {:.2}\
         \n  Market cap:     {}\
         \n  Float:          {}\
         \n  Dividend:       {:.2}\
         \n  Next earnings:  {}\
         \n  Sector:         {}",
        quote.bid,
        quote.bid_size,
        quote.ask,
        quote.ask_size,
        quote.day_low,
        quote.day_high,
        quote.week52_low,
        quote.week52_high,
        quote.previous_close,
        quote.volume,
        quote.average_volume,
        quote.beta,
        quote.market_cap_display(),
        quote.float_display(),
        quote.dividend,
        or_na(quote.next_earnings_date),
        sector.unwrap_or("n/a"),
    );
    out
}

/// Open interest per strike plus the put/call ratio and max pain.
pub fn render_chain(chain: &OptionChain) -> String {
    let mut out = format!(
        "{} options expiring {}\n\n{:>10} {:>10} {:>10}",
        chain.symbol, chain.expiration, "Strike", "Call OI", "Put OI"
    );
    for strike in chain.strike_prices() {
        let call = chain.call(strike).map(|c| c.open_interest);
        let put = chain.put(strike).map(|p| p.open_interest);
        let _ = write!(out, "\n{:>10.2} {:>10} {:>10}", strike, or_na(call), or_na(put));
    }
    let _ = write!(
        out,
        "\n\nPut/call ratio: {:.2}\nMax pain:       {}",
        chain.put_call_ratio(),
        chain
            .max_pain()
            .map_or_else(|| "n/a".to_string(), |s| format!("{:.2}", s))
    );
    out
}

pub fn render_expirations(symbol: &str, dates: &[NaiveDate]) -> String {
    if dates.is_empty() {
        return format!("no option expirations listed for {}", symbol);
    }
    let mut out = format!("{} option expirations:", symbol);
    for date in dates {
        let _ = write!(out, "\n\t{}", date.format("%Y-%m-%d (%a)"));
    }
    out
}

pub fn render_accounts(accounts: &[Account]) -> String {
    if accounts.is_empty() {
        return "no accounts found".to_string();
    }
    accounts
        .iter()
        .map(|a| format!("\t{:<30} {:<12} key={}", a.display_name(), a.account_type, a.key))
        .collect::<Vec<_>>()
        .join("\n")
}

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Symbol;

/// Returned by `put_call_ratio` when there is no call open interest at all.
pub const NO_CALL_INTEREST_RATIO: f64 = 99.99;

/// One side (call or put) of a strike in an option chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionContract {
    pub display_symbol: String,
    pub strike_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub last_price: f64,
    pub volume: u64,
    pub open_interest: u64,
    pub delta: Option<f64>,
    pub theta: Option<f64>,
}

/// All calls and puts of one underlying for a single expiration date.
///
/// Contracts are kept sorted by strike price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub symbol: Symbol,
    pub expiration: NaiveDate,
    calls: Vec<OptionContract>,
    puts: Vec<OptionContract>,
}

impl OptionChain {
    pub fn new(
        symbol: Symbol,
        expiration: NaiveDate,
        mut calls: Vec<OptionContract>,
        mut puts: Vec<OptionContract>,
    ) -> Self {
        calls.sort_by(|a, b| a.strike_price.total_cmp(&b.strike_price));
        puts.sort_by(|a, b| a.strike_price.total_cmp(&b.strike_price));
        Self {
            symbol,
            expiration,
            calls,
            puts,
        }
    }

    pub fn calls(&self) -> &[OptionContract] {
        &self.calls
    }

    /// Every strike that has a call or a put, ascending and deduplicated.
    pub fn strike_prices(&self) -> Vec<f64> {
        let mut strikes: Vec<f64> = self
            .calls
            .iter()
            .chain(self.puts.iter())
            .map(|c| c.strike_price)
            .collect();
        strikes.sort_by(|a, b| a.total_cmp(b));
        strikes.dedup();
        strikes
    }

    pub fn call(&self, strike: f64) -> Option<&OptionContract> {
        self.calls.iter().find(|c| c.strike_price == strike)
    }

    pub fn put(&self, strike: f64) -> Option<&OptionContract> {
        self.puts.iter().find(|c| c.strike_price == strike)
    }

    pub fn total_call_open_interest(&self) -> u64 {
        self.calls.iter().map(|c| c.open_interest).sum()
    }

    pub fn total_put_open_interest(&self) -> u64 {
        self.puts.iter().map(|c| c.open_interest).sum()
    }

    pub fn put_call_ratio(&self) -> f64 {
        let calls = self.total_call_open_interest();
        if calls == 0 {
            return NO_CALL_INTEREST_RATIO;
        }
        self.total_put_open_interest() as f64 / calls as f64
    }

    /// The strike at which option holders collectively lose the most, i.e.
    /// the strike minimising the intrinsic value paid out to in-the-money
    /// calls and puts.
    pub fn max_pain(&self) -> Option<f64> {
        let strikes = self.strike_prices();
        let mut best: Option<(f64, f64)> = None;

        for &working in &strikes {
            let mut payout = 0.0;
            for &strike in &strikes {
                let delta = working - strike;
                if delta > 0.0 {
                    let oi = self.call(strike).map_or(0, |c| c.open_interest);
                    payout += delta * oi as f64 * 100.0;
                } else if delta < 0.0 {
                    let oi = self.put(strike).map_or(0, |p| p.open_interest);
                    payout += -delta * oi as f64 * 100.0;
                }
            }

            match best {
                Some((_, lowest)) if payout >= lowest => {}
                _ => best = Some((working, payout)),
            }
        }

        best.map(|(strike, _)| strike)
    }
}

use api_client::MarketData;
use core_types::{Quote, Symbol};
use std::collections::HashMap;

/// Quotes fetched during one run, keyed by symbol.
///
/// Several questions (and the summary) look at the same quote; only the first
/// lookup goes to the brokerage. Failures are not cached.
#[derive(Debug, Default)]
pub struct QuoteCache {
    quotes: HashMap<String, Quote>,
}

impl QuoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(
        &mut self,
        market: &dyn MarketData,
        symbol: &str,
    ) -> api_client::Result<Quote> {
        if let Some(quote) = self.quotes.get(symbol) {
            tracing::debug!(symbol, "Returning cached quote.");
            return Ok(quote.clone());
        }

        tracing::debug!(symbol, "Fetching quote.");
        let quote = market.quote(&Symbol::from(symbol)).await?;
        self.quotes.insert(symbol.to_string(), quote.clone());
        Ok(quote)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

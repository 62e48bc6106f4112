// In crates/core-types/src/lib.rs

pub mod option_chain;
pub mod types;

// Re-export the most important types for easy access from other crates.
pub use option_chain::{OptionChain, OptionContract};
pub use types::{Account, Quote, Symbol};

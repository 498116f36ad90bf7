//! # Exchange Module
//!
//! The exchange is modeled as an injected capability: every component takes
//! an [`ExchangeApi`] implementation explicitly instead of reaching for a
//! shared client, so scanning and execution can be tested against a
//! substitutable fake.

/// REST client implementation
pub mod client;
/// Wire types for the REST payloads
pub mod types;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use eyre::Result;

use crate::arb::types::Side;
use self::types::{AccountInfo, BookTicker, DayStat, OrderFill, PriceTicker, SymbolInfo};

/// The exchange capability consumed by the engine.
///
/// Market-data calls are read-only and safe to issue concurrently; the order
/// call mutates account state and is only ever issued by the sequencer, one
/// order at a time.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Connectivity check.
    async fn ping(&self) -> Result<()>;

    /// Account metadata and balances.
    async fn account(&self) -> Result<AccountInfo>;

    /// Exchange-wide symbol metadata.
    async fn exchange_info(&self) -> Result<Vec<SymbolInfo>>;

    /// 24-hour statistics for every symbol.
    async fn day_stats(&self) -> Result<Vec<DayStat>>;

    /// Last traded price for every symbol.
    async fn last_prices(&self) -> Result<Vec<PriceTicker>>;

    /// Best bid/ask price and size for one symbol.
    async fn book_ticker(&self, symbol: &str) -> Result<BookTicker>;

    /// Submits a market order and returns its realized fill.
    ///
    /// `quantity` is the quantity being spent: the base quantity for a SELL,
    /// the quote quantity for a BUY.
    async fn market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: &BigDecimal,
    ) -> Result<OrderFill>;
}

#![allow(dead_code, clippy::unwrap_used)]
//! Shared constructors and a scripted exchange fake for tests and benches.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use eyre::{bail, Result};

use super::chain::{Leg, TradingChain};
use super::quote::{evaluate_chain, ValuableTradingChain};
use super::types::{Side, TradingPair};
use crate::exchange::types::{
    AccountInfo, Balance, BookTicker, DayStat, OrderFill, PriceTicker, SymbolFilter, SymbolInfo,
};
use crate::exchange::ExchangeApi;

/// Parses a decimal literal.
pub fn dec(raw: &str) -> BigDecimal {
    raw.parse().unwrap()
}

/// A pair with permissive minimums and fine-grained steps.
pub fn pair(base: &str, quote: &str) -> TradingPair {
    pair_with(base, quote, "0.00000001", "0.00000001", "0.00000001")
}

/// A pair with explicit minimum quantity, quantity step and price tick.
pub fn pair_with(
    base: &str,
    quote: &str,
    min_qty: &str,
    qty_step: &str,
    price_tick: &str,
) -> TradingPair {
    TradingPair {
        base: base.to_string(),
        quote: quote.to_string(),
        symbol: format!("{base}{quote}"),
        min_price: dec("0.00000001"),
        price_tick: dec(price_tick),
        min_qty: dec(min_qty),
        qty_step: dec(qty_step),
    }
}

/// A best bid/ask snapshot.
pub fn book(symbol: &str, bid_price: &str, bid_qty: &str, ask_price: &str, ask_qty: &str) -> BookTicker {
    BookTicker {
        symbol: symbol.to_string(),
        bid_price: bid_price.to_string(),
        bid_qty: bid_qty.to_string(),
        ask_price: ask_price.to_string(),
        ask_qty: ask_qty.to_string(),
    }
}

/// A 24h statistics entry.
pub fn day_stat(symbol: &str, quote_volume: &str, volume: &str, count: u64) -> DayStat {
    DayStat {
        symbol: symbol.to_string(),
        volume: volume.to_string(),
        quote_volume: quote_volume.to_string(),
        count,
    }
}

/// A last-price entry.
pub fn price(symbol: &str, value: &str) -> PriceTicker {
    PriceTicker {
        symbol: symbol.to_string(),
        price: value.to_string(),
    }
}

/// A free balance entry.
pub fn balance(asset: &str, free: &str) -> Balance {
    Balance {
        asset: asset.to_string(),
        free: free.to_string(),
        locked: "0".to_string(),
    }
}

/// Live, market-order-capable symbol metadata with permissive filters.
pub fn symbol_info(base: &str, quote: &str) -> SymbolInfo {
    SymbolInfo {
        symbol: format!("{base}{quote}"),
        status: "TRADING".to_string(),
        base_asset: base.to_string(),
        quote_asset: quote.to_string(),
        order_types: vec!["LIMIT".to_string(), "MARKET".to_string()],
        is_spot_trading_allowed: true,
        filters: vec![
            SymbolFilter::Price {
                min_price: "0.00000001".to_string(),
                tick_size: "0.00000001".to_string(),
            },
            SymbolFilter::LotSize {
                min_qty: "0.00000001".to_string(),
                step_size: "0.00000001".to_string(),
            },
        ],
    }
}

/// A validated chain from (symbol, side, target asset) triples.
pub fn chain3(init: &str, legs: &[(&str, Side, &str); 3]) -> TradingChain {
    let legs = legs.map(|(symbol, side, to)| Leg {
        symbol: symbol.to_string(),
        side,
        to: to.to_string(),
    });
    TradingChain::new(init.to_string(), legs).unwrap()
}

/// The USDT -> BTC -> ETH -> USDT fixture: a BUY into BTC at ask 10000,
/// a SELL of BTC into ETH at bid 0.05, a SELL of ETH at bid 520.
pub fn scenario() -> (
    TradingChain,
    HashMap<String, TradingPair>,
    HashMap<String, BookTicker>,
) {
    let chain = chain3(
        "USDT",
        &[
            ("BTCUSDT", Side::Buy, "BTC"),
            ("BTCETH", Side::Sell, "ETH"),
            ("ETHUSDT", Side::Sell, "USDT"),
        ],
    );
    let pairs: HashMap<_, _> = [pair("BTC", "USDT"), pair("BTC", "ETH"), pair("ETH", "USDT")]
        .into_iter()
        .map(|p| (p.symbol.clone(), p))
        .collect();
    let books: HashMap<_, _> = [
        book("BTCUSDT", "9990", "1", "10000", "1"),
        book("BTCETH", "0.05", "10", "0.051", "10"),
        book("ETHUSDT", "520", "1", "521", "1"),
    ]
    .into_iter()
    .map(|b| (b.symbol.clone(), b))
    .collect();
    (chain, pairs, books)
}

/// The scenario fixture evaluated for a 1 USDT initial spend.
pub fn scenario_vtc() -> ValuableTradingChain {
    let (chain, pairs, books) = scenario();
    evaluate_chain(&chain, &pairs, &books, Some(&dec("1")))
        .unwrap()
        .unwrap()
}

/// Scripted response to a market order.
enum ScriptedFill {
    /// Return this fill
    Fill(OrderFill),
    /// Fail the call with this message
    Error(String),
}

/// A scripted [`ExchangeApi`] fake.
///
/// Market data is canned via the `with_*` builders; order fills are played
/// back in submission order and every submitted order is recorded.
#[derive(Default)]
pub struct MockExchange {
    /// Scripted order responses, consumed front to back
    fills: Mutex<VecDeque<ScriptedFill>>,
    /// Every submitted order as (symbol, side, quantity)
    orders: Mutex<Vec<(String, Side, BigDecimal)>>,
    /// Canned account response
    account: Option<AccountInfo>,
    /// Canned symbol metadata
    symbols: Vec<SymbolInfo>,
    /// Canned 24h statistics
    stats: Vec<DayStat>,
    /// Number of times the 24h statistics endpoint was hit
    stats_calls: AtomicUsize,
    /// Canned last prices
    prices: Vec<PriceTicker>,
    /// Canned book snapshots
    books: HashMap<String, BookTicker>,
}

impl MockExchange {
    /// An empty fake; calls fail until canned data is provided.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts a fill for the next submitted order.
    pub fn with_fill(self, symbol: &str, status: &str, spent: &str, received: &str) -> Self {
        self.fills.lock().unwrap().push_back(ScriptedFill::Fill(OrderFill {
            symbol: symbol.to_string(),
            status: status.to_string(),
            spent: dec(spent),
            received: dec(received),
        }));
        self
    }

    /// Scripts a transport failure for the next submitted order.
    pub fn with_error(self, message: &str) -> Self {
        self.fills
            .lock()
            .unwrap()
            .push_back(ScriptedFill::Error(message.to_string()));
        self
    }

    /// Cans the account response.
    pub fn with_account(mut self, can_trade: bool, balances: Vec<Balance>) -> Self {
        self.account = Some(AccountInfo {
            can_trade,
            balances,
        });
        self
    }

    /// Cans the symbol metadata.
    pub fn with_symbols(mut self, symbols: Vec<SymbolInfo>) -> Self {
        self.symbols = symbols;
        self
    }

    /// Cans the 24h statistics.
    pub fn with_stats(mut self, stats: Vec<DayStat>) -> Self {
        self.stats = stats;
        self
    }

    /// Cans the last prices.
    pub fn with_prices(mut self, prices: Vec<PriceTicker>) -> Self {
        self.prices = prices;
        self
    }

    /// Cans the book snapshots.
    pub fn with_books(mut self, books: Vec<BookTicker>) -> Self {
        self.books = books.into_iter().map(|b| (b.symbol.clone(), b)).collect();
        self
    }

    /// Every order submitted so far.
    pub fn orders(&self) -> Vec<(String, Side, BigDecimal)> {
        self.orders.lock().unwrap().clone()
    }

    /// How many times the 24h statistics endpoint was fetched.
    pub fn stats_fetches(&self) -> usize {
        self.stats_calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ExchangeApi for MockExchange {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn account(&self) -> Result<AccountInfo> {
        match &self.account {
            Some(account) => Ok(account.clone()),
            None => bail!("no scripted account"),
        }
    }

    async fn exchange_info(&self) -> Result<Vec<SymbolInfo>> {
        Ok(self.symbols.clone())
    }

    async fn day_stats(&self) -> Result<Vec<DayStat>> {
        self.stats_calls.fetch_add(1, Ordering::AcqRel);
        Ok(self.stats.clone())
    }

    async fn last_prices(&self) -> Result<Vec<PriceTicker>> {
        Ok(self.prices.clone())
    }

    async fn book_ticker(&self, symbol: &str) -> Result<BookTicker> {
        match self.books.get(symbol) {
            Some(book) => Ok(book.clone()),
            None => bail!("no scripted book for {symbol}"),
        }
    }

    async fn market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: &BigDecimal,
    ) -> Result<OrderFill> {
        self.orders
            .lock()
            .unwrap()
            .push((symbol.to_string(), side, quantity.clone()));
        match self.fills.lock().unwrap().pop_front() {
            Some(ScriptedFill::Fill(fill)) => Ok(fill),
            Some(ScriptedFill::Error(message)) => bail!(message),
            None => bail!("no scripted fill for {symbol}"),
        }
    }
}

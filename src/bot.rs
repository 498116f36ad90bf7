//! The engine loop.
//!
//! One cycle runs scan -> rank -> execute to completion before the next
//! begins; cycles are separated by the configured delay, not by market
//! events. The only suspension points are exchange calls. Book snapshots
//! for different chains are fetched concurrently during the scan phase
//! (read-only); order execution is strictly sequential and protected by a
//! reentry guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use eyre::{bail, Result};
use futures::future::join_all;
use itertools::Itertools;
use log::{debug, error, info, warn};

use crate::arb::chain::{ChainSet, TradingChain};
use crate::arb::executor::{CycleOutcome, CyclePhase, CycleState, Sequencer};
use crate::arb::filter::tradable_pairs;
use crate::arb::quote::{evaluate_chain, screening_profit, ValuableTradingChain};
use crate::arb::types::Asset;
use crate::config::Config;
use crate::exchange::types::{parse_decimal, AccountInfo, BookTicker};
use crate::exchange::ExchangeApi;
use crate::notify::SlackNotifier;

/// The engine: an injected exchange capability plus configuration.
pub struct Bot {
    /// Injected exchange capability
    api: Arc<dyn ExchangeApi>,
    /// Engine configuration
    config: Config,
    /// Optional operator notifications
    notifier: Option<SlackNotifier>,
    /// Reentry guard: set while a cycle is executing orders
    executing: AtomicBool,
}

impl Bot {
    /// Creates the bot over an exchange capability.
    #[must_use]
    pub fn new(api: Arc<dyn ExchangeApi>, config: Config) -> Self {
        Self {
            api,
            config,
            notifier: SlackNotifier::from_env(),
            executing: AtomicBool::new(false),
        }
    }

    /// Verifies the start-up preconditions and produces the immutable scan
    /// result every cycle borrows.
    ///
    /// # Errors
    /// * If the API key lacks spot trading permission
    /// * If the account has no free balance at all
    /// * If no configured quote asset is funded
    /// * If zero chains can be enumerated
    pub async fn init(&self) -> Result<ChainSet> {
        info!("Init...");
        self.api.ping().await?;

        info!("Loading assets...");
        let account = self.api.account().await?;
        if !account.can_trade {
            bail!("the API key does not have permission to perform spot trades");
        }
        let free = free_assets(&account)?;
        if free.is_empty() {
            bail!("no available asset in the account");
        }
        info!("Free assets:");
        for (asset, quantity) in &free {
            info!("  {asset}: {quantity}");
        }

        let origins: Vec<Asset> = self
            .config
            .quote_assets
            .iter()
            .map(|a| a.to_uppercase())
            .filter(|a| free.iter().any(|(owned, _)| owned == a))
            .collect();
        if origins.is_empty() {
            bail!("no configured quote asset has a free balance");
        }
        info!("Chosen quote assets: {}", origins.join(", "));

        info!("Analyzing trading pairs...");
        let pairs = tradable_pairs(self.api.as_ref(), &self.config.pair_filter).await?;
        let set = ChainSet::build(pairs, &origins);
        if set.chains.is_empty() {
            bail!("no trading chain is available over the filtered pairs");
        }
        Ok(set)
    }

    /// Runs the scan/rank/execute loop forever, pausing the configured
    /// delay between cycles. Cycle failures are logged and the loop
    /// resumes; only start-up failures stop the engine.
    ///
    /// # Errors
    /// * Never returns except through cancellation of the task
    pub async fn run(&self, set: &ChainSet) -> Result<()> {
        info!("Bot started; do not trade manually on this account while it runs");
        loop {
            let mut state = CycleState::new();
            if let Err(e) = self.cycle(set, &mut state).await {
                error!("Cycle failed: {e}");
                if let Some(notifier) = &self.notifier {
                    if let Err(e) = notifier.send_error(&format!("cycle failed: {e}")).await {
                        warn!("Slack notification failed: {e}");
                    }
                }
            }
            tokio::time::sleep(self.config.order.interval()).await;
        }
    }

    /// One full cycle: scan, rank, optionally execute the best chain.
    async fn cycle(&self, set: &ChainSet, state: &mut CycleState) -> Result<()> {
        state.to(CyclePhase::Scanning)?;
        let promoted = self.screen(set).await?;

        state.to(CyclePhase::Ranking)?;
        let ranked = self.depth_rank(set, &promoted).await?;

        let min_profit = self.config.order.min_profit()?;
        let best = ranked.into_iter().find(|vtc| vtc.profit >= min_profit);
        let Some(best) = best else {
            info!("No chain clears the profit threshold this cycle");
            state.to(CyclePhase::Done)?;
            state.to(CyclePhase::Idle)?;
            return Ok(());
        };
        info!("Best chain: {best}");

        if !self.config.order.enable {
            info!("Order placement disabled; detection only");
            state.to(CyclePhase::Done)?;
            state.to(CyclePhase::Idle)?;
            return Ok(());
        }

        self.execute_best(state, &best).await?;
        state.to(CyclePhase::Idle)?;
        Ok(())
    }

    /// Screening pass: rank all chains by flat last-price profit and keep
    /// the configured top slice with positive profit.
    async fn screen<'a>(&self, set: &'a ChainSet) -> Result<Vec<&'a TradingChain>> {
        let prices = self.api.last_prices().await?;
        let prices: HashMap<String, BigDecimal> = prices
            .into_iter()
            .filter_map(|t| match parse_decimal(&t.price) {
                Ok(price) => Some((t.symbol, price)),
                Err(e) => {
                    debug!("Skipping unparsable price for {}: {e}", t.symbol);
                    None
                }
            })
            .collect();

        let mut screened: Vec<(&TradingChain, BigDecimal)> = set
            .chains
            .iter()
            .filter_map(|chain| {
                screening_profit(chain, &prices)
                    .filter(|profit| profit > &BigDecimal::zero())
                    .map(|profit| (chain, profit))
            })
            .collect();
        screened.sort_by(|a, b| b.1.cmp(&a.1));
        debug!(
            "{} of {} chains screen profitable",
            screened.len(),
            set.chains.len()
        );
        Ok(screened
            .into_iter()
            .take(self.config.order.promote_top)
            .map(|(chain, _)| chain)
            .collect())
    }

    /// Depth-aware pass: fetch live books for the promoted chains
    /// concurrently and evaluate each against them.
    async fn depth_rank(
        &self,
        set: &ChainSet,
        promoted: &[&TradingChain],
    ) -> Result<Vec<ValuableTradingChain>> {
        let symbols: Vec<&str> = promoted
            .iter()
            .flat_map(|chain| chain.legs.iter().map(|leg| leg.symbol.as_str()))
            .unique()
            .collect();
        // Read-only fetches, safe to issue concurrently
        let fetched = join_all(symbols.iter().map(|s| self.api.book_ticker(s))).await;
        let mut books: HashMap<String, BookTicker> = HashMap::with_capacity(symbols.len());
        for (symbol, result) in symbols.iter().zip(fetched) {
            match result {
                Ok(book) => {
                    books.insert((*symbol).to_string(), book);
                }
                Err(e) => warn!("No book for {symbol} this cycle: {e}"),
            }
        }

        let mut ranked = Vec::new();
        for chain in promoted {
            if let Some(vtc) = evaluate_chain(chain, &set.pairs, &books, None)? {
                ranked.push(vtc);
            }
        }
        ranked.sort_by(|a, b| b.profit.cmp(&a.profit));
        Ok(ranked)
    }

    /// Sizes and executes the chosen chain under the reentry guard.
    async fn execute_best(&self, state: &mut CycleState, best: &ValuableTradingChain) -> Result<()> {
        if self
            .executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // One cycle at a time is an explicit invariant, not an accident
            // of sequential code
            bail!("a cycle is already executing orders");
        }
        let result = self.execute_guarded(state, best).await;
        self.executing.store(false, Ordering::Release);
        result
    }

    /// The guarded part of execution: balance-derived sizing plus the
    /// sequencer call.
    async fn execute_guarded(&self, state: &mut CycleState, best: &ValuableTradingChain) -> Result<()> {
        let account = self.api.account().await?;
        let free = free_balance(&account, &best.chain.init_asset)?;
        let mut init = free * self.config.order.investment_ratio()?;
        if self.config.order.use_best_init_quantity && &init > best.init_spend() {
            init = best.init_spend().clone();
        }
        debug!(
            "Investing {init} {} into {:?}",
            best.chain.init_asset, best.chain
        );

        let outcome = Sequencer::new(self.api.as_ref())
            .execute(state, best, &init)
            .await?;
        match &outcome {
            CycleOutcome::Completed { .. } => {
                info!("{outcome}");
                if let Some(notifier) = &self.notifier {
                    if let Err(e) = notifier.send(&outcome.to_string()).await {
                        warn!("Slack notification failed: {e}");
                    }
                }
            }
            CycleOutcome::Aborted { .. } => {
                error!("{outcome}");
                if let Some(notifier) = &self.notifier {
                    if let Err(e) = notifier.send_error(&outcome.to_string()).await {
                        warn!("Slack notification failed: {e}");
                    }
                }
            }
        }
        Ok(())
    }

    /// One detection pass without orders; returns the ranked chains.
    ///
    /// # Errors
    /// * If a market-data fetch fails
    pub async fn scan_once(&self, set: &ChainSet) -> Result<Vec<ValuableTradingChain>> {
        let mut state = CycleState::new();
        state.to(CyclePhase::Scanning)?;
        let promoted = self.screen(set).await?;
        state.to(CyclePhase::Ranking)?;
        let ranked = self.depth_rank(set, &promoted).await?;
        state.to(CyclePhase::Done)?;
        state.to(CyclePhase::Idle)?;
        Ok(ranked)
    }
}

/// All assets with a positive free balance.
fn free_assets(account: &AccountInfo) -> Result<Vec<(Asset, BigDecimal)>> {
    let mut assets = Vec::new();
    for balance in &account.balances {
        let free = parse_decimal(&balance.free)?;
        if free > BigDecimal::zero() {
            assets.push((balance.asset.to_uppercase(), free));
        }
    }
    Ok(assets)
}

/// The free balance of one asset.
fn free_balance(account: &AccountInfo, asset: &str) -> Result<BigDecimal> {
    for balance in &account.balances {
        if balance.asset.eq_ignore_ascii_case(asset) {
            return parse_decimal(&balance.free);
        }
    }
    bail!("no balance entry for {asset}");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::test_helpers::{balance, book, dec, price, symbol_info, MockExchange};
    use crate::config::OrderConfig;

    fn config(order: OrderConfig) -> Config {
        serde_json::from_str::<Config>(r#"{"quoteAssets": ["USDT"]}"#)
            .map(|mut c| {
                c.order = order;
                c
            })
            .unwrap()
    }

    /// BTC/ETH/USDT universe where the USDT -> BTC -> ETH -> USDT triangle
    /// clears 4% against both last prices and deep books.
    fn profitable_market() -> MockExchange {
        MockExchange::new()
            .with_account(true, vec![balance("USDT", "1000")])
            .with_symbols(vec![
                symbol_info("BTC", "USDT"),
                symbol_info("ETH", "BTC"),
                symbol_info("ETH", "USDT"),
            ])
            .with_prices(vec![
                price("BTCUSDT", "10000"),
                price("ETHBTC", "0.05"),
                price("ETHUSDT", "520"),
            ])
            .with_books(vec![
                book("BTCUSDT", "9999", "1000", "10000", "1000"),
                book("ETHBTC", "0.049", "100000", "0.05", "100000"),
                book("ETHUSDT", "520", "100000", "521", "100000"),
            ])
    }

    #[tokio::test]
    async fn test_init_requires_trade_permission() {
        let api = Arc::new(MockExchange::new().with_account(false, vec![balance("USDT", "1")]));
        let bot = Bot::new(api, config(OrderConfig::default()));
        let err = bot.init().await.unwrap_err();
        assert!(err.to_string().contains("permission"));
    }

    #[tokio::test]
    async fn test_init_requires_funded_quote_asset() {
        // Funded, but not in any configured quote asset
        let api = Arc::new(
            MockExchange::new()
                .with_account(true, vec![balance("DOGE", "100")])
                .with_symbols(vec![symbol_info("BTC", "USDT")]),
        );
        let bot = Bot::new(api, config(OrderConfig::default()));
        let err = bot.init().await.unwrap_err();
        assert!(err.to_string().contains("quote asset"));
    }

    #[tokio::test]
    async fn test_init_requires_chains() {
        // USDT funded but only one pair touches it: nothing closes
        let api = Arc::new(
            MockExchange::new()
                .with_account(true, vec![balance("USDT", "1000")])
                .with_symbols(vec![symbol_info("BTC", "USDT")]),
        );
        let bot = Bot::new(api, config(OrderConfig::default()));
        let err = bot.init().await.unwrap_err();
        assert!(err.to_string().contains("no trading chain"));
    }

    #[tokio::test]
    async fn test_scan_finds_and_ranks_opportunity() {
        let api = Arc::new(profitable_market());
        let bot = Bot::new(api, config(OrderConfig::default()));
        let set = bot.init().await.unwrap();

        let ranked = bot.scan_once(&set).await.unwrap();
        assert!(!ranked.is_empty());
        let best = &ranked[0];
        assert_eq!(best.chain.init_asset, "USDT");
        assert_eq!(best.profit, dec("0.04"));
    }

    #[tokio::test]
    async fn test_cycle_executes_best_chain_with_balance_sizing() {
        let api = Arc::new(
            profitable_market()
                .with_fill("BTCUSDT", "FILLED", "500", "0.05")
                .with_fill("ETHBTC", "FILLED", "0.05", "1")
                .with_fill("ETHUSDT", "FILLED", "1", "520"),
        );
        let order = OrderConfig {
            enable: true,
            ..OrderConfig::default()
        };
        let bot = Bot::new(Arc::clone(&api) as Arc<dyn ExchangeApi>, config(order));
        let set = bot.init().await.unwrap();

        let mut state = CycleState::new();
        bot.cycle(&set, &mut state).await.unwrap();

        let orders = api.orders();
        assert_eq!(orders.len(), 3);
        // 1000 USDT free at the default 0.5 investment ratio
        assert_eq!(orders[0].2, dec("500"));
        assert_eq!(orders[0].0, "BTCUSDT");
        assert_eq!(state.phase(), CyclePhase::Idle);
    }

    #[tokio::test]
    async fn test_cycle_without_opportunity_places_no_order() {
        // Flat prices: every triangle multiplies out to exactly 1
        let api = Arc::new(
            MockExchange::new()
                .with_account(true, vec![balance("USDT", "1000")])
                .with_symbols(vec![
                    symbol_info("BTC", "USDT"),
                    symbol_info("ETH", "BTC"),
                    symbol_info("ETH", "USDT"),
                ])
                .with_prices(vec![
                    price("BTCUSDT", "10000"),
                    price("ETHBTC", "0.05"),
                    price("ETHUSDT", "500"),
                ]),
        );
        let order = OrderConfig {
            enable: true,
            ..OrderConfig::default()
        };
        let bot = Bot::new(Arc::clone(&api) as Arc<dyn ExchangeApi>, config(order));
        let set = bot.init().await.unwrap();

        let mut state = CycleState::new();
        bot.cycle(&set, &mut state).await.unwrap();
        assert!(api.orders().is_empty());
        assert_eq!(state.phase(), CyclePhase::Idle);
    }

    #[tokio::test]
    async fn test_reentry_guard_refuses_concurrent_cycle() {
        let api = Arc::new(profitable_market());
        let order = OrderConfig {
            enable: true,
            ..OrderConfig::default()
        };
        let bot = Bot::new(Arc::clone(&api) as Arc<dyn ExchangeApi>, config(order));
        let set = bot.init().await.unwrap();

        // Another cycle is mid-execution
        bot.executing.store(true, Ordering::Release);
        let mut state = CycleState::new();
        let err = bot.cycle(&set, &mut state).await.unwrap_err();
        assert!(err.to_string().contains("already executing"));
        assert!(api.orders().is_empty());
    }

    #[tokio::test]
    async fn test_partial_fill_aborts_cycle_but_not_engine() {
        let api = Arc::new(
            profitable_market().with_fill("BTCUSDT", "PARTIALLY_FILLED", "200", "0.02"),
        );
        let order = OrderConfig {
            enable: true,
            ..OrderConfig::default()
        };
        let bot = Bot::new(Arc::clone(&api) as Arc<dyn ExchangeApi>, config(order));
        let set = bot.init().await.unwrap();

        let mut state = CycleState::new();
        // The abort is reported through the outcome, not as an error
        bot.cycle(&set, &mut state).await.unwrap();
        assert_eq!(api.orders().len(), 1);
        assert_eq!(state.phase(), CyclePhase::Idle);
    }
}

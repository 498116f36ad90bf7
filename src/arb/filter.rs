//! Market metadata filter.
//!
//! Narrows the exchange's full pair list to tradable, market-order-capable,
//! liquidity-qualified pairs. The 24h statistics are fetched at most once
//! per filtering pass and a pair with no statistics entry fails the filter.

use std::collections::HashMap;

use eyre::Result;
use log::{debug, info, warn};

use super::types::TradingPair;
use crate::config::PairFilterConfig;
use crate::exchange::types::{DayStat, SymbolInfo};
use crate::exchange::ExchangeApi;

/// Fetches metadata (and, when thresholds are configured, 24h statistics)
/// and returns the surviving pairs.
///
/// # Errors
/// * If a metadata or statistics fetch fails
pub async fn tradable_pairs(
    api: &dyn ExchangeApi,
    config: &PairFilterConfig,
) -> Result<Vec<TradingPair>> {
    let symbols = api.exchange_info().await?;
    // One statistics fetch for the whole pass, never per pair
    let stats = if config.needs_stats() {
        let stats = api.day_stats().await?;
        Some(
            stats
                .into_iter()
                .map(|s| (s.symbol.clone(), s))
                .collect::<HashMap<_, _>>(),
        )
    } else {
        None
    };
    let pairs = filter_pairs(&symbols, stats.as_ref(), config);
    info!(
        "Metadata filter kept {} of {} pairs",
        pairs.len(),
        symbols.len()
    );
    Ok(pairs)
}

/// Applies the filter policy to already-fetched metadata.
///
/// Policy, in order: drop pairs not in TRADING status, without spot
/// market-order capability, or blacklisted; then drop pairs below any
/// configured volume/trade-count threshold. Absent statistics exclude the
/// pair rather than passing it by default.
#[must_use]
pub fn filter_pairs(
    symbols: &[SymbolInfo],
    stats: Option<&HashMap<String, DayStat>>,
    config: &PairFilterConfig,
) -> Vec<TradingPair> {
    symbols
        .iter()
        .filter(|info| is_tradable(info, config))
        .filter(|info| stats.map_or(true, |stats| clears_volume_limits(info, stats, config)))
        .filter_map(|info| match TradingPair::from_symbol_info(info) {
            Ok(pair) => Some(pair),
            Err(e) => {
                warn!("Skipping {}: {e}", info.symbol);
                None
            }
        })
        .collect()
}

/// Status, capability and blacklist checks.
fn is_tradable(info: &SymbolInfo, config: &PairFilterConfig) -> bool {
    info.status == "TRADING"
        && info.is_spot_trading_allowed
        && info.order_types.iter().any(|t| t == "MARKET")
        && !config.black_list.iter().any(|s| s == &info.symbol)
}

/// Volume and trade-count thresholds against the cached statistics map.
fn clears_volume_limits(
    info: &SymbolInfo,
    stats: &HashMap<String, DayStat>,
    config: &PairFilterConfig,
) -> bool {
    let Some(stat) = stats.get(&info.symbol) else {
        debug!("{} has no 24h statistics, excluded", info.symbol);
        return false;
    };
    let quote_volume = stat.quote_volume.parse::<f64>().unwrap_or(0.0);
    let volume = stat.volume.parse::<f64>().unwrap_or(0.0);
    quote_volume >= config.quote_volume_limit
        && volume >= config.volume_limit
        && stat.count >= config.trade_count_limit
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::test_helpers::{day_stat, symbol_info, MockExchange};

    fn thresholds() -> PairFilterConfig {
        PairFilterConfig {
            enable: true,
            black_list: vec![],
            quote_volume_limit: 1000.0,
            volume_limit: 10.0,
            trade_count_limit: 100,
        }
    }

    #[test]
    fn test_drops_non_trading_and_non_market() {
        let mut halted = symbol_info("ETH", "BTC");
        halted.status = "HALT".to_string();
        let mut limit_only = symbol_info("LTC", "BTC");
        limit_only.order_types = vec!["LIMIT".to_string()];
        let mut no_spot = symbol_info("XRP", "BTC");
        no_spot.is_spot_trading_allowed = false;
        let good = symbol_info("BNB", "BTC");

        let pairs = filter_pairs(
            &[halted, limit_only, no_spot, good],
            None,
            &PairFilterConfig::default(),
        );
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].symbol, "BNBBTC");
    }

    #[test]
    fn test_drops_blacklisted() {
        let config = PairFilterConfig {
            black_list: vec!["ETHBTC".to_string()],
            ..PairFilterConfig::default()
        };
        let pairs = filter_pairs(
            &[symbol_info("ETH", "BTC"), symbol_info("BNB", "BTC")],
            None,
            &config,
        );
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].symbol, "BNBBTC");
    }

    #[test]
    fn test_volume_thresholds() {
        let stats: HashMap<_, _> = [
            ("ETHBTC".to_string(), day_stat("ETHBTC", "5000", "50", 500)),
            ("LTCBTC".to_string(), day_stat("LTCBTC", "500", "50", 500)),
            ("XRPBTC".to_string(), day_stat("XRPBTC", "5000", "5", 500)),
            ("BNBBTC".to_string(), day_stat("BNBBTC", "5000", "50", 50)),
        ]
        .into_iter()
        .collect();

        let pairs = filter_pairs(
            &[
                symbol_info("ETH", "BTC"),
                symbol_info("LTC", "BTC"), // quote volume too low
                symbol_info("XRP", "BTC"), // base volume too low
                symbol_info("BNB", "BTC"), // trade count too low
            ],
            Some(&stats),
            &thresholds(),
        );
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].symbol, "ETHBTC");
    }

    #[test]
    fn test_missing_stats_entry_fails_closed() {
        let stats: HashMap<String, DayStat> = HashMap::new();
        let pairs = filter_pairs(&[symbol_info("ETH", "BTC")], Some(&stats), &thresholds());
        assert!(pairs.is_empty());
    }

    #[tokio::test]
    async fn test_stats_fetched_once_for_whole_pass() {
        let api = MockExchange::new()
            .with_symbols(vec![
                symbol_info("ETH", "BTC"),
                symbol_info("LTC", "BTC"),
                symbol_info("XRP", "BTC"),
            ])
            .with_stats(vec![
                day_stat("ETHBTC", "5000", "50", 500),
                day_stat("LTCBTC", "500", "50", 500), // quote volume too low
                // XRPBTC has no statistics entry at all
            ]);

        let pairs = tradable_pairs(&api, &thresholds()).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].symbol, "ETHBTC");
        // One statistics fetch for three candidate pairs
        assert_eq!(api.stats_fetches(), 1);
    }

    #[tokio::test]
    async fn test_stats_not_fetched_when_thresholds_disabled() {
        let api = MockExchange::new().with_symbols(vec![symbol_info("ETH", "BTC")]);

        let pairs = tradable_pairs(&api, &PairFilterConfig::default())
            .await
            .unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(api.stats_fetches(), 0);
    }
}

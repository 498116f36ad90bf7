//! Wire types for the exchange REST API.
//!
//! Prices and quantities arrive as decimal strings and are parsed into
//! `BigDecimal` at the point of use so a malformed field surfaces as an
//! error there instead of silently losing precision.

use bigdecimal::BigDecimal;
use eyre::Result;
use serde::Deserialize;

/// Parses a decimal string field from a payload.
///
/// # Errors
/// * If the string is not a valid decimal number
pub fn parse_decimal(raw: &str) -> Result<BigDecimal> {
    raw.parse::<BigDecimal>()
        .map_err(|e| eyre::eyre!("bad decimal field {raw:?}: {e}"))
}

/// One symbol's metadata from the exchange-info endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolInfo {
    /// Symbol string, base asset concatenated with quote asset
    pub symbol: String,
    /// Trading status, `TRADING` when live
    pub status: String,
    /// Base asset of the pair
    pub base_asset: String,
    /// Quote asset of the pair
    pub quote_asset: String,
    /// Order types the symbol accepts (`MARKET`, `LIMIT`, ...)
    #[serde(default)]
    pub order_types: Vec<String>,
    /// Whether the symbol can be traded on the spot market
    #[serde(default = "default_true")]
    pub is_spot_trading_allowed: bool,
    /// Price/lot constraints
    #[serde(default)]
    pub filters: Vec<SymbolFilter>,
}

/// Serde default helper for flags that are absent on older payloads.
fn default_true() -> bool {
    true
}

/// A single entry of a symbol's filter list.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "filterType")]
pub enum SymbolFilter {
    /// Price bounds and tick size
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    Price {
        /// Minimum order price
        min_price: String,
        /// Price increment
        tick_size: String,
    },
    /// Quantity bounds and step size
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        /// Minimum order quantity
        min_qty: String,
        /// Quantity increment
        step_size: String,
    },
    /// Filter types the engine does not use
    #[serde(other)]
    Other,
}

/// 24-hour rolling statistics for one symbol.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStat {
    /// Symbol string
    pub symbol: String,
    /// 24h volume in the base asset
    pub volume: String,
    /// 24h volume in the quote asset
    pub quote_volume: String,
    /// 24h number of trades
    pub count: u64,
}

/// Best bid/ask price and size for one symbol.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookTicker {
    /// Symbol string
    pub symbol: String,
    /// Best bid price
    pub bid_price: String,
    /// Size available at the best bid
    pub bid_qty: String,
    /// Best ask price
    pub ask_price: String,
    /// Size available at the best ask
    pub ask_qty: String,
}

/// Last traded price for one symbol.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTicker {
    /// Symbol string
    pub symbol: String,
    /// Last traded price
    pub price: String,
}

/// One asset balance in the account.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    /// Asset symbol
    pub asset: String,
    /// Freely tradable quantity
    pub free: String,
    /// Quantity locked in open orders
    pub locked: String,
}

/// Account metadata and balances.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    /// Whether the API key is allowed to place spot orders
    pub can_trade: bool,
    /// Per-asset balances
    #[serde(default)]
    pub balances: Vec<Balance>,
}

/// Raw acknowledgement of a submitted order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    /// Symbol the order was placed on
    pub symbol: String,
    /// Order status (`FILLED`, `PARTIALLY_FILLED`, ...)
    pub status: String,
    /// Executed quantity in the base asset
    pub executed_qty: String,
    /// Executed quantity in the quote asset
    pub cummulative_quote_qty: String,
}

/// Realized outcome of one submitted order, normalized to the trade side:
/// `spent` is in the asset the order paid with, `received` in the asset it
/// acquired.
#[derive(Debug, Clone)]
pub struct OrderFill {
    /// Symbol the order was placed on
    pub symbol: String,
    /// Order status as reported by the exchange
    pub status: String,
    /// Realized quantity spent
    pub spent: BigDecimal,
    /// Realized quantity received
    pub received: BigDecimal,
}

impl OrderFill {
    /// Whether the order was completely filled.
    #[must_use]
    pub fn filled(&self) -> bool {
        self.status == "FILLED"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_info_with_unknown_filters() {
        let info: SymbolInfo = serde_json::from_str(
            r#"{
                "symbol": "ETHBTC",
                "status": "TRADING",
                "baseAsset": "ETH",
                "quoteAsset": "BTC",
                "orderTypes": ["LIMIT", "MARKET"],
                "isSpotTradingAllowed": true,
                "filters": [
                    {"filterType": "PRICE_FILTER", "minPrice": "0.00000100", "maxPrice": "100000", "tickSize": "0.00000100"},
                    {"filterType": "PERCENT_PRICE", "multiplierUp": "5", "multiplierDown": "0.2"},
                    {"filterType": "LOT_SIZE", "minQty": "0.00010000", "maxQty": "9000", "stepSize": "0.00010000"}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(info.base_asset, "ETH");
        assert_eq!(info.filters.len(), 3);
        assert!(matches!(info.filters[0], SymbolFilter::Price { .. }));
        assert!(matches!(info.filters[1], SymbolFilter::Other));
        assert!(matches!(info.filters[2], SymbolFilter::LotSize { .. }));
    }

    #[test]
    fn test_order_ack_shape() {
        let ack: OrderAck = serde_json::from_str(
            r#"{
                "symbol": "BTCUSDT",
                "orderId": 12345,
                "status": "FILLED",
                "executedQty": "0.00100000",
                "cummulativeQuoteQty": "27.31000000"
            }"#,
        )
        .unwrap();

        assert_eq!(ack.status, "FILLED");
        assert_eq!(
            parse_decimal(&ack.executed_qty).unwrap(),
            "0.001".parse::<BigDecimal>().unwrap()
        );
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(parse_decimal("not-a-number").is_err());
    }
}

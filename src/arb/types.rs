//! Core asset/pair types and the numeric flooring policy.

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use derive_more::Display;
use eyre::{bail, Result};

use crate::exchange::types::{parse_decimal, SymbolFilter, SymbolInfo};

/// An exchange-recognized currency symbol, case-normalized to uppercase.
pub type Asset = String;

/// Scale every leg's receive quantity is floored to, matching the
/// exchange's own 8-decimal quantity precision.
pub const RECEIVE_SCALE: i64 = 8;

/// Direction of a trade on a pair.
///
/// The side determines which asset is spent and which is received: a BUY
/// spends the quote asset to acquire the base asset, a SELL spends the base
/// asset to acquire the quote asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Side {
    /// Spend quote, receive base
    #[display("BUY")]
    Buy,
    /// Spend base, receive quote
    #[display("SELL")]
    Sell,
}

/// A tradable pair with the constraints the cascader and sequencer honor.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingPair {
    /// Base asset
    pub base: Asset,
    /// Quote asset
    pub quote: Asset,
    /// Symbol string, base concatenated with quote
    pub symbol: String,
    /// Minimum order price
    pub min_price: BigDecimal,
    /// Price increment
    pub price_tick: BigDecimal,
    /// Minimum order quantity in the base asset
    pub min_qty: BigDecimal,
    /// Quantity increment in the base asset
    pub qty_step: BigDecimal,
}

impl TradingPair {
    /// Builds a pair from exchange symbol metadata.
    ///
    /// # Errors
    /// * If the price or lot filter is missing
    /// * If a filter field is not a valid decimal
    pub fn from_symbol_info(info: &SymbolInfo) -> Result<Self> {
        let mut price = None;
        let mut lot = None;
        for filter in &info.filters {
            match filter {
                SymbolFilter::Price {
                    min_price,
                    tick_size,
                } => price = Some((parse_decimal(min_price)?, parse_decimal(tick_size)?)),
                SymbolFilter::LotSize { min_qty, step_size } => {
                    lot = Some((parse_decimal(min_qty)?, parse_decimal(step_size)?));
                }
                SymbolFilter::Other => {}
            }
        }
        let Some((min_price, price_tick)) = price else {
            bail!("{} has no price filter", info.symbol);
        };
        let Some((min_qty, qty_step)) = lot else {
            bail!("{} has no lot filter", info.symbol);
        };
        Ok(Self {
            base: info.base_asset.to_uppercase(),
            quote: info.quote_asset.to_uppercase(),
            symbol: info.symbol.to_uppercase(),
            min_price,
            price_tick,
            min_qty,
            qty_step,
        })
    }

    /// The asset spent when trading this pair on the given side.
    #[must_use]
    pub fn spend_asset(&self, side: Side) -> &Asset {
        match side {
            Side::Buy => &self.quote,
            Side::Sell => &self.base,
        }
    }

    /// The asset received when trading this pair on the given side.
    #[must_use]
    pub fn receive_asset(&self, side: Side) -> &Asset {
        match side {
            Side::Buy => &self.base,
            Side::Sell => &self.quote,
        }
    }

    /// The side required to spend `asset` through this pair, if `asset`
    /// touches the pair at all.
    #[must_use]
    pub fn side_spending(&self, asset: &str) -> Option<Side> {
        if asset == self.base {
            Some(Side::Sell)
        } else if asset == self.quote {
            Some(Side::Buy)
        } else {
            None
        }
    }
}

/// The symbol traded when spending `spend` to acquire `receive` on `side`.
///
/// Mirrors the exchange's base+quote symbol derivation: a BUY spends the
/// quote asset, so the symbol is receive+spend; a SELL spends the base
/// asset, so the symbol is spend+receive.
#[must_use]
pub fn symbol_for(spend: &str, receive: &str, side: Side) -> String {
    match side {
        Side::Buy => format!("{receive}{spend}"),
        Side::Sell => format!("{spend}{receive}"),
    }
}

/// Floors a quantity down to a multiple of `step`.
///
/// Never rounds up; a zero or negative step leaves the quantity unchanged.
#[must_use]
pub fn floor_to_step(quantity: &BigDecimal, step: &BigDecimal) -> BigDecimal {
    if step <= &BigDecimal::zero() {
        return quantity.clone();
    }
    let steps = (quantity / step).with_scale_round(0, RoundingMode::Down);
    steps * step
}

/// Floors a quantity down to `scale` decimal places.
#[must_use]
pub fn floor_to_scale(quantity: &BigDecimal, scale: i64) -> BigDecimal {
    quantity.with_scale_round(scale, RoundingMode::Down)
}

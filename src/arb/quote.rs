//! Quantity cascading.
//!
//! Two computation modes used at different scan stages. Screening mode
//! pushes one unit of the origin asset through a flat last-price table to
//! rank chains cheaply. Depth-aware mode recomputes the top-ranked chains
//! against live best bid/ask price and size, honoring per-pair rounding and
//! minimum-order constraints, and is the number that decides execution.

use std::collections::HashMap;
use std::fmt::{self, Display};

use bigdecimal::{BigDecimal, One, ToPrimitive, Zero};
use eyre::{bail, Result};
use log::debug;

use super::chain::TradingChain;
use super::types::{floor_to_scale, floor_to_step, Side, TradingPair, RECEIVE_SCALE};
use crate::exchange::types::{parse_decimal, BookTicker};

/// Transient view of one leg's tradable liquidity, normalized to the trade
/// side: everything is expressed in the asset the leg spends and the asset
/// it receives.
#[derive(Debug, Clone)]
pub struct LegQuote {
    /// Symbol of the pair this leg trades
    pub symbol: String,
    /// Side of the trade
    pub side: Side,
    /// How much of the spend asset the best price level absorbs
    pub spend_depth: BigDecimal,
    /// How much of the receive asset the best price level yields
    pub receive_depth: BigDecimal,
    /// Receive-per-spend exchange rate
    pub rate: BigDecimal,
    /// Minimum order size in the spend asset
    pub min_spend: BigDecimal,
    /// Minimum order size in the receive asset
    pub min_receive: BigDecimal,
    /// Increment the spend quantity must be floored to
    pub spend_step: BigDecimal,
}

impl LegQuote {
    /// Derives a leg quote from a pair's best bid/ask.
    ///
    /// A BUY fills at the best ask `P` with size `Q`: it can spend up to
    /// `Q*P` quote, receive up to `Q` base, at rate `1/P`. A SELL fills at
    /// the best bid: it can spend up to `Q` base, receive up to `Q*P`
    /// quote, at rate `P`.
    ///
    /// Returns `None` when the needed book side has no liquidity (zero or
    /// absent price/size), which excludes the chain before the cascade.
    ///
    /// # Errors
    /// * If a book field is not a valid decimal
    pub fn new(pair: &TradingPair, side: Side, book: &BookTicker) -> Result<Option<Self>> {
        let (price, size) = match side {
            Side::Buy => (parse_decimal(&book.ask_price)?, parse_decimal(&book.ask_qty)?),
            Side::Sell => (parse_decimal(&book.bid_price)?, parse_decimal(&book.bid_qty)?),
        };
        if price <= BigDecimal::zero() || size <= BigDecimal::zero() {
            debug!("{} has no {side} liquidity", pair.symbol);
            return Ok(None);
        }
        let notional = &size * &price;
        let min_notional = &pair.min_qty * &price;
        let quote = match side {
            Side::Buy => Self {
                symbol: pair.symbol.clone(),
                side,
                spend_depth: notional,
                receive_depth: size,
                rate: BigDecimal::one() / &price,
                min_spend: min_notional,
                min_receive: pair.min_qty.clone(),
                spend_step: pair.price_tick.clone(),
            },
            Side::Sell => Self {
                symbol: pair.symbol.clone(),
                side,
                spend_depth: size,
                receive_depth: notional,
                rate: price,
                min_spend: pair.min_qty.clone(),
                min_receive: min_notional,
                spend_step: pair.qty_step.clone(),
            },
        };
        Ok(Some(quote))
    }

    /// Scales both depths proportionally.
    fn scale_depths(&mut self, factor: &BigDecimal) {
        self.spend_depth = &self.spend_depth * factor;
        self.receive_depth = &self.receive_depth * factor;
    }
}

/// Propagates depth constraints pairwise, leg1<->leg2 then leg2<->leg3.
///
/// Whichever of the upstream receive-depth and the downstream spend-depth
/// is larger gets its leg shrunk proportionally to match the other. Two
/// passes are an approximation of the true maximum jointly feasible
/// quantity, not a fixed point; the two-pass semantics are kept as-is.
pub fn cascade_depths(legs: &mut [LegQuote; 3]) {
    balance_adjacent(legs, 0);
    balance_adjacent(legs, 1);
}

/// Shrinks whichever side of one leg boundary overshoots the other.
fn balance_adjacent(legs: &mut [LegQuote; 3], upstream: usize) {
    let out = legs[upstream].receive_depth.clone();
    let into = legs[upstream + 1].spend_depth.clone();
    if out > into {
        let factor = into / &out;
        legs[upstream].scale_depths(&factor);
    } else if out < into {
        let factor = out / &into;
        legs[upstream + 1].scale_depths(&factor);
    }
}

/// Realized spend/receive quantities of one leg in a depth-aware pass.
#[derive(Debug, Clone)]
pub struct LegFlow {
    /// Quantity spent, floored to the leg's spend step
    pub spend: BigDecimal,
    /// Quantity received, floored to 8 decimals
    pub receive: BigDecimal,
}

/// A chain priced against a live book snapshot: per-leg quotes, per-leg
/// quantities and the resulting profit ratio. Recomputed every cycle and
/// never persisted across cycles.
#[derive(Debug, Clone)]
pub struct ValuableTradingChain {
    /// The underlying topological chain
    pub chain: TradingChain,
    /// Per-leg liquidity quotes after the cascade
    pub legs: [LegQuote; 3],
    /// Per-leg realized quantities
    pub flows: [LegFlow; 3],
    /// Profit ratio `(final - initial) / initial`
    pub profit: BigDecimal,
}

impl ValuableTradingChain {
    /// The quantity the first leg spends.
    #[must_use]
    pub fn init_spend(&self) -> &BigDecimal {
        &self.flows[0].spend
    }

    /// The quantity the last leg returns in the origin asset.
    #[must_use]
    pub fn final_receive(&self) -> &BigDecimal {
        &self.flows[2].receive
    }
}

impl Display for ValuableTradingChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let percent = (&self.profit * BigDecimal::from(100))
            .to_f64()
            .unwrap_or(f64::NAN);
        write!(
            f,
            "{} {} -> {} {} -> {} {} -> {} {} profit: {percent:.4}%",
            self.flows[0].spend,
            self.chain.init_asset,
            self.flows[0].receive,
            self.chain.legs[0].to,
            self.flows[1].receive,
            self.chain.legs[1].to,
            self.flows[2].receive,
            self.chain.init_asset,
        )
    }
}

/// Screening-mode profit: one unit of the origin asset through the flat
/// price table, multiplying on SELL legs and dividing on BUY legs.
///
/// Returns `None` when a leg has no (positive) price. Depth and minimums
/// are ignored; the result only ranks chains for the depth-aware pass.
#[must_use]
pub fn screening_profit(
    chain: &TradingChain,
    prices: &HashMap<String, BigDecimal>,
) -> Option<BigDecimal> {
    let mut quantity = BigDecimal::one();
    for leg in &chain.legs {
        let price = prices.get(&leg.symbol)?;
        if price <= &BigDecimal::zero() {
            return None;
        }
        quantity = match leg.side {
            Side::Sell => quantity * price,
            Side::Buy => quantity / price,
        };
    }
    Some(quantity - BigDecimal::one())
}

/// Depth-aware evaluation of one chain against a book snapshot.
///
/// `init_quantity` bounds the first leg's spend; `None` uses the full
/// cascaded depth. Returns `None` when the chain is infeasible: missing or
/// one-sided books, or any leg falling below its pair's minimum after
/// flooring (no partial credit).
///
/// # Errors
/// * If a chain leg references a pair outside the filtered universe
/// * If a book field is not a valid decimal
pub fn evaluate_chain(
    chain: &TradingChain,
    pairs: &HashMap<String, TradingPair>,
    books: &HashMap<String, BookTicker>,
    init_quantity: Option<&BigDecimal>,
) -> Result<Option<ValuableTradingChain>> {
    let mut quotes = Vec::with_capacity(3);
    for leg in &chain.legs {
        let Some(pair) = pairs.get(&leg.symbol) else {
            bail!("chain {chain:?} references unknown pair {}", leg.symbol);
        };
        let Some(book) = books.get(&leg.symbol) else {
            // No snapshot for this symbol in the current cycle
            return Ok(None);
        };
        match LegQuote::new(pair, leg.side, book)? {
            Some(quote) => quotes.push(quote),
            None => return Ok(None),
        }
    }
    let Ok(mut legs): Result<[LegQuote; 3], _> = quotes.try_into() else {
        bail!("chain {chain:?} did not produce three leg quotes");
    };
    cascade_depths(&mut legs);

    let mut incoming = init_quantity
        .map_or_else(|| legs[0].spend_depth.clone(), Clone::clone);
    let mut flows = Vec::with_capacity(3);
    for leg in &legs {
        let capped = if incoming > leg.spend_depth {
            leg.spend_depth.clone()
        } else {
            incoming
        };
        let spend = floor_to_step(&capped, &leg.spend_step);
        if spend.is_zero() || spend < leg.min_spend {
            debug!(
                "{chain:?} discarded: {} spend {spend} below minimum {}",
                leg.symbol, leg.min_spend
            );
            return Ok(None);
        }
        // Rounding remainder is diagnostics only, never reinvested
        let remainder = &capped - &spend;
        if !remainder.is_zero() {
            debug!("{} leaves remainder {remainder} unconsumed", leg.symbol);
        }
        let receive = floor_to_scale(&(&spend * &leg.rate), RECEIVE_SCALE);
        if receive < leg.min_receive {
            debug!(
                "{chain:?} discarded: {} receive {receive} below minimum {}",
                leg.symbol, leg.min_receive
            );
            return Ok(None);
        }
        flows.push(LegFlow {
            spend,
            receive: receive.clone(),
        });
        incoming = receive;
    }
    let Ok(flows): Result<[LegFlow; 3], _> = flows.try_into() else {
        bail!("chain {chain:?} did not produce three flows");
    };

    let profit = (&flows[2].receive - &flows[0].spend) / &flows[0].spend;
    Ok(Some(ValuableTradingChain {
        chain: chain.clone(),
        legs,
        flows,
        profit,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::test_helpers::{book, chain3, dec, pair, pair_with, scenario};

    #[test]
    fn test_scenario_quantities_and_negative_profit() {
        let (chain, pairs, books) = scenario();
        let vtc = evaluate_chain(&chain, &pairs, &books, Some(&dec("1")))
            .unwrap()
            .expect("chain is feasible");

        // leg1: 1 USDT buys 0.0001 BTC at ask 10000
        assert_eq!(vtc.flows[0].spend, dec("1"));
        assert_eq!(vtc.flows[0].receive, dec("0.0001"));
        // leg2: 0.0001 BTC sells into 0.000005 ETH at bid 0.05
        assert_eq!(vtc.flows[1].receive, dec("0.000005"));
        // leg3: 0.000005 ETH sells into 0.0026 USDT at bid 520
        assert_eq!(vtc.flows[2].receive, dec("0.0026"));
        // Deeply unprofitable, to be dropped by the minimum-profit filter
        assert_eq!(vtc.profit, dec("-0.9974"));
    }

    #[test]
    fn test_leg_quote_normalization() {
        let p = pair("BTC", "USDT");
        let b = book("BTCUSDT", "9990", "2", "10000", "3");

        let buy = LegQuote::new(&p, Side::Buy, &b).unwrap().unwrap();
        assert_eq!(buy.spend_depth, dec("30000")); // 3 * 10000 quote
        assert_eq!(buy.receive_depth, dec("3"));
        assert_eq!(buy.rate, dec("0.0001"));

        let sell = LegQuote::new(&p, Side::Sell, &b).unwrap().unwrap();
        assert_eq!(sell.spend_depth, dec("2"));
        assert_eq!(sell.receive_depth, dec("19980")); // 2 * 9990 quote
        assert_eq!(sell.rate, dec("9990"));
    }

    #[test]
    fn test_one_sided_book_excludes_chain() {
        let (chain, pairs, mut books) = scenario();
        books.insert("BTCETH".to_string(), book("BTCETH", "0", "0", "0.051", "10"));
        let vtc = evaluate_chain(&chain, &pairs, &books, Some(&dec("1"))).unwrap();
        assert!(vtc.is_none());
    }

    #[test]
    fn test_missing_book_excludes_chain() {
        let (chain, pairs, mut books) = scenario();
        books.remove("ETHUSDT");
        let vtc = evaluate_chain(&chain, &pairs, &books, Some(&dec("1"))).unwrap();
        assert!(vtc.is_none());
    }

    #[test]
    fn test_cascade_shrinks_larger_side_proportionally() {
        let (chain, pairs, books) = scenario();
        let mut legs = Vec::new();
        for leg in &chain.legs {
            legs.push(
                LegQuote::new(&pairs[&leg.symbol], leg.side, &books[&leg.symbol])
                    .unwrap()
                    .unwrap(),
            );
        }
        let mut legs: [LegQuote; 3] = legs.try_into().unwrap();
        cascade_depths(&mut legs);

        // leg1 yields 1 BTC but leg2 could absorb 10: leg2 shrinks to 1
        assert_eq!(legs[1].spend_depth, dec("1"));
        assert_eq!(legs[1].receive_depth, dec("0.05"));
        // leg2 now yields 0.05 ETH but leg3 could absorb 1: leg3 shrinks
        assert_eq!(legs[2].spend_depth, dec("0.05"));
        assert_eq!(legs[2].receive_depth, dec("26.00"));
        // leg1 untouched in both passes
        assert_eq!(legs[0].spend_depth, dec("10000"));
    }

    #[test]
    fn test_depth_bound_never_exceeded() {
        let (chain, pairs, books) = scenario();
        let mut raw_depths = Vec::new();
        for leg in &chain.legs {
            raw_depths.push(
                LegQuote::new(&pairs[&leg.symbol], leg.side, &books[&leg.symbol])
                    .unwrap()
                    .unwrap()
                    .spend_depth,
            );
        }
        // No init cap: the cascader uses the full cascaded depth
        let vtc = evaluate_chain(&chain, &pairs, &books, None)
            .unwrap()
            .expect("chain is feasible");
        for (flow, depth) in vtc.flows.iter().zip(&raw_depths) {
            assert!(&flow.spend <= depth, "{} exceeds depth {depth}", flow.spend);
        }
    }

    #[test]
    fn test_screening_profit_ranks_and_agrees_in_sign() {
        let (chain, pairs, books) = scenario();
        let prices: HashMap<_, _> = [
            ("BTCUSDT".to_string(), dec("10000")),
            ("BTCETH".to_string(), dec("0.05")),
            ("ETHUSDT".to_string(), dec("520")),
        ]
        .into_iter()
        .collect();

        let screened = screening_profit(&chain, &prices).unwrap();
        assert!(screened < BigDecimal::zero());

        // Depth non-binding (init far below every depth): signs agree
        let vtc = evaluate_chain(&chain, &pairs, &books, Some(&dec("1")))
            .unwrap()
            .unwrap();
        assert!(vtc.profit < BigDecimal::zero());
    }

    #[test]
    fn test_screening_profit_positive_triangle() {
        // BUY BTC at 10000, BUY ETH at 0.05 BTC, SELL ETH at 520:
        // 1 / 10000 / 0.05 * 520 = 1.04
        let chain = chain3(
            "USDT",
            &[
                ("BTCUSDT", Side::Buy, "BTC"),
                ("ETHBTC", Side::Buy, "ETH"),
                ("ETHUSDT", Side::Sell, "USDT"),
            ],
        );
        let prices: HashMap<_, _> = [
            ("BTCUSDT".to_string(), dec("10000")),
            ("ETHBTC".to_string(), dec("0.05")),
            ("ETHUSDT".to_string(), dec("520")),
        ]
        .into_iter()
        .collect();
        assert_eq!(screening_profit(&chain, &prices).unwrap(), dec("0.04"));

        // Same triangle against deep books agrees in sign and magnitude
        let pairs: HashMap<_, _> = [
            pair("BTC", "USDT"),
            pair("ETH", "BTC"),
            pair("ETH", "USDT"),
        ]
        .into_iter()
        .map(|p| (p.symbol.clone(), p))
        .collect();
        let books: HashMap<_, _> = [
            book("BTCUSDT", "9999", "1000", "10000", "1000"),
            book("ETHBTC", "0.049", "100000", "0.05", "100000"),
            book("ETHUSDT", "520", "100000", "521", "100000"),
        ]
        .into_iter()
        .map(|b| (b.symbol.clone(), b))
        .collect();
        let vtc = evaluate_chain(&chain, &pairs, &books, Some(&dec("1")))
            .unwrap()
            .unwrap();
        assert_eq!(vtc.profit, dec("0.04"));
    }

    #[test]
    fn test_minimum_quantity_discards_chain() {
        let (chain, mut pairs, books) = scenario();
        // The middle leg's minimum exceeds anything the cascade can feed it
        pairs.insert(
            "BTCETH".to_string(),
            pair_with("BTC", "ETH", "5", "0.00000001", "0.00000001"),
        );
        let vtc = evaluate_chain(&chain, &pairs, &books, Some(&dec("1"))).unwrap();
        assert!(vtc.is_none());
    }

    #[test]
    fn test_receive_minimum_discards_chain() {
        let (chain, mut pairs, books) = scenario();
        // Selling 0.000005 ETH yields 0.0026 USDT; require far more
        pairs.insert(
            "ETHUSDT".to_string(),
            pair_with("ETH", "USDT", "1", "0.00000001", "0.00000001"),
        );
        let vtc = evaluate_chain(&chain, &pairs, &books, Some(&dec("1"))).unwrap();
        assert!(vtc.is_none());
    }

    #[test]
    fn test_spend_floored_to_step_never_up() {
        let (chain, mut pairs, books) = scenario();
        // Coarse 0.4 step on leg1's quote spend: 1 / 0.4 = 2.5 steps,
        // floored to 2 steps = 0.8
        pairs.insert(
            "BTCUSDT".to_string(),
            pair_with("BTC", "USDT", "0.00000001", "0.00000001", "0.4"),
        );
        let vtc = evaluate_chain(&chain, &pairs, &books, Some(&dec("1")))
            .unwrap()
            .unwrap();
        assert_eq!(vtc.flows[0].spend, dec("0.8"));
    }

    #[test]
    fn test_display_arrow_format() {
        let (chain, pairs, books) = scenario();
        let vtc = evaluate_chain(&chain, &pairs, &books, Some(&dec("1")))
            .unwrap()
            .unwrap();
        let line = vtc.to_string();
        assert!(line.contains("USDT"));
        assert!(line.contains("->"));
        assert!(line.contains("profit:"));
    }
}

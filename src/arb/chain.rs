//! Trading chain enumeration.
//!
//! A chain is an ordered triple of legs `init -> first -> second -> init`.
//! Chains are purely topological (no price data), enumerated once after
//! metadata filtering, and owned by an immutable [`ChainSet`] that each
//! scan cycle borrows.

use std::collections::HashMap;
use std::fmt::{self, Debug};

use eyre::{bail, Result};
use log::{debug, info};

use super::types::{Asset, Side, TradingPair};

/// One trade of a chain: the pair symbol it trades, the side required, and
/// the asset it acquires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Leg {
    /// Symbol of the pair this leg trades
    pub symbol: String,
    /// Side required to spend the incoming asset
    pub side: Side,
    /// Asset acquired by this leg
    pub to: Asset,
}

/// An ordered triple of legs returning to the origin asset.
///
/// Invariants, enforced at construction: the first hop leaves the origin,
/// the second hop visits a third distinct asset, the last hop returns to
/// the origin.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TradingChain {
    /// The asset the chain starts and ends with
    pub init_asset: Asset,
    /// The three legs, in execution order
    pub legs: [Leg; 3],
}

impl Debug for TradingChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} -> {} -> {}",
            self.init_asset, self.legs[0].to, self.legs[1].to, self.legs[2].to
        )
    }
}

impl TradingChain {
    /// Creates a chain, validating the distinctness invariants.
    ///
    /// # Errors
    /// * If the first hop does not leave the origin
    /// * If the second hop repeats a visited asset
    /// * If the last hop does not return to the origin
    pub fn new(init_asset: Asset, legs: [Leg; 3]) -> Result<Self> {
        if legs[0].to == init_asset {
            bail!("first hop must leave the origin asset {init_asset}");
        }
        if legs[1].to == init_asset || legs[1].to == legs[0].to {
            bail!("second hop revisits {} in chain from {init_asset}", legs[1].to);
        }
        if legs[2].to != init_asset {
            bail!(
                "chain from {init_asset} ends at {} instead of returning",
                legs[2].to
            );
        }
        Ok(Self { init_asset, legs })
    }

    /// The two intermediate assets visited between leaving and re-entering
    /// the origin, in order.
    #[must_use]
    pub fn assets(&self) -> (&Asset, &Asset) {
        (&self.legs[0].to, &self.legs[1].to)
    }
}

/// The immutable scan result: the filtered pair universe plus every
/// enumerated chain. Built once at startup and passed by reference into
/// each cycle.
#[derive(Debug)]
pub struct ChainSet {
    /// Filtered pairs, keyed by symbol
    pub pairs: HashMap<String, TradingPair>,
    /// Every enumerated 3-leg chain
    pub chains: Vec<TradingChain>,
}

impl ChainSet {
    /// Enumerates all chains for the given origin assets.
    #[must_use]
    pub fn build(pairs: Vec<TradingPair>, origins: &[Asset]) -> Self {
        let chains = enumerate_chains(&pairs, origins);
        info!(
            "Enumerated {} chains over {} pairs for {} origin assets",
            chains.len(),
            pairs.len(),
            origins.len()
        );
        let pairs = pairs.into_iter().map(|p| (p.symbol.clone(), p)).collect();
        Self { pairs, chains }
    }
}

/// Outgoing edges per asset: the pair, the side required to spend the
/// asset, and the asset acquired.
type Adjacency<'a> = HashMap<&'a str, Vec<(&'a TradingPair, Side, &'a str)>>;

/// Builds the neighbor lists from the surviving pairs.
fn adjacency(pairs: &[TradingPair]) -> Adjacency<'_> {
    let mut adj: Adjacency<'_> = HashMap::new();
    for pair in pairs {
        // Spending the base is a SELL, spending the quote is a BUY
        adj.entry(&pair.base)
            .or_default()
            .push((pair, Side::Sell, &pair.quote));
        adj.entry(&pair.quote)
            .or_default()
            .push((pair, Side::Buy, &pair.base));
    }
    adj
}

/// Depth-3 expansion per origin asset, retaining only closing chains.
///
/// Pure combinatorics, no numeric computation; the output is stable
/// between price ticks.
#[must_use]
pub fn enumerate_chains(pairs: &[TradingPair], origins: &[Asset]) -> Vec<TradingChain> {
    let adj = adjacency(pairs);
    let empty = Vec::new();
    let mut chains = Vec::new();

    for origin in origins {
        for (p1, s1, first) in adj.get(origin.as_str()).unwrap_or(&empty) {
            for (p2, s2, second) in adj.get(first).unwrap_or(&empty) {
                if *second == origin.as_str() {
                    continue;
                }
                for (p3, s3, last) in adj.get(second).unwrap_or(&empty) {
                    if *last != origin.as_str() {
                        continue;
                    }
                    let legs = [
                        Leg {
                            symbol: p1.symbol.clone(),
                            side: *s1,
                            to: (*first).to_string(),
                        },
                        Leg {
                            symbol: p2.symbol.clone(),
                            side: *s2,
                            to: (*second).to_string(),
                        },
                        Leg {
                            symbol: p3.symbol.clone(),
                            side: *s3,
                            to: (*last).to_string(),
                        },
                    ];
                    match TradingChain::new(origin.clone(), legs) {
                        Ok(chain) => chains.push(chain),
                        Err(e) => debug!("Rejected chain candidate: {e}"),
                    }
                }
            }
        }
    }
    chains
}

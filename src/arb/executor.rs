//! Sequential order execution.
//!
//! The three orders of a chain are placed strictly in sequence: leg n+1's
//! quantity is the *realized* fill of leg n, not the pre-trade estimate,
//! because slippage makes the estimate unreliable. A non-filled status or a
//! transport failure aborts the cycle only -- the stranded intermediate
//! position is reported distinctly and the engine resumes on the next cycle.

use std::fmt::{self, Display};

use bigdecimal::{BigDecimal, Zero};
use eyre::{bail, Result};
use log::{debug, info, warn};

use super::quote::ValuableTradingChain;
use super::types::{floor_to_step, Asset};
use crate::exchange::types::OrderFill;
use crate::exchange::ExchangeApi;

/// Phase of one scan/execute cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Waiting for the next cycle
    Idle,
    /// Fetching prices and screening chains
    Scanning,
    /// Depth-aware evaluation and chain selection
    Ranking,
    /// Executing leg 1..=3
    ExecutingLeg(u8),
    /// Cycle finished normally (with or without a trade)
    Done,
    /// Cycle abandoned mid-execution
    Aborted,
}

impl CyclePhase {
    /// Whether `next` is a legal successor of this phase.
    #[must_use]
    pub fn permits(self, next: Self) -> bool {
        match (self, next) {
            (Self::Idle, Self::Scanning)
            | (Self::Scanning, Self::Ranking)
            | (Self::Ranking, Self::ExecutingLeg(1) | Self::Done)
            | (Self::ExecutingLeg(_), Self::Aborted)
            | (Self::ExecutingLeg(3), Self::Done)
            | (Self::Done | Self::Aborted, Self::Idle) => true,
            (Self::ExecutingLeg(n), Self::ExecutingLeg(m)) => m == n + 1,
            _ => false,
        }
    }
}

/// Explicit cycle state machine; transitions outside [`CyclePhase::permits`]
/// are programming errors and surface as such.
#[derive(Debug)]
pub struct CycleState {
    /// Current phase
    phase: CyclePhase,
}

impl Default for CycleState {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleState {
    /// A fresh state machine in `Idle`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: CyclePhase::Idle,
        }
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Transitions to `next`.
    ///
    /// # Errors
    /// * If the transition is not permitted from the current phase
    pub fn to(&mut self, next: CyclePhase) -> Result<()> {
        if !self.phase.permits(next) {
            bail!("illegal cycle transition {:?} -> {next:?}", self.phase);
        }
        debug!("cycle phase {:?} -> {next:?}", self.phase);
        self.phase = next;
        Ok(())
    }
}

/// Outcome of one execution attempt.
#[derive(Debug)]
pub enum CycleOutcome {
    /// All three legs filled
    Completed {
        /// Profit ratio estimated by the cascader before trading
        estimated: BigDecimal,
        /// Realized first-leg spend
        spent: BigDecimal,
        /// Realized final-leg receive
        received: BigDecimal,
        /// Realized profit ratio
        profit: BigDecimal,
    },
    /// Execution stopped mid-chain; the operator is left holding `holding`
    Aborted {
        /// 1-based leg that failed
        leg: usize,
        /// Symbol of the failing order
        symbol: String,
        /// Order status or transport error description
        reason: String,
        /// The intermediate asset now held
        holding: Asset,
        /// Realized quantity of that asset
        holding_qty: BigDecimal,
        /// Realized fills up to and including the failing leg
        fills: Vec<OrderFill>,
    },
}

impl Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed {
                estimated,
                spent,
                received,
                profit,
            } => write!(
                f,
                "cycle completed: spent {spent}, received {received}, \
                 realized profit {profit} (estimated {estimated})"
            ),
            Self::Aborted {
                leg,
                symbol,
                reason,
                holding,
                holding_qty,
                ..
            } => write!(
                f,
                "cycle aborted at leg {leg} ({symbol}): {reason}; \
                 now holding {holding_qty} {holding}"
            ),
        }
    }
}

/// Places a chain's three market orders in strict sequence.
pub struct Sequencer<'a> {
    /// Injected exchange capability
    api: &'a dyn ExchangeApi,
}

impl<'a> Sequencer<'a> {
    /// Creates a sequencer over the given exchange.
    #[must_use]
    pub fn new(api: &'a dyn ExchangeApi) -> Self {
        Self { api }
    }

    /// Executes the chain with the given initial spend quantity.
    ///
    /// The quantity is floored to leg 1's spend step before anything is
    /// submitted; a result below the chain's minimum rejects the attempt
    /// up-front with no order placed.
    ///
    /// # Errors
    /// * If the initial quantity is below the chain's minimum
    /// * If the cycle state does not permit execution
    pub async fn execute(
        &self,
        state: &mut CycleState,
        vtc: &ValuableTradingChain,
        init_quantity: &BigDecimal,
    ) -> Result<CycleOutcome> {
        let mut quantity = floor_to_step(init_quantity, &vtc.legs[0].spend_step);
        if quantity.is_zero() || quantity < vtc.legs[0].min_spend {
            bail!(
                "initial quantity {quantity} is below the chain minimum {} for {:?}",
                vtc.legs[0].min_spend,
                vtc.chain
            );
        }

        let mut fills: Vec<OrderFill> = Vec::with_capacity(3);
        let mut first_spend = BigDecimal::zero();
        for (index, leg) in vtc.chain.legs.iter().enumerate() {
            let leg_no = index + 1;
            #[allow(clippy::cast_possible_truncation)]
            state.to(CyclePhase::ExecutingLeg(leg_no as u8))?;
            info!(
                "Leg {leg_no}: {} {} spending {quantity}",
                leg.side, leg.symbol
            );

            let fill = match self.api.market_order(&leg.symbol, leg.side, &quantity).await {
                Ok(fill) => fill,
                Err(e) => {
                    state.to(CyclePhase::Aborted)?;
                    warn!("Leg {leg_no} ({}) transport failure: {e}", leg.symbol);
                    // Nothing was confirmed; the previous leg's exact
                    // realized receive is what the account still holds, not
                    // the floored quantity this leg attempted to spend.
                    let holding = Self::held_asset(vtc, index);
                    let holding_qty = fills
                        .last()
                        .map_or_else(|| quantity.clone(), |fill| fill.received.clone());
                    return Ok(CycleOutcome::Aborted {
                        leg: leg_no,
                        symbol: leg.symbol.clone(),
                        reason: format!("transport failure: {e}"),
                        holding,
                        holding_qty,
                        fills,
                    });
                }
            };

            if !fill.filled() {
                state.to(CyclePhase::Aborted)?;
                warn!(
                    "Leg {leg_no} ({}) not fully filled: {} (realized {})",
                    leg.symbol, fill.status, fill.received
                );
                let outcome = CycleOutcome::Aborted {
                    leg: leg_no,
                    symbol: leg.symbol.clone(),
                    reason: fill.status.clone(),
                    holding: leg.to.clone(),
                    holding_qty: fill.received.clone(),
                    fills: {
                        fills.push(fill);
                        fills
                    },
                };
                return Ok(outcome);
            }

            if index == 0 {
                first_spend = fill.spent.clone();
            }
            // The realized fill, not the estimate, drives the next leg
            quantity = if let Some(next) = vtc.legs.get(index + 1) {
                floor_to_step(&fill.received, &next.spend_step)
            } else {
                fill.received.clone()
            };
            fills.push(fill);
        }

        state.to(CyclePhase::Done)?;
        let received = quantity;
        let profit = (&received - &first_spend) / &first_spend;
        Ok(CycleOutcome::Completed {
            estimated: vtc.profit.clone(),
            spent: first_spend,
            received,
            profit,
        })
    }

    /// The asset held after `completed_legs` legs of the chain.
    fn held_asset(vtc: &ValuableTradingChain, completed_legs: usize) -> Asset {
        if completed_legs == 0 {
            vtc.chain.init_asset.clone()
        } else {
            vtc.chain.legs[completed_legs - 1].to.clone()
        }
    }
}

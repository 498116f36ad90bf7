/*!
 * # Trine - Triangular Spot Arbitrage Engine
 *
 * Trine scans a multi-asset spot exchange for triangular arbitrage
 * opportunities (three sequential market orders returning to the starting
 * asset at a profit) and optionally executes them.
 *
 * ## Core Features
 *
 * - **Metadata Filtering**: Narrows the exchange pair universe to tradable,
 *   market-order-capable, liquidity-qualified pairs
 * - **Chain Enumeration**: Builds the asset graph and enumerates all 3-leg
 *   cycles returning to each configured origin asset
 * - **Quantity Cascading**: Computes the maximum jointly feasible quantity
 *   through a chain under live order-book depth and lot/precision limits
 * - **Sequential Execution**: Places the three orders in strict sequence,
 *   driving each leg off the previous leg's realized fill
 *
 * ## Module Structure
 *
 * - `arb`: Chain enumeration, quantity cascading and order sequencing
 * - `bot`: Startup preconditions and the scan/rank/execute loop
 * - `config`: Configuration file and credential handling
 * - `exchange`: The exchange REST capability and its wire types
 * - `notify`: Operator notifications
 * - `utils`: Utility functions and helpers
 */

/// Chain enumeration, quantity cascading and order sequencing
pub mod arb;
/// Startup preconditions and the scan/rank/execute loop
pub mod bot;
/// Configuration file and credential handling
pub mod config;
/// The exchange REST capability and its wire types
pub mod exchange;
/// Operator notifications
pub mod notify;
/// Utility functions and helpers
pub mod utils;

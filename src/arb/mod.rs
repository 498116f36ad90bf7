//! # Arbitrage Module
//!
//! This module contains core arbitrage detection and execution logic:
//! filtering the pair universe, enumerating 3-leg chains, computing the
//! maximum feasible quantity through a chain under live depth and lot
//! constraints, and sequencing the resulting orders.

/// Chain enumeration and the immutable scan result
pub mod chain;
/// Sequential order execution
pub mod executor;
/// Market metadata filter
pub mod filter;
/// Screening and depth-aware quantity cascading
pub mod quote;
/// Test helpers and utilities
pub mod test_helpers;
/// Asset/pair types and flooring policy
pub mod types;

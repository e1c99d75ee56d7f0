//! Release window aggregation.
//!
//! Each aggregator queries its backend for what closed inside the lookback
//! window and renders the result as a markdown list (or `""`).

/// Merged pull requests targeting the main branch.
pub mod changes;

/// Work items that reached a done state.
pub mod work_items;

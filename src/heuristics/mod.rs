//! Heuristics for ordering points.
//!
//! Construction builds the initial tour; local search improves it under a
//! budget.

pub mod construction;
pub mod local_search;

pub use construction::*;
pub use local_search::*;

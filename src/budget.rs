//! Improvement budgets and cooperative cancellation.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Limits on the improvement phase. Whichever is hit first stops the search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImprovementBudget {
    /// Maximum number of improving moves applied
    pub max_iterations: usize,
    /// Wall-clock limit in seconds
    pub max_seconds: f64,
}

impl Default for ImprovementBudget {
    fn default() -> Self {
        ImprovementBudget {
            max_iterations: 1000,
            max_seconds: 5.0,
        }
    }
}

impl ImprovementBudget {
    pub fn new(max_iterations: usize, max_seconds: f64) -> Self {
        ImprovementBudget { max_iterations, max_seconds }
    }

    pub fn iterations_only(max_iterations: usize) -> Self {
        ImprovementBudget { max_iterations, max_seconds: f64::INFINITY }
    }

    /// Deadline measured from `start`. Non-finite or huge limits never expire.
    pub fn deadline_from(&self, start: Instant) -> Option<Instant> {
        if !self.max_seconds.is_finite() || self.max_seconds < 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(self.max_seconds)
            .ok()
            .and_then(|limit| start.checked_add(limit))
    }
}

/// Shared flag a caller sets to abort an in-flight solve.
///
/// Cloning shares the flag, so the hosting layer keeps one handle and passes
/// another into the solver.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Why the improvement phase stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// No improving move remains
    LocalOptimum,
    IterationLimit,
    Deadline,
    Cancelled,
    /// Nothing to improve (all points coincident, or too few to reorder)
    Trivial,
}

impl StopReason {
    /// True when the search stopped before reaching a local optimum.
    pub fn is_early(&self) -> bool {
        matches!(self, StopReason::IterationLimit | StopReason::Deadline | StopReason::Cancelled)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::LocalOptimum => "local optimum",
            StopReason::IterationLimit => "iteration limit",
            StopReason::Deadline => "deadline",
            StopReason::Cancelled => "cancelled",
            StopReason::Trivial => "trivial",
        };
        write!(f, "{}", s)
    }
}

//! The solver's result record.

use crate::budget::StopReason;
use crate::distance::Metric;
use crate::profile::TravelProfile;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Non-fatal conditions reported alongside a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TripWarning {
    /// Improvement stopped before reaching a local optimum
    BudgetExceeded { reason: StopReason },
    /// The caller cancelled the solve; the best tour so far was returned
    Cancelled,
    /// Points dropped by the `dedupe` option
    DuplicatesRemoved { ids: Vec<String> },
    /// The requested construction strategy was replaced
    StrategyFallback { requested: String, used: String },
}

impl std::fmt::Display for TripWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TripWarning::BudgetExceeded { reason } => write!(f, "improvement budget exhausted ({})", reason),
            TripWarning::Cancelled => write!(f, "solve cancelled, returning best tour found"),
            TripWarning::DuplicatesRemoved { ids } => {
                write!(f, "removed {} duplicate point(s): {}", ids.len(), ids.join(", "))
            }
            TripWarning::StrategyFallback { requested, used } => {
                write!(f, "{} not applicable, used {}", requested, used)
            }
        }
    }
}

/// An ordered visiting sequence and its cost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// Point identifiers in visiting order
    pub order: Vec<String>,
    /// Sum of consecutive-pair costs (including the return leg when closed)
    pub total_cost: f64,
    pub closed_loop: bool,
    /// Construction heuristic actually run
    pub strategy_used: String,
    /// Improving moves applied
    pub iterations_run: usize,
    /// Wall-clock time of the whole solve
    pub elapsed_seconds: f64,
    pub metric: Metric,
    /// Cost of the construction-only tour
    pub initial_cost: f64,
    pub stop_reason: StopReason,
    #[serde(default)]
    pub warnings: Vec<TripWarning>,
}

impl Trip {
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// True when the improvement phase stopped on a budget rather than at a local optimum.
    pub fn budget_exceeded(&self) -> bool {
        self.warnings.iter().any(|w| matches!(w, TripWarning::BudgetExceeded { .. }))
    }

    /// Identifiers removed by deduplication.
    pub fn removed_duplicates(&self) -> &[String] {
        self.warnings
            .iter()
            .find_map(|w| match w {
                TripWarning::DuplicatesRemoved { ids } => Some(ids.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Cost reduction achieved by improvement, in percent of the initial cost.
    pub fn improvement_percent(&self) -> f64 {
        if self.initial_cost > 0.0 {
            (self.initial_cost - self.total_cost) / self.initial_cost * 100.0
        } else {
            0.0
        }
    }

    /// Travel time at the profile's average speed. Only geodesic trips carry
    /// costs in metres, so euclidean trips yield `None`.
    pub fn estimated_travel_time(&self, profile: TravelProfile) -> Option<Duration> {
        match self.metric {
            Metric::Geodesic => Some(profile.travel_time(self.total_cost)),
            Metric::Euclidean => None,
        }
    }
}

impl std::fmt::Display for Trip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Trip ({})", self.strategy_used)?;
        match self.metric {
            Metric::Geodesic => writeln!(f, "  Cost: {:.2} km", self.total_cost / 1000.0)?,
            Metric::Euclidean => writeln!(f, "  Cost: {:.2}", self.total_cost)?,
        }
        writeln!(f, "  Initial cost: {:.2} ({:.2}% improvement)", self.initial_cost, self.improvement_percent())?;
        writeln!(f, "  Closed loop: {}", self.closed_loop)?;
        writeln!(f, "  Iterations: {} (stopped: {})", self.iterations_run, self.stop_reason)?;
        writeln!(f, "  Time: {:.4}s", self.elapsed_seconds)?;
        for warning in &self.warnings {
            writeln!(f, "  Warning: {}", warning)?;
        }
        writeln!(f, "  Order: {}", self.order.join(" -> "))
    }
}

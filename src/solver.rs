//! Trip solver: validation, distance model, construction and improvement
//! composed into a single call.
//!
//! ```
//! use trip_solver::{solve, RawPoint, SolveOptions};
//!
//! let points = vec![
//!     RawPoint::new(0.0, 0.0),
//!     RawPoint::new(10.0, 10.0),
//!     RawPoint::new(0.0, 10.0),
//!     RawPoint::new(10.0, 0.0),
//! ];
//! let trip = solve(&points, &SolveOptions::default()).unwrap();
//! assert!((trip.total_cost - 40.0).abs() < 1e-9);
//! assert_eq!(trip.order.len(), 4);
//! ```

use crate::budget::{CancellationToken, ImprovementBudget, StopReason};
use crate::distance::{build_matrix, Metric};
use crate::error::{Result, TripError};
use crate::heuristics::construction::{construct, ConstructionStrategy, TourShape};
use crate::heuristics::local_search::Improver;
use crate::point::{validate, Point, RawPoint, ValidatedPoints};
use crate::trip::{Trip, TripWarning};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;

/// Default point-count ceiling for cheapest insertion.
pub const DEFAULT_INSERTION_POINT_LIMIT: usize = 1500;

/// Default ceiling on retained points; the matrix holds the square of this.
pub const DEFAULT_MAX_POINTS: usize = 10_000;

/// Options for one solve. Every field has a default, so partial JSON works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    pub metric: Metric,
    /// Return to the start point at the end of the trip
    pub closed_loop: bool,
    pub construction_strategy: ConstructionStrategy,
    pub improvement_budget: ImprovementBudget,
    /// First point of the trip; defaults to the first input point
    pub start_point_id: Option<String>,
    /// Last point of an open trip
    pub end_point_id: Option<String>,
    /// Drop points whose coordinates repeat an earlier point
    pub dedupe: bool,
    /// Above this many points cheapest insertion falls back to nearest neighbor
    pub insertion_point_limit: usize,
    /// Larger point sets are rejected before the distance matrix is allocated
    pub max_points: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        SolveOptions {
            metric: Metric::Euclidean,
            closed_loop: true,
            construction_strategy: ConstructionStrategy::NearestNeighbor,
            improvement_budget: ImprovementBudget::default(),
            start_point_id: None,
            end_point_id: None,
            dedupe: false,
            insertion_point_limit: DEFAULT_INSERTION_POINT_LIMIT,
            max_points: DEFAULT_MAX_POINTS,
        }
    }
}

impl SolveOptions {
    /// Load options from a JSON file; missing fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Solve for a visiting order over `points`.
pub fn solve(points: &[RawPoint], options: &SolveOptions) -> Result<Trip> {
    solve_with_cancellation(points, options, &CancellationToken::new())
}

/// Like [`solve`], but stops improving as soon as `cancel` is set and returns
/// the best tour found so far.
pub fn solve_with_cancellation(points: &[RawPoint], options: &SolveOptions, cancel: &CancellationToken) -> Result<Trip> {
    let started = Instant::now();

    let budget = options.improvement_budget;
    if budget.max_seconds.is_nan() || budget.max_seconds < 0.0 {
        return Err(TripError::invalid_input(format!(
            "improvement_budget.max_seconds must be non-negative, got {}",
            budget.max_seconds
        )));
    }

    let validated = validate(points, options.metric, options.dedupe)?;
    if validated.points.len() > options.max_points {
        return Err(TripError::invalid_input(format!(
            "{} points exceed the limit of {}",
            validated.points.len(),
            options.max_points
        )));
    }
    let shape = resolve_shape(&validated, options)?;

    let mut warnings = Vec::new();
    if !validated.removed.is_empty() {
        warnings.push(TripWarning::DuplicatesRemoved {
            ids: validated.removed.iter().map(|r| r.id.clone()).collect(),
        });
    }

    let points = &validated.points;
    let matrix = match build_matrix(points, options.metric) {
        Ok(matrix) => matrix,
        Err(TripError::DegenerateInput) => {
            log::info!("all {} point(s) coincide, returning a zero-cost trip", points.len());
            return Ok(trivial_trip(points, &shape, options, warnings, started));
        }
        Err(e) => return Err(e),
    };

    let mut strategy = options.construction_strategy;
    if strategy == ConstructionStrategy::CheapestInsertion && points.len() > options.insertion_point_limit {
        log::warn!(
            "{} points exceed the cheapest insertion limit of {}, using nearest neighbor",
            points.len(),
            options.insertion_point_limit
        );
        warnings.push(TripWarning::StrategyFallback {
            requested: strategy.to_string(),
            used: ConstructionStrategy::NearestNeighbor.to_string(),
        });
        strategy = ConstructionStrategy::NearestNeighbor;
    }

    let mut tour = construct(&matrix, strategy, &shape);
    log::info!("{} built a tour over {} points, cost {:.4}", strategy, points.len(), tour.cost(&matrix));

    let outcome = Improver::with_standard_operators().run(&matrix, &mut tour, &budget, cancel);
    match outcome.stop_reason {
        StopReason::Cancelled => {
            log::warn!("solve cancelled after {} improving move(s)", outcome.iterations);
            warnings.push(TripWarning::Cancelled);
        }
        reason if reason.is_early() => {
            log::warn!("improvement budget exhausted ({}) after {} move(s)", reason, outcome.iterations);
            warnings.push(TripWarning::BudgetExceeded { reason });
        }
        _ => {}
    }

    debug_assert!(tour.is_permutation(points.len()));

    let trip = Trip {
        order: tour.order().iter().map(|&i| points[i].id.clone()).collect(),
        total_cost: outcome.final_cost,
        closed_loop: options.closed_loop,
        strategy_used: strategy.to_string(),
        iterations_run: outcome.iterations,
        elapsed_seconds: started.elapsed().as_secs_f64(),
        metric: options.metric,
        initial_cost: outcome.initial_cost,
        stop_reason: outcome.stop_reason,
        warnings,
    };
    log::info!(
        "trip solved: cost {:.4} after {} move(s) in {:.4}s",
        trip.total_cost,
        trip.iterations_run,
        trip.elapsed_seconds
    );
    Ok(trip)
}

/// Resolve start and end identifiers to point positions.
fn resolve_shape(validated: &ValidatedPoints, options: &SolveOptions) -> Result<TourShape> {
    let start = match &options.start_point_id {
        Some(id) => validated
            .position_of(id)
            .ok_or_else(|| TripError::invalid_input(format!("unknown start point '{}'", id)))?,
        None => 0,
    };

    let end = match &options.end_point_id {
        None => None,
        Some(id) if options.closed_loop => {
            return Err(TripError::invalid_input(format!(
                "end point '{}' requires an open trip (closed_loop = false)",
                id
            )));
        }
        Some(id) => {
            let end = validated
                .position_of(id)
                .ok_or_else(|| TripError::invalid_input(format!("unknown end point '{}'", id)))?;
            if end == start {
                return Err(TripError::invalid_input(format!(
                    "end point '{}' is the start point; use a closed loop instead",
                    id
                )));
            }
            Some(end)
        }
    };

    Ok(if options.closed_loop {
        TourShape::closed(start)
    } else {
        TourShape::open(start, end)
    })
}

/// All points coincide: any order costs nothing. Keep input order, with the
/// anchors at their ends.
fn trivial_trip(
    points: &[Point],
    shape: &TourShape,
    options: &SolveOptions,
    warnings: Vec<TripWarning>,
    started: Instant,
) -> Trip {
    let mut order = vec![points[shape.start].id.clone()];
    order.extend(
        (0..points.len())
            .filter(|&i| i != shape.start && Some(i) != shape.end)
            .map(|i| points[i].id.clone()),
    );
    if let Some(end) = shape.end {
        order.push(points[end].id.clone());
    }

    Trip {
        order,
        total_cost: 0.0,
        closed_loop: options.closed_loop,
        strategy_used: "trivial".to_string(),
        iterations_run: 0,
        elapsed_seconds: started.elapsed().as_secs_f64(),
        metric: options.metric,
        initial_cost: 0.0,
        stop_reason: StopReason::Trivial,
        warnings,
    }
}

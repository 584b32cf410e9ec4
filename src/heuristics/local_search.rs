//! Local search improvement heuristics.
//!
//! This module implements the two classic moves for tour improvement:
//! - 2-opt (reverse a contiguous segment)
//! - Or-opt (relocate a segment of 1 to 3 consecutive points)
//!
//! Both scan in a fixed order (ascending segment start) and report the first
//! improving move found, so results are reproducible for identical input.
//! The start point never moves; a pinned end point never moves either.

use crate::budget::{CancellationToken, ImprovementBudget, StopReason};
use crate::distance::DistanceMatrix;
use crate::tour::{Move, Tour};
use std::time::Instant;

/// Relative tolerance a move must beat to count as improving.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Smallest cost decrease that counts as an improvement for this tour.
pub fn improvement_threshold(current_cost: f64) -> f64 {
    IMPROVEMENT_EPSILON * (1.0 + current_cost.abs())
}

/// Trait for local search neighbourhoods
pub trait LocalSearch {
    /// First move (in scan order) whose delta is below `-threshold`.
    fn find_improving_move(&self, matrix: &DistanceMatrix, tour: &Tour, threshold: f64) -> Option<(Move, f64)>;

    fn name(&self) -> &str;

    /// Apply improving moves until none remains. Returns whether the tour changed.
    fn improve(&self, matrix: &DistanceMatrix, tour: &mut Tour) -> bool {
        let mut improved = false;
        loop {
            let threshold = improvement_threshold(tour.cost(matrix));
            match self.find_improving_move(matrix, tour, threshold) {
                Some((mv, _)) => {
                    tour.apply(mv);
                    improved = true;
                }
                None => return improved,
            }
        }
    }
}

/// 2-Opt Local Search
///
/// Reverses segments of the tour to reduce total distance.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoOptSearch;

impl LocalSearch for TwoOptSearch {
    fn find_improving_move(&self, matrix: &DistanceMatrix, tour: &Tour, threshold: f64) -> Option<(Move, f64)> {
        let n = tour.len();
        if n < 3 {
            return None;
        }
        let last = tour.last_movable();

        for i in 0..n.saturating_sub(2) {
            for j in i + 2..=last {
                if tour.is_closed() && i == 0 && j == n - 1 {
                    continue; // reversing everything but the start is a no-op
                }
                let delta = tour.two_opt_delta(matrix, i, j);
                if delta < -threshold {
                    return Some((Move::TwoOpt(i, j), delta));
                }
            }
        }
        None
    }

    fn name(&self) -> &str {
        "2-opt"
    }
}

/// Or-Opt Local Search
///
/// Relocates segments of 1, 2, or 3 consecutive points to other positions.
#[derive(Debug, Clone, Copy)]
pub struct OrOptSearch {
    /// Maximum segment length to consider
    pub max_segment_length: usize,
}

impl Default for OrOptSearch {
    fn default() -> Self {
        OrOptSearch { max_segment_length: 3 }
    }
}

impl LocalSearch for OrOptSearch {
    fn find_improving_move(&self, matrix: &DistanceMatrix, tour: &Tour, threshold: f64) -> Option<(Move, f64)> {
        let n = tour.len();
        if n < 3 {
            return None;
        }
        let last = tour.last_movable();

        for start in 1..=last {
            for len in 1..=self.max_segment_length {
                let end = start + len - 1;
                if end > last {
                    break;
                }
                for after in 0..n {
                    if after + 1 >= start && after <= end {
                        continue;
                    }
                    if after == n - 1 && tour.has_fixed_end() {
                        continue;
                    }
                    let delta = tour.or_opt_delta(matrix, start, len, after);
                    if delta < -threshold {
                        return Some((Move::OrOpt { start, len, after }, delta));
                    }
                }
            }
        }
        None
    }

    fn name(&self) -> &str {
        "or-opt"
    }
}

/// Result of a budgeted improvement run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImprovementOutcome {
    /// Improving moves applied
    pub iterations: usize,
    pub stop_reason: StopReason,
    pub initial_cost: f64,
    pub final_cost: f64,
}

/// Variable neighbourhood descent over an ordered list of neighbourhoods,
/// bounded by an [`ImprovementBudget`] and a [`CancellationToken`].
///
/// Each iteration applies the first improving move of the first neighbourhood
/// that has one. Cancellation and the deadline are checked before every move
/// search. The iteration limit is checked once a move has been found, so a
/// run whose last allowed move reaches a local optimum reports
/// [`StopReason::LocalOptimum`].
pub struct Improver {
    operators: Vec<Box<dyn LocalSearch + Send + Sync>>,
}

impl Improver {
    pub fn new() -> Self {
        Improver { operators: Vec::new() }
    }

    /// 2-opt followed by Or-opt.
    pub fn with_standard_operators() -> Self {
        let mut improver = Self::new();
        improver.add_operator(TwoOptSearch);
        improver.add_operator(OrOptSearch::default());
        improver
    }

    pub fn add_operator<L: LocalSearch + Send + Sync + 'static>(&mut self, op: L) {
        self.operators.push(Box::new(op));
    }

    /// First improving move of the first neighbourhood that has one.
    fn find_move(&self, matrix: &DistanceMatrix, tour: &Tour, threshold: f64) -> Option<(&str, Move, f64)> {
        self.operators.iter().find_map(|op| {
            op.find_improving_move(matrix, tour, threshold)
                .map(|(mv, delta)| (op.name(), mv, delta))
        })
    }

    pub fn run(
        &self,
        matrix: &DistanceMatrix,
        tour: &mut Tour,
        budget: &ImprovementBudget,
        cancel: &CancellationToken,
    ) -> ImprovementOutcome {
        let started = Instant::now();
        let deadline = budget.deadline_from(started);
        let initial_cost = tour.cost(matrix);
        let mut cost = initial_cost;
        let mut iterations = 0;

        let stop_reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break StopReason::Deadline;
            }

            let Some((name, mv, delta)) = self.find_move(matrix, tour, improvement_threshold(cost)) else {
                break StopReason::LocalOptimum;
            };
            // an exhausted budget only counts when another move was available
            if iterations >= budget.max_iterations {
                break StopReason::IterationLimit;
            }

            log::trace!("{} move {:?} delta {:.6}", name, mv, delta);
            tour.apply(mv);
            cost += delta;
            iterations += 1;
        };

        // recompute to shed accumulated rounding from the running deltas
        let final_cost = tour.cost(matrix);
        log::debug!(
            "improvement stopped ({}) after {} move(s): {:.4} -> {:.4}",
            stop_reason,
            iterations,
            initial_cost,
            final_cost
        );

        ImprovementOutcome { iterations, stop_reason, initial_cost, final_cost }
    }
}

impl Default for Improver {
    fn default() -> Self {
        Self::with_standard_operators()
    }
}

/// Improve a tour with 2-opt and Or-opt within the given budget.
pub fn improve(tour: Tour, matrix: &DistanceMatrix, budget: &ImprovementBudget) -> Tour {
    let mut tour = tour;
    Improver::with_standard_operators().run(matrix, &mut tour, budget, &CancellationToken::new());
    tour
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{build_matrix, Metric};
    use crate::point::Point;
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn matrix(coords: &[(f64, f64)]) -> DistanceMatrix {
        let points: Vec<Point> = coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Point::new(i.to_string(), x, y))
            .collect();
        build_matrix(&points, Metric::Euclidean).unwrap()
    }

    fn random_matrix(n: usize, seed: u64) -> DistanceMatrix {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let coords: Vec<(f64, f64)> = (0..n)
            .map(|_| (rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)))
            .collect();
        matrix(&coords)
    }

    fn square() -> DistanceMatrix {
        matrix(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)])
    }

    #[test]
    fn test_two_opt_uncrosses_square() {
        let m = square();
        let mut tour = Tour::new(vec![0, 2, 1, 3], true);
        assert!(TwoOptSearch.improve(&m, &mut tour));
        assert!((tour.cost(&m) - 40.0).abs() < 1e-9);
        assert_eq!(tour.order()[0], 0);
    }

    #[test]
    fn test_or_opt_relocates_outlier() {
        // 3 sits between 0 and 1 on the line but was visited last
        let m = matrix(&[(0.0, 0.0), (2.0, 0.0), (3.0, 0.0), (1.0, 0.0)]);
        let mut tour = Tour::new(vec![0, 1, 2, 3], false);
        assert!(OrOptSearch::default().improve(&m, &mut tour));
        assert!((tour.cost(&m) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_improver_never_regresses() {
        for seed in 0..10 {
            let m = random_matrix(30, seed);
            let mut tour = Tour::new((0..30).collect(), seed % 2 == 0);
            let before = tour.cost(&m);
            let outcome = Improver::default().run(&m, &mut tour, &ImprovementBudget::default(), &CancellationToken::new());
            assert!(tour.is_permutation(30));
            assert!(outcome.final_cost <= before + 1e-9);
            assert_eq!(outcome.stop_reason, StopReason::LocalOptimum);
            assert_eq!(tour.order()[0], 0);
        }
    }

    #[test]
    fn test_improver_is_idempotent_at_local_optimum() {
        let m = random_matrix(25, 7);
        let budget = ImprovementBudget::iterations_only(10_000);
        let once = improve(Tour::new((0..25).collect(), true), &m, &budget);
        let twice = improve(once.clone(), &m, &budget);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_iteration_limit_stops_early() {
        let m = random_matrix(40, 3);
        let mut tour = Tour::new((0..40).collect(), true);
        let outcome = Improver::default().run(&m, &mut tour, &ImprovementBudget::iterations_only(2), &CancellationToken::new());
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.stop_reason, StopReason::IterationLimit);
        assert!(outcome.final_cost < outcome.initial_cost);
    }

    #[test]
    fn test_limit_reached_at_local_optimum_is_not_a_budget_stop() {
        let m = random_matrix(40, 3);
        let mut unbounded = Tour::new((0..40).collect(), true);
        let full = Improver::default().run(&m, &mut unbounded, &ImprovementBudget::iterations_only(10_000), &CancellationToken::new());
        assert_eq!(full.stop_reason, StopReason::LocalOptimum);
        assert!(full.iterations > 0);

        let mut exact = Tour::new((0..40).collect(), true);
        let budget = ImprovementBudget::iterations_only(full.iterations);
        let outcome = Improver::default().run(&m, &mut exact, &budget, &CancellationToken::new());
        assert_eq!(outcome.iterations, full.iterations);
        assert_eq!(outcome.stop_reason, StopReason::LocalOptimum);
        assert_eq!(exact, unbounded);

        let mut short = Tour::new((0..40).collect(), true);
        let budget = ImprovementBudget::iterations_only(full.iterations - 1);
        let outcome = Improver::default().run(&m, &mut short, &budget, &CancellationToken::new());
        assert_eq!(outcome.stop_reason, StopReason::IterationLimit);
    }

    #[test]
    fn test_zero_budget_returns_input_unchanged() {
        let m = random_matrix(20, 11);
        let original = Tour::new((0..20).collect(), true);
        let mut tour = original.clone();
        let outcome = Improver::default().run(&m, &mut tour, &ImprovementBudget::new(1000, 0.0), &CancellationToken::new());
        assert_eq!(outcome.stop_reason, StopReason::Deadline);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(tour, original);
    }

    #[test]
    fn test_cancelled_before_start_returns_input() {
        let m = random_matrix(20, 5);
        let original = Tour::new((0..20).collect(), false);
        let mut tour = original.clone();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = Improver::default().run(&m, &mut tour, &ImprovementBudget::default(), &cancel);
        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert_eq!(tour, original);
    }

    #[test]
    fn test_fixed_end_stays_last() {
        let m = random_matrix(15, 21);
        let mut order: Vec<usize> = (0..15).collect();
        order.swap(14, 7);
        let mut tour = Tour::with_fixed_end(order);
        Improver::default().run(&m, &mut tour, &ImprovementBudget::default(), &CancellationToken::new());
        assert_eq!(tour.order()[0], 0);
        assert_eq!(*tour.order().last().unwrap(), 7);
        assert!(tour.is_permutation(15));
    }
}

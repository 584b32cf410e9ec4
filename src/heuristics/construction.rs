//! Construction heuristics: build an initial visiting order.
//!
//! Both heuristics are deterministic. Ties on distance or marginal cost go to
//! the lowest point position, which is the order points were supplied in.

use crate::distance::DistanceMatrix;
use crate::tour::Tour;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Fixed properties of the tour being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TourShape {
    /// Position visited first
    pub start: usize,
    /// Position visited last (open tours only)
    pub end: Option<usize>,
    pub closed: bool,
}

impl TourShape {
    pub fn closed(start: usize) -> Self {
        TourShape { start, end: None, closed: true }
    }

    pub fn open(start: usize, end: Option<usize>) -> Self {
        TourShape { start, end, closed: false }
    }

    fn finish(&self, mut order: Vec<usize>) -> Tour {
        if let Some(end) = self.end {
            order.push(end);
            Tour::with_fixed_end(order)
        } else {
            Tour::new(order, self.closed)
        }
    }

    fn is_anchor(&self, node: usize) -> bool {
        node == self.start || Some(node) == self.end
    }
}

pub trait ConstructionHeuristic {
    fn construct(&self, matrix: &DistanceMatrix, shape: &TourShape) -> Tour;
    fn name(&self) -> &str;
}

/// Available construction strategies.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructionStrategy {
    #[default]
    NearestNeighbor,
    CheapestInsertion,
}

impl ConstructionStrategy {
    pub const ALL: [ConstructionStrategy; 2] =
        [ConstructionStrategy::NearestNeighbor, ConstructionStrategy::CheapestInsertion];

    pub fn heuristic(&self) -> Box<dyn ConstructionHeuristic + Send + Sync> {
        match self {
            ConstructionStrategy::NearestNeighbor => Box::new(NearestNeighborHeuristic),
            ConstructionStrategy::CheapestInsertion => Box::new(CheapestInsertionHeuristic),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructionStrategy::NearestNeighbor => "nearest_neighbor",
            ConstructionStrategy::CheapestInsertion => "cheapest_insertion",
        }
    }
}

impl std::fmt::Display for ConstructionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build a tour with the given strategy.
pub fn construct(matrix: &DistanceMatrix, strategy: ConstructionStrategy, shape: &TourShape) -> Tour {
    strategy.heuristic().construct(matrix, shape)
}

/// Nearest Neighbor Heuristic
///
/// Builds a tour by repeatedly visiting the nearest unvisited point.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighborHeuristic;

impl NearestNeighborHeuristic {
    fn find_nearest(&self, matrix: &DistanceMatrix, current: usize, visited: &[bool]) -> Option<usize> {
        (0..matrix.size())
            .filter(|&n| !visited[n])
            .min_by_key(|&n| (OrderedFloat(matrix.get(current, n)), n))
    }
}

impl ConstructionHeuristic for NearestNeighborHeuristic {
    fn construct(&self, matrix: &DistanceMatrix, shape: &TourShape) -> Tour {
        let n = matrix.size();
        let mut visited = vec![false; n];
        visited[shape.start] = true;
        if let Some(end) = shape.end {
            visited[end] = true;
        }

        let mut order = Vec::with_capacity(n);
        order.push(shape.start);
        let mut current = shape.start;

        while let Some(next) = self.find_nearest(matrix, current, &visited) {
            order.push(next);
            visited[next] = true;
            current = next;
        }

        shape.finish(order)
    }

    fn name(&self) -> &str {
        "nearest_neighbor"
    }
}

/// Cheapest Insertion Heuristic
///
/// Starts from the anchor points and repeatedly inserts the point whose
/// insertion causes the minimum increase in tour length, at the position
/// achieving that minimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheapestInsertionHeuristic;

impl CheapestInsertionHeuristic {
    /// Marginal cost of inserting `node` before `partial[pos]`, or after the
    /// last point when `pos == partial.len()`.
    fn insertion_cost(&self, matrix: &DistanceMatrix, partial: &[usize], node: usize, pos: usize, closed: bool) -> f64 {
        let prev = partial[pos - 1];
        let next = if pos < partial.len() {
            Some(partial[pos])
        } else if closed {
            Some(partial[0])
        } else {
            None
        };

        match next {
            Some(next) => matrix.get(prev, node) + matrix.get(node, next) - matrix.get(prev, next),
            None => matrix.get(prev, node),
        }
    }

    /// Best insertion position for a node: lowest cost, then lowest position.
    fn find_best_insertion(&self, matrix: &DistanceMatrix, partial: &[usize], node: usize, shape: &TourShape) -> (usize, f64) {
        // the pinned end point must stay last
        let last_pos = if shape.end.is_some() { partial.len() - 1 } else { partial.len() };

        let mut best_pos = 1;
        let mut best_cost = f64::INFINITY;
        for pos in 1..=last_pos {
            let cost = self.insertion_cost(matrix, partial, node, pos, shape.closed);
            if cost < best_cost {
                best_cost = cost;
                best_pos = pos;
            }
        }
        (best_pos, best_cost)
    }
}

impl ConstructionHeuristic for CheapestInsertionHeuristic {
    fn construct(&self, matrix: &DistanceMatrix, shape: &TourShape) -> Tour {
        let n = matrix.size();
        let mut partial = vec![shape.start];
        if let Some(end) = shape.end {
            partial.push(end);
        }
        let mut unvisited: Vec<usize> = (0..n).filter(|&p| !shape.is_anchor(p)).collect();

        while !unvisited.is_empty() {
            let mut best: Option<(usize, usize, f64)> = None;

            for (slot, &node) in unvisited.iter().enumerate() {
                let (pos, cost) = self.find_best_insertion(matrix, &partial, node, shape);
                if best.map_or(true, |(_, _, best_cost)| cost < best_cost) {
                    best = Some((slot, pos, cost));
                }
            }

            let Some((slot, pos, _)) = best else { break };
            let node = unvisited.remove(slot);
            partial.insert(pos, node);
        }

        // the end point was kept in the partial tour; hand it back as an anchor
        if shape.end.is_some() {
            partial.pop();
        }
        shape.finish(partial)
    }

    fn name(&self) -> &str {
        "cheapest_insertion"
    }
}

//! Tour representation and move primitives.
//!
//! A [`Tour`] is an ordering of point positions (indices into the validated
//! point list and the distance matrix). The first entry is the start point and
//! never moves. Open tours may additionally pin their last entry.

use crate::distance::DistanceMatrix;
use serde::{Deserialize, Serialize};

/// Ordered visiting sequence over point positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tour {
    order: Vec<usize>,
    closed: bool,
    fixed_end: bool,
}

/// Represents a move in local search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Reverse positions `i + 1 ..= j`
    TwoOpt(usize, usize),
    /// Relocate the segment starting at `start` of length `len` so it follows
    /// the point currently at position `after`
    OrOpt { start: usize, len: usize, after: usize },
}

impl Tour {
    pub fn new(order: Vec<usize>, closed: bool) -> Self {
        Tour { order, closed, fixed_end: false }
    }

    /// Open tour whose last position is pinned.
    pub fn with_fixed_end(order: Vec<usize>) -> Self {
        Tour { order, closed: false, fixed_end: true }
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn into_order(self) -> Vec<usize> {
        self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn has_fixed_end(&self) -> bool {
        self.fixed_end
    }

    /// Position following `pos`, wrapping to the start on closed tours.
    #[inline]
    pub fn successor(&self, pos: usize) -> Option<usize> {
        if pos + 1 < self.order.len() {
            Some(pos + 1)
        } else if self.closed && self.order.len() > 1 {
            Some(0)
        } else {
            None
        }
    }

    /// Sum of consecutive-pair costs, plus the closing edge on closed tours.
    pub fn cost(&self, matrix: &DistanceMatrix) -> f64 {
        if self.order.len() < 2 {
            return 0.0;
        }

        let mut cost: f64 = self.order.windows(2).map(|w| matrix.get(w[0], w[1])).sum();
        if self.closed {
            cost += matrix.get(self.order[self.order.len() - 1], self.order[0]);
        }
        cost
    }

    /// Check that every position `0..n` appears exactly once.
    pub fn is_permutation(&self, n: usize) -> bool {
        if self.order.len() != n {
            return false;
        }
        let mut seen = vec![false; n];
        for &p in &self.order {
            if p >= n || seen[p] {
                return false;
            }
            seen[p] = true;
        }
        true
    }

    /// Last position that local search may move.
    pub fn last_movable(&self) -> usize {
        if self.fixed_end {
            self.order.len().saturating_sub(2)
        } else {
            self.order.len().saturating_sub(1)
        }
    }

    /// Cost change of reversing positions `i + 1 ..= j` (requires `i + 1 < j`).
    pub fn two_opt_delta(&self, matrix: &DistanceMatrix, i: usize, j: usize) -> f64 {
        let t = &self.order;
        let (a, b, c) = (t[i], t[i + 1], t[j]);

        let mut delta = matrix.get(a, c) - matrix.get(a, b);
        if let Some(k) = self.successor(j) {
            let d = t[k];
            delta += matrix.get(b, d) - matrix.get(c, d);
        }
        delta
    }

    /// Apply a 2-opt move (reverse segment between i+1 and j)
    pub fn apply_two_opt(&mut self, i: usize, j: usize) {
        self.order[i + 1..=j].reverse();
    }

    /// Cost change of relocating `len` points starting at `start` to follow
    /// position `after`. `after` must lie outside `start - 1 ..= start + len - 1`.
    pub fn or_opt_delta(&self, matrix: &DistanceMatrix, start: usize, len: usize, after: usize) -> f64 {
        let t = &self.order;
        let end = start + len - 1;
        let prev = t[start - 1];
        let (first, last) = (t[start], t[end]);

        let mut removal_gain = matrix.get(prev, first);
        if let Some(k) = self.successor(end) {
            let next = t[k];
            removal_gain += matrix.get(last, next) - matrix.get(prev, next);
        }

        let u = t[after];
        let mut insertion_cost = matrix.get(u, first);
        if let Some(k) = self.successor(after) {
            let v = t[k];
            insertion_cost += matrix.get(last, v) - matrix.get(u, v);
        }

        insertion_cost - removal_gain
    }

    /// Apply a segment relocation evaluated by [`Tour::or_opt_delta`].
    pub fn apply_or_opt(&mut self, start: usize, len: usize, after: usize) {
        let segment: Vec<usize> = self.order.drain(start..start + len).collect();
        let insert_pos = if after < start { after + 1 } else { after + 1 - len };
        self.order.splice(insert_pos..insert_pos, segment);
    }

    pub fn delta(&self, matrix: &DistanceMatrix, mv: Move) -> f64 {
        match mv {
            Move::TwoOpt(i, j) => self.two_opt_delta(matrix, i, j),
            Move::OrOpt { start, len, after } => self.or_opt_delta(matrix, start, len, after),
        }
    }

    pub fn apply(&mut self, mv: Move) {
        match mv {
            Move::TwoOpt(i, j) => self.apply_two_opt(i, j),
            Move::OrOpt { start, len, after } => self.apply_or_opt(start, len, after),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{build_matrix, Metric};
    use crate::point::Point;

    fn matrix(coords: &[(f64, f64)]) -> DistanceMatrix {
        let points: Vec<Point> = coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Point::new(i.to_string(), x, y))
            .collect();
        build_matrix(&points, Metric::Euclidean).unwrap()
    }

    fn square() -> DistanceMatrix {
        matrix(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)])
    }

    #[test]
    fn test_cost_closed_and_open() {
        let m = square();
        assert!((Tour::new(vec![0, 1, 2, 3], true).cost(&m) - 40.0).abs() < 1e-9);
        assert!((Tour::new(vec![0, 1, 2, 3], false).cost(&m) - 30.0).abs() < 1e-9);
        assert_eq!(Tour::new(vec![2], true).cost(&m), 0.0);
    }

    #[test]
    fn test_two_point_costs() {
        let m = matrix(&[(0.0, 0.0), (3.0, 4.0)]);
        assert!((Tour::new(vec![0, 1], true).cost(&m) - 10.0).abs() < 1e-9);
        assert!((Tour::new(vec![0, 1], false).cost(&m) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_is_permutation() {
        assert!(Tour::new(vec![2, 0, 1], true).is_permutation(3));
        assert!(!Tour::new(vec![0, 0, 1], true).is_permutation(3));
        assert!(!Tour::new(vec![0, 1], true).is_permutation(3));
        assert!(!Tour::new(vec![0, 1, 3], true).is_permutation(3));
    }

    #[test]
    fn test_two_opt_delta_matches_recomputed_cost() {
        let m = square();
        for closed in [true, false] {
            let tour = Tour::new(vec![0, 2, 1, 3], closed);
            for i in 0..tour.len() - 2 {
                for j in i + 2..tour.len() {
                    let mut moved = tour.clone();
                    moved.apply_two_opt(i, j);
                    let expected = moved.cost(&m) - tour.cost(&m);
                    assert!(
                        (tour.two_opt_delta(&m, i, j) - expected).abs() < 1e-9,
                        "closed={} i={} j={}",
                        closed,
                        i,
                        j
                    );
                }
            }
        }
    }

    #[test]
    fn test_or_opt_delta_matches_recomputed_cost() {
        let m = matrix(&[(0.0, 0.0), (4.0, 1.0), (1.0, 5.0), (7.0, 3.0), (2.0, 2.0), (6.0, 6.0)]);
        for closed in [true, false] {
            let tour = Tour::new(vec![0, 3, 1, 5, 2, 4], closed);
            let n = tour.len();
            for len in 1..=3 {
                for start in 1..=n - len {
                    for after in 0..n {
                        if after + 1 >= start && after < start + len {
                            continue;
                        }
                        let mut moved = tour.clone();
                        moved.apply_or_opt(start, len, after);
                        assert!(moved.is_permutation(n));
                        let expected = moved.cost(&m) - tour.cost(&m);
                        let delta = tour.or_opt_delta(&m, start, len, after);
                        assert!(
                            (delta - expected).abs() < 1e-9,
                            "closed={} start={} len={} after={}",
                            closed,
                            start,
                            len,
                            after
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_apply_or_opt_positions() {
        let mut tour = Tour::new(vec![0, 1, 2, 3, 4, 5], true);
        tour.apply_or_opt(1, 2, 4);
        assert_eq!(tour.order(), &[0, 3, 4, 1, 2, 5]);

        let mut tour = Tour::new(vec![0, 1, 2, 3, 4, 5], true);
        tour.apply_or_opt(4, 2, 0);
        assert_eq!(tour.order(), &[0, 4, 5, 1, 2, 3]);
    }

    #[test]
    fn test_successor_and_fixed_end() {
        let closed = Tour::new(vec![0, 1, 2], true);
        assert_eq!(closed.successor(2), Some(0));
        let open = Tour::with_fixed_end(vec![0, 1, 2]);
        assert_eq!(open.successor(2), None);
        assert_eq!(open.last_movable(), 1);
        assert!(!open.is_closed());
    }
}

//! Distance model: pairwise travel costs between validated points.
//!
//! Two metrics are supported: planar Euclidean distance for x/y or projected
//! coordinates, and great-circle (haversine) distance in metres for
//! latitude/longitude pairs.

use crate::error::{Result, TripError};
use crate::point::Point;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Distance metric choices.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Euclidean,
    Geodesic,
}

impl Metric {
    /// Distance between two points under this metric.
    #[inline]
    pub fn distance(&self, a: &Point, b: &Point) -> f64 {
        match self {
            Metric::Euclidean => (a.x - b.x).hypot(a.y - b.y),
            Metric::Geodesic => haversine_m(a.x, a.y, b.x, b.y),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Euclidean => write!(f, "euclidean"),
            Metric::Geodesic => write!(f, "geodesic"),
        }
    }
}

/// Great-circle distance in metres between two (lat, lon) pairs in degrees.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let s1 = (dlat / 2.0).sin();
    let s2 = (dlon / 2.0).sin();
    let h = s1 * s1 + phi1.cos() * phi2.cos() * s2 * s2;
    // rounding can push h marginally above 1 for antipodal points
    2.0 * EARTH_RADIUS_METERS * h.min(1.0).sqrt().asin()
}

/// Dense n×n cost matrix in row-major order. Diagonal is zero.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    data: Vec<f64>,
    size: usize,
    metric: Metric,
}

impl DistanceMatrix {
    /// Creates a matrix from an explicit row-major grid.
    ///
    /// Returns `None` if the data length doesn't match `size * size`.
    pub fn from_data(size: usize, data: Vec<f64>, metric: Metric) -> Option<Self> {
        if data.len() != size * size {
            return None;
        }
        Some(DistanceMatrix { data, size, metric })
    }

    /// Cost of travelling from `from` to `to`.
    #[inline]
    pub fn get(&self, from: usize, to: usize) -> f64 {
        self.data[from * self.size + to]
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        (0..self.size).all(|i| (i + 1..self.size).all(|j| (self.get(i, j) - self.get(j, i)).abs() <= tol))
    }
}

/// Compute every pairwise cost in one pass.
///
/// Rows are filled in parallel; each entry depends only on its two points, so
/// the result is identical to a sequential fill. Fails with
/// [`TripError::DegenerateInput`] when every point shares the same coordinates
/// (including the single-point case left behind by deduplication), and with
/// [`TripError::InvalidInput`] when coordinates lie so far apart that a cost,
/// or a tour summed from them, would not be a finite number.
pub fn build_matrix(points: &[Point], metric: Metric) -> Result<DistanceMatrix> {
    if points.is_empty() {
        return Err(TripError::invalid_input("cannot build a distance matrix without points"));
    }
    if points.iter().all(|p| p.coincides_with(&points[0])) {
        return Err(TripError::DegenerateInput);
    }

    let n = points.len();
    let mut data = vec![0.0; n * n];

    data.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
        for (j, cell) in row.iter_mut().enumerate() {
            if i != j {
                *cell = metric.distance(&points[i], &points[j]);
            }
        }
    });

    let longest = data.par_iter().copied().reduce(|| 0.0, f64::max);
    if !(longest * n.max(4) as f64).is_finite() {
        return Err(TripError::invalid_input(format!(
            "coordinates are too far apart for finite {} costs",
            metric
        )));
    }

    log::debug!("built {}x{} {} distance matrix", n, n, metric);

    Ok(DistanceMatrix { data, size: n, metric })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point> {
        coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| Point::new(i.to_string(), x, y))
            .collect()
    }

    #[test]
    fn test_euclidean_matrix() {
        let matrix = build_matrix(&pts(&[(0.0, 0.0), (3.0, 4.0), (0.0, 8.0)]), Metric::Euclidean).unwrap();
        assert_eq!(matrix.size(), 3);
        assert!((matrix.get(0, 1) - 5.0).abs() < 1e-10);
        assert!((matrix.get(1, 0) - 5.0).abs() < 1e-10);
        assert!((matrix.get(0, 2) - 8.0).abs() < 1e-10);
        assert_eq!(matrix.get(1, 1), 0.0);
        assert!(matrix.is_symmetric(1e-12));
    }

    #[test]
    fn test_geodesic_distance_paris_london() {
        // Paris (48.8566, 2.3522) to London (51.5074, -0.1278) is about 343.5 km
        let d = haversine_m(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((d - 343_500.0).abs() < 2_000.0, "got {}", d);
    }

    #[test]
    fn test_geodesic_one_degree_of_latitude() {
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        let expected = EARTH_RADIUS_METERS * 1.0f64.to_radians();
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn test_geodesic_matrix_is_symmetric() {
        let matrix = build_matrix(
            &pts(&[(45.0, 7.0), (45.5, 7.5), (44.9, 6.8), (-33.9, 151.2)]),
            Metric::Geodesic,
        )
        .unwrap();
        assert!(matrix.is_symmetric(1e-6));
        assert_eq!(matrix.metric(), Metric::Geodesic);
    }

    #[test]
    fn test_all_coincident_is_degenerate() {
        let err = build_matrix(&pts(&[(5.0, 5.0), (5.0, 5.0), (5.0, 5.0)]), Metric::Euclidean).unwrap_err();
        assert!(matches!(err, TripError::DegenerateInput));
        let err = build_matrix(&pts(&[(1.0, 2.0)]), Metric::Euclidean).unwrap_err();
        assert!(matches!(err, TripError::DegenerateInput));
    }

    #[test]
    fn test_partially_coincident_is_fine() {
        let matrix = build_matrix(&pts(&[(5.0, 5.0), (5.0, 5.0), (6.0, 5.0)]), Metric::Euclidean).unwrap();
        assert_eq!(matrix.get(0, 1), 0.0);
        assert!((matrix.get(0, 2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_euclidean_extremes_do_not_overflow() {
        // squaring the offsets would overflow, the distance itself does not
        let m = build_matrix(&pts(&[(3e200, 0.0), (0.0, 4e200)]), Metric::Euclidean).unwrap();
        assert!((m.get(0, 1) / 5e200 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_infinite_costs_are_rejected() {
        let err = build_matrix(&pts(&[(1e308, 0.0), (-1e308, 0.0), (0.0, 0.0)]), Metric::Euclidean).unwrap_err();
        assert!(matches!(err, TripError::InvalidInput(_)));

        // every leg is finite but a tour over them is not
        let err = build_matrix(&pts(&[(1e308, 0.0), (0.0, 0.0), (5e307, 0.0)]), Metric::Euclidean).unwrap_err();
        assert!(matches!(err, TripError::InvalidInput(_)));
    }

    #[test]
    fn test_from_data() {
        let dm = DistanceMatrix::from_data(2, vec![0.0, 5.0, 5.0, 0.0], Metric::Euclidean).unwrap();
        assert_eq!(dm.get(0, 1), 5.0);
        assert!(DistanceMatrix::from_data(2, vec![0.0, 1.0, 2.0], Metric::Euclidean).is_none());
    }
}

//! Point records and the point set validator.
//!
//! Raw records come from the hosting layer (uploaded files, the CLI, another
//! service) and carry two coordinates plus an optional identifier. Validation
//! turns them into [`Point`]s with unique identifiers, checking coordinate
//! ranges against the selected [`Metric`].

use crate::distance::{DistanceMatrix, Metric};
use crate::error::{Result, TripError};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A point record as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    #[serde(default)]
    pub id: Option<String>,
    /// Latitude in geodesic mode, x otherwise
    #[serde(alias = "lat", alias = "x")]
    pub lat_or_x: f64,
    /// Longitude in geodesic mode, y otherwise
    #[serde(alias = "lon", alias = "y")]
    pub lon_or_y: f64,
}

impl RawPoint {
    pub fn new(lat_or_x: f64, lon_or_y: f64) -> Self {
        RawPoint { id: None, lat_or_x, lon_or_y }
    }

    pub fn with_id(id: impl Into<String>, lat_or_x: f64, lon_or_y: f64) -> Self {
        RawPoint { id: Some(id.into()), lat_or_x, lon_or_y }
    }

}

/// Identifiers for a slice of raw records, in input order.
///
/// Explicit identifiers are kept as given. A record without one receives its
/// input position, or `<position>_<n>` with the smallest `n` that no other
/// record already uses.
pub fn assign_ids(raw_points: &[RawPoint]) -> Vec<String> {
    let mut taken: HashSet<String> = raw_points.iter().filter_map(|p| p.id.clone()).collect();

    raw_points
        .iter()
        .enumerate()
        .map(|(index, raw)| match &raw.id {
            Some(id) => id.clone(),
            None => {
                let mut candidate = index.to_string();
                let mut suffix = 1;
                while taken.contains(&candidate) {
                    candidate = format!("{}_{}", index, suffix);
                    suffix += 1;
                }
                taken.insert(candidate.clone());
                candidate
            }
        })
        .collect()
}

/// A validated point. Immutable for the duration of one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: String,
    /// Latitude (geodesic) or x (euclidean)
    pub x: f64,
    /// Longitude (geodesic) or y (euclidean)
    pub y: f64,
}

impl Point {
    pub fn new(id: impl Into<String>, x: f64, y: f64) -> Self {
        Point { id: id.into(), x, y }
    }

    /// Exact coordinate equality.
    pub fn coincides_with(&self, other: &Point) -> bool {
        self.x == other.x && self.y == other.y
    }
}

/// A point dropped by the `dedupe` option, and the point it duplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemovedDuplicate {
    pub id: String,
    pub kept_id: String,
}

/// Output of [`validate`].
#[derive(Debug, Clone)]
pub struct ValidatedPoints {
    pub points: Vec<Point>,
    pub removed: Vec<RemovedDuplicate>,
}

impl ValidatedPoints {
    /// Position of a point identifier among the retained points. Identifiers
    /// removed as duplicates resolve to the point they duplicated.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        let target = self
            .removed
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.kept_id.as_str())
            .unwrap_or(id);
        self.points.iter().position(|p| p.id == target)
    }
}

/// Validate and normalise raw point records.
///
/// Fails with [`TripError::InvalidInput`] when fewer than two records are
/// supplied, a coordinate is not a finite number (or lies outside the
/// latitude/longitude range in geodesic mode), or an identifier repeats.
/// Records without an identifier receive one from [`assign_ids`].
pub fn validate(raw_points: &[RawPoint], metric: Metric, dedupe: bool) -> Result<ValidatedPoints> {
    if raw_points.len() < 2 {
        return Err(TripError::invalid_input(format!(
            "at least 2 points are required, got {}",
            raw_points.len()
        )));
    }

    let mut points = Vec::with_capacity(raw_points.len());
    let mut seen_ids: HashSet<String> = HashSet::with_capacity(raw_points.len());

    let ids = assign_ids(raw_points);

    for (index, (raw, id)) in raw_points.iter().zip(ids).enumerate() {
        check_coordinates(index, raw, metric)?;

        if id.trim().is_empty() {
            return Err(TripError::invalid_input(format!("point {} has an empty identifier", index)));
        }

        if !seen_ids.insert(id.clone()) {
            return Err(TripError::invalid_input(format!("duplicate point identifier '{}'", id)));
        }

        points.push(Point::new(id, raw.lat_or_x, raw.lon_or_y));
    }

    let removed = if dedupe {
        remove_duplicate_coordinates(&mut points)
    } else {
        Vec::new()
    };

    if !removed.is_empty() {
        log::warn!("dedupe removed {} point(s) with repeated coordinates", removed.len());
    }

    Ok(ValidatedPoints { points, removed })
}

fn check_coordinates(index: usize, raw: &RawPoint, metric: Metric) -> Result<()> {
    if !raw.lat_or_x.is_finite() || !raw.lon_or_y.is_finite() {
        return Err(TripError::invalid_input(format!(
            "point {} has a non-numeric coordinate ({}, {})",
            index, raw.lat_or_x, raw.lon_or_y
        )));
    }

    if metric == Metric::Geodesic {
        if !(-90.0..=90.0).contains(&raw.lat_or_x) {
            return Err(TripError::invalid_input(format!(
                "point {} latitude {} is outside [-90, 90]",
                index, raw.lat_or_x
            )));
        }
        if !(-180.0..=180.0).contains(&raw.lon_or_y) {
            return Err(TripError::invalid_input(format!(
                "point {} longitude {} is outside [-180, 180]",
                index, raw.lon_or_y
            )));
        }
    }

    Ok(())
}

/// Keep the first occurrence of every coordinate pair, preserving order.
fn remove_duplicate_coordinates(points: &mut Vec<Point>) -> Vec<RemovedDuplicate> {
    let mut first_at: HashMap<(u64, u64), String> = HashMap::new();
    let mut removed = Vec::new();

    points.retain(|p| {
        // -0.0 and 0.0 are the same coordinate
        let key = ((p.x + 0.0).to_bits(), (p.y + 0.0).to_bits());
        match first_at.get(&key) {
            Some(kept) => {
                removed.push(RemovedDuplicate { id: p.id.clone(), kept_id: kept.clone() });
                false
            }
            None => {
                first_at.insert(key, p.id.clone());
                true
            }
        }
    });

    removed
}

/// Summary figures for a validated point set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointSetStatistics {
    pub count: usize,
    pub metric: Metric,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub avg_distance: f64,
    pub min_distance: f64,
    pub max_distance: f64,
    pub coincident_pairs: usize,
}

impl PointSetStatistics {
    pub fn compute(points: &[Point], matrix: &DistanceMatrix) -> Self {
        let mut min_x = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in points {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }

        let mut sum = 0.0;
        let mut pairs = 0usize;
        let mut min_distance = f64::INFINITY;
        let mut max_distance = 0.0f64;
        let mut coincident_pairs = 0;
        for i in 0..matrix.size() {
            for j in i + 1..matrix.size() {
                let d = matrix.get(i, j);
                sum += d;
                pairs += 1;
                min_distance = min_distance.min(d);
                max_distance = max_distance.max(d);
                if points[i].coincides_with(&points[j]) {
                    coincident_pairs += 1;
                }
            }
        }

        PointSetStatistics {
            count: points.len(),
            metric: matrix.metric(),
            min_x,
            max_x,
            min_y,
            max_y,
            avg_distance: if pairs > 0 { sum / pairs as f64 } else { 0.0 },
            min_distance: if pairs > 0 { min_distance } else { 0.0 },
            max_distance,
            coincident_pairs,
        }
    }
}

impl std::fmt::Display for PointSetStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (x_label, y_label) = match self.metric {
            Metric::Geodesic => ("lat", "lon"),
            Metric::Euclidean => ("x", "y"),
        };
        writeln!(f, "Points: {}", self.count)?;
        writeln!(f, "  Metric: {}", self.metric)?;
        writeln!(f, "  {} range: [{:.6}, {:.6}]", x_label, self.min_x, self.max_x)?;
        writeln!(f, "  {} range: [{:.6}, {:.6}]", y_label, self.min_y, self.max_y)?;
        writeln!(f, "  Coincident pairs: {}", self.coincident_pairs)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Min distance: {:.2}", self.min_distance)?;
        writeln!(f, "  Max distance: {:.2}", self.max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_fewer_than_two_points() {
        let err = validate(&[RawPoint::new(0.0, 0.0)], Metric::Euclidean, false).unwrap_err();
        assert!(matches!(err, TripError::InvalidInput(_)));
        assert!(validate(&[], Metric::Euclidean, false).is_err());
    }

    #[test]
    fn test_assigns_sequential_ids() {
        let raw = vec![
            RawPoint::new(0.0, 0.0),
            RawPoint::with_id("depot", 1.0, 1.0),
            RawPoint::new(2.0, 2.0),
        ];
        let validated = validate(&raw, Metric::Euclidean, false).unwrap();
        let ids: Vec<&str> = validated.points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "depot", "2"]);
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let raw = vec![RawPoint::with_id("a", 0.0, 0.0), RawPoint::with_id("a", 1.0, 1.0)];
        assert!(validate(&raw, Metric::Euclidean, false).is_err());
    }

    #[test]
    fn test_synthetic_ids_avoid_explicit_ones() {
        let raw = vec![
            RawPoint::with_id("1", 0.0, 0.0),
            RawPoint::new(5.0, 0.0),
            RawPoint::new(0.0, 5.0),
        ];
        let validated = validate(&raw, Metric::Euclidean, false).unwrap();
        let ids: Vec<&str> = validated.points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "1_1", "2"]);

        // the suffixed candidate can itself be taken further down the input
        let raw = vec![
            RawPoint::new(0.0, 0.0),
            RawPoint::with_id("0", 1.0, 1.0),
            RawPoint::with_id("0_1", 2.0, 2.0),
        ];
        assert_eq!(assign_ids(&raw), vec!["0_2", "0", "0_1"]);
    }

    #[test]
    fn test_rejects_non_finite_coordinates() {
        let raw = vec![RawPoint::new(0.0, f64::NAN), RawPoint::new(1.0, 1.0)];
        assert!(validate(&raw, Metric::Euclidean, false).is_err());
        let raw = vec![RawPoint::new(f64::INFINITY, 0.0), RawPoint::new(1.0, 1.0)];
        assert!(validate(&raw, Metric::Euclidean, false).is_err());
    }

    #[test]
    fn test_geodesic_range_check() {
        let raw = vec![RawPoint::new(95.0, 0.0), RawPoint::new(1.0, 1.0)];
        assert!(validate(&raw, Metric::Geodesic, false).is_err());
        // same values are fine as planar coordinates
        assert!(validate(&raw, Metric::Euclidean, false).is_ok());

        let raw = vec![RawPoint::new(45.0, 181.0), RawPoint::new(1.0, 1.0)];
        assert!(validate(&raw, Metric::Geodesic, false).is_err());
    }

    #[test]
    fn test_duplicates_kept_without_dedupe() {
        let raw = vec![RawPoint::new(5.0, 5.0), RawPoint::new(5.0, 5.0), RawPoint::new(5.0, 5.0)];
        let validated = validate(&raw, Metric::Euclidean, false).unwrap();
        assert_eq!(validated.points.len(), 3);
        assert!(validated.removed.is_empty());
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let raw = vec![
            RawPoint::with_id("a", 5.0, 5.0),
            RawPoint::with_id("b", 1.0, 1.0),
            RawPoint::with_id("c", 5.0, 5.0),
        ];
        let validated = validate(&raw, Metric::Euclidean, true).unwrap();
        let ids: Vec<&str> = validated.points.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(
            validated.removed,
            vec![RemovedDuplicate { id: "c".into(), kept_id: "a".into() }]
        );
        assert_eq!(validated.position_of("c"), Some(0));
        assert_eq!(validated.position_of("b"), Some(1));
        assert_eq!(validated.position_of("zzz"), None);
    }

    #[test]
    fn test_raw_point_deserializes_aliases() {
        let p: RawPoint = serde_json::from_str(r#"{"lat": 48.85, "lon": 2.35}"#).unwrap();
        assert_eq!(p, RawPoint::new(48.85, 2.35));
        let p: RawPoint = serde_json::from_str(r#"{"id": "a", "x": 1, "y": 2}"#).unwrap();
        assert_eq!(p, RawPoint::with_id("a", 1.0, 2.0));
    }
}

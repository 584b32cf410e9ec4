//! Reading point sets from CSV, JSON and GeoJSON, and writing trips back out.
//!
//! CSV files need a header row. Coordinates come from `x`/`y`,
//! `lat`/`lon` (also `lng`) or `latitude`/`longitude` columns; an `id` or
//! `name` column supplies identifiers. GeoJSON input is a FeatureCollection
//! of Point features with `[longitude, latitude]` coordinates.

use crate::distance::Metric;
use crate::error::{Result, TripError};
use crate::point::{assign_ids, RawPoint};
use crate::trip::Trip;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// Read points from a file, picking the format from its extension.
pub fn read_points<P: AsRef<Path>>(path: P) -> Result<Vec<RawPoint>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let reader = BufReader::new(File::open(path)?);

    let points = match extension.as_str() {
        "csv" => read_csv(reader)?,
        "geojson" => read_geojson(reader)?,
        "json" => read_json(reader)?,
        other => {
            return Err(TripError::invalid_input(format!(
                "unsupported input format '{}' for {} (expected .csv, .json or .geojson)",
                other,
                path.display()
            )))
        }
    };
    log::info!("read {} point(s) from {}", points.len(), path.display());
    Ok(points)
}

#[derive(Debug, Clone, Copy)]
struct CsvColumns {
    id: Option<usize>,
    first: usize,
    second: usize,
}

impl CsvColumns {
    fn locate(headers: &csv::StringRecord) -> Result<Self> {
        let names: Vec<String> = headers.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let find = |candidates: &[&str]| names.iter().position(|n| candidates.contains(&n.as_str()));

        let id = find(&["id", "name"]);
        let pairs: [(&[&str], &[&str]); 2] = [
            (&["lat", "latitude"], &["lon", "lng", "long", "longitude"]),
            (&["x"], &["y"]),
        ];
        for (first, second) in pairs {
            if let (Some(first), Some(second)) = (find(first), find(second)) {
                return Ok(CsvColumns { id, first, second });
            }
        }
        Err(TripError::invalid_input(format!(
            "CSV header needs x/y or lat/lon columns, found: {}",
            names.join(", ")
        )))
    }
}

/// Read points from CSV with a header row.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<RawPoint>> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let columns = CsvColumns::locate(csv_reader.headers()?)?;

    let mut points = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        let line = row + 2;
        let coordinate = |column: usize| -> Result<f64> {
            let cell = record.get(column).unwrap_or("");
            cell.parse::<f64>()
                .map_err(|_| TripError::invalid_input(format!("line {}: '{}' is not a number", line, cell)))
        };
        let first = coordinate(columns.first)?;
        let second = coordinate(columns.second)?;
        let id = columns
            .id
            .and_then(|c| record.get(c))
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        points.push(RawPoint { id, lat_or_x: first, lon_or_y: second });
    }
    Ok(points)
}

/// Read a JSON array of point records, or a GeoJSON FeatureCollection.
pub fn read_json<R: Read>(reader: R) -> Result<Vec<RawPoint>> {
    let value: Value = serde_json::from_reader(reader)?;
    if value.get("type").and_then(Value::as_str) == Some("FeatureCollection") {
        return geojson_points(&value);
    }
    Ok(serde_json::from_value(value)?)
}

/// Read Point features from a GeoJSON FeatureCollection.
pub fn read_geojson<R: Read>(reader: R) -> Result<Vec<RawPoint>> {
    let value: Value = serde_json::from_reader(reader)?;
    geojson_points(&value)
}

fn geojson_points(value: &Value) -> Result<Vec<RawPoint>> {
    if value.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(TripError::invalid_input("GeoJSON input must be a FeatureCollection"));
    }
    let features = value
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| TripError::invalid_input("FeatureCollection has no features array"))?;

    features
        .iter()
        .enumerate()
        .map(|(index, feature)| {
            let geometry = feature
                .get("geometry")
                .ok_or_else(|| TripError::invalid_input(format!("feature {} has no geometry", index)))?;
            let kind = geometry.get("type").and_then(Value::as_str).unwrap_or("none");
            if kind != "Point" {
                return Err(TripError::invalid_input(format!(
                    "feature {} is a {}, only Point geometries are supported",
                    index, kind
                )));
            }
            let coords: Vec<f64> = geometry
                .get("coordinates")
                .and_then(Value::as_array)
                .map(|c| c.iter().filter_map(Value::as_f64).collect())
                .unwrap_or_default();
            if coords.len() < 2 {
                return Err(TripError::invalid_input(format!("feature {} has malformed coordinates", index)));
            }

            let id = feature
                .get("id")
                .or_else(|| feature.pointer("/properties/id"))
                .or_else(|| feature.pointer("/properties/name"))
                .and_then(json_id);

            Ok(RawPoint { id, lat_or_x: coords[1], lon_or_y: coords[0] })
        })
        .collect()
}

fn json_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// GeoJSON FeatureCollection for a trip: the path as a LineString followed
/// by one Point per stop carrying its visit sequence.
pub fn trip_to_geojson(trip: &Trip, points: &[RawPoint]) -> Result<Value> {
    let lookup: HashMap<String, &RawPoint> = assign_ids(points).into_iter().zip(points).collect();

    let position = |p: &RawPoint| match trip.metric {
        Metric::Geodesic => json!([p.lon_or_y, p.lat_or_x]),
        Metric::Euclidean => json!([p.lat_or_x, p.lon_or_y]),
    };

    let mut path = Vec::with_capacity(trip.len() + 1);
    let mut stops = Vec::with_capacity(trip.len());
    for (sequence, id) in trip.order.iter().enumerate() {
        let point = lookup
            .get(id)
            .copied()
            .ok_or_else(|| TripError::invalid_input(format!("trip visits unknown point '{}'", id)))?;
        path.push(position(point));
        stops.push(json!({
            "type": "Feature",
            "id": id,
            "geometry": { "type": "Point", "coordinates": position(point) },
            "properties": { "id": id, "sequence": sequence },
        }));
    }
    if trip.closed_loop {
        if let Some(first) = path.first().cloned() {
            path.push(first);
        }
    }

    let mut features = vec![json!({
        "type": "Feature",
        "geometry": { "type": "LineString", "coordinates": path },
        "properties": {
            "total_cost": trip.total_cost,
            "closed_loop": trip.closed_loop,
            "metric": trip.metric,
            "strategy_used": trip.strategy_used,
        },
    })];
    features.extend(stops);

    Ok(json!({ "type": "FeatureCollection", "features": features }))
}

/// Write points as CSV with an `id` column and `x`/`y` or `lat`/`lon`
/// coordinate columns, readable by [`read_csv`].
pub fn write_points_csv<W: Write>(points: &[RawPoint], metric: Metric, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    match metric {
        Metric::Geodesic => csv_writer.write_record(["id", "lat", "lon"])?,
        Metric::Euclidean => csv_writer.write_record(["id", "x", "y"])?,
    }
    for (id, point) in assign_ids(points).into_iter().zip(points) {
        csv_writer.write_record([
            id,
            point.lat_or_x.to_string(),
            point.lon_or_y.to_string(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write a trip as pretty-printed JSON.
pub fn write_trip_json<W: Write>(trip: &Trip, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, trip)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::budget::StopReason;

    #[test]
    fn test_read_csv_xy_with_ids() {
        let data = "name, x, y\nhome, 0, 0\nshop, 3.5, -2\n";
        let points = read_csv(data.as_bytes()).unwrap();
        assert_eq!(points, vec![RawPoint::with_id("home", 0.0, 0.0), RawPoint::with_id("shop", 3.5, -2.0)]);
    }

    #[test]
    fn test_read_csv_lat_lng_without_ids() {
        let data = "Latitude,Longitude\n48.85,2.35\n45.76,4.83\n";
        let points = read_csv(data.as_bytes()).unwrap();
        assert_eq!(points[1], RawPoint::new(45.76, 4.83));
        assert!(points[0].id.is_none());
    }

    #[test]
    fn test_read_csv_reports_bad_rows() {
        let err = read_csv("x,y\n1,2\n3,abc\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 3"));
        assert!(read_csv("a,b\n1,2\n".as_bytes()).is_err());
    }

    #[test]
    fn test_written_csv_reads_back() {
        let points = vec![RawPoint::with_id("a", 48.85, 2.35), RawPoint::new(45.76, -4.83)];
        let mut out = Vec::new();
        write_points_csv(&points, Metric::Geodesic, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("id,lat,lon\n"));
        let back = read_csv(text.as_bytes()).unwrap();
        assert_eq!(back, vec![RawPoint::with_id("a", 48.85, 2.35), RawPoint::with_id("1", 45.76, -4.83)]);
    }

    #[test]
    fn test_read_geojson_points() {
        let data = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "id": 7, "geometry": {"type": "Point", "coordinates": [2.35, 48.85]}},
                {"type": "Feature", "geometry": {"type": "Point", "coordinates": [4.83, 45.76]},
                 "properties": {"name": "lyon"}}
            ]
        }"#;
        let points = read_geojson(data.as_bytes()).unwrap();
        assert_eq!(points[0], RawPoint::with_id("7", 48.85, 2.35));
        assert_eq!(points[1], RawPoint::with_id("lyon", 45.76, 4.83));
    }

    #[test]
    fn test_read_geojson_rejects_other_geometries() {
        let data = r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]}}
        ]}"#;
        let err = read_geojson(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("LineString"));
    }

    #[test]
    fn test_read_json_array() {
        let data = r#"[{"id": "a", "x": 1, "y": 2}, {"lat": 10.0, "lon": 20.0}]"#;
        let points = read_json(data.as_bytes()).unwrap();
        assert_eq!(points, vec![RawPoint::with_id("a", 1.0, 2.0), RawPoint::new(10.0, 20.0)]);
    }

    #[test]
    fn test_trip_to_geojson() {
        let points = vec![RawPoint::new(48.85, 2.35), RawPoint::with_id("lyon", 45.76, 4.83)];
        let trip = Trip {
            order: vec!["0".into(), "lyon".into()],
            total_cost: 392_000.0,
            closed_loop: true,
            strategy_used: "nearest_neighbor".into(),
            iterations_run: 0,
            elapsed_seconds: 0.0,
            metric: Metric::Geodesic,
            initial_cost: 392_000.0,
            stop_reason: StopReason::LocalOptimum,
            warnings: Vec::new(),
        };
        let geojson = trip_to_geojson(&trip, &points).unwrap();
        let features = geojson["features"].as_array().unwrap();
        assert_eq!(features.len(), 3);
        let line = features[0]["geometry"]["coordinates"].as_array().unwrap();
        assert_eq!(line.len(), 3);
        assert_eq!(line[0], json!([2.35, 48.85]));
        assert_eq!(line[2], line[0]);
        assert_eq!(features[2]["properties"]["sequence"], 1);

        let mut out = Vec::new();
        write_trip_json(&trip, &mut out).unwrap();
        let back: Trip = serde_json::from_slice(&out).unwrap();
        assert_eq!(back, trip);
    }
}

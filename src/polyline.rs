//! Encoded polyline format (precision 5) for compact point lists.
//!
//! Pairs are `(latitude, longitude)`. The codec itself comes from the
//! `polyline` crate, which works on `geo_types` coordinates ordered
//! `(x = longitude, y = latitude)`.

use crate::error::{Result, TripError};
use geo_types::Coord;

const PRECISION: u32 = 5;

/// Encode `(lat, lon)` pairs. Fails when a pair lies outside the
/// latitude/longitude range.
pub fn encode(coords: &[(f64, f64)]) -> Result<String> {
    ::polyline::encode_coordinates(coords.iter().map(|&(lat, lon)| Coord { x: lon, y: lat }), PRECISION)
        .map_err(|e| TripError::invalid_input(format!("cannot encode polyline: {}", e)))
}

/// Decode a polyline back into `(lat, lon)` pairs.
pub fn decode(encoded: &str) -> Result<Vec<(f64, f64)>> {
    let encoded = encoded.trim();
    // every value ends on a chunk without the continuation bit
    if let Some(&last) = encoded.as_bytes().last() {
        if (63..=126).contains(&last) && last - 63 >= 0x20 {
            return Err(TripError::invalid_input("polyline ends in the middle of a value"));
        }
    }

    let line = ::polyline::decode_polyline(encoded, PRECISION)
        .map_err(|e| TripError::invalid_input(format!("invalid polyline: {}", e)))?;
    Ok(line.coords().map(|c| (c.y, c.x)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";
    const SAMPLE_COORDS: [(f64, f64); 3] = [(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)];

    #[test]
    fn test_encode_reference_line() {
        assert_eq!(encode(&SAMPLE_COORDS).unwrap(), SAMPLE);
        assert_eq!(encode(&[]).unwrap(), "");
    }

    #[test]
    fn test_encode_rejects_out_of_range_pairs() {
        assert!(encode(&[(95.0, 0.0)]).is_err());
        assert!(encode(&[(0.0, 200.0)]).is_err());
    }

    #[test]
    fn test_decode_reference_line() {
        let coords = decode(SAMPLE).unwrap();
        assert_eq!(coords.len(), 3);
        for (got, want) in coords.iter().zip(SAMPLE_COORDS.iter()) {
            assert!((got.0 - want.0).abs() < 1e-9);
            assert!((got.1 - want.1).abs() < 1e-9);
        }
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        // truncated continuation chunk
        assert!(decode("_p~iF~ps|").is_err());
        // latitude without longitude
        assert!(decode("_p~iF").is_err());
        assert_eq!(decode("").unwrap(), Vec::new());
    }
}

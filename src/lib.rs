//! Trip Solver Library
//!
//! Orders a set of points into a short visiting sequence (a trip), either as a
//! closed loop back to the start or as an open path.
//!
//! # Features
//!
//! - Point validation with optional coordinate deduplication
//! - Euclidean and geodesic (haversine) distance models
//! - Construction heuristics (Nearest Neighbor, Cheapest Insertion)
//! - Local search improvement (2-opt, Or-opt) under an iteration and wall-clock
//!   budget, with cooperative cancellation
//! - CSV / JSON / GeoJSON point loading, GeoJSON trip export, encoded polylines
//! - Benchmarking and SVG visualization tools
//!
//! # Example
//!
//! ```no_run
//! use trip_solver::input::read_points;
//! use trip_solver::{solve, Metric, SolveOptions};
//!
//! // Load points
//! let points = read_points("stops.csv").unwrap();
//!
//! // Solve as an open path over geographic coordinates
//! let options = SolveOptions {
//!     metric: Metric::Geodesic,
//!     closed_loop: false,
//!     ..Default::default()
//! };
//! let trip = solve(&points, &options).unwrap();
//!
//! println!("Trip cost: {:.2} m", trip.total_cost);
//! ```

pub mod benchmark;
pub mod budget;
pub mod distance;
pub mod error;
pub mod heuristics;
pub mod input;
pub mod point;
pub mod polyline;
pub mod profile;
pub mod solver;
pub mod tour;
pub mod trip;
pub mod visualization;

pub use budget::{CancellationToken, ImprovementBudget, StopReason};
pub use distance::{build_matrix, DistanceMatrix, Metric};
pub use error::{Result, TripError};
pub use heuristics::construction::{construct, ConstructionStrategy};
pub use heuristics::local_search::improve;
pub use point::{validate, Point, RawPoint};
pub use profile::TravelProfile;
pub use solver::{solve, solve_with_cancellation, SolveOptions};
pub use tour::Tour;
pub use trip::{Trip, TripWarning};

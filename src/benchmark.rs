//! Benchmarking and experimentation module.
//!
//! Runs every construction strategy (each followed by improvement) over a
//! collection of point sets, collects per-run results, aggregates them per
//! strategy and point-set size, and exports CSV files and a text report.

use crate::budget::{ImprovementBudget, StopReason};
use crate::distance::Metric;
use crate::error::Result;
use crate::heuristics::construction::ConstructionStrategy;
use crate::point::RawPoint;
use crate::solver::{solve, SolveOptions};

use indicatif::{ProgressBar, ProgressStyle};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

/// A named point set to benchmark on.
#[derive(Debug, Clone)]
pub struct PointSet {
    pub name: String,
    pub points: Vec<RawPoint>,
}

/// Result of solving one point set with one strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Construction strategy requested
    pub strategy: String,
    /// Point set name
    pub instance: String,
    /// Number of points
    pub size: usize,
    /// Cost after construction
    pub initial_cost: f64,
    /// Cost after improvement
    pub final_cost: f64,
    pub improvement_percent: f64,
    /// Improving moves applied
    pub iterations: usize,
    /// Solve time in seconds
    pub time: f64,
    pub stop_reason: StopReason,
}

/// Aggregated statistics for one strategy at one point-set size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyStatistics {
    pub strategy: String,
    pub size: usize,
    pub runs: usize,
    /// Mean construction-only cost
    pub avg_initial_cost: f64,
    pub avg_cost: f64,
    pub std_cost: f64,
    pub best_cost: f64,
    pub worst_cost: f64,
    pub avg_improvement_percent: f64,
    pub avg_iterations: f64,
    pub avg_time: f64,
    pub total_time: f64,
    /// Runs that stopped on the budget rather than at a local optimum
    pub budget_stops: usize,
}

/// Benchmark configuration
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    /// Point-set sizes to generate
    pub sizes: Vec<usize>,
    /// Random point sets per size
    pub instances_per_size: usize,
    /// Base seed for point generation
    pub seed: u64,
    pub metric: Metric,
    pub closed_loop: bool,
    pub improvement_budget: ImprovementBudget,
    pub strategies: Vec<ConstructionStrategy>,
    /// Run solves in parallel
    pub parallel: bool,
    pub show_progress: bool,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        BenchmarkConfig {
            sizes: vec![10, 50, 100, 200],
            instances_per_size: 5,
            seed: 42,
            metric: Metric::Euclidean,
            closed_loop: true,
            improvement_budget: ImprovementBudget::default(),
            strategies: ConstructionStrategy::ALL.to_vec(),
            parallel: true,
            show_progress: true,
        }
    }
}

/// Uniform random points. Euclidean points fill a 1000 x 1000 square;
/// geodesic points fall in a city-sized box around central Paris.
pub fn random_points(n: usize, seed: u64, metric: Metric) -> Vec<RawPoint> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n)
        .map(|_| match metric {
            Metric::Euclidean => RawPoint::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)),
            Metric::Geodesic => RawPoint::new(rng.gen_range(48.80..48.90), rng.gen_range(2.25..2.42)),
        })
        .collect()
}

/// Benchmarking engine
pub struct Benchmark {
    config: BenchmarkConfig,
    results: Vec<RunResult>,
}

impl Benchmark {
    pub fn new(config: BenchmarkConfig) -> Self {
        Benchmark { config, results: Vec::new() }
    }

    /// Random point sets for every configured size.
    pub fn generate_point_sets(&self) -> Vec<PointSet> {
        let mut sets = Vec::new();
        for &size in &self.config.sizes {
            for k in 0..self.config.instances_per_size {
                let seed = self.config.seed.wrapping_add((size as u64) << 16).wrapping_add(k as u64);
                sets.push(PointSet {
                    name: format!("random-{}-{}", size, k),
                    points: random_points(size, seed, self.config.metric),
                });
            }
        }
        sets
    }

    /// Solve every point set with every configured strategy.
    pub fn run_on_point_sets(&mut self, sets: &[PointSet]) -> &[RunResult] {
        let jobs: Vec<(&PointSet, ConstructionStrategy)> = sets
            .iter()
            .flat_map(|set| self.config.strategies.iter().map(move |&s| (set, s)))
            .collect();

        log::info!("benchmarking {} run(s) over {} point set(s)", jobs.len(), sets.len());

        let progress = if self.config.show_progress {
            create_progress_bar(jobs.len() as u64)
        } else {
            ProgressBar::hidden()
        };

        let run = |&(set, strategy): &(&PointSet, ConstructionStrategy)| {
            let result = self.run_single(set, strategy);
            progress.inc(1);
            result
        };
        let mut results: Vec<RunResult> = if self.config.parallel {
            jobs.par_iter().filter_map(run).collect()
        } else {
            jobs.iter().filter_map(run).collect()
        };
        progress.finish_and_clear();

        self.results.append(&mut results);
        &self.results
    }

    /// Generate random point sets and run on them.
    pub fn run(&mut self) -> &[RunResult] {
        let sets = self.generate_point_sets();
        self.run_on_point_sets(&sets)
    }

    fn run_single(&self, set: &PointSet, strategy: ConstructionStrategy) -> Option<RunResult> {
        let options = SolveOptions {
            metric: self.config.metric,
            closed_loop: self.config.closed_loop,
            construction_strategy: strategy,
            improvement_budget: self.config.improvement_budget,
            ..Default::default()
        };
        match solve(&set.points, &options) {
            Ok(trip) => Some(RunResult {
                strategy: strategy.to_string(),
                instance: set.name.clone(),
                size: trip.len(),
                initial_cost: trip.initial_cost,
                final_cost: trip.total_cost,
                improvement_percent: trip.improvement_percent(),
                iterations: trip.iterations_run,
                time: trip.elapsed_seconds,
                stop_reason: trip.stop_reason,
            }),
            Err(e) => {
                log::error!("{} failed on {}: {}", strategy, set.name, e);
                None
            }
        }
    }

    /// Compute statistics per strategy and size
    pub fn compute_statistics(&self) -> Vec<StrategyStatistics> {
        let mut groups: BTreeMap<(usize, String), Vec<&RunResult>> = BTreeMap::new();
        for result in &self.results {
            groups.entry((result.size, result.strategy.clone())).or_default().push(result);
        }

        groups
            .into_iter()
            .map(|((size, strategy), runs)| {
                let costs: Vec<f64> = runs.iter().map(|r| r.final_cost).collect();
                let times: Vec<f64> = runs.iter().map(|r| r.time).collect();
                let std_cost = if costs.len() > 1 { costs.iter().std_dev() } else { 0.0 };

                StrategyStatistics {
                    strategy,
                    size,
                    runs: runs.len(),
                    avg_initial_cost: runs.iter().map(|r| r.initial_cost).mean(),
                    avg_cost: costs.iter().mean(),
                    std_cost,
                    best_cost: costs.iter().cloned().fold(f64::INFINITY, f64::min),
                    worst_cost: costs.iter().cloned().fold(0.0, f64::max),
                    avg_improvement_percent: runs.iter().map(|r| r.improvement_percent).mean(),
                    avg_iterations: runs.iter().map(|r| r.iterations as f64).mean(),
                    avg_time: times.iter().mean(),
                    total_time: times.iter().sum(),
                    budget_stops: runs.iter().filter(|r| r.stop_reason.is_early()).count(),
                }
            })
            .collect()
    }

    /// Export results to CSV
    pub fn export_to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for result in &self.results {
            writer.serialize(result)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Export statistics to CSV
    pub fn export_statistics_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);

        for stat in self.compute_statistics() {
            writer.serialize(stat)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Generate summary report
    pub fn generate_report(&self) -> String {
        let mut report = String::new();

        report.push_str("========================================\n");
        report.push_str("        Trip Solver Benchmark Report\n");
        report.push_str("========================================\n");
        report.push_str(&format!("Generated: {}\n", chrono::Local::now().format("%Y-%m-%d %H:%M:%S")));
        report.push_str(&format!(
            "Metric: {} | Closed loop: {} | Budget: {} moves / {}s\n\n",
            self.config.metric,
            self.config.closed_loop,
            self.config.improvement_budget.max_iterations,
            self.config.improvement_budget.max_seconds
        ));

        report.push_str("Strategy Performance Summary:\n");
        report.push_str("-".repeat(110).as_str());
        report.push('\n');
        report.push_str(&format!(
            "{:<20} {:>6} {:>6} {:>12} {:>12} {:>10} {:>12} {:>10} {:>8} {:>8}\n",
            "Strategy", "Size", "Runs", "Construct", "Avg Cost", "Std", "Best Cost", "Improve%", "Moves", "Time"
        ));
        report.push_str("-".repeat(110).as_str());
        report.push('\n');

        for stat in self.compute_statistics() {
            report.push_str(&format!(
                "{:<20} {:>6} {:>6} {:>12.2} {:>12.2} {:>10.2} {:>12.2} {:>9.2}% {:>8.1} {:>8.4}\n",
                stat.strategy,
                stat.size,
                stat.runs,
                stat.avg_initial_cost,
                stat.avg_cost,
                stat.std_cost,
                stat.best_cost,
                stat.avg_improvement_percent,
                stat.avg_iterations,
                stat.avg_time
            ));
        }

        report.push_str("-".repeat(110).as_str());
        report.push('\n');

        report.push_str("\nBest Trips per Point Set:\n");
        let mut best: BTreeMap<&str, &RunResult> = BTreeMap::new();
        for result in &self.results {
            let entry = best.entry(result.instance.as_str()).or_insert(result);
            if result.final_cost < entry.final_cost {
                *entry = result;
            }
        }
        for (instance, result) in &best {
            report.push_str(&format!("  {}: {:.2} ({})\n", instance, result.final_cost, result.strategy));
        }

        report
    }

    /// Get all results
    pub fn results(&self) -> &[RunResult] {
        &self.results
    }
}

fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} runs ETA: {eta}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Load every readable point file (.csv, .json, .geojson) from a directory,
/// sorted by point count.
pub fn load_point_sets_from_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<PointSet>> {
    let mut sets = Vec::new();

    for entry in std::fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| matches!(e.to_ascii_lowercase().as_str(), "csv" | "json" | "geojson"))
            .unwrap_or(false);
        if !supported {
            continue;
        }
        match crate::input::read_points(&path) {
            Ok(points) => sets.push(PointSet {
                name: path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
                points,
            }),
            Err(e) => log::warn!("skipping {}: {}", path.display(), e),
        }
    }

    sets.sort_by(|a, b| a.points.len().cmp(&b.points.len()).then_with(|| a.name.cmp(&b.name)));
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> BenchmarkConfig {
        BenchmarkConfig {
            sizes: vec![8, 20],
            instances_per_size: 3,
            show_progress: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_benchmark_config() {
        let config = BenchmarkConfig::default();
        assert_eq!(config.instances_per_size, 5);
        assert_eq!(config.strategies.len(), 2);
    }

    #[test]
    fn test_random_points_are_reproducible() {
        assert_eq!(random_points(10, 7, Metric::Euclidean), random_points(10, 7, Metric::Euclidean));
        assert_ne!(random_points(10, 7, Metric::Euclidean), random_points(10, 8, Metric::Euclidean));
        assert!(random_points(50, 1, Metric::Geodesic)
            .iter()
            .all(|p| (48.80..48.90).contains(&p.lat_or_x) && (2.25..2.42).contains(&p.lon_or_y)));
    }

    #[test]
    fn test_run_and_aggregate() {
        let mut bench = Benchmark::new(small_config());
        let results = bench.run();
        assert_eq!(results.len(), 2 * 3 * 2);
        assert!(results.iter().all(|r| r.final_cost <= r.initial_cost + 1e-9));

        let stats = bench.compute_statistics();
        assert_eq!(stats.len(), 4);
        for stat in &stats {
            assert_eq!(stat.runs, 3);
            assert!(stat.best_cost <= stat.avg_cost + 1e-9);
            assert!(stat.avg_cost <= stat.worst_cost + 1e-9);
            assert!(stat.std_cost >= 0.0);
            assert!(stat.avg_cost <= stat.avg_initial_cost + 1e-9);
        }

        let report = bench.generate_report();
        assert!(report.contains("nearest_neighbor"));
        assert!(report.contains("random-20-2"));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut parallel = Benchmark::new(small_config());
        let mut sequential = Benchmark::new(BenchmarkConfig { parallel: false, ..small_config() });
        let a: Vec<f64> = parallel.run().iter().map(|r| r.final_cost).collect();
        let b: Vec<f64> = sequential.run().iter().map(|r| r.final_cost).collect();
        assert_eq!(a, b);
    }
}

//! Trip Solver - Command Line Interface
//!
//! Orders point sets into short trips and compares construction strategies.

use clap::{Parser, Subcommand, ValueEnum};
use trip_solver::benchmark::{load_point_sets_from_dir, Benchmark, BenchmarkConfig, PointSet};
use trip_solver::benchmark::random_points;
use trip_solver::heuristics::construction::{construct, ConstructionStrategy, TourShape};
use trip_solver::input::{read_points, trip_to_geojson, write_points_csv, write_trip_json};
use trip_solver::point::{assign_ids, PointSetStatistics};
use trip_solver::visualization::Visualizer;
use trip_solver::{
    build_matrix, polyline, solve, validate, Metric, RawPoint, Result, SolveOptions, TravelProfile, Trip, TripError,
};

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "trip-solver")]
#[command(version = "1.0")]
#[command(about = "Orders a set of points into a short closed loop or open path")]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where the points come from
#[derive(clap::Args)]
struct PointSource {
    /// Point file (.csv, .json or .geojson)
    #[arg(short, long, required_unless_present = "polyline", conflicts_with = "polyline")]
    input: Option<PathBuf>,

    /// Encoded polyline (precision 5) of latitude/longitude points
    #[arg(long)]
    polyline: Option<String>,
}

impl PointSource {
    fn load(&self) -> Result<Vec<RawPoint>> {
        match (&self.input, &self.polyline) {
            (Some(path), _) => read_points(path),
            (None, Some(encoded)) => Ok(polyline::decode(encoded)?
                .into_iter()
                .map(|(lat, lon)| RawPoint::new(lat, lon))
                .collect()),
            (None, None) => Err(TripError::invalid_input("no input file or polyline given")),
        }
    }

    /// Polylines always carry latitude/longitude.
    fn implied_metric(&self) -> Option<Metric> {
        self.polyline.as_ref().map(|_| Metric::Geodesic)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a trip over a point set
    Solve {
        #[command(flatten)]
        source: PointSource,

        /// JSON file with solve options; flags below override it
        #[arg(long)]
        options: Option<PathBuf>,

        /// Distance metric
        #[arg(short, long, value_enum)]
        metric: Option<MetricArg>,

        /// Construction strategy
        #[arg(short, long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Open path instead of returning to the start
        #[arg(long)]
        open: bool,

        /// Identifier of the first point
        #[arg(long)]
        start: Option<String>,

        /// Identifier of the last point (open paths only)
        #[arg(long)]
        end: Option<String>,

        /// Drop points with repeated coordinates
        #[arg(long)]
        dedupe: bool,

        /// Reject point sets larger than this
        #[arg(long)]
        max_points: Option<usize>,

        /// Maximum improving moves
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Improvement time limit in seconds
        #[arg(short = 't', long)]
        max_seconds: Option<f64>,

        /// Travel profile for time estimates (geodesic only)
        #[arg(short, long, value_enum)]
        profile: Option<ProfileArg>,

        /// Output trip to JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output trip as GeoJSON
        #[arg(long)]
        geojson: Option<PathBuf>,

        /// Draw the trip (.svg, or .png)
        #[arg(long)]
        visualize: Option<PathBuf>,

        /// Print the encoded polyline of the trip
        #[arg(long)]
        print_polyline: bool,
    },

    /// Analyze a point set
    Analyze {
        #[command(flatten)]
        source: PointSource,

        /// Distance metric
        #[arg(short, long, value_enum)]
        metric: Option<MetricArg>,
    },

    /// Compare construction strategies on one point set
    Compare {
        #[command(flatten)]
        source: PointSource,

        /// Distance metric
        #[arg(short, long, value_enum)]
        metric: Option<MetricArg>,

        /// Open path instead of returning to the start
        #[arg(long)]
        open: bool,

        /// Improvement time limit in seconds
        #[arg(short = 't', long, default_value = "5")]
        max_seconds: f64,

        /// Output CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run benchmarks on generated point sets or a directory of point files
    Benchmark {
        /// Directory of point files; random point sets are generated when absent
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Sizes of generated point sets
        #[arg(long, value_delimiter = ',', default_value = "10,50,100,200")]
        sizes: Vec<usize>,

        /// Generated point sets per size
        #[arg(short = 'n', long, default_value = "5")]
        instances: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Distance metric
        #[arg(short, long, value_enum, default_value = "euclidean")]
        metric: MetricArg,

        /// Open paths instead of closed loops
        #[arg(long)]
        open: bool,

        /// Maximum improving moves per run
        #[arg(long, default_value = "1000")]
        max_iterations: usize,

        /// Improvement time limit per run
        #[arg(short = 't', long, default_value = "5")]
        max_seconds: f64,

        /// Run sequentially
        #[arg(long)]
        sequential: bool,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,
    },

    /// Generate a random point set
    Generate {
        /// Number of points
        #[arg(short = 'n', long)]
        count: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Distance metric the points are meant for
        #[arg(short, long, value_enum, default_value = "euclidean")]
        metric: MetricArg,

        /// Output file (.csv or .json)
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum MetricArg {
    /// Straight-line distance on planar coordinates
    Euclidean,
    /// Great-circle distance in metres on latitude/longitude
    Geodesic,
}

impl From<MetricArg> for Metric {
    fn from(arg: MetricArg) -> Self {
        match arg {
            MetricArg::Euclidean => Metric::Euclidean,
            MetricArg::Geodesic => Metric::Geodesic,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum StrategyArg {
    /// Nearest Neighbor construction
    Nn,
    /// Cheapest Insertion construction
    Insertion,
}

impl From<StrategyArg> for ConstructionStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Nn => ConstructionStrategy::NearestNeighbor,
            StrategyArg::Insertion => ConstructionStrategy::CheapestInsertion,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum ProfileArg {
    Car,
    Bike,
    Foot,
}

impl From<ProfileArg> for TravelProfile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::Car => TravelProfile::Car,
            ProfileArg::Bike => TravelProfile::Bike,
            ProfileArg::Foot => TravelProfile::Foot,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let outcome = match cli.command {
        Commands::Solve {
            source,
            options,
            metric,
            strategy,
            open,
            start,
            end,
            dedupe,
            max_points,
            max_iterations,
            max_seconds,
            profile,
            output,
            geojson,
            visualize,
            print_polyline,
        } => {
            let overrides = SolveOverrides {
                metric: metric.map(Metric::from).or_else(|| source.implied_metric()),
                strategy: strategy.map(ConstructionStrategy::from),
                open,
                start,
                end,
                dedupe,
                max_points,
                max_iterations,
                max_seconds,
            };
            let outputs = SolveOutputs { output, geojson, visualize, print_polyline };
            solve_points(&source, options.as_deref(), overrides, profile.map(TravelProfile::from), outputs, cli.verbose)
        }

        Commands::Analyze { source, metric } => {
            analyze_points(&source, metric.map(Metric::from).or_else(|| source.implied_metric()).unwrap_or_default())
        }

        Commands::Compare { source, metric, open, max_seconds, output } => {
            let metric = metric.map(Metric::from).or_else(|| source.implied_metric()).unwrap_or_default();
            compare_strategies(&source, metric, !open, max_seconds, output)
        }

        Commands::Benchmark { dir, sizes, instances, seed, metric, open, max_iterations, max_seconds, sequential, output } => {
            let config = BenchmarkConfig {
                sizes,
                instances_per_size: instances,
                seed,
                metric: metric.into(),
                closed_loop: !open,
                improvement_budget: trip_solver::ImprovementBudget::new(max_iterations, max_seconds),
                parallel: !sequential,
                ..Default::default()
            };
            run_benchmark(dir.as_deref(), config, &output)
        }

        Commands::Generate { count, seed, metric, output } => generate_points(count, seed, metric.into(), &output),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Flag values layered over the options file
struct SolveOverrides {
    metric: Option<Metric>,
    strategy: Option<ConstructionStrategy>,
    open: bool,
    start: Option<String>,
    end: Option<String>,
    dedupe: bool,
    max_points: Option<usize>,
    max_iterations: Option<usize>,
    max_seconds: Option<f64>,
}

impl SolveOverrides {
    fn apply(self, options: &mut SolveOptions) {
        if let Some(metric) = self.metric {
            options.metric = metric;
        }
        if let Some(strategy) = self.strategy {
            options.construction_strategy = strategy;
        }
        if self.open {
            options.closed_loop = false;
        }
        if self.start.is_some() {
            options.start_point_id = self.start;
        }
        if self.end.is_some() {
            options.end_point_id = self.end;
        }
        if self.dedupe {
            options.dedupe = true;
        }
        if let Some(n) = self.max_points {
            options.max_points = n;
        }
        if let Some(n) = self.max_iterations {
            options.improvement_budget.max_iterations = n;
        }
        if let Some(s) = self.max_seconds {
            options.improvement_budget.max_seconds = s;
        }
    }
}

struct SolveOutputs {
    output: Option<PathBuf>,
    geojson: Option<PathBuf>,
    visualize: Option<PathBuf>,
    print_polyline: bool,
}

fn solve_points(
    source: &PointSource,
    options_path: Option<&Path>,
    overrides: SolveOverrides,
    profile: Option<TravelProfile>,
    outputs: SolveOutputs,
    verbose: bool,
) -> Result<()> {
    let points = source.load()?;

    let mut options = match options_path {
        Some(path) => SolveOptions::from_json_file(path)?,
        None => SolveOptions::default(),
    };
    overrides.apply(&mut options);

    if verbose {
        println!("Loaded {} point(s)", points.len());
        println!("Options: {}", serde_json::to_string(&options)?);
    }

    let trip = solve(&points, &options)?;

    println!("\n========== Results ==========");
    print!("{}", trip);

    if trip.metric == Metric::Geodesic {
        let profiles = match profile {
            Some(p) => vec![p],
            None => TravelProfile::ALL.to_vec(),
        };
        for p in profiles {
            if let Some(time) = trip.estimated_travel_time(p) {
                println!("  {} time: {}", p.display_name(), format_duration(time.as_secs()));
            }
        }
    } else if profile.is_some() {
        println!("  Travel time estimates need the geodesic metric");
    }

    if outputs.print_polyline {
        if trip.metric == Metric::Geodesic {
            let coords = ordered_coordinates(&points, &trip)?;
            println!("\nPolyline: {}", polyline::encode(&coords)?);
        } else {
            println!("\nPolylines need the geodesic metric");
        }
    }

    if let Some(path) = outputs.output {
        write_trip_json(&trip, BufWriter::new(File::create(&path)?))?;
        println!("\nTrip saved to {:?}", path);
    }

    if let Some(path) = outputs.geojson {
        let geojson = trip_to_geojson(&trip, &points)?;
        serde_json::to_writer_pretty(BufWriter::new(File::create(&path)?), &geojson)?;
        println!("GeoJSON saved to {:?}", path);
    }

    if let Some(path) = outputs.visualize {
        let viz = Visualizer::new();
        let svg = viz.generate_svg(&points, &trip)?;
        let wants_png = path.extension().map(|e| e.eq_ignore_ascii_case("png")).unwrap_or(false);
        if wants_png {
            match viz.save_png(&svg, &path) {
                Ok(()) => println!("Visualization saved to {:?}", path),
                Err(e) => {
                    let svg_path = path.with_extension("svg");
                    viz.save_svg(&svg, &svg_path)?;
                    println!("PNG conversion failed ({}). Saved SVG to {:?}", e, svg_path);
                }
            }
        } else {
            viz.save_svg(&svg, &path)?;
            println!("Visualization saved to {:?}", path);
        }
    }

    Ok(())
}

/// Input coordinates in trip order, closing the loop when the trip does.
fn ordered_coordinates(points: &[RawPoint], trip: &Trip) -> Result<Vec<(f64, f64)>> {
    let ids = assign_ids(points);
    let mut coords = trip
        .order
        .iter()
        .map(|id| {
            ids.iter()
                .zip(points)
                .find(|(candidate, _)| *candidate == id)
                .map(|(_, p)| (p.lat_or_x, p.lon_or_y))
                .ok_or_else(|| TripError::invalid_input(format!("trip visits unknown point '{}'", id)))
        })
        .collect::<Result<Vec<_>>>()?;
    if trip.closed_loop {
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
    }
    Ok(coords)
}

fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    if hours > 0 {
        format!("{}h {:02}min", hours, minutes)
    } else {
        format!("{}min", minutes)
    }
}

fn analyze_points(source: &PointSource, metric: Metric) -> Result<()> {
    let raw = source.load()?;
    let validated = validate(&raw, metric, false)?;
    let points = &validated.points;

    println!("========== Point Set Analysis ==========\n");

    let matrix = match build_matrix(points, metric) {
        Ok(matrix) => matrix,
        Err(TripError::DegenerateInput) => {
            println!("All {} points share the same coordinates; every trip costs 0.", points.len());
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    println!("{}", PointSetStatistics::compute(points, &matrix));

    println!("Quick Trip Estimates (closed loop from the first point):");
    for strategy in ConstructionStrategy::ALL {
        let tour = construct(&matrix, strategy, &TourShape::closed(0));
        println!("  {}: {:.2}", strategy, tour.cost(&matrix));
    }
    let trip = solve(&raw, &SolveOptions { metric, ..Default::default() })?;
    println!("  {} + 2-opt/Or-opt: {:.2}", trip.strategy_used, trip.total_cost);

    Ok(())
}

fn compare_strategies(
    source: &PointSource,
    metric: Metric,
    closed_loop: bool,
    max_seconds: f64,
    output: Option<PathBuf>,
) -> Result<()> {
    let points = source.load()?;
    let name = source
        .input
        .as_ref()
        .and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "polyline".to_string());

    println!("Comparing strategies on {} (n={})...\n", name, points.len());

    let config = BenchmarkConfig {
        metric,
        closed_loop,
        improvement_budget: trip_solver::ImprovementBudget::new(usize::MAX, max_seconds),
        parallel: false,
        show_progress: false,
        ..Default::default()
    };
    let mut benchmark = Benchmark::new(config);
    let results = benchmark.run_on_point_sets(&[PointSet { name, points }]);
    if results.is_empty() {
        return Err(TripError::invalid_input("no strategy produced a trip for this point set"));
    }

    println!(
        "{:<20} {:>14} {:>14} {:>10} {:>8} {:>10}",
        "Strategy", "Construction", "Improved", "Gain%", "Moves", "Time"
    );
    println!("{}", "-".repeat(82));
    for r in results {
        println!(
            "{:<20} {:>14.2} {:>14.2} {:>9.2}% {:>8} {:>10.4}",
            r.strategy, r.initial_cost, r.final_cost, r.improvement_percent, r.iterations, r.time
        );
    }

    if let Some(path) = output {
        benchmark.export_to_csv(&path)?;
        println!("\nResults exported to {:?}", path);
    }

    Ok(())
}

fn run_benchmark(dir: Option<&Path>, config: BenchmarkConfig, output: &Path) -> Result<()> {
    let mut benchmark = Benchmark::new(config);

    let sets = match dir {
        Some(dir) => {
            println!("Loading point sets from {:?}...", dir);
            let sets = load_point_sets_from_dir(dir)?;
            println!("Found {} point set(s)", sets.len());
            if sets.is_empty() {
                return Err(TripError::invalid_input(format!("no point files found in {}", dir.display())));
            }
            sets
        }
        None => benchmark.generate_point_sets(),
    };
    benchmark.run_on_point_sets(&sets);

    std::fs::create_dir_all(output)?;

    let results_path = output.join("results.csv");
    benchmark.export_to_csv(&results_path)?;
    println!("\nResults exported to {:?}", results_path);

    let stats_path = output.join("statistics.csv");
    benchmark.export_statistics_csv(&stats_path)?;
    println!("Statistics exported to {:?}", stats_path);

    let report = benchmark.generate_report();
    println!("\n{}", report);

    let report_path = output.join("report.txt");
    std::fs::write(&report_path, &report)?;
    println!("Report saved to {:?}", report_path);

    Ok(())
}

fn generate_points(count: usize, seed: u64, metric: Metric, output: &Path) -> Result<()> {
    let points = random_points(count, seed, metric);
    let writer = BufWriter::new(File::create(output)?);

    let is_json = output.extension().map(|e| e.eq_ignore_ascii_case("json")).unwrap_or(false);
    if is_json {
        serde_json::to_writer_pretty(writer, &points)?;
    } else {
        write_points_csv(&points, metric, writer)?;
    }

    println!("Generated {} {} point(s) in {:?}", count, metric, output);
    Ok(())
}

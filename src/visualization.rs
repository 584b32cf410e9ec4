//! Visualization utilities for trips.
//!
//! Generates SVG drawings of a trip (legs coloured from green to red along
//! the visiting order) and converts them to PNG.

use crate::distance::Metric;
use crate::error::{Result, TripError};
use crate::point::{assign_ids, RawPoint};
use crate::trip::Trip;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const START_COLOR: (u8, u8, u8) = (46, 204, 113);
const END_COLOR: (u8, u8, u8) = (231, 76, 60);

/// SVG visualization generator
pub struct Visualizer {
    /// Canvas width
    pub width: f64,
    /// Canvas height
    pub height: f64,
    /// Margin
    pub margin: f64,
    /// Stop marker radius
    pub node_radius: f64,
    /// Draw point identifiers next to the markers
    pub show_labels: bool,
}

impl Default for Visualizer {
    fn default() -> Self {
        Visualizer {
            width: 800.0,
            height: 800.0,
            margin: 50.0,
            node_radius: 6.0,
            show_labels: true,
        }
    }
}

/// Colour of leg `index` out of `count`, interpolated from green to red.
pub fn leg_color(index: usize, count: usize) -> String {
    let t = if count > 1 { index as f64 / (count - 1) as f64 } else { 0.0 };
    let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
    format!(
        "#{:02x}{:02x}{:02x}",
        mix(START_COLOR.0, END_COLOR.0),
        mix(START_COLOR.1, END_COLOR.1),
        mix(START_COLOR.2, END_COLOR.2)
    )
}

impl Visualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate an SVG drawing of `trip` over the input points.
    pub fn generate_svg(&self, points: &[RawPoint], trip: &Trip) -> Result<String> {
        let lookup: HashMap<String, (f64, f64)> = assign_ids(points)
            .into_iter()
            .zip(points.iter().map(|p| plot_coords(p, trip.metric)))
            .collect();
        let stops: Vec<(&str, (f64, f64))> = trip
            .order
            .iter()
            .map(|id| {
                lookup
                    .get(id)
                    .map(|&xy| (id.as_str(), xy))
                    .ok_or_else(|| TripError::invalid_input(format!("trip visits unknown point '{}'", id)))
            })
            .collect::<Result<_>>()?;

        let (min_x, max_x, min_y, max_y) = bounds(stops.iter().map(|(_, xy)| *xy));
        let scale_x = (self.width - 2.0 * self.margin) / (max_x - min_x).max(f64::EPSILON);
        let scale_y = (self.height - 2.0 * self.margin) / (max_y - min_y).max(f64::EPSILON);
        let scale = scale_x.min(scale_y);
        let transform = |(x, y): (f64, f64)| -> (f64, f64) {
            (
                self.margin + (x - min_x) * scale,
                self.height - self.margin - (y - min_y) * scale,
            )
        };

        let mut svg = String::new();
        svg.push_str(&format!(
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="0 0 {} {}">
<style>
    .stop {{ fill: #3498db; stroke: #2c3e50; stroke-width: 1.5; }}
    .start {{ fill: #2ecc71; stroke: #1e8449; stroke-width: 2; }}
    .end {{ fill: #e74c3c; stroke: #943126; stroke-width: 2; }}
    .leg {{ stroke-width: 2.5; fill: none; stroke-linecap: round; }}
    .label {{ font-family: Arial; font-size: 10px; fill: #2c3e50; }}
    .title {{ font-family: Arial; font-size: 14px; fill: #2c3e50; font-weight: bold; }}
</style>
<rect width="100%" height="100%" fill="#ecf0f1"/>
"##,
            self.width, self.height, self.width, self.height
        ));

        let cost = match trip.metric {
            Metric::Geodesic => format!("{:.2} km", trip.total_cost / 1000.0),
            Metric::Euclidean => format!("{:.2}", trip.total_cost),
        };
        svg.push_str(&format!(
            r##"<text x="{}" y="25" class="title">{} stops | Cost: {} | {} | {}</text>
"##,
            self.margin,
            trip.len(),
            cost,
            trip.strategy_used,
            if trip.closed_loop { "closed loop" } else { "open path" }
        ));

        let legs = if trip.closed_loop && stops.len() > 1 { stops.len() } else { stops.len().saturating_sub(1) };
        for k in 0..legs {
            let (x1, y1) = transform(stops[k].1);
            let (x2, y2) = transform(stops[(k + 1) % stops.len()].1);
            svg.push_str(&format!(
                r##"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" class="leg" stroke="{}"/>
"##,
                x1,
                y1,
                x2,
                y2,
                leg_color(k, legs)
            ));
        }

        let last = stops.len().saturating_sub(1);
        for (k, (id, xy)) in stops.iter().enumerate() {
            let (x, y) = transform(*xy);
            let (class, radius) = if k == 0 {
                ("start", self.node_radius * 1.6)
            } else if k == last && !trip.closed_loop {
                ("end", self.node_radius * 1.6)
            } else {
                ("stop", self.node_radius)
            };
            svg.push_str(&format!(
                r##"<circle cx="{:.2}" cy="{:.2}" r="{}" class="{}"/>
"##,
                x, y, radius, class
            ));
            if self.show_labels {
                svg.push_str(&format!(
                    r##"<text x="{:.2}" y="{:.2}" class="label" text-anchor="middle">{}</text>
"##,
                    x,
                    y - radius - 3.0,
                    escape_xml(id)
                ));
            }
        }

        let legend_y = self.height - 30.0;
        svg.push_str(&format!(
            r##"<circle cx="{}" cy="{}" r="7" class="start"/>
<text x="{}" y="{}" class="label">Start</text>
<circle cx="{}" cy="{}" r="7" class="end"/>
<text x="{}" y="{}" class="label">End</text>
"##,
            self.margin + 7.0,
            legend_y + 7.0,
            self.margin + 20.0,
            legend_y + 11.0,
            self.margin + 77.0,
            legend_y + 7.0,
            self.margin + 90.0,
            legend_y + 11.0
        ));

        svg.push_str("</svg>");
        Ok(svg)
    }

    /// Save SVG to file
    pub fn save_svg<P: AsRef<Path>>(&self, svg: &str, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(svg.as_bytes())?;
        Ok(())
    }

    /// Save SVG as PNG. Uses the built-in renderer with the `png` feature,
    /// otherwise tries `rsvg-convert`, then `magick`, then `inkscape`.
    pub fn save_png<P: AsRef<Path>>(&self, svg: &str, path: P) -> Result<()> {
        write_png(svg, path.as_ref())
    }
}

#[cfg(feature = "png")]
fn write_png(svg: &str, path: &Path) -> Result<()> {
    use resvg::tiny_skia::{Pixmap, Transform};
    use resvg::usvg::{self, TreeParsing};

    let render_error = |msg: String| TripError::Io(std::io::Error::new(std::io::ErrorKind::Other, msg));

    let tree = usvg::Tree::from_str(svg, &usvg::Options::default())
        .map_err(|e| render_error(format!("usvg parse error: {}", e)))?;
    let size = tree.size.to_int_size();
    let mut pixmap = Pixmap::new(size.width().max(1), size.height().max(1))
        .ok_or_else(|| render_error("failed to create pixmap".to_string()))?;
    resvg::Tree::from_usvg(&tree).render(Transform::default(), &mut pixmap.as_mut());
    pixmap
        .save_png(path)
        .map_err(|e| render_error(format!("save_png failed: {}", e)))
}

#[cfg(not(feature = "png"))]
fn write_png(svg: &str, path: &Path) -> Result<()> {
    use std::process::Command;

    let tmp_svg = path.with_extension("svg.tmp");
    std::fs::write(&tmp_svg, svg)?;
    let input = tmp_svg.to_string_lossy().into_owned();
    let output = path.to_string_lossy().into_owned();

    let attempts: [(&str, Vec<&str>); 3] = [
        ("rsvg-convert", vec!["-o", output.as_str(), input.as_str()]),
        ("magick", vec!["convert", input.as_str(), output.as_str()]),
        ("inkscape", vec![input.as_str(), "--export-type=png", "--export-filename", output.as_str()]),
    ];

    let mut converted = false;
    for (program, args) in &attempts {
        match Command::new(program).args(args).status() {
            Ok(status) if status.success() => {
                log::debug!("converted {} with {}", output, program);
                converted = true;
                break;
            }
            Ok(status) => log::debug!("{} exited with {}", program, status),
            Err(e) => log::debug!("{} unavailable: {}", program, e),
        }
    }

    let _ = std::fs::remove_file(&tmp_svg);
    if converted {
        Ok(())
    } else {
        Err(TripError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no SVG to PNG converter succeeded (tried rsvg-convert, magick, inkscape)",
        )))
    }
}

/// Planar drawing coordinates: longitude runs along x in geodesic mode.
fn plot_coords(p: &RawPoint, metric: Metric) -> (f64, f64) {
    match metric {
        Metric::Geodesic => (p.lon_or_y, p.lat_or_x),
        Metric::Euclidean => (p.lat_or_x, p.lon_or_y),
    }
}

fn bounds(coords: impl Iterator<Item = (f64, f64)>) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;

    for (x, y) in coords {
        min_x = min_x.min(x);
        max_x = max_x.max(x);
        min_y = min_y.min(y);
        max_y = max_y.max(y);
    }

    (min_x, max_x, min_y, max_y)
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

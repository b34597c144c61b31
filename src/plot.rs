use crate::error::AppError;
use crate::summary::InteractionRow;
use plotters::prelude::*;
use regex::Regex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::error::Error;
use std::path::Path;
use std::sync::OnceLock;

/// Figures are laid out at 100 px per inch; marker sizes are in points.
const PX_PER_PT: f64 = 100.0 / 72.0;
/// Cap on legend marker radius so large markers do not overrun the panel
const LEGEND_MAX_RADIUS: i32 = 18;

fn hex_shade_pattern() -> Option<&'static Regex> {
    static HEX: OnceLock<Option<Regex>> = OnceLock::new();
    HEX.get_or_init(|| Regex::new(r"^#([0-9a-f]{2})([0-9a-f]{2})([0-9a-f]{2})$").ok())
        .as_ref()
}

/// Resolve a shade name (`grey`, `orange`, ...) or `#rrggbb` hex string
pub fn parse_shade(name: &str) -> Option<RGBColor> {
    let name = name.trim().to_lowercase();
    let named = match name.as_str() {
        "blue" => Some(RGBColor(0, 0, 255)),
        "orange" => Some(RGBColor(255, 165, 0)),
        "grey" | "gray" => Some(RGBColor(128, 128, 128)),
        "red" => Some(RGBColor(255, 0, 0)),
        "green" => Some(RGBColor(0, 128, 0)),
        "purple" => Some(RGBColor(128, 0, 128)),
        "black" => Some(RGBColor(0, 0, 0)),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    let caps = hex_shade_pattern()?.captures(&name)?;
    let channel = |i: usize| u8::from_str_radix(&caps[i], 16).ok();
    Some(RGBColor(channel(1)?, channel(2)?, channel(3)?))
}

/// Category order of both axes
#[derive(Debug, Clone, PartialEq)]
pub struct Categories {
    /// Regulated proteins, alphabetical
    pub x: Vec<String>,
    /// Regulators in row order, i.e. the reordered rank order
    pub y: Vec<String>,
}

impl Categories {
    /// Only rows with a plotted threshold contribute categories.
    pub fn from_rows<R: InteractionRow>(rows: &[R], thresholds: &[u32]) -> Self {
        let mut x = BTreeSet::new();
        let mut y = Vec::new();
        let mut seen_y = HashSet::new();
        for row in rows.iter().filter(|r| thresholds.contains(&r.pae())) {
            x.insert(row.entity_a().to_string());
            if seen_y.insert(row.entity_b()) {
                y.push(row.entity_b().to_string());
            }
        }
        Self {
            x: x.into_iter().collect(),
            y,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty()
    }
}

/// The subset's own extrema; `None` for an empty subset
pub fn value_range<I: IntoIterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    values.into_iter().fold(None, |acc, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Map `value` linearly from `[min, max]` onto `[min*scaling, max*scaling]`.
/// The result is a marker area in pt^2.
pub fn marker_area(value: f64, range: (f64, f64), scaling: f64) -> f64 {
    let (lo, hi) = range;
    let (size_lo, size_hi) = (lo * scaling, hi * scaling);
    if hi <= lo {
        return size_hi;
    }
    size_lo + (value - lo) / (hi - lo) * (size_hi - size_lo)
}

pub fn marker_radius_px(area_pt2: f64) -> i32 {
    (area_pt2.max(0.0).sqrt() / 2.0 * PX_PER_PT).round() as i32
}

#[derive(Debug, Clone, PartialEq)]
pub struct BubblePoint {
    pub x: usize,
    pub y: usize,
    pub radius: i32,
}

/// One threshold's bubbles, ready to draw
#[derive(Debug, Clone)]
pub struct BubbleLayer {
    pub threshold: u32,
    pub shade: RGBColor,
    pub range: (f64, f64),
    pub scaling: f64,
    pub points: Vec<BubblePoint>,
}

/// Build the layers in the given order (background first). Thresholds with
/// no rows are returned separately instead of producing a layer.
pub fn build_layers<R, F>(
    rows: &[R],
    shades: &[(u32, RGBColor)],
    scaling: f64,
    categories: &Categories,
    metric: F,
) -> (Vec<BubbleLayer>, Vec<u32>)
where
    R: InteractionRow,
    F: Fn(&R) -> f64,
{
    let x_ix: HashMap<&str, usize> = categories
        .x
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    // First regulator is drawn at the top
    let ny = categories.y.len();
    let y_ix: HashMap<&str, usize> = categories
        .y
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), ny - 1 - i))
        .collect();

    let mut layers = Vec::new();
    let mut skipped = Vec::new();
    for &(threshold, shade) in shades {
        let subset: Vec<&R> = rows.iter().filter(|r| r.pae() == threshold).collect();
        let Some(range) = value_range(subset.iter().map(|r| metric(r))) else {
            skipped.push(threshold);
            continue;
        };
        let points = subset
            .iter()
            .filter_map(|r| {
                let x = *x_ix.get(r.entity_a())?;
                let y = *y_ix.get(r.entity_b())?;
                Some(BubblePoint {
                    x,
                    y,
                    radius: marker_radius_px(marker_area(metric(r), range, scaling)),
                })
            })
            .collect();
        layers.push(BubbleLayer {
            threshold,
            shade,
            range,
            scaling,
            points,
        });
    }
    (layers, skipped)
}

/// Text around the chart
#[derive(Debug, Clone)]
pub struct FigureLabels<'a> {
    pub x_desc: &'a str,
    pub y_desc: &'a str,
    /// Name of the sized metric, used as legend title
    pub metric: &'a str,
}

/// Draw all layers on one SVG figure, legend to the right of the plot area.
pub fn draw_bubble_figure(
    path: &Path,
    size: (u32, u32),
    labels: &FigureLabels,
    categories: &Categories,
    layers: &[BubbleLayer],
) -> Result<(), AppError> {
    render_bubble_figure(path, size, labels, categories, layers).map_err(|e| AppError::Render {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn segment_label(v: &SegmentValue<usize>, names: &[String]) -> String {
    if let SegmentValue::CenterOf(idx) = v {
        if let Some(name) = names.get(*idx) {
            return name.clone();
        }
    }
    String::new()
}

fn format_value(v: f64) -> String {
    if v == 0.0 || v.abs() >= 1.0 {
        format!("{:.1}", v)
    } else {
        format!("{:.2e}", v)
    }
}

fn render_bubble_figure(
    path: &Path,
    size: (u32, u32),
    labels: &FigureLabels,
    categories: &Categories,
    layers: &[BubbleLayer],
) -> Result<(), Box<dyn Error>> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    if categories.is_empty() || layers.is_empty() {
        root.draw(&Text::new(
            "No interactions at the configured thresholds",
            (20, (size.1 / 2) as i32),
            ("sans-serif", 18).into_font().color(&BLACK),
        ))?;
        root.present()?;
        return Ok(());
    }

    let legend_width = (size.0 / 4).max(150).min(size.0 / 2);
    let (plot_area, legend_area) = root.split_horizontally(size.0 - legend_width);

    let nx = categories.x.len();
    let ny = categories.y.len();
    let y_bottom_up: Vec<String> = categories.y.iter().rev().cloned().collect();

    let mut chart = ChartBuilder::on(&plot_area)
        .margin(20)
        .x_label_area_size(130)
        .y_label_area_size(90)
        .build_cartesian_2d((0..nx).into_segmented(), (0..ny).into_segmented())?;

    let x_label_style = TextStyle::from(("sans-serif", 12)).transform(FontTransform::Rotate270);

    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(nx)
        .y_labels(ny)
        .x_label_style(x_label_style)
        .y_label_style(("sans-serif", 12))
        .x_label_formatter(&|v| segment_label(v, &categories.x))
        .y_label_formatter(&|v| segment_label(v, &y_bottom_up))
        .x_desc(labels.x_desc)
        .y_desc(labels.y_desc)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for layer in layers {
        chart.draw_series(layer.points.iter().map(|p| {
            Circle::new(
                (SegmentValue::CenterOf(p.x), SegmentValue::CenterOf(p.y)),
                p.radius,
                layer.shade.filled(),
            )
        }))?;
        // White edge keeps overlapping bubbles of different layers apart
        chart.draw_series(layer.points.iter().map(|p| {
            Circle::new(
                (SegmentValue::CenterOf(p.x), SegmentValue::CenterOf(p.y)),
                p.radius,
                WHITE.stroke_width(1),
            )
        }))?;
    }

    draw_legend(&legend_area, labels.metric, layers)?;

    root.present()?;
    Ok(())
}

fn draw_legend<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    metric: &str,
    layers: &[BubbleLayer],
) -> Result<(), Box<dyn Error>>
where
    DB::ErrorType: 'static,
{
    let font = ("sans-serif", 13).into_font().color(&BLACK);
    let title = ("sans-serif", 14).into_font().color(&BLACK);
    let x_marker = 22;
    let x_text = 48;
    let mut y = 40;

    area.draw(&Text::new("PAE", (10, y), title.clone()))?;
    y += 24;
    // Foreground layer listed first
    for layer in layers.iter().rev() {
        area.draw(&Circle::new((x_marker, y + 6), 6, layer.shade.filled()))?;
        area.draw(&Text::new(format!("{}", layer.threshold), (x_text, y), font.clone()))?;
        y += 22;
    }

    y += 16;
    area.draw(&Text::new(metric.to_string(), (10, y), title))?;
    y += 24;
    for layer in layers.iter().rev() {
        let (lo, hi) = layer.range;
        for v in [lo, hi] {
            let r = marker_radius_px(marker_area(v, layer.range, layer.scaling)).min(LEGEND_MAX_RADIUS);
            let cy = y + r.max(6);
            area.draw(&Circle::new((x_marker, cy), r, layer.shade.filled()))?;
            area.draw(&Text::new(format_value(v), (x_text, cy - 6), font.clone()))?;
            y += 2 * r.max(6) + 8;
        }
        y += 6;
    }
    Ok(())
}

use crate::config::PipelineConfig;
use crate::error::AppError;
use crate::export::{export_threshold_tables, out_of_threshold_count, MetricKind};
use crate::norm::{normalize, NormalizedRecord, SizeTable};
use crate::order::RegulatorOrder;
use crate::plot::{build_layers, draw_bubble_figure, parse_shade, Categories, FigureLabels};
use crate::progress::{format_time_used, StageClock};
use crate::summary::{load_interactions, InteractionRecord, InteractionRow};
use crate::Logger;
use plotters::style::RGBColor;
use std::error::Error;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    /// Render the SVG figures; `false` writes tables only
    pub plot: bool,
}

/// Counts and written files of one run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub loaded: usize,
    pub out_of_threshold: usize,
    pub normalized: usize,
    pub dropped_missing_size: usize,
    pub unranked_rows: usize,
    pub tables: Vec<PathBuf>,
    pub figures: Vec<PathBuf>,
    /// (metric, threshold) layers left out for lack of rows
    pub skipped_layers: Vec<(MetricKind, u32)>,
}

fn resolve_shades(cfg: &PipelineConfig) -> Result<Vec<(u32, RGBColor)>, AppError> {
    cfg.thresholds_back_to_front()
        .into_iter()
        .map(|t| {
            cfg.shade_name(t)
                .and_then(parse_shade)
                .map(|shade| (t, shade))
                .ok_or_else(|| AppError::ConfigInvalid(format!("no usable shade for threshold {}", t)))
        })
        .collect()
}

fn ensure_dir(stage: &'static str, dir: &Path) -> Result<(), AppError> {
    std::fs::create_dir_all(dir).map_err(|source| AppError::OutputDir {
        stage,
        path: dir.to_path_buf(),
        source,
    })
}

#[allow(clippy::too_many_arguments)]
fn export_and_plot<R, F>(
    rows: &[R],
    kind: MetricKind,
    metric_name: &str,
    scaling: f64,
    metric: F,
    cfg: &PipelineConfig,
    opts: RunOptions,
    summary: &mut RunSummary,
    logger: &mut Logger,
) -> Result<(), Box<dyn Error>>
where
    R: InteractionRow,
    F: Fn(&R) -> f64,
{
    let written = export_threshold_tables(rows, &cfg.thresholds, kind, &cfg.tables_dir())?;
    for (t, path, n) in written {
        logger.log(&format!("Exported {} rows at PAE {} to {}", n, t, path.display()))?;
        if n == 0 {
            logger.log(&format!(
                "Warning: no {} rows at PAE {}; wrote header-only table",
                kind.tag(),
                t
            ))?;
        }
        println!("    {}", path.display());
        summary.tables.push(path);
    }

    if !opts.plot {
        return Ok(());
    }

    let shades = resolve_shades(cfg)?;
    let categories = Categories::from_rows(rows, &cfg.thresholds);
    let (layers, skipped) = build_layers(rows, &shades, scaling, &categories, metric);
    for t in skipped {
        let msg = format!(
            "Warning: no {} rows at PAE {}; layer omitted from figure",
            kind.tag(),
            t
        );
        logger.log(&msg)?;
        println!("    {}", msg);
        summary.skipped_layers.push((kind, t));
    }
    for layer in &layers {
        logger.log(&format!(
            "Layer PAE {}: {} bubbles, {} range [{}, {}], scaling {}",
            layer.threshold,
            layer.points.len(),
            metric_name,
            layer.range.0,
            layer.range.1,
            layer.scaling
        ))?;
    }

    let figures_dir = cfg.figures_dir();
    ensure_dir("plot", &figures_dir)?;
    let path = figures_dir.join(format!("{}_{}.svg", cfg.figure_stem, kind.tag()));
    logger.progress(&format!("    Rendering {} figure...", kind.tag()))?;
    let labels = FigureLabels {
        x_desc: &cfg.x_label,
        y_desc: &cfg.y_label,
        metric: metric_name,
    };
    draw_bubble_figure(
        &path,
        (cfg.figure_width, cfg.figure_height),
        &labels,
        &categories,
        &layers,
    )?;
    logger.finish_progress()?;
    logger.log(&format!("Figure written: {}", path.display()))?;
    println!("    {}", path.display());
    summary.figures.push(path);
    Ok(())
}

/// Load, reorder, export and plot the absolute area, then normalize by
/// protein lengths and do the same for NormArea.
pub fn run(
    cfg: &PipelineConfig,
    opts: RunOptions,
    logger: &mut Logger,
) -> Result<RunSummary, Box<dyn Error>> {
    let mut clock = StageClock::new();
    let mut summary = RunSummary::default();
    let delimiter = cfg.delimiter_byte();
    let order = RegulatorOrder::new(cfg.regulator_order.as_slice())?;

    let primary = cfg.primary_summary_path();
    let swapped = cfg.swapped_summary_path();
    let a_sizes_path = cfg.a_sizes_path();
    let b_sizes_path = cfg.b_sizes_path();

    logger.log(&format!("Stats Date: {}", cfg.stats_date))?;
    logger.log(&format!("Experiment: {}", cfg.experiment_name))?;
    logger.log(&format!("Primary Summary (A,B): {}", primary.display()))?;
    logger.log(&format!("Swapped Summary (B,A): {}", swapped.display()))?;
    logger.log(&format!("A Sizes: {}", a_sizes_path.display()))?;
    logger.log(&format!("B Sizes: {}", b_sizes_path.display()))?;
    logger.log(&format!("Thresholds: {:?}", cfg.thresholds))?;
    logger.log(&format!("Regulators Ranked: {}", cfg.regulator_order.len()))?;
    logger.log(&format!("Unranked Policy: {:?}", cfg.unranked))?;

    println!("[Loading data]");
    println!("    Primary summary: {}", primary.display());
    println!("    Swapped summary: {}", swapped.display());
    println!();

    logger.progress("    Reading summaries...")?;
    let mut interactions = load_interactions(&primary, &swapped, delimiter)?;
    logger.finish_progress()?;
    summary.loaded = interactions.len();
    logger.log(&format!("Loaded {} interaction rows", summary.loaded))?;
    clock.lap("load");

    let report = order.reorder(&mut interactions, cfg.unranked)?;
    summary.unranked_rows = report.unranked_rows;
    if !report.unranked.is_empty() {
        let names: Vec<&str> = report.unranked.iter().map(|s| s.as_str()).collect();
        logger.log(&format!(
            "Warning: {} rows with unranked regulators sorted last: {}",
            report.unranked_rows,
            names.join(", ")
        ))?;
    }
    clock.lap("reorder");

    summary.out_of_threshold = out_of_threshold_count(&interactions, &cfg.thresholds);
    if summary.out_of_threshold > 0 {
        logger.log(&format!(
            "Warning: {} rows have a PAE outside {:?} and are excluded from tables and figures",
            summary.out_of_threshold, cfg.thresholds
        ))?;
    }

    println!("[Absolute interaction area]");
    export_and_plot(
        &interactions,
        MetricKind::Abs,
        "area",
        cfg.scaling_abs,
        |r: &InteractionRecord| r.area,
        cfg,
        opts,
        &mut summary,
        logger,
    )?;
    clock.lap("absolute");

    logger.progress("    Reading size tables...")?;
    let a_sizes = SizeTable::read(&a_sizes_path, "A", delimiter)?;
    let b_sizes = SizeTable::read(&b_sizes_path, "B", delimiter)?;
    logger.finish_progress()?;
    for (axis, table) in [("A", &a_sizes), ("B", &b_sizes)] {
        logger.log(&format!("Loaded {} {} lengths", table.len(), axis))?;
        if table.is_empty() {
            logger.log(&format!(
                "Warning: {} size table is empty; every row will be dropped",
                axis
            ))?;
        }
        if table.duplicates > 0 {
            logger.log(&format!(
                "Warning: {} duplicate {} ids in size table; first length kept",
                table.duplicates, axis
            ))?;
        }
    }

    let (mut normalized, norm_report) = normalize(&interactions, &a_sizes, &b_sizes);
    summary.normalized = norm_report.kept;
    summary.dropped_missing_size = norm_report.dropped();
    if norm_report.dropped() > 0 {
        logger.log(&format!(
            "Warning: dropped {} rows without a length ({} missing A, {} missing B)",
            norm_report.dropped(),
            norm_report.missing_a,
            norm_report.missing_b
        ))?;
    }
    order.reorder(&mut normalized, cfg.unranked)?;
    clock.lap("normalize");

    println!("[Normalized interaction area]");
    export_and_plot(
        &normalized,
        MetricKind::Norm,
        "NormArea",
        cfg.scaling_norm,
        |r: &NormalizedRecord| r.norm_area,
        cfg,
        opts,
        &mut summary,
        logger,
    )?;
    clock.lap("normalized");

    for (stage, elapsed) in clock.stages() {
        logger.log(&format!("Stage {}: {:.3} s", stage, elapsed.as_secs_f64()))?;
    }
    let elapsed = clock.total();
    logger.log(&format!(
        "Run completed: {} tables, {} figures",
        summary.tables.len(),
        summary.figures.len()
    ))?;
    logger.log(&format_time_used(elapsed))?;

    println!("\r[Output]");
    println!("    Tables: {}", cfg.tables_dir().display());
    if opts.plot {
        println!("    Figures: {}", cfg.figures_dir().display());
    }
    println!("{}", format_time_used(elapsed));

    Ok(summary)
}

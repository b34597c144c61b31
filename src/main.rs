// Version information constants
const VERSION: &str = env!("CARGO_PKG_VERSION");

use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

mod config;
mod error;
mod export;
mod norm;
mod order;
mod pipeline;
mod plot;
mod progress;
mod summary;

use config::PipelineConfig;
use pipeline::RunOptions;

/// Logger manager supporting dynamic progress display and detailed logging
pub struct Logger {
    writer: BufWriter<std::fs::File>,
    pub(crate) last_progress: String,
}

impl Logger {
    pub fn new(file: std::fs::File) -> Self {
        Self {
            writer: BufWriter::new(file),
            last_progress: String::new(),
        }
    }

    /// Record detailed log information
    pub fn log(&mut self, message: &str) -> std::io::Result<()> {
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        writeln!(self.writer, "[{}] {}", timestamp, message)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Display dynamic progress information (overwrite previous line)
    pub fn progress(&mut self, message: &str) -> std::io::Result<()> {
        if !self.last_progress.is_empty() {
            print!("\r{}", " ".repeat(self.last_progress.len()));
        }
        print!("\r{}", message);
        std::io::stdout().flush()?;
        self.last_progress = message.to_string();
        Ok(())
    }

    /// Finish progress display
    pub fn finish_progress(&mut self) -> std::io::Result<()> {
        if !self.last_progress.is_empty() {
            println!();
            self.last_progress.clear();
        }
        Ok(())
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export threshold tables and draw absolute and normalized bubble plots
    Run(RunArgs),
    /// Export threshold tables only, without figures
    Tables(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Pipeline configuration file (TOML)
    #[arg(short = 'c', long = "config")]
    pub config: Option<String>,
    /// Output root directory (overrides output_dir)
    #[arg(short = 'o', long = "output")]
    pub output: Option<String>,
    /// Stats date stamp of the summarized batch (overrides stats_date)
    #[arg(short = 'd', long = "stats-date")]
    pub stats_date: Option<String>,
    /// Experiment name (overrides experiment_name)
    #[arg(short = 'e', long = "experiment")]
    pub experiment: Option<String>,
    /// Log file path (default: <output>/pires_bubble.log)
    #[arg(short = 'l', long = "log")]
    pub log: Option<String>,
}

/// Validate run/tables command arguments
fn validate_run_args(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    if let Some(config) = &args.config {
        if config.trim().is_empty() {
            return Err("Error: Config file path cannot be empty".into());
        }
        if !Path::new(config).exists() {
            return Err(format!("Error: Config file does not exist: {}", config).into());
        }
        if !config.ends_with(".toml") {
            return Err(format!("Error: Config file path must end with .toml: {}", config).into());
        }
    }
    if let Some(output) = &args.output {
        if output.trim().is_empty() {
            return Err("Error: Output directory path cannot be empty".into());
        }
    }
    if let Some(date) = &args.stats_date {
        if date.trim().is_empty() || date.contains(['/', '\\']) {
            return Err(format!("Error: Invalid stats date: '{}'", date).into());
        }
    }
    if let Some(experiment) = &args.experiment {
        if experiment.trim().is_empty() || experiment.contains(['/', '\\']) {
            return Err(format!("Error: Invalid experiment name: '{}'", experiment).into());
        }
    }
    Ok(())
}

/// Config file, then command-line overrides
fn resolve_config(args: &RunArgs) -> Result<PipelineConfig, Box<dyn Error>> {
    let mut cfg = PipelineConfig::load(args.config.as_deref().map(Path::new))?;
    if let Some(output) = &args.output {
        cfg.output_dir = PathBuf::from(output);
    }
    if let Some(date) = &args.stats_date {
        cfg.stats_date = date.clone();
    }
    if let Some(experiment) = &args.experiment {
        cfg.experiment_name = experiment.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

fn run_command(args: &RunArgs, opts: RunOptions) -> Result<(), Box<dyn Error>> {
    validate_run_args(args)?;
    let cfg = resolve_config(args)?;

    std::fs::create_dir_all(&cfg.output_dir)?;
    let log_file = if let Some(log_path) = &args.log {
        std::fs::File::create(log_path)?
    } else {
        std::fs::File::create(cfg.output_dir.join("pires_bubble.log"))?
    };
    let mut logger = Logger::new(log_file);

    logger.log("=== PIRES Bubble Plot Log ===")?;
    logger.log(&format!("Software Version: v{}", VERSION))?;
    logger.log(&format!("Runtime: {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")))?;
    if let Some(config) = &args.config {
        logger.log(&format!("Config File: {}", config))?;
    }
    logger.log(&format!("Output Directory: {}", cfg.output_dir.display()))?;
    logger.log(&format!("Figures: {}", if opts.plot { "yes" } else { "no" }))?;

    let result = pipeline::run(&cfg, opts, &mut logger);
    logger.finish_progress()?;
    match &result {
        Ok(summary) => {
            logger.log(&format!(
                "Rows: {} loaded, {} outside thresholds, {} unranked, {} normalized, {} dropped without length",
                summary.loaded,
                summary.out_of_threshold,
                summary.unranked_rows,
                summary.normalized,
                summary.dropped_missing_size
            ))?;
            for (kind, t) in &summary.skipped_layers {
                logger.log(&format!("Skipped layer: {} PAE {}", kind.tag(), t))?;
            }
            logger.log("Pipeline completed")?
        }
        Err(e) => logger.log(&format!("Pipeline failed: {}", e))?,
    }
    result.map(|_| ())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_command(&args, RunOptions { plot: true }),
        Commands::Tables(args) => run_command(&args, RunOptions { plot: false }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args() -> RunArgs {
        RunArgs {
            config: None,
            output: None,
            stats_date: None,
            experiment: None,
            log: None,
        }
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "pires-bubble",
            "run",
            "-o",
            "out",
            "--stats-date",
            "2024_6_1",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(a) => {
                assert_eq!(a.output.as_deref(), Some("out"));
                assert_eq!(a.stats_date.as_deref(), Some("2024_6_1"));
            }
            Commands::Tables(_) => panic!("expected run"),
        }
    }

    #[test]
    fn test_validate_rejects_non_toml_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pires.yaml");
        std::fs::write(&path, "").unwrap();
        let mut a = args();
        a.config = Some(path.to_string_lossy().to_string());
        assert!(validate_run_args(&a).is_err());
    }

    #[test]
    fn test_validate_rejects_path_in_stats_date() {
        let mut a = args();
        a.stats_date = Some("2024/5/9".to_string());
        assert!(validate_run_args(&a).is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let _guard = crate::config::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let mut a = args();
        a.output = Some("elsewhere".to_string());
        a.experiment = Some("urge_screen".to_string());
        let cfg = resolve_config(&a).unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("elsewhere"));
        assert_eq!(cfg.experiment_name, "urge_screen");
        assert_eq!(cfg.stats_date, "2024_5_9");
    }

    #[test]
    fn test_logger_writes_timestamped_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run.log");
        let mut logger = Logger::new(std::fs::File::create(&path).unwrap());
        logger.log("hello").unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with('['));
        assert!(text.trim_end().ends_with("] hello"));
    }

    #[test]
    fn test_progress_line_is_replaced_then_finished() {
        let tmp = TempDir::new().unwrap();
        let mut logger = Logger::new(std::fs::File::create(tmp.path().join("run.log")).unwrap());
        logger.progress("    Reading size tables...").unwrap();
        assert_eq!(logger.last_progress, "    Reading size tables...");
        logger.progress("    Rendering abs figure...").unwrap();
        assert_eq!(logger.last_progress, "    Rendering abs figure...");
        logger.finish_progress().unwrap();
        assert!(logger.last_progress.is_empty());
    }
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("[{stage}] Failed to read {}: {source}", path.display())]
    InputRead {
        stage: &'static str,
        path: PathBuf,
        source: csv::Error,
    },
    #[error("[{stage}] Malformed row in {} (line {line}): {message}", path.display())]
    Malformed {
        stage: &'static str,
        path: PathBuf,
        line: u64,
        message: String,
    },
    #[error("[reorder] Regulator '{0}' is not listed in regulator_order")]
    UnrankedRegulator(String),
    #[error("[{stage}] Failed to create directory {}: {source}", path.display())]
    OutputDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("[export] Failed to write {}: {source}", path.display())]
    TableWrite { path: PathBuf, source: csv::Error },
    #[error("[plot] Failed to render {}: {message}", path.display())]
    Render { path: PathBuf, message: String },
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] config::ConfigError),
    #[error("[config] Invalid configuration: {0}")]
    ConfigInvalid(String),
}

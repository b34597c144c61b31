use crate::error::AppError;
use crate::plot::parse_shade;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Regulators of RNA silencing in C. elegans, in the order used for the y axis.
pub const DEFAULT_REGULATOR_ORDER: [&str; 25] = [
    "DCR-1", "RDE-4", "ADR-2", "ERI-1", "RDE-1", "ERGO-1", "PRG-1", "ALG-2", "CSR-1", "HRDE-1",
    "NRDE-3", "HRDE-2", "PGL-1", "DEPS-1", "MUT-16", "RDE-10", "ZNFX-1", "PID-2", "RDE-8",
    "MUT-7", "RDE-3", "EGO-1", "NRDE-2", "SET-25", "MET-2",
];

/// Prefix for environment overrides, e.g. `PIRES_STATS_DATE=2024_6_1`
pub const ENV_PREFIX: &str = "PIRES";

/// What to do with a B entity that has no rank in `regulator_order`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnrankedPolicy {
    /// Abort the run, naming the entity
    #[default]
    Error,
    /// Sort after every ranked regulator, keeping encounter order
    Last,
}

/// Serializes tests that read `PIRES_*` from the process environment
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Pipeline configuration. Every field has a default, so a config file only
/// needs to name what differs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Date stamp of the summarized prediction batch
    pub stats_date: String,
    pub experiment_name: String,
    /// Root that default input paths are resolved against
    pub analysis_dir: PathBuf,
    /// Root for tables/ and figures/
    pub output_dir: PathBuf,
    /// Summary with columns A,B,PAE,distance,area (AlphaFold 2 batch)
    pub primary_summary: Option<PathBuf>,
    /// Summary with columns B,A,PAE,distance,area (AlphaFold 3 server)
    pub swapped_summary: Option<PathBuf>,
    pub a_sizes: Option<PathBuf>,
    pub b_sizes: Option<PathBuf>,
    pub delimiter: char,
    pub thresholds: Vec<u32>,
    /// Threshold (as string key) to a named shade or `#rrggbb`
    pub shade_per_threshold: BTreeMap<String, String>,
    pub regulator_order: Vec<String>,
    pub unranked: UnrankedPolicy,
    pub scaling_abs: f64,
    pub scaling_norm: f64,
    pub figure_width: u32,
    pub figure_height: u32,
    pub figure_stem: String,
    pub x_label: String,
    pub y_label: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let mut shades = BTreeMap::new();
        shades.insert("5".to_string(), "blue".to_string());
        shades.insert("20".to_string(), "orange".to_string());
        shades.insert("30".to_string(), "grey".to_string());

        Self {
            stats_date: "2024_5_9".to_string(),
            experiment_name: "predicted_influencers_of_RNA-regulated_expression".to_string(),
            analysis_dir: PathBuf::from("analyses"),
            output_dir: PathBuf::from("analyses"),
            primary_summary: None,
            swapped_summary: None,
            a_sizes: None,
            b_sizes: None,
            delimiter: ',',
            thresholds: vec![5, 20, 30],
            shade_per_threshold: shades,
            regulator_order: DEFAULT_REGULATOR_ORDER.iter().map(|s| s.to_string()).collect(),
            unranked: UnrankedPolicy::Error,
            scaling_abs: 0.3,
            scaling_norm: 30000.0,
            figure_width: 700,  // 7 in at 100 px/in
            figure_height: 1000,
            figure_stem: "pires".to_string(),
            x_label: "understudied regulated proteins".to_string(),
            y_label: "RNA regulators".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load defaults, then the optional TOML file, then `PIRES_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;
        let cfg: PipelineConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.stats_date.trim().is_empty() {
            return Err(AppError::ConfigInvalid("stats_date cannot be empty".into()));
        }
        if self.experiment_name.trim().is_empty() {
            return Err(AppError::ConfigInvalid("experiment_name cannot be empty".into()));
        }
        if !self.delimiter.is_ascii() {
            return Err(AppError::ConfigInvalid(format!(
                "delimiter must be a single ASCII character, got '{}'",
                self.delimiter
            )));
        }
        if self.thresholds.is_empty() {
            return Err(AppError::ConfigInvalid("thresholds cannot be empty".into()));
        }
        let mut seen = HashSet::new();
        for t in &self.thresholds {
            if !seen.insert(*t) {
                return Err(AppError::ConfigInvalid(format!("duplicate threshold {}", t)));
            }
            let shade = self.shade_name(*t).ok_or_else(|| {
                AppError::ConfigInvalid(format!("no entry in shade_per_threshold for threshold {}", t))
            })?;
            if parse_shade(shade).is_none() {
                return Err(AppError::ConfigInvalid(format!(
                    "unknown shade '{}' for threshold {}",
                    shade, t
                )));
            }
        }
        for (name, value) in [("scaling_abs", self.scaling_abs), ("scaling_norm", self.scaling_norm)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppError::ConfigInvalid(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if self.regulator_order.is_empty() {
            return Err(AppError::ConfigInvalid("regulator_order cannot be empty".into()));
        }
        if self.figure_width < 200 || self.figure_height < 200 {
            return Err(AppError::ConfigInvalid(format!(
                "figure must be at least 200x200 px, got {}x{}",
                self.figure_width, self.figure_height
            )));
        }
        Ok(())
    }

    pub fn shade_name(&self, threshold: u32) -> Option<&str> {
        self.shade_per_threshold
            .get(&threshold.to_string())
            .map(|s| s.as_str())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }

    pub fn primary_summary_path(&self) -> PathBuf {
        self.primary_summary.clone().unwrap_or_else(|| {
            self.analysis_dir
                .join("alphafold2")
                .join("summaries")
                .join(format!("{}_alphafold2_summary_stats", self.stats_date))
        })
    }

    pub fn swapped_summary_path(&self) -> PathBuf {
        self.swapped_summary.clone().unwrap_or_else(|| {
            self.analysis_dir
                .join("alphafold3")
                .join("summaries")
                .join(format!("{}_alphafold3_summary_stats", self.stats_date))
        })
    }

    pub fn a_sizes_path(&self) -> PathBuf {
        self.a_sizes
            .clone()
            .unwrap_or_else(|| self.analysis_dir.join("sizes").join("A_list_sizes"))
    }

    pub fn b_sizes_path(&self) -> PathBuf {
        self.b_sizes
            .clone()
            .unwrap_or_else(|| self.analysis_dir.join("sizes").join("B_list_sizes"))
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.output_dir
            .join("tables")
            .join(&self.experiment_name)
            .join(&self.stats_date)
    }

    pub fn figures_dir(&self) -> PathBuf {
        self.output_dir
            .join("figures")
            .join(&self.experiment_name)
            .join(&self.stats_date)
    }

    /// Thresholds sorted largest first, i.e. background layer first
    pub fn thresholds_back_to_front(&self) -> Vec<u32> {
        let mut t = self.thresholds.clone();
        t.sort_unstable_by(|a, b| b.cmp(a));
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = PipelineConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.regulator_order.len(), 25);
        assert_eq!(cfg.thresholds_back_to_front(), vec![30, 20, 5]);
        assert_eq!(cfg.shade_name(20), Some("orange"));
    }

    #[test]
    fn test_default_paths() {
        let cfg = PipelineConfig::default();
        assert_eq!(
            cfg.primary_summary_path(),
            PathBuf::from("analyses/alphafold2/summaries/2024_5_9_alphafold2_summary_stats")
        );
        assert_eq!(
            cfg.tables_dir(),
            PathBuf::from("analyses/tables/predicted_influencers_of_RNA-regulated_expression/2024_5_9")
        );
    }

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[test]
    fn test_unranked_defaults_to_error() {
        assert_eq!(UnrankedPolicy::default(), UnrankedPolicy::Error);
        assert_eq!(PipelineConfig::default().unranked, UnrankedPolicy::Error);
    }

    #[test]
    fn test_env_overrides_defaults() {
        let _guard = env_guard();
        std::env::set_var("PIRES_STATS_DATE", "2024_7_2");
        std::env::set_var("PIRES_FIGURE_STEM", "screen");
        let loaded = PipelineConfig::load(None);
        std::env::remove_var("PIRES_STATS_DATE");
        std::env::remove_var("PIRES_FIGURE_STEM");

        let cfg = loaded.unwrap();
        assert_eq!(cfg.stats_date, "2024_7_2");
        assert_eq!(cfg.figure_stem, "screen");
        assert_eq!(cfg.thresholds, vec![5, 20, 30]);
        assert_eq!(
            cfg.primary_summary_path(),
            PathBuf::from("analyses/alphafold2/summaries/2024_7_2_alphafold2_summary_stats")
        );
    }

    #[test]
    fn test_load_toml_overrides() {
        let _guard = env_guard();
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pires.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "stats_date = \"2024_6_1\"").unwrap();
        writeln!(f, "thresholds = [5, 30]").unwrap();
        writeln!(f, "unranked = \"last\"").unwrap();
        writeln!(f, "regulator_order = [\"RDE-1\", \"DCR-1\"]").unwrap();
        drop(f);

        let cfg = PipelineConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(cfg.stats_date, "2024_6_1");
        assert_eq!(cfg.thresholds, vec![5, 30]);
        assert_eq!(cfg.unranked, UnrankedPolicy::Last);
        assert_eq!(cfg.regulator_order, vec!["RDE-1", "DCR-1"]);
        assert_eq!(cfg.scaling_abs, 0.3);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let _guard = env_guard();
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/pires.toml");
        let cfg = PipelineConfig::load(Some(path.as_path())).unwrap();
        let defaults = PipelineConfig::default();
        assert_eq!(cfg.regulator_order, defaults.regulator_order);
        assert_eq!(cfg.shade_per_threshold, defaults.shade_per_threshold);
        assert_eq!(cfg.a_sizes_path(), PathBuf::from("analyses/sizes/2024_5_4_A_list_sizes"));
    }

    #[test]
    fn test_missing_shade_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.thresholds.push(10);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("threshold 10"));
    }

    #[test]
    fn test_bad_scaling_rejected() {
        let mut cfg = PipelineConfig::default();
        cfg.scaling_norm = 0.0;
        assert!(cfg.validate().is_err());
    }
}

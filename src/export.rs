use crate::error::AppError;
use crate::summary::InteractionRow;
use csv::WriterBuilder;
use std::path::{Path, PathBuf};

/// Which metric a table carries; selects the `abs`/`norm` file suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Abs,
    Norm,
}

impl MetricKind {
    pub fn tag(self) -> &'static str {
        match self {
            MetricKind::Abs => "abs",
            MetricKind::Norm => "norm",
        }
    }
}

pub fn table_file_name(threshold: u32, kind: MetricKind) -> String {
    format!("maxPae_{}_{}_interaction_area.csv", threshold, kind.tag())
}

/// Rows with `pae == threshold`, input order kept
pub fn select_threshold<R: InteractionRow>(rows: &[R], threshold: u32) -> Vec<&R> {
    rows.iter().filter(|r| r.pae() == threshold).collect()
}

/// Rows that fall in none of the configured thresholds
pub fn out_of_threshold_count<R: InteractionRow>(rows: &[R], thresholds: &[u32]) -> usize {
    rows.iter().filter(|r| !thresholds.contains(&r.pae())).count()
}

/// Write one table. The header is always written, so an empty subset yields
/// a header-only file.
pub fn write_table<R: InteractionRow>(path: &Path, rows: &[&R]) -> Result<(), AppError> {
    let wrap = |source: csv::Error| AppError::TableWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = WriterBuilder::new().from_path(path).map_err(wrap)?;
    writer.write_record(R::HEADER).map_err(wrap)?;
    for row in rows {
        writer.write_record(row.fields()).map_err(wrap)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::TableWrite {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
    Ok(())
}

/// One file per threshold. Returns `(threshold, path, row count)` per file.
pub fn export_threshold_tables<R: InteractionRow>(
    rows: &[R],
    thresholds: &[u32],
    kind: MetricKind,
    dir: &Path,
) -> Result<Vec<(u32, PathBuf, usize)>, AppError> {
    std::fs::create_dir_all(dir).map_err(|source| AppError::OutputDir {
        stage: "export",
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(thresholds.len());
    for &t in thresholds {
        let subset = select_threshold(rows, t);
        let path = dir.join(table_file_name(t, kind));
        write_table::<R>(&path, &subset)?;
        written.push((t, path, subset.len()));
    }
    Ok(written)
}

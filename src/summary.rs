use crate::error::AppError;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;

const STAGE: &str = "load";

/// One predicted interaction between a regulated protein (A) and a regulator (B)
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionRecord {
    pub a: String,
    pub b: String,
    pub pae: u32,
    pub distance: f64,
    pub area: f64,
}

/// Row shape shared by the absolute and the normalized tables, so ordering,
/// threshold selection and export work on either.
pub trait InteractionRow {
    const HEADER: &'static [&'static str];

    fn entity_a(&self) -> &str;
    fn entity_b(&self) -> &str;
    fn pae(&self) -> u32;
    fn fields(&self) -> Vec<String>;
}

impl InteractionRow for InteractionRecord {
    const HEADER: &'static [&'static str] = &["A", "B", "PAE", "distance", "area"];

    fn entity_a(&self) -> &str {
        &self.a
    }

    fn entity_b(&self) -> &str {
        &self.b
    }

    fn pae(&self) -> u32 {
        self.pae
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.a.clone(),
            self.b.clone(),
            self.pae.to_string(),
            self.distance.to_string(),
            self.area.to_string(),
        ]
    }
}

/// Column order of a headerless summary file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLayout {
    /// A,B,PAE,distance,area (local AlphaFold 2 runs)
    AFirst,
    /// B,A,PAE,distance,area (AlphaFold 3 server)
    BFirst,
}

impl ColumnLayout {
    fn entity_columns(self) -> (usize, usize) {
        match self {
            ColumnLayout::AFirst => (0, 1),
            ColumnLayout::BFirst => (1, 0),
        }
    }
}

/// PAE is written as an integer by one tool and as a float by the other
pub fn parse_pae(s: &str) -> Option<u32> {
    if let Ok(v) = s.parse::<u32>() {
        return Some(v);
    }
    let v = s.parse::<f64>().ok()?;
    if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 {
        Some(v as u32)
    } else {
        None
    }
}

fn parse_record(record: &StringRecord, layout: ColumnLayout) -> Result<InteractionRecord, String> {
    if record.len() != 5 {
        return Err(format!("expected 5 fields, found {}", record.len()));
    }
    let (a_col, b_col) = layout.entity_columns();
    let a = record[a_col].to_string();
    let b = record[b_col].to_string();
    if a.is_empty() || b.is_empty() {
        return Err("empty entity id".to_string());
    }
    let pae = parse_pae(&record[2]).ok_or_else(|| format!("invalid PAE value: {}", &record[2]))?;
    let distance = record[3]
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite())
        .ok_or_else(|| format!("invalid distance value: {}", &record[3]))?;
    let area = record[4]
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| format!("invalid area value: {}", &record[4]))?;

    Ok(InteractionRecord {
        a,
        b,
        pae,
        distance,
        area,
    })
}

/// Read one headerless summary table
pub fn read_summary(
    path: &Path,
    layout: ColumnLayout,
    delimiter: u8,
) -> Result<Vec<InteractionRecord>, AppError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|source| AppError::InputRead {
            stage: STAGE,
            path: path.to_path_buf(),
            source,
        })?;

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| AppError::InputRead {
            stage: STAGE,
            path: path.to_path_buf(),
            source,
        })?;
        // Tolerate blank trailing lines
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let parsed = parse_record(&record, layout).map_err(|message| AppError::Malformed {
            stage: STAGE,
            path: path.to_path_buf(),
            line,
            message,
        })?;
        records.push(parsed);
    }

    Ok(records)
}

/// Concatenate the two summaries, primary rows first. No deduplication.
pub fn load_interactions(
    primary: &Path,
    swapped: &Path,
    delimiter: u8,
) -> Result<Vec<InteractionRecord>, AppError> {
    let mut all = read_summary(primary, ColumnLayout::AFirst, delimiter)?;
    let second = read_summary(swapped, ColumnLayout::BFirst, delimiter)?;
    all.extend(second);
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_parse_pae() {
        assert_eq!(parse_pae("5"), Some(5));
        assert_eq!(parse_pae("20.0"), Some(20));
        assert_eq!(parse_pae("20.5"), None);
        assert_eq!(parse_pae("-5"), None);
        assert_eq!(parse_pae("x"), None);
    }

    #[test]
    fn test_swapped_layout() {
        let tmp = TempDir::new().unwrap();
        let af2 = write(&tmp, "af2", "HIL-4,RDE-1,5,4.0,120.5\n");
        let af3 = write(&tmp, "af3", "RDE-1,HIL-4,20,6.5,80\n");

        let a = read_summary(&af2, ColumnLayout::AFirst, b',').unwrap();
        let b = read_summary(&af3, ColumnLayout::BFirst, b',').unwrap();
        assert_eq!(a[0].a, "HIL-4");
        assert_eq!(a[0].b, "RDE-1");
        assert_eq!(b[0].a, "HIL-4");
        assert_eq!(b[0].b, "RDE-1");
        assert_eq!(b[0].pae, 20);
        assert_eq!(b[0].area, 80.0);
    }

    #[test]
    fn test_concatenation_keeps_every_row() {
        let tmp = TempDir::new().unwrap();
        let af2 = write(
            &tmp,
            "af2",
            "HIL-4,RDE-1,5,4.0,120\nHIL-4,RDE-1,5,4.0,120\nC09G5.7,CSR-1,30,8,10\n",
        );
        let af3 = write(&tmp, "af3", "DCR-1,K02E2.6,20,6,55\n\nMET-2,HIL-4,5,3,7\n");

        let all = load_interactions(&af2, &af3, b',').unwrap();
        assert_eq!(all.len(), 5);
        // Duplicates survive
        assert_eq!(all[0], all[1]);
        assert_eq!(all[3].a, "K02E2.6");
        assert_eq!(all[4].a, "HIL-4");
        assert_eq!(all[4].b, "MET-2");
    }

    #[test]
    fn test_tab_delimited() {
        let tmp = TempDir::new().unwrap();
        let af2 = write(&tmp, "af2", "HIL-4\tRDE-1\t30\t7.5\t12\n");
        let rows = read_summary(&af2, ColumnLayout::AFirst, b'\t').unwrap();
        assert_eq!(rows[0].pae, 30);
    }

    #[test]
    fn test_malformed_row_names_file_and_line() {
        let tmp = TempDir::new().unwrap();
        let af2 = write(&tmp, "af2", "HIL-4,RDE-1,5,4.0,120\nHIL-4,RDE-1,five,4.0,120\n");
        let err = read_summary(&af2, ColumnLayout::AFirst, b',').unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("[load]"));
        assert!(msg.contains("line 2"));
        assert!(msg.contains("five"));
    }

    #[test]
    fn test_negative_area_rejected() {
        let tmp = TempDir::new().unwrap();
        let af2 = write(&tmp, "af2", "HIL-4,RDE-1,5,4.0,-1\n");
        assert!(read_summary(&af2, ColumnLayout::AFirst, b',').is_err());
    }

    #[test]
    fn test_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = read_summary(&tmp.path().join("nope"), ColumnLayout::AFirst, b',').unwrap_err();
        assert!(matches!(err, AppError::InputRead { .. }));
    }
}

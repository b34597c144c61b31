use crate::error::AppError;
use crate::summary::{InteractionRecord, InteractionRow};
use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use std::path::Path;

const STAGE: &str = "sizes";
const LENGTH_COLUMN: &str = "length";

/// Protein lengths for one axis, keyed by entity id
#[derive(Debug, Clone, Default)]
pub struct SizeTable {
    lengths: HashMap<String, u64>,
    /// Ids that appeared more than once; the first length is kept
    pub duplicates: usize,
}

impl SizeTable {
    /// Read a size table with a header naming `key_column` and `length`.
    pub fn read(path: &Path, key_column: &str, delimiter: u8) -> Result<Self, AppError> {
        let read_err = |source: csv::Error| AppError::InputRead {
            stage: STAGE,
            path: path.to_path_buf(),
            source,
        };
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .trim(Trim::All)
            .from_path(path)
            .map_err(read_err)?;

        let headers = reader.headers().map_err(read_err)?.clone();
        let find = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| AppError::Malformed {
                stage: STAGE,
                path: path.to_path_buf(),
                line: 1,
                message: format!("missing column '{}' in header", name),
            })
        };
        let key_ix = find(key_column)?;
        let len_ix = find(LENGTH_COLUMN)?;

        let mut table = SizeTable::default();
        for result in reader.records() {
            let record = result.map_err(read_err)?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            let malformed = |message: String| AppError::Malformed {
                stage: STAGE,
                path: path.to_path_buf(),
                line,
                message,
            };
            let key = record
                .get(key_ix)
                .filter(|k| !k.is_empty())
                .ok_or_else(|| malformed(format!("missing {} id", key_column)))?;
            let raw = record.get(len_ix).unwrap_or("");
            let length = raw
                .parse::<u64>()
                .ok()
                .filter(|l| *l > 0)
                .ok_or_else(|| malformed(format!("length must be a positive integer, got '{}'", raw)))?;
            table.insert(key, length);
        }
        Ok(table)
    }

    pub fn insert(&mut self, key: &str, length: u64) {
        if self.lengths.contains_key(key) {
            self.duplicates += 1;
        } else {
            self.lengths.insert(key.to_string(), length);
        }
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.lengths.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

/// Interaction with both protein lengths and the length-normalized area
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    pub record: InteractionRecord,
    pub length_a: u64,
    pub length_b: u64,
    pub norm_area: f64,
}

impl InteractionRow for NormalizedRecord {
    const HEADER: &'static [&'static str] = &[
        "A", "B", "PAE", "distance", "area", "length_A", "length_B", "NormArea",
    ];

    fn entity_a(&self) -> &str {
        &self.record.a
    }

    fn entity_b(&self) -> &str {
        &self.record.b
    }

    fn pae(&self) -> u32 {
        self.record.pae
    }

    fn fields(&self) -> Vec<String> {
        let mut fields = self.record.fields();
        fields.push(self.length_a.to_string());
        fields.push(self.length_b.to_string());
        fields.push(self.norm_area.to_string());
        fields
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub kept: usize,
    pub missing_a: usize,
    /// Rows whose A length was known but B length was not
    pub missing_b: usize,
}

impl NormalizeReport {
    pub fn dropped(&self) -> usize {
        self.missing_a + self.missing_b
    }
}

/// Inner join against both size tables. Unmatched rows are dropped and
/// counted, never an error. Input order is kept.
pub fn normalize(
    rows: &[InteractionRecord],
    a_sizes: &SizeTable,
    b_sizes: &SizeTable,
) -> (Vec<NormalizedRecord>, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut out = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(length_a) = a_sizes.get(&row.a) else {
            report.missing_a += 1;
            continue;
        };
        let Some(length_b) = b_sizes.get(&row.b) else {
            report.missing_b += 1;
            continue;
        };
        out.push(NormalizedRecord {
            record: row.clone(),
            length_a,
            length_b,
            norm_area: row.area / (length_a as f64 * length_b as f64),
        });
    }

    report.kept = out.len();
    (out, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rec(a: &str, b: &str, area: f64) -> InteractionRecord {
        InteractionRecord {
            a: a.to_string(),
            b: b.to_string(),
            pae: 5,
            distance: 4.0,
            area,
        }
    }

    fn table(pairs: &[(&str, u64)]) -> SizeTable {
        let mut t = SizeTable::default();
        for (k, v) in pairs {
            t.insert(k, *v);
        }
        t
    }

    #[test]
    fn test_norm_area_scenario() {
        let rows = vec![rec("X", "Y", 10.0)];
        let (out, report) = normalize(&rows, &table(&[("X", 2)]), &table(&[("Y", 5)]));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].norm_area, 1.0);
        assert_eq!(report.dropped(), 0);
    }

    #[test]
    fn test_unmatched_rows_dropped_and_counted() {
        let rows = vec![
            rec("X", "Y", 10.0),
            rec("NOPE", "Y", 10.0),
            rec("X", "MISSING", 10.0),
            rec("X", "Y", 30.0),
        ];
        let (out, report) = normalize(&rows, &table(&[("X", 2)]), &table(&[("Y", 5)]));
        assert_eq!(out.len(), 2);
        assert_eq!(
            report,
            NormalizeReport {
                kept: 2,
                missing_a: 1,
                missing_b: 1
            }
        );
        for r in &out {
            assert_eq!(
                r.norm_area,
                r.record.area / (r.length_a as f64 * r.length_b as f64)
            );
        }
        assert_eq!(out[1].norm_area, 3.0);
    }

    #[test]
    fn test_read_size_table() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("A_list_sizes");
        std::fs::write(&path, "A,length\nHIL-4,210\nC09G5.7,88\nHIL-4,999\n").unwrap();
        let t = SizeTable::read(&path, "A", b',').unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.get("HIL-4"), Some(210));
        assert_eq!(t.duplicates, 1);
    }

    #[test]
    fn test_size_table_columns_in_any_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("B_list_sizes");
        std::fs::write(&path, "length,B\n1041,DCR-1\n").unwrap();
        let t = SizeTable::read(&path, "B", b',').unwrap();
        assert_eq!(t.get("DCR-1"), Some(1041));
    }

    #[test]
    fn test_zero_length_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("A_list_sizes");
        std::fs::write(&path, "A,length\nHIL-4,0\n").unwrap();
        let err = SizeTable::read(&path, "A", b',').unwrap_err();
        assert!(err.to_string().contains("[sizes]"));
    }

    #[test]
    fn test_missing_key_column() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("A_list_sizes");
        std::fs::write(&path, "gene,length\nHIL-4,10\n").unwrap();
        assert!(SizeTable::read(&path, "A", b',').is_err());
    }
}

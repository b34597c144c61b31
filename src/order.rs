use crate::config::UnrankedPolicy;
use crate::error::AppError;
use crate::summary::InteractionRow;
use std::collections::{BTreeSet, HashMap};

/// Rank lookup for the regulator (B) axis
#[derive(Debug, Clone)]
pub struct RegulatorOrder {
    ranks: HashMap<String, usize>,
}

/// Regulators that were sorted to the end under `UnrankedPolicy::Last`
#[derive(Debug, Default)]
pub struct ReorderReport {
    pub unranked: BTreeSet<String>,
    pub unranked_rows: usize,
}

impl RegulatorOrder {
    pub fn new<S: AsRef<str>>(names: &[S]) -> Result<Self, AppError> {
        let mut ranks = HashMap::with_capacity(names.len());
        for (ix, name) in names.iter().enumerate() {
            let name = name.as_ref();
            if ranks.insert(name.to_string(), ix).is_some() {
                return Err(AppError::ConfigInvalid(format!(
                    "regulator '{}' appears more than once in regulator_order",
                    name
                )));
            }
        }
        Ok(Self { ranks })
    }

    pub fn rank(&self, name: &str) -> Option<usize> {
        self.ranks.get(name).copied()
    }

    /// Stable sort by rank of column B.
    pub fn reorder<R: InteractionRow>(
        &self,
        rows: &mut Vec<R>,
        policy: UnrankedPolicy,
    ) -> Result<ReorderReport, AppError> {
        let mut report = ReorderReport::default();
        let mut keyed = Vec::with_capacity(rows.len());
        for row in rows.drain(..) {
            let rank = match self.rank(row.entity_b()) {
                Some(r) => r,
                None => match policy {
                    UnrankedPolicy::Error => {
                        return Err(AppError::UnrankedRegulator(row.entity_b().to_string()))
                    }
                    UnrankedPolicy::Last => {
                        report.unranked.insert(row.entity_b().to_string());
                        report.unranked_rows += 1;
                        usize::MAX
                    }
                },
            };
            keyed.push((rank, row));
        }
        keyed.sort_by_key(|(rank, _)| *rank);
        rows.extend(keyed.into_iter().map(|(_, row)| row));
        Ok(report)
    }
}

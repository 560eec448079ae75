//! Indicator label indexing.

use std::collections::BTreeSet;

use crate::tabular::Row;

pub const LABEL_COLUMN: &str = "indicator_label_en";

/// Human-scannable short label: qualifiers after the first comma, bracket
/// or colon are dropped.
///
/// "Enrolment in secondary education, both sexes (number)"
///   -> "Enrolment in secondary education"
pub fn short_name(label: &str) -> String {
    let collapsed = label.split_whitespace().collect::<Vec<_>>().join(" ");
    let name = collapsed.split_once(',').map_or(collapsed.as_str(), |(left, _)| left);
    let name = name.split_once('(').map_or(name, |(left, _)| left);
    let name = name.split_once(':').map_or(name, |(left, _)| left);
    name.trim().to_string()
}

/// All indicator rows of one indicator-set plus their distinct short names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorTable {
    pub rows: Vec<Row>,
    pub shortnames: BTreeSet<String>,
}

impl IndicatorTable {
    pub fn push(&mut self, row: Row) {
        if let Some(label) = row.get(LABEL_COLUMN) {
            self.shortnames.insert(short_name(label));
        }
        self.rows.push(row);
    }

    /// Short names in sorted order, comma separated.
    pub fn shortnames_joined(&self) -> String {
        self.shortnames.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

impl FromIterator<Row> for IndicatorTable {
    fn from_iter<I: IntoIterator<Item = Row>>(iter: I) -> Self {
        let mut table = Self::default();
        for row in iter {
            table.push(row);
        }
        table
    }
}

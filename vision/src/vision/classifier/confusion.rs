use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// Counts of (ground truth, predicted) label pairs. Rows are ground truth, columns predictions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfusionMatrix {
    cells: BTreeMap<String, BTreeMap<String, u32>>,
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, ground_truth: &str, predicted: &str) {
        *self
            .cells
            .entry(ground_truth.to_string())
            .or_default()
            .entry(predicted.to_string())
            .or_insert(0) += 1;
    }

    /// Makes every label seen as a row or a column both a row and a column, filling in zeros.
    pub fn normalize_to_square(&mut self) {
        let labels = self.labels();
        for label in &labels {
            let row = self.cells.entry(label.clone()).or_default();
            for column in &labels {
                row.entry(column.clone()).or_insert(0);
            }
        }
    }

    /// Every label that appears as a row or a column, sorted.
    pub fn labels(&self) -> BTreeSet<String> {
        self.cells
            .iter()
            .flat_map(|(row, columns)| std::iter::once(row).chain(columns.keys()))
            .cloned()
            .collect()
    }

    pub fn row_labels(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn column_labels(&self) -> BTreeSet<&str> {
        self.cells.values().flat_map(|columns| columns.keys().map(String::as_str)).collect()
    }

    pub fn count(&self, ground_truth: &str, predicted: &str) -> u32 {
        self.cells
            .get(ground_truth)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.cells.values().flat_map(|row| row.values()).sum()
    }

    pub fn correct(&self) -> u32 {
        self.cells.iter().map(|(label, row)| row.get(label).copied().unwrap_or(0)).sum()
    }

    pub fn accuracy(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.correct() as f64 / total as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut square = self.clone();
        square.normalize_to_square();
        for (row, columns) in &square.cells {
            write!(f, "{row}:")?;
            for (column, count) in columns {
                write!(f, " {column}={count}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

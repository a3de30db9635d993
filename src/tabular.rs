//! Table parsing and plain-text rendering for spreadsheet-like inputs.
//!
//! Rendering follows the familiar data-frame layout: a row index on the
//! left, a header line, and right-aligned columns separated by two spaces.

use crate::extract::ExtractError;

/// A rectangular-ish table: one header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Splits the first row off as the header.
    pub fn from_records(mut records: Vec<Vec<String>>) -> Self {
        if records.is_empty() {
            return Self::default();
        }
        let columns = records.remove(0);
        Self {
            columns,
            rows: records,
        }
    }

    /// Renders the table as aligned plain text.
    pub fn render(&self) -> String {
        if self.rows.is_empty() {
            return format!(
                "Empty DataFrame\nColumns: [{}]\nIndex: []",
                self.columns.join(", ")
            );
        }

        let width = self
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(self.columns.len()))
            .max()
            .unwrap_or(0);

        let header: Vec<&str> = (0..width)
            .map(|i| self.columns.get(i).map(String::as_str).unwrap_or(""))
            .collect();
        let cells: Vec<Vec<&str>> = self
            .rows
            .iter()
            .map(|row| {
                (0..width)
                    .map(|i| match row.get(i).map(String::as_str) {
                        Some("") | None => "NaN",
                        Some(v) => v,
                    })
                    .collect()
            })
            .collect();

        let mut col_widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
        for row in &cells {
            for (i, cell) in row.iter().enumerate() {
                col_widths[i] = col_widths[i].max(cell.chars().count());
            }
        }
        let index_width = (self.rows.len() - 1).to_string().len();

        let mut lines = Vec::with_capacity(cells.len() + 1);
        let mut line = " ".repeat(index_width);
        for (h, w) in header.iter().zip(&col_widths) {
            line.push_str(&format!("  {:>w$}", h, w = *w));
        }
        lines.push(line);

        for (idx, row) in cells.iter().enumerate() {
            let mut line = format!("{:<w$}", idx, w = index_width);
            for (cell, w) in row.iter().zip(&col_widths) {
                line.push_str(&format!("  {:>w$}", cell, w = *w));
            }
            lines.push(line);
        }

        lines.join("\n")
    }
}

/// Parses comma-separated text into records, header row included.
///
/// Rows may have differing lengths; blank lines are skipped. A leading
/// UTF-8 byte-order mark is ignored.
pub fn parse_csv(input: &str) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(input.trim_start_matches('\u{feff}').as_bytes());

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect::<Vec<_>>())
                .map_err(|e| ExtractError::Csv(e.to_string()))
        })
        .collect()
}

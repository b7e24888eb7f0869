use crate::structs::{GeoError, Result, Table};
use csv::{ReaderBuilder, Trim};
use std::fs;
use std::path::Path;

impl Table {
    /// Parse a headerless whitespace- or comma-delimited numeric file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or its content is not a
    /// rectangular table of finite numbers
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| GeoError::Load(format!("Cannot read {}: {e}", path.display())))?;
        Self::from_text(&content)
    }

    /// Parse table text; commas anywhere select comma-delimited mode,
    /// otherwise runs of whitespace separate columns
    ///
    /// # Errors
    /// Returns error if a row is ragged or a value is not a finite number
    pub fn from_text(content: &str) -> Result<Self> {
        let (delimiter, normalized) = if content.contains(',') {
            (b',', non_blank_lines(content).collect::<Vec<_>>().join("\n"))
        } else {
            let lines: Vec<String> = non_blank_lines(content)
                .map(|line| line.split_whitespace().collect::<Vec<_>>().join("\t"))
                .collect();
            (b'\t', lines.join("\n"))
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .trim(Trim::All)
            .from_reader(normalized.as_bytes());

        let mut rows = Vec::new();
        for (row_idx, result) in reader.records().enumerate() {
            let record =
                result.map_err(|e| GeoError::Load(format!("Row {}: {e}", row_idx + 1)))?;
            let row = record
                .iter()
                .enumerate()
                .map(|(col_idx, s)| parse_value(s, row_idx, col_idx))
                .collect::<Result<Vec<f64>>>()?;
            rows.push(row);
        }

        Self::from_rows(rows)
    }
}

fn non_blank_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().filter(|line| !line.trim().is_empty())
}

fn parse_value(raw: &str, row_idx: usize, col_idx: usize) -> Result<f64> {
    raw.parse::<f64>().map_err(|_| {
        GeoError::Load(format!(
            "Row {}, column {}: '{raw}' is not a number",
            row_idx + 1,
            col_idx + 1
        ))
    })
}

use std::io::{self, Write};

use serde_json::Value;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Column-aligned rows for `--format table`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths = self.headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
        for row in &self.rows {
            for (index, cell) in row.iter().enumerate() {
                let width = cell.chars().count();
                match widths.get_mut(index) {
                    Some(current) => *current = (*current).max(width),
                    None => widths.push(width),
                }
            }
        }
        widths
    }

    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let widths = self.widths();
        let line = |cells: Vec<&str>| {
            cells
                .iter()
                .enumerate()
                .map(|(index, cell)| {
                    let width = widths.get(index).copied().unwrap_or(0);
                    format!("{cell:<width$}")
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_owned()
        };

        writeln!(out, "{}", line(self.headers.clone()))?;
        for row in &self.rows {
            writeln!(out, "{}", line(row.iter().map(String::as_str).collect()))?;
        }
        Ok(())
    }
}

/// What a command hands back for rendering.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub data: Value,
    pub table: Table,
    pub notes: Vec<String>,
    /// Symbols that could not be checked; drives `--strict`.
    pub failure_count: usize,
}

impl CommandOutput {
    pub fn new(data: Value, table: Table) -> Self {
        Self {
            data,
            table,
            notes: Vec::new(),
            failure_count: 0,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_failures(mut self, failure_count: usize) -> Self {
        self.failure_count = failure_count;
        self
    }
}

pub fn render(output: &CommandOutput, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match format {
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(&output.data)?
            } else {
                serde_json::to_string(&output.data)?
            };
            writeln!(out, "{payload}")?;
        }
        OutputFormat::Table => {
            if !output.table.is_empty() {
                output.table.write_to(&mut out)?;
            }
            for note in &output.notes {
                writeln!(out, "{note}")?;
            }
        }
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_columns_are_aligned() {
        let mut table = Table::new(vec!["symbol", "price"]);
        table.push(vec![String::from("FR0000121014"), String::from("612.40")]);
        table.push(vec![String::from("KO"), String::from("61.5")]);

        let mut buffer = Vec::new();
        table.write_to(&mut buffer).expect("write to vec");

        let text = String::from_utf8(buffer).expect("utf8");
        assert_eq!(
            text,
            "symbol        price\nFR0000121014  612.40\nKO            61.5\n"
        );
    }
}

//! Purpose: Run loader, comparator and writer as one sequential pass.
//! Exports: `PipelineConfig`, `RunReport`, `RunSummary`, `run_pipeline`, `parse_delimiter`.
//! Role: Stage-boundary glue shared by the CLI and integration tests.
//! Invariants: Stage failures are captured in `RunReport`, never propagated or panicked.
//! Invariants: A failed load continues as "no data" so the output table still gets written.
use std::path::PathBuf;

use serde::Serialize;

use crate::core::compare::{UniqueOrder, order_unique, unique_values};
use crate::core::error::{Error, ErrorKind, to_exit_code};
use crate::core::loader::{LoadOptions, LoadedTable, load_table};
use crate::core::selection::ColumnSelection;
use crate::core::writer::{WriteOptions, WriteSummary, write_unique};
use crate::notice::Notice;

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub selection: ColumnSelection,
    pub load: LoadOptions,
    pub write: WriteOptions,
    pub order: UniqueOrder,
}

#[derive(Debug)]
pub struct RunReport {
    pub rows_read: u64,
    pub malformed_rows: usize,
    pub unique: usize,
    pub columns: Vec<usize>,
    pub load_error: Option<Error>,
    pub write: Result<WriteSummary, Error>,
}

/// Machine-readable success summary printed by `--json`.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RunSummary {
    pub output: String,
    pub rows: u64,
    pub rows_read: u64,
    pub malformed_rows: usize,
    pub columns: Vec<usize>,
    pub labeled: bool,
}

impl RunReport {
    pub fn first_failure(&self) -> Option<&Error> {
        self.load_error.as_ref().or(self.write.as_ref().err())
    }

    /// Exit status for the run. Without `strict` every completed run exits 0.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if !strict {
            return 0;
        }
        if let Some(err) = self.first_failure() {
            return to_exit_code(err.kind());
        }
        if self.malformed_rows > 0 {
            return to_exit_code(ErrorKind::Malformed);
        }
        0
    }

    pub fn summary(&self) -> Option<RunSummary> {
        let written = self.write.as_ref().ok()?;
        Some(RunSummary {
            output: written.path.display().to_string(),
            rows: written.rows,
            rows_read: self.rows_read,
            malformed_rows: self.malformed_rows,
            columns: self.columns.clone(),
            labeled: written.labeled,
        })
    }
}

pub fn run_pipeline<N>(config: &PipelineConfig, mut on_notice: N) -> RunReport
where
    N: FnMut(&Notice),
{
    let source = config.input.display().to_string();
    tracing::info!(
        input = %source,
        output = %config.output.display(),
        columns = ?config.selection.distinct(),
        "starting run"
    );

    let (table, load_error) = match load_table(
        &config.input,
        &config.selection,
        &config.load,
        |row| on_notice(&Notice::malformed_row(row, &source)),
    ) {
        Ok(table) => (table, None),
        Err(err) => {
            tracing::warn!(error = %err, "load failed; continuing with no data");
            (LoadedTable::empty(&config.selection), Some(err))
        }
    };

    let unique = order_unique(unique_values(&table, &config.selection), config.order);
    let write = write_unique(
        &config.output,
        &unique,
        &table.names,
        &config.selection,
        &config.write,
    );
    if let Err(err) = &write {
        tracing::warn!(error = %err, "write failed");
    }

    RunReport {
        rows_read: table.rows_read,
        malformed_rows: table.malformed.len(),
        unique: unique.len(),
        columns: config.selection.distinct().to_vec(),
        load_error,
        write,
    }
}

/// Accepts a single ASCII character, or `\t` / `tab` for a tab.
pub fn parse_delimiter(value: &str) -> Result<u8, Error> {
    match value {
        "\\t" | "tab" => return Ok(b'\t'),
        _ => {}
    }
    match value.as_bytes() {
        [byte] if byte.is_ascii() => Ok(*byte),
        _ => Err(Error::new(ErrorKind::Usage)
            .with_message(format!("invalid delimiter `{value}`"))
            .with_hint("Use a single ASCII character, e.g. `--delimiter ';'` or `--delimiter tab`.")),
    }
}

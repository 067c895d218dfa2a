//! Purpose: Write unique values to a delimited output table.
//! Exports: `LabelMode`, `WriteOptions`, `WriteSummary`, `column_label`, `write_unique`.
//! Role: Last pipeline stage; one output row per unique value, no header row.
//! Invariants: Every row carries the same label (all selected column names).
//! Invariants: Failures come back as `ErrorKind::Io` values, never panics.
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use csv::WriterBuilder;

use crate::core::compare::UniqueValue;
use crate::core::error::{Error, ErrorKind};
use crate::core::loader::ColumnNames;
use crate::core::selection::ColumnSelection;

pub const LABEL_SEPARATOR: &str = ", ";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum LabelMode {
    /// Label only when the source had a header row.
    #[default]
    Auto,
    /// Always label; columns without a header name use their index.
    Always,
    Never,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WriteOptions {
    pub delimiter: u8,
    pub label: LabelMode,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            label: LabelMode::Auto,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub rows: u64,
    pub labeled: bool,
}

pub fn column_label(names: &ColumnNames, selection: &ColumnSelection) -> String {
    selection
        .distinct()
        .iter()
        .map(|index| match names.get(*index) {
            Some(name) => name.to_string(),
            None => index.to_string(),
        })
        .collect::<Vec<_>>()
        .join(LABEL_SEPARATOR)
}

pub fn write_unique(
    path: &Path,
    unique: &[UniqueValue],
    names: &ColumnNames,
    selection: &ColumnSelection,
    options: &WriteOptions,
) -> Result<WriteSummary, Error> {
    let label = match options.label {
        LabelMode::Never => None,
        LabelMode::Auto if names.is_empty() => None,
        LabelMode::Auto | LabelMode::Always => Some(column_label(names, selection)),
    };

    let file = File::create(path).map_err(|err| {
        io_error(err, "failed to create output file").with_path(path)
    })?;
    let mut writer = WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(BufWriter::new(file));

    let mut rows = 0u64;
    for item in unique {
        let result = match &label {
            Some(label) => writer.write_record([item.value.as_str(), label.as_str()]),
            None => writer.write_record([item.value.as_str()]),
        };
        result.map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write output row")
                .with_path(path)
                .with_row(rows + 1)
                .with_source(err)
        })?;
        rows += 1;
    }

    writer
        .flush()
        .map_err(|err| io_error(err, "failed to flush output file").with_path(path))?;

    tracing::debug!(path = %path.display(), rows, "wrote unique values");
    Ok(WriteSummary {
        path: path.to_path_buf(),
        rows,
        labeled: label.is_some(),
    })
}

fn io_error(err: io::Error, message: &str) -> Error {
    Error::new(ErrorKind::Io)
        .with_message(message)
        .with_source(err)
}

//! Purpose: Read a delimited source table into per-column value sets.
//! Exports: `LoadOptions`, `LoadedTable`, `ColumnValues`, `ColumnNames`, `MalformedRow`, `load_table`.
//! Role: First pipeline stage; owns all value-set state for one run.
//! Invariants: Sets exist for every distinct selected index, even when empty.
//! Invariants: A short row only loses the associations it has no field for.
//! Invariants: Values are compared as exact strings; no trimming or coercion.
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;
use std::rc::Rc;

use csv::{ReaderBuilder, StringRecord};

use crate::core::error::{Error, ErrorKind};
use crate::core::selection::ColumnSelection;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LoadOptions {
    pub has_header: bool,
    pub delimiter: u8,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            has_header: false,
            delimiter: b',',
        }
    }
}

/// Distinct values seen in one column, in first-discovery order.
/// Order and membership share one allocation per value.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColumnValues {
    ordered: Vec<Rc<str>>,
    seen: HashSet<Rc<str>>,
}

impl ColumnValues {
    pub fn insert(&mut self, value: &str) -> bool {
        if self.seen.contains(value) {
            return false;
        }
        let value: Rc<str> = Rc::from(value);
        self.seen.insert(Rc::clone(&value));
        self.ordered.push(value);
        true
    }

    pub fn contains(&self, value: &str) -> bool {
        self.seen.contains(value)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(|value| &**value)
    }
}

impl<S: AsRef<str>> FromIterator<S> for ColumnValues {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut values = ColumnValues::default();
        for value in iter {
            values.insert(value.as_ref());
        }
        values
    }
}

/// Header labels by column position. Empty when the source has no header row.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ColumnNames(BTreeMap<usize, String>);

impl ColumnNames {
    pub fn from_header(header: &StringRecord) -> Self {
        Self(
            header
                .iter()
                .enumerate()
                .map(|(index, name)| (index, name.to_string()))
                .collect(),
        )
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(&index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MalformedRow {
    /// 1-based position among data rows (the header is not counted).
    pub row: u64,
    /// 1-based physical line in the source file where the row starts.
    pub line: u64,
    pub fields: usize,
    pub missing: Vec<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadedTable {
    columns: BTreeMap<usize, ColumnValues>,
    pub names: ColumnNames,
    pub rows_read: u64,
    pub malformed: Vec<MalformedRow>,
}

impl LoadedTable {
    /// The "no data" table: an empty set for every selected column and no names.
    pub fn empty(selection: &ColumnSelection) -> Self {
        Self {
            columns: selection
                .distinct()
                .iter()
                .map(|index| (*index, ColumnValues::default()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn column(&self, index: usize) -> Option<&ColumnValues> {
        self.columns.get(&index)
    }

    pub fn column_mut(&mut self, index: usize) -> &mut ColumnValues {
        self.columns.entry(index).or_default()
    }
}

pub fn load_table<F>(
    path: &Path,
    selection: &ColumnSelection,
    options: &LoadOptions,
    mut on_malformed: F,
) -> Result<LoadedTable, Error>
where
    F: FnMut(&MalformedRow),
{
    let source = fs::read(path).map_err(|err| open_error(err, path))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(options.delimiter)
        .from_reader(source.as_slice());

    let mut table = LoadedTable::empty(selection);
    let mut lines = LineCounter::new(&source);
    let mut header_pending = options.has_header;
    let mut record = StringRecord::new();
    let mut record_end = 0usize;

    loop {
        // The reader drops empty lines; they are still rows with no fields.
        let (blank, content_start) = blank_lines_after(&source, record_end);
        let content_line = lines.line_at(content_start);
        if header_pending {
            if blank > 0 {
                tracing::debug!(blank, "skipped empty lines before header row");
            }
        } else {
            for offset in (1..=blank).rev() {
                table.rows_read += 1;
                let malformed = MalformedRow {
                    row: table.rows_read,
                    line: content_line - offset,
                    fields: 0,
                    missing: selection.distinct().to_vec(),
                };
                on_malformed(&malformed);
                table.malformed.push(malformed);
            }
        }

        let data_row = (!header_pending).then_some(table.rows_read + 1);
        let more = reader
            .read_record(&mut record)
            .map_err(|err| read_error(err, path, data_row))?;
        if !more {
            break;
        }
        record_end = usize::try_from(reader.position().byte()).unwrap_or(source.len());

        if header_pending {
            header_pending = false;
            table.names = ColumnNames::from_header(&record);
            tracing::debug!(columns = table.names.len(), "read header row");
            continue;
        }

        table.rows_read += 1;
        let mut missing = Vec::new();
        for &index in selection.distinct() {
            match record.get(index) {
                Some(value) => {
                    table.column_mut(index).insert(value);
                }
                None => missing.push(index),
            }
        }

        if !missing.is_empty() {
            let malformed = MalformedRow {
                row: table.rows_read,
                line: content_line,
                fields: record.len(),
                missing,
            };
            on_malformed(&malformed);
            table.malformed.push(malformed);
        }
    }

    tracing::debug!(
        path = %path.display(),
        rows = table.rows_read,
        malformed = table.malformed.len(),
        "loaded source table"
    );
    Ok(table)
}

/// Counts empty lines starting at `offset`, the byte just past the previous record.
/// Returns the count and the offset where the next record (or EOF) begins.
fn blank_lines_after(source: &[u8], offset: usize) -> (u64, usize) {
    let gap = source[offset..]
        .iter()
        .take_while(|byte| matches!(**byte, b'\n' | b'\r'))
        .count();
    let mut blank = source[offset..offset + gap]
        .iter()
        .filter(|byte| **byte == b'\n')
        .count() as u64;
    // A `\r\n` terminator may be split across the previous record and this gap.
    if offset > 0 && source[offset - 1] == b'\r' && source.get(offset) == Some(&b'\n') {
        blank -= 1;
    }
    (blank, offset + gap)
}

struct LineCounter<'a> {
    source: &'a [u8],
    scanned: usize,
    line: u64,
}

impl<'a> LineCounter<'a> {
    fn new(source: &'a [u8]) -> Self {
        Self {
            source,
            scanned: 0,
            line: 1,
        }
    }

    /// 1-based line of `offset`. Offsets must not decrease between calls.
    fn line_at(&mut self, offset: usize) -> u64 {
        let offset = offset.max(self.scanned);
        self.line += self.source[self.scanned..offset]
            .iter()
            .filter(|byte| **byte == b'\n')
            .count() as u64;
        self.scanned = offset;
        self.line
    }
}

fn open_error(err: io::Error, path: &Path) -> Error {
    let kind = match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::NotFound,
        _ => ErrorKind::Io,
    };
    let message = match kind {
        ErrorKind::NotFound => "source file not found",
        _ => "failed to read source file",
    };
    Error::new(kind)
        .with_message(message)
        .with_path(path)
        .with_source(err)
}

fn read_error(err: csv::Error, path: &Path, data_row: Option<u64>) -> Error {
    let mut out = match err.kind() {
        csv::ErrorKind::Io(_) => {
            Error::new(ErrorKind::Io).with_message("failed to read source file")
        }
        csv::ErrorKind::Utf8 { .. } => Error::new(ErrorKind::Malformed)
            .with_message("source record is not valid UTF-8")
            .with_hint("Re-encode the file as UTF-8."),
        _ => Error::new(ErrorKind::Malformed).with_message("failed to parse source record"),
    };
    if let Some(row) = data_row {
        out = out.with_row(row);
    }
    out.with_path(path).with_source(err)
}

#[cfg(test)]
mod tests {
    use super::{ColumnValues, LoadOptions, load_table};
    use crate::core::error::ErrorKind;
    use crate::core::selection::ColumnSelection;
    use std::fs;

    fn values(table: &super::LoadedTable, index: usize) -> Vec<String> {
        table
            .column(index)
            .expect("column")
            .iter()
            .map(str::to_string)
            .collect()
    }

    fn write_source(contents: &[u8]) -> (tempfile::TempDir, std::path::PathBuf) {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("source.csv");
        fs::write(&path, contents).expect("write source");
        (temp, path)
    }

    #[test]
    fn column_values_keep_discovery_order() {
        let set: ColumnValues = ["b", "a", "b", "c"].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert!(set.contains("a"));
        assert_eq!(set.len(), 3);

        let mut set = set;
        assert!(!set.insert("a"));
        assert!(set.insert("d"));
        assert_eq!(set.iter().last(), Some("d"));
    }

    #[test]
    fn header_row_becomes_names() {
        let (_temp, path) = write_source(b"A,B\n1,2\n3,2\n5,6\n");
        let selection = ColumnSelection::new(vec![0, 1]).expect("selection");
        let options = LoadOptions {
            has_header: true,
            ..LoadOptions::default()
        };
        let table = load_table(&path, &selection, &options, |_| {}).expect("load");

        assert_eq!(table.names.get(0), Some("A"));
        assert_eq!(table.names.get(1), Some("B"));
        assert_eq!(table.rows_read, 3);
        assert_eq!(values(&table, 0), vec!["1", "3", "5"]);
        assert_eq!(values(&table, 1), vec!["2", "6"]);
    }

    #[test]
    fn without_header_first_row_is_data() {
        let (_temp, path) = write_source(b"A,B\n1,2\n");
        let selection = ColumnSelection::new(vec![0, 1]).expect("selection");
        let table =
            load_table(&path, &selection, &LoadOptions::default(), |_| {}).expect("load");

        assert!(table.names.is_empty());
        assert_eq!(table.rows_read, 2);
        assert_eq!(values(&table, 0), vec!["A", "1"]);
    }

    #[test]
    fn short_row_keeps_fields_it_has() {
        let (_temp, path) = write_source(b"x,y,z\nonly\np,q\n");
        let selection = ColumnSelection::new(vec![0, 2]).expect("selection");
        let mut reported = Vec::new();
        let table = load_table(&path, &selection, &LoadOptions::default(), |row| {
            reported.push(row.clone())
        })
        .expect("load");

        assert_eq!(values(&table, 0), vec!["x", "only", "p"]);
        assert_eq!(values(&table, 2), vec!["z"]);
        assert_eq!(reported.len(), 2);
        assert_eq!(reported[0].row, 2);
        assert_eq!(reported[0].line, 2);
        assert_eq!(reported[0].fields, 1);
        assert_eq!(reported[0].missing, vec![2]);
        assert_eq!(table.malformed, reported);
    }

    #[test]
    fn missing_source_is_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent.csv");
        let selection = ColumnSelection::new(vec![0]).expect("selection");
        let err = load_table(&path, &selection, &LoadOptions::default(), |_| {})
            .expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.path(), Some(path.as_path()));
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let (_temp, path) = write_source(b"a,b\n\xff\xfe,c\n");
        let selection = ColumnSelection::new(vec![0, 1]).expect("selection");
        let err = load_table(&path, &selection, &LoadOptions::default(), |_| {})
            .expect_err("utf8");
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.row(), Some(2));
    }

    #[test]
    fn custom_delimiter_and_empty_header_only_file() {
        let (_temp, path) = write_source(b"a\tb\n");
        let selection = ColumnSelection::new(vec![1]).expect("selection");
        let options = LoadOptions {
            has_header: true,
            delimiter: b'\t',
        };
        let table = load_table(&path, &selection, &options, |_| {}).expect("load");
        assert_eq!(table.names.get(1), Some("b"));
        assert_eq!(table.rows_read, 0);
        assert!(table.column(1).expect("column").is_empty());
    }

    #[test]
    fn empty_line_is_a_row_with_no_fields() {
        let (_temp, path) = write_source(b"1,2\n\n3,4\n");
        let selection = ColumnSelection::new(vec![0, 1]).expect("selection");
        let mut reported = Vec::new();
        let table = load_table(&path, &selection, &LoadOptions::default(), |row| {
            reported.push(row.clone())
        })
        .expect("load");

        assert_eq!(table.rows_read, 3);
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].row, 2);
        assert_eq!(reported[0].line, 2);
        assert_eq!(reported[0].fields, 0);
        assert_eq!(reported[0].missing, vec![0, 1]);
        assert_eq!(values(&table, 0), vec!["1", "3"]);
        assert_eq!(values(&table, 1), vec!["2", "4"]);
    }

    #[test]
    fn empty_lines_keep_later_rows_on_their_file_lines() {
        let (_temp, path) = write_source(b"A,B\r\n1,2\r\n\r\n\r\nshort\r\n\r\n");
        let selection = ColumnSelection::new(vec![0, 1]).expect("selection");
        let options = LoadOptions {
            has_header: true,
            ..LoadOptions::default()
        };
        let table = load_table(&path, &selection, &options, |_| {}).expect("load");

        let rows: Vec<(u64, u64, usize)> = table
            .malformed
            .iter()
            .map(|row| (row.row, row.line, row.fields))
            .collect();
        assert_eq!(rows, vec![(2, 3, 0), (3, 4, 0), (4, 5, 1), (5, 6, 0)]);
        assert_eq!(table.rows_read, 5);
        assert_eq!(values(&table, 0), vec!["1", "short"]);
    }

    #[test]
    fn empty_lines_before_header_are_not_rows() {
        let (_temp, path) = write_source(b"\n\nA,B\n1,2\n");
        let selection = ColumnSelection::new(vec![0, 1]).expect("selection");
        let options = LoadOptions {
            has_header: true,
            ..LoadOptions::default()
        };
        let table = load_table(&path, &selection, &options, |_| {}).expect("load");
        assert_eq!(table.names.get(0), Some("A"));
        assert_eq!(table.rows_read, 1);
        assert!(table.malformed.is_empty());
    }

    #[test]
    fn invalid_utf8_row_counts_data_rows_only() {
        let (_temp, path) = write_source(b"A,B\n1,2\n\xff,3\n");
        let selection = ColumnSelection::new(vec![0, 1]).expect("selection");
        let options = LoadOptions {
            has_header: true,
            ..LoadOptions::default()
        };
        let err = load_table(&path, &selection, &options, |_| {}).expect_err("utf8");
        assert_eq!(err.kind(), ErrorKind::Malformed);
        assert_eq!(err.row(), Some(2));
    }
}

//! Purpose: Validated list of column indices taking part in a comparison.
//! Exports: `ColumnSelection`, `parse_column_list`.
//! Role: Single construction point so later stages never see an empty selection.
//! Invariants: A selection always holds at least one index.
//! Invariants: `distinct()` preserves first-occurrence order.
use std::collections::HashSet;

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnSelection {
    indices: Vec<usize>,
    distinct: Vec<usize>,
}

impl ColumnSelection {
    pub fn new(indices: Vec<usize>) -> Result<Self, Error> {
        if indices.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("at least one column index is required")
                .with_hint("Pass columns with -c, e.g. `-c 0,1`."));
        }
        let mut seen = HashSet::new();
        let distinct = indices
            .iter()
            .copied()
            .filter(|index| seen.insert(*index))
            .collect();
        Ok(Self { indices, distinct })
    }

    /// Indices as given, repeats included.
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn distinct(&self) -> &[usize] {
        &self.distinct
    }

    /// Highest selected index; a row needs `max_index() + 1` fields to be complete.
    pub fn max_index(&self) -> usize {
        self.distinct.iter().copied().max().unwrap_or(0)
    }
}

/// Parse repeated `-c` values, each of which may hold a comma-separated list.
pub fn parse_column_list<S: AsRef<str>>(values: &[S]) -> Result<Vec<usize>, Error> {
    let mut indices = Vec::new();
    for token in values
        .iter()
        .flat_map(|value| value.as_ref().split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
    {
        let index = token.parse::<usize>().map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid column index `{token}`"))
                .with_hint("Column indices are 0-based non-negative integers.")
                .with_source(err)
        })?;
        indices.push(index);
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::{ColumnSelection, parse_column_list};
    use crate::core::error::ErrorKind;

    #[test]
    fn empty_selection_is_rejected() {
        let err = ColumnSelection::new(Vec::new()).expect_err("empty");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert!(err.hint().is_some());
    }

    #[test]
    fn duplicates_collapse_in_first_occurrence_order() {
        let selection = ColumnSelection::new(vec![2, 0, 2, 1, 0]).expect("selection");
        assert_eq!(selection.indices(), &[2, 0, 2, 1, 0]);
        assert_eq!(selection.distinct(), &[2, 0, 1]);
        assert_eq!(selection.max_index(), 2);
    }

    #[test]
    fn column_list_accepts_repeats_and_commas() {
        let parsed = parse_column_list(&["0,1", " 3 ", "4,,5"]).expect("parse");
        assert_eq!(parsed, vec![0, 1, 3, 4, 5]);
    }

    #[test]
    fn column_list_rejects_negative_and_text() {
        for bad in ["-1", "a", "1.5"] {
            let err = parse_column_list(&[bad]).expect_err(bad);
            assert_eq!(err.kind(), ErrorKind::Usage);
            assert!(err.message().unwrap_or_default().contains(bad));
        }
    }
}

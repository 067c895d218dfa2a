//! Purpose: Generalized symmetric difference over per-column value sets.
//! Exports: `UniqueValue`, `UniqueOrder`, `unique_values`, `order_unique`.
//! Role: Pure comparison stage between loader and writer.
//! Invariants: A value is kept iff exactly one distinct selected column contains it.
//! Invariants: `FirstSeen` output follows selection order, then discovery order.
use std::collections::HashMap;

use crate::core::loader::LoadedTable;
use crate::core::selection::ColumnSelection;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UniqueValue {
    pub value: String,
    /// Index of the only selected column holding `value`.
    pub column: usize,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum UniqueOrder {
    #[default]
    FirstSeen,
    Sorted,
}

pub fn unique_values(table: &LoadedTable, selection: &ColumnSelection) -> Vec<UniqueValue> {
    let columns = selection.distinct();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for &index in columns {
        let Some(values) = table.column(index) else {
            continue;
        };
        for value in values.iter() {
            *counts.entry(value).or_default() += 1;
        }
    }

    let mut unique = Vec::new();
    for &index in columns {
        let Some(values) = table.column(index) else {
            continue;
        };
        unique.extend(
            values
                .iter()
                .filter(|value| counts.get(value).copied() == Some(1))
                .map(|value| UniqueValue {
                    value: value.to_string(),
                    column: index,
                }),
        );
    }

    tracing::debug!(
        columns = columns.len(),
        distinct_values = counts.len(),
        unique = unique.len(),
        "computed unique values"
    );
    unique
}

pub fn order_unique(mut unique: Vec<UniqueValue>, order: UniqueOrder) -> Vec<UniqueValue> {
    if order == UniqueOrder::Sorted {
        unique.sort_by(|left, right| left.value.cmp(&right.value));
    }
    unique
}

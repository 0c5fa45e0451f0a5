use itertools::Itertools;
use log::info;

use crate::{
    error::{EtlError, EtlResult},
    model::{EtlCell, EtlColumnType, Table, TermRef},
};

use super::{MappedTerm, MinedCell};

/// One serialized string per row. Each row must be covered by exactly one
/// cell.
pub fn serialize_rows(cells: &[MinedCell], row_count: usize) -> EtlResult<Vec<String>> {
    let mut rows: Vec<Option<String>> = vec![None; row_count];
    for cell in cells {
        let serialized = cell.serialize_terms();
        for row in &cell.row_index_list {
            let slot = rows.get_mut(*row).ok_or_else(|| {
                EtlError::Projection(format!("row index {row} is out of range ({row_count} rows)"))
            })?;
            if slot.is_some() {
                return Err(EtlError::Projection(format!("row {row} is covered twice")));
            }
            *slot = Some(serialized.clone());
        }
    }
    rows.into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.ok_or_else(|| EtlError::Projection(format!("row {row} is not covered")))
        })
        .collect()
}

/// Distinct terms over all cells, first-seen order.
pub fn term_union(cells: &[MinedCell]) -> Vec<TermRef> {
    cells
        .iter()
        .flat_map(|c| c.mapped_term_list.iter())
        .unique_by(|t| t.hpo_id.clone())
        .map(MappedTerm::term_ref)
        .collect()
}

/// Writes the reviewed cells into column `index`, which becomes a
/// `MultipleHpoTerm` column listing every mapped term.
pub fn project(table: &Table, index: usize, cells: &[MinedCell]) -> EtlResult<Table> {
    let column = table.column(index)?;
    let serialized = serialize_rows(cells, column.len())?;
    let terms = term_union(cells);
    if terms.is_empty() {
        return Err(EtlError::Precondition(format!(
            "no HPO terms were mapped for column '{}'",
            column.header.label()
        )));
    }
    let values = column
        .values
        .iter()
        .zip(serialized)
        .map(|(cell, value)| EtlCell::transformed(cell.original(), value))
        .collect();
    let mut header = column.header.clone();
    header.column_type = EtlColumnType::MultipleHpoTerm;
    header.hpo_terms = terms;
    info!(
        "Projected {} term(s) into column '{}'",
        header.hpo_terms.len(),
        header.label()
    );
    table.with_column_replaced(index, column.rebuilt(header, values))
}

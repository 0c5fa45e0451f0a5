//! Session files and the lookups every command shares.

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use log::debug;

use crate::{config::EtlConfig, model::Table, ontology::LabelIndex, store::ColumnStore};

pub fn open_store(path: &Path) -> Result<ColumnStore> {
    let table = Table::load(path)?;
    let store = ColumnStore::with_table(table)
        .with_context(|| format!("Opening session {path:?}"))?;
    Ok(store)
}

pub fn save_store(store: &ColumnStore, path: &Path) -> Result<()> {
    let snapshot = store
        .get()
        .ok_or_else(|| anyhow!("Session {path:?} has no table to save"))?;
    snapshot
        .table()
        .save(path)
        .with_context(|| format!("Writing session to {path:?}"))?;
    debug!("Saved table version {} to {path:?}", snapshot.version());
    Ok(())
}

/// A 0-based index or a header (current label first, then original),
/// compared case-insensitively.
pub fn resolve_column(table: &Table, selector: &str) -> Result<usize> {
    let selector = selector.trim();
    if let Ok(index) = selector.parse::<usize>() {
        if index >= table.column_count() {
            bail!(
                "Column index {index} is out of range ({} column(s))",
                table.column_count()
            );
        }
        return Ok(index);
    }
    table
        .columns
        .iter()
        .position(|c| c.header.label().eq_ignore_ascii_case(selector))
        .or_else(|| {
            table
                .columns
                .iter()
                .position(|c| c.header.original.eq_ignore_ascii_case(selector))
        })
        .ok_or_else(|| anyhow!("Column '{selector}' not found"))
}

/// Term list from the command line, else from the config, else empty.
pub fn load_matcher(terms: Option<&Path>, config: &EtlConfig) -> Result<LabelIndex> {
    match terms.or(config.terms.as_deref()) {
        Some(path) => LabelIndex::load(path),
        None => Ok(LabelIndex::default()),
    }
}

/// Like [`load_matcher`] but an empty term list is an error.
pub fn require_matcher(terms: Option<&Path>, config: &EtlConfig) -> Result<LabelIndex> {
    let index = load_matcher(terms, config)?;
    if index.is_empty() {
        bail!("A term list is required (pass --terms or set `terms` in the config)");
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Column;

    #[test]
    fn columns_resolve_by_index_or_header() {
        let table = Table::new(
            "t.csv",
            vec![Column::new("Patient ID", ["P1"]), Column::new("Sex", ["m"])],
        )
        .unwrap();
        assert_eq!(resolve_column(&table, "1").unwrap(), 1);
        assert_eq!(resolve_column(&table, "patient id").unwrap(), 0);
        assert!(resolve_column(&table, "2").is_err());
        assert!(resolve_column(&table, "age").is_err());
    }
}

//! Column model store.
//!
//! The store owns the session table and republishes a whole new
//! `Arc<Table>` on every change. Columns are shared between versions unless
//! touched, so observers can detect change with `Arc::ptr_eq`. Operations that
//! do slow work (dialogs, backend calls) capture a [`Snapshot`] and commit
//! against its version; a commit on a stale version is rejected.

use std::{cell::RefCell, collections::HashMap, fmt, sync::Arc};

use log::debug;

use crate::{
    error::{EtlError, EtlResult},
    model::{Column, Table},
};

#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    table: Arc<Table>,
}

impl Snapshot {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }
}

type Listener = Box<dyn FnMut(Option<&Snapshot>)>;

#[derive(Default)]
struct ViewCache {
    fully_transformed: HashMap<usize, bool>,
    unique_values: HashMap<usize, Vec<String>>,
}

#[derive(Default)]
pub struct ColumnStore {
    current: Option<Snapshot>,
    version: u64,
    views: RefCell<ViewCache>,
    listeners: Vec<Listener>,
}

impl fmt::Debug for ColumnStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnStore")
            .field("version", &self.version)
            .field("current", &self.current)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ColumnStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(table: Table) -> EtlResult<Self> {
        let mut store = Self::new();
        store.load(table)?;
        Ok(store)
    }

    pub fn get(&self) -> Option<Snapshot> {
        self.current.clone()
    }

    /// Like [`ColumnStore::get`] but reports a missing table as an error.
    pub fn snapshot(&self) -> EtlResult<Snapshot> {
        self.current.clone().ok_or(EtlError::NoActiveTable)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn load(&mut self, table: Table) -> EtlResult<Snapshot> {
        table.validate()?;
        Ok(self.publish(table))
    }

    /// Replaces every column of the active table.
    pub fn replace(&mut self, columns: Vec<Column>) -> EtlResult<Snapshot> {
        let snapshot = self.snapshot()?;
        let table = Table::new(snapshot.table.file_name.clone(), columns)?;
        Ok(self.publish(table))
    }

    /// Publishes `table` if nothing was committed since `expected_version`.
    pub fn commit(&mut self, expected_version: u64, table: Table) -> EtlResult<Snapshot> {
        if self.current.is_none() {
            return Err(EtlError::NoActiveTable);
        }
        if expected_version != self.version {
            return Err(EtlError::StaleSnapshot {
                expected: expected_version,
                found: self.version,
            });
        }
        table.validate()?;
        Ok(self.publish(table))
    }

    pub fn clear(&mut self) {
        self.version += 1;
        self.current = None;
        self.invalidate_views();
        for listener in &mut self.listeners {
            listener(None);
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(Option<&Snapshot>) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn is_fully_transformed(&self, column: usize) -> EtlResult<bool> {
        if let Some(cached) = self.views.borrow().fully_transformed.get(&column) {
            return Ok(*cached);
        }
        let snapshot = self.snapshot()?;
        let value = snapshot.table.column(column)?.is_fully_transformed();
        self.views
            .borrow_mut()
            .fully_transformed
            .insert(column, value);
        Ok(value)
    }

    pub fn unique_values(&self, column: usize) -> EtlResult<Vec<String>> {
        if let Some(cached) = self.views.borrow().unique_values.get(&column) {
            return Ok(cached.clone());
        }
        let snapshot = self.snapshot()?;
        let values = snapshot.table.column(column)?.unique_values();
        self.views
            .borrow_mut()
            .unique_values
            .insert(column, values.clone());
        Ok(values)
    }

    fn publish(&mut self, table: Table) -> Snapshot {
        self.version += 1;
        let snapshot = Snapshot {
            version: self.version,
            table: Arc::new(table),
        };
        debug!(
            "Publishing table version {} ({} column(s), {} row(s))",
            snapshot.version,
            snapshot.table.column_count(),
            snapshot.table.row_count()
        );
        self.current = Some(snapshot.clone());
        self.invalidate_views();
        for listener in &mut self.listeners {
            listener(Some(&snapshot));
        }
        snapshot
    }

    fn invalidate_views(&self) {
        let mut views = self.views.borrow_mut();
        views.fully_transformed.clear();
        views.unique_values.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::model::EtlCell;

    fn sample_table() -> Table {
        Table::new(
            "cohort.csv",
            vec![
                Column::new("id", ["P1", "P2"]),
                Column::new("sex", ["m", "f"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn untouched_columns_are_shared_between_versions() {
        let mut store = ColumnStore::with_table(sample_table()).unwrap();
        let before = store.snapshot().unwrap();
        let column = before.table().columns[1].with_values(vec![
            EtlCell::transformed("m", "M"),
            EtlCell::transformed("f", "F"),
        ]);
        let next = before.table().with_column_replaced(1, column).unwrap();
        let after = store.commit(before.version(), next).unwrap();

        assert!(!Arc::ptr_eq(before.table(), after.table()));
        assert!(Arc::ptr_eq(
            &before.table().columns[0],
            &after.table().columns[0]
        ));
        assert!(!Arc::ptr_eq(
            &before.table().columns[1],
            &after.table().columns[1]
        ));
    }

    #[test]
    fn stale_commit_is_rejected_without_mutation() {
        let mut store = ColumnStore::with_table(sample_table()).unwrap();
        let stale = store.snapshot().unwrap();
        store.replace(vec![Column::new("only", ["a", "b"])]).unwrap();
        let current = store.snapshot().unwrap();

        let err = store
            .commit(stale.version(), stale.table().as_ref().clone())
            .unwrap_err();
        assert!(matches!(err, EtlError::StaleSnapshot { .. }));
        assert!(Arc::ptr_eq(current.table(), store.snapshot().unwrap().table()));
    }

    #[test]
    fn views_are_recomputed_after_mutation() {
        let mut store = ColumnStore::with_table(sample_table()).unwrap();
        assert!(!store.is_fully_transformed(1).unwrap());
        assert_eq!(store.unique_values(1).unwrap(), vec!["m", "f"]);

        store
            .replace(vec![
                Column::new("id", ["P1", "P2"]),
                Column::new("sex", ["x", "x"]),
            ])
            .unwrap();
        assert_eq!(store.unique_values(1).unwrap(), vec!["x"]);
    }

    #[test]
    fn subscribers_see_every_publication() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut store = ColumnStore::new();
        store.subscribe(move |snapshot| {
            sink.borrow_mut().push(snapshot.map(|s| s.version()));
        });
        store.load(sample_table()).unwrap();
        store.clear();
        assert_eq!(*seen.borrow(), vec![Some(1), None]);
    }

    #[test]
    fn replace_without_table_is_a_precondition_error() {
        let mut store = ColumnStore::new();
        assert_eq!(
            store.replace(vec![Column::new("a", ["1"])]).unwrap_err(),
            EtlError::NoActiveTable
        );
    }
}

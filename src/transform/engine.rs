//! Applies one transform to one column of the store.
//!
//! Every run follows the same shape: capture a snapshot, check legality,
//! compute the new table (dialogs and backend calls happen here), then commit
//! against the captured version. A cancelled dialog or any error leaves the
//! store exactly as it was.

use log::{debug, info};

use crate::{
    backend::Backend,
    dialog::DialogProvider,
    error::{EtlError, EtlResult},
    mining::{self, MiningOptions},
    model::{Column, EtlCell, EtlColumnType, Table},
    ontology::TermMatcher,
    store::{ColumnStore, Snapshot},
};

use super::{
    TransformClass, TransformType, element, is_allowed, resulting_column_type, structural, tidy_fn,
};

#[derive(Debug, Clone)]
pub enum TransformOutcome {
    Applied(Snapshot),
    Cancelled,
}

impl TransformOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransformOutcome::Cancelled)
    }
}

pub struct TransformEngine<'a> {
    dialogs: &'a mut dyn DialogProvider,
    backend: &'a mut dyn Backend,
    matcher: &'a dyn TermMatcher,
    mining: MiningOptions,
}

impl<'a> TransformEngine<'a> {
    pub fn new(
        dialogs: &'a mut dyn DialogProvider,
        backend: &'a mut dyn Backend,
        matcher: &'a dyn TermMatcher,
    ) -> Self {
        Self {
            dialogs,
            backend,
            matcher,
            mining: MiningOptions::default(),
        }
    }

    pub fn with_mining_options(mut self, options: MiningOptions) -> Self {
        self.mining = options;
        self
    }

    pub fn apply(
        &mut self,
        store: &mut ColumnStore,
        column: usize,
        transform: TransformType,
    ) -> EtlResult<TransformOutcome> {
        let snapshot = store.snapshot()?;
        let next = match self.compute(snapshot.table(), column, transform)? {
            Some(table) => table,
            None => {
                info!("{transform} on column {column} cancelled");
                return Ok(TransformOutcome::Cancelled);
            }
        };
        let committed = store.commit(snapshot.version(), next)?;
        info!(
            "{transform} applied to column {column} (table version {})",
            committed.version()
        );
        Ok(TransformOutcome::Applied(committed))
    }

    /// The table `transform` would produce, without touching any store.
    pub fn compute(
        &mut self,
        table: &Table,
        column: usize,
        transform: TransformType,
    ) -> EtlResult<Option<Table>> {
        let column_type = table.column(column)?.column_type();
        if !is_allowed(column_type, transform) {
            return Err(EtlError::NotAllowed {
                transform: transform.identifier().to_string(),
                column_type,
            });
        }
        debug!(
            "Running {transform} ({:?}) on column {column} of type {column_type}",
            transform.class()
        );
        match transform.class() {
            TransformClass::ElementWise => apply_element_wise(table, column, transform).map(Some),
            TransformClass::Tidy => apply_tidy(table, column, transform).map(Some),
            TransformClass::Structural => self.apply_structural(table, column, transform),
        }
    }

    fn apply_structural(
        &mut self,
        table: &Table,
        column: usize,
        transform: TransformType,
    ) -> EtlResult<Option<Table>> {
        match transform {
            TransformType::RawColumnType => structural::reset_to_raw(table, column).map(Some),
            TransformType::IgnoreColumnType => structural::ignore(table, column).map(Some),
            TransformType::GeneSymbolColumnType => {
                structural::tag_column_type(table, column, EtlColumnType::GeneSymbol).map(Some)
            }
            TransformType::DiseaseColumnType => {
                structural::tag_column_type(table, column, EtlColumnType::Disease).map(Some)
            }
            TransformType::SplitColumn => structural::split_column(table, column, self.dialogs),
            TransformType::SplitAgeSex => structural::split_age_sex(table, column, self.dialogs),
            TransformType::DeleteColumn => structural::delete_column(table, column, self.dialogs),
            TransformType::DuplicateColumn => structural::duplicate_column(table, column).map(Some),
            TransformType::ConstantColumn => {
                structural::constant_column(table, column, self.dialogs)
            }
            TransformType::MergeIndividualFamily => {
                structural::merge_individual_family(table, column, self.dialogs)
            }
            TransformType::ReplaceUniqueValues => {
                structural::replace_unique_values(table, column, self.dialogs)
            }
            TransformType::SingleHpoTerm => {
                structural::single_hpo_term(table, column, self.dialogs)
            }
            TransformType::AnnotateVariants => {
                structural::annotate_variants(table, column, self.dialogs, self.backend)
            }
            TransformType::MultipleHpoTerm => {
                mining::run_unattended(table, column, self.matcher, &self.mining).map(Some)
            }
            other => Err(EtlError::UnknownTransform(other.identifier().to_string())),
        }
    }
}

/// Maps every cell from its `original`; unmappable values become error cells.
pub fn apply_element_wise(
    table: &Table,
    column: usize,
    transform: TransformType,
) -> EtlResult<Table> {
    let f = element::element_fn(transform)
        .ok_or_else(|| EtlError::UnknownTransform(transform.identifier().to_string()))?;
    let source = table.column(column)?;
    let values: Vec<EtlCell> = source
        .values
        .iter()
        .map(|cell| match f(cell.original()) {
            Some(value) => EtlCell::transformed(cell.original(), value),
            None => EtlCell::unmapped(cell.original()),
        })
        .collect();
    let failed = values.iter().filter(|c| !c.is_transformed()).count();
    if failed > 0 {
        debug!("{transform}: {failed} cell(s) could not be mapped");
    }
    let mut next = source.with_values(values);
    if let Some(column_type) = resulting_column_type(transform) {
        next = next.with_column_type(column_type);
    }
    table.with_column_replaced(column, next)
}

/// Tidy transforms always succeed and keep the column type.
pub fn apply_tidy(table: &Table, column: usize, transform: TransformType) -> EtlResult<Table> {
    let f = tidy_fn(transform)
        .ok_or_else(|| EtlError::UnknownTransform(transform.identifier().to_string()))?;
    let source = table.column(column)?;
    let values = source
        .values
        .iter()
        .map(|cell| EtlCell::transformed(cell.original(), f(cell.original()).into_owned()))
        .collect();
    table.with_column_replaced(column, source.with_values(values))
}

/// Overrides a single cell with a value typed by the curator.
pub fn manual_edit(
    store: &mut ColumnStore,
    column: usize,
    row: usize,
    value: &str,
) -> EtlResult<Snapshot> {
    let snapshot = store.snapshot()?;
    let source: &Column = snapshot.table().column(column)?;
    let cell = source.values.get(row).ok_or(EtlError::RowIndex {
        index: row,
        count: source.len(),
    })?;
    let mut values = source.values.clone();
    values[row] = cell.with_manual_value(value);
    let next = snapshot
        .table()
        .with_column_replaced(column, source.with_values(values))?;
    debug!("Manual edit of row {row} in column {column}");
    store.commit(snapshot.version(), next)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        backend::OfflineBackend,
        dialog::{CancelAll, DialogResponse, ScriptedDialogs},
        model::{CellStatus, TermRef},
        ontology::LabelIndex,
    };

    fn store() -> ColumnStore {
        ColumnStore::with_table(
            Table::new(
                "cohort.csv",
                vec![
                    Column::new("id", ["P1", "P2", "P3"]),
                    Column::new("onset", ["2.5 years", "Congenital onset", "soon"]),
                    Column::new("phenotype", ["nystagmus; hypotonia", "hypotonia", "n/a"]),
                ],
            )
            .unwrap(),
        )
        .unwrap()
    }

    fn applied(outcome: TransformOutcome) -> Snapshot {
        match outcome {
            TransformOutcome::Applied(snapshot) => snapshot,
            TransformOutcome::Cancelled => panic!("transform was cancelled"),
        }
    }

    #[test]
    fn element_wise_errors_are_per_cell() {
        let mut store = store();
        let matcher = LabelIndex::default();
        let mut dialogs = CancelAll;
        let mut backend = OfflineBackend;
        let mut engine = TransformEngine::new(&mut dialogs, &mut backend, &matcher);
        let snapshot = applied(engine.apply(&mut store, 1, TransformType::OnsetAge).unwrap());

        let column = &snapshot.table().columns[1];
        assert_eq!(column.column_type(), EtlColumnType::AgeOfOnset);
        assert_eq!(column.values[0].current(), "P2Y6M");
        assert_eq!(column.values[1].current(), "Congenital onset");
        assert_eq!(column.values[2].status(), CellStatus::Error);
        assert_eq!(column.values[2].error(), Some("Could not map \"soon\""));
        assert!(!store.is_fully_transformed(1).unwrap());
    }

    #[test]
    fn tidy_reads_original_and_keeps_type() {
        let mut store = store();
        let matcher = LabelIndex::default();
        let mut dialogs = CancelAll;
        let mut backend = OfflineBackend;
        let mut engine = TransformEngine::new(&mut dialogs, &mut backend, &matcher);
        engine.apply(&mut store, 0, TransformType::ToLowercase).unwrap();
        let snapshot = applied(engine.apply(&mut store, 0, TransformType::ToUppercase).unwrap());
        let column = &snapshot.table().columns[0];
        assert_eq!(column.values[0].current(), "P1");
        assert_eq!(column.column_type(), EtlColumnType::Raw);
    }

    #[test]
    fn cancelled_dialog_leaves_store_untouched() {
        let mut store = store();
        let before = store.snapshot().unwrap();
        let matcher = LabelIndex::default();
        let mut dialogs = CancelAll;
        let mut backend = OfflineBackend;
        let mut engine = TransformEngine::new(&mut dialogs, &mut backend, &matcher);
        let outcome = engine.apply(&mut store, 0, TransformType::SplitColumn).unwrap();
        assert!(outcome.is_cancelled());
        assert_eq!(store.version(), before.version());
        assert!(Arc::ptr_eq(before.table(), store.snapshot().unwrap().table()));
    }

    #[test]
    fn illegal_transform_is_rejected_before_dispatch() {
        let mut store = store();
        let matcher = LabelIndex::default();
        let mut dialogs = CancelAll;
        let mut backend = OfflineBackend;
        let mut engine = TransformEngine::new(&mut dialogs, &mut backend, &matcher);
        engine.apply(&mut store, 0, TransformType::IgnoreColumnType).unwrap();
        let err = engine
            .apply(&mut store, 0, TransformType::ToUppercase)
            .unwrap_err();
        assert!(matches!(err, EtlError::NotAllowed { column_type: EtlColumnType::Ignore, .. }));
    }

    #[test]
    fn backend_failure_aborts_without_mutation() {
        let mut store = store();
        let version = store.version();
        let matcher = LabelIndex::default();
        let mut dialogs = ScriptedDialogs::new([DialogResponse::VariantContext {
            gene_symbol: "FBN1".to_string(),
            transcript: "NM_000138.5".to_string(),
        }]);
        let mut backend = OfflineBackend;
        let mut engine = TransformEngine::new(&mut dialogs, &mut backend, &matcher);
        let err = engine
            .apply(&mut store, 0, TransformType::AnnotateVariants)
            .unwrap_err();
        assert!(matches!(err, EtlError::External { .. }));
        assert_eq!(store.version(), version);
    }

    #[test]
    fn multiple_hpo_runs_the_mining_pipeline() {
        let mut store = store();
        let matcher = LabelIndex::from_terms([
            TermRef::new("HP:0000639", "Nystagmus"),
            TermRef::new("HP:0001252", "Hypotonia"),
        ]);
        let mut dialogs = CancelAll;
        let mut backend = OfflineBackend;
        let mut engine = TransformEngine::new(&mut dialogs, &mut backend, &matcher);
        let outcome = engine.apply(&mut store, 2, TransformType::MultipleHpoTerm);
        let snapshot = applied(outcome.unwrap());
        let column = &snapshot.table().columns[2];
        assert_eq!(column.column_type(), EtlColumnType::MultipleHpoTerm);
        assert_eq!(column.header.hpo_terms.len(), 2);
        assert_eq!(
            column.values[0].current(),
            "HP:0000639-observed-na;HP:0001252-observed-na"
        );
        assert_eq!(column.values[2].current(), "");
    }

    #[test]
    fn manual_edit_keeps_original() {
        let mut store = store();
        let snapshot = manual_edit(&mut store, 1, 2, "P1M").unwrap();
        let cell = &snapshot.table().columns[1].values[2];
        assert_eq!(cell.original(), "soon");
        assert_eq!(cell.current(), "P1M");
        assert!(manual_edit(&mut store, 1, 9, "x").is_err());
    }
}

mod common;

use std::sync::Arc;

use common::{TestWorkspace, table};
use phenoetl::{
    backend::OfflineBackend,
    dialog::{CancelAll, DialogResponse, ScriptedDialogs},
    error::EtlError,
    mining::{self, MiningOptions},
    model::{CellStatus, EtlColumnType, Table, TermRef},
    ontology::LabelIndex,
    store::ColumnStore,
    transform::{TransformEngine, TransformOutcome, TransformType},
};

fn cohort() -> Table {
    table(&[
        ("patient", &["P1", "P2", "P3"]),
        ("family", &["FAM1", "FAM1", "FAM2"]),
        ("name", &["ann", "Bob", "cleo"]),
        ("phenotype", &["Seizure; ataxia", "seizure", "n/a"]),
    ])
}

fn matcher() -> LabelIndex {
    LabelIndex::from_terms([
        TermRef::new("HP:0001250", "Seizure"),
        TermRef::new("HP:0001251", "Ataxia"),
    ])
}

fn run(
    store: &mut ColumnStore,
    dialogs: &mut ScriptedDialogs,
    column: usize,
    transform: TransformType,
) -> Result<TransformOutcome, EtlError> {
    let matcher = matcher();
    let mut backend = OfflineBackend;
    let mut engine = TransformEngine::new(dialogs, &mut backend, &matcher);
    engine.apply(store, column, transform)
}

#[test]
fn uppercase_transforms_every_cell_and_bumps_the_version() {
    let mut store = ColumnStore::with_table(cohort()).unwrap();
    let before = store.version();

    let outcome = run(&mut store, &mut ScriptedDialogs::default(), 2, TransformType::ToUppercase)
        .unwrap();
    let TransformOutcome::Applied(snapshot) = outcome else {
        panic!("uppercase does not open dialogs");
    };
    assert_eq!(snapshot.version(), before + 1);

    let column = snapshot.table().column(2).unwrap();
    let current: Vec<&str> = column.values.iter().map(|c| c.current()).collect();
    assert_eq!(current, vec!["ANN", "BOB", "CLEO"]);
    assert_eq!(column.values[1].original(), "Bob");
    assert!(column.is_fully_transformed());
    assert!(store.is_fully_transformed(2).unwrap());
    // untouched columns are shared with the previous version
    assert_eq!(snapshot.table().columns[0].values[0].status(), CellStatus::Raw);
}

#[test]
fn cancelled_dialog_leaves_the_table_as_it_was() {
    let mut store = ColumnStore::with_table(cohort()).unwrap();
    let before = store.snapshot().unwrap();

    for transform in [
        TransformType::SplitColumn,
        TransformType::SplitAgeSex,
        TransformType::DeleteColumn,
        TransformType::ConstantColumn,
        TransformType::MergeIndividualFamily,
        TransformType::ReplaceUniqueValues,
        TransformType::SingleHpoTerm,
    ] {
        let outcome = run(&mut store, &mut ScriptedDialogs::default(), 2, transform).unwrap();
        assert!(outcome.is_cancelled(), "{transform} should be cancelled");
    }

    let after = store.snapshot().unwrap();
    assert_eq!(after.version(), before.version());
    assert!(Arc::ptr_eq(after.table(), before.table()));

    let mut cancel = CancelAll;
    let matcher = matcher();
    let mut backend = OfflineBackend;
    let mut engine = TransformEngine::new(&mut cancel, &mut backend, &matcher);
    let outcome = engine
        .apply(&mut store, 3, TransformType::AnnotateVariants)
        .unwrap();
    assert!(outcome.is_cancelled());
    assert_eq!(store.snapshot().unwrap().table().as_ref(), before.table().as_ref());
}

#[test]
fn declined_confirmations_change_nothing() {
    let mut store = ColumnStore::with_table(cohort()).unwrap();
    let before = store.snapshot().unwrap();

    let mut dialogs = ScriptedDialogs::new([DialogResponse::Confirm { accepted: false }]);
    let outcome = run(&mut store, &mut dialogs, 1, TransformType::DeleteColumn).unwrap();
    assert!(outcome.is_cancelled());
    assert_eq!(dialogs.seen().len(), 1);
    let after = store.snapshot().unwrap();
    assert!(Arc::ptr_eq(after.table(), before.table()));
    assert_eq!(after.table().column_count(), 4);

    let table = before.table();
    let concepts = mining::mine_column(table, 3, &matcher(), &MiningOptions::default()).unwrap();
    let review = mining::ConceptReview::new(concepts);
    let mut decline = ScriptedDialogs::new([DialogResponse::Confirm { accepted: false }]);
    let review = review.cancel(&mut decline).unwrap().expect("declined discard keeps review");
    assert_eq!(review.concepts().len(), 2);

    let confirmed = review.into_confirmed();
    let cells = mining::create_cell_mappings(table.column(3).unwrap(), &confirmed);
    let cell_count = cells.len();
    let cell_review = mining::CellReview::new(cells);
    let mut decline = ScriptedDialogs::new([DialogResponse::Confirm { accepted: false }]);
    let cell_review = cell_review.cancel(&mut decline).unwrap().expect("review kept");
    assert_eq!(cell_review.into_cells().len(), cell_count);
}

#[test]
fn structural_transforms_keep_row_counts_equal() {
    let mut store = ColumnStore::with_table(cohort()).unwrap();
    let mut dialogs = ScriptedDialogs::new([
        DialogResponse::MergeColumns {
            other_column: 1,
            separator: "-".to_string(),
        },
        DialogResponse::SplitColumn {
            separator: ";".to_string(),
        },
        DialogResponse::ConstantColumn {
            header: "cohort".to_string(),
            value: "2024".to_string(),
        },
    ]);

    run(&mut store, &mut dialogs, 0, TransformType::MergeIndividualFamily).unwrap();
    run(&mut store, &mut dialogs, 3, TransformType::SplitColumn).unwrap();
    run(&mut store, &mut dialogs, 2, TransformType::DuplicateColumn).unwrap();
    run(&mut store, &mut dialogs, 0, TransformType::ConstantColumn).unwrap();

    let snapshot = store.snapshot().unwrap();
    let table = snapshot.table();
    table.validate().unwrap();
    assert!(table.columns.iter().all(|c| c.len() == 3));
    assert_eq!(table.column_count(), 8);
    assert_eq!(table.column(1).unwrap().values[0].current(), "2024");

    let merged = table.column(0).unwrap();
    assert_eq!(merged.column_type(), EtlColumnType::PatientId);
    assert_eq!(merged.values[2].current(), "FAM2-P3");
}

#[test]
fn transforms_on_ignored_columns_are_refused() {
    let mut store = ColumnStore::with_table(cohort()).unwrap();
    run(&mut store, &mut ScriptedDialogs::default(), 2, TransformType::IgnoreColumnType).unwrap();
    let version = store.version();

    let err = run(&mut store, &mut ScriptedDialogs::default(), 2, TransformType::ToUppercase)
        .unwrap_err();
    assert!(matches!(err, EtlError::NotAllowed { .. }));
    assert_eq!(store.version(), version);

    run(&mut store, &mut ScriptedDialogs::default(), 2, TransformType::RawColumnType).unwrap();
    run(&mut store, &mut ScriptedDialogs::default(), 2, TransformType::ToUppercase).unwrap();
}

#[test]
fn commit_from_an_outdated_snapshot_is_stale() {
    let mut store = ColumnStore::with_table(cohort()).unwrap();
    let old = store.snapshot().unwrap();

    run(&mut store, &mut ScriptedDialogs::default(), 2, TransformType::ToLowercase).unwrap();

    let err = store
        .commit(old.version(), (**old.table()).clone())
        .unwrap_err();
    assert_eq!(
        err,
        EtlError::StaleSnapshot {
            expected: old.version(),
            found: store.version()
        }
    );
}

#[test]
fn mined_phenotypes_become_a_multiple_term_column() {
    let mut store = ColumnStore::with_table(cohort()).unwrap();
    run(&mut store, &mut ScriptedDialogs::default(), 3, TransformType::MultipleHpoTerm).unwrap();

    let snapshot = store.snapshot().unwrap();
    let column = snapshot.table().column(3).unwrap();
    assert_eq!(column.column_type(), EtlColumnType::MultipleHpoTerm);
    let ids: Vec<&str> = column.header.hpo_terms.iter().map(|t| t.hpo_id.as_str()).collect();
    assert_eq!(ids, vec!["HP:0001250", "HP:0001251"]);
    assert_eq!(
        column.values[0].current(),
        "HP:0001250-observed-na;HP:0001251-observed-na"
    );
    assert_eq!(column.values[2].current(), "");
    assert!(column.is_fully_transformed());
}

#[test]
fn canonical_concepts_merge_case_variants() {
    let column = table(&[(
        "notes",
        &["Seizure; Ataxia", "seizure", "ATAXIA;seizure", "?"],
    )])
    .columns[0]
        .clone();
    let concepts = mining::canonicalize(&column, &MiningOptions::default());
    let summary: Vec<(&str, &[usize])> = concepts
        .iter()
        .map(|c| (c.original_text.as_str(), c.row_index_list.as_slice()))
        .collect();
    assert_eq!(
        summary,
        vec![("Seizure", &[0, 1, 2][..]), ("Ataxia", &[0, 2][..])]
    );
}

#[test]
fn saved_sessions_load_back_unchanged() {
    let workspace = TestWorkspace::new();
    let path = workspace.join("session.json");
    let mut store = ColumnStore::with_table(cohort()).unwrap();
    run(&mut store, &mut ScriptedDialogs::default(), 2, TransformType::ToUppercase).unwrap();
    let snapshot = store.snapshot().unwrap();

    snapshot.table().save(&path).unwrap();
    let loaded = Table::load(&path).unwrap();
    assert_eq!(&loaded, &**snapshot.table());
    assert_eq!(loaded.columns[2].id, snapshot.table().columns[2].id);
}

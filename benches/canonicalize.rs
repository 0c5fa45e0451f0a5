use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use phenoetl::{
    mining::{self, MiningOptions},
    model::{Column, Table, TermRef},
    ontology::LabelIndex,
};

const PHRASES: [&str; 6] = [
    "Seizure",
    "ataxia",
    "Global developmental delay",
    "microcephaly",
    "n/a",
    "hypotonia of the trunk",
];

fn notes_column(rows: usize) -> Column {
    let values = (0..rows).map(|i| {
        let first = PHRASES[i % PHRASES.len()];
        let second = PHRASES[(i * 7 + 3) % PHRASES.len()];
        if i % 2 == 0 {
            format!("{first}; {}", second.to_uppercase())
        } else {
            format!("{first}\n{second}")
        }
    });
    Column::new("notes", values)
}

fn label_index() -> LabelIndex {
    LabelIndex::from_terms([
        TermRef::new("HP:0001250", "Seizure"),
        TermRef::new("HP:0001251", "Ataxia"),
        TermRef::new("HP:0001263", "Global developmental delay"),
        TermRef::new("HP:0000252", "Microcephaly"),
        TermRef::new("HP:0008936", "Axial hypotonia"),
        TermRef::new("HP:0001252", "Hypotonia"),
    ])
}

fn bench_canonicalize(c: &mut Criterion) {
    let options = MiningOptions::default();
    let column = notes_column(5_000);
    c.bench_function("canonicalize_5k_rows", |b| {
        b.iter(|| mining::canonicalize(&column, &options))
    });

    let index = label_index();
    let table = Table::new("notes.csv", vec![notes_column(5_000)]).expect("table");
    c.bench_function("mine_and_project_5k_rows", |b| {
        b.iter_batched(
            || table.clone(),
            |table| mining::run_unattended(&table, 0, &index, &options).expect("projection"),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_canonicalize);
criterion_main!(benches);

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use log::info;
use serde::Deserialize;

use crate::{
    cli::{MineArgs, TermsArgs},
    config::EtlConfig,
    mining::{
        self, CellReview, ConceptReview, MiningConcept, cells::CellAction, review::ConceptAction,
    },
    ontology::TermMatcher,
    session, table,
};

/// Curator decisions replayed in order: first on concepts, then on cells.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReviewScript {
    pub concepts: Vec<ConceptAction>,
    pub cells: Vec<CellAction>,
}

impl ReviewScript {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening review script {path:?}"))?;
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Parsing review script {path:?}"))
    }

    /// Runs both review stages and returns the reviewed concepts' cells.
    pub fn replay(
        &self,
        concepts: Vec<MiningConcept>,
        column: &crate::model::Column,
        matcher: &dyn TermMatcher,
    ) -> Result<Vec<mining::MinedCell>> {
        let mut review = ConceptReview::new(concepts);
        for (step, action) in self.concepts.iter().enumerate() {
            action
                .apply(&mut review, matcher)
                .with_context(|| format!("Concept review step {} ({action:?})", step + 1))?;
        }
        let confirmed = review.into_confirmed();

        let mut cells = CellReview::new(mining::create_cell_mappings(column, &confirmed));
        for (step, action) in self.cells.iter().enumerate() {
            action
                .apply(&mut cells)
                .with_context(|| format!("Cell review step {} ({action:?})", step + 1))?;
        }
        Ok(cells.into_cells())
    }
}

pub fn execute(args: &MineArgs, config: &EtlConfig) -> Result<()> {
    let mut store = session::open_store(&args.session)?;
    let snapshot = store.snapshot()?;
    let table = snapshot.table();
    let index = session::resolve_column(table, &args.column)?;
    let matcher = session::require_matcher(args.terms.as_deref(), config)?;
    let concepts = mining::mine_column(table, index, &matcher, &config.mining)?;

    if args.list {
        print_concepts(&concepts);
        return Ok(());
    }

    let script = match &args.review {
        Some(path) => ReviewScript::load(path)?,
        None => ReviewScript::default(),
    };
    let cells = script.replay(concepts, table.column(index)?, &matcher)?;
    let next = mining::project(table, index, &cells)
        .with_context(|| format!("Writing mined terms into column {index}"))?;
    let committed = store.commit(snapshot.version(), next)?;
    session::save_store(&store, &args.session)?;

    let column = committed.table().column(index)?;
    println!(
        "'{}' now maps {} term(s): {}",
        column.header.label(),
        column.header.hpo_terms.len(),
        column.header.hpo_terms.iter().map(|t| &t.hpo_id).join(", ")
    );
    info!(
        "Mined column {index} into {} cell group(s)",
        cells.len()
    );
    Ok(())
}

/// Autocomplete for review scripts: prefix matches first.
pub fn execute_terms(args: &TermsArgs, config: &EtlConfig) -> Result<()> {
    let index = session::require_matcher(args.terms.as_deref(), config)?;
    let hits = index.search(&args.query, args.limit);
    if hits.is_empty() {
        println!("No term label contains '{}'", args.query.trim());
        return Ok(());
    }
    let headers = ["id", "label"].map(String::from).to_vec();
    let rows: Vec<Vec<String>> = hits
        .iter()
        .map(|term| vec![term.hpo_id.clone(), term.hpo_label.clone()])
        .collect();
    table::print_table(&headers, &rows);
    Ok(())
}

fn print_concepts(concepts: &[MiningConcept]) {
    let headers = ["#", "text", "rows", "status", "terms"]
        .map(String::from)
        .to_vec();
    let rows: Vec<Vec<String>> = concepts
        .iter()
        .enumerate()
        .map(|(idx, concept)| {
            vec![
                idx.to_string(),
                concept.original_text.clone(),
                concept.row_index_list.iter().join(","),
                format!("{:?}", concept.mining_status).to_lowercase(),
                concept
                    .suggested_terms
                    .iter()
                    .map(|t| format!("{} {}", t.id, t.label))
                    .join("; "),
            ]
        })
        .collect();
    table::print_table(&headers, &rows);
}

//! Cell-level review of mined terms.

use std::collections::HashMap;

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    age,
    dialog::DialogProvider,
    error::{EtlError, EtlResult},
    model::{Column, TermRef},
};

use super::{
    ClinicalStatus, MappedTerm, MinedCell, MiningConcept,
    review::{ReviewStep, confirm_discard},
};

/// Groups rows with identical (trimmed) cell text and attaches the terms of
/// every confirmed concept mined from any of those rows. Every row of the
/// column ends up in exactly one cell.
pub fn create_cell_mappings(column: &Column, concepts: &[MiningConcept]) -> Vec<MinedCell> {
    let mut cells: Vec<MinedCell> = Vec::new();
    let mut by_text: HashMap<&str, usize> = HashMap::new();
    for (row, cell) in column.values.iter().enumerate() {
        let text = cell.original().trim();
        match by_text.get(text) {
            Some(idx) => cells[*idx].row_index_list.push(row),
            None => {
                by_text.insert(text, cells.len());
                cells.push(MinedCell {
                    cell_text: text.to_string(),
                    row_index_list: vec![row],
                    mapped_term_list: Vec::new(),
                });
            }
        }
    }

    for cell in &mut cells {
        cell.mapped_term_list = concepts
            .iter()
            .filter(|c| c.is_confirmed())
            .filter(|c| {
                c.row_index_list
                    .iter()
                    .any(|row| cell.row_index_list.contains(row))
            })
            .flat_map(MiningConcept::terms)
            .unique_by(|t| t.hpo_id.clone())
            .map(|t| MappedTerm::new(&t))
            .collect();
    }
    debug!(
        "Grouped {} row(s) into {} mined cell(s)",
        column.len(),
        cells.len()
    );
    cells
}

#[derive(Debug, Clone)]
pub struct CellReview {
    cells: Vec<MinedCell>,
    column_terms: Vec<TermRef>,
    position: usize,
    finished: bool,
}

impl CellReview {
    pub fn new(cells: Vec<MinedCell>) -> Self {
        let column_terms = cells
            .iter()
            .flat_map(|c| c.mapped_term_list.iter().map(MappedTerm::term_ref))
            .unique_by(|t| t.hpo_id.clone())
            .collect();
        let finished = cells.is_empty();
        Self {
            cells,
            column_terms,
            position: 0,
            finished,
        }
    }

    pub fn cells(&self) -> &[MinedCell] {
        &self.cells
    }

    /// Every term mapped anywhere in the column, first-seen order.
    pub fn column_terms(&self) -> &[TermRef] {
        &self.column_terms
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn current(&self) -> Option<&MinedCell> {
        self.cells.get(self.position)
    }

    fn current_mut(&mut self) -> EtlResult<&mut MinedCell> {
        if self.finished {
            return Err(EtlError::Precondition("cell review is finished".to_string()));
        }
        let count = self.cells.len();
        self.cells.get_mut(self.position).ok_or(EtlError::RowIndex {
            index: self.position,
            count,
        })
    }

    pub fn next(&mut self) -> ReviewStep {
        if self.position + 1 >= self.cells.len() {
            self.finished = true;
            return ReviewStep::Finished;
        }
        self.position += 1;
        ReviewStep::At(self.position)
    }

    pub fn prev(&mut self) -> ReviewStep {
        self.finished = self.cells.is_empty();
        self.position = self.position.saturating_sub(1);
        ReviewStep::At(self.position)
    }

    pub fn set_status(&mut self, hpo_id: &str, status: ClinicalStatus) -> EtlResult<()> {
        self.current_mut()?.term_mut(hpo_id)?.status = status;
        Ok(())
    }

    /// The onset must be a valid age string; the term keeps its old onset
    /// otherwise.
    pub fn set_onset(&mut self, hpo_id: &str, onset: &str) -> EtlResult<()> {
        let onset = onset.trim();
        if !age::is_valid_age(onset) {
            return Err(EtlError::InvalidOnset(onset.to_string()));
        }
        self.current_mut()?.term_mut(hpo_id)?.onset = onset.to_string();
        Ok(())
    }

    /// Excludes a term for this cell only.
    pub fn exclude_term(&mut self, hpo_id: &str) -> EtlResult<()> {
        self.set_status(hpo_id, ClinicalStatus::Excluded)
    }

    pub fn restore_term(&mut self, hpo_id: &str) -> EtlResult<()> {
        let term = self.current_mut()?.term_mut(hpo_id)?;
        if term.status == ClinicalStatus::Excluded {
            term.status = ClinicalStatus::Observed;
        }
        Ok(())
    }

    /// Adds every column term that this cell does not map yet, as excluded.
    /// Terms already present keep their status.
    pub fn exclude_all(&mut self) -> EtlResult<usize> {
        let column_terms = self.column_terms.clone();
        let cell = self.current_mut()?;
        let missing: Vec<MappedTerm> = column_terms
            .iter()
            .filter(|t| cell.term(&t.hpo_id).is_none())
            .map(MappedTerm::excluded)
            .collect();
        let added = missing.len();
        cell.mapped_term_list.extend(missing);
        debug!("Excluded {added} additional term(s) for '{}'", cell.cell_text);
        Ok(added)
    }

    /// Asks for confirmation; on yes the review is dropped.
    pub fn cancel(self, dialogs: &mut dyn DialogProvider) -> EtlResult<Option<Self>> {
        if confirm_discard(dialogs)? {
            info!("Cell review discarded");
            Ok(None)
        } else {
            Ok(Some(self))
        }
    }

    pub fn into_cells(self) -> Vec<MinedCell> {
        self.cells
    }
}

/// One step of a scripted cell review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum CellAction {
    Next,
    Prev,
    #[serde(rename_all = "camelCase")]
    SetStatus {
        hpo_id: String,
        status: ClinicalStatus,
    },
    #[serde(rename_all = "camelCase")]
    SetOnset {
        hpo_id: String,
        onset: String,
    },
    #[serde(rename_all = "camelCase")]
    Exclude {
        hpo_id: String,
    },
    ExcludeAll,
    #[serde(rename_all = "camelCase")]
    Restore {
        hpo_id: String,
    },
}

impl CellAction {
    pub fn apply(&self, review: &mut CellReview) -> EtlResult<()> {
        match self {
            CellAction::Next => {
                review.next();
            }
            CellAction::Prev => {
                review.prev();
            }
            CellAction::SetStatus { hpo_id, status } => review.set_status(hpo_id, *status)?,
            CellAction::SetOnset { hpo_id, onset } => review.set_onset(hpo_id, onset)?,
            CellAction::Exclude { hpo_id } => review.exclude_term(hpo_id)?,
            CellAction::ExcludeAll => {
                review.exclude_all()?;
            }
            CellAction::Restore { hpo_id } => review.restore_term(hpo_id)?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mining::MiningStatus, model::TermMatch};

    fn confirmed(text: &str, rows: &[usize], id: &str, label: &str) -> MiningConcept {
        let mut concept = MiningConcept::new(text, rows[0]);
        concept.add_rows(rows);
        concept.add_term(TermMatch {
            id: id.to_string(),
            label: label.to_string(),
            matched_text: text.to_string(),
        });
        concept.mining_status = MiningStatus::Confirmed;
        concept
    }

    fn review() -> CellReview {
        let column = Column::new("phenotype", ["nystagmus; hypotonia", "hypotonia", "hypotonia"]);
        let concepts = vec![
            confirmed("nystagmus", &[0], "HP:0000639", "Nystagmus"),
            confirmed("hypotonia", &[0, 1, 2], "HP:0001252", "Hypotonia"),
        ];
        CellReview::new(create_cell_mappings(&column, &concepts))
    }

    #[test]
    fn identical_cells_share_one_record() {
        let review = review();
        let cells = review.cells();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].mapped_term_list.len(), 2);
        assert_eq!(cells[1].row_index_list, vec![1, 2]);
        assert_eq!(cells[1].mapped_term_list[0].hpo_id, "HP:0001252");
        assert_eq!(review.column_terms().len(), 2);
    }

    #[test]
    fn pending_concepts_are_not_mapped() {
        let column = Column::new("phenotype", ["odd gait"]);
        let concepts = vec![MiningConcept::new("odd gait", 0)];
        let cells = create_cell_mappings(&column, &concepts);
        assert!(cells[0].mapped_term_list.is_empty());
    }

    #[test]
    fn invalid_onset_is_rejected() {
        let mut review = review();
        assert_eq!(
            review.set_onset("HP:0000639", "two years"),
            Err(EtlError::InvalidOnset("two years".to_string()))
        );
        review.set_onset("HP:0000639", "P2Y").unwrap();
        assert_eq!(review.current().unwrap().mapped_term_list[0].onset, "P2Y");
    }

    #[test]
    fn exclude_all_adds_missing_column_terms() {
        let mut review = review();
        review.next();
        assert_eq!(review.exclude_all().unwrap(), 1);
        let cell = review.current().unwrap();
        let nystagmus = cell.term("HP:0000639").unwrap();
        assert_eq!(nystagmus.status, ClinicalStatus::Excluded);
        assert_eq!(cell.term("HP:0001252").unwrap().status, ClinicalStatus::Observed);

        review.restore_term("HP:0000639").unwrap();
        assert_eq!(
            review.current().unwrap().term("HP:0000639").unwrap().status,
            ClinicalStatus::Observed
        );
    }

    #[test]
    fn edits_after_finish_are_rejected() {
        let mut review = review();
        review.next();
        assert_eq!(review.next(), ReviewStep::Finished);
        assert!(review.exclude_term("HP:0001252").is_err());
    }
}

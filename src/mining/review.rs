//! Concept-level review.
//!
//! The review walks the concept list with a cursor. Every edit applies to the
//! concept under the cursor; stepping past the last concept finishes it.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    dialog::{DialogProvider, DialogRequest, DialogResponse},
    error::{EtlError, EtlResult},
    model::{TermMatch, TermRef},
    ontology::TermMatcher,
};

use super::{MiningConcept, MiningStatus};

pub const DISCARD_PROMPT: &str = "Discard changes?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStep {
    At(usize),
    Finished,
}

/// Asks before throwing review progress away. True means discard.
pub fn confirm_discard(dialogs: &mut dyn DialogProvider) -> EtlResult<bool> {
    let request = DialogRequest::ConfirmDiscard {
        message: DISCARD_PROMPT.to_string(),
    };
    match dialogs.open(&request) {
        None => Ok(false),
        Some(DialogResponse::Confirm { accepted }) => Ok(accepted),
        Some(_) => Err(EtlError::UnexpectedDialogResponse { expected: "confirm" }),
    }
}

#[derive(Debug, Clone)]
pub struct ConceptReview {
    concepts: Vec<MiningConcept>,
    position: usize,
    finished: bool,
}

impl ConceptReview {
    pub fn new(concepts: Vec<MiningConcept>) -> Self {
        let finished = concepts.is_empty();
        Self {
            concepts,
            position: 0,
            finished,
        }
    }

    pub fn concepts(&self) -> &[MiningConcept] {
        &self.concepts
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn current(&self) -> Option<&MiningConcept> {
        self.concepts.get(self.position)
    }

    fn current_mut(&mut self) -> EtlResult<&mut MiningConcept> {
        if self.finished {
            return Err(EtlError::Precondition("concept review is finished".to_string()));
        }
        let count = self.concepts.len();
        self.concepts
            .get_mut(self.position)
            .ok_or(EtlError::RowIndex {
                index: self.position,
                count,
            })
    }

    pub fn next(&mut self) -> ReviewStep {
        if self.position + 1 >= self.concepts.len() {
            self.finished = true;
            return ReviewStep::Finished;
        }
        self.position += 1;
        ReviewStep::At(self.position)
    }

    pub fn prev(&mut self) -> ReviewStep {
        self.finished = self.concepts.is_empty();
        self.position = self.position.saturating_sub(1);
        ReviewStep::At(self.position)
    }

    pub fn confirm(&mut self) -> EtlResult<ReviewStep> {
        let concept = self.current_mut()?;
        if concept.suggested_terms.is_empty() {
            return Err(EtlError::Precondition(format!(
                "'{}' has no term to confirm",
                concept.original_text
            )));
        }
        concept.mining_status = MiningStatus::Confirmed;
        Ok(self.next())
    }

    /// Flips between confirmed and pending without moving the cursor.
    pub fn toggle_confirm(&mut self) -> EtlResult<MiningStatus> {
        let concept = self.current_mut()?;
        concept.mining_status = match concept.mining_status {
            MiningStatus::Confirmed => MiningStatus::Pending,
            _ => MiningStatus::Confirmed,
        };
        Ok(concept.mining_status)
    }

    pub fn skip(&mut self) -> EtlResult<ReviewStep> {
        self.current_mut()?.mining_status = MiningStatus::Skipped;
        Ok(self.next())
    }

    /// Adds a term picked by autocomplete. Duplicates by id are ignored.
    pub fn add_term(&mut self, term: &TermRef) -> EtlResult<()> {
        let concept = self.current_mut()?;
        let added = concept.add_term(TermMatch {
            id: term.hpo_id.clone(),
            label: term.hpo_label.clone(),
            matched_text: concept.original_text.clone(),
        });
        concept.mining_status = MiningStatus::Confirmed;
        debug!(
            "Term {} {} for '{}'",
            term.hpo_id,
            if added { "added" } else { "already present" },
            concept.original_text
        );
        Ok(())
    }

    pub fn replace_term(&mut self, old_id: &str, term: &TermRef) -> EtlResult<()> {
        self.remove_term(old_id)?;
        self.add_term(term)
    }

    /// A concept left without terms goes back to pending.
    pub fn remove_term(&mut self, hpo_id: &str) -> EtlResult<()> {
        let concept = self.current_mut()?;
        let before = concept.suggested_terms.len();
        concept.suggested_terms.retain(|t| t.id != hpo_id);
        if concept.suggested_terms.len() == before {
            return Err(EtlError::Precondition(format!(
                "'{}' has no term {hpo_id}",
                concept.original_text
            )));
        }
        if concept.suggested_terms.is_empty() {
            concept.mining_status = MiningStatus::Pending;
        }
        Ok(())
    }

    /// Drops every term and returns the concept to pending.
    pub fn reset_mapping(&mut self) -> EtlResult<()> {
        let concept = self.current_mut()?;
        concept.suggested_terms.clear();
        concept.mining_status = MiningStatus::Pending;
        Ok(())
    }

    /// Splits the current concept on `delimiter`. Each part keeps the rows of
    /// the concept; a part whose text already exists as another concept is
    /// merged into that concept and inherits its mapping.
    pub fn split(&mut self, delimiter: &str, matcher: &dyn TermMatcher) -> EtlResult<usize> {
        let concept = self.current_mut()?.clone();
        let parts: Vec<String> = if delimiter.is_empty() {
            Vec::new()
        } else {
            concept
                .original_text
                .split(delimiter)
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        };
        if parts.len() < 2 {
            return Err(EtlError::Precondition(format!(
                "splitting '{}' on {delimiter:?} does not give two parts",
                concept.original_text
            )));
        }

        self.concepts.remove(self.position);
        let mut inserted = 0;
        for part in &parts {
            let key = part.to_lowercase();
            if let Some(existing) = self
                .concepts
                .iter_mut()
                .find(|c| c.original_text.to_lowercase() == key)
            {
                existing.add_rows(&concept.row_index_list);
                continue;
            }
            let mut fresh = MiningConcept {
                original_text: part.clone(),
                row_index_list: concept.row_index_list.clone(),
                suggested_terms: Vec::new(),
                mining_status: MiningStatus::Pending,
            };
            if let Some(hit) = matcher.best_match(part) {
                fresh.add_term(hit);
                fresh.mining_status = MiningStatus::Confirmed;
            }
            self.concepts.insert(self.position + inserted, fresh);
            inserted += 1;
        }
        if self.position >= self.concepts.len() {
            self.position = self.concepts.len().saturating_sub(1);
        }
        self.finished = self.concepts.is_empty();
        info!(
            "Split '{}' into {} part(s), {inserted} new",
            concept.original_text,
            parts.len()
        );
        Ok(parts.len())
    }

    /// Asks for confirmation; on yes the review is dropped and `None` is
    /// returned, otherwise the review is handed back unchanged.
    pub fn cancel(self, dialogs: &mut dyn DialogProvider) -> EtlResult<Option<Self>> {
        if confirm_discard(dialogs)? {
            info!("Concept review discarded");
            Ok(None)
        } else {
            Ok(Some(self))
        }
    }

    pub fn into_concepts(self) -> Vec<MiningConcept> {
        self.concepts
    }

    /// Confirmed concepts that carry at least one term.
    pub fn into_confirmed(self) -> Vec<MiningConcept> {
        self.concepts
            .into_iter()
            .filter(|c| c.is_confirmed() && !c.suggested_terms.is_empty())
            .collect()
    }
}

/// One step of a scripted concept review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ConceptAction {
    Next,
    Prev,
    Confirm,
    ToggleConfirm,
    Skip,
    AddTerm {
        term: TermRef,
    },
    #[serde(rename_all = "camelCase")]
    ReplaceTerm {
        old_id: String,
        term: TermRef,
    },
    #[serde(rename_all = "camelCase")]
    RemoveTerm {
        hpo_id: String,
    },
    ResetMapping,
    Split {
        delimiter: String,
    },
}

impl ConceptAction {
    pub fn apply(&self, review: &mut ConceptReview, matcher: &dyn TermMatcher) -> EtlResult<()> {
        match self {
            ConceptAction::Next => {
                review.next();
            }
            ConceptAction::Prev => {
                review.prev();
            }
            ConceptAction::Confirm => {
                review.confirm()?;
            }
            ConceptAction::ToggleConfirm => {
                review.toggle_confirm()?;
            }
            ConceptAction::Skip => {
                review.skip()?;
            }
            ConceptAction::AddTerm { term } => review.add_term(term)?,
            ConceptAction::ReplaceTerm { old_id, term } => review.replace_term(old_id, term)?,
            ConceptAction::RemoveTerm { hpo_id } => review.remove_term(hpo_id)?,
            ConceptAction::ResetMapping => review.reset_mapping()?,
            ConceptAction::Split { delimiter } => {
                review.split(delimiter, matcher)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dialog::{CancelAll, ScriptedDialogs},
        ontology::LabelIndex,
    };

    fn matcher() -> LabelIndex {
        LabelIndex::from_terms([
            TermRef::new("HP:0000639", "Nystagmus"),
            TermRef::new("HP:0001252", "Hypotonia"),
        ])
    }

    fn concept(text: &str, rows: &[usize], term: Option<(&str, &str)>) -> MiningConcept {
        let mut concept = MiningConcept::new(text, rows[0]);
        concept.add_rows(rows);
        if let Some((id, label)) = term {
            concept.add_term(TermMatch {
                id: id.to_string(),
                label: label.to_string(),
                matched_text: text.to_string(),
            });
            concept.mining_status = MiningStatus::Confirmed;
        }
        concept
    }

    #[test]
    fn navigation_finishes_past_the_end() {
        let mut review = ConceptReview::new(vec![
            concept("a", &[0], None),
            concept("b", &[1], None),
        ]);
        assert_eq!(review.next(), ReviewStep::At(1));
        assert_eq!(review.next(), ReviewStep::Finished);
        assert!(review.is_finished());
        assert_eq!(review.prev(), ReviewStep::At(0));
        assert!(!review.is_finished());
    }

    #[test]
    fn terms_are_deduplicated_by_id() {
        let mut review = ConceptReview::new(vec![concept("eye wobble", &[0], None)]);
        let term = TermRef::new("HP:0000639", "Nystagmus");
        review.add_term(&term).unwrap();
        review.add_term(&term).unwrap();
        assert_eq!(review.current().unwrap().suggested_terms.len(), 1);
        assert!(review.current().unwrap().is_confirmed());

        review.remove_term("HP:0000639").unwrap();
        assert_eq!(review.current().unwrap().mining_status, MiningStatus::Pending);
    }

    #[test]
    fn split_parts_inherit_existing_mappings() {
        let mut review = ConceptReview::new(vec![
            concept("nystagmus and hypotonia", &[0, 2], None),
            concept("hypotonia", &[1], Some(("HP:0001252", "Hypotonia"))),
        ]);
        assert_eq!(review.split(" and ", &matcher()).unwrap(), 2);

        let concepts = review.concepts();
        assert_eq!(concepts.len(), 2);
        assert_eq!(concepts[0].original_text, "nystagmus");
        assert_eq!(concepts[0].row_index_list, vec![0, 2]);
        assert!(concepts[0].is_confirmed());
        assert_eq!(concepts[1].row_index_list, vec![0, 1, 2]);
        assert_eq!(concepts[1].suggested_terms[0].id, "HP:0001252");
    }

    #[test]
    fn split_needs_two_parts() {
        let mut review = ConceptReview::new(vec![concept("nystagmus", &[0], None)]);
        assert!(review.split(",", &matcher()).is_err());
        assert_eq!(review.concepts().len(), 1);
    }

    #[test]
    fn cancel_asks_before_discarding() {
        let review = ConceptReview::new(vec![concept("a", &[0], None)]);
        let review = review.cancel(&mut CancelAll).unwrap().unwrap();

        let mut dialogs = ScriptedDialogs::new([DialogResponse::Confirm { accepted: true }]);
        assert!(review.cancel(&mut dialogs).unwrap().is_none());
        assert_eq!(
            dialogs.seen()[0],
            DialogRequest::ConfirmDiscard {
                message: DISCARD_PROMPT.to_string()
            }
        );
    }

    #[test]
    fn scripted_actions_parse() {
        let actions: Vec<ConceptAction> = serde_json::from_str(
            r#"[{"action": "skip"}, {"action": "removeTerm", "hpoId": "HP:1"}]"#,
        )
        .unwrap();
        assert_eq!(
            actions[1],
            ConceptAction::RemoveTerm {
                hpo_id: "HP:1".to_string()
            }
        );
    }
}

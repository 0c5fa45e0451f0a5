//! Multi-term text mining.
//!
//! A free-text phenotype column goes through four stages:
//!
//! 1. [`concepts`]: cells are split into phrases and deduplicated into
//!    [`MiningConcept`]s, each with a best-guess term from a
//!    [`TermMatcher`](crate::ontology::TermMatcher).
//! 2. [`review::ConceptReview`]: the curator confirms, edits, splits or
//!    skips concepts.
//! 3. [`cells`]: confirmed concepts are turned into one [`MinedCell`] per
//!    distinct cell text and reviewed per cell (status, onset, exclusions).
//! 4. [`projection`]: the reviewed cells are written back into the column,
//!    which becomes a `MultipleHpoTerm` column.

pub mod cells;
pub mod concepts;
pub mod projection;
pub mod review;

use std::{fmt, str::FromStr};

use log::info;
use serde::{Deserialize, Serialize};

use crate::{
    age,
    error::{EtlError, EtlResult},
    model::{Table, TermMatch, TermRef},
    ontology::TermMatcher,
};

pub use cells::{CellReview, create_cell_mappings};
pub use concepts::{canonicalize, extract_phrases, mine_column};
pub use projection::project;
pub use review::ConceptReview;

/// Tokens that mean "nothing to mine here".
pub const NOT_APPLICABLE: [&str; 9] = [
    "na", "n.a.", "n/a", "nd", "n/d", "n.d.", "?", "/", "unknown",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MiningStatus {
    #[default]
    Pending,
    Confirmed,
    Skipped,
}

/// One distinct phrase found in a column, with the rows it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MiningConcept {
    pub original_text: String,
    pub row_index_list: Vec<usize>,
    pub suggested_terms: Vec<TermMatch>,
    pub mining_status: MiningStatus,
}

impl MiningConcept {
    pub fn new(original_text: impl Into<String>, row: usize) -> Self {
        Self {
            original_text: original_text.into(),
            row_index_list: vec![row],
            suggested_terms: Vec::new(),
            mining_status: MiningStatus::Pending,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.mining_status == MiningStatus::Confirmed
    }

    /// Adds `row` keeping the list sorted and free of duplicates.
    pub fn add_row(&mut self, row: usize) {
        if let Err(position) = self.row_index_list.binary_search(&row) {
            self.row_index_list.insert(position, row);
        }
    }

    pub fn add_rows(&mut self, rows: &[usize]) {
        for row in rows {
            self.add_row(*row);
        }
    }

    /// Returns false when a term with the same id is already present.
    pub fn add_term(&mut self, term: TermMatch) -> bool {
        if self.suggested_terms.iter().any(|t| t.id == term.id) {
            return false;
        }
        self.suggested_terms.push(term);
        true
    }

    pub fn terms(&self) -> impl Iterator<Item = TermRef> + '_ {
        self.suggested_terms.iter().map(TermMatch::to_term_ref)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClinicalStatus {
    Observed,
    Excluded,
    #[serde(rename = "na")]
    NotAssessed,
}

impl ClinicalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClinicalStatus::Observed => "observed",
            ClinicalStatus::Excluded => "excluded",
            ClinicalStatus::NotAssessed => "na",
        }
    }
}

impl fmt::Display for ClinicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClinicalStatus {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "observed" => Ok(ClinicalStatus::Observed),
            "excluded" => Ok(ClinicalStatus::Excluded),
            "na" | "not assessed" => Ok(ClinicalStatus::NotAssessed),
            other => Err(EtlError::Precondition(format!(
                "unknown clinical status '{other}'"
            ))),
        }
    }
}

/// A term as it applies to one cell.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MappedTerm {
    pub hpo_id: String,
    pub hpo_label: String,
    pub status: ClinicalStatus,
    pub onset: String,
}

impl MappedTerm {
    pub fn new(term: &TermRef) -> Self {
        Self {
            hpo_id: term.hpo_id.clone(),
            hpo_label: term.hpo_label.clone(),
            status: ClinicalStatus::Observed,
            onset: age::NOT_AVAILABLE.to_string(),
        }
    }

    pub fn excluded(term: &TermRef) -> Self {
        Self {
            status: ClinicalStatus::Excluded,
            ..Self::new(term)
        }
    }

    pub fn term_ref(&self) -> TermRef {
        TermRef::new(self.hpo_id.clone(), self.hpo_label.clone())
    }

    /// `HP:0000639-observed-na`
    pub fn to_token(&self) -> String {
        format!("{}-{}-{}", self.hpo_id, self.status, self.onset)
    }
}

/// Reconciliation record for every row sharing one cell text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MinedCell {
    pub cell_text: String,
    pub row_index_list: Vec<usize>,
    pub mapped_term_list: Vec<MappedTerm>,
}

impl MinedCell {
    pub fn term(&self, hpo_id: &str) -> Option<&MappedTerm> {
        self.mapped_term_list.iter().find(|t| t.hpo_id == hpo_id)
    }

    fn term_mut(&mut self, hpo_id: &str) -> EtlResult<&mut MappedTerm> {
        let text = self.cell_text.clone();
        self.mapped_term_list
            .iter_mut()
            .find(|t| t.hpo_id == hpo_id)
            .ok_or_else(|| {
                EtlError::Precondition(format!("term {hpo_id} is not mapped for cell '{text}'"))
            })
    }

    pub fn serialize_terms(&self) -> String {
        self.mapped_term_list
            .iter()
            .map(MappedTerm::to_token)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Phrase delimiters and ignorable tokens used during extraction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct MiningOptions {
    pub delimiters: Vec<String>,
    pub not_applicable: Vec<String>,
}

impl MiningOptions {
    /// Trims and lowercases the ignorable tokens so lookups can compare
    /// against lowercased phrases.
    pub fn normalize(&mut self) {
        for token in self.not_applicable.iter_mut() {
            *token = token.trim().to_lowercase();
        }
        self.not_applicable.retain(|token| !token.is_empty());
    }
}

impl Default for MiningOptions {
    fn default() -> Self {
        Self {
            delimiters: vec![";".to_string(), "\n".to_string()],
            not_applicable: NOT_APPLICABLE.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// The whole pipeline without a curator: suggested terms are accepted,
/// everything else is dropped, and every term is recorded as observed.
pub fn run_unattended(
    table: &Table,
    index: usize,
    matcher: &dyn TermMatcher,
    options: &MiningOptions,
) -> EtlResult<Table> {
    let concepts = mine_column(table, index, matcher, options)?;
    let review = ConceptReview::new(concepts);
    let confirmed = review.into_confirmed();
    info!(
        "Unattended mining of column {index}: {} confirmed concept(s)",
        confirmed.len()
    );
    let cells = create_cell_mappings(table.column(index)?, &confirmed);
    project(table, index, &cells)
}

//! Ontology term lookup.
//!
//! The real matcher lives in the backend; [`LabelIndex`] is a local stand-in
//! built from a two-column TSV (`HP:0000639<TAB>Nystagmus`).

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result, bail};
use log::{info, warn};

use crate::model::{TermMatch, TermRef};

pub trait TermMatcher {
    /// Best single guess for `text`, if any.
    fn best_match(&self, text: &str) -> Option<TermMatch>;
}

#[derive(Debug, Clone, Default)]
pub struct LabelIndex {
    terms: Vec<TermRef>,
    by_label: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl LabelIndex {
    /// Later duplicates of an id are dropped. Blank labels are skipped since
    /// every phrase would contain them.
    pub fn from_terms(terms: impl IntoIterator<Item = TermRef>) -> Self {
        let mut index = Self::default();
        for term in terms {
            if term.hpo_label.trim().is_empty() {
                warn!("Skipping term {} without a label", term.hpo_id);
                continue;
            }
            if index.by_id.contains_key(&term.hpo_id) {
                continue;
            }
            let position = index.terms.len();
            index
                .by_label
                .entry(term.hpo_label.to_lowercase())
                .or_insert(position);
            index.by_id.insert(term.hpo_id.clone(), position);
            index.terms.push(term);
        }
        index
    }

    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .flexible(true)
            .comment(Some(b'#'))
            .from_path(path)
            .with_context(|| format!("Opening term list {path:?}"))?;
        let mut terms = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let record = record.with_context(|| format!("Reading term list line {}", idx + 1))?;
            let (Some(id), Some(label)) = (record.get(0), record.get(1)) else {
                bail!("Term list line {} needs an id and a label", idx + 1);
            };
            terms.push(TermRef::new(id.trim(), label.trim()));
        }
        let index = Self::from_terms(terms);
        info!("Loaded {} term(s) from {:?}", index.len(), path);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[TermRef] {
        &self.terms
    }

    pub fn get(&self, hpo_id: &str) -> Option<&TermRef> {
        self.by_id.get(hpo_id).map(|idx| &self.terms[*idx])
    }

    /// Autocomplete: labels starting with `prefix` first, then labels
    /// containing it.
    pub fn search(&self, prefix: &str, limit: usize) -> Vec<&TermRef> {
        let needle = prefix.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        let (mut starts, contains): (Vec<&TermRef>, Vec<&TermRef>) = self
            .terms
            .iter()
            .filter(|t| t.hpo_label.to_lowercase().contains(&needle))
            .partition(|t| t.hpo_label.to_lowercase().starts_with(&needle));
        starts.extend(contains);
        starts.truncate(limit);
        starts
    }
}

impl TermMatcher for LabelIndex {
    fn best_match(&self, text: &str) -> Option<TermMatch> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let position = self
            .by_id
            .get(text.trim())
            .or_else(|| self.by_label.get(&needle))
            .copied()
            .or_else(|| {
                self.terms
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| needle.contains(&t.hpo_label.to_lowercase()))
                    .max_by_key(|(_, t)| t.hpo_label.len())
                    .map(|(idx, _)| idx)
            })?;
        let term = &self.terms[position];
        Some(TermMatch {
            id: term.hpo_id.clone(),
            label: term.hpo_label.clone(),
            matched_text: text.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> LabelIndex {
        LabelIndex::from_terms([
            TermRef::new("HP:0000639", "Nystagmus"),
            TermRef::new("HP:0001252", "Hypotonia"),
            TermRef::new("HP:0008936", "Axial hypotonia"),
        ])
    }

    #[test]
    fn exact_label_beats_containment() {
        let hit = index().best_match("hypotonia").unwrap();
        assert_eq!(hit.id, "HP:0001252");
    }

    #[test]
    fn longest_contained_label_wins() {
        let hit = index().best_match("marked axial hypotonia").unwrap();
        assert_eq!(hit.id, "HP:0008936");
        assert_eq!(hit.matched_text, "marked axial hypotonia");
    }

    #[test]
    fn ids_match_directly() {
        assert_eq!(index().best_match("HP:0000639").unwrap().label, "Nystagmus");
        assert!(index().best_match("seizures").is_none());
    }

    #[test]
    fn blank_labels_never_match() {
        let index = LabelIndex::from_terms([
            TermRef::new("HP:0000001", "  "),
            TermRef::new("HP:0000639", "Nystagmus"),
        ]);
        assert_eq!(index.len(), 1);
        assert!(index.get("HP:0000001").is_none());
        assert!(index.best_match("odd gait").is_none());
    }

    #[test]
    fn blank_labels_in_a_term_list_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("terms.tsv");
        std::fs::write(&path, "HP:0000001\t\nHP:0000639\tNystagmus\n").unwrap();
        let index = LabelIndex::load(&path).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.terms()[0].hpo_id, "HP:0000639");
    }

    #[test]
    fn search_prefers_prefix_matches() {
        let index = index();
        let hits = index.search("hypo", 5);
        assert_eq!(hits[0].hpo_id, "HP:0001252");
        assert_eq!(hits.len(), 2);
    }
}

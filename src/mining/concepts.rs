use std::collections::HashMap;

use log::debug;

use crate::{
    error::{EtlError, EtlResult},
    model::{Column, Table},
    ontology::TermMatcher,
    transform::{self, TransformType},
};

use super::{MiningConcept, MiningOptions, MiningStatus};

/// Splits `text` on every configured delimiter; trimmed, empty parts dropped.
pub fn extract_phrases(text: &str, delimiters: &[String]) -> Vec<String> {
    let mut parts = vec![text.to_string()];
    for delimiter in delimiters.iter().filter(|d| !d.is_empty()) {
        parts = parts
            .iter()
            .flat_map(|part| part.split(delimiter.as_str()))
            .map(str::to_string)
            .collect();
    }
    parts
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

/// True for placeholders like "n/a" and for phrases without any letter.
pub fn is_not_applicable(phrase: &str, options: &MiningOptions) -> bool {
    let lower = phrase.trim().to_lowercase();
    options
        .not_applicable
        .iter()
        .any(|token| token.trim().to_lowercase() == lower)
        || !lower.chars().any(char::is_alphabetic)
}

/// Case-insensitive deduplication in first-seen order. The first spelling
/// wins and row indices are merged.
pub fn canonicalize(column: &Column, options: &MiningOptions) -> Vec<MiningConcept> {
    let mut concepts: Vec<MiningConcept> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();
    for (row, cell) in column.values.iter().enumerate() {
        for phrase in extract_phrases(cell.original(), &options.delimiters) {
            if is_not_applicable(&phrase, options) {
                continue;
            }
            let key = phrase.to_lowercase();
            match by_key.get(&key) {
                Some(idx) => concepts[*idx].add_row(row),
                None => {
                    by_key.insert(key, concepts.len());
                    concepts.push(MiningConcept::new(phrase, row));
                }
            }
        }
    }
    concepts
}

/// Attaches the matcher's best guess; concepts with a guess start confirmed.
pub fn suggest_terms(concepts: &mut [MiningConcept], matcher: &dyn TermMatcher) {
    for concept in concepts.iter_mut() {
        if let Some(hit) = matcher.best_match(&concept.original_text) {
            concept.add_term(hit);
        }
        if !concept.suggested_terms.is_empty() {
            concept.mining_status = MiningStatus::Confirmed;
        }
    }
}

/// Mining ends in a multiple-term projection, so it obeys the same
/// column-type restrictions as that transform.
pub fn mine_column(
    table: &Table,
    index: usize,
    matcher: &dyn TermMatcher,
    options: &MiningOptions,
) -> EtlResult<Vec<MiningConcept>> {
    let column = table.column(index)?;
    let column_type = column.column_type();
    if !transform::is_allowed(column_type, TransformType::MultipleHpoTerm) {
        return Err(EtlError::NotAllowed {
            transform: TransformType::MultipleHpoTerm.identifier().to_string(),
            column_type,
        });
    }
    let mut concepts = canonicalize(column, options);
    suggest_terms(&mut concepts, matcher);
    debug!(
        "Mined {} concept(s) from '{}', {} with a suggestion",
        concepts.len(),
        column.header.label(),
        concepts.iter().filter(|c| c.is_confirmed()).count()
    );
    Ok(concepts)
}

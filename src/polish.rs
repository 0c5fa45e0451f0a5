//! Polishing of text-mining hits.
//!
//! A free-text note is cut into alternating hit and non-hit segments. The
//! curator can flip observed/excluded, change onsets or swap terms; `finish`
//! collapses the hits to one entry per term and refuses contradictions.

use std::{collections::HashMap, fmt};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    age,
    error::{EtlError, EtlResult},
    model::TermRef,
    ontology::LabelIndex,
};

/// One segment of annotated text: either a hit for a term or the plain text
/// between hits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TextAnnotation {
    pub is_fenominal_hit: bool,
    pub term_id: String,
    pub label: String,
    pub start: usize,
    pub end: usize,
    pub is_observed: bool,
    pub original_text: String,
    pub onset_string: String,
}

impl TextAnnotation {
    fn plain(text: &str, start: usize, end: usize) -> Self {
        Self {
            is_fenominal_hit: false,
            term_id: String::new(),
            label: String::new(),
            start,
            end,
            is_observed: false,
            original_text: text[start..end].to_string(),
            onset_string: String::new(),
        }
    }

    /// A hit added by hand, not anchored in the text.
    pub fn from_term(term: &TermRef) -> Self {
        Self {
            is_fenominal_hit: true,
            term_id: term.hpo_id.clone(),
            label: term.hpo_label.clone(),
            start: 0,
            end: 0,
            is_observed: true,
            original_text: String::new(),
            onset_string: age::NOT_AVAILABLE.to_string(),
        }
    }
}

/// A term found at `start..end` (byte offsets) of some text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermSpan {
    pub start: usize,
    pub end: usize,
    pub term: TermRef,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum CellValue {
    Observed,
    Excluded,
    Na,
    OnsetAge(String),
}

impl CellValue {
    /// Inverse of the single-HPO cell states: observed, excluded, na, or an
    /// onset.
    pub fn from_cell(value: &str) -> Self {
        match value {
            "observed" => CellValue::Observed,
            "excluded" => CellValue::Excluded,
            "na" => CellValue::Na,
            other => CellValue::OnsetAge(other.to_string()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Observed => f.write_str("observed"),
            CellValue::Excluded => f.write_str("excluded"),
            CellValue::Na => f.write_str("not available"),
            CellValue::OnsetAge(onset) => write!(f, "onset at {onset}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct HpoTermData {
    pub term_duplet: TermRef,
    pub entry: CellValue,
}

impl HpoTermData {
    pub fn from_hit(hit: &TextAnnotation) -> Self {
        let onset = hit.onset_string.trim();
        let entry = if !hit.is_observed {
            CellValue::Excluded
        } else if onset.is_empty() || onset == age::NOT_AVAILABLE {
            CellValue::Observed
        } else {
            CellValue::OnsetAge(onset.to_string())
        };
        Self {
            term_duplet: TermRef::new(hit.term_id.clone(), hit.label.clone()),
            entry,
        }
    }
}

/// Splits `text` into hit and non-hit segments. Spans must lie on character
/// boundaries inside the text and must not overlap.
pub fn annotate_text(text: &str, spans: &[TermSpan]) -> EtlResult<Vec<TextAnnotation>> {
    let mut sorted: Vec<&TermSpan> = spans.iter().collect();
    sorted.sort_by_key(|s| (s.start, s.end));

    let mut segments = Vec::with_capacity(sorted.len() * 2 + 1);
    let mut cursor = 0;
    for span in sorted {
        let invalid = span.start >= span.end
            || span.end > text.len()
            || span.start < cursor
            || !text.is_char_boundary(span.start)
            || !text.is_char_boundary(span.end);
        if invalid {
            return Err(EtlError::InvalidSpan {
                start: span.start,
                end: span.end,
                length: text.len(),
            });
        }
        if span.start > cursor {
            segments.push(TextAnnotation::plain(text, cursor, span.start));
        }
        segments.push(TextAnnotation {
            is_fenominal_hit: true,
            term_id: span.term.hpo_id.clone(),
            label: span.term.hpo_label.clone(),
            start: span.start,
            end: span.end,
            is_observed: true,
            original_text: text[span.start..span.end].to_string(),
            onset_string: age::NOT_AVAILABLE.to_string(),
        });
        cursor = span.end;
    }
    if cursor < text.len() {
        segments.push(TextAnnotation::plain(text, cursor, text.len()));
    }
    Ok(segments)
}

/// Finds every label of `index` in `text`, ignoring ASCII case. Longer labels
/// win over the labels they contain.
pub fn find_spans(text: &str, index: &LabelIndex) -> Vec<TermSpan> {
    let haystack = text.to_ascii_lowercase();
    let mut labels: Vec<&TermRef> = index.terms().iter().collect();
    labels.sort_by_key(|t| std::cmp::Reverse(t.hpo_label.len()));

    let mut spans: Vec<TermSpan> = Vec::new();
    for term in labels {
        let needle = term.hpo_label.to_ascii_lowercase();
        if needle.is_empty() {
            continue;
        }
        for (start, _) in haystack.match_indices(&needle) {
            let end = start + needle.len();
            let bounded = !haystack[..start].ends_with(char::is_alphanumeric)
                && !haystack[end..].starts_with(char::is_alphanumeric);
            let overlaps = spans.iter().any(|s| start < s.end && s.start < end);
            if bounded && !overlaps {
                spans.push(TermSpan {
                    start,
                    end,
                    term: term.clone(),
                });
            }
        }
    }
    spans.sort_by_key(|s| s.start);
    spans
}

/// Editable list of hits for one note.
#[derive(Debug, Clone, Default)]
pub struct PolishSession {
    segments: Vec<TextAnnotation>,
}

impl PolishSession {
    pub fn new(segments: Vec<TextAnnotation>) -> Self {
        Self { segments }
    }

    pub fn from_text(text: &str, index: &LabelIndex) -> EtlResult<Self> {
        let spans = find_spans(text, index);
        debug!("Found {} hit(s) in {} byte(s) of text", spans.len(), text.len());
        Ok(Self::new(annotate_text(text, &spans)?))
    }

    pub fn segments(&self) -> &[TextAnnotation] {
        &self.segments
    }

    /// Indices of the hit segments.
    pub fn hit_indices(&self) -> Vec<usize> {
        self.segments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_fenominal_hit)
            .map(|(idx, _)| idx)
            .collect()
    }

    fn hit_mut(&mut self, index: usize) -> EtlResult<&mut TextAnnotation> {
        let count = self.segments.len();
        match self.segments.get_mut(index) {
            Some(segment) if segment.is_fenominal_hit => Ok(segment),
            Some(_) => Err(EtlError::Precondition(format!(
                "segment {index} is not a term hit"
            ))),
            None => Err(EtlError::RowIndex { index, count }),
        }
    }

    pub fn toggle_observed(&mut self, index: usize) -> EtlResult<bool> {
        let hit = self.hit_mut(index)?;
        hit.is_observed = !hit.is_observed;
        Ok(hit.is_observed)
    }

    pub fn set_onset(&mut self, index: usize, onset: &str) -> EtlResult<()> {
        let onset = onset.trim();
        if !age::is_valid_age(onset) {
            return Err(EtlError::InvalidOnset(onset.to_string()));
        }
        self.hit_mut(index)?.onset_string = onset.to_string();
        Ok(())
    }

    /// Swaps the term of a hit (for instance for a parent or child term),
    /// keeping its onset and status.
    pub fn replace_term(&mut self, index: usize, term: &TermRef) -> EtlResult<()> {
        let hit = self.hit_mut(index)?;
        hit.term_id = term.hpo_id.clone();
        hit.label = term.hpo_label.clone();
        Ok(())
    }

    pub fn remove_hit(&mut self, index: usize) -> EtlResult<TextAnnotation> {
        self.hit_mut(index)?;
        Ok(self.segments.remove(index))
    }

    pub fn add_term(&mut self, term: &TermRef) {
        self.segments.push(TextAnnotation::from_term(term));
    }

    pub fn finish(&self) -> EtlResult<Vec<HpoTermData>> {
        finish(&self.segments)
    }
}

/// One [`HpoTermData`] per distinct term, in first-seen order. Repeated hits
/// must agree on onset and observed status.
pub fn finish(hits: &[TextAnnotation]) -> EtlResult<Vec<HpoTermData>> {
    let mut unique: Vec<&TextAnnotation> = Vec::new();
    let mut by_id: HashMap<&str, usize> = HashMap::new();
    for hit in hits.iter().filter(|h| h.is_fenominal_hit) {
        match by_id.get(hit.term_id.as_str()) {
            Some(idx) => {
                let existing = unique[*idx];
                if existing.onset_string != hit.onset_string
                    || existing.is_observed != hit.is_observed
                {
                    return Err(EtlError::Conflict {
                        term_id: hit.term_id.clone(),
                        existing_onset: existing.onset_string.clone(),
                        existing_observed: existing.is_observed,
                        new_onset: hit.onset_string.clone(),
                        new_observed: hit.is_observed,
                    });
                }
            }
            None => {
                by_id.insert(hit.term_id.as_str(), unique.len());
                unique.push(hit);
            }
        }
    }
    info!("Reconciled {} distinct term(s)", unique.len());
    Ok(unique.into_iter().map(HpoTermData::from_hit).collect())
}

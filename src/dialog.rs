//! Interactive steps of a transform.
//!
//! Each dialog kind is one variant of [`DialogRequest`]; the answer is the
//! matching variant of [`DialogResponse`]. `None` from a provider means the
//! user cancelled, and the caller must leave the table untouched.

use std::collections::{BTreeMap, VecDeque};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::model::TermRef;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DialogRequest {
    SplitColumn {
        header: String,
        example: String,
    },
    SplitAgeSex {
        header: String,
        example: String,
    },
    ConfirmDelete {
        header: String,
    },
    ConstantColumn {
        after_header: String,
    },
    MergeColumns {
        header: String,
        candidates: Vec<String>,
    },
    ValueMapping {
        header: String,
        unique_values: Vec<String>,
    },
    SingleHpoMapping {
        header: String,
        unique_values: Vec<String>,
    },
    VariantContext {
        header: String,
    },
    ConfirmDiscard {
        message: String,
    },
}

impl DialogRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            DialogRequest::SplitColumn { .. } => "splitColumn",
            DialogRequest::SplitAgeSex { .. } => "splitAgeSex",
            DialogRequest::ConfirmDelete { .. } => "confirmDelete",
            DialogRequest::ConstantColumn { .. } => "constantColumn",
            DialogRequest::MergeColumns { .. } => "mergeColumns",
            DialogRequest::ValueMapping { .. } => "valueMapping",
            DialogRequest::SingleHpoMapping { .. } => "singleHpoMapping",
            DialogRequest::VariantContext { .. } => "variantContext",
            DialogRequest::ConfirmDiscard { .. } => "confirmDiscard",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DialogResponse {
    SplitColumn {
        separator: String,
    },
    /// Positions are 0 (before the separator) or 1 (after it).
    #[serde(rename_all = "camelCase")]
    SplitAgeSex {
        separator: String,
        sex_position: usize,
        age_position: usize,
    },
    Confirm {
        accepted: bool,
    },
    ConstantColumn {
        header: String,
        value: String,
    },
    #[serde(rename_all = "camelCase")]
    MergeColumns {
        other_column: usize,
        separator: String,
    },
    ValueMapping {
        mapping: BTreeMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    SingleHpoMapping {
        term: TermRef,
        value_to_state: BTreeMap<String, String>,
    },
    #[serde(rename_all = "camelCase")]
    VariantContext {
        gene_symbol: String,
        transcript: String,
    },
}

pub trait DialogProvider {
    fn open(&mut self, request: &DialogRequest) -> Option<DialogResponse>;
}

/// Answers dialogs from a queue, in order. An empty queue cancels.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDialogs {
    responses: VecDeque<DialogResponse>,
    seen: Vec<DialogRequest>,
}

impl ScriptedDialogs {
    pub fn new(responses: impl IntoIterator<Item = DialogResponse>) -> Self {
        Self {
            responses: responses.into_iter().collect(),
            seen: Vec::new(),
        }
    }

    /// Requests that were opened so far.
    pub fn seen(&self) -> &[DialogRequest] {
        &self.seen
    }
}

impl DialogProvider for ScriptedDialogs {
    fn open(&mut self, request: &DialogRequest) -> Option<DialogResponse> {
        debug!("Dialog '{}' opened", request.kind());
        self.seen.push(request.clone());
        self.responses.pop_front()
    }
}

/// Cancels every dialog.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelAll;

impl DialogProvider for CancelAll {
    fn open(&mut self, _request: &DialogRequest) -> Option<DialogResponse> {
        None
    }
}

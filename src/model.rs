use std::{
    fmt,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{EtlError, EtlResult};

pub const CURRENT_SNAPSHOT_VERSION: &str = "1";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EtlColumnType {
    Raw,
    FamilyId,
    PatientId,
    SingleHpoTerm,
    MultipleHpoTerm,
    GeneSymbol,
    Variant,
    Disease,
    AgeOfOnset,
    AgeAtLastEncounter,
    Deceased,
    Sex,
    Ignore,
    HpoTextMining,
}

impl EtlColumnType {
    pub const ALL: [EtlColumnType; 14] = [
        EtlColumnType::Raw,
        EtlColumnType::FamilyId,
        EtlColumnType::PatientId,
        EtlColumnType::SingleHpoTerm,
        EtlColumnType::MultipleHpoTerm,
        EtlColumnType::GeneSymbol,
        EtlColumnType::Variant,
        EtlColumnType::Disease,
        EtlColumnType::AgeOfOnset,
        EtlColumnType::AgeAtLastEncounter,
        EtlColumnType::Deceased,
        EtlColumnType::Sex,
        EtlColumnType::Ignore,
        EtlColumnType::HpoTextMining,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EtlColumnType::Raw => "Raw",
            EtlColumnType::FamilyId => "FamilyId",
            EtlColumnType::PatientId => "PatientId",
            EtlColumnType::SingleHpoTerm => "SingleHpoTerm",
            EtlColumnType::MultipleHpoTerm => "MultipleHpoTerm",
            EtlColumnType::GeneSymbol => "GeneSymbol",
            EtlColumnType::Variant => "Variant",
            EtlColumnType::Disease => "Disease",
            EtlColumnType::AgeOfOnset => "AgeOfOnset",
            EtlColumnType::AgeAtLastEncounter => "AgeAtLastEncounter",
            EtlColumnType::Deceased => "Deceased",
            EtlColumnType::Sex => "Sex",
            EtlColumnType::Ignore => "Ignore",
            EtlColumnType::HpoTextMining => "HpoTextMining",
        }
    }
}

impl fmt::Display for EtlColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EtlColumnType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim();
        EtlColumnType::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| format!("Unknown column type '{s}'"))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CellStatus {
    Raw,
    Transformed,
    Error,
    Ignored,
}

/// One spreadsheet cell. `current` always derives from `original`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EtlCell {
    original: String,
    current: String,
    status: CellStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl EtlCell {
    pub fn raw(original: impl Into<String>) -> Self {
        let original = original.into();
        Self {
            current: original.clone(),
            original,
            status: CellStatus::Raw,
            error: None,
        }
    }

    pub fn transformed(original: impl Into<String>, current: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            current: current.into(),
            status: CellStatus::Transformed,
            error: None,
        }
    }

    /// An errored cell never carries a stale `current` value.
    pub fn failed(original: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            current: String::new(),
            status: CellStatus::Error,
            error: Some(message.into()),
        }
    }

    pub fn ignored(original: impl Into<String>) -> Self {
        let original = original.into();
        Self {
            current: original.clone(),
            original,
            status: CellStatus::Ignored,
            error: None,
        }
    }

    pub fn unmapped(original: impl Into<String>) -> Self {
        let original = original.into();
        let message = format!("Could not map \"{original}\"");
        Self::failed(original, message)
    }

    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn status(&self) -> CellStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_transformed(&self) -> bool {
        self.status == CellStatus::Transformed
    }

    /// Manual override: keeps the original, replaces the current value.
    pub fn with_manual_value(&self, value: impl Into<String>) -> Self {
        Self::transformed(self.original.clone(), value)
    }

    pub fn reset(&self) -> Self {
        Self::raw(self.original.clone())
    }
}

/// Identifier/label pair of an ontology term.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct TermRef {
    pub hpo_id: String,
    pub hpo_label: String,
}

impl TermRef {
    pub fn new(hpo_id: impl Into<String>, hpo_label: impl Into<String>) -> Self {
        Self {
            hpo_id: hpo_id.into(),
            hpo_label: hpo_label.into(),
        }
    }
}

/// A term suggested for a piece of text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TermMatch {
    pub id: String,
    pub label: String,
    pub matched_text: String,
}

impl TermMatch {
    pub fn to_term_ref(&self) -> TermRef {
        TermRef::new(self.id.clone(), self.label.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ColumnHeader {
    pub original: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    pub column_type: EtlColumnType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hpo_terms: Vec<TermRef>,
}

impl ColumnHeader {
    pub fn raw(original: impl Into<String>) -> Self {
        Self {
            original: original.into(),
            current: None,
            column_type: EtlColumnType::Raw,
            hpo_terms: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        self.current.as_deref().unwrap_or(&self.original)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: Uuid,
    pub header: ColumnHeader,
    pub values: Vec<EtlCell>,
}

impl Column {
    pub fn new<I, S>(header: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: Uuid::new_v4(),
            header: ColumnHeader::raw(header),
            values: values.into_iter().map(EtlCell::raw).collect(),
        }
    }

    /// A copy with a fresh id, the given header, and the given cells.
    pub fn derived(&self, header: ColumnHeader, values: Vec<EtlCell>) -> Self {
        Self {
            id: Uuid::new_v4(),
            header,
            values,
        }
    }

    /// Same id, new header and cells.
    pub fn rebuilt(&self, header: ColumnHeader, values: Vec<EtlCell>) -> Self {
        Self {
            id: self.id,
            header,
            values,
        }
    }

    /// Same id and header, new cells.
    pub fn with_values(&self, values: Vec<EtlCell>) -> Self {
        Self {
            id: self.id,
            header: self.header.clone(),
            values,
        }
    }

    pub fn with_column_type(mut self, column_type: EtlColumnType) -> Self {
        self.header.column_type = column_type;
        self
    }

    pub fn column_type(&self) -> EtlColumnType {
        self.header.column_type
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_fully_transformed(&self) -> bool {
        self.values.iter().all(EtlCell::is_transformed)
    }

    /// Distinct trimmed, non-empty original values in first-seen order.
    pub fn unique_values(&self) -> Vec<String> {
        self.values
            .iter()
            .map(|cell| cell.original().trim())
            .filter(|value| !value.is_empty())
            .unique()
            .map(str::to_string)
            .collect()
    }

    pub fn validate_metadata(&self) -> EtlResult<()> {
        let count = self.header.hpo_terms.len();
        let problem = match self.header.column_type {
            EtlColumnType::SingleHpoTerm if count != 1 => Some(format!(
                "SingleHpoTerm columns need exactly one HPO term, found {count}"
            )),
            EtlColumnType::MultipleHpoTerm if count == 0 => {
                Some("MultipleHpoTerm columns need at least one HPO term".to_string())
            }
            _ => None,
        };
        match problem {
            Some(message) => Err(EtlError::InvalidMetadata {
                header: self.header.label().to_string(),
                message,
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub file_name: String,
    pub columns: Vec<Arc<Column>>,
}

impl Table {
    pub fn new(file_name: impl Into<String>, columns: Vec<Column>) -> EtlResult<Self> {
        let table = Self {
            file_name: file_name.into(),
            columns: columns.into_iter().map(Arc::new).collect(),
        };
        table.validate()?;
        Ok(table)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|c| c.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> EtlResult<&Arc<Column>> {
        self.columns.get(index).ok_or(EtlError::ColumnIndex {
            index,
            count: self.columns.len(),
        })
    }

    /// A new table sharing every untouched column with `self`.
    pub fn with_columns(&self, columns: Vec<Arc<Column>>) -> Self {
        Self {
            file_name: self.file_name.clone(),
            columns,
        }
    }

    pub fn with_column_replaced(&self, index: usize, column: Column) -> EtlResult<Self> {
        self.column(index)?;
        let mut columns = self.columns.clone();
        columns[index] = Arc::new(column);
        Ok(self.with_columns(columns))
    }

    /// Row-count and per-column metadata invariants.
    pub fn validate(&self) -> EtlResult<()> {
        let expected = self.row_count();
        for column in &self.columns {
            if column.len() != expected {
                return Err(EtlError::RowCountMismatch {
                    header: column.header.label().to_string(),
                    expected,
                    found: column.len(),
                });
            }
            column.validate_metadata()?;
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = SessionSnapshot {
            version: CURRENT_SNAPSHOT_VERSION.to_string(),
            saved_at: Some(Utc::now()),
            table: self.clone(),
        };
        let file =
            File::create(path).with_context(|| format!("Creating session file {path:?}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &snapshot)
            .context("Writing session JSON")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening session file {path:?}"))?;
        let reader = BufReader::new(file);
        let snapshot: SessionSnapshot =
            serde_json::from_reader(reader).context("Parsing session JSON")?;
        snapshot
            .table
            .validate()
            .with_context(|| format!("Validating session table from {path:?}"))?;
        Ok(snapshot.table)
    }
}

/// On-disk wrapper for an in-progress ETL session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    pub table: Table,
}

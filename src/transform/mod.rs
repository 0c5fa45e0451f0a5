//! Transform registry.
//!
//! Every transform the editor offers is a [`TransformType`]. Which transforms
//! may run on which column types, and what column type a transform leaves
//! behind, are both plain tables so the rules can be read (and tested) apart
//! from the engine that applies them.

pub mod element;
pub mod engine;
pub mod string_ops;
pub mod structural;

use std::{borrow::Cow, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{error::EtlError, model::EtlColumnType};

pub use engine::{TransformEngine, TransformOutcome};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransformType {
    SingleHpoTerm,
    MultipleHpoTerm,
    OnsetAge,
    LastEncounterAge,
    SexColumn,
    SplitColumn,
    SplitAgeSex,
    StringSanitize,
    RemoveWhitespace,
    ToUppercase,
    ToLowercase,
    ExtractNumbers,
    ReplaceUniqueValues,
    OnsetAgeAssumeYears,
    #[serde(alias = "LAST_ECOUNTER_AGE_ASSUME_YEARS")]
    LastEncounterAgeAssumeYears,
    AnnotateVariants,
    DeleteColumn,
    DuplicateColumn,
    ConstantColumn,
    MergeIndividualFamily,
    RawColumnType,
    FamilyIdColumnType,
    IndividualIdColumnType,
    GeneSymbolColumnType,
    DiseaseColumnType,
    AgeOfOnsetColumnType,
    AgeAtLastEncounterColumnType,
    SexColumnType,
    DeceasedColumnType,
    IgnoreColumnType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformCategory {
    ColumnType,
    Demographics,
    Phenotype,
    Tidy,
    Structure,
}

impl TransformCategory {
    pub fn label(&self) -> &'static str {
        match self {
            TransformCategory::ColumnType => "Set column type",
            TransformCategory::Demographics => "Demographics",
            TransformCategory::Phenotype => "HPO",
            TransformCategory::Tidy => "Tidy",
            TransformCategory::Structure => "Columns",
        }
    }
}

/// How the engine runs a transform. Checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformClass {
    ElementWise,
    Tidy,
    Structural,
}

impl TransformType {
    pub const ALL: [TransformType; 30] = [
        TransformType::SingleHpoTerm,
        TransformType::MultipleHpoTerm,
        TransformType::OnsetAge,
        TransformType::LastEncounterAge,
        TransformType::SexColumn,
        TransformType::SplitColumn,
        TransformType::SplitAgeSex,
        TransformType::StringSanitize,
        TransformType::RemoveWhitespace,
        TransformType::ToUppercase,
        TransformType::ToLowercase,
        TransformType::ExtractNumbers,
        TransformType::ReplaceUniqueValues,
        TransformType::OnsetAgeAssumeYears,
        TransformType::LastEncounterAgeAssumeYears,
        TransformType::AnnotateVariants,
        TransformType::DeleteColumn,
        TransformType::DuplicateColumn,
        TransformType::ConstantColumn,
        TransformType::MergeIndividualFamily,
        TransformType::RawColumnType,
        TransformType::FamilyIdColumnType,
        TransformType::IndividualIdColumnType,
        TransformType::GeneSymbolColumnType,
        TransformType::DiseaseColumnType,
        TransformType::AgeOfOnsetColumnType,
        TransformType::AgeAtLastEncounterColumnType,
        TransformType::SexColumnType,
        TransformType::DeceasedColumnType,
        TransformType::IgnoreColumnType,
    ];

    pub fn identifier(&self) -> &'static str {
        match self {
            TransformType::SingleHpoTerm => "SINGLE_HPO_TERM",
            TransformType::MultipleHpoTerm => "MULTIPLE_HPO_TERM",
            TransformType::OnsetAge => "ONSET_AGE",
            TransformType::LastEncounterAge => "LAST_ENCOUNTER_AGE",
            TransformType::SexColumn => "SEX_COLUMN",
            TransformType::SplitColumn => "SPLIT_COLUMN",
            TransformType::SplitAgeSex => "SPLIT_AGE_SEX",
            TransformType::StringSanitize => "STRING_SANITIZE",
            TransformType::RemoveWhitespace => "REMOVE_WHITESPACE",
            TransformType::ToUppercase => "TO_UPPERCASE",
            TransformType::ToLowercase => "TO_LOWERCASE",
            TransformType::ExtractNumbers => "EXTRACT_NUMBERS",
            TransformType::ReplaceUniqueValues => "REPLACE_UNIQUE_VALUES",
            TransformType::OnsetAgeAssumeYears => "ONSET_AGE_ASSUME_YEARS",
            TransformType::LastEncounterAgeAssumeYears => "LAST_ENCOUNTER_AGE_ASSUME_YEARS",
            TransformType::AnnotateVariants => "ANNOTATE_VARIANTS",
            TransformType::DeleteColumn => "DELETE_COLUMN",
            TransformType::DuplicateColumn => "DUPLICATE_COLUMN",
            TransformType::ConstantColumn => "CONSTANT_COLUMN",
            TransformType::MergeIndividualFamily => "MERGE_INDIVIDUAL_FAMILY",
            TransformType::RawColumnType => "RAW_COLUMN_TYPE",
            TransformType::FamilyIdColumnType => "FAMILY_ID_COLUMN_TYPE",
            TransformType::IndividualIdColumnType => "INDIVIDUAL_ID_COLUMN_TYPE",
            TransformType::GeneSymbolColumnType => "GENE_SYMBOL_COLUMN_TYPE",
            TransformType::DiseaseColumnType => "DISEASE_COLUMN_TYPE",
            TransformType::AgeOfOnsetColumnType => "AGE_OF_ONSET_COLUMN_TYPE",
            TransformType::AgeAtLastEncounterColumnType => "AGE_AT_LAST_ENCOUNTER_COLUMN_TYPE",
            TransformType::SexColumnType => "SEX_COLUMN_TYPE",
            TransformType::DeceasedColumnType => "DECEASED_COLUMN_TYPE",
            TransformType::IgnoreColumnType => "IGNORE_COLUMN_TYPE",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransformType::SingleHpoTerm => "Single HPO Term",
            TransformType::MultipleHpoTerm => "Multiple HPO Terms...",
            TransformType::OnsetAge => "Onset age",
            TransformType::LastEncounterAge => "Age at last encounter",
            TransformType::SexColumn => "Sex Column",
            TransformType::SplitColumn => "Split Column",
            TransformType::SplitAgeSex => "Split age/sex column",
            TransformType::StringSanitize => "Sanitize (trim/ASCII)",
            TransformType::RemoveWhitespace => "Remove all whitespace",
            TransformType::ToUppercase => "To Uppercase",
            TransformType::ToLowercase => "To Lowercase",
            TransformType::ExtractNumbers => "Extract Numbers",
            TransformType::ReplaceUniqueValues => "Replace Unique Values",
            TransformType::OnsetAgeAssumeYears => "Onset Age (Assume Years)",
            TransformType::LastEncounterAgeAssumeYears => "Last Encounter Age (Assume Years)",
            TransformType::AnnotateVariants => "Annotate variants",
            TransformType::DeleteColumn => "Delete Column",
            TransformType::DuplicateColumn => "Duplicate Column",
            TransformType::ConstantColumn => "Add constant column to right",
            TransformType::MergeIndividualFamily => "Merge family/individual columns",
            TransformType::RawColumnType => "Raw (Reset)",
            TransformType::FamilyIdColumnType => "Family ID",
            TransformType::IndividualIdColumnType => "Individual ID",
            TransformType::GeneSymbolColumnType => "Gene symbol",
            TransformType::DiseaseColumnType => "Disease",
            TransformType::AgeOfOnsetColumnType => "Age of onset",
            TransformType::AgeAtLastEncounterColumnType => "Age at last encounter (type)",
            TransformType::SexColumnType => "Sex",
            TransformType::DeceasedColumnType => "Deceased",
            TransformType::IgnoreColumnType => "Ignore",
        }
    }

    pub fn category(&self) -> TransformCategory {
        use TransformType::*;
        match self {
            RawColumnType | FamilyIdColumnType | IndividualIdColumnType | GeneSymbolColumnType
            | DiseaseColumnType | AgeOfOnsetColumnType | AgeAtLastEncounterColumnType
            | SexColumnType | DeceasedColumnType | IgnoreColumnType => {
                TransformCategory::ColumnType
            }
            OnsetAge | LastEncounterAge | OnsetAgeAssumeYears | LastEncounterAgeAssumeYears
            | SexColumn | AnnotateVariants => TransformCategory::Demographics,
            SingleHpoTerm | MultipleHpoTerm => TransformCategory::Phenotype,
            StringSanitize | RemoveWhitespace | ToUppercase | ToLowercase | ExtractNumbers => {
                TransformCategory::Tidy
            }
            SplitColumn | SplitAgeSex | DeleteColumn | DuplicateColumn | ConstantColumn
            | MergeIndividualFamily | ReplaceUniqueValues => TransformCategory::Structure,
        }
    }

    pub fn class(&self) -> TransformClass {
        if element::element_fn(*self).is_some() {
            TransformClass::ElementWise
        } else if tidy_fn(*self).is_some() {
            TransformClass::Tidy
        } else {
            TransformClass::Structural
        }
    }
}

impl fmt::Display for TransformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for TransformType {
    type Err = EtlError;

    /// Accepts the identifier (any case, `-` or `_`) or the display label.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        let normalized = needle.replace('-', "_").to_ascii_uppercase();
        if normalized == "LAST_ECOUNTER_AGE_ASSUME_YEARS" {
            return Ok(TransformType::LastEncounterAgeAssumeYears);
        }
        TransformType::ALL
            .iter()
            .copied()
            .find(|t| t.identifier() == normalized || t.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| EtlError::UnknownTransform(s.to_string()))
    }
}

pub type TidyFn = for<'a> fn(&'a str) -> Cow<'a, str>;

pub fn tidy_fn(transform: TransformType) -> Option<TidyFn> {
    let f: TidyFn = match transform {
        TransformType::StringSanitize => string_ops::sanitize,
        TransformType::RemoveWhitespace => string_ops::remove_whitespace,
        TransformType::ToUppercase => string_ops::uppercase,
        TransformType::ToLowercase => string_ops::lowercase,
        TransformType::ExtractNumbers => string_ops::extract_numbers,
        _ => return None,
    };
    Some(f)
}

const HPO_COLUMN_TRANSFORMS: &[TransformType] = &[
    TransformType::RawColumnType,
    TransformType::DeleteColumn,
    TransformType::DuplicateColumn,
];

const IGNORED_COLUMN_TRANSFORMS: &[TransformType] =
    &[TransformType::RawColumnType, TransformType::DeleteColumn];

/// Column types that only accept a restricted transform list. Types not
/// listed here accept every transform.
pub const RESTRICTED_COLUMN_TYPES: &[(EtlColumnType, &[TransformType])] = &[
    (EtlColumnType::SingleHpoTerm, HPO_COLUMN_TRANSFORMS),
    (EtlColumnType::MultipleHpoTerm, HPO_COLUMN_TRANSFORMS),
    (EtlColumnType::Ignore, IGNORED_COLUMN_TRANSFORMS),
];

/// Column type assigned by a transform. Transforms not listed keep the type.
pub const RESULTING_COLUMN_TYPES: &[(TransformType, EtlColumnType)] = &[
    (TransformType::RawColumnType, EtlColumnType::Raw),
    (TransformType::FamilyIdColumnType, EtlColumnType::FamilyId),
    (TransformType::IndividualIdColumnType, EtlColumnType::PatientId),
    (TransformType::MergeIndividualFamily, EtlColumnType::PatientId),
    (TransformType::GeneSymbolColumnType, EtlColumnType::GeneSymbol),
    (TransformType::DiseaseColumnType, EtlColumnType::Disease),
    (TransformType::AgeOfOnsetColumnType, EtlColumnType::AgeOfOnset),
    (TransformType::OnsetAge, EtlColumnType::AgeOfOnset),
    (TransformType::OnsetAgeAssumeYears, EtlColumnType::AgeOfOnset),
    (TransformType::LastEncounterAge, EtlColumnType::AgeAtLastEncounter),
    (TransformType::LastEncounterAgeAssumeYears, EtlColumnType::AgeAtLastEncounter),
    (TransformType::AgeAtLastEncounterColumnType, EtlColumnType::AgeAtLastEncounter),
    (TransformType::SexColumnType, EtlColumnType::Sex),
    (TransformType::SexColumn, EtlColumnType::Sex),
    (TransformType::DeceasedColumnType, EtlColumnType::Deceased),
    (TransformType::IgnoreColumnType, EtlColumnType::Ignore),
    (TransformType::AnnotateVariants, EtlColumnType::Variant),
    (TransformType::SingleHpoTerm, EtlColumnType::SingleHpoTerm),
    (TransformType::MultipleHpoTerm, EtlColumnType::MultipleHpoTerm),
];

pub fn is_allowed(column_type: EtlColumnType, transform: TransformType) -> bool {
    RESTRICTED_COLUMN_TYPES
        .iter()
        .find(|(ty, _)| *ty == column_type)
        .map(|(_, allowed)| allowed.contains(&transform))
        .unwrap_or(true)
}

pub fn resulting_column_type(transform: TransformType) -> Option<EtlColumnType> {
    RESULTING_COLUMN_TYPES
        .iter()
        .find(|(t, _)| *t == transform)
        .map(|(_, ty)| *ty)
}

/// Transforms offered for a column of the given type, in menu order.
pub fn allowed_transforms(column_type: EtlColumnType) -> Vec<TransformType> {
    TransformType::ALL
        .iter()
        .copied()
        .filter(|t| is_allowed(column_type, *t))
        .collect()
}

//! Element-wise semantic transforms: `original -> Some(current)` or `None`
//! when the value cannot be mapped.

use crate::age;

use super::{TransformType, string_ops};

pub type ElementFn = fn(&str) -> Option<String>;

pub fn element_fn(transform: TransformType) -> Option<ElementFn> {
    let f: ElementFn = match transform {
        TransformType::OnsetAge | TransformType::LastEncounterAge => age::map_age,
        TransformType::OnsetAgeAssumeYears | TransformType::LastEncounterAgeAssumeYears => {
            age::parse_age_assume_years
        }
        TransformType::AgeOfOnsetColumnType | TransformType::AgeAtLastEncounterColumnType => {
            age::validate_age
        }
        TransformType::SexColumn | TransformType::SexColumnType => normalize_sex,
        TransformType::DeceasedColumnType => normalize_deceased,
        TransformType::FamilyIdColumnType | TransformType::IndividualIdColumnType => sanitize_id,
        _ => return None,
    };
    Some(f)
}

/// Maps free-form sex codes to `M`, `F`, `O` or `U`.
pub fn normalize_sex(value: &str) -> Option<String> {
    let code = match value.trim().to_lowercase().as_str() {
        "m" | "male" | "man" | "boy" | "xy" | "1" => "M",
        "f" | "female" | "woman" | "girl" | "w" | "xx" | "2" => "F",
        "o" | "other" => "O",
        "u" | "unknown" | "na" | "n/a" | "?" | "" => "U",
        _ => return None,
    };
    Some(code.to_string())
}

/// Maps deceased flags to `yes`, `no` or `na`.
pub fn normalize_deceased(value: &str) -> Option<String> {
    let flag = match value.trim().to_lowercase().as_str() {
        "yes" | "y" | "true" | "t" | "1" | "deceased" | "dead" | "died" | "+" => "yes",
        "no" | "n" | "false" | "f" | "0" | "alive" | "living" | "-" => "no",
        "na" | "n/a" | "unknown" | "?" | "" => "na",
        _ => return None,
    };
    Some(flag.to_string())
}

/// Family and individual identifiers: sanitized, never empty.
pub fn sanitize_id(value: &str) -> Option<String> {
    let cleaned = string_ops::sanitize(value);
    (!cleaned.is_empty()).then(|| cleaned.into_owned())
}

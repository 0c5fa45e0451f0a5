//! Structural and interactive transforms.
//!
//! Each function takes the table it should start from and returns the table
//! to commit, or `None` when the user cancelled a dialog. Nothing here
//! touches the store.

use std::sync::Arc;

use log::{debug, info};

use crate::{
    age,
    backend::{self, Backend, VariantCheck},
    dialog::{DialogProvider, DialogRequest, DialogResponse},
    error::{EtlError, EtlResult},
    model::{Column, ColumnHeader, EtlCell, EtlColumnType, Table},
};

use super::element::{self, ElementFn};

/// Valid states of a single-HPO cell besides an onset age.
pub const HPO_STATES: [&str; 3] = ["observed", "excluded", "na"];

fn unexpected(expected: &'static str) -> EtlError {
    EtlError::UnexpectedDialogResponse { expected }
}

fn insert_after(table: &Table, index: usize, new_columns: Vec<Column>) -> Table {
    let mut columns = table.columns.clone();
    let at = index + 1;
    columns.splice(at..at, new_columns.into_iter().map(Arc::new));
    table.with_columns(columns)
}

/// Cells back to `Raw`, header back to an untyped column.
pub fn reset_to_raw(table: &Table, index: usize) -> EtlResult<Table> {
    let column = table.column(index)?;
    let mut header = column.header.clone();
    header.column_type = EtlColumnType::Raw;
    header.hpo_terms.clear();
    let values = column.values.iter().map(EtlCell::reset).collect();
    table.with_column_replaced(index, column.rebuilt(header, values))
}

pub fn ignore(table: &Table, index: usize) -> EtlResult<Table> {
    let column = table.column(index)?;
    let mut header = column.header.clone();
    header.column_type = EtlColumnType::Ignore;
    header.hpo_terms.clear();
    let values = column
        .values
        .iter()
        .map(|cell| EtlCell::ignored(cell.original()))
        .collect();
    table.with_column_replaced(index, column.rebuilt(header, values))
}

/// Only the column type changes.
pub fn tag_column_type(
    table: &Table,
    index: usize,
    column_type: EtlColumnType,
) -> EtlResult<Table> {
    let column = table.column(index)?;
    let tagged = column.as_ref().clone().with_column_type(column_type);
    table.with_column_replaced(index, tagged)
}

/// Splits every cell at the first occurrence of the chosen separator into
/// two new columns placed right after the source column.
pub fn split_column(
    table: &Table,
    index: usize,
    dialogs: &mut dyn DialogProvider,
) -> EtlResult<Option<Table>> {
    let column = table.column(index)?;
    let label = column.header.label().to_string();
    let request = DialogRequest::SplitColumn {
        header: label.clone(),
        example: first_example(column),
    };
    let Some(response) = dialogs.open(&request) else {
        return Ok(None);
    };
    let DialogResponse::SplitColumn { separator } = response else {
        return Err(unexpected("splitColumn"));
    };
    if separator.is_empty() {
        return Err(EtlError::Precondition(
            "split separator must not be empty".to_string(),
        ));
    }

    let (left, right): (Vec<String>, Vec<String>) = column
        .values
        .iter()
        .map(|cell| split_once_trimmed(cell.original(), &separator))
        .unzip();
    debug!("Split '{label}' on {separator:?}");
    let first = Column::new(format!("{label}_a"), left);
    let second = Column::new(format!("{label}_b"), right);
    Ok(Some(insert_after(table, index, vec![first, second])))
}

fn first_example(column: &Column) -> String {
    column
        .values
        .iter()
        .map(EtlCell::original)
        .find(|value| !value.trim().is_empty())
        .unwrap_or_default()
        .to_string()
}

fn typed_column(
    source: &Column,
    header: String,
    column_type: EtlColumnType,
    values: Vec<EtlCell>,
) -> Column {
    let mut header = ColumnHeader::raw(header);
    header.column_type = column_type;
    source.derived(header, values)
}

fn map_part(part: String, f: ElementFn) -> EtlCell {
    match f(&part) {
        Some(value) => EtlCell::transformed(part, value),
        None => EtlCell::unmapped(part),
    }
}

/// Splits combined values such as `12y/M` into a normalized sex column and
/// an age column, both placed right after the source column.
pub fn split_age_sex(
    table: &Table,
    index: usize,
    dialogs: &mut dyn DialogProvider,
) -> EtlResult<Option<Table>> {
    let column = table.column(index)?;
    let label = column.header.label().to_string();
    let request = DialogRequest::SplitAgeSex {
        header: label.clone(),
        example: first_example(column),
    };
    let Some(response) = dialogs.open(&request) else {
        return Ok(None);
    };
    let DialogResponse::SplitAgeSex {
        separator,
        sex_position,
        age_position,
    } = response
    else {
        return Err(unexpected("splitAgeSex"));
    };
    if separator.is_empty() {
        return Err(EtlError::Precondition(
            "split separator must not be empty".to_string(),
        ));
    }
    if sex_position > 1 || age_position > 1 || sex_position == age_position {
        return Err(EtlError::Precondition(format!(
            "sex and age need distinct positions 0 and 1 (got {sex_position} and {age_position})"
        )));
    }

    let mut sexes = Vec::with_capacity(column.len());
    let mut ages = Vec::with_capacity(column.len());
    for cell in &column.values {
        let (first, second) = split_once_trimmed(cell.original(), &separator);
        let (sex, age) = if sex_position == 0 {
            (first, second)
        } else {
            (second, first)
        };
        sexes.push(map_part(sex, element::normalize_sex));
        ages.push(map_part(age, age::map_age));
    }
    debug!("Split '{label}' into sex and age on {separator:?}");
    let sex = typed_column(column, format!("{label}_sex"), EtlColumnType::Sex, sexes);
    let age = typed_column(
        column,
        format!("{label}_age"),
        EtlColumnType::AgeAtLastEncounter,
        ages,
    );
    Ok(Some(insert_after(table, index, vec![sex, age])))
}

/// Text before and after the first `separator`; the whole value and an
/// empty string when the separator does not occur.
pub fn split_once_trimmed(value: &str, separator: &str) -> (String, String) {
    match value.split_once(separator) {
        Some((a, b)) => (a.trim().to_string(), b.trim().to_string()),
        None => (value.trim().to_string(), String::new()),
    }
}

pub fn delete_column(
    table: &Table,
    index: usize,
    dialogs: &mut dyn DialogProvider,
) -> EtlResult<Option<Table>> {
    let column = table.column(index)?;
    let request = DialogRequest::ConfirmDelete {
        header: column.header.label().to_string(),
    };
    match dialogs.open(&request) {
        None | Some(DialogResponse::Confirm { accepted: false }) => Ok(None),
        Some(DialogResponse::Confirm { accepted: true }) => {
            info!("Deleting column '{}'", column.header.label());
            let mut columns = table.columns.clone();
            columns.remove(index);
            Ok(Some(table.with_columns(columns)))
        }
        Some(_) => Err(unexpected("confirm")),
    }
}

/// Copy with a fresh id, placed to the right of the source.
pub fn duplicate_column(table: &Table, index: usize) -> EtlResult<Table> {
    let column = table.column(index)?;
    let mut header = column.header.clone();
    header.current = Some(format!("{}_copy", column.header.label()));
    let copy = column.derived(header, column.values.clone());
    Ok(insert_after(table, index, vec![copy]))
}

pub fn constant_column(
    table: &Table,
    index: usize,
    dialogs: &mut dyn DialogProvider,
) -> EtlResult<Option<Table>> {
    let column = table.column(index)?;
    let request = DialogRequest::ConstantColumn {
        after_header: column.header.label().to_string(),
    };
    let Some(response) = dialogs.open(&request) else {
        return Ok(None);
    };
    let DialogResponse::ConstantColumn { header, value } = response else {
        return Err(unexpected("constantColumn"));
    };
    let header = header.trim();
    if header.is_empty() {
        return Err(EtlError::Precondition(
            "constant column needs a header".to_string(),
        ));
    }
    let constant = Column::new(header, std::iter::repeat_n(value, table.row_count()));
    Ok(Some(insert_after(table, index, vec![constant])))
}

/// Builds patient identifiers as `<family><separator><individual>` from
/// this (individual) column and a family column chosen in the dialog.
pub fn merge_individual_family(
    table: &Table,
    index: usize,
    dialogs: &mut dyn DialogProvider,
) -> EtlResult<Option<Table>> {
    let column = table.column(index)?;
    let request = DialogRequest::MergeColumns {
        header: column.header.label().to_string(),
        candidates: table
            .columns
            .iter()
            .map(|c| c.header.label().to_string())
            .collect(),
    };
    let Some(response) = dialogs.open(&request) else {
        return Ok(None);
    };
    let DialogResponse::MergeColumns {
        other_column,
        separator,
    } = response
    else {
        return Err(unexpected("mergeColumns"));
    };
    if other_column == index {
        return Err(EtlError::Precondition(
            "cannot merge a column with itself".to_string(),
        ));
    }
    let family = table.column(other_column)?;

    let values = column
        .values
        .iter()
        .zip(&family.values)
        .map(|(individual, family)| {
            let (fam, ind) = (family.original().trim(), individual.original().trim());
            match (fam.is_empty(), ind.is_empty()) {
                (true, true) => EtlCell::unmapped(individual.original()),
                (true, false) => EtlCell::transformed(individual.original(), ind),
                (false, true) => EtlCell::transformed(individual.original(), fam),
                (false, false) => {
                    EtlCell::transformed(individual.original(), format!("{fam}{separator}{ind}"))
                }
            }
        })
        .collect();
    let mut header = column.header.clone();
    header.column_type = EtlColumnType::PatientId;
    Ok(Some(
        table.with_column_replaced(index, column.rebuilt(header, values))?,
    ))
}

/// Rewrites values through a user-supplied mapping. Unmapped values are
/// kept as they are.
pub fn replace_unique_values(
    table: &Table,
    index: usize,
    dialogs: &mut dyn DialogProvider,
) -> EtlResult<Option<Table>> {
    let column = table.column(index)?;
    let request = DialogRequest::ValueMapping {
        header: column.header.label().to_string(),
        unique_values: column.unique_values(),
    };
    let Some(response) = dialogs.open(&request) else {
        return Ok(None);
    };
    let DialogResponse::ValueMapping { mapping } = response else {
        return Err(unexpected("valueMapping"));
    };
    let values = column
        .values
        .iter()
        .map(|cell| {
            let key = cell.original().trim();
            let mapped = mapping.get(key).map(String::as_str).unwrap_or(key);
            EtlCell::transformed(cell.original(), mapped)
        })
        .collect();
    Ok(Some(
        table.with_column_replaced(index, column.with_values(values))?,
    ))
}

fn normalize_hpo_state(state: &str) -> Option<String> {
    let trimmed = state.trim();
    let lower = trimmed.to_lowercase();
    if HPO_STATES.contains(&lower.as_str()) {
        return Some(lower);
    }
    age::is_valid_age(trimmed).then(|| trimmed.to_string())
}

/// Maps each cell to the state of one HPO term: observed, excluded, na,
/// or an onset age. Blank cells without a mapping become `na`.
pub fn single_hpo_term(
    table: &Table,
    index: usize,
    dialogs: &mut dyn DialogProvider,
) -> EtlResult<Option<Table>> {
    let column = table.column(index)?;
    let request = DialogRequest::SingleHpoMapping {
        header: column.header.label().to_string(),
        unique_values: column.unique_values(),
    };
    let Some(response) = dialogs.open(&request) else {
        return Ok(None);
    };
    let DialogResponse::SingleHpoMapping {
        term,
        value_to_state,
    } = response
    else {
        return Err(unexpected("singleHpoMapping"));
    };

    let values = column
        .values
        .iter()
        .map(|cell| {
            let key = cell.original().trim();
            let state = match value_to_state.get(key) {
                Some(state) => normalize_hpo_state(state),
                None if key.is_empty() => Some(age::NOT_AVAILABLE.to_string()),
                None => None,
            };
            match state {
                Some(state) => EtlCell::transformed(cell.original(), state),
                None => EtlCell::unmapped(cell.original()),
            }
        })
        .collect();
    let mut header = column.header.clone();
    header.column_type = EtlColumnType::SingleHpoTerm;
    header.current = Some(term.hpo_label.clone());
    header.hpo_terms = vec![term];
    Ok(Some(
        table.with_column_replaced(index, column.rebuilt(header, values))?,
    ))
}

/// Validates each distinct variant once through the backend. A failed
/// backend call aborts the whole transform.
pub fn annotate_variants(
    table: &Table,
    index: usize,
    dialogs: &mut dyn DialogProvider,
    backend: &mut dyn Backend,
) -> EtlResult<Option<Table>> {
    let column = table.column(index)?;
    let request = DialogRequest::VariantContext {
        header: column.header.label().to_string(),
    };
    let Some(response) = dialogs.open(&request) else {
        return Ok(None);
    };
    let DialogResponse::VariantContext {
        gene_symbol,
        transcript,
    } = response
    else {
        return Err(unexpected("variantContext"));
    };

    let mut checks = std::collections::HashMap::new();
    for variant in column.unique_values() {
        let check = backend::validate_variant(backend, &variant, &gene_symbol, &transcript)?;
        checks.insert(variant, check);
    }
    info!(
        "Validated {} distinct variant(s) for {gene_symbol}",
        checks.len()
    );

    let values = column
        .values
        .iter()
        .map(|cell| {
            let key = cell.original().trim();
            match checks.get(key) {
                Some(VariantCheck::Valid { variant_key }) => {
                    EtlCell::transformed(cell.original(), variant_key.clone())
                }
                Some(VariantCheck::Rejected { message }) => {
                    EtlCell::failed(cell.original(), message.clone())
                }
                None => EtlCell::transformed(cell.original(), ""),
            }
        })
        .collect();
    let mut header = column.header.clone();
    header.column_type = EtlColumnType::Variant;
    Ok(Some(
        table.with_column_replaced(index, column.rebuilt(header, values))?,
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::{Value, json};

    use super::*;
    use crate::{
        dialog::{CancelAll, ScriptedDialogs},
        model::{CellStatus, TermRef},
    };

    fn table() -> Table {
        Table::new(
            "cohort.csv",
            vec![
                Column::new("family", ["F1", "", "F3"]),
                Column::new("patient", ["II:1", "II:2", ""]),
            ],
        )
        .unwrap()
    }

    fn currents(column: &Column) -> Vec<&str> {
        column.values.iter().map(EtlCell::current).collect()
    }

    #[test]
    fn split_cuts_at_first_separator() {
        assert_eq!(
            split_once_trimmed("12 / m / extra", "/"),
            ("12".to_string(), "m / extra".to_string())
        );
        assert_eq!(
            split_once_trimmed("12", "/"),
            ("12".to_string(), String::new())
        );
    }

    #[test]
    fn split_inserts_two_columns_after_source() {
        let source = Table::new("t.csv", vec![Column::new("age/sex", ["12/m", "3"])]).unwrap();
        let mut dialogs = ScriptedDialogs::new([DialogResponse::SplitColumn {
            separator: "/".to_string(),
        }]);
        let next = split_column(&source, 0, &mut dialogs).unwrap().unwrap();
        assert_eq!(next.column_count(), 3);
        assert_eq!(next.columns[1].header.label(), "age/sex_a");
        assert_eq!(currents(&next.columns[2]), vec!["m", ""]);
        assert_eq!(
            dialogs.seen()[0],
            DialogRequest::SplitColumn {
                header: "age/sex".to_string(),
                example: "12/m".to_string()
            }
        );
    }

    #[test]
    fn age_sex_split_normalizes_both_parts() {
        let source =
            Table::new("t.csv", vec![Column::new("age/sex", ["12 years/M", "f/P3M", "x/?"])])
                .unwrap();
        let mut dialogs = ScriptedDialogs::new([
            DialogResponse::SplitAgeSex {
                separator: "/".to_string(),
                sex_position: 1,
                age_position: 0,
            },
        ]);
        let next = split_age_sex(&source, 0, &mut dialogs).unwrap().unwrap();
        assert_eq!(next.column_count(), 3);
        assert_eq!(next.columns[1].header.label(), "age/sex_sex");
        assert_eq!(next.columns[1].column_type(), EtlColumnType::Sex);
        assert_eq!(currents(&next.columns[1]), vec!["M", "", "U"]);
        assert_eq!(next.columns[2].column_type(), EtlColumnType::AgeAtLastEncounter);
        assert_eq!(next.columns[2].values[0].current(), "P12Y");
        assert_eq!(next.columns[2].values[1].status(), CellStatus::Error);
        assert_eq!(currents(&next.columns[0]), vec!["12 years/M", "f/P3M", "x/?"]);
    }

    #[test]
    fn age_sex_split_needs_distinct_positions() {
        let source = Table::new("t.csv", vec![Column::new("age/sex", ["12/M"])]).unwrap();
        let mut dialogs = ScriptedDialogs::new([DialogResponse::SplitAgeSex {
            separator: "/".to_string(),
            sex_position: 0,
            age_position: 0,
        }]);
        assert!(matches!(
            split_age_sex(&source, 0, &mut dialogs).unwrap_err(),
            EtlError::Precondition(_)
        ));
        assert!(split_age_sex(&source, 0, &mut CancelAll).unwrap().is_none());
    }

    #[test]
    fn declined_delete_is_a_cancel() {
        let mut dialogs = ScriptedDialogs::new([DialogResponse::Confirm { accepted: false }]);
        assert!(delete_column(&table(), 0, &mut dialogs).unwrap().is_none());
        assert!(delete_column(&table(), 0, &mut CancelAll).unwrap().is_none());
    }

    #[test]
    fn wrong_response_kind_is_an_error() {
        let mut dialogs = ScriptedDialogs::new([DialogResponse::Confirm { accepted: true }]);
        let err = split_column(&table(), 0, &mut dialogs).unwrap_err();
        assert_eq!(err, EtlError::UnexpectedDialogResponse { expected: "splitColumn" });
    }

    #[test]
    fn merge_builds_patient_ids() {
        let mut dialogs = ScriptedDialogs::new([DialogResponse::MergeColumns {
            other_column: 0,
            separator: "-".to_string(),
        }]);
        let next = merge_individual_family(&table(), 1, &mut dialogs)
            .unwrap()
            .unwrap();
        let merged = &next.columns[1];
        assert_eq!(merged.column_type(), EtlColumnType::PatientId);
        assert_eq!(currents(merged), vec!["F1-II:1", "II:2", "F3"]);
    }

    #[test]
    fn constant_column_fills_every_row() {
        let mut dialogs = ScriptedDialogs::new([DialogResponse::ConstantColumn {
            header: "disease".to_string(),
            value: "Marfan syndrome".to_string(),
        }]);
        let next = constant_column(&table(), 0, &mut dialogs).unwrap().unwrap();
        assert_eq!(next.columns[1].header.label(), "disease");
        assert_eq!(next.columns[1].len(), 3);
        assert!(next.validate().is_ok());
    }

    #[test]
    fn single_hpo_mapping_validates_states() {
        let column = Column::new("seizures", ["yes", "no", "", "3y", "?"]);
        let source = Table::new("t.csv", vec![column]).unwrap();
        let mapping = BTreeMap::from([
            ("yes".to_string(), "Observed".to_string()),
            ("no".to_string(), "excluded".to_string()),
            ("3y".to_string(), "P3Y".to_string()),
            ("?".to_string(), "maybe".to_string()),
        ]);
        let mut dialogs = ScriptedDialogs::new([DialogResponse::SingleHpoMapping {
            term: TermRef::new("HP:0001250", "Seizure"),
            value_to_state: mapping,
        }]);
        let next = single_hpo_term(&source, 0, &mut dialogs).unwrap().unwrap();
        let column = &next.columns[0];
        assert_eq!(column.header.hpo_terms.len(), 1);
        assert_eq!(currents(column), vec!["observed", "excluded", "na", "P3Y", ""]);
        assert_eq!(column.values[4].status(), CellStatus::Error);
    }

    struct Recording(Vec<String>);

    impl Backend for Recording {
        fn invoke(&mut self, _command: &str, args: &Value) -> EtlResult<Value> {
            let variant = args["variant"].as_str().unwrap_or_default().to_string();
            self.0.push(variant.clone());
            Ok(json!({ "variantKey": format!("key:{variant}") }))
        }
    }

    #[test]
    fn variants_are_validated_once_per_unique_value() {
        let column = Column::new("var", ["c.1A>G", "c.1A>G", ""]);
        let source = Table::new("t.csv", vec![column]).unwrap();
        let mut dialogs = ScriptedDialogs::new([DialogResponse::VariantContext {
            gene_symbol: "FBN1".to_string(),
            transcript: "NM_000138.5".to_string(),
        }]);
        let mut backend = Recording(Vec::new());
        let next = annotate_variants(&source, 0, &mut dialogs, &mut backend)
            .unwrap()
            .unwrap();
        assert_eq!(backend.0, vec!["c.1A>G"]);
        assert_eq!(currents(&next.columns[0]), vec!["key:c.1A>G", "key:c.1A>G", ""]);
    }

    #[test]
    fn reset_clears_hpo_metadata() {
        let mut column = Column::new("x", ["a"]).with_column_type(EtlColumnType::SingleHpoTerm);
        column.header.hpo_terms.push(TermRef::new("HP:1", "One"));
        let source = Table::new("t.csv", vec![column]).unwrap();
        let next = reset_to_raw(&source, 0).unwrap();
        assert_eq!(next.columns[0].column_type(), EtlColumnType::Raw);
        assert!(next.columns[0].header.hpo_terms.is_empty());
    }
}

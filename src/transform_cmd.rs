use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow};
use log::info;

use crate::{
    backend::OfflineBackend,
    cli::{EditArgs, TransformArgs, TransformsArgs},
    config::EtlConfig,
    dialog::{DialogResponse, ScriptedDialogs},
    model::EtlColumnType,
    session, table,
    transform::{self, TransformEngine, TransformOutcome, TransformType, engine},
};

pub fn load_dialog_script(path: Option<&Path>) -> Result<ScriptedDialogs> {
    let Some(path) = path else {
        return Ok(ScriptedDialogs::default());
    };
    let file = File::open(path).with_context(|| format!("Opening dialog script {path:?}"))?;
    let responses: Vec<DialogResponse> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Parsing dialog script {path:?}"))?;
    Ok(ScriptedDialogs::new(responses))
}

pub fn execute(args: &TransformArgs, config: &EtlConfig) -> Result<()> {
    let transform: TransformType = args.transform.parse()?;
    let mut store = session::open_store(&args.session)?;
    let index = session::resolve_column(store.snapshot()?.table(), &args.column)?;
    let matcher = session::load_matcher(args.terms.as_deref(), config)?;
    let mut dialogs = load_dialog_script(args.dialogs.as_deref())?;
    let mut backend = OfflineBackend;

    let outcome = {
        let mut engine = TransformEngine::new(&mut dialogs, &mut backend, &matcher)
            .with_mining_options(config.mining.clone());
        engine
            .apply(&mut store, index, transform)
            .with_context(|| format!("Applying {transform} to column {index}"))?
    };
    match outcome {
        TransformOutcome::Cancelled => {
            println!("{transform} cancelled; session unchanged");
        }
        TransformOutcome::Applied(snapshot) => {
            session::save_store(&store, &args.session)?;
            let table = snapshot.table();
            match table.columns.get(index) {
                Some(column) if transform != TransformType::DeleteColumn => {
                    let transformed = column.values.iter().filter(|c| c.is_transformed()).count();
                    println!(
                        "{transform}: '{}' is now {} ({transformed}/{} cell(s) transformed)",
                        column.header.label(),
                        column.column_type(),
                        column.len()
                    );
                }
                _ => println!("{transform}: table now has {} column(s)", table.column_count()),
            }
        }
    }
    Ok(())
}

pub fn execute_list(args: &TransformsArgs) -> Result<()> {
    let transforms = match &args.column_type {
        Some(raw) => {
            let column_type: EtlColumnType = raw.parse().map_err(|err: String| anyhow!(err))?;
            transform::allowed_transforms(column_type)
        }
        None => TransformType::ALL.to_vec(),
    };
    let headers = ["identifier", "label", "group", "result type"]
        .map(String::from)
        .to_vec();
    let rows: Vec<Vec<String>> = transforms
        .iter()
        .map(|t| {
            vec![
                t.identifier().to_string(),
                t.label().to_string(),
                t.category().label().to_string(),
                transform::resulting_column_type(*t)
                    .map(|ty| ty.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    table::print_table(&headers, &rows);
    info!("Listed {} transform(s)", rows.len());
    Ok(())
}

pub fn execute_edit(args: &EditArgs) -> Result<()> {
    let mut store = session::open_store(&args.session)?;
    let index = session::resolve_column(store.snapshot()?.table(), &args.column)?;
    let snapshot = engine::manual_edit(&mut store, index, args.row, &args.value)
        .with_context(|| format!("Editing row {} of column {index}", args.row))?;
    session::save_store(&store, &args.session)?;
    info!(
        "Row {} of column {index} set to {:?} (table version {})",
        args.row,
        args.value,
        snapshot.version()
    );
    Ok(())
}

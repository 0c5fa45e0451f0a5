use anyhow::Result;
use log::info;

use crate::{cli::ShowArgs, io_utils, model::CellStatus, session, table};

pub fn execute(args: &ShowArgs) -> Result<()> {
    let store = session::open_store(&args.session)?;
    let snapshot = store.snapshot()?;
    let table = snapshot.table();

    match &args.column {
        Some(selector) => {
            let index = session::resolve_column(table, selector)?;
            let column = table.column(index)?;
            let headers = ["row", "original", "current", "status", "error"]
                .map(String::from)
                .to_vec();
            let rows: Vec<Vec<String>> = column
                .values
                .iter()
                .take(args.rows)
                .enumerate()
                .map(|(row, cell)| {
                    vec![
                        row.to_string(),
                        cell.original().to_string(),
                        cell.current().to_string(),
                        status_label(cell.status()).to_string(),
                        cell.error().unwrap_or_default().to_string(),
                    ]
                })
                .collect();
            println!(
                "{} [{}] {} term(s)",
                column.header.label(),
                column.column_type(),
                column.header.hpo_terms.len()
            );
            table::print_table(&headers, &rows);
            let transformed = store.is_fully_transformed(index)?;
            println!(
                "{}",
                if transformed {
                    "all cells transformed"
                } else {
                    "some cells are not transformed"
                }
            );
        }
        None => {
            let (mut headers, rows) = io_utils::table_rows(table);
            for (header, column) in headers.iter_mut().zip(&table.columns) {
                if column.is_fully_transformed() {
                    header.push_str(" ✓");
                }
            }
            let rows: Vec<Vec<String>> = rows.into_iter().take(args.rows).collect();
            table::print_table(&headers, &rows);
        }
    }
    info!(
        "Displayed {} of {} row(s) from {:?}",
        args.rows.min(table.row_count()),
        table.row_count(),
        args.session
    );
    Ok(())
}

fn status_label(status: CellStatus) -> &'static str {
    match status {
        CellStatus::Raw => "raw",
        CellStatus::Transformed => "transformed",
        CellStatus::Error => "error",
        CellStatus::Ignored => "ignored",
    }
}

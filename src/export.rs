use anyhow::{Context, Result};
use log::info;

use crate::{cli::ExportArgs, io_utils, session};

pub fn execute(args: &ExportArgs) -> Result<()> {
    let store = session::open_store(&args.session)?;
    let snapshot = store.snapshot()?;
    let table = snapshot.table();
    let encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    io_utils::write_table(table, args.output.as_deref(), args.delimiter, encoding)
        .with_context(|| format!("Exporting {:?}", args.session))?;
    let pending = table
        .columns
        .iter()
        .filter(|c| !c.is_fully_transformed())
        .count();
    if pending > 0 {
        info!("{pending} column(s) still hold untransformed cells");
    }
    info!(
        "Exported {} row(s) x {} column(s) using {}",
        table.row_count(),
        table.column_count(),
        encoding.name()
    );
    Ok(())
}

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use log::info;
use serde::Serialize;

use crate::{
    cli::{PolishArgs, ReconcileArgs},
    config::EtlConfig,
    polish::{self, PolishSession, TextAnnotation},
    session,
};

fn write_json<T: Serialize>(value: &T, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, value).context("Writing JSON output")?;
            writer.flush()?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, value).context("Writing JSON output")?;
            writeln!(handle)?;
        }
    }
    Ok(())
}

pub fn execute_polish(args: &PolishArgs, config: &EtlConfig) -> Result<()> {
    let text = match (&args.text, &args.text_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => {
            fs::read_to_string(path).with_context(|| format!("Reading note {path:?}"))?
        }
        (None, None) => return Err(anyhow!("Either --text or --text-file is required")),
    };
    let index = session::require_matcher(args.terms.as_deref(), config)?;
    let session = PolishSession::from_text(&text, &index)?;
    info!(
        "Annotated note with {} hit(s)",
        session.hit_indices().len()
    );
    write_json(&session.segments(), args.output.as_deref())
}

pub fn execute_reconcile(args: &ReconcileArgs) -> Result<()> {
    let file = File::open(&args.input)
        .with_context(|| format!("Opening annotations {:?}", args.input))?;
    let hits: Vec<TextAnnotation> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Parsing annotations {:?}", args.input))?;
    let data = polish::finish(&hits).context("Reconciling annotations")?;
    write_json(&data, args.output.as_deref())
}

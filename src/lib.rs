pub mod age;
pub mod backend;
pub mod cli;
pub mod config;
pub mod dialog;
pub mod error;
pub mod export;
pub mod io_utils;
pub mod mine_cmd;
pub mod mining;
pub mod model;
pub mod ontology;
pub mod polish;
pub mod polish_cmd;
pub mod session;
pub mod show;
pub mod store;
pub mod table;
pub mod transform;
pub mod transform_cmd;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands},
    config::EtlConfig,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("phenoetl", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = EtlConfig::load_or_default(cli.config.as_deref())?;
    match cli.command {
        Commands::Load(args) => handle_load(&args),
        Commands::Show(args) => show::execute(&args),
        Commands::Transforms(args) => transform_cmd::execute_list(&args),
        Commands::Transform(args) => transform_cmd::execute(&args, &config),
        Commands::Edit(args) => transform_cmd::execute_edit(&args),
        Commands::Mine(args) => mine_cmd::execute(&args, &config),
        Commands::Terms(args) => mine_cmd::execute_terms(&args, &config),
        Commands::Reconcile(args) => polish_cmd::execute_reconcile(&args),
        Commands::Polish(args) => polish_cmd::execute_polish(&args, &config),
        Commands::CheckAge(args) => handle_check_age(&args),
        Commands::Export(args) => export::execute(&args),
    }
}

fn handle_load(args: &cli::LoadArgs) -> Result<()> {
    info!(
        "Loading '{}' ({:?} orientation)",
        args.input.display(),
        args.orientation
    );
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let table = io_utils::read_table(&args.input, args.delimiter, encoding, args.orientation)
        .with_context(|| format!("Reading {:?}", args.input))?;
    table
        .save(&args.session)
        .with_context(|| format!("Writing session to {:?}", args.session))?;
    info!(
        "Session with {} column(s) x {} row(s) written to {:?}",
        table.column_count(),
        table.row_count(),
        args.session
    );
    Ok(())
}

fn handle_check_age(args: &cli::CheckAgeArgs) -> Result<()> {
    let headers = ["value", "valid", "normalized"].map(String::from).to_vec();
    let rows: Vec<Vec<String>> = args
        .values
        .iter()
        .map(|value| {
            let normalized = if args.assume_years {
                age::parse_age_assume_years(value)
            } else {
                age::map_age(value)
            };
            vec![
                value.clone(),
                age::is_valid_age(value.trim()).to_string(),
                normalized.unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    table::print_table(&headers, &rows);
    Ok(())
}

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::io_utils::Orientation;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Curate clinical spreadsheets into typed HPO-ready tables",
    long_about = None
)]
pub struct Cli {
    /// Optional YAML settings (term list, mining delimiters)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import a CSV file into a new session file
    Load(LoadArgs),
    /// Print the session table, or the cells of one column
    Show(ShowArgs),
    /// List the transforms, optionally only those allowed for a column type
    Transforms(TransformsArgs),
    /// Apply one transform to one column
    Transform(TransformArgs),
    /// Override the current value of a single cell
    Edit(EditArgs),
    /// Mine HPO terms from a free-text column
    Mine(MineArgs),
    /// Look up terms by label, e.g. to fill an `addTerm` review step
    Terms(TermsArgs),
    /// Collapse polished text-mining hits into one entry per term
    Reconcile(ReconcileArgs),
    /// Find HPO labels in a free-text note and emit annotated segments
    Polish(PolishArgs),
    /// Validate and normalize age strings
    CheckAge(CheckAgeArgs),
    /// Write the current values of a session to CSV
    Export(ExportArgs),
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    /// Input CSV file (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Session file to create
    #[arg(short, long)]
    pub session: PathBuf,
    /// Whether headers run along the first row or down the first column
    #[arg(long, value_enum, default_value = "columns")]
    pub orientation: Orientation,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(short, long)]
    pub session: PathBuf,
    /// Show original value, current value, status and error for one column
    #[arg(short = 'c', long)]
    pub column: Option<String>,
    /// Number of rows to display
    #[arg(long, default_value_t = 20)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct TransformsArgs {
    /// Only list transforms allowed on this column type (e.g. `Ignore`)
    #[arg(long = "column-type")]
    pub column_type: Option<String>,
}

#[derive(Debug, Args)]
pub struct TransformArgs {
    #[arg(short, long)]
    pub session: PathBuf,
    /// Column index (0-based) or header
    #[arg(short = 'c', long)]
    pub column: String,
    /// Transform identifier (`TO_UPPERCASE`) or label (`To Uppercase`)
    #[arg(short = 't', long)]
    pub transform: String,
    /// JSON array of dialog responses, answered in order; missing answers cancel
    #[arg(long)]
    pub dialogs: Option<PathBuf>,
    /// Tab-separated `HP:id<TAB>label` list used by MULTIPLE_HPO_TERM
    #[arg(long)]
    pub terms: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct EditArgs {
    #[arg(short, long)]
    pub session: PathBuf,
    /// Column index (0-based) or header
    #[arg(short = 'c', long)]
    pub column: String,
    /// Row index (0-based)
    #[arg(short = 'r', long)]
    pub row: usize,
    /// New current value
    #[arg(long)]
    pub value: String,
}

#[derive(Debug, Args)]
pub struct MineArgs {
    #[arg(short, long)]
    pub session: PathBuf,
    /// Column index (0-based) or header
    #[arg(short = 'c', long)]
    pub column: String,
    /// Tab-separated `HP:id<TAB>label` list
    #[arg(long)]
    pub terms: Option<PathBuf>,
    /// JSON review script: `{"concepts": [...], "cells": [...]}`
    #[arg(long)]
    pub review: Option<PathBuf>,
    /// Print the mined concepts and stop without changing the session
    #[arg(long)]
    pub list: bool,
}

#[derive(Debug, Args)]
pub struct TermsArgs {
    /// Label prefix or fragment
    pub query: String,
    /// Tab-separated `HP:id<TAB>label` list
    #[arg(long)]
    pub terms: Option<PathBuf>,
    /// Maximum number of terms to print
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// JSON array of annotated text segments
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output JSON file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct PolishArgs {
    /// Note to annotate
    #[arg(long, conflicts_with = "text_file", required_unless_present = "text_file")]
    pub text: Option<String>,
    /// File holding the note to annotate
    #[arg(long = "text-file")]
    pub text_file: Option<PathBuf>,
    /// Tab-separated `HP:id<TAB>label` list
    #[arg(long)]
    pub terms: Option<PathBuf>,
    /// Output JSON file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct CheckAgeArgs {
    /// Age strings to check
    #[arg(required = true)]
    pub values: Vec<String>,
    /// Read bare numbers as years
    #[arg(long = "assume-years")]
    pub assume_years: bool,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(short, long)]
    pub session: PathBuf,
    /// Output CSV file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding for the output file/stdout (defaults to utf-8)
    #[arg(long = "output-encoding")]
    pub output_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

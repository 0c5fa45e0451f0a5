//! CSV import and export of session tables.
//!
//! - **Delimiters**: `.tsv` means tab, everything else comma, unless given.
//! - **Encoding**: input is decoded and output transcoded with `encoding_rs`,
//!   defaulting to UTF-8.
//! - **Orientation**: spreadsheets come either column-based (first row holds
//!   the headers) or row-based (first field of every row is the header).
//! - **stdin/stdout**: the `-` path reads standard input or writes standard
//!   output.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use clap::ValueEnum;
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};
use log::info;

use crate::model::{Column, Table};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Orientation {
    /// Headers in the first row.
    #[default]
    Columns,
    /// Headers in the first field of each row.
    Rows,
}

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

fn delimiter_for_extension(path: &Path) -> Option<u8> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => Some(DEFAULT_TSV_DELIMITER),
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Some(DEFAULT_CSV_DELIMITER),
        _ => None,
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided
        .or_else(|| delimiter_for_extension(path))
        .unwrap_or(DEFAULT_CSV_DELIMITER)
}

pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>) -> u8 {
    provided
        .or_else(|| path.and_then(delimiter_for_extension))
        .unwrap_or(DEFAULT_CSV_DELIMITER)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(std::io::stdin().lock())
    } else {
        Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Opening input file {path:?}"))?,
        ))
    };
    Ok(csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(reader))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        bail!("Failed to decode text with encoding {}", encoding.name());
    }
    Ok(text.into_owned())
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Builds a table from decoded rows. Short rows are padded with empty cells;
/// a row longer than the header row is an error.
pub fn table_from_records(
    file_name: &str,
    records: Vec<Vec<String>>,
    orientation: Orientation,
) -> Result<Table> {
    let columns = match orientation {
        Orientation::Columns => {
            let mut rows = records.into_iter();
            let headers = rows.next().ok_or_else(|| anyhow!("{file_name} is empty"))?;
            let mut values: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
            for (idx, row) in rows.enumerate() {
                if row.len() > headers.len() {
                    bail!(
                        "Row {} of {file_name} has {} field(s) but there are only {} header(s)",
                        idx + 2,
                        row.len(),
                        headers.len()
                    );
                }
                let mut fields = row.into_iter();
                for column in values.iter_mut() {
                    column.push(fields.next().unwrap_or_default());
                }
            }
            headers
                .into_iter()
                .zip(values)
                .map(|(header, cells)| Column::new(header, cells))
                .collect::<Vec<_>>()
        }
        Orientation::Rows => {
            let width = records.iter().map(|r| r.len().saturating_sub(1)).max().unwrap_or(0);
            records
                .into_iter()
                .filter(|r| !r.is_empty())
                .map(|row| {
                    let mut fields = row.into_iter();
                    let header = fields.next().unwrap_or_default();
                    let mut cells: Vec<String> = fields.collect();
                    cells.resize(width, String::new());
                    Column::new(header, cells)
                })
                .collect()
        }
    };
    Table::new(file_name, columns).with_context(|| format!("Building table from {file_name}"))
}

pub fn read_table(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
    orientation: Orientation,
) -> Result<Table> {
    let delimiter = resolve_input_delimiter(path, delimiter);
    let mut reader = open_csv_reader_from_path(path, delimiter)?;
    let mut records = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading line {}", idx + 1))?;
        records.push(decode_record(&record, encoding)?);
    }
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("stdin")
        .to_string();
    let table = table_from_records(&file_name, records, orientation)?;
    info!(
        "Loaded {} column(s) x {} row(s) from {path:?}",
        table.column_count(),
        table.row_count()
    );
    Ok(table)
}

/// Header labels followed by the current value of every cell.
pub fn table_rows(table: &Table) -> (Vec<String>, Vec<Vec<String>>) {
    let headers = table
        .columns
        .iter()
        .map(|c| c.header.label().to_string())
        .collect();
    let rows = (0..table.row_count())
        .map(|row| {
            table
                .columns
                .iter()
                .map(|c| c.values[row].current().to_string())
                .collect()
        })
        .collect();
    (headers, rows)
}

/// Writes current values. Non-UTF-8 encodings are applied to the finished
/// CSV text in one pass.
pub fn write_table(
    table: &Table,
    path: Option<&Path>,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<()> {
    let delimiter = resolve_output_delimiter(path, delimiter);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true)
        .from_writer(Vec::new());
    let (headers, rows) = table_rows(table);
    writer.write_record(&headers)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    let utf8 = writer
        .into_inner()
        .map_err(|err| anyhow!("Flushing CSV output: {err}"))?;
    let bytes = if encoding == UTF_8 {
        utf8
    } else {
        let text = String::from_utf8(utf8).context("CSV output is not valid UTF-8")?;
        let (encoded, _, had_errors) = encoding.encode(&text);
        if had_errors {
            bail!("Failed to encode output using {}", encoding.name());
        }
        encoded.into_owned()
    };

    let mut sink: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    sink.write_all(&bytes)?;
    sink.flush()?;
    Ok(())
}

//! CSV reading and writing helpers.
//!
//! - **Delimiter resolution**: `.tsv` inputs default to tab, everything else
//!   to comma, with a manual override.
//! - **Encoding**: input bytes are decoded with `encoding_rs` (UTF-8 unless
//!   `--input-encoding` names another label). Output is always UTF-8.
//! - **Loading**: [`read_table`] reads a whole file, infers one kind per
//!   column, and returns a typed [`Table`].
//! - **stdout**: an output path of `-` (or none) writes to standard output.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

use crate::{
    data::parse_typed_value,
    dtype::{ColumnKind, infer_kinds},
    frame::Table,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

/// Rows sampled when choosing column kinds; 0 scans the whole file.
pub const KIND_SAMPLE_ROWS: usize = 0;

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

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn resolve_output_delimiter(path: Option<&Path>) -> u8 {
    match path.and_then(|p| p.extension()).and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader)
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    Ok(csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true)
        .from_writer(writer))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Reads a delimited file into a typed table.
pub fn read_table(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Table> {
    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    read_table_from(BufReader::new(file), delimiter, encoding)
        .with_context(|| format!("Reading {path:?}"))
}

pub fn read_table_from<R: Read>(
    reader: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Table> {
    let mut reader = open_csv_reader(reader, delimiter);
    let headers = decode_record(reader.byte_headers()?, encoding)?;

    let mut raw_rows = Vec::new();
    for (row_idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", row_idx + 2))?;
        raw_rows.push(decode_record(&record, encoding)?);
    }

    let kinds = infer_kinds(headers.len(), &raw_rows, KIND_SAMPLE_ROWS);
    let mut table = Table::with_headers(headers)?;
    for (row_idx, raw) in raw_rows.into_iter().enumerate() {
        let typed = raw
            .iter()
            .zip(&kinds)
            .map(|(value, kind)| {
                parse_typed_value(value, *kind)
                    .or_else(|_| parse_typed_value(value, ColumnKind::String))
            })
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Parsing row {}", row_idx + 2))?;
        table.push_row(typed)?;
    }
    Ok(table)
}

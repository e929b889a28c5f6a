// Primitives for reading CSV files.

use csv::ByteRecord;

use crate::convkml::io_common::{assemble_table, simplify_file_name};
use crate::convkml::*;

pub fn read_csv_table(path: &str, delimiter: u8, has_header: bool) -> ConvResult<Table> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let mut rows: Vec<(usize, Vec<Cell>)> = Vec::new();
    for (idx, record_r) in rdr.into_byte_records().enumerate() {
        let record = record_r.context(CsvLineParseSnafu {
            path,
            lineno: idx + 1,
        })?;
        // The reader skips empty lines, the position keeps the line of the file (1-based).
        let lineno = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);
        let cells = record_cells(&record);
        debug!("read_csv_table: lineno: {:?} row: {:?}", lineno, &cells);
        rows.push((lineno, cells));
    }
    assemble_table(rows, has_header).context(EmptyTableSnafu {
        path: simplify_file_name(path),
    })
}

fn record_cells(record: &ByteRecord) -> Vec<Cell> {
    record
        .iter()
        .map(|field| match decode_field(field) {
            s if s.is_empty() => Cell::Empty,
            s => Cell::Text(s),
        })
        .collect()
}

// Spreadsheets exported on Windows are often in Latin-1.
fn decode_field(field: &[u8]) -> String {
    match std::str::from_utf8(field) {
        Ok(s) => s.to_string(),
        Err(_) => field.iter().map(|b| *b as char).collect(),
    }
}

// Primitives for reading Excel and OpenDocument workbooks.

use calamine::{open_workbook_auto, DataType, Range, Reader};

use crate::convkml::io_common::{assemble_table, simplify_file_name};
use crate::convkml::*;

pub fn read_excel_table(path: &str, worksheet: Option<&str>, has_header: bool) -> ConvResult<Table> {
    let wrange = get_range(path, worksheet)?;
    // The range does not always start at the first line of the sheet.
    let first_line = wrange.start().map(|(r, _)| r as usize).unwrap_or(0) + 1;
    debug!(
        "read_excel_table: path: {:?} first line: {} size: {:?}",
        path,
        first_line,
        wrange.get_size()
    );

    let rows: Vec<(usize, Vec<Cell>)> = wrange
        .rows()
        .enumerate()
        .map(|(idx, row)| (first_line + idx, row.iter().map(cell_from_data).collect()))
        .collect();
    assemble_table(rows, has_header).context(EmptyTableSnafu {
        path: simplify_file_name(path),
    })
}

fn get_range(path: &str, worksheet: Option<&str>) -> ConvResult<Range<DataType>> {
    let mut workbook = open_workbook_auto(path).context(OpeningExcelSnafu { path })?;

    match worksheet {
        // A worksheet name was provided, use it.
        Some(name) => workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu { name, path })?
            .context(OpeningExcelSnafu { path }),
        None => {
            let names = workbook.sheet_names().to_owned();
            debug!("get_range: path: {:?} worksheets: {:?}", path, names);
            if names.len() > 1 {
                info!(
                    "{} has {} worksheets, reading the first one ({:?})",
                    path,
                    names.len(),
                    names[0]
                );
            }
            workbook
                .worksheet_range_at(0)
                .context(EmptyTableSnafu { path })?
                .context(OpeningExcelSnafu { path })
        }
    }
}

#[allow(unreachable_patterns)]
fn cell_from_data(elt: &DataType) -> Cell {
    match elt {
        DataType::Empty => Cell::Empty,
        DataType::String(s) => Cell::Text(s.clone()),
        DataType::Float(f) => Cell::Number(*f),
        DataType::Int(i) => Cell::Number(*i as f64),
        DataType::Bool(b) => Cell::Text(b.to_string()),
        // Error cells (#N/A, #REF! ...) carry no usable value.
        DataType::Error(_) => Cell::Empty,
        x => Cell::Text(x.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells() {
        assert_eq!(cell_from_data(&DataType::Empty), Cell::Empty);
        assert_eq!(cell_from_data(&DataType::Int(901234)), Cell::Number(901234.0));
        assert_eq!(cell_from_data(&DataType::Float(0.45)), Cell::Number(0.45));
        assert_eq!(
            cell_from_data(&DataType::String("Ilhéus".to_string())),
            Cell::Text("Ilhéus".to_string())
        );
        assert_eq!(cell_from_data(&DataType::Bool(true)), Cell::Text("true".to_string()));
    }

    #[test]
    fn missing_workbook() {
        let res = read_excel_table("/nonexistent/convenios.xlsx", None, true);
        assert!(matches!(res, Err(ConvError::OpeningExcel { .. })));
    }
}

use std::path::Path;

use grant_geocoding::{Cell, SourceRow};

/// A table read from the input, with blank rows already dropped.
#[derive(PartialEq, Debug, Clone)]
pub struct Table {
    /// The labels of the header row, when the input has one.
    pub header: Option<Vec<String>>,
    pub rows: Vec<SourceRow>,
}

impl Table {
    /// The number of columns of the widest row (or of the header).
    pub fn width(&self) -> usize {
        let header_width = self.header.as_ref().map(|h| h.len()).unwrap_or(0);
        self.rows
            .iter()
            .map(|r| r.cells.len())
            .max()
            .unwrap_or(0)
            .max(header_width)
    }
}

/// Splits the raw rows of a sheet into the header and the data rows.
///
/// `rows` holds the 1-based line number of each row. Blank rows are dropped; the
/// header is the first non-blank row.
pub fn assemble_table(rows: Vec<(usize, Vec<Cell>)>, has_header: bool) -> Option<Table> {
    let mut iter = rows
        .into_iter()
        .filter(|(_, cells)| !cells.iter().all(|c| c.is_blank()));
    let header = if has_header {
        let (_, cells) = iter.next()?;
        Some(cells.iter().map(|c| c.as_text().trim().to_string()).collect())
    } else {
        None
    };
    let rows: Vec<SourceRow> = iter
        .map(|(line, cells)| SourceRow { line, cells })
        .collect();
    if rows.is_empty() && header.is_none() {
        return None;
    }
    Some(Table { header, rows })
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    #[test]
    fn blank_rows_keep_line_numbers() {
        let table = assemble_table(
            vec![
                (1, vec![Cell::Empty, Cell::Empty]),
                (2, vec![text(" Convênio "), text("Município"), text("UF")]),
                (3, vec![text("1"), text("Natal"), text("RN")]),
                (4, vec![text(" "), Cell::Empty]),
                (5, vec![text("2"), text("Mossoró")]),
            ],
            true,
        )
        .unwrap();
        assert_eq!(
            table.header,
            Some(vec![
                "Convênio".to_string(),
                "Município".to_string(),
                "UF".to_string()
            ])
        );
        let lines: Vec<usize> = table.rows.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![3, 5]);
        assert_eq!(table.width(), 3);
    }

    #[test]
    fn empty_sheets() {
        assert_eq!(assemble_table(vec![], true), None);
        assert_eq!(assemble_table(vec![(1, vec![Cell::Empty])], false), None);
        let header_only = assemble_table(vec![(1, vec![text("UF")])], true).unwrap();
        assert!(header_only.rows.is_empty());
        assert_eq!(simplify_file_name("/data/convenios.xlsx"), "convenios.xlsx");
    }
}

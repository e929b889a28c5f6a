pub use crate::config::*;

/// A builder for turning table rows into grant records.
///
/// ```
/// use grant_geocoding::builder::Builder;
/// use grant_geocoding::{Cell, ColumnMapping};
///
/// let mapping = ColumnMapping { agreement: 0, municipality: 1, state: 2, completion: None };
/// let mut builder = Builder::new(&mapping);
///
/// builder.add_row(2, &[
///     Cell::Number(901234.0),
///     Cell::Text("Prefeitura de Ilhéus".to_string()),
///     Cell::Text("ba".to_string()),
/// ]);
///
/// let records = builder.records();
/// assert_eq!(records[0].agreement_id, "901234");
/// assert_eq!(records[0].state_code, "BA");
/// assert_eq!(records[0].row_number, 2);
/// ```
pub struct Builder {
    pub(crate) _mapping: ColumnMapping,
    pub(crate) _records: Vec<GrantRecord>,
}

impl Builder {
    pub fn new(mapping: &ColumnMapping) -> Builder {
        Builder {
            _mapping: mapping.clone(),
            _records: Vec::new(),
        }
    }

    /// Adds a data row, found at the given line of the source.
    /// Missing trailing cells are read as empty.
    pub fn add_row(&mut self, row_number: usize, row: &[Cell]) {
        let cell = |idx: usize| row.get(idx).cloned().unwrap_or(Cell::Empty);

        let municipality_raw = match cell(self._mapping.municipality) {
            Cell::Empty => None,
            c => Some(c.as_text()),
        };
        let record = GrantRecord {
            row_number,
            agreement_id: cell(self._mapping.agreement).as_text().trim().to_string(),
            municipality_raw,
            state_code: cell(self._mapping.state).as_text().trim().to_uppercase(),
            completion_raw: self._mapping.completion.map(cell),
        };
        self._records.push(record);
    }

    pub fn add_rows(&mut self, rows: &[SourceRow]) {
        for row in rows {
            self.add_row(row.line, &row.cells);
        }
    }

    pub fn records(self) -> Vec<GrantRecord> {
        self._records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_rows_and_blank_cells() {
        let mapping = ColumnMapping {
            agreement: 0,
            municipality: 1,
            state: 2,
            completion: Some(3),
        };
        let mut builder = Builder::new(&mapping);
        builder.add_rows(&[
            SourceRow {
                line: 1,
                cells: vec![Cell::Text(" 77 ".to_string()), Cell::Empty, Cell::Text("pe".to_string())],
            },
            SourceRow {
                line: 3,
                cells: vec![
                    Cell::Text("78".to_string()),
                    Cell::Text("".to_string()),
                    Cell::Text("PE".to_string()),
                    Cell::Number(0.5),
                ],
            },
        ]);
        let records = builder.records();
        assert_eq!(
            records[0],
            GrantRecord {
                row_number: 1,
                agreement_id: "77".to_string(),
                municipality_raw: None,
                state_code: "PE".to_string(),
                completion_raw: Some(Cell::Empty),
            }
        );
        assert_eq!(records[1].row_number, 3);
        assert_eq!(records[1].municipality_raw, Some("".to_string()));
        assert_eq!(records[1].completion_raw, Some(Cell::Number(0.5)));
    }
}

//! Finding which column of a table holds which field.
//!
//! Two policies are available:
//! - with a header row, the header labels are matched against regular expressions,
//! - without a header row, the shape of the cells in the first data row is inspected.
//!
//! The positions found without a header row are only suggestions: they must be
//! confirmed by the operator before they are used.

use log::{debug, info};
use regex::{Regex, RegexBuilder};

use crate::config::*;

/// A value per field. Used both for detected positions and operator selections.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FieldColumns<T> {
    pub agreement: Option<T>,
    pub municipality: Option<T>,
    pub state: Option<T>,
    pub completion: Option<T>,
}

impl<T> Default for FieldColumns<T> {
    fn default() -> Self {
        FieldColumns {
            agreement: None,
            municipality: None,
            state: None,
            completion: None,
        }
    }
}

impl<T> FieldColumns<T> {
    pub fn get(&self, field: GrantField) -> Option<&T> {
        match field {
            GrantField::Agreement => self.agreement.as_ref(),
            GrantField::Municipality => self.municipality.as_ref(),
            GrantField::State => self.state.as_ref(),
            GrantField::Completion => self.completion.as_ref(),
        }
    }

    pub fn set(&mut self, field: GrantField, value: T) {
        let slot = match field {
            GrantField::Agreement => &mut self.agreement,
            GrantField::Municipality => &mut self.municipality,
            GrantField::State => &mut self.state,
            GrantField::Completion => &mut self.completion,
        };
        *slot = Some(value);
    }

    pub fn is_set(&self, field: GrantField) -> bool {
        self.get(field).is_some()
    }
}

impl FieldColumns<usize> {
    fn claimed(&self) -> Vec<usize> {
        GrantField::ALL
            .iter()
            .filter_map(|f| self.get(*f).cloned())
            .collect()
    }

    fn count(&self) -> usize {
        self.claimed().len()
    }

    /// Human-readable summary, with 1-based positions.
    pub fn describe(&self) -> String {
        GrantField::ALL
            .iter()
            .map(|f| match self.get(*f) {
                Some(idx) => format!("{}={}", f.name(), idx + 1),
                None => format!("{}=?", f.name()),
            })
            .collect::<Vec<String>>()
            .join(", ")
    }
}

/// The header patterns for each field, in order of evaluation.
#[derive(Debug, Clone)]
pub struct HeaderPatterns {
    fields: Vec<(GrantField, Vec<Regex>)>,
}

impl HeaderPatterns {
    pub const AGREEMENT: [&'static str; 4] = ["conv[êe]nio", r"\bn[ºo°]\b", "n[úu]mero", r"\bid\b"];
    pub const MUNICIPALITY: [&'static str; 3] = ["munic[íi]pio", "cidade", "localidade"];
    pub const STATE: [&'static str; 3] = [r"\buf\b", "estado", "sigla"];
    pub const COMPLETION: [&'static str; 5] = [
        "percentual",
        "%",
        "executad[oa]",
        "execu[çc][ãa]o",
        "f[íi]sico",
    ];

    /// The patterns used for Brazilian grant spreadsheets.
    pub fn standard() -> Result<HeaderPatterns, ColumnError> {
        let mut res = HeaderPatterns { fields: Vec::new() };
        res.set_patterns(GrantField::Agreement, &Self::AGREEMENT)?;
        res.set_patterns(GrantField::Municipality, &Self::MUNICIPALITY)?;
        res.set_patterns(GrantField::State, &Self::STATE)?;
        res.set_patterns(GrantField::Completion, &Self::COMPLETION)?;
        Ok(res)
    }

    /// Replaces the patterns of one field. Matching is case-insensitive.
    pub fn set_patterns<S: AsRef<str>>(
        &mut self,
        field: GrantField,
        patterns: &[S],
    ) -> Result<(), ColumnError> {
        let mut compiled: Vec<Regex> = Vec::new();
        for p in patterns {
            let re = RegexBuilder::new(p.as_ref())
                .case_insensitive(true)
                .build()
                .map_err(|e| ColumnError::InvalidPattern(format!("{}: {}", p.as_ref(), e)))?;
            compiled.push(re);
        }
        match self.fields.iter_mut().find(|(f, _)| *f == field) {
            Some(entry) => entry.1 = compiled,
            None => self.fields.push((field, compiled)),
        }
        Ok(())
    }

    fn matches(&self, field: GrantField, label: &str) -> bool {
        self.fields
            .iter()
            .filter(|(f, _)| *f == field)
            .flat_map(|(_, res)| res.iter())
            .any(|re| re.is_match(label))
    }
}

/// Fills the fields not yet known from the header labels.
///
/// For each field (agreement, municipality, state, completion), the first label matching
/// any of its patterns wins. A column already taken by another field is skipped.
pub fn detect_from_header(
    header: &[String],
    patterns: &HeaderPatterns,
    known: &FieldColumns<usize>,
) -> FieldColumns<usize> {
    let mut res = known.clone();
    for field in GrantField::ALL {
        if res.is_set(field) {
            continue;
        }
        let claimed = res.claimed();
        let found = header
            .iter()
            .enumerate()
            .filter(|(idx, _)| !claimed.contains(idx))
            .find(|(_, label)| patterns.matches(field, label.trim()));
        if let Some((idx, label)) = found {
            debug!(
                "detect_from_header: field {} -> column {} ({:?})",
                field.name(),
                idx + 1,
                label
            );
            res.set(field, idx);
        }
    }
    res
}

/// Suggests positions for the fields not yet known, from the cells of the first data row.
///
/// Each cell is tested in this order: state code, completion, agreement number,
/// municipality. The first test that passes for a field not yet assigned wins.
pub fn detect_from_content(first_row: &[Cell], known: &FieldColumns<usize>) -> FieldColumns<usize> {
    let mut res = known.clone();
    let claimed = known.claimed();
    for (idx, cell) in first_row.iter().enumerate() {
        if claimed.contains(&idx) {
            continue;
        }
        let text = cell.as_text();
        let text = text.trim();
        let field = if is_state_code(text) && !res.is_set(GrantField::State) {
            Some(GrantField::State)
        } else if looks_like_completion(cell, text) && !res.is_set(GrantField::Completion) {
            Some(GrantField::Completion)
        } else if looks_like_agreement(text) && !res.is_set(GrantField::Agreement) {
            Some(GrantField::Agreement)
        } else if parse_number(text).is_none()
            && text.chars().count() > 2
            && !res.is_set(GrantField::Municipality)
        {
            Some(GrantField::Municipality)
        } else {
            None
        };
        if let Some(f) = field {
            debug!(
                "detect_from_content: cell {} {:?} -> {}",
                idx + 1,
                text,
                f.name()
            );
            res.set(f, idx);
        }
    }
    res
}

fn is_state_code(text: &str) -> bool {
    text.chars().count() == 2 && text.chars().all(|c| c.is_alphabetic())
}

fn looks_like_completion(cell: &Cell, text: &str) -> bool {
    if text.contains('%') {
        return true;
    }
    let value = match cell {
        Cell::Number(f) => Some(*f),
        _ => parse_number(text),
    };
    matches!(value, Some(v) if (0.0..=100.0).contains(&v))
}

fn looks_like_agreement(text: &str) -> bool {
    text.chars().count() > 4 && text.chars().all(|c| c.is_ascii_digit())
}

fn parse_number(text: &str) -> Option<f64> {
    text.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// What is known about a table before its rows are processed.
#[derive(PartialEq, Debug, Clone)]
pub struct TableShape {
    /// The labels of the header row, if the table has one.
    pub header: Option<Vec<String>>,
    /// The first data row, used when there is no header.
    pub first_row: Option<Vec<Cell>>,
    /// The number of columns.
    pub width: usize,
}

/// Turns the operator selections into positions.
pub fn resolve_selections(
    selections: &FieldColumns<ColumnSelector>,
    shape: &TableShape,
) -> Result<FieldColumns<usize>, ColumnError> {
    let mut res: FieldColumns<usize> = FieldColumns::default();
    for field in GrantField::ALL {
        let idx = match selections.get(field) {
            None => continue,
            Some(ColumnSelector::Index(idx)) => *idx,
            Some(ColumnSelector::Header(label)) => {
                let header = shape
                    .header
                    .as_ref()
                    .ok_or_else(|| ColumnError::NoHeaderRow(label.clone()))?;
                let wanted = label.trim().to_lowercase();
                header
                    .iter()
                    .position(|h| h.trim().to_lowercase() == wanted)
                    .ok_or_else(|| ColumnError::HeaderNotFound(label.clone()))?
            }
        };
        if idx >= shape.width {
            return Err(ColumnError::IndexOutOfRange {
                index: idx,
                width: shape.width,
            });
        }
        res.set(field, idx);
    }
    Ok(res)
}

/// Builds the column mapping of a table.
///
/// Operator selections always win. With a header row, the remaining fields are found
/// with the header patterns. Without one, the content-shape suggestions are only applied
/// when `accept_suggestions` is set. The completion column is dropped when
/// `with_completion` is false.
pub fn map_columns(
    shape: &TableShape,
    selections: &FieldColumns<ColumnSelector>,
    patterns: &HeaderPatterns,
    accept_suggestions: bool,
    with_completion: bool,
) -> Result<ColumnMapping, ColumnError> {
    let mut explicit = resolve_selections(selections, shape)?;
    if !with_completion {
        explicit.completion = None;
    }

    let mut found = match (&shape.header, &shape.first_row) {
        (Some(header), _) => detect_from_header(header, patterns, &explicit),
        (None, Some(first_row)) => {
            let mut suggested = detect_from_content(first_row, &explicit);
            if !with_completion {
                suggested.completion = None;
            }
            if suggested.count() > explicit.count() {
                info!("map_columns: suggested columns: {}", suggested.describe());
                if !accept_suggestions {
                    return Err(ColumnError::Unconfirmed(suggested.describe()));
                }
                suggested
            } else {
                explicit
            }
        }
        (None, None) => explicit,
    };
    if !with_completion {
        found.completion = None;
    }

    let missing: Vec<GrantField> = GrantField::ALL
        .iter()
        .filter(|f| f.is_mandatory() && !found.is_set(**f))
        .cloned()
        .collect();
    match (found.agreement, found.municipality, found.state) {
        (Some(agreement), Some(municipality), Some(state)) => {
            let mapping = ColumnMapping {
                agreement,
                municipality,
                state,
                completion: found.completion,
            };
            info!("map_columns: using columns {}", found.describe());
            Ok(mapping)
        }
        _ => Err(ColumnError::Unresolved(missing)),
    }
}

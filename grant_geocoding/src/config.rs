// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// A cell of the source table, as handed over by the readers.
///
/// Spreadsheets distinguish numbers from text, CSV files only carry text.
#[derive(PartialEq, Debug, Clone)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl Cell {
    /// The string form of the cell, as an operator would read it.
    ///
    /// Integral numbers are printed without a fractional part, so that an
    /// agreement number stored as a float in Excel reads `123456`.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(s) => s.clone(),
            Cell::Number(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
            Cell::Number(f) => f.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

/// A row of the source table.
#[derive(PartialEq, Debug, Clone)]
pub struct SourceRow {
    /// The line number in the source table (1-based, header included).
    pub line: usize,
    pub cells: Vec<Cell>,
}

/// One grant row, after the columns have been resolved.
#[derive(PartialEq, Debug, Clone)]
pub struct GrantRecord {
    /// The line number in the source table (1-based, header included).
    pub row_number: usize,
    pub agreement_id: String,
    /// None when the cell was missing altogether.
    pub municipality_raw: Option<String>,
    pub state_code: String,
    pub completion_raw: Option<Cell>,
}

/// The fields the detector needs to find in a table.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum GrantField {
    Agreement,
    Municipality,
    State,
    Completion,
}

impl GrantField {
    pub const ALL: [GrantField; 4] = [
        GrantField::Agreement,
        GrantField::Municipality,
        GrantField::State,
        GrantField::Completion,
    ];

    pub fn is_mandatory(&self) -> bool {
        !matches!(self, GrantField::Completion)
    }

    pub fn name(&self) -> &'static str {
        match self {
            GrantField::Agreement => "agreement",
            GrantField::Municipality => "municipality",
            GrantField::State => "state",
            GrantField::Completion => "completion",
        }
    }
}

/// The resolved position (0-based) of each field in the table.
///
/// Invariant: all the mandatory fields are set before any row is processed.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnMapping {
    pub agreement: usize,
    pub municipality: usize,
    pub state: usize,
    pub completion: Option<usize>,
}

/// How a column was selected by the operator.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ColumnSelector {
    /// 0-based position in the row.
    Index(usize),
    /// Label of the header row.
    Header(String),
}

/// How much boilerplate the normalizer removes.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Strictness {
    /// Administrative prefixes only.
    Basic,
    /// Also parenthetical notes and rural noise tokens (GLEBA, LOTE, ...).
    Strict,
}

#[derive(PartialEq, Debug, Clone)]
pub struct RunOptions {
    pub strictness: Strictness,
    /// Redirect state-level grants to the state capital.
    pub state_capital_fallback: bool,
    /// Use the completion column (when mapped) to pick marker colours.
    pub completion_status: bool,
    /// Upper-case state codes to keep. Empty keeps all the rows.
    pub state_filter: Vec<String>,
}

impl RunOptions {
    pub const DEFAULT_OPTIONS: RunOptions = RunOptions {
        strictness: Strictness::Basic,
        state_capital_fallback: true,
        completion_status: true,
        state_filter: Vec::new(),
    };
}

// ******** Geocoding data structures *********

#[derive(PartialEq, Debug, Clone)]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub display_address: Option<String>,
}

/// The outcome of resolving one query, as stored in the run cache.
#[derive(PartialEq, Debug, Clone)]
pub enum Lookup {
    Found(GeocodeResult),
    NotFound,
    /// All the attempts failed. The message is the last error seen.
    Failed(String),
}

/// Errors a geocoding backend may raise for a single request.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum LookupError {
    /// Timeouts, connection resets, throttling: worth trying again.
    Transient(String),
    /// The backend refused the request (bad key, blocked client...).
    Rejected(String),
}

impl Error for LookupError {}

impl Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupError::Transient(msg) => write!(f, "transient lookup error: {}", msg),
            LookupError::Rejected(msg) => write!(f, "lookup rejected: {}", msg),
        }
    }
}

/// Errors raised while resolving the columns of a table.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ColumnError {
    /// Mandatory fields that neither detection nor the operator resolved.
    Unresolved(Vec<GrantField>),
    /// A header label was selected but the table has no such header.
    HeaderNotFound(String),
    /// A header label was selected but the table has no header row.
    NoHeaderRow(String),
    /// A positional selection beyond the width of the table.
    IndexOutOfRange { index: usize, width: usize },
    /// Positions guessed without a header row, waiting for the operator to accept them.
    Unconfirmed(String),
    InvalidPattern(String),
}

impl Error for ColumnError {}

impl Display for ColumnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColumnError::Unresolved(fields) => {
                let names: Vec<&str> = fields.iter().map(|fd| fd.name()).collect();
                write!(
                    f,
                    "could not determine the column(s) for: {} (select them explicitly)",
                    names.join(", ")
                )
            }
            ColumnError::HeaderNotFound(h) => write!(f, "no column with header {:?}", h),
            ColumnError::NoHeaderRow(h) => {
                write!(f, "column {:?} selected by header, but the table has no header row", h)
            }
            ColumnError::IndexOutOfRange { index, width } => write!(
                f,
                "column {} selected, but the table only has {} column(s)",
                index + 1,
                width
            ),
            ColumnError::Unconfirmed(suggested) => write!(
                f,
                "the table has no header row; suggested columns: {} (accept them or select the columns explicitly)",
                suggested
            ),
            ColumnError::InvalidPattern(msg) => write!(f, "invalid header pattern {}", msg),
        }
    }
}

// ******** Output data structures *********

/// The icon colours available for the markers.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, PartialOrd, Ord)]
pub enum MarkerStyle {
    Blue,
    Yellow,
    Red,
    White,
}

impl MarkerStyle {
    pub const ALL: [MarkerStyle; 4] = [
        MarkerStyle::Blue,
        MarkerStyle::Yellow,
        MarkerStyle::Red,
        MarkerStyle::White,
    ];

    /// Identifier of the shared style in the map document.
    pub fn id(&self) -> &'static str {
        match self {
            MarkerStyle::Blue => "marker-blue",
            MarkerStyle::Yellow => "marker-yellow",
            MarkerStyle::Red => "marker-red",
            MarkerStyle::White => "marker-white",
        }
    }

    pub fn icon_href(&self) -> &'static str {
        match self {
            MarkerStyle::Blue => "http://maps.google.com/mapfiles/kml/paddle/blu-circle.png",
            MarkerStyle::Yellow => "http://maps.google.com/mapfiles/kml/paddle/ylw-circle.png",
            MarkerStyle::Red => "http://maps.google.com/mapfiles/kml/paddle/red-circle.png",
            MarkerStyle::White => "http://maps.google.com/mapfiles/kml/paddle/wht-circle.png",
        }
    }
}

/// The content of the description balloon of a marker.
#[derive(PartialEq, Debug, Clone)]
pub struct PointDescription {
    /// The municipality name, or the state-government notice.
    pub header: String,
    pub state_code: String,
    pub agreement_id: String,
    pub status_label: Option<String>,
    pub address: Option<String>,
}

/// A resolved row, ready to be written to the map file.
#[derive(PartialEq, Debug, Clone)]
pub struct MapPoint {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub description: PointDescription,
    pub style: MarkerStyle,
}

/// Why a row ended the way it did.
#[derive(PartialEq, Debug, Clone)]
pub enum RowOutcome {
    Resolved { state_level: bool },
    NotFound,
    /// The lookups kept failing. Carries the last error.
    LookupFailed(String),
    MissingState,
    MissingMunicipality,
    /// Outside the state filter.
    Filtered,
}

impl RowOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RowOutcome::NotFound
                | RowOutcome::LookupFailed(_)
                | RowOutcome::MissingState
                | RowOutcome::MissingMunicipality
        )
    }

    /// Short machine-friendly reason, used in reports.
    pub fn code(&self) -> &'static str {
        match self {
            RowOutcome::Resolved { state_level: false } => "resolved",
            RowOutcome::Resolved { state_level: true } => "resolved_state_capital",
            RowOutcome::NotFound => "not_found",
            RowOutcome::LookupFailed(_) => "lookup_error",
            RowOutcome::MissingState => "missing_state",
            RowOutcome::MissingMunicipality => "missing_municipality",
            RowOutcome::Filtered => "filtered",
        }
    }
}

/// One entry of the audit log.
#[derive(PartialEq, Debug, Clone)]
pub struct RowReport {
    pub row_number: usize,
    pub agreement_id: String,
    /// The last query sent for this row, if any.
    pub query: Option<String>,
    pub outcome: RowOutcome,
}

#[derive(PartialEq, Debug, Clone, Default)]
pub struct RunOutcome {
    pub resolved: usize,
    /// Resolved rows that were redirected to a state capital.
    pub state_fallback: usize,
    pub failed: usize,
    pub skipped: usize,
    pub points: Vec<MapPoint>,
    /// One entry per input row, in input order.
    pub entries: Vec<RowReport>,
}

impl RunOutcome {
    /// The failure log, in input order.
    pub fn failures(&self) -> impl Iterator<Item = &RowReport> {
        self.entries.iter().filter(|e| e.outcome.is_failure())
    }
}

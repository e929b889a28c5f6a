use clap::Parser;

/// Places the grants (convênios) of a spreadsheet on a KML map.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing the run. The command line options
    /// override the values of this file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The spreadsheet or CSV file with the grants.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (excel or csv, default guessed from the file extension) The type of the input.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file, the name of the worksheet to use (default: the first one).
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (single character, default ',') The delimiter of CSV inputs.
    #[clap(long, value_parser)]
    pub csv_delimiter: Option<String>,

    /// (file path or 'stdout') Where to write the KML map.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) If specified, a CSV audit report with one line per input row is written there.
    #[clap(long, value_parser)]
    pub report: Option<String>,

    /// Only write the failed rows to the audit report.
    #[clap(long, takes_value = false)]
    pub failures_only: bool,

    /// (file path) A reference KML file. If provided, the generated map must match it.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// The first row of the input is data, not a header.
    #[clap(long, takes_value = false)]
    pub no_header: bool,

    /// Use the columns guessed from the first row when the input has no header.
    #[clap(long, takes_value = false)]
    pub accept_detected: bool,

    /// The agreement number column: a 1-based position, a column letter (A-Z) or a header label.
    #[clap(long, value_parser)]
    pub agreement_column: Option<String>,

    /// The municipality column: a 1-based position, a column letter (A-Z) or a header label.
    #[clap(long, value_parser)]
    pub municipality_column: Option<String>,

    /// The state code (UF) column: a 1-based position, a column letter (A-Z) or a header label.
    #[clap(long, value_parser)]
    pub state_column: Option<String>,

    /// The completion percentage column: a 1-based position, a column letter (A-Z) or a header label.
    #[clap(long, value_parser)]
    pub completion_column: Option<String>,

    /// Ignore the completion percentage, even if a column is found.
    #[clap(long, takes_value = false)]
    pub no_completion: bool,

    /// Also remove parenthetical notes and rural tokens (GLEBA, LOTE, ...) from municipality names.
    #[clap(long, takes_value = false)]
    pub strict_names: bool,

    /// Do not place the state-government grants at the state capital.
    #[clap(long, takes_value = false)]
    pub no_capital_fallback: bool,

    /// (list of comma-separated state codes) Only process the rows of these states.
    #[clap(long, value_parser, value_delimiter = ',')]
    pub states: Vec<String>,

    /// (nominatim or arcgis, default nominatim) The geocoding service.
    #[clap(long, value_parser)]
    pub geocoder: Option<String>,

    /// The User-Agent sent to the geocoding service.
    #[clap(long, value_parser)]
    pub user_agent: Option<String>,

    /// (seconds, default 1.1) Minimum delay between two requests to the geocoding service.
    #[clap(long, value_parser)]
    pub min_delay: Option<f64>,

    /// (default 3) Attempts per query when the geocoding service fails.
    #[clap(long, value_parser)]
    pub max_attempts: Option<u32>,

    /// (seconds, default 15) Timeout of each request to the geocoding service.
    #[clap(long, value_parser)]
    pub timeout: Option<u64>,

    /// When a place is not found, try again with the shorter "<name> <UF>" query.
    #[clap(long, takes_value = false)]
    pub loose_fallback: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}

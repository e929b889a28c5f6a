use log::{debug, info, warn};

use grant_geocoding::builder::Builder;
use grant_geocoding::columns::{map_columns, HeaderPatterns, TableShape};
use grant_geocoding::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use text_diff::print_diff;

use crate::args::Args;
use crate::convkml::config_reader::*;
use crate::convkml::geocoders::make_geocoder;
use crate::convkml::io_common::Table;

pub mod config_reader;
pub mod geocoders;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;
pub mod io_kml;
pub mod io_report;

#[derive(Debug, Snafu)]
pub enum ConvError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::Error,
        path: String,
    },
    #[snafu(display("No worksheet named {name:?} in {path}"))]
    MissingWorksheet { name: String, path: String },
    #[snafu(display("The input {path} has no rows"))]
    EmptyTable { path: String },
    #[snafu(display("Error opening CSV file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading CSV file {path} at line {lineno}"))]
    CsvLineParse {
        source: csv::Error,
        path: String,
        lineno: usize,
    },
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON configuration"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Invalid column selection {value}"))]
    ColumnSelection { value: String },
    #[snafu(display("{source}"))]
    Columns { source: ColumnError },
    #[snafu(display("Cannot create the HTTP client"))]
    HttpClient { source: reqwest::Error },
    #[snafu(display("Error writing the KML document: {message}"))]
    WritingKml { message: String },
    #[snafu(display("Error writing the report {path}"))]
    WritingReport { source: csv::Error, path: String },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ConvResult<T> = Result<T, ConvError>;

pub const DEFAULT_OUTPUT: &str = "convenios_geolocalizados.kml";
pub const DEFAULT_USER_AGENT: &str = "convenio-kml/0.1";

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputType {
    Excel,
    Csv,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Provider {
    Nominatim,
    ArcGis,
}

/// Settings of the geocoding backend, after merging the config file and the arguments.
#[derive(PartialEq, Debug, Clone)]
pub struct GeocoderSettings {
    pub provider: Provider,
    pub endpoint: Option<String>,
    pub user_agent: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub policy: ResolverPolicy,
}

/// Everything a run needs, after merging the config file and the arguments.
#[derive(PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub input: String,
    pub input_type: InputType,
    pub worksheet: Option<String>,
    pub csv_delimiter: u8,
    pub has_header: bool,
    pub accept_detected: bool,
    pub selections: columns::FieldColumns<ColumnSelector>,
    pub header_patterns: Option<HeaderPatternSettings>,
    pub options: RunOptions,
    pub geocoder: GeocoderSettings,
    pub output: String,
    pub report: Option<String>,
    pub failures_only: bool,
    pub reference: Option<String>,
    pub document_name: String,
}

// Relative paths of the config file are relative to the config file itself.
fn resolve_path(root: Option<&Path>, p: &str) -> String {
    match root {
        Some(r) if Path::new(p).is_relative() && p != "stdout" => {
            let full: PathBuf = [r, Path::new(p)].iter().collect();
            full.display().to_string()
        }
        _ => p.to_string(),
    }
}

fn parse_input_type(name: Option<&str>, input: &str) -> ConvResult<InputType> {
    match name {
        Some("excel") | Some("xlsx") => Ok(InputType::Excel),
        Some("csv") => Ok(InputType::Csv),
        Some(x) => whatever!("Input type not implemented {:?}", x),
        None => {
            let lower = input.to_lowercase();
            if lower.ends_with(".csv") || lower.ends_with(".txt") {
                Ok(InputType::Csv)
            } else {
                Ok(InputType::Excel)
            }
        }
    }
}

fn parse_provider(name: Option<&str>) -> ConvResult<Provider> {
    match name.unwrap_or("nominatim") {
        "nominatim" => Ok(Provider::Nominatim),
        "arcgis" => Ok(Provider::ArcGis),
        x => whatever!("Geocoder not implemented {:?}", x),
    }
}

fn parse_delimiter(s: Option<&str>) -> ConvResult<u8> {
    match s {
        None => Ok(b','),
        Some("\\t") | Some("tab") => Ok(b'\t'),
        Some(d) if d.len() == 1 => Ok(d.as_bytes()[0]),
        Some(d) => whatever!("The CSV delimiter must be a single character, got {:?}", d),
    }
}

/// Merges the configuration file (if any) with the command line arguments.
pub fn build_settings(
    args: &Args,
    config: &ConvConfig,
    config_dir: Option<&Path>,
) -> ConvResult<RunSettings> {
    let input = match (&args.input, &config.input_file) {
        (Some(p), _) => p.clone(),
        (None, Some(p)) => resolve_path(config_dir, p),
        (None, None) => whatever!("No input file given (use --input or inputFile)"),
    };
    let input_type = parse_input_type(
        args.input_type.as_deref().or(config.input_type.as_deref()),
        &input,
    )?;
    let csv_delimiter = parse_delimiter(
        args.csv_delimiter
            .as_deref()
            .or(config.csv_delimiter.as_deref()),
    )?;

    let column_settings = config.columns.clone().unwrap_or_default();
    let mut selections: columns::FieldColumns<ColumnSelector> = Default::default();
    for (field, arg, js) in [
        (
            GrantField::Agreement,
            &args.agreement_column,
            &column_settings.agreement,
        ),
        (
            GrantField::Municipality,
            &args.municipality_column,
            &column_settings.municipality,
        ),
        (GrantField::State, &args.state_column, &column_settings.state),
        (
            GrantField::Completion,
            &args.completion_column,
            &column_settings.completion,
        ),
    ] {
        let selector = match arg {
            Some(s) => Some(parse_selector(s)?),
            None => read_js_selector(js)?,
        };
        if let Some(sel) = selector {
            selections.set(field, sel);
        }
    }

    let completion_status =
        !args.no_completion && config.completion_status.unwrap_or(true);
    let mut state_filter: Vec<String> = if args.states.is_empty() {
        config.state_filter.clone().unwrap_or_default()
    } else {
        args.states.clone()
    };
    state_filter = state_filter
        .iter()
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();

    let options = RunOptions {
        strictness: if args.strict_names {
            Strictness::Strict
        } else {
            config.strictness()?.unwrap_or(Strictness::Basic)
        },
        state_capital_fallback: !args.no_capital_fallback
            && config.state_capital_fallback.unwrap_or(true),
        completion_status,
        state_filter,
    };

    let gs = config.geocoder.clone().unwrap_or_default();
    let min_interval = match args.min_delay.or(gs.min_delay_seconds) {
        Some(d) if d.is_finite() && d >= 0.0 => Duration::from_secs_f64(d),
        Some(d) => whatever!("Invalid minimum delay {}", d),
        None => ResolverPolicy::DEFAULT_POLICY.min_interval,
    };
    let geocoder = GeocoderSettings {
        provider: parse_provider(args.geocoder.as_deref().or(gs.provider.as_deref()))?,
        endpoint: gs.endpoint.clone(),
        user_agent: args
            .user_agent
            .clone()
            .or(gs.user_agent)
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        api_key: gs.api_key,
        timeout: Duration::from_secs(args.timeout.or(gs.timeout_seconds).unwrap_or(15)),
        policy: ResolverPolicy {
            max_attempts: args
                .max_attempts
                .or(gs.max_attempts)
                .unwrap_or(ResolverPolicy::DEFAULT_POLICY.max_attempts),
            min_interval,
            loose_fallback: args.loose_fallback || gs.loose_fallback.unwrap_or(false),
        },
    };

    let output = match (&args.out, &config.output_kml) {
        (Some(p), _) => p.clone(),
        (None, Some(p)) => resolve_path(config_dir, p),
        (None, None) => DEFAULT_OUTPUT.to_string(),
    };
    let report = match (&args.report, &config.output_report) {
        (Some(p), _) => Some(p.clone()),
        (None, Some(p)) => Some(resolve_path(config_dir, p)),
        (None, None) => None,
    };
    let document_name = config.document_name.clone().unwrap_or_else(|| {
        Path::new(&input)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "Convênios".to_string())
    });

    Ok(RunSettings {
        input,
        input_type,
        worksheet: args
            .excel_worksheet_name
            .clone()
            .or_else(|| config.excel_worksheet_name.clone()),
        csv_delimiter,
        has_header: !args.no_header && config.has_header.unwrap_or(true),
        accept_detected: args.accept_detected || config.accept_detected_columns.unwrap_or(false),
        selections,
        header_patterns: config.header_patterns.clone(),
        options,
        geocoder,
        output,
        report,
        failures_only: args.failures_only || config.failures_only.unwrap_or(false),
        reference: args.reference.clone(),
        document_name,
    })
}

fn read_table(settings: &RunSettings) -> ConvResult<Table> {
    info!("Attempting to read grant file {:?}", settings.input);
    match settings.input_type {
        InputType::Excel => io_excel::read_excel_table(
            &settings.input,
            settings.worksheet.as_deref(),
            settings.has_header,
        ),
        InputType::Csv => {
            io_csv::read_csv_table(&settings.input, settings.csv_delimiter, settings.has_header)
        }
    }
}

fn header_patterns(settings: &RunSettings) -> ConvResult<HeaderPatterns> {
    let mut patterns = HeaderPatterns::standard().context(ColumnsSnafu {})?;
    if let Some(custom) = &settings.header_patterns {
        for (field, ps) in custom.fields() {
            patterns.set_patterns(field, ps.as_slice()).context(ColumnsSnafu {})?;
        }
    }
    Ok(patterns)
}

/// Resolves the columns of the table and extracts the grant records.
pub fn table_records(settings: &RunSettings, table: &Table) -> ConvResult<Vec<GrantRecord>> {
    let shape = TableShape {
        header: table.header.clone(),
        first_row: table.rows.first().map(|r| r.cells.clone()),
        width: table.width(),
    };
    debug!("table_records: shape: {:?}", shape);
    let patterns = header_patterns(settings)?;
    let mapping = map_columns(
        &shape,
        &settings.selections,
        &patterns,
        settings.accept_detected,
        settings.options.completion_status,
    )
    .context(ColumnsSnafu {})?;
    let mut builder = Builder::new(&mapping);
    builder.add_rows(&table.rows);
    Ok(builder.records())
}

fn write_output(path: &str, content: &str) -> ConvResult<()> {
    if path == "stdout" {
        println!("{}", content);
        Ok(())
    } else {
        info!("Writing {:?}", path);
        fs::write(path, content).context(WritingFileSnafu { path })
    }
}

fn summary_text(outcome: &RunOutcome) -> String {
    let mut lines = vec![format!(
        "{} point(s) located ({} at a state capital), {} failed, {} skipped.",
        outcome.resolved, outcome.state_fallback, outcome.failed, outcome.skipped
    )];
    let failures: Vec<&RowReport> = outcome.failures().collect();
    if !failures.is_empty() {
        lines.push("Rows not located:".to_string());
        for f in failures {
            lines.push(format!(
                "- row {} (convênio {}): {} {}",
                f.row_number,
                f.agreement_id,
                f.outcome.code(),
                f.query.as_deref().unwrap_or("")
            ));
        }
    }
    lines.join("\n")
}

// The map owns stdout when it is written there.
fn summary_on_stderr(output: &str) -> bool {
    output == "stdout"
}

fn print_summary(outcome: &RunOutcome, output: &str) {
    let text = summary_text(outcome);
    if summary_on_stderr(output) {
        eprintln!("{}", text);
    } else {
        println!("{}", text);
    }
}

fn check_reference(reference_path: &str, kml: &str) -> ConvResult<()> {
    let reference =
        fs::read_to_string(reference_path).context(OpeningFileSnafu { path: reference_path })?;
    if reference.trim_end() != kml.trim_end() {
        warn!("Found differences with the reference map");
        print_diff(reference.trim_end(), kml.trim_end(), "\n");
        whatever!("Difference detected between the generated map and the reference map")
    }
    Ok(())
}

pub fn run_conversion(args: &Args) -> ConvResult<()> {
    let (config, config_dir) = match &args.config {
        Some(p) => {
            let config = read_config(p)?;
            let dir = Path::new(p).parent().map(|d| d.to_path_buf());
            (config, dir)
        }
        None => (ConvConfig::default(), None),
    };
    let settings = build_settings(args, &config, config_dir.as_deref())?;
    info!("settings: {:?}", settings);

    // Reading or column errors stop the run before anything is written.
    let table = read_table(&settings)?;
    let records = table_records(&settings, &table)?;

    let geocoder = make_geocoder(&settings.geocoder)?;
    let mut cache = GeocodeCache::new();
    let outcome = {
        let mut resolver =
            Resolver::new(geocoder.as_ref(), &mut cache, settings.geocoder.policy.clone());
        run_grants(&records, &settings.options, &mut resolver)
    };
    debug!("run_conversion: {} cached queries", cache.len());

    let kml = io_kml::render_kml(&settings.document_name, &outcome.points)?;
    write_output(&settings.output, &kml)?;
    if let Some(report_path) = &settings.report {
        io_report::write_report(report_path, &outcome, settings.failures_only)?;
    }
    print_summary(&outcome, &settings.output);

    if let Some(reference_path) = &settings.reference {
        check_reference(reference_path, &kml)?;
    }
    Ok(())
}

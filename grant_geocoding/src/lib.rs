mod config;
pub mod builder;
pub mod columns;
pub mod manual;
pub mod normalize;
pub mod resolver;
pub mod state_grant;
pub mod status;

use log::{debug, info, warn};

pub use crate::config::*;
pub use crate::resolver::{GeocodeCache, Geocoder, Resolver, ResolverPolicy};
use crate::normalize::normalize_name;
use crate::resolver::build_query;
use crate::state_grant::{classify_grant, GrantTarget};
use crate::status::classify_completion;

/// Processes the grant records, in order, and places them on the map.
///
/// Arguments:
/// * `records` the rows of the table, already mapped to fields
/// * `options` the behaviour switches for this run
/// * `resolver` the geocoding resolver, holding the cache of this run
///
/// A row that cannot be placed is recorded in the outcome and never stops the run.
pub fn run_grants<G: Geocoder + ?Sized>(
    records: &[GrantRecord],
    options: &RunOptions,
    resolver: &mut Resolver<G>,
) -> RunOutcome {
    info!(
        "run_grants: processing {} rows, options: {:?}",
        records.len(),
        options
    );
    let mut outcome = RunOutcome::default();
    let num_records = records.len();
    for (idx, record) in records.iter().enumerate() {
        let (query, row_outcome) =
            process_record(record, options, resolver, &mut outcome, (idx + 1, num_records));
        debug!(
            "run_grants: row {} agreement {:?}: {}",
            record.row_number,
            record.agreement_id,
            row_outcome.code()
        );
        match &row_outcome {
            RowOutcome::Resolved { state_level } => {
                outcome.resolved += 1;
                if *state_level {
                    outcome.state_fallback += 1;
                }
            }
            RowOutcome::Filtered => outcome.skipped += 1,
            failure => {
                warn!(
                    "run_grants: row {} (agreement {:?}) failed: {:?} query: {:?}",
                    record.row_number, record.agreement_id, failure, query
                );
                outcome.failed += 1;
            }
        }
        outcome.entries.push(RowReport {
            row_number: record.row_number,
            agreement_id: record.agreement_id.clone(),
            query,
            outcome: row_outcome,
        });
    }
    info!(
        "run_grants: {} resolved ({} at a state capital), {} failed, {} skipped, {} requests",
        outcome.resolved,
        outcome.state_fallback,
        outcome.failed,
        outcome.skipped,
        resolver.requests()
    );
    outcome
}

// Resolved points are pushed to the outcome directly.
// A blank state is a failure even when a state filter is set.
fn process_record<G: Geocoder + ?Sized>(
    record: &GrantRecord,
    options: &RunOptions,
    resolver: &mut Resolver<G>,
    outcome: &mut RunOutcome,
    (position, total): (usize, usize),
) -> (Option<String>, RowOutcome) {
    if record.state_code.is_empty() {
        return (None, RowOutcome::MissingState);
    }
    if !options.state_filter.is_empty() && !options.state_filter.contains(&record.state_code) {
        return (None, RowOutcome::Filtered);
    }
    let target = match grant_target(record, options) {
        Some(t) => t,
        None => return (None, RowOutcome::MissingMunicipality),
    };
    debug!("process_record: row {}: {:?}", record.row_number, target);
    info!(
        "Processing {}/{}: {}",
        position,
        total,
        build_query(&target.search_target, &record.state_code)
    );

    let resolution = resolver.resolve(&target.search_target, &record.state_code);
    let row_outcome = match resolution.lookup {
        Lookup::Found(res) => {
            outcome.points.push(make_point(record, &target, res, options));
            RowOutcome::Resolved {
                state_level: target.is_state_level,
            }
        }
        Lookup::NotFound => RowOutcome::NotFound,
        Lookup::Failed(msg) => RowOutcome::LookupFailed(msg),
    };
    (Some(resolution.query), row_outcome)
}

/// What to search for a record, given the run options.
///
/// Without the state capital redirect, blank municipalities cannot be placed and any
/// other text is searched as a municipality name.
pub fn grant_target(record: &GrantRecord, options: &RunOptions) -> Option<GrantTarget> {
    let municipality = record.municipality_raw.as_deref();
    let target = classify_grant(municipality, &record.state_code, options.strictness);
    if !target.is_state_level || options.state_capital_fallback {
        return Some(target);
    }
    let original = municipality.unwrap_or_default().trim();
    let search_target = normalize_name(original, options.strictness);
    if search_target.is_empty() {
        None
    } else {
        Some(GrantTarget {
            search_target,
            is_state_level: false,
            header_label: format!("Município: {}", original),
        })
    }
}

fn make_point(
    record: &GrantRecord,
    target: &GrantTarget,
    res: GeocodeResult,
    options: &RunOptions,
) -> MapPoint {
    let status = if options.completion_status {
        record.completion_raw.as_ref().map(classify_completion)
    } else {
        None
    };
    let style = match &status {
        _ if target.is_state_level => MarkerStyle::Red,
        Some(s) => s.tier.marker(),
        None => MarkerStyle::Blue,
    };
    MapPoint {
        name: record.agreement_id.clone(),
        latitude: res.latitude,
        longitude: res.longitude,
        description: PointDescription {
            header: target.header_label.clone(),
            state_code: record.state_code.clone(),
            agreement_id: record.agreement_id.clone(),
            status_label: status.map(|s| s.label),
            address: res.display_address,
        },
        style,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::testing::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn record(row_number: usize, id: &str, municipality: Option<&str>, uf: &str) -> GrantRecord {
        GrantRecord {
            row_number,
            agreement_id: id.to_string(),
            municipality_raw: municipality.map(|s| s.to_string()),
            state_code: uf.to_string(),
            completion_raw: None,
        }
    }

    #[test]
    fn state_grant_goes_to_the_capital() {
        init();
        let geocoder = FakeGeocoder::default().with_place("Salvador, BA, Brasil", -12.97, -38.51);
        let mut cache = GeocodeCache::new();
        let mut resolver = Resolver::new(&geocoder, &mut cache, fast_policy());
        let outcome = run_grants(
            &[record(2, "999", Some(""), "BA")],
            &RunOptions::DEFAULT_OPTIONS,
            &mut resolver,
        );
        assert_eq!(outcome.resolved, 1);
        assert_eq!(outcome.state_fallback, 1);
        assert_eq!(geocoder.calls_for("Salvador, BA, Brasil"), 1);
        let point = &outcome.points[0];
        assert_eq!(point.name, "999");
        assert_eq!(point.style, MarkerStyle::Red);
        assert_eq!(point.longitude, -38.51);
        assert!(point.description.header.contains("Governo do Estado"));
        assert_eq!(
            outcome.entries[0].query.as_deref(),
            Some("Salvador, BA, Brasil")
        );
    }

    #[test]
    fn failures_stay_isolated() {
        init();
        let geocoder = FakeGeocoder::default()
            .with_place("CURITIBA, PR, Brasil", -25.4, -49.3)
            .with_place("LONDRINA, PR, Brasil", -23.3, -51.2)
            .with_place("MARINGA, PR, Brasil", -23.4, -51.9)
            .failing("LONDRINA, PR, Brasil", 100);
        let mut cache = GeocodeCache::new();
        let mut resolver = Resolver::new(&geocoder, &mut cache, fast_policy());
        let records = vec![
            record(2, "1", Some("Curitiba"), "PR"),
            record(3, "2", Some("Londrina"), "PR"),
            record(4, "3", Some("Maringa"), "PR"),
        ];
        let outcome = run_grants(&records, &RunOptions::DEFAULT_OPTIONS, &mut resolver);
        assert_eq!(outcome.resolved, 2);
        assert_eq!(outcome.failed, 1);
        let names: Vec<&str> = outcome.points.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["1", "3"]);
        let failures: Vec<&RowReport> = outcome.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].row_number, 3);
        assert_eq!(
            failures[0].outcome,
            RowOutcome::LookupFailed("timeout".to_string())
        );
        assert_eq!(outcome.entries.len(), 3);
    }

    #[test]
    fn repeated_places_are_looked_up_once() {
        init();
        let geocoder = FakeGeocoder::default().with_place("CURITIBA, PR, Brasil", -25.4, -49.3);
        let mut cache = GeocodeCache::new();
        let mut resolver = Resolver::new(&geocoder, &mut cache, fast_policy());
        let records = vec![
            record(2, "1", Some("Prefeitura de Curitiba"), "PR"),
            record(3, "2", Some("Município de Curitiba"), "PR"),
            record(4, "3", Some("curitiba"), "PR"),
            record(5, "4", Some("Nowhere"), "PR"),
            record(6, "5", Some("nowhere"), "PR"),
        ];
        let outcome = run_grants(&records, &RunOptions::DEFAULT_OPTIONS, &mut resolver);
        assert_eq!(outcome.resolved, 3);
        assert_eq!(outcome.failed, 2);
        assert_eq!(geocoder.calls.borrow().len(), 2);
    }

    #[test]
    fn completion_drives_the_markers() {
        init();
        let geocoder = FakeGeocoder::default()
            .with_place("RECIFE, PE, Brasil", -8.05, -34.9)
            .with_place("Recife, PE, Brasil", -8.05, -34.9);
        let mut cache = GeocodeCache::new();
        let mut resolver = Resolver::new(&geocoder, &mut cache, fast_policy());
        let mut records = Vec::new();
        for (idx, raw) in ["0", "45%", "0,95", "n/a"].iter().enumerate() {
            let mut r = record(idx + 2, &idx.to_string(), Some("Recife"), "PE");
            r.completion_raw = Some(Cell::Text(raw.to_string()));
            records.push(r);
        }
        let mut state_row = record(9, "9", None, "PE");
        state_row.completion_raw = Some(Cell::Number(0.1));
        records.push(state_row);

        let outcome = run_grants(&records, &RunOptions::DEFAULT_OPTIONS, &mut resolver);
        let styles: Vec<MarkerStyle> = outcome.points.iter().map(|p| p.style).collect();
        assert_eq!(
            styles,
            vec![
                MarkerStyle::Blue,
                MarkerStyle::Yellow,
                MarkerStyle::Red,
                MarkerStyle::White,
                MarkerStyle::Red
            ]
        );
        assert_eq!(
            outcome.points[1].description.status_label.as_deref(),
            Some("45.0% (Em Execução)")
        );

        let options = RunOptions {
            completion_status: false,
            ..RunOptions::DEFAULT_OPTIONS
        };
        let outcome = run_grants(&records[..1], &options, &mut resolver);
        assert_eq!(outcome.points[0].style, MarkerStyle::Blue);
        assert_eq!(outcome.points[0].description.status_label, None);
    }

    #[test]
    fn filter_and_missing_fields() {
        init();
        let geocoder = FakeGeocoder::default().with_place("NATAL, RN, Brasil", -5.8, -35.2);
        let mut cache = GeocodeCache::new();
        let mut resolver = Resolver::new(&geocoder, &mut cache, fast_policy());
        let records = vec![
            record(2, "1", Some("Natal"), "RN"),
            record(3, "2", Some("Natal"), "PB"),
            record(4, "3", Some("Natal"), ""),
            record(5, "4", None, "RN"),
        ];
        let options = RunOptions {
            state_filter: vec!["RN".to_string(), "".to_string()],
            state_capital_fallback: false,
            ..RunOptions::DEFAULT_OPTIONS
        };
        let outcome = run_grants(&records, &options, &mut resolver);
        let codes: Vec<&str> = outcome.entries.iter().map(|e| e.outcome.code()).collect();
        assert_eq!(
            codes,
            vec!["resolved", "filtered", "missing_state", "missing_municipality"]
        );
        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.failed, 2);
        assert_eq!(geocoder.calls.borrow().len(), 1);
    }

    #[test]
    fn blank_state_fails_under_a_filter() {
        init();
        let geocoder = FakeGeocoder::default();
        let mut cache = GeocodeCache::new();
        let mut resolver = Resolver::new(&geocoder, &mut cache, fast_policy());
        let options = RunOptions {
            state_filter: vec!["RN".to_string()],
            ..RunOptions::DEFAULT_OPTIONS
        };
        let outcome = run_grants(
            &[record(2, "1", Some("Natal"), ""), record(3, "2", Some("Recife"), "PE")],
            &options,
            &mut resolver,
        );
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.skipped, 1);
        let failures: Vec<&RowReport> = outcome.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].row_number, 2);
        assert_eq!(failures[0].outcome, RowOutcome::MissingState);
        assert!(geocoder.calls.borrow().is_empty());
    }

    #[test]
    fn without_capital_redirect_state_text_is_searched() {
        let record = record(2, "1", Some("Estado de Sergipe"), "SE");
        let options = RunOptions {
            state_capital_fallback: false,
            ..RunOptions::DEFAULT_OPTIONS
        };
        let target = grant_target(&record, &options).unwrap();
        assert!(!target.is_state_level);
        assert_eq!(target.search_target, "ESTADO DE SERGIPE");
    }
}

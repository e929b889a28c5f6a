// The CSV audit report: one line per processed row.

use serde::Serialize;

use crate::convkml::*;

#[derive(Debug, Serialize)]
struct ReportLine<'a> {
    row: usize,
    agreement: &'a str,
    query: &'a str,
    outcome: &'static str,
    detail: &'a str,
}

impl<'a> ReportLine<'a> {
    fn new(entry: &'a RowReport) -> ReportLine<'a> {
        ReportLine {
            row: entry.row_number,
            agreement: &entry.agreement_id,
            query: entry.query.as_deref().unwrap_or(""),
            outcome: entry.outcome.code(),
            detail: match &entry.outcome {
                RowOutcome::LookupFailed(msg) => msg.as_str(),
                _ => "",
            },
        }
    }
}

pub fn write_report(path: &str, outcome: &RunOutcome, failures_only: bool) -> ConvResult<()> {
    info!("Writing the report {:?}", path);
    let mut wtr = csv::Writer::from_path(path).context(WritingReportSnafu { path })?;
    let mut written = 0;
    for entry in outcome.entries.iter() {
        if failures_only && !entry.outcome.is_failure() {
            continue;
        }
        wtr.serialize(ReportLine::new(entry))
            .context(WritingReportSnafu { path })?;
        written += 1;
    }
    // The header is only written with the first line.
    if written == 0 {
        wtr.write_record(["row", "agreement", "query", "outcome", "detail"])
            .context(WritingReportSnafu { path })?;
    }
    wtr.flush().context(WritingFileSnafu { path })?;
    Ok(())
}

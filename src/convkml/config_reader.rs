use crate::convkml::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

/// Explicit column selections of the configuration file.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ColumnSettings {
    pub agreement: Option<JSValue>,
    pub municipality: Option<JSValue>,
    pub state: Option<JSValue>,
    pub completion: Option<JSValue>,
}

/// Header patterns replacing the standard ones, per field.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderPatternSettings {
    pub agreement: Option<Vec<String>>,
    pub municipality: Option<Vec<String>>,
    pub state: Option<Vec<String>>,
    pub completion: Option<Vec<String>>,
}

impl HeaderPatternSettings {
    pub fn fields(&self) -> Vec<(GrantField, &Vec<String>)> {
        let mut res = Vec::new();
        for (field, ps) in [
            (GrantField::Agreement, &self.agreement),
            (GrantField::Municipality, &self.municipality),
            (GrantField::State, &self.state),
            (GrantField::Completion, &self.completion),
        ] {
            if let Some(ps) = ps {
                res.push((field, ps));
            }
        }
        res
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeocoderConfig {
    pub provider: Option<String>,
    pub endpoint: Option<String>,
    #[serde(rename = "userAgent")]
    pub user_agent: Option<String>,
    #[serde(rename = "apiKey")]
    pub api_key: Option<String>,
    #[serde(rename = "minDelaySeconds")]
    pub min_delay_seconds: Option<f64>,
    #[serde(rename = "maxAttempts")]
    pub max_attempts: Option<u32>,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: Option<u64>,
    #[serde(rename = "looseFallback")]
    pub loose_fallback: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConvConfig {
    #[serde(rename = "inputFile")]
    pub input_file: Option<String>,
    #[serde(rename = "inputType")]
    pub input_type: Option<String>,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "csvDelimiter")]
    pub csv_delimiter: Option<String>,
    #[serde(rename = "hasHeader")]
    pub has_header: Option<bool>,
    #[serde(rename = "acceptDetectedColumns")]
    pub accept_detected_columns: Option<bool>,
    pub columns: Option<ColumnSettings>,
    #[serde(rename = "headerPatterns")]
    pub header_patterns: Option<HeaderPatternSettings>,
    pub normalizer: Option<String>,
    #[serde(rename = "stateCapitalFallback")]
    pub state_capital_fallback: Option<bool>,
    #[serde(rename = "completionStatus")]
    pub completion_status: Option<bool>,
    #[serde(rename = "stateFilter")]
    pub state_filter: Option<Vec<String>>,
    pub geocoder: Option<GeocoderConfig>,
    #[serde(rename = "outputKml")]
    pub output_kml: Option<String>,
    #[serde(rename = "outputReport")]
    pub output_report: Option<String>,
    #[serde(rename = "failuresOnly")]
    pub failures_only: Option<bool>,
    #[serde(rename = "documentName")]
    pub document_name: Option<String>,
}

impl ConvConfig {
    pub fn strictness(&self) -> ConvResult<Option<Strictness>> {
        match self.normalizer.as_deref() {
            None => Ok(None),
            Some("basic") => Ok(Some(Strictness::Basic)),
            Some("strict") => Ok(Some(Strictness::Strict)),
            Some(x) => whatever!("unknown normalizer: {}", x),
        }
    }
}

pub fn read_config(path: &str) -> ConvResult<ConvConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let config: ConvConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    Ok(config)
}

/// Reads a column selection written on the command line.
///
/// Numbers are 1-based positions, a single uppercase letter is an Excel column and
/// anything else is a header label.
pub fn parse_selector(s: &str) -> ConvResult<ColumnSelector> {
    let t = s.trim();
    if t.is_empty() {
        return ColumnSelectionSnafu { value: s }.fail();
    }
    if t.chars().all(|c| c.is_ascii_digit()) {
        return match t.parse::<usize>() {
            Ok(x) if x >= 1 => Ok(ColumnSelector::Index(x - 1)),
            _ => ColumnSelectionSnafu { value: s }.fail(),
        };
    }
    let mut chars = t.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => {
            Ok(ColumnSelector::Index((c as usize) - ('A' as usize)))
        }
        _ => Ok(ColumnSelector::Header(t.to_string())),
    }
}

pub fn read_js_selector(x: &Option<JSValue>) -> ConvResult<Option<ColumnSelector>> {
    match x {
        None | Some(JSValue::Null) => Ok(None),
        Some(JSValue::Number(n)) => match n.as_u64() {
            Some(x) if x >= 1 => Ok(Some(ColumnSelector::Index((x - 1) as usize))),
            _ => ColumnSelectionSnafu {
                value: n.to_string(),
            }
            .fail(),
        },
        Some(JSValue::String(s)) => parse_selector(s).map(Some),
        Some(v) => ColumnSelectionSnafu {
            value: v.to_string(),
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selectors() {
        assert_eq!(parse_selector("3").unwrap(), ColumnSelector::Index(2));
        assert_eq!(parse_selector(" C ").unwrap(), ColumnSelector::Index(2));
        assert_eq!(
            parse_selector("UF").unwrap(),
            ColumnSelector::Header("UF".to_string())
        );
        assert_eq!(
            parse_selector("c").unwrap(),
            ColumnSelector::Header("c".to_string())
        );
        assert!(parse_selector("0").is_err());
        assert!(parse_selector("  ").is_err());
    }

    #[test]
    fn json_selectors() {
        assert_eq!(read_js_selector(&None).unwrap(), None);
        assert_eq!(
            read_js_selector(&Some(json!(1))).unwrap(),
            Some(ColumnSelector::Index(0))
        );
        assert_eq!(
            read_js_selector(&Some(json!("Nº Convênio"))).unwrap(),
            Some(ColumnSelector::Header("Nº Convênio".to_string()))
        );
        assert!(read_js_selector(&Some(json!(0))).is_err());
        assert!(read_js_selector(&Some(json!(-2))).is_err());
        assert!(read_js_selector(&Some(json!(true))).is_err());
    }

    #[test]
    fn full_config() {
        let config: ConvConfig = serde_json::from_str(
            r#"{
                "inputFile": "convenios.csv",
                "csvDelimiter": ";",
                "hasHeader": false,
                "acceptDetectedColumns": true,
                "normalizer": "strict",
                "headerPatterns": {"state": ["^sg_uf$"]},
                "geocoder": {"provider": "arcgis", "apiKey": "k", "looseFallback": true},
                "failuresOnly": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.strictness().unwrap(), Some(Strictness::Strict));
        assert_eq!(config.has_header, Some(false));
        let patterns = config.header_patterns.clone().unwrap();
        let fields = patterns.fields();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].0, GrantField::State);
        let geocoder = config.geocoder.unwrap();
        assert_eq!(geocoder.api_key.as_deref(), Some("k"));
        assert_eq!(geocoder.loose_fallback, Some(true));

        let bad: ConvConfig = serde_json::from_str(r#"{"normalizer": "aggressive"}"#).unwrap();
        assert!(bad.strictness().is_err());
    }
}

//! Execution status of a grant, from its completion percentage.

use log::warn;

use crate::config::{Cell, MarkerStyle};

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum StatusTier {
    NotStarted,
    InProgress,
    NearComplete,
    Invalid,
}

impl StatusTier {
    pub fn marker(&self) -> MarkerStyle {
        match self {
            StatusTier::NotStarted => MarkerStyle::Blue,
            StatusTier::InProgress => MarkerStyle::Yellow,
            StatusTier::NearComplete => MarkerStyle::Red,
            StatusTier::Invalid => MarkerStyle::White,
        }
    }
}

/// Upper bound (inclusive) of the in-progress tier, as a fraction.
pub const IN_PROGRESS_MAX: f64 = 0.8;

#[derive(PartialEq, Debug, Clone)]
pub struct ExecutionStatus {
    pub tier: StatusTier,
    /// The completion as a fraction, when it could be read.
    pub fraction: Option<f64>,
    pub label: String,
    /// Set for values above 100% that were kept as they are.
    pub out_of_range: bool,
}

impl ExecutionStatus {
    fn invalid() -> ExecutionStatus {
        ExecutionStatus {
            tier: StatusTier::Invalid,
            fraction: None,
            label: "Dado inválido".to_string(),
            out_of_range: false,
        }
    }
}

/// Reads a completion value: "45%", "45", "0,45", 0.45 all mean 45%.
///
/// Values above 1 and up to 100 are percentages and are divided by 100,
/// anything else is taken as a fraction. Values above 100 are not clamped.
pub fn completion_fraction(raw: &Cell) -> Option<f64> {
    let value = match raw {
        Cell::Number(f) => *f,
        Cell::Text(s) => s
            .replace('%', "")
            .replace(',', ".")
            .trim()
            .parse::<f64>()
            .ok()?,
        Cell::Empty => return None,
    };
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    if value > 1.0 && value <= 100.0 {
        Some(value / 100.0)
    } else {
        Some(value)
    }
}

/// Classifies a raw completion value into a tier and a label.
pub fn classify_completion(raw: &Cell) -> ExecutionStatus {
    let fraction = match completion_fraction(raw) {
        Some(f) => f,
        None => return ExecutionStatus::invalid(),
    };
    let percent = fraction * 100.0;
    let (tier, label) = if fraction == 0.0 {
        (StatusTier::NotStarted, "0% (Não Iniciada)".to_string())
    } else if fraction <= IN_PROGRESS_MAX {
        (StatusTier::InProgress, format!("{:.1}% (Em Execução)", percent))
    } else {
        (
            StatusTier::NearComplete,
            format!("{:.1}% (Próxima da Conclusão)", percent),
        )
    };
    let out_of_range = fraction > 1.0;
    if out_of_range {
        warn!(
            "classify_completion: completion value {:?} is above 100%, kept as {}",
            raw, fraction
        );
    }
    ExecutionStatus {
        tier,
        fraction: Some(fraction),
        label,
        out_of_range,
    }
}

//! Grants made to a state government rather than to a municipality.

use crate::config::Strictness;
use crate::normalize::normalize_name;

pub const NATIONAL_CAPITAL: &str = "Brasília";

/// The capital city of each federative unit.
pub const STATE_CAPITALS: [(&str, &str); 27] = [
    ("AC", "Rio Branco"),
    ("AL", "Maceió"),
    ("AP", "Macapá"),
    ("AM", "Manaus"),
    ("BA", "Salvador"),
    ("CE", "Fortaleza"),
    ("DF", "Brasília"),
    ("ES", "Vitória"),
    ("GO", "Goiânia"),
    ("MA", "São Luís"),
    ("MT", "Cuiabá"),
    ("MS", "Campo Grande"),
    ("MG", "Belo Horizonte"),
    ("PA", "Belém"),
    ("PB", "João Pessoa"),
    ("PR", "Curitiba"),
    ("PE", "Recife"),
    ("PI", "Teresina"),
    ("RJ", "Rio de Janeiro"),
    ("RN", "Natal"),
    ("RS", "Porto Alegre"),
    ("RO", "Porto Velho"),
    ("RR", "Boa Vista"),
    ("SC", "Florianópolis"),
    ("SP", "São Paulo"),
    ("SE", "Aracaju"),
    ("TO", "Palmas"),
];

/// The capital of a state, if the code is known. The code is case-insensitive.
pub fn state_capital(state_code: &str) -> Option<&'static str> {
    let code = state_code.trim().to_uppercase();
    STATE_CAPITALS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, capital)| *capital)
}

/// What to search for a grant row, and how to present it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GrantTarget {
    pub search_target: String,
    pub is_state_level: bool,
    /// First line of the marker description.
    pub header_label: String,
}

/// True when the municipality cell designates the state itself.
pub fn is_state_level(municipality_raw: Option<&str>) -> bool {
    match municipality_raw.map(|s| s.trim().to_uppercase()) {
        None => true,
        Some(m) => m.is_empty() || m == "ESTADO" || m.contains("ESTADO DE"),
    }
}

/// Decides where a grant should be placed on the map.
///
/// State-level grants (blank municipality, "ESTADO", "... ESTADO DE ...") go to the
/// capital of the state, or to the national capital when the state code is unknown.
/// A name that is empty once normalized is treated as a blank municipality.
/// This never fails.
pub fn classify_grant(
    municipality_raw: Option<&str>,
    state_code: &str,
    strictness: Strictness,
) -> GrantTarget {
    let uf = state_code.trim().to_uppercase();
    if !is_state_level(municipality_raw) {
        let original = municipality_raw.unwrap_or_default().trim();
        let search_target = normalize_name(original, strictness);
        if !search_target.is_empty() {
            return GrantTarget {
                search_target,
                is_state_level: false,
                header_label: format!("Município: {}", original),
            };
        }
    }
    let capital = state_capital(&uf).unwrap_or(NATIONAL_CAPITAL);
    GrantTarget {
        search_target: capital.to_string(),
        is_state_level: true,
        header_label: format!("Convênio com o Governo do Estado ({})", uf),
    }
}

//! Pure text heuristics for currency values and account codes
//!
//! Kept as standalone functions so locale or format variants can be swapped
//! without touching the aggregation or matching stages.

use bigdecimal::BigDecimal;
use once_cell::sync::Lazy;
use regex::Regex;
use std::str::FromStr;

use crate::types::Cell;

/// Leading run of ASCII alphanumerics, the usual shape of a code token
/// embedded in descriptive text ("1001\库存现金", "1001 - Cash")
pub static DEFAULT_CODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z]+").expect("hard-coded pattern compiles"));

/// A cell whose remaining text was not numeric after cleanup
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot parse '{0}' as a currency amount")]
pub struct CurrencyParseError(pub String);

/// Parse a currency-formatted cell into an exact decimal
///
/// Blank and dash-only cells normalize to zero. Thousands separators and
/// common currency symbols are stripped, parenthesized values are negative,
/// and a spaced minus ("- 123.45") is accepted. Anything else non-numeric
/// is a parse failure.
pub fn parse_currency(cell: &Cell) -> Result<BigDecimal, CurrencyParseError> {
    match cell {
        Cell::Empty => Ok(BigDecimal::from(0)),
        Cell::Number(n) => {
            if n.is_finite() {
                // f64 Display renders the shortest round-trip decimal
                BigDecimal::from_str(&n.to_string())
                    .map_err(|_| CurrencyParseError(n.to_string()))
            } else {
                Err(CurrencyParseError(n.to_string()))
            }
        }
        Cell::Text(raw) => parse_currency_text(raw),
    }
}

fn parse_currency_text(raw: &str) -> Result<BigDecimal, CurrencyParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().all(|c| matches!(c, '-' | '–' | '—')) {
        return Ok(BigDecimal::from(0));
    }

    let mut text = trimmed.to_string();

    // Accounting negative: (1,234.56)
    let mut negative = false;
    if text.starts_with('(') && text.ends_with(')') && text.len() > 2 {
        negative = true;
        text = text[1..text.len() - 1].trim().to_string();
    }

    // Separators and currency markers
    text = text
        .chars()
        .filter(|c| !matches!(c, ',' | '，' | '¥' | '￥' | '$' | '€' | '£'))
        .collect();

    // Spaced minus as emitted by some exports: "- 123.45"
    if let Some(rest) = text.strip_prefix('-') {
        text = format!("-{}", rest.trim_start());
    }
    let text = text.trim();

    match BigDecimal::from_str(text) {
        Ok(value) => {
            if negative {
                Ok(-value)
            } else {
                Ok(value)
            }
        }
        Err(_) => Err(CurrencyParseError(raw.trim().to_string())),
    }
}

/// Extract the canonical account code from free-form cell text
///
/// The first match of `pattern` (default: leading alphanumeric run) wins;
/// when the pattern finds nothing the trimmed text is used verbatim, which
/// keeps full codes like "11330102A8" intact.
pub fn extract_account_code(text: &str, pattern: &Regex) -> String {
    let trimmed = text.trim();
    match pattern.find(trimmed) {
        Some(m) if !m.as_str().trim().is_empty() => m.as_str().trim().to_string(),
        _ => trimmed.to_string(),
    }
}

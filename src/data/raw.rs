/// Provider-neutral row decoded once at the parsing boundary
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

/// One upstream row with named fields; `face_value` is only ever set for bonds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    pub date: NaiveDate,
    pub close: Option<Decimal>,
    pub high: Option<Decimal>,
    pub low: Option<Decimal>,
    pub volume: Option<Decimal>,
    pub face_value: Option<Decimal>,
}

/// Read a JSON number (or numeric string) exactly as printed upstream
pub fn decimal_from_value(value: &Value) -> Option<Decimal> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };

    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

/// Conversion of raw provider rows into canonical records
use rust_decimal::Decimal;
use tracing::warn;

use super::raw::RawRow;
use crate::types::CanonicalRecord;

/// Currency pairs settling "tomorrow" (USD000UTSTOM, CNYRUB_TOM,
/// EURUSD000TOM, ...) carry no meaningful volume
pub fn is_currency_ticker(ticker: &str) -> bool {
    let ticker = ticker.to_lowercase();
    if ticker.ends_with("utstom") {
        return true;
    }
    match ticker.strip_suffix("tom") {
        Some(head) => head.ends_with(|c: char| c == '_' || c.is_ascii_digit()),
        None => false,
    }
}

fn rescale(
    value: Option<Decimal>,
    coefficient: Decimal,
    field: &str,
    row: &RawRow,
) -> Option<Decimal> {
    let value = value?;
    let scaled = value.checked_mul(coefficient);
    if scaled.is_none() {
        warn!(
            "Dropping {} {} on {}: rescaling by {} overflows",
            field, value, row.date, coefficient
        );
    }
    scaled
}

/// Normalize one row.
///
/// Bond prices are quoted in percent of par, so when the page is a bond page
/// and the row carries a face value, close/high/low are rescaled by
/// `face_value / 100`. Null prices stay null, and a price whose rescaled
/// value does not fit a `Decimal` becomes null. Currency rows always report
/// zero volume.
pub fn normalize(row: &RawRow, is_bond: bool, is_currency: bool) -> CanonicalRecord {
    let mut close = row.close;
    let mut high = row.high;
    let mut low = row.low;

    if is_bond {
        if let Some(face_value) = row.face_value {
            let coefficient = face_value / Decimal::ONE_HUNDRED;
            close = rescale(close, coefficient, "close", row);
            high = rescale(high, coefficient, "high", row);
            low = rescale(low, coefficient, "low", row);
        }
    }

    let volume = if is_currency {
        Some(Decimal::ZERO)
    } else {
        row.volume
    };

    CanonicalRecord {
        date: row.date,
        close,
        high,
        low,
        volume,
    }
}

/// Normalize rows in upstream order
pub fn normalize_all(rows: &[RawRow], is_bond: bool, is_currency: bool) -> Vec<CanonicalRecord> {
    rows.iter()
        .map(|row| normalize(row, is_bond, is_currency))
        .collect()
}

//! Sexagesimal ("clock format") angle parsing
//!
//! Accepts text such as `23°26'16"S` and produces signed decimal degrees.
//! Minutes are divided by 60 and seconds by 360, so `23°26'16"N` yields
//! `23 + 26/60 + 16/360`. Output must stay comparable with files converted
//! by earlier releases.

use lazy_static::lazy_static;
use log::debug;
use regex::Regex;

use crate::error::{Error, Result};
use crate::table::RowSet;
use crate::types::Value;

lazy_static! {
    static ref ANGLE_PATTERN: Regex =
        Regex::new(r#"([0-9]+).*[°º]([0-9]*)['’]?([0-9]*)"?(\w*)"#).unwrap();
}

/// Minutes per degree
const MINUTE_DIVISOR: f64 = 60.0;

/// Seconds divisor
const SECOND_DIVISOR: f64 = 360.0;

/// Parses a sexagesimal angle, returning `NaN` when no degree part is found
pub fn parse_angle(text: &str) -> f64 {
    let Some(caps) = ANGLE_PATTERN.captures(text) else {
        return f64::NAN;
    };

    let Some(mut value) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) else {
        return f64::NAN;
    };

    if let Some(minutes) = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok()) {
        value += minutes / MINUTE_DIVISOR;
    }
    if let Some(seconds) = caps.get(3).and_then(|m| m.as_str().parse::<f64>().ok()) {
        value += seconds / SECOND_DIVISOR;
    }

    let hemisphere = caps.get(4).map(|m| m.as_str().to_lowercase()).unwrap_or_default();
    if hemisphere.contains('w') || hemisphere.contains('s') {
        value = -value;
    }

    value
}

/// Converts a single cell; numbers pass through, anything unparseable is null
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(*n),
        Value::Text(text) => Value::from_f64(parse_angle(text)),
        _ => Value::Null,
    }
}

/// Rewrites every cell of the named columns as decimal degrees
pub fn normalize_columns(rows: &mut RowSet, columns: &[&str]) -> Result<()> {
    for name in columns {
        let index = rows
            .column_index(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))?;

        for row in 0..rows.len() {
            let converted = normalize_value(rows.cell(row, index));
            debug!("{} {} => {}", row, rows.cell(row, index), converted);
            rows.set_cell(row, index, converted);
        }
    }
    Ok(())
}

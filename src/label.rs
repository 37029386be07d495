use crate::types::Unit;

/// Shown in place of a value when the source cell was empty.
pub const MISSING_VALUE: &str = "N/A";

/// Integral values print without a fraction (`39`, not `39.0`).
pub fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

pub fn format_with_unit(value: f64, unit: Unit) -> String {
    let number = format_value(value);
    match unit {
        Unit::Percent => format!("{} percent", number),
        Unit::Index => number,
        Unit::Currency => format!("${}", number),
    }
}

/// Value as written in legend ranges: currency keeps its symbol, percent
/// and index values are bare.
pub fn format_bound(value: f64, unit: Unit) -> String {
    match unit {
        Unit::Currency => format_with_unit(value, unit),
        Unit::Percent | Unit::Index => format_value(value),
    }
}

/// Hover text: `"<area name>: <value><unit>"`.
pub fn hover_label(area_name: &str, value: Option<f64>, unit: Unit) -> String {
    match value {
        Some(v) => format!("{}: {}", area_name, format_with_unit(v, unit)),
        None => format!("{}: {}", area_name, MISSING_VALUE),
    }
}

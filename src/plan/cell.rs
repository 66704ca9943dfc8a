//! Scalar cell values and the explicit parse functions used by the normalizer.
//!
//! Date and quantity parsing return `Result<Option<_>, CellIssue>`: `Ok(None)`
//! means "absent" (blank cell), `Err` means "present but unusable" and is the
//! caller's cue to skip and log.

use std::fmt::Write as _;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::CellIssue;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// True for `Empty` and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Display form used for descriptive fields, headers and warnings.
    pub fn display_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(text) => text.trim().to_string(),
            Self::Number(_) => format_sku(self),
            Self::Bool(value) => value.to_string(),
            Self::DateTime(value) => {
                if value.time() == NaiveTime::MIN {
                    value.format("%Y-%m-%d").to_string()
                } else {
                    value.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
            Self::Time(value) => value.format("%H:%M:%S").to_string(),
        }
    }
}

const TIME_ONLY_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M"];

/// Parse a date cell. Date-times keep only their date part.
pub fn parse_date(value: &CellValue, formats: &[String]) -> Result<Option<NaiveDate>, CellIssue> {
    match value {
        CellValue::Empty => Ok(None),
        CellValue::DateTime(value) => Ok(Some(value.date())),
        CellValue::Time(_) => Err(CellIssue::TimeOnly),
        CellValue::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            parse_date_text(text, formats).map(Some)
        }
        CellValue::Number(_) | CellValue::Bool(_) => Err(CellIssue::UnparsableDate),
    }
}

/// Try every format in order, first as a date, then as a date-time.
pub fn parse_date_text(text: &str, formats: &[String]) -> Result<NaiveDate, CellIssue> {
    let text = text.trim();
    for format in formats {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Ok(date);
        }
        if let Ok(value) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(value.date());
        }
    }
    if TIME_ONLY_FORMATS
        .iter()
        .any(|format| NaiveTime::parse_from_str(text, format).is_ok())
    {
        return Err(CellIssue::TimeOnly);
    }
    Err(CellIssue::UnparsableDate)
}

/// Render `date` with a strftime format; `None` when the format cannot render it.
pub fn format_date(date: NaiveDate, format: &str) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", date.format(format)).ok()?;
    Some(out)
}

/// Parse a quantity cell. Thousands separators are accepted in text.
pub fn parse_quantity(value: &CellValue) -> Result<Option<f64>, CellIssue> {
    let quantity = match value {
        CellValue::Empty => return Ok(None),
        CellValue::Number(value) => *value,
        CellValue::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            text.replace(',', "")
                .parse::<f64>()
                .map_err(|_| CellIssue::UnparsableQuantity)?
        }
        CellValue::Bool(_) | CellValue::DateTime(_) | CellValue::Time(_) => {
            return Err(CellIssue::UnparsableQuantity)
        }
    };
    if !quantity.is_finite() {
        return Err(CellIssue::UnparsableQuantity);
    }
    if quantity < 0.0 {
        return Err(CellIssue::NegativeQuantity);
    }
    Ok(Some(quantity))
}

/// Lenient numeric view: anything that is not a finite number counts as 0.
pub fn coerce_number(value: &CellValue) -> f64 {
    let number = match value {
        CellValue::Number(value) => *value,
        CellValue::Text(text) => text.trim().replace(',', "").parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if number.is_finite() {
        number
    } else {
        0.0
    }
}

/// Canonical SKU text. Whole numbers lose their decimal part so that codes
/// stored as numbers (and shown in scientific notation) compare as written.
pub fn format_sku(value: &CellValue) -> String {
    match value {
        CellValue::Number(number) if number.fract() == 0.0 && number.abs() < 1e18 => {
            format!("{}", *number as i64)
        }
        CellValue::Number(number) => number.to_string(),
        CellValue::Text(text) => text.trim().to_string(),
        other => other.display_text(),
    }
}

/// Empty codes and the literal `0` mark placeholder rows.
pub fn is_placeholder_sku(code: &str) -> bool {
    code.is_empty() || code == "0"
}

/// Excel serial (1900 system) to a date-time. Serials below 1 are times of day.
pub fn excel_serial_to_cell(serial: f64) -> CellValue {
    if !serial.is_finite() || !(0.0..=2_958_465.0).contains(&serial) {
        return CellValue::Number(serial);
    }
    let days = serial.trunc();
    let seconds = ((serial - days) * 86_400.0).round() as i64;
    if days == 0.0 {
        let time = NaiveTime::MIN + Duration::seconds(seconds.min(86_399));
        return CellValue::Time(time);
    }
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return CellValue::Number(serial);
    };
    let value = epoch.and_time(NaiveTime::MIN)
        + Duration::days(days as i64)
        + Duration::seconds(seconds);
    CellValue::DateTime(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formats() -> Vec<String> {
        crate::config::DateConfig::default().input_formats
    }

    #[test]
    fn date_text_accepts_configured_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 11, 14).unwrap();
        assert_eq!(parse_date_text("2024-11-14", &formats()), Ok(expected));
        assert_eq!(parse_date_text("2024/11/14", &formats()), Ok(expected));
        assert_eq!(parse_date_text("2024年11月14日", &formats()), Ok(expected));
        assert_eq!(parse_date_text("2024-11-14 08:30:00", &formats()), Ok(expected));
    }

    #[test]
    fn time_only_text_is_flagged() {
        assert_eq!(parse_date_text("08:30", &formats()), Err(CellIssue::TimeOnly));
        assert_eq!(
            parse_date(&CellValue::Time(NaiveTime::MIN), &formats()),
            Err(CellIssue::TimeOnly)
        );
    }

    #[test]
    fn blank_cells_are_absent_not_errors() {
        assert_eq!(parse_date(&CellValue::text("  "), &formats()), Ok(None));
        assert_eq!(parse_quantity(&CellValue::Empty), Ok(None));
    }

    #[test]
    fn quantity_rejects_text_and_negatives() {
        assert_eq!(parse_quantity(&CellValue::text("1,200")), Ok(Some(1200.0)));
        assert_eq!(
            parse_quantity(&CellValue::text("TBD")),
            Err(CellIssue::UnparsableQuantity)
        );
        assert_eq!(
            parse_quantity(&CellValue::Number(-5.0)),
            Err(CellIssue::NegativeQuantity)
        );
    }

    #[test]
    fn sku_numbers_render_without_decimals() {
        assert_eq!(format_sku(&CellValue::Number(1.23e12)), "1230000000000");
        assert_eq!(format_sku(&CellValue::text(" 001 ")), "001");
        assert!(is_placeholder_sku(&format_sku(&CellValue::Number(0.0))));
    }

    #[test]
    fn excel_serials_convert_to_dates_and_times() {
        let CellValue::DateTime(value) = excel_serial_to_cell(45610.0) else {
            panic!("expected date-time");
        };
        assert_eq!(value.date(), NaiveDate::from_ymd_opt(2024, 11, 14).unwrap());
        assert!(matches!(excel_serial_to_cell(0.5), CellValue::Time(_)));
    }
}

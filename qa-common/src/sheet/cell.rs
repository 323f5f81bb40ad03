//! Cell values
//!
//! Cells behave like host spreadsheet values: an empty string, zero and FALSE are
//! falsy, and whole numbers display without a fractional part.

use std::fmt;

/// A single spreadsheet cell
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
}

impl CellValue {
    /// Interpret a raw CSV field the way a spreadsheet interprets typed input
    pub fn from_csv_field(raw: &str) -> Self {
        if raw.is_empty() {
            return CellValue::Empty;
        }
        match raw {
            "TRUE" => return CellValue::Bool(true),
            "FALSE" => return CellValue::Bool(false),
            _ => {}
        }
        // Only plain decimal literals become numbers ("inf", "NaN", " 12" stay text)
        let looks_numeric = raw
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
            && raw.chars().any(|c| c.is_ascii_digit());
        if looks_numeric {
            if let Ok(n) = raw.parse::<f64>() {
                if n.is_finite() {
                    return CellValue::Number(n);
                }
            }
        }
        CellValue::Text(raw.to_string())
    }

    /// Host-style truthiness
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Empty => false,
            CellValue::Text(s) => !s.is_empty(),
            CellValue::Number(n) => *n != 0.0 && !n.is_nan(),
            CellValue::Bool(b) => *b,
        }
    }

    /// True when the cell shows nothing but whitespace
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Text as shown in the cell
    pub fn display(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(true) => "TRUE".to_string(),
            CellValue::Bool(false) => "FALSE".to_string(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Number(n as f64)
    }
}

impl From<Option<i64>> for CellValue {
    fn from(n: Option<i64>) -> Self {
        n.map(CellValue::from).unwrap_or(CellValue::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_field_parsing() {
        assert_eq!(CellValue::from_csv_field(""), CellValue::Empty);
        assert_eq!(CellValue::from_csv_field("42"), CellValue::Number(42.0));
        assert_eq!(CellValue::from_csv_field("-1.5"), CellValue::Number(-1.5));
        assert_eq!(CellValue::from_csv_field("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::from_csv_field("inf"), CellValue::Text("inf".into()));
        assert_eq!(CellValue::from_csv_field(" 12"), CellValue::Text(" 12".into()));
        assert_eq!(CellValue::from_csv_field("e"), CellValue::Text("e".into()));
    }

    #[test]
    fn test_truthiness() {
        assert!(!CellValue::Empty.is_truthy());
        assert!(!CellValue::Number(0.0).is_truthy());
        assert!(!CellValue::Text(String::new()).is_truthy());
        assert!(CellValue::Text(" ".into()).is_truthy());
        assert!(CellValue::Number(3.0).is_truthy());
    }

    #[test]
    fn test_display_integral_numbers() {
        assert_eq!(CellValue::Number(3.0).display(), "3");
        assert_eq!(CellValue::Number(1.5).display(), "1.5");
        assert_eq!(CellValue::Number(0.0).display(), "0");
    }
}

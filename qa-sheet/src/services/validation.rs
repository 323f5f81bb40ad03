//! Selection validation
//!
//! Checks the text cells of a range and, when anything fails, (re)writes a report sheet
//! listing each invalid value with its reason and A1 location.

use once_cell::sync::Lazy;
use qa_common::sheet::{CellRange, CellValue, SheetStore, Workbook};
use regex::Regex;

use crate::error::AutomationResult;

static KEYWORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^[\p{L}\p{N}\s'".-]*$"#).expect("Valid regex pattern"));

static URL_INVALID_CHAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}_.:/-]").expect("Valid regex pattern"));

/// Outcome of validating one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub reason: String,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            reason: "Valid".to_string(),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
        }
    }
}

pub trait Validator {
    /// Singular entity name used in report headers ("Keyword", "URL")
    fn entity(&self) -> &'static str;

    /// Sheet receiving the report
    fn report_sheet(&self) -> &'static str;

    fn validate(&self, value: &str) -> ValidationResult;
}

/// Letters and numbers of any script, whitespace, quotes, periods and hyphens
pub struct KeywordValidator;

impl Validator for KeywordValidator {
    fn entity(&self) -> &'static str {
        "Keyword"
    }

    fn report_sheet(&self) -> &'static str {
        "faulty_keywords"
    }

    fn validate(&self, value: &str) -> ValidationResult {
        if value.trim().is_empty() {
            return ValidationResult::invalid("Keyword is empty.");
        }
        if KEYWORD_PATTERN.is_match(value) {
            ValidationResult::valid()
        } else {
            ValidationResult::invalid("Contains disallowed characters.")
        }
    }
}

/// https-only URLs without `--` and without characters outside `_ . : / -`
pub struct UrlValidator;

impl Validator for UrlValidator {
    fn entity(&self) -> &'static str {
        "URL"
    }

    fn report_sheet(&self) -> &'static str {
        "faulty_urls"
    }

    fn validate(&self, value: &str) -> ValidationResult {
        let url = value.trim();
        if url.is_empty() {
            return ValidationResult::invalid("URL is empty or not a string.");
        }
        if !url.starts_with("https://") {
            return ValidationResult::invalid("Does not start with 'https://'.");
        }
        if url.contains("--") {
            return ValidationResult::invalid("Contains consecutive hyphens ('--').");
        }
        if let Some(found) = URL_INVALID_CHAR.find(url) {
            return ValidationResult::invalid(format!("Contains invalid character: '{}'.", found.as_str()));
        }
        ValidationResult::valid()
    }
}

/// One failed cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultyCell {
    pub value: String,
    pub reason: String,
    pub cell: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionReport {
    pub checked: usize,
    pub faulty: Vec<FaultyCell>,
    /// Report sheet written, if any value failed
    pub report_sheet: Option<String>,
}

/// Validate the non-blank text cells of `range` on `sheet`
pub fn validate_selection(
    workbook: &mut Workbook,
    sheet: &str,
    range: &CellRange,
    validator: &dyn Validator,
) -> AutomationResult<SelectionReport> {
    let rows = workbook.read_rows(sheet, range.start_row, range.num_rows())?;

    let mut faulty = Vec::new();
    for (row_offset, row) in rows.iter().enumerate() {
        for column_offset in 0..range.num_columns() {
            let Some(CellValue::Text(text)) = row.get(range.start_column - 1 + column_offset) else {
                continue;
            };
            if text.trim().is_empty() {
                continue;
            }
            let result = validator.validate(text);
            if !result.valid {
                faulty.push(FaultyCell {
                    value: text.clone(),
                    reason: result.reason,
                    cell: range.offset_a1(row_offset, column_offset),
                });
            }
        }
    }

    let checked = range.num_rows() * range.num_columns();
    if faulty.is_empty() {
        tracing::info!(sheet = %sheet, checked, entity = validator.entity(), "All selected values are valid");
        return Ok(SelectionReport {
            checked,
            faulty,
            report_sheet: None,
        });
    }

    let report_name = validator.report_sheet();
    let mut block = vec![vec![
        CellValue::from(format!("Invalid {}", validator.entity())),
        CellValue::from("Reason"),
        CellValue::from("Original Cell"),
    ]];
    block.extend(faulty.iter().map(|f| {
        vec![
            CellValue::from(f.value.as_str()),
            CellValue::from(f.reason.as_str()),
            CellValue::from(f.cell.as_str()),
        ]
    }));
    workbook.reset_sheet(report_name);
    workbook.write_block(report_name, 1, 1, &block)?;

    tracing::info!(
        sheet = %sheet,
        invalid = faulty.len(),
        report = %report_name,
        "Validation found invalid values"
    );
    Ok(SelectionReport {
        checked,
        faulty,
        report_sheet: Some(report_name.to_string()),
    })
}

//! Display formatting of QA sheets: PC filter, search-volume sort, helper columns

use qa_common::sheet::{column_index, ColumnFilter, HeaderCache, SheetStore};
use qa_common::{normalize_key, Result};

use crate::models::keyword_record::headers;

/// PC values hidden by the display filter
pub const PC_HIDDEN_VALUES: [&str; 3] = ["0", "1", "2"];

/// Helper columns hidden once a QA sheet is built
pub const QA_HIDDEN_HEADERS: &[&str] = &[
    "corrected_keyword",
    "pluralised_keyword",
    "cleanup_keyword",
    "regional_keyword",
    "keyword_sources",
    "is_subjective",
    "is_sensical",
    "Current Ranking(if applicable)",
];

/// Replace the sheet's filter with one hiding uninteresting product counts
///
/// Returns false (and leaves the sheet unfiltered) when there is no PC column.
pub fn apply_pc_filter<S: SheetStore + ?Sized>(
    store: &mut S,
    cache: &mut HeaderCache,
    sheet: &str,
) -> Result<bool> {
    if store.filter(sheet)?.is_some() {
        store.remove_filter(sheet)?;
    }

    let names = cache.headers(&*store, sheet)?;
    match column_index(&names, headers::PC) {
        Some(index) => {
            store.set_filter(sheet, ColumnFilter::hiding(index + 1, PC_HIDDEN_VALUES))?;
            tracing::info!(sheet = %sheet, column = index + 1, "Filter applied to PC column");
            Ok(true)
        }
        None => {
            tracing::warn!(sheet = %sheet, "Could not find PC column to apply filter");
            Ok(false)
        }
    }
}

/// Sort data rows by search volume, largest first
pub fn sort_by_search_volume<S: SheetStore + ?Sized>(
    store: &mut S,
    cache: &mut HeaderCache,
    sheet: &str,
) -> Result<()> {
    if store.last_row(sheet)? < 2 {
        return Ok(());
    }
    let names = cache.headers(&*store, sheet)?;
    if let Some(index) = column_index(&names, headers::SEARCH_VOLUME) {
        store.sort_rows_descending(sheet, index + 1)?;
        tracing::debug!(sheet = %sheet, "Sorted by search volume");
    }
    Ok(())
}

/// Hide the QA helper columns; returns the 1-based columns hidden
pub fn hide_qa_columns<S: SheetStore + ?Sized>(
    store: &mut S,
    cache: &mut HeaderCache,
    sheet: &str,
) -> Result<Vec<usize>> {
    let wanted: Vec<String> = QA_HIDDEN_HEADERS.iter().map(|h| normalize_key(h)).collect();
    let names = cache.headers(&*store, sheet)?;

    let mut hidden = Vec::new();
    for (index, name) in names.iter().enumerate() {
        if !wanted.contains(name) {
            continue;
        }
        match store.hide_column(sheet, index + 1) {
            Ok(()) => hidden.push(index + 1),
            Err(e) => tracing::debug!(sheet = %sheet, column = index + 1, "Could not hide column: {}", e),
        }
    }
    Ok(hidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qa_common::sheet::{CellValue, Sheet, Workbook};

    fn workbook() -> Workbook {
        Workbook::with_sheets(
            "qa",
            vec![Sheet::from_strings(
                "QA Data",
                &[
                    &["Keyword", "PC", "Search Volume", "Current Ranking(if applicable)", "is_sensical"],
                    &["a", "0", "10", "", "TRUE"],
                    &["b", "7", "300", "", ""],
                    &["c", "2", "", "", ""],
                    &["d", "0.5", "45", "", ""],
                ],
            )],
        )
    }

    #[test]
    fn test_pc_filter_hides_zero_one_two() {
        let mut wb = workbook();
        let mut cache = HeaderCache::new();
        assert!(apply_pc_filter(&mut wb, &mut cache, "QA Data").unwrap());

        let hidden: Vec<bool> = (2..=5)
            .map(|r| wb.is_row_hidden_by_filter("QA Data", r).unwrap())
            .collect();
        assert_eq!(hidden, vec![true, false, true, false]);
    }

    #[test]
    fn test_pc_filter_without_pc_column() {
        let mut wb = Workbook::with_sheets("qa", vec![Sheet::from_strings("S", &[&["keyword"], &["a"]])]);
        let mut cache = HeaderCache::new();
        assert!(!apply_pc_filter(&mut wb, &mut cache, "S").unwrap());
        assert!(wb.filter("S").unwrap().is_none());
    }

    #[test]
    fn test_sort_by_search_volume_blanks_last() {
        let mut wb = workbook();
        let mut cache = HeaderCache::new();
        sort_by_search_volume(&mut wb, &mut cache, "QA Data").unwrap();

        let order: Vec<CellValue> = wb
            .data_rows("QA Data")
            .unwrap()
            .into_iter()
            .map(|r| r[0].clone())
            .collect();
        assert_eq!(
            order,
            vec![CellValue::from("b"), CellValue::from("d"), CellValue::from("a"), CellValue::from("c")]
        );
    }

    #[test]
    fn test_hide_qa_columns_ignores_case() {
        let mut wb = workbook();
        let mut cache = HeaderCache::new();
        let hidden = hide_qa_columns(&mut wb, &mut cache, "QA Data").unwrap();
        assert_eq!(hidden, vec![4, 5]);
        assert_eq!(wb.hidden_columns("QA Data").unwrap(), vec![4, 5]);
    }
}

//! Sheet Store abstraction
//!
//! The automation never talks to a spreadsheet engine directly. It reads and writes
//! through [`SheetStore`], which exposes exactly the host operations the workflow needs:
//! header rows, rectangular row blocks, column creation/hiding, a single column filter
//! with a hidden-value set, and a descending sort.
//!
//! Rows and columns are 1-based, row 1 is always the header row.

mod a1;
mod cell;
mod header_cache;
mod workbook;

pub use a1::{cell_a1, column_letter, parse_cell, CellRange};
pub use cell::CellValue;
pub use header_cache::{column_index, HeaderCache};
pub use workbook::{Sheet, Workbook, MANIFEST_FILE_NAME};

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Filter on one column hiding rows whose displayed value is in `hidden_values`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnFilter {
    /// 1-based column
    pub column: usize,
    pub hidden_values: BTreeSet<String>,
}

impl ColumnFilter {
    pub fn hiding<I, S>(column: usize, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            column,
            hidden_values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn hides(&self, value: &CellValue) -> bool {
        self.hidden_values.contains(&value.display())
    }
}

/// Host spreadsheet operations used by the automation
pub trait SheetStore {
    /// Stable identity of the dataset (spreadsheet file)
    fn dataset_id(&self) -> &str;

    /// Human-readable dataset name
    fn dataset_name(&self) -> &str;

    /// Sheet names in tab order
    fn sheet_names(&self) -> Vec<String>;

    fn has_sheet(&self, sheet: &str) -> bool {
        self.sheet_names().iter().any(|s| s == sheet)
    }

    /// Last row holding any content (1 = header only, 0 = empty sheet)
    fn last_row(&self, sheet: &str) -> Result<usize>;

    /// Last column holding any content
    fn last_column(&self, sheet: &str) -> Result<usize>;

    /// Row 1, padded to `last_column`
    fn header_row(&self, sheet: &str) -> Result<Vec<CellValue>>;

    /// `num_rows` rows starting at `start_row`, each padded to `last_column`
    fn read_rows(&self, sheet: &str, start_row: usize, num_rows: usize) -> Result<Vec<Vec<CellValue>>>;

    /// All rows below the header
    fn data_rows(&self, sheet: &str) -> Result<Vec<Vec<CellValue>>> {
        let last_row = self.last_row(sheet)?;
        if last_row < 2 {
            return Ok(Vec::new());
        }
        self.read_rows(sheet, 2, last_row - 1)
    }

    /// Write a rectangular block with its top-left corner at (`start_row`, `start_column`)
    fn write_block(
        &mut self,
        sheet: &str,
        start_row: usize,
        start_column: usize,
        values: &[Vec<CellValue>],
    ) -> Result<()>;

    /// Add a column after the last one with `header` in row 1; returns its 1-based index
    fn append_column(&mut self, sheet: &str, header: &str) -> Result<usize>;

    fn hide_column(&mut self, sheet: &str, column: usize) -> Result<()>;

    fn hidden_columns(&self, sheet: &str) -> Result<Vec<usize>>;

    /// Replace the sheet's filter
    fn set_filter(&mut self, sheet: &str, filter: ColumnFilter) -> Result<()>;

    fn remove_filter(&mut self, sheet: &str) -> Result<()>;

    fn filter(&self, sheet: &str) -> Result<Option<ColumnFilter>>;

    fn is_row_hidden_by_filter(&self, sheet: &str, row: usize) -> Result<bool>;

    /// Sort rows 2..=last_row by `column`, descending
    fn sort_rows_descending(&mut self, sheet: &str, column: usize) -> Result<()>;

    /// Persist pending writes (no-op for purely in-memory stores)
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

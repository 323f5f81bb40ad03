//! In-memory workbook persisted as a directory of CSV files
//!
//! Layout on disk:
//! ```text
//! <dir>/workbook.json      manifest: id, name, sheet order, hidden columns, filter
//! <dir>/00_QA_Data.csv     one CSV file per sheet, no header handling
//! ```
//! A directory that holds CSV files but no manifest opens with one sheet per file,
//! ordered by file name, and the directory path as dataset id.

use super::{CellValue, ColumnFilter, SheetStore};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const MANIFEST_FILE_NAME: &str = "workbook.json";

/// One tab of a workbook
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    rows: Vec<Vec<CellValue>>,
    hidden_columns: BTreeSet<usize>,
    filter: Option<ColumnFilter>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Build a sheet from literal rows (row 1 first)
    pub fn with_rows(name: &str, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.to_string(),
            rows,
            ..Default::default()
        }
    }

    /// Convenience for fixtures: every non-empty string becomes a CSV-typed cell
    pub fn from_strings(name: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|v| CellValue::from_csv_field(v)).collect())
            .collect();
        Self::with_rows(name, rows)
    }

    pub fn last_row(&self) -> usize {
        self.rows
            .iter()
            .rposition(|r| r.iter().any(|c| !matches!(c, CellValue::Empty)))
            .map(|i| i + 1)
            .unwrap_or(0)
    }

    pub fn last_column(&self) -> usize {
        self.rows
            .iter()
            .filter_map(|r| r.iter().rposition(|c| !matches!(c, CellValue::Empty)))
            .map(|i| i + 1)
            .max()
            .unwrap_or(0)
    }

    /// Cell at 1-based (row, column); out-of-range cells read as empty
    pub fn cell(&self, row: usize, column: usize) -> CellValue {
        if row == 0 || column == 0 {
            return CellValue::Empty;
        }
        self.rows
            .get(row - 1)
            .and_then(|r| r.get(column - 1))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: CellValue) {
        if row == 0 || column == 0 {
            return;
        }
        if self.rows.len() < row {
            self.rows.resize_with(row, Vec::new);
        }
        let r = &mut self.rows[row - 1];
        if r.len() < column {
            r.resize(column, CellValue::Empty);
        }
        r[column - 1] = value;
    }

    fn padded_row(&self, row: usize, width: usize) -> Vec<CellValue> {
        (1..=width).map(|c| self.cell(row, c)).collect()
    }

    pub fn is_column_hidden(&self, column: usize) -> bool {
        self.hidden_columns.contains(&column)
    }

    fn row_hidden_by_filter(&self, row: usize) -> bool {
        match &self.filter {
            Some(filter) if row >= 2 && row <= self.last_row() => {
                filter.hides(&self.cell(row, filter.column))
            }
            _ => false,
        }
    }

    fn sort_descending(&mut self, column: usize) {
        let last_row = self.last_row();
        if last_row < 3 || column == 0 {
            return;
        }
        let data = &mut self.rows[1..last_row];
        data.sort_by(|a, b| {
            let va = a.get(column - 1).unwrap_or(&CellValue::Empty);
            let vb = b.get(column - 1).unwrap_or(&CellValue::Empty);
            compare_descending(va, vb)
        });
    }
}

/// Descending order: numbers (largest first), then text, blanks always last
fn compare_descending(a: &CellValue, b: &CellValue) -> Ordering {
    fn rank(v: &CellValue) -> u8 {
        match v {
            CellValue::Number(_) => 0,
            CellValue::Text(s) if s.trim().is_empty() => 3,
            CellValue::Text(_) | CellValue::Bool(_) => 1,
            CellValue::Empty => 3,
        }
    }
    match rank(a).cmp(&rank(b)) {
        Ordering::Equal => match (a, b) {
            (CellValue::Number(x), CellValue::Number(y)) => {
                y.partial_cmp(x).unwrap_or(Ordering::Equal)
            }
            _ => b.display().cmp(&a.display()),
        },
        other => other,
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    id: String,
    name: String,
    sheets: Vec<SheetManifest>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SheetManifest {
    name: String,
    file: String,
    #[serde(default)]
    hidden_columns: Vec<usize>,
    #[serde(default)]
    filter: Option<ColumnFilter>,
}

/// Ordered collection of sheets with a stable dataset id
#[derive(Debug, Clone)]
pub struct Workbook {
    id: String,
    name: String,
    sheets: Vec<Sheet>,
    origin: Option<PathBuf>,
}

impl Workbook {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            sheets: Vec::new(),
            origin: None,
        }
    }

    pub fn with_sheets(name: &str, sheets: Vec<Sheet>) -> Self {
        let mut workbook = Self::new(name);
        workbook.sheets = sheets;
        workbook
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory this workbook was opened from or last saved to
    pub fn origin(&self) -> Option<&Path> {
        self.origin.as_deref()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    fn require(&self, name: &str) -> Result<&Sheet> {
        self.sheet(name)
            .ok_or_else(|| Error::NotFound(format!("Sheet \"{}\" in \"{}\"", name, self.name)))
    }

    fn require_mut(&mut self, name: &str) -> Result<&mut Sheet> {
        let workbook_name = self.name.clone();
        self.sheet_mut(name)
            .ok_or_else(|| Error::NotFound(format!("Sheet \"{}\" in \"{}\"", name, workbook_name)))
    }

    /// Insert an empty sheet at `index` (clamped to the tab count)
    pub fn insert_sheet(&mut self, name: &str, index: usize) -> Result<&mut Sheet> {
        if self.sheet(name).is_some() {
            return Err(Error::Sheet(format!("Sheet \"{}\" already exists", name)));
        }
        let index = index.min(self.sheets.len());
        self.sheets.insert(index, Sheet::new(name));
        Ok(&mut self.sheets[index])
    }

    pub fn push_sheet(&mut self, sheet: Sheet) {
        self.sheets.push(sheet);
    }

    pub fn delete_sheet(&mut self, name: &str) -> Result<()> {
        let before = self.sheets.len();
        self.sheets.retain(|s| s.name != name);
        if self.sheets.len() == before {
            return Err(Error::NotFound(format!("Sheet \"{}\"", name)));
        }
        Ok(())
    }

    /// Clear a sheet's contents, filter and hidden columns (creates it when missing)
    pub fn reset_sheet(&mut self, name: &str) -> &mut Sheet {
        if let Some(pos) = self.sheets.iter().position(|s| s.name == name) {
            self.sheets[pos] = Sheet::new(name);
            &mut self.sheets[pos]
        } else {
            self.sheets.push(Sheet::new(name));
            let last = self.sheets.len() - 1;
            &mut self.sheets[last]
        }
    }

    /// Copy under a new name and a fresh dataset id, detached from any directory
    pub fn copy_as(&self, name: &str) -> Workbook {
        Workbook {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            sheets: self.sheets.clone(),
            origin: None,
        }
    }

    /// Open a workbook directory
    pub fn open(dir: &Path) -> Result<Workbook> {
        if !dir.is_dir() {
            return Err(Error::NotFound(format!("Workbook directory {}", dir.display())));
        }

        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        let mut workbook = if manifest_path.exists() {
            let content = std::fs::read_to_string(&manifest_path)?;
            let manifest: Manifest = serde_json::from_str(&content)
                .map_err(|e| Error::Sheet(format!("Malformed manifest {}: {}", manifest_path.display(), e)))?;

            let mut sheets = Vec::with_capacity(manifest.sheets.len());
            for entry in manifest.sheets {
                let mut sheet = Sheet::with_rows(&entry.name, read_csv(&dir.join(&entry.file))?);
                sheet.hidden_columns = entry.hidden_columns.into_iter().collect();
                sheet.filter = entry.filter;
                sheets.push(sheet);
            }
            Workbook {
                id: manifest.id,
                name: manifest.name,
                sheets,
                origin: None,
            }
        } else {
            let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().map(|e| e.eq_ignore_ascii_case("csv")).unwrap_or(false))
                .collect();
            files.sort();

            let mut sheets = Vec::with_capacity(files.len());
            for file in files {
                let name = file
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                sheets.push(Sheet::with_rows(&name, read_csv(&file)?));
            }
            let name = dir
                .file_name()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| dir.display().to_string());
            Workbook {
                id: dir.display().to_string(),
                name,
                sheets,
                origin: None,
            }
        };

        workbook.origin = Some(dir.to_path_buf());
        tracing::debug!(
            workbook = %workbook.name,
            sheets = workbook.sheets.len(),
            "Opened workbook from {}",
            dir.display()
        );
        Ok(workbook)
    }

    /// Save into `dir` (created if missing) and remember it as the origin
    pub fn save_to(&mut self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let manifest_path = dir.join(MANIFEST_FILE_NAME);
        let previous_files: Vec<String> = if manifest_path.exists() {
            std::fs::read_to_string(&manifest_path)
                .ok()
                .and_then(|c| serde_json::from_str::<Manifest>(&c).ok())
                .map(|m| m.sheets.into_iter().map(|s| s.file).collect())
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let mut entries = Vec::with_capacity(self.sheets.len());
        for (index, sheet) in self.sheets.iter().enumerate() {
            let file = format!("{:02}_{}.csv", index, sanitize_file_stem(&sheet.name));
            write_csv(&dir.join(&file), &sheet.rows)?;
            entries.push(SheetManifest {
                name: sheet.name.clone(),
                file,
                hidden_columns: sheet.hidden_columns.iter().copied().collect(),
                filter: sheet.filter.clone(),
            });
        }

        for stale in previous_files {
            if !entries.iter().any(|e| e.file == stale) {
                let path = dir.join(&stale);
                if path.exists() {
                    std::fs::remove_file(&path)?;
                }
            }
        }

        let manifest = Manifest {
            id: self.id.clone(),
            name: self.name.clone(),
            sheets: entries,
        };
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| Error::Internal(format!("Failed to serialize manifest: {}", e)))?;
        std::fs::write(&manifest_path, json)?;

        self.origin = Some(dir.to_path_buf());
        Ok(())
    }
}

fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

fn read_csv(path: &Path) -> Result<Vec<Vec<CellValue>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(CellValue::from_csv_field).collect());
    }
    Ok(rows)
}

fn write_csv(path: &Path, rows: &[Vec<CellValue>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    for row in rows {
        if row.is_empty() {
            writer.write_record([""])?;
        } else {
            writer.write_record(row.iter().map(CellValue::display))?;
        }
    }
    writer.flush()?;
    Ok(())
}

impl SheetStore for Workbook {
    fn dataset_id(&self) -> &str {
        &self.id
    }

    fn dataset_name(&self) -> &str {
        &self.name
    }

    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn last_row(&self, sheet: &str) -> Result<usize> {
        Ok(self.require(sheet)?.last_row())
    }

    fn last_column(&self, sheet: &str) -> Result<usize> {
        Ok(self.require(sheet)?.last_column())
    }

    fn header_row(&self, sheet: &str) -> Result<Vec<CellValue>> {
        let sheet = self.require(sheet)?;
        Ok(sheet.padded_row(1, sheet.last_column()))
    }

    fn read_rows(&self, sheet: &str, start_row: usize, num_rows: usize) -> Result<Vec<Vec<CellValue>>> {
        if start_row == 0 {
            return Err(Error::Sheet("Rows are 1-based".to_string()));
        }
        let sheet = self.require(sheet)?;
        let width = sheet.last_column();
        Ok((start_row..start_row + num_rows)
            .map(|r| sheet.padded_row(r, width))
            .collect())
    }

    fn write_block(
        &mut self,
        sheet: &str,
        start_row: usize,
        start_column: usize,
        values: &[Vec<CellValue>],
    ) -> Result<()> {
        if start_row == 0 || start_column == 0 {
            return Err(Error::Sheet("Rows and columns are 1-based".to_string()));
        }
        let width = values.first().map(Vec::len).unwrap_or(0);
        if values.iter().any(|r| r.len() != width) {
            return Err(Error::Sheet("Block rows must all have the same width".to_string()));
        }
        let sheet = self.require_mut(sheet)?;
        for (r, row) in values.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                sheet.set_cell(start_row + r, start_column + c, value.clone());
            }
        }
        Ok(())
    }

    fn append_column(&mut self, sheet: &str, header: &str) -> Result<usize> {
        let sheet = self.require_mut(sheet)?;
        let column = sheet.last_column() + 1;
        sheet.set_cell(1, column, CellValue::from(header));
        Ok(column)
    }

    fn hide_column(&mut self, sheet: &str, column: usize) -> Result<()> {
        if column == 0 {
            return Err(Error::Sheet("Columns are 1-based".to_string()));
        }
        self.require_mut(sheet)?.hidden_columns.insert(column);
        Ok(())
    }

    fn hidden_columns(&self, sheet: &str) -> Result<Vec<usize>> {
        Ok(self.require(sheet)?.hidden_columns.iter().copied().collect())
    }

    fn set_filter(&mut self, sheet: &str, filter: ColumnFilter) -> Result<()> {
        if filter.column == 0 {
            return Err(Error::Sheet("Columns are 1-based".to_string()));
        }
        self.require_mut(sheet)?.filter = Some(filter);
        Ok(())
    }

    fn remove_filter(&mut self, sheet: &str) -> Result<()> {
        self.require_mut(sheet)?.filter = None;
        Ok(())
    }

    fn filter(&self, sheet: &str) -> Result<Option<ColumnFilter>> {
        Ok(self.require(sheet)?.filter.clone())
    }

    fn is_row_hidden_by_filter(&self, sheet: &str, row: usize) -> Result<bool> {
        Ok(self.require(sheet)?.row_hidden_by_filter(row))
    }

    fn sort_rows_descending(&mut self, sheet: &str, column: usize) -> Result<()> {
        self.require_mut(sheet)?.sort_descending(column);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(dir) = self.origin.clone() {
            self.save_to(&dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Workbook {
        Workbook::with_sheets(
            "Sample",
            vec![Sheet::from_strings(
                "Data",
                &[
                    &["Keyword", "Search Volume", "PC"],
                    &["a", "10", "0"],
                    &["b", "", "5"],
                    &["c", "300", "1"],
                    &["d", "text", "2"],
                ],
            )],
        )
    }

    #[test]
    fn test_last_row_and_column() {
        let wb = sample();
        assert_eq!(wb.last_row("Data").unwrap(), 5);
        assert_eq!(wb.last_column("Data").unwrap(), 3);
        assert!(wb.last_row("Missing").is_err());
    }

    #[test]
    fn test_sort_descending_numbers_text_blanks() {
        let mut wb = sample();
        wb.sort_rows_descending("Data", 2).unwrap();
        let keys: Vec<String> = wb
            .data_rows("Data")
            .unwrap()
            .iter()
            .map(|r| r[0].display())
            .collect();
        assert_eq!(keys, vec!["c", "a", "d", "b"]);
    }

    #[test]
    fn test_filter_hides_by_display_value() {
        let mut wb = sample();
        wb.set_filter("Data", ColumnFilter::hiding(3, ["0", "1", "2"])).unwrap();
        assert!(!wb.is_row_hidden_by_filter("Data", 1).unwrap());
        assert!(wb.is_row_hidden_by_filter("Data", 2).unwrap());
        assert!(!wb.is_row_hidden_by_filter("Data", 3).unwrap());
        assert!(wb.is_row_hidden_by_filter("Data", 4).unwrap());
        wb.remove_filter("Data").unwrap();
        assert!(!wb.is_row_hidden_by_filter("Data", 2).unwrap());
    }

    #[test]
    fn test_append_column_and_write_block() {
        let mut wb = sample();
        let col = wb.append_column("Data", "Notes").unwrap();
        assert_eq!(col, 4);
        wb.write_block("Data", 2, col, &[vec!["x".into()], vec!["y".into()]]).unwrap();
        assert_eq!(wb.sheet("Data").unwrap().cell(3, 4).display(), "y");
        assert!(wb.write_block("Data", 0, 1, &[vec![CellValue::Empty]]).is_err());
    }

    #[test]
    fn test_save_and_reopen_preserves_state() {
        let dir = tempfile::tempdir().unwrap();
        let mut wb = sample();
        wb.hide_column("Data", 2).unwrap();
        wb.set_filter("Data", ColumnFilter::hiding(3, ["0"])).unwrap();
        wb.save_to(dir.path()).unwrap();

        let reopened = Workbook::open(dir.path()).unwrap();
        assert_eq!(reopened.id(), wb.id());
        assert_eq!(reopened.name(), "Sample");
        assert_eq!(reopened.hidden_columns("Data").unwrap(), vec![2]);
        assert_eq!(reopened.filter("Data").unwrap(), wb.filter("Data").unwrap());
        assert_eq!(reopened.sheet("Data").unwrap().cell(4, 2), CellValue::Number(300.0));
    }

    #[test]
    fn test_deleted_sheet_files_removed_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut wb = sample();
        wb.push_sheet(Sheet::from_strings("Extra", &[&["x"]]));
        wb.save_to(dir.path()).unwrap();
        assert!(dir.path().join("01_Extra.csv").exists());

        wb.delete_sheet("Extra").unwrap();
        wb.flush().unwrap();
        assert!(!dir.path().join("01_Extra.csv").exists());
        assert_eq!(Workbook::open(dir.path()).unwrap().sheet_names(), vec!["Data"]);
    }

    #[test]
    fn test_open_plain_csv_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_second.csv"), "keyword\nx\n").unwrap();
        std::fs::write(dir.path().join("a_first.csv"), "keyword,sv\ny,3\n").unwrap();

        let wb = Workbook::open(dir.path()).unwrap();
        assert_eq!(wb.sheet_names(), vec!["a_first", "b_second"]);
        assert_eq!(wb.dataset_id(), dir.path().display().to_string());
    }

    #[test]
    fn test_copy_as_gets_fresh_identity() {
        let wb = sample();
        let copy = wb.copy_as("Copy");
        assert_ne!(copy.id(), wb.id());
        assert_eq!(copy.sheet_names(), wb.sheet_names());
        assert!(copy.origin().is_none());
    }
}

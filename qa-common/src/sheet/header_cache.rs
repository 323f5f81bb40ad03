//! Explicit header cache
//!
//! Header rows are read often (every enrichment step, every poll tick) and change
//! rarely. Entries are keyed by `(dataset_id, sheet_name)`; whoever changes a sheet's
//! structure (new column, rebuilt sheet) invalidates the entry.

use super::SheetStore;
use crate::normalize::normalize_key;
use crate::Result;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct HeaderCache {
    entries: HashMap<(String, String), Vec<String>>,
}

impl HeaderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalized (lowercase, trimmed) headers of `sheet`, loaded on first use
    pub fn headers<S: SheetStore + ?Sized>(&mut self, store: &S, sheet: &str) -> Result<Vec<String>> {
        let key = (store.dataset_id().to_string(), sheet.to_string());
        if let Some(headers) = self.entries.get(&key) {
            return Ok(headers.clone());
        }

        let headers: Vec<String> = store
            .header_row(sheet)?
            .iter()
            .map(|h| normalize_key(&h.display()))
            .collect();
        tracing::trace!(dataset = %key.0, sheet = %key.1, "Header cache miss");
        self.entries.insert(key, headers.clone());
        Ok(headers)
    }

    pub fn invalidate(&mut self, dataset_id: &str, sheet: &str) {
        self.entries
            .remove(&(dataset_id.to_string(), sheet.to_string()));
    }

    pub fn invalidate_dataset(&mut self, dataset_id: &str) {
        self.entries.retain(|(dataset, _), _| dataset != dataset_id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 0-based index of the first header equal to `name` (headers already normalized)
pub fn column_index(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::{Sheet, Workbook};

    fn workbook() -> Workbook {
        Workbook::with_sheets(
            "wb",
            vec![Sheet::from_strings("S", &[&[" Keyword ", "PC"], &["a", "1"]])],
        )
    }

    #[test]
    fn test_headers_are_normalized() {
        let wb = workbook();
        let mut cache = HeaderCache::new();
        assert_eq!(cache.headers(&wb, "S").unwrap(), vec!["keyword", "pc"]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stale_until_invalidated() {
        let mut wb = workbook();
        let mut cache = HeaderCache::new();
        cache.headers(&wb, "S").unwrap();

        wb.append_column("S", "Notes").unwrap();
        assert_eq!(cache.headers(&wb, "S").unwrap().len(), 2);

        cache.invalidate(wb.dataset_id(), "S");
        assert_eq!(cache.headers(&wb, "S").unwrap(), vec!["keyword", "pc", "notes"]);
    }

    #[test]
    fn test_invalidate_dataset_keeps_others() {
        let a = workbook();
        let b = workbook();
        let mut cache = HeaderCache::new();
        cache.headers(&a, "S").unwrap();
        cache.headers(&b, "S").unwrap();
        cache.invalidate_dataset(a.dataset_id());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_column_index() {
        let headers = vec!["keyword".to_string(), "pc".to_string()];
        assert_eq!(column_index(&headers, "pc"), Some(1));
        assert_eq!(column_index(&headers, "url"), None);
    }
}

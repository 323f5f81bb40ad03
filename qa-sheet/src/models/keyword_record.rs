//! Logical view of a QA sheet row

use qa_common::sheet::{column_index, CellValue};
use qa_common::NormalizedKey;

/// Header names of the enrichment target columns (normalized)
pub mod headers {
    pub const KEYWORD: &str = "keyword";
    pub const PC: &str = "pc";
    pub const SEARCH_VOLUME: &str = "search volume";
    pub const URL: &str = "url";
    pub const TITLE: &str = "title";
    pub const PAGE_NAME: &str = "page_name";
    pub const PRODUCT_IDS: &str = "product_ids";
}

/// 0-based positions of the target columns; `None` when the sheet lacks one
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnLayout {
    pub keyword: Option<usize>,
    pub search_volume: Option<usize>,
    pub url: Option<usize>,
    pub title: Option<usize>,
    pub page_name: Option<usize>,
    pub product_ids: Option<usize>,
    pub product_count: Option<usize>,
}

impl ColumnLayout {
    /// Resolve from normalized headers
    pub fn from_headers(names: &[String]) -> Self {
        Self {
            keyword: column_index(names, headers::KEYWORD),
            search_volume: column_index(names, headers::SEARCH_VOLUME),
            url: column_index(names, headers::URL),
            title: column_index(names, headers::TITLE),
            page_name: column_index(names, headers::PAGE_NAME),
            product_ids: column_index(names, headers::PRODUCT_IDS),
            product_count: column_index(names, headers::PC),
        }
    }

    /// Join key of a data row; `None` when the keyword is blank or the column is missing
    pub fn keyword_key(&self, row: &[CellValue]) -> Option<NormalizedKey> {
        let cell = row.get(self.keyword?)?;
        NormalizedKey::new(&cell.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_and_keyword_key() {
        let names: Vec<String> = ["keyword", "title", "pc", "search volume"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let layout = ColumnLayout::from_headers(&names);
        assert_eq!(layout.keyword, Some(0));
        assert_eq!(layout.product_count, Some(2));
        assert_eq!(layout.url, None);

        let row = [
            CellValue::from(" Shoes "),
            CellValue::from("Shoes page"),
            CellValue::Number(4.0),
            CellValue::Number(1200.0),
        ];
        assert_eq!(layout.keyword_key(&row).unwrap().as_str(), "shoes");
        assert_eq!(layout.keyword_key(&[CellValue::from("  ")]), None);
        assert_eq!(ColumnLayout::default().keyword_key(&row), None);
    }
}

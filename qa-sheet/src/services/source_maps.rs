//! Source map builders
//!
//! Each builder scans the sheets of one source dataset, resolves its columns from header
//! aliases and produces a lookup keyed by [`NormalizedKey`]. A builder returns `None`
//! when no sheet yields a single entry; callers treat that exactly like a missing source.
//!
//! **Algorithm:**
//! 1. For each sheet in tab order read row 1 and normalize every header cell
//! 2. Resolve each column as the first header (left to right) found in its alias set
//! 3. Skip the sheet when a mandatory column is missing, or when it cannot be read
//! 4. Scan rows from row 2, skipping rows whose key is blank after normalization
//!
//! Search-volume and keyword-gen maps stop at the first productive sheet. The staging
//! map accumulates over every sheet, keeping the first non-empty value per field.

use qa_common::sheet::{CellValue, SheetStore};
use qa_common::{normalize_key, NormalizedKey, Result};
use std::collections::HashMap;

/// Keyword column aliases shared by the manual and staging sources
pub const KEYWORD_HEADER_ALIASES: &[&str] =
    &["keyword", "keywords", "original_keyword", "query", "cleanup_keyword"];

pub const SEARCH_VOLUME_HEADER_ALIASES: &[&str] = &["search volume", "traffic", "sv", "volume"];

pub const URL_HEADER_ALIASES: &[&str] = &["url", "urls", "page url", "page_url", "link"];
pub const TITLE_HEADER_ALIASES: &[&str] = &["title"];
pub const PAGE_NAME_HEADER_ALIASES: &[&str] = &["name", "page_name", "pagename"];

pub const PRODUCT_IDS_HEADER_ALIASES: &[&str] = &["product_ids", "product ids"];

/// Keyword-gen key columns: the cleaned keyword wins, the original is the fallback
pub const PRIMARY_KEYWORD_HEADER: &str = "cleanup_keyword";
pub const FALLBACK_KEYWORD_HEADER: &str = "original_keyword";

pub type SearchVolumeMap = HashMap<NormalizedKey, CellValue>;
pub type StagingMap = HashMap<NormalizedKey, StagingEntry>;
pub type KeywordGenMap = HashMap<NormalizedKey, KeywordGenEntry>;

/// Page data for a keyword, merged across staging sheets
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingEntry {
    pub url: Option<String>,
    pub title: Option<String>,
    pub page_name: Option<String>,
}

impl StagingEntry {
    fn is_empty(&self) -> bool {
        self.url.is_none() && self.title.is_none() && self.page_name.is_none()
    }
}

/// Keyword-gen row for a keyword
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordGenEntry {
    /// Serialized list of quoted product ids
    pub product_ids: Option<String>,
    /// Raw search volume cell, parsed only when applied
    pub search_volume: Option<CellValue>,
}

/// First column whose normalized header is one of `aliases`
pub fn find_alias_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
    headers.iter().position(|h| aliases.contains(&h.as_str()))
}

fn normalized_headers<S: SheetStore + ?Sized>(store: &S, sheet: &str) -> Result<Vec<String>> {
    Ok(store
        .header_row(sheet)?
        .iter()
        .map(|h| normalize_key(&h.display()))
        .collect())
}

fn cell(row: &[CellValue], column: usize) -> CellValue {
    row.get(column).cloned().unwrap_or_default()
}

fn key_at(row: &[CellValue], column: usize) -> Option<NormalizedKey> {
    row.get(column).and_then(|c| NormalizedKey::new(&c.display()))
}

/// Display text of a truthy cell
fn truthy_text(row: &[CellValue], column: Option<usize>) -> Option<String> {
    let value = cell(row, column?);
    value.is_truthy().then(|| value.display())
}

/// Search volumes from the manual-dedupe source.
///
/// Only the first sheet exposing both a keyword and a volume column is read;
/// if that sheet carries no volumes the result is `None`.
pub fn build_search_volume_map<S: SheetStore + ?Sized>(store: &S) -> Option<SearchVolumeMap> {
    for sheet in store.sheet_names() {
        match scan_search_volume_sheet(store, &sheet) {
            Ok(Some(map)) if map.is_empty() => {
                tracing::warn!(
                    dataset = %store.dataset_name(),
                    sheet = %sheet,
                    "Search volume sheet has no volumes"
                );
                return None;
            }
            Ok(Some(map)) => {
                tracing::info!(
                    dataset = %store.dataset_name(),
                    sheet = %sheet,
                    entries = map.len(),
                    "Search volume map built"
                );
                return Some(map);
            }
            Ok(None) => continue,
            Err(e) => {
                tracing::debug!(sheet = %sheet, "Skipping unreadable manual sheet: {}", e);
                continue;
            }
        }
    }
    tracing::warn!(dataset = %store.dataset_name(), "No sheet has keyword and search volume columns");
    None
}

fn scan_search_volume_sheet<S: SheetStore + ?Sized>(
    store: &S,
    sheet: &str,
) -> Result<Option<SearchVolumeMap>> {
    let headers = normalized_headers(store, sheet)?;
    let (Some(keyword_col), Some(sv_col)) = (
        find_alias_column(&headers, KEYWORD_HEADER_ALIASES),
        find_alias_column(&headers, SEARCH_VOLUME_HEADER_ALIASES),
    ) else {
        return Ok(None);
    };

    let mut map = SearchVolumeMap::new();
    for row in store.data_rows(sheet)? {
        let Some(key) = key_at(&row, keyword_col) else {
            continue;
        };
        let volume = cell(&row, sv_col);
        if volume.is_truthy() {
            map.insert(key, volume);
        }
    }
    Ok(Some(map))
}

/// URL, title and page name from every sheet of the staging source
pub fn build_staging_map<S: SheetStore + ?Sized>(store: &S) -> Option<StagingMap> {
    let mut map = StagingMap::new();

    for sheet in store.sheet_names() {
        if let Err(e) = merge_staging_sheet(store, &sheet, &mut map) {
            tracing::debug!(sheet = %sheet, "Skipping unreadable staging sheet: {}", e);
        }
    }

    if map.is_empty() {
        tracing::warn!(dataset = %store.dataset_name(), "No sheet yielded staging data");
        None
    } else {
        tracing::info!(dataset = %store.dataset_name(), entries = map.len(), "Staging map built");
        Some(map)
    }
}

fn merge_staging_sheet<S: SheetStore + ?Sized>(
    store: &S,
    sheet: &str,
    map: &mut StagingMap,
) -> Result<()> {
    let headers = normalized_headers(store, sheet)?;
    let Some(keyword_col) = find_alias_column(&headers, KEYWORD_HEADER_ALIASES) else {
        return Ok(());
    };
    let url_col = find_alias_column(&headers, URL_HEADER_ALIASES);
    let title_col = find_alias_column(&headers, TITLE_HEADER_ALIASES);
    let page_name_col = find_alias_column(&headers, PAGE_NAME_HEADER_ALIASES);

    for row in store.data_rows(sheet)? {
        let Some(key) = key_at(&row, keyword_col) else {
            continue;
        };

        let mut entry = map.get(&key).cloned().unwrap_or_default();
        if entry.url.is_none() {
            entry.url = truthy_text(&row, url_col);
        }
        if entry.title.is_none() {
            entry.title = truthy_text(&row, title_col);
        }
        if entry.page_name.is_none() {
            entry.page_name = truthy_text(&row, page_name_col);
        }

        if !entry.is_empty() {
            map.insert(key, entry);
        }
    }
    Ok(())
}

/// Product ids (and optional search volume) from the keyword-gen source
pub fn build_keyword_gen_map<S: SheetStore + ?Sized>(store: &S) -> Option<KeywordGenMap> {
    for sheet in store.sheet_names() {
        match scan_keyword_gen_sheet(store, &sheet) {
            Ok(map) if !map.is_empty() => {
                tracing::info!(
                    dataset = %store.dataset_name(),
                    sheet = %sheet,
                    entries = map.len(),
                    "Keyword gen map built"
                );
                return Some(map);
            }
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(sheet = %sheet, "Error processing keyword gen sheet: {}", e);
                continue;
            }
        }
    }
    tracing::warn!(dataset = %store.dataset_name(), "No sheet yielded product ids");
    None
}

fn scan_keyword_gen_sheet<S: SheetStore + ?Sized>(store: &S, sheet: &str) -> Result<KeywordGenMap> {
    let mut map = KeywordGenMap::new();
    let headers = normalized_headers(store, sheet)?;

    let primary_col = headers.iter().position(|h| h == PRIMARY_KEYWORD_HEADER);
    let fallback_col = headers.iter().position(|h| h == FALLBACK_KEYWORD_HEADER);
    if primary_col.is_none() && fallback_col.is_none() {
        return Ok(map);
    }
    let Some(product_ids_col) = find_alias_column(&headers, PRODUCT_IDS_HEADER_ALIASES) else {
        return Ok(map);
    };
    let sv_col = find_alias_column(&headers, SEARCH_VOLUME_HEADER_ALIASES);

    for row in store.data_rows(sheet)? {
        let key = primary_col
            .and_then(|c| key_at(&row, c))
            .or_else(|| fallback_col.and_then(|c| key_at(&row, c)));
        let Some(key) = key else {
            continue;
        };

        let search_volume = sv_col.map(|c| cell(&row, c)).filter(CellValue::is_truthy);
        map.insert(
            key,
            KeywordGenEntry {
                product_ids: truthy_text(&row, Some(product_ids_col)),
                search_volume,
            },
        );
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qa_common::sheet::{Sheet, Workbook};

    fn key(raw: &str) -> NormalizedKey {
        NormalizedKey::new(raw).unwrap()
    }

    #[test]
    fn test_alias_column_is_leftmost_match() {
        let headers: Vec<String> = ["title", "volume", "traffic"].iter().map(|s| s.to_string()).collect();
        assert_eq!(find_alias_column(&headers, SEARCH_VOLUME_HEADER_ALIASES), Some(1));
        assert_eq!(find_alias_column(&headers, URL_HEADER_ALIASES), None);
    }

    #[test]
    fn test_search_volume_reads_first_sheet_with_both_columns() {
        let wb = Workbook::with_sheets(
            "manual",
            vec![
                Sheet::from_strings("notes", &[&["comment"], &["hello"]]),
                Sheet::from_strings("main", &[&[" Keyword ", "Traffic"], &["Red Shoes", "1200"], &["blue", ""], &["  ", "10"]]),
                Sheet::from_strings("later", &[&["keyword", "sv"], &["green", "5"]]),
            ],
        );

        let map = build_search_volume_map(&wb).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("red shoes"), Some(&CellValue::Number(1200.0)));
        assert!(!map.contains_key("green"));
    }

    #[test]
    fn test_search_volume_does_not_fall_through_past_matched_sheet() {
        let wb = Workbook::with_sheets(
            "manual",
            vec![
                Sheet::from_strings("matched_but_empty", &[&["keyword", "sv"], &["shoes", ""]]),
                Sheet::from_strings("later", &[&["keyword", "sv"], &["shoes", "500"]]),
            ],
        );
        assert!(build_search_volume_map(&wb).is_none());
    }

    #[test]
    fn test_search_volume_none_when_unproductive() {
        let wb = Workbook::with_sheets("manual", vec![Sheet::from_strings("a", &[&["keyword"], &["x"]])]);
        assert!(build_search_volume_map(&wb).is_none());
    }

    #[test]
    fn test_staging_first_non_empty_field_wins() {
        let wb = Workbook::with_sheets(
            "staging",
            vec![
                Sheet::from_strings("one", &[&["keyword", "url"], &["Shoes", "A"]]),
                Sheet::from_strings("two", &[&["query", "link", "title"], &["shoes ", "B", "T"]]),
            ],
        );

        let map = build_staging_map(&wb).unwrap();
        let entry = &map[&key("shoes")];
        assert_eq!(entry.url.as_deref(), Some("A"));
        assert_eq!(entry.title.as_deref(), Some("T"));
        assert_eq!(entry.page_name, None);
    }

    #[test]
    fn test_staging_skips_keys_without_data() {
        let wb = Workbook::with_sheets(
            "staging",
            vec![Sheet::from_strings("one", &[&["keyword", "url"], &["shoes", ""]])],
        );
        assert!(build_staging_map(&wb).is_none());
    }

    #[test]
    fn test_keyword_gen_prefers_cleanup_keyword() {
        let wb = Workbook::with_sheets(
            "gen",
            vec![Sheet::from_strings(
                "gen",
                &[
                    &["original_keyword", "cleanup_keyword", "product_ids", "volume"],
                    &["Red Shoe", "red shoes", "['a', 'b']", "900"],
                    &["Blue Hat", "", "['c']", ""],
                ],
            )],
        );

        let map = build_keyword_gen_map(&wb).unwrap();
        assert!(map.contains_key("red shoes"));
        assert!(!map.contains_key("red shoe"));
        assert_eq!(map[&key("red shoes")].search_volume, Some(CellValue::Number(900.0)));
        assert_eq!(map[&key("blue hat")].product_ids.as_deref(), Some("['c']"));
        assert_eq!(map[&key("blue hat")].search_volume, None);
    }

    #[test]
    fn test_keyword_gen_stops_at_first_productive_sheet() {
        let wb = Workbook::with_sheets(
            "gen",
            vec![
                Sheet::from_strings("no ids", &[&["cleanup_keyword"], &["shoes"]]),
                Sheet::from_strings("first", &[&["cleanup_keyword", "product ids"], &["shoes", "['a']"]]),
                Sheet::from_strings(
                    "second",
                    &[&["cleanup_keyword", "product_ids"], &["shoes", "['x', 'y']"], &["hats", "['z']"]],
                ),
            ],
        );

        let map = build_keyword_gen_map(&wb).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&key("shoes")].product_ids.as_deref(), Some("['a']"));
        assert!(!map.contains_key("hats"));
    }
}

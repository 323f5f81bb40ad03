//! Enrichment merger
//!
//! Applies the three source maps to every QA row that has a keyword.
//!
//! **Precedence per row (keyword `k`):**
//! 1. Keyword-gen entry for `k`: copy product ids, derive PC from them, and take its search
//!    volume when present (which blocks step 2). No entry: PC = 0.
//! 2. Search-volume map, only if step 1 set no search volume.
//! 3. Staging entry: every non-empty url / title / page name overwrites the row.
//!
//! The pass only writes values derived from the maps, so running it twice leaves the
//! rows unchanged. Row order is untouched; sorting and filtering happen afterwards.

use qa_common::sheet::{CellValue, HeaderCache, SheetStore};
use qa_common::Result;

use crate::models::ColumnLayout;
use crate::services::sheet_format::{apply_pc_filter, sort_by_search_volume};
use crate::services::source_maps::{KeywordGenMap, SearchVolumeMap, StagingMap};

/// Lookups available to one enrichment run; `None` means the source is unavailable
#[derive(Debug, Clone, Default)]
pub struct SourceMaps {
    pub keyword_gen: Option<KeywordGenMap>,
    pub search_volume: Option<SearchVolumeMap>,
    pub staging: Option<StagingMap>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub rows: usize,
    /// Rows with a non-blank keyword
    pub keyed_rows: usize,
    pub keyword_gen_hits: usize,
    pub search_volume_hits: usize,
    pub staging_hits: usize,
}

/// Product count encoded in a serialized id list such as `['a', 'b']`
///
/// Counts single quotes and halves them; strings of two characters or fewer count 0.
/// An unbalanced quote yields a fractional count, which is kept as is.
pub fn product_count_from_ids(product_ids: Option<&str>) -> f64 {
    match product_ids {
        Some(ids) if ids.chars().count() > 2 => ids.matches('\'').count() as f64 / 2.0,
        _ => 0.0,
    }
}

/// Leading-integer parse of a cell's text; 0 and unparsable text give `None`
///
/// `"1,200"` reads as 1 and `"12.9"` as 12, mirroring how spreadsheet scripts coerce
/// volume cells.
pub fn parse_int_like(value: &CellValue) -> Option<i64> {
    let text = value.display();
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let mut parsed: i64 = 0;
    let mut seen_digit = false;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            break;
        }
        seen_digit = true;
        parsed = parsed.checked_mul(10)?.checked_add(i64::from(b - b'0'))?;
    }

    if !seen_digit || parsed == 0 {
        return None;
    }
    Some(if negative { -parsed } else { parsed })
}

fn set(row: &mut Vec<CellValue>, column: usize, value: CellValue) {
    if row.len() <= column {
        row.resize(column + 1, CellValue::Empty);
    }
    row[column] = value;
}

/// Merge the source maps into `rows` (data rows only, header excluded)
pub fn enrich_rows(rows: &mut [Vec<CellValue>], layout: &ColumnLayout, maps: &SourceMaps) -> EnrichmentStats {
    let mut stats = EnrichmentStats {
        rows: rows.len(),
        ..Default::default()
    };
    if layout.keyword.is_none() {
        return stats;
    }

    for row in rows.iter_mut() {
        let Some(key) = layout.keyword_key(row) else {
            continue;
        };
        stats.keyed_rows += 1;

        let mut volume_set = false;
        match maps.keyword_gen.as_ref().and_then(|m| m.get(&key)) {
            Some(entry) => {
                stats.keyword_gen_hits += 1;
                if let (Some(col), Some(ids)) = (layout.product_ids, entry.product_ids.as_ref()) {
                    set(row, col, CellValue::from(ids.as_str()));
                }
                if let Some(col) = layout.product_count {
                    let count = product_count_from_ids(entry.product_ids.as_deref());
                    set(row, col, CellValue::Number(count));
                }
                if let (Some(col), Some(volume)) = (layout.search_volume, entry.search_volume.as_ref()) {
                    set(row, col, CellValue::from(parse_int_like(volume)));
                    volume_set = true;
                }
            }
            None => {
                if let Some(col) = layout.product_count {
                    set(row, col, CellValue::Number(0.0));
                }
            }
        }

        if !volume_set {
            if let (Some(col), Some(volume)) = (
                layout.search_volume,
                maps.search_volume.as_ref().and_then(|m| m.get(&key)),
            ) {
                stats.search_volume_hits += 1;
                set(row, col, CellValue::from(parse_int_like(volume)));
            }
        }

        if let Some(entry) = maps.staging.as_ref().and_then(|m| m.get(&key)) {
            stats.staging_hits += 1;
            let fields = [
                (layout.url, &entry.url),
                (layout.title, &entry.title),
                (layout.page_name, &entry.page_name),
            ];
            for (column, value) in fields {
                if let (Some(col), Some(value)) = (column, value) {
                    set(row, col, CellValue::from(value.as_str()));
                }
            }
        }
    }

    stats
}

/// Enrich a sheet in place, then sort by search volume and re-apply the PC filter
pub fn enrich_sheet<S: SheetStore + ?Sized>(
    store: &mut S,
    cache: &mut HeaderCache,
    sheet: &str,
    maps: &SourceMaps,
) -> Result<EnrichmentStats> {
    let names = cache.headers(&*store, sheet)?;
    let layout = ColumnLayout::from_headers(&names);
    if layout.keyword.is_none() {
        tracing::warn!(sheet = %sheet, "No keyword column; skipping enrichment");
        return Ok(EnrichmentStats::default());
    }

    let mut rows = store.data_rows(sheet)?;
    let stats = enrich_rows(&mut rows, &layout, maps);
    if !rows.is_empty() {
        store.write_block(sheet, 2, 1, &rows)?;
    }

    tracing::info!(
        sheet = %sheet,
        rows = stats.rows,
        keyword_gen_hits = stats.keyword_gen_hits,
        search_volume_hits = stats.search_volume_hits,
        staging_hits = stats.staging_hits,
        "Enrichment applied"
    );

    sort_by_search_volume(store, cache, sheet)?;
    apply_pc_filter(store, cache, sheet)?;
    Ok(stats)
}

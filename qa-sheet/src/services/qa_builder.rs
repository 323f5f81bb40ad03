//! QA sheet construction
//!
//! **Workflow:**
//! 1. Copy the semantic workbook under the name `"<w1> <w2> QA"`
//! 2. Rebuild `Combined Final Data` into a `QA Data` tab with the fixed QA header set
//! 3. Build the keyword-gen, search-volume and staging maps (each optional)
//! 4. Enrich, sort by search volume, filter out uninteresting product counts
//! 5. Hide the QA helper columns and save the copy
//!
//! Optional sources that are missing or unreadable only cost their enrichment category.

use qa_common::config::ControlRows;
use qa_common::sheet::{cell_a1, CellValue, HeaderCache, SheetStore, Workbook};
use qa_common::normalize_key;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AutomationError, AutomationResult};
use crate::services::enrichment::{enrich_sheet, EnrichmentStats, SourceMaps};
use crate::services::sheet_format::hide_qa_columns;
use crate::services::source_maps::{
    build_keyword_gen_map, build_search_volume_map, build_staging_map, KEYWORD_HEADER_ALIASES,
};

/// Tab of the semantic workbook holding the merged keyword list
pub const SOURCE_TAB: &str = "Combined Final Data";
/// Tab created in the copy; every other tab is removed
pub const QA_TAB: &str = "QA Data";

/// Column set and order of a QA tab
pub const FINAL_HEADERS: [&str; 26] = [
    "Keyword",
    "sensical editor",
    "assortment editor",
    "corrected_keyword",
    "pluralised_keyword",
    "cleanup_keyword",
    "regional_keyword",
    "Title",
    "page_name",
    "keyword_sources",
    "is_subjective",
    "is_sensical",
    "product_ids",
    "PC",
    "Search Volume",
    "Current Ranking(if applicable)",
    "Sensical QA",
    "sandbox link",
    "Plural",
    "Assortment QA",
    "Comment",
    "Completeness QA- comments",
    "RE",
    "Nearest Removals",
    "Google Dupes",
    "URL",
];

/// Where the four source workbooks live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocations {
    pub semantic: PathBuf,
    pub manual: Option<PathBuf>,
    pub staging: Option<PathBuf>,
    pub keyword_gen: Option<PathBuf>,
}

impl SourceLocations {
    /// Read the linked source locations from one column of a control sheet
    ///
    /// Relative locations resolve against `base_dir`. The semantic source is required.
    pub fn from_control_sheet<S: SheetStore + ?Sized>(
        store: &S,
        sheet: &str,
        column: usize,
        rows: &ControlRows,
        base_dir: &Path,
    ) -> AutomationResult<Self> {
        let read = |row: usize| -> AutomationResult<Option<PathBuf>> {
            let value = store
                .read_rows(sheet, row, 1)?
                .into_iter()
                .next()
                .and_then(|r| r.get(column.saturating_sub(1)).cloned())
                .unwrap_or(CellValue::Empty);
            let text = value.display();
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            let path = PathBuf::from(text);
            Ok(Some(if path.is_absolute() { path } else { base_dir.join(path) }))
        };

        let semantic = read(rows.semantic_row)?.ok_or_else(|| {
            AutomationError::Validation(format!(
                "Could not find a link in cell {} (Semantic). This is a required file.",
                cell_a1(rows.semantic_row, column)
            ))
        })?;

        Ok(Self {
            semantic,
            manual: read(rows.manual_row)?,
            staging: read(rows.staging_row)?,
            keyword_gen: read(rows.keyword_gen_row)?,
        })
    }
}

/// Outcome of a QA sheet build
#[derive(Debug, Clone)]
pub struct QaSheetReport {
    pub name: String,
    pub output_dir: PathBuf,
    pub dataset_id: String,
    pub stats: EnrichmentStats,
    pub hidden_columns: Vec<usize>,
}

/// `"<w1> <w2> QA"` from the first two space-separated words of the source name
pub fn output_file_name(source_name: &str) -> AutomationResult<String> {
    let parts: Vec<&str> = source_name.split(' ').collect();
    if parts.len() < 2 {
        return Err(AutomationError::Validation(format!(
            "Linked sheet's name \"{}\" has an unexpected format.",
            source_name
        )));
    }
    Ok(format!("{} {} QA", parts[0], parts[1]))
}

/// Replace every tab of `workbook` with `target_tab` rebuilt from `source_tab`
///
/// The `Keyword` column takes the first keyword alias present in the source (alias
/// priority order); every other QA header copies the source column of the same name,
/// compared case-insensitively. Duplicate source headers resolve to the rightmost one.
pub fn rebuild_and_order(
    workbook: &mut Workbook,
    source_tab: &str,
    target_tab: &str,
) -> AutomationResult<usize> {
    if !workbook.has_sheet(source_tab) {
        return Err(AutomationError::Validation(format!(
            "Source tab \"{}\" not found.",
            source_tab
        )));
    }

    let last_row = workbook.last_row(source_tab)?;
    if last_row < 1 {
        return Err(AutomationError::Validation(format!(
            "Source tab \"{}\" is empty.",
            source_tab
        )));
    }
    let mut source = workbook.read_rows(source_tab, 1, last_row)?.into_iter();
    let source_headers: HashMap<String, usize> = source
        .next()
        .unwrap_or_default()
        .iter()
        .enumerate()
        .map(|(i, h)| (normalize_key(&h.display()), i))
        .collect();

    let keyword_index = KEYWORD_HEADER_ALIASES
        .iter()
        .find_map(|alias| source_headers.get(*alias).copied());
    let mapping: Vec<Option<usize>> = FINAL_HEADERS
        .iter()
        .enumerate()
        .map(|(i, header)| {
            if i == 0 {
                keyword_index
            } else {
                source_headers.get(&normalize_key(header)).copied()
            }
        })
        .collect();

    let mut rows = vec![FINAL_HEADERS.iter().map(|h| CellValue::from(*h)).collect::<Vec<_>>()];
    for source_row in source {
        rows.push(
            mapping
                .iter()
                .map(|index| {
                    index
                        .and_then(|i| source_row.get(i).cloned())
                        .unwrap_or_default()
                })
                .collect(),
        );
    }
    let data_rows = rows.len() - 1;

    workbook.insert_sheet(target_tab, 0)?;
    workbook.write_block(target_tab, 1, 1, &rows)?;

    for name in workbook.sheet_names() {
        if name != target_tab {
            workbook.delete_sheet(&name)?;
        }
    }

    tracing::info!(
        source = %source_tab,
        target = %target_tab,
        rows = data_rows,
        keyword_column = ?keyword_index.map(|i| i + 1),
        "QA tab rebuilt"
    );
    Ok(data_rows)
}

fn open_optional(label: &str, location: Option<&Path>) -> Option<Workbook> {
    let path = match location {
        Some(path) => path,
        None => {
            tracing::warn!("{} source not linked; continuing without it", label);
            return None;
        }
    };
    match Workbook::open(path) {
        Ok(workbook) => Some(workbook),
        Err(e) => {
            tracing::warn!("Could not process optional {} source: {}", label, e);
            None
        }
    }
}

/// Build, enrich and save a QA workbook under `output_root`
pub fn create_qa_sheet(sources: &SourceLocations, output_root: &Path) -> AutomationResult<QaSheetReport> {
    let semantic = Workbook::open(&sources.semantic)?;
    let name = output_file_name(semantic.name())?;
    let output_dir = output_root.join(&name);
    if output_dir.join(qa_common::sheet::MANIFEST_FILE_NAME).exists() {
        return Err(AutomationError::Validation(format!(
            "A workbook named \"{}\" already exists in {}",
            name,
            output_root.display()
        )));
    }

    tracing::info!(source = %semantic.name(), output = %name, "Creating QA sheet");
    let mut qa = semantic.copy_as(&name);
    rebuild_and_order(&mut qa, SOURCE_TAB, QA_TAB)?;

    let maps = SourceMaps {
        keyword_gen: open_optional("keyword gen", sources.keyword_gen.as_deref())
            .and_then(|wb| build_keyword_gen_map(&wb)),
        search_volume: open_optional("manual", sources.manual.as_deref())
            .and_then(|wb| build_search_volume_map(&wb)),
        staging: open_optional("staging", sources.staging.as_deref())
            .and_then(|wb| build_staging_map(&wb)),
    };

    let mut cache = HeaderCache::new();
    let stats = enrich_sheet(&mut qa, &mut cache, QA_TAB, &maps)?;
    let hidden_columns = hide_qa_columns(&mut qa, &mut cache, QA_TAB)?;

    qa.save_to(&output_dir)?;
    tracing::info!(output = %output_dir.display(), "QA sheet ready");

    Ok(QaSheetReport {
        name,
        output_dir,
        dataset_id: qa.id().to_string(),
        stats,
        hidden_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qa_common::sheet::Sheet;

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("Acme Shoes Semantic v2").unwrap(), "Acme Shoes QA");
        assert!(matches!(output_file_name("Acme"), Err(AutomationError::Validation(_))));
    }

    #[test]
    fn test_rebuild_maps_columns_and_drops_tabs() {
        let mut wb = Workbook::with_sheets(
            "Acme Shoes",
            vec![
                Sheet::from_strings("Notes", &[&["x"]]),
                Sheet::from_strings(
                    SOURCE_TAB,
                    &[
                        &["Query", "cleanup_keyword", "TITLE", "url", "Extra"],
                        &["Red Shoes", "red shoe", "Red", "https://a", "zzz"],
                    ],
                ),
            ],
        );

        let rows = rebuild_and_order(&mut wb, SOURCE_TAB, QA_TAB).unwrap();
        assert_eq!(rows, 1);
        assert_eq!(wb.sheet_names(), vec![QA_TAB.to_string()]);

        let header = wb.header_row(QA_TAB).unwrap();
        assert_eq!(header.len(), FINAL_HEADERS.len());
        let data = &wb.data_rows(QA_TAB).unwrap()[0];
        // "query" outranks "cleanup_keyword" in alias priority
        assert_eq!(data[0], CellValue::from("Red Shoes"));
        assert_eq!(data[5], CellValue::from("red shoe"));
        assert_eq!(data[7], CellValue::from("Red"));
        assert_eq!(data[25], CellValue::from("https://a"));
    }

    #[test]
    fn test_rebuild_requires_source_tab() {
        let mut wb = Workbook::with_sheets("Acme Shoes", vec![Sheet::from_strings("Other", &[&["a"]])]);
        assert!(matches!(
            rebuild_and_order(&mut wb, SOURCE_TAB, QA_TAB),
            Err(AutomationError::Validation(_))
        ));
    }

    #[test]
    fn test_locations_from_control_sheet() {
        let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); 40];
        rows[20] = vec![CellValue::Empty, CellValue::from("sources/semantic")];
        rows[35] = vec![CellValue::Empty, CellValue::from("/data/staging")];
        let wb = Workbook::with_sheets("control", vec![Sheet::with_rows("Links", rows)]);

        let locations = SourceLocations::from_control_sheet(
            &wb,
            "Links",
            2,
            &ControlRows::default(),
            Path::new("/base"),
        )
        .unwrap();
        assert_eq!(locations.semantic, PathBuf::from("/base/sources/semantic"));
        assert_eq!(locations.staging, Some(PathBuf::from("/data/staging")));
        assert_eq!(locations.manual, None);
        assert_eq!(locations.keyword_gen, None);
    }

    #[test]
    fn test_control_sheet_without_semantic_link() {
        let wb = Workbook::with_sheets("control", vec![Sheet::with_rows("Links", vec![vec![CellValue::from("x")]])]);
        let err = SourceLocations::from_control_sheet(&wb, "Links", 2, &ControlRows::default(), Path::new("/"))
            .unwrap_err();
        assert!(err.to_string().contains("B21"));
    }
}

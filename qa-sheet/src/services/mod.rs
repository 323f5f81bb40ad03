//! Business logic services for qa-sheet

pub mod enrichment;
pub mod job_client;
pub mod job_launcher;
pub mod poller;
pub mod qa_builder;
pub mod scheduler;
pub mod sheet_format;
pub mod source_maps;
pub mod validation;

pub use enrichment::{enrich_rows, enrich_sheet, EnrichmentStats, SourceMaps};
pub use job_client::{ClientError, CountJobApi, ProductCountClient, RemoteStatus};
pub use job_launcher::{JobLauncher, KeywordSelection, LaunchRequest, LaunchedJob};
pub use poller::Poller;
pub use qa_builder::{create_qa_sheet, QaSheetReport, SourceLocations};
pub use scheduler::{ScheduleHandle, Scheduler};
pub use validation::{validate_selection, KeywordValidator, UrlValidator, ValidationResult, Validator};

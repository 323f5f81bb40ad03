//! # qa-sheet
//!
//! Spreadsheet automation for keyword QA workbooks:
//! - Build a QA workbook from the semantic source and enrich it from the optional
//!   manual, staging and keyword-gen sources
//! - Submit keyword lists to the product-count service and poll the results back
//!   into the `PC` column on a persisted schedule
//! - Validate keyword and URL selections

pub mod cli;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use error::{AutomationError, AutomationResult};

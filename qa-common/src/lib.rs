//! # QA Automation Common Library
//!
//! Shared code for the QA sheet tooling and the product-count service:
//! - Error types
//! - Configuration loading and root folder resolution
//! - Keyword normalization (the join key for every source map)
//! - Sheet Store abstraction (cells, sheets, workbooks, header cache)

pub mod config;
pub mod error;
pub mod normalize;
pub mod sheet;

pub use error::{Error, Result};
pub use normalize::{normalize_key, NormalizedKey};

//! Command-line interface

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "qa-sheet")]
#[command(about = "QA sheet automation: build, enrich, count and validate keyword QA workbooks")]
#[command(version)]
pub struct Cli {
    /// Root folder holding the job-state database
    #[arg(long, global = true)]
    pub root_folder: Option<PathBuf>,

    /// Configuration file (default: platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Product-count API base URL
    #[arg(long, global = true, value_name = "URL")]
    pub api_base_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build an enriched QA workbook from the linked source workbooks
    Create(CreateArgs),

    /// Start a product-count job for a sheet's keywords
    Fetch(FetchArgs),

    /// Run one poll tick for a workbook's active job
    Poll(WorkbookArgs),

    /// Run every stored polling trigger until all of them finish
    Watch,

    /// Show the job state of a workbook
    Status(WorkbookArgs),

    /// Manage stored polling triggers
    Triggers {
        #[command(subcommand)]
        action: TriggerAction,
    },

    /// Validate a range of keyword or URL cells
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Control workbook listing the source workbooks
    #[arg(long, conflicts_with = "semantic")]
    pub control: Option<PathBuf>,

    /// Control sheet name
    #[arg(long, default_value = "Sheet1")]
    pub control_sheet: String,

    /// Control column holding the links (letter or 1-based number)
    #[arg(long, default_value = "B")]
    pub column: String,

    /// Semantic workbook (required source)
    #[arg(long, required_unless_present = "control")]
    pub semantic: Option<PathBuf>,

    /// Manual workbook (search volume source)
    #[arg(long, requires = "semantic")]
    pub manual: Option<PathBuf>,

    /// Staging workbook (url / title / page name source)
    #[arg(long, requires = "semantic")]
    pub staging: Option<PathBuf>,

    /// Keyword-gen workbook (product ids / search volume source)
    #[arg(long, requires = "semantic")]
    pub keyword_gen: Option<PathBuf>,

    /// Directory receiving the QA workbook
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct WorkbookArgs {
    /// Workbook directory
    #[arg(short, long)]
    pub workbook: PathBuf,
}

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Workbook directory
    #[arg(short, long)]
    pub workbook: PathBuf,

    /// Sheet holding the keyword column
    #[arg(short, long, default_value = "QA Data")]
    pub sheet: String,

    /// Only keywords of rows the active filter shows
    #[arg(long)]
    pub filtered: bool,

    /// Replace an active job
    #[arg(long)]
    pub force: bool,

    /// Shop id (remembered for later jobs)
    #[arg(long)]
    pub shop_id: Option<String>,

    /// Return after starting the job instead of polling until it finishes
    #[arg(long)]
    pub detach: bool,
}

#[derive(Subcommand, Debug)]
pub enum TriggerAction {
    /// List stored triggers
    List,
    /// Delete every stored trigger
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValidationTarget {
    Keywords,
    Urls,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// What the cells hold
    #[arg(value_enum)]
    pub target: ValidationTarget,

    /// Workbook directory
    #[arg(short, long)]
    pub workbook: PathBuf,

    /// Sheet holding the selection
    #[arg(short, long, default_value = "QA Data")]
    pub sheet: String,

    /// A1 range, e.g. A2:A500
    #[arg(short, long)]
    pub range: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_flags() {
        let cli = Cli::parse_from([
            "qa-sheet",
            "--api-base-url",
            "http://localhost:5731",
            "fetch",
            "-w",
            "/tmp/wb",
            "--filtered",
            "--shop-id",
            "42",
            "--detach",
        ]);
        assert_eq!(cli.api_base_url.as_deref(), Some("http://localhost:5731"));
        match cli.command {
            Command::Fetch(args) => {
                assert!(args.filtered && args.detach && !args.force);
                assert_eq!(args.sheet, "QA Data");
                assert_eq!(args.shop_id.as_deref(), Some("42"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_create_needs_a_source() {
        assert!(Cli::try_parse_from(["qa-sheet", "create"]).is_err());
        assert!(Cli::try_parse_from(["qa-sheet", "create", "--semantic", "/tmp/s"]).is_ok());
        assert!(Cli::try_parse_from(["qa-sheet", "create", "--control", "/tmp/c"]).is_ok());
    }

    #[test]
    fn test_validate_target() {
        let cli = Cli::parse_from(["qa-sheet", "validate", "urls", "-w", "/tmp/wb", "-r", "B2:B9"]);
        match cli.command {
            Command::Validate(args) => {
                assert_eq!(args.target, ValidationTarget::Urls);
                assert_eq!(args.range, "B2:B9");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}

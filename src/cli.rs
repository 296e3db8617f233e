use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::model::SiteCode;
use crate::waterfall::{
    DEFAULT_MIN_CATEGORY_SAMPLE, DEFAULT_SIGNIFICANCE_THRESHOLD_PP, RECONCILIATION_TOLERANCE_PP,
};

#[derive(Parser, Debug)]
#[command(
    name = "npsdelta",
    version,
    about = "NPS variance analysis and complaint-driver attribution"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full checkpoint-gated analysis pipeline
    Analyze(AnalyzeArgs),
    /// Inspect external artifacts for a configured run
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(long, default_value = ".cache/npsdelta")]
    pub cache_root: PathBuf,

    /// Survey CSV export with one respondent per row
    #[arg(long)]
    pub data_path: PathBuf,

    /// Brand under analysis
    #[arg(long)]
    pub player: String,

    #[arg(long, value_enum)]
    pub site: SiteCode,

    /// Baseline quarter, e.g. 25Q1
    #[arg(long)]
    pub period1: String,

    /// Comparison quarter, e.g. 25Q2
    #[arg(long)]
    pub period2: String,

    /// Minimum |delta| in percentage points for a category to count as a
    /// significant driver
    #[arg(long, default_value_t = DEFAULT_SIGNIFICANCE_THRESHOLD_PP)]
    pub significance_threshold_pp: f64,

    /// Minimum analyzed comments for a category to count as significant
    #[arg(long, default_value_t = DEFAULT_MIN_CATEGORY_SAMPLE)]
    pub min_category_sample: usize,

    /// Admissible gap between summed category deltas and the detractor
    /// component of the NPS delta
    #[arg(long, default_value_t = RECONCILIATION_TOLERANCE_PP)]
    pub reconciliation_tolerance_pp: f64,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/npsdelta")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub player: String,

    #[arg(long, value_enum)]
    pub site: SiteCode,

    #[arg(long)]
    pub period1: String,

    #[arg(long)]
    pub period2: String,
}

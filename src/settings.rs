use crate::join::MasterColumns;
use crate::pipeline::LoadOptions;
use crate::schema::{header, master};
use crate::types::Period;
use clap::Parser;
use std::path::PathBuf;

/// Trip KPI monitor: per-unit trips, revenue, distance and inactivity
#[derive(Parser, Debug, Clone)]
#[command(name = "fleet_kpi", version)]
pub struct Settings {
    /// Trip report workbook (title banner on the first row)
    pub report: PathBuf,

    /// Master workbook mapping units to a classification
    #[arg(long)]
    pub master: Option<PathBuf>,

    /// Zero-based row holding the report header
    #[arg(long, default_value_t = header::REPORT_HEADER_ROW)]
    pub header_row: usize,

    /// Unit key column of the master workbook
    #[arg(long, default_value = master::UNIT_KEY)]
    pub master_key_column: String,

    /// Classification column of the master workbook
    #[arg(long, default_value = master::CLASSIFICATION)]
    pub master_class_column: String,

    /// Month to analyse (YYYY-MM); runs once and exits when given
    #[arg(long, value_parser = parse_period)]
    pub month: Option<Period>,

    /// Business unit (single file) or classification (with --master); repeatable
    #[arg(long = "group")]
    pub groups: Vec<String>,

    /// Unit whose rows go to the audit-for-unit export (with --master)
    #[arg(long)]
    pub audit_unit: Option<String>,

    /// Directory for exported tables
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Rows shown in terminal previews
    #[arg(long, default_value_t = 20)]
    pub preview_rows: usize,

    /// Logging level
    #[arg(long, default_value = "info", value_parser = ["trace", "debug", "info", "warn", "error"])]
    pub log_level: String,

    /// Shared secret required before any file is processed
    #[arg(long, env = "FLEET_KPI_SECRET", hide_env_values = true)]
    pub access_secret: Option<String>,
}

fn parse_period(s: &str) -> Result<Period, String> {
    s.parse()
}

impl Settings {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            header_row: self.header_row,
            master_columns: MasterColumns {
                key: self.master_key_column.clone(),
                classification: self.master_class_column.clone(),
            },
        }
    }
}

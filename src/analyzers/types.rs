//! Data types used by the export pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::Table;

/// One table snapshot uploaded to S3.
#[derive(Debug, Serialize)]
pub struct TableSnapshot {
    pub(crate) table: Table,
    pub(crate) key: String,
    pub(crate) rows: usize,
    pub(crate) latest_month: Option<String>,
}

/// Top-level index of an export run, served as `exports/index.json`.
#[derive(Debug, Serialize)]
pub struct ExportIndex {
    pub(crate) generated_at: DateTime<Utc>,
    pub(crate) pqp_key: String,
    pub(crate) pqp_months: Vec<String>,
    pub(crate) snapshots: Vec<TableSnapshot>,
}


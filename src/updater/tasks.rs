//! Update tasks for the COE and car registration datasets.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::fetch::{HttpClient, fetch_source};
use crate::parser::{FieldTransform, FieldTransforms, parse_csv_with, validate_car, validate_coe};
use crate::types::{Car, Coe, Table};
use crate::updater::{Task, TaskContext, UpdaterResult};

/// Strips thousands separators; blank counts become zero.
fn numeric_field() -> FieldTransform {
    Box::new(|value: &str| {
        let cleaned: String = value.chars().filter(|c| *c != ',').collect();
        if cleaned.is_empty() { "0".to_string() } else { cleaned }
    })
}

fn numeric_transforms(columns: &[&str]) -> FieldTransforms {
    columns
        .iter()
        .map(|column| (column.to_string(), numeric_field()))
        .collect()
}

fn result_message(table: Table, inserted: usize) -> String {
    if inserted == 0 {
        format!("No new {table} records")
    } else {
        format!("{inserted} new {table} records inserted")
    }
}

/// Pulls monthly COE bidding results from `source` (URL or local path).
pub struct CoeTask {
    pub source: String,
    pub http: Arc<dyn HttpClient>,
}

#[async_trait]
impl Task for CoeTask {
    fn name(&self) -> &str {
        "coe"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<UpdaterResult> {
        let bytes = fetch_source(&self.http, &self.source)
            .await
            .with_context(|| format!("Failed to load COE dataset from {}", self.source))?;

        let transforms =
            numeric_transforms(&["quota", "bids_success", "bids_received", "premium"]);
        let records: Vec<Coe> = parse_csv_with(&bytes, &transforms)?;
        validate_coe(&records)?;

        let total = records.len();
        let inserted = ctx.store.insert_coe(records).await?;
        info!(total, inserted, "COE dataset processed");

        Ok(UpdaterResult {
            table: Table::Coe,
            records_processed: inserted,
            message: result_message(Table::Coe, inserted),
            timestamp: Utc::now(),
        })
    }
}

/// Pulls monthly new car registrations from `source` (URL or local path).
pub struct CarsTask {
    pub source: String,
    pub http: Arc<dyn HttpClient>,
}

#[async_trait]
impl Task for CarsTask {
    fn name(&self) -> &str {
        "cars"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<UpdaterResult> {
        let bytes = fetch_source(&self.http, &self.source)
            .await
            .with_context(|| format!("Failed to load cars dataset from {}", self.source))?;

        let records: Vec<Car> = parse_csv_with(&bytes, &numeric_transforms(&["number"]))?;
        validate_car(&records)?;

        let total = records.len();
        let inserted = ctx.store.insert_cars(records).await?;
        info!(total, inserted, "Cars dataset processed");

        Ok(UpdaterResult {
            table: Table::Cars,
            records_processed: inserted,
            message: result_message(Table::Cars, inserted),
            timestamp: Utc::now(),
        })
    }
}

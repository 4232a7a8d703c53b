//! Dataset updater: tasks that pull the published datasets into the store,
//! the workflow that publishes summaries when new data arrives, and the
//! schedule that drives it.
//!
//! Last-updated timestamps are explicit state: each task run receives a
//! [`TaskContext`] carrying the [`UpdateLog`], which is read before the run
//! and written only after the run succeeds.

pub mod schedule;
pub mod tasks;
pub mod workflow;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::store::DataStore;
use crate::types::Table;

/// Outcome of a single updater task run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdaterResult {
    pub table: Table,
    pub records_processed: usize,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[async_trait]
pub trait Task: Send + Sync {
    /// Stable task name, used as the update log key.
    fn name(&self) -> &str;

    async fn run(&self, ctx: &TaskContext) -> Result<UpdaterResult>;
}

/// Task name → time of the last successful run, persisted as JSON.
pub struct UpdateLog {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, DateTime<Utc>>>,
}

impl UpdateLog {
    /// Loads the log at `path`; a missing file is an empty log.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read update log {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Corrupt update log {}", path.display()))?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub async fn last_updated(&self, task: &str) -> Option<DateTime<Utc>> {
        self.entries.read().await.get(&task.to_lowercase()).copied()
    }

    /// Records a successful run and rewrites the file.
    pub async fn record(&self, task: &str, at: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(task.to_lowercase(), at);

        let json = serde_json::to_vec_pretty(&*entries)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write update log {}", self.path.display()))?;
        Ok(())
    }

    /// Health probe: the log file, if present, still parses.
    pub async fn ping(&self) -> Result<()> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }
        let content = tokio::fs::read_to_string(&self.path).await?;
        serde_json::from_str::<BTreeMap<String, DateTime<Utc>>>(&content)
            .with_context(|| format!("Corrupt update log {}", self.path.display()))?;
        Ok(())
    }
}

/// Explicit state handed to every task run.
#[derive(Clone)]
pub struct TaskContext {
    pub store: Arc<DataStore>,
    pub update_log: Arc<UpdateLog>,
}

impl TaskContext {
    pub fn new(store: Arc<DataStore>, update_log: Arc<UpdateLog>) -> Self {
        Self { store, update_log }
    }
}

/// Runs a task, recording its completion time only if it succeeds.
#[tracing::instrument(skip_all, fields(task = task.name()))]
pub async fn run_task(ctx: &TaskContext, task: &dyn Task) -> Result<UpdaterResult> {
    let last_updated = ctx.update_log.last_updated(task.name()).await;
    info!(?last_updated, "Starting updater task");

    match task.run(ctx).await {
        Ok(result) => {
            info!(
                records_processed = result.records_processed,
                message = %result.message,
                timestamp = %result.timestamp,
                "Update completed"
            );
            ctx.update_log.record(task.name(), result.timestamp).await?;
            Ok(result)
        }
        Err(e) => {
            error!(error = %e, "Update task failed");
            Err(e.context(format!("Update task '{}' failed", task.name())))
        }
    }
}

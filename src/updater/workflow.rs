//! Update-then-publish workflow.

use anyhow::Result;
use futures::future::{join_all, try_join_all};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::analyzers::summary::{cars_message, coe_message};
use crate::services::platform::{Platform, Post};
use crate::store::{CarFilter, CoeFilter};
use crate::types::Table;
use crate::updater::{Task, TaskContext, UpdaterResult, run_task};

pub const SKIPPED_MESSAGE: &str = "No records processed. Skipped publishing to social media.";
pub const PUBLISHED_MESSAGE: &str = "Data processed and published successfully";

/// Result of publishing one table's summary to one platform.
#[derive(Debug, Serialize)]
pub struct PublishOutcome {
    pub platform: String,
    pub table: Table,
    pub created_id: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowOutcome {
    pub message: String,
    pub results: Vec<UpdaterResult>,
    pub published: Vec<PublishOutcome>,
}

/// Builds the post for `table` from what is currently stored.
pub async fn build_post(ctx: &TaskContext, table: Table, site_url: &str) -> Option<Post> {
    let link = format!("{}/{}", site_url.trim_end_matches('/'), table.as_str());

    let message = match table {
        Table::Coe => coe_message(&ctx.store.coe(&CoeFilter::default()).await, &link),
        Table::Cars => cars_message(&ctx.store.cars(&CarFilter::default()).await, &link),
    }?;

    Some(Post::new(message).with_link(link))
}

/// Runs every task concurrently, then publishes a summary of each table that
/// received new records to every platform.
///
/// Any task failure aborts the workflow before publishing. Platform failures
/// are logged and reported in the outcome without affecting other platforms.
#[tracing::instrument(skip_all, fields(tasks = tasks.len(), platforms = platforms.len()))]
pub async fn run_workflow(
    ctx: &TaskContext,
    tasks: &[Arc<dyn Task>],
    platforms: &[Arc<dyn Platform>],
    site_url: &str,
) -> Result<WorkflowOutcome> {
    let results = try_join_all(tasks.iter().map(|task| run_task(ctx, task.as_ref()))).await?;

    let processed: Vec<Table> = results
        .iter()
        .filter(|r| r.records_processed > 0)
        .map(|r| r.table)
        .collect();

    if processed.is_empty() {
        info!("{SKIPPED_MESSAGE}");
        return Ok(WorkflowOutcome {
            message: SKIPPED_MESSAGE.to_string(),
            results,
            published: Vec::new(),
        });
    }

    let mut published = Vec::new();

    for table in processed {
        let Some(post) = build_post(ctx, table, site_url).await else {
            continue;
        };

        let outcomes = join_all(platforms.iter().map(|platform| {
            let post = &post;
            async move {
                match platform.publish(post).await {
                    Ok(id) => PublishOutcome {
                        platform: platform.name().to_string(),
                        table,
                        created_id: Some(id),
                        error: None,
                    },
                    Err(e) => {
                        error!(platform = platform.name(), %table, error = %e, "Publishing failed");
                        PublishOutcome {
                            platform: platform.name().to_string(),
                            table,
                            created_id: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        }))
        .await;

        published.extend(outcomes);
    }

    info!(published = published.len(), "{PUBLISHED_MESSAGE}");
    Ok(WorkflowOutcome {
        message: PUBLISHED_MESSAGE.to_string(),
        results,
        published,
    })
}

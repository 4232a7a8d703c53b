use anyhow::Result;
use tracing::info;

use crate::analyzers::pqp::{get_pqp_rates, rated_months};
use crate::analyzers::types::{ExportIndex, TableSnapshot};
use crate::analyzers::writetos3::{write_gzip_to_s3, write_json_to_s3};
use crate::output::to_csv_bytes;
use crate::store::{CarFilter, CoeFilter, DataStore};
use crate::types::Table;

pub const PQP_KEY: &str = "exports/pqp.json";
pub const INDEX_KEY: &str = "exports/index.json";

fn snapshot_key(table: Table) -> String {
    format!("exports/snapshots/{}.csv.gz", table.as_str())
}

/// Uploads current PQP rates, gzip CSV snapshots of both tables and an index
/// describing them.
#[tracing::instrument(skip(s3, store))]
pub async fn export(
    s3: &aws_sdk_s3::Client,
    bucket: &str,
    store: &DataStore,
) -> Result<ExportIndex> {
    let coe = store.coe(&CoeFilter::default()).await;
    let cars = store.cars(&CarFilter::default()).await;

    let rates = get_pqp_rates(&coe);
    write_json_to_s3(s3, bucket, PQP_KEY, &rates).await?;

    let mut snapshots = Vec::new();
    for (table, bytes, rows) in [
        (Table::Coe, to_csv_bytes(&coe)?, coe.len()),
        (Table::Cars, to_csv_bytes(&cars)?, cars.len()),
    ] {
        let key = snapshot_key(table);
        write_gzip_to_s3(s3, bucket, &key, &bytes).await?;
        info!(%table, rows, key = %key, "Snapshot uploaded");

        snapshots.push(TableSnapshot {
            table,
            key,
            rows,
            latest_month: store.latest_month(table).await,
        });
    }

    let index = ExportIndex {
        generated_at: chrono::Utc::now(),
        pqp_key: PQP_KEY.to_string(),
        pqp_months: rated_months(&rates).into_iter().map(str::to_string).collect(),
        snapshots,
    };
    write_json_to_s3(s3, bucket, INDEX_KEY, &index).await?;

    info!(bucket, "Export complete");
    Ok(index)
}

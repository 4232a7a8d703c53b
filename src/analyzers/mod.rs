//! COE rate aggregation, dataset summaries and S3 export.
//!
//! [`pqp`] computes Prevailing Quota Premium rates from bidding results,
//! [`summary`] renders the latest data as post text, and [`export`] uploads
//! rates and table snapshots to S3.

pub mod export;
pub mod pqp;
pub mod summary;
pub mod types;
pub mod utility;
pub mod writetos3;

//! Vehicle registration and COE bidding data service.
//!
//! Ingests the published COE bidding and new car registration datasets,
//! stores them, serves them over a REST API, computes Prevailing Quota
//! Premium rates and posts summaries to social media on a schedule.

pub mod analyzers;
pub mod api;
pub mod config;
pub mod fetch;
pub mod infra;
pub mod output;
pub mod parser;
pub mod services;
pub mod store;
pub mod types;
pub mod updater;

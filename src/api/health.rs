//! Health check payloads.
//!
//! Both payload types validate their invariants when constructed, so a
//! response that reaches the wire is always self-consistent.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use super::{error::AppError, state::AppState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HealthError {
    #[error("unhealthy service '{0}' must carry an error message")]
    MissingError(String),
    #[error("service '{0}' reports an error but is not unhealthy")]
    UnexpectedError(String),
    #[error("health response must include at least one service")]
    NoServices,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub status: ServiceStatus,
    /// Milliseconds.
    pub response_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceHealth {
    pub fn new(
        name: &str,
        status: ServiceStatus,
        response_time: u64,
        error: Option<String>,
    ) -> Result<Self, HealthError> {
        match (status, &error) {
            (ServiceStatus::Unhealthy, None) => return Err(HealthError::MissingError(name.into())),
            (ServiceStatus::Healthy | ServiceStatus::Unknown, Some(_)) => {
                return Err(HealthError::UnexpectedError(name.into()));
            }
            _ => {}
        }
        Ok(Self {
            status,
            response_time,
            error,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    /// Seconds since the server started.
    pub uptime: f64,
    pub services: BTreeMap<String, ServiceHealth>,
    /// Milliseconds spent on the whole check.
    pub response_time: u64,
}

impl HealthResponse {
    /// Overall status is healthy only if every service is healthy.
    pub fn new(
        services: BTreeMap<String, ServiceHealth>,
        uptime: f64,
        response_time: u64,
    ) -> Result<Self, HealthError> {
        if services.is_empty() {
            return Err(HealthError::NoServices);
        }

        let status = if services.values().all(|s| s.status == ServiceStatus::Healthy) {
            ServiceStatus::Healthy
        } else {
            ServiceStatus::Unhealthy
        };

        Ok(Self {
            status,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION"),
            uptime,
            services,
            response_time,
        })
    }

    pub fn status_code(&self) -> StatusCode {
        match self.status {
            ServiceStatus::Healthy => StatusCode::OK,
            _ => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Times a probe and turns its outcome into a [`ServiceHealth`].
pub async fn probe<F>(name: &str, check: F) -> Result<ServiceHealth, HealthError>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let start = Instant::now();
    let outcome = check.await;
    let elapsed = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => ServiceHealth::new(name, ServiceStatus::Healthy, elapsed, None),
        Err(e) => ServiceHealth::new(
            name,
            ServiceStatus::Unhealthy,
            elapsed,
            Some(format!("{e:#}")),
        ),
    }
}

pub async fn health_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let start = Instant::now();

    let mut services = BTreeMap::new();
    services.insert(
        "database".to_string(),
        probe("database", state.store.ping())
            .await
            .map_err(anyhow::Error::from)?,
    );
    services.insert(
        "updateLog".to_string(),
        probe("updateLog", state.update_log.ping())
            .await
            .map_err(anyhow::Error::from)?,
    );

    let response = HealthResponse::new(
        services,
        state.started_at.elapsed().as_secs_f64(),
        start.elapsed().as_millis() as u64,
    )
    .map_err(anyhow::Error::from)?;

    Ok((response.status_code(), Json(response)))
}

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{error::AppError, state::AppState};
use crate::analyzers::pqp::{PqpRates, get_pqp_rates};
use crate::store::{CarFilter, CoeFilter};
use crate::types::{Car, Coe, FuelType, Table, VehicleClass, is_valid_month};

/// Every successful response is wrapped as `{ "data": ... }`.
#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    fn json(data: T) -> Json<Self> {
        Json(Self { data })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    pub month: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CarsQuery {
    pub month: Option<String>,
    pub fuel_type: Option<String>,
    pub make: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CoeQuery {
    pub month: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TableQuery {
    pub table: Option<Table>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct LatestMonths {
    pub cars: Option<String>,
    pub coe: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastUpdated {
    pub task: String,
    pub last_updated: DateTime<Utc>,
}

fn check_month(field: &str, month: Option<String>) -> Result<Option<String>, AppError> {
    match month {
        Some(m) if !is_valid_month(&m) => Err(AppError::BadRequest(format!(
            "{field} must be YYYY-MM, got '{m}'"
        ))),
        other => Ok(other),
    }
}

impl TryFrom<CarsQuery> for CarFilter {
    type Error = AppError;

    fn try_from(q: CarsQuery) -> Result<Self, Self::Error> {
        let fuel_type = q
            .fuel_type
            .map(|f| f.parse::<FuelType>())
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(CarFilter {
            month: check_month("month", q.month)?,
            fuel_type,
            make: q.make,
        })
    }
}

impl TryFrom<CoeQuery> for CoeFilter {
    type Error = AppError;

    fn try_from(q: CoeQuery) -> Result<Self, Self::Error> {
        let category = q
            .category
            .map(|c| c.parse::<VehicleClass>())
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        Ok(CoeFilter {
            month: check_month("month", q.month)?,
            from: check_month("from", q.from)?,
            to: check_month("to", q.to)?,
            category,
        })
    }
}

/// Petrol car registrations for a month, the latest month if none is given.
pub async fn root_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<MonthQuery>,
) -> Result<Json<DataResponse<Vec<Car>>>, AppError> {
    let month = match check_month("month", q.month)? {
        Some(m) => Some(m),
        None => state.store.latest_month(Table::Cars).await,
    };

    let Some(month) = month else {
        return Ok(DataResponse::json(Vec::new()));
    };

    let filter = CarFilter {
        month: Some(month),
        fuel_type: Some(FuelType::Petrol),
        make: None,
    };
    Ok(DataResponse::json(state.store.cars(&filter).await))
}

pub async fn cars_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CarsQuery>,
) -> Result<Json<DataResponse<Vec<Car>>>, AppError> {
    let filter = CarFilter::try_from(q)?;
    Ok(DataResponse::json(state.store.cars(&filter).await))
}

pub async fn coe_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<CoeQuery>,
) -> Result<Json<DataResponse<Vec<Coe>>>, AppError> {
    let filter = CoeFilter::try_from(q)?;
    Ok(DataResponse::json(state.store.coe(&filter).await))
}

pub async fn coe_latest_handler(
    State(state): State<Arc<AppState>>,
) -> Json<DataResponse<Vec<Coe>>> {
    DataResponse::json(state.store.latest_coe().await)
}

pub async fn pqp_handler(State(state): State<Arc<AppState>>) -> Json<DataResponse<PqpRates>> {
    let records = state.store.coe(&CoeFilter::default()).await;
    DataResponse::json(get_pqp_rates(&records))
}

pub async fn months_handler(
    State(state): State<Arc<AppState>>,
    Query(q): Query<TableQuery>,
) -> Json<DataResponse<Vec<String>>> {
    let table = q.table.unwrap_or(Table::Cars);
    DataResponse::json(state.store.months(table).await)
}

pub async fn latest_months_handler(
    State(state): State<Arc<AppState>>,
) -> Json<DataResponse<LatestMonths>> {
    DataResponse::json(LatestMonths {
        cars: state.store.latest_month(Table::Cars).await,
        coe: state.store.latest_month(Table::Coe).await,
    })
}

pub async fn updated_handler(
    State(state): State<Arc<AppState>>,
    Path(task): Path<String>,
) -> Result<Json<DataResponse<LastUpdated>>, AppError> {
    let last_updated = state
        .update_log
        .last_updated(&task)
        .await
        .ok_or_else(|| AppError::NotFound(format!("no successful update recorded for '{task}'")))?;

    Ok(DataResponse::json(LastUpdated {
        task: task.to_lowercase(),
        last_updated,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DataStore;
    use crate::updater::UpdateLog;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    async fn state(name: &str) -> (Arc<AppState>, PathBuf) {
        let dir = env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&dir);
        let store = Arc::new(DataStore::open(&dir).unwrap());
        let log = Arc::new(UpdateLog::load(dir.join("last_updated.json")).unwrap());

        store
            .insert_cars(vec![
                Car {
                    month: "2025-01".to_string(),
                    make: "TOYOTA".to_string(),
                    fuel_type: FuelType::Petrol,
                    vehicle_type: "Saloon".to_string(),
                    number: 10,
                },
                Car {
                    month: "2025-01".to_string(),
                    make: "BYD".to_string(),
                    fuel_type: FuelType::Electric,
                    vehicle_type: "Saloon".to_string(),
                    number: 7,
                },
                Car {
                    month: "2024-12".to_string(),
                    make: "HONDA".to_string(),
                    fuel_type: FuelType::Petrol,
                    vehicle_type: "Hatchback".to_string(),
                    number: 3,
                },
            ])
            .await
            .unwrap();

        (AppState::new(store, log, "token".to_string()), dir)
    }

    #[tokio::test]
    async fn test_root_defaults_to_latest_petrol() {
        let (state, dir) = state("coe_trends_routes_root").await;

        let Json(resp) = root_handler(State(state.clone()), Query(MonthQuery::default()))
            .await
            .unwrap();
        assert_eq!(resp.data.len(), 1);
        assert_eq!(resp.data[0].make, "TOYOTA");

        let Json(resp) = root_handler(
            State(state),
            Query(MonthQuery {
                month: Some("2024-12".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.data[0].make, "HONDA");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_cars_rejects_bad_query() {
        let (state, dir) = state("coe_trends_routes_cars").await;

        let err = cars_handler(
            State(state.clone()),
            Query(CarsQuery {
                fuel_type: Some("steam".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = cars_handler(
            State(state.clone()),
            Query(CarsQuery {
                month: Some("2025-1".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let Json(resp) = cars_handler(
            State(state),
            Query(CarsQuery {
                fuel_type: Some("electric".to_string()),
                ..Default::default()
            }),
        )
        .await
        .unwrap();
        assert_eq!(resp.data.len(), 1);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_months_and_latest() {
        let (state, dir) = state("coe_trends_routes_months").await;

        let Json(resp) = months_handler(State(state.clone()), Query(TableQuery::default())).await;
        assert_eq!(resp.data, vec!["2025-01", "2024-12"]);

        let Json(resp) = latest_months_handler(State(state)).await;
        assert_eq!(
            resp.data,
            LatestMonths {
                cars: Some("2025-01".to_string()),
                coe: None
            }
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_updated_not_found_then_found() {
        let (state, dir) = state("coe_trends_routes_updated").await;

        let err = updated_handler(State(state.clone()), Path("cars".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let now = Utc::now();
        state.update_log.record("cars", now).await.unwrap();
        let Json(resp) = updated_handler(State(state), Path("Cars".to_string()))
            .await
            .unwrap();
        assert_eq!(resp.data.last_updated, now);
        assert_eq!(resp.data.task, "cars");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_pqp_empty_store() {
        let (state, dir) = state("coe_trends_routes_pqp").await;
        let Json(resp) = pqp_handler(State(state)).await;
        assert!(resp.data.is_empty());
        fs::remove_dir_all(&dir).unwrap();
    }
}

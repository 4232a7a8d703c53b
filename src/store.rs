//! CSV-backed store for COE results and car registrations.
//!
//! Each table lives in `<data_dir>/<table>.csv`. Rows are loaded into memory
//! on open; inserts are de-duplicated by record key and appended to disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::output::append_records;
use crate::parser::read_csv;
use crate::types::{Car, Coe, FuelType, Table, VehicleClass};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CoeFilter {
    pub month: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub category: Option<VehicleClass>,
}

impl CoeFilter {
    fn matches(&self, coe: &Coe) -> bool {
        self.month.as_ref().is_none_or(|m| &coe.month == m)
            && self.from.as_ref().is_none_or(|f| coe.month.as_str() >= f.as_str())
            && self.to.as_ref().is_none_or(|t| coe.month.as_str() <= t.as_str())
            && self.category.is_none_or(|c| coe.vehicle_class == c)
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct CarFilter {
    pub month: Option<String>,
    pub fuel_type: Option<FuelType>,
    pub make: Option<String>,
}

impl CarFilter {
    fn matches(&self, car: &Car) -> bool {
        self.month.as_ref().is_none_or(|m| &car.month == m)
            && self.fuel_type.is_none_or(|f| car.fuel_type == f)
            && self
                .make
                .as_ref()
                .is_none_or(|m| car.make.eq_ignore_ascii_case(m))
    }
}

#[derive(Default)]
struct Tables {
    coe: Vec<Coe>,
    cars: Vec<Car>,
}

pub struct DataStore {
    dir: PathBuf,
    tables: RwLock<Tables>,
}

impl DataStore {
    /// Opens the store in `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data dir {}", dir.display()))?;

        let coe = load_table(&dir, Table::Coe)?;
        let cars = load_table(&dir, Table::Cars)?;
        info!(dir = %dir.display(), coe = coe.len(), cars = cars.len(), "Data store opened");

        Ok(Self {
            dir,
            tables: RwLock::new(Tables { coe, cars }),
        })
    }

    pub fn table_path(&self, table: Table) -> PathBuf {
        table_path(&self.dir, table)
    }

    /// Inserts COE rows not already stored. Returns the number inserted.
    pub async fn insert_coe(&self, records: Vec<Coe>) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let mut seen: HashSet<_> = tables.coe.iter().map(Coe::key).collect();

        let fresh: Vec<Coe> = records.into_iter().filter(|c| seen.insert(c.key())).collect();
        let fresh = append_blocking(self.table_path(Table::Coe), fresh).await?;

        debug!(inserted = fresh.len(), "COE rows inserted");
        let inserted = fresh.len();
        tables.coe.extend(fresh);
        Ok(inserted)
    }

    /// Inserts car rows not already stored. Returns the number inserted.
    pub async fn insert_cars(&self, records: Vec<Car>) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let mut seen: HashSet<_> = tables.cars.iter().map(Car::key).collect();

        let fresh: Vec<Car> = records.into_iter().filter(|c| seen.insert(c.key())).collect();
        let fresh = append_blocking(self.table_path(Table::Cars), fresh).await?;

        debug!(inserted = fresh.len(), "Car rows inserted");
        let inserted = fresh.len();
        tables.cars.extend(fresh);
        Ok(inserted)
    }

    /// COE results matching `filter`, most recent month and round first.
    pub async fn coe(&self, filter: &CoeFilter) -> Vec<Coe> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Coe> = tables.coe.iter().filter(|c| filter.matches(c)).cloned().collect();
        rows.sort_by(|a, b| {
            (&b.month, b.bidding_no, a.vehicle_class)
                .cmp(&(&a.month, a.bidding_no, b.vehicle_class))
        });
        rows
    }

    /// All COE results of the most recent month.
    pub async fn latest_coe(&self) -> Vec<Coe> {
        match self.latest_month(Table::Coe).await {
            Some(month) => {
                self.coe(&CoeFilter {
                    month: Some(month),
                    ..Default::default()
                })
                .await
            }
            None => Vec::new(),
        }
    }

    pub async fn cars(&self, filter: &CarFilter) -> Vec<Car> {
        let tables = self.tables.read().await;
        tables.cars.iter().filter(|c| filter.matches(c)).cloned().collect()
    }

    /// Distinct months present in `table`, most recent first.
    pub async fn months(&self, table: Table) -> Vec<String> {
        let tables = self.tables.read().await;
        let months: BTreeSet<&str> = match table {
            Table::Coe => tables.coe.iter().map(|c| c.month.as_str()).collect(),
            Table::Cars => tables.cars.iter().map(|c| c.month.as_str()).collect(),
        };
        months.into_iter().rev().map(str::to_string).collect()
    }

    pub async fn latest_month(&self, table: Table) -> Option<String> {
        self.months(table).await.into_iter().next()
    }

    /// Health probe: the data directory still exists.
    pub async fn ping(&self) -> Result<()> {
        let metadata = tokio::fs::metadata(&self.dir)
            .await
            .with_context(|| format!("Data dir {} unreadable", self.dir.display()))?;
        if !metadata.is_dir() {
            anyhow::bail!("Data dir {} is not a directory", self.dir.display());
        }
        Ok(())
    }
}

fn table_path(dir: &Path, table: Table) -> PathBuf {
    dir.join(format!("{}.csv", table.as_str()))
}

/// Appends on the blocking pool and hands the records back.
async fn append_blocking<T>(path: PathBuf, records: Vec<T>) -> Result<Vec<T>>
where
    T: Serialize + Send + 'static,
{
    tokio::task::spawn_blocking(move || append_records(&path, &records).map(|()| records)).await?
}

fn load_table<T: serde::de::DeserializeOwned>(dir: &Path, table: Table) -> Result<Vec<T>> {
    let path = table_path(dir, table);
    if !path.exists() {
        return Ok(Vec::new());
    }
    read_csv(&path)
}

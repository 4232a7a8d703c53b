//! Prevailing Quota Premium (PQP) rates.
//!
//! The PQP of a category for a month is the average COE premium over a
//! trailing window of bidding months ending at that month. A month only gets
//! a rate once the category has a full window of history behind it.

use crate::analyzers::utility::ceil_mean;
use crate::types::{Coe, VehicleClass};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Month → category → PQP rate.
pub type PqpRates = BTreeMap<String, BTreeMap<VehicleClass, u64>>;

/// Number of bidding months averaged into a rate (two rounds each).
pub const DEFAULT_WINDOW_MONTHS: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PqpConfigError {
    #[error("PQP window must span at least one month")]
    EmptyWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PqpConfig {
    window_months: usize,
}

impl PqpConfig {
    pub fn new(window_months: usize) -> Result<Self, PqpConfigError> {
        if window_months == 0 {
            return Err(PqpConfigError::EmptyWindow);
        }
        Ok(Self { window_months })
    }

    pub fn window_months(&self) -> usize {
        self.window_months
    }
}

impl Default for PqpConfig {
    fn default() -> Self {
        Self {
            window_months: DEFAULT_WINDOW_MONTHS,
        }
    }
}

/// Computes PQP rates with the standard three-month window.
pub fn get_pqp_rates(records: &[Coe]) -> PqpRates {
    get_pqp_rates_with(records, &PqpConfig::default())
}

/// Computes PQP rates for every (month, category) with a complete window.
///
/// Input order is irrelevant and categories are independent of each other.
/// Averages are rounded up to the next whole dollar.
pub fn get_pqp_rates_with(records: &[Coe], config: &PqpConfig) -> PqpRates {
    let mut by_class: BTreeMap<VehicleClass, BTreeMap<&str, Vec<u64>>> = BTreeMap::new();

    for coe in records {
        by_class
            .entry(coe.vehicle_class)
            .or_default()
            .entry(coe.month.as_str())
            .or_default()
            .push(coe.premium);
    }

    let mut rates = PqpRates::new();

    for (class, months) in by_class {
        // most recent month first
        let ordered: Vec<(&str, &Vec<u64>)> =
            months.iter().rev().map(|(m, p)| (*m, p)).collect();

        for (i, window) in ordered.windows(config.window_months).enumerate() {
            let premiums: Vec<u64> = window
                .iter()
                .flat_map(|(_, premiums)| premiums.iter().copied())
                .collect();

            if let Some(rate) = ceil_mean(&premiums) {
                rates
                    .entry(ordered[i].0.to_string())
                    .or_default()
                    .insert(class, rate);
            }
        }
    }

    rates
}

/// Months for which a rate can be computed, most recent first.
pub fn rated_months(rates: &PqpRates) -> Vec<&str> {
    let months: BTreeSet<&str> = rates.keys().map(String::as_str).collect();
    months.into_iter().rev().collect()
}

//! Human-readable summaries of the latest data, used as social media posts.

use crate::analyzers::pqp::get_pqp_rates;
use crate::types::{Car, Coe, FuelType, VehicleClass};
use serde::Serialize;
use std::collections::BTreeMap;

/// Registrations per fuel type for one month.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct FuelTypeBreakdown {
    pub month: String,
    pub total: u64,
    pub fuel_types: BTreeMap<FuelType, u64>,
}

/// Sums registrations per fuel type for `month`. Returns `None` when the month
/// has no rows.
pub fn cars_by_fuel_type(cars: &[Car], month: &str) -> Option<FuelTypeBreakdown> {
    let mut fuel_types = BTreeMap::new();
    let mut total = 0u64;

    for car in cars.iter().filter(|c| c.month == month) {
        *fuel_types.entry(car.fuel_type).or_insert(0u64) += car.number as u64;
        total += car.number as u64;
    }

    if fuel_types.is_empty() {
        return None;
    }

    Some(FuelTypeBreakdown {
        month: month.to_string(),
        total,
        fuel_types,
    })
}

/// Builds the post for the latest month of car registrations.
pub fn cars_message(cars: &[Car], link: &str) -> Option<String> {
    let month = cars.iter().map(|c| c.month.as_str()).max()?;
    let breakdown = cars_by_fuel_type(cars, month)?;

    let mut lines = vec![format!(
        "New car registrations for {}: {} in total",
        breakdown.month, breakdown.total
    )];

    for (fuel_type, count) in &breakdown.fuel_types {
        let share = *count as f64 / breakdown.total as f64 * 100.0;
        lines.push(format!("{fuel_type}: {count} ({share:.1}%)"));
    }

    lines.push(String::new());
    lines.push(format!("More at {link}"));

    Some(lines.join("\n"))
}

/// Builds the post for the latest COE bidding round, with PQP rates when
/// enough history is available.
pub fn coe_message(records: &[Coe], link: &str) -> Option<String> {
    let (month, bidding_no) = records
        .iter()
        .map(|c| (c.month.as_str(), c.bidding_no))
        .max()?;

    let mut latest: Vec<&Coe> = records
        .iter()
        .filter(|c| c.month == month && c.bidding_no == bidding_no)
        .collect();
    latest.sort_by_key(|c| c.vehicle_class);

    let mut lines = vec![format!("COE results for {month}, bidding round {bidding_no}")];

    for coe in latest {
        lines.push(format!(
            "{}: ${} ({} bids for a quota of {})",
            coe.vehicle_class, coe.premium, coe.bids_received, coe.quota
        ));
    }

    let rates = get_pqp_rates(records);
    if let Some(month_rates) = rates.get(month) {
        lines.push(String::new());
        lines.push("PQP rates:".to_string());
        for class in VehicleClass::ALL {
            if let Some(rate) = month_rates.get(&class) {
                lines.push(format!("{class}: ${rate}"));
            }
        }
    }

    lines.push(String::new());
    lines.push(format!("More at {link}"));

    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(month: &str, fuel_type: FuelType, number: u32) -> Car {
        Car {
            month: month.to_string(),
            make: "TOYOTA".to_string(),
            fuel_type,
            vehicle_type: "Saloon".to_string(),
            number,
        }
    }

    #[test]
    fn test_cars_by_fuel_type_sums_month_only() {
        let cars = vec![
            car("2025-01", FuelType::Petrol, 10),
            car("2025-01", FuelType::Petrol, 5),
            car("2025-01", FuelType::Electric, 5),
            car("2024-12", FuelType::Petrol, 100),
        ];

        let breakdown = cars_by_fuel_type(&cars, "2025-01").unwrap();
        assert_eq!(breakdown.total, 20);
        assert_eq!(breakdown.fuel_types[&FuelType::Petrol], 15);
        assert_eq!(breakdown.fuel_types[&FuelType::Electric], 5);
        assert!(cars_by_fuel_type(&cars, "2023-01").is_none());
    }

    #[test]
    fn test_cars_message_uses_latest_month() {
        let cars = vec![
            car("2024-12", FuelType::Petrol, 100),
            car("2025-01", FuelType::Electric, 4),
        ];
        let message = cars_message(&cars, "https://example.com").unwrap();
        assert!(message.starts_with("New car registrations for 2025-01: 4 in total"));
        assert!(message.contains("Electric: 4 (100.0%)"));
        assert!(message.ends_with("More at https://example.com"));
    }

    #[test]
    fn test_coe_message_latest_round() {
        let records = vec![
            Coe {
                month: "2025-01".to_string(),
                bidding_no: 1,
                vehicle_class: VehicleClass::CategoryA,
                quota: 1034,
                bids_success: 1034,
                bids_received: 1381,
                premium: 93699,
            },
            Coe {
                month: "2025-01".to_string(),
                bidding_no: 2,
                vehicle_class: VehicleClass::CategoryA,
                quota: 1069,
                bids_success: 1058,
                bids_received: 1484,
                premium: 93601,
            },
        ];

        let message = coe_message(&records, "https://example.com").unwrap();
        assert!(message.contains("bidding round 2"));
        assert!(message.contains("Category A: $93601 (1484 bids for a quota of 1069)"));
        assert!(!message.contains("PQP rates"));
    }

    #[test]
    fn test_messages_empty_input() {
        assert!(cars_message(&[], "x").is_none());
        assert!(coe_message(&[], "x").is_none());
    }
}

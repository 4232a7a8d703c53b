//! CSV parsing for the published datasets.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::types::{Car, Coe, is_valid_month};

/// Per-column transform applied to the raw (trimmed) field before it is
/// deserialized.
pub type FieldTransform = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Column name → transform.
pub type FieldTransforms = HashMap<String, FieldTransform>;

/// Parses CSV bytes with a header row into typed records.
///
/// Every field is trimmed and blank lines are skipped.
pub fn parse_csv<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>> {
    parse_csv_with(bytes, &FieldTransforms::new())
}

/// Like [`parse_csv`], but runs `transforms` over the named columns first.
pub fn parse_csv_with<T: DeserializeOwned>(
    bytes: &[u8],
    transforms: &FieldTransforms,
) -> Result<Vec<T>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers = rdr.headers().context("Failed to read CSV header")?.clone();
    let mut records = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let raw = result.with_context(|| format!("Malformed CSV row {}", line + 1))?;
        if raw.iter().all(str::is_empty) {
            continue;
        }

        let row = if transforms.is_empty() {
            raw
        } else {
            apply_transforms(&headers, &raw, transforms)
        };

        let record: T = row
            .deserialize(Some(&headers))
            .with_context(|| format!("Invalid CSV row {}", line + 1))?;
        records.push(record);
    }

    debug!(rows = records.len(), "Parsed CSV");
    Ok(records)
}

fn apply_transforms(
    headers: &StringRecord,
    row: &StringRecord,
    transforms: &FieldTransforms,
) -> StringRecord {
    headers
        .iter()
        .zip(row.iter())
        .map(|(name, value)| match transforms.get(name) {
            Some(transform) => transform(value),
            None => value.to_string(),
        })
        .collect()
}

/// Reads and parses a CSV file.
pub fn read_csv<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_csv(&bytes)
}

/// Rejects COE rows that cannot be aggregated.
pub fn validate_coe(records: &[Coe]) -> Result<()> {
    for coe in records {
        if !is_valid_month(&coe.month) {
            anyhow::bail!("Invalid month '{}' in COE results", coe.month);
        }
        if coe.bidding_no == 0 {
            anyhow::bail!("Invalid bidding round 0 for {}", coe.month);
        }
    }
    Ok(())
}

pub fn validate_car(records: &[Car]) -> Result<()> {
    for car in records {
        if !is_valid_month(&car.month) {
            anyhow::bail!("Invalid month '{}' in car registrations", car.month);
        }
        if car.make.is_empty() {
            anyhow::bail!("Missing make for {}", car.month);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FuelType, VehicleClass};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Person {
        name: String,
        age: u32,
        active: bool,
    }

    #[test]
    fn test_parse_trims_and_types_fields() {
        let csv = b"name,age,active\n John Doe ,25,true\n Jane Smith , 30 ,false\n";
        let people: Vec<Person> = parse_csv(csv).unwrap();

        assert_eq!(people.len(), 2);
        assert_eq!(
            people[0],
            Person {
                name: "John Doe".to_string(),
                age: 25,
                active: true
            }
        );
        assert_eq!(people[1].age, 30);
    }

    #[test]
    fn test_parse_header_only_is_empty() {
        let people: Vec<Person> = parse_csv(b"name,age,active\n").unwrap();
        assert!(people.is_empty());
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let csv = b"name,age,active\nJohn,25,true\n,,\nJane,30,false\n";
        let people: Vec<Person> = parse_csv(csv).unwrap();
        assert_eq!(people.len(), 2);
    }

    #[test]
    fn test_parse_error_on_bad_value() {
        let csv = b"name,age,active\nJohn,twenty,true\n";
        let result: Result<Vec<Person>> = parse_csv(csv);
        assert!(result.is_err());
    }

    #[test]
    fn test_custom_field_transforms() {
        let mut transforms = FieldTransforms::new();
        transforms.insert(
            "name".to_string(),
            Box::new(|v: &str| v.to_uppercase()) as FieldTransform,
        );
        transforms.insert(
            "age".to_string(),
            Box::new(|v: &str| (v.parse::<u32>().unwrap_or(0) + 5).to_string()) as FieldTransform,
        );

        let csv = b"name,age,active\n John Doe ,25,true\n";
        let people: Vec<Person> = parse_csv_with(csv, &transforms).unwrap();
        assert_eq!(people[0].name, "JOHN DOE");
        assert_eq!(people[0].age, 30);
    }

    #[test]
    fn test_read_csv_missing_file() {
        let result: Result<Vec<Person>> = read_csv("/nonexistent/coe_trends/missing.csv");
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Failed to read"));
    }

    #[test]
    fn test_parse_coe_rows() {
        let csv = b"month,bidding_no,vehicle_class,quota,bids_success,bids_received,premium\n\
2025-01,2,Category A,1069,1058,1484,93601\n";
        let rows: Vec<Coe> = parse_csv(csv).unwrap();
        assert_eq!(rows[0].vehicle_class, VehicleClass::CategoryA);
        assert_eq!(rows[0].premium, 93601);
        validate_coe(&rows).unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_month() {
        let cars = vec![Car {
            month: "2025/01".to_string(),
            make: "BMW".to_string(),
            fuel_type: FuelType::Petrol,
            vehicle_type: "Saloon".to_string(),
            number: 1,
        }];
        assert!(validate_car(&cars).is_err());
    }
}

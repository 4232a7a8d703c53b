//! Record types for the published COE bidding and car registration datasets.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// COE quota category a vehicle bids in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VehicleClass {
    #[serde(rename = "Category A")]
    CategoryA,
    #[serde(rename = "Category B")]
    CategoryB,
    #[serde(rename = "Category C")]
    CategoryC,
    #[serde(rename = "Category D")]
    CategoryD,
    #[serde(rename = "Category E")]
    CategoryE,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 5] = [
        VehicleClass::CategoryA,
        VehicleClass::CategoryB,
        VehicleClass::CategoryC,
        VehicleClass::CategoryD,
        VehicleClass::CategoryE,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::CategoryA => "Category A",
            VehicleClass::CategoryB => "Category B",
            VehicleClass::CategoryC => "Category C",
            VehicleClass::CategoryD => "Category D",
            VehicleClass::CategoryE => "Category E",
        }
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleClass {
    type Err = anyhow::Error;

    /// Accepts `"Category A"`, `"category a"` or the bare letter `"A"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let letter = s
            .strip_prefix("Category")
            .or_else(|| s.strip_prefix("category"))
            .unwrap_or(s)
            .trim();

        match letter.to_ascii_uppercase().as_str() {
            "A" => Ok(VehicleClass::CategoryA),
            "B" => Ok(VehicleClass::CategoryB),
            "C" => Ok(VehicleClass::CategoryC),
            "D" => Ok(VehicleClass::CategoryD),
            "E" => Ok(VehicleClass::CategoryE),
            _ => Err(anyhow::anyhow!("unknown vehicle class '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FuelType {
    Petrol,
    Diesel,
    Electric,
    #[serde(alias = "Petrol-Electric", alias = "Diesel-Electric")]
    Hybrid,
    #[serde(other)]
    Others,
}

impl FuelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuelType::Petrol => "Petrol",
            FuelType::Diesel => "Diesel",
            FuelType::Electric => "Electric",
            FuelType::Hybrid => "Hybrid",
            FuelType::Others => "Others",
        }
    }
}

impl fmt::Display for FuelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FuelType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "petrol" => Ok(FuelType::Petrol),
            "diesel" => Ok(FuelType::Diesel),
            "electric" => Ok(FuelType::Electric),
            "hybrid" | "petrol-electric" | "diesel-electric" => Ok(FuelType::Hybrid),
            "others" | "other" => Ok(FuelType::Others),
            other => Err(anyhow::anyhow!("unknown fuel type '{other}'")),
        }
    }
}

/// One COE bidding result: a single category in a single bidding round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coe {
    pub month: String,
    pub bidding_no: u32,
    pub vehicle_class: VehicleClass,
    pub quota: u32,
    pub bids_success: u32,
    pub bids_received: u32,
    pub premium: u64,
}

impl Coe {
    /// Identity of a bidding result within the dataset.
    pub fn key(&self) -> (String, u32, VehicleClass) {
        (self.month.clone(), self.bidding_no, self.vehicle_class)
    }
}

/// Monthly new car registrations for one make and fuel type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub month: String,
    pub make: String,
    pub fuel_type: FuelType,
    pub vehicle_type: String,
    pub number: u32,
}

impl Car {
    pub fn key(&self) -> (String, String, FuelType, String) {
        (
            self.month.clone(),
            self.make.clone(),
            self.fuel_type,
            self.vehicle_type.clone(),
        )
    }
}

/// The two datasets held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Cars,
    Coe,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Cars => "cars",
            Table::Coe => "coe",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `true` for a `YYYY-MM` string naming a real calendar month.
pub fn is_valid_month(month: &str) -> bool {
    month.len() == 7 && NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d").is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_class_from_str() {
        assert_eq!("Category A".parse::<VehicleClass>().unwrap(), VehicleClass::CategoryA);
        assert_eq!("category e".parse::<VehicleClass>().unwrap(), VehicleClass::CategoryE);
        assert_eq!("b".parse::<VehicleClass>().unwrap(), VehicleClass::CategoryB);
        assert!("Category Z".parse::<VehicleClass>().is_err());
    }

    #[test]
    fn test_vehicle_class_serializes_as_label() {
        let json = serde_json::to_string(&VehicleClass::CategoryC).unwrap();
        assert_eq!(json, "\"Category C\"");
    }

    #[test]
    fn test_fuel_type_aliases() {
        assert_eq!("Petrol-Electric".parse::<FuelType>().unwrap(), FuelType::Hybrid);
        let parsed: FuelType = serde_json::from_str("\"Diesel-Electric\"").unwrap();
        assert_eq!(parsed, FuelType::Hybrid);
        let other: FuelType = serde_json::from_str("\"CNG\"").unwrap();
        assert_eq!(other, FuelType::Others);
    }

    #[test]
    fn test_is_valid_month() {
        assert!(is_valid_month("2025-01"));
        assert!(!is_valid_month("2025-13"));
        assert!(!is_valid_month("2025-1"));
        assert!(!is_valid_month("Jan 2025"));
    }
}

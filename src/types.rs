use crate::error::MapError;
use geo::MultiPolygon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Community area number, 1-77 in the shipped data.
pub type AreaId = u32;

/// One row of the indicator table.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaRecord {
    pub id: AreaId,
    pub name: String,
    // indicator key -> value; `None` when the source cell was empty
    pub values: BTreeMap<String, Option<f64>>,
}

/// One polygon from the geometry source.
#[derive(Debug, Clone)]
pub struct GeoFeature {
    pub id: AreaId,
    pub geometry: MultiPolygon<f64>,
}

#[derive(Debug, Clone)]
pub struct JoinedArea {
    pub id: AreaId,
    pub name: String,
    pub values: BTreeMap<String, Option<f64>>,
    pub geometry: MultiPolygon<f64>,
}

impl JoinedArea {
    pub fn value(&self, indicator_key: &str) -> Option<f64> {
        self.values.get(indicator_key).copied().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub fn from_hex(hex: &str) -> Result<Self, MapError> {
        let digits = hex.trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(MapError::InvalidColor(hex.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16).map_err(|_| MapError::InvalidColor(hex.to_string()))
        };
        Ok(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

/// Color bucket of one area for one indicator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketAssignment {
    pub area_id: AreaId,
    pub indicator: String,
    pub bucket: usize,
    pub color: Rgb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Percent,
    Index,
    Currency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub color: String,
    pub label: String,
}

/// Legend for one indicator: five rows in bucket order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendSpec {
    pub indicator: String,
    pub layer: String,
    pub title: String,
    pub entries: Vec<LegendEntry>,
}

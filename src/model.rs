// 🐾 Record Model - Expeditions, reserves, species, sightings
// Immutable, schema-shaped records. Every nested path a query needs is
// reachable through the typed accessors below, never by field name.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ============================================================================
// SHARED VALUE TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// High/low reading pair (rainfall in mm, temperature in °C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighLow {
    pub high: i64,
    pub low: i64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvironmentalConditions {
    pub rainfall_mm: Option<HighLow>,

    /// Some feeds send a single reading, others a list; both land here
    pub temperature_c: Vec<HighLow>,
}

// ============================================================================
// NESTED RECORDS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sighting {
    pub date: Option<String>,
    pub location: Option<Location>,
    pub activity: Option<String>,
}

impl Sighting {
    pub fn activity(&self) -> Option<&str> {
        self.activity.as_deref()
    }

    /// Sighting dates stay raw until someone asks for them
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        self.date.as_deref().and_then(parse_date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tracking {
    pub tagged: Option<u64>,
    pub sightings: Vec<Sighting>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,

    /// Known census count (None when the feed left it null)
    pub population: Option<u64>,

    pub tracking: Option<Tracking>,
}

impl Species {
    pub fn tagged(&self) -> Option<u64> {
        self.tracking.as_ref().and_then(|t| t.tagged)
    }

    /// Sightings, or None when the tracking block itself is missing
    pub fn sightings(&self) -> Option<&[Sighting]> {
        self.tracking.as_ref().map(|t| t.sightings.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reserve {
    pub name: Option<String>,
    pub location: Option<Location>,
    pub species: Vec<Species>,
    pub environmental_conditions: Option<EnvironmentalConditions>,
}

/// One expedition visit and the reserve snapshot it recorded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expedition {
    /// Expected to be unique, but duplicates do show up in the feeds
    pub id: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: NaiveDate,
    pub location: Option<Location>,
    pub reserve: Reserve,
}

impl Expedition {
    pub fn species(&self) -> &[Species] {
        &self.reserve.species
    }

    pub fn reserve_name(&self) -> Option<&str> {
        self.reserve.name.as_deref()
    }
}

// ============================================================================
// BATCH
// ============================================================================

/// The explicit context every analytical operation reads from.
///
/// A batch is built once per ingestion run and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    expeditions: Vec<Expedition>,
}

impl Batch {
    pub fn new(expeditions: Vec<Expedition>) -> Self {
        Batch { expeditions }
    }

    pub fn expeditions(&self) -> &[Expedition] {
        &self.expeditions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Expedition> {
        self.expeditions.iter()
    }

    pub fn len(&self) -> usize {
        self.expeditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expeditions.is_empty()
    }
}

impl From<Vec<Expedition>> for Batch {
    fn from(expeditions: Vec<Expedition>) -> Self {
        Batch::new(expeditions)
    }
}

impl FromIterator<Expedition> for Batch {
    fn from_iter<I: IntoIterator<Item = Expedition>>(iter: I) -> Self {
        Batch::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Expedition;
    type IntoIter = std::slice::Iter<'a, Expedition>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

// ============================================================================
// DATE PARSING
// ============================================================================

/// Parse a feed date: YYYY-MM-DD first, then MM/DD/YYYY
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    let date_str = date_str.trim();

    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return Some(date);
    }

    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%m/%d/%Y") {
        return Some(date);
    }

    None
}

// ============================================================================
// TESTS
// ============================================================================

// 📋 Result Tables - Named, typed columns for every analytical operation

use crate::model::Sighting;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;

// ============================================================================
// TABLE
// ============================================================================

/// A row type with a fixed column layout, used for printing and CSV export
pub trait TableRow: Serialize {
    const COLUMNS: &'static [&'static str];

    fn cells(&self) -> Vec<String>;
}

/// Ordered result rows plus the number of input rows skipped as malformed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table<R> {
    pub rows: Vec<R>,
    pub skipped_rows: usize,
}

impl<R> Table<R> {
    pub fn new(rows: Vec<R>, skipped_rows: usize) -> Self {
        Table { rows, skipped_rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }
}

// ============================================================================
// TAGGED RATIO
// ============================================================================

/// tagged / population, rounded to two decimals.
///
/// `Undefined` marks a zero population with tagged individuals. It ranks
/// above every defined ratio and serializes as the string "undefined".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaggedRatio {
    Defined(f64),
    Undefined,
}

impl TaggedRatio {
    pub fn compute(tagged: u64, population: u64) -> Self {
        if population == 0 {
            return TaggedRatio::Undefined;
        }
        TaggedRatio::Defined(round2(tagged as f64 / population as f64))
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            TaggedRatio::Defined(v) => Some(*v),
            TaggedRatio::Undefined => None,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, TaggedRatio::Undefined)
    }
}

impl Eq for TaggedRatio {}

impl PartialOrd for TaggedRatio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaggedRatio {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TaggedRatio::Undefined, TaggedRatio::Undefined) => Ordering::Equal,
            (TaggedRatio::Undefined, TaggedRatio::Defined(_)) => Ordering::Greater,
            (TaggedRatio::Defined(_), TaggedRatio::Undefined) => Ordering::Less,
            (TaggedRatio::Defined(a), TaggedRatio::Defined(b)) => a.total_cmp(b),
        }
    }
}

impl std::fmt::Display for TaggedRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaggedRatio::Defined(v) => write!(f, "{:.2}", v),
            TaggedRatio::Undefined => write!(f, "undefined"),
        }
    }
}

impl Serialize for TaggedRatio {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TaggedRatio::Defined(v) => serializer.serialize_f64(*v),
            TaggedRatio::Undefined => serializer.serialize_str("undefined"),
        }
    }
}

/// Round half away from zero to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// ROW TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpeditionSpeciesCount {
    pub expedition_id: String,
    pub count_unique_species: u64,
}

impl TableRow for ExpeditionSpeciesCount {
    const COLUMNS: &'static [&'static str] = &["expedition_id", "count_unique_species"];

    fn cells(&self) -> Vec<String> {
        vec![self.expedition_id.clone(), self.count_unique_species.to_string()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesPopulation {
    pub name: String,
    pub population: u128,
}

impl TableRow for SpeciesPopulation {
    const COLUMNS: &'static [&'static str] = &["name", "population"];

    fn cells(&self) -> Vec<String> {
        vec![self.name.clone(), self.population.to_string()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackingIssue {
    pub expedition_id: String,
    pub name: String,
    pub population: u64,
    pub tagged: u64,
    pub ratio_tagged: TaggedRatio,
    pub excess_count: u64,
}

impl TableRow for TrackingIssue {
    const COLUMNS: &'static [&'static str] = &[
        "expedition_id",
        "name",
        "population",
        "tagged",
        "ratio_tagged",
        "excess_count",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.expedition_id.clone(),
            self.name.clone(),
            self.population.to_string(),
            self.tagged.to_string(),
            self.ratio_tagged.to_string(),
            self.excess_count.to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityMatch {
    pub expedition_id: String,
    pub target_activity_count: u64,
}

impl TableRow for ActivityMatch {
    const COLUMNS: &'static [&'static str] = &["expedition_id", "target_activity_count"];

    fn cells(&self) -> Vec<String> {
        vec![self.expedition_id.clone(), self.target_activity_count.to_string()]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MostCommonActivity {
    pub species_name: String,
    pub most_common_activity: String,
    pub count: u64,
}

impl TableRow for MostCommonActivity {
    const COLUMNS: &'static [&'static str] = &["species_name", "most_common_activity", "count"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.species_name.clone(),
            self.most_common_activity.clone(),
            self.count.to_string(),
        ]
    }
}

/// A species entry selected by name, with its sightings kept nested
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesEntry {
    pub expedition_id: String,
    pub reserve_name: Option<String>,
    pub name: String,
    pub population: Option<u64>,
    pub tagged: Option<u64>,
    pub sightings: Vec<Sighting>,
}

impl TableRow for SpeciesEntry {
    const COLUMNS: &'static [&'static str] = &[
        "expedition_id",
        "reserve_name",
        "name",
        "population",
        "tagged",
        "sightings",
    ];

    fn cells(&self) -> Vec<String> {
        // Nested sightings are flattened to their activity labels for display
        let activities: Vec<&str> = self
            .sightings
            .iter()
            .map(|s| s.activity().unwrap_or("-"))
            .collect();

        vec![
            self.expedition_id.clone(),
            self.reserve_name.clone().unwrap_or_default(),
            self.name.clone(),
            self.population.map(|p| p.to_string()).unwrap_or_default(),
            self.tagged.map(|t| t.to_string()).unwrap_or_default(),
            format!("[{}]", activities.join("; ")),
        ]
    }
}

// ============================================================================
// TESTS
// ============================================================================

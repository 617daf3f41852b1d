// 📐 Shape Layer - Coerce raw JSON records into the record model
//
// Raw records arrive loosely typed (every field optional, dates as
// strings). A record becomes an `Expedition` only when every field the
// engine depends on is present and well formed; otherwise the whole line
// is rejected with one `SchemaMismatch` per problem.

use crate::model::{
    parse_date, EnvironmentalConditions, Expedition, HighLow, Location, Reserve, Sighting,
    Species, Tracking,
};
use serde::{Deserialize, Serialize};

// ============================================================================
// SCHEMA MISMATCH
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMismatch {
    /// 1-based line number in the source
    pub line: usize,
    pub field: String,
    pub message: String,
}

impl SchemaMismatch {
    fn new(line: usize, field: &str, message: impl Into<String>) -> Self {
        SchemaMismatch {
            line,
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[line {}] {}: {}", self.line, self.field, self.message)
    }
}

impl std::error::Error for SchemaMismatch {}

pub type CoercionResult = Result<Expedition, Vec<SchemaMismatch>>;

// ============================================================================
// RAW RECORD SHAPE
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawExpedition {
    expedition_id: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    expedition_location: Option<Location>,
    reserve: Option<RawReserve>,
}

#[derive(Debug, Deserialize)]
struct RawReserve {
    name: Option<String>,
    location: Option<Location>,
    species: Option<Vec<RawSpecies>>,
    environmental_conditions: Option<RawConditions>,
}

#[derive(Debug, Deserialize)]
struct RawSpecies {
    name: Option<String>,
    population: Option<u64>,
    tracking: Option<RawTracking>,
}

#[derive(Debug, Deserialize)]
struct RawTracking {
    tagged: Option<u64>,
    sightings: Option<Vec<RawSighting>>,
}

#[derive(Debug, Deserialize)]
struct RawSighting {
    date: Option<String>,
    location: Option<Location>,
    activity: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawConditions {
    rainfall_mm: Option<HighLow>,
    temperature_c: Option<OneOrMany<HighLow>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

// ============================================================================
// SCHEMA
// ============================================================================

/// Required: `expedition_id`, a parseable `end_date`, `reserve`, and a
/// `name` on every species. A present `start_date` must parse. Everything
/// else may be null or omitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpeditionSchema;

impl ExpeditionSchema {
    pub fn new() -> Self {
        ExpeditionSchema
    }

    /// Parse and coerce one NDJSON line
    pub fn coerce_line(&self, line: usize, text: &str) -> CoercionResult {
        let raw: RawExpedition = serde_json::from_str(text)
            .map_err(|e| vec![SchemaMismatch::new(line, "<record>", e.to_string())])?;
        self.coerce(line, raw)
    }

    fn coerce(&self, line: usize, raw: RawExpedition) -> CoercionResult {
        let mut errors = Vec::new();

        let id = match raw.expedition_id {
            Some(id) if !id.trim().is_empty() => Some(id),
            _ => {
                errors.push(SchemaMismatch::new(line, "expedition_id", "Required field is missing or empty"));
                None
            }
        };

        let end_date = match raw.end_date.as_deref() {
            Some(text) => {
                let parsed = parse_date(text);
                if parsed.is_none() {
                    errors.push(SchemaMismatch::new(line, "end_date", format!("Invalid date format: {}", text)));
                }
                parsed
            }
            None => {
                errors.push(SchemaMismatch::new(line, "end_date", "Required field is missing"));
                None
            }
        };

        let start_date = match raw.start_date.as_deref() {
            Some(text) => {
                let parsed = parse_date(text);
                if parsed.is_none() {
                    errors.push(SchemaMismatch::new(line, "start_date", format!("Invalid date format: {}", text)));
                }
                parsed
            }
            None => None,
        };

        let reserve = match raw.reserve {
            Some(reserve) => Some(self.coerce_reserve(line, reserve, &mut errors)),
            None => {
                errors.push(SchemaMismatch::new(line, "reserve", "Required field is missing"));
                None
            }
        };

        match (id, end_date, reserve) {
            (Some(id), Some(end_date), Some(reserve)) if errors.is_empty() => Ok(Expedition {
                id,
                start_date,
                end_date,
                location: raw.expedition_location,
                reserve,
            }),
            _ => Err(errors),
        }
    }

    fn coerce_reserve(&self, line: usize, raw: RawReserve, errors: &mut Vec<SchemaMismatch>) -> Reserve {
        let species = raw
            .species
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .filter_map(|(idx, species)| {
                let name = match species.name {
                    Some(name) => name,
                    None => {
                        errors.push(SchemaMismatch::new(
                            line,
                            &format!("reserve.species[{}].name", idx),
                            "Required field is missing",
                        ));
                        return None;
                    }
                };

                Some(Species {
                    name,
                    population: species.population,
                    tracking: species.tracking.map(coerce_tracking),
                })
            })
            .collect();

        Reserve {
            name: raw.name,
            location: raw.location,
            species,
            environmental_conditions: raw.environmental_conditions.map(|c| EnvironmentalConditions {
                rainfall_mm: c.rainfall_mm,
                temperature_c: c.temperature_c.map(OneOrMany::into_vec).unwrap_or_default(),
            }),
        }
    }
}

fn coerce_tracking(raw: RawTracking) -> Tracking {
    Tracking {
        tagged: raw.tagged,
        sightings: raw
            .sightings
            .unwrap_or_default()
            .into_iter()
            .map(|s| Sighting {
                date: s.date,
                location: s.location,
                activity: s.activity,
            })
            .collect(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

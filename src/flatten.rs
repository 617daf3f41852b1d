// 🪜 Flattener - Explode nested lists into flat rows
//
// Every row borrows from the batch and carries the ancestor keys that
// downstream grouping needs (expedition id, end date, reserve name).
//
//   expedition ──► species[i] ──► tracking.sightings[j]
//
// An empty list yields zero rows for its parent. Rows come out in source
// order and are never resorted here.

use crate::diagnostics::{Diagnostics, FieldMissing};
use crate::model::{Expedition, Location, Sighting, Species};
use chrono::NaiveDate;

// ============================================================================
// FLAT ROW TYPES
// ============================================================================

/// Expedition-level view with expedition and reserve scalars unnested
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpeditionRow<'a> {
    pub expedition_id: &'a str,
    pub start_date: Option<NaiveDate>,
    pub end_date: NaiveDate,
    pub expedition_latitude: Option<f64>,
    pub expedition_longitude: Option<f64>,
    pub reserve_name: Option<&'a str>,
    pub reserve_latitude: Option<f64>,
    pub reserve_longitude: Option<f64>,
    pub species_count: usize,
}

/// One row per species entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeciesRow<'a> {
    pub expedition_id: &'a str,
    pub end_date: NaiveDate,
    pub reserve_name: Option<&'a str>,
    pub species_index: usize,
    pub species: &'a Species,
}

impl<'a> SpeciesRow<'a> {
    pub fn name(&self) -> &'a str {
        &self.species.name
    }

    pub fn population(&self) -> Option<u64> {
        self.species.population
    }

    pub fn tagged(&self) -> Option<u64> {
        self.species.tagged()
    }

    pub fn missing(&self, field: &str) -> FieldMissing {
        FieldMissing::species(self.expedition_id, self.species_index, self.name(), field)
    }
}

/// One row per sighting, with its species and expedition context
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SightingRow<'a> {
    pub expedition_id: &'a str,
    pub end_date: NaiveDate,
    pub reserve_name: Option<&'a str>,
    pub species_index: usize,
    pub species_name: &'a str,
    pub sighting_index: usize,
    pub date: Option<&'a str>,
    pub location: Option<Location>,
    pub activity: &'a str,
}

/// Rows produced by an explosion plus the rows it had to skip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flattened<T> {
    pub rows: Vec<T>,
    pub diagnostics: Diagnostics,
}

impl<T> Flattened<T> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn skipped(&self) -> usize {
        self.diagnostics.len()
    }
}

// ============================================================================
// EXPLOSIONS
// ============================================================================

pub fn explode_expeditions<'a, I>(expeditions: I) -> Vec<ExpeditionRow<'a>>
where
    I: IntoIterator<Item = &'a Expedition>,
{
    expeditions
        .into_iter()
        .map(|expedition| ExpeditionRow {
            expedition_id: &expedition.id,
            start_date: expedition.start_date,
            end_date: expedition.end_date,
            expedition_latitude: expedition.location.map(|l| l.latitude),
            expedition_longitude: expedition.location.map(|l| l.longitude),
            reserve_name: expedition.reserve_name(),
            reserve_latitude: expedition.reserve.location.map(|l| l.latitude),
            reserve_longitude: expedition.reserve.location.map(|l| l.longitude),
            species_count: expedition.species().len(),
        })
        .collect()
}

/// expedition → species
pub fn explode_species<'a, I>(expeditions: I) -> Vec<SpeciesRow<'a>>
where
    I: IntoIterator<Item = &'a Expedition>,
{
    let mut out = Vec::new();

    for expedition in expeditions {
        for (species_index, species) in expedition.species().iter().enumerate() {
            out.push(SpeciesRow {
                expedition_id: &expedition.id,
                end_date: expedition.end_date,
                reserve_name: expedition.reserve_name(),
                species_index,
                species,
            });
        }
    }

    out
}

/// species → sightings, over rows already exploded to species level.
///
/// A species without a tracking block and a sighting without an activity
/// are skipped and recorded.
pub fn explode_sightings<'a>(species_rows: &[SpeciesRow<'a>]) -> Flattened<SightingRow<'a>> {
    let mut flattened = Flattened {
        rows: Vec::new(),
        diagnostics: Diagnostics::new(),
    };

    for parent in species_rows {
        let sightings = match parent.species.sightings() {
            Some(s) => s,
            None => {
                flattened.diagnostics.record(parent.missing("tracking"));
                continue;
            }
        };

        for (sighting_index, sighting) in sightings.iter().enumerate() {
            push_sighting(&mut flattened, parent, sighting_index, sighting);
        }
    }

    flattened
}

/// expedition → species → sightings in one pass.
///
/// Produces exactly what `explode_sightings(&explode_species(..))` does.
pub fn explode_species_sightings<'a, I>(expeditions: I) -> Flattened<SightingRow<'a>>
where
    I: IntoIterator<Item = &'a Expedition>,
{
    let mut flattened = Flattened {
        rows: Vec::new(),
        diagnostics: Diagnostics::new(),
    };

    for expedition in expeditions {
        for (species_index, species) in expedition.species().iter().enumerate() {
            let parent = SpeciesRow {
                expedition_id: &expedition.id,
                end_date: expedition.end_date,
                reserve_name: expedition.reserve_name(),
                species_index,
                species,
            };

            match species.sightings() {
                Some(sightings) => {
                    for (sighting_index, sighting) in sightings.iter().enumerate() {
                        push_sighting(&mut flattened, &parent, sighting_index, sighting);
                    }
                }
                None => flattened.diagnostics.record(parent.missing("tracking")),
            }
        }
    }

    flattened
}

fn push_sighting<'a>(
    flattened: &mut Flattened<SightingRow<'a>>,
    parent: &SpeciesRow<'a>,
    sighting_index: usize,
    sighting: &'a Sighting,
) {
    let activity = match sighting.activity() {
        Some(a) => a,
        None => {
            flattened.diagnostics.record(FieldMissing::sighting(
                parent.expedition_id,
                parent.species_index,
                parent.name(),
                sighting_index,
                "activity",
            ));
            return;
        }
    };

    flattened.rows.push(SightingRow {
        expedition_id: parent.expedition_id,
        end_date: parent.end_date,
        reserve_name: parent.reserve_name,
        species_index: parent.species_index,
        species_name: parent.name(),
        sighting_index,
        date: sighting.date.as_deref(),
        location: sighting.location,
        activity,
    });
}

// ============================================================================
// TESTS
// ============================================================================

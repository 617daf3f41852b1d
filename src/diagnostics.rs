// 🩺 Diagnostics - Row-level conditions that skip a row, never the batch
//
// A malformed element found while exploding (missing tracking block,
// sighting without an activity, species without a census count) is
// recorded here, logged once, and the batch keeps going.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

// ============================================================================
// FIELD MISSING
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldMissing {
    pub expedition_id: String,
    pub species_index: usize,
    pub species_name: String,

    /// Set when the malformed element is a sighting
    pub sighting_index: Option<usize>,

    /// Dotted path of the absent field, relative to the species entry
    pub field: String,
}

impl FieldMissing {
    pub fn species(expedition_id: &str, species_index: usize, species_name: &str, field: &str) -> Self {
        FieldMissing {
            expedition_id: expedition_id.to_string(),
            species_index,
            species_name: species_name.to_string(),
            sighting_index: None,
            field: field.to_string(),
        }
    }

    pub fn sighting(
        expedition_id: &str,
        species_index: usize,
        species_name: &str,
        sighting_index: usize,
        field: &str,
    ) -> Self {
        FieldMissing {
            sighting_index: Some(sighting_index),
            ..FieldMissing::species(expedition_id, species_index, species_name, field)
        }
    }
}

impl std::fmt::Display for FieldMissing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] species #{} ({})",
            self.expedition_id, self.species_index, self.species_name
        )?;
        if let Some(idx) = self.sighting_index {
            write!(f, " sighting #{}", idx)?;
        }
        write!(f, ": missing field '{}'", self.field)
    }
}

impl std::error::Error for FieldMissing {}

// ============================================================================
// DIAGNOSTICS LEDGER
// ============================================================================

/// Ordered ledger of skipped rows for one operation (or one flattening pass)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    skipped: Vec<FieldMissing>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Record a skipped row and emit its diagnostic
    pub fn record(&mut self, issue: FieldMissing) {
        warn!(
            expedition_id = %issue.expedition_id,
            field = %issue.field,
            "skipping row: {}",
            issue
        );
        self.skipped.push(issue);
    }

    /// Append another ledger without logging again
    pub fn merge(&mut self, other: Diagnostics) {
        self.skipped.extend(other.skipped);
    }

    /// Drop repeats of the same skipped row, keeping first occurrences.
    /// Several operations can skip one row for the same missing field.
    pub fn into_distinct(self) -> Diagnostics {
        let mut seen = BTreeSet::new();
        let skipped = self
            .skipped
            .into_iter()
            .filter(|issue| seen.insert(issue.clone()))
            .collect();
        Diagnostics { skipped }
    }

    pub fn skipped(&self) -> &[FieldMissing] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.skipped.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.skipped.is_empty() {
            return "no rows skipped".to_string();
        }

        let mut by_field: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();
        for issue in &self.skipped {
            *by_field.entry(issue.field.as_str()).or_insert(0) += 1;
        }

        let parts: Vec<String> = by_field
            .iter()
            .map(|(field, count)| format!("{} missing '{}'", count, field))
            .collect();

        format!("{} rows skipped ({})", self.skipped.len(), parts.join(", "))
    }
}

// ============================================================================
// TESTS
// ============================================================================

// 📊 Analysis Report - Every operation's result in one bundle
// Text rendering, CSV export, and a SHA-256 fingerprint for idempotence checks.

use crate::diagnostics::Diagnostics;
use crate::flatten::{explode_sightings, explode_species};
use crate::model::Batch;
use crate::query::{
    activity_matches_from, most_common_activity_from, population_totals_from,
    species_filter_from, species_per_expedition_from, tracking_issues_from,
    unique_expedition_count, AnalysisParams,
};
use crate::table::{
    ActivityMatch, ExpeditionSpeciesCount, MostCommonActivity, SpeciesEntry, SpeciesPopulation,
    Table, TableRow, TrackingIssue,
};
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub unique_expedition_count: u64,
    pub species_per_expedition: Table<ExpeditionSpeciesCount>,
    pub population_totals: Table<SpeciesPopulation>,
    pub tracking_issues: Table<TrackingIssue>,
    pub activity_matches: Table<ActivityMatch>,
    pub most_common_activity: Table<MostCommonActivity>,
    pub species_filter: Table<SpeciesEntry>,

    /// Distinct rows skipped by any operation
    pub skipped: Diagnostics,
}

/// Run every analytical operation over the batch. Species and sightings
/// are exploded once and shared by all operations.
pub fn summarize(batch: &Batch, params: &AnalysisParams) -> AnalysisReport {
    info!(records = batch.len(), "summarizing batch");

    let species_rows = explode_species(batch);
    let sightings = explode_sightings(&species_rows);

    let mut tracking_diagnostics = Diagnostics::new();
    let tracking_issues = tracking_issues_from(&species_rows, &mut tracking_diagnostics);

    AnalysisReport {
        unique_expedition_count: unique_expedition_count(batch),
        species_per_expedition: species_per_expedition_from(batch, &species_rows),
        population_totals: population_totals_from(&species_rows),
        tracking_issues,
        activity_matches: activity_matches_from(batch, &sightings, &params.activity),
        most_common_activity: most_common_activity_from(&sightings),
        species_filter: species_filter_from(&species_rows, &params.species_filter),
        skipped: distinct_skipped(tracking_diagnostics, sightings.diagnostics.clone()),
    }
}

/// Species-level and sighting-level skips, each row counted once
pub(crate) fn distinct_skipped(species: Diagnostics, sightings: Diagnostics) -> Diagnostics {
    let mut all = species;
    all.merge(sightings);
    all.into_distinct()
}

impl AnalysisReport {
    /// Hex SHA-256 of the JSON form; equal reports give equal fingerprints
    pub fn fingerprint(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self).context("Failed to serialize report")?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Rows skipped as malformed, each counted once however many
    /// operations skipped it
    pub fn skipped_rows(&self) -> usize {
        self.skipped.len()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Unique expedition count: {}\n\n", self.unique_expedition_count));
        out.push_str(&render_table("Species count per expedition", &self.species_per_expedition));
        out.push_str(&render_table("Species population", &self.population_totals));
        out.push_str(&render_table("Tracking issues by species", &self.tracking_issues));
        out.push_str(&render_table("Activity matches per expedition", &self.activity_matches));
        out.push_str(&render_table("Most common activity per species", &self.most_common_activity));
        out.push_str(&render_table("Species filtered by name", &self.species_filter));
        out
    }

    /// Write one CSV per table into `dir`, returning the files written
    pub fn write_csv_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let files = vec![
            write_csv(&self.species_per_expedition, &dir.join("species_per_expedition.csv"))?,
            write_csv(&self.population_totals, &dir.join("species_population.csv"))?,
            write_csv(&self.tracking_issues, &dir.join("tracking_issues.csv"))?,
            write_csv(&self.activity_matches, &dir.join("activity_matches.csv"))?,
            write_csv(&self.most_common_activity, &dir.join("most_common_activity.csv"))?,
            write_csv(&self.species_filter, &dir.join("species_filter.csv"))?,
        ];

        info!(dir = %dir.display(), files = files.len(), "wrote CSV export");
        Ok(files)
    }
}

// ============================================================================
// RENDERING
// ============================================================================

/// Fixed-width text table with a title line and a row/skip footer
pub fn render_table<R: TableRow>(title: &str, table: &Table<R>) -> String {
    let rows: Vec<Vec<String>> = table.iter().map(|r| r.cells()).collect();

    let mut widths: Vec<usize> = R::COLUMNS.iter().map(|c| c.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let format_line = |cells: Vec<&str>| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        format!("│ {} │\n", padded.join(" │ "))
    };

    let mut out = format!("{}:\n", title);
    out.push_str(&format_line(R::COLUMNS.to_vec()));
    let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    out.push_str(&format!("├─{}─┤\n", rule.join("─┼─")));
    for row in &rows {
        out.push_str(&format_line(row.iter().map(|c| c.as_str()).collect()));
    }
    out.push_str(&format!("({} rows, {} skipped)\n\n", table.len(), table.skipped_rows));
    out
}

// ============================================================================
// CSV EXPORT
// ============================================================================

pub fn write_csv<R: TableRow>(table: &Table<R>, path: &Path) -> Result<PathBuf> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file {}", path.display()))?;

    wtr.write_record(R::COLUMNS)?;
    for row in table.iter() {
        wtr.write_record(row.cells())?;
    }
    wtr.flush()?;

    Ok(path.to_path_buf())
}

/// CSV text of a table, header first
pub fn to_csv_string<R: TableRow>(table: &Table<R>) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());

    wtr.write_record(R::COLUMNS)?;
    for row in table.iter() {
        wtr.write_record(row.cells())?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV buffer: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Expedition, Reserve, Sighting, Species, Tracking};
    use chrono::NaiveDate;

    fn create_test_batch() -> Batch {
        let lion = |population: u64, tagged: u64, activities: &[&str]| Species {
            name: "lion".to_string(),
            population: Some(population),
            tracking: Some(Tracking {
                tagged: Some(tagged),
                sightings: activities
                    .iter()
                    .map(|a| Sighting {
                        date: None,
                        location: None,
                        activity: Some(a.to_string()),
                    })
                    .collect(),
            }),
        };

        let expedition = |id: &str, month: u32, species: Vec<Species>| Expedition {
            id: id.to_string(),
            start_date: None,
            end_date: NaiveDate::from_ymd_opt(2024, month, 1).unwrap(),
            location: None,
            reserve: Reserve {
                name: Some("Etosha".to_string()),
                location: None,
                species,
                environmental_conditions: None,
            },
        };

        Batch::new(vec![
            expedition("E1", 5, vec![lion(10, 12, &["hunting", "hunting", "resting"])]),
            expedition("E2", 6, vec![lion(5, 2, &["hunting"])]),
        ])
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let batch = create_test_batch();
        let params = AnalysisParams::default();

        let first = summarize(&batch, &params).fingerprint().unwrap();
        let second = summarize(&batch, &params).fingerprint().unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_fingerprint_changes_with_params() {
        let batch = create_test_batch();
        let mut params = AnalysisParams::default();

        let strict = summarize(&batch, &params).fingerprint().unwrap();
        params.activity.min_activity_count = 0;
        let loose = summarize(&batch, &params).fingerprint().unwrap();

        assert_ne!(strict, loose);
    }

    #[test]
    fn test_csv_string_has_header_and_rows() {
        let batch = create_test_batch();
        let report = summarize(&batch, &AnalysisParams::default());

        let csv_text = to_csv_string(&report.tracking_issues).unwrap();
        let lines: Vec<&str> = csv_text.lines().collect();

        assert_eq!(lines[0], "expedition_id,name,population,tagged,ratio_tagged,excess_count");
        assert_eq!(lines[1], "E1,lion,10,12,1.20,2");
        assert_eq!(lines.len(), 2);
    }

    #[test]
    fn test_render_contains_every_section() {
        let batch = create_test_batch();
        let report = summarize(&batch, &AnalysisParams::default());
        let text = report.render();

        assert!(text.starts_with("Unique expedition count: 2"));
        assert!(text.contains("Species population:"));
        assert!(text.contains("Tracking issues by species:"));
        assert!(text.contains("Most common activity per species:"));
        assert!(text.contains("│ lion │ 15"));
        assert_eq!(report.skipped_rows(), 0);
    }

    #[test]
    fn test_skipped_rows_counted_once() {
        let mut batch = create_test_batch().expeditions().to_vec();

        // One sighting without an activity
        if let Some(tracking) = batch[1].reserve.species[0].tracking.as_mut() {
            tracking.sightings[0].activity = None;
        }
        let report = summarize(&Batch::new(batch.clone()), &AnalysisParams::default());
        assert_eq!(report.activity_matches.skipped_rows, 1);
        assert_eq!(report.most_common_activity.skipped_rows, 1);
        assert_eq!(report.skipped_rows(), 1);

        // A species without a tracking block is skipped by three operations
        batch[1].reserve.species[0].tracking = None;
        let report = summarize(&Batch::new(batch), &AnalysisParams::default());
        assert_eq!(report.tracking_issues.skipped_rows, 1);
        assert_eq!(report.activity_matches.skipped_rows, 1);
        assert_eq!(report.skipped_rows(), 1);
        assert_eq!(report.skipped.skipped()[0].field, "tracking");
    }

    #[test]
    fn test_write_csv_dir() {
        let batch = create_test_batch();
        let report = summarize(&batch, &AnalysisParams::default());

        let dir = std::env::temp_dir().join(format!("expedition-analytics-{}", std::process::id()));
        let files = report.write_csv_dir(&dir).unwrap();

        assert_eq!(files.len(), 6);
        let population = fs::read_to_string(dir.join("species_population.csv")).unwrap();
        assert_eq!(population, "name,population\nlion,15\n");

        fs::remove_dir_all(&dir).unwrap();
    }
}

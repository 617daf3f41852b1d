// 🌊 Streaming Analysis - Incremental folding and sharded execution
//
// `observe` folds one expedition into per-group accumulators without
// revisiting earlier records. Partials from disjoint shards combine with
// `merge` (left shard first). The chronological ordering behind the most
// common activity query is applied only in `finish`, after every shard
// has been merged.

use crate::aggregate::{Accumulator, Count, CountDistinct, GroupBy, Mergeable, Sum};
use crate::diagnostics::Diagnostics;
use crate::flatten::{explode_sightings, explode_species};
use crate::model::{Batch, Expedition};
use crate::query::{
    activity_match_table, most_common_activity_table, population_table, species_count_table,
    species_entry, tracking_issue, tracking_issue_table, ActivityEvent, AnalysisParams,
};
use crate::report::{distinct_skipped, AnalysisReport};
use crate::table::{SpeciesEntry, Table, TrackingIssue};
use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::debug;

/// Owned copy of one gathered activity, kept until the final ordering
#[derive(Debug, Clone, PartialEq, Eq)]
struct ActivityRecord {
    end_date: NaiveDate,
    expedition_id: String,
    species_name: String,
    activity: String,
}

impl ActivityRecord {
    fn as_event(&self) -> ActivityEvent<'_> {
        ActivityEvent {
            end_date: self.end_date,
            expedition_id: &self.expedition_id,
            species_name: &self.species_name,
            activity: &self.activity,
        }
    }
}

/// Incremental form of `summarize`.
///
/// Memory: the per-group accumulators are bounded by the number of
/// distinct keys, but `activity_log` keeps one owned record per sighting
/// until `finish`, so it grows with the total sighting count of the stream.
/// The tally it feeds is order-insensitive (ties go to the smallest
/// activity); the log exists so `finish` sees the same chronological event
/// sequence as the batch path.
#[derive(Debug, Clone)]
pub struct StreamingAnalysis {
    params: AnalysisParams,
    records_seen: usize,

    expedition_ids: CountDistinct<String>,
    species_per_expedition: GroupBy<String, CountDistinct<String>>,
    population: GroupBy<String, Sum>,
    tracking_issues: Vec<TrackingIssue>,
    tracking_diagnostics: Diagnostics,
    activity_matches: GroupBy<String, Count>,
    activity_log: Vec<ActivityRecord>,
    sighting_diagnostics: Diagnostics,
    species_entries: Vec<SpeciesEntry>,
}

impl StreamingAnalysis {
    pub fn new(params: AnalysisParams) -> Self {
        StreamingAnalysis {
            params,
            records_seen: 0,
            expedition_ids: CountDistinct::default(),
            species_per_expedition: GroupBy::new(),
            population: GroupBy::new(),
            tracking_issues: Vec::new(),
            tracking_diagnostics: Diagnostics::new(),
            activity_matches: GroupBy::new(),
            activity_log: Vec::new(),
            sighting_diagnostics: Diagnostics::new(),
            species_entries: Vec::new(),
        }
    }

    pub fn records_seen(&self) -> usize {
        self.records_seen
    }

    /// Fold one expedition into every accumulator
    pub fn observe(&mut self, expedition: &Expedition) {
        self.records_seen += 1;

        let id = expedition.id.as_str();
        self.expedition_ids.update(Some(id.to_string()));
        self.species_per_expedition.touch(id.to_string());
        self.activity_matches.touch(id.to_string());

        let species_rows = explode_species(std::iter::once(expedition));
        for row in &species_rows {
            self.species_per_expedition
                .update(id.to_string(), Some(row.name().to_string()));
            self.population.update(row.name().to_string(), row.population());

            if let Some(issue) = tracking_issue(row, &mut self.tracking_diagnostics) {
                self.tracking_issues.push(issue);
            }
            if self.params.species_filter.matches(row.name()) {
                self.species_entries.push(species_entry(row));
            }
        }

        let sightings = explode_sightings(&species_rows);
        for row in &sightings.rows {
            let matched = self.params.activity.matches(row.activity).then_some(());
            self.activity_matches.update(id.to_string(), matched);

            self.activity_log.push(ActivityRecord {
                end_date: row.end_date,
                expedition_id: row.expedition_id.to_string(),
                species_name: row.species_name.to_string(),
                activity: row.activity.to_string(),
            });
        }
        self.sighting_diagnostics.merge(sightings.diagnostics);
    }

    /// Fold every expedition of a chunk
    pub fn observe_all<'a, I>(&mut self, expeditions: I)
    where
        I: IntoIterator<Item = &'a Expedition>,
    {
        for expedition in expeditions {
            self.observe(expedition);
        }
    }

    /// Absorb the partial of the shard that follows this one
    pub fn merge(mut self, other: StreamingAnalysis) -> StreamingAnalysis {
        self.records_seen += other.records_seen;
        self.expedition_ids.merge(other.expedition_ids);
        self.species_per_expedition.merge(other.species_per_expedition);
        self.population.merge(other.population);
        self.tracking_issues.extend(other.tracking_issues);
        self.tracking_diagnostics.merge(other.tracking_diagnostics);
        self.activity_matches.merge(other.activity_matches);
        self.activity_log.extend(other.activity_log);
        self.sighting_diagnostics.merge(other.sighting_diagnostics);
        self.species_entries.extend(other.species_entries);
        self
    }

    pub fn finish(self) -> AnalysisReport {
        debug!(records = self.records_seen, "finishing streaming analysis");

        let events: Vec<ActivityEvent<'_>> = self.activity_log.iter().map(|r| r.as_event()).collect();
        let skipped = distinct_skipped(
            self.tracking_diagnostics.clone(),
            self.sighting_diagnostics.clone(),
        );

        AnalysisReport {
            unique_expedition_count: self.expedition_ids.count(),
            species_per_expedition: species_count_table(&self.species_per_expedition),
            population_totals: population_table(&self.population),
            tracking_issues: tracking_issue_table(self.tracking_issues, &self.tracking_diagnostics),
            activity_matches: activity_match_table(
                &self.activity_matches,
                &self.params.activity,
                &self.sighting_diagnostics,
            ),
            most_common_activity: most_common_activity_table(events, &self.sighting_diagnostics),
            species_filter: Table::new(self.species_entries, 0),
            skipped,
        }
    }
}

/// Split the batch into shards of `shard_size` expeditions, fold them in
/// parallel, and merge the partials in shard order.
pub fn analyze_sharded(batch: &Batch, params: &AnalysisParams, shard_size: usize) -> AnalysisReport {
    let shard_size = shard_size.max(1);
    debug!(records = batch.len(), shard_size, "running sharded analysis");

    batch
        .expeditions()
        .par_chunks(shard_size)
        .map(|shard| {
            let mut partial = StreamingAnalysis::new(params.clone());
            partial.observe_all(shard);
            partial
        })
        .reduce(|| StreamingAnalysis::new(params.clone()), StreamingAnalysis::merge)
        .finish()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Reserve, Sighting, Species, Tracking};
    use crate::query::{ActivityThreshold, SpeciesNameFilter};
    use crate::report::summarize;

    fn species(name: &str, population: Option<u64>, tagged: u64, activities: &[Option<&str>]) -> Species {
        Species {
            name: name.to_string(),
            population,
            tracking: Some(Tracking {
                tagged: Some(tagged),
                sightings: activities
                    .iter()
                    .map(|a| Sighting {
                        date: Some("2024-02-02".to_string()),
                        location: None,
                        activity: a.map(|s| s.to_string()),
                    })
                    .collect(),
            }),
        }
    }

    fn expedition(id: &str, day: u32, species: Vec<Species>) -> Expedition {
        Expedition {
            id: id.to_string(),
            start_date: None,
            end_date: NaiveDate::from_ymd_opt(2024, 4, day).unwrap(),
            location: None,
            reserve: Reserve {
                name: Some("Masai Mara".to_string()),
                location: None,
                species,
                environmental_conditions: None,
            },
        }
    }

    fn create_mixed_batch() -> Batch {
        let mut untracked = species("okapi", Some(2), 0, &[]);
        untracked.tracking = None;

        Batch::new(vec![
            expedition(
                "E4",
                20,
                vec![
                    species("lion", Some(10), 12, &[Some("hunting"), Some("hunting"), Some("resting")]),
                    species("Dromedarius", Some(0), 3, &[Some("walking"), None]),
                ],
            ),
            expedition("E1", 2, vec![species("lion", Some(5), 2, &[Some("resting")])]),
            expedition("E3", 20, vec![untracked, species("zebra", None, 1, &[Some("grazing")])]),
            expedition("E1", 9, vec![]),
            expedition(
                "E2",
                2,
                vec![species("polyphemus", Some(1), 4, &[Some("hunting"), Some("hunting"), Some("hunting")])],
            ),
        ])
    }

    fn params() -> AnalysisParams {
        AnalysisParams {
            activity: ActivityThreshold::new("hunting", 1),
            species_filter: SpeciesNameFilter::new(["polyphemus", "dromedarius"]),
        }
    }

    #[test]
    fn test_streaming_matches_batch_summary() {
        let batch = create_mixed_batch();

        let mut streaming = StreamingAnalysis::new(params());
        streaming.observe_all(&batch);
        assert_eq!(streaming.records_seen(), 5);

        assert_eq!(streaming.finish(), summarize(&batch, &params()));
    }

    #[test]
    fn test_sharded_matches_batch_summary_for_any_shard_size() {
        let batch = create_mixed_batch();
        let expected = summarize(&batch, &params());

        for shard_size in [0, 1, 2, 3, 5, 64] {
            assert_eq!(
                analyze_sharded(&batch, &params(), shard_size),
                expected,
                "shard_size = {}",
                shard_size
            );
        }
    }

    #[test]
    fn test_merge_with_empty_partial_is_identity() {
        let batch = create_mixed_batch();

        let mut partial = StreamingAnalysis::new(params());
        partial.observe_all(&batch);
        let expected = partial.clone().finish();

        let left = StreamingAnalysis::new(params()).merge(partial.clone()).finish();
        let right = partial.merge(StreamingAnalysis::new(params())).finish();

        assert_eq!(left, expected);
        assert_eq!(right, expected);
    }

    #[test]
    fn test_ordering_deferred_until_finish() {
        // Later shard holds the earlier expedition; finish must still put it first
        let late = expedition("E9", 28, vec![species("gnu", Some(1), 0, &[Some("b")])]);
        let early = expedition("E0", 1, vec![species("gnu", Some(1), 0, &[Some("a")])]);

        let mut first = StreamingAnalysis::new(params());
        first.observe(&late);
        let mut second = StreamingAnalysis::new(params());
        second.observe(&early);

        let report = first.merge(second).finish();
        let row = &report.most_common_activity.rows[0];
        assert_eq!(row.species_name, "gnu");
        assert_eq!(row.most_common_activity, "a");
        assert_eq!(row.count, 1);
    }

    #[test]
    fn test_empty_stream() {
        let report = StreamingAnalysis::new(params()).finish();
        assert_eq!(report.skipped_rows(), 0);

        assert_eq!(report.unique_expedition_count, 0);
        assert!(report.species_per_expedition.is_empty());
        assert!(report.most_common_activity.is_empty());
    }
}

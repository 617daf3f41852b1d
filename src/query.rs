// 🔎 Query Layer - The fixed analytical operations over an expedition batch
//
// Each operation takes the batch explicitly, flattens it to the level it
// needs, aggregates, ranks, and returns a fresh table. Nothing here
// mutates the batch. Caller-supplied values travel as typed parameters.

use crate::aggregate::{Accumulator, Count, CountDistinct, GroupBy, Sum, ValueCounts};
use crate::diagnostics::Diagnostics;
use crate::flatten::{
    explode_expeditions, explode_sightings, explode_species, Flattened, SightingRow, SpeciesRow,
};
use crate::model::Batch;
use crate::rank::{sort_descending_by, top_per_group};
use crate::table::{
    ActivityMatch, ExpeditionSpeciesCount, MostCommonActivity, SpeciesEntry, SpeciesPopulation,
    Table, TaggedRatio, TrackingIssue,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// PARAMETERS
// ============================================================================

/// Bound parameters for the activity-threshold query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityThreshold {
    /// Matched exactly, case-sensitive
    pub target_activity: String,

    /// Expeditions need strictly more matches than this
    pub min_activity_count: i64,
}

impl ActivityThreshold {
    pub fn new(target_activity: impl Into<String>, min_activity_count: i64) -> Self {
        ActivityThreshold {
            target_activity: target_activity.into(),
            min_activity_count,
        }
    }

    pub fn matches(&self, activity: &str) -> bool {
        activity == self.target_activity
    }

    pub fn exceeded_by(&self, count: u64) -> bool {
        i64::try_from(count).map_or(true, |c| c > self.min_activity_count)
    }
}

/// Case-insensitive set of species names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesNameFilter {
    names: BTreeSet<String>,
}

impl SpeciesNameFilter {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        SpeciesNameFilter {
            names: names.into_iter().map(|n| n.as_ref().to_lowercase()).collect(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(|n| n.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Every parameter the summary run needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisParams {
    pub activity: ActivityThreshold,
    pub species_filter: SpeciesNameFilter,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        AnalysisParams {
            activity: ActivityThreshold::new("hunting", 2),
            species_filter: SpeciesNameFilter::new(["polyphemus", "dromedarius"]),
        }
    }
}

// ============================================================================
// OPERATION 1: UNIQUE EXPEDITION COUNT
// ============================================================================

/// Distinct expedition ids in the batch (0 for an empty batch)
pub fn unique_expedition_count(batch: &Batch) -> u64 {
    let mut ids = CountDistinct::default();
    for row in explode_expeditions(batch) {
        ids.update(Some(row.expedition_id));
    }
    ids.count()
}

// ============================================================================
// OPERATION 2: UNIQUE SPECIES PER EXPEDITION
// ============================================================================

/// Distinct species names per expedition id, ascending by id.
///
/// Expeditions with an empty species list report 0. Records sharing an id
/// are merged into one row.
pub fn unique_species_per_expedition(batch: &Batch) -> Table<ExpeditionSpeciesCount> {
    species_per_expedition_from(batch, &explode_species(batch))
}

pub(crate) fn species_per_expedition_from<'a>(
    batch: &'a Batch,
    species_rows: &[SpeciesRow<'a>],
) -> Table<ExpeditionSpeciesCount> {
    let mut groups: GroupBy<&str, CountDistinct<&str>> = GroupBy::new();

    for expedition in batch {
        groups.touch(expedition.id.as_str());
    }
    for row in species_rows {
        groups.update(row.expedition_id, Some(row.name()));
    }

    species_count_table(&groups)
}

pub(crate) fn species_count_table<K, V>(
    groups: &GroupBy<K, CountDistinct<V>>,
) -> Table<ExpeditionSpeciesCount>
where
    K: Ord + AsRef<str>,
    V: Ord,
{
    let rows = groups
        .iter()
        .map(|(id, names)| ExpeditionSpeciesCount {
            expedition_id: id.as_ref().to_string(),
            count_unique_species: names.count(),
        })
        .collect();

    Table::new(rows, 0)
}

// ============================================================================
// OPERATION 3: SPECIES POPULATION TOTALS
// ============================================================================

/// Summed population per species name, descending; ties by name ascending
pub fn species_population_totals(batch: &Batch) -> Table<SpeciesPopulation> {
    population_totals_from(&explode_species(batch))
}

pub(crate) fn population_totals_from(species_rows: &[SpeciesRow<'_>]) -> Table<SpeciesPopulation> {
    let mut groups: GroupBy<&str, Sum> = GroupBy::new();

    for row in species_rows {
        groups.update(row.name(), row.population());
    }

    population_table(&groups)
}

pub(crate) fn population_table<K>(groups: &GroupBy<K, Sum>) -> Table<SpeciesPopulation>
where
    K: Ord + AsRef<str>,
{
    // Groups iterate by name, the stable sort keeps that order for ties
    let mut rows: Vec<SpeciesPopulation> = groups
        .iter()
        .map(|(name, total)| SpeciesPopulation {
            name: name.as_ref().to_string(),
            population: total.value(),
        })
        .collect();

    sort_descending_by(&mut rows, |r| r.population);
    Table::new(rows, 0)
}

// ============================================================================
// OPERATION 4: TRACKING ISSUES
// ============================================================================

/// Species entries with more tagged individuals than known population,
/// descending by ratio. Undefined ratios (population 0) come first; equal
/// ratios keep batch order.
pub fn tracking_issues(batch: &Batch) -> Table<TrackingIssue> {
    tracking_issues_from(&explode_species(batch), &mut Diagnostics::new())
}

/// Skipped species rows are recorded into `diagnostics`
pub(crate) fn tracking_issues_from(
    species_rows: &[SpeciesRow<'_>],
    diagnostics: &mut Diagnostics,
) -> Table<TrackingIssue> {
    let mut issues = Vec::new();
    for row in species_rows {
        if let Some(issue) = tracking_issue(row, diagnostics) {
            issues.push(issue);
        }
    }

    tracking_issue_table(issues, diagnostics)
}

/// Check one species row. Rows without a census count or a tagged count
/// cannot be compared and are recorded as skipped.
pub(crate) fn tracking_issue(row: &SpeciesRow<'_>, diagnostics: &mut Diagnostics) -> Option<TrackingIssue> {
    let population = match row.population() {
        Some(p) => p,
        None => {
            diagnostics.record(row.missing("population"));
            return None;
        }
    };

    let tagged = match row.tagged() {
        Some(t) => t,
        None => {
            let field = if row.species.tracking.is_none() {
                "tracking"
            } else {
                "tracking.tagged"
            };
            diagnostics.record(row.missing(field));
            return None;
        }
    };

    if tagged <= population {
        return None;
    }

    Some(TrackingIssue {
        expedition_id: row.expedition_id.to_string(),
        name: row.name().to_string(),
        population,
        tagged,
        ratio_tagged: TaggedRatio::compute(tagged, population),
        excess_count: tagged - population,
    })
}

pub(crate) fn tracking_issue_table(mut issues: Vec<TrackingIssue>, diagnostics: &Diagnostics) -> Table<TrackingIssue> {
    sort_descending_by(&mut issues, |i| i.ratio_tagged);
    Table::new(issues, diagnostics.len())
}

// ============================================================================
// OPERATION 5: ACTIVITY THRESHOLD
// ============================================================================

/// Expeditions whose sightings hold more than `min_activity_count` exact
/// matches of `target_activity`, descending by count; ties by id ascending.
pub fn activity_threshold_matches(batch: &Batch, threshold: &ActivityThreshold) -> Table<ActivityMatch> {
    let sightings = explode_sightings(&explode_species(batch));
    activity_matches_from(batch, &sightings, threshold)
}

pub(crate) fn activity_matches_from<'a>(
    batch: &'a Batch,
    sightings: &Flattened<SightingRow<'a>>,
    threshold: &ActivityThreshold,
) -> Table<ActivityMatch> {
    let mut groups: GroupBy<&str, Count> = GroupBy::new();

    // Every expedition is a candidate, even one with no sightings at all
    for expedition in batch {
        groups.touch(expedition.id.as_str());
    }
    for row in &sightings.rows {
        groups.update(row.expedition_id, threshold.matches(row.activity).then_some(()));
    }

    activity_match_table(&groups, threshold, &sightings.diagnostics)
}

pub(crate) fn activity_match_table<K>(
    groups: &GroupBy<K, Count>,
    threshold: &ActivityThreshold,
    diagnostics: &Diagnostics,
) -> Table<ActivityMatch>
where
    K: Ord + AsRef<str>,
{
    let mut rows: Vec<ActivityMatch> = groups
        .iter()
        .filter(|(_, count)| threshold.exceeded_by(count.value()))
        .map(|(id, count)| ActivityMatch {
            expedition_id: id.as_ref().to_string(),
            target_activity_count: count.value(),
        })
        .collect();

    sort_descending_by(&mut rows, |r| r.target_activity_count);
    Table::new(rows, diagnostics.len())
}

// ============================================================================
// OPERATION 6: MOST COMMON ACTIVITY PER SPECIES
// ============================================================================

/// Sort key plus payload of one gathered activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityEvent<'a> {
    pub end_date: NaiveDate,
    pub expedition_id: &'a str,
    pub species_name: &'a str,
    pub activity: &'a str,
}

impl<'a> From<&SightingRow<'a>> for ActivityEvent<'a> {
    fn from(row: &SightingRow<'a>) -> Self {
        ActivityEvent {
            end_date: row.end_date,
            expedition_id: row.expedition_id,
            species_name: row.species_name,
            activity: row.activity,
        }
    }
}

/// For every species name, the activity seen most often across all
/// expeditions, ties to the lexicographically smallest activity.
pub fn most_common_activity_per_species(batch: &Batch) -> Table<MostCommonActivity> {
    most_common_activity_from(&explode_sightings(&explode_species(batch)))
}

pub(crate) fn most_common_activity_from(sightings: &Flattened<SightingRow<'_>>) -> Table<MostCommonActivity> {
    let events: Vec<ActivityEvent<'_>> = sightings.rows.iter().map(ActivityEvent::from).collect();
    most_common_activity_table(events, &sightings.diagnostics)
}

/// Chronological by owning expedition: end date, then id, then source order
pub(crate) fn order_events(events: &mut [ActivityEvent<'_>]) {
    events.sort_by(|a, b| {
        a.end_date
            .cmp(&b.end_date)
            .then_with(|| a.expedition_id.cmp(b.expedition_id))
    });
}

/// Order the gathered events, then tally and rank per species
pub(crate) fn most_common_activity_table(
    mut events: Vec<ActivityEvent<'_>>,
    diagnostics: &Diagnostics,
) -> Table<MostCommonActivity> {
    order_events(&mut events);

    let mut groups: GroupBy<&str, ValueCounts<&str>> = GroupBy::new();
    for event in &events {
        groups.update(event.species_name, Some(event.activity));
    }

    let rows = top_per_group(&groups)
        .into_iter()
        .map(|ranked| MostCommonActivity {
            species_name: ranked.key.to_string(),
            most_common_activity: ranked.value.to_string(),
            count: ranked.count,
        })
        .collect();

    Table::new(rows, diagnostics.len())
}

// ============================================================================
// FILTER BY SPECIES NAME
// ============================================================================

/// Every species entry whose name is in the filter, in batch order.
///
/// One row per species element in the input. Entries are not merged, even
/// when two records repeat the same expedition/reserve/name.
pub fn filter_species_by_name(batch: &Batch, filter: &SpeciesNameFilter) -> Table<SpeciesEntry> {
    species_filter_from(&explode_species(batch), filter)
}

pub(crate) fn species_filter_from(species_rows: &[SpeciesRow<'_>], filter: &SpeciesNameFilter) -> Table<SpeciesEntry> {
    let rows = species_rows
        .iter()
        .filter(|row| filter.matches(row.name()))
        .map(species_entry)
        .collect();

    Table::new(rows, 0)
}

pub(crate) fn species_entry(row: &SpeciesRow<'_>) -> SpeciesEntry {
    SpeciesEntry {
        expedition_id: row.expedition_id.to_string(),
        reserve_name: row.reserve_name.map(|n| n.to_string()),
        name: row.name().to_string(),
        population: row.population(),
        tagged: row.tagged(),
        sightings: row.species.sightings().map(|s| s.to_vec()).unwrap_or_default(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Expedition, Reserve, Sighting, Species, Tracking};

    fn date(d: &str) -> NaiveDate {
        NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()
    }

    fn species(name: &str, population: u64, tagged: u64, activities: &[&str]) -> Species {
        Species {
            name: name.to_string(),
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
        }
    }

    fn expedition(id: &str, end_date: &str, species: Vec<Species>) -> Expedition {
        Expedition {
            id: id.to_string(),
            start_date: None,
            end_date: date(end_date),
            location: None,
            reserve: Reserve {
                name: Some(format!("{} reserve", id)),
                location: None,
                species,
                environmental_conditions: None,
            },
        }
    }

    fn create_lion_batch() -> Batch {
        Batch::new(vec![
            expedition(
                "E1",
                "2024-05-01",
                vec![species("lion", 10, 12, &["hunting", "hunting", "resting"])],
            ),
            expedition("E2", "2024-06-01", vec![species("lion", 5, 2, &["hunting"])]),
        ])
    }

    #[test]
    fn test_lion_scenario() {
        let batch = create_lion_batch();

        assert_eq!(unique_expedition_count(&batch), 2);

        let totals = species_population_totals(&batch);
        assert_eq!(
            totals.rows,
            vec![SpeciesPopulation {
                name: "lion".to_string(),
                population: 15
            }]
        );

        let issues = tracking_issues(&batch);
        assert_eq!(issues.len(), 1);
        let issue = &issues.rows[0];
        assert_eq!(issue.expedition_id, "E1");
        assert_eq!(issue.name, "lion");
        assert_eq!(issue.population, 10);
        assert_eq!(issue.tagged, 12);
        assert_eq!(issue.ratio_tagged, TaggedRatio::Defined(1.2));
        assert_eq!(issue.excess_count, 2);

        let matches = activity_threshold_matches(&batch, &ActivityThreshold::new("hunting", 1));
        assert_eq!(
            matches.rows,
            vec![ActivityMatch {
                expedition_id: "E1".to_string(),
                target_activity_count: 2
            }]
        );

        let common = most_common_activity_per_species(&batch);
        assert_eq!(
            common.rows,
            vec![MostCommonActivity {
                species_name: "lion".to_string(),
                most_common_activity: "hunting".to_string(),
                count: 3
            }]
        );
    }

    #[test]
    fn test_empty_batch_is_well_defined() {
        let batch = Batch::default();

        assert_eq!(unique_expedition_count(&batch), 0);
        assert!(unique_species_per_expedition(&batch).is_empty());
        assert!(species_population_totals(&batch).is_empty());
        assert!(tracking_issues(&batch).is_empty());
        assert!(activity_threshold_matches(&batch, &ActivityThreshold::new("hunting", 0)).is_empty());
        assert!(most_common_activity_per_species(&batch).is_empty());
        assert!(filter_species_by_name(&batch, &SpeciesNameFilter::new(["lion"])).is_empty());
    }

    #[test]
    fn test_unique_expedition_count_with_duplicate_ids() {
        let batch = Batch::new(vec![
            expedition("E1", "2024-01-01", vec![]),
            expedition("E1", "2024-02-01", vec![]),
            expedition("E2", "2024-03-01", vec![]),
        ]);

        let count = unique_expedition_count(&batch);
        assert_eq!(count, 2);
        assert!(count < batch.len() as u64);
    }

    #[test]
    fn test_unique_species_per_expedition() {
        let batch = Batch::new(vec![
            expedition(
                "E2",
                "2024-01-01",
                vec![
                    species("lion", 1, 0, &[]),
                    species("zebra", 1, 0, &[]),
                    species("lion", 4, 0, &[]),
                ],
            ),
            expedition("E1", "2024-01-01", vec![]),
        ]);

        let table = unique_species_per_expedition(&batch);
        assert_eq!(
            table.rows,
            vec![
                ExpeditionSpeciesCount {
                    expedition_id: "E1".to_string(),
                    count_unique_species: 0
                },
                ExpeditionSpeciesCount {
                    expedition_id: "E2".to_string(),
                    count_unique_species: 2
                },
            ]
        );
    }

    #[test]
    fn test_population_totals_merge_and_tie_break() {
        let batch = Batch::new(vec![
            expedition(
                "E1",
                "2024-01-01",
                vec![species("zebra", 7, 0, &[]), species("lion", 3, 0, &[])],
            ),
            expedition(
                "E2",
                "2024-01-01",
                vec![species("lion", 4, 0, &[]), species("okapi", 20, 0, &[])],
            ),
        ]);

        let table = species_population_totals(&batch);
        let rows: Vec<(&str, u128)> = table.iter().map(|r| (r.name.as_str(), r.population)).collect();

        // lion and zebra tie at 7, name ascending decides
        assert_eq!(rows, vec![("okapi", 20), ("lion", 7), ("zebra", 7)]);

        let total: u128 = rows.iter().map(|r| r.1).sum();
        let exploded: u128 = explode_species(&batch)
            .iter()
            .filter_map(|r| r.population())
            .map(u128::from)
            .sum();
        assert_eq!(total, exploded);
    }

    #[test]
    fn test_population_totals_past_u64_range() {
        let half = u64::MAX / 2 + 1;
        let batch = Batch::new(vec![
            expedition("E1", "2024-01-01", vec![species("lion", half, 0, &[])]),
            expedition("E2", "2024-01-02", vec![species("lion", half, 0, &[])]),
        ]);

        let table = species_population_totals(&batch);
        assert_eq!(table.rows[0].population, u128::from(half) * 2);
        assert!(table.rows[0].population > u128::from(u64::MAX));
    }

    #[test]
    fn test_population_null_counts_as_zero() {
        let mut okapi = species("okapi", 0, 0, &[]);
        okapi.population = None;
        let batch = Batch::new(vec![expedition(
            "E1",
            "2024-01-01",
            vec![okapi, species("okapi", 2, 0, &[])],
        )]);

        let table = species_population_totals(&batch);
        assert_eq!(table.rows[0].population, 2);
    }

    #[test]
    fn test_tracking_issue_zero_population_is_undefined() {
        let batch = Batch::new(vec![expedition(
            "E1",
            "2024-01-01",
            vec![
                species("rhino", 4, 9, &[]),
                species("pangolin", 0, 1, &[]),
                species("okapi", 0, 0, &[]),
            ],
        )]);

        let table = tracking_issues(&batch);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].name, "pangolin");
        assert!(table.rows[0].ratio_tagged.is_undefined());
        assert_eq!(table.rows[0].excess_count, 1);
        assert_eq!(table.rows[1].ratio_tagged, TaggedRatio::Defined(2.25));

        for row in table.iter() {
            assert!(row.tagged > row.population);
        }
    }

    #[test]
    fn test_tracking_issues_skip_rows_without_counts() {
        let mut untracked = species("okapi", 1, 0, &[]);
        untracked.tracking = None;
        let mut uncounted = species("lion", 1, 5, &[]);
        uncounted.population = None;

        let batch = Batch::new(vec![expedition(
            "E1",
            "2024-01-01",
            vec![untracked, uncounted, species("zebra", 1, 2, &[])],
        )]);

        let table = tracking_issues(&batch);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].name, "zebra");
        assert_eq!(table.skipped_rows, 2);
    }

    #[test]
    fn test_tracking_issues_equal_ratios_keep_batch_order() {
        let batch = Batch::new(vec![
            expedition("E1", "2024-01-01", vec![species("b-species", 2, 4, &[])]),
            expedition("E2", "2024-01-01", vec![species("a-species", 1, 2, &[])]),
        ]);

        let table = tracking_issues(&batch);
        let names: Vec<&str> = table.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b-species", "a-species"]);
    }

    #[test]
    fn test_activity_threshold_is_exact_and_complete() {
        let batch = Batch::new(vec![
            expedition(
                "E1",
                "2024-01-01",
                vec![
                    species("lion", 1, 0, &["hunting", "Hunting"]),
                    species("cheetah", 1, 0, &["hunting", "hunting "]),
                ],
            ),
            expedition(
                "E2",
                "2024-01-01",
                vec![species("lion", 1, 0, &["hunting", "hunting", "hunting"])],
            ),
            expedition("E3", "2024-01-01", vec![species("lion", 1, 0, &["resting"])]),
        ]);

        let threshold = ActivityThreshold::new("hunting", 1);
        let table = activity_threshold_matches(&batch, &threshold);
        let rows: Vec<(&str, u64)> = table
            .iter()
            .map(|r| (r.expedition_id.as_str(), r.target_activity_count))
            .collect();
        assert_eq!(rows, vec![("E2", 3), ("E1", 2)]);

        // A negative threshold admits expeditions with zero matches
        let table = activity_threshold_matches(&batch, &ActivityThreshold::new("hunting", -1));
        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[2].expedition_id, "E3");
    }

    #[test]
    fn test_activity_threshold_treats_value_as_data() {
        let batch = Batch::new(vec![expedition(
            "E1",
            "2024-01-01",
            vec![species("lion", 1, 0, &["hunting' OR '1'='1", "resting"])],
        )]);

        let injected = ActivityThreshold::new("hunting' OR '1'='1", 0);
        let table = activity_threshold_matches(&batch, &injected);
        assert_eq!(table.rows[0].target_activity_count, 1);

        let other = ActivityThreshold::new("' OR ''='", 0);
        assert!(activity_threshold_matches(&batch, &other).is_empty());
    }

    #[test]
    fn test_most_common_activity_tie_break() {
        let batch = Batch::new(vec![
            expedition("E2", "2024-03-01", vec![species("zebra", 1, 0, &["running", "grazing"])]),
            expedition("E1", "2024-03-01", vec![species("zebra", 1, 0, &["drinking"])]),
            expedition("E0", "2024-09-01", vec![species("zebra", 1, 0, &["drinking", "running"])]),
            expedition("E3", "2024-01-01", vec![species("gnu", 1, 0, &[])]),
        ]);

        let table = most_common_activity_per_species(&batch);

        // drinking and running tie at 2; gnu has no sightings and no row
        assert_eq!(
            table.rows,
            vec![MostCommonActivity {
                species_name: "zebra".to_string(),
                most_common_activity: "drinking".to_string(),
                count: 2
            }]
        );
    }

    #[test]
    fn test_activity_events_ordered_by_end_date_then_id() {
        let batch = Batch::new(vec![
            expedition("E9", "2024-03-01", vec![species("zebra", 1, 0, &["late"])]),
            expedition("E2", "2024-01-01", vec![species("zebra", 1, 0, &["b", "a"])]),
            expedition("E1", "2024-01-01", vec![species("zebra", 1, 0, &["c"])]),
        ]);

        let sightings = explode_sightings(&explode_species(&batch));
        let mut events: Vec<ActivityEvent<'_>> = sightings.rows.iter().map(ActivityEvent::from).collect();
        order_events(&mut events);

        let order: Vec<&str> = events.iter().map(|e| e.activity).collect();
        assert_eq!(order, vec!["c", "b", "a", "late"]);
    }

    #[test]
    fn test_filter_species_by_name_is_case_insensitive() {
        let batch = Batch::new(vec![
            expedition(
                "E1",
                "2024-01-01",
                vec![
                    species("Polyphemus", 3, 1, &["flying"]),
                    species("lion", 3, 1, &[]),
                ],
            ),
            expedition("E1", "2024-01-01", vec![species("DROMEDARIUS", 8, 2, &[])]),
        ]);

        let filter = SpeciesNameFilter::new(["polyphemus", "Dromedarius"]);
        let table = filter_species_by_name(&batch, &filter);

        let names: Vec<&str> = table.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Polyphemus", "DROMEDARIUS"]);
        assert_eq!(table.rows[0].tagged, Some(1));
        assert_eq!(table.rows[0].sightings.len(), 1);
        assert_eq!(table.rows[1].reserve_name.as_deref(), Some("E1 reserve"));
    }

    #[test]
    fn test_filter_keeps_repeated_entries() {
        let repeated = expedition("E1", "2024-01-01", vec![species("lion", 3, 1, &[])]);
        let batch = Batch::new(vec![repeated.clone(), repeated]);

        let table = filter_species_by_name(&batch, &SpeciesNameFilter::new(["LION"]));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_operations_are_idempotent() {
        let batch = create_lion_batch();

        let first = serde_json::to_string(&tracking_issues(&batch)).unwrap();
        let second = serde_json::to_string(&tracking_issues(&batch)).unwrap();
        assert_eq!(first, second);

        assert_eq!(
            most_common_activity_per_species(&batch),
            most_common_activity_per_species(&batch)
        );
    }
}

// Expedition Analytics - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod model;        // Record model: expeditions, reserves, species, sightings
pub mod schema;       // Shape Layer - raw JSON coercion
pub mod ingest;       // NDJSON reading and chunking
pub mod diagnostics;  // Skipped-row reporting
pub mod flatten;      // Nested records to flat rows
pub mod aggregate;    // Accumulators and group-by
pub mod rank;         // Top value per group, stable sorts
pub mod table;        // Result rows and tables
pub mod query;        // The analytical operations
pub mod streaming;    // Incremental and sharded analysis
pub mod report;       // Summary bundle, rendering, CSV export
pub mod config;       // Layered configuration

// Re-export commonly used types
pub use model::{
    Batch, Expedition, Reserve, Species, Tracking, Sighting,
    Location, HighLow, EnvironmentalConditions, parse_date,
};
pub use schema::{ExpeditionSchema, SchemaMismatch, CoercionResult};
pub use ingest::{
    read_ndjson, Chunk, IngestReport, NdjsonChunks, NdjsonSource, RecordSource,
};
pub use diagnostics::{Diagnostics, FieldMissing};
pub use flatten::{
    explode_expeditions, explode_species, explode_sightings, explode_species_sightings,
    ExpeditionRow, SpeciesRow, SightingRow, Flattened,
};
pub use aggregate::{
    group_by, Accumulator, Mergeable, Count, Sum, CountDistinct, ValueCounts, GroupBy,
};
pub use rank::{sort_descending_by, top_per_group, top_value, Ranked};
pub use table::{
    Table, TableRow, TaggedRatio,
    ExpeditionSpeciesCount, SpeciesPopulation, TrackingIssue,
    ActivityMatch, MostCommonActivity, SpeciesEntry,
};
pub use query::{
    unique_expedition_count, unique_species_per_expedition, species_population_totals,
    tracking_issues, activity_threshold_matches, most_common_activity_per_species,
    filter_species_by_name,
    ActivityThreshold, SpeciesNameFilter, AnalysisParams,
};
pub use streaming::{analyze_sharded, StreamingAnalysis};
pub use report::{summarize, render_table, to_csv_string, write_csv, AnalysisReport};
pub use config::AnalyticsConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

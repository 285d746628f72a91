//! Water consumption engine
//!
//! Ingests a directory of heterogeneous CSV extracts, reconciles them to one
//! canonical schema, joins district names and answers filter and aggregate
//! queries over the result.
//!
//! ## Architecture
//!
//! ```text
//! CsvIngestor ──┐
//!               ├─> UnifiedDataCache ─> query::filter ─> aggregates / export::to_csv
//! DistrictLookupLoader
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use cabal::consumption::{ConsumptionFilter, UnifiedDataCache, query};
//! use std::path::Path;
//!
//! let mut cache = UnifiedDataCache::default();
//! let table = cache.get_or_build(Path::new("./data"))?;
//! let filtered = query::filter(&table, &ConsumptionFilter::default())?;
//! let metrics = query::metrics(&filtered)?;
//! # Ok::<(), cabal::error::CabalError>(())
//! ```

pub mod cache;
pub mod coerce;
pub mod export;
pub mod ingest;
pub mod lookup;
pub mod normalize;
pub mod query;
pub mod schema;
pub mod types;

#[cfg(test)]
pub(crate) mod fixtures;

pub use cache::{UnifiedDataCache, enrich};
pub use export::{to_csv, write_csv};
pub use ingest::{
    CsvDecoder, CsvIngestor, Delimiter, FileOutcome, IngestReport, PolarsCsvDecoder,
};
pub use lookup::{DEFAULT_LOOKUP_FILE, DistrictLookup, DistrictLookupLoader, LookupOutcome};
pub use normalize::{match_key, normalize_text};
pub use query::{ConsumptionFilter, DateRange, Selection};
pub use schema::{AliasTable, CanonicalField, canonical_columns};
pub use types::{
    CanonicalRecord, DailyPoint, DistrictTotal, FilterOptions, Metrics, SectionTotal,
    UnifiedTable, UsagePoint, UsageTotal,
};

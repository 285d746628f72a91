//! # Cabal - Water Consumption Explorer
//!
//! Cabal loads municipal water-consumption extracts (CSV files that disagree on
//! delimiter, header casing and accents), reconciles them into one canonical
//! table and answers filtered aggregate queries over it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use cabal::consumption::{ConsumptionFilter, Selection, UnifiedDataCache, query};
//! use std::path::Path;
//!
//! # fn example() -> cabal::error::Result<()> {
//! let mut cache = UnifiedDataCache::default();
//! let table = cache.get_or_build(Path::new("./aigua"))?;
//!
//! let criteria = ConsumptionFilter {
//!     usage_types: Selection::from_values(["Residencial".to_owned()]),
//!     ..ConsumptionFilter::default()
//! };
//! let filtered = query::filter(&table, &criteria)?;
//! for section in query::top_sections(&filtered, 20)? {
//!     println!("{}: {}", section.census_section, section.consumption);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`consumption`]: ingestion, reconciliation, caching, queries and export
//! - [`config`]: persisted application settings
//! - [`error`]: Error types and handling utilities
//! - [`logging`]: tracing setup with rotating log files
//! - [`utils`]: Presentation helpers
//!
//! ## Key Concepts
//!
//! ### Degrade, don't abort
//!
//! An unreadable file is skipped and reported, a broken lookup leaves district
//! names missing, and filters that exclude everything produce zero metrics.
//! Only dataframe engine failures surface as errors.

#![warn(clippy::all, rust_2018_idioms)]

pub mod config;
pub mod consumption;
pub mod error;
pub mod logging;
pub mod utils;

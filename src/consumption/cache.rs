//! Session-owned cache of the unified table.
//!
//! The cache remembers one root directory. Asking for the same root again
//! returns a copy of the stored table; asking for another root, or calling
//! [`UnifiedDataCache::refresh`], rebuilds from disk. There is no file-change
//! detection: the table is stale until refreshed.

use super::coerce::usage_leaf;
use super::ingest::{CsvDecoder, CsvIngestor, IngestReport, PolarsCsvDecoder};
use super::lookup::{DistrictLookup, DistrictLookupLoader, LookupOutcome};
use super::schema::{DISTRICT, DISTRICT_NAME, USAGE, USAGE_RAW};
use super::types::{UnifiedTable, number_column, text_column};
use crate::config::AppConfig;
use crate::error::Result;
use polars::prelude::*;
use std::path::{Path, PathBuf};

/// Adds the derived usage column and, when a lookup is available, the
/// district name column. The name join is a left join: ids missing from the
/// lookup keep a null name and the row survives.
///
/// # Errors
///
/// Fails if the frame lacks the canonical usage or district columns.
pub fn enrich(
    mut frame: DataFrame,
    lookup: Option<&DistrictLookup>,
    usage_separator: &str,
) -> Result<DataFrame> {
    let usages: Vec<String> = text_column(&frame, USAGE_RAW)?
        .into_iter()
        .map(|raw| usage_leaf(raw.unwrap_or_default(), usage_separator).to_owned())
        .collect();
    frame.with_column(Series::new(USAGE.into(), usages))?;

    if let Some(lookup) = lookup {
        let names: Vec<Option<String>> = number_column(&frame, DISTRICT)?
            .into_iter()
            .map(|id| id.and_then(|id| lookup.name(id)).map(str::to_owned))
            .collect();
        frame.with_column(Series::new(DISTRICT_NAME.into(), names))?;
    }

    Ok(frame)
}

/// Absolute form of `root`, used as the cache key.
pub fn resolve_root(root: &Path) -> PathBuf {
    std::fs::canonicalize(root)
        .or_else(|_| std::path::absolute(root))
        .unwrap_or_else(|_| root.to_path_buf())
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub root: PathBuf,
    pub table: UnifiedTable,
    pub lookup: LookupOutcome,
    pub report: IngestReport,
}

pub struct UnifiedDataCache<D = PolarsCsvDecoder> {
    ingestor: CsvIngestor<D>,
    lookup_loader: DistrictLookupLoader<D>,
    config: AppConfig,
    entry: Option<CacheEntry>,
}

impl UnifiedDataCache {
    pub fn new(config: AppConfig) -> Self {
        Self::with_decoder(PolarsCsvDecoder, config)
    }
}

impl Default for UnifiedDataCache {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl<D: CsvDecoder + Clone> UnifiedDataCache<D> {
    pub fn with_decoder(decoder: D, config: AppConfig) -> Self {
        Self {
            ingestor: CsvIngestor::with_decoder(decoder.clone()),
            lookup_loader: DistrictLookupLoader::new(decoder, config.lookup_file.clone()),
            config,
            entry: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Unified table for `root`, built on first use and reused until the root
    /// changes or [`Self::refresh`] is called. The returned table is an
    /// independent copy.
    ///
    /// # Errors
    ///
    /// Only propagates dataframe engine failures; unreadable files and
    /// lookups degrade to skipped files and missing names.
    pub fn get_or_build(&mut self, root: &Path) -> Result<UnifiedTable> {
        let key = resolve_root(root);
        if let Some(entry) = self.entry.as_ref().filter(|e| e.root == key) {
            tracing::debug!("Cache hit for {}", key.display());
            return Ok(entry.table.clone());
        }
        tracing::debug!("Cache miss for {}", key.display());
        self.rebuild(key)
    }

    /// Rebuilds from disk unconditionally.
    ///
    /// # Errors
    ///
    /// See [`Self::get_or_build`].
    pub fn refresh(&mut self, root: &Path) -> Result<UnifiedTable> {
        let key = resolve_root(root);
        tracing::info!("Refreshing {}", key.display());
        self.rebuild(key)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }

    pub fn cached_root(&self) -> Option<&Path> {
        self.entry.as_ref().map(|e| e.root.as_path())
    }

    /// Per-file outcomes of the last build, for surfacing skip warnings.
    pub fn last_report(&self) -> Option<&IngestReport> {
        self.entry.as_ref().map(|e| &e.report)
    }

    pub fn lookup_outcome(&self) -> Option<&LookupOutcome> {
        self.entry.as_ref().map(|e| &e.lookup)
    }

    fn rebuild(&mut self, root: PathBuf) -> Result<UnifiedTable> {
        let entry = self.build(root)?;
        let table = entry.table.clone();
        self.entry = Some(entry);
        Ok(table)
    }

    fn build(&self, root: PathBuf) -> Result<CacheEntry> {
        let ingested = self.ingestor.ingest_dir(&self.config.data_dir(&root))?;
        let lookup = self.lookup_loader.load(&root);
        let frame = enrich(
            ingested.frame,
            lookup.lookup(),
            &self.config.usage_separator,
        )?;
        tracing::info!(
            "Built unified table for {}: {} row(s), district names {}",
            root.display(),
            frame.height(),
            if lookup.lookup().is_some() { "joined" } else { "unavailable" }
        );
        Ok(CacheEntry {
            root,
            table: UnifiedTable::new(frame),
            lookup,
            report: ingested.report,
        })
    }
}

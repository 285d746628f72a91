use super::coerce::parse_number;
use super::ingest::{CsvDecoder, Delimiter, PolarsCsvDecoder, decode_with_fallback};
use super::schema::reconcile_lookup_columns;
use crate::error::Result;
use polars::prelude::*;
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_LOOKUP_FILE: &str = "districtes.csv";

// Folds -0.0 into 0.0 so both hash alike.
fn id_key(id: f64) -> u64 {
    (id + 0.0).to_bits()
}

/// District id to display name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DistrictLookup {
    entries: Vec<(f64, String)>,
    index: HashMap<u64, usize>,
}

impl DistrictLookup {
    /// Builds a lookup from `(id, name)` pairs. A repeated id keeps its first
    /// name so every row of a district is enriched identically.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, String)>) -> Self {
        let mut lookup = Self::default();
        for (id, name) in pairs {
            if !id.is_finite() || lookup.index.contains_key(&id_key(id)) {
                continue;
            }
            lookup.index.insert(id_key(id), lookup.entries.len());
            lookup.entries.push((id, name));
        }
        lookup
    }

    pub fn name(&self, id: f64) -> Option<&str> {
        self.index
            .get(&id_key(id))
            .and_then(|idx| self.entries.get(*idx))
            .map(|(_, name)| name.as_str())
    }

    pub fn entries(&self) -> &[(f64, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of looking for the district side table.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupOutcome {
    Loaded {
        lookup: DistrictLookup,
        delimiter: Delimiter,
    },
    /// No lookup file at the root.
    Absent,
    /// A lookup file exists but could not be used; enrichment is skipped.
    Unavailable { reason: String },
}

impl LookupOutcome {
    pub fn lookup(&self) -> Option<&DistrictLookup> {
        match self {
            Self::Loaded { lookup, .. } => Some(lookup),
            Self::Absent | Self::Unavailable { .. } => None,
        }
    }
}

/// Extracts the id→name mapping from a decoded lookup frame. Rows whose id
/// is not numeric, or whose name is missing, are discarded.
///
/// # Errors
///
/// Fails when the frame has fewer than two columns or the chosen columns
/// cannot be read as text.
pub fn lookup_from_frame(raw: &DataFrame) -> Result<Option<DistrictLookup>> {
    let headers: Vec<String> = raw
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let Some(columns) = reconcile_lookup_columns(&headers) else {
        return Ok(None);
    };

    let ids = raw
        .column(&columns.id)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    let names = raw
        .column(&columns.name)?
        .as_materialized_series()
        .cast(&DataType::String)?;

    let pairs = ids
        .str()?
        .into_iter()
        .zip(names.str()?)
        .filter_map(|(id, name)| {
            let id = id.and_then(parse_number)?;
            Some((id, name?.trim().to_owned()))
        });
    Ok(Some(DistrictLookup::from_pairs(pairs)))
}

/// Loads the optional district lookup file from a root directory.
#[derive(Clone, Debug)]
pub struct DistrictLookupLoader<D = PolarsCsvDecoder> {
    decoder: D,
    file_name: String,
}

impl Default for DistrictLookupLoader {
    fn default() -> Self {
        Self::new(PolarsCsvDecoder, DEFAULT_LOOKUP_FILE)
    }
}

impl<D: CsvDecoder> DistrictLookupLoader<D> {
    pub fn new(decoder: D, file_name: impl Into<String>) -> Self {
        Self {
            decoder,
            file_name: file_name.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Never fails: a missing, malformed or empty lookup only disables
    /// enrichment, and the reason is logged.
    pub fn load(&self, root: &Path) -> LookupOutcome {
        let path = root.join(&self.file_name);
        if !path.is_file() {
            tracing::debug!("No district lookup at {}", path.display());
            return LookupOutcome::Absent;
        }

        let unavailable = |reason: String| {
            tracing::warn!(
                "District lookup {} ignored: {reason}; district names will be missing",
                path.display()
            );
            LookupOutcome::Unavailable { reason }
        };

        let (delimiter, raw) = match decode_with_fallback(&self.decoder, &path) {
            Ok(decoded) => decoded,
            Err(failure) => return unavailable(failure.to_string()),
        };

        match lookup_from_frame(&raw) {
            Ok(Some(lookup)) if !lookup.is_empty() => {
                tracing::info!(
                    "Loaded {} district name(s) from {}",
                    lookup.len(),
                    path.display()
                );
                LookupOutcome::Loaded { lookup, delimiter }
            }
            Ok(Some(_)) => unavailable("no rows with a numeric id".to_owned()),
            Ok(None) => unavailable("fewer than two columns".to_owned()),
            Err(e) => unavailable(e.to_string()),
        }
    }
}

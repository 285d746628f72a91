//! Directory ingestion: discovery, delimiter fallback, reconciliation and
//! type coercion of consumption extracts.

use super::coerce::{parse_date, parse_number};
use super::schema::{AliasTable, CanonicalField, ColumnMapping, DATE};
use super::types::{ColumnBuffers, empty_canonical_frame};
use crate::error::Result;
use polars::prelude::*;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Delimiters tried for every file, in preference order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Delimiter {
    Comma,
    Semicolon,
    Tab,
}

impl Delimiter {
    pub const PREFERENCE: [Self; 3] = [Self::Comma, Self::Semicolon, Self::Tab];

    pub fn byte(self) -> u8 {
        match self {
            Self::Comma => b',',
            Self::Semicolon => b';',
            Self::Tab => b'\t',
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comma => write!(f, "comma"),
            Self::Semicolon => write!(f, "semicolon"),
            Self::Tab => write!(f, "tab"),
        }
    }
}

/// Decodes one CSV file with a given delimiter into a frame of text columns.
pub trait CsvDecoder {
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or is not valid CSV
    /// under `delimiter`.
    fn decode(&self, path: &Path, delimiter: Delimiter) -> Result<DataFrame>;
}

/// Polars-backed decoder. Schema inference is disabled so every column
/// arrives as text and coercion stays under our control.
#[derive(Clone, Copy, Debug, Default)]
pub struct PolarsCsvDecoder;

impl CsvDecoder for PolarsCsvDecoder {
    fn decode(&self, path: &Path, delimiter: Delimiter) -> Result<DataFrame> {
        let parse_options = CsvParseOptions::default()
            .with_separator(delimiter.byte())
            .with_encoding(CsvEncoding::LossyUtf8)
            .with_missing_is_null(true);

        let df = CsvReadOptions::default()
            .with_parse_options(parse_options)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        Ok(df)
    }
}

/// Every delimiter attempt that failed for one file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecodeFailure {
    pub attempts: Vec<(Delimiter, String)>,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .attempts
            .iter()
            .map(|(delimiter, reason)| format!("{delimiter}: {reason}"))
            .collect();
        write!(f, "no delimiter worked ({})", parts.join("; "))
    }
}

/// Tries each delimiter in [`Delimiter::PREFERENCE`] order and keeps the first
/// decode that succeeds and actually splits the header into several columns.
pub fn decode_with_fallback<D: CsvDecoder + ?Sized>(
    decoder: &D,
    path: &Path,
) -> std::result::Result<(Delimiter, DataFrame), DecodeFailure> {
    let mut attempts = Vec::new();
    for delimiter in Delimiter::PREFERENCE {
        match decoder.decode(path, delimiter) {
            Ok(df) if df.width() >= 2 => {
                tracing::debug!("Decoded {} with {delimiter} delimiter", path.display());
                return Ok((delimiter, df));
            }
            Ok(df) => attempts.push((
                delimiter,
                format!("header split into {} column(s)", df.width()),
            )),
            Err(e) => attempts.push((delimiter, e.to_string())),
        }
    }
    Err(DecodeFailure { attempts })
}

/// A file that decoded and reconciled.
#[derive(Clone, Debug)]
pub struct ParsedFile {
    pub path: PathBuf,
    pub delimiter: Delimiter,
    pub frame: DataFrame,
    pub dropped_rows: usize,
    pub absent_fields: Vec<CanonicalField>,
}

/// A file left out of the unified table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Per-file result of ingestion.
#[derive(Clone, Debug)]
pub enum FileOutcome {
    Parsed(ParsedFile),
    Skipped(SkippedFile),
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Parsed(parsed) => &parsed.path,
            Self::Skipped(skipped) => &skipped.path,
        }
    }
}

/// Outcome of ingesting a whole directory.
#[derive(Clone, Debug, Default)]
pub struct IngestReport {
    pub files: Vec<FileOutcome>,
}

impl IngestReport {
    pub fn parsed(&self) -> impl Iterator<Item = &ParsedFile> + '_ {
        self.files.iter().filter_map(|outcome| match outcome {
            FileOutcome::Parsed(parsed) => Some(parsed),
            FileOutcome::Skipped(_) => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = &SkippedFile> + '_ {
        self.files.iter().filter_map(|outcome| match outcome {
            FileOutcome::Skipped(skipped) => Some(skipped),
            FileOutcome::Parsed(_) => None,
        })
    }

    pub fn dropped_rows(&self) -> usize {
        self.parsed().map(|p| p.dropped_rows).sum()
    }
}

/// Date-sorted union of every parsed file plus the per-file report.
#[derive(Clone, Debug)]
pub struct Ingested {
    pub frame: DataFrame,
    pub report: IngestReport,
}

/// CSV files directly under `dir`, in lexicographic path order. A missing or
/// unreadable directory yields no files.
pub fn discover_csv_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot list {}: {e}", dir.display());
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    files
}

/// Source column of `raw` as text, whatever dtype the decoder produced.
fn source_as_text(raw: &DataFrame, source: Option<&str>) -> Result<Option<Series>> {
    let Some(name) = source else {
        return Ok(None);
    };
    let series = raw
        .column(name)?
        .as_materialized_series()
        .cast(&DataType::String)?;
    Ok(Some(series))
}

/// Applies `mapping` to a decoded frame, coercing each canonical field and
/// dropping rows without a valid date or consumption. Returns the canonical
/// frame and the number of dropped rows.
pub fn coerce_frame(raw: &DataFrame, mapping: &ColumnMapping) -> Result<(DataFrame, usize)> {
    let fetch = |field| source_as_text(raw, mapping.source(field));
    let sections = fetch(CanonicalField::CensusSection)?;
    let districts = fetch(CanonicalField::DistrictId)?;
    let municipalities = fetch(CanonicalField::Municipality)?;
    let dates = fetch(CanonicalField::ReadingDate)?;
    let usages = fetch(CanonicalField::UsageTypeRaw)?;
    let meters = fetch(CanonicalField::MeterCount)?;
    let consumption = fetch(CanonicalField::Consumption)?;

    let as_str = |series: &Option<Series>| -> Result<Option<StringChunked>> {
        Ok(series.as_ref().map(|s| s.str().cloned()).transpose()?)
    };
    let sections = as_str(&sections)?;
    let districts = as_str(&districts)?;
    let municipalities = as_str(&municipalities)?;
    let dates = as_str(&dates)?;
    let usages = as_str(&usages)?;
    let meters = as_str(&meters)?;
    let consumption = as_str(&consumption)?;

    let cell = |ca: &Option<StringChunked>, idx: usize| -> Option<String> {
        ca.as_ref().and_then(|c| c.get(idx)).map(str::to_owned)
    };

    let mut buffers = ColumnBuffers::default();
    let mut dropped = 0;
    for idx in 0..raw.height() {
        let date = cell(&dates, idx).as_deref().and_then(parse_date);
        let litres = cell(&consumption, idx).as_deref().and_then(parse_number);
        let (Some(date), Some(litres)) = (date, litres) else {
            dropped += 1;
            continue;
        };

        buffers.sections.push(cell(&sections, idx).unwrap_or_default());
        buffers
            .districts
            .push(cell(&districts, idx).as_deref().and_then(parse_number));
        buffers
            .municipalities
            .push(cell(&municipalities, idx).unwrap_or_default());
        buffers.dates.push(date);
        buffers.usages.push(cell(&usages, idx).unwrap_or_default());
        buffers
            .meters
            .push(cell(&meters, idx).as_deref().and_then(parse_number));
        buffers.consumption.push(litres);
    }

    debug_assert_eq!(buffers.len() + dropped, raw.height());
    Ok((buffers.into_frame()?, dropped))
}

/// Turns a directory of heterogeneous extracts into one canonical frame.
#[derive(Clone, Debug, Default)]
pub struct CsvIngestor<D = PolarsCsvDecoder> {
    decoder: D,
    aliases: AliasTable,
}

impl CsvIngestor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: CsvDecoder> CsvIngestor<D> {
    pub fn with_decoder(decoder: D) -> Self {
        Self {
            decoder,
            aliases: AliasTable::canonical(),
        }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Decodes and reconciles one file. Failures become [`FileOutcome::Skipped`].
    pub fn ingest_file(&self, path: &Path) -> FileOutcome {
        let (delimiter, raw) = match decode_with_fallback(&self.decoder, path) {
            Ok(decoded) => decoded,
            Err(failure) => {
                tracing::warn!("Skipping {}: {failure}", path.display());
                return FileOutcome::Skipped(SkippedFile {
                    path: path.to_path_buf(),
                    reason: failure.to_string(),
                });
            }
        };

        let headers: Vec<String> = raw
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let mapping = self.aliases.reconcile(&headers);
        let absent_fields = mapping.absent();
        if !absent_fields.is_empty() {
            tracing::debug!(
                "{} lacks {:?}; filling with missing values",
                path.display(),
                absent_fields
            );
        }

        match coerce_frame(&raw, &mapping) {
            Ok((frame, dropped_rows)) => {
                if dropped_rows > 0 {
                    tracing::debug!(
                        "Dropped {dropped_rows} row(s) without date or consumption from {}",
                        path.display()
                    );
                }
                FileOutcome::Parsed(ParsedFile {
                    path: path.to_path_buf(),
                    delimiter,
                    frame,
                    dropped_rows,
                    absent_fields,
                })
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {e}", path.display());
                FileOutcome::Skipped(SkippedFile {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Ingests every CSV directly under `dir`. Files are concatenated in
    /// discovery order and the result is stably sorted by date, so equal
    /// dates keep file order then row order. No files, or no parseable files,
    /// yields an empty canonical frame.
    ///
    /// # Errors
    ///
    /// Only fails if the dataframe engine cannot stack or sort frames that
    /// already share the canonical schema.
    pub fn ingest_dir(&self, dir: &Path) -> Result<Ingested> {
        let files = discover_csv_files(dir);
        tracing::info!("Found {} CSV file(s) in {}", files.len(), dir.display());

        let report = IngestReport {
            files: files.iter().map(|path| self.ingest_file(path)).collect(),
        };

        let mut combined = empty_canonical_frame()?;
        for parsed in report.parsed() {
            combined.vstack_mut(&parsed.frame)?;
        }
        let frame = combined.sort([DATE], SortMultipleOptions::default().with_maintain_order(true))?;

        let skipped = report.skipped().count();
        if skipped > 0 {
            tracing::warn!("{skipped} file(s) in {} could not be parsed", dir.display());
        }
        tracing::info!(
            "Ingested {} row(s) from {} file(s)",
            frame.height(),
            files.len() - skipped
        );

        Ok(Ingested { frame, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumption::schema::canonical_columns;
    use anyhow::Result;
    use std::cell::RefCell;

    /// Decoder that fails for every delimiter except the configured one.
    struct OnlyDelimiter {
        accepted: Delimiter,
        tried: RefCell<Vec<Delimiter>>,
    }

    impl CsvDecoder for OnlyDelimiter {
        fn decode(&self, _path: &Path, delimiter: Delimiter) -> crate::error::Result<DataFrame> {
            self.tried.borrow_mut().push(delimiter);
            if delimiter == self.accepted {
                Ok(df!("a" => &["1"], "b" => &["2"])?)
            } else {
                Err(crate::error::CabalError::DataProcessing("bad field count".to_owned()))
            }
        }
    }

    /// Decoder that always returns a single column, as happens when the
    /// delimiter does not occur in the header.
    struct SingleColumn;

    impl CsvDecoder for SingleColumn {
        fn decode(&self, _path: &Path, _delimiter: Delimiter) -> crate::error::Result<DataFrame> {
            Ok(df!("Data;Consum" => &["2023-01-01;5"])?)
        }
    }

    #[test]
    fn test_delimiters_tried_in_preference_order() {
        let decoder = OnlyDelimiter {
            accepted: Delimiter::Tab,
            tried: RefCell::new(Vec::new()),
        };
        let decoded = decode_with_fallback(&decoder, Path::new("x.csv"));
        assert!(
            matches!(decoded, Ok((Delimiter::Tab, _))),
            "tab should be accepted"
        );
        assert_eq!(
            *decoder.tried.borrow(),
            vec![Delimiter::Comma, Delimiter::Semicolon, Delimiter::Tab]
        );
    }

    #[test]
    fn test_single_column_decode_is_rejected() {
        let failure = decode_with_fallback(&SingleColumn, Path::new("x.csv"))
            .err()
            .map(|f| f.attempts.len());
        assert_eq!(failure, Some(3), "every delimiter should be recorded");
    }

    #[test]
    fn test_coerce_frame_drops_unusable_rows() -> Result<()> {
        let raw = df!(
            "DATA" => &["2023-01-02", "bogus", "2023-01-01", "2023-01-03"],
            "Consum_litres_per_dia" => &["10", "20", "n/a", "30.5"],
            "Districte" => &["1", "2", "3", "x"]
        )?;
        let mapping = AliasTable::canonical().reconcile(&["DATA", "Consum_litres_per_dia", "Districte"]);

        let (frame, dropped) = coerce_frame(&raw, &mapping)?;

        assert_eq!(dropped, 2);
        assert_eq!(frame.height(), 2);
        let names: Vec<String> = frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, canonical_columns());

        let districts: Vec<Option<f64>> = frame
            .column("Districte")?
            .as_materialized_series()
            .f64()?
            .into_iter()
            .collect();
        assert_eq!(districts, vec![Some(1.0), None]);

        let sections: Vec<Option<&str>> = frame
            .column("Seccio_censal")?
            .as_materialized_series()
            .str()?
            .into_iter()
            .collect();
        assert_eq!(sections, vec![Some(""), Some("")], "absent text is empty, never null");
        Ok(())
    }

    #[test]
    fn test_discover_ignores_non_csv_and_subdirectories() -> Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("b.csv"), "x")?;
        std::fs::write(dir.path().join("a.CSV"), "x")?;
        std::fs::write(dir.path().join("notes.txt"), "x")?;
        std::fs::create_dir(dir.path().join("nested.csv"))?;

        let found: Vec<String> = discover_csv_files(dir.path())
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(found, vec!["a.CSV".to_owned(), "b.csv".to_owned()]);
        Ok(())
    }

    #[test]
    fn test_missing_directory_yields_empty_canonical_frame() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let ingested = CsvIngestor::new().ingest_dir(&dir.path().join("absent"))?;
        assert_eq!(ingested.frame.height(), 0);
        assert_eq!(ingested.frame.width(), canonical_columns().len());
        assert!(ingested.report.files.is_empty());
        Ok(())
    }
}

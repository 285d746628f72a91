use super::schema::{
    CONSUMPTION, DATE, DISTRICT, DISTRICT_NAME, METERS, MUNICIPALITY, SECTION, USAGE, USAGE_RAW,
};
use crate::error::Result;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;

/// One harmonised consumption reading.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CanonicalRecord {
    pub census_section: String,
    pub district_id: Option<f64>,
    pub municipality: String,
    pub reading_date: NaiveDate,
    pub usage_type_raw: String,
    pub usage_type: String,
    pub meter_count: Option<f64>,
    pub consumption_liters_per_day: f64,
    pub district_name: Option<String>,
}

/// Column-wise buffers for the seven canonical fields.
#[derive(Debug, Default)]
pub(crate) struct ColumnBuffers {
    pub sections: Vec<String>,
    pub districts: Vec<Option<f64>>,
    pub municipalities: Vec<String>,
    pub dates: Vec<NaiveDate>,
    pub usages: Vec<String>,
    pub meters: Vec<Option<f64>>,
    pub consumption: Vec<f64>,
}

impl ColumnBuffers {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Frame with exactly the canonical columns, in canonical order.
    pub fn into_frame(self) -> Result<DataFrame> {
        let frame = DataFrame::new(vec![
            Column::from(Series::new(SECTION.into(), self.sections)),
            Column::from(Series::new(DISTRICT.into(), self.districts)),
            Column::from(Series::new(MUNICIPALITY.into(), self.municipalities)),
            Column::from(Series::new(DATE.into(), self.dates)),
            Column::from(Series::new(USAGE_RAW.into(), self.usages)),
            Column::from(Series::new(METERS.into(), self.meters)),
            Column::from(Series::new(CONSUMPTION.into(), self.consumption)),
        ])?;
        Ok(frame)
    }
}

/// Empty frame carrying the canonical schema.
pub fn empty_canonical_frame() -> Result<DataFrame> {
    ColumnBuffers::default().into_frame()
}

pub(crate) fn text_column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a StringChunked> {
    Ok(frame.column(name)?.as_materialized_series().str()?)
}

pub(crate) fn number_column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a Float64Chunked> {
    Ok(frame.column(name)?.as_materialized_series().f64()?)
}

pub(crate) fn date_column<'a>(frame: &'a DataFrame, name: &str) -> Result<&'a DateChunked> {
    Ok(frame.column(name)?.as_materialized_series().date()?)
}

/// The reconciled, enriched, date-sorted table for one root directory.
///
/// Cloning is cheap and clones never alias mutably: the underlying frame is
/// copy-on-write, so a caller mutating its copy leaves the cache untouched.
#[derive(Clone, Debug)]
pub struct UnifiedTable {
    frame: DataFrame,
}

impl UnifiedTable {
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn frame_mut(&mut self) -> &mut DataFrame {
        &mut self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// True once a district lookup has been joined onto the table.
    pub fn has_district_names(&self) -> bool {
        self.frame.column(DISTRICT_NAME).is_ok()
    }

    /// Earliest and latest reading date, `None` on an empty table.
    pub fn date_bounds(&self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        let mut bounds: Option<(NaiveDate, NaiveDate)> = None;
        for date in date_column(&self.frame, DATE)?.as_date_iter().flatten() {
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(date), hi.max(date)),
                None => (date, date),
            });
        }
        Ok(bounds)
    }

    /// Row view of the table, in table order.
    pub fn records(&self) -> Result<Vec<CanonicalRecord>> {
        let frame = &self.frame;
        let sections = text_column(frame, SECTION)?;
        let districts = number_column(frame, DISTRICT)?;
        let municipalities = text_column(frame, MUNICIPALITY)?;
        let dates: Vec<Option<NaiveDate>> = date_column(frame, DATE)?.as_date_iter().collect();
        let raw_usages = text_column(frame, USAGE_RAW)?;
        let usages = frame
            .column(USAGE)
            .ok()
            .map(|c| c.as_materialized_series().str())
            .transpose()?;
        let meters = number_column(frame, METERS)?;
        let consumption = number_column(frame, CONSUMPTION)?;
        let names = frame
            .column(DISTRICT_NAME)
            .ok()
            .map(|c| c.as_materialized_series().str())
            .transpose()?;

        let mut records = Vec::with_capacity(frame.height());
        for (idx, date) in dates.into_iter().enumerate() {
            let (Some(reading_date), Some(consumption_liters_per_day)) =
                (date, consumption.get(idx))
            else {
                continue;
            };
            let usage_type_raw = raw_usages.get(idx).unwrap_or_default().to_owned();
            let usage_type = usages
                .and_then(|ca| ca.get(idx))
                .map_or_else(|| usage_type_raw.clone(), str::to_owned);
            records.push(CanonicalRecord {
                census_section: sections.get(idx).unwrap_or_default().to_owned(),
                district_id: districts.get(idx),
                municipality: municipalities.get(idx).unwrap_or_default().to_owned(),
                reading_date,
                usage_type_raw,
                usage_type,
                meter_count: meters.get(idx),
                consumption_liters_per_day,
                district_name: names.and_then(|ca| ca.get(idx)).map(str::to_owned),
            });
        }
        Ok(records)
    }
}

/// Headline figures for a filtered table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_consumption: f64,
    pub distinct_days: usize,
    pub total_meters: f64,
    pub average_per_day: f64,
    pub mean_per_record: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub consumption: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UsagePoint {
    pub date: NaiveDate,
    pub usage_type: String,
    pub consumption: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SectionTotal {
    pub census_section: String,
    pub consumption: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DistrictTotal {
    pub district_id: f64,
    pub district_name: Option<String>,
    pub consumption: f64,
}

impl DistrictTotal {
    /// Axis label: the display name when known, otherwise the numeric id.
    pub fn label(&self) -> String {
        self.district_name
            .clone()
            .unwrap_or_else(|| format!("{}", self.district_id))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UsageTotal {
    pub usage_type: String,
    pub consumption: f64,
}

/// Distinct values available to each selector, plus the data's date extent.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub districts: Vec<f64>,
    pub municipalities: Vec<String>,
    pub usage_types: Vec<String>,
    pub census_sections: Vec<String>,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
}

//! Filtering and aggregation over a unified table.
//!
//! Every aggregate is a pure function of the table it is given, normally the
//! output of [`filter`], and returns zeros or empty collections when that
//! table has no rows.

use super::coerce::parse_date;
use super::schema::{
    CONSUMPTION, DATE, DISTRICT, DISTRICT_NAME, METERS, MUNICIPALITY, SECTION, USAGE, USAGE_RAW,
};
use super::types::{
    DailyPoint, DistrictTotal, FilterOptions, Metrics, SectionTotal, UnifiedTable, UsagePoint,
    UsageTotal, date_column, number_column, text_column,
};
use crate::error::Result;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A categorical filter. `Unset` places no restriction; so does a `Values`
/// holding nothing, which [`Selection::from_values`] never produces.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Selection<T> {
    #[default]
    Unset,
    Values(Vec<T>),
}

impl<T: PartialEq + Clone> Selection<T> {
    /// Collects `values`; an empty collection means "no filter".
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        let values: Vec<T> = values.into_iter().collect();
        if values.is_empty() {
            Self::Unset
        } else {
            Self::Values(values)
        }
    }

    pub fn is_restricting(&self) -> bool {
        matches!(self, Self::Values(values) if !values.is_empty())
    }

    /// The selection as it applies to a table offering `available`. Picking
    /// every offered value is the same as picking nothing, so rows whose value
    /// is missing or blank (never offered) survive it.
    pub fn relative_to(&self, available: &[T]) -> Self {
        match self {
            Self::Values(values)
                if !available.is_empty() && available.iter().all(|a| values.contains(a)) =>
            {
                Self::Unset
            }
            other => other.clone(),
        }
    }
}

/// `column` equal to any selected value. Missing values never match.
fn any_of<T: Literal + Clone>(column: &str, selection: &Selection<T>) -> Option<Expr> {
    match selection {
        Selection::Values(values) => values
            .iter()
            .cloned()
            .map(|value| col(column).eq(lit(value)))
            .reduce(|acc, expr| acc.or(expr)),
        Selection::Unset => None,
    }
}

/// Inclusive reading-date window. Open bounds resolve to the data's extent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn all() -> Self {
        Self::default()
    }

    /// Parses `YYYY-MM-DD`-style text. Blank or unparseable bounds stay open.
    pub fn from_text(start: &str, end: &str) -> Self {
        Self {
            start: parse_date(start),
            end: parse_date(end),
        }
    }

    /// Concrete window within `extent`. An inverted window falls back to the
    /// full extent rather than selecting nothing.
    pub fn resolve(&self, extent: (NaiveDate, NaiveDate)) -> (NaiveDate, NaiveDate) {
        let (lo, hi) = extent;
        let start = self.start.unwrap_or(lo);
        let end = self.end.unwrap_or(hi);
        if start > end { (lo, hi) } else { (start, end) }
    }
}

/// Everything a caller can restrict on. Restrictions combine with AND.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionFilter {
    pub dates: DateRange,
    pub districts: Selection<f64>,
    pub municipalities: Selection<String>,
    pub usage_types: Selection<String>,
    pub census_sections: Selection<String>,
}

/// Column holding the usage category matched by filters and groupings: the
/// derived leaf when present, the raw category otherwise.
fn usage_column(frame: &DataFrame) -> &'static str {
    if frame.column(USAGE).is_ok() {
        USAGE
    } else {
        USAGE_RAW
    }
}

/// Rows of `table` passing every restriction in `criteria`. A selection
/// naming every value [`filter_options`] offers leaves that dimension
/// unrestricted.
///
/// # Errors
///
/// Fails only if `table` is missing a canonical column.
pub fn filter(table: &UnifiedTable, criteria: &ConsumptionFilter) -> Result<UnifiedTable> {
    let Some(extent) = table.date_bounds()? else {
        return Ok(table.clone());
    };
    let (start, end) = criteria.dates.resolve(extent);

    let restricting = criteria.districts.is_restricting()
        || criteria.municipalities.is_restricting()
        || criteria.usage_types.is_restricting()
        || criteria.census_sections.is_restricting();
    let options = if restricting {
        filter_options(table)?
    } else {
        FilterOptions::default()
    };

    let frame = table.frame();
    let predicate = [
        any_of(DISTRICT, &criteria.districts.relative_to(&options.districts)),
        any_of(
            MUNICIPALITY,
            &criteria.municipalities.relative_to(&options.municipalities),
        ),
        any_of(
            usage_column(frame),
            &criteria.usage_types.relative_to(&options.usage_types),
        ),
        any_of(
            SECTION,
            &criteria.census_sections.relative_to(&options.census_sections),
        ),
    ]
    .into_iter()
    .flatten()
    .fold(
        col(DATE).gt_eq(lit(start)).and(col(DATE).lt_eq(lit(end))),
        |acc, expr| acc.and(expr),
    );

    let out = frame.clone().lazy().filter(predicate).collect()?;
    Ok(UnifiedTable::new(out))
}

/// # Errors
///
/// Fails if the consumption column is missing.
pub fn total_consumption(table: &UnifiedTable) -> Result<f64> {
    Ok(number_column(table.frame(), CONSUMPTION)?
        .sum()
        .unwrap_or(0.0))
}

/// # Errors
///
/// Fails if the date column is missing.
pub fn distinct_days(table: &UnifiedTable) -> Result<usize> {
    Ok(table
        .frame()
        .column(DATE)?
        .as_materialized_series()
        .n_unique()?)
}

/// Meter total; missing counts contribute zero.
///
/// # Errors
///
/// Fails if the meter column is missing.
pub fn total_meters(table: &UnifiedTable) -> Result<f64> {
    Ok(number_column(table.frame(), METERS)?.sum().unwrap_or(0.0))
}

/// Total consumption over distinct days, zero when there are no days.
///
/// # Errors
///
/// See [`total_consumption`] and [`distinct_days`].
pub fn average_per_day(table: &UnifiedTable) -> Result<f64> {
    let days = distinct_days(table)?;
    if days == 0 {
        return Ok(0.0);
    }
    Ok(total_consumption(table)? / days as f64)
}

/// Mean consumption per reading, zero on an empty table.
///
/// # Errors
///
/// Fails if the consumption column is missing.
pub fn mean_per_record(table: &UnifiedTable) -> Result<f64> {
    Ok(number_column(table.frame(), CONSUMPTION)?
        .mean()
        .unwrap_or(0.0))
}

/// # Errors
///
/// Fails if a canonical column is missing.
pub fn metrics(table: &UnifiedTable) -> Result<Metrics> {
    Ok(Metrics {
        total_consumption: total_consumption(table)?,
        distinct_days: distinct_days(table)?,
        total_meters: total_meters(table)?,
        average_per_day: average_per_day(table)?,
        mean_per_record: mean_per_record(table)?,
    })
}

/// Consumption per reading date, date ascending.
///
/// # Errors
///
/// Fails if the grouping cannot be evaluated.
pub fn daily_series(table: &UnifiedTable) -> Result<Vec<DailyPoint>> {
    let out = table
        .frame()
        .clone()
        .lazy()
        .group_by_stable([col(DATE)])
        .agg([col(CONSUMPTION).sum()])
        .sort([DATE], SortMultipleOptions::default())
        .collect()?;

    let consumption = number_column(&out, CONSUMPTION)?;
    Ok(date_column(&out, DATE)?
        .as_date_iter()
        .zip(consumption)
        .filter_map(|(date, litres)| {
            Some(DailyPoint {
                date: date?,
                consumption: litres.unwrap_or(0.0),
            })
        })
        .collect())
}

/// Consumption per (date, usage type), ordered by date then usage type, for
/// stacked rendering.
///
/// # Errors
///
/// Fails if the grouping cannot be evaluated.
pub fn daily_series_by_usage(table: &UnifiedTable) -> Result<Vec<UsagePoint>> {
    let usage = usage_column(table.frame());
    let out = table
        .frame()
        .clone()
        .lazy()
        .group_by_stable([col(DATE), col(usage)])
        .agg([col(CONSUMPTION).sum()])
        .sort([DATE, usage], SortMultipleOptions::default())
        .collect()?;

    let usages = text_column(&out, usage)?;
    let consumption = number_column(&out, CONSUMPTION)?;
    Ok(date_column(&out, DATE)?
        .as_date_iter()
        .zip(usages)
        .zip(consumption)
        .filter_map(|((date, usage_type), litres)| {
            Some(UsagePoint {
                date: date?,
                usage_type: usage_type.unwrap_or_default().to_owned(),
                consumption: litres.unwrap_or(0.0),
            })
        })
        .collect())
}

/// The `n` census sections with the highest summed consumption. Equal sums
/// keep the order in which sections first appear in the table.
///
/// # Errors
///
/// Fails if the grouping cannot be evaluated.
pub fn top_sections(table: &UnifiedTable, n: usize) -> Result<Vec<SectionTotal>> {
    let out = table
        .frame()
        .clone()
        .lazy()
        .group_by_stable([col(SECTION)])
        .agg([col(CONSUMPTION).sum()])
        .sort(
            [CONSUMPTION],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .collect()?
        .head(Some(n));

    let sections = text_column(&out, SECTION)?;
    let consumption = number_column(&out, CONSUMPTION)?;
    Ok(sections
        .into_iter()
        .zip(consumption)
        .map(|(section, litres)| SectionTotal {
            census_section: section.unwrap_or_default().to_owned(),
            consumption: litres.unwrap_or(0.0),
        })
        .collect())
}

/// Consumption per district, ascending by sum. Rows without a district id
/// are left out.
///
/// # Errors
///
/// Fails if the grouping cannot be evaluated.
pub fn by_district(table: &UnifiedTable) -> Result<Vec<DistrictTotal>> {
    let mut aggs = vec![col(CONSUMPTION).sum()];
    if table.has_district_names() {
        aggs.push(col(DISTRICT_NAME).first());
    }

    let out = table
        .frame()
        .clone()
        .lazy()
        .filter(col(DISTRICT).is_not_null())
        .group_by_stable([col(DISTRICT)])
        .agg(aggs)
        .sort(
            [CONSUMPTION],
            SortMultipleOptions::default().with_maintain_order(true),
        )
        .collect()?;

    let districts = number_column(&out, DISTRICT)?;
    let consumption = number_column(&out, CONSUMPTION)?;
    let names = if table.has_district_names() {
        Some(text_column(&out, DISTRICT_NAME)?)
    } else {
        None
    };

    Ok(districts
        .into_iter()
        .zip(consumption)
        .enumerate()
        .filter_map(|(idx, (district, litres))| {
            Some(DistrictTotal {
                district_id: district?,
                district_name: names.and_then(|ca| ca.get(idx)).map(str::to_owned),
                consumption: litres.unwrap_or(0.0),
            })
        })
        .collect())
}

/// Consumption per usage type, descending by sum.
///
/// # Errors
///
/// Fails if the grouping cannot be evaluated.
pub fn by_usage(table: &UnifiedTable) -> Result<Vec<UsageTotal>> {
    let usage = usage_column(table.frame());
    let out = table
        .frame()
        .clone()
        .lazy()
        .group_by_stable([col(usage)])
        .agg([col(CONSUMPTION).sum()])
        .sort(
            [CONSUMPTION],
            SortMultipleOptions::default()
                .with_order_descending(true)
                .with_maintain_order(true),
        )
        .collect()?;

    let usages = text_column(&out, usage)?;
    let consumption = number_column(&out, CONSUMPTION)?;
    Ok(usages
        .into_iter()
        .zip(consumption)
        .map(|(usage_type, litres)| UsageTotal {
            usage_type: usage_type.unwrap_or_default().to_owned(),
            consumption: litres.unwrap_or(0.0),
        })
        .collect())
}

fn distinct_text(ca: &StringChunked) -> Vec<String> {
    ca.into_iter()
        .flatten()
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Sorted distinct values for each selector and the table's date extent.
///
/// # Errors
///
/// Fails if a canonical column is missing.
pub fn filter_options(table: &UnifiedTable) -> Result<FilterOptions> {
    let frame = table.frame();

    let mut districts: Vec<f64> = number_column(frame, DISTRICT)?
        .into_iter()
        .flatten()
        .collect();
    districts.sort_by(f64::total_cmp);
    districts.dedup();

    let bounds = table.date_bounds()?;
    Ok(FilterOptions {
        districts,
        municipalities: distinct_text(text_column(frame, MUNICIPALITY)?),
        usage_types: distinct_text(text_column(frame, usage_column(frame))?),
        census_sections: distinct_text(text_column(frame, SECTION)?),
        min_date: bounds.map(|(lo, _)| lo),
        max_date: bounds.map(|(_, hi)| hi),
    })
}

use anyhow::{Context as _, Result};
use cabal::config::AppConfig;
use cabal::consumption::ingest::SkippedFile;
use cabal::consumption::{
    ConsumptionFilter, DateRange, LookupOutcome, Metrics, Selection, UnifiedDataCache,
    UnifiedTable, export, query,
};
use cabal::utils::format_thousands;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "cabal", about = "Water consumption explorer")]
pub struct Cli {
    #[command(flatten)]
    pub query: QueryArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Data location and filter arguments shared by every command.
#[derive(Args, Clone, Debug)]
pub struct QueryArgs {
    /// Root directory holding the extracts subdirectory and the district lookup
    #[arg(long, global = true, env = "CABAL_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// First reading date to include (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub from: Option<String>,

    /// Last reading date to include (YYYY-MM-DD)
    #[arg(long, global = true)]
    pub to: Option<String>,

    /// District id; repeat to select several
    #[arg(long = "district", global = true)]
    pub districts: Vec<f64>,

    /// Municipality; repeat to select several
    #[arg(long = "municipality", global = true)]
    pub municipalities: Vec<String>,

    /// Usage type (leaf category); repeat to select several
    #[arg(long = "usage", global = true)]
    pub usage_types: Vec<String>,

    /// Census section; repeat to select several
    #[arg(long = "section", global = true)]
    pub census_sections: Vec<String>,

    /// Path to a JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

impl QueryArgs {
    pub fn filter(&self) -> ConsumptionFilter {
        ConsumptionFilter {
            dates: DateRange::from_text(
                self.from.as_deref().unwrap_or_default(),
                self.to.as_deref().unwrap_or_default(),
            ),
            districts: Selection::from_values(self.districts.iter().copied()),
            municipalities: Selection::from_values(self.municipalities.iter().cloned()),
            usage_types: Selection::from_values(self.usage_types.iter().cloned()),
            census_sections: Selection::from_values(self.census_sections.iter().cloned()),
        }
    }

    fn load_config(&self) -> Result<AppConfig> {
        let config = match &self.config {
            Some(path) => AppConfig::load_from(path)?,
            None => AppConfig::load()?,
        };
        Ok(config)
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Headline metrics for the filtered readings (default)
    Summary,
    /// Values available to each filter
    Options,
    /// Consumption per day
    Series {
        /// Split each day by usage type
        #[arg(long)]
        by_usage: bool,
    },
    /// Census sections ranked by consumption
    TopSections {
        /// How many sections to keep. Defaults to the configured value.
        #[arg(short, long)]
        n: Option<usize>,
    },
    /// Consumption per district, smallest first
    Districts,
    /// Consumption per usage type, largest first
    Usage,
    /// First filtered readings, as records
    Preview {
        /// How many readings to show. Defaults to the configured value.
        #[arg(short, long)]
        rows: Option<usize>,
    },
    /// Write the filtered readings as CSV
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct Summary<'a> {
    rows: usize,
    #[serde(flatten)]
    metrics: Metrics,
    total_consumption_label: String,
    district_names: bool,
    skipped_files: Vec<&'a SkippedFile>,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialise output")?;
    println!("{json}");
    Ok(())
}

fn report_warnings(cache: &UnifiedDataCache) {
    if let Some(report) = cache.last_report() {
        for skipped in report.skipped() {
            tracing::warn!("Skipped {}: {}", skipped.path.display(), skipped.reason);
        }
        if report.dropped_rows() > 0 {
            tracing::warn!(
                "Dropped {} row(s) without a usable date or consumption",
                report.dropped_rows()
            );
        }
    }
    if let Some(LookupOutcome::Unavailable { reason }) = cache.lookup_outcome() {
        tracing::warn!("District names unavailable: {reason}");
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let args = cli.query;
    let config = args.load_config()?;
    let top_n = config.top_sections;
    let preview_rows = config.preview_rows;

    let mut cache = UnifiedDataCache::new(config);
    let table = cache
        .get_or_build(&args.root)
        .with_context(|| format!("Failed to load {}", args.root.display()))?;
    report_warnings(&cache);

    let filtered = query::filter(&table, &args.filter())?;
    if filtered.is_empty() {
        tracing::warn!("No readings match the current filters");
    }

    match cli.command.unwrap_or(Commands::Summary) {
        Commands::Summary => handle_summary(&cache, &filtered),
        Commands::Options => print_json(&query::filter_options(&table)?),
        Commands::Series { by_usage } => {
            if by_usage {
                print_json(&query::daily_series_by_usage(&filtered)?)
            } else {
                print_json(&query::daily_series(&filtered)?)
            }
        }
        Commands::TopSections { n } => {
            print_json(&query::top_sections(&filtered, n.unwrap_or(top_n))?)
        }
        Commands::Districts => print_json(&query::by_district(&filtered)?),
        Commands::Usage => print_json(&query::by_usage(&filtered)?),
        Commands::Preview { rows } => {
            let n = rows.unwrap_or(preview_rows);
            let head = UnifiedTable::new(filtered.frame().head(Some(n)));
            print_json(&head.records()?)
        }
        Commands::Export { output } => handle_export(&filtered, &output),
    }
}

fn handle_summary(cache: &UnifiedDataCache, filtered: &UnifiedTable) -> Result<()> {
    let metrics = query::metrics(filtered)?;
    let summary = Summary {
        rows: filtered.height(),
        metrics,
        total_consumption_label: format_thousands(metrics.total_consumption),
        district_names: filtered.has_district_names(),
        skipped_files: cache
            .last_report()
            .map(|report| report.skipped().collect())
            .unwrap_or_default(),
    };
    print_json(&summary)
}

fn handle_export(filtered: &UnifiedTable, output: &Path) -> Result<()> {
    let written = export::write_csv(filtered, output)?;
    if written == 0 {
        println!("Nothing to export: no readings match the current filters");
    } else {
        println!(
            "Exported {} reading(s) ({written} bytes) to {}",
            filtered.height(),
            output.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_args_build_filter() {
        let cli = Cli::parse_from([
            "cabal",
            "top-sections",
            "-n",
            "5",
            "--from",
            "2023-01-02",
            "--district",
            "1",
            "--district",
            "2",
            "--usage",
            "Residencial",
        ]);

        assert!(matches!(cli.command, Some(Commands::TopSections { n: Some(5) })));
        let criteria = cli.query.filter();
        assert_eq!(
            criteria.dates.start,
            chrono::NaiveDate::from_ymd_opt(2023, 1, 2)
        );
        assert_eq!(criteria.dates.end, None);
        assert_eq!(criteria.districts, Selection::Values(vec![1.0, 2.0]));
        assert_eq!(criteria.usage_types, Selection::Values(vec!["Residencial".to_owned()]));
        assert_eq!(criteria.municipalities, Selection::Unset);
    }

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::parse_from(["cabal", "--root", "/srv/aigua"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.query.root, PathBuf::from("/srv/aigua"));
    }
}

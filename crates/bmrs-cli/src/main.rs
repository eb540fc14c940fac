use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bmrs_core::calendar::utc_day_bounds;
use bmrs_core::record::{PricePoint, SettlementRecord};
use bmrs_core::settlement_period::{periods_in_day, settlement_period};
use bmrs_core::store::{PriceHistoryCache, date_span};
use bmrs_core::summary::{DailySummary, imbalance_cost};
use bmrs_providers::assembler::{DEFAULT_MAX_RANGE_DAYS, SettlementAssembler};
use bmrs_providers::elexon::{ElexonConfig, ElexonProvider};
use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "bmrs",
    about = "Fetch and summarise balancing-market system prices"
)]
struct Cli {
    /// Root directory for the price history snapshot (default: current directory)
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// System prices endpoint; the date is appended as a path segment
    /// (default: $BMRS_BASE_URL, then the public Elexon endpoint)
    #[arg(long)]
    base_url: Option<String>,

    /// Per-request timeout in seconds (default: $BMRS_TIMEOUT_SECS, then 10)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Maximum number of dates a single range may span
    #[arg(long, default_value_t = DEFAULT_MAX_RANGE_DAYS)]
    max_range_days: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show settlement prices and imbalance costs for one date
    Day {
        /// Settlement date (YYYY-MM-DD)
        date: NaiveDate,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show settlement prices for an inclusive date range
    Range {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the cached system sell price history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Check one date for gaps, ordering problems and missing periods
    Validate {
        /// Settlement date (YYYY-MM-DD)
        date: NaiveDate,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// Re-fetch the history window and overwrite the snapshot
    Refresh {
        /// Number of days in the window
        #[arg(long, default_value_t = 100)]
        days: u32,

        /// Last date of the window (YYYY-MM-DD, defaults to yesterday)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Report what the snapshot holds
    Show,
}

/// Number of half-hours in one UTC calendar day.
const UTC_DAY_PERIODS: usize = 48;

/// Command-line flags take precedence over the environment.
fn provider_config(
    base_url: Option<&str>,
    timeout_secs: Option<u64>,
    env: ElexonConfig,
) -> ElexonConfig {
    ElexonConfig {
        base_url: base_url.map_or(env.base_url, str::to_string),
        timeout: timeout_secs.map_or(env.timeout, Duration::from_secs),
    }
}

/// First and last date of a history window of `days` dates ending on `end`.
fn history_window(days: u32, end: NaiveDate, max_range_days: u32) -> Result<(NaiveDate, NaiveDate)> {
    if days == 0 {
        anyhow::bail!("history window must cover at least one day");
    }
    if days > max_range_days {
        anyhow::bail!(
            "history window of {days} day(s) exceeds the range limit of {max_range_days}; \
             raise --max-range-days or lower --days"
        );
    }

    let start = end
        .checked_sub_days(Days::new(u64::from(days - 1)))
        .context("history window starts before the earliest representable date")?;
    Ok((start, end))
}

fn print_summary(summary: &DailySummary) {
    println!("Periods: {}", summary.periods);
    println!("Total imbalance cost: {:.2}", summary.total_cost);
    println!("Total absolute imbalance volume: {:.2}", summary.total_abs_volume);
    match summary.unit_rate {
        Some(rate) => println!("Unit rate: {rate:.2}"),
        None => println!("Unit rate: n/a"),
    }
    if let (Some(sell), Some(buy)) = (summary.mean_sell_price, summary.mean_buy_price) {
        println!("Mean system sell price: {sell:.2}");
        println!("Mean system buy price: {buy:.2}");
    }
    if let Some(hour) = summary.peak_hour {
        println!("Hour with the highest imbalance volume: {hour:02}:00");
    }
}

fn print_records(records: &[SettlementRecord]) {
    println!(
        "{:<20} {:>10} {:>4} {:>10} {:>10} {:>12} {:>12}",
        "startTime", "sett.date", "SP", "sell", "buy", "niv", "cost"
    );
    for r in records {
        let (settlement_date, period) = settlement_period(&r.start_time);
        println!(
            "{:<20} {:>10} {:>4} {:>10.2} {:>10.2} {:>12.3} {:>12.2}",
            r.start_time.format("%Y-%m-%d %H:%M"),
            settlement_date,
            period,
            r.system_sell_price,
            r.system_buy_price,
            r.net_imbalance_volume,
            imbalance_cost(r),
        );
    }
}

fn report(records: &[SettlementRecord], json: bool) -> Result<()> {
    if json {
        let out = serde_json::to_string_pretty(records).context("failed to serialise records")?;
        println!("{out}");
    } else {
        print_summary(&DailySummary::from_records(records));
        println!();
        print_records(records);
    }
    Ok(())
}

/// Problems found in an assembled single-day series.
fn day_issues(date: NaiveDate, records: &[SettlementRecord]) -> Vec<String> {
    let mut issues = Vec::new();

    if records.len() != UTC_DAY_PERIODS {
        issues.push(format!(
            "{date}: expected {UTC_DAY_PERIODS} period(s), found {}",
            records.len()
        ));
    }

    let (day_start, day_end) = utc_day_bounds(date);
    if let Some(stray) = records
        .iter()
        .find(|r| r.start_time < day_start || r.start_time >= day_end)
    {
        issues.push(format!("{date}: record at {} is outside the date", stray.start_time));
    }

    for (i, pair) in records.windows(2).enumerate() {
        let gap = (pair[1].start_time - pair[0].start_time).num_minutes();
        if gap <= 0 {
            issues.push(format!(
                "{date}: timestamps not strictly ascending at index {}",
                i + 1
            ));
        } else if gap != 30 {
            issues.push(format!(
                "{date}: {gap} minute gap after {}",
                pair[0].start_time
            ));
        }
    }

    issues
}

async fn cmd_day(
    assembler: &SettlementAssembler<ElexonProvider>,
    date: NaiveDate,
    json: bool,
) -> Result<()> {
    let records = assembler.assemble_day(date).await;
    if records.is_empty() {
        anyhow::bail!("no data found for {date}");
    }
    report(&records, json)
}

async fn cmd_range(
    assembler: &SettlementAssembler<ElexonProvider>,
    start: NaiveDate,
    end: NaiveDate,
    json: bool,
) -> Result<()> {
    let records = assembler.assemble_range(start, end).await;
    if records.is_empty() {
        anyhow::bail!("no data found between {start} and {end}");
    }
    report(&records, json)
}

async fn cmd_history_refresh(
    assembler: &SettlementAssembler<ElexonProvider>,
    cache: &PriceHistoryCache,
    days: u32,
    end: NaiveDate,
) -> Result<()> {
    let (start, end) = history_window(days, end, assembler.max_range_days())?;

    info!(%start, %end, days, "refreshing price history");
    let records = assembler.assemble_range(start, end).await;
    if records.is_empty() {
        anyhow::bail!("no data found between {start} and {end}; snapshot left unchanged");
    }

    let points: Vec<PricePoint> = records.iter().map(PricePoint::from).collect();
    cache
        .write(&points)
        .with_context(|| format!("failed to write {}", cache.path().display()))?;

    println!(
        "Wrote {} price(s) from {start} to {end} to {}",
        points.len(),
        cache.path().display()
    );
    Ok(())
}

fn cmd_history_show(cache: &PriceHistoryCache) -> Result<()> {
    if !cache.exists() {
        println!("No price history snapshot at {}.", cache.path().display());
        return Ok(());
    }

    let points = cache
        .read()
        .with_context(|| format!("failed to read {}", cache.path().display()))?;

    match date_span(&points) {
        Some((first, last)) => {
            let mean =
                points.iter().map(|p| p.system_sell_price).sum::<f64>() / points.len() as f64;
            println!("{} price(s), {first} to {last}", points.len());
            println!("Mean system sell price: {mean:.2}");
        }
        None => println!("Snapshot is empty."),
    }

    Ok(())
}

async fn cmd_validate(
    assembler: &SettlementAssembler<ElexonProvider>,
    date: NaiveDate,
) -> Result<()> {
    let records = assembler.assemble_day(date).await;
    let issues = day_issues(date, &records);

    println!(
        "{date}: London settlement day has {} period(s)",
        periods_in_day(date)
    );

    if issues.is_empty() {
        println!("{date}: {} period(s), all valid.", records.len());
        return Ok(());
    }

    for issue in &issues {
        println!("WARN: {issue}");
    }
    anyhow::bail!("{} issue(s) found", issues.len())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    let env_config = ElexonConfig::from_env().context("invalid provider environment")?;
    let config = provider_config(cli.base_url.as_deref(), cli.timeout_secs, env_config);
    let provider =
        ElexonProvider::from_config(&config).context("failed to create Elexon provider")?;
    let assembler = SettlementAssembler::new(provider).with_max_range_days(cli.max_range_days);
    let cache = PriceHistoryCache::new(&cli.data_dir);

    match &cli.command {
        Commands::Day { date, json } => {
            cmd_day(&assembler, *date, *json).await?;
        }
        Commands::Range { start, end, json } => {
            cmd_range(&assembler, *start, *end, *json).await?;
        }
        Commands::History { action } => match action {
            HistoryAction::Refresh { days, end } => {
                let end_date = end
                    .unwrap_or_else(|| (chrono::Utc::now() - chrono::Duration::days(1)).date_naive());
                cmd_history_refresh(&assembler, &cache, *days, end_date).await?;
            }
            HistoryAction::Show => {
                cmd_history_show(&cache)?;
            }
        },
        Commands::Validate { date } => {
            cmd_validate(&assembler, *date).await?;
        }
    }

    Ok(())
}

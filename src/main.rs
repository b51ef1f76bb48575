//! CLI entry point for the ESG report tool.
//!
//! Searches the station network, aggregates the selected period and either
//! exports a report or follows live updates.

use anyhow::{Result, anyhow, bail};
use chrono::{FixedOffset, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use esg_report::calendar::DayKey;
use esg_report::config::Config;
use esg_report::dashboard::{Clock, Dashboard, SearchOutcome};
use esg_report::fetch::auth::{ApiKey, UrlParam};
use esg_report::fetch::{BasicClient, HttpClient};
use esg_report::infra::firestore::FirestoreClient;
use esg_report::infra::memory::MemoryStore;
use esg_report::metrics::series::{DAILY_DISPLAY_LIMIT, recent_days};
use esg_report::metrics::utility::fixed;
use esg_report::metrics::{PeriodSelection, QuickPeriod, RawCustomRange};
use esg_report::output::{default_report_name, print_json, print_pretty, report_rows, write_report};
use esg_report::services::StationStore;
use esg_report::station::{DailyRecord, StationSummary, UsagePattern};
use esg_report::users::UserRecord;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "esg_report")]
#[command(about = "ESG metrics for recycling stations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate the matching stations and print or export the result
    Report {
        /// Company, place or address to search for
        #[arg(value_name = "TERM")]
        term: String,

        #[command(flatten)]
        period: PeriodArgs,

        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        display: DisplayArgs,

        /// Write the CSV report to this file or directory
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,

        /// Gzip compress the CSV report
        #[arg(long, default_value_t = false, requires = "csv")]
        gzip: bool,

        /// Log the full snapshot as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Aggregate the matching stations and keep following live updates
    Watch {
        /// Company, place or address to search for
        #[arg(value_name = "TERM")]
        term: String,

        #[command(flatten)]
        period: PeriodArgs,

        #[command(flatten)]
        store: StoreArgs,

        #[command(flatten)]
        display: DisplayArgs,
    },
}

#[derive(Args)]
struct PeriodArgs {
    /// Reporting period: month, year, all or custom
    #[arg(short, long, default_value = "month")]
    period: PeriodSelection,

    /// First month of a custom range (YYYY-MM)
    #[arg(
        long,
        value_name = "YYYY-MM",
        requires = "to",
        required_if_eq("period", "custom"),
        conflicts_with = "quick"
    )]
    from: Option<String>,

    /// Last month of a custom range (YYYY-MM)
    #[arg(
        long,
        value_name = "YYYY-MM",
        requires = "from",
        required_if_eq("period", "custom"),
        conflicts_with = "quick"
    )]
    to: Option<String>,

    /// Preset range relative to today
    #[arg(short, long, value_enum)]
    quick: Option<QuickPeriod>,
}

#[derive(Args)]
struct StoreArgs {
    /// JSON config file; the environment is used when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Use built-in sample stations instead of Firestore
    #[arg(long, default_value_t = false, conflicts_with = "config")]
    demo: bool,
}

#[derive(Args)]
struct DisplayArgs {
    /// Hours east of UTC used for the usage-pattern peaks
    #[arg(
        long,
        value_name = "HOURS",
        default_value_t = 0,
        allow_negative_numbers = true,
        value_parser = clap::value_parser!(i32).range(-12..=14)
    )]
    utc_offset: i32,
}

impl DisplayArgs {
    fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset * 3600)
            .ok_or_else(|| anyhow!("invalid UTC offset {}h", self.utc_offset))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/esg_report.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("esg_report.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Report {
            term,
            period,
            store,
            display,
            csv,
            gzip,
            json,
        } => {
            let offset = display.offset()?;
            let mut dashboard = Dashboard::new(open_store(&store)?, Clock::System);
            if !load(&mut dashboard, &term, &period).await? {
                return Ok(());
            }
            log_summary(&dashboard, offset);

            if json {
                print_json(dashboard.current())?;
            }
            if let Some(path) = csv {
                let path = report_path(path, dashboard.clock().today(), gzip);
                let rows = report_rows(dashboard.state(), dashboard.current());
                write_report(&path, &rows, gzip)?;
            }
        }
        Commands::Watch {
            term,
            period,
            store,
            display,
        } => {
            let offset = display.offset()?;
            let mut dashboard = Dashboard::new(open_store(&store)?, Clock::System);
            if !load(&mut dashboard, &term, &period).await? {
                return Ok(());
            }
            log_summary(&dashboard, offset);
            watch(&mut dashboard, offset).await;
        }
    }

    Ok(())
}

/// Builds the document store selected by `args`.
fn open_store(args: &StoreArgs) -> Result<Arc<dyn StationStore>> {
    if args.demo {
        info!("Using built-in demo stations");
        return Ok(Arc::new(demo_store(Utc::now().date_naive())));
    }

    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    let http = BasicClient::with_timeouts(Duration::from_secs(30), Duration::from_secs(10))?;
    let http: Box<dyn HttpClient> = match (&config.access_token, &config.api_key) {
        (Some(token), _) => Box::new(ApiKey::bearer(http, token)?),
        (None, Some(key)) => Box::new(UrlParam::firestore_key(http, key.as_str())),
        (None, None) => {
            warn!("No Firestore credentials configured, requests are unauthenticated");
            Box::new(http)
        }
    };

    info!(
        project_id = %config.project_id,
        database = %config.database,
        poll_interval_secs = config.poll_interval().as_secs(),
        "Using Firestore"
    );
    Ok(Arc::new(FirestoreClient::new(
        http,
        &config.project_id,
        &config.database,
        config.poll_interval(),
    )))
}

/// Runs the search and selects the period. Returns `false` when there is
/// nothing to report.
#[tracing::instrument(skip(dashboard, period))]
async fn load(dashboard: &mut Dashboard, term: &str, period: &PeriodArgs) -> Result<bool> {
    match dashboard.search(term).await {
        SearchOutcome::EmptyQuery => bail!("search term is empty"),
        SearchOutcome::Unavailable(reason) => bail!("station query failed: {reason}"),
        SearchOutcome::NoResults => {
            warn!(term, "No stations found");
            return Ok(false);
        }
        SearchOutcome::Loaded { stations } => debug!(stations, "Stations loaded"),
    }

    match (&period.quick, &period.from, &period.to) {
        (Some(quick), _, _) => {
            info!(period = %quick.describe(dashboard.clock().today()), "Quick period");
            dashboard.set_quick_period(*quick);
        }
        (None, Some(from), Some(to)) => dashboard.set_custom_range(&RawCustomRange::Keys {
            from_month: from.clone(),
            to_month: to.clone(),
        }),
        _ => dashboard.set_period(period.period),
    }
    Ok(true)
}

/// Logs the headline figures of the current snapshot, the most recent daily
/// points and each station's peak usage at `offset`.
fn log_summary(dashboard: &Dashboard, offset: FixedOffset) {
    let current = dashboard.current();
    let impact = current.impact.display();
    let value = dashboard.business_value();

    info!(
        period = %current.period,
        stations = current.stations_count,
        total_bottles = current.total_bottles,
        co2_kg = %impact.co2_saved,
        water_l = %impact.water_saved,
        energy_kwh = %impact.energy_saved,
        plastic_kg = %impact.plastic_diverted,
        avg_efficiency = %fixed(current.avg_efficiency, 1),
        esg_score = value.esg_score,
        users = value.community_impact.value(),
        users_estimated = value.community_impact.is_estimated(),
        "ESG summary"
    );

    for point in recent_days(&current.daily_series, DAILY_DISPLAY_LIMIT) {
        debug!(
            day = %point.day_key,
            label = %point.label,
            bottles = point.bottles,
            co2_kg = %point.impact.display().co2_saved,
            "Daily collection"
        );
    }

    for station in dashboard.stations() {
        let usage = UsagePattern::from_timestamps(station.daily_timestamps(), offset);
        if let Some(peak) = usage.peak_hour_label() {
            debug!(
                station_id = %station.station_id,
                utc_offset = %offset,
                peak_hour = %peak,
                peak_day = usage.peak_day_label().unwrap_or("-"),
                "Usage pattern"
            );
        }
    }
    print_pretty(current);
}

/// Applies live changes until Ctrl+C.
async fn watch(dashboard: &mut Dashboard, offset: FixedOffset) {
    info!(
        subscriptions = dashboard.active_subscriptions(),
        "Watching for live updates. Press Ctrl+C to stop."
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Stopping live updates");
                break;
            }
            applied = dashboard.next_change() => {
                debug!(applied, "Live changes applied");
                log_summary(dashboard, offset);
            }
        }
    }
}

/// A directory gets the default file name; `.gz` is appended when gzipping.
fn report_path(path: PathBuf, today: NaiveDate, gzip: bool) -> PathBuf {
    let mut path = if path.is_dir() {
        path.join(default_report_name(today))
    } else {
        path
    };
    if gzip && path.extension() != Some(OsStr::new("gz")) {
        let mut name = path.as_os_str().to_owned();
        name.push(".gz");
        path = PathBuf::from(name);
    }
    path
}

/// Two sample stations with a year of history ending today.
fn demo_store(today: NaiveDate) -> MemoryStore {
    let store = MemoryStore::new();
    let stations = [
        ("1001", "Storgata", "Storgata 12, Oslo", 59.913, 10.752, 400, 236, 180),
        ("1002", "Aker Brygge", "Stranden 1, Oslo", 59.910, 10.728, 300, 94, 120),
    ];

    for (id, place, address, lat, lon, capacity, current_cap, base) in stations {
        store.insert_station(StationSummary {
            station_id: id.to_string(),
            place_name: place.to_string(),
            company_name: "Cycl".to_string(),
            address: address.to_string(),
            latitude: lat,
            longitude: lon,
            capacity,
            current_cap,
        });

        let this_month = DayKey::new(today).month();
        store.set_monthly(
            id,
            (0..12u64)
                .map(|back| (this_month.add_months(-(back as i32)), base + back * 7 % 40))
                .collect(),
        );
        store.set_daily(
            id,
            (0..14i64)
                .map(|back| {
                    let day = DayKey::new(today).add_days(-back);
                    let updated_at = day
                        .date()
                        .and_hms_opt(8 + (back % 10) as u32, 30, 0)
                        .map(|t| t.and_utc());
                    let count = base / 30 + (back as u64 % 5);
                    (day, DailyRecord { count, updated_at })
                })
                .collect(),
        );
    }

    for (i, days_ago) in [1i64, 3, 12, 45, 90].into_iter().enumerate() {
        store.add_user(UserRecord {
            recycle_count: i as u64 + 1,
            last_recycle: Some(Utc::now() - chrono::Duration::days(days_ago)),
        });
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("esg_report").chain(args.iter().copied()))
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_custom_period_requires_range() {
        assert!(parse(&["report", "cycl", "--period", "custom"]).is_err());
        assert!(parse(&["report", "cycl", "--period", "custom", "--from", "2024-01"]).is_err());
        assert!(parse(&["watch", "cycl", "--period", "custom"]).is_err());

        let cli = parse(&[
            "report", "cycl", "--period", "custom", "--from", "2024-01", "--to", "2024-02",
        ])
        .unwrap();
        let Commands::Report { period, .. } = cli.command else {
            panic!("expected report");
        };
        assert_eq!(period.from.as_deref(), Some("2024-01"));
        assert_eq!(period.to.as_deref(), Some("2024-02"));
    }

    #[test]
    fn test_range_without_custom_period_is_accepted() {
        assert!(parse(&["report", "cycl", "--from", "2024-01", "--to", "2024-02"]).is_ok());
        assert!(parse(&["report", "cycl", "--period", "year"]).is_ok());
    }

    #[test]
    fn test_utc_offset() {
        let cli = parse(&["watch", "cycl", "--utc-offset", "-5"]).unwrap();
        let Commands::Watch { display, .. } = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(display.offset().unwrap().local_minus_utc(), -5 * 3600);

        let cli = parse(&["report", "cycl"]).unwrap();
        let Commands::Report { display, .. } = cli.command else {
            panic!("expected report");
        };
        assert_eq!(display.offset().unwrap(), FixedOffset::east_opt(0).unwrap());

        assert!(parse(&["report", "cycl", "--utc-offset", "15"]).is_err());
    }

    #[tokio::test]
    async fn test_demo_summary_at_offset() {
        let today = Utc::now().date_naive();
        let mut dashboard = Dashboard::new(Arc::new(demo_store(today)), Clock::System);
        dashboard.search("cycl").await;
        dashboard.set_custom_range(&RawCustomRange::Keys {
            from_month: "2020-01".into(),
            to_month: DayKey::new(today).month().to_string(),
        });

        let current = dashboard.current();
        assert!(current.daily_series.len() > DAILY_DISPLAY_LIMIT);
        let shown = recent_days(&current.daily_series, DAILY_DISPLAY_LIMIT);
        assert_eq!(shown.len(), DAILY_DISPLAY_LIMIT);
        assert_eq!(
            shown.last().map(|p| p.day_key),
            current.daily_series.last().map(|p| p.day_key)
        );

        // demo updates land between 08:30 and 17:30 UTC
        let station = &dashboard.stations()[0];
        let utc = UsagePattern::from_timestamps(
            station.daily_timestamps(),
            FixedOffset::east_opt(0).unwrap(),
        );
        let shifted = UsagePattern::from_timestamps(
            station.daily_timestamps(),
            FixedOffset::east_opt(3 * 3600).unwrap(),
        );
        let (Some(utc_peak), Some(shifted_peak)) = (utc.peak_hour(), shifted.peak_hour()) else {
            panic!("demo station has no daily timestamps");
        };
        assert_eq!((utc_peak + 3) % 24, shifted_peak);

        log_summary(&dashboard, FixedOffset::west_opt(5 * 3600).unwrap());
    }
}

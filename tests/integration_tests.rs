use chrono::{TimeZone, Utc};
use esg_report::calendar::{DayKey, MonthKey, MonthRange};
use esg_report::dashboard::{Clock, Dashboard, SearchOutcome};
use esg_report::infra::memory::MemoryStore;
use esg_report::metrics::{PeriodSelection, RawCustomRange};
use esg_report::output::{report_rows, write_csv};
use esg_report::station::{DailyMetrics, DailyRecord, MonthlyMetrics, StationSummary};
use esg_report::users::UserRecord;
use std::sync::Arc;

fn clock() -> Clock {
    Clock::Fixed(Utc.with_ymd_and_hms(2024, 2, 10, 9, 0, 0).unwrap())
}

fn key(s: &str) -> MonthKey {
    s.parse().unwrap()
}

fn monthly(entries: &[(&str, u64)]) -> MonthlyMetrics {
    entries.iter().map(|(k, v)| (key(k), *v)).collect()
}

fn add_station(store: &MemoryStore, id: &str, company: &str, capacity: u64, current_cap: u64) {
    store.insert_station(StationSummary {
        station_id: id.into(),
        place_name: format!("Place {id}"),
        company_name: company.into(),
        capacity,
        current_cap,
        ..Default::default()
    });
}

fn network() -> MemoryStore {
    let store = MemoryStore::new();
    add_station(&store, "A", "Cycl", 100, 50);
    store.set_monthly("A", monthly(&[("2024-01", 10), ("2024-02", 20)]));
    add_station(&store, "B", "Pant AS", 200, 20);
    store.set_monthly("B", monthly(&[("2023-12", 5), ("2024-02", 7)]));
    store
}

#[tokio::test]
async fn test_custom_range_scenario() {
    let store = network();
    let mut dashboard = Dashboard::new(Arc::new(store), clock());

    let outcome = dashboard.search("  cycl ").await;
    assert_eq!(outcome, SearchOutcome::Loaded { stations: 1 });

    dashboard.set_custom_range(&RawCustomRange::Keys {
        from_month: "2024-01".into(),
        to_month: "2024-02".into(),
    });

    let current = dashboard.current();
    assert_eq!(current.total_bottles, 30);
    assert_eq!(current.impact.display().co2_saved, "2.5");
    assert_eq!(current.avg_efficiency, 50.0);
    assert_eq!(current.time_series_data.len(), 12);
}

#[tokio::test]
async fn test_single_month_custom_range_matches_month_period() {
    let mut dashboard = Dashboard::new(Arc::new(network()), clock());
    dashboard.search("place").await;

    dashboard.set_period(PeriodSelection::Month);
    let month_total = dashboard.current().total_bottles;

    dashboard.set_period(PeriodSelection::Custom(Some(MonthRange::single(key("2024-02")))));
    assert_eq!(dashboard.current().total_bottles, month_total);
    assert_eq!(month_total, 27);

    dashboard.set_period(PeriodSelection::AllTime);
    assert_eq!(dashboard.current().total_bottles, 42);
}

#[tokio::test]
async fn test_no_results() {
    let mut dashboard = Dashboard::new(Arc::new(network()), clock());

    assert_eq!(dashboard.search("nowhere").await, SearchOutcome::NoResults);
    assert_eq!(dashboard.current().stations_count, 0);
    assert_eq!(dashboard.current().avg_efficiency, 0.0);
    assert_eq!(dashboard.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_unavailable_store_degrades_to_empty() {
    let store = network();
    let mut dashboard = Dashboard::new(Arc::new(store.clone()), clock());
    dashboard.search("cycl").await;
    assert_eq!(dashboard.stations().len(), 1);

    store.set_unavailable(true);
    let outcome = dashboard.search("cycl").await;

    assert!(matches!(outcome, SearchOutcome::Unavailable(_)));
    assert!(dashboard.stations().is_empty());
    assert_eq!(dashboard.current().total_bottles, 0);
    assert_eq!(store.listener_count(), 0);

    store.set_unavailable(false);
    assert_eq!(
        dashboard.search("cycl").await,
        SearchOutcome::Loaded { stations: 1 }
    );
}

#[tokio::test]
async fn test_live_update_recomputes_snapshot() {
    let store = network();
    let mut dashboard = Dashboard::new(Arc::new(store.clone()), clock());
    dashboard.search("cycl").await;
    dashboard.set_period(PeriodSelection::AllTime);
    assert_eq!(dashboard.current().total_bottles, 30);

    store.set_monthly("A", monthly(&[("2024-01", 10), ("2024-02", 25)]));
    store.set_fields("A", None, 80);

    assert_eq!(dashboard.apply_pending(), 2);
    assert_eq!(dashboard.current().total_bottles, 35);
    assert_eq!(dashboard.current().avg_efficiency, 80.0);
    assert_eq!(dashboard.stations()[0].capacity, 100);
}

#[tokio::test]
async fn test_deleted_metrics_contribute_nothing() {
    let store = network();
    let mut dashboard = Dashboard::new(Arc::new(store.clone()), clock());
    dashboard.search("place").await;
    dashboard.set_period(PeriodSelection::AllTime);

    store.set_monthly("A", MonthlyMetrics::new());
    dashboard.apply_pending();

    assert_eq!(dashboard.current().total_bottles, 12);
    dashboard.set_period(PeriodSelection::Year);
    assert_eq!(dashboard.current().total_bottles, 7);
}

#[tokio::test]
async fn test_new_search_replaces_subscriptions() {
    let store = network();
    let mut dashboard = Dashboard::new(Arc::new(store.clone()), clock());

    dashboard.search("cycl").await;
    assert_eq!(store.listener_count(), 3);

    dashboard.search("pant").await;
    assert_eq!(store.listener_count(), 3);
    assert_eq!(dashboard.stations()[0].station_id, "B");

    store.set_fields("A", None, 99);
    assert_eq!(dashboard.apply_pending(), 0);
    assert_eq!(dashboard.stations()[0].current_cap, 20);

    drop(dashboard);
    assert_eq!(store.listener_count(), 0);
}

#[tokio::test]
async fn test_update_order_independence() {
    async fn run(fields_first: bool) -> esg_report::metrics::CurrentData {
        let store = network();
        let mut dashboard = Dashboard::new(Arc::new(store.clone()), clock());
        dashboard.search("place").await;
        dashboard.set_period(PeriodSelection::Year);

        let daily: DailyMetrics = [(
            "2024-02-09".parse::<DayKey>().unwrap(),
            DailyRecord {
                count: 4,
                updated_at: Some(Utc.with_ymd_and_hms(2024, 2, 9, 15, 0, 0).unwrap()),
            },
        )]
        .into_iter()
        .collect();

        if fields_first {
            store.set_fields("B", Some(250), 125);
            store.set_daily("A", daily);
        } else {
            store.set_daily("A", daily);
            store.set_fields("B", Some(250), 125);
        }
        dashboard.apply_pending();
        dashboard.current().clone()
    }

    let a = run(true).await;
    let b = run(false).await;
    assert_eq!(a, b);
    assert_eq!(a.daily_series.last().unwrap().bottles, 0);
    assert_eq!(a.daily_series[5].bottles, 4);
}

#[tokio::test]
async fn test_next_change_waits_for_update() {
    let store = network();
    let mut dashboard = Dashboard::new(Arc::new(store.clone()), clock());
    dashboard.search("cycl").await;

    let writer = store.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        writer.set_fields("A", None, 70);
    });

    let applied = dashboard.next_change().await;
    assert_eq!(applied, 1);
    assert_eq!(dashboard.current().avg_efficiency, 70.0);
}

#[tokio::test]
async fn test_report_uses_real_user_counts() {
    let store = network();
    let now = Utc::now();
    for (count, days_ago) in [(1, 2), (5, 10), (3, 60)] {
        store.add_user(UserRecord {
            recycle_count: count,
            last_recycle: Some(now - chrono::Duration::days(days_ago)),
        });
    }

    let mut dashboard = Dashboard::new(Arc::new(store), clock());
    dashboard.search("place").await;
    dashboard.set_period(PeriodSelection::AllTime);

    let stats = dashboard.user_stats().copied().unwrap();
    assert_eq!(stats.total_users, 3);
    assert_eq!(stats.active_users, 2);
    assert_eq!(stats.repeat_users, 2);

    let value = dashboard.business_value();
    assert!(!value.active_user_impact.is_estimated());
    assert_eq!(value.user_engagement_rate, 67);
    assert_eq!(value.brand_engagement.value(), 6);

    let rows = report_rows(dashboard.state(), dashboard.current());
    let csv = String::from_utf8(write_csv(Vec::new(), &rows).unwrap()).unwrap();
    let last = csv.lines().last().unwrap();
    assert!(last.starts_with("TOTAL SUMMARY,,,42,,"));
}

use chrono::NaiveDate;

use crate::metrics::impact::impact;
use crate::metrics::period::{PeriodSelection, resolve_total};
use crate::metrics::series::{build_daily, build_monthly, merged_daily, merged_monthly};
use crate::metrics::types::CurrentData;
use crate::metrics::utility::mean;
use crate::station::Station;
use crate::users::UserStats;

/// Everything a [`CurrentData`] snapshot is derived from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub stations: Vec<Station>,
    pub period: PeriodSelection,
    /// `None` until a search has loaded user statistics.
    pub user_stats: Option<UserStats>,
}

impl DashboardState {
    pub fn station_mut(&mut self, station_id: &str) -> Option<&mut Station> {
        self.stations.iter_mut().find(|s| s.station_id == station_id)
    }
}

/// Aggregates the station set into a fresh [`CurrentData`].
///
/// A pure function of `state` and `today`: the same inputs always produce an
/// identical snapshot. Cost is linear in stations × stored months.
pub fn aggregate(state: &DashboardState, today: NaiveDate) -> CurrentData {
    let stations = &state.stations;
    let total_bottles = resolve_total(stations, &state.period, today);

    let custom_range = match state.period {
        PeriodSelection::Custom(range) => range,
        _ => None,
    };

    let efficiencies: Vec<f64> = stations.iter().map(Station::efficiency).collect();

    CurrentData {
        period: state.period,
        total_bottles,
        stations_count: stations.len(),
        impact: impact(total_bottles),
        time_series_data: build_monthly(&merged_monthly(stations), None, today),
        daily_series: build_daily(&merged_daily(stations), custom_range, today),
        avg_efficiency: mean(&efficiencies),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{MonthKey, MonthRange};
    use crate::station::{MonthlyMetrics, StationSummary};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 10).unwrap()
    }

    fn key(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn station(id: &str, capacity: u64, current_cap: u64, months: &[(&str, u64)]) -> Station {
        let mut s = Station::from_summary(StationSummary {
            station_id: id.into(),
            capacity,
            current_cap,
            ..Default::default()
        });
        s.replace_monthly(months.iter().map(|(k, v)| (key(k), *v)).collect::<MonthlyMetrics>());
        s
    }

    #[test]
    fn test_custom_range_scenario() {
        let state = DashboardState {
            stations: vec![station("A", 100, 50, &[("2024-01", 10), ("2024-02", 20)])],
            period: PeriodSelection::Custom(Some(
                MonthRange::new(key("2024-01"), key("2024-02")).unwrap(),
            )),
            user_stats: None,
        };

        let data = aggregate(&state, today());
        assert_eq!(data.total_bottles, 30);
        assert_eq!(data.impact.display().co2_saved, "2.5");
        assert_eq!(data.stations_count, 1);
        assert_eq!(data.avg_efficiency, 50.0);
        assert_eq!(data.daily_series.len(), 31 + 29);
    }

    #[test]
    fn test_empty_station_set() {
        let data = aggregate(&DashboardState::default(), today());
        assert_eq!(data.total_bottles, 0);
        assert_eq!(data.stations_count, 0);
        assert_eq!(data.avg_efficiency, 0.0);
        assert!(!data.avg_efficiency.is_nan());
        assert_eq!(data.time_series_data.len(), 12);
        assert_eq!(data.daily_series.len(), 7);
    }

    #[test]
    fn test_zero_capacity_station_does_not_poison_average() {
        let state = DashboardState {
            stations: vec![station("A", 0, 5, &[]), station("B", 100, 80, &[])],
            ..Default::default()
        };
        let data = aggregate(&state, today());
        assert_eq!(data.avg_efficiency, 40.0);
    }

    #[test]
    fn test_trend_ignores_selected_period() {
        let stations = vec![
            station("A", 10, 1, &[("2023-03", 5), ("2024-02", 7)]),
            station("B", 10, 1, &[("2024-02", 3)]),
        ];
        let month = aggregate(
            &DashboardState {
                stations: stations.clone(),
                period: PeriodSelection::Month,
                user_stats: None,
            },
            today(),
        );
        let all = aggregate(
            &DashboardState {
                stations,
                period: PeriodSelection::AllTime,
                user_stats: None,
            },
            today(),
        );

        assert_eq!(month.total_bottles, 10);
        assert_eq!(all.total_bottles, 15);
        assert_eq!(month.time_series_data, all.time_series_data);
        assert_eq!(month.time_series_data.first().unwrap().bottles, 5);
        assert_eq!(month.time_series_data.last().unwrap().bottles, 10);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let state = DashboardState {
            stations: vec![station("A", 30, 7, &[("2024-01", 11), ("2024-02", 13)])],
            period: PeriodSelection::Year,
            user_stats: Some(UserStats::default()),
        };
        assert_eq!(aggregate(&state, today()), aggregate(&state, today()));
    }
}

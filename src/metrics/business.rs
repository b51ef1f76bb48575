//! Economic, compliance, community and UN SDG metrics derived from a bottle count.

use serde::Serialize;

use crate::metrics::impact::{
    CO2_KG_PER_BOTTLE, ENERGY_KWH_PER_BOTTLE, Impact, PLASTIC_KG_PER_BOTTLE, WATER_L_PER_BOTTLE,
    impact,
};
use crate::metrics::utility::pct;
use crate::station::Station;
use crate::users::UserStats;

/// USD saved in waste handling per bottle.
pub const WASTE_MANAGEMENT_USD_PER_BOTTLE: f64 = 0.12;
/// USD value of recovered material per bottle.
pub const MATERIAL_USD_PER_BOTTLE: f64 = 0.08;
/// USD per tonne of CO₂ credited.
pub const CARBON_CREDIT_USD_PER_TONNE: f64 = 25.0;
/// USD operating cost per bottle.
pub const COST_PER_BOTTLE: f64 = 0.15;
/// USD benefit (savings plus brand value) per bottle.
pub const BENEFIT_PER_BOTTLE: f64 = 0.2;
/// Touchpoints counted per active user.
pub const TOUCHPOINTS_PER_ACTIVE_USER: u64 = 3;

const GOVERNANCE_SCORE: f64 = 15.0;

/// A user-derived count, tagged with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "value", rename_all = "lowercase")]
pub enum UserCount {
    /// Counted from user records.
    Real(u64),
    /// Extrapolated from the bottle count because no user stats were loaded.
    Estimated(u64),
}

impl UserCount {
    pub fn value(&self) -> u64 {
        match self {
            UserCount::Real(n) | UserCount::Estimated(n) => *n,
        }
    }

    pub fn is_estimated(&self) -> bool {
        matches!(self, UserCount::Estimated(_))
    }

    fn map(self, f: impl FnOnce(u64) -> u64) -> Self {
        match self {
            UserCount::Real(n) => UserCount::Real(f(n)),
            UserCount::Estimated(n) => UserCount::Estimated(f(n)),
        }
    }
}

/// The seven SDG indicators reported per bottle count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SdgProgress {
    /// SDG 6, litres of water protected.
    pub clean_water: f64,
    /// SDG 7, kWh renewable equivalent.
    pub clean_energy: f64,
    /// SDG 11, kg waste diverted.
    pub sustainable_cities: f64,
    /// SDG 12, units of circular consumption.
    pub responsible_consumption: u64,
    /// SDG 13, kg CO₂ reduced.
    pub climate_action: f64,
    /// SDG 14, estimated marine items prevented.
    pub life_below_water: u64,
    /// SDG 15, estimated terrestrial pollution items prevented.
    pub life_on_land: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessValue {
    pub impact: Impact,
    pub waste_management_savings: f64,
    pub material_value: f64,
    pub carbon_credit_value: f64,
    pub circular_economy_contribution: f64,
    pub sdg_progress: SdgProgress,
    pub esg_score: u32,
    pub scalability_score: u32,
    pub risk_mitigation_score: u32,
    /// kg, aligned with plastic diverted.
    pub epr_compliance: f64,
    /// grams CO₂-equivalent.
    pub ghg_reduction: f64,
    pub community_impact: UserCount,
    pub active_user_impact: UserCount,
    pub user_engagement_rate: u32,
    pub brand_engagement: UserCount,
    pub collection_efficiency: u32,
    pub cost_per_bottle: f64,
    pub roi: i64,
}

fn ceil_div(n: u64, d: u64) -> u64 {
    n.div_ceil(d)
}

pub fn sdg_progress(bottles: u64) -> SdgProgress {
    let b = bottles as f64;
    SdgProgress {
        clean_water: b * WATER_L_PER_BOTTLE,
        clean_energy: b * ENERGY_KWH_PER_BOTTLE,
        sustainable_cities: b * PLASTIC_KG_PER_BOTTLE,
        responsible_consumption: bottles,
        climate_action: b * CO2_KG_PER_BOTTLE,
        life_below_water: ceil_div(bottles, 10),
        life_on_land: ceil_div(bottles, 20),
    }
}

/// 0–100 composite: environmental (max 70) + social (max 15) + governance (15).
pub fn esg_score(bottles: u64) -> u32 {
    let b = bottles as f64;
    let environmental = (b / 1000.0 * 50.0).min(70.0);
    let social = (b / 500.0 * 10.0).min(15.0);
    (environmental + social + GOVERNANCE_SCORE).round() as u32
}

/// Return on operating cost as a whole percentage, 0 when there is no cost.
pub fn roi(bottles: u64) -> i64 {
    let benefits = bottles as f64 * BENEFIT_PER_BOTTLE;
    let costs = bottles as f64 * COST_PER_BOTTLE;
    if costs > 0.0 {
        ((benefits - costs) / costs * 100.0).round() as i64
    } else {
        0
    }
}

/// Share of total capacity currently filled across `stations`.
pub fn collection_efficiency(stations: &[Station]) -> u32 {
    let capacity: u64 = stations.iter().map(|s| s.capacity).sum();
    let used: u64 = stations.iter().map(|s| s.current_cap).sum();
    pct(used, capacity)
}

/// Business value of `bottles` for the station set `stations`.
///
/// Community figures come from `user_stats` when present and are tagged
/// [`UserCount::Estimated`] otherwise.
pub fn business_value(
    bottles: u64,
    user_stats: Option<&UserStats>,
    stations: &[Station],
) -> BusinessValue {
    let b = bottles as f64;
    let impact = impact(bottles);

    let (community, active) = match user_stats {
        Some(stats) => (
            UserCount::Real(stats.total_users),
            UserCount::Real(stats.active_users),
        ),
        None => (
            UserCount::Estimated(ceil_div(bottles, 50)),
            UserCount::Estimated(ceil_div(bottles, 100)),
        ),
    };

    let esg = esg_score(bottles);

    BusinessValue {
        waste_management_savings: b * WASTE_MANAGEMENT_USD_PER_BOTTLE,
        material_value: b * MATERIAL_USD_PER_BOTTLE,
        carbon_credit_value: impact.co2_saved / 1000.0 * CARBON_CREDIT_USD_PER_TONNE,
        circular_economy_contribution: b * PLASTIC_KG_PER_BOTTLE,
        sdg_progress: sdg_progress(bottles),
        esg_score: esg,
        scalability_score: esg,
        risk_mitigation_score: (esg + 20).min(100),
        epr_compliance: impact.plastic_diverted,
        ghg_reduction: impact.co2_saved * 1000.0,
        community_impact: community,
        active_user_impact: active,
        user_engagement_rate: pct(active.value(), community.value()),
        brand_engagement: active.map(|n| n * TOUCHPOINTS_PER_ACTIVE_USER),
        collection_efficiency: collection_efficiency(stations),
        cost_per_bottle: COST_PER_BOTTLE,
        roi: roi(bottles),
        impact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::StationSummary;

    fn station(capacity: u64, current_cap: u64) -> Station {
        Station::from_summary(StationSummary {
            station_id: format!("s{capacity}-{current_cap}"),
            capacity,
            current_cap,
            ..Default::default()
        })
    }

    #[test]
    fn test_esg_score_bounds() {
        assert_eq!(esg_score(0), 15);
        assert_eq!(esg_score(500), 50);
        assert_eq!(esg_score(1000), 80);
        assert_eq!(esg_score(1_000_000), 100);
    }

    #[test]
    fn test_roi() {
        assert_eq!(roi(0), 0);
        assert_eq!(roi(1), 33);
        assert_eq!(roi(10_000), 33);
    }

    #[test]
    fn test_collection_efficiency() {
        assert_eq!(collection_efficiency(&[]), 0);
        assert_eq!(collection_efficiency(&[station(0, 10)]), 0);
        assert_eq!(collection_efficiency(&[station(100, 25), station(100, 75)]), 50);
    }

    #[test]
    fn test_sdg_progress() {
        let sdg = sdg_progress(21);
        assert_eq!(sdg.responsible_consumption, 21);
        assert_eq!(sdg.life_below_water, 3);
        assert_eq!(sdg.life_on_land, 2);
        assert_eq!(sdg.clean_water, 10.5);
    }

    #[test]
    fn test_estimated_user_counts_are_tagged() {
        let value = business_value(120, None, &[]);
        assert_eq!(value.community_impact, UserCount::Estimated(3));
        assert_eq!(value.active_user_impact, UserCount::Estimated(2));
        assert_eq!(value.brand_engagement, UserCount::Estimated(6));
        assert_eq!(value.user_engagement_rate, 67);
        assert!(value.community_impact.is_estimated());
    }

    #[test]
    fn test_real_user_counts() {
        let stats = UserStats {
            total_users: 40,
            active_users: 10,
            repeat_users: 5,
            one_time_users: 20,
        };
        let value = business_value(120, Some(&stats), &[]);
        assert_eq!(value.community_impact, UserCount::Real(40));
        assert_eq!(value.active_user_impact, UserCount::Real(10));
        assert_eq!(value.brand_engagement, UserCount::Real(30));
        assert_eq!(value.user_engagement_rate, 25);
    }

    #[test]
    fn test_zero_users_engagement_rate() {
        let value = business_value(0, Some(&UserStats::default()), &[]);
        assert_eq!(value.user_engagement_rate, 0);
        assert_eq!(value.roi, 0);
        assert_eq!(value.esg_score, 15);
        assert_eq!(value.risk_mitigation_score, 35);
    }

    #[test]
    fn test_economic_rates_use_unrounded_co2() {
        let value = business_value(1000, None, &[]);
        assert!((value.waste_management_savings - 120.0).abs() < 1e-9);
        assert!((value.material_value - 80.0).abs() < 1e-9);
        assert!((value.carbon_credit_value - 2.05).abs() < 1e-9);
        assert!((value.ghg_reduction - 82_000.0).abs() < 1e-6);
        assert!((value.epr_compliance - 25.0).abs() < 1e-9);
    }
}

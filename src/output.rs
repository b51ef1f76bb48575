//! Report export and snapshot printing.
//!
//! The CSV report has 28 columns, one row per station (valued at its current
//! fill) and a closing `TOTAL SUMMARY` row for the selected period.

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::metrics::utility::fixed;
use crate::metrics::{BusinessValue, CurrentData, DashboardState, business_value};

/// One line of the CSV report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Station Number")]
    pub station: String,
    #[serde(rename = "Place Name")]
    pub place_name: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Current Bottles")]
    pub bottles: u64,
    #[serde(rename = "Capacity")]
    pub capacity: Option<u64>,
    #[serde(rename = "Efficiency %")]
    pub efficiency: String,

    #[serde(rename = "CO2 Saved (kg)")]
    pub co2_saved: String,
    #[serde(rename = "Water Saved (L)")]
    pub water_saved: String,
    #[serde(rename = "Energy Saved (kWh)")]
    pub energy_saved: String,
    #[serde(rename = "Plastic Diverted (kg)")]
    pub plastic_diverted: String,

    #[serde(rename = "Waste Management Savings ($)")]
    pub waste_management_savings: String,
    #[serde(rename = "Material Value ($)")]
    pub material_value: String,
    #[serde(rename = "Carbon Credit Value ($)")]
    pub carbon_credit_value: String,
    #[serde(rename = "ESG Score")]
    pub esg_score: u32,
    #[serde(rename = "ROI (%)")]
    pub roi: i64,

    #[serde(rename = "Total Users Impacted")]
    pub users_impacted: u64,
    #[serde(rename = "EPR Compliance (kg)")]
    pub epr_compliance: String,

    #[serde(rename = "SDG 6: Clean Water (L)")]
    pub sdg6_clean_water: String,
    #[serde(rename = "SDG 7: Clean Energy (kWh)")]
    pub sdg7_clean_energy: String,
    #[serde(rename = "SDG 11: Sustainable Cities (kg)")]
    pub sdg11_sustainable_cities: String,
    #[serde(rename = "SDG 12: Responsible Consumption (units)")]
    pub sdg12_responsible_consumption: u64,
    #[serde(rename = "SDG 13: Climate Action (kg CO2)")]
    pub sdg13_climate_action: String,
    #[serde(rename = "SDG 14: Life Below Water (items)")]
    pub sdg14_life_below_water: u64,
    #[serde(rename = "SDG 15: Life on Land (items)")]
    pub sdg15_life_on_land: u64,

    #[serde(rename = "Brand Engagement (touchpoints)")]
    pub brand_engagement: u64,
    #[serde(rename = "Investment ROI (%)")]
    pub investment_roi: i64,
    #[serde(rename = "Scalability Score")]
    pub scalability_score: u32,
    #[serde(rename = "Risk Mitigation Score")]
    pub risk_mitigation_score: u32,
}

impl ReportRow {
    fn new(
        station: String,
        place_name: String,
        address: String,
        capacity: Option<u64>,
        efficiency: f64,
        bottles: u64,
        value: &BusinessValue,
    ) -> Self {
        let impact = value.impact.display();
        let sdg = &value.sdg_progress;
        Self {
            station,
            place_name,
            address,
            bottles,
            capacity,
            efficiency: fixed(efficiency, 1),
            co2_saved: impact.co2_saved,
            water_saved: impact.water_saved,
            energy_saved: impact.energy_saved,
            plastic_diverted: impact.plastic_diverted,
            waste_management_savings: fixed(value.waste_management_savings, 0),
            material_value: fixed(value.material_value, 0),
            carbon_credit_value: fixed(value.carbon_credit_value, 2),
            esg_score: value.esg_score,
            roi: value.roi,
            users_impacted: value.community_impact.value(),
            epr_compliance: fixed(value.epr_compliance, 2),
            sdg6_clean_water: fixed(sdg.clean_water, 1),
            sdg7_clean_energy: fixed(sdg.clean_energy, 1),
            sdg11_sustainable_cities: fixed(sdg.sustainable_cities, 2),
            sdg12_responsible_consumption: sdg.responsible_consumption,
            sdg13_climate_action: fixed(sdg.climate_action, 1),
            sdg14_life_below_water: sdg.life_below_water,
            sdg15_life_on_land: sdg.life_on_land,
            brand_engagement: value.brand_engagement.value(),
            investment_roi: value.roi,
            scalability_score: value.scalability_score,
            risk_mitigation_score: value.risk_mitigation_score,
        }
    }
}

/// Station rows followed by the summary row for `current`.
pub fn report_rows(state: &DashboardState, current: &CurrentData) -> Vec<ReportRow> {
    let user_stats = state.user_stats.as_ref();
    let mut rows: Vec<ReportRow> = state
        .stations
        .iter()
        .map(|station| {
            let value = business_value(
                station.current_cap,
                user_stats,
                std::slice::from_ref(station),
            );
            ReportRow::new(
                station.station_id.clone(),
                station.place_name.clone(),
                station.address.clone(),
                Some(station.capacity),
                station.efficiency(),
                station.current_cap,
                &value,
            )
        })
        .collect();

    let total = business_value(current.total_bottles, user_stats, &state.stations);
    rows.push(ReportRow::new(
        "TOTAL SUMMARY".to_string(),
        String::new(),
        String::new(),
        None,
        current.avg_efficiency,
        current.total_bottles,
        &total,
    ));
    rows
}

/// Writes `rows` with a header line into `writer`.
pub fn write_csv<W: Write>(writer: W, rows: &[ReportRow]) -> Result<W> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| anyhow!("failed to flush CSV: {}", e.error()))
}

/// Writes the report to `path`, gzip-compressed when `gzip` is set.
pub fn write_report(path: &Path, rows: &[ReportRow], gzip: bool) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;

    if gzip {
        let encoder = write_csv(GzEncoder::new(file, Compression::default()), rows)?;
        encoder.finish()?;
    } else {
        write_csv(file, rows)?.flush()?;
    }

    info!(path = %path.display(), rows = rows.len(), gzip, "Report written");
    Ok(())
}

/// `esg-report-YYYY-MM-DD.csv`
pub fn default_report_name(today: NaiveDate) -> String {
    format!("esg-report-{}.csv", today.format("%Y-%m-%d"))
}

/// Logs the snapshot using Rust's debug pretty-print format.
pub fn print_pretty(current: &CurrentData) {
    debug!("{:#?}", current);
}

/// Logs the snapshot as pretty-printed JSON.
pub fn print_json(current: &CurrentData) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(current)?);
    Ok(())
}

//! Per-plant stage orchestration: clear-sky derivation, channel
//! filtering, classification, theoretical curves, the stuck-angle power
//! sweep, and the loss tables.
//!
//! Stages run in dependency order; each reads named upstream artifacts
//! and writes named downstream artifacts by role. A stage failure aborts
//! the plant's remaining stages so dependent artifacts never see a
//! partial warehouse.

use std::time::Instant;

use clap::ValueEnum;
use polars::prelude::*;
use tracing::{info, warn};

use crate::classification::{
    classification_frame, classify_day, frame_to_rows, PeriodClassification,
};
use crate::clearsky::{clearsky_day_frame, ClearSkyOracle, NoaaClearSky, CLEARSKY_COL};
use crate::config::PlantConfig;
use crate::equation::Equation;
use crate::errors::PipelineError;
use crate::limits::calculate_period_limits;
use crate::loss::{day_csi, day_loss, loss_table_frame, LossRow};
use crate::parallel::try_par_map;
use crate::power::{IrradianceSource, PowerModel, PvArrayModel};
use crate::sun_filter::{smooth_block, sun_filter_day, SMOOTHING_WINDOW};
use crate::theoretical::{
    build_conditions, sweep_stuck_angles, theoretical_irradiance_day, THEORETICAL_GTI_COL,
    THEORETICAL_POWER_COL,
};
use crate::timeseries::{
    self, SensorBlock, DAY_SECONDS, TIMESTAMP_COL,
};
use crate::unavailability::{unavailability_frame, unavailability_losses};

pub const GHI_COL: &str = "GHI";
pub const AC_POWER_COL: &str = "AC Power";
pub const WIND_SPEED_COL: &str = "Wind speed";
pub const AMB_TEMP_COL: &str = "Ambient temperature";

/// Raw channel roles that go through the sun filter.
const FILTERED_CHANNELS: [&str; 3] = ["gti", "ghi", "ca_power"];
const WEATHER_CHANNELS: [(&str, &str); 2] = [
    ("wind_speed", WIND_SPEED_COL),
    ("amb_temp", AMB_TEMP_COL),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Stage {
    All,
    Clearsky,
    Channels,
    Weather,
    Classification,
    TheoreticalIrradiance,
    TheoreticalPower,
    StoppedTrackers,
    LossTable,
    Unavailability,
}

pub struct PlantPipeline<'a> {
    plant: &'a str,
    config: &'a PlantConfig,
    oracle: Box<dyn ClearSkyOracle + 'a>,
    power_model: Box<dyn PowerModel + 'a>,
}

impl<'a> PlantPipeline<'a> {
    pub fn new(plant: &'a str, config: &'a PlantConfig) -> Self {
        let oracle = Box::new(NoaaClearSky::new(&config.location));
        let power_model = Box::new(PvArrayModel::new(
            &config.location,
            config.power_model.clone(),
            config.n_strings,
        ));
        Self {
            plant,
            config,
            oracle,
            power_model,
        }
    }

    pub fn with_oracle(mut self, oracle: Box<dyn ClearSkyOracle + 'a>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_power_model(mut self, model: Box<dyn PowerModel + 'a>) -> Self {
        self.power_model = model;
        self
    }

    pub fn run(&self) -> Result<(), PipelineError> {
        let start = Instant::now();
        self.generate_clearsky()?;
        self.generate_channels(true)?;
        self.generate_channels(false)?;
        self.generate_weather()?;
        self.generate_classification()?;
        self.generate_theoretical_irradiance(true)?;
        self.generate_theoretical_irradiance(false)?;
        self.generate_theoretical_power(true)?;
        self.generate_theoretical_power(false)?;
        self.generate_stopped_trackers_power()?;
        self.generate_loss_table()?;
        self.generate_unavailability_loss()?;
        info!(
            plant = self.plant,
            "warehouse populated in {:.2}s",
            start.elapsed().as_secs_f32()
        );
        Ok(())
    }

    pub fn run_stage(&self, stage: Stage) -> Result<(), PipelineError> {
        match stage {
            Stage::All => self.run(),
            Stage::Clearsky => self.generate_clearsky(),
            Stage::Channels => {
                self.generate_channels(true)?;
                self.generate_channels(false)
            }
            Stage::Weather => self.generate_weather(),
            Stage::Classification => self.generate_classification(),
            Stage::TheoreticalIrradiance => {
                self.generate_theoretical_irradiance(true)?;
                self.generate_theoretical_irradiance(false)
            }
            Stage::TheoreticalPower => {
                self.generate_theoretical_power(true)?;
                self.generate_theoretical_power(false)
            }
            Stage::StoppedTrackers => self.generate_stopped_trackers_power(),
            Stage::LossTable => self.generate_loss_table(),
            Stage::Unavailability => self.generate_unavailability_loss(),
        }
    }

    fn read_warehouse(&self, role: &str) -> Result<DataFrame, PipelineError> {
        let path = self.config.warehouse_path(self.plant, role)?;
        timeseries::read_frame(path, role)
    }

    fn write_warehouse(&self, role: &str, df: &mut DataFrame) -> Result<(), PipelineError> {
        let path = self.config.warehouse_path(self.plant, role)?;
        timeseries::write_frame(df, path)?;
        info!(plant = self.plant, role, rows = df.height(), "artifact written");
        Ok(())
    }

    /// Clear-sky GHI for every day spanned by the raw GHI artifact.
    pub fn generate_clearsky(&self) -> Result<(), PipelineError> {
        info!(plant = self.plant, "generating clear-sky curves");
        let ghi_path = self.config.datalake_path(self.plant, "ghi")?;
        let ghi = timeseries::read_frame(ghi_path, "ghi")?;
        let days = timeseries::day_range(&ghi)?;
        if days.is_empty() {
            return Err(PipelineError::EmptyArtifact {
                role: "ghi".to_string(),
            });
        }

        let day_frames = try_par_map(&days, |&day| clearsky_day_frame(self.oracle.as_ref(), day))?;
        let mut clearsky = concat_frames(day_frames)?;
        self.write_warehouse("clearsky", &mut clearsky)
    }

    /// Sun-filter (and for the `avg` variant, smooth) the raw gti / ghi /
    /// ca_power channels into their warehouse counterparts.
    pub fn generate_channels(&self, avg: bool) -> Result<(), PipelineError> {
        let status = if avg { "avg" } else { "original" };
        let clearsky = self.read_warehouse("clearsky")?;

        for role in FILTERED_CHANNELS {
            let path = self.config.datalake_path(self.plant, role)?;
            let Some(raw) = timeseries::read_frame_optional(path)? else {
                warn!(plant = self.plant, role, "raw channel absent, skipping");
                continue;
            };
            info!(plant = self.plant, role, avg, "filtering channel");
            let data = timeseries::coerce_numeric(&raw)?;
            let days = timeseries::day_range(&data)?;

            let day_blocks = try_par_map(&days, |&day| {
                let data_day = timeseries::frame_to_block(&timeseries::day_slice(&data, day)?)?;
                let clearsky_day = clearsky_curve_for_day(&clearsky, day)?;
                let limits = calculate_period_limits(&clearsky_day)?;
                Ok(sun_filter_day(&data_day, &limits))
            })?;
            let mut merged = concat_blocks(day_blocks);
            if avg {
                merged = smooth_block(&merged, SMOOTHING_WINDOW);
            }
            rename_channel_columns(&mut merged, role);

            let mut frame = timeseries::block_to_frame(&merged)?;
            self.write_warehouse(&format!("{role}_{status}"), &mut frame)?;
        }
        Ok(())
    }

    /// Pass-through cleanup of the weather channels.
    pub fn generate_weather(&self) -> Result<(), PipelineError> {
        for (role, column) in WEATHER_CHANNELS {
            let path = self.config.datalake_path(self.plant, role)?;
            let Some(raw) = timeseries::read_frame_optional(path)? else {
                warn!(plant = self.plant, role, "weather channel absent, skipping");
                continue;
            };
            let mut block = timeseries::frame_to_block(&timeseries::coerce_numeric(&raw)?)?;
            if let Some((name, _)) = block.columns.first_mut() {
                *name = column.to_string();
            }
            block.columns.truncate(1);
            let mut frame = timeseries::block_to_frame(&block)?;
            self.write_warehouse(role, &mut frame)?;
        }
        Ok(())
    }

    /// Classify every (day, period) of the smoothed irradiance channels.
    pub fn generate_classification(&self) -> Result<(), PipelineError> {
        info!(plant = self.plant, "classifying sensors");
        let gti = self.read_warehouse("gti_avg")?;
        let ghi = self.read_warehouse("ghi_avg")?;
        let clearsky = self.read_warehouse("clearsky")?;

        let days = timeseries::day_range(&gti)?;
        let day_rows = try_par_map(&days, |&day| {
            let gti_day = timeseries::frame_to_block(&timeseries::day_slice(&gti, day)?)?;
            let ghi_day = timeseries::frame_to_block(&timeseries::day_slice(&ghi, day)?)?;
            let clearsky_day = clearsky_curve_for_day(&clearsky, day)?;
            let limits = calculate_period_limits(&clearsky_day)?;
            classify_day(&gti_day, &ghi_day, &limits, &self.config.filters)
        })?;

        let mut sensor_columns: Vec<String> = non_timestamp_columns(&gti);
        sensor_columns.extend(non_timestamp_columns(&ghi));
        let rows: Vec<PeriodClassification> = day_rows.into_iter().flatten().collect();
        let mut frame = classification_frame(rows, &sensor_columns)?;
        self.write_warehouse("classification", &mut frame)
    }

    /// Median of the fully-available sensors, per day and window.
    pub fn generate_theoretical_irradiance(&self, avg: bool) -> Result<(), PipelineError> {
        let status = if avg { "avg" } else { "original" };
        info!(plant = self.plant, status, "deriving theoretical irradiance");
        let gti = self.read_warehouse(&format!("gti_{status}"))?;
        let classification = self.read_warehouse("classification")?;
        let class_rows = gti_rows(&frame_to_rows(&classification)?);

        let days = timeseries::day_range(&gti)?;
        let day_curves = try_par_map(&days, |&day| {
            let gti_day = timeseries::frame_to_block(&timeseries::day_slice(&gti, day)?)?;
            let rows: Vec<PeriodClassification> = class_rows
                .iter()
                .filter(|row| row.timestamp >= day && row.timestamp < day + DAY_SECONDS)
                .cloned()
                .collect();
            Ok(theoretical_irradiance_day(&gti_day, &rows))
        })?;

        let curve: Vec<(i64, f64)> = day_curves.into_iter().flatten().collect();
        let mut frame = df![
            TIMESTAMP_COL => curve.iter().map(|&(ts, _)| ts).collect::<Vec<i64>>(),
            THEORETICAL_GTI_COL => curve.iter().map(|&(_, v)| v).collect::<Vec<f64>>(),
        ]?;
        self.write_warehouse(&format!("teoric_irradiance_{status}"), &mut frame)
    }

    /// Nominal AC power from the theoretical irradiance.
    pub fn generate_theoretical_power(&self, avg: bool) -> Result<(), PipelineError> {
        let status = if avg { "avg" } else { "original" };
        info!(plant = self.plant, status, "simulating theoretical power");
        let irradiance = self.read_warehouse(&format!("teoric_irradiance_{status}"))?;
        let wind = self.read_warehouse_optional("wind_speed")?;
        let temp = self.read_warehouse_optional("amb_temp")?;

        let conditions = build_conditions(
            &irradiance,
            THEORETICAL_GTI_COL,
            wind.as_ref(),
            temp.as_ref(),
        )?;
        let pac = self
            .power_model
            .simulate(&conditions, IrradianceSource::Gti, None)?;

        let mut frame = df![
            TIMESTAMP_COL => conditions.timestamps.clone(),
            THEORETICAL_POWER_COL => pac,
        ]?;
        self.write_warehouse(&format!("teoric_power_{status}"), &mut frame)
    }

    /// Stuck-tracker power family; resumable per angle.
    pub fn generate_stopped_trackers_power(&self) -> Result<(), PipelineError> {
        info!(plant = self.plant, "sweeping stuck-tracker angles");
        let ghi = self.read_warehouse("ghi_avg")?;
        let wind = self.read_warehouse_optional("wind_speed")?;
        let temp = self.read_warehouse_optional("amb_temp")?;

        let conditions = build_conditions(&ghi, GHI_COL, wind.as_ref(), temp.as_ref())?;
        let path = self.config.warehouse_path(self.plant, "stopped_trackers_power")?;
        let existing = timeseries::read_frame_optional(path)?;
        sweep_stuck_angles(
            self.power_model.as_ref(),
            &conditions,
            &self.config.angle_sweep.angles(),
            self.config.n_strings,
            existing,
            path,
        )?;
        Ok(())
    }

    /// CSI-gated daily loss table over the stuck-angle family.
    pub fn generate_loss_table(&self) -> Result<(), PipelineError> {
        info!(plant = self.plant, "building loss table");
        let ghi = self.read_warehouse("ghi_avg")?;
        let classification = self.read_warehouse("classification")?;
        let clearsky = self.read_warehouse("clearsky")?;
        let theoretical_power = self.read_warehouse("teoric_power_avg")?;
        let stuck_power = self.read_warehouse("stopped_trackers_power")?;

        let class_rows = frame_to_rows(&classification)?;
        let days = timeseries::day_range(&theoretical_power)?;

        let day_rows = try_par_map(&days, |&day| {
            let ghi_day = timeseries::frame_to_block(&timeseries::day_slice(&ghi, day)?)?;
            let clearsky_day =
                timeseries::frame_to_block(&timeseries::day_slice(&clearsky, day)?)?;
            let stuck_day =
                timeseries::frame_to_block(&timeseries::day_slice(&stuck_power, day)?)?;
            let power_day = timeseries::frame_to_block(&timeseries::day_slice(
                &theoretical_power,
                day,
            )?)?;
            let power_values = power_day
                .column(THEORETICAL_POWER_COL)
                .map(<[f64]>::to_vec)
                .unwrap_or_default();

            let rows_of_day: Vec<PeriodClassification> = class_rows
                .iter()
                .filter(|row| row.timestamp >= day && row.timestamp < day + DAY_SECONDS)
                .cloned()
                .collect();
            let ghi_labels: Vec<_> = rows_of_day
                .iter()
                .filter_map(|row| {
                    row.labels
                        .iter()
                        .find(|(name, _)| name == GHI_COL)
                        .map(|(_, status)| *status)
                })
                .collect();

            let csi = day_csi(&ghi_day, &ghi_labels, &clearsky_day);
            Ok(day_loss(
                day,
                csi,
                &gti_rows(&rows_of_day),
                &power_values,
                &stuck_day,
            ))
        })?;

        let rows: Vec<LossRow> = day_rows.into_iter().flatten().flatten().collect();
        info!(plant = self.plant, rows = rows.len(), "loss table rows");
        let mut frame = loss_table_frame(rows)?;
        self.write_warehouse("loss_table", &mut frame)
    }

    /// Equation-driven unavailability losses; skipped when the profile
    /// artifact was never exported.
    pub fn generate_unavailability_loss(&self) -> Result<(), PipelineError> {
        let path = self.config.datalake_path(self.plant, "unavailability_profile")?;
        let Some(profile) = timeseries::read_frame_optional(path)? else {
            warn!(
                plant = self.plant,
                "unavailability profile absent, skipping stage"
            );
            return Ok(());
        };
        info!(plant = self.plant, "computing unavailability losses");
        let loss_table = self.read_warehouse("loss_table")?;
        let equation = Equation::parse(&self.config.unavailability_equation)?;
        let rows = unavailability_losses(&profile, &loss_table, &equation)?;
        let mut frame = unavailability_frame(&rows)?;
        self.write_warehouse("loss_due_to_unavailability", &mut frame)
    }

    fn read_warehouse_optional(&self, role: &str) -> Result<Option<DataFrame>, PipelineError> {
        let path = self.config.warehouse_path(self.plant, role)?;
        timeseries::read_frame_optional(path)
    }
}

fn non_timestamp_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .filter(|name| *name != TIMESTAMP_COL)
        .map(str::to_string)
        .collect()
}

/// Strip the GHI reference column out of classification rows, leaving
/// only GTI sensor labels.
fn gti_rows(rows: &[PeriodClassification]) -> Vec<PeriodClassification> {
    rows.iter()
        .map(|row| PeriodClassification {
            timestamp: row.timestamp,
            labels: row
                .labels
                .iter()
                .filter(|(name, _)| name != GHI_COL)
                .cloned()
                .collect(),
        })
        .collect()
}

fn clearsky_curve_for_day(
    clearsky: &DataFrame,
    day: i64,
) -> Result<Vec<(i64, f64)>, PipelineError> {
    let block = timeseries::frame_to_block(&timeseries::day_slice(clearsky, day)?)?;
    let values = block.column(CLEARSKY_COL).unwrap_or(&[]);
    Ok(block
        .timestamps
        .iter()
        .copied()
        .zip(values.iter().copied())
        .collect())
}

fn concat_frames(frames: Vec<DataFrame>) -> Result<DataFrame, PipelineError> {
    let mut iter = frames.into_iter();
    let mut merged = iter.next().ok_or(PipelineError::EmptyArtifact {
        role: "clearsky".to_string(),
    })?;
    for frame in iter {
        merged.vstack_mut(&frame)?;
    }
    Ok(merged)
}

/// Concatenate same-schema day blocks in day order.
fn concat_blocks(blocks: Vec<SensorBlock>) -> SensorBlock {
    let mut iter = blocks.into_iter();
    let Some(mut merged) = iter.next() else {
        return SensorBlock::default();
    };
    for block in iter {
        merged.timestamps.extend(block.timestamps);
        for (target, source) in merged.columns.iter_mut().zip(block.columns) {
            target.1.extend(source.1);
        }
    }
    merged
}

/// Warehouse channel column names: pyranometer letters for GTI, the
/// fixed reference names otherwise.
fn rename_channel_columns(block: &mut SensorBlock, role: &str) {
    match role {
        "gti" => {
            for (i, (name, _)) in block.columns.iter_mut().enumerate() {
                *name = pyranometer_name(i);
            }
        }
        "ghi" => {
            if let Some((name, _)) = block.columns.first_mut() {
                *name = GHI_COL.to_string();
            }
            block.columns.truncate(1);
        }
        "ca_power" => {
            if let Some((name, _)) = block.columns.first_mut() {
                *name = AC_POWER_COL.to_string();
            }
            block.columns.truncate(1);
        }
        _ => {}
    }
}

fn pyranometer_name(index: usize) -> String {
    if index < 26 {
        format!("Pyranometer {}", char::from(b'A' + index as u8))
    } else {
        format!("Pyranometer {}", index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::Status;
    use crate::clearsky::NoaaClearSky;
    use crate::config::{Location, PlantConfig, PlantsConfig, PowerModelParams};
    use crate::loss::{ANGLE_COL, CSI_COL, DATE_COL};
    use std::collections::BTreeMap;
    use std::path::Path;

    // Two local days in May 2021.
    const DAY0: i64 = 1_620_000_000 - 1_620_000_000 % DAY_SECONDS;

    fn location() -> Location {
        Location {
            latitude: -17.22129,
            longitude: -47.08851,
            tz: "Brazil/East".to_string(),
            utc_offset_hours: -3.0,
            altitude: 698.7,
        }
    }

    fn plant_config(root: &Path) -> PlantConfig {
        let lake = |name: &str| root.join("datalake").join(name);
        let wh = |name: &str| root.join("warehouse").join(name);

        let mut datalake = BTreeMap::new();
        for role in [
            "gti",
            "ghi",
            "ca_power",
            "wind_speed",
            "amb_temp",
            "unavailability_profile",
        ] {
            datalake.insert(role.to_string(), lake(&format!("{role}.parquet")));
        }
        let mut warehouse = BTreeMap::new();
        for role in [
            "clearsky",
            "gti_avg",
            "gti_original",
            "ghi_avg",
            "ghi_original",
            "ca_power_avg",
            "ca_power_original",
            "wind_speed",
            "amb_temp",
            "classification",
            "teoric_irradiance_avg",
            "teoric_irradiance_original",
            "teoric_power_avg",
            "teoric_power_original",
            "stopped_trackers_power",
            "loss_table",
            "loss_due_to_unavailability",
        ] {
            warehouse.insert(role.to_string(), wh(&format!("{role}.parquet")));
        }

        PlantConfig {
            location: location(),
            n_strings: 180,
            unavailability_equation: "(1 - CSI) * 10 + 0.001 * angle ^ 2".to_string(),
            power_model: PowerModelParams {
                pdc0_w: 5.0e6,
                pac0_w: 4.5e6,
                gamma_pdc: -0.004,
                u0: 25.0,
                u1: 6.84,
                inverter_efficiency: 0.96,
                rotation_limit_deg: 60.0,
            },
            filters: Default::default(),
            angle_sweep: crate::config::AngleSweep {
                begin: -10,
                end: 10,
                step: 5,
            },
            datalake,
            warehouse,
        }
    }

    /// Synthesize a two-day datalake: GHI tracks the oracle's clear-sky
    /// curve, three GTI sensors track 1.2x it, constant weather.
    fn seed_datalake(config: &PlantConfig) {
        let oracle = NoaaClearSky::new(&config.location);
        let mut timestamps = Vec::new();
        let mut ghi = Vec::new();
        for day in [DAY0, DAY0 + DAY_SECONDS] {
            for (ts, value) in oracle.ghi_curve(day).unwrap() {
                timestamps.push(ts);
                ghi.push(value);
            }
        }
        let gti: Vec<f64> = ghi.iter().map(|v| v * 1.2).collect();

        let write = |role: &str, df: &mut DataFrame| {
            timeseries::write_frame(df, &config.datalake[role]).unwrap();
        };

        let mut gti_df = df![
            TIMESTAMP_COL => timestamps.clone(),
            "raw_gti_1" => gti.clone(),
            "raw_gti_2" => gti.clone(),
            "raw_gti_3" => gti.clone(),
        ]
        .unwrap();
        write("gti", &mut gti_df);

        let mut ghi_df = df![
            TIMESTAMP_COL => timestamps.clone(),
            "raw_ghi" => ghi.clone(),
        ]
        .unwrap();
        write("ghi", &mut ghi_df);

        let mut ca_df = df![
            TIMESTAMP_COL => timestamps.clone(),
            "raw_ca" => gti.iter().map(|v| v * 4000.0).collect::<Vec<f64>>(),
        ]
        .unwrap();
        write("ca_power", &mut ca_df);

        let n = timestamps.len();
        let mut wind_df = df![
            TIMESTAMP_COL => timestamps.clone(),
            "raw_wind" => vec![2.0; n],
        ]
        .unwrap();
        write("wind_speed", &mut wind_df);

        let mut temp_df = df![
            TIMESTAMP_COL => timestamps.clone(),
            "raw_temp" => vec![25.0; n],
        ]
        .unwrap();
        write("amb_temp", &mut temp_df);

        let mut profile_df = df![
            DATE_COL => &[DAY0, DAY0 + DAY_SECONDS],
            crate::unavailability::MEAN_ANGLE_COL => &[15.0, -30.0],
            crate::unavailability::UNAVAILABILITY_COL => &[10.0, 20.0],
        ]
        .unwrap();
        write("unavailability_profile", &mut profile_df);
    }

    #[test]
    fn test_full_run_populates_warehouse() {
        let dir = tempfile::tempdir().unwrap();
        let config = plant_config(dir.path());
        seed_datalake(&config);

        let pipeline = PlantPipeline::new("Apolo", &config);
        pipeline.run().unwrap();

        // Every derived artifact exists.
        for (role, path) in &config.warehouse {
            assert!(path.exists(), "missing warehouse artifact {role}");
        }

        // Clear-sky artifact covers both days on the 10-minute grid.
        let clearsky = timeseries::read_frame(&config.warehouse["clearsky"], "clearsky").unwrap();
        assert_eq!(clearsky.height(), 288);

        // Channel renaming took effect.
        let gti_avg = timeseries::read_frame(&config.warehouse["gti_avg"], "gti_avg").unwrap();
        assert!(gti_avg.column("Pyranometer A").is_ok());
        assert!(gti_avg.column("Pyranometer C").is_ok());

        // Classification is total and uses the enumerated labels only.
        let classification =
            timeseries::read_frame(&config.warehouse["classification"], "classification").unwrap();
        assert_eq!(classification.height(), 4); // 2 days x 2 periods
        let rows = frame_to_rows(&classification).unwrap();
        for row in &rows {
            assert_eq!(row.labels.len(), 4); // 3 pyranometers + GHI
        }
        // Clean synthetic data: everything classified available.
        assert!(rows.iter().all(|row| row
            .labels
            .iter()
            .all(|(_, status)| *status == Status::Disponivel)));

        // Theoretical irradiance is the cross-sensor median (all equal).
        let teoric =
            timeseries::read_frame(&config.warehouse["teoric_irradiance_avg"], "t").unwrap();
        assert_eq!(teoric.height(), 288);

        // Loss table: both days pass the CSI gate, 5 angles each.
        let loss =
            timeseries::read_frame(&config.warehouse["loss_table"], "loss_table").unwrap();
        assert_eq!(loss.height(), 2 * 5);
        let csi: Vec<f64> = loss
            .column(CSI_COL)
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert!(csi.iter().all(|&c| c > 0.8 && c <= 1.0), "csi {csi:?}");
        let angles: Vec<i64> = loss
            .column(ANGLE_COL)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(&angles[..5], &[-10, -5, 0, 5, 10]);

        // Unavailability losses joined both profile days.
        let unavailability = timeseries::read_frame(
            &config.warehouse["loss_due_to_unavailability"],
            "loss_due_to_unavailability",
        )
        .unwrap();
        assert_eq!(unavailability.height(), 2);
    }

    #[test]
    fn test_stage_failure_leaves_no_downstream_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let config = plant_config(dir.path());
        // No datalake at all: the first stage fails with MissingArtifact.
        let pipeline = PlantPipeline::new("Apolo", &config);
        match pipeline.run() {
            Err(PipelineError::MissingArtifact { role, .. }) => assert_eq!(role, "ghi"),
            other => panic!("expected MissingArtifact, got {other:?}"),
        }
        assert!(!config.warehouse["clearsky"].exists());
    }

    #[test]
    fn test_missing_optional_channel_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = plant_config(dir.path());
        seed_datalake(&config);
        // Remove the optional AC-power channel.
        std::fs::remove_file(&config.datalake["ca_power"]).unwrap();

        let pipeline = PlantPipeline::new("Apolo", &config);
        pipeline.generate_clearsky().unwrap();
        pipeline.generate_channels(true).unwrap();
        assert!(config.warehouse["gti_avg"].exists());
        assert!(!config.warehouse["ca_power_avg"].exists());
    }

    #[test]
    fn test_angle_sweep_is_resumable() {
        let dir = tempfile::tempdir().unwrap();
        let config = plant_config(dir.path());
        seed_datalake(&config);

        let pipeline = PlantPipeline::new("Apolo", &config);
        pipeline.generate_clearsky().unwrap();
        pipeline.generate_channels(true).unwrap();
        pipeline.generate_weather().unwrap();
        pipeline.generate_stopped_trackers_power().unwrap();

        let first = timeseries::read_frame(
            &config.warehouse["stopped_trackers_power"],
            "stopped_trackers_power",
        )
        .unwrap();
        let first_block = timeseries::frame_to_block(&first).unwrap();

        // Rerun: existing columns must not be recomputed or altered.
        pipeline.generate_stopped_trackers_power().unwrap();
        let second = timeseries::read_frame(
            &config.warehouse["stopped_trackers_power"],
            "stopped_trackers_power",
        )
        .unwrap();
        let second_block = timeseries::frame_to_block(&second).unwrap();
        for (name, values) in &first_block.columns {
            assert_eq!(second_block.column(name).unwrap(), values.as_slice());
        }
    }

    #[test]
    fn test_config_object_is_injected_not_global() {
        // Two pipelines over two distinct configs coexist; nothing is
        // process-wide.
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let config_a = plant_config(dir_a.path());
        let mut config_b = plant_config(dir_b.path());
        config_b.n_strings = 90;

        let plants = PlantsConfig {
            plants: BTreeMap::from([
                ("A".to_string(), config_a),
                ("B".to_string(), config_b),
            ]),
        };
        assert_eq!(plants.plant("A").unwrap().n_strings, 180);
        assert_eq!(plants.plant("B").unwrap().n_strings, 90);
    }
}

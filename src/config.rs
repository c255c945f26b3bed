use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;

/// Geographic location of a plant. Timestamps in every artifact are
/// plant-local naive epoch seconds; `utc_offset_hours` is what the solar
/// geometry uses to get back to true solar time.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// IANA label, informational only (e.g. "Brazil/East").
    pub tz: String,
    pub utc_offset_hours: f64,
    pub altitude: f64,
}

/// Which cross-sensor reference check the outlier filter runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "variant")]
pub enum ReferenceRejection {
    /// Drop sensors whose period sum falls more than `threshold` below
    /// the cross-sensor mean sum.
    MeanSumDeficit { threshold: f64 },
    /// Drop sensors whose max pointwise distance from the cross-sensor
    /// median exceeds `threshold`.
    MedianMaxDistance { threshold: f64 },
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FilterParams {
    /// Consecutive identical samples within the GHI-valid window that
    /// mark a sensor as frozen.
    #[serde(default = "default_flat_run_len")]
    pub flat_run_len: usize,
    /// Ceiling on the value-weighted standard deviation of minute-of-day.
    #[serde(default = "default_weighted_std_threshold")]
    pub weighted_std_threshold: f64,
    #[serde(default = "default_reference_rejection")]
    pub reference: ReferenceRejection,
}

fn default_flat_run_len() -> usize {
    7
}

fn default_weighted_std_threshold() -> f64 {
    130.0
}

fn default_reference_rejection() -> ReferenceRejection {
    ReferenceRejection::MeanSumDeficit { threshold: 5e3 }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            flat_run_len: default_flat_run_len(),
            weighted_std_threshold: default_weighted_std_threshold(),
            reference: default_reference_rejection(),
        }
    }
}

/// Parameters of the default PV array model (see `power.rs`).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PowerModelParams {
    /// Array nameplate DC power at STC, watts.
    pub pdc0_w: f64,
    /// Inverter AC ceiling, watts.
    pub pac0_w: f64,
    #[serde(default = "default_gamma_pdc")]
    pub gamma_pdc: f64,
    #[serde(default = "default_u0")]
    pub u0: f64,
    #[serde(default = "default_u1")]
    pub u1: f64,
    #[serde(default = "default_inverter_efficiency")]
    pub inverter_efficiency: f64,
    #[serde(default = "default_rotation_limit_deg")]
    pub rotation_limit_deg: f64,
}

fn default_gamma_pdc() -> f64 {
    -0.004
}

fn default_u0() -> f64 {
    25.0
}

fn default_u1() -> f64 {
    6.84
}

fn default_inverter_efficiency() -> f64 {
    0.96
}

fn default_rotation_limit_deg() -> f64 {
    60.0
}

/// Stuck-angle sweep bounds, degrees.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AngleSweep {
    #[serde(default = "default_begin_angle")]
    pub begin: i32,
    #[serde(default = "default_end_angle")]
    pub end: i32,
    #[serde(default = "default_angle_step")]
    pub step: i32,
}

fn default_begin_angle() -> i32 {
    -60
}

fn default_end_angle() -> i32 {
    60
}

fn default_angle_step() -> i32 {
    5
}

impl Default for AngleSweep {
    fn default() -> Self {
        Self {
            begin: default_begin_angle(),
            end: default_end_angle(),
            step: default_angle_step(),
        }
    }
}

impl AngleSweep {
    pub fn angles(&self) -> Vec<i32> {
        let mut angles = Vec::new();
        let mut angle = self.begin;
        while angle <= self.end {
            angles.push(angle);
            angle += self.step.max(1);
        }
        angles
    }
}

/// One plant's static record. Immutable at pipeline runtime; loaded once
/// and passed by reference to every component.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlantConfig {
    pub location: Location,
    /// Tracker string count; the stuck-angle hypothesis freezes all of
    /// them at the swept angle.
    pub n_strings: u32,
    /// Restricted expression in `CSI` and `angle` (see `equation.rs`).
    pub unavailability_equation: String,
    pub power_model: PowerModelParams,
    #[serde(default)]
    pub filters: FilterParams,
    #[serde(default)]
    pub angle_sweep: AngleSweep,
    /// Raw artifact paths by role: gti, ghi, ca_power, wind_speed,
    /// amb_temp, unavailability_profile.
    pub datalake: BTreeMap<String, PathBuf>,
    /// Derived artifact paths by role: clearsky, gti_avg, ...,
    /// loss_table, loss_due_to_unavailability.
    pub warehouse: BTreeMap<String, PathBuf>,
}

impl PlantConfig {
    pub fn datalake_path(&self, plant: &str, role: &str) -> Result<&Path, ConfigError> {
        self.datalake
            .get(role)
            .map(PathBuf::as_path)
            .ok_or_else(|| ConfigError::MissingRole {
                plant: plant.to_string(),
                role: role.to_string(),
            })
    }

    pub fn warehouse_path(&self, plant: &str, role: &str) -> Result<&Path, ConfigError> {
        self.warehouse
            .get(role)
            .map(PathBuf::as_path)
            .ok_or_else(|| ConfigError::MissingRole {
                plant: plant.to_string(),
                role: role.to_string(),
            })
    }
}

/// Top-level configuration file: plant name -> record.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PlantsConfig {
    pub plants: BTreeMap<String, PlantConfig>,
}

impl PlantsConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|source| ConfigError::JsonParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn plant(&self, name: &str) -> Result<&PlantConfig, ConfigError> {
        self.plants
            .get(name)
            .ok_or_else(|| ConfigError::UnknownPlant(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "plants": {
                "Apolo": {
                    "location": {
                        "latitude": -17.22129,
                        "longitude": -47.08851,
                        "tz": "Brazil/East",
                        "utc_offset_hours": -3.0,
                        "altitude": 698.7
                    },
                    "n_strings": 180,
                    "unavailability_equation": "(1 - CSI) * 10 + 0.001 * angle ^ 2",
                    "power_model": { "pdc0_w": 5.0e6, "pac0_w": 4.5e6 },
                    "datalake": { "gti": "/data/lake/apolo/gti.parquet" },
                    "warehouse": { "clearsky": "/data/wh/apolo/clearsky.parquet" }
                }
            }
        }"#
    }

    #[test]
    fn test_parse_plant_record() {
        let config: PlantsConfig = serde_json::from_str(sample_json()).unwrap();
        let plant = config.plant("Apolo").unwrap();
        assert_eq!(plant.n_strings, 180);
        assert_eq!(plant.location.utc_offset_hours, -3.0);
        // Tunables fall back to the canonical defaults.
        assert_eq!(plant.filters.flat_run_len, 7);
        assert_eq!(plant.filters.weighted_std_threshold, 130.0);
        assert_eq!(
            plant.filters.reference,
            ReferenceRejection::MeanSumDeficit { threshold: 5e3 }
        );
        assert_eq!(plant.angle_sweep.angles().len(), 25);
    }

    #[test]
    fn test_unknown_plant_is_an_error() {
        let config: PlantsConfig = serde_json::from_str(sample_json()).unwrap();
        assert!(config.plant("Helios").is_err());
    }

    #[test]
    fn test_missing_role_is_an_error() {
        let config: PlantsConfig = serde_json::from_str(sample_json()).unwrap();
        let plant = config.plant("Apolo").unwrap();
        assert!(plant.warehouse_path("Apolo", "loss_table").is_err());
        assert!(plant.datalake_path("Apolo", "gti").is_ok());
    }

    #[test]
    fn test_angle_sweep_bounds() {
        let sweep = AngleSweep::default();
        let angles = sweep.angles();
        assert_eq!(angles.first(), Some(&-60));
        assert_eq!(angles.last(), Some(&60));
        assert!(angles.windows(2).all(|w| w[1] - w[0] == 5));
    }
}

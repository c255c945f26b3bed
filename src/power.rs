//! PV power simulation boundary.
//!
//! The pipeline treats the plant model as opaque: weather conditions in,
//! AC power series out, optionally under a stuck-tracker fault
//! hypothesis. `PvArrayModel` is the default implementation — a compact
//! single-axis-tracker array with Faiman cell temperature and a linear
//! DC derating feeding a clipped inverter.

use crate::clearsky::SolarGeometry;
use crate::config::{Location, PowerModelParams};
use crate::errors::PipelineError;

/// Which plane the input irradiance was measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrradianceSource {
    /// Plane-of-array of the tracking trackers.
    Gti,
    /// Horizontal.
    Ghi,
}

/// Hypothesis that `n_strings` tracker strings are frozen at
/// `angle_deg` of rotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultTracker {
    pub n_strings: u32,
    pub angle_deg: f64,
}

/// Timestamp-aligned weather inputs of one simulation run.
#[derive(Debug, Clone, Default)]
pub struct Conditions {
    pub timestamps: Vec<i64>,
    pub irradiance: Vec<f64>,
    pub wind_speed: Vec<f64>,
    pub air_temp: Vec<f64>,
}

/// External collaborator boundary for AC-power simulation.
pub trait PowerModel: Sync {
    fn simulate(
        &self,
        conditions: &Conditions,
        source: IrradianceSource,
        fault: Option<FaultTracker>,
    ) -> Result<Vec<f64>, PipelineError>;
}

/// Geometry ratios saturate near the horizon; floor the divisors there.
const MIN_PLANE_FACTOR: f64 = 0.087;
const MAX_TRANSPOSITION: f64 = 2.5;
const STC_IRRADIANCE: f64 = 1000.0;
const STC_CELL_TEMP: f64 = 25.0;

#[derive(Debug, Clone)]
pub struct PvArrayModel {
    geometry: SolarGeometry,
    params: PowerModelParams,
    n_strings: u32,
}

impl PvArrayModel {
    pub fn new(location: &Location, params: PowerModelParams, n_strings: u32) -> Self {
        Self {
            geometry: SolarGeometry::from_location(location),
            params,
            n_strings,
        }
    }

    /// Ideal rotation of a horizontal N-S single-axis tracker: the sun's
    /// east-west angle from the vertical. Positive toward east.
    fn sun_rotation_deg(elevation_deg: f64, azimuth_deg: f64) -> f64 {
        let el = elevation_deg.to_radians();
        let az = azimuth_deg.to_radians();
        (el.cos() * az.sin()).atan2(el.sin()).to_degrees()
    }

    /// One string's AC power for a plane-of-array irradiance sample.
    fn string_power(&self, poa: f64, wind: f64, air_temp: f64) -> f64 {
        if poa <= 0.0 {
            return 0.0;
        }
        let cell_temp = air_temp + poa / (self.params.u0 + self.params.u1 * wind.max(0.0));
        let dc = self.params.pdc0_w * (poa / STC_IRRADIANCE)
            * (1.0 + self.params.gamma_pdc * (cell_temp - STC_CELL_TEMP));
        (dc * self.params.inverter_efficiency)
            .min(self.params.pac0_w)
            .max(0.0)
    }
}

impl PowerModel for PvArrayModel {
    fn simulate(
        &self,
        conditions: &Conditions,
        source: IrradianceSource,
        fault: Option<FaultTracker>,
    ) -> Result<Vec<f64>, PipelineError> {
        let mut pac = Vec::with_capacity(conditions.timestamps.len());
        let stuck_fraction = fault
            .map(|f| (f.n_strings as f64 / self.n_strings.max(1) as f64).min(1.0))
            .unwrap_or(0.0);

        for (i, &ts) in conditions.timestamps.iter().enumerate() {
            let g = conditions.irradiance.get(i).copied().unwrap_or(0.0);
            let wind = conditions.wind_speed.get(i).copied().unwrap_or(0.0);
            let air_temp = conditions.air_temp.get(i).copied().unwrap_or(STC_CELL_TEMP);

            let position = self.geometry.position(ts)?;
            if g <= 0.0 || !position.is_above_horizon() {
                pac.push(0.0);
                continue;
            }

            let sun_rotation = Self::sun_rotation_deg(position.elevation_deg, position.azimuth_deg);
            let limit = self.params.rotation_limit_deg;
            let tracking_rotation = sun_rotation.clamp(-limit, limit);

            let track_factor = (sun_rotation - tracking_rotation)
                .to_radians()
                .cos()
                .max(MIN_PLANE_FACTOR);
            let horizontal_factor = position
                .elevation_deg
                .to_radians()
                .sin()
                .max(MIN_PLANE_FACTOR);

            let poa_track = match source {
                IrradianceSource::Gti => g,
                IrradianceSource::Ghi => {
                    (g * track_factor / horizontal_factor).min(g * MAX_TRANSPOSITION)
                }
            };

            let power_track = self.string_power(poa_track, wind, air_temp);

            let power = if let Some(fault) = fault {
                let stuck_factor = (sun_rotation - fault.angle_deg).to_radians().cos().max(0.0);
                let poa_stuck = match source {
                    IrradianceSource::Gti => {
                        (g * stuck_factor / track_factor).min(g * MAX_TRANSPOSITION)
                    }
                    IrradianceSource::Ghi => {
                        (g * stuck_factor / horizontal_factor).min(g * MAX_TRANSPOSITION)
                    }
                };
                let power_stuck = self.string_power(poa_stuck, wind, air_temp);
                (1.0 - stuck_fraction) * power_track + stuck_fraction * power_stuck
            } else {
                power_track
            };

            pac.push(power);
        }
        Ok(pac)
    }
}

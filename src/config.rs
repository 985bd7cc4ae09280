//! Runtime parameters (`Par` in the reference program), loaded from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const MAX_N_SECTORS: u32 = 720;
pub const MAX_SIZE_ISOC: usize = 4096;
pub const LIMIT_FOCAL_SHIFT: usize = 50;
pub const THRESHOLD_SECTOR: usize = 5;
pub const MAX_UNREACHABLE: u32 = 380;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub start_time_in_hours: f64,
    pub t_step: f64,
    pub cog_step: f64,
    pub range_cog: f64,
    pub n_sectors: u32,
    pub j_factor: f64,
    pub k_factor: u8,
    pub penalty0: f64,
    pub penalty1: f64,
    pub penalty2: f64,
    pub motor_speed: f64,
    pub threshold: f64,
    pub day_efficiency: f64,
    pub night_efficiency: f64,
    pub x_wind: f64,
    pub max_wind: f64,
    pub with_waves: bool,
    pub with_current: bool,
    pub allways_sea: bool,
    pub const_wind_twd: Option<f64>,
    pub const_wind_tws: Option<f64>,
    pub const_current_d: Option<f64>,
    pub const_current_s: Option<f64>,
    pub stamina_vr: f64,
    pub opt: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            start_time_in_hours: 0.0,
            t_step: 3.0,
            cog_step: 3.0,
            range_cog: 90.0,
            n_sectors: 300,
            j_factor: 0.0,
            k_factor: 3,
            penalty0: 60.0,
            penalty1: 60.0,
            penalty2: 300.0,
            motor_speed: 0.0,
            threshold: 1.0,
            day_efficiency: 1.0,
            night_efficiency: 1.0,
            x_wind: 1.0,
            max_wind: 50.0,
            with_waves: false,
            with_current: false,
            allways_sea: false,
            const_wind_twd: None,
            const_wind_tws: None,
            const_current_d: None,
            const_current_s: None,
            stamina_vr: 100.0,
            opt: 1,
        }
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validates the fields that can make a run meaningless before any
    /// expansion is attempted, per the reference program's pre-flight checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.t_step < 0.25 {
            return Err(ConfigError::InvalidValue {
                field: "t_step",
                reason: "must be >= 0.25 hours".into(),
            });
        }
        if self.n_sectors == 0 || self.n_sectors > MAX_N_SECTORS {
            return Err(ConfigError::InvalidValue {
                field: "n_sectors",
                reason: format!("must be in 1..={MAX_N_SECTORS}"),
            });
        }
        if self.cog_step <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "cog_step",
                reason: "must be > 0".into(),
            });
        }
        if self.k_factor > 4 {
            return Err(ConfigError::InvalidValue {
                field: "k_factor",
                reason: "must be in 0..=4".into(),
            });
        }
        Ok(())
    }

    pub fn step_theta(&self) -> f64 {
        360.0 / self.n_sectors as f64
    }

    pub fn effective_n_sectors(&self, isoc_index: usize) -> u32 {
        if isoc_index < THRESHOLD_SECTOR {
            180
        } else {
            self.n_sectors
        }
    }
}

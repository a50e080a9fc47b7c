//! Shared configuration logic for the thermal core, the host and tests.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [thermal]
//! bed_count = 2
//! tolerance = 3
//! units = "celsius"
//!
//! [wait]
//! poll_interval_ms = 100
//!
//! [sampling]
//! thermistor = "133"
//!
//! [[presets]]
//! name = "PLA"
//! bed_temp = 60
//! ```
//!
//! Every section is optional; missing keys fall back to the `default_*`
//! functions at the bottom of this file.

use crate::Celsius;
use crate::thermistor::{TempEntry, ThermistorError, ThermistorTable};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on independently addressable beds.
pub const MAX_BEDS: usize = 8;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Thermistor table error: {0}")]
    Thermistor(#[from] ThermistorError),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub thermal: ThermalConfig,
    #[serde(default)]
    pub wait: WaitConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub presets: Vec<MaterialPreset>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThermalConfig {
    #[serde(default = "default_bed_count")]
    pub bed_count: usize,
    /// Allowed distance from target, in degrees, for a bed to count as "near".
    #[serde(default = "default_tolerance")]
    pub tolerance: Celsius,
    /// Targets below this are treated as "off" and are always satisfied.
    #[serde(default = "default_min_meaningful_temp")]
    pub min_meaningful_temp: Celsius,
    #[serde(default = "default_ambient")]
    pub ambient: Celsius,
    #[serde(default)]
    pub units: TemperatureUnit,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_true")]
    pub job_timer_autostart: bool,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            bed_count: default_bed_count(),
            tolerance: default_tolerance(),
            min_meaningful_temp: default_min_meaningful_temp(),
            ambient: default_ambient(),
            units: TemperatureUnit::default(),
            dry_run: false,
            job_timer_autostart: default_true(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WaitConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_report_interval_ms")]
    pub report_interval_ms: u64,
    /// How long the bed must stay near target before a wait completes.
    #[serde(default)]
    pub residency_ms: u64,
}

impl WaitConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    pub fn residency(&self) -> Duration {
        Duration::from_millis(self.residency_ms)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            report_interval_ms: default_report_interval_ms(),
            residency_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SamplingConfig {
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
    /// Name of a compiled-in table; ignored when `custom_table` is given.
    #[serde(default = "default_thermistor")]
    pub thermistor: String,
    #[serde(default)]
    pub custom_table: Option<Vec<TempEntry>>,
}

impl SamplingConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn table(&self) -> Result<ThermistorTable, ThermistorError> {
        match &self.custom_table {
            Some(entries) => ThermistorTable::new(entries.clone()),
            None => ThermistorTable::builtin(&self.thermistor),
        }
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
            thermistor: default_thermistor(),
            custom_table: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    /// Degrees the simulated bed moves toward its target per sampling tick.
    #[serde(default = "default_step_per_tick")]
    pub step_per_tick: Celsius,
    /// Peak raw-count noise added to each simulated reading.
    #[serde(default)]
    pub noise: u16,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            step_per_tick: default_step_per_tick(),
            noise: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MaterialPreset {
    pub name: String,
    pub bed_temp: Celsius,
}

/// Indexed material presets. Out-of-range indices clamp to the last entry.
#[derive(Debug, Clone, Default)]
pub struct PresetTable {
    presets: Vec<MaterialPreset>,
}

impl PresetTable {
    pub fn new(presets: Vec<MaterialPreset>) -> Self {
        Self { presets }
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn get(&self, index: u8) -> Option<&MaterialPreset> {
        let last = self.presets.len().checked_sub(1)?;
        self.presets.get((index as usize).min(last))
    }

    pub fn bed_temp(&self, index: u8) -> Option<Celsius> {
        self.get(index).map(|p| p.bed_temp)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    /// Convert a command value given in this unit to whole degrees Celsius.
    pub fn to_celsius(self, value: f32) -> Celsius {
        let c = match self {
            Self::Celsius => value,
            Self::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
            Self::Kelvin => value - 273.15,
        };
        // `as` saturates at the i16 bounds
        c.round() as Celsius
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.thermal;
        if t.bed_count == 0 || t.bed_count > MAX_BEDS {
            return Err(ConfigError::Invalid(format!(
                "bed_count must be between 1 and {}, got {}",
                MAX_BEDS, t.bed_count
            )));
        }
        if t.tolerance < 0 {
            return Err(ConfigError::Invalid("tolerance must be >= 0".to_string()));
        }
        if self.wait.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("wait.poll_interval_ms must be > 0".to_string()));
        }
        if self.sampling.period_ms == 0 {
            return Err(ConfigError::Invalid("sampling.period_ms must be > 0".to_string()));
        }
        if self.simulation.step_per_tick <= 0 {
            return Err(ConfigError::Invalid("simulation.step_per_tick must be > 0".to_string()));
        }
        for preset in &self.presets {
            if preset.bed_temp < 0 {
                return Err(ConfigError::Invalid(format!(
                    "preset '{}' has a negative bed temperature",
                    preset.name
                )));
            }
        }
        self.sampling.table()?;
        Ok(())
    }

    pub fn preset_table(&self) -> PresetTable {
        PresetTable::new(self.presets.clone())
    }
}

fn default_bed_count() -> usize { 1 }
fn default_tolerance() -> Celsius { 3 }
fn default_min_meaningful_temp() -> Celsius { 30 }
fn default_ambient() -> Celsius { 25 }
fn default_true() -> bool { true }
fn default_poll_interval_ms() -> u64 { 100 }
fn default_report_interval_ms() -> u64 { 1000 }
fn default_period_ms() -> u64 { 100 }
fn default_thermistor() -> String { "133".to_string() }
fn default_step_per_tick() -> Celsius { 1 }

pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path.display(), e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}

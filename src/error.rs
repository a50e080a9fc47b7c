use thermal_shared::config::ConfigError;
use thermal_shared::ThermistorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ThermalError {
    #[error("Heater index {index} out of range ({count} configured)")]
    Addressing { index: u8, count: usize },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Thermistor table error: {0}")]
    Thermistor(#[from] ThermistorError),
}

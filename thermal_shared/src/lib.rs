// thermal_shared: data, traits and configuration shared by the thermal core, the host and tests

pub mod config;
pub mod hardware_traits;
pub mod print_job;
pub mod thermistor;

pub use hardware_traits::{AdcSource, JobTimer, OperatorChannel};
pub use thermistor::{SensorReading, TempEntry, ThermistorError, ThermistorTable};

/// Whole degrees Celsius, the unit every heater reading and target is kept in.
pub type Celsius = i16;

/// Index of one heated zone (bed 0, bed 1, ...).
///
/// Only meaningful for the store it was resolved against; use
/// `ThermalStore::heater` to turn an operator-supplied index into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeaterId(u8);

impl HeaterId {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// One-based number used in operator-facing text ("Bed 1").
    pub const fn number(self) -> u16 {
        self.0 as u16 + 1
    }
}

impl std::fmt::Display for HeaterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

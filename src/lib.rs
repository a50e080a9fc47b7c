// krusty-thermal: bed temperature control core for the Krusty printer host

pub mod command;
pub mod dispatch;
pub mod error;
pub mod estop;
pub mod gcode;
pub mod sampler;
pub mod sim;
pub mod status;
pub mod store;

pub use command::{Outcome, Selector, TargetRequest, ThermalCommander, WaitMode, WaitSettings};
pub use dispatch::{Dispatcher, StreamEnd};
pub use error::ThermalError;
pub use estop::EmergencyStop;
pub use status::{HeatState, StatusDisplay, StatusMessage, StatusReset};
pub use store::{SENSOR_FAULT, ThermalStore};
pub use thermal_shared;

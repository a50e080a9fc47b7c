// Trait-based interfaces to the collaborators around the thermal core (shared)

use crate::print_job::PrintJobError;
use async_trait::async_trait;

/// Raw analog front end feeding the sampling tick.
pub trait AdcSource: Send {
    /// Called once at the start of every sampling tick, before any `read`.
    fn start_conversion(&mut self) {}

    /// Latest raw sample for `channel`, or `None` when the channel produced nothing.
    fn read(&mut self, channel: usize) -> Option<u16>;
}

/// Operator-visible message sink (serial echo, host console).
#[async_trait]
pub trait OperatorChannel: Send + Sync {
    async fn echo(&self, line: &str);
}

/// Print-job timer driven by heater on/off edges.
pub trait JobTimer: Send {
    fn start(&mut self) -> Result<(), PrintJobError>;
    fn stop(&mut self) -> Result<(), PrintJobError>;
    fn is_running(&self) -> bool;
}

//! Bed target-set and wait protocol (`M140` / `M190`).
//!
//! One request resolves a temperature (preset or explicit), validates the
//! heater address, writes the target(s), updates the status line and the
//! print-job timer, and then either registers a status reset predicate or
//! polls the store until the addressed beds converge.
//!
//! ```text
//! Idle -> Validating -> Applying -> WaitingConvergence -> Done
//!             |                  \-> Registered ------> Done
//!             \-> Done (no temperature given / bad heater index)
//! ```

use crate::error::ThermalError;
use crate::estop::EmergencyStop;
use crate::status::{self, HeatState, StatusDisplay, StatusMessage, StatusReset};
use crate::store::{SENSOR_FAULT, ThermalStore};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thermal_shared::config::{Config, PresetTable};
use thermal_shared::{Celsius, HeaterId, JobTimer, OperatorChannel};
use tokio::time::Instant;

/// Which heaters a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Single(HeaterId),
    All,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(id) => write!(f, "bed {}", id),
            Self::All => write!(f, "all beds"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WaitMode {
    #[default]
    ReturnImmediately,
    /// Wait while heating up; a bed already above target is not waited for.
    HeatingOnly,
    /// Wait until near target in either direction.
    HeatingAndCooling,
}

/// Parameters of one bed temperature command as handed over by the parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetRequest {
    pub preset: Option<u8>,
    pub target: Option<Celsius>,
    pub heater: Option<u8>,
    pub mode: WaitMode,
}

impl TargetRequest {
    pub fn new(mode: WaitMode) -> Self {
        Self { mode, ..Self::default() }
    }

    pub fn target(mut self, celsius: Celsius) -> Self {
        self.target = Some(celsius);
        self
    }

    pub fn preset(mut self, index: u8) -> Self {
        self.preset = Some(index);
        self
    }

    pub fn heater(mut self, index: u8) -> Self {
        self.heater = Some(index);
        self
    }
}

/// How a request finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Dry run, or neither a preset nor a temperature was given.
    NoOp,
    /// Target applied without waiting; the reset was handed to the display.
    Registered(StatusReset),
    Converged,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Validating,
    Applying,
    WaitingConvergence,
    Registered,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Applying => "applying",
            Self::WaitingConvergence => "waiting",
            Self::Registered => "registered",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

fn enter(phase: &mut Phase, next: Phase) {
    tracing::trace!("Bed target protocol: {} -> {}", phase, next);
    *phase = next;
}

/// The wait half of a request, alive until convergence or abort.
#[derive(Debug, Clone, Copy)]
struct PendingWait {
    selector: Selector,
    target: Celsius,
    mode: WaitMode,
}

impl PendingWait {
    fn is_converged(&self, store: &ThermalStore, tolerance: Celsius) -> bool {
        let converged = |id: HeaterId| {
            if store.is_near(id, self.target, tolerance) {
                return true;
            }
            let current = store.current(id);
            self.mode == WaitMode::HeatingOnly && current != SENSOR_FAULT && current > self.target
        };
        match self.selector {
            Selector::Single(id) => converged(id),
            Selector::All => store.ids().all(converged),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WaitSettings {
    pub tolerance: Celsius,
    pub poll_interval: Duration,
    pub report_interval: Duration,
    pub residency: Duration,
    pub dry_run: bool,
    pub job_timer_autostart: bool,
}

impl WaitSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            tolerance: config.thermal.tolerance,
            poll_interval: config.wait.poll_interval(),
            report_interval: config.wait.report_interval(),
            residency: config.wait.residency(),
            dry_run: config.thermal.dry_run,
            job_timer_autostart: config.thermal.job_timer_autostart,
        }
    }
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Command-side owner of the bed targets.
pub struct ThermalCommander {
    store: Arc<ThermalStore>,
    settings: WaitSettings,
    presets: PresetTable,
    estop: EmergencyStop,
    display: Box<dyn StatusDisplay>,
    operator: Arc<dyn OperatorChannel>,
    job_timer: Option<Box<dyn JobTimer>>,
}

impl ThermalCommander {
    pub fn new(
        store: Arc<ThermalStore>,
        settings: WaitSettings,
        estop: EmergencyStop,
        display: Box<dyn StatusDisplay>,
        operator: Arc<dyn OperatorChannel>,
    ) -> Self {
        Self {
            store,
            settings,
            presets: PresetTable::default(),
            estop,
            display,
            operator,
            job_timer: None,
        }
    }

    pub fn with_presets(mut self, presets: PresetTable) -> Self {
        self.presets = presets;
        self
    }

    pub fn with_job_timer(mut self, timer: Box<dyn JobTimer>) -> Self {
        self.job_timer = Some(timer);
        self
    }

    pub fn store(&self) -> &Arc<ThermalStore> {
        &self.store
    }

    pub fn settings(&self) -> &WaitSettings {
        &self.settings
    }

    pub fn job_timer(&self) -> Option<&dyn JobTimer> {
        self.job_timer.as_deref()
    }

    /// Apply a bed target and, depending on the request's mode, wait for it.
    ///
    /// An out-of-range heater index is echoed to the operator and returned
    /// as `ThermalError::Addressing` with no target touched. A request with
    /// no temperature is a silent no-op.
    pub async fn set_and_maybe_wait(&mut self, request: TargetRequest) -> Result<Outcome, ThermalError> {
        let mut phase = Phase::Idle;
        enter(&mut phase, Phase::Validating);

        if self.settings.dry_run {
            tracing::debug!("Dry run, ignoring bed temperature command");
            enter(&mut phase, Phase::Done);
            return Ok(Outcome::NoOp);
        }

        let Some((target, from_preset)) = self.resolve_target(&request) else {
            tracing::debug!("Bed temperature command without a temperature, nothing to do");
            enter(&mut phase, Phase::Done);
            return Ok(Outcome::NoOp);
        };

        let selector = match request.heater {
            None => Selector::All,
            Some(index) => match self.store.heater(index) {
                Ok(id) => Selector::Single(id),
                Err(e) => {
                    tracing::warn!("Rejected bed temperature command: {}", e);
                    self.operator.echo("Error: Bed index out of range").await;
                    enter(&mut phase, Phase::Done);
                    return Err(e);
                }
            },
        };

        enter(&mut phase, Phase::Applying);
        let was_on = self.store.any_target_on();
        match selector {
            Selector::Single(id) => self.store.set_target(id, target),
            Selector::All => self.store.set_all_targets(target),
        }
        tracing::info!("Target for {} set to {}°C", selector, target);

        self.announce(selector);
        self.update_job_timer(was_on);

        if request.mode == WaitMode::ReturnImmediately {
            let reset = match selector {
                Selector::Single(id) => StatusReset::Single { id, target },
                Selector::All => StatusReset::All { target },
            };
            self.display.set_status_reset(reset);
            enter(&mut phase, Phase::Registered);
            enter(&mut phase, Phase::Done);
            return Ok(Outcome::Registered(reset));
        }

        // A preset temperature is always waited for in both directions
        let mode = if from_preset { WaitMode::HeatingAndCooling } else { request.mode };
        enter(&mut phase, Phase::WaitingConvergence);
        let outcome = self.wait_for(PendingWait { selector, target, mode }).await;
        enter(&mut phase, Phase::Done);
        Ok(outcome)
    }

    /// The temperature to apply and whether it came from the preset table.
    fn resolve_target(&self, request: &TargetRequest) -> Option<(Celsius, bool)> {
        // A preset index wins over an explicit value, as long as presets exist
        match request.preset.and_then(|index| self.presets.bed_temp(index)) {
            Some(celsius) => Some((celsius, true)),
            None => request.target.map(|celsius| (celsius, false)),
        }
    }

    fn announce(&mut self, selector: Selector) {
        let numbered = self.store.count() > 1;
        let heat_message = |id: HeaterId| {
            let label = numbered.then_some(id);
            match status::classify(&self.store, id) {
                HeatState::Heating => StatusMessage::BedHeating(label),
                HeatState::Cooling => StatusMessage::BedCooling(label),
            }
        };
        let message = match selector {
            Selector::All if numbered => StatusMessage::AllBedsHeating,
            Selector::All => heat_message(HeaterId::new(0)),
            Selector::Single(id) => heat_message(id),
        };
        self.display.set_status(message);
    }

    /// Start the job timer on the first heater turning on, stop it when the
    /// last one turns off.
    fn update_job_timer(&mut self, was_on: bool) {
        if !self.settings.job_timer_autostart {
            return;
        }
        let Some(timer) = self.job_timer.as_mut() else {
            return;
        };
        let now_on = self.store.any_target_on();
        let result = match (was_on, now_on) {
            (false, true) if !timer.is_running() => timer.start(),
            (true, false) if timer.is_running() => timer.stop(),
            _ => return,
        };
        if let Err(e) = result {
            tracing::warn!("Print job timer: {}", e);
        }
    }

    async fn wait_for(&mut self, pending: PendingWait) -> Outcome {
        let started = Instant::now();
        let mut last_report = started;
        let mut near_since: Option<Instant> = None;
        loop {
            if self.estop.is_triggered() {
                tracing::warn!("Wait for {} aborted by emergency stop after {:?}", pending.selector, started.elapsed());
                return Outcome::Aborted;
            }

            let now = Instant::now();
            if pending.is_converged(&self.store, self.settings.tolerance) {
                let since = *near_since.get_or_insert(now);
                if now - since >= self.settings.residency {
                    tracing::info!("{} reached {}°C after {:?}", pending.selector, pending.target, started.elapsed());
                    return Outcome::Converged;
                }
            } else {
                near_since = None;
            }

            if now - last_report >= self.settings.report_interval {
                last_report = now;
                self.operator.echo(&status::temperature_report(&self.store)).await;
            }

            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}

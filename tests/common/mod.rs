// Recording collaborators shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use krusty_thermal::{EmergencyStop, StatusDisplay, StatusMessage, StatusReset, ThermalCommander, ThermalStore, WaitSettings};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thermal_shared::print_job::PrintJobError;
use thermal_shared::{JobTimer, OperatorChannel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    Status(StatusMessage),
    Reset(StatusReset),
}

#[derive(Debug, Clone, Default)]
pub struct RecordingDisplay(Arc<Mutex<Vec<DisplayEvent>>>);

impl RecordingDisplay {
    pub fn events(&self) -> Vec<DisplayEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl StatusDisplay for RecordingDisplay {
    fn set_status(&mut self, message: StatusMessage) {
        self.0.lock().unwrap().push(DisplayEvent::Status(message));
    }

    fn set_status_reset(&mut self, reset: StatusReset) {
        self.0.lock().unwrap().push(DisplayEvent::Reset(reset));
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordingOperator(Arc<Mutex<Vec<String>>>);

impl RecordingOperator {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl OperatorChannel for RecordingOperator {
    async fn echo(&self, line: &str) {
        self.0.lock().unwrap().push(line.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEdge {
    Start,
    Stop,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingTimer(Arc<Mutex<Vec<TimerEdge>>>);

impl RecordingTimer {
    pub fn edges(&self) -> Vec<TimerEdge> {
        self.0.lock().unwrap().clone()
    }
}

impl JobTimer for RecordingTimer {
    fn start(&mut self) -> Result<(), PrintJobError> {
        self.0.lock().unwrap().push(TimerEdge::Start);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PrintJobError> {
        self.0.lock().unwrap().push(TimerEdge::Stop);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.0.lock().unwrap().last() == Some(&TimerEdge::Start)
    }
}

pub struct Harness {
    pub store: Arc<ThermalStore>,
    pub estop: EmergencyStop,
    pub display: RecordingDisplay,
    pub operator: RecordingOperator,
    pub timer: RecordingTimer,
    pub commander: ThermalCommander,
}

/// Tolerance 3°C, 50 ms polls, a report every second, no residency.
pub fn test_settings() -> WaitSettings {
    WaitSettings {
        tolerance: 3,
        poll_interval: Duration::from_millis(50),
        report_interval: Duration::from_secs(1),
        residency: Duration::ZERO,
        dry_run: false,
        job_timer_autostart: true,
    }
}

/// `count` beds at 25°C, off, with every collaborator recorded.
pub fn harness(count: usize, settings: WaitSettings) -> Harness {
    let store = Arc::new(ThermalStore::new(count, 25, 30));
    let estop = EmergencyStop::new();
    let display = RecordingDisplay::default();
    let operator = RecordingOperator::default();
    let timer = RecordingTimer::default();
    let commander = ThermalCommander::new(
        store.clone(),
        settings,
        estop.clone(),
        Box::new(display.clone()),
        Arc::new(operator.clone()),
    )
    .with_job_timer(Box::new(timer.clone()));
    Harness { store, estop, display, operator, timer, commander }
}

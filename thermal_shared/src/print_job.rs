use crate::hardware_traits::JobTimer;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrintJobError {
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Stopped,
}

/// Print-job stopwatch. Started and stopped by heater edges when autostart
/// is enabled; the elapsed time feeds "printing is active" style checks.
#[derive(Debug)]
pub struct PrintJobTimer {
    state: JobState,
    started_at: Option<Instant>,
    accumulated: Duration,
    starts: u32,
}

impl PrintJobTimer {
    pub fn new() -> Self {
        Self {
            state: JobState::Idle,
            started_at: None,
            accumulated: Duration::ZERO,
            starts: 0,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Total running time of the current (or last) job.
    pub fn elapsed(&self) -> Duration {
        match self.started_at {
            Some(at) if self.state == JobState::Running => self.accumulated + at.elapsed(),
            _ => self.accumulated,
        }
    }

    /// Number of jobs started since power-up.
    pub fn starts(&self) -> u32 {
        self.starts
    }
}

impl Default for PrintJobTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTimer for PrintJobTimer {
    fn start(&mut self) -> Result<(), PrintJobError> {
        match self.state {
            JobState::Running => Err(PrintJobError::InvalidTransition("Timer is already running".to_string())),
            JobState::Idle | JobState::Stopped => {
                self.state = JobState::Running;
                self.started_at = Some(Instant::now());
                self.accumulated = Duration::ZERO;
                self.starts += 1;
                tracing::info!("Print job timer started");
                Ok(())
            }
        }
    }

    fn stop(&mut self) -> Result<(), PrintJobError> {
        match self.state {
            JobState::Running => {
                if let Some(at) = self.started_at.take() {
                    self.accumulated += at.elapsed();
                }
                self.state = JobState::Stopped;
                tracing::info!("Print job timer stopped after {:?}", self.accumulated);
                Ok(())
            }
            JobState::Idle => Err(PrintJobError::InvalidTransition("Timer was never started".to_string())),
            JobState::Stopped => Err(PrintJobError::InvalidTransition("Timer is already stopped".to_string())),
        }
    }

    fn is_running(&self) -> bool {
        self.state == JobState::Running
    }
}

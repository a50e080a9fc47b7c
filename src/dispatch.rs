//! Command-stream dispatch for the host: one line at a time into the
//! commander, stopping as soon as the emergency stop is raised.

use async_trait::async_trait;
use crate::command::{Outcome, ThermalCommander};
use crate::estop::EmergencyStop;
use crate::gcode::{HostCommand, parse_command};
use crate::status::temperature_report;
use std::io::{self, BufRead as _};
use std::path::PathBuf;
use std::sync::Arc;
use thermal_shared::OperatorChannel;
use thermal_shared::config::TemperatureUnit;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, mpsc};

pub type LineReceiver = mpsc::Receiver<io::Result<String>>;

/// Why `Dispatcher::run` returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The input closed.
    Exhausted,
    /// The emergency stop was raised; remaining input is ignored.
    Halted,
}

pub struct Dispatcher {
    commander: ThermalCommander,
    operator: Arc<dyn OperatorChannel>,
    estop: EmergencyStop,
    units: TemperatureUnit,
}

impl Dispatcher {
    pub fn new(
        commander: ThermalCommander,
        operator: Arc<dyn OperatorChannel>,
        estop: EmergencyStop,
        units: TemperatureUnit,
    ) -> Self {
        Self { commander, operator, estop, units }
    }

    pub fn commander(&self) -> &ThermalCommander {
        &self.commander
    }

    /// Run one line. Returns false for lines the thermal core ignores.
    /// Every handled command is acknowledged with `ok` unless its wait was
    /// aborted.
    pub async fn handle_line(&mut self, line: &str) -> bool {
        match parse_command(line, self.units) {
            Some(HostCommand::BedTemperature(request)) => match self.commander.set_and_maybe_wait(request).await {
                Ok(Outcome::Aborted) => return true,
                Ok(outcome) => tracing::debug!("'{}' -> {:?}", line.trim(), outcome),
                Err(e) => tracing::warn!("'{}' failed: {}", line.trim(), e),
            },
            Some(HostCommand::ReportTemperatures) => {
                self.operator.echo(&temperature_report(self.commander.store())).await;
            }
            None => {
                tracing::debug!("Ignoring '{}'", line.trim());
                return false;
            }
        }
        self.operator.echo("ok").await;
        true
    }

    /// Dispatch lines until the input closes or the emergency stop is
    /// raised, whichever comes first. A read error ends the stream.
    pub async fn run(&mut self, lines: &mut LineReceiver) -> io::Result<StreamEnd> {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.estop.stopped() => None,
                line = lines.recv() => Some(line),
            };
            match next {
                None => {
                    tracing::warn!("Emergency stop active, ignoring remaining commands");
                    return Ok(StreamEnd::Halted);
                }
                Some(None) => return Ok(StreamEnd::Exhausted),
                Some(Some(line)) => {
                    self.handle_line(&line?).await;
                }
            }
        }
    }
}

/// Operator messages written to `W` (stdout on the host), one line each.
/// Write failures are logged and otherwise ignored.
pub struct ConsoleOperator<W> {
    out: Mutex<W>,
}

impl<W> ConsoleOperator<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> OperatorChannel for ConsoleOperator<W> {
    async fn echo(&self, line: &str) {
        let mut out = self.out.lock().await;
        if let Err(e) = out.write_all(format!("{}\n", line).as_bytes()).await {
            tracing::warn!("Failed to write to console: {}", e);
        }
        if let Err(e) = out.flush().await {
            tracing::warn!("Failed to flush console: {}", e);
        }
    }
}

/// Stream lines from `path`, or from stdin when `None`.
pub fn spawn_line_reader(path: Option<PathBuf>) -> LineReceiver {
    let (tx, rx) = mpsc::channel(64);
    match path {
        Some(path) => {
            tokio::spawn(async move {
                let file = match tokio::fs::File::open(&path).await {
                    Ok(file) => file,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };
                let mut lines = BufReader::new(file).lines();
                while let Some(line) = lines.next_line().await.transpose() {
                    let failed = line.is_err();
                    if tx.send(line).await.is_err() || failed {
                        break;
                    }
                }
            });
        }
        None => {
            // Plain thread: a blocking stdin read cannot be cancelled and
            // must not hold up runtime shutdown
            std::thread::spawn(move || {
                for line in io::stdin().lock().lines() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
            });
        }
    }
    rx
}

// Host command loop: acknowledgements, end of input and emergency stop

mod common;

use common::{Harness, RecordingOperator, harness, test_settings};
use krusty_thermal::dispatch::{ConsoleOperator, spawn_line_reader};
use krusty_thermal::{Dispatcher, EmergencyStop, StreamEnd};
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use thermal_shared::{HeaterId, OperatorChannel};
use thermal_shared::config::TemperatureUnit;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

struct Rig {
    operator: RecordingOperator,
    estop: EmergencyStop,
}

fn dispatcher(count: usize) -> (Dispatcher, Rig) {
    let Harness { commander, operator, estop, .. } = harness(count, test_settings());
    let dispatcher = Dispatcher::new(commander, Arc::new(operator.clone()), estop.clone(), TemperatureUnit::Celsius);
    (dispatcher, Rig { operator, estop })
}

#[tokio::test]
async fn test_lines_are_acknowledged_until_input_closes() {
    let (mut dispatcher, h) = dispatcher(1);
    let (tx, mut rx) = mpsc::channel(8);
    for line in ["M105", "G1 X10", "M140 B5 S60", "M140 S60"] {
        tx.send(Ok(line.to_string())).await.unwrap();
    }
    drop(tx);

    assert_eq!(dispatcher.run(&mut rx).await.unwrap(), StreamEnd::Exhausted);
    assert_eq!(h.operator.lines(), vec!["B:25 /0", "ok", "Error: Bed index out of range", "ok", "ok"]);
    assert_eq!(dispatcher.commander().store().target(HeaterId::new(0)), 60);
}

#[tokio::test(start_paused = true)]
async fn test_emergency_stop_ends_loop_while_input_is_open() {
    let (mut dispatcher, h) = dispatcher(1);
    let (tx, mut rx) = mpsc::channel(8);
    tx.send(Ok("M140 S60".to_string())).await.unwrap();

    let estop = h.estop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        estop.trigger();
    });

    // The sender stays alive, so only the stop can end the loop
    let end = tokio::time::timeout(Duration::from_secs(1), dispatcher.run(&mut rx)).await.unwrap().unwrap();
    assert_eq!(end, StreamEnd::Halted);
    assert_eq!(h.operator.lines(), vec!["ok"]);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_emergency_stop_during_wait_skips_remaining_lines() {
    let (mut dispatcher, h) = dispatcher(1);
    let (tx, mut rx) = mpsc::channel(8);
    tx.send(Ok("M190 S60".to_string())).await.unwrap();
    tx.send(Ok("M140 S80".to_string())).await.unwrap();

    let estop = h.estop.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        estop.trigger();
    });

    assert_eq!(dispatcher.run(&mut rx).await.unwrap(), StreamEnd::Halted);
    // The aborted wait is not acknowledged and the queued line never runs
    assert!(h.operator.lines().is_empty());
    assert_eq!(dispatcher.commander().store().target(HeaterId::new(0)), 60);
}

#[tokio::test]
async fn test_missing_command_file_is_an_error() {
    let (mut dispatcher, _h) = dispatcher(1);
    let mut lines = spawn_line_reader(Some(PathBuf::from("/nonexistent/job.gcode")));
    assert!(dispatcher.run(&mut lines).await.is_err());
}

/// Accepts writes but fails every flush, like a closed terminal.
#[derive(Default)]
struct FailingFlush(Vec<u8>);

impl AsyncWrite for FailingFlush {
    fn poll_write(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.0.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed")))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn test_console_writes_one_line_per_echo() {
    let console = ConsoleOperator::new(Vec::new());
    console.echo("B:25 /0").await;
    console.echo("ok").await;
    assert_eq!(console.into_inner(), b"B:25 /0\nok\n".to_vec());
}

#[tokio::test]
async fn test_console_survives_flush_errors() {
    let console = ConsoleOperator::new(FailingFlush::default());
    console.echo("ok").await;
    console.echo("ok").await;
    assert_eq!(console.into_inner().0, b"ok\nok\n".to_vec());
}

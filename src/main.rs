// src/main.rs - Thermal host: streams bed temperature commands against simulated beds
use clap::Parser;
use krusty_thermal::dispatch::{ConsoleOperator, spawn_line_reader};
use krusty_thermal::sampler::SensorSampler;
use krusty_thermal::sim::SimulatedBeds;
use krusty_thermal::status::SharedStatusLine;
use krusty_thermal::{Dispatcher, EmergencyStop, StreamEnd, ThermalCommander, ThermalStore, WaitSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thermal_shared::OperatorChannel;
use thermal_shared::config::{self, Config};
use thermal_shared::print_job::PrintJobTimer;

#[derive(Debug, Parser)]
#[command(name = "thermal-host", version, about = "Bed temperature host running against simulated beds")]
struct Cli {
    /// Configuration file; built-in defaults are used when it does not exist
    #[arg(short, long, default_value = "thermal.toml")]
    config: PathBuf,
    /// Command file to stream (stdin when omitted)
    gcode: Option<PathBuf>,
    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO })
        .init();

    tracing::info!("Starting Krusty thermal host");

    let config = if cli.config.exists() {
        tracing::info!("Loading configuration from: {}", cli.config.display());
        config::load_config(&cli.config).inspect_err(|e| {
            tracing::error!("Failed to load config from '{}': {}", cli.config.display(), e);
        })?
    } else {
        tracing::warn!("No configuration at '{}', using defaults", cli.config.display());
        Config::default()
    };

    tracing::info!(
        "Beds: {}, tolerance: {}°C, thermistor: {}, presets: {}",
        config.thermal.bed_count,
        config.thermal.tolerance,
        if config.sampling.custom_table.is_some() { "custom" } else { config.sampling.thermistor.as_str() },
        config.presets.len()
    );

    let store = Arc::new(ThermalStore::from_config(&config.thermal));
    let table = Arc::new(config.sampling.table()?);
    let estop = EmergencyStop::new();

    // Sampling tick
    let beds = SimulatedBeds::from_config(store.clone(), table.clone(), &config);
    let sampler = SensorSampler::new(store.clone(), table, beds);
    tokio::spawn(sampler.run(config.sampling.period()));

    // Halt handler: the first interrupt stops waits and switches every bed
    // off, a second one exits without waiting for the command loop
    {
        let estop = estop.clone();
        let store = store.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if estop.is_triggered() {
                    tracing::warn!("Interrupted again, exiting");
                    std::process::exit(130);
                }
                estop.trigger();
                store.reset_targets();
            }
        });
    }

    // Display side: clear the status line once its reset predicate holds
    let status_line = SharedStatusLine::new();
    {
        let status_line = status_line.clone();
        let store = store.clone();
        let tolerance = config.thermal.tolerance;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(500));
            loop {
                interval.tick().await;
                status_line.poll(&store, tolerance);
            }
        });
    }

    let operator: Arc<dyn OperatorChannel> = Arc::new(ConsoleOperator::new(tokio::io::stdout()));
    let commander = ThermalCommander::new(
        store.clone(),
        WaitSettings::from_config(&config),
        estop.clone(),
        Box::new(status_line),
        operator.clone(),
    )
    .with_presets(config.preset_table())
    .with_job_timer(Box::new(PrintJobTimer::new()));

    let mut dispatcher = Dispatcher::new(commander, operator, estop, config.thermal.units);
    let mut lines = spawn_line_reader(cli.gcode);
    match dispatcher.run(&mut lines).await? {
        StreamEnd::Exhausted => tracing::info!("Command stream finished"),
        StreamEnd::Halted => tracing::info!("Stopped by emergency stop"),
    }
    Ok(())
}

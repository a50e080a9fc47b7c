use std::io::Write;
use tempfile::NamedTempFile;
use thermal_shared::config::{ConfigError, TemperatureUnit, load_config};

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_full_config() {
    let file = write_config(
        r#"
[thermal]
bed_count = 4
tolerance = 2
min_meaningful_temp = 35
units = "fahrenheit"
job_timer_autostart = false

[wait]
poll_interval_ms = 50
residency_ms = 2000

[sampling]
period_ms = 20

[[presets]]
name = "PLA"
bed_temp = 60

[[presets]]
name = "PETG"
bed_temp = 80
"#,
    );
    let config = load_config(file.path()).unwrap();
    assert_eq!(config.thermal.bed_count, 4);
    assert_eq!(config.thermal.tolerance, 2);
    assert_eq!(config.thermal.units, TemperatureUnit::Fahrenheit);
    assert!(!config.thermal.job_timer_autostart);
    assert_eq!(config.wait.poll_interval_ms, 50);
    assert_eq!(config.wait.report_interval_ms, 1000);
    assert_eq!(config.wait.residency_ms, 2000);
    assert_eq!(config.preset_table().bed_temp(9), Some(80));
}

#[test]
fn test_custom_thermistor_table() {
    let file = write_config(
        r#"
[sampling]
custom_table = [
    { raw = 100, celsius = 250 },
    { raw = 600, celsius = 150 },
    { raw = 1000, celsius = 20 },
]
"#,
    );
    let config = load_config(file.path()).unwrap();
    let table = config.sampling.table().unwrap();
    assert!(!table.is_rising());
    assert_eq!(table.lookup(350), 200);
}

#[test]
fn test_invalid_custom_table_is_rejected() {
    let file = write_config(
        r#"
[sampling]
custom_table = [{ raw = 100, celsius = 20 }, { raw = 50, celsius = 30 }]
"#,
    );
    assert!(matches!(load_config(file.path()), Err(ConfigError::Thermistor(_))));
}

#[test]
fn test_missing_file_and_bad_toml() {
    assert!(matches!(load_config("/nonexistent/thermal.toml"), Err(ConfigError::Io(_))));
    let file = write_config("[thermal\nbed_count = ");
    assert!(matches!(load_config(file.path()), Err(ConfigError::Toml(_))));
}

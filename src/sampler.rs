// Fixed-period sensor sampling: ADC -> thermistor table -> store

use crate::store::{SENSOR_FAULT, ThermalStore};
use std::sync::Arc;
use std::time::Duration;
use thermal_shared::{AdcSource, HeaterId, SensorReading, ThermistorTable};

/// Owns the sampling side of the store. The only writer of `current`.
pub struct SensorSampler<A: AdcSource> {
    store: Arc<ThermalStore>,
    tables: Vec<Arc<ThermistorTable>>,
    adc: A,
    faulted: Vec<bool>,
}

impl<A: AdcSource> SensorSampler<A> {
    /// One table shared by every heater.
    pub fn new(store: Arc<ThermalStore>, table: Arc<ThermistorTable>, adc: A) -> Self {
        let tables = vec![table; store.count()];
        Self::with_tables(store, tables, adc)
    }

    /// Per-heater tables, in heater order. Missing entries reuse the last table.
    pub fn with_tables(store: Arc<ThermalStore>, mut tables: Vec<Arc<ThermistorTable>>, adc: A) -> Self {
        if let Some(last) = tables.last().cloned() {
            tables.resize(store.count(), last);
        }
        let faulted = vec![false; store.count()];
        Self { store, tables, adc, faulted }
    }

    pub fn adc(&self) -> &A {
        &self.adc
    }

    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }

    /// Sample every heater once.
    pub fn tick(&mut self) {
        self.adc.start_conversion();
        for i in 0..self.store.count() {
            let id = HeaterId::new(i as u8);
            let reading = match (self.adc.read(i), self.tables.get(i)) {
                (Some(raw), Some(table)) => Some(table.read(raw)),
                _ => None,
            };
            match reading {
                Some(SensorReading::InRange(celsius)) => {
                    if self.faulted[i] {
                        tracing::info!("Bed {} sensor recovered at {}°C", id, celsius);
                        self.faulted[i] = false;
                    }
                    self.store.set_current(id, celsius);
                }
                other => {
                    if !self.faulted[i] {
                        tracing::warn!("Bed {} sensor fault: {:?}", id, other);
                        self.faulted[i] = true;
                    }
                    self.store.set_current(id, SENSOR_FAULT);
                }
            }
        }
    }

    /// Sample forever at `period`. Spawn this on its own task; it never
    /// returns and keeps running through emergency stops.
    pub async fn run(mut self, period: Duration) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            self.tick();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedAdc(Vec<Option<u16>>);

    impl AdcSource for FixedAdc {
        fn read(&mut self, channel: usize) -> Option<u16> {
            self.0.get(channel).copied().flatten()
        }
    }

    #[test]
    fn test_tick_converts_and_flags_faults() {
        let store = Arc::new(ThermalStore::new(3, 25, 30));
        let table = Arc::new(ThermistorTable::builtin("133").unwrap());
        let adc = FixedAdc(vec![Some(5348), Some(10), None]);
        let mut sampler = SensorSampler::new(store.clone(), table, adc);
        sampler.tick();
        assert_eq!(store.current(HeaterId::new(0)), 60);
        assert!(store.is_faulted(HeaterId::new(1)));
        assert!(store.is_faulted(HeaterId::new(2)));

        sampler.adc_mut().0[1] = Some(1448);
        sampler.tick();
        assert_eq!(store.current(HeaterId::new(1)), 25);
    }
}

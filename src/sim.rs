//! Simulated heated beds for the host binary and tests.
//!
//! Each bed's physical temperature ramps toward its target (or toward
//! ambient when the target is off) by a fixed step per sampling tick. Raw
//! readings are produced through the inverse thermistor lookup so the
//! sampler exercises the same conversion path as real hardware.

use crate::store::ThermalStore;
use std::sync::Arc;
use thermal_shared::config::Config;
use thermal_shared::{AdcSource, Celsius, HeaterId, ThermistorTable};

pub struct SimulatedBeds {
    store: Arc<ThermalStore>,
    table: Arc<ThermistorTable>,
    physical: Vec<Celsius>,
    disconnected: Vec<bool>,
    ambient: Celsius,
    step: Celsius,
    noise: u16,
    ticks: u64,
}

impl SimulatedBeds {
    pub fn new(store: Arc<ThermalStore>, table: Arc<ThermistorTable>, ambient: Celsius, step: Celsius) -> Self {
        let count = store.count();
        Self {
            store,
            table,
            physical: vec![ambient; count],
            disconnected: vec![false; count],
            ambient,
            step: step.max(1),
            noise: 0,
            ticks: 0,
        }
    }

    pub fn from_config(store: Arc<ThermalStore>, table: Arc<ThermistorTable>, config: &Config) -> Self {
        Self::new(store, table, config.thermal.ambient, config.simulation.step_per_tick).with_noise(config.simulation.noise)
    }

    /// Peak raw-count noise added to every reading.
    pub fn with_noise(mut self, noise: u16) -> Self {
        self.noise = noise;
        self
    }

    pub fn temperature(&self, id: HeaterId) -> Celsius {
        self.physical[id.index()]
    }

    pub fn set_temperature(&mut self, id: HeaterId, celsius: Celsius) {
        self.physical[id.index()] = celsius;
    }

    /// Simulate an open thermistor on `id`.
    pub fn set_disconnected(&mut self, id: HeaterId, disconnected: bool) {
        self.disconnected[id.index()] = disconnected;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// One tick of bed physics.
    pub fn advance(&mut self) {
        self.ticks += 1;
        for id in self.store.ids() {
            let target = self.store.target(id);
            let goal = if target > 0 { target } else { self.ambient };
            let t = &mut self.physical[id.index()];
            let delta = (goal as i32 - *t as i32).clamp(-(self.step as i32), self.step as i32);
            *t += delta as Celsius;
        }
    }
}

impl AdcSource for SimulatedBeds {
    fn start_conversion(&mut self) {
        self.advance();
    }

    fn read(&mut self, channel: usize) -> Option<u16> {
        if *self.disconnected.get(channel)? {
            // Open circuit pins the divider at one end of the ADC range
            return Some(0);
        }
        let raw = self.table.raw_for(*self.physical.get(channel)?) as i32;
        let jitter = if self.noise > 0 {
            rand::random_range(-(self.noise as i32)..=self.noise as i32)
        } else {
            0
        };
        Some((raw + jitter).clamp(0, u16::MAX as i32) as u16)
    }
}

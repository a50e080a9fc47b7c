//! Thermal state shared between the sampling tick and the command path.
//!
//! Every field is its own atomic so a reader on either side always sees a
//! whole value without taking a lock. `current` is written by the sampling
//! tick, `target` by the command path (and zeroed by the emergency-stop
//! handler).
//!
//! Accessors take a [`HeaterId`] obtained from [`ThermalStore::heater`] or
//! [`ThermalStore::ids`]; they panic if handed an id from a store with more
//! heaters.

use crate::error::ThermalError;
use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};
use thermal_shared::config::{MAX_BEDS, ThermalConfig};
use thermal_shared::{Celsius, HeaterId};

/// Current temperature stored while a heater's sensor reads outside its table.
pub const SENSOR_FAULT: Celsius = Celsius::MIN;

#[derive(Debug)]
struct HeaterSlot {
    current: AtomicI16,
    target: AtomicI16,
    idle_timed_out: AtomicBool,
}

#[derive(Debug)]
pub struct ThermalStore {
    slots: Box<[HeaterSlot]>,
    min_meaningful: Celsius,
}

impl ThermalStore {
    /// `count` heaters starting at `ambient` with targets off. `count` is
    /// clamped to `1..=MAX_BEDS`; there is always at least one bed.
    pub fn new(count: usize, ambient: Celsius, min_meaningful: Celsius) -> Self {
        if count == 0 || count > MAX_BEDS {
            tracing::warn!("Bed count {} out of range, using {}", count, count.clamp(1, MAX_BEDS));
        }
        let slots = (0..count.clamp(1, MAX_BEDS))
            .map(|_| HeaterSlot {
                current: AtomicI16::new(ambient),
                target: AtomicI16::new(0),
                idle_timed_out: AtomicBool::new(false),
            })
            .collect();
        Self { slots, min_meaningful }
    }

    pub fn from_config(config: &ThermalConfig) -> Self {
        Self::new(config.bed_count, config.ambient, config.min_meaningful_temp)
    }

    pub fn count(&self) -> usize {
        self.slots.len()
    }

    pub fn min_meaningful(&self) -> Celsius {
        self.min_meaningful
    }

    /// Resolve an operator-supplied index.
    pub fn heater(&self, index: u8) -> Result<HeaterId, ThermalError> {
        if (index as usize) < self.slots.len() {
            Ok(HeaterId::new(index))
        } else {
            Err(ThermalError::Addressing { index, count: self.slots.len() })
        }
    }

    /// All configured heaters in id order.
    pub fn ids(&self) -> impl Iterator<Item = HeaterId> + '_ {
        (0..self.slots.len()).map(|i| HeaterId::new(i as u8))
    }

    pub fn current(&self, id: HeaterId) -> Celsius {
        self.slot(id).current.load(Ordering::Acquire)
    }

    pub fn target(&self, id: HeaterId) -> Celsius {
        self.slot(id).target.load(Ordering::Acquire)
    }

    pub fn set_target(&self, id: HeaterId, celsius: Celsius) {
        self.slot(id).target.store(celsius, Ordering::Release);
        tracing::debug!("Heater {} target -> {}", id, celsius);
    }

    /// Same as `set_target` for every heater in id order. Each heater's
    /// update is atomic; the broadcast as a whole is not.
    pub fn set_all_targets(&self, celsius: Celsius) {
        for id in self.ids() {
            self.set_target(id, celsius);
        }
    }

    /// Sampling tick only.
    pub fn set_current(&self, id: HeaterId, celsius: Celsius) {
        self.slot(id).current.store(celsius, Ordering::Release);
    }

    pub fn is_faulted(&self, id: HeaterId) -> bool {
        self.current(id) == SENSOR_FAULT
    }

    pub fn idle_timed_out(&self, id: HeaterId) -> bool {
        self.slot(id).idle_timed_out.load(Ordering::Acquire)
    }

    /// Set by the external heater idle handler when the idle timeout
    /// expires, cleared when the heater is re-armed.
    pub fn set_idle_timed_out(&self, id: HeaterId, timed_out: bool) {
        self.slot(id).idle_timed_out.store(timed_out, Ordering::Release);
    }

    /// True when `target` is effectively off, or the heater reads within
    /// `tolerance` of it. A faulted sensor is never within tolerance.
    pub fn is_near(&self, id: HeaterId, target: Celsius, tolerance: Celsius) -> bool {
        if target < self.min_meaningful {
            return true;
        }
        let current = self.current(id);
        current != SENSOR_FAULT && (current as i32 - target as i32).abs() <= tolerance as i32
    }

    pub fn any_target_on(&self) -> bool {
        self.ids().any(|id| self.target(id) > 0)
    }

    /// Zero every target. Called by the emergency-stop handler.
    pub fn reset_targets(&self) {
        self.set_all_targets(0);
    }

    fn slot(&self, id: HeaterId) -> &HeaterSlot {
        &self.slots[id.index()]
    }
}

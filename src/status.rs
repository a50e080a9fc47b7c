//! Read-time views over the thermal store for the display and status layer.
//!
//! Nothing here owns heater state. Classifications and predicates are
//! evaluated against the store every time they are asked for.

use crate::command::Selector;
use crate::store::ThermalStore;
use std::fmt;
use std::sync::{Arc, Mutex};
use thermal_shared::{Celsius, HeaterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatState {
    Heating,
    Cooling,
}

pub fn classify(store: &ThermalStore, id: HeaterId) -> HeatState {
    if store.current(id) < store.target(id) {
        HeatState::Heating
    } else {
        HeatState::Cooling
    }
}

/// Whether every selected heater is near its own target.
pub fn aggregate_near(store: &ThermalStore, selector: Selector, tolerance: Celsius) -> bool {
    match selector {
        Selector::Single(id) => store.is_near(id, store.target(id), tolerance),
        Selector::All => store.ids().all(|id| store.is_near(id, store.target(id), tolerance)),
    }
}

/// Status line text set by the target-set path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMessage {
    /// `None` when only one bed is configured.
    BedHeating(Option<HeaterId>),
    BedCooling(Option<HeaterId>),
    AllBedsHeating,
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BedHeating(None) => write!(f, "Bed Heating..."),
            Self::BedHeating(Some(id)) => write!(f, "Bed {} Heating...", id.number()),
            Self::BedCooling(None) => write!(f, "Bed Cooling..."),
            Self::BedCooling(Some(id)) => write!(f, "Bed {} Cooling...", id.number()),
            Self::AllBedsHeating => write!(f, "All Beds Heating..."),
        }
    }
}

/// Predicate the status layer polls to decide when to drop the current
/// heating/cooling message. Captures the selector and the requested
/// temperature; holds no other state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusReset {
    #[default]
    None,
    Single { id: HeaterId, target: Celsius },
    All { target: Celsius },
}

impl StatusReset {
    pub fn is_satisfied(&self, store: &ThermalStore, tolerance: Celsius) -> bool {
        match *self {
            Self::None => false,
            Self::Single { id, target } => store.is_near(id, target, tolerance),
            Self::All { target } => store.ids().all(|id| store.is_near(id, target, tolerance)),
        }
    }
}

/// Display-side sink for status updates from the command path.
pub trait StatusDisplay: Send {
    /// Replace the status message. Any previously registered reset is dropped.
    fn set_status(&mut self, message: StatusMessage);
    fn set_status_reset(&mut self, reset: StatusReset);
}

/// The status line as the display sees it: one message plus the predicate
/// that clears it.
#[derive(Debug, Default)]
pub struct StatusLine {
    message: Option<StatusMessage>,
    reset: StatusReset,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(&self) -> Option<StatusMessage> {
        self.message
    }

    pub fn reset(&self) -> StatusReset {
        self.reset
    }

    /// Evaluate the registered reset; clears the message when it holds.
    /// Returns true if the message was cleared by this call.
    pub fn poll(&mut self, store: &ThermalStore, tolerance: Celsius) -> bool {
        match self.message {
            Some(message) if self.reset.is_satisfied(store, tolerance) => {
                tracing::debug!("Status reset satisfied, clearing '{}'", message);
                self.message = None;
                self.reset = StatusReset::None;
                true
            }
            _ => false,
        }
    }
}

impl StatusDisplay for StatusLine {
    fn set_status(&mut self, message: StatusMessage) {
        tracing::info!("Status: {}", message);
        self.message = Some(message);
        self.reset = StatusReset::None;
    }

    fn set_status_reset(&mut self, reset: StatusReset) {
        self.reset = reset;
    }
}

/// `StatusLine` shared between the command path and a display poller.
#[derive(Debug, Clone, Default)]
pub struct SharedStatusLine(Arc<Mutex<StatusLine>>);

impl SharedStatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(&self) -> Option<StatusMessage> {
        self.lock().message()
    }

    pub fn reset(&self) -> StatusReset {
        self.lock().reset()
    }

    pub fn poll(&self, store: &ThermalStore, tolerance: Celsius) -> bool {
        self.lock().poll(store, tolerance)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StatusLine> {
        // A poisoned status line is still a valid status line
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StatusDisplay for SharedStatusLine {
    fn set_status(&mut self, message: StatusMessage) {
        self.lock().set_status(message);
    }

    fn set_status_reset(&mut self, reset: StatusReset) {
        self.lock().set_status_reset(reset);
    }
}

/// `current/target` pair for one heater as a character display shows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaterReadout {
    /// `None` while the sensor is faulted.
    pub current: Option<Celsius>,
    /// `None` on the off phase of the blink once the heater idle timer expired.
    pub target: Option<Celsius>,
}

impl HeaterReadout {
    pub fn of(store: &ThermalStore, id: HeaterId, blink: bool) -> Self {
        let current = (!store.is_faulted(id)).then(|| store.current(id));
        let target = (blink || !store.idle_timed_out(id)).then(|| store.target(id));
        Self { current, target }
    }
}

impl fmt::Display for HeaterReadout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.current {
            Some(c) => write!(f, "{:>3}", c)?,
            None => write!(f, "err")?,
        }
        match self.target {
            Some(t) => write!(f, "/{:<3}", t),
            None => write!(f, "/   "),
        }
    }
}

/// Temperature report line in the `M105` style, e.g. `B:57 /60` or
/// `B0:57 /60 B1:24 /0`.
pub fn temperature_report(store: &ThermalStore) -> String {
    let field = |id: HeaterId| {
        let current = if store.is_faulted(id) { "err".to_string() } else { store.current(id).to_string() };
        format!("{} /{}", current, store.target(id))
    };
    if store.count() == 1 {
        return format!("B:{}", field(HeaterId::new(0)));
    }
    store
        .ids()
        .map(|id| format!("B{}:{}", id, field(id)))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SENSOR_FAULT;

    fn store_with(count: usize) -> ThermalStore {
        ThermalStore::new(count, 25, 30)
    }

    #[test]
    fn test_classify_is_evaluated_on_read() {
        let store = store_with(1);
        let bed = store.heater(0).unwrap();
        store.set_target(bed, 60);
        assert_eq!(classify(&store, bed), HeatState::Heating);
        store.set_current(bed, 60);
        assert_eq!(classify(&store, bed), HeatState::Cooling);
        store.set_target(bed, 0);
        assert_eq!(classify(&store, bed), HeatState::Cooling);
    }

    #[test]
    fn test_aggregate_near() {
        let store = store_with(2);
        let (b0, b1) = (store.heater(0).unwrap(), store.heater(1).unwrap());
        store.set_all_targets(60);
        store.set_current(b0, 59);
        assert!(aggregate_near(&store, Selector::Single(b0), 3));
        assert!(!aggregate_near(&store, Selector::All, 3));
        store.set_current(b1, 62);
        assert!(aggregate_near(&store, Selector::All, 3));
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(StatusMessage::BedHeating(None).to_string(), "Bed Heating...");
        assert_eq!(StatusMessage::BedCooling(Some(HeaterId::new(2))).to_string(), "Bed 3 Cooling...");
        assert_eq!(StatusMessage::AllBedsHeating.to_string(), "All Beds Heating...");
    }

    #[test]
    fn test_status_line_clears_once_reset_holds() {
        let store = store_with(1);
        let bed = store.heater(0).unwrap();
        store.set_target(bed, 60);
        let mut line = StatusLine::new();
        line.set_status(StatusMessage::BedHeating(None));
        line.set_status_reset(StatusReset::Single { id: bed, target: 60 });
        assert!(!line.poll(&store, 3));
        assert_eq!(line.message(), Some(StatusMessage::BedHeating(None)));
        store.set_current(bed, 58);
        assert!(line.poll(&store, 3));
        assert_eq!(line.message(), None);
        assert_eq!(line.reset(), StatusReset::None);
    }

    #[test]
    fn test_new_status_drops_stale_reset() {
        let mut line = StatusLine::new();
        line.set_status_reset(StatusReset::All { target: 0 });
        line.set_status(StatusMessage::AllBedsHeating);
        assert_eq!(line.reset(), StatusReset::None);
    }

    #[test]
    fn test_readout_blinks_idle_target() {
        let store = store_with(1);
        let bed = store.heater(0).unwrap();
        store.set_target(bed, 60);
        store.set_current(bed, 42);
        assert_eq!(HeaterReadout::of(&store, bed, false).to_string(), " 42/60 ");
        store.set_idle_timed_out(bed, true);
        assert_eq!(HeaterReadout::of(&store, bed, false).to_string(), " 42/   ");
        assert_eq!(HeaterReadout::of(&store, bed, true).to_string(), " 42/60 ");
        store.set_current(bed, SENSOR_FAULT);
        assert_eq!(HeaterReadout::of(&store, bed, true).to_string(), "err/60 ");
    }

    #[test]
    fn test_temperature_report() {
        let single = store_with(1);
        single.set_all_targets(60);
        assert_eq!(temperature_report(&single), "B:25 /60");
        let multi = store_with(2);
        multi.set_target(multi.heater(1).unwrap(), 70);
        multi.set_current(multi.heater(0).unwrap(), SENSOR_FAULT);
        assert_eq!(temperature_report(&multi), "B0:err /0 B1:25 /70");
    }
}

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// Global halt signal. Cloning shares the same flag.
///
/// Raising it unblocks any in-progress wait within one poll interval. It does
/// not touch heater targets; the halt handler zeroes those itself.
#[derive(Debug, Clone, Default)]
pub struct EmergencyStop {
    triggered: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl EmergencyStop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::AcqRel) {
            tracing::warn!("Emergency stop triggered");
        }
        self.notify.notify_waiters();
    }

    /// Resolves once the stop is triggered (immediately if it already is).
    pub async fn stopped(&self) {
        loop {
            // Register before checking so a trigger in between is not missed
            let notified = self.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Re-arm after the machine has been recovered.
    pub fn clear(&self) {
        self.triggered.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_the_flag() {
        let estop = EmergencyStop::new();
        let other = estop.clone();
        assert!(!other.is_triggered());
        estop.trigger();
        assert!(other.is_triggered());
        other.clear();
        assert!(!estop.is_triggered());
    }

    #[tokio::test]
    async fn test_stopped_wakes_on_trigger() {
        let estop = EmergencyStop::new();
        let waiter = {
            let estop = estop.clone();
            tokio::spawn(async move { estop.stopped().await })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());
        estop.trigger();
        tokio::time::timeout(std::time::Duration::from_secs(1), waiter).await.unwrap().unwrap();
        // Already triggered: returns at once
        estop.stopped().await;
    }
}

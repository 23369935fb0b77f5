//! Debounced save scheduling.
//!
//! Persistence is best-effort and must never sit on the edit path, so saves
//! are coalesced: every change marks the debouncer dirty and restarts the
//! quiet-period clock, and a save becomes due only once no further change
//! has arrived for the whole delay. The debouncer holds no thread and does
//! no I/O itself; the owner polls [`SaveDebouncer::should_save`] and calls
//! the gateway when it fires.

use std::time::{Duration, Instant};

use tracing::debug;

/// Default quiet period before a pending save becomes due.
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Poll-driven save debouncer.
pub struct SaveDebouncer {
    delay: Duration,
    enabled: bool,
    dirty: bool,
    last_change: Instant,
}

impl SaveDebouncer {
    /// Debouncer with a custom quiet period in milliseconds.
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            enabled: true,
            dirty: false,
            last_change: Instant::now(),
        }
    }

    /// Record a change. Restarts the quiet-period clock.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.last_change = Instant::now();
    }

    /// Record a completed save. Clears the pending flag; intervening changes
    /// after this call schedule a fresh save as usual.
    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Whether a save is due: there are unsaved changes, saving is enabled,
    /// and the quiet period has fully elapsed.
    pub fn should_save(&self) -> bool {
        self.enabled && self.dirty && self.last_change.elapsed() >= self.delay
    }

    /// Whether unsaved changes are pending (due or not).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Enable or disable save scheduling. Disabling keeps the dirty flag, so
    /// re-enabling later lets the pending save fire.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            debug!(enabled, "Save debouncer toggled");
        }
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The configured quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Time remaining until the pending save is due; zero when due now or
    /// when nothing is pending.
    pub fn time_until_due(&self) -> Duration {
        if !self.dirty || !self.enabled {
            return Duration::ZERO;
        }
        self.delay.saturating_sub(self.last_change.elapsed())
    }
}

impl Default for SaveDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_debouncer_has_nothing_due() {
        let d = SaveDebouncer::default();
        assert!(!d.is_dirty());
        assert!(!d.should_save());
        assert_eq!(d.delay(), Duration::from_millis(DEFAULT_DEBOUNCE_MS));
        assert_eq!(d.time_until_due(), Duration::ZERO);
    }

    #[test]
    fn dirty_save_becomes_due_after_the_quiet_period() {
        let mut d = SaveDebouncer::new(10);
        d.mark_dirty();
        assert!(d.is_dirty());
        assert!(d.time_until_due() > Duration::ZERO);

        std::thread::sleep(Duration::from_millis(20));
        assert!(d.should_save());
        assert_eq!(d.time_until_due(), Duration::ZERO);
    }

    #[test]
    fn a_new_change_restarts_the_clock() {
        let mut d = SaveDebouncer::new(30);
        d.mark_dirty();
        std::thread::sleep(Duration::from_millis(15));
        d.mark_dirty();
        // The first change's quiet period would have elapsed by now alone,
        // but the second change pushed the deadline out.
        std::thread::sleep(Duration::from_millis(20));
        assert!(!d.should_save());
        std::thread::sleep(Duration::from_millis(15));
        assert!(d.should_save());
    }

    #[test]
    fn mark_saved_clears_the_pending_flag() {
        let mut d = SaveDebouncer::new(1);
        d.mark_dirty();
        std::thread::sleep(Duration::from_millis(5));
        assert!(d.should_save());

        d.mark_saved();
        assert!(!d.is_dirty());
        assert!(!d.should_save());
    }

    #[test]
    fn disabling_suppresses_the_save_but_keeps_the_flag() {
        let mut d = SaveDebouncer::new(1);
        d.set_enabled(false);
        d.mark_dirty();
        std::thread::sleep(Duration::from_millis(5));
        assert!(!d.should_save());
        assert!(d.is_dirty());

        d.set_enabled(true);
        assert!(d.should_save());
    }
}

/// Scan-rate telemetry: switch counter and rolling switch history.
use heapless::Deque;

use crate::site::Millis;

/// Trailing window used for `sites_per_second`
pub const RATE_WINDOW_MS: Millis = 10_000;

/// Shortest settle delay of any mode, in ms
const MIN_SWITCH_DELAY_MS: Millis = 30;

/// Number of switch timestamps kept for rate reporting. Holds every switch
/// that fits in one rate window at the shortest settle delay.
pub const HISTORY_LEN: usize = (RATE_WINDOW_MS / MIN_SWITCH_DELAY_MS) as usize + 1;

#[derive(Debug, Clone, Default)]
pub struct ScanTelemetry {
    switch_count: u32,
    history: Deque<Millis, HISTORY_LEN>,
    started_at: Option<Millis>,
}

impl ScanTelemetry {
    pub const fn new() -> Self {
        Self {
            switch_count: 0,
            history: Deque::new(),
            started_at: None,
        }
    }

    /// Mark the start of scanning (first tune). Later calls are ignored.
    pub fn start(&mut self, now: Millis) {
        self.started_at.get_or_insert(now);
    }

    /// Record one completed site switch.
    pub fn record_switch(&mut self, now: Millis) {
        self.switch_count = self.switch_count.wrapping_add(1);
        if self.history.is_full() {
            self.history.pop_front();
        }
        let _ = self.history.push_back(now);
    }

    pub fn switch_count(&self) -> u32 {
        self.switch_count
    }

    /// Switch timestamps, oldest first.
    pub fn history(&self) -> impl Iterator<Item = Millis> + '_ {
        self.history.iter().copied()
    }

    /// Switches per second over the trailing window. While scanning has run
    /// for less than the window, the elapsed time is used instead.
    pub fn sites_per_second(&self, now: Millis) -> f32 {
        let Some(started) = self.started_at else {
            return 0.0;
        };
        let window = RATE_WINDOW_MS.min(now.saturating_sub(started));
        if window == 0 {
            return 0.0;
        }
        let cutoff = now.saturating_sub(window);
        let recent = self.history().filter(|&t| t >= cutoff && t <= now).count();
        recent as f32 * 1000.0 / window as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_rate_before_start() {
        let mut t = ScanTelemetry::new();
        t.record_switch(100);
        assert_eq!(t.sites_per_second(1_000), 0.0);
    }

    #[test]
    fn rate_uses_elapsed_time_early_in_the_run() {
        let mut t = ScanTelemetry::new();
        t.start(0);
        for i in 1..=10 {
            t.record_switch(i * 400);
        }
        assert_eq!(t.switch_count(), 10);
        let rate = t.sites_per_second(4_000);
        assert!((rate - 2.5).abs() < 1e-3, "rate was {rate}");
    }

    #[test]
    fn rate_only_counts_trailing_window() {
        let mut t = ScanTelemetry::new();
        t.start(0);
        // 20 switches in the first 10 s, then 5 in the next 10 s
        for i in 0..20 {
            t.record_switch(i * 500);
        }
        for i in 0..5 {
            t.record_switch(10_000 + i * 2_000);
        }
        let rate = t.sites_per_second(20_000);
        assert!((rate - 0.5).abs() < 1e-3, "rate was {rate}");
    }

    #[test]
    fn rate_is_exact_at_the_settle_floor() {
        let mut t = ScanTelemetry::new();
        t.start(0);
        // one switch every 30 ms for 20 s
        for i in 1..=666 {
            t.record_switch(i * 30);
        }
        let rate = t.sites_per_second(20_000);
        assert!((rate - 33.3).abs() < 0.2, "rate was {rate}");
    }

    #[test]
    fn history_covers_a_full_window_of_fast_switching() {
        assert!(HISTORY_LEN as Millis * MIN_SWITCH_DELAY_MS >= RATE_WINDOW_MS);
        assert!(HISTORY_LEN > 64);
        for mode in crate::mode::ScanMode::ALL {
            assert!(mode.profile().switch_delay_ms as Millis >= MIN_SWITCH_DELAY_MS);
        }
    }

    #[test]
    fn history_is_bounded_but_count_is_not() {
        let mut t = ScanTelemetry::new();
        for i in 0..(HISTORY_LEN as Millis + 10) {
            t.record_switch(i);
        }
        assert_eq!(t.history().count(), HISTORY_LEN);
        assert_eq!(t.history().next(), Some(10));
        assert_eq!(t.switch_count(), HISTORY_LEN as u32 + 10);
    }

    #[test]
    fn start_is_only_recorded_once() {
        let mut t = ScanTelemetry::new();
        t.start(1_000);
        t.start(5_000);
        t.record_switch(2_000);
        let rate = t.sites_per_second(3_000);
        assert!((rate - 0.5).abs() < 1e-3, "rate was {rate}");
    }
}

use std::time::{Duration, Instant};

/// Millisecond-precision countdown.
///
/// Backs the recent-detection window and the dwell click. A countdown that
/// was never started, or was reset, has finished.
#[derive(Debug, Clone)]
pub struct Countdown {
    time_to_wait: Duration,
    started: Option<Instant>,
}

impl Countdown {
    pub fn new(time_to_wait: Duration) -> Self {
        Self {
            time_to_wait,
            started: None,
        }
    }

    /// (Re)starts the countdown now.
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub(crate) fn start_at(&mut self, now: Instant) {
        self.started = Some(now);
    }

    pub fn reset(&mut self) {
        self.started = None;
    }

    pub fn time_to_wait(&self) -> Duration {
        self.time_to_wait
    }

    /// Changes the window without restarting the countdown.
    pub fn set_time_to_wait(&mut self, time_to_wait: Duration) {
        self.time_to_wait = time_to_wait;
    }

    /// A zero window never reports a pending countdown.
    pub fn is_disabled(&self) -> bool {
        self.time_to_wait.is_zero()
    }

    pub fn has_finished(&self) -> bool {
        self.has_finished_at(Instant::now())
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.remaining_at(Instant::now())
    }

    /// Percent of the window elapsed, 0..=100.
    pub fn elapsed_percent(&self) -> u8 {
        self.elapsed_percent_at(Instant::now())
    }

    fn elapsed_at(&self, now: Instant) -> Option<Duration> {
        self.started.map(|s| now.saturating_duration_since(s))
    }

    pub(crate) fn has_finished_at(&self, now: Instant) -> bool {
        match self.elapsed_at(now) {
            Some(elapsed) => elapsed > self.time_to_wait,
            None => true,
        }
    }

    fn remaining_at(&self, now: Instant) -> Duration {
        match self.elapsed_at(now) {
            Some(elapsed) => self.time_to_wait.saturating_sub(elapsed),
            None => Duration::ZERO,
        }
    }

    pub(crate) fn elapsed_percent_at(&self, now: Instant) -> u8 {
        let Some(elapsed) = self.elapsed_at(now) else {
            return 100;
        };
        if self.is_disabled() || elapsed > self.time_to_wait {
            return 100;
        }
        (100 * elapsed.as_millis() / self.time_to_wait.as_millis().max(1)).min(100) as u8
    }
}

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::shared::constants::{DWELL_AREA_DEFAULT, DWELL_TIME_DEFAULT_MS};
use crate::shared::countdown::Countdown;
use crate::shared::geometry::Point2f;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DwellSettings {
    pub enabled: bool,
    /// How long the pointer must rest before clicking.
    pub dwell_time_ms: u64,
    /// Largest per-frame pointer step, in pixels, that still counts as
    /// resting.
    pub dwell_area: u16,
    /// Keep clicking while the pointer rests instead of once per stop.
    pub consecutive_clicks: bool,
}

impl Default for DwellSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dwell_time_ms: DWELL_TIME_DEFAULT_MS,
            dwell_area: DWELL_AREA_DEFAULT,
            consecutive_clicks: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DwellState {
    Reset,
    Moving,
    Dwelling,
    Clicked,
}

/// Clicks when the pointer rests in place long enough.
#[derive(Debug, Clone)]
pub struct DwellClick {
    state: DwellState,
    countdown: Countdown,
    area_squared: f32,
    consecutive_clicks: bool,
    previous: Point2f,
}

impl DwellClick {
    pub fn new(settings: DwellSettings) -> Self {
        let mut click = Self {
            state: DwellState::Reset,
            countdown: Countdown::new(Duration::ZERO),
            area_squared: 0.0,
            consecutive_clicks: false,
            previous: Point2f::ZERO,
        };
        click.apply(settings);
        click
    }

    /// Takes new settings; a running dwell keeps its start time.
    pub fn apply(&mut self, settings: DwellSettings) {
        self.countdown
            .set_time_to_wait(Duration::from_millis(settings.dwell_time_ms));
        let area = f32::from(settings.dwell_area);
        self.area_squared = area * area;
        self.consecutive_clicks = settings.consecutive_clicks;
    }

    /// Forgets the previous location; the next update only records it.
    pub fn reset(&mut self) {
        self.state = DwellState::Reset;
    }

    /// Feeds the pointer location of one frame. Returns `true` when a
    /// click fires.
    pub fn update(&mut self, location: Point2f) -> bool {
        self.update_at(location, Instant::now())
    }

    /// Dwell progress, 0..=100, while a dwell is running; 0 otherwise.
    pub fn progress_percent(&self) -> u8 {
        self.progress_percent_at(Instant::now())
    }

    pub(crate) fn update_at(&mut self, location: Point2f, now: Instant) -> bool {
        let moved = self.moved(location);
        let mut clicked = false;

        self.state = match self.state {
            DwellState::Reset => DwellState::Moving,
            DwellState::Moving if moved => DwellState::Moving,
            DwellState::Moving => {
                self.countdown.start_at(now);
                DwellState::Dwelling
            }
            DwellState::Dwelling if moved => DwellState::Moving,
            DwellState::Dwelling if self.countdown.has_finished_at(now) => {
                clicked = true;
                if self.consecutive_clicks {
                    DwellState::Moving
                } else {
                    DwellState::Clicked
                }
            }
            DwellState::Dwelling => DwellState::Dwelling,
            DwellState::Clicked if moved => DwellState::Moving,
            DwellState::Clicked => DwellState::Clicked,
        };

        self.previous = location;
        clicked
    }

    fn progress_percent_at(&self, now: Instant) -> u8 {
        if self.state != DwellState::Dwelling {
            return 0;
        }
        self.countdown.elapsed_percent_at(now)
    }

    fn moved(&self, location: Point2f) -> bool {
        let dx = location.x - self.previous.x;
        let dy = location.y - self.previous.y;
        dx * dx + dy * dy > self.area_squared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STILL: Point2f = Point2f::new(100.0, 100.0);

    fn settings(consecutive_clicks: bool) -> DwellSettings {
        DwellSettings {
            enabled: true,
            dwell_time_ms: 1000,
            dwell_area: 5,
            consecutive_clicks,
        }
    }

    fn ms(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    /// Feeds a resting pointer until the dwell starts at `t0`.
    fn start_dwell(click: &mut DwellClick, t0: Instant) {
        assert!(!click.update_at(STILL, t0));
        assert!(!click.update_at(STILL, t0));
        assert_eq!(click.state, DwellState::Dwelling);
    }

    #[test]
    fn test_first_update_only_records() {
        let mut click = DwellClick::new(settings(false));
        let t0 = Instant::now();
        assert!(!click.update_at(STILL, t0));
        assert_eq!(click.state, DwellState::Moving);
    }

    #[test]
    fn test_clicks_after_dwell_time() {
        let mut click = DwellClick::new(settings(false));
        let t0 = Instant::now();
        start_dwell(&mut click, t0);

        assert!(!click.update_at(STILL, ms(t0, 500)));
        assert_eq!(click.progress_percent_at(ms(t0, 500)), 50);
        assert!(!click.update_at(STILL, ms(t0, 1000)));
        assert!(click.update_at(STILL, ms(t0, 1001)));
        assert_eq!(click.progress_percent_at(ms(t0, 1001)), 0);
    }

    #[test]
    fn test_single_click_per_stop() {
        let mut click = DwellClick::new(settings(false));
        let t0 = Instant::now();
        start_dwell(&mut click, t0);
        assert!(click.update_at(STILL, ms(t0, 1500)));
        assert!(!click.update_at(STILL, ms(t0, 5000)));
        assert_eq!(click.state, DwellState::Clicked);

        // moving away re-arms the dwell
        click.update_at(Point2f::new(200.0, 100.0), ms(t0, 5100));
        assert_eq!(click.state, DwellState::Moving);
    }

    #[test]
    fn test_consecutive_clicks_rearm() {
        let mut click = DwellClick::new(settings(true));
        let t0 = Instant::now();
        start_dwell(&mut click, t0);
        assert!(click.update_at(STILL, ms(t0, 1500)));
        assert!(!click.update_at(STILL, ms(t0, 1600)));
        assert!(click.update_at(STILL, ms(t0, 2700)));
    }

    #[test]
    fn test_motion_cancels_dwell() {
        let mut click = DwellClick::new(settings(false));
        let t0 = Instant::now();
        start_dwell(&mut click, t0);
        assert!(!click.update_at(Point2f::new(106.0, 100.0), ms(t0, 900)));
        assert_eq!(click.state, DwellState::Moving);
        assert!(!click.update_at(Point2f::new(106.0, 100.0), ms(t0, 1200)));
        assert_eq!(click.state, DwellState::Dwelling);
    }

    #[test]
    fn test_jitter_inside_area_keeps_dwelling() {
        let mut click = DwellClick::new(settings(false));
        let t0 = Instant::now();
        start_dwell(&mut click, t0);
        // 3-4-5 step sits exactly on the boundary, which is still resting
        assert!(!click.update_at(Point2f::new(103.0, 104.0), ms(t0, 400)));
        assert!(click.update_at(Point2f::new(100.0, 100.0), ms(t0, 1200)));
    }

    #[test]
    fn test_reset_ignores_jump() {
        let mut click = DwellClick::new(settings(false));
        let t0 = Instant::now();
        start_dwell(&mut click, t0);
        click.reset();
        assert!(!click.update_at(Point2f::new(700.0, 10.0), ms(t0, 2000)));
        assert_eq!(click.state, DwellState::Moving);
        assert_eq!(click.progress_percent_at(ms(t0, 2000)), 0);
    }
}

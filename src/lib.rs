pub mod audio;
pub mod player;
pub mod clock;
pub mod session;
pub mod error;
pub mod import;
pub mod i18n;
pub mod gui;

use std::time::Duration;

pub use error::SessionError;
pub use session::{PlayRequest, PlaybackSession, SessionView};

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Idle,
    Loaded,
    Playing,
    Paused,
    Completed,
    Failed(String),
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    pub fn has_resource(&self) -> bool {
        !matches!(self, PlaybackState::Idle | PlaybackState::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackSpeed {
    #[default]
    Normal,
    Slight,
    Slower,
    Half,
}

impl PlaybackSpeed {
    pub const ALL: [PlaybackSpeed; 4] = [
        PlaybackSpeed::Normal,
        PlaybackSpeed::Slight,
        PlaybackSpeed::Slower,
        PlaybackSpeed::Half,
    ];

    /// Rate multiplier handed to the player.
    pub fn factor(self) -> f64 {
        match self {
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::Slight => 0.85,
            PlaybackSpeed::Slower => 0.75,
            PlaybackSpeed::Half => 0.5,
        }
    }

    pub fn from_factor(factor: f64) -> Result<Self, SessionError> {
        Self::ALL
            .iter()
            .copied()
            .find(|s| (s.factor() - factor).abs() < 1e-6)
            .ok_or(SessionError::UnsupportedSpeed(factor))
    }

    pub fn label(self) -> &'static str {
        match self {
            PlaybackSpeed::Normal => "1.0x",
            PlaybackSpeed::Slight => "0.85x",
            PlaybackSpeed::Slower => "0.75x",
            PlaybackSpeed::Half => "0.5x",
        }
    }
}

/// The `[start, end]` sub-range of the resource that gets repeated.
///
/// Always satisfies `0 <= start < end <= total`; constructors reject anything else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopWindow {
    start: f64,
    end: f64,
    total: f64,
}

impl LoopWindow {
    pub fn new(start: f64, end: f64, total: f64) -> Result<Self, SessionError> {
        let valid = start.is_finite()
            && end.is_finite()
            && start >= 0.0
            && start < end
            && end <= total;
        if !valid {
            return Err(SessionError::InvalidWindow { start, end, total });
        }
        Ok(Self { start, end, total })
    }

    /// Whole-file window. A non-positive duration yields the empty window `[0, 0]`.
    pub fn full(total: f64) -> Self {
        let total = total.max(0.0);
        Self { start: 0.0, end: total, total }
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn len(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0.0
    }

    pub fn with_start(&self, start: f64) -> Result<Self, SessionError> {
        Self::new(start, self.end, self.total)
    }

    pub fn with_end(&self, end: f64) -> Result<Self, SessionError> {
        Self::new(self.start, end, self.total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopCounter {
    pub requested: u32,
    pub completed: u32,
    /// Set once the current traversal's end has been counted; cleared on reposition.
    pub boundary_handled: bool,
}

impl LoopCounter {
    pub fn new(requested: u32) -> Self {
        Self {
            requested: requested.max(1),
            completed: 0,
            boundary_handled: false,
        }
    }

    pub fn reset(&mut self) {
        self.completed = 0;
        self.boundary_handled = false;
    }

    pub fn is_finished(&self) -> bool {
        self.completed >= self.requested
    }

    /// 1-based loop number shown to the user, capped at the requested count.
    pub fn current_display(&self) -> u32 {
        (self.completed + 1).min(self.requested)
    }
}

#[derive(Clone, Debug)]
pub struct SessionSettings {
    pub default_loops: u32,
    pub tick_interval: Duration,
    pub boundary_slack_secs: f64, // Absorbs tick-granularity overshoot at the window end
    pub boost_gain: f32,
    pub normal_gain: f32,
    pub import_timeout: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            default_loops: 100,
            tick_interval: Duration::from_millis(100),
            boundary_slack_secs: 0.05,
            boost_gain: 2.0,
            normal_gain: 1.0,
            import_timeout: Duration::from_secs(20),
        }
    }
}

/// Formats seconds as `HH:MM:SS`, truncating fractions.
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds as u64 } else { 0 };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Formats seconds for the start/end text fields, rounded down to one decimal
/// so a whole-file end never exceeds the decoded duration.
pub fn format_seconds_field(seconds: f64) -> String {
    let truncated = (seconds.max(0.0) * 10.0).floor() / 10.0;
    format!("{:.1}", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_rejects_inverted_and_out_of_range_bounds() {
        assert!(LoopWindow::new(2.0, 5.0, 10.0).is_ok());
        assert!(LoopWindow::new(5.0, 5.0, 10.0).is_err());
        assert!(LoopWindow::new(6.0, 5.0, 10.0).is_err());
        assert!(LoopWindow::new(-0.1, 5.0, 10.0).is_err());
        assert!(LoopWindow::new(0.0, 10.5, 10.0).is_err());
        assert!(LoopWindow::new(f64::NAN, 5.0, 10.0).is_err());
    }

    #[test]
    fn full_window_spans_whole_resource() {
        let w = LoopWindow::full(12.5);
        assert_eq!(w.start(), 0.0);
        assert_eq!(w.end(), 12.5);
        assert_eq!(w.len(), 12.5);
    }

    #[test]
    fn speed_lookup_only_accepts_enumerated_factors() {
        assert_eq!(PlaybackSpeed::from_factor(0.85).unwrap(), PlaybackSpeed::Slight);
        assert_eq!(PlaybackSpeed::from_factor(0.5).unwrap(), PlaybackSpeed::Half);
        assert!(matches!(
            PlaybackSpeed::from_factor(2.0),
            Err(SessionError::UnsupportedSpeed(_))
        ));
    }

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(0.0), "00:00:00");
        assert_eq!(format_hms(59.9), "00:00:59");
        assert_eq!(format_hms(3725.0), "01:02:05");
        assert_eq!(format_hms(-3.0), "00:00:00");
    }

    #[test]
    fn seconds_field_never_rounds_up() {
        assert_eq!(format_seconds_field(10.06), "10.0");
        assert_eq!(format_seconds_field(3.0), "3.0");
    }

    #[test]
    fn counter_display_is_one_based_and_capped() {
        let mut c = LoopCounter::new(2);
        assert_eq!(c.current_display(), 1);
        c.completed = 1;
        assert_eq!(c.current_display(), 2);
        c.completed = 2;
        assert_eq!(c.current_display(), 2);
        assert!(c.is_finished());
    }
}

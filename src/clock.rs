use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use crate::player::AudioPlayer;
use crate::{LoopCounter, LoopWindow, PlaybackSpeed};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Progress {
    pub fraction: f64,
    pub position: f64,
}

/// Loop bookkeeping owned by the session and updated in place by the clock.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopState {
    pub window: LoopWindow,
    pub counter: LoopCounter,
    pub speed: PlaybackSpeed,
    pub progress: Progress,
}

impl LoopState {
    pub fn new(window: LoopWindow, requested_loops: u32, speed: PlaybackSpeed) -> Self {
        Self {
            window,
            counter: LoopCounter::new(requested_loops),
            speed,
            progress: Progress {
                fraction: 0.0,
                position: window.start(),
            },
        }
    }

    /// Seconds the window takes to traverse at the current speed.
    pub fn traversal_secs(&self) -> f64 {
        self.window.len() / self.speed.factor()
    }

    pub fn fraction_at(&self, position: f64) -> f64 {
        let span = self.traversal_secs();
        if span <= 0.0 {
            return 0.0;
        }
        ((position - self.window.start()) / span).clamp(0.0, 1.0)
    }

    /// Inverse of `fraction_at`, kept inside the resource.
    pub fn position_at(&self, fraction: f64) -> f64 {
        let pos = self.window.start() + fraction.clamp(0.0, 1.0) * self.traversal_secs();
        pos.clamp(0.0, self.window.total())
    }

    pub fn observe(&mut self, position: f64) {
        self.progress = Progress {
            fraction: self.fraction_at(position),
            position,
        };
    }

    /// Back to the window start for a new traversal.
    pub fn rewind(&mut self) {
        self.progress = Progress {
            fraction: 0.0,
            position: self.window.start(),
        };
        self.counter.boundary_handled = false;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Crossing {
    /// This traversal's end was already counted.
    AlreadyHandled,
    NextLoop,
    Finished,
    Failed(String),
}

/// Counts one window end and either starts the next traversal or finishes.
pub fn cross_boundary<P: AudioPlayer + ?Sized>(state: &mut LoopState, player: &mut P) -> Crossing {
    if state.counter.boundary_handled {
        return Crossing::AlreadyHandled;
    }
    state.counter.boundary_handled = true;
    state.counter.completed += 1;

    if state.counter.completed < state.counter.requested {
        let start = state.window.start();
        if let Err(e) = player.set_position(start) {
            player.stop();
            return Crossing::Failed(format!("{:#}", e));
        }
        player.play();
        state.rewind();
        log::info!(
            "starting loop {} of {}",
            state.counter.completed + 1,
            state.counter.requested
        );
        Crossing::NextLoop
    } else {
        player.stop();
        log::info!("finished all {} loops", state.counter.requested);
        Crossing::Finished
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Stale tick delivered after the clock was cancelled.
    Ignored,
    /// No player to sample; the clock stopped itself.
    Cancelled,
    Progressed,
    Crossed(Crossing),
}

pub struct LoopClock {
    interval: Duration,
    slack_secs: f64,
    ticker: Option<Receiver<Instant>>,
}

impl LoopClock {
    pub fn new(interval: Duration, slack_secs: f64) -> Self {
        Self {
            interval,
            slack_secs,
            ticker: None,
        }
    }

    /// (Re)starts the schedule. Any ticks of the previous schedule are dropped.
    pub fn start(&mut self) {
        self.ticker = Some(crossbeam_channel::tick(self.interval));
    }

    pub fn cancel(&mut self) {
        self.ticker = None;
    }

    pub fn is_running(&self) -> bool {
        self.ticker.is_some()
    }

    pub fn ticker(&self) -> Option<&Receiver<Instant>> {
        self.ticker.as_ref()
    }

    /// Drains elapsed ticks; several missed ones collapse into one.
    pub fn take_due(&self) -> bool {
        self.ticker
            .as_ref()
            .map_or(false, |ticker| ticker.try_iter().count() > 0)
    }

    pub fn tick<P: AudioPlayer + ?Sized>(&mut self, state: &mut LoopState, player: Option<&mut P>) -> TickOutcome {
        if !self.is_running() {
            return TickOutcome::Ignored;
        }
        let Some(player) = player else {
            log::debug!("player released, stopping loop clock");
            self.cancel();
            return TickOutcome::Cancelled;
        };

        let position = player.position();
        state.observe(position);
        log::debug!(
            "tick: pos {:.3}s end {:.3}s loop {}/{}",
            position,
            state.window.end(),
            state.counter.current_display(),
            state.counter.requested
        );

        let reached_end = position >= state.window.end() - self.slack_secs;
        if !reached_end && player.is_playing() {
            return TickOutcome::Progressed;
        }

        let crossing = cross_boundary(state, player);
        if matches!(crossing, Crossing::Finished | Crossing::Failed(_)) {
            self.cancel();
        }
        TickOutcome::Crossed(crossing)
    }
}

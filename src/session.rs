use std::path::Path;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::audio::{self, AudioResource, ResourceId};
use crate::clock::{self, Crossing, LoopClock, LoopState, TickOutcome};
use crate::error::{Result, SessionError};
use crate::i18n::StatusMessage;
use crate::player::{AudioPlayer, FinishNotifier, PlayerFactory, PlayerFinished, PlayerId};
use crate::{format_hms, LoopWindow, PlaybackSpeed, PlaybackState, SessionSettings};

/// Parameters of a `play` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayRequest {
    pub start: f64,
    pub end: f64,
    pub loops: i64,
    pub speed: PlaybackSpeed,
    pub volume_boost: bool,
}

impl PlayRequest {
    /// Builds a request from the screen's text fields.
    pub fn parse(start: &str, end: &str, loops: &str, speed: f64, volume_boost: bool) -> Result<Self> {
        Ok(Self {
            start: parse_field("start time", start)?,
            end: parse_field("end time", end)?,
            loops: loops.trim().parse().map_err(|_| SessionError::InvalidInput {
                field: "loop count",
                value: loops.to_string(),
            })?,
            speed: PlaybackSpeed::from_factor(speed)?,
            volume_boost,
        })
    }
}

fn parse_field(field: &'static str, value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SessionError::InvalidInput {
            field,
            value: value.to_string(),
        })
}

/// Read-only snapshot for the UI layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub state: PlaybackState,
    pub current_loop: u32,
    pub requested_loops: u32,
    pub completed_loops: u32,
    pub progress_fraction: f64,
    pub position_secs: f64,
    pub display_position: String,
    pub display_end: String,
    pub window: LoopWindow,
    pub speed: PlaybackSpeed,
    pub volume_boost: bool,
    pub status: StatusMessage,
    pub status_message: String,
}

struct ActivePlayer {
    id: PlayerId,
    resource: ResourceId,
    player: Box<dyn AudioPlayer>,
}

pub struct PlaybackSession {
    settings: SessionSettings,
    factory: Box<dyn PlayerFactory>,
    resource: Option<AudioResource>,
    // Duration recorded by the most recent successful load
    loaded_duration: f64,
    player: Option<ActivePlayer>,
    next_player_id: u64,
    loop_state: LoopState,
    volume_boost: bool,
    state: PlaybackState,
    status: StatusMessage,
    clock: LoopClock,
    finished_tx: Sender<PlayerFinished>,
    finished_rx: Receiver<PlayerFinished>,
}

impl PlaybackSession {
    pub fn new(factory: impl PlayerFactory + 'static, settings: SessionSettings) -> Self {
        let (finished_tx, finished_rx) = unbounded();
        let clock = LoopClock::new(settings.tick_interval, settings.boundary_slack_secs);
        let loop_state = LoopState::new(LoopWindow::full(0.0), settings.default_loops, PlaybackSpeed::Normal);
        Self {
            settings,
            factory: Box::new(factory),
            resource: None,
            loaded_duration: 0.0,
            player: None,
            next_player_id: 1,
            loop_state,
            volume_boost: false,
            state: PlaybackState::Idle,
            status: StatusMessage::Empty,
            clock,
            finished_tx,
            finished_rx,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn window(&self) -> LoopWindow {
        self.loop_state.window
    }

    pub fn resource(&self) -> Option<&AudioResource> {
        self.resource.as_ref()
    }

    pub fn is_clock_running(&self) -> bool {
        self.clock.is_running()
    }

    /// Lets the surrounding import flow report progress on the shared status line.
    pub fn set_status(&mut self, status: StatusMessage) {
        self.status = status;
    }

    pub fn view(&self) -> SessionView {
        let counter = self.loop_state.counter;
        SessionView {
            state: self.state.clone(),
            current_loop: counter.current_display(),
            requested_loops: counter.requested,
            completed_loops: counter.completed,
            progress_fraction: self.loop_state.progress.fraction,
            position_secs: self.loop_state.progress.position,
            display_position: format_hms(self.loop_state.progress.position),
            display_end: format_hms(self.loop_state.window.end()),
            window: self.loop_state.window,
            speed: self.loop_state.speed,
            volume_boost: self.volume_boost,
            status: self.status.clone(),
            status_message: self.status.render(),
        }
    }

    /// Replaces the resource. If something was playing, the new one starts playing.
    pub fn load(&mut self, resource: AudioResource) -> PlaybackState {
        let resume = self.state.is_playing();
        self.teardown();

        let duration = resource.duration_secs();
        self.loaded_duration = duration;
        self.loop_state = LoopState::new(
            LoopWindow::full(duration),
            self.settings.default_loops,
            self.loop_state.speed,
        );
        log::info!("loaded {} ({:.2}s)", resource.name(), duration);
        self.status = StatusMessage::Imported(resource.name().to_string());
        self.resource = Some(resource);
        self.state = PlaybackState::Loaded;

        if resume {
            let request = PlayRequest {
                start: 0.0,
                end: duration,
                loops: self.settings.default_loops as i64,
                speed: self.loop_state.speed,
                volume_boost: self.volume_boost,
            };
            if let Err(e) = self.play(request) {
                log::error!("could not resume after import: {}", e);
            }
        }
        self.state.clone()
    }

    /// Decodes `path` and loads it; decode errors leave the session `Failed`.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<PlaybackState> {
        match audio::load_resource(path.as_ref()) {
            Ok(resource) => Ok(self.load(resource)),
            Err(e) => {
                let reason = format!("{:#}", e);
                self.fail_load(reason.clone());
                Err(SessionError::ResourceLoad(reason))
            }
        }
    }

    pub fn fail_load(&mut self, reason: String) {
        log::error!("import failed: {}", reason);
        self.teardown();
        self.resource = None;
        self.loaded_duration = 0.0;
        self.loop_state = LoopState::new(LoopWindow::full(0.0), self.settings.default_loops, self.loop_state.speed);
        self.status = StatusMessage::ImportFailed(reason.clone());
        self.state = PlaybackState::Failed(reason);
    }

    pub fn play(&mut self, request: PlayRequest) -> Result<PlaybackState> {
        let resource = match (&self.state, &self.resource) {
            (PlaybackState::Failed(reason), _) => {
                log::debug!("play ignored, session failed: {}", reason);
                return Ok(self.state.clone());
            }
            (_, Some(resource)) => resource.clone(),
            (_, None) => {
                log::warn!("play requested with no audio loaded");
                self.status = StatusMessage::ImportRequired;
                return Err(SessionError::NoResource);
            }
        };

        let window = LoopWindow::new(request.start, request.end, resource.duration_secs());
        let validated = window.and_then(|w| {
            if request.loops < 1 {
                Err(SessionError::InvalidLoopCount(request.loops))
            } else {
                Ok(w)
            }
        });
        let window = match validated {
            Ok(w) => w,
            Err(e) => {
                log::warn!("rejected play request: {}", e);
                self.status = StatusMessage::InputInvalid(e.to_string());
                return Err(e);
            }
        };
        let loops = u32::try_from(request.loops).unwrap_or(u32::MAX);

        log::info!(
            "play: start={} end={} loops={} speed={}",
            window.start(),
            window.end(),
            loops,
            request.speed.label()
        );
        self.loop_state.window = window;
        self.loop_state.counter.requested = loops;
        self.loop_state.speed = request.speed;
        self.volume_boost = request.volume_boost;

        let fresh = self
            .player
            .as_ref()
            .map_or(true, |active| active.resource != resource.id());
        if fresh {
            self.open_player(&resource)?;
            self.restart_from_window_start()?;
        } else {
            let resumable = matches!(self.state, PlaybackState::Paused | PlaybackState::Playing)
                && !self.loop_state.counter.is_finished();
            if resumable {
                if let Some(active) = self.player.as_ref() {
                    self.loop_state.observe(active.player.position());
                }
            } else {
                self.restart_from_window_start()?;
            }
        }

        let gain = self.gain();
        let rate = self.loop_state.speed.factor() as f32;
        if let Some(active) = self.player.as_mut() {
            active.player.set_rate(rate);
            active.player.set_volume(gain);
            active.player.play();
        }
        self.clock.start();
        self.state = PlaybackState::Playing;
        self.status = self.playing_status();
        Ok(self.state.clone())
    }

    pub fn pause(&mut self) -> PlaybackState {
        if !self.state.is_playing() {
            log::debug!("pause ignored, nothing playing");
            return self.state.clone();
        }
        self.clock.cancel();
        if let Some(active) = self.player.as_mut() {
            active.player.pause();
            self.loop_state.observe(active.player.position());
        }
        log::info!("paused at {:.2}s", self.loop_state.progress.position);
        self.state = PlaybackState::Paused;
        let counter = self.loop_state.counter;
        self.status = StatusMessage::Paused {
            current: counter.current_display(),
            total: counter.requested,
        };
        self.state.clone()
    }

    pub fn stop(&mut self) -> PlaybackState {
        if !self.state.has_resource() {
            log::debug!("stop ignored in state {:?}", self.state);
            return self.state.clone();
        }
        self.clock.cancel();
        let start = self.loop_state.window.start();
        if let Some(active) = self.player.as_mut() {
            active.player.stop();
            if let Err(e) = active.player.set_position(start) {
                log::warn!("could not rewind stopped player: {:#}", e);
            }
        }
        self.loop_state.counter.reset();
        self.loop_state.rewind();
        log::info!("stopped");
        self.state = PlaybackState::Loaded;
        self.status = StatusMessage::Stopped;
        self.state.clone()
    }

    /// Moves playback to `fraction` of the window (progress-bar drag). Returns the new position.
    pub fn seek(&mut self, fraction: f64) -> Result<f64> {
        if !self.state.has_resource() {
            return Err(SessionError::NoResource);
        }
        if !(0.0..=1.0).contains(&fraction) {
            return Err(SessionError::InvalidInput {
                field: "seek fraction",
                value: fraction.to_string(),
            });
        }
        let window = self.loop_state.window;
        let position = window.start() + fraction * window.len();
        if let Some(active) = self.player.as_mut() {
            active
                .player
                .set_position(position)
                .map_err(|e| SessionError::Player(format!("{:#}", e)))?;
        }
        self.loop_state.observe(position);
        self.loop_state.counter.boundary_handled = false;
        log::debug!("seek to {:.2}s", position);
        Ok(position)
    }

    pub fn mark_loop_start(&mut self) -> Result<LoopWindow> {
        self.require_resource()?;
        let candidate = self.current_position();
        match self.loop_state.window.with_start(candidate) {
            Ok(window) => {
                log::info!("loop start set to {:.2}s", candidate);
                self.loop_state.window = window;
                self.loop_state.observe(candidate);
                Ok(window)
            }
            Err(_) => {
                log::warn!(
                    "cannot mark start at {:.2}s, end is {:.2}s",
                    candidate,
                    self.loop_state.window.end()
                );
                self.status = StatusMessage::MarkStartRejected(candidate);
                Err(SessionError::MarkRejected {
                    bound: "start",
                    position: candidate,
                })
            }
        }
    }

    pub fn mark_loop_end(&mut self) -> Result<LoopWindow> {
        self.require_resource()?;
        let candidate = self.current_position();
        match self.loop_state.window.with_end(candidate) {
            Ok(window) => {
                log::info!("loop end set to {:.2}s", candidate);
                self.loop_state.window = window;
                self.loop_state.observe(candidate);
                Ok(window)
            }
            Err(_) => {
                log::warn!(
                    "cannot mark end at {:.2}s, start is {:.2}s",
                    candidate,
                    self.loop_state.window.start()
                );
                self.status = StatusMessage::MarkEndRejected(candidate);
                Err(SessionError::MarkRejected {
                    bound: "end",
                    position: candidate,
                })
            }
        }
    }

    /// Back to the full-file window recorded at load time.
    pub fn reset_window(&mut self) -> Result<LoopWindow> {
        self.require_resource()?;
        let window = LoopWindow::full(self.loaded_duration);
        self.loop_state.window = window;
        self.loop_state.observe(0.0);
        if self.state.is_playing() {
            if let Some(active) = self.player.as_mut() {
                if let Err(e) = active.player.set_position(0.0) {
                    log::warn!("could not rewind after reset: {:#}", e);
                }
            }
            self.loop_state.counter.boundary_handled = false;
        }
        log::info!("window reset to [0, {:.2}]", self.loaded_duration);
        Ok(window)
    }

    pub fn set_speed(&mut self, speed: PlaybackSpeed) {
        self.loop_state.speed = speed;
        if let Some(active) = self.player.as_mut() {
            active.player.set_rate(speed.factor() as f32);
        }
        let position = self.loop_state.progress.position;
        self.loop_state.observe(position);
    }

    pub fn set_volume_boost(&mut self, enabled: bool) {
        self.volume_boost = enabled;
        let gain = self.gain();
        if let Some(active) = self.player.as_mut() {
            active.player.set_volume(gain);
        }
        log::info!("volume boost {}", if enabled { "on" } else { "off" });
    }

    /// Clock entry point; stale ticks after a cancel are ignored.
    pub fn on_tick(&mut self) {
        let player = self.player.as_mut().map(|active| &mut *active.player);
        match self.clock.tick(&mut self.loop_state, player) {
            TickOutcome::Ignored => log::debug!("stale tick ignored"),
            TickOutcome::Cancelled => {}
            TickOutcome::Progressed => self.status = self.playing_status(),
            TickOutcome::Crossed(crossing) => self.after_crossing(crossing),
        }
    }

    /// Engine entry point for "finished playing".
    pub fn on_player_finished(&mut self, event: PlayerFinished) {
        let Some(active) = self.player.as_mut() else {
            log::debug!("finish from released player {:?}", event.player);
            return;
        };
        if active.id != event.player {
            log::debug!("finish from superseded player {:?}", event.player);
            return;
        }
        if !self.state.is_playing() || active.player.is_playing() {
            // Already restarted by a tick, or stopped on purpose
            log::debug!("finish notification already handled");
            return;
        }
        self.loop_state.observe(active.player.position());
        let crossing = clock::cross_boundary(&mut self.loop_state, &mut *active.player);
        self.after_crossing(crossing);
    }

    /// Handles everything already queued without blocking. Returns how many events ran.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.finished_rx.try_recv() {
            self.on_player_finished(event);
            handled += 1;
        }
        if self.clock.take_due() {
            self.on_tick();
            handled += 1;
        }
        handled
    }

    /// Blocks until a tick or finish notification arrives, or `timeout` passes.
    pub fn wait_next_event(&mut self, timeout: Duration) -> bool {
        let finished = self.finished_rx.clone();
        let ticker = self
            .clock
            .ticker()
            .cloned()
            .unwrap_or_else(crossbeam_channel::never);
        crossbeam_channel::select! {
            recv(finished) -> event => {
                if let Ok(event) = event {
                    self.on_player_finished(event);
                }
            }
            recv(ticker) -> _ => self.on_tick(),
            default(timeout) => return false,
        }
        true
    }

    fn after_crossing(&mut self, crossing: Crossing) {
        match crossing {
            Crossing::AlreadyHandled => log::debug!("boundary already counted"),
            Crossing::NextLoop => self.status = self.playing_status(),
            Crossing::Finished => {
                self.clock.cancel();
                self.state = PlaybackState::Completed;
                self.status = StatusMessage::Completed;
            }
            Crossing::Failed(reason) => {
                log::error!("player failed while looping: {}", reason);
                self.clock.cancel();
                self.status = StatusMessage::PlaybackFailed(reason.clone());
                self.state = PlaybackState::Failed(reason);
            }
        }
    }

    fn open_player(&mut self, resource: &AudioResource) -> Result<()> {
        if let Some(mut old) = self.player.take() {
            old.player.stop();
        }
        self.clock.cancel();

        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        let notifier = FinishNotifier::new(id, self.finished_tx.clone());
        match self.factory.create(resource, notifier) {
            Ok(player) => {
                log::info!("created player {:?} for {}", id, resource.name());
                self.player = Some(ActivePlayer {
                    id,
                    resource: resource.id(),
                    player,
                });
                Ok(())
            }
            Err(e) => Err(self.fail_player(format!("{:#}", e))),
        }
    }

    fn restart_from_window_start(&mut self) -> Result<()> {
        let start = self.loop_state.window.start();
        if let Some(active) = self.player.as_mut() {
            if let Err(e) = active.player.set_position(start) {
                return Err(self.fail_player(format!("{:#}", e)));
            }
        }
        self.loop_state.counter.reset();
        self.loop_state.rewind();
        Ok(())
    }

    fn fail_player(&mut self, reason: String) -> SessionError {
        log::error!("playback failed: {}", reason);
        self.clock.cancel();
        self.status = StatusMessage::PlaybackFailed(reason.clone());
        self.state = PlaybackState::Failed(reason.clone());
        SessionError::Player(reason)
    }

    fn require_resource(&mut self) -> Result<()> {
        if self.state.has_resource() && self.loaded_duration > 0.0 {
            return Ok(());
        }
        self.status = StatusMessage::ImportRequired;
        Err(SessionError::NoResource)
    }

    /// Live player position while playing, otherwise the last known progress.
    fn current_position(&self) -> f64 {
        match self.player.as_ref() {
            Some(active) if self.state.is_playing() => active.player.position(),
            _ => self.loop_state.position_at(self.loop_state.progress.fraction),
        }
    }

    fn gain(&self) -> f32 {
        if self.volume_boost {
            self.settings.boost_gain
        } else {
            self.settings.normal_gain
        }
    }

    fn playing_status(&self) -> StatusMessage {
        let counter = self.loop_state.counter;
        StatusMessage::Playing {
            current: counter.current_display(),
            total: counter.requested,
        }
    }

    fn teardown(&mut self) {
        self.clock.cancel();
        if let Some(mut active) = self.player.take() {
            active.player.stop();
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::Sender;
use rodio::source::SeekError;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};

use crate::audio::{AudioData, AudioResource};

/// Identifies one constructed player; a new one is made per fresh `play`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerId(pub u64);

/// Out-of-band "did finish playing" notification from the audio engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerFinished {
    pub player: PlayerId,
}

/// Handed to a player at construction; posts `PlayerFinished` to the control thread.
#[derive(Clone, Debug)]
pub struct FinishNotifier {
    player: PlayerId,
    tx: Sender<PlayerFinished>,
}

impl FinishNotifier {
    pub fn new(player: PlayerId, tx: Sender<PlayerFinished>) -> Self {
        Self { player, tx }
    }

    pub fn notify(&self) {
        // Receiver gone means the session was torn down
        self.tx.send(PlayerFinished { player: self.player }).ok();
    }
}

/// What the loop session needs from a playable audio engine.
///
/// Positions are in seconds of source audio.
pub trait AudioPlayer {
    fn position(&self) -> f64;
    fn set_position(&mut self, seconds: f64) -> Result<()>;
    fn is_playing(&self) -> bool;
    fn set_rate(&mut self, rate: f32);
    fn set_volume(&mut self, volume: f32);
    fn play(&mut self);
    fn pause(&mut self);
    fn stop(&mut self);
}

pub trait PlayerFactory {
    fn create(&mut self, resource: &AudioResource, notifier: FinishNotifier)
        -> Result<Box<dyn AudioPlayer>>;
}

/// Seekable source over decoded samples. Fires its notifier once when it runs dry.
pub struct ResourceSource {
    data: Arc<AudioData>,
    cursor: usize,
    on_finish: Option<FinishNotifier>,
}

impl ResourceSource {
    pub fn new(data: Arc<AudioData>, on_finish: Option<FinishNotifier>) -> Self {
        Self {
            data,
            cursor: 0,
            on_finish,
        }
    }

    fn seek_secs(&mut self, seconds: f64) {
        let channels = self.data.channels.max(1) as usize;
        let frame = (seconds.max(0.0) * self.data.sample_rate as f64) as usize;
        self.cursor = (frame * channels).min(self.data.samples.len());
    }
}

impl Iterator for ResourceSource {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        match self.data.samples.get(self.cursor) {
            Some(&sample) => {
                self.cursor += 1;
                Some(sample)
            }
            None => {
                if let Some(notifier) = self.on_finish.take() {
                    notifier.notify();
                }
                None
            }
        }
    }
}

impl Source for ResourceSource {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.data.samples.len().saturating_sub(self.cursor))
    }

    fn channels(&self) -> u16 {
        self.data.channels
    }

    fn sample_rate(&self) -> u32 {
        self.data.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(self.data.duration_secs()))
    }

    fn try_seek(&mut self, pos: Duration) -> Result<(), SeekError> {
        self.seek_secs(pos.as_secs_f64());
        Ok(())
    }
}

/// `AudioPlayer` backed by a rodio `Sink`.
///
/// The sink drains after the source ends or after `stop`; the next `play` re-queues it.
pub struct RodioPlayer {
    sink: Sink,
    data: Arc<AudioData>,
    notifier: FinishNotifier,
    duration: f64,
    // Where playback resumes when the sink is drained
    parked_at: Option<f64>,
}

impl RodioPlayer {
    fn new(handle: &OutputStreamHandle, resource: &AudioResource, notifier: FinishNotifier) -> Result<Self> {
        let sink = Sink::try_new(handle).context("failed to open audio sink")?;
        Ok(Self::with_sink(sink, resource, notifier))
    }

    fn with_sink(sink: Sink, resource: &AudioResource, notifier: FinishNotifier) -> Self {
        sink.pause();
        Self {
            sink,
            data: resource.data().clone(),
            notifier,
            duration: resource.duration_secs(),
            parked_at: Some(0.0),
        }
    }

    fn requeue(&mut self) {
        let source = ResourceSource::new(self.data.clone(), Some(self.notifier.clone()));
        self.sink.append(source);
        let resume_at = self.parked_at.take().unwrap_or(self.duration);
        if let Err(e) = self.sink.try_seek(Duration::from_secs_f64(resume_at)) {
            log::warn!("could not restore position {:.2}s: {}", resume_at, e);
        }
    }
}

impl AudioPlayer for RodioPlayer {
    fn position(&self) -> f64 {
        if self.sink.empty() {
            return self.parked_at.unwrap_or(self.duration);
        }
        self.sink.get_pos().as_secs_f64().min(self.duration)
    }

    fn set_position(&mut self, seconds: f64) -> Result<()> {
        let seconds = seconds.clamp(0.0, self.duration);
        if self.sink.empty() {
            self.parked_at = Some(seconds);
            return Ok(());
        }
        self.sink
            .try_seek(Duration::from_secs_f64(seconds))
            .map_err(|e| anyhow!("seek to {:.2}s failed: {}", seconds, e))
    }

    fn is_playing(&self) -> bool {
        !self.sink.empty() && !self.sink.is_paused()
    }

    fn set_rate(&mut self, rate: f32) {
        self.sink.set_speed(rate);
    }

    fn set_volume(&mut self, volume: f32) {
        self.sink.set_volume(volume);
    }

    fn play(&mut self) {
        if self.sink.empty() {
            self.requeue();
        }
        self.sink.play();
    }

    fn pause(&mut self) {
        self.sink.pause();
        if self.sink.empty() {
            // Ran off the end before the finish event was handled
            self.parked_at = Some(self.position());
        }
    }

    fn stop(&mut self) {
        // clear() drops the queued source without running it to the end, so no finish fires
        self.sink.clear();
        self.parked_at = Some(0.0);
    }
}

/// Opens players on the default output device.
pub struct RodioPlayerFactory {
    output: Option<(OutputStream, OutputStreamHandle)>,
}

impl RodioPlayerFactory {
    pub fn open() -> Result<Self> {
        let output = OutputStream::try_default().context("no audio output device")?;
        Ok(Self { output: Some(output) })
    }

    /// Like `open`, but a missing device only surfaces once something tries to play.
    pub fn open_or_unavailable() -> Self {
        match Self::open() {
            Ok(factory) => factory,
            Err(e) => {
                log::error!("{:#}", e);
                Self { output: None }
            }
        }
    }
}

impl PlayerFactory for RodioPlayerFactory {
    fn create(&mut self, resource: &AudioResource, notifier: FinishNotifier) -> Result<Box<dyn AudioPlayer>> {
        let (_, handle) = self
            .output
            .as_ref()
            .ok_or_else(|| anyhow!("no audio output device available"))?;
        let player = RodioPlayer::new(handle, resource, notifier)?;
        log::debug!("opened sink for {}", resource.name());
        Ok(Box::new(player))
    }
}

/// Scripted player for driving the session without an audio device.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    pub struct MockState {
        pub duration: f64,
        pub position: f64,
        pub playing: bool,
        pub rate: f32,
        pub volume: f32,
        pub stopped: bool,
        pub seeks: Vec<f64>,
        pub notifier: FinishNotifier,
    }

    pub type Handle = Rc<RefCell<MockState>>;

    pub struct MockPlayer(pub Handle);

    impl AudioPlayer for MockPlayer {
        fn position(&self) -> f64 {
            self.0.borrow().position
        }
        fn set_position(&mut self, seconds: f64) -> Result<()> {
            let mut s = self.0.borrow_mut();
            s.position = seconds;
            s.seeks.push(seconds);
            Ok(())
        }
        fn is_playing(&self) -> bool {
            self.0.borrow().playing
        }
        fn set_rate(&mut self, rate: f32) {
            self.0.borrow_mut().rate = rate;
        }
        fn set_volume(&mut self, volume: f32) {
            self.0.borrow_mut().volume = volume;
        }
        fn play(&mut self) {
            let mut s = self.0.borrow_mut();
            s.playing = true;
            s.stopped = false;
        }
        fn pause(&mut self) {
            self.0.borrow_mut().playing = false;
        }
        fn stop(&mut self) {
            let mut s = self.0.borrow_mut();
            s.playing = false;
            s.stopped = true;
        }
    }

    #[derive(Clone, Default)]
    pub struct MockFactory {
        pub created: Rc<RefCell<Vec<Handle>>>,
        pub fail_with: Rc<RefCell<Option<String>>>,
    }

    impl MockFactory {
        pub fn last(&self) -> Handle {
            self.created.borrow().last().cloned().expect("no player created")
        }

        pub fn count(&self) -> usize {
            self.created.borrow().len()
        }
    }

    impl PlayerFactory for MockFactory {
        fn create(&mut self, resource: &AudioResource, notifier: FinishNotifier) -> Result<Box<dyn AudioPlayer>> {
            if let Some(reason) = self.fail_with.borrow_mut().take() {
                return Err(anyhow!(reason));
            }
            let state = Rc::new(RefCell::new(MockState {
                duration: resource.duration_secs(),
                position: 0.0,
                playing: false,
                rate: 1.0,
                volume: 1.0,
                stopped: false,
                seeks: Vec::new(),
                notifier,
            }));
            self.created.borrow_mut().push(state.clone());
            Ok(Box::new(MockPlayer(state)))
        }
    }

    /// Engine reached the end of the file on its own.
    pub fn finish_naturally(handle: &Handle) {
        let notifier = {
            let mut s = handle.borrow_mut();
            s.position = s.duration;
            s.playing = false;
            s.notifier.clone()
        };
        notifier.notify();
    }
}

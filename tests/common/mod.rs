//! Scripted player shared by the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use loop_practice::audio::{AudioData, AudioResource};
use loop_practice::player::{AudioPlayer, FinishNotifier, PlayerFactory};
use loop_practice::{PlaybackSession, SessionSettings};

pub struct Engine {
    pub position: f64,
    pub duration: f64,
    pub playing: bool,
    pub stopped: bool,
    pub seeks: Vec<f64>,
    pub notifier: FinishNotifier,
}

pub type EngineHandle = Rc<RefCell<Engine>>;

struct ScriptedPlayer(EngineHandle);

impl AudioPlayer for ScriptedPlayer {
    fn position(&self) -> f64 {
        self.0.borrow().position
    }
    fn set_position(&mut self, seconds: f64) -> anyhow::Result<()> {
        let mut e = self.0.borrow_mut();
        e.position = seconds;
        e.seeks.push(seconds);
        Ok(())
    }
    fn is_playing(&self) -> bool {
        self.0.borrow().playing
    }
    fn set_rate(&mut self, _rate: f32) {}
    fn set_volume(&mut self, _volume: f32) {}
    fn play(&mut self) {
        let mut e = self.0.borrow_mut();
        e.playing = true;
        e.stopped = false;
    }
    fn pause(&mut self) {
        self.0.borrow_mut().playing = false;
    }
    fn stop(&mut self) {
        let mut e = self.0.borrow_mut();
        e.playing = false;
        e.stopped = true;
    }
}

#[derive(Clone, Default)]
pub struct Engines(pub Rc<RefCell<Vec<EngineHandle>>>);

impl Engines {
    pub fn current(&self) -> EngineHandle {
        self.0.borrow().last().cloned().expect("no engine created yet")
    }
}

impl PlayerFactory for Engines {
    fn create(
        &mut self,
        resource: &AudioResource,
        notifier: FinishNotifier,
    ) -> anyhow::Result<Box<dyn AudioPlayer>> {
        let engine = Rc::new(RefCell::new(Engine {
            position: 0.0,
            duration: resource.duration_secs(),
            playing: false,
            stopped: false,
            seeks: Vec::new(),
            notifier,
        }));
        self.0.borrow_mut().push(engine.clone());
        Ok(Box::new(ScriptedPlayer(engine)))
    }
}

pub fn resource(secs: f64) -> AudioResource {
    let rate = 1_000;
    AudioResource::new(
        "lesson.mp3",
        AudioData {
            samples: vec![0.0; (secs * rate as f64).round() as usize],
            sample_rate: rate,
            channels: 1,
            title: None,
            artist: None,
        },
    )
    .expect("non-empty resource")
}

pub fn session() -> (PlaybackSession, Engines) {
    let engines = Engines::default();
    (PlaybackSession::new(engines.clone(), SessionSettings::default()), engines)
}

/// Advances the engine in tick-sized steps until it reaches `target`, ticking the session each step.
/// Stops early if a loop boundary is crossed on the way.
pub fn play_until(session: &mut PlaybackSession, engine: &EngineHandle, target: f64) {
    let completed = session.view().completed_loops;
    loop {
        let next = {
            let e = engine.borrow();
            (e.position + 0.1).min(target)
        };
        engine.borrow_mut().position = next;
        session.on_tick();
        if next >= target || session.view().completed_loops != completed {
            break;
        }
    }
}

/// The engine ran off the end of the file and posted its notification.
pub fn run_off_end(engine: &EngineHandle) {
    let notifier = {
        let mut e = engine.borrow_mut();
        e.position = e.duration;
        e.playing = false;
        e.notifier.clone()
    };
    notifier.notify();
}

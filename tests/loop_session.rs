//! End-to-end loop scenarios driven through the public session API.

mod common;

use common::{play_until, resource, run_off_end, session};
use loop_practice::i18n::StatusMessage;
use loop_practice::{LoopWindow, PlayRequest, PlaybackSpeed, PlaybackState, SessionError};

fn request(start: f64, end: f64, loops: i64, speed: PlaybackSpeed) -> PlayRequest {
    PlayRequest {
        start,
        end,
        loops,
        speed,
        volume_boost: false,
    }
}

#[test]
fn two_traversals_of_a_sub_window() {
    let (mut s, engines) = session();
    assert_eq!(s.load(resource(10.0)), PlaybackState::Loaded);
    s.play(request(2.0, 5.0, 2, PlaybackSpeed::Normal)).unwrap();
    let engine = engines.current();

    play_until(&mut s, &engine, 5.0);
    let view = s.view();
    assert_eq!(view.completed_loops, 1);
    assert_eq!(view.current_loop, 2);
    assert_eq!(engine.borrow().position, 2.0);
    assert_eq!(view.state, PlaybackState::Playing);
    assert_eq!(view.status, StatusMessage::Playing { current: 2, total: 2 });

    play_until(&mut s, &engine, 5.0);
    let view = s.view();
    assert_eq!(view.completed_loops, 2);
    assert_eq!(view.state, PlaybackState::Completed);
    assert!(engine.borrow().stopped);
    assert!(!s.is_clock_running());
}

#[test]
fn window_ending_at_file_end_counts_each_loop_once() {
    let (mut s, engines) = session();
    s.load(resource(6.0));
    s.play(request(4.0, 6.0, 3, PlaybackSpeed::Normal)).unwrap();
    let engine = engines.current();

    for expected in 1..=3 {
        // Both sources see the same end: the engine's notification and the next tick
        run_off_end(&engine);
        s.dispatch_pending();
        s.on_tick();
        assert_eq!(s.view().completed_loops, expected);
    }
    assert_eq!(s.state(), &PlaybackState::Completed);
}

#[test]
fn display_formats_position_and_end() {
    let (mut s, engines) = session();
    s.load(resource(3_725.0));
    s.play(request(3_600.0, 3_725.0, 1, PlaybackSpeed::Normal)).unwrap();
    engines.current().borrow_mut().position = 3_661.0;
    s.on_tick();
    let view = s.view();
    assert_eq!(view.display_position, "01:01:01");
    assert_eq!(view.display_end, "01:02:05");
}

#[test]
fn half_speed_progress_uses_stretched_denominator() {
    let (mut s, engines) = session();
    s.load(resource(10.0));
    s.play(request(0.0, 10.0, 1, PlaybackSpeed::Half)).unwrap();
    engines.current().borrow_mut().position = 5.0;
    s.on_tick();
    // 5s into a window that takes (10 - 0) / 0.5 = 20s
    assert!((s.view().progress_fraction - 0.25).abs() < 1e-9);
}

#[test]
fn reset_returns_to_duration_of_latest_load() {
    let (mut s, engines) = session();
    s.load(resource(10.0));
    s.load(resource(7.5));
    s.play(request(0.0, 7.5, 5, PlaybackSpeed::Normal)).unwrap();
    let engine = engines.current();

    engine.borrow_mut().position = 2.0;
    s.mark_loop_start().unwrap();
    engine.borrow_mut().position = 3.0;
    s.mark_loop_end().unwrap();
    engine.borrow_mut().position = 2.5;
    s.mark_loop_end().unwrap();

    assert_eq!(s.reset_window().unwrap(), LoopWindow::full(7.5));
    assert_eq!(s.window(), LoopWindow::full(7.5));
}

#[test]
fn mark_start_after_end_leaves_window_alone() {
    let (mut s, engines) = session();
    s.load(resource(10.0));
    s.play(request(0.0, 5.0, 3, PlaybackSpeed::Normal)).unwrap();
    engines.current().borrow_mut().position = 6.0;

    let before = s.window();
    assert!(matches!(
        s.mark_loop_start(),
        Err(SessionError::MarkRejected { bound: "start", .. })
    ));
    assert_eq!(s.window(), before);
    assert_eq!(s.view().status, StatusMessage::MarkStartRejected(6.0));
}

#[test]
fn transport_is_inert_after_failed_import() {
    let (mut s, _) = session();
    s.fail_load("unsupported format".into());
    assert!(matches!(s.state(), PlaybackState::Failed(_)));
    assert_eq!(s.pause(), PlaybackState::Failed("unsupported format".into()));
    assert!(matches!(s.state(), PlaybackState::Failed(_)));
    assert_eq!(s.stop(), PlaybackState::Failed("unsupported format".into()));
    assert_eq!(s.mark_loop_start().unwrap_err(), SessionError::NoResource);

    s.load(resource(3.0));
    assert_eq!(s.state(), &PlaybackState::Loaded);
}

#[test]
fn load_file_reports_missing_file_as_failed() {
    let (mut s, _) = session();
    let err = s.load_file("/definitely/not/here.mp3").unwrap_err();
    assert!(matches!(err, SessionError::ResourceLoad(_)));
    assert!(matches!(s.state(), PlaybackState::Failed(_)));
    assert!(matches!(s.view().status, StatusMessage::ImportFailed(_)));
}

#[test]
fn pause_then_play_continues_mid_window() {
    let (mut s, engines) = session();
    s.load(resource(10.0));
    s.play(request(1.0, 9.0, 2, PlaybackSpeed::Normal)).unwrap();
    let engine = engines.current();
    play_until(&mut s, &engine, 4.0);

    s.pause();
    assert_eq!(s.view().status, StatusMessage::Paused { current: 1, total: 2 });
    s.play(request(1.0, 9.0, 2, PlaybackSpeed::Normal)).unwrap();
    assert_eq!(engine.borrow().position, 4.0);
    assert!(engine.borrow().playing);
}

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use loop_practice::i18n::{self, Language};
use loop_practice::player::RodioPlayerFactory;
use loop_practice::{gui, PlayRequest, PlaybackSession, PlaybackSpeed, PlaybackState, SessionSettings};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Copy, ValueEnum)]
enum Lang {
    Zh,
    En,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    input: Option<PathBuf>,
    /// Loop window start in seconds
    #[arg(short, long)]
    start: Option<f64>,
    /// Loop window end in seconds (defaults to the end of the file)
    #[arg(short, long)]
    end: Option<f64>,
    #[arg(short, long)]
    loops: Option<u32>,
    /// One of 1.0, 0.85, 0.75, 0.5
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
    #[arg(long)]
    boost: bool,
    #[arg(long)]
    gui: bool,
    #[arg(long, value_enum, default_value_t = Lang::Zh)]
    lang: Lang,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    i18n::set_language(match cli.lang {
        Lang::Zh => Language::Zh,
        Lang::En => Language::En,
    });

    let mut settings = SessionSettings::default();
    if let Some(loops) = cli.loops {
        settings.default_loops = loops.max(1);
    }

    let input_path = match cli.input.clone() {
        Some(path) if !cli.gui => path,
        initial => return gui::run(initial, settings),
    };

    let speed = PlaybackSpeed::from_factor(cli.speed)?;
    let factory = RodioPlayerFactory::open()?;
    let mut session = PlaybackSession::new(factory, settings.clone());

    println!("Loading audio: {:?}", input_path);
    session
        .load_file(&input_path)
        .with_context(|| format!("could not load {}", input_path.display()))?;
    let duration = session.window().total();
    println!("Audio loaded. Duration: {:.1}s", duration);

    let request = PlayRequest {
        start: cli.start.unwrap_or(0.0),
        end: cli.end.unwrap_or(duration),
        loops: settings.default_loops as i64,
        speed,
        volume_boost: cli.boost,
    };
    session.play(request).context("cannot start playback")?;
    println!("Playing... (Ctrl+C to stop)");

    let mut last_status = String::new();
    while session.state().is_playing() {
        session.wait_next_event(Duration::from_secs(1));
        let view = session.view();
        if view.status_message != last_status {
            println!("{}", view.status_message);
            last_status = view.status_message;
        }
    }

    if let PlaybackState::Failed(reason) = session.state() {
        bail!("playback failed: {}", reason);
    }
    Ok(())
}

mod shared;
mod tui;
mod audio_api;
mod audio;
mod bounce;
mod middle;
mod pipeline;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use anyhow::Context;
use crossbeam_channel::Sender;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use audio::VoiceEngine;
use middle::{split_rng, Middle};
use pipeline::{AnalysisError, AnalysisResult, Analyzer, HeuristicAnalyzer, ScanConfig, SidecarAnalyzer};
use shared::InputEvent;

const USAGE: &str = "usage: synesthesia <image> [--analysis <file.json>] [--config <file.json>] \
                     [--seed <u64>] [--bounce <out.wav>] [--seconds <f64>] [--log <path>]";
const DEFAULT_LOG: &str = "synesthesia.log";

type AnalysisMessage = (u64, Result<AnalysisResult, AnalysisError>);

#[derive(Debug, PartialEq)]
struct Args {
    image: PathBuf,
    analysis: Option<PathBuf>,
    config: Option<PathBuf>,
    seed: Option<u64>,
    bounce: Option<PathBuf>,
    seconds: Option<f64>,
    log: PathBuf,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> anyhow::Result<Args> {
    let mut image = None;
    let mut parsed = Args {
        image: PathBuf::new(),
        analysis: None,
        config: None,
        seed: None,
        bounce: None,
        seconds: None,
        log: PathBuf::from(DEFAULT_LOG),
    };
    while let Some(arg) = args.next() {
        let mut value = || args.next().with_context(|| format!("{arg} needs a value\n{USAGE}"));
        match arg.as_str() {
            "--analysis" => parsed.analysis = Some(value()?.into()),
            "--config" => parsed.config = Some(value()?.into()),
            "--bounce" => parsed.bounce = Some(value()?.into()),
            "--log" => parsed.log = value()?.into(),
            "--seed" => parsed.seed = Some(value()?.parse().context("--seed must be an integer")?),
            "--seconds" => {
                parsed.seconds = Some(value()?.parse().context("--seconds must be a number")?)
            }
            flag if flag.starts_with("--") => anyhow::bail!("unknown option {flag}\n{USAGE}"),
            _ if image.is_none() => image = Some(PathBuf::from(&arg)),
            _ => anyhow::bail!("more than one image given\n{USAGE}"),
        }
    }
    parsed.image = image.context(USAGE)?;
    Ok(parsed)
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    // the tui owns the terminal, so logs go to a file
    let log_file = std::fs::File::create(&args.log)
        .with_context(|| format!("cannot open log file {}", args.log.display()))?;
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .init();

    let config = match &args.config {
        Some(path) => ScanConfig::load(path)
            .with_context(|| format!("cannot read config {}", path.display()))?,
        None => ScanConfig::default(),
    };
    let analyzer = pick_analyzer(&args);

    if let Some(out) = &args.bounce {
        return bounce::run(&args.image, analyzer.as_ref(), config, args.seed, args.seconds, out);
    }

    terminal::enable_raw_mode()?;
    let _guard = RawModeGuard; // auto drops when out of scope
    let audio = audio::start_audio()?;

    let (extractor_rng, voice_rng) = split_rng(args.seed);
    let voice = VoiceEngine::new(audio.sender(), voice_rng);
    let mut middle = Middle::new(config, voice, extractor_rng);

    let (results_tx, results_rx) = crossbeam_channel::unbounded::<AnalysisMessage>();
    start_load(&mut middle, &args.image, &analyzer, &results_tx);

    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let tick_rate = std::time::Duration::from_millis(16); // ~60fps
    let mut last_tick = Instant::now();
    let mut last_refresh = Instant::now();
    let mut ds = middle.display_state();
    let mut seen_version = middle.score_version();
    let mut dirty = false; // something other than the score changed
    let mut tui_state = tui::mode::TuiState::default();

    loop {
        while let Ok((ticket, result)) = results_rx.try_recv() {
            middle.on_analysis_complete(ticket, result);
            dirty = true;
        }

        // the display snapshot clones the score, so it is throttled
        let score_moved = middle.score_version() != seen_version
            && last_refresh.elapsed() >= shared::SCORE_REFRESH;
        if dirty || score_moved {
            ds = middle.display_state();
            seen_version = middle.score_version();
            last_refresh = Instant::now();
            dirty = false;
        }
        let vs = middle.visual_state();

        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, &vs, &tui_state);
        })?;

        let events = tui::input::poll_input(tick_rate, &mut tui_state)?;
        for event in events {
            match event {
                InputEvent::Quit => {
                    log::info!("quit");
                    drop(term);
                    drop(audio);
                    return Ok(());
                }
                InputEvent::Load => start_load(&mut middle, &args.image, &analyzer, &results_tx),
                other => middle.handle_input(other),
            }
            dirty = true;
        }

        let elapsed = last_tick.elapsed().as_secs_f64();
        last_tick = Instant::now();
        middle.tick(elapsed);
    }
}

// an explicit analysis file wins, then a sidecar next to the image, then the heuristic
fn pick_analyzer(args: &Args) -> Arc<dyn Analyzer> {
    if let Some(path) = &args.analysis {
        return Arc::new(SidecarAnalyzer::new(path));
    }
    let sidecar = SidecarAnalyzer::beside(&args.image);
    if sidecar.path().exists() {
        log::info!("using analysis from {}", sidecar.path().display());
        return Arc::new(sidecar);
    }
    let title = args
        .image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Arc::new(HeuristicAnalyzer::new(title))
}

// Sample the image here, analyse it on a worker; the result comes back
// through `results` with the ticket it was issued under.
fn start_load(
    middle: &mut Middle,
    image: &Path,
    analyzer: &Arc<dyn Analyzer>,
    results: &Sender<AnalysisMessage>,
) {
    let grid = match pipeline::load_grid(image) {
        Ok(grid) => grid,
        Err(e) => {
            middle.load_failed(format!("could not load {}: {e}", image.display()));
            return;
        }
    };
    let worker_grid = grid.clone();
    let ticket = middle.begin_analysis(grid);
    let analyzer = Arc::clone(analyzer);
    let results = results.clone();
    std::thread::spawn(move || {
        let result = analyzer.analyze(&worker_grid);
        // a closed channel means the app is quitting
        let _ = results.send((ticket, result));
    });
}

struct RawModeGuard;
impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

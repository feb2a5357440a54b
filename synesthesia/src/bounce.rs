// Headless render: the same controller and engine as the live app, driven
// block by block instead of by the terminal loop, written to a WAV file.

use std::path::Path;

use anyhow::Context;
use crossbeam_channel::Receiver;

use crate::audio::{command_channel, Engine, SampleBuffer, StereoFrame, VoiceEngine};
use crate::audio_api::AudioCommand;
use crate::middle::{split_rng, Middle};
use crate::pipeline::{self, Analyzer, ScanConfig};

pub const SAMPLE_RATE: u32 = 44_100;
const BLOCK_SIZE: usize = 64;
const MAX_SECONDS: f64 = 600.0;

/// Play a ready controller for `seconds` (one loop when None) and collect
/// what the engine produces.
pub fn render(
    middle: &mut Middle,
    rx: &Receiver<AudioCommand>,
    seconds: Option<f64>,
) -> anyhow::Result<SampleBuffer> {
    let seconds = match seconds {
        Some(s) => s,
        None => middle.loop_seconds().context("nothing to bounce: no grid loaded")?,
    };
    anyhow::ensure!(seconds.is_finite() && seconds > 0.0, "bounce length must be positive");
    let seconds = seconds.min(MAX_SECONDS);
    anyhow::ensure!(
        middle.play(),
        "cannot bounce from state {}",
        middle.phase().label()
    );

    let mut engine = Engine::new(SAMPLE_RATE);
    let mut buffer = SampleBuffer::new(SAMPLE_RATE);
    let mut block = [StereoFrame::zero(); BLOCK_SIZE];
    let total = (seconds * SAMPLE_RATE as f64).ceil() as usize;
    let dt = BLOCK_SIZE as f64 / SAMPLE_RATE as f64;

    while buffer.data.len() < total {
        middle.tick(dt);
        for cmd in rx.try_iter() {
            engine.handle_cmd(cmd);
        }
        engine.render_block(&mut block);
        let n = BLOCK_SIZE.min(total - buffer.data.len());
        buffer.push_block(&block[..n]);
    }
    middle.stop();
    Ok(buffer)
}

pub fn run(
    image: &Path,
    analyzer: &dyn Analyzer,
    config: ScanConfig,
    seed: Option<u64>,
    seconds: Option<f64>,
    out: &Path,
) -> anyhow::Result<()> {
    let (tx, rx) = command_channel();
    let (extractor_rng, voice_rng) = split_rng(seed);
    let mut middle = Middle::new(config, VoiceEngine::new(tx, voice_rng), extractor_rng);

    let grid = pipeline::load_grid(image)
        .with_context(|| format!("failed to load {}", image.display()))?;
    let analysis = analyzer.analyze(&grid);
    let ticket = middle.begin_analysis(grid);
    middle.on_analysis_complete(ticket, analysis);
    if let crate::middle::Phase::Error(msg) = middle.phase() {
        anyhow::bail!("analysis failed: {msg}");
    }

    let buffer = render(&mut middle, &rx, seconds)?;
    buffer
        .write_wav(out)
        .with_context(|| format!("failed to write {}", out.display()))?;
    log::info!(
        "bounced {:.1}s to {} (peak {:.3})",
        buffer.duration_secs(),
        out.display(),
        buffer.peak()
    );
    Ok(())
}

use anyhow::Context;
use crossbeam_channel::{Receiver, Sender};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::audio_api::AudioCommand;

mod effect;
mod engine;
mod frame;
mod instrument;
mod sample_buffer;
mod synth;
mod voice;

pub use engine::Engine;
pub use frame::StereoFrame;
pub use instrument::{Instrument, Waveform};
pub use sample_buffer::SampleBuffer;
pub use synth::VoiceEngine;
#[cfg(test)]
pub use synth::AudioState;

pub const COMMAND_QUEUE: usize = 1024;

pub fn command_channel() -> (Sender<AudioCommand>, Receiver<AudioCommand>) {
    crossbeam_channel::bounded(COMMAND_QUEUE)
}

pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    sample_rate: u32,
    _output_stream: cpal::Stream,
}

impl AudioHandle {
    // the voice engine talks to the stream through clones of this
    pub fn sender(&self) -> Sender<AudioCommand> {
        self.tx.clone()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = command_channel();

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let output_stream =
                build_output_stream_f32(&device, &config.into(), rx, sample_rate, channels)?;
            output_stream.play().context("failed to play output stream")?;
            log::info!("audio output running at {sample_rate} Hz, {channels} channels");

            Ok(AudioHandle { tx, sample_rate, _output_stream: output_stream })
        }
        other => anyhow::bail!("unsupported sample format {other:?} (only f32 supported for now)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    sample_rate: u32,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut engine = Engine::new(sample_rate);
    let mut scratch: Vec<StereoFrame> = Vec::with_capacity(4096);

    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            scratch.resize(n_frames, StereoFrame::zero());
            engine.render_block(&mut scratch);

            // spread the stereo frames over however many channels the device has
            for (out, frame) in data.chunks_exact_mut(channels.max(1)).zip(scratch.iter()) {
                match out {
                    [mono] => *mono = (frame.left + frame.right) * 0.5,
                    [l, r, rest @ ..] => {
                        *l = frame.left;
                        *r = frame.right;
                        rest.fill(0.0);
                    }
                    [] => {}
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

use super::effect::{Effect, Reverb};
use super::frame::StereoFrame;
use super::voice::Voice;
use crate::audio_api::AudioCommand;

const MASTER_GAIN: f32 = 0.3; // headroom for unbounded polyphony

pub struct Engine {
    sample_rate: f32,
    voices: Vec<Voice>, // no cap, finished voices are swept after each block
    reverb: Reverb,
    suspended: bool,
}

impl Engine {
    // starts suspended; nothing sounds until a Resume arrives
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate as f32,
            voices: Vec::with_capacity(64),
            reverb: Reverb::new(sample_rate as f32),
            suspended: true,
        }
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Trigger(spec) => self.voices.push(Voice::new(&spec, self.sample_rate)),
            AudioCommand::Suspend => self.suspended = true,
            AudioCommand::Resume => self.suspended = false,
        }
    }

    #[cfg(test)]
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    #[cfg(test)]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        if self.suspended {
            // timeline frozen: voices and reverb tail keep their state
            out.fill(StereoFrame::zero());
            return;
        }

        for frame in out.iter_mut() {
            let mut mix = 0.0f32;
            for v in &mut self.voices {
                mix += v.next_sample();
            }
            *frame = StereoFrame::mono(mix * MASTER_GAIN);
        }
        self.voices.retain(|v| !v.is_done());

        self.reverb.process(out);
    }
}

use std::path::Path;
use super::frame::StereoFrame;

// Offline capture of the engine output, written out as a 16-bit stereo WAV.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>, // the rendered audio
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(sample_rate: u32) -> Self {
        Self { data: Vec::new(), sample_rate }
    }

    pub fn push_block(&mut self, block: &[StereoFrame]) {
        self.data.extend_from_slice(block);
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.data.len() as f64 / self.sample_rate as f64
    }

    // loudest absolute sample on either side
    pub fn peak(&self) -> f32 {
        self.data
            .iter()
            .fold(0.0f32, |acc, f| acc.max(f.left.abs()).max(f.right.abs()))
    }

    pub fn write_wav(&self, path: &Path) -> anyhow::Result<()> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        let max = i16::MAX as f32;
        for frame in &self.data {
            // clip rather than wrap on overs
            writer.write_sample((frame.left.clamp(-1.0, 1.0) * max) as i16)?;
            writer.write_sample((frame.right.clamp(-1.0, 1.0) * max) as i16)?;
        }
        writer.finalize()?;
        Ok(())
    }
}

use super::frame::StereoFrame;

pub trait Effect: Send {
    fn process(&mut self, buf: &mut [StereoFrame]);
}

// comb and allpass delay lengths in samples at 48k, scaled to the real rate
const COMB_DELAYS: [usize; 4] = [1557, 1617, 1491, 1422];
const ALLPASS_DELAYS: [usize; 2] = [225, 556];
const ALLPASS_GAIN: f32 = 0.5;

struct Delay {
    buf: Vec<f32>,
    pos: usize,
}

impl Delay {
    fn new(base: usize, sample_rate: f32) -> Self {
        let len = ((base as f32 * sample_rate / 48_000.0) as usize).max(1);
        Self { buf: vec![0.0; len], pos: 0 }
    }

    #[inline]
    fn read(&self) -> f32 {
        self.buf[self.pos]
    }

    #[inline]
    fn write_and_advance(&mut self, v: f32) {
        self.buf[self.pos] = v;
        self.pos = (self.pos + 1) % self.buf.len();
    }
}

/// Schroeder room: four damped combs in parallel into two allpasses.
/// The wet signal is added on top of the dry one.
pub struct Reverb {
    combs: [Delay; 4],
    comb_filter: [f32; 4], // one-pole lowpass in each comb feedback path
    allpasses: [Delay; 2],
    decay: f32,
    damping: f32,
    wet: f32,
}

impl Reverb {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            combs: COMB_DELAYS.map(|d| Delay::new(d, sample_rate)),
            comb_filter: [0.0; 4],
            allpasses: ALLPASS_DELAYS.map(|d| Delay::new(d, sample_rate)),
            decay: 0.84,
            damping: 0.3,
            wet: 0.6,
        }
    }

    #[inline]
    fn tick(&mut self, input: f32) -> f32 {
        let mut wet = 0.0;
        for (comb, lp) in self.combs.iter_mut().zip(self.comb_filter.iter_mut()) {
            let delayed = comb.read();
            *lp = delayed * (1.0 - self.damping) + *lp * self.damping;
            comb.write_and_advance(input + *lp * self.decay);
            wet += delayed;
        }
        wet *= 0.25;

        for ap in &mut self.allpasses {
            let delayed = ap.read();
            let out = -ALLPASS_GAIN * wet + delayed;
            ap.write_and_advance(wet + ALLPASS_GAIN * delayed);
            wet = out;
        }
        wet
    }
}

impl Effect for Reverb {
    fn process(&mut self, buf: &mut [StereoFrame]) {
        for f in buf.iter_mut() {
            let wet = self.tick((f.left + f.right) * 0.5) * self.wet;
            f.left += wet;
            f.right += wet;
        }
    }
}

use std::f32::consts::{PI, TAU};

use super::instrument::Waveform;
use crate::audio_api::{EnvelopeSpec, VoiceSpec};

const ENVELOPE_FLOOR: f32 = 0.001;

// ensemble voice
const SWEEP_LOW_HZ: f32 = 600.0;
const SWEEP_HIGH_HZ: f32 = 3000.0;
const FILTER_Q: f32 = 1.0;
const VIBRATO_HZ: f32 = 5.0;
const VIBRATO_DEPTH_HZ: f32 = 8.0;

#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    2.0_f32.powf(cents / 1200.0)
}

// None once the envelope has run its course
pub fn envelope_gain(env: &EnvelopeSpec, t: f32) -> Option<f32> {
    if env.peak <= 0.0 || t >= env.length() {
        return None;
    }
    if t < env.attack {
        return Some(env.peak * t / env.attack);
    }
    let s = (t - env.attack) / env.release;
    Some(env.peak * (ENVELOPE_FLOOR / env.peak).powf(s))
}

// lowpass cutoff for the ensemble voice: opens with the attack, closes with the release
fn sweep_cutoff(env: &EnvelopeSpec, t: f32) -> f32 {
    if t < env.attack {
        SWEEP_LOW_HZ + (SWEEP_HIGH_HZ - SWEEP_LOW_HZ) * t / env.attack
    } else {
        let s = ((t - env.attack) / env.release).min(1.0);
        SWEEP_HIGH_HZ * (SWEEP_LOW_HZ / SWEEP_HIGH_HZ).powf(s)
    }
}

#[derive(Clone, Copy, Debug)]
struct Osc {
    phase: f32, // 0..1
    freq: f32,
    waveform: Waveform,
}

impl Osc {
    fn new(freq: f32, waveform: Waveform) -> Self {
        Self { phase: 0.0, freq, waveform }
    }

    #[inline]
    fn next(&mut self, offset_hz: f32, sample_rate: f32) -> f32 {
        let out = match self.waveform {
            Waveform::Sine => (self.phase * TAU).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (self.phase - 0.5).abs(),
            Waveform::Square => {
                if self.phase < 0.5 { 1.0 } else { -1.0 }
            }
            Waveform::Saw => 2.0 * self.phase - 1.0,
        };
        self.phase += (self.freq + offset_hz).max(0.0) / sample_rate;
        self.phase -= self.phase.floor();
        out
    }
}

// Topology-preserving state variable filter, lowpass tap only.
#[derive(Clone, Copy, Debug, Default)]
struct Lowpass {
    ic1eq: f32,
    ic2eq: f32,
    a1: f32,
    a2: f32,
    a3: f32,
    k: f32,
}

impl Lowpass {
    fn new(q: f32) -> Self {
        Self { k: 1.0 / q, ..Self::default() }
    }

    fn set_cutoff(&mut self, cutoff: f32, sample_rate: f32) {
        let cutoff = cutoff.clamp(20.0, sample_rate * 0.45);
        let g = (PI * cutoff / sample_rate).tan();
        self.a1 = 1.0 / (1.0 + g * (g + self.k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let v3 = input - self.ic2eq;
        let v1 = self.a1 * self.ic1eq + self.a2 * v3;
        let v2 = self.ic2eq + self.a2 * self.ic1eq + self.a3 * v3;
        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;
        v2
    }
}

#[derive(Clone, Debug)]
pub struct Voice {
    primary: Osc,
    second: Option<Osc>,
    filter: Option<Lowpass>, // only the ensemble voice is filtered
    env: EnvelopeSpec,
    t: f32,
    dt: f32,
    sample_rate: f32,
    done: bool,
}

impl Voice {
    pub fn new(spec: &VoiceSpec, sample_rate: f32) -> Self {
        let (primary, second, filter) = match *spec {
            VoiceSpec::Tone { freq, detune_cents, waveform, .. } => {
                (Osc::new(freq * cents_to_ratio(detune_cents), waveform), None, None)
            }
            VoiceSpec::Ensemble { freq, detune_cents, .. } => (
                Osc::new(freq, Waveform::Saw),
                Some(Osc::new(freq * cents_to_ratio(detune_cents), Waveform::Saw)),
                Some(Lowpass::new(FILTER_Q)),
            ),
        };
        Self {
            primary,
            second,
            filter,
            env: *spec.env(),
            t: 0.0,
            dt: 1.0 / sample_rate,
            sample_rate,
            done: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn next_sample(&mut self) -> f32 {
        if self.done {
            return 0.0;
        }
        let Some(gain) = envelope_gain(&self.env, self.t) else {
            self.done = true;
            return 0.0;
        };

        let sr = self.sample_rate;
        let raw = match (self.second.as_mut(), self.filter.as_mut()) {
            (Some(second), Some(filter)) => {
                let vibrato = VIBRATO_DEPTH_HZ * (TAU * VIBRATO_HZ * self.t).sin();
                let mix = self.primary.next(vibrato, sr) + second.next(vibrato, sr);
                filter.set_cutoff(sweep_cutoff(&self.env, self.t), sr);
                filter.process(mix)
            }
            _ => self.primary.next(0.0, sr),
        };

        self.t += self.dt;
        raw * gain
    }
}

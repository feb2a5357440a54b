pub use crate::audio::Waveform;

// Linear rise to `peak` over `attack`, then exponential fall to 0.001 over
// `release`. Seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeSpec {
    pub attack: f32,
    pub release: f32,
    pub peak: f32,
}

impl EnvelopeSpec {
    pub fn length(&self) -> f32 {
        self.attack + self.release
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum VoiceSpec {
    // one oscillator straight into its envelope
    Tone {
        freq: f32,
        detune_cents: f32,
        waveform: Waveform,
        env: EnvelopeSpec,
    },
    // two saws (the second detuned), vibrato, lowpass swept with the envelope
    Ensemble {
        freq: f32,
        detune_cents: f32,
        env: EnvelopeSpec,
    },
}

impl VoiceSpec {
    pub fn env(&self) -> &EnvelopeSpec {
        match self {
            VoiceSpec::Tone { env, .. } | VoiceSpec::Ensemble { env, .. } => env,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum AudioCommand {
    // Start a new voice now. There is no voice cap; finished voices are
    // dropped by the engine.
    Trigger(VoiceSpec),

    // Freeze / unfreeze the whole output timeline. Suspended voices keep
    // their place and carry on after Resume.
    Suspend,
    Resume,
}

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Synth,
    Pad,
    Pluck,
    Drone,
    Chime,
    Bass,
    #[serde(rename = "8-bit")]
    EightBit,
    Violin,
    Flute,
    Organ,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Saw,
}

// How an instrument sounds, as data. `waveform: None` means the colour of the
// cell picks it. Times are in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Recipe {
    pub attack: f32,
    pub release: f32,
    pub waveform: Option<Waveform>,
    pub gain: f32,
    pub release_follows_reverb: bool,
    pub detunes: bool,  // roughness detune allowed
    pub ensemble: bool, // two detuned saws through a swept lowpass
}

const STANDARD: Recipe = Recipe {
    attack: 0.05,
    release: 1.5,
    waveform: None,
    gain: 0.4,
    release_follows_reverb: true,
    detunes: true,
    ensemble: false,
};

impl Instrument {
    #[cfg(test)]
    pub const ALL: [Instrument; 10] = [
        Instrument::Synth,
        Instrument::Pad,
        Instrument::Pluck,
        Instrument::Drone,
        Instrument::Chime,
        Instrument::Bass,
        Instrument::EightBit,
        Instrument::Violin,
        Instrument::Flute,
        Instrument::Organ,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Instrument::Synth => "synth",
            Instrument::Pad => "pad",
            Instrument::Pluck => "pluck",
            Instrument::Drone => "drone",
            Instrument::Chime => "chime",
            Instrument::Bass => "bass",
            Instrument::EightBit => "8-bit",
            Instrument::Violin => "violin",
            Instrument::Flute => "flute",
            Instrument::Organ => "organ",
        }
    }

    pub fn recipe(self) -> Recipe {
        match self {
            Instrument::Synth | Instrument::Flute | Instrument::Organ => STANDARD,
            Instrument::Pad => Recipe { attack: 1.0, release: 3.0, ..STANDARD },
            Instrument::Pluck => Recipe { attack: 0.01, release: 0.3, ..STANDARD },
            Instrument::Drone => Recipe { attack: 2.0, release: 5.0, ..STANDARD },
            Instrument::Chime => Recipe {
                attack: 0.01,
                release: 2.5,
                waveform: Some(Waveform::Sine),
                ..STANDARD
            },
            Instrument::Bass => Recipe {
                attack: 0.05,
                release: 0.4,
                waveform: Some(Waveform::Triangle),
                ..STANDARD
            },
            Instrument::EightBit => Recipe {
                attack: 0.001,
                release: 0.1,
                waveform: Some(Waveform::Square),
                detunes: false,
                ..STANDARD
            },
            Instrument::Violin => Recipe {
                attack: 0.8,
                release: 3.5,
                waveform: Some(Waveform::Saw),
                gain: 0.2,
                release_follows_reverb: false,
                detunes: false,
                ensemble: true,
            },
        }
    }

    // instrument-specific register shifts applied to the scale pitch
    pub fn shape_pitch(self, note: i32) -> i32 {
        match self {
            Instrument::Chime => note + 24,
            Instrument::Bass => (note - 12).max(28),
            Instrument::Violin => {
                let lifted = if note < 55 { note + 12 } else { note };
                lifted.max(55)
            }
            _ => note,
        }
    }
}

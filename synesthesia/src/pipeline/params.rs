// What the analysis step hands back: musical parameters plus art metadata.
// Field names follow the JSON documents the analyzer reads and writes.

use serde::{Deserialize, Deserializer, Serialize};

use crate::audio::Instrument;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    #[default]
    Major,
    Minor,
    Pentatonic,
    Chromatic,
    Wholetone,
}

impl Scale {
    // semitone offsets within one octave
    pub fn intervals(self) -> &'static [u8] {
        match self {
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Minor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Pentatonic => &[0, 3, 5, 7, 10],
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Scale::Wholetone => &[0, 2, 4, 6, 8, 10],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Scale::Major => "major",
            Scale::Minor => "minor",
            Scale::Pentatonic => "pentatonic",
            Scale::Chromatic => "chromatic",
            Scale::Wholetone => "wholetone",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioParams {
    #[serde(deserialize_with = "rounded_tempo")]
    pub tempo: u32,
    pub scale: Scale,
    pub roughness: f32, // 0-1, clean to gritty
    pub density: f32,   // 0-1, sparse to busy
    pub reverb: f32,    // 0-1, dry to wet
    pub instrument: Instrument,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            tempo: 90,
            scale: Scale::Major,
            roughness: 0.2,
            density: 0.5,
            reverb: 0.4,
            instrument: Instrument::Synth,
        }
    }
}

// analysis documents may carry a fractional bpm
fn rounded_tempo<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    let bpm = f64::deserialize(d)?;
    Ok(bpm.round().max(0.0) as u32)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtMetadata {
    pub title: String,
    pub artist_style: String,
    pub mood: String,
    pub description: String,
    pub color_palette: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub metadata: ArtMetadata,
    pub audio_params: AudioParams,
}

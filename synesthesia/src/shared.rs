// The current input plan:
//
// Transport:
//   Space         //  PlayPress (play from column 0 / stop)
//   r             //  Reset (drop the image, grid, and every note history)
//   l             //  Load (sample + analyse the command-line image again)
//
// Runtime config:
//   [ / ]         //  AdjustTempo(-5 or 5)
//   - / =         //  AdjustIntensity(-0.25 or 0.25)
//   1 2 3 4       //  TogglePart(Melody / Bass / Harmony / Percussion)
//   m b h p       //  CycleInstrument(Melody / Bass / Harmony / Percussion)
//
// Quit:
//   Esc / q       //  Quit
//
// The idea of the rendering process:
//   - Only the middle layer owns the grid, the scan clock, held notes and the
//     note histories. The TUI renders snapshots and nothing else.
//      - `middle.display_state()` is refreshed at most every SCORE_REFRESH (or
//        right after input), since it clones the score.
//      - `middle.visual_state()` is cheap and is read every frame; it is all
//        the scan strip gets (position, playing flag, intensity).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::audio::Instrument;
use crate::pipeline::{NoteEvent, Scale};

// grid sampling
pub const SCAN_COLUMNS: u32 = 512;
pub const SCAN_ROWS: u32 = 32;
pub const MIN_SCAN_WIDTH: u32 = 512;
pub const MAX_SCAN_WIDTH: u32 = 2048;

// runtime ranges
pub const MIN_TEMPO: u32 = 10;
pub const MAX_TEMPO: u32 = 240;
pub const MAX_VISUAL_INTENSITY: f32 = 5.0;
pub const DEFAULT_VISUAL_INTENSITY: f32 = 1.5;

// score view
pub const SCORE_WINDOW_COLUMNS: usize = 200;
pub const MIN_PITCH: u8 = 48; // C3
pub const MAX_PITCH: u8 = 84; // C6
pub const SCORE_REFRESH: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Part {
    Melody,
    Bass,
    Harmony,
    Percussion,
}

impl Part {
    pub const ALL: [Part; 4] = [Part::Melody, Part::Bass, Part::Harmony, Part::Percussion];

    pub fn index(self) -> usize {
        match self {
            Part::Melody => 0,
            Part::Bass => 1,
            Part::Harmony => 2,
            Part::Percussion => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Part::Melody => "melody",
            Part::Bass => "bass",
            Part::Harmony => "harmony",
            Part::Percussion => "percussion",
        }
    }

    // how many finished notes the score keeps for this part
    pub fn history_capacity(self) -> usize {
        match self {
            Part::Harmony => 10,
            _ => 20,
        }
    }

    // the instruments a user may pick for this part
    pub fn instrument_options(self) -> &'static [Instrument] {
        use Instrument::*;
        match self {
            Part::Melody => &[Synth, Violin, Flute, Pluck, Chime, Organ],
            Part::Harmony => &[Pad, Drone, Synth, Organ],
            Part::Bass => &[Bass, Drone, Synth],
            Part::Percussion => &[EightBit, Pluck, Chime],
        }
    }

    pub fn default_instrument(self) -> Instrument {
        match self {
            Part::Melody => Instrument::Synth,
            Part::Bass => Instrument::Bass,
            Part::Harmony => Instrument::Pad,
            Part::Percussion => Instrument::EightBit,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    PlayPress,
    Reset,
    Load,
    AdjustTempo(i32),
    AdjustIntensity(f32),
    TogglePart(Part),
    CycleInstrument(Part),
    Quit,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartStatus {
    pub part: Part,
    pub instrument: Instrument,
    pub enabled: bool,
}

#[derive(Clone, Debug)]
pub struct DisplayState {
    pub phase_label: &'static str, // "EMPTY", "ANALYZING", "READY", "PLAYING", "ERROR"
    pub playing: bool,
    pub title: String,
    pub artist_style: String,
    pub mood: String,
    pub status_text: String, // last error or load message
    pub tempo: u32,
    pub scale: Option<Scale>,
    pub parts: [PartStatus; 4],
    pub visual_intensity: f32,
    pub column_brightness: Vec<f32>, // mean brightness per grid column, empty without a grid
    pub score: ScoreView,
}

// What the visualizer is allowed to see each frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualState {
    pub scan_pos: f64,
    pub is_playing: bool,
    pub intensity: f32,
}

// finished notes of the enabled parts plus the playhead column
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScoreView {
    pub notes: Vec<NoteEvent>,
    pub current_column: usize,
}

// Per-column rules that turn one slice of the grid into bass, harmony,
// melody and percussion notes. Everything that must survive between columns
// lives in `EngineState`, which the transport owns.

use rand::rngs::StdRng;
use rand::Rng;

use super::config::ScanConfig;
use super::grid::{mean_brightness, GridCell};
use super::score::{NoteEvent, Score};
use crate::audio::Instrument;
use crate::shared::Part;

// Anything that can sound a note and report its pitch.
pub trait Voicer {
    fn trigger_as(
        &mut self,
        instrument: Instrument,
        y: f32,
        intensity: f32,
        color: [f32; 3],
    ) -> Option<u8>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HeldNote {
    pub y: f32,
}

#[derive(Clone, Debug, Default)]
pub struct EngineState {
    pub held_melody: Option<HeldNote>,
    pub held_bass: Option<HeldNote>,
    // at most one unfinished note per held part
    pub active_melody: Option<NoteEvent>,
    pub active_bass: Option<NoteEvent>,
    pub last_brightness: f32, // percussion baseline
    pub score: Score,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    fn active_slot(&mut self, part: Part) -> Option<&mut Option<NoteEvent>> {
        match part {
            Part::Melody => Some(&mut self.active_melody),
            Part::Bass => Some(&mut self.active_bass),
            _ => None,
        }
    }

    // Close the active note of a held part at `column` and move it to the score.
    pub fn finalize(&mut self, part: Part, column: usize) {
        let Some(mut note) = self.active_slot(part).and_then(Option::take) else {
            return;
        };
        note.duration_in_columns = column.saturating_sub(note.start_column);
        self.score.record(note);
    }

    // Finalize and forget a held part; other parts have nothing to hold.
    pub fn release(&mut self, part: Part, column: usize) {
        self.finalize(part, column);
        match part {
            Part::Melody => self.held_melody = None,
            Part::Bass => self.held_bass = None,
            _ => {}
        }
    }

    // End both held parts, e.g. when the loop restarts or playback stops.
    pub fn release_held(&mut self, column: usize) {
        self.release(Part::Melody, column);
        self.release(Part::Bass, column);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Which parts play and with what.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PartSetup {
    instruments: [Instrument; 4],
    enabled: [bool; 4],
}

impl Default for PartSetup {
    fn default() -> Self {
        Self {
            instruments: Part::ALL.map(Part::default_instrument),
            enabled: [true; 4],
        }
    }
}

impl PartSetup {
    pub fn instrument(&self, part: Part) -> Instrument {
        self.instruments[part.index()]
    }

    pub fn set_instrument(&mut self, part: Part, instrument: Instrument) {
        self.instruments[part.index()] = instrument;
    }

    pub fn is_enabled(&self, part: Part) -> bool {
        self.enabled[part.index()]
    }

    pub fn set_enabled(&mut self, part: Part, enabled: bool) {
        self.enabled[part.index()] = enabled;
    }

    pub fn enabled_parts(&self) -> Vec<Part> {
        Part::ALL.into_iter().filter(|p| self.is_enabled(*p)).collect()
    }
}

// brightness-weighted centre of a set of cells
struct Centroid {
    y: f32,
    mean_brightness: f32,
    color: [f32; 3],
}

fn centroid(cells: &[&GridCell], height: f32) -> Option<Centroid> {
    let total: f32 = cells.iter().map(|c| c.brightness).sum();
    if cells.is_empty() || total <= 0.0 {
        return None;
    }
    let mut y = 0.0;
    let mut color = [0.0f32; 3];
    for cell in cells {
        y += (cell.row as f32 / height) * cell.brightness;
        for (acc, v) in color.iter_mut().zip(cell.color()) {
            *acc += v * cell.brightness;
        }
    }
    Some(Centroid {
        y: y / total,
        mean_brightness: total / cells.len() as f32,
        color: color.map(|c| c / total),
    })
}

#[inline]
fn on_stride(index: usize, stride: usize) -> bool {
    stride != 0 && index % stride == 0
}

pub struct ColumnExtractor {
    config: ScanConfig,
    rng: StdRng, // melody gate
}

impl ColumnExtractor {
    pub fn new(config: ScanConfig, rng: StdRng) -> Self {
        Self { config, rng }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn process_column<V: Voicer>(
        &mut self,
        column: &[GridCell],
        index: usize,
        density: f32,
        parts: &PartSetup,
        state: &mut EngineState,
        voice: &mut V,
    ) {
        let cfg = &self.config;
        let active: Vec<&GridCell> =
            column.iter().filter(|c| c.brightness > cfg.brightness_threshold).collect();

        if active.is_empty() {
            // silence ends whatever was held
            state.release_held(index);
            state.last_brightness = 0.0;
            return;
        }

        let height = column.len() as f32;
        let mean = mean_brightness(column);

        // bass
        if parts.is_enabled(Part::Bass) && on_stride(index, cfg.bass_interval) {
            let ceiling = height * cfg.bass_region_multiplier;
            let region: Vec<&GridCell> =
                active.iter().copied().filter(|c| (c.row as f32) < ceiling).collect();
            state.finalize(Part::Bass, index);
            match centroid(&region, height) {
                Some(c) => {
                    let pitch = voice.trigger_as(
                        parts.instrument(Part::Bass),
                        c.y,
                        0.8,
                        [100.0, 100.0, 255.0],
                    );
                    state.held_bass = Some(HeldNote { y: c.y });
                    state.active_bass = pitch.map(|pitch| NoteEvent {
                        start_column: index,
                        duration_in_columns: 1,
                        pitch,
                        part: Part::Bass,
                    });
                }
                None => state.held_bass = None,
            }
        }

        // harmony
        if parts.is_enabled(Part::Harmony)
            && on_stride(index, cfg.harmony_interval)
            && mean > cfg.harmony_brightness_threshold
        {
            // first of the brightest, lowest row wins a tie
            let root = active
                .iter()
                .copied()
                .reduce(|best, c| if c.brightness > best.brightness { c } else { best });
            if let Some(root) = root {
                let pitch = voice.trigger_as(
                    parts.instrument(Part::Harmony),
                    root.row as f32 / height,
                    mean * 1.5,
                    root.color(),
                );
                if let Some(pitch) = pitch {
                    state.score.record(NoteEvent {
                        start_column: index,
                        duration_in_columns: cfg.harmony_duration,
                        pitch,
                        part: Part::Harmony,
                    });
                }
            }
        }

        // melody
        if parts.is_enabled(Part::Melody) && on_stride(index, cfg.melody_interval) {
            let floor = height * cfg.melody_region_multiplier;
            let region: Vec<&GridCell> =
                active.iter().copied().filter(|c| c.row as f32 >= floor).collect();
            match centroid(&region, height) {
                Some(c) => {
                    let moved = state
                        .held_melody
                        .is_none_or(|held| (held.y - c.y).abs() > cfg.pitch_difference_threshold);
                    if moved {
                        state.finalize(Part::Melody, index);
                        if self.rng.gen_range(0.0..1.0) < density.max(0.5) {
                            let pitch = voice.trigger_as(
                                parts.instrument(Part::Melody),
                                c.y,
                                c.mean_brightness,
                                c.color,
                            );
                            state.held_melody = Some(HeldNote { y: c.y });
                            state.active_melody = pitch.map(|pitch| NoteEvent {
                                start_column: index,
                                duration_in_columns: 1,
                                pitch,
                                part: Part::Melody,
                            });
                        }
                    }
                }
                None => state.release(Part::Melody, index),
            }
        }

        // percussion
        let spike = if parts.is_enabled(Part::Percussion) {
            mean - state.last_brightness
        } else {
            0.0
        };
        if spike > cfg.percussion_spike_threshold {
            let pitch = voice.trigger_as(
                parts.instrument(Part::Percussion),
                0.5 + spike * 0.2,
                spike * 2.0,
                [255.0; 3],
            );
            if let Some(pitch) = pitch {
                state.score.record(NoteEvent {
                    start_column: index,
                    duration_in_columns: cfg.percussion_duration,
                    pitch,
                    part: Part::Percussion,
                });
            }
        }
        state.last_brightness = mean;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioState, VoiceEngine};
    use crate::pipeline::AudioParams;
    use rand::SeedableRng;

    const ROWS: usize = 32;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(Instrument, f32, f32)>,
    }

    impl Voicer for Recorder {
        fn trigger_as(&mut self, instrument: Instrument, y: f32, intensity: f32, _: [f32; 3]) -> Option<u8> {
            self.calls.push((instrument, y, intensity));
            Some(60)
        }
    }

    impl Recorder {
        fn count(&self, instrument: Instrument) -> usize {
            self.calls.iter().filter(|c| c.0 == instrument).count()
        }
    }

    fn extractor() -> ColumnExtractor {
        ColumnExtractor::new(ScanConfig::default(), StdRng::seed_from_u64(11))
    }

    fn only(part: Part) -> PartSetup {
        let mut setup = PartSetup::default();
        for p in Part::ALL {
            setup.set_enabled(p, p == part);
        }
        setup
    }

    fn uniform(v: u8) -> Vec<GridCell> {
        (0..ROWS).map(|row| GridCell::new(v, v, v, row)).collect()
    }

    // dark column with white cells at the given rows
    fn lit(rows: &[usize]) -> Vec<GridCell> {
        (0..ROWS)
            .map(|row| {
                let v = if rows.contains(&row) { 255 } else { 0 };
                GridCell::new(v, v, v, row)
            })
            .collect()
    }

    #[test]
    fn held_melody_is_finalized_when_the_region_goes_dark() {
        let mut ex = extractor();
        let mut state = EngineState::new();
        let mut voice = Recorder::default();
        let parts = only(Part::Melody);

        let bright = lit(&[20, 21]);
        for col in 0..5 {
            ex.process_column(&bright, col, 1.0, &parts, &mut state, &mut voice);
        }
        assert_eq!(voice.calls.len(), 1);
        assert!(state.active_melody.is_some());

        ex.process_column(&uniform(0), 5, 1.0, &parts, &mut state, &mut voice);

        let melody: Vec<_> = state.score.history(Part::Melody).iter().copied().collect();
        assert_eq!(melody.len(), 1);
        assert_eq!(melody[0].start_column, 0);
        assert_eq!(melody[0].duration_in_columns, 5);
        assert!(state.active_melody.is_none());
        assert!(state.held_melody.is_none());
    }

    #[test]
    fn silent_column_releases_bass_and_melody() {
        let mut ex = extractor();
        let mut state = EngineState::new();
        let mut voice = Recorder::default();
        let mut parts = only(Part::Bass);
        parts.set_enabled(Part::Melody, true);

        ex.process_column(&lit(&[2, 20]), 8, 1.0, &parts, &mut state, &mut voice);
        assert!(state.active_bass.is_some());
        assert!(state.active_melody.is_some());

        ex.process_column(&uniform(0), 11, 1.0, &parts, &mut state, &mut voice);
        assert!(state.held_bass.is_none());
        assert!(state.active_bass.is_none());
        assert!(state.held_melody.is_none());
        for part in [Part::Bass, Part::Melody] {
            let notes: Vec<_> = state.score.history(part).iter().copied().collect();
            assert_eq!(notes.len(), 1, "{part:?}");
            assert_eq!(notes[0].start_column, 8);
            assert_eq!(notes[0].duration_in_columns, 3);
        }
    }

    #[test]
    fn sparse_images_still_strike_half_the_melody_changes() {
        let mut ex = extractor();
        let mut voice = Recorder::default();
        let parts = only(Part::Melody);
        let column = lit(&[20]);
        let trials = 2000;

        for _ in 0..trials {
            let before = voice.calls.len();
            let mut state = EngineState::new();
            state.held_melody = Some(HeldNote { y: 0.9 });
            ex.process_column(&column, 0, 0.0, &parts, &mut state, &mut voice);

            let held = state.held_melody.map(|h| h.y);
            if voice.calls.len() > before {
                assert_eq!(held, Some(20.0 / 32.0));
                assert!(state.active_melody.is_some());
            } else {
                // a missed gate keeps the old pitch
                assert_eq!(held, Some(0.9));
                assert!(state.active_melody.is_none());
            }
        }
        let ratio = voice.calls.len() as f32 / trials as f32;
        assert!((0.45..0.55).contains(&ratio), "strike ratio {ratio}");
    }

    #[test]
    fn dense_images_strike_every_melody_change() {
        let mut ex = extractor();
        let mut voice = Recorder::default();
        let parts = only(Part::Melody);
        for _ in 0..200 {
            let mut state = EngineState::new();
            ex.process_column(&lit(&[20]), 0, 1.0, &parts, &mut state, &mut voice);
        }
        assert_eq!(voice.calls.len(), 200);
    }

    #[test]
    fn small_pitch_moves_do_not_retrigger_melody() {
        let parts = only(Part::Melody);

        // one row is 1/32 = 0.03125, under the 0.05 gate
        let mut ex = extractor();
        let mut state = EngineState::new();
        let mut voice = Recorder::default();
        ex.process_column(&lit(&[20]), 0, 1.0, &parts, &mut state, &mut voice);
        ex.process_column(&lit(&[21]), 4, 1.0, &parts, &mut state, &mut voice);
        assert_eq!(voice.calls.len(), 1);

        // two rows is 0.0625, over it
        let mut ex = extractor();
        let mut state = EngineState::new();
        let mut voice = Recorder::default();
        ex.process_column(&lit(&[20]), 0, 1.0, &parts, &mut state, &mut voice);
        ex.process_column(&lit(&[22]), 4, 1.0, &parts, &mut state, &mut voice);
        assert_eq!(voice.calls.len(), 2);
        assert_eq!(state.score.history(Part::Melody).len(), 1);
    }

    #[test]
    fn brightness_spike_triggers_one_hit() {
        let mut ex = extractor();
        let mut state = EngineState::new();
        let mut voice = Recorder::default();
        let parts = PartSetup::default();

        // 0.1 is under the activity threshold, so the baseline drops to zero
        ex.process_column(&uniform(26), 1, 1.0, &parts, &mut state, &mut voice);
        assert_eq!(voice.count(Instrument::EightBit), 0);

        ex.process_column(&uniform(128), 2, 1.0, &parts, &mut state, &mut voice);
        assert_eq!(voice.count(Instrument::EightBit), 1);
        let (_, y, intensity) = voice.calls[0];
        let spike = luma_of(128);
        assert!((y - (0.5 + spike * 0.2)).abs() < 1e-5);
        assert!((intensity - spike * 2.0).abs() < 1e-5);
        assert_eq!(state.score.history(Part::Percussion).len(), 1);

        // same brightness again is no spike
        ex.process_column(&uniform(128), 3, 1.0, &parts, &mut state, &mut voice);
        assert_eq!(voice.count(Instrument::EightBit), 1);
    }

    fn luma_of(v: u8) -> f32 {
        crate::pipeline::grid::luma(v, v, v)
    }

    #[test]
    fn bass_listens_to_the_bottom_rows_on_its_stride() {
        let mut ex = extractor();
        let mut state = EngineState::new();
        let mut voice = Recorder::default();
        let parts = only(Part::Bass);
        let low = lit(&[2]);

        ex.process_column(&low, 4, 1.0, &parts, &mut state, &mut voice);
        assert!(voice.calls.is_empty());

        ex.process_column(&low, 8, 1.0, &parts, &mut state, &mut voice);
        assert_eq!(voice.calls, vec![(Instrument::Bass, 2.0 / 32.0, 0.8)]);

        // a bass note is restruck every stride and the previous one closed
        ex.process_column(&low, 16, 1.0, &parts, &mut state, &mut voice);
        let bass: Vec<_> = state.score.history(Part::Bass).iter().copied().collect();
        assert_eq!(bass.len(), 1);
        assert_eq!(bass[0].duration_in_columns, 8);

        // light only above the bass region: bass lets go
        ex.process_column(&lit(&[30]), 24, 1.0, &parts, &mut state, &mut voice);
        assert!(state.held_bass.is_none());
        assert_eq!(state.score.history(Part::Bass).len(), 2);
    }

    #[test]
    fn harmony_plays_the_brightest_cell() {
        let mut ex = extractor();
        let mut state = EngineState::new();
        let mut voice = Recorder::default();
        let parts = only(Part::Harmony);

        let mut column = uniform(0);
        column[5] = GridCell::new(150, 150, 150, 5);
        column[12] = GridCell::new(250, 250, 250, 12);
        column[13] = GridCell::new(250, 250, 250, 13);
        // mean brightness is under 0.1, no harmony
        ex.process_column(&column, 16, 1.0, &parts, &mut state, &mut voice);
        assert!(voice.calls.is_empty());

        let mut column = uniform(60);
        column[12] = GridCell::new(250, 250, 250, 12);
        column[13] = GridCell::new(250, 250, 250, 13);
        ex.process_column(&column, 16, 1.0, &parts, &mut state, &mut voice);
        assert_eq!(voice.calls.len(), 1);
        assert_eq!(voice.calls[0].0, Instrument::Pad);
        assert_eq!(voice.calls[0].1, 12.0 / 32.0);
        let note = state.score.history(Part::Harmony).iter().next().copied().unwrap();
        assert_eq!(note.duration_in_columns, 16);
    }

    #[test]
    fn disabled_parts_stay_quiet() {
        let mut ex = extractor();
        let mut state = EngineState::new();
        let mut voice = Recorder::default();
        let mut parts = PartSetup::default();
        for p in Part::ALL {
            parts.set_enabled(p, false);
        }
        ex.process_column(&uniform(0), 0, 1.0, &parts, &mut state, &mut voice);
        ex.process_column(&uniform(255), 16, 1.0, &parts, &mut state, &mut voice);
        assert!(voice.calls.is_empty());
    }

    #[test]
    fn wrap_releases_held_notes_at_the_loop_end() {
        let mut ex = extractor();
        let mut state = EngineState::new();
        let mut voice = Recorder::default();
        ex.process_column(&lit(&[2, 20]), 504, 1.0, &only(Part::Bass), &mut state, &mut voice);
        state.release_held(512);
        let bass = state.score.history(Part::Bass).iter().next().copied().unwrap();
        assert_eq!(bass.duration_in_columns, 8);
        assert!(state.active_bass.is_none());
    }

    #[test]
    fn other_parts_never_change_the_configured_instrument() {
        let (tx, _rx) = crossbeam_channel::bounded(256);
        let mut engine = VoiceEngine::new(tx, StdRng::seed_from_u64(5));
        engine.configure(&AudioParams { instrument: Instrument::Violin, ..AudioParams::default() });
        engine.init();
        engine.resume();
        assert_eq!(engine.state(), AudioState::Running);

        let mut ex = extractor();
        let mut state = EngineState::new();
        let parts = PartSetup::default();
        ex.process_column(&uniform(0), 0, 1.0, &parts, &mut state, &mut engine);
        ex.process_column(&lit(&[1, 2, 3, 20, 25]), 16, 1.0, &parts, &mut state, &mut engine);

        assert!(state.active_bass.is_some());
        assert_eq!(engine.instrument(), Some(Instrument::Violin));
    }
}

// The transport: owns the grid, the scan clock, held notes and the score,
// and decides when columns reach the extractor and the voice engine.
//
//   Empty --begin_analysis--> Analyzing --ok--> Ready <--play/stop--> Playing
//                                       --err-> Error
//   any --reset--> Empty

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

use crate::audio::VoiceEngine;
use crate::pipeline::{
    AnalysisError, AnalysisResult, ColumnExtractor, EngineState, Grid, PartSetup, ScanClock,
    ScanConfig,
};
use crate::shared::{
    DisplayState, InputEvent, Part, PartStatus, ScoreView, VisualState, MAX_TEMPO,
    MAX_VISUAL_INTENSITY, MIN_TEMPO, DEFAULT_VISUAL_INTENSITY,
};

#[derive(Clone, Debug, PartialEq)]
pub enum Phase {
    Empty,
    Analyzing,
    Ready,
    Playing,
    Error(String),
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Empty => "EMPTY",
            Phase::Analyzing => "ANALYZING",
            Phase::Ready => "READY",
            Phase::Playing => "PLAYING",
            Phase::Error(_) => "ERROR",
        }
    }
}

/// One generator for the melody gate and one for voice detune, both drawn
/// from the same seed so a run can be replayed.
pub fn split_rng(seed: Option<u64>) -> (StdRng, StdRng) {
    let mut master = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let extractor = StdRng::seed_from_u64(master.next_u64());
    let voice = StdRng::seed_from_u64(master.next_u64());
    (extractor, voice)
}

pub struct Middle {
    phase: Phase,
    grid: Option<Grid>,
    column_brightness: Vec<f32>, // cached per grid for the scan strip
    analysis: Option<AnalysisResult>,
    tempo: u32,
    visual_intensity: f32,
    parts: PartSetup,
    clock: ScanClock,
    state: EngineState,
    extractor: ColumnExtractor,
    voice: VoiceEngine,
    status: String,
    generation: u64,       // ticket handed to the analysis in flight
    score_version: u64,    // bumped whenever a column was processed
    skip_next_delta: bool, // first tick after play does not move the playhead
}

impl Middle {
    pub fn new(config: ScanConfig, voice: VoiceEngine, extractor_rng: StdRng) -> Self {
        Self {
            phase: Phase::Empty,
            grid: None,
            column_brightness: Vec::new(),
            analysis: None,
            tempo: crate::pipeline::AudioParams::default().tempo,
            visual_intensity: DEFAULT_VISUAL_INTENSITY,
            parts: PartSetup::default(),
            clock: ScanClock::new(),
            state: EngineState::new(),
            extractor: ColumnExtractor::new(config, extractor_rng),
            voice,
            status: String::from("no image loaded"),
            generation: 0,
            score_version: 0,
            skip_next_delta: false,
        }
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Take ownership of a freshly sampled grid. The returned ticket must be
    /// handed back with the analysis result; older tickets are ignored.
    pub fn begin_analysis(&mut self, grid: Grid) -> u64 {
        self.teardown();
        log::info!("analysing {}x{} grid", grid.width(), grid.height());
        self.column_brightness = grid.column_means();
        self.grid = Some(grid);
        self.phase = Phase::Analyzing;
        self.status = String::from("analysing...");
        self.generation
    }

    // decode failure: nothing to play, but not an error state either
    pub fn load_failed(&mut self, message: String) {
        self.teardown();
        log::warn!("image load failed: {message}");
        self.phase = Phase::Empty;
        self.status = message;
    }

    pub fn on_analysis_complete(
        &mut self,
        ticket: u64,
        result: Result<AnalysisResult, AnalysisError>,
    ) -> bool {
        if ticket != self.generation || self.phase != Phase::Analyzing {
            log::debug!("ignoring stale analysis result (ticket {ticket})");
            return false;
        }
        match result {
            Ok(analysis) => {
                let params = &analysis.audio_params;
                self.tempo = params.tempo.clamp(MIN_TEMPO, MAX_TEMPO);
                self.parts.set_instrument(Part::Melody, params.instrument);
                self.voice.configure(params);
                self.voice.init();
                log::info!(
                    "analysis done: \"{}\" at {} bpm, {} scale, {}",
                    analysis.metadata.title,
                    self.tempo,
                    params.scale.label(),
                    params.instrument.label()
                );
                self.status = format!("ready: {}", analysis.metadata.description);
                self.analysis = Some(analysis);
                self.phase = Phase::Ready;
            }
            Err(e) => {
                log::error!("analysis failed: {e}");
                self.grid = None;
                self.column_brightness.clear();
                self.analysis = None;
                self.voice.clear();
                self.status = String::from("analysis failed, press r to reset");
                self.phase = Phase::Error(e.to_string());
            }
        }
        true
    }

    // ── Transport ────────────────────────────────────────────────────

    pub fn play(&mut self) -> bool {
        if self.phase != Phase::Ready {
            return false;
        }
        self.clock.reset();
        self.state.last_brightness = 0.0;
        self.voice.resume();
        self.skip_next_delta = true;
        self.phase = Phase::Playing;
        log::info!("play");
        true
    }

    pub fn stop(&mut self) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }
        let column = self.clock.current_column().unwrap_or(0);
        self.state.release_held(column);
        self.state.last_brightness = 0.0;
        self.clock.reset();
        self.voice.suspend();
        self.score_version += 1;
        self.phase = Phase::Ready;
        log::info!("stop at column {column}");
        true
    }

    pub fn toggle_playback(&mut self) -> bool {
        match self.phase {
            Phase::Playing => self.stop(),
            _ => self.play(),
        }
    }

    // full teardown back to an empty session
    pub fn reset(&mut self) {
        self.teardown();
        self.phase = Phase::Empty;
        self.status = String::from("reset");
        log::info!("reset");
    }

    fn teardown(&mut self) {
        if self.phase == Phase::Playing {
            self.voice.suspend();
        }
        self.grid = None;
        self.column_brightness.clear();
        self.analysis = None;
        self.state.clear();
        self.clock.reset();
        self.voice.clear();
        self.generation += 1;
        self.score_version += 1;
        self.skip_next_delta = false;
    }

    /// Advance the playhead by `delta_seconds`. Returns true when a new
    /// column was handed to the extractor.
    pub fn tick(&mut self, delta_seconds: f64) -> bool {
        // retry a Resume or Suspend that a full queue dropped
        if self.phase != Phase::Playing {
            self.voice.suspend();
            return false;
        }
        self.voice.resume();
        let Some(grid) = self.grid.as_ref() else {
            return false;
        };
        let delta = if std::mem::take(&mut self.skip_next_delta) { 0.0 } else { delta_seconds };

        let width = grid.width();
        let tick = self.clock.advance(
            delta,
            self.tempo as f64,
            width,
            self.extractor.config().columns_per_beat,
        );
        if tick.wrapped {
            self.state.release_held(width);
            log::debug!("loop wrapped");
        }
        if !tick.column_changed {
            return false;
        }
        let Some(column) = grid.column(tick.column) else {
            return false;
        };
        let density = self.analysis.as_ref().map_or(0.5, |a| a.audio_params.density);
        self.extractor.process_column(
            column,
            tick.column,
            density,
            &self.parts,
            &mut self.state,
            &mut self.voice,
        );
        self.score_version += 1;
        true
    }

    // ── Runtime config ───────────────────────────────────────────────

    pub fn handle_input(&mut self, event: InputEvent) {
        match event {
            InputEvent::PlayPress => {
                self.toggle_playback();
            }
            InputEvent::Reset => self.reset(),
            InputEvent::AdjustTempo(delta) => {
                self.set_tempo((self.tempo as i64 + delta as i64).max(0) as u32)
            }
            InputEvent::AdjustIntensity(delta) => {
                self.set_visual_intensity(self.visual_intensity + delta)
            }
            InputEvent::TogglePart(part) => self.toggle_part(part),
            InputEvent::CycleInstrument(part) => self.cycle_instrument(part),
            // the main loop owns files and the terminal
            InputEvent::Load | InputEvent::Quit => {}
        }
    }

    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo = bpm.clamp(MIN_TEMPO, MAX_TEMPO);
    }

    pub fn set_visual_intensity(&mut self, value: f32) {
        if value.is_finite() {
            self.visual_intensity = value.clamp(0.0, MAX_VISUAL_INTENSITY);
        }
    }

    pub fn set_instrument(&mut self, part: Part, instrument: crate::audio::Instrument) -> bool {
        if !part.instrument_options().contains(&instrument) {
            log::warn!("{} cannot play {}", part.label(), instrument.label());
            return false;
        }
        self.parts.set_instrument(part, instrument);
        if part == Part::Melody {
            if let Some(analysis) = self.analysis.as_mut() {
                analysis.audio_params.instrument = instrument;
                self.voice.configure(&analysis.audio_params);
            }
        }
        true
    }

    pub fn cycle_instrument(&mut self, part: Part) {
        let options = part.instrument_options();
        let current = self.parts.instrument(part);
        let next = match options.iter().position(|i| *i == current) {
            Some(i) => options[(i + 1) % options.len()],
            None => options[0],
        };
        self.set_instrument(part, next);
    }

    pub fn toggle_part(&mut self, part: Part) {
        let enabled = !self.parts.is_enabled(part);
        self.parts.set_enabled(part, enabled);
        if !enabled {
            let column = self.clock.current_column().unwrap_or(0);
            self.state.release(part, column);
        }
        self.score_version += 1;
    }

    // ── Views ────────────────────────────────────────────────────────

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[cfg(test)]
    pub fn grid(&self) -> Option<&Grid> {
        self.grid.as_ref()
    }

    #[cfg(test)]
    pub fn engine_state(&self) -> &EngineState {
        &self.state
    }

    #[cfg(test)]
    pub fn voice(&self) -> &VoiceEngine {
        &self.voice
    }

    #[cfg(test)]
    pub fn parts(&self) -> &PartSetup {
        &self.parts
    }

    #[cfg(test)]
    pub fn tempo(&self) -> u32 {
        self.tempo
    }

    pub fn score_version(&self) -> u64 {
        self.score_version
    }

    // seconds for one pass over the grid at the current tempo
    pub fn loop_seconds(&self) -> Option<f64> {
        let grid = self.grid.as_ref()?;
        let cpb = self.extractor.config().columns_per_beat;
        if grid.width() == 0 || cpb == 0 {
            return None;
        }
        Some(ScanClock::loop_seconds(self.tempo as f64, grid.width(), cpb))
    }

    pub fn visual_state(&self) -> VisualState {
        VisualState {
            scan_pos: self.clock.position(),
            is_playing: self.phase == Phase::Playing,
            intensity: self.visual_intensity,
        }
    }

    pub fn score_view(&self) -> ScoreView {
        let enabled = self.parts.enabled_parts();
        ScoreView {
            notes: self.state.score.notes_for(&enabled).collect(),
            current_column: self.clock.current_column().unwrap_or(0),
        }
    }

    pub fn display_state(&self) -> DisplayState {
        let (title, artist_style, mood) = match &self.analysis {
            Some(a) => (
                a.metadata.title.clone(),
                a.metadata.artist_style.clone(),
                a.metadata.mood.clone(),
            ),
            None => Default::default(),
        };
        DisplayState {
            phase_label: self.phase.label(),
            playing: self.phase == Phase::Playing,
            title,
            artist_style,
            mood,
            status_text: match &self.phase {
                Phase::Error(message) => message.clone(),
                _ => self.status.clone(),
            },
            tempo: self.tempo,
            scale: self.analysis.as_ref().map(|a| a.audio_params.scale),
            parts: Part::ALL.map(|part| PartStatus {
                part,
                instrument: self.parts.instrument(part),
                enabled: self.parts.is_enabled(part),
            }),
            visual_intensity: self.visual_intensity,
            column_brightness: self.column_brightness.clone(),
            score: self.score_view(),
        }
    }
}

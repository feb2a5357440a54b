// Main-thread half of the synth: turns (y, intensity, colour) into a pitch
// and a voice recipe, then hands the voice to the audio thread.

use crossbeam_channel::Sender;
use rand::rngs::StdRng;
use rand::Rng;

use super::instrument::{Instrument, Waveform};
use crate::audio_api::{AudioCommand, EnvelopeSpec, VoiceSpec};
use crate::pipeline::{AudioParams, Scale, Voicer};

const ROOT_NOTE: u8 = 48; // C3
const OCTAVES: u8 = 4;
const WARMTH_SPLIT: f32 = 50.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioState {
    Uninitialized,
    Suspended,
    Running,
}

pub fn midi_to_hz(note: f32) -> f32 {
    440.0 * 2.0_f32.powf((note - 69.0) / 12.0)
}

pub fn build_pitch_table(scale: Scale) -> Vec<u8> {
    (0..OCTAVES)
        .flat_map(|octave| {
            scale.intervals().iter().map(move |i| ROOT_NOTE + octave * 12 + i)
        })
        .collect()
}

pub struct VoiceEngine {
    tx: Sender<AudioCommand>,
    state: AudioState,
    params: Option<AudioParams>,
    pitch_table: Vec<u8>,
    rng: StdRng,
}

impl VoiceEngine {
    pub fn new(tx: Sender<AudioCommand>, rng: StdRng) -> Self {
        Self {
            tx,
            state: AudioState::Uninitialized,
            params: None,
            pitch_table: Vec::new(),
            rng,
        }
    }

    pub fn configure(&mut self, params: &AudioParams) {
        self.pitch_table = build_pitch_table(params.scale);
        self.params = Some(params.clone());
        log::debug!(
            "voice engine configured: {} scale, {} pitches, {}",
            params.scale.label(),
            self.pitch_table.len(),
            params.instrument.label()
        );
    }

    // drop the configuration so nothing can sound until the next configure
    pub fn clear(&mut self) {
        self.params = None;
        self.pitch_table.clear();
    }

    #[cfg(test)]
    pub fn params(&self) -> Option<&AudioParams> {
        self.params.as_ref()
    }

    #[cfg(test)]
    pub fn instrument(&self) -> Option<Instrument> {
        self.params.as_ref().map(|p| p.instrument)
    }

    pub fn state(&self) -> AudioState {
        self.state
    }

    // The lifecycle calls below are all safe to repeat. The state only
    // moves once the audio thread has been told, so a dropped command
    // leaves it where it was and the next call retries.

    pub fn init(&mut self) {
        if self.state == AudioState::Uninitialized {
            self.state = AudioState::Suspended;
            log::info!("audio initialised (suspended)");
        }
    }

    pub fn resume(&mut self) {
        if self.state == AudioState::Suspended && self.send(AudioCommand::Resume) {
            self.state = AudioState::Running;
            log::info!("audio running");
        }
    }

    pub fn suspend(&mut self) {
        if self.state == AudioState::Running && self.send(AudioCommand::Suspend) {
            self.state = AudioState::Suspended;
            log::info!("audio suspended");
        }
    }

    /// Sound a note with the configured instrument.
    #[cfg(test)]
    pub fn trigger(&mut self, y: f32, intensity: f32, color: [f32; 3]) -> Option<u8> {
        let instrument = self.instrument()?;
        self.trigger_as(instrument, y, intensity, color)
    }

    fn send(&self, cmd: AudioCommand) -> bool {
        match self.tx.try_send(cmd) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("dropped audio command: {e}");
                false
            }
        }
    }

    // Resolve the pitch and the voice for one note. None when there is
    // nothing to play from.
    fn voice_for(
        &mut self,
        instrument: Instrument,
        y: f32,
        intensity: f32,
        color: [f32; 3],
    ) -> Option<(u8, VoiceSpec)> {
        let params = self.params.as_ref()?;
        let last = self.pitch_table.len().checked_sub(1)?;
        let index = ((y.clamp(0.0, 1.0) * last as f32).floor() as usize).min(last);
        let base = self.pitch_table[index] as i32;

        let recipe = instrument.recipe();

        // warm colours buzz, cool colours soften
        let warmth = color[0] - color[2];
        let (mut waveform, mut roughness) = if warmth > WARMTH_SPLIT {
            (Waveform::Saw, params.roughness + 0.2)
        } else if warmth < -WARMTH_SPLIT {
            (Waveform::Triangle, (params.roughness - 0.2).max(0.0))
        } else {
            (Waveform::Square, params.roughness)
        };
        if let Some(w) = recipe.waveform {
            waveform = w;
        }
        if !recipe.detunes {
            roughness = 0.0;
        }

        let note = instrument.shape_pitch(base).clamp(0, 127) as u8;
        let freq = midi_to_hz(note as f32);
        let release = if recipe.release_follows_reverb {
            recipe.release * (0.8 + params.reverb)
        } else {
            recipe.release
        };
        let env = EnvelopeSpec {
            attack: recipe.attack,
            release,
            peak: intensity.clamp(0.0, 1.0) * recipe.gain,
        };

        let spec = if recipe.ensemble {
            VoiceSpec::Ensemble { freq, detune_cents: 8.0 + self.rng.gen_range(0.0..5.0), env }
        } else {
            let detune_cents = if roughness > 0.0 {
                (self.rng.gen_range(0.0..1.0) - 0.5) * 50.0 * roughness
            } else {
                0.0
            };
            VoiceSpec::Tone { freq, detune_cents, waveform, env }
        };
        Some((note, spec))
    }
}

impl Voicer for VoiceEngine {
    // The instrument is an argument, so the configured one is never touched.
    fn trigger_as(
        &mut self,
        instrument: Instrument,
        y: f32,
        intensity: f32,
        color: [f32; 3],
    ) -> Option<u8> {
        if self.state != AudioState::Running {
            return None;
        }
        let (note, spec) = self.voice_for(instrument, y, intensity, color)?;
        self.send(AudioCommand::Trigger(spec)).then_some(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::Receiver;
    use rand::SeedableRng;

    fn running_engine(params: &AudioParams) -> (VoiceEngine, Receiver<AudioCommand>) {
        let (tx, rx) = crossbeam_channel::bounded(64);
        let mut engine = VoiceEngine::new(tx, StdRng::seed_from_u64(7));
        engine.configure(params);
        engine.init();
        engine.resume();
        assert_eq!(rx.try_recv(), Ok(AudioCommand::Resume));
        (engine, rx)
    }

    fn triggered(rx: &Receiver<AudioCommand>) -> VoiceSpec {
        match rx.try_recv() {
            Ok(AudioCommand::Trigger(spec)) => spec,
            other => panic!("expected a trigger, got {other:?}"),
        }
    }

    #[test]
    fn pitch_table_spans_four_octaves() {
        let table = build_pitch_table(Scale::Major);
        assert_eq!(table.len(), 28);
        assert_eq!(table[0], 48);
        assert_eq!(table[7], 60);
        assert_eq!(*table.last().unwrap(), 48 + 36 + 11);
        assert_eq!(build_pitch_table(Scale::Pentatonic).len(), 20);
        assert_eq!(build_pitch_table(Scale::Chromatic).len(), 48);
    }

    #[test]
    fn a4_is_440() {
        assert!((midi_to_hz(69.0) - 440.0).abs() < 1e-3);
        assert!((midi_to_hz(57.0) - 220.0).abs() < 1e-3);
    }

    #[test]
    fn silent_until_running() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let mut engine = VoiceEngine::new(tx, StdRng::seed_from_u64(1));
        engine.configure(&AudioParams::default());
        assert_eq!(engine.trigger(0.5, 1.0, [0.0; 3]), None);
        engine.init();
        assert_eq!(engine.state(), AudioState::Suspended);
        assert_eq!(engine.trigger(0.5, 1.0, [0.0; 3]), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unconfigured_engine_returns_no_pitch() {
        let (tx, _rx) = crossbeam_channel::bounded(8);
        let mut engine = VoiceEngine::new(tx, StdRng::seed_from_u64(1));
        engine.init();
        engine.resume();
        assert_eq!(engine.trigger_as(Instrument::Pad, 0.5, 1.0, [0.0; 3]), None);
    }

    #[test]
    fn lifecycle_calls_are_idempotent() {
        let (tx, rx) = crossbeam_channel::bounded(8);
        let mut engine = VoiceEngine::new(tx, StdRng::seed_from_u64(1));
        engine.init();
        engine.init();
        engine.resume();
        engine.resume();
        assert_eq!(engine.state(), AudioState::Running);
        engine.suspend();
        engine.suspend();
        assert_eq!(engine.state(), AudioState::Suspended);
        let sent: Vec<_> = rx.try_iter().collect();
        assert_eq!(sent, vec![AudioCommand::Resume, AudioCommand::Suspend]);
    }

    #[test]
    fn full_queue_keeps_the_lifecycle_state() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut engine = VoiceEngine::new(tx.clone(), StdRng::seed_from_u64(1));
        engine.configure(&AudioParams::default());
        engine.init();
        tx.try_send(AudioCommand::Suspend).unwrap();

        engine.resume();
        assert_eq!(engine.state(), AudioState::Suspended);
        assert_eq!(engine.trigger(0.5, 1.0, [0.0; 3]), None);

        assert_eq!(rx.try_recv(), Ok(AudioCommand::Suspend));
        engine.resume();
        assert_eq!(engine.state(), AudioState::Running);
        assert_eq!(rx.try_recv(), Ok(AudioCommand::Resume));

        tx.try_send(AudioCommand::Resume).unwrap();
        engine.suspend();
        assert_eq!(engine.state(), AudioState::Running);
        rx.try_recv().unwrap();
        engine.suspend();
        assert_eq!(engine.state(), AudioState::Suspended);
        assert_eq!(rx.try_recv(), Ok(AudioCommand::Suspend));
    }

    #[test]
    fn y_position_indexes_the_scale() {
        let params = AudioParams { instrument: Instrument::Synth, ..AudioParams::default() };
        let (mut engine, _rx) = running_engine(&params);
        assert_eq!(engine.trigger(0.0, 1.0, [0.0; 3]), Some(48));
        assert_eq!(engine.trigger(1.0, 1.0, [0.0; 3]), Some(95));
        // floor(0.5 * 27) = 13 -> top of the second octave
        assert_eq!(engine.trigger(0.5, 1.0, [0.0; 3]), Some(71));
    }

    #[test]
    fn triggering_another_instrument_leaves_the_configured_one() {
        let params = AudioParams { instrument: Instrument::Pad, ..AudioParams::default() };
        let (mut engine, rx) = running_engine(&params);
        let pitch = engine.trigger_as(Instrument::Bass, 0.0, 0.8, [100.0, 100.0, 255.0]);
        assert_eq!(pitch, Some(36));
        assert_eq!(engine.instrument(), Some(Instrument::Pad));

        match triggered(&rx) {
            VoiceSpec::Tone { waveform, env, .. } => {
                assert_eq!(waveform, Waveform::Triangle);
                assert!((env.release - 0.4 * (0.8 + params.reverb)).abs() < 1e-6);
                assert!((env.peak - 0.8 * 0.4).abs() < 1e-6);
            }
            other => panic!("bass should be a single tone, got {other:?}"),
        }
    }

    #[test]
    fn warmth_picks_the_waveform() {
        let params = AudioParams { roughness: 0.0, ..AudioParams::default() };
        let (mut engine, rx) = running_engine(&params);
        let cases = [
            ([255.0, 0.0, 0.0], Waveform::Saw),
            ([0.0, 0.0, 255.0], Waveform::Triangle),
            ([128.0, 128.0, 128.0], Waveform::Square),
        ];
        for (color, expected) in cases {
            engine.trigger_as(Instrument::Synth, 0.5, 1.0, color);
            match triggered(&rx) {
                VoiceSpec::Tone { waveform, detune_cents, .. } => {
                    assert_eq!(waveform, expected);
                    if expected != Waveform::Saw {
                        assert_eq!(detune_cents, 0.0);
                    }
                }
                other => panic!("{other:?}"),
            }
        }
    }

    #[test]
    fn eight_bit_never_detunes() {
        let params = AudioParams { roughness: 1.0, ..AudioParams::default() };
        let (mut engine, rx) = running_engine(&params);
        for _ in 0..10 {
            engine.trigger_as(Instrument::EightBit, 0.7, 0.5, [255.0, 0.0, 0.0]);
            match triggered(&rx) {
                VoiceSpec::Tone { detune_cents, waveform, .. } => {
                    assert_eq!(detune_cents, 0.0);
                    assert_eq!(waveform, Waveform::Square);
                }
                other => panic!("{other:?}"),
            }
        }
    }

    #[test]
    fn violin_gets_the_ensemble_voice() {
        let params = AudioParams { reverb: 1.0, ..AudioParams::default() };
        let (mut engine, rx) = running_engine(&params);
        let pitch = engine.trigger_as(Instrument::Violin, 0.0, 2.0, [0.0; 3]);
        assert_eq!(pitch, Some(60));
        match triggered(&rx) {
            VoiceSpec::Ensemble { detune_cents, env, .. } => {
                assert!((8.0..13.0).contains(&detune_cents));
                assert_eq!(env.release, 3.5);
                assert!((env.peak - 0.2).abs() < 1e-6);
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn full_queue_means_no_pitch() {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let mut engine = VoiceEngine::new(tx, StdRng::seed_from_u64(3));
        engine.configure(&AudioParams::default());
        engine.init();
        engine.resume(); // fills the only slot
        assert_eq!(engine.trigger(0.5, 1.0, [0.0; 3]), None);
    }
}

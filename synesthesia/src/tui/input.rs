use std::time::Duration;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crate::shared::{InputEvent, Part};
use super::mode::TuiState;

const TEMPO_STEP: i32 = 5;
const INTENSITY_STEP: f32 = 0.25;

// poll for input from tui, resolves keys into semantic input events for
// the backend; keys that only change the tui are handled here
pub fn poll_input(timeout: Duration, ts: &mut TuiState) -> anyhow::Result<Vec<InputEvent>> {
    if !event::poll(timeout)? {
        return Ok(vec![]);
    }

    if let Event::Key(key) = event::read()? {
        if key.kind != KeyEventKind::Press {
            return Ok(vec![]);
        }
        return Ok(handle_key(key.code, ts));
    }
    Ok(vec![])
}

fn handle_key(code: KeyCode, ts: &mut TuiState) -> Vec<InputEvent> {
    match code {
        KeyCode::Esc | KeyCode::Char('q') => vec![InputEvent::Quit],
        KeyCode::Char(' ') => vec![InputEvent::PlayPress],
        KeyCode::Char('r') => vec![InputEvent::Reset],
        KeyCode::Char('l') => vec![InputEvent::Load],

        // knobs
        KeyCode::Char('[') => vec![InputEvent::AdjustTempo(-TEMPO_STEP)],
        KeyCode::Char(']') => vec![InputEvent::AdjustTempo(TEMPO_STEP)],
        KeyCode::Char('-') => vec![InputEvent::AdjustIntensity(-INTENSITY_STEP)],
        KeyCode::Char('=') => vec![InputEvent::AdjustIntensity(INTENSITY_STEP)],

        // number row toggles parts, initials cycle their instrument
        KeyCode::Char(c @ '1'..='4') => {
            let part = Part::ALL[(c as u8 - b'1') as usize];
            vec![InputEvent::TogglePart(part)]
        }
        KeyCode::Char(c @ ('m' | 'b' | 'h' | 'p')) => match char_to_part(c) {
            Some(part) => vec![InputEvent::CycleInstrument(part)],
            None => vec![],
        },

        KeyCode::Char('?') => {
            ts.show_help = !ts.show_help;
            vec![]
        }
        _ => vec![],
    }
}

fn char_to_part(c: char) -> Option<Part> {
    let part = match c {
        'm' => Part::Melody,
        'b' => Part::Bass,
        'h' => Part::Harmony,
        'p' => Part::Percussion,
        _ => return None,
    };
    Some(part)
}

// Piano-roll view of the note histories. The view shows one page of
// SCORE_WINDOW_COLUMNS columns, the page the playhead is on.

use crate::pipeline::NoteEvent;
use crate::shared::{Part, ScoreView, MAX_PITCH, MIN_PITCH, SCORE_WINDOW_COLUMNS};
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::Block;
use ratatui::Frame;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteCell {
    pub x: u16,
    pub y: u16,
    pub len: u16,
    pub part: Part,
    pub dimmed: bool, // starts after the playhead
}

pub fn part_color(part: Part) -> Color {
    match part {
        Part::Melody => Color::Cyan,
        Part::Bass => Color::Blue,
        Part::Harmony => Color::Magenta,
        Part::Percussion => Color::Yellow,
    }
}

fn page_start(current_column: usize) -> usize {
    current_column / SCORE_WINDOW_COLUMNS * SCORE_WINDOW_COLUMNS
}

fn x_of(column: usize, width: u16) -> u16 {
    (column * width as usize / SCORE_WINDOW_COLUMNS) as u16
}

pub fn layout_notes(
    notes: &[NoteEvent],
    current_column: usize,
    enabled: &[Part],
    width: u16,
    height: u16,
) -> Vec<NoteCell> {
    if width == 0 || height == 0 {
        return vec![];
    }
    let page = page_start(current_column);
    let span = (MAX_PITCH - MIN_PITCH) as f32;

    notes
        .iter()
        .filter(|n| enabled.contains(&n.part))
        .filter(|n| (page..page + SCORE_WINDOW_COLUMNS).contains(&n.start_column))
        .map(|n| {
            let x = x_of(n.start_column - page, width).min(width - 1);
            let rel = (n.pitch.clamp(MIN_PITCH, MAX_PITCH) - MIN_PITCH) as f32 / span;
            let y = ((1.0 - rel) * (height - 1) as f32).round() as u16;
            let len = x_of(n.duration_in_columns, width).max(1).min(width - x);
            NoteCell { x, y, len, part: n.part, dimmed: n.start_column > current_column }
        })
        .collect()
}

pub fn draw_score(frame: &mut Frame, area: Rect, view: &ScoreView, enabled: &[Part]) {
    let block = Block::bordered().title(" score ");
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let cells = layout_notes(&view.notes, view.current_column, enabled, inner.width, inner.height);
    let head = x_of(view.current_column - page_start(view.current_column), inner.width)
        .min(inner.width - 1);
    let buf = frame.buffer_mut();

    for y in inner.top()..inner.bottom() {
        if let Some(cell) = buf.cell_mut((inner.x + head, y)) {
            cell.set_char('┊').set_style(Style::default().fg(Color::DarkGray));
        }
    }
    for note in cells {
        let mut style = Style::default().fg(part_color(note.part));
        if note.dimmed {
            style = style.add_modifier(Modifier::DIM);
        }
        for dx in 0..note.len {
            if let Some(cell) = buf.cell_mut((inner.x + note.x + dx, inner.y + note.y)) {
                cell.set_char('▬').set_style(style);
            }
        }
    }
}

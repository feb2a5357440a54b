use crate::shared::VisualState;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Sparkline};
use ratatui::Frame;

const BAR_MAX: u64 = 100;

// Squeeze per-column brightness into `width` bars, louder with intensity.
pub fn strip_bars(brightness: &[f32], width: usize, intensity: f32) -> Vec<u64> {
    if brightness.is_empty() || width == 0 {
        return vec![];
    }
    (0..width)
        .map(|i| {
            let start = i * brightness.len() / width;
            let end = ((i + 1) * brightness.len() / width).max(start + 1).min(brightness.len());
            let slice = &brightness[start..end];
            let mean = slice.iter().sum::<f32>() / slice.len() as f32;
            ((mean * intensity).clamp(0.0, 1.0) * BAR_MAX as f32).round() as u64
        })
        .collect()
}

pub fn draw_scan_strip(frame: &mut Frame, area: Rect, brightness: &[f32], vs: &VisualState) {
    let block = Block::bordered().title(" scan ");
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.width == 0 || inner.height == 0 {
        return;
    }

    let bars = strip_bars(brightness, inner.width as usize, vs.intensity);
    let color = if vs.is_playing { Color::LightMagenta } else { Color::DarkGray };
    let strip = Sparkline::default()
        .data(&bars)
        .max(BAR_MAX)
        .style(Style::default().fg(color));
    frame.render_widget(strip, inner);

    if brightness.is_empty() {
        return;
    }
    // playhead
    let offset = ((vs.scan_pos.clamp(0.0, 1.0) * inner.width as f64) as u16).min(inner.width - 1);
    let head = if vs.is_playing { Color::Yellow } else { Color::Gray };
    let buf = frame.buffer_mut();
    for y in inner.top()..inner.bottom() {
        if let Some(cell) = buf.cell_mut((inner.x + offset, y)) {
            cell.set_char('│').set_style(Style::default().fg(head));
        }
    }
}

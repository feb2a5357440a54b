use crate::shared::{DisplayState, VisualState};
use super::grid::draw_scan_strip;
use super::mode::TuiState;
use super::score::{draw_score, part_color};
use ratatui::layout::{Layout, Direction, Constraint, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Wrap};
use ratatui::Frame;

const HELP_HINT: &str = "space play/stop  r reset  l load  ? keys  q quit";
const HELP_FULL: [&str; 4] = [
    "space play/stop   r reset   l load image again   esc/q quit",
    "[ ] tempo -/+5    - = visual intensity -/+0.25",
    "1 2 3 4 toggle melody / bass / harmony / percussion",
    "m b h p cycle the instrument of melody / bass / harmony / percussion   ? hide keys",
];

pub fn render(frame: &mut Frame, area: Rect, ds: &DisplayState, vs: &VisualState, ts: &TuiState) {
    let help_height = if ts.show_help { HELP_FULL.len() as u16 } else { 1 };
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // title, mood, status
            Constraint::Length(3), // transport + parts
            Constraint::Length(6), // scan strip
            Constraint::Min(8), // score
            Constraint::Length(help_height),
        ])
        .split(area);

    draw_header(frame, sections[0], ds);
    draw_transport(frame, sections[1], ds);
    draw_scan_strip(frame, sections[2], &ds.column_brightness, vs);
    let enabled: Vec<_> = ds.parts.iter().filter(|p| p.enabled).map(|p| p.part).collect();
    draw_score(frame, sections[3], &ds.score, &enabled);
    draw_help(frame, sections[4], ts);
}

fn draw_header(frame: &mut Frame, area: Rect, ds: &DisplayState) {
    let title = if ds.title.is_empty() { "synesthesia" } else { ds.title.as_str() };
    let mut first = vec![Span::styled(title, Style::default().add_modifier(Modifier::BOLD))];
    if !ds.artist_style.is_empty() {
        first.push(Span::raw(format!("  {}", ds.artist_style)));
    }
    if !ds.mood.is_empty() {
        first.push(Span::styled(format!("  ({})", ds.mood), Style::default().fg(Color::Gray)));
    }
    let status_style = if ds.phase_label == "ERROR" {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let text = vec![Line::from(first), Line::styled(ds.status_text.as_str(), status_style)];
    let para = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(Block::bordered());
    frame.render_widget(para, area);
}

fn draw_transport(frame: &mut Frame, area: Rect, ds: &DisplayState) {
    let state_color = match ds.phase_label {
        _ if ds.playing => Color::Green,
        "ERROR" => Color::Red,
        "ANALYZING" => Color::Yellow,
        _ => Color::White,
    };
    let scale = ds.scale.map_or("-", |s| s.label());
    let mut spans = vec![
        Span::styled(format!("{:<9}", ds.phase_label), Style::default().fg(state_color)),
        Span::raw(format!(" {:>3} bpm  {scale:<10} fx {:.2}  ", ds.tempo, ds.visual_intensity)),
    ];
    // parts in key order, muted ones dimmed
    for (n, status) in ds.parts.iter().enumerate() {
        let mut style = Style::default().fg(part_color(status.part));
        if !status.enabled {
            style = Style::default().fg(Color::DarkGray).add_modifier(Modifier::CROSSED_OUT);
        }
        spans.push(Span::styled(
            format!("{}:{} {}  ", n + 1, status.part.label(), status.instrument.label()),
            style,
        ));
    }
    let para = Paragraph::new(Line::from(spans)).block(Block::bordered());
    frame.render_widget(para, area);
}

fn draw_help(frame: &mut Frame, area: Rect, ts: &TuiState) {
    let lines: Vec<Line> = if ts.show_help {
        HELP_FULL.iter().map(|l| Line::raw(*l)).collect()
    } else {
        vec![Line::raw(HELP_HINT)]
    };
    let para = Paragraph::new(lines).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(para, area);
}

/// Ratatui draw entry-point for embedsearch.
/// Everything here is derived from `AppState`; nothing is mutated.
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::{AppState, Focus};
use crate::orchestrator::Lane;

pub const SPINNER_GLYPHS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const BG: Color = Color::Rgb(8, 8, 14);
const DIM: Color = Color::Rgb(70, 70, 90);

// ── Main draw entry point ─────────────────────────────────────────────────────

pub fn draw(f: &mut Frame, state: &AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status bar
            Constraint::Length(3), // file row
            Constraint::Length(3), // query row
            Constraint::Min(0),    // result slot
            Constraint::Length(1), // key hints
        ])
        .split(f.area());

    draw_status_bar(f, state, chunks[0]);
    draw_file_row(f, state, chunks[1]);
    draw_query_row(f, state, chunks[2]);
    draw_result(f, state, chunks[3]);
    draw_hints(f, state, chunks[4]);
}

// ── Status bar ────────────────────────────────────────────────────────────────

fn draw_status_bar(f: &mut Frame, state: &AppState, area: Rect) {
    let busy: Vec<Lane> = Lane::ALL
        .into_iter()
        .filter(|l| state.orch.is_busy(*l))
        .collect();

    let (glyph, glyph_color) = if busy.is_empty() {
        ("▲", Color::White)
    } else {
        let g = SPINNER_GLYPHS[(state.spinner_tick as usize) % SPINNER_GLYPHS.len()];
        (g, Color::Cyan)
    };

    let mut spans = vec![
        Span::raw(" "),
        Span::styled(glyph, Style::default().fg(glyph_color).add_modifier(Modifier::BOLD)),
        Span::styled(" embedsearch", Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
        Span::raw("  "),
        Span::styled(state.profile.clone(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::styled("  ·  ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            truncate_path(&state.endpoint, 40),
            Style::default().fg(Color::Rgb(100, 180, 220)),
        ),
        Span::styled(
            format!("  dialog: {}", state.picker_label),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    for lane in busy {
        spans.push(Span::styled("  ◆ ", Style::default().fg(Color::Rgb(200, 160, 50))));
        spans.push(Span::styled(
            format!("{}…", lane.label()),
            Style::default().fg(Color::Rgb(200, 160, 50)),
        ));
    }

    f.render_widget(
        Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Rgb(10, 10, 18))),
        area,
    );
}

// ── Buttons ───────────────────────────────────────────────────────────────────

fn button(label: &str, focused: bool, busy: bool) -> Span<'static> {
    let style = if focused {
        Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else if busy {
        Style::default().fg(Color::Rgb(200, 160, 50)).bg(Color::Rgb(30, 28, 20))
    } else {
        Style::default().fg(Color::White).bg(Color::Rgb(35, 35, 55))
    };
    Span::styled(format!(" {label} "), style)
}

fn row_block(title: &str, active: bool) -> Block<'static> {
    let border = if active { Color::Cyan } else { Color::Rgb(60, 60, 80) };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(format!(" {title} "), Style::default().fg(border)))
        .style(Style::default().bg(BG))
}

// ── File row ──────────────────────────────────────────────────────────────────

fn draw_file_row(f: &mut Frame, state: &AppState, area: Rect) {
    let focus = state.focus;
    let active = matches!(focus, Focus::PickButton | Focus::EmbedButton);
    let block = row_block("file", active);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(24)])
        .split(inner);

    let path_span = match &state.orch.state().selected_path {
        Some(p) => Span::styled(
            truncate_path(p, cols[0].width.saturating_sub(2) as usize),
            Style::default().fg(Color::White),
        ),
        None => Span::styled("no file selected", Style::default().fg(DIM)),
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![Span::raw(" "), path_span])),
        cols[0],
    );

    let buttons = Line::from(vec![
        button("Pick file", focus == Focus::PickButton, state.orch.is_busy(Lane::Picking)),
        Span::raw(" "),
        button("Embed", focus == Focus::EmbedButton, state.orch.is_busy(Lane::Embedding)),
    ]);
    f.render_widget(Paragraph::new(buttons), cols[1]);
}

// ── Query row ─────────────────────────────────────────────────────────────────

fn draw_query_row(f: &mut Frame, state: &AppState, area: Rect) {
    let focus = state.focus;
    let active = matches!(focus, Focus::Query | Focus::SearchButton | Focus::ProbeButton);
    let block = row_block("search", active);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Length(22)])
        .split(inner);

    let prompt_color = if focus == Focus::Query { Color::Cyan } else { DIM };
    let query = &state.orch.state().query_text;
    let content = if query.is_empty() && focus != Focus::Query {
        Span::styled("describe the file you're looking for…", Style::default().fg(DIM))
    } else {
        Span::styled(query.clone(), Style::default().fg(Color::White))
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(" ❯ ", Style::default().fg(prompt_color).add_modifier(Modifier::BOLD)),
            content,
        ])),
        cols[0],
    );

    let buttons = Line::from(vec![
        button("Search", focus == Focus::SearchButton, state.orch.is_busy(Lane::Searching)),
        Span::raw(" "),
        button("Test db", focus == Focus::ProbeButton, state.orch.is_busy(Lane::Probing)),
    ]);
    f.render_widget(Paragraph::new(buttons), cols[1]);

    if focus == Focus::Query {
        // prompt is " ❯ " — 3 cols
        let prompt_width: u16 = 3;
        let before = &query[..state.cursor.min(query.len())];
        let cursor_x = cols[0].x + prompt_width + before.width() as u16;
        if cursor_x < cols[0].x + cols[0].width {
            f.set_cursor_position((cursor_x, cols[0].y));
        }
    }
}

// ── Result slot ───────────────────────────────────────────────────────────────

fn draw_result(f: &mut Frame, state: &AppState, area: Rect) {
    let (title, border) = match state.orch.shown() {
        Some(shown) => {
            let verdict = if shown.failed { "error" } else { "ok" };
            let color = if shown.failed { Color::Rgb(220, 90, 90) } else { Color::Rgb(0, 200, 120) };
            (
                format!(" result · {} · {verdict} · {} ", shown.lane.label(), shown.at.format("%H:%M:%S")),
                color,
            )
        }
        None => (" result ".to_string(), Color::Rgb(60, 60, 80)),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(title, Style::default().fg(border)))
        .style(Style::default().bg(BG));

    let text = &state.orch.state().result_text;
    let body: Vec<Line> = if text.is_empty() {
        vec![Line::from(Span::styled(
            "pick a file and embed it, or search what you've embedded",
            Style::default().fg(DIM),
        ))]
    } else {
        text.lines().map(|l| Line::from(l.to_string())).collect()
    };

    f.render_widget(
        Paragraph::new(body)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((state.result_scroll, 0)),
        area,
    );
}

// ── Key hints ─────────────────────────────────────────────────────────────────

fn draw_hints(f: &mut Frame, state: &AppState, area: Rect) {
    let hint = match state.focus {
        Focus::Query => "Enter search  ·  Tab next  ·  Ctrl+O pick  ·  Ctrl+E embed  ·  Ctrl+T test db  ·  Ctrl+C quit",
        _ => "Enter/Space press  ·  Tab next  ·  Ctrl+O pick  ·  Ctrl+E embed  ·  Ctrl+F search  ·  PgUp/PgDn scroll  ·  q quit",
    };
    f.render_widget(
        Paragraph::new(Span::styled(format!(" {hint}"), Style::default().fg(Color::Rgb(55, 50, 90)))),
        area,
    );
}

// ── Utilities ─────────────────────────────────────────────────────────────────

/// Keep the tail of a path within `max` display columns, prefixed with `…`.
pub fn truncate_path(path: &str, max: usize) -> String {
    if path.width() <= max {
        return path.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let budget = max - 1;
    let mut width = 0;
    let mut tail: Vec<char> = Vec::new();
    for c in path.chars().rev() {
        let w = c.width().unwrap_or(0);
        if width + w > budget {
            break;
        }
        width += w;
        tail.push(c);
    }
    let tail: String = tail.into_iter().rev().collect();
    format!("…{tail}")
}

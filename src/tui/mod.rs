/// Ratatui-based TUI for embedsearch.
///
/// Architecture:
///   main thread:  event loop — crossterm keyboard events + mpsc Settlement drain
///   action tasks: tokio::spawn per gateway/picker call — report back via Settlement
///
/// Layout:
///   ┌────────────────────────────────────────────────┐
///   │  status bar (1 line)                           │
///   ├────────────────────────────────────────────────┤
///   │  selected file + [Pick file] [Embed]           │
///   ├────────────────────────────────────────────────┤
///   │  query input + [Search] [Test db]              │
///   ├────────────────────────────────────────────────┤
///   │  result slot (scrollable, Min(0))              │
///   ├────────────────────────────────────────────────┤
///   │  key hints (1 line)                            │
///   └────────────────────────────────────────────────┘
pub mod render;

use std::io;

use anyhow::Result;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;

use crate::config::ResolvedConfig;
use crate::orchestrator::{Orchestrator, Settlement};

// ── Focus ─────────────────────────────────────────────────────────────────────

/// Which control receives Enter / typed characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    PickButton,
    EmbedButton,
    Query,
    SearchButton,
    ProbeButton,
}

impl Focus {
    const ORDER: [Focus; 5] = [
        Focus::PickButton,
        Focus::EmbedButton,
        Focus::Query,
        Focus::SearchButton,
        Focus::ProbeButton,
    ];

    fn position(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        Self::ORDER[(self.position() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

// ── Action — what a key press asks for ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    FocusNext,
    FocusPrev,
    PickFile,
    Embed,
    Find,
    TestSql,
    Edit(QueryEdit),
    ScrollResult(i16),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEdit {
    Insert(char),
    Backspace,
    DeleteForward,
    DeleteWord,
    Clear,
    Left,
    Right,
    WordLeft,
    WordRight,
    Home,
    End,
}

// ── AppState ──────────────────────────────────────────────────────────────────

pub struct AppState {
    pub orch: Orchestrator,
    pub focus: Focus,
    /// Byte offset of the edit cursor in the query text
    pub cursor: usize,
    /// Lines scrolled down in the result pane
    pub result_scroll: u16,
    /// Incremented every 120ms while any lane is busy, for spinner animation
    pub spinner_tick: u32,
    pub profile: String,
    pub endpoint: String,
    pub picker_label: String,
}

impl AppState {
    pub fn new(orch: Orchestrator, resolved: &ResolvedConfig) -> Self {
        Self {
            orch,
            focus: Focus::PickButton,
            cursor: 0,
            result_scroll: 0,
            spinner_tick: 0,
            profile: resolved.profile_name.clone(),
            endpoint: resolved.endpoint.clone(),
            picker_label: format!("{:?}", resolved.picker.backend).to_lowercase(),
        }
    }

    fn apply_settlement(&mut self, settlement: Settlement) {
        let shown_before = self.orch.shown().map(|s| s.id);
        self.orch.apply(settlement);
        if self.orch.shown().map(|s| s.id) != shown_before {
            self.result_scroll = 0;
        }
    }

    /// Carry out one action. Returns false when the app should exit.
    pub fn perform(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return false,
            Action::FocusNext => self.focus = self.focus.next(),
            Action::FocusPrev => self.focus = self.focus.prev(),
            Action::PickFile => {
                self.orch.pick_file();
            }
            Action::Embed => {
                self.orch.embed();
            }
            Action::Find => {
                self.orch.find();
            }
            Action::TestSql => {
                self.orch.test_sql();
            }
            Action::Edit(edit) => self.edit_query(edit),
            Action::ScrollResult(delta) => {
                self.result_scroll = if delta < 0 {
                    self.result_scroll.saturating_sub(delta.unsigned_abs())
                } else {
                    self.result_scroll.saturating_add(delta as u16)
                };
            }
        }
        true
    }

    /// Apply an edit to the query text and push the new value into the orchestrator.
    fn edit_query(&mut self, edit: QueryEdit) {
        let mut text = self.orch.state().query_text.clone();
        let mut cursor = self.cursor.min(text.len());
        let changed = match edit {
            QueryEdit::Insert(c) => {
                text.insert(cursor, c);
                cursor += c.len_utf8();
                true
            }
            QueryEdit::Backspace => input_backspace(&mut text, &mut cursor),
            QueryEdit::DeleteForward => input_delete_forward(&mut text, &mut cursor),
            QueryEdit::DeleteWord => input_delete_word(&mut text, &mut cursor),
            QueryEdit::Clear => {
                cursor = 0;
                !std::mem::take(&mut text).is_empty()
            }
            QueryEdit::Left => {
                cursor = prev_char_boundary(&text, cursor);
                false
            }
            QueryEdit::Right => {
                cursor = next_char_boundary(&text, cursor);
                false
            }
            QueryEdit::WordLeft => {
                cursor = word_left(&text, cursor);
                false
            }
            QueryEdit::WordRight => {
                cursor = word_right(&text, cursor);
                false
            }
            QueryEdit::Home => {
                cursor = 0;
                false
            }
            QueryEdit::End => {
                cursor = text.len();
                false
            }
        };
        self.cursor = cursor;
        if changed {
            self.orch.set_query(text);
        }
    }
}

// ── Key mapping ───────────────────────────────────────────────────────────────

/// Translate a key press into an action given the current focus.
/// Shortcuts behave exactly like their buttons.
pub fn map_key(key: KeyEvent, focus: Focus) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    if ctrl {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('q') => Some(Action::Quit),
            KeyCode::Char('o') => Some(Action::PickFile),
            KeyCode::Char('e') => Some(Action::Embed),
            KeyCode::Char('f') => Some(Action::Find),
            KeyCode::Char('t') => Some(Action::TestSql),
            KeyCode::Char('w') if focus == Focus::Query => Some(Action::Edit(QueryEdit::DeleteWord)),
            KeyCode::Char('u') if focus == Focus::Query => Some(Action::Edit(QueryEdit::Clear)),
            KeyCode::Char('a') if focus == Focus::Query => Some(Action::Edit(QueryEdit::Home)),
            KeyCode::Left if focus == Focus::Query => Some(Action::Edit(QueryEdit::WordLeft)),
            KeyCode::Right if focus == Focus::Query => Some(Action::Edit(QueryEdit::WordRight)),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Tab => return Some(Action::FocusNext),
        KeyCode::BackTab => return Some(Action::FocusPrev),
        KeyCode::PageUp => return Some(Action::ScrollResult(-10)),
        KeyCode::PageDown => return Some(Action::ScrollResult(10)),
        KeyCode::Esc => return Some(Action::Quit),
        _ => {}
    }

    if focus == Focus::Query {
        return match key.code {
            // Form submit
            KeyCode::Enter => Some(Action::Find),
            KeyCode::Char(c) if !alt => Some(Action::Edit(QueryEdit::Insert(c))),
            KeyCode::Backspace if alt => Some(Action::Edit(QueryEdit::DeleteWord)),
            KeyCode::Backspace => Some(Action::Edit(QueryEdit::Backspace)),
            KeyCode::Delete => Some(Action::Edit(QueryEdit::DeleteForward)),
            KeyCode::Left => Some(Action::Edit(QueryEdit::Left)),
            KeyCode::Right => Some(Action::Edit(QueryEdit::Right)),
            KeyCode::Home => Some(Action::Edit(QueryEdit::Home)),
            KeyCode::End => Some(Action::Edit(QueryEdit::End)),
            KeyCode::Up => Some(Action::ScrollResult(-1)),
            KeyCode::Down => Some(Action::ScrollResult(1)),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Enter | KeyCode::Char(' ') => Some(match focus {
            Focus::PickButton => Action::PickFile,
            Focus::EmbedButton => Action::Embed,
            Focus::SearchButton => Action::Find,
            Focus::ProbeButton => Action::TestSql,
            Focus::Query => Action::Find,
        }),
        KeyCode::Left | KeyCode::Up => Some(Action::FocusPrev),
        KeyCode::Right | KeyCode::Down => Some(Action::FocusNext),
        KeyCode::Char('q') => Some(Action::Quit),
        _ => None,
    }
}

// ── Terminal setup / teardown ─────────────────────────────────────────────────

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) {
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();
}

// ── Main TUI run loop ─────────────────────────────────────────────────────────

pub async fn run(
    orch: Orchestrator,
    settle_rx: mpsc::UnboundedReceiver<Settlement>,
    resolved: &ResolvedConfig,
) -> Result<()> {
    let mut terminal = setup_terminal()?;

    // Panic hook — restore terminal before printing panic
    let orig_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        orig_hook(info);
    }));

    let mut state = AppState::new(orch, resolved);
    let result = event_loop(&mut terminal, &mut state, settle_rx).await;

    restore_terminal(&mut terminal);
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut AppState,
    mut settle_rx: mpsc::UnboundedReceiver<Settlement>,
) -> Result<()> {
    tracing::info!(profile = %state.profile, endpoint = %state.endpoint, "session started");

    let mut crossterm_events = EventStream::new();
    let mut ticker = tokio::time::interval(tokio::time::Duration::from_millis(120));

    terminal.draw(|f| render::draw(f, state))?;

    loop {
        tokio::select! {
            // ── Animation tick ────────────────────────────────────────────────
            _ = ticker.tick() => {
                if state.orch.any_busy() {
                    state.spinner_tick = state.spinner_tick.wrapping_add(1);
                    terminal.draw(|f| render::draw(f, state))?;
                }
            }

            // ── Drain settlements from action tasks ───────────────────────────
            Some(settlement) = settle_rx.recv() => {
                state.apply_settlement(settlement);
                terminal.draw(|f| render::draw(f, state))?;
            }

            // ── Keyboard/resize events ────────────────────────────────────────
            Some(Ok(ev)) = crossterm_events.next() => {
                if let Event::Key(key) = ev {
                    if key.kind != KeyEventKind::Release {
                        if let Some(action) = map_key(key, state.focus) {
                            if !state.perform(action) {
                                break;
                            }
                        }
                    }
                }
                terminal.draw(|f| render::draw(f, state))?;
            }
        }
    }

    tracing::info!("session ended");
    Ok(())
}

// ── Input editing helpers ─────────────────────────────────────────────────────
// Each mutating helper returns whether the text changed.

/// Remove the character immediately before the cursor (UTF-8 safe).
fn input_backspace(input: &mut String, cursor: &mut usize) -> bool {
    if *cursor == 0 {
        return false;
    }
    let prev = prev_char_boundary(input, *cursor);
    input.drain(prev..*cursor);
    *cursor = prev;
    true
}

/// Delete the character at the cursor position.
fn input_delete_forward(input: &mut String, cursor: &mut usize) -> bool {
    if *cursor >= input.len() {
        return false;
    }
    let next = next_char_boundary(input, *cursor);
    input.drain(*cursor..next);
    true
}

/// Delete the word immediately before the cursor (stops at whitespace boundary).
fn input_delete_word(input: &mut String, cursor: &mut usize) -> bool {
    if *cursor == 0 {
        return false;
    }
    let start = word_left(input, *cursor);
    input.drain(start..*cursor);
    *cursor = start;
    true
}

/// Previous UTF-8 char boundary before `pos`.
fn prev_char_boundary(s: &str, pos: usize) -> usize {
    if pos == 0 {
        return 0;
    }
    let mut p = pos - 1;
    while !s.is_char_boundary(p) {
        p -= 1;
    }
    p
}

/// Next UTF-8 char boundary after `pos`.
fn next_char_boundary(s: &str, pos: usize) -> usize {
    if pos >= s.len() {
        return s.len();
    }
    let mut p = pos + 1;
    while p <= s.len() && !s.is_char_boundary(p) {
        p += 1;
    }
    p.min(s.len())
}

/// Jump to the start of the previous word (skip trailing spaces, then the word).
fn word_left(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    while pos > 0 && bytes[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    while pos > 0 && !bytes[pos - 1].is_ascii_whitespace() {
        pos -= 1;
    }
    pos
}

/// Jump past the end of the next word to the right.
fn word_right(s: &str, mut pos: usize) -> usize {
    let bytes = s.as_bytes();
    let len = s.len();
    while pos < len && bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    while pos < len && !bytes[pos].is_ascii_whitespace() {
        pos += 1;
    }
    pos
}

// ── Tests ──────────────────────────────────────────────────────────────────────

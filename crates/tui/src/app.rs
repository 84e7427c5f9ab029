use std::{io, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use etaboard_core::{
    reading::LOADING_TEXT, Board, BoardEntry, BoardUpdate, Position, RefreshHandle,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

const TICK_RATE: Duration = Duration::from_millis(250);
const SLOT_WIDTH: u16 = 38;
const TITLE: &str = "CTA & Divvy ETA";

#[derive(Debug, Clone)]
struct Theme {
    background: Color,
    foreground: Color,
    accent: Color,
    muted: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color::Black,
            foreground: Color::White,
            accent: Color::Cyan,
            muted: Color::DarkGray,
        }
    }
}

/// What the key reader thread forwards to the board loop.
#[derive(Debug, PartialEq)]
enum AppEvent {
    Key(KeyEvent),
    /// Terminal resized, or the reader went idle; either way redraw.
    Redraw,
}

/// Full-screen kiosk showing one line per monitored stop or station.
pub struct EtaBoardApp {
    board: Board,
    refresh: RefreshHandle,
    update_rx: Option<mpsc::UnboundedReceiver<BoardUpdate>>,
    status: String,
    should_quit: bool,
    theme: Theme,
}

impl EtaBoardApp {
    pub fn new(board: Board, refresh: RefreshHandle) -> Self {
        Self {
            board,
            refresh,
            update_rx: None,
            status: "Waiting for first refresh".to_string(),
            should_quit: false,
            theme: Theme::default(),
        }
    }

    pub fn attach_updates(&mut self, receiver: mpsc::UnboundedReceiver<BoardUpdate>) {
        self.update_rx = Some(receiver);
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let (event_tx, mut event_rx) = mpsc::channel::<AppEvent>(128);
        spawn_key_reader(event_tx);

        let mut update_rx = self.update_rx.take();

        loop {
            terminal.draw(|frame| self.draw(frame))?;
            if self.should_quit {
                break;
            }

            if let Some(rx) = update_rx.as_mut() {
                let mut updates_closed = false;
                tokio::select! {
                    maybe_event = event_rx.recv() => {
                        if !self.process_app_event(maybe_event) {
                            break;
                        }
                    }
                    maybe_update = rx.recv() => {
                        match maybe_update {
                            Some(update) => self.handle_update(update),
                            None => updates_closed = true,
                        }
                    }
                }
                if updates_closed {
                    info!("Refresh loop finished; closing board");
                    update_rx = None;
                    self.should_quit = true;
                }
            } else {
                let maybe_event = event_rx.recv().await;
                if !self.process_app_event(maybe_event) {
                    break;
                }
            }

            if self.should_quit {
                break;
            }
        }

        leave_board_screen(&mut terminal)
    }

    fn handle_update(&mut self, update: BoardUpdate) {
        debug!(entities = update.texts.len(), "Board update received");
        self.board.apply(&update);
        self.status = format!("Updated {}", format_local(update.refreshed_at));
    }

    fn process_app_event(&mut self, maybe_event: Option<AppEvent>) -> bool {
        match maybe_event {
            Some(AppEvent::Key(key)) => {
                self.handle_key(key);
                true
            }
            Some(AppEvent::Redraw) => true,
            None => false,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('x') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Char('r') => {
                if self.refresh.trigger() {
                    self.status = "Refresh requested".to_string();
                } else {
                    self.status = "Refresh already pending".to_string();
                }
            }
            _ => {}
        }
    }

    fn draw(&self, frame: &mut Frame) {
        let area = frame.size();
        frame.render_widget(
            Block::default().style(Style::default().bg(self.theme.background)),
            area,
        );
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(3),
                Constraint::Length(3),
            ])
            .split(area);

        self.render_title(frame, layout[0]);
        self.render_board(frame, layout[1]);
        self.render_status(frame, layout[2]);
    }

    fn render_title(&self, frame: &mut Frame, area: Rect) {
        let clock = Local::now().format("%a %b %-d  %H:%M:%S").to_string();
        let line = Line::from(vec![
            Span::styled(
                TITLE,
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled(clock, Style::default().fg(self.theme.foreground)),
        ]);
        let paragraph = Paragraph::new(line)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }

    fn render_board(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Arrivals (min)");
        let inner = block.inner(area);
        frame.render_widget(block, area);

        for entry in self.board.entries() {
            let Some(slot) = slot_rect(inner, entry.entity.position) else {
                continue;
            };
            frame.render_widget(Paragraph::new(self.entry_line(entry)), slot);
        }
    }

    fn entry_line(&self, entry: &BoardEntry) -> Line<'static> {
        let value_style = if entry.text == LOADING_TEXT {
            Style::default().fg(self.theme.muted)
        } else {
            Style::default()
                .fg(self.theme.foreground)
                .add_modifier(Modifier::BOLD)
        };
        Line::from(vec![
            Span::styled(
                format!("{:<16}", entry.entity.label),
                Style::default().fg(self.theme.accent),
            ),
            Span::styled(entry.text.clone(), value_style),
        ])
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let line = Line::from(vec![
            Span::raw(self.status.clone()),
            Span::styled(
                "   q: exit  r: refresh",
                Style::default().fg(self.theme.muted),
            ),
        ]);
        let paragraph = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(paragraph, area);
    }
}

/// Screen area for an entity at `position` inside `area`, clipped to fit.
fn slot_rect(area: Rect, position: Position) -> Option<Rect> {
    if position.x >= area.width || position.y >= area.height {
        return None;
    }
    let x = area.x + position.x;
    let y = area.y + position.y;
    let width = SLOT_WIDTH.min(area.width - position.x);
    Some(Rect::new(x, y, width, 1))
}

fn format_local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

/// Hand the terminal back to the shell. Every step runs even if an earlier
/// one fails, and the first error is reported.
fn leave_board_screen(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    let raw = disable_raw_mode().context("failed to disable raw mode");
    let screen = execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen");
    let cursor = terminal.show_cursor().context("failed to show cursor");
    raw.and(screen).and(cursor)
}

/// Translate a raw terminal event into something the board reacts to.
fn board_event(event: Event) -> Option<AppEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
        Event::Resize(..) => Some(AppEvent::Redraw),
        _ => None,
    }
}

/// Blocking crossterm reader on its own thread. Stops when the board loop
/// drops its receiver or the terminal stops producing events.
fn spawn_key_reader(sender: mpsc::Sender<AppEvent>) {
    thread::spawn(move || {
        while let Ok(ready) = event::poll(TICK_RATE) {
            let next = if ready {
                match event::read() {
                    Ok(event) => board_event(event),
                    Err(err) => {
                        debug!(%err, "Terminal input closed");
                        break;
                    }
                }
            } else {
                // Idle tick keeps the title clock moving.
                Some(AppEvent::Redraw)
            };
            if let Some(app_event) = next {
                if sender.blocking_send(app_event).is_err() {
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_clip_to_the_board() {
        let area = Rect::new(1, 4, 60, 20);
        assert_eq!(
            slot_rect(area, Position { x: 2, y: 3 }),
            Some(Rect::new(3, 7, SLOT_WIDTH, 1))
        );
        assert_eq!(
            slot_rect(area, Position { x: 42, y: 3 }),
            Some(Rect::new(43, 7, 18, 1))
        );
        assert_eq!(slot_rect(area, Position { x: 60, y: 0 }), None);
        assert_eq!(slot_rect(area, Position { x: 0, y: 20 }), None);
    }

    #[test]
    fn only_key_presses_and_resizes_reach_the_board() {
        let press = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE);
        assert_eq!(
            board_event(Event::Key(press)),
            Some(AppEvent::Key(press))
        );

        let mut release = press;
        release.kind = KeyEventKind::Release;
        assert_eq!(board_event(Event::Key(release)), None);

        assert_eq!(board_event(Event::Resize(80, 24)), Some(AppEvent::Redraw));
        assert_eq!(board_event(Event::FocusGained), None);
    }
}

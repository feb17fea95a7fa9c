//! Full-screen `ratatui` meter: label, level gauge, and threshold warning.

use crate::audio::{WAITING_TEXT, WARNING_TEXT};
use crate::display::DisplaySink;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::{
    cursor::{Hide, Show},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Gauge, Paragraph},
    Frame, Terminal,
};
use std::io::{self, Stdout, Write};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

const GAUGE_WIDTH: u16 = 40;
const PANEL_HEIGHT: u16 = 9;

// Set while a `TuiSink` holds raw mode and the alternate screen.
static SCREEN_ACTIVE: AtomicBool = AtomicBool::new(false);
static PANIC_HOOK: OnceLock<()> = OnceLock::new();

/// Everything the meter screen shows.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterView {
    pub text: String,
    pub progress: f32,
    pub over_threshold: bool,
    pub notice: Option<String>,
}

impl Default for MeterView {
    fn default() -> Self {
        Self {
            text: WAITING_TEXT.to_string(),
            progress: 0.0,
            over_threshold: false,
            notice: None,
        }
    }
}

pub fn draw(frame: &mut Frame, view: &MeterView) {
    let area = centered(frame.size(), GAUGE_WIDTH + 4, PANEL_HEIGHT);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(" Sound Meter ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let label = Paragraph::new(Line::from(Span::styled(
        format!("Sound Meter: {}", view.text),
        Style::default().add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center);
    frame.render_widget(label, rows[0]);

    let gauge_color = if view.over_threshold {
        Color::Red
    } else {
        Color::Green
    };
    let ratio = if view.progress.is_nan() {
        0.0
    } else {
        f64::from(view.progress).clamp(0.0, 1.0)
    };
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(gauge_color).bg(Color::DarkGray))
        .ratio(ratio)
        .label(format!("{:.0}%", ratio * 100.0));
    frame.render_widget(gauge, rows[2]);

    if view.over_threshold {
        let warning = Paragraph::new(Span::styled(WARNING_TEXT, Style::default().fg(Color::Red)))
            .alignment(Alignment::Center);
        frame.render_widget(warning, rows[3]);
    }

    let footer = match &view.notice {
        Some(notice) => Span::styled(notice.as_str(), Style::default().fg(Color::Yellow)),
        None => Span::styled("q / Esc to quit", Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(
        Paragraph::new(footer).alignment(Alignment::Center),
        rows[5],
    );
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

/// Hand the terminal back before the panic report so it stays readable.
pub fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            restore_screen();
            crate::log_panic(info);
            previous(info);
        }));
    });
}

/// Leave raw mode and the alternate screen if a sink entered them.
fn restore_screen() -> bool {
    if !SCREEN_ACTIVE.swap(false, Ordering::SeqCst) {
        return false;
    }
    let _ = disable_raw_mode();
    let mut stdout = io::stdout();
    let _ = execute!(stdout, LeaveAlternateScreen, Show);
    let _ = stdout.flush();
    true
}

fn enter_screen(stdout: &mut Stdout) -> io::Result<()> {
    enable_raw_mode()?;
    SCREEN_ACTIVE.store(true, Ordering::SeqCst);
    execute!(stdout, EnterAlternateScreen, Hide)
}

/// Sink that owns the alternate screen for its lifetime.
pub struct TuiSink {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    view: MeterView,
}

impl TuiSink {
    pub fn new() -> io::Result<Self> {
        install_panic_hook();
        let mut stdout = io::stdout();
        let terminal = match enter_screen(&mut stdout)
            .and_then(|()| Terminal::new(CrosstermBackend::new(stdout)))
        {
            Ok(terminal) => terminal,
            Err(err) => {
                restore_screen();
                return Err(err);
            }
        };
        // `Drop` restores the screen from here on.
        let mut sink = Self {
            terminal,
            view: MeterView::default(),
        };
        sink.redraw()?;
        Ok(sink)
    }

    fn redraw(&mut self) -> io::Result<()> {
        let view = &self.view;
        self.terminal.draw(|frame| draw(frame, view))?;
        Ok(())
    }
}

impl Drop for TuiSink {
    fn drop(&mut self) {
        restore_screen();
    }
}

impl DisplaySink for TuiSink {
    fn render(&mut self, text: &str, progress: f32, over_threshold: bool) -> io::Result<()> {
        self.view.text = text.to_string();
        self.view.progress = progress;
        self.view.over_threshold = over_threshold;
        self.redraw()
    }

    fn notify(&mut self, message: &str) -> io::Result<()> {
        self.view.notice = Some(message.to_string());
        self.redraw()
    }
}

/// Wait up to `timeout` for input; true when the user asked to quit.
pub fn poll_quit(timeout: Duration) -> io::Result<bool> {
    if !event::poll(timeout)? {
        return Ok(false);
    }
    match event::read()? {
        Event::Key(key) => Ok(is_quit_key(key)),
        _ => Ok(false),
    }
}

fn is_quit_key(key: KeyEvent) -> bool {
    if key.kind == KeyEventKind::Release {
        return false;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    fn render_to_string(view: &MeterView) -> String {
        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal.draw(|frame| draw(frame, view)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn waiting_screen_has_no_warning() {
        let screen = render_to_string(&MeterView::default());
        assert!(screen.contains("Sound Meter: Waiting..."));
        assert!(!screen.contains(WARNING_TEXT));
        assert!(screen.contains("0%"));
    }

    #[test]
    fn loud_reading_shows_warning() {
        let view = MeterView {
            text: "60.0 dB".to_string(),
            progress: 0.5,
            over_threshold: true,
            notice: None,
        };
        let screen = render_to_string(&view);
        assert!(screen.contains("Sound Meter: 60.0 dB"));
        assert!(screen.contains(WARNING_TEXT));
        assert!(screen.contains("50%"));
    }

    #[test]
    fn notice_replaces_footer() {
        let view = MeterView {
            notice: Some("microphone unavailable".to_string()),
            ..MeterView::default()
        };
        let screen = render_to_string(&view);
        assert!(screen.contains("microphone unavailable"));
        assert!(!screen.contains("to quit"));
    }

    #[test]
    fn tiny_terminal_does_not_panic() {
        let mut terminal = Terminal::new(TestBackend::new(5, 2)).unwrap();
        terminal
            .draw(|frame| draw(frame, &MeterView::default()))
            .unwrap();
    }

    #[test]
    fn restore_without_screen_is_a_no_op() {
        SCREEN_ACTIVE.store(false, Ordering::SeqCst);
        assert!(!restore_screen());
        assert!(!SCREEN_ACTIVE.load(Ordering::SeqCst));
    }

    #[test]
    fn panic_hook_installs_once() {
        install_panic_hook();
        install_panic_hook();
        assert!(PANIC_HOOK.get().is_some());
    }

    #[test]
    fn quit_keys() {
        let key = |code, modifiers| KeyEvent::new(code, modifiers);
        assert!(is_quit_key(key(KeyCode::Char('q'), KeyModifiers::NONE)));
        assert!(is_quit_key(key(KeyCode::Esc, KeyModifiers::NONE)));
        assert!(is_quit_key(key(KeyCode::Char('c'), KeyModifiers::CONTROL)));
        assert!(!is_quit_key(key(KeyCode::Char('c'), KeyModifiers::NONE)));
    }
}

//! Main event loop for the terminal UI.
//!
//! Sets up the terminal in raw mode with an alternate screen, runs the
//! draw-and-poll loop, and restores the terminal on exit.

use std::io::{self, IsTerminal};
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::sync::mpsc::UnboundedReceiver;

use xhs_client::{App, TransportEvent};

use crate::app::{AppAction, TuiApp};
use crate::error::{Result, TuiError};
use crate::ui;

/// How long one poll for terminal input may block.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run the terminal UI event loop.
///
/// This function takes ownership of the terminal for the duration of the
/// session.  It enables raw mode and switches to an alternate screen buffer
/// so the user's existing terminal content is preserved.
///
/// # Arguments
///
/// * `app` -- The client session, with its transport already attached.
/// * `events` -- The transport's event stream, if a transport is attached.
///
/// # Errors
///
/// Returns [`TuiError::Terminal`] when stdout is not a terminal, and an I/O
/// error if terminal setup, drawing, or event handling fails.
pub async fn run_tui(app: App, events: Option<UnboundedReceiver<TransportEvent>>) -> Result<()> {
    if !io::stdout().is_terminal() {
        return Err(TuiError::Terminal("stdout is not a terminal".into()));
    }

    // Set up the terminal.
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = TuiApp::new(app, events);
    app.start();

    tracing::info!("TUI event loop started");

    let result = event_loop(&mut terminal, &mut app).await;

    // Restore the terminal regardless of whether the loop succeeded.
    crossterm::terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    app.shutdown().await;
    tracing::info!("TUI event loop ended");

    result
}

/// The inner event loop, separated so terminal cleanup always runs.
async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut TuiApp,
) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::draw(frame, app))?;

        // Short poll so spawned requests and pushes are picked up promptly.
        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key)
                    if key.kind == KeyEventKind::Press
                        && app.handle_key(key, Instant::now()) == AppAction::Quit =>
                {
                    break;
                }
                Event::Resize(..) => app.on_resize(),
                _ => {}
            }
        }

        // Yield so spawned requests make progress on a current-thread runtime.
        tokio::task::yield_now().await;
        app.poll(Instant::now());
    }

    Ok(())
}

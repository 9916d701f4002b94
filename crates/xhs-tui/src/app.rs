//! TUI application state and input handling.
//!
//! [`TuiApp`] wraps a client [`App`] with the terminal-only state: the
//! input buffer and its cursor, and the channels feeding the UI loop.
//! Backend requests are spawned onto the runtime and their [`Outcome`]s
//! come back through a [`tokio::sync::mpsc`] channel.

use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc;
use tracing::{debug, info};

use xhs_client::app::execute;
use xhs_client::{App, ChatMessage, Outcome, Request, Role, TransportEvent};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Actions the UI loop should take after processing a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppAction {
    /// Continue the main loop.
    Continue,
    /// Exit the application.
    Quit,
}

/// A slash command typed into the input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/open`: bring the backend browser to the front page.
    Open,
    /// `/test`: browser self-test with OCR.
    Test,
    /// `/note <note_id> <xsec_token>`
    Note { note_id: String, xsec_token: String },
    /// `/cancel <task_id>`
    Cancel(String),
    /// `/viz`: toggle the chart panel.
    Viz,
    Quit,
    /// Anything unrecognized, or a command with missing arguments.
    Help,
}

const HELP: &str = "可用命令：`/open` 打开小红书，`/test` 测试浏览器，\
`/note <note_id> <xsec_token>` 打开笔记，`/cancel <task_id>` 取消任务，\
`/viz` 切换图表面板，`/quit` 退出";

/// Parse a line starting with `/`.  Returns `None` for ordinary input.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let rest = line.strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let command = match parts.next().unwrap_or_default() {
        "open" => Command::Open,
        "test" => Command::Test,
        "note" => match (parts.next(), parts.next()) {
            (Some(note_id), Some(xsec_token)) => Command::Note {
                note_id: note_id.to_owned(),
                xsec_token: xsec_token.to_owned(),
            },
            _ => Command::Help,
        },
        "cancel" => match parts.next() {
            Some(task_id) => Command::Cancel(task_id.to_owned()),
            None => Command::Help,
        },
        "viz" => Command::Viz,
        "quit" | "exit" => Command::Quit,
        _ => Command::Help,
    };
    Some(command)
}

// ---------------------------------------------------------------------------
// TuiApp
// ---------------------------------------------------------------------------

/// The terminal application state.
pub struct TuiApp {
    app: App,
    /// Current text in the input field.
    input: String,
    /// Cursor position within the input, in characters.
    cursor_pos: usize,
    /// Requests spawned but not yet applied.
    in_flight: usize,
    outcome_rx: mpsc::UnboundedReceiver<Outcome>,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    /// WebSocket pushes, when a transport is attached.
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
}

impl TuiApp {
    pub fn new(app: App, events: Option<mpsc::UnboundedReceiver<TransportEvent>>) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            app,
            input: String::new(),
            cursor_pos: 0,
            in_flight: 0,
            outcome_rx,
            outcome_tx,
            events,
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Cursor position within the input, in characters.
    pub fn cursor_pos(&self) -> usize {
        self.cursor_pos
    }

    /// Whether any backend request is still running.
    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    /// The bubble whose actions the `Alt+<n>` keys trigger.
    pub fn active_prompt(&self) -> Option<&ChatMessage> {
        self.app.chat.latest_interactive()
    }

    // -- Lifecycle ----------------------------------------------------------

    /// Issue the startup requests.
    pub fn start(&mut self) {
        for request in self.app.startup_requests() {
            self.spawn(request);
        }
    }

    /// Apply finished requests and pending pushes, then fire due timers.
    ///
    /// Should be called on every iteration of the main UI loop.
    pub fn poll(&mut self, now: Instant) {
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            self.app.apply(outcome, now);
        }
        if let Some(events) = self.events.as_mut() {
            while let Ok(event) = events.try_recv() {
                self.app.on_transport_event(event, now);
            }
        }
        self.app.tick(now);
    }

    pub fn on_resize(&mut self) {
        self.app.viz.on_window_resize();
    }

    pub async fn shutdown(&mut self) {
        self.app.shutdown().await;
    }

    // -- Key handling -------------------------------------------------------

    /// Handle a key event and return the action the UI should take.
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> AppAction {
        // Ctrl+C or Escape always quits.
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return AppAction::Quit;
        }
        if key.code == KeyCode::Esc {
            return AppAction::Quit;
        }

        match key.code {
            KeyCode::Enter
                if key
                    .modifiers
                    .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
            {
                self.insert_char('\n');
            }
            KeyCode::Enter => return self.submit_input(now),
            KeyCode::Tab => {
                self.app.toggle_visualization(now);
            }
            KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::ALT) => {
                if c == 'x' {
                    self.cancel_latest_task();
                } else if let Some(index) = c.to_digit(10).filter(|d| *d > 0) {
                    self.trigger_action(index as usize - 1);
                }
            }
            KeyCode::Char(c) => self.insert_char(c),
            KeyCode::Backspace => {
                if self.cursor_pos > 0 {
                    self.cursor_pos -= 1;
                    let at = self.byte_index(self.cursor_pos);
                    self.input.remove(at);
                }
            }
            KeyCode::Delete => {
                if self.cursor_pos < self.input_len() {
                    let at = self.byte_index(self.cursor_pos);
                    self.input.remove(at);
                }
            }
            KeyCode::Left => {
                self.cursor_pos = self.cursor_pos.saturating_sub(1);
            }
            KeyCode::Right => {
                if self.cursor_pos < self.input_len() {
                    self.cursor_pos += 1;
                }
            }
            KeyCode::Home => self.cursor_pos = 0,
            KeyCode::End => self.cursor_pos = self.input_len(),
            KeyCode::Up => self.app.chat.scroll_up(1),
            KeyCode::Down => self.app.chat.scroll_down(1),
            KeyCode::PageUp => self.app.chat.scroll_up(10),
            KeyCode::PageDown => self.app.chat.scroll_down(10),
            _ => {}
        }

        AppAction::Continue
    }

    // -- Input editing ------------------------------------------------------

    fn input_len(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_index)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn insert_char(&mut self, c: char) {
        let at = self.byte_index(self.cursor_pos);
        self.input.insert(at, c);
        self.cursor_pos += 1;
    }

    // -- Submission ---------------------------------------------------------

    fn submit_input(&mut self, now: Instant) -> AppAction {
        let text = std::mem::take(&mut self.input);
        self.cursor_pos = 0;

        if let Some(command) = parse_command(&text) {
            return self.run_command(command, now);
        }
        if let Some(request) = self.app.handle_input(&text) {
            self.spawn(request);
        }
        AppAction::Continue
    }

    fn run_command(&mut self, command: Command, now: Instant) -> AppAction {
        debug!(?command, "slash command");
        let request = match command {
            Command::Open => self.app.open_site(),
            Command::Test => self.app.test_browser(),
            Command::Note {
                note_id,
                xsec_token,
            } => Request::OpenNote {
                note_id,
                xsec_token,
            },
            Command::Cancel(task_id) => Request::CancelSearch { task_id },
            Command::Viz => {
                self.app.toggle_visualization(now);
                return AppAction::Continue;
            }
            Command::Quit => return AppAction::Quit,
            Command::Help => {
                self.app.chat.add_message(Role::Ai, HELP);
                return AppAction::Continue;
            }
        };
        self.spawn(request);
        AppAction::Continue
    }

    /// Trigger the `index`-th action of the newest interactive bubble.
    fn trigger_action(&mut self, index: usize) {
        let Some(action) = self
            .active_prompt()
            .and_then(|m| m.actions.get(index))
            .cloned()
        else {
            return;
        };
        info!(action = action.label(), "action chosen");
        let request = self.app.action_request(&action);
        self.spawn(request);
    }

    /// Trigger the card action of the newest task that offers one.
    fn cancel_latest_task(&mut self) {
        let Some(action) = self
            .app
            .tasks
            .cards()
            .iter()
            .rev()
            .find_map(|card| card.actions.first())
            .cloned()
        else {
            return;
        };
        info!(task_id = ?action.task_id(), "task card action chosen");
        let request = self.app.action_request(&action);
        self.spawn(request);
    }

    /// Run a request on the runtime; its outcome is applied by [`poll`](Self::poll).
    fn spawn(&mut self, request: Request) {
        let backend = self.app.backend();
        let client_id = self.app.client_id().clone();
        let tx = self.outcome_tx.clone();
        self.in_flight += 1;

        tokio::spawn(async move {
            let outcome = execute(backend.as_ref(), &client_id, request).await;
            let _ = tx.send(outcome);
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

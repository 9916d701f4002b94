//! Terminal UI for the Xiaohongshu assistant.
//!
//! A ratatui front end over [`xhs_client::App`]:
//!
//! - A header with the session id and connection status.
//! - Task cards with progress gauges above the chat transcript.
//! - A collapsible side panel with the latest analysis charts as text.
//! - A multi-line input; `Enter` sends, `Shift+Enter` starts a new line.
//!
//! Backend calls run on spawned tasks so the UI never blocks on the
//! network; their outcomes come back through a channel and are applied on
//! the UI loop together with WebSocket pushes.

pub mod app;
pub mod error;
pub mod run;
pub mod ui;

pub use app::{AppAction, Command, TuiApp, parse_command};
pub use error::{Result, TuiError};
pub use run::run_tui;

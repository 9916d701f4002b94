//! Client library for the Xiaohongshu assistant.
//!
//! The assistant backend does the scraping, OCR, and analysis; this crate is
//! everything a front end needs to talk to it and present its output:
//!
//! - [`protocol`] -- wire types for REST replies and WebSocket frames.
//! - [`api`] -- the REST client behind the [`Backend`] trait.
//! - [`transport`] -- the WebSocket session with a bounded reconnect machine.
//! - [`chat`] -- the append-only chat transcript and content rendering.
//! - [`tasks`] -- search-task cards keyed by task id.
//! - [`viz`] -- the collapsible visualization panel and chart option builders.
//! - [`app`] -- the shell that owns one session and routes events between
//!   the components.
//!
//! No component is a global: an [`App`] is built once per session and owns
//! the chat view, task panel, and visualization panel, handing each the
//! others by reference when an event spans several of them.

pub mod action;
pub mod api;
pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod markdown;
pub mod protocol;
pub mod session;
pub mod tasks;
pub mod transport;
pub mod viz;

pub use action::Action;
pub use api::{ApiClient, Backend};
pub use app::{App, InputRoute, Outcome, Request, route_input};
pub use chat::{ChatContent, ChatMessage, ChatView, Role};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use protocol::{ServerEvent, Task, TaskState};
pub use session::ClientId;
pub use tasks::TaskPanel;
pub use transport::{ConnectionState, TransportEvent, TransportHandle};
pub use viz::VisualizationPanel;

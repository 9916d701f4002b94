//! Wire types shared with the assistant backend.
//!
//! The backend pushes JSON frames over the WebSocket tagged by a `type`
//! field, and answers REST calls with a `status: "success" | "error"`
//! envelope.  Everything here is plain serde data; interpretation lives in
//! the view components.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{ClientError, Result};

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Lifecycle state of a backend search task.
///
/// The backend reports a few states beyond the core five; anything it sends
/// that this client does not know is kept verbatim in [`TaskState::Other`]
/// and treated as non-terminal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskState {
    #[default]
    Pending,
    Running,
    WaitingUserInput,
    WaitingBrowser,
    Analyzing,
    Paused,
    Completed,
    Failed,
    Cancelled,
    Other(String),
}

impl TaskState {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::WaitingUserInput => "waiting_user_input",
            Self::WaitingBrowser => "waiting_browser",
            Self::Analyzing => "analyzing",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Other(s) => s,
        }
    }

    /// Completed, failed, and cancelled tasks never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl From<String> for TaskState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "waiting_user_input" => Self::WaitingUserInput,
            "waiting_browser" => Self::WaitingBrowser,
            "analyzing" => Self::Analyzing,
            "paused" => Self::Paused,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            _ => Self::Other(s),
        }
    }
}

impl From<TaskState> for String {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress counters for a search task.  Every field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    #[serde(deserialize_with = "null_as_default")]
    pub percentage: f64,
    pub current_keyword: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub keywords_completed: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub keywords_total: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub notes_processed: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub notes_total: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub comments_processed: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub comments_total: u64,
}

/// A checkpoint where the backend waits for the user to decide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInputRequest {
    /// Request kind; only `continue_search` is interactive.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current_results: u64,
    #[serde(default)]
    pub remaining_keywords: Option<u64>,
}

impl UserInputRequest {
    pub const CONTINUE_SEARCH: &'static str = "continue_search";

    pub fn is_continue_search(&self) -> bool {
        self.kind == Self::CONTINUE_SEARCH
    }
}

/// A long-running search-and-analyze job tracked by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: String,
    /// Task listings name this field `status`; pushes name it `state`.
    #[serde(default, alias = "status", deserialize_with = "null_as_default")]
    pub state: TaskState,
    /// Some pushes and listings send a bare percentage here.
    #[serde(default, deserialize_with = "lenient_progress")]
    pub progress: Progress,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub user_input_required: Option<UserInputRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results_count: Option<u64>,
}

impl Task {
    /// A minimal task with the given id, keywords, and state.
    pub fn new(task_id: impl Into<String>, keywords: impl Into<String>, state: TaskState) -> Self {
        Self {
            task_id: task_id.into(),
            keywords: keywords.into(),
            state,
            progress: Progress::default(),
            last_message: None,
            user_input_required: None,
            client_id: None,
            start_time: None,
            end_time: None,
            error: None,
            results_count: None,
        }
    }

    /// The pending continue-search request, if the task is parked on one.
    pub fn continue_search_request(&self) -> Option<&UserInputRequest> {
        if self.state != TaskState::WaitingUserInput {
            return None;
        }
        self.user_input_required
            .as_ref()
            .filter(|req| req.is_continue_search())
    }
}

// ---------------------------------------------------------------------------
// Search results
// ---------------------------------------------------------------------------

/// Aggregate counters reported when a task finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicStats {
    #[serde(deserialize_with = "null_as_default")]
    pub keywords_processed: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_notes: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub total_comments: u64,
}

/// Per-chart datasets.  Each is kept as raw JSON so one malformed chart
/// payload cannot prevent the others from rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationData {
    pub word_cloud: Option<Value>,
    pub opinion_distribution: Option<Value>,
    pub controversy_analysis: Option<Value>,
    pub minority_insights: Option<Value>,
}

/// Payload of a `search_result` frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchResultContent {
    pub text_summary: Option<String>,
    pub basic_stats: Option<BasicStats>,
    pub visualization_data: Option<VisualizationData>,
}

/// One note returned by a keyword search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteResult {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub xsec_token: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nickname: String,
    /// Like counts arrive as numbers or display strings such as `"1.2万"`.
    #[serde(default, deserialize_with = "string_or_number")]
    pub liked_count: String,
}

/// Result of the browser self-test: OCR text plus a base64 JPEG.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSnapshot {
    pub ocr_text: Option<String>,
    pub image: Option<String>,
}

// ---------------------------------------------------------------------------
// WebSocket frames
// ---------------------------------------------------------------------------

/// A recognized frame pushed by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A chunk of assistant output.  `message_type == "chat"` asks for it to
    /// be merged into the previous AI bubble.
    ChatResponse {
        #[serde(default)]
        content: Value,
        #[serde(default)]
        message_type: Option<String>,
    },
    /// The backend detected a search intent and proposes a task.
    SearchIntent {
        keywords: String,
        task_id: String,
        #[serde(default)]
        content: Option<String>,
    },
    /// A task changed state or progress.
    SearchTaskUpdate {
        #[serde(default)]
        action: Option<String>,
        task: Task,
    },
    /// A task produced its final analysis.
    SearchResult {
        #[serde(default)]
        content: SearchResultContent,
    },
    /// The backend failed while producing a chat reply.
    Error {
        #[serde(default, deserialize_with = "string_or_number")]
        content: String,
    },
}

impl ServerEvent {
    /// The wire `type` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatResponse { .. } => "chat_response",
            Self::SearchIntent { .. } => "search_intent",
            Self::SearchTaskUpdate { .. } => "search_task_update",
            Self::SearchResult { .. } => "search_result",
            Self::Error { .. } => "error",
        }
    }

    /// Whether a chat response asks to be merged into the last AI bubble.
    pub fn wants_merge(&self) -> bool {
        matches!(
            self,
            Self::ChatResponse { message_type: Some(t), .. } if t == "chat"
        )
    }
}

/// Wire tags this client understands.
const KNOWN_TYPES: &[&str] = &[
    "chat_response",
    "search_intent",
    "search_task_update",
    "search_result",
    "error",
];

/// Outcome of decoding one text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    Event(ServerEvent),
    /// A well-formed frame with a `type` this client does not handle.
    Unknown(String),
}

/// Decode one WebSocket text frame.
///
/// Malformed JSON, a missing `type`, or a known type with a bad payload is
/// an error; an unrecognized `type` is not.
pub fn decode_frame(text: &str) -> Result<InboundFrame> {
    let value: Value = serde_json::from_str(text)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::MalformedPayload("frame has no `type` field".into()))?
        .to_owned();

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Ok(InboundFrame::Unknown(kind));
    }

    serde_json::from_value(value)
        .map(InboundFrame::Event)
        .map_err(|e| ClientError::MalformedPayload(format!("`{kind}` frame: {e}")))
}

// ---------------------------------------------------------------------------
// Serde helpers
// ---------------------------------------------------------------------------

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept a progress object, a bare percentage, or anything else as empty.
fn lenient_progress<'de, D>(deserializer: D) -> std::result::Result<Progress, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(map) => serde_json::from_value(Value::Object(map)).unwrap_or_else(|e| {
            warn!(error = %e, "unreadable task progress, using defaults");
            Progress::default()
        }),
        Value::Number(n) => Progress {
            percentage: n.as_f64().unwrap_or_default(),
            ..Progress::default()
        },
        _ => Progress::default(),
    })
}

/// Accept a string, a number, or `null`, yielding a display string.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

//! Client error types.
//!
//! Every fallible operation in the library surfaces a [`ClientError`].  The
//! variants separate transport failures from a backend that answered with
//! `status: "error"`, because the two are worded differently in the chat.

/// Unified error type for the assistant client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The WebSocket handshake or stream failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// The backend replied with a non-success HTTP status and no usable
    /// error body.
    #[error("unexpected status {status} from `{endpoint}`")]
    Status { endpoint: String, status: u16 },

    /// The backend answered with `status: "error"` (or a FastAPI `detail`).
    #[error("backend rejected `{endpoint}`: {}", message.as_deref().unwrap_or("no message"))]
    Backend {
        endpoint: String,
        message: Option<String>,
    },

    /// A payload did not have the expected shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A URL could not be built from the configured base.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Return the backend's own message when the backend rejected a call.
    ///
    /// `None` for transport failures and for rejections that carried no
    /// message.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::Backend { message, .. } => message.as_deref(),
            _ => None,
        }
    }

    /// Whether the backend was reached and explicitly refused the call.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

/// Convenience alias used throughout the client crate.
pub type Result<T> = std::result::Result<T, ClientError>;

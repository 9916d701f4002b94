//! Chat transcript model.
//!
//! [`ChatView`] owns the ordered, append-only list of chat bubbles.  Content
//! arriving from the backend is a loosely shaped JSON value; [`ChatContent`]
//! classifies it by field presence and renders it to HTML.  Text fields are
//! escaped or rendered as markdown.  An `html` fragment is backend-authored
//! markup and is inserted verbatim, so only a trusted backend should be
//! configured.  The only in-place mutation is merging streamed text into the
//! last AI bubble.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::action::Action;
use crate::markdown::{escape_attr, escape_text, html_to_text, render_markdown};
use crate::protocol::NoteResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Author of a chat bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Ai,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Ai => "ai",
        }
    }
}

/// Structured chat content, discriminated by which fields are present.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentShape {
    /// Plain text, rendered as Markdown.
    Text(String),
    /// `{note_id, summary, xsec_token, title?}`.
    NoteSummary {
        note_id: String,
        summary: Value,
        xsec_token: String,
        title: Option<String>,
    },
    /// `{type: "stats", data: {...}}`.
    Stats(Value),
    /// `{text, html?, image?}`.
    Rich {
        text: String,
        html: Option<String>,
        image: Option<String>,
    },
    /// Anything else; rendered as its JSON text.
    Other(Value),
}

/// Content of one chat bubble before rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatContent(ContentShape);

impl ChatContent {
    /// Classify a JSON value pushed by the backend.
    pub fn from_value(value: Value) -> Self {
        let shape = match value {
            Value::String(s) => ContentShape::Text(s),
            Value::Object(map) => classify_object(map),
            other => ContentShape::Other(other),
        };
        Self(shape)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self(ContentShape::Text(text.into()))
    }

    /// Text with an optional base64 JPEG attached.
    pub fn rich(text: impl Into<String>, image: Option<String>) -> Self {
        Self(ContentShape::Rich {
            text: text.into(),
            html: None,
            image,
        })
    }

    pub fn shape(&self) -> &ContentShape {
        &self.0
    }

    pub fn is_stats(&self) -> bool {
        matches!(self.0, ContentShape::Stats(_))
    }

    /// Render to HTML, returning the actions the rendered card offers.
    pub fn render(&self) -> (String, Vec<Action>) {
        match &self.0 {
            ContentShape::Text(text) => (render_markdown(text), Vec::new()),
            ContentShape::NoteSummary {
                note_id,
                summary,
                xsec_token,
                title,
            } => render_note_summary(note_id, summary, xsec_token, title.as_deref()),
            ContentShape::Stats(data) => (render_stats(data), Vec::new()),
            ContentShape::Rich { text, html, image } => {
                let mut out = render_markdown(text);
                if let Some(html) = html {
                    out.push_str(html);
                }
                if let Some(image) = image {
                    out.push_str(&render_image(image));
                }
                (out, Vec::new())
            }
            ContentShape::Other(value) => (render_value(value), Vec::new()),
        }
    }
}

impl From<&str> for ChatContent {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for ChatContent {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

impl From<Value> for ChatContent {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

fn truthy_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(_) => true,
    }
}

fn classify_object(map: Map<String, Value>) -> ContentShape {
    if let (Some(note_id), true, Some(xsec_token)) = (
        truthy_str(&map, "note_id"),
        is_truthy(map.get("summary")),
        truthy_str(&map, "xsec_token"),
    ) {
        let title = truthy_str(&map, "title");
        let summary = map.get("summary").cloned().unwrap_or(Value::Null);
        return ContentShape::NoteSummary {
            note_id,
            summary,
            xsec_token,
            title,
        };
    }

    if map.get("type").and_then(Value::as_str) == Some("stats") {
        return ContentShape::Stats(map.get("data").cloned().unwrap_or(Value::Null));
    }

    if is_truthy(map.get("text")) {
        let text = match map.get("text") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let html = map
            .get("html")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        let image = map
            .get("image")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        return ContentShape::Rich { text, html, image };
    }

    ContentShape::Other(Value::Object(map))
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render an arbitrary value as Markdown of its text form.
fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => render_markdown(s),
        other => match serde_json::to_string(other) {
            Ok(json) => render_markdown(&json),
            Err(e) => {
                warn!(error = %e, "failed to serialize chat content, using raw form");
                escape_text(&other.to_string())
            }
        },
    }
}

fn render_note_summary(
    note_id: &str,
    summary: &Value,
    xsec_token: &str,
    title: Option<&str>,
) -> (String, Vec<Action>) {
    let title = title.unwrap_or("空标题");
    let html = format!(
        "<div class=\"note-summary\" data-note-id=\"{id}\">\
         <h3 class=\"note-title\">{title}</h3>\
         <div class=\"note-content\">{summary}</div>\
         </div>",
        id = escape_attr(note_id),
        title = escape_text(title),
        summary = render_value(summary),
    );
    let action = Action::OpenNote {
        note_id: note_id.to_owned(),
        xsec_token: xsec_token.to_owned(),
    };
    (html, vec![action])
}

fn render_stats(data: &Value) -> String {
    let mut html = String::from("<div class=\"stats-summary\"><h4>统计信息</h4><ul>");
    match data {
        Value::Object(map) => {
            for (key, value) in map {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                html.push_str(&format!(
                    "<li>{}：{}</li>",
                    escape_text(key),
                    escape_text(&value)
                ));
            }
        }
        Value::Null => {}
        other => html.push_str(&format!("<li>{}</li>", escape_text(&other.to_string()))),
    }
    html.push_str("</ul></div>");
    html
}

fn render_image(image: &str) -> String {
    match BASE64.decode(image.trim()) {
        Ok(bytes) => {
            debug!(bytes = bytes.len(), "embedding screenshot");
            format!(
                "<img src=\"data:image/jpeg;base64,{}\" alt=\"screenshot\">",
                escape_attr(image.trim())
            )
        }
        Err(e) => {
            warn!(error = %e, "dropping image with invalid base64 data");
            "<div class=\"error-message\">图片数据无效</div>".to_owned()
        }
    }
}

/// Render keyword search results as a grid of note cards.
///
/// Each result carries an [`Action::OpenNote`] in the returned list, in the
/// same order as the cards.
pub fn render_results_grid(results: &[NoteResult]) -> (String, Vec<Action>) {
    let mut html = String::from("<div class=\"search-results-grid\">");
    let mut actions = Vec::with_capacity(results.len());
    for result in results {
        html.push_str(&format!(
            "<div class=\"result-item\" data-id=\"{id}\" data-xsec-token=\"{token}\">\
             <h3>{title}</h3><p>{nickname}</p>\
             <div class=\"result-meta\"><span>点赞: {likes}</span></div>\
             </div>",
            id = escape_attr(&result.id),
            token = escape_attr(&result.xsec_token),
            title = escape_text(&result.title),
            nickname = escape_text(&result.nickname),
            likes = escape_text(&result.liked_count),
        ));
        actions.push(Action::OpenNote {
            note_id: result.id.clone(),
            xsec_token: result.xsec_token.clone(),
        });
    }
    html.push_str("</div>");
    (html, actions)
}

// ---------------------------------------------------------------------------
// ChatView
// ---------------------------------------------------------------------------

/// One rendered bubble in the transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    /// Rendered, trusted HTML body.
    pub html: String,
    /// Interactive choices offered by this bubble.
    pub actions: Vec<Action>,
}

impl ChatMessage {
    /// The body flattened to plain text.
    pub fn plain_text(&self) -> String {
        html_to_text(&self.html)
    }

    pub fn is_interactive(&self) -> bool {
        !self.actions.is_empty()
    }
}

/// The chat transcript.
///
/// Every mutation scrolls back to the newest message.
#[derive(Debug, Default)]
pub struct ChatView {
    messages: Vec<ChatMessage>,
    /// Lines scrolled up from the bottom; zero means pinned to the end.
    scroll_offset: u16,
}

impl ChatView {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Accessors ----------------------------------------------------------

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn scroll_offset(&self) -> u16 {
        self.scroll_offset
    }

    /// The newest bubble that still offers actions.
    pub fn latest_interactive(&self) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.is_interactive())
    }

    // -- Scrolling ----------------------------------------------------------

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_to_end(&mut self) {
        self.scroll_offset = 0;
    }

    // -- Mutation -----------------------------------------------------------

    /// Append a bubble rendered from structured or plain content.
    pub fn add_message(&mut self, role: Role, content: impl Into<ChatContent>) {
        let (html, actions) = content.into().render();
        self.push(ChatMessage {
            role,
            html,
            actions,
        });
    }

    /// Append a bubble whose body is trusted, pre-rendered HTML.
    ///
    /// Only for markup built by this crate (result grids, stats cards).
    pub fn add_html(&mut self, role: Role, html: impl Into<String>) {
        self.add_html_with_actions(role, html, Vec::new());
    }

    /// Append a trusted HTML bubble carrying interactive actions.
    pub fn add_html_with_actions(&mut self, role: Role, html: impl Into<String>, actions: Vec<Action>) {
        self.push(ChatMessage {
            role,
            html: html.into(),
            actions,
        });
    }

    /// Append an AI error bubble.
    pub fn add_error(&mut self, message: &str) {
        self.add_html(
            Role::Ai,
            format!("<div class=\"error-message\">{}</div>", escape_text(message)),
        );
    }

    /// Merge content into the last AI bubble, or start a new one.
    ///
    /// Merging happens only when `should_merge` is set, the newest bubble is
    /// an AI bubble, and the content is text or carries an `html` fragment.
    /// Stats always start a new bubble.
    pub fn append_to_last_ai_message(&mut self, content: impl Into<ChatContent>, should_merge: bool) {
        let content = content.into();
        let fragment = match content.shape() {
            ContentShape::Text(text) => Some(render_markdown(text)),
            ContentShape::Rich { html: Some(html), .. } => Some(html.clone()),
            _ => None,
        };

        let last_is_ai = self.messages.last().is_some_and(|m| m.role == Role::Ai);
        match fragment {
            Some(fragment) if should_merge && last_is_ai && !content.is_stats() => {
                if let Some(last) = self.messages.last_mut() {
                    last.html.push_str(&fragment);
                }
                self.scroll_to_end();
            }
            _ => self.add_message(Role::Ai, content),
        }
    }

    /// Ask the user to confirm a search intent proposed by the backend.
    pub fn handle_search_intent(&mut self, keywords: &str, task_id: &str) {
        let html = format!(
            "<div class=\"search-interaction\"><p>看起来您想搜索关于「{}」的信息。</p></div>",
            escape_text(keywords)
        );
        let actions = vec![
            Action::StartSearch {
                keywords: keywords.to_owned(),
                task_id: task_id.to_owned(),
            },
            Action::CancelSearch {
                task_id: task_id.to_owned(),
            },
        ];
        self.add_html_with_actions(Role::Ai, html, actions);
    }

    fn push(&mut self, message: ChatMessage) {
        debug!(role = message.role.as_str(), "chat message added");
        self.messages.push(message);
        self.scroll_to_end();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_note_summary() {
        let content = ChatContent::from_value(json!({
            "note_id": "n1", "summary": "很好吃", "xsec_token": "tok"
        }));
        assert!(matches!(
            content.shape(),
            ContentShape::NoteSummary { title: None, .. }
        ));
        let (html, actions) = content.render();
        assert!(html.contains("空标题"));
        assert!(html.contains("很好吃"));
        assert_eq!(
            actions,
            vec![Action::OpenNote {
                note_id: "n1".into(),
                xsec_token: "tok".into()
            }]
        );
    }

    #[test]
    fn note_without_token_is_not_a_note() {
        let content = ChatContent::from_value(json!({"note_id": "n1", "summary": "x"}));
        assert!(matches!(content.shape(), ContentShape::Other(_)));
    }

    #[test]
    fn classifies_stats_by_tag() {
        let content = ChatContent::from_value(json!({
            "type": "stats", "data": {"notes": 3, "comments": 10}
        }));
        assert!(content.is_stats());
        let (html, _) = content.render();
        assert!(html.contains("<li>comments：10</li>"));
        assert!(html.contains("<li>notes：3</li>"));
    }

    #[test]
    fn classifies_rich_text_with_image() {
        let content = ChatContent::from_value(json!({
            "text": "识别文本：你好", "image": "aGVsbG8="
        }));
        let (html, _) = content.render();
        assert!(html.contains("识别文本：你好"));
        assert!(html.contains("data:image/jpeg;base64,aGVsbG8="));
    }

    #[test]
    fn invalid_image_degrades_to_notice() {
        let (html, _) = ChatContent::rich("t", Some("!!!not base64".into())).render();
        assert!(html.contains("图片数据无效"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn other_objects_render_as_json_text() {
        let (html, _) = ChatContent::from_value(json!({"foo": 1})).render();
        assert!(html.contains("{&quot;foo&quot;:1}") || html.contains("{\"foo\":1}"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let value = json!({"note_id": "n", "summary": "**s**", "xsec_token": "t", "title": "T"});
        let a = ChatContent::from_value(value.clone()).render();
        let b = ChatContent::from_value(value).render();
        assert_eq!(a, b);
    }

    #[test]
    fn user_text_is_sanitized() {
        let mut chat = ChatView::new();
        chat.add_message(Role::User, "<img src=x onerror=alert(1)>");
        assert!(!chat.messages()[0].html.contains("<img"));
    }

    #[test]
    fn merge_appends_to_last_ai_message() {
        let mut chat = ChatView::new();
        chat.add_message(Role::Ai, "第一句。");
        chat.append_to_last_ai_message("第二句。", true);
        assert_eq!(chat.len(), 1);
        let text = chat.messages()[0].plain_text();
        assert!(text.contains("第一句。"));
        assert!(text.contains("第二句。"));
    }

    #[test]
    fn merge_without_ai_message_creates_one() {
        let mut chat = ChatView::new();
        chat.append_to_last_ai_message("你好", true);
        assert_eq!(chat.len(), 1);
        assert_eq!(chat.messages()[0].role, Role::Ai);
    }

    #[test]
    fn merge_after_user_message_creates_new_bubble() {
        let mut chat = ChatView::new();
        chat.add_message(Role::Ai, "a");
        chat.add_message(Role::User, "b");
        chat.append_to_last_ai_message("c", true);
        assert_eq!(chat.len(), 3);
    }

    #[test]
    fn no_merge_flag_creates_new_bubble() {
        let mut chat = ChatView::new();
        chat.add_message(Role::Ai, "a");
        chat.append_to_last_ai_message("b", false);
        assert_eq!(chat.len(), 2);
    }

    #[test]
    fn stats_never_merge() {
        let mut chat = ChatView::new();
        chat.add_message(Role::Ai, "a");
        chat.append_to_last_ai_message(json!({"type": "stats", "data": {"n": 1}}), true);
        assert_eq!(chat.len(), 2);
    }

    #[test]
    fn rich_html_is_kept_while_its_text_is_escaped() {
        let content = ChatContent::from_value(json!({
            "text": "<script>x</script>", "html": "<table><tr><td>1</td></tr></table>"
        }));
        let (html, _) = content.render();
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.ends_with("<table><tr><td>1</td></tr></table>"));
    }

    #[test]
    fn html_fragment_merges() {
        let mut chat = ChatView::new();
        chat.add_message(Role::Ai, "a");
        chat.append_to_last_ai_message(json!({"text": "ignored", "html": "<hr>"}), true);
        assert_eq!(chat.len(), 1);
        assert!(chat.messages()[0].html.ends_with("<hr>"));
    }

    #[test]
    fn mutations_scroll_to_end() {
        let mut chat = ChatView::new();
        chat.add_message(Role::Ai, "a");
        chat.scroll_up(5);
        assert_eq!(chat.scroll_offset(), 5);
        chat.append_to_last_ai_message("b", true);
        assert_eq!(chat.scroll_offset(), 0);
        chat.scroll_up(3);
        chat.add_message(Role::User, "c");
        assert_eq!(chat.scroll_offset(), 0);
    }

    #[test]
    fn search_intent_offers_start_and_cancel() {
        let mut chat = ChatView::new();
        chat.handle_search_intent("露营装备", "t-9");
        let message = chat.last().unwrap();
        assert!(message.plain_text().contains("「露营装备」"));
        assert_eq!(message.actions.len(), 2);
        assert_eq!(message.actions[0].label(), "开始智能搜索");
        assert_eq!(message.actions[1].task_id(), Some("t-9"));
    }

    #[test]
    fn results_grid_has_one_card_per_result() {
        let results = vec![
            NoteResult {
                id: "1".into(),
                xsec_token: "a".into(),
                title: "<b>猫</b>".into(),
                nickname: "喵".into(),
                liked_count: "10".into(),
            },
            NoteResult {
                id: "2".into(),
                xsec_token: "b".into(),
                title: "狗".into(),
                nickname: "汪".into(),
                liked_count: "3".into(),
            },
        ];
        let (html, actions) = render_results_grid(&results);
        assert_eq!(html.matches("class=\"result-item\"").count(), 2);
        assert!(html.contains("&lt;b&gt;猫&lt;/b&gt;"));
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn error_bubble_escapes_message() {
        let mut chat = ChatView::new();
        chat.add_error("<oops>");
        assert!(chat.messages()[0].html.contains("&lt;oops&gt;"));
    }
}

//! Application shell.
//!
//! [`App`] owns one session: the client id, the backend, the transport
//! handle, and the three view components.  Work flows through it in two
//! shapes:
//!
//! - **Pushes** from the WebSocket arrive as [`ServerEvent`]s and go through
//!   [`App::dispatch`], the single place that routes a frame to the
//!   components it affects.
//! - **User intents** become [`Request`]s.  A request is executed against
//!   the [`Backend`] by [`execute`], which touches no UI state and can
//!   therefore run on a spawned task; its [`Outcome`] is folded back into
//!   the views by [`App::apply`].  [`App::run_request`] does both inline.
//!
//! Every failure is reported as an AI bubble in the chat and logged; none
//! of them ends the session.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::action::Action;
use crate::api::Backend;
use crate::chat::{ChatContent, ChatView, Role, render_results_grid};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::protocol::{BrowserSnapshot, NoteResult, ServerEvent, Task};
use crate::session::ClientId;
use crate::tasks::TaskPanel;
use crate::transport::{ConnectionState, TransportEvent, TransportHandle};
use crate::viz::VisualizationPanel;

// ---------------------------------------------------------------------------
// Input routing
// ---------------------------------------------------------------------------

/// Prefixes that turn an input line into a keyword search.
const SEARCH_PREFIXES: [&str; 2] = ["搜索:", "search:"];

/// Where a submitted input line should go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputRoute {
    /// Nothing but whitespace.
    Empty,
    /// A `搜索:` / `search:` line; carries the trimmed keyword.
    Search(String),
    /// Anything else; carries the trimmed message.
    Chat(String),
}

/// Classify a raw input line.
pub fn route_input(raw: &str) -> InputRoute {
    let text = raw.trim();
    if text.is_empty() {
        return InputRoute::Empty;
    }
    for prefix in SEARCH_PREFIXES {
        if let Some(rest) = text.strip_prefix(prefix) {
            return InputRoute::Search(rest.trim().to_owned());
        }
    }
    InputRoute::Chat(text.to_owned())
}

// ---------------------------------------------------------------------------
// Requests and outcomes
// ---------------------------------------------------------------------------

/// A backend call the user (or startup) asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Chat(String),
    Search(String),
    /// Open the site front page; `announce` echoes the reply in the chat.
    OpenSite { announce: bool },
    TestBrowser,
    OpenNote { note_id: String, xsec_token: String },
    ListTasks,
    StartSearch { keywords: String, task_id: String },
    CancelSearch { task_id: String },
    SubmitInput { task_id: String, continue_search: bool },
}

/// The result of executing a [`Request`].
#[derive(Debug)]
pub enum Outcome {
    Chat(Result<()>),
    Search(Result<Vec<NoteResult>>),
    OpenSite { announce: bool, result: Result<String> },
    TestBrowser(Result<BrowserSnapshot>),
    OpenNote(Result<String>),
    ListTasks(Result<Vec<Task>>),
    StartSearch(Result<String>),
    CancelSearch { task_id: String, result: Result<String> },
    SubmitInput(Result<String>),
}

/// Run one request against the backend.
pub async fn execute(backend: &dyn Backend, client_id: &ClientId, request: Request) -> Outcome {
    debug!(?request, "executing request");
    match request {
        Request::Chat(message) => Outcome::Chat(backend.chat(client_id, &message).await),
        Request::Search(keyword) => Outcome::Search(backend.search(&keyword).await),
        Request::OpenSite { announce } => Outcome::OpenSite {
            announce,
            result: backend.open_xiaohongshu().await,
        },
        Request::TestBrowser => Outcome::TestBrowser(backend.test_browser().await),
        Request::OpenNote {
            note_id,
            xsec_token,
        } => Outcome::OpenNote(backend.open_note(&note_id, &xsec_token).await),
        Request::ListTasks => Outcome::ListTasks(backend.list_tasks(client_id).await),
        Request::StartSearch { keywords, task_id } => Outcome::StartSearch(
            backend
                .start_auto_search(client_id, &keywords, &task_id)
                .await,
        ),
        Request::CancelSearch { task_id } => {
            let result = backend.cancel_auto_search(client_id, &task_id).await;
            Outcome::CancelSearch { task_id, result }
        }
        Request::SubmitInput {
            task_id,
            continue_search,
        } => Outcome::SubmitInput(
            backend
                .submit_user_input(client_id, &task_id, continue_search)
                .await,
        ),
    }
}

/// The backend's own message when it rejected the call, `None` when the
/// call never got a verdict.
fn rejection(err: &ClientError) -> Option<&str> {
    err.is_rejection()
        .then(|| err.backend_message().unwrap_or_default())
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// One client session and its views.
pub struct App {
    client_id: ClientId,
    backend: Arc<dyn Backend>,
    transport: Option<TransportHandle>,
    connection: ConnectionState,
    pub chat: ChatView,
    pub tasks: TaskPanel,
    pub viz: VisualizationPanel,
}

impl App {
    pub fn new(config: &ClientConfig, client_id: ClientId, backend: Arc<dyn Backend>) -> Self {
        info!(client_id = %client_id, "session created");
        Self {
            client_id,
            backend,
            transport: None,
            connection: ConnectionState::Connecting { attempt: 0 },
            chat: ChatView::new(),
            tasks: TaskPanel::new(config.task_removal_grace()),
            viz: VisualizationPanel::new(config.panel_resize_delay()),
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Shared backend, for running requests off the UI loop.
    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    /// Last connection state reported by the transport.
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    // -- Lifecycle ----------------------------------------------------------

    pub fn attach_transport(&mut self, transport: TransportHandle) {
        self.connection = transport.state();
        self.transport = Some(transport);
    }

    /// Requests to issue right after startup: hydrate existing tasks and
    /// bring the backend browser to the front page without announcing it.
    pub fn startup_requests(&self) -> Vec<Request> {
        vec![Request::ListTasks, Request::OpenSite { announce: false }]
    }

    /// Close the transport, if one is attached.
    pub async fn shutdown(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.shutdown().await;
        }
        self.connection = ConnectionState::Stopped;
    }

    /// Send a raw JSON message over the socket.  Dropped when not open.
    pub fn send(&self, message: &Value) -> bool {
        match &self.transport {
            Some(transport) => transport.send(message),
            None => {
                error!("no websocket attached, message dropped");
                false
            }
        }
    }

    /// Fire due timers: task card removal and deferred chart resize.
    pub fn tick(&mut self, now: Instant) {
        self.tasks.tick(now);
        self.viz.tick(now);
    }

    pub fn toggle_visualization(&mut self, now: Instant) -> bool {
        self.viz.toggle(now)
    }

    // -- User input ---------------------------------------------------------

    /// Echo a submitted line into the chat and decide what to call.
    pub fn handle_input(&mut self, raw: &str) -> Option<Request> {
        match route_input(raw) {
            InputRoute::Empty => None,
            InputRoute::Search(keyword) => {
                self.chat.add_message(Role::User, raw.trim());
                if keyword.is_empty() {
                    self.chat.add_message(Role::Ai, "请输入搜索关键词");
                    return None;
                }
                Some(Request::Search(keyword))
            }
            InputRoute::Chat(message) => {
                self.chat.add_message(Role::User, message.as_str());
                Some(Request::Chat(message))
            }
        }
    }

    /// The user asked to open the site front page.
    pub fn open_site(&mut self) -> Request {
        self.chat.add_message(Role::User, "打开小红书");
        Request::OpenSite { announce: true }
    }

    /// The user asked for a browser self-test.
    pub fn test_browser(&mut self) -> Request {
        self.chat.add_message(Role::User, "测试浏览器");
        Request::TestBrowser
    }

    /// Translate a clicked action into a backend request.
    pub fn action_request(&self, action: &Action) -> Request {
        match action {
            Action::OpenNote {
                note_id,
                xsec_token,
            } => Request::OpenNote {
                note_id: note_id.clone(),
                xsec_token: xsec_token.clone(),
            },
            Action::StartSearch { keywords, task_id } => Request::StartSearch {
                keywords: keywords.clone(),
                task_id: task_id.clone(),
            },
            Action::CancelSearch { task_id } => Request::CancelSearch {
                task_id: task_id.clone(),
            },
            Action::SubmitInput {
                task_id,
                continue_search,
            } => Request::SubmitInput {
                task_id: task_id.clone(),
                continue_search: *continue_search,
            },
        }
    }

    /// Execute a request and apply its outcome before returning.
    pub async fn run_request(&mut self, request: Request, now: Instant) {
        let outcome = execute(self.backend.as_ref(), &self.client_id, request).await;
        self.apply(outcome, now);
    }

    // -- Server pushes ------------------------------------------------------

    pub fn on_transport_event(&mut self, event: TransportEvent, now: Instant) {
        match event {
            TransportEvent::Status(state) => {
                if state != self.connection {
                    info!(%state, "connection state changed");
                }
                self.connection = state;
            }
            TransportEvent::Server(event) => self.dispatch(event, now),
        }
    }

    /// Route one server frame to the components it affects.
    pub fn dispatch(&mut self, event: ServerEvent, now: Instant) {
        let merge = event.wants_merge();
        match event {
            ServerEvent::ChatResponse { content, .. } => {
                self.chat
                    .append_to_last_ai_message(ChatContent::from_value(content), merge);
            }
            ServerEvent::SearchIntent {
                keywords,
                task_id,
                content,
            } => {
                debug!(%task_id, prompt = content.as_deref(), "search intent proposed");
                self.chat.handle_search_intent(&keywords, &task_id);
            }
            ServerEvent::SearchTaskUpdate { action, task } => {
                debug!(action = action.as_deref(), task_id = %task.task_id, "task update pushed");
                self.tasks.update_task(task, &mut self.chat, now);
            }
            ServerEvent::SearchResult { content } => {
                self.tasks
                    .handle_search_result(&content, &mut self.chat, &mut self.viz, now);
            }
            ServerEvent::Error { content } => {
                warn!(message = %content, "backend reported an error");
                self.chat.add_error(&content);
            }
        }
    }

    // -- Outcomes -----------------------------------------------------------

    /// Fold a finished request back into the views.
    pub fn apply(&mut self, outcome: Outcome, now: Instant) {
        match outcome {
            Outcome::Chat(Ok(())) => debug!("chat message accepted"),
            Outcome::Chat(Err(e)) => {
                warn!(error = %e, "chat request failed");
                let text = match rejection(&e) {
                    Some(message) => format!("Error: {message}"),
                    None => format!("发送消息失败: {e}"),
                };
                self.ai(text);
            }

            Outcome::Search(Ok(results)) => {
                info!(count = results.len(), "search results received");
                let (html, actions) = render_results_grid(&results);
                self.chat.add_html_with_actions(Role::Ai, html, actions);
            }
            Outcome::Search(Err(e)) => {
                warn!(error = %e, "search failed");
                let text = match rejection(&e) {
                    Some("") => "搜索失败：未知错误".to_owned(),
                    Some(message) => format!("搜索失败：{message}"),
                    None => format!("搜索出错：{e}"),
                };
                self.ai(text);
            }

            Outcome::OpenSite {
                announce: false,
                result,
            } => match result {
                Ok(message) => info!(%message, "browser initialized"),
                Err(e) => warn!(error = %e, "failed to initialize browser"),
            },
            Outcome::OpenSite {
                announce: true,
                result,
            } => {
                let text = match result {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(error = %e, "open site failed");
                        match rejection(&e) {
                            Some(message) => message.to_owned(),
                            None => format!("打开小红书失败: {e}"),
                        }
                    }
                };
                self.ai(text);
            }

            Outcome::TestBrowser(Ok(snapshot)) => {
                let ocr = snapshot
                    .ocr_text
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "无文本".to_owned());
                self.chat.add_message(
                    Role::Ai,
                    ChatContent::rich(format!("识别文本：{ocr}"), snapshot.image),
                );
            }
            Outcome::TestBrowser(Err(e)) => {
                warn!(error = %e, "browser test failed");
                let text = match rejection(&e) {
                    Some("") => "测试浏览器失败：未知错误".to_owned(),
                    Some(message) => format!("测试浏览器失败：{message}"),
                    None => format!("测试浏览器失败: {e}"),
                };
                self.ai(text);
            }

            Outcome::OpenNote(Ok(message)) => info!(%message, "note opened"),
            Outcome::OpenNote(Err(e)) => {
                warn!(error = %e, "open note failed");
                match rejection(&e) {
                    Some(message) => self.chat.add_error(&format!("打开笔记失败：{message}")),
                    None => self.ai(format!("打开笔记出错：{e}")),
                }
            }

            Outcome::ListTasks(Ok(tasks)) => {
                info!(count = tasks.len(), "existing tasks loaded");
                for task in tasks {
                    self.tasks.update_task(task, &mut self.chat, now);
                }
            }
            Outcome::ListTasks(Err(e)) => warn!(error = %e, "failed to load existing tasks"),

            Outcome::StartSearch(Ok(_)) => {
                self.ai("已开始智能搜索任务，我会持续为您分析相关信息...".to_owned());
            }
            Outcome::StartSearch(Err(e)) => {
                warn!(error = %e, "start auto search failed");
                let text = match rejection(&e) {
                    Some("") => "启动搜索任务失败".to_owned(),
                    Some(message) => message.to_owned(),
                    None => format!("启动搜索任务出错：{e}"),
                };
                self.ai(text);
            }

            Outcome::CancelSearch {
                task_id,
                result: Ok(_),
            } => {
                self.tasks.remove_task(&task_id);
                info!(%task_id, "task cancelled");
                self.ai("已取消任务".to_owned());
            }
            Outcome::CancelSearch {
                task_id,
                result: Err(e),
            } => {
                warn!(%task_id, error = %e, "cancel failed");
                let text = match rejection(&e) {
                    Some(message) => format!("取消任务失败：{message}"),
                    None => format!("取消任务出错：{e}"),
                };
                self.ai(text);
            }

            Outcome::SubmitInput(Ok(_)) => debug!("user choice submitted"),
            Outcome::SubmitInput(Err(e)) => {
                warn!(error = %e, "submit user input failed");
                let text = match rejection(&e) {
                    Some(message) => format!("提交选择失败：{message}"),
                    None => format!("提交选择出错：{e}"),
                };
                self.ai(text);
            }
        }
    }

    fn ai(&mut self, text: String) {
        self.chat.add_message(Role::Ai, text);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::protocol::{TaskState, UserInputRequest};

    /// Records calls and answers from canned replies.
    #[derive(Default)]
    struct FakeBackend {
        calls: Mutex<Vec<String>>,
        results: Vec<NoteResult>,
        reject_with: Option<String>,
    }

    impl FakeBackend {
        fn record(&self, call: String) -> Result<()> {
            self.calls.lock().unwrap().push(call.clone());
            match &self.reject_with {
                Some(message) => Err(ClientError::Backend {
                    endpoint: call,
                    message: Some(message.clone()),
                }),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn open_xiaohongshu(&self) -> Result<String> {
            self.record("open".into())?;
            Ok("Successfully opened Xiaohongshu".into())
        }

        async fn test_browser(&self) -> Result<BrowserSnapshot> {
            self.record("test".into())?;
            Ok(BrowserSnapshot {
                ocr_text: None,
                image: Some("aGVsbG8=".into()),
            })
        }

        async fn search(&self, keyword: &str) -> Result<Vec<NoteResult>> {
            self.record(format!("search:{keyword}"))?;
            Ok(self.results.clone())
        }

        async fn open_note(&self, note_id: &str, _xsec_token: &str) -> Result<String> {
            self.record(format!("note:{note_id}"))?;
            Ok(String::new())
        }

        async fn chat(&self, _client_id: &ClientId, message: &str) -> Result<()> {
            self.record(format!("chat:{message}"))
        }

        async fn list_tasks(&self, _client_id: &ClientId) -> Result<Vec<Task>> {
            self.record("tasks".into())?;
            Ok(vec![Task::new("t0", "旧任务", TaskState::Running)])
        }

        async fn start_auto_search(
            &self,
            _client_id: &ClientId,
            keywords: &str,
            task_id: &str,
        ) -> Result<String> {
            self.record(format!("start:{keywords}:{task_id}"))?;
            Ok("搜索任务已启动".into())
        }

        async fn cancel_auto_search(&self, _client_id: &ClientId, task_id: &str) -> Result<String> {
            self.record(format!("cancel:{task_id}"))?;
            Ok("任务已取消".into())
        }

        async fn submit_user_input(
            &self,
            _client_id: &ClientId,
            task_id: &str,
            continue_search: bool,
        ) -> Result<String> {
            self.record(format!("input:{task_id}:{continue_search}"))?;
            Ok(String::new())
        }
    }

    fn app_with(backend: Arc<FakeBackend>) -> App {
        App::new(&ClientConfig::default(), ClientId::new("42"), backend)
    }

    fn note(id: &str) -> NoteResult {
        NoteResult {
            id: id.into(),
            xsec_token: format!("tok-{id}"),
            title: format!("标题{id}"),
            nickname: "作者".into(),
            liked_count: "7".into(),
        }
    }

    #[test]
    fn routes_input_lines() {
        assert_eq!(route_input("   "), InputRoute::Empty);
        assert_eq!(route_input("搜索: 猫 "), InputRoute::Search("猫".into()));
        assert_eq!(route_input("search:dog"), InputRoute::Search("dog".into()));
        assert_eq!(route_input("搜索:"), InputRoute::Search(String::new()));
        assert_eq!(route_input(" 你好 "), InputRoute::Chat("你好".into()));
    }

    #[tokio::test]
    async fn search_line_echoes_searches_and_renders_grid() {
        let backend = Arc::new(FakeBackend {
            results: vec![note("1"), note("2"), note("3")],
            ..Default::default()
        });
        let mut app = app_with(Arc::clone(&backend));

        let request = app.handle_input("搜索: 猫").unwrap();
        assert_eq!(request, Request::Search("猫".into()));
        app.run_request(request, Instant::now()).await;

        assert_eq!(backend.calls(), ["search:猫"]);
        let messages = app.chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].plain_text(), "搜索: 猫");
        assert_eq!(messages[1].html.matches("class=\"result-item\"").count(), 3);
        assert_eq!(messages[1].actions.len(), 3);
    }

    #[test]
    fn empty_keyword_prompts_for_one() {
        let mut app = app_with(Arc::default());
        assert!(app.handle_input("search:   ").is_none());
        assert_eq!(app.chat.last().unwrap().plain_text(), "请输入搜索关键词");
        assert!(app.handle_input("").is_none());
        assert_eq!(app.chat.len(), 2);
    }

    #[tokio::test]
    async fn chat_rejection_is_shown_inline() {
        let backend = Arc::new(FakeBackend {
            reject_with: Some("client_id is required".into()),
            ..Default::default()
        });
        let mut app = app_with(backend);
        let request = app.handle_input("你好").unwrap();
        app.run_request(request, Instant::now()).await;
        assert_eq!(
            app.chat.last().unwrap().plain_text(),
            "Error: client_id is required"
        );
    }

    #[test]
    fn transport_failures_use_error_wording() {
        let mut app = app_with(Arc::default());
        let err = ClientError::Status {
            endpoint: "ai/chat".into(),
            status: 502,
        };
        app.apply(Outcome::Chat(Err(err)), Instant::now());
        assert!(app.chat.last().unwrap().plain_text().starts_with("发送消息失败: "));
    }

    #[tokio::test]
    async fn startup_hydrates_tasks_silently() {
        let backend = Arc::new(FakeBackend::default());
        let mut app = app_with(Arc::clone(&backend));
        for request in app.startup_requests() {
            app.run_request(request, Instant::now()).await;
        }
        assert_eq!(backend.calls(), ["tasks", "open"]);
        assert_eq!(app.tasks.len(), 1);
        assert!(app.chat.is_empty());
    }

    #[tokio::test]
    async fn open_site_command_echoes_reply() {
        let mut app = app_with(Arc::default());
        let request = app.open_site();
        app.run_request(request, Instant::now()).await;
        let texts: Vec<String> = app.chat.messages().iter().map(|m| m.plain_text()).collect();
        assert_eq!(texts, ["打开小红书", "Successfully opened Xiaohongshu"]);
    }

    #[tokio::test]
    async fn test_browser_shows_ocr_and_screenshot() {
        let mut app = app_with(Arc::default());
        let request = app.test_browser();
        app.run_request(request, Instant::now()).await;
        let reply = app.chat.last().unwrap();
        assert!(reply.plain_text().contains("识别文本：无文本"));
        assert!(reply.html.contains("data:image/jpeg;base64,aGVsbG8="));
    }

    #[tokio::test]
    async fn search_intent_actions_drive_requests() {
        let backend = Arc::new(FakeBackend::default());
        let mut app = app_with(Arc::clone(&backend));
        app.dispatch(
            ServerEvent::SearchIntent {
                keywords: "露营".into(),
                task_id: "t1".into(),
                content: None,
            },
            Instant::now(),
        );
        let start = app.chat.last().unwrap().actions[0].clone();
        let request = app.action_request(&start);
        app.run_request(request, Instant::now()).await;
        assert_eq!(backend.calls(), ["start:露营:t1"]);
        assert!(app.chat.last().unwrap().plain_text().starts_with("已开始智能搜索任务"));
    }

    #[tokio::test]
    async fn cancel_removes_card() {
        let mut app = app_with(Arc::default());
        let now = Instant::now();
        app.dispatch(
            ServerEvent::SearchTaskUpdate {
                action: None,
                task: Task::new("t1", "k", TaskState::Running),
            },
            now,
        );
        let cancel = app.tasks.get("t1").unwrap().actions[0].clone();
        let request = app.action_request(&cancel);
        app.run_request(request, now).await;
        assert!(app.tasks.is_empty());
        assert_eq!(app.chat.last().unwrap().plain_text(), "已取消任务");
    }

    #[tokio::test]
    async fn continue_prompt_submits_choice() {
        let backend = Arc::new(FakeBackend::default());
        let mut app = app_with(Arc::clone(&backend));
        let mut task = Task::new("t1", "k", TaskState::WaitingUserInput);
        task.user_input_required = Some(UserInputRequest {
            kind: "continue_search".into(),
            message: "继续吗？".into(),
            current_results: 4,
            remaining_keywords: None,
        });
        let now = Instant::now();
        let event = ServerEvent::SearchTaskUpdate { action: None, task };
        app.dispatch(event.clone(), now);
        app.dispatch(event, now);
        assert_eq!(app.chat.len(), 1);

        let stop = app.chat.last().unwrap().actions[1].clone();
        let request = app.action_request(&stop);
        app.run_request(request, now).await;
        assert_eq!(backend.calls(), ["input:t1:false"]);
        assert_eq!(app.chat.len(), 1);
    }

    #[test]
    fn chat_chunks_merge_only_when_asked() {
        let mut app = app_with(Arc::default());
        let now = Instant::now();
        let chunk = |text: &str, kind: Option<&str>| ServerEvent::ChatResponse {
            content: json!(text),
            message_type: kind.map(str::to_owned),
        };
        app.dispatch(chunk("一", Some("chat")), now);
        app.dispatch(chunk("二", Some("chat")), now);
        app.dispatch(chunk("三", None), now);
        assert_eq!(app.chat.len(), 2);
    }

    #[test]
    fn error_frame_becomes_error_bubble() {
        let mut app = app_with(Arc::default());
        app.dispatch(
            ServerEvent::Error {
                content: "处理消息时出错".into(),
            },
            Instant::now(),
        );
        assert!(app.chat.last().unwrap().html.contains("error-message"));
    }

    #[test]
    fn completed_task_lingers_then_goes() {
        let mut app = app_with(Arc::default());
        let now = Instant::now();
        app.dispatch(
            ServerEvent::SearchTaskUpdate {
                action: Some("complete".into()),
                task: Task::new("t1", "k", TaskState::Completed),
            },
            now,
        );
        app.tick(now);
        assert_eq!(app.tasks.len(), 1);
        app.tick(now + std::time::Duration::from_secs(5));
        assert!(app.tasks.is_empty());
    }

    #[test]
    fn status_events_track_connection() {
        let mut app = app_with(Arc::default());
        app.on_transport_event(TransportEvent::Status(ConnectionState::Open), Instant::now());
        assert_eq!(app.connection(), ConnectionState::Open);
        assert!(!app.send(&json!({"ping": 1})));
    }
}

//! Task panel: one progress card per backend search task.
//!
//! Cards are keyed by task id and upserted on every update, so repeated
//! pushes for the same task never duplicate a card.  Terminal tasks linger
//! for a grace period before their card is dropped; removal is a deadline
//! polled through [`TaskPanel::tick`].

use std::collections::HashSet;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::action::Action;
use crate::chat::{ChatView, Role};
use crate::markdown::{escape_attr, escape_text, render_markdown};
use crate::protocol::{BasicStats, SearchResultContent, Task, TaskState, UserInputRequest};
use crate::viz::VisualizationPanel;

/// The rendered card for one task.
#[derive(Debug, Clone)]
pub struct TaskCard {
    pub task: Task,
    pub html: String,
    /// Actions offered on the card itself (cancel while running).
    pub actions: Vec<Action>,
    removal_deadline: Option<Instant>,
}

impl TaskCard {
    fn new(task: Task) -> Self {
        let (html, actions) = render_card(&task);
        Self {
            task,
            html,
            actions,
            removal_deadline: None,
        }
    }

    /// Progress percentage clamped to `[0, 100]`.
    pub fn progress_percent(&self) -> f64 {
        clamp_percent(self.task.progress.percentage)
    }

    /// When the card is due to be removed, if it is scheduled.
    pub fn removal_deadline(&self) -> Option<Instant> {
        self.removal_deadline
    }
}

fn clamp_percent(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) }
}

fn render_card(task: &Task) -> (String, Vec<Action>) {
    let progress = &task.progress;
    let mut html = format!(
        "<div class=\"task-card\" id=\"task-{id}\"><div class=\"task-info\">\
         <div class=\"task-header\"><strong>搜索：{keywords}</strong>\
         <span class=\"task-state\">{state}</span></div>\
         <div class=\"task-progress\"><div class=\"task-progress-bar\" style=\"width: {width}%\"></div></div>\
         <div class=\"task-details\">",
        id = escape_attr(&task.task_id),
        keywords = escape_text(&task.keywords),
        state = escape_text(task.state.as_str()),
        width = clamp_percent(progress.percentage),
    );
    if let Some(keyword) = progress.current_keyword.as_deref().filter(|k| !k.is_empty()) {
        html.push_str(&format!("<div>当前关键词：{}</div>", escape_text(keyword)));
    }
    html.push_str(&format!(
        "<div class=\"progress-stats\"><span>关键词：{}/{}</span>\
         <span>笔记：{}/{}</span><span>评论：{}</span></div>\
         <div class=\"task-message\">{}</div></div></div>",
        progress.keywords_completed,
        progress.keywords_total,
        progress.notes_processed,
        progress.notes_total,
        progress.comments_processed,
        escape_text(task.last_message.as_deref().unwrap_or_default()),
    ));

    let mut actions = Vec::new();
    html.push_str("<div class=\"task-actions\">");
    if task.state == TaskState::Running {
        html.push_str("<button class=\"control-button\">取消</button>");
        actions.push(Action::CancelSearch {
            task_id: task.task_id.clone(),
        });
    }
    html.push_str("</div></div>");
    (html, actions)
}

fn render_prompt(task_id: &str, request: &UserInputRequest) -> (String, Vec<Action>) {
    let html = format!(
        "<div class=\"search-interaction\"><p>{}</p><p>当前已获取 {} 条结果</p></div>",
        escape_text(&request.message),
        request.current_results,
    );
    let actions = [true, false]
        .into_iter()
        .map(|continue_search| Action::SubmitInput {
            task_id: task_id.to_owned(),
            continue_search,
        })
        .collect();
    (html, actions)
}

fn render_basic_stats(stats: &BasicStats) -> String {
    format!(
        "<div class=\"stats-summary\"><h4>搜索统计</h4><ul>\
         <li>处理关键词：{} 个</li><li>分析笔记：{} 篇</li><li>收集评论：{} 条</li>\
         </ul></div>",
        stats.keywords_processed, stats.total_notes, stats.total_comments
    )
}

/// All task cards plus the latest analysis summary.
#[derive(Debug)]
pub struct TaskPanel {
    cards: Vec<TaskCard>,
    /// Tasks whose continue-search prompt is currently on screen.
    prompted: HashSet<String>,
    summary_html: Option<String>,
    grace: Duration,
}

impl TaskPanel {
    /// An empty panel; terminal cards linger for `grace`.
    pub fn new(grace: Duration) -> Self {
        Self {
            cards: Vec::new(),
            prompted: HashSet::new(),
            summary_html: None,
            grace,
        }
    }

    pub fn cards(&self) -> &[TaskCard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn get(&self, task_id: &str) -> Option<&TaskCard> {
        self.cards.iter().find(|c| c.task.task_id == task_id)
    }

    /// Rendered Markdown of the most recent analysis summary.
    pub fn summary_html(&self) -> Option<&str> {
        self.summary_html.as_deref()
    }

    /// Insert or refresh the card for `task`.
    ///
    /// A task parked on a continue-search checkpoint posts one interactive
    /// bubble into `chat`; it is not repeated until the task has left the
    /// waiting state.  Terminal tasks are scheduled for removal, and any
    /// later non-terminal update cancels that schedule.
    pub fn update_task(&mut self, task: Task, chat: &mut ChatView, now: Instant) {
        let task_id = task.task_id.clone();
        debug!(task_id = %task_id, state = %task.state, "task update");

        if let Some(request) = task.continue_search_request() {
            if self.prompted.insert(task_id.clone()) {
                let (html, actions) = render_prompt(&task_id, request);
                chat.add_html_with_actions(Role::Ai, html, actions);
                info!(task_id = %task_id, "asked user whether to continue search");
            }
        } else if task.state != TaskState::WaitingUserInput {
            self.prompted.remove(&task_id);
        }

        let terminal = task.state.is_terminal();
        let index = match self.cards.iter().position(|c| c.task.task_id == task_id) {
            Some(index) => {
                let deadline = self.cards[index].removal_deadline;
                self.cards[index] = TaskCard::new(task);
                self.cards[index].removal_deadline = deadline;
                index
            }
            None => {
                self.cards.push(TaskCard::new(task));
                self.cards.len() - 1
            }
        };

        let card = &mut self.cards[index];
        if terminal {
            if card.removal_deadline.is_none() {
                card.removal_deadline = Some(now + self.grace);
                debug!(task_id = %task_id, "task finished, card removal scheduled");
            }
        } else {
            card.removal_deadline = None;
        }
    }

    /// Drop the card for `task_id` immediately.  Returns whether one existed.
    pub fn remove_task(&mut self, task_id: &str) -> bool {
        self.prompted.remove(task_id);
        let before = self.cards.len();
        self.cards.retain(|c| c.task.task_id != task_id);
        before != self.cards.len()
    }

    /// Remove every card whose grace period has elapsed, returning their ids.
    pub fn tick(&mut self, now: Instant) -> Vec<String> {
        let mut removed = Vec::new();
        self.cards.retain(|card| {
            let expired = card.removal_deadline.is_some_and(|due| due <= now);
            if expired {
                removed.push(card.task.task_id.clone());
            }
            !expired
        });
        for id in &removed {
            self.prompted.remove(id);
            debug!(task_id = %id, "task card removed");
        }
        removed
    }

    /// Show a task's final analysis: summary text here, counters in the
    /// chat, and chart data in the visualization panel.
    pub fn handle_search_result(
        &mut self,
        content: &SearchResultContent,
        chat: &mut ChatView,
        viz: &mut VisualizationPanel,
        now: Instant,
    ) {
        if let Some(summary) = content.text_summary.as_deref().filter(|s| !s.is_empty()) {
            self.summary_html = Some(render_markdown(summary));
        }
        if let Some(stats) = &content.basic_stats {
            chat.add_html(Role::Ai, render_basic_stats(stats));
        }
        if let Some(data) = &content.visualization_data {
            viz.handle_search_result(data, now);
        }
        info!("search result received");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::VisualizationData;
    use serde_json::json;

    const GRACE: Duration = Duration::from_secs(5);

    fn waiting(task_id: &str, results: u64) -> Task {
        let mut task = Task::new(task_id, "猫粮", TaskState::WaitingUserInput);
        task.user_input_required = Some(UserInputRequest {
            kind: UserInputRequest::CONTINUE_SEARCH.into(),
            message: "已完成一轮搜索，是否继续？".into(),
            current_results: results,
            remaining_keywords: Some(2),
        });
        task
    }

    #[test]
    fn card_id_attribute_is_escaped() {
        let task = Task::new("a\"b", "猫粮", TaskState::Running);
        let (html, _) = render_card(&task);
        assert!(html.contains("id=\"task-a&quot;b\""));
    }

    #[test]
    fn upsert_keeps_one_card_per_id() {
        let mut panel = TaskPanel::new(GRACE);
        let mut chat = ChatView::new();
        let now = Instant::now();
        for pct in [10.0, 50.0, 80.0] {
            let mut task = Task::new("t1", "猫粮", TaskState::Running);
            task.progress.percentage = pct;
            panel.update_task(task, &mut chat, now);
        }
        panel.update_task(Task::new("t2", "狗粮", TaskState::Running), &mut chat, now);
        assert_eq!(panel.len(), 2);
        assert_eq!(panel.get("t1").unwrap().progress_percent(), 80.0);
        assert_eq!(panel.cards()[0].task.task_id, "t1");
    }

    #[test]
    fn card_shows_counts_and_cancel_only_while_running() {
        let mut panel = TaskPanel::new(GRACE);
        let mut chat = ChatView::new();
        let mut task = Task::new("t1", "露营", TaskState::Running);
        task.progress.percentage = 150.0;
        task.progress.current_keyword = Some("露营 装备".into());
        task.progress.keywords_completed = 1;
        task.progress.keywords_total = 3;
        task.progress.notes_processed = 4;
        task.progress.notes_total = 10;
        task.progress.comments_processed = 25;
        task.last_message = Some("正在分析".into());
        panel.update_task(task, &mut chat, Instant::now());

        let card = panel.get("t1").unwrap();
        assert!(card.html.contains("width: 100%"));
        assert!(card.html.contains("当前关键词：露营 装备"));
        assert!(card.html.contains("关键词：1/3"));
        assert!(card.html.contains("笔记：4/10"));
        assert!(card.html.contains("评论：25"));
        assert!(card.html.contains("正在分析"));
        assert_eq!(card.actions, vec![Action::CancelSearch { task_id: "t1".into() }]);

        panel.update_task(Task::new("t1", "露营", TaskState::Analyzing), &mut chat, Instant::now());
        let card = panel.get("t1").unwrap();
        assert!(card.actions.is_empty());
        assert!(card.html.contains("width: 0%"));
        assert!(chat.is_empty());
    }

    #[test]
    fn continue_search_prompts_once() {
        let mut panel = TaskPanel::new(GRACE);
        let mut chat = ChatView::new();
        let now = Instant::now();
        panel.update_task(waiting("t1", 12), &mut chat, now);
        panel.update_task(waiting("t1", 12), &mut chat, now);

        assert_eq!(chat.len(), 1);
        let bubble = chat.last().unwrap();
        assert!(bubble.plain_text().contains("当前已获取 12 条结果"));
        let labels: Vec<&str> = bubble.actions.iter().map(Action::label).collect();
        assert_eq!(labels, ["继续搜索", "查看结果"]);
        assert_eq!(
            bubble.actions[0],
            Action::SubmitInput {
                task_id: "t1".into(),
                continue_search: true
            }
        );
    }

    #[test]
    fn prompt_rearms_after_leaving_waiting_state() {
        let mut panel = TaskPanel::new(GRACE);
        let mut chat = ChatView::new();
        let now = Instant::now();
        panel.update_task(waiting("t1", 5), &mut chat, now);
        panel.update_task(Task::new("t1", "猫粮", TaskState::Running), &mut chat, now);
        panel.update_task(waiting("t1", 9), &mut chat, now);
        assert_eq!(chat.len(), 2);
    }

    #[test]
    fn other_input_kinds_do_not_prompt() {
        let mut panel = TaskPanel::new(GRACE);
        let mut chat = ChatView::new();
        let mut task = waiting("t1", 1);
        task.user_input_required.as_mut().unwrap().kind = "confirm_login".into();
        panel.update_task(task, &mut chat, Instant::now());
        assert!(chat.is_empty());
    }

    #[test]
    fn completed_card_is_removed_after_grace() {
        let mut panel = TaskPanel::new(GRACE);
        let mut chat = ChatView::new();
        let now = Instant::now();
        panel.update_task(Task::new("t1", "k", TaskState::Completed), &mut chat, now);

        assert!(panel.tick(now).is_empty());
        assert!(panel.tick(now + Duration::from_secs(4)).is_empty());
        assert_eq!(panel.len(), 1);
        assert_eq!(panel.tick(now + GRACE), vec!["t1".to_owned()]);
        assert!(panel.is_empty());
    }

    #[test]
    fn repeated_terminal_updates_keep_first_deadline() {
        let mut panel = TaskPanel::new(GRACE);
        let mut chat = ChatView::new();
        let now = Instant::now();
        panel.update_task(Task::new("t1", "k", TaskState::Completed), &mut chat, now);
        let later = now + Duration::from_secs(3);
        panel.update_task(Task::new("t1", "k", TaskState::Completed), &mut chat, later);
        assert_eq!(panel.get("t1").unwrap().removal_deadline(), Some(now + GRACE));
    }

    #[test]
    fn non_terminal_update_cancels_removal() {
        let mut panel = TaskPanel::new(GRACE);
        let mut chat = ChatView::new();
        let now = Instant::now();
        panel.update_task(Task::new("t1", "k", TaskState::Failed), &mut chat, now);
        panel.update_task(Task::new("t1", "k", TaskState::Running), &mut chat, now);
        assert!(panel.tick(now + GRACE * 2).is_empty());
        assert_eq!(panel.len(), 1);
    }

    #[test]
    fn remove_task_drops_card() {
        let mut panel = TaskPanel::new(GRACE);
        let mut chat = ChatView::new();
        panel.update_task(Task::new("t1", "k", TaskState::Running), &mut chat, Instant::now());
        assert!(panel.remove_task("t1"));
        assert!(!panel.remove_task("t1"));
        assert!(panel.is_empty());
    }

    #[test]
    fn search_result_fans_out() {
        let mut panel = TaskPanel::new(GRACE);
        let mut chat = ChatView::new();
        let mut viz = VisualizationPanel::new(Duration::from_millis(300));
        let content = SearchResultContent {
            text_summary: Some("## 结论\n\n值得买".into()),
            basic_stats: Some(BasicStats {
                keywords_processed: 3,
                total_notes: 20,
                total_comments: 150,
            }),
            visualization_data: Some(VisualizationData {
                word_cloud: Some(json!({"data": [{"text": "好", "weight": 40}]})),
                ..Default::default()
            }),
        };
        panel.handle_search_result(&content, &mut chat, &mut viz, Instant::now());

        assert!(panel.summary_html().unwrap().contains("<h2>结论</h2>"));
        let stats = &chat.last().unwrap().html;
        assert!(stats.contains("<h4>搜索统计</h4>"));
        assert!(stats.contains("<li>处理关键词：3 个</li>"));
        assert!(stats.contains("<li>分析笔记：20 篇</li>"));
        assert!(stats.contains("<li>收集评论：150 条</li>"));
        assert!(viz.is_expanded());
    }

    #[test]
    fn empty_result_changes_nothing_but_viz_state() {
        let mut panel = TaskPanel::new(GRACE);
        let mut chat = ChatView::new();
        let mut viz = VisualizationPanel::new(Duration::from_millis(300));
        panel.handle_search_result(&SearchResultContent::default(), &mut chat, &mut viz, Instant::now());
        assert!(panel.summary_html().is_none());
        assert!(chat.is_empty());
        assert!(!viz.is_expanded());
    }
}

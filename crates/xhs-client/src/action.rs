//! User-triggerable actions attached to chat bubbles and task cards.

use serde::{Deserialize, Serialize};

/// An interactive choice rendered next to a chat bubble or task card.
///
/// Front ends show these as buttons (or key bindings) and hand the chosen
/// one back to [`App::action_request`](crate::App::action_request).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Open a note in the backend-controlled browser.
    OpenNote { note_id: String, xsec_token: String },
    /// Accept a proposed search intent and start the task.
    StartSearch { keywords: String, task_id: String },
    /// Cancel a proposed or running task.
    CancelSearch { task_id: String },
    /// Answer a continue-search checkpoint.
    SubmitInput { task_id: String, continue_search: bool },
}

impl Action {
    /// Button label shown to the user.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenNote { .. } => "查看详情",
            Self::StartSearch { .. } => "开始智能搜索",
            Self::CancelSearch { .. } => "取消",
            Self::SubmitInput {
                continue_search: true,
                ..
            } => "继续搜索",
            Self::SubmitInput {
                continue_search: false,
                ..
            } => "查看结果",
        }
    }

    /// The task this action refers to, if any.
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::OpenNote { .. } => None,
            Self::StartSearch { task_id, .. }
            | Self::CancelSearch { task_id }
            | Self::SubmitInput { task_id, .. } => Some(task_id),
        }
    }
}

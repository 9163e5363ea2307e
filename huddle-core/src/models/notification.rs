use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A per-recipient notification record. Created only by the dispatcher;
/// the recipient may flip `read` or delete it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    /// Recipient. Never equals the actor of the triggering event.
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Navigation link. A weak reference: it may dangle after the project
    /// or task it points at is deleted.
    pub link: String,
    pub project_id: Uuid,
    pub task_id: Option<Uuid>,
    pub tab: NotificationTab,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    InviteReceived,
    InviteAccepted,
    TaskAssigned,
    TaskStatusChanged,
    CommentAdded,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InviteReceived => "invite_received",
            Self::InviteAccepted => "invite_accepted",
            Self::TaskAssigned => "task_assigned",
            Self::TaskStatusChanged => "task_status_changed",
            Self::CommentAdded => "comment_added",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "invite_received" => Some(Self::InviteReceived),
            "invite_accepted" => Some(Self::InviteAccepted),
            "task_assigned" => Some(Self::TaskAssigned),
            "task_status_changed" => Some(Self::TaskStatusChanged),
            "comment_added" => Some(Self::CommentAdded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTab {
    Direct,
    Watching,
}

impl NotificationTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Watching => "watching",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "watching" => Some(Self::Watching),
            _ => None,
        }
    }
}

/// Read-side filters for the notification feed.
#[derive(Debug, Clone, Copy)]
pub struct NotificationQuery {
    pub limit: u32,
    pub offset: u32,
    pub unread_only: bool,
    pub tab: NotificationTab,
}

impl Default for NotificationQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            offset: 0,
            unread_only: false,
            tab: NotificationTab::Direct,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub total: u32,
    pub has_more: bool,
    pub next_offset: Option<u32>,
}

/// Display-time day bucket. Not stored; computed against the caller's
/// local calendar date.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DayBucket {
    Today,
    Yesterday,
    Older,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One append-only audit record. Never mutated; deleted only by cascading
/// project deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub project_id: Uuid,
    pub actor_id: Uuid,
    pub kind: ActivityKind,
    /// Event-specific payload, immutable once written.
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ProjectCreated,
    ProjectUpdated,
    ProjectArchived,
    MemberAdded,
    MemberRemoved,
    MemberRoleChanged,
    MemberInvited,
    InvitationAccepted,
    InvitationDeclined,
    InvitationRevoked,
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskStatusChanged,
    TaskAssigned,
    TaskUnassigned,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectCreated => "project_created",
            Self::ProjectUpdated => "project_updated",
            Self::ProjectArchived => "project_archived",
            Self::MemberAdded => "member_added",
            Self::MemberRemoved => "member_removed",
            Self::MemberRoleChanged => "member_role_changed",
            Self::MemberInvited => "member_invited",
            Self::InvitationAccepted => "invitation_accepted",
            Self::InvitationDeclined => "invitation_declined",
            Self::InvitationRevoked => "invitation_revoked",
            Self::TaskCreated => "task_created",
            Self::TaskUpdated => "task_updated",
            Self::TaskDeleted => "task_deleted",
            Self::TaskStatusChanged => "task_status_changed",
            Self::TaskAssigned => "task_assigned",
            Self::TaskUnassigned => "task_unassigned",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "project_created" => Some(Self::ProjectCreated),
            "project_updated" => Some(Self::ProjectUpdated),
            "project_archived" => Some(Self::ProjectArchived),
            "member_added" => Some(Self::MemberAdded),
            "member_removed" => Some(Self::MemberRemoved),
            "member_role_changed" => Some(Self::MemberRoleChanged),
            "member_invited" => Some(Self::MemberInvited),
            "invitation_accepted" => Some(Self::InvitationAccepted),
            "invitation_declined" => Some(Self::InvitationDeclined),
            "invitation_revoked" => Some(Self::InvitationRevoked),
            "task_created" => Some(Self::TaskCreated),
            "task_updated" => Some(Self::TaskUpdated),
            "task_deleted" => Some(Self::TaskDeleted),
            "task_status_changed" => Some(Self::TaskStatusChanged),
            "task_assigned" => Some(Self::TaskAssigned),
            "task_unassigned" => Some(Self::TaskUnassigned),
            _ => None,
        }
    }
}

use std::fmt::{Display, Formatter, Result as FmtResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::models::delivery::DeliveryTarget;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    #[serde(alias = "track_liked")]
    Like,
    #[serde(alias = "comment_received")]
    Comment,
    #[serde(alias = "new_follower")]
    Follow,
    #[serde(alias = "track_completed")]
    JobCompleted,
    TrackAddedToProject,
    #[serde(alias = "project_status_changed")]
    StatusChanged,
    ProjectCompleted,
    CreditsEarned,
    #[serde(alias = "achievement_unlocked")]
    Achievement,
    #[serde(alias = "feature_announcement")]
    Announcement,
}

impl NotificationType {
    pub const ALL: [NotificationType; 10] = [
        NotificationType::Like,
        NotificationType::Comment,
        NotificationType::Follow,
        NotificationType::JobCompleted,
        NotificationType::TrackAddedToProject,
        NotificationType::StatusChanged,
        NotificationType::ProjectCompleted,
        NotificationType::CreditsEarned,
        NotificationType::Achievement,
        NotificationType::Announcement,
    ];

    pub fn from_wire(name: &str) -> Option<Self> {
        serde_json::from_value(JsonValue::String(name.to_string())).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Like => "like",
            NotificationType::Comment => "comment",
            NotificationType::Follow => "follow",
            NotificationType::JobCompleted => "job_completed",
            NotificationType::TrackAddedToProject => "track_added_to_project",
            NotificationType::StatusChanged => "status_changed",
            NotificationType::ProjectCompleted => "project_completed",
            NotificationType::CreditsEarned => "credits_earned",
            NotificationType::Achievement => "achievement",
            NotificationType::Announcement => "announcement",
        }
    }
}

impl Display for NotificationType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationKey {
    pub user_id: String,
    pub notification_type: NotificationType,
}

impl NotificationKey {
    pub fn new(user_id: impl Into<String>, notification_type: NotificationType) -> Self {
        Self {
            user_id: user_id.into(),
            notification_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNotificationEvent {
    pub user_id: String,
    pub chat_id: i64,

    #[serde(rename = "type")]
    pub notification_type: String,

    #[serde(default)]
    pub payload: JsonValue,

    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LikePayload {
    pub track_id: String,
    #[serde(default)]
    pub track_title: Option<String>,
    #[serde(default)]
    pub liker_name: Option<String>,
    #[serde(default)]
    pub total_likes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentPayload {
    pub track_id: String,
    #[serde(default)]
    pub track_title: Option<String>,
    #[serde(default)]
    pub commenter_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowPayload {
    #[serde(default)]
    pub follower_name: Option<String>,
    #[serde(default)]
    pub follower_username: Option<String>,
    #[serde(default)]
    pub total_followers: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCompletedPayload {
    pub track_id: String,
    #[serde(default)]
    pub track_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackAddedToProjectPayload {
    pub project_id: String,
    #[serde(default)]
    pub project_title: Option<String>,
    #[serde(default)]
    pub track_title: Option<String>,
    #[serde(default)]
    pub progress: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChangedPayload {
    pub project_id: String,
    #[serde(default)]
    pub project_title: Option<String>,
    #[serde(default)]
    pub old_status: Option<String>,
    pub new_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectCompletedPayload {
    pub project_id: String,
    #[serde(default)]
    pub project_title: Option<String>,
    #[serde(default)]
    pub track_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditsEarnedPayload {
    pub amount: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub new_balance: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementPayload {
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub credits_reward: Option<u32>,
    #[serde(default)]
    pub experience_reward: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnouncementPayload {
    pub feature_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub action_url: Option<String>,
    #[serde(default)]
    pub action_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationPayload {
    Like(LikePayload),
    Comment(CommentPayload),
    Follow(FollowPayload),
    JobCompleted(JobCompletedPayload),
    TrackAddedToProject(TrackAddedToProjectPayload),
    StatusChanged(StatusChangedPayload),
    ProjectCompleted(ProjectCompletedPayload),
    CreditsEarned(CreditsEarnedPayload),
    Achievement(AchievementPayload),
    Announcement(AnnouncementPayload),
}

impl NotificationPayload {
    pub fn parse(
        notification_type: NotificationType,
        value: JsonValue,
    ) -> Result<Self, serde_json::Error> {
        // Payload-less events are allowed for types whose fields are all optional.
        let value = match value {
            JsonValue::Null => JsonValue::Object(Default::default()),
            other => other,
        };

        let payload = match notification_type {
            NotificationType::Like => Self::Like(serde_json::from_value(value)?),
            NotificationType::Comment => Self::Comment(serde_json::from_value(value)?),
            NotificationType::Follow => Self::Follow(serde_json::from_value(value)?),
            NotificationType::JobCompleted => Self::JobCompleted(serde_json::from_value(value)?),
            NotificationType::TrackAddedToProject => {
                Self::TrackAddedToProject(serde_json::from_value(value)?)
            }
            NotificationType::StatusChanged => Self::StatusChanged(serde_json::from_value(value)?),
            NotificationType::ProjectCompleted => {
                Self::ProjectCompleted(serde_json::from_value(value)?)
            }
            NotificationType::CreditsEarned => Self::CreditsEarned(serde_json::from_value(value)?),
            NotificationType::Achievement => Self::Achievement(serde_json::from_value(value)?),
            NotificationType::Announcement => Self::Announcement(serde_json::from_value(value)?),
        };

        Ok(payload)
    }

    pub fn notification_type(&self) -> NotificationType {
        match self {
            Self::Like(_) => NotificationType::Like,
            Self::Comment(_) => NotificationType::Comment,
            Self::Follow(_) => NotificationType::Follow,
            Self::JobCompleted(_) => NotificationType::JobCompleted,
            Self::TrackAddedToProject(_) => NotificationType::TrackAddedToProject,
            Self::StatusChanged(_) => NotificationType::StatusChanged,
            Self::ProjectCompleted(_) => NotificationType::ProjectCompleted,
            Self::CreditsEarned(_) => NotificationType::CreditsEarned,
            Self::Achievement(_) => NotificationType::Achievement,
            Self::Announcement(_) => NotificationType::Announcement,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub user_id: String,
    pub chat_id: i64,
    pub payload: NotificationPayload,
    pub occurred_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(user_id: impl Into<String>, chat_id: i64, payload: NotificationPayload) -> Self {
        Self {
            user_id: user_id.into(),
            chat_id,
            payload,
            occurred_at: Utc::now(),
        }
    }

    pub fn notification_type(&self) -> NotificationType {
        self.payload.notification_type()
    }

    pub fn key(&self) -> NotificationKey {
        NotificationKey::new(self.user_id.clone(), self.notification_type())
    }

    pub fn target(&self) -> DeliveryTarget {
        DeliveryTarget {
            user_id: self.user_id.clone(),
            chat_id: self.chat_id,
        }
    }
}

use serde_json::json;

use crate::models::{
    delivery::RenderedMessage,
    event::{NotificationEvent, NotificationPayload, NotificationType},
};

pub trait Formatter: Send + Sync {
    fn format_single(&self, event: &NotificationEvent) -> RenderedMessage;

    fn format_batch(&self, events: &[NotificationEvent]) -> RenderedMessage;
}

#[derive(Debug, Clone)]
pub struct PlainTextFormatter {
    mini_app_url: Option<String>,
    named_in_digest: usize,
}

impl Default for PlainTextFormatter {
    fn default() -> Self {
        Self {
            mini_app_url: None,
            named_in_digest: 3,
        }
    }
}

impl PlainTextFormatter {
    pub fn new(mini_app_url: Option<String>) -> Self {
        Self {
            mini_app_url,
            ..Self::default()
        }
    }

    fn open_button(&self, start_param: &str) -> Option<serde_json::Value> {
        self.mini_app_url.as_ref().map(|url| {
            json!({
                "inline_keyboard": [[{
                    "text": "Open app",
                    "url": format!("{}?startapp={}", url, start_param),
                }]]
            })
        })
    }

    fn with_button(&self, message: RenderedMessage, start_param: &str) -> RenderedMessage {
        match self.open_button(start_param) {
            Some(markup) => message.with_reply_markup(markup),
            None => message,
        }
    }

    fn recent_names(&self, events: &[NotificationEvent]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();

        for event in events.iter().rev() {
            let name = match &event.payload {
                NotificationPayload::Like(p) => p.liker_name.clone(),
                NotificationPayload::Comment(p) => p.commenter_name.clone(),
                NotificationPayload::Follow(p) => p.follower_name.clone(),
                _ => None,
            };

            if let Some(name) = name {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            if names.len() == self.named_in_digest {
                break;
            }
        }

        names
    }
}

fn or_default<'a>(value: &'a Option<String>, fallback: &'a str) -> &'a str {
    value.as_deref().unwrap_or(fallback)
}

impl Formatter for PlainTextFormatter {
    fn format_single(&self, event: &NotificationEvent) -> RenderedMessage {
        match &event.payload {
            NotificationPayload::Like(p) => self.with_button(
                RenderedMessage::plain(format!(
                    "❤️ {} liked your track \"{}\"",
                    or_default(&p.liker_name, "Someone"),
                    or_default(&p.track_title, "Untitled")
                )),
                &format!("track_{}", p.track_id),
            ),
            NotificationPayload::Comment(p) => {
                let mut text = format!(
                    "💬 {} commented on \"{}\"",
                    or_default(&p.commenter_name, "Someone"),
                    or_default(&p.track_title, "Untitled")
                );
                if let Some(comment) = &p.text {
                    text.push_str(&format!(":\n{}", comment));
                }
                self.with_button(RenderedMessage::plain(text), &format!("track_{}", p.track_id))
            }
            NotificationPayload::Follow(p) => {
                let mut text = format!("👥 {} is now following you", or_default(&p.follower_name, "Someone"));
                if let Some(total) = p.total_followers {
                    text.push_str(&format!("\nYou have {} followers", total));
                }
                self.with_button(RenderedMessage::plain(text), "profile")
            }
            NotificationPayload::JobCompleted(p) => self.with_button(
                RenderedMessage::plain(format!(
                    "🎵 Your track \"{}\" is ready!",
                    or_default(&p.track_title, "New track")
                )),
                &format!("track_{}", p.track_id),
            ),
            NotificationPayload::TrackAddedToProject(p) => {
                let mut text = format!(
                    "📁 \"{}\" was added to project \"{}\"",
                    or_default(&p.track_title, "Track"),
                    or_default(&p.project_title, "Project")
                );
                if let Some(progress) = p.progress {
                    text.push_str(&format!("\nProgress: {}%", progress.min(100)));
                }
                self.with_button(RenderedMessage::plain(text), &format!("project_{}", p.project_id))
            }
            NotificationPayload::StatusChanged(p) => self.with_button(
                RenderedMessage::plain(format!(
                    "📋 Project \"{}\" is now {}",
                    or_default(&p.project_title, "Project"),
                    p.new_status.replace('_', " ")
                )),
                &format!("project_{}", p.project_id),
            ),
            NotificationPayload::ProjectCompleted(p) => {
                let mut text = format!(
                    "🎉 Project \"{}\" is complete!",
                    or_default(&p.project_title, "Project")
                );
                if let Some(count) = p.track_count {
                    text.push_str(&format!("\nAll {} tracks are ready.", count));
                }
                self.with_button(RenderedMessage::plain(text), &format!("project_{}", p.project_id))
            }
            NotificationPayload::CreditsEarned(p) => {
                let mut text = format!("💰 +{} credits", p.amount);
                if let Some(reason) = &p.reason {
                    text.push_str(&format!(" for {}", reason));
                }
                if let Some(balance) = p.new_balance {
                    text.push_str(&format!("\nBalance: {}", balance));
                }
                self.with_button(RenderedMessage::plain(text), "credits")
            }
            NotificationPayload::Achievement(p) => {
                let mut text = format!("{} Achievement unlocked: {}", or_default(&p.icon, "🏆"), p.name);
                if let Some(description) = &p.description {
                    text.push_str(&format!("\n{}", description));
                }
                self.with_button(RenderedMessage::plain(text), "achievements")
            }
            NotificationPayload::Announcement(p) => {
                let mut message = RenderedMessage::plain(match &p.description {
                    Some(description) => format!("🎉 {}\n\n{}", p.feature_name, description),
                    None => format!("🎉 {}", p.feature_name),
                });
                if let Some(url) = &p.action_url {
                    message = message.with_reply_markup(json!({
                        "inline_keyboard": [[{
                            "text": or_default(&p.action_label, "Try it"),
                            "url": url,
                        }]]
                    }));
                }
                message
            }
        }
    }

    fn format_batch(&self, events: &[NotificationEvent]) -> RenderedMessage {
        match events {
            [] => RenderedMessage::plain(""),
            [single] => self.format_single(single),
            [first, ..] => {
                let count = events.len();
                let names = self.recent_names(events);
                let others = count.saturating_sub(names.len());

                let headline = match first.notification_type() {
                    NotificationType::Like => format!("❤️ {} new likes on your tracks", count),
                    NotificationType::Comment => format!("💬 {} new comments on your tracks", count),
                    NotificationType::Follow => format!("👥 {} new followers", count),
                    other => format!("🔔 {} new {} notifications", count, other.as_str().replace('_', " ")),
                };

                let mut text = headline;
                if !names.is_empty() {
                    text.push_str(&format!("\nFrom {}", names.join(", ")));
                    if others > 0 {
                        text.push_str(&format!(" and {} more", others));
                    }
                }

                let start_param = match first.notification_type() {
                    NotificationType::Follow => "profile",
                    _ => "notifications",
                };
                self.with_button(RenderedMessage::plain(text), start_param)
            }
        }
    }
}

use std::{collections::HashMap, time::Duration};

use anyhow::{Error, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::models::event::NotificationType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigestSettings {
    pub min_items: usize,
    pub window_ms: u64,
}

impl DigestSettings {
    pub fn new(min_items: usize, window_ms: u64) -> Self {
        Self {
            min_items,
            window_ms,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn validate(&self, context: &str) -> Result<(), Error> {
        if self.min_items == 0 {
            return Err(anyhow!("{}: min_items must be at least 1", context));
        }
        if self.window_ms == 0 {
            return Err(anyhow!("{}: window_ms must be positive", context));
        }
        Ok(())
    }
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            min_items: 3,
            window_ms: 5 * 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Route {
    Digest {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        window_ms: Option<u64>,
    },
    Direct {
        #[serde(default)]
        cooldown_ms: u64,
    },
}

impl Route {
    pub const DIGEST: Route = Route::Digest {
        min_items: None,
        window_ms: None,
    };

    pub fn direct(cooldown_ms: u64) -> Self {
        Route::Direct { cooldown_ms }
    }

    pub fn is_digest(&self) -> bool {
        matches!(self, Route::Digest { .. })
    }
}

#[derive(Debug, Default, Deserialize)]
struct RoutingTableFile {
    #[serde(default)]
    digest: Option<DigestSettings>,

    #[serde(default)]
    routes: HashMap<NotificationType, Route>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingTable {
    pub digest: DigestSettings,
    pub routes: HashMap<NotificationType, Route>,
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::with_digest(DigestSettings::default())
    }
}

impl RoutingTable {
    pub fn with_digest(digest: DigestSettings) -> Self {
        let routes = NotificationType::ALL
            .into_iter()
            .map(|notification_type| (notification_type, Self::default_route(notification_type)))
            .collect();

        Self { digest, routes }
    }

    fn default_route(notification_type: NotificationType) -> Route {
        match notification_type {
            NotificationType::Like | NotificationType::Comment | NotificationType::Follow => {
                Route::DIGEST
            }
            NotificationType::TrackAddedToProject | NotificationType::StatusChanged => {
                Route::direct(60_000)
            }
            NotificationType::CreditsEarned => Route::direct(30_000),
            NotificationType::JobCompleted
            | NotificationType::ProjectCompleted
            | NotificationType::Achievement
            | NotificationType::Announcement => Route::direct(0),
        }
    }

    /// Applies a JSON routing document on top of this table. Types the
    /// document does not mention keep their current route.
    pub fn merge_json(mut self, json: &str) -> Result<Self, Error> {
        let file: RoutingTableFile =
            serde_json::from_str(json).map_err(|e| anyhow!("Invalid routing table: {}", e))?;

        if let Some(digest) = file.digest {
            self.digest = digest;
        }
        self.routes.extend(file.routes);

        self.validate()?;
        Ok(self)
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        Self::default().merge_json(json)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.digest.validate("digest")?;

        for notification_type in NotificationType::ALL {
            if self.route(notification_type).is_digest() {
                if let Some(settings) = self.digest_settings(notification_type) {
                    settings.validate(notification_type.as_str())?;
                }
            }
        }

        Ok(())
    }

    pub fn with_route(mut self, notification_type: NotificationType, route: Route) -> Self {
        self.routes.insert(notification_type, route);
        self
    }

    pub fn route(&self, notification_type: NotificationType) -> Route {
        self.routes
            .get(&notification_type)
            .copied()
            .unwrap_or_else(|| Self::default_route(notification_type))
    }

    pub fn digest_settings(&self, notification_type: NotificationType) -> Option<DigestSettings> {
        match self.route(notification_type) {
            Route::Digest {
                min_items,
                window_ms,
            } => Some(DigestSettings {
                min_items: min_items.unwrap_or(self.digest.min_items),
                window_ms: window_ms.unwrap_or(self.digest.window_ms),
            }),
            Route::Direct { .. } => None,
        }
    }

    pub fn cooldown(&self, notification_type: NotificationType) -> Duration {
        match self.route(notification_type) {
            Route::Direct { cooldown_ms } => Duration::from_millis(cooldown_ms),
            Route::Digest { .. } => Duration::ZERO,
        }
    }
}

use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info, warn};

use crate::{
    errors::StoreError,
    models::{
        event::NotificationType, failure::FailedNotification, status::FailureStatus,
    },
    notifications::store::FailureStore,
};

const SCHEMA: &str = include_str!("../../migrations/0001_create_failed_notifications.sql");

/// `failed_notifications` table in PostgreSQL. The connection is reopened
/// on first use after it closes.
pub struct PostgresFailureStore {
    database_url: String,
    client: RwLock<Arc<Client>>,
}

impl PostgresFailureStore {
    pub async fn connect(database_url: &str) -> Result<Self, Error> {
        info!("Connecting to PostgreSQL database");

        let client = open(database_url)
            .await
            .map_err(|e| anyhow!("Failed to connect to database: {}", e))?;

        info!("PostgreSQL connection established");

        Ok(Self {
            database_url: database_url.to_string(),
            client: RwLock::new(Arc::new(client)),
        })
    }

    async fn client(&self) -> Result<Arc<Client>, StoreError> {
        {
            let client = self.client.read().await;
            if !client.is_closed() {
                return Ok(Arc::clone(&client));
            }
        }

        let mut client = self.client.write().await;
        if client.is_closed() {
            warn!("PostgreSQL connection closed, reconnecting");
            *client = Arc::new(open(&self.database_url).await?);
            info!("PostgreSQL connection re-established");
        }

        Ok(Arc::clone(&client))
    }

    pub async fn ensure_schema(&self) -> Result<(), Error> {
        self.client()
            .await?
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| anyhow!("Failed to apply schema: {}", e))?;

        debug!("failed_notifications schema ensured");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), Error> {
        self.client()
            .await?
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| anyhow!("Database health check failed: {}", e))?;

        Ok(())
    }
}

async fn open(database_url: &str) -> Result<Client, tokio_postgres::Error> {
    let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "PostgreSQL connection closed with error");
        }
    });

    Ok(client)
}

fn failure_from_row(row: &Row) -> Result<FailedNotification, StoreError> {
    let notification_type: String = row.try_get("notification_type")?;
    let notification_type = NotificationType::from_wire(&notification_type).ok_or_else(|| {
        StoreError::Corrupt(format!("unknown notification type '{}'", notification_type))
    })?;

    let status: String = row.try_get("status")?;
    let status = status.parse::<FailureStatus>().map_err(StoreError::Corrupt)?;

    let rendered_message: JsonValue = row.try_get("rendered_message")?;
    let retry_count: i32 = row.try_get("retry_count")?;

    Ok(FailedNotification {
        delivery_id: row.try_get("delivery_id")?,
        user_id: row.try_get("user_id")?,
        chat_id: row.try_get("chat_id")?,
        notification_type,
        original_payload: row.try_get("original_payload")?,
        rendered_message: serde_json::from_value(rendered_message)?,
        error_message: row.try_get("error_message")?,
        error_class: row.try_get("error_class")?,
        status,
        first_failed_at: row.try_get("first_failed_at")?,
        retry_count: u32::try_from(retry_count).unwrap_or_default(),
    })
}

#[async_trait]
impl FailureStore for PostgresFailureStore {
    async fn persist(&self, failure: FailedNotification) -> Result<bool, StoreError> {
        let rendered_message = serde_json::to_value(&failure.rendered_message)?;
        let retry_count = i32::try_from(failure.retry_count).unwrap_or(i32::MAX);

        let rows = self
            .client()
            .await?
            .execute(
                r#"
                INSERT INTO failed_notifications (
                    delivery_id,
                    user_id,
                    chat_id,
                    notification_type,
                    original_payload,
                    rendered_message,
                    error_message,
                    error_class,
                    status,
                    retry_count,
                    first_failed_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (delivery_id) DO NOTHING
                "#,
                &[
                    &failure.delivery_id,
                    &failure.user_id,
                    &failure.chat_id,
                    &failure.notification_type.as_str(),
                    &failure.original_payload,
                    &rendered_message,
                    &failure.error_message,
                    &failure.error_class,
                    &failure.status.to_string(),
                    &retry_count,
                    &failure.first_failed_at,
                ],
            )
            .await
            .inspect_err(|e| {
                error!(
                    error = %e,
                    delivery_id = %failure.delivery_id,
                    "Failed to write failed notification to database"
                );
            })?;

        debug!(
            delivery_id = %failure.delivery_id,
            status = %failure.status,
            inserted = rows == 1,
            "Failed notification written to database"
        );

        Ok(rows == 1)
    }

    async fn list_by_status(
        &self,
        status: FailureStatus,
        limit: usize,
    ) -> Result<Vec<FailedNotification>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows = self
            .client()
            .await?
            .query(
                r#"
                SELECT delivery_id, user_id, chat_id, notification_type, original_payload,
                       rendered_message, error_message, error_class, status, retry_count,
                       first_failed_at
                FROM failed_notifications
                WHERE status = $1
                ORDER BY first_failed_at ASC
                LIMIT $2
                "#,
                &[&status.to_string(), &limit],
            )
            .await?;

        rows.iter().map(failure_from_row).collect()
    }
}

use std::time::Duration;

use anyhow::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::{
    clients::circuit_breaker::CircuitBreaker,
    config::Config,
    errors::ChannelError,
    models::{
        delivery::{DeliveryTarget, RenderedMessage},
        telegram::{SendMessageRequest, TelegramResponse},
    },
    notifications::delivery::ChannelClient,
};

pub struct TelegramClient {
    http_client: Client,
    api_url: String,
    bot_token: String,
    request_timeout: Duration,
    circuit_breaker: Option<CircuitBreaker>,
}

impl TelegramClient {
    pub fn new(config: &Config, circuit_breaker: Option<CircuitBreaker>) -> Result<Self, Error> {
        Self::with_api_url(
            config.telegram_api_url.clone(),
            config.telegram_bot_token.clone(),
            config.telegram_timeout(),
            circuit_breaker,
        )
    }

    pub fn with_api_url(
        api_url: String,
        bot_token: String,
        request_timeout: Duration,
        circuit_breaker: Option<CircuitBreaker>,
    ) -> Result<Self, Error> {
        let http_client = Client::builder().timeout(request_timeout).build()?;

        info!(api_url = %api_url, "Telegram client initialized");

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            bot_token,
            request_timeout,
            circuit_breaker,
        })
    }

    async fn send_message(
        &self,
        target: &DeliveryTarget,
        message: &RenderedMessage,
    ) -> Result<(), ChannelError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let request = SendMessageRequest {
            chat_id: target.chat_id,
            text: &message.text,
            parse_mode: message.parse_mode.as_deref(),
            reply_markup: message.reply_markup.as_ref(),
            disable_web_page_preview: true,
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        let parsed = serde_json::from_str::<TelegramResponse>(&body).ok();

        if status.is_success() && parsed.as_ref().is_some_and(|r| r.ok) {
            debug!(user_id = %target.user_id, "Telegram message sent");
            return Ok(());
        }

        let (code, description, retry_after) = match parsed {
            Some(response) => (
                response.error_code.unwrap_or(status.as_u16()),
                response.description.unwrap_or_else(|| body.clone()),
                response
                    .parameters
                    .and_then(|p| p.retry_after)
                    .map(Duration::from_secs),
            ),
            None => (status.as_u16(), body, None),
        };

        Err(ChannelError::from_status(code, description, retry_after))
    }

    fn transport_error(&self, error: reqwest::Error) -> ChannelError {
        if error.is_timeout() {
            ChannelError::Timeout(self.request_timeout)
        } else {
            ChannelError::Network(error.without_url().to_string())
        }
    }
}

#[async_trait]
impl ChannelClient for TelegramClient {
    async fn deliver(
        &self,
        target: &DeliveryTarget,
        message: &RenderedMessage,
    ) -> Result<(), ChannelError> {
        let Some(breaker) = &self.circuit_breaker else {
            return self.send_message(target, message).await;
        };

        match breaker.allow_request().await {
            Ok(true) => {}
            Ok(false) => return Err(ChannelError::CircuitOpen(breaker.service_name().to_string())),
            Err(e) => warn!(error = %e, "Circuit breaker unavailable, sending anyway"),
        }

        let result = self.send_message(target, message).await;

        let recorded = match &result {
            Ok(()) => breaker.record_success().await,
            Err(e) if e.is_transient() => breaker.record_failure().await,
            Err(_) => Ok(()),
        };
        if let Err(e) = recorded {
            warn!(error = %e, "Failed to update circuit breaker");
        }

        result
    }
}

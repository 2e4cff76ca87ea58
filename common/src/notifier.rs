// Operator notifications
// Unconfigured credentials make `notify` a logged no-op success.

use crate::config::TelegramConfig;
use crate::errors::NotifyError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

const NOTIFY_TIMEOUT_SECONDS: u64 = 30;

/// Delivery channel for human-readable operator messages
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), NotifyError>;
}

/// Telegram Bot API notifier (`sendMessage`, form-encoded)
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECONDS))
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn is_configured(&self) -> bool {
        self.config.credentials().is_some()
    }

    fn send_message_url(&self, bot_token: &str) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            bot_token
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[tracing::instrument(skip_all)]
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let Some((bot_token, chat_id)) = self.config.credentials() else {
            tracing::info!(
                message = message,
                "Telegram not configured (TELEGRAM_BOT_TOKEN/TELEGRAM_CHAT_ID missing), skipping message"
            );
            return Ok(());
        };

        let params = [("chat_id", chat_id), ("text", message)];
        let response = self
            .client
            .post(self.send_message_url(bot_token))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), body = %body, "Telegram rejected message");
            return Err(NotifyError::UnexpectedStatus(status.as_u16()));
        }

        tracing::debug!("Telegram message delivered");
        Ok(())
    }
}

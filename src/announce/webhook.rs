use async_trait::async_trait;
use serde::Serialize;
use tracing::instrument;

use super::{Delivery, DispatchErr, DispatchResult, Dispatcher};

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

/// Posts to a Discord-style incoming webhook; the channel handle is the webhook URL
#[derive(Debug, Clone, Default)]
pub struct WebhookDispatcher {
    http: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Dispatcher for WebhookDispatcher {
    #[instrument(skip(self, channel, text), fields(len = text.chars().count()))]
    async fn dispatch(&self, channel: &str, text: &str) -> DispatchResult<Delivery> {
        let res = self
            .http
            .post(channel)
            .json(&WebhookMessage { content: text })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            tracing::error!(code = %status, "webhook rejected message");
            return Err(DispatchErr::Status(status));
        }

        Ok(Delivery::Delivered)
    }
}

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use super::{MailError, MailMessage, MailTransport};
use crate::MailConfig;

/// Sends emails through the Resend HTTP API
pub struct ResendTransport {
    client: Client,
    api_url: Url,
    api_key: String,
    from: String,
    reply_to: Option<String>,
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to: Option<&'a str>,
}

impl ResendTransport {
    pub fn new(config: &MailConfig, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url.clone(),
            api_key,
            from: config.from.clone(),
            reply_to: config.reply_to.clone(),
        }
    }

    fn request_body<'a>(&'a self, message: &'a MailMessage) -> SendEmailRequest<'a> {
        SendEmailRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            html: &message.html,
            reply_to: self.reply_to.as_deref(),
        }
    }
}

#[async_trait]
impl MailTransport for ResendTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let response = self
            .client
            .post(self.api_url.clone())
            .bearer_auth(&self.api_key)
            .json(&self.request_body(message))
            .send()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

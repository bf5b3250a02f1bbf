#[cfg(test)]
mod test_bot_client;

use crate::entities::{OutgoingMessage, ReplyRequest};
use reqwest::Client;
use url::Url;

const REPLY_PATH: &str = "v2/bot/message/reply";

#[derive(Debug)]
pub enum ClientError {
    UrlParseFailure(String),
    MissingChannelToken(String),
    ReplyRejected(String),
    ReplyDeliveryFailure(String),
}

/// Built once at startup; hands out per-request clients that share one
/// connection pool.
#[derive(Clone, Debug)]
pub struct BotClientFactory {
    http: Client,
    api_endpoint: String,
    channel_token: String,
}

#[derive(Debug)]
pub struct BotClient {
    http: Client,
    reply_url: String,
    channel_token: String,
}

impl BotClientFactory {
    pub fn new(http: Client, api_endpoint: &str, channel_token: &str) -> Self {
        BotClientFactory {
            http,
            api_endpoint: api_endpoint.to_string(),
            channel_token: channel_token.to_string(),
        }
    }

    pub fn new_client(&self) -> Result<BotClient, ClientError> {
        if self.channel_token.trim().is_empty() {
            return Err(ClientError::MissingChannelToken(
                "Channel access token is empty.".to_owned(),
            ));
        }
        Ok(BotClient {
            http: self.http.clone(),
            reply_url: reply_url_for(&self.api_endpoint)?,
            channel_token: self.channel_token.clone(),
        })
    }
}

/// Resolves the reply API under `api_endpoint`, keeping any path prefix the
/// endpoint carries (`http://proxy/line//` -> `http://proxy/line/v2/...`).
pub fn reply_url_for(api_endpoint: &str) -> Result<String, ClientError> {
    let mut base = Url::parse(api_endpoint).map_err(|e| {
        ClientError::UrlParseFailure(format!("API endpoint may not be valid url:\n{:?}", e))
    })?;
    if base.cannot_be_a_base() {
        return Err(ClientError::UrlParseFailure(format!(
            "API endpoint {} cannot carry a path.",
            api_endpoint
        )));
    }
    let prefix = format!("{}/", base.path().trim_end_matches('/'));
    base.set_path(&prefix);
    base.join(REPLY_PATH).map(String::from).map_err(|e| {
        ClientError::UrlParseFailure(format!("Failed to resolve reply path:\n{:?}", e))
    })
}

impl BotClient {
    #[cfg(test)]
    pub fn reply_url(&self) -> &str {
        &self.reply_url
    }

    pub async fn reply_message(
        &self,
        reply_token: &str,
        messages: Vec<OutgoingMessage>,
    ) -> Result<(), ClientError> {
        let body = ReplyRequest {
            reply_token: reply_token.to_string(),
            messages,
        };
        let response = self
            .http
            .post(&self.reply_url)
            .bearer_auth(&self.channel_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ClientError::ReplyDeliveryFailure(format!(
                    "Failed to complete reply request:\n{:?}",
                    e
                ))
            })?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(ClientError::ReplyRejected(format!(
                "Reply API rejected the request with {}:\n{}",
                status, text
            )))
        } else {
            Err(ClientError::ReplyDeliveryFailure(format!(
                "Reply API answered {}:\n{}",
                status, text
            )))
        }
    }
}

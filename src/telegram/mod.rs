use std::time::Duration;
use derive_more::Display;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use crate::router::InboundMessage;

pub mod poller;

const TELEGRAM_API: &str = "https://api.telegram.org";
/// Telegram rejects longer message texts.
pub const MESSAGE_LIMIT: usize = 4096;
/// Slack on top of the long-poll timeout before the HTTP request gives up.
const POLL_GRACE_SECS: u64 = 10;

#[derive(Debug, Display)]
pub enum TelegramError {
    #[display(fmt = "request failed: {}", _0)]
    Transport(reqwest::Error),
    #[display(fmt = "bot api error: {}", _0)]
    Api(String),
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        // Request urls carry the bot token.
        TelegramError::Transport(e.without_url())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

impl Message {
    /// Channel posts have no sender and are skipped.
    pub fn to_inbound(&self) -> Option<InboundMessage> {
        let from = self.from.as_ref()?;
        Some(InboundMessage {
            chat_id: self.chat.id,
            user_id: from.id,
            username: from.username.clone(),
            first_name: Some(from.first_name.clone()).filter(|n| !n.is_empty()),
            text: self.text.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Serialize)]
struct GetUpdates<'a> {
    offset: i64,
    timeout: u32,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Serialize)]
struct SetWebhook<'a> {
    url: &'a str,
    allowed_updates: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_token: Option<&'a str>,
}

/// Thin Bot API client covering the calls the relay makes.
pub struct BotClient {
    http: reqwest::Client,
    base: String,
}

impl BotClient {
    pub fn new(http: reqwest::Client, token: &str) -> Self {
        BotClient {
            http,
            base: format!("{TELEGRAM_API}/bot{token}"),
        }
    }

    async fn call<B, T>(&self, method: &str, body: &B, timeout: Option<Duration>) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut request = self.http.post(format!("{}/{}", self.base, method)).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        // Error statuses still carry an ApiResponse body with the description.
        let response: ApiResponse<T> = request.send().await?.json().await?;
        match response {
            ApiResponse { ok: true, result: Some(result), .. } => Ok(result),
            ApiResponse { description, .. } => Err(TelegramError::Api(
                description.unwrap_or_else(|| format!("{method} failed without description")),
            )),
        }
    }

    pub async fn get_updates(&self, offset: i64, timeout: u32) -> Result<Vec<Update>, TelegramError> {
        let body = GetUpdates {
            offset,
            timeout,
            allowed_updates: &["message"],
        };
        let wait = Duration::from_secs(timeout as u64 + POLL_GRACE_SECS);
        self.call("getUpdates", &body, Some(wait)).await
    }

    /// Sends `text`, split into several messages when it exceeds the size limit.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        for chunk in split_message(text, MESSAGE_LIMIT) {
            let _: Message = self.call("sendMessage", &SendMessage { chat_id, text: &chunk }, None).await?;
        }
        Ok(())
    }

    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<(), TelegramError> {
        let body = SetWebhook {
            url,
            allowed_updates: &["message"],
            secret_token,
        };
        let _: bool = self.call("setWebhook", &body, None).await?;
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<(), TelegramError> {
        let _: bool = self.call("deleteWebhook", &serde_json::json!({}), None).await?;
        Ok(())
    }
}

/// Telegram measures message length in UTF-16 code units.
fn text_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Byte index of the longest prefix of `line` within `limit` UTF-16 units,
/// never empty so an oversized first char still makes progress.
fn prefix_end(line: &str, limit: usize) -> usize {
    let mut units = 0;
    for (i, c) in line.char_indices() {
        units += c.len_utf16();
        if units > limit {
            return if i == 0 { c.len_utf8() } else { i };
        }
    }
    line.len()
}

/// Splits on line boundaries so no chunk exceeds `limit` UTF-16 units. A single
/// line longer than `limit` is cut mid-line.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for line in text.split('\n') {
        let mut line = line;
        loop {
            let line_len = text_len(line);
            let separator = usize::from(!current.is_empty());
            if current_len + separator + line_len <= limit {
                if separator == 1 {
                    current.push('\n');
                }
                current.push_str(line);
                current_len += separator + line_len;
                break;
            }
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            let cut = prefix_end(line, limit);
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
        }
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

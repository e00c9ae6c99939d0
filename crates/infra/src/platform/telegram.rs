//! Bot API implementation of the forum client.
//!
//! Calls are plain blocking HTTP requests; they are expected to run on the
//! forum dispatch worker, never on an async runtime thread.

use std::time::Duration;

use reqwest::blocking::{multipart, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use topicbridge_core::{GroupId, ThreadId};

use super::forum::{ForumClient, ForumError, SentMessage};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Upload requests get more time than plain calls.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    message_id: i64,
    #[serde(default)]
    message_thread_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ApiForumTopic {
    message_thread_id: i64,
}

#[derive(Debug, Serialize)]
struct TopicRef {
    chat_id: i64,
    message_thread_id: i64,
}

#[derive(Debug, Serialize)]
struct SendText<'a> {
    chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_thread_id: Option<i64>,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Forward {
    chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message_thread_id: Option<i64>,
    from_chat_id: i64,
    message_id: i64,
}

/// Forum client backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramForumClient {
    http: Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramForumClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramForumClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TelegramForumClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ForumError> {
        Self::with_base_url(token, DEFAULT_API_URL)
    }

    /// Use a custom Bot API server (self-hosted, or a test double).
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, ForumError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ForumError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.base_url, self.token, method)
    }

    fn call<T, B>(&self, method: &str, body: &B) -> Result<T, ForumError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!(method, "forum api call");
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .map_err(|e| ForumError::Transport(format!("{method}: {}", e.without_url())))?;
        let text = response
            .text()
            .map_err(|e| ForumError::Transport(format!("{method}: {}", e.without_url())))?;
        parse_response(method, &text)
    }

    fn upload(
        &self,
        method: &str,
        field: &str,
        form: multipart::Form,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ApiMessage, ForumError> {
        debug!(method, size = bytes.len(), "forum api upload");
        let part = multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let response = self
            .http
            .post(self.method_url(method))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form.part(field.to_string(), part))
            .send()
            .map_err(|e| ForumError::Transport(format!("{method}: {}", e.without_url())))?;
        let text = response
            .text()
            .map_err(|e| ForumError::Transport(format!("{method}: {}", e.without_url())))?;
        parse_response(method, &text)
    }
}

fn parse_response<T: DeserializeOwned>(method: &str, body: &str) -> Result<T, ForumError> {
    let parsed: ApiResponse<T> = serde_json::from_str(body)
        .map_err(|e| ForumError::Decode(format!("{method}: {e}")))?;
    if !parsed.ok {
        return Err(ForumError::Api {
            code: parsed.error_code.unwrap_or_default(),
            description: parsed
                .description
                .unwrap_or_else(|| format!("{method} failed")),
        });
    }
    parsed
        .result
        .ok_or_else(|| ForumError::Decode(format!("{method}: missing result")))
}

fn sent(message: ApiMessage, requested: ThreadId) -> SentMessage {
    SentMessage {
        message_id: message.message_id,
        thread: message
            .message_thread_id
            .map(ThreadId::new)
            .unwrap_or(requested),
    }
}

fn topic_form(group: GroupId, thread: ThreadId, caption: &str) -> multipart::Form {
    let mut form = multipart::Form::new().text("chat_id", group.to_string());
    if !thread.is_default_topic() {
        form = form.text("message_thread_id", thread.to_string());
    }
    if !caption.is_empty() {
        form = form.text("caption", caption.to_string());
    }
    form
}

/// The default topic is addressed by omitting the thread id.
fn thread_param(thread: ThreadId) -> Option<i64> {
    (!thread.is_default_topic()).then_some(thread.get())
}

impl ForumClient for TelegramForumClient {
    fn reopen_topic(&self, group: GroupId, thread: ThreadId) -> Result<(), ForumError> {
        let _: bool = self.call(
            "reopenForumTopic",
            &TopicRef {
                chat_id: group.get(),
                message_thread_id: thread.get(),
            },
        )?;
        Ok(())
    }

    fn edit_topic_name(&self, group: GroupId, thread: ThreadId, name: &str) -> Result<(), ForumError> {
        let _: bool = self.call(
            "editForumTopic",
            &json!({
                "chat_id": group.get(),
                "message_thread_id": thread.get(),
                "name": name,
            }),
        )?;
        Ok(())
    }

    fn create_topic(&self, group: GroupId, name: &str) -> Result<ThreadId, ForumError> {
        let topic: ApiForumTopic = self.call(
            "createForumTopic",
            &json!({ "chat_id": group.get(), "name": name }),
        )?;
        Ok(ThreadId::new(topic.message_thread_id))
    }

    fn send_text(&self, group: GroupId, thread: ThreadId, text: &str) -> Result<SentMessage, ForumError> {
        let message: ApiMessage = self.call(
            "sendMessage",
            &SendText {
                chat_id: group.get(),
                message_thread_id: thread_param(thread),
                text,
            },
        )?;
        Ok(sent(message, thread))
    }

    fn send_photo(
        &self,
        group: GroupId,
        thread: ThreadId,
        photo: Vec<u8>,
        caption: &str,
    ) -> Result<SentMessage, ForumError> {
        let form = topic_form(group, thread, caption);
        let message = self.upload("sendPhoto", "photo", form, "photo.jpg", photo)?;
        Ok(sent(message, thread))
    }

    fn send_document(
        &self,
        group: GroupId,
        thread: ThreadId,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<SentMessage, ForumError> {
        let form = topic_form(group, thread, caption);
        let message = self.upload("sendDocument", "document", form, file_name, bytes)?;
        Ok(sent(message, thread))
    }

    fn forward_message(
        &self,
        group: GroupId,
        thread: ThreadId,
        from_group: GroupId,
        message_id: i64,
    ) -> Result<SentMessage, ForumError> {
        let message: ApiMessage = self.call(
            "forwardMessage",
            &Forward {
                chat_id: group.get(),
                message_thread_id: thread_param(thread),
                from_chat_id: from_group.get(),
                message_id,
            },
        )?;
        Ok(sent(message, thread))
    }
}

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::api::ApiClient;
use crate::error::Result;
use crate::models::{Conversation, Message, ProjectRequest};

pub const MESSAGE_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTextMessage<'a> {
    pub conversation_id: i64,
    pub sender_id: &'a str,
    pub message_text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestResponse<'a> {
    response_message: &'a str,
    responded_by_user_id: &'a str,
}

/// Answer to an NGO's invitation to a school.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDecision {
    Approve,
    Reject,
}

impl RequestDecision {
    fn path_segment(self) -> &'static str {
        match self {
            RequestDecision::Approve => "approve",
            RequestDecision::Reject => "reject",
        }
    }

    fn default_message(self) -> &'static str {
        match self {
            RequestDecision::Approve => "Invitation accepted",
            RequestDecision::Reject => "Invitation declined",
        }
    }
}

impl ApiClient {
    pub async fn conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        self.get_list(&format!("conversations/user/{user_id}")).await
    }

    /// The first page of a conversation, oldest message first. The backend
    /// may answer with a bare array or a page object.
    pub async fn messages(&self, conversation_id: i64) -> Result<Vec<Message>> {
        let size = MESSAGE_PAGE_SIZE.to_string();
        let page: Value = self
            .get_json_query(
                &format!("messages/conversation/{conversation_id}"),
                &[("page", "0"), ("size", size.as_str())],
            )
            .await?;
        let mut messages: Vec<Message> = match page {
            Value::Array(_) => serde_json::from_value(page)?,
            Value::Object(mut map) => match map.remove("content") {
                Some(content @ Value::Array(_)) => serde_json::from_value(content)?,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        messages.reverse();
        Ok(messages)
    }

    pub async fn send_text(
        &self,
        conversation_id: i64,
        sender_id: &str,
        text: &str,
    ) -> Result<Message> {
        let body = NewTextMessage {
            conversation_id,
            sender_id,
            message_text: text,
        };
        self.post_json("messages/text", &body).await
    }

    pub async fn mark_read(&self, conversation_id: i64, user_id: &str) -> Result<()> {
        self.put_query(
            &format!("conversations/{conversation_id}/read"),
            &[("userId", user_id.to_string())],
        )
        .await
    }

    /// Unread messages across all conversations; `0` if unavailable.
    pub async fn unread_count(&self, user_id: &str) -> i64 {
        match self
            .get_number(&format!("conversations/user/{user_id}/unread-count"))
            .await
        {
            Ok(count) => count as i64,
            Err(e) => {
                warn!(user_id, error = %e, "failed to fetch unread count");
                0
            }
        }
    }

    pub async fn requests_for_school(&self, school_id: i64) -> Result<Vec<ProjectRequest>> {
        self.get_list(&format!("ngo-project-requests/school/{school_id}"))
            .await
    }

    pub async fn requests_for_ngo_project(&self, ngo_project_id: i64) -> Result<Vec<ProjectRequest>> {
        self.get_list(&format!("ngo-project-requests/ngo-project/{ngo_project_id}"))
            .await
    }

    pub async fn respond_to_request(
        &self,
        request_id: i64,
        decision: RequestDecision,
        message: Option<&str>,
        user_id: &str,
    ) -> Result<Value> {
        let body = RequestResponse {
            response_message: message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or(decision.default_message()),
            responded_by_user_id: user_id,
        };
        self.post_json(
            &format!("ngo-project-requests/{request_id}/{}", decision.path_segment()),
            &body,
        )
        .await
    }
}

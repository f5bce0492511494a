//! Chat completion types.

use serde::{Deserialize, Serialize};

/// Message role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// User input.
    User,
    /// Model reply.
    Assistant,
}

/// A chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl Message {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// An instruction paired with the content it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    /// System instruction.
    pub instruction: String,
    /// Body content.
    pub content: String,
}

impl AnalysisRequest {
    /// Creates a request.
    pub fn new(content: impl Into<String>, instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            content: content.into(),
        }
    }

    /// Returns the two-message exchange sent to the completion endpoint.
    pub fn messages(&self) -> Vec<Message> {
        vec![
            Message::system(self.instruction.clone()),
            Message::user(self.content.clone()),
        ]
    }
}

/// Chat completion request body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model ID.
    pub model: String,
    /// Messages array.
    pub messages: Vec<Message>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output-length ceiling.
    pub max_tokens: u32,
}

/// Chat completion response.
///
/// Every level is optional so that a shape mismatch surfaces as a missing
/// reply instead of a decode error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    /// Response ID.
    #[serde(default)]
    pub id: Option<String>,
    /// Model used.
    #[serde(default)]
    pub model: Option<String>,
    /// Completion choices.
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ChatResponse {
    /// Returns the first choice's reply if it is non-empty.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()?
            .message
            .as_ref()?
            .content
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// A completion choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Choice {
    /// Choice index.
    #[serde(default)]
    pub index: u32,
    /// Reply message.
    #[serde(default)]
    pub message: Option<AssistantMessage>,
    /// Finish reason.
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Reply message inside a choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantMessage {
    /// Reply text.
    #[serde(default)]
    pub content: Option<String>,
}

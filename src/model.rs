//! Request, response and action value types.
//!
//! These mirror the wire format the client speaks: snake_case task fields,
//! camelCase request envelope keys (`chatHistory`, `timeBlocks`) and
//! adjacently tagged actions (`{"action_type": ..., "payload": ...}`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AssistantError, Result};

/// Generate a fresh identifier for a newly created entity.
#[must_use]
pub fn new_entity_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Task priority. Serialized as one of the bare strings `low`, `medium`, `high`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    /// Parse a priority the way models tend to write it.
    ///
    /// Accepts `"high"`, `"High"`, `"Priority.high"` and `"priority::HIGH"`.
    /// Anything else yields `None`.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let bare = trimmed
            .rsplit(['.', ':'])
            .next()
            .unwrap_or(trimmed)
            .trim()
            .to_ascii_lowercase();
        match bare.as_str() {
            "low" => Some(Self::Low),
            "medium" | "normal" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// The canonical wire string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A to-do item owned by the client.
///
/// Optional fields serialize as `null` rather than being omitted, so every
/// emitted task object carries the full field set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default = "Utc::now")]
    pub creation_date: DateTime<Utc>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub predicted_duration_in_minutes: Option<u32>,
}

impl Task {
    /// Create a brand-new, incomplete task with a fresh id and the current time.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            title: title.into(),
            description: None,
            is_completed: false,
            priority: None,
            creation_date: Utc::now(),
            deadline: None,
            predicted_duration_in_minutes: None,
        }
    }
}

/// A scheduled slot of time dedicated to an existing task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub id: String,
    pub task_id: String,
    pub start_time: DateTime<Utc>,
    pub duration_in_minutes: u32,
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Bot => f.write_str("bot"),
        }
    }
}

/// One entry of the chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default = "new_entity_id")]
    pub id: String,
    pub text: String,
    pub sender: Sender,
}

impl ChatMessage {
    /// A user-authored message with a fresh id.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            text: text.into(),
            sender: Sender::User,
        }
    }

    /// A bot-authored message with a fresh id.
    pub fn bot(text: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            text: text.into(),
            sender: Sender::Bot,
        }
    }
}

/// The full client state sent with every chat turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(rename = "chatHistory")]
    pub chat_history: Vec<ChatMessage>,
    #[serde(default, rename = "timeBlocks")]
    pub time_blocks: Vec<TimeBlock>,
}

impl ChatRequest {
    /// Build a request from tasks and a transcript, without time blocks.
    pub fn new(tasks: Vec<Task>, chat_history: Vec<ChatMessage>) -> Self {
        Self {
            tasks,
            chat_history,
            time_blocks: Vec::new(),
        }
    }

    /// Attach scheduled time blocks.
    #[must_use]
    pub fn with_time_blocks(mut self, time_blocks: Vec<TimeBlock>) -> Self {
        self.time_blocks = time_blocks;
        self
    }

    /// Check the transcript is non-empty and ends with a user message.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::InvalidRequest`] when either condition fails.
    pub fn validate(&self) -> Result<()> {
        match self.chat_history.last() {
            None => Err(AssistantError::InvalidRequest(
                "Chat history cannot be empty.".to_owned(),
            )),
            Some(last) if last.sender != Sender::User => Err(AssistantError::InvalidRequest(
                "The last chat message must be sent by the user.".to_owned(),
            )),
            Some(_) => Ok(()),
        }
    }

    /// The utterance being resolved: the text of the last message.
    #[must_use]
    pub fn utterance(&self) -> &str {
        self.chat_history.last().map_or("", |m| m.text.as_str())
    }

    /// Look up a task by id.
    #[must_use]
    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Look up a time block by id.
    #[must_use]
    pub fn time_block(&self, id: &str) -> Option<&TimeBlock> {
        self.time_blocks.iter().find(|b| b.id == id)
    }
}

/// The reply to one chat turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub chat_response: String,
    pub actions: Vec<Action>,
}

impl ChatResponse {
    pub fn new(chat_response: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            chat_response: chat_response.into(),
            actions,
        }
    }

    /// A reply with no actions.
    pub fn reply_only(chat_response: impl Into<String>) -> Self {
        Self::new(chat_response, Vec::new())
    }
}

/// A mutation the client applies to its local state, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", content = "payload")]
pub enum Action {
    #[serde(rename = "createTask")]
    CreateTask { task: Task },
    #[serde(rename = "updateTask")]
    UpdateTask {
        id: String,
        #[serde(rename = "updatedTask")]
        updated_task: Task,
    },
    #[serde(rename = "deleteTask")]
    DeleteTask { id: String },
    #[serde(rename = "toggleTaskCompletion")]
    ToggleTaskCompletion { id: String },
    #[serde(rename = "createTimeBlock")]
    CreateTimeBlock {
        task_id: String,
        start_time: DateTime<Utc>,
        duration_in_minutes: u32,
    },
    #[serde(rename = "updateTimeBlock")]
    UpdateTimeBlock {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_start_time: Option<DateTime<Utc>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        new_duration_in_minutes: Option<u32>,
    },
    #[serde(rename = "deleteTimeBlock")]
    DeleteTimeBlock { id: String },
}

impl Action {
    /// The `action_type` tag as it appears on the wire.
    #[must_use]
    pub fn action_type(&self) -> &'static str {
        match self {
            Self::CreateTask { .. } => "createTask",
            Self::UpdateTask { .. } => "updateTask",
            Self::DeleteTask { .. } => "deleteTask",
            Self::ToggleTaskCompletion { .. } => "toggleTaskCompletion",
            Self::CreateTimeBlock { .. } => "createTimeBlock",
            Self::UpdateTimeBlock { .. } => "updateTimeBlock",
            Self::DeleteTimeBlock { .. } => "deleteTimeBlock",
        }
    }
}

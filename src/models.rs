//! Core data models shared by the chat, CSV, and issue pipelines.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    Human,
    Ai,
}

impl Role {
    /// Role name on the Ollama chat wire format.
    pub fn wire_name(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::Human => "user",
            Role::Ai => "assistant",
        }
    }

    /// Label printed in the conversation summary table.
    pub fn label(self) -> &'static str {
        match self {
            Role::System => "SystemMessage",
            Role::Human => "HumanMessage",
            Role::Ai => "AIMessage",
        }
    }
}

/// One entry in a conversation transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            content: content.into(),
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: Role::Ai,
            content: content.into(),
        }
    }
}

/// A vector with its id and free-form metadata, ready for upsert.
#[derive(Debug, Clone, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Map<String, Value>,
}

impl VectorRecord {
    /// The chunk text carried in `metadata.text`, if any.
    pub fn text(&self) -> Option<&str> {
        self.metadata.get("text").and_then(Value::as_str)
    }
}

/// A single nearest-neighbour hit returned by a vector store.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl QueryMatch {
    pub fn text(&self) -> &str {
        self.metadata
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

/// The fields of a GitHub issue used to build documents.
///
/// Everything is optional: the puller writes issues verbatim, and older
/// dumps may lack fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Label {
    #[serde(default)]
    pub name: Option<String>,
}

/// An issue rendered as readable text, plus string-valued metadata.
#[derive(Debug, Clone)]
pub struct IssueDocument {
    pub content: String,
    pub metadata: Map<String, Value>,
}

impl IssueDocument {
    pub fn issue_id(&self) -> &str {
        self.metadata
            .get("issue_id")
            .and_then(Value::as_str)
            .unwrap_or("")
    }
}

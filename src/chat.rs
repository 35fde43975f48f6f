// Chat transcript state for the web UI: messages, the input buffer and the
// example-query shortcuts shown before the first message.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: Role, text: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            text,
        }
    }
}

/// A pre-filled query that submits itself when picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExampleQuery {
    pub label: &'static str,
    pub query: &'static str,
}

pub const EXAMPLE_QUERIES: &[ExampleQuery] = &[
    ExampleQuery {
        label: "I want to move to Toronto",
        query: "I want to move to Toronto",
    },
    ExampleQuery {
        label: "I'm a student moving to New York",
        query: "I'm a student moving to New York",
    },
    ExampleQuery {
        label: "How much would living in London with 2 kids cost?",
        query: "I want to move to London with 2 kids",
    },
];

#[derive(Debug, Default)]
pub struct ChatTranscript {
    pub messages: Vec<ChatMessage>,
    pub input_buffer: String,
}

impl ChatTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message. The transcript is append-only.
    pub fn push(&mut self, role: Role, text: String) -> &ChatMessage {
        self.messages.push(ChatMessage::new(role, text));
        &self.messages[self.messages.len() - 1]
    }

    /// Id of the newest message; the view keeps this one scrolled into sight.
    pub fn scroll_anchor(&self) -> Option<&str> {
        self.messages.last().map(|m| m.id.as_str())
    }

    /// Takes the trimmed input for the query handler and clears the buffer.
    /// Does nothing while `loading` or when the buffer is blank.
    pub fn submit(&mut self, loading: bool) -> Option<String> {
        if loading {
            return None;
        }
        let text = self.input_buffer.trim();
        if text.is_empty() {
            return None;
        }
        let text = text.to_string();
        self.input_buffer.clear();
        Some(text)
    }

    /// Fills the buffer with an example query and submits it.
    pub fn choose_example(&mut self, index: usize, loading: bool) -> Option<String> {
        let example = EXAMPLE_QUERIES.get(index)?;
        self.input_buffer = example.query.to_string();
        self.submit(loading)
    }

    /// Example shortcuts are only offered on an empty transcript.
    pub fn show_examples(&self) -> bool {
        self.messages.is_empty()
    }
}

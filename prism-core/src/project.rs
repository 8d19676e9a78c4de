//! Project records: one monolithic document plus chat and version history.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::vfs::{self, VirtualFile};

/// Name given to projects before their first prompt.
pub const UNTITLED_PROJECT: &str = "Untitled Project";

/// Assistant reply recorded when the generator fails.
pub const GENERATION_ERROR_MESSAGE: &str =
    "I'm sorry, I encountered an error while generating your app. Please try again.";

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: u64,
    /// Base64 image attached to a user prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
}

impl Message {
    pub fn user(content: impl Into<String>, attachment: Option<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: now_millis(),
            attachment,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: now_millis(),
            attachment: None,
        }
    }
}

/// Output of one successful generator call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub html: String,
    pub explanation: String,
}

/// A generated document kept in the version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedApp {
    pub html: String,
    pub explanation: String,
    pub timestamp: u64,
    /// 1-based position in the history.
    pub version: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub created_at: u64,
    pub updated_at: u64,
    pub messages: Vec<Message>,
    /// The monolithic document. Sole source of truth for the virtual files.
    pub current_code: String,
    pub history: Vec<GeneratedApp>,
}

impl Default for Project {
    fn default() -> Self {
        Self::new()
    }
}

impl Project {
    pub fn new() -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4(),
            name: UNTITLED_PROJECT.to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            current_code: String::new(),
            history: Vec::new(),
        }
    }

    /// Current virtual files, derived from the document on every call.
    pub fn files(&self) -> Vec<VirtualFile> {
        vfs::split(&self.current_code)
    }

    /// Current content of one virtual file.
    pub fn file_content(&self, file_name: &str) -> Option<String> {
        vfs::split(&self.current_code)
            .into_iter()
            .find(|file| file.name == file_name)
            .map(|file| file.content)
    }

    /// Merge a local edit into the document.
    ///
    /// Returns `true` if the document changed.
    pub fn edit_file(&mut self, file_name: &str, new_content: &str) -> bool {
        self.commit(vfs::merge(&self.current_code, file_name, new_content))
    }

    /// Merge an update received from another context. Same path as a local
    /// edit; the later of two updates to the same file wins.
    pub fn apply_remote(&mut self, file_name: &str, new_code: &str) -> bool {
        self.edit_file(file_name, new_code)
    }

    fn commit(&mut self, merged: String) -> bool {
        if merged == self.current_code {
            return false;
        }
        self.current_code = merged;
        self.updated_at = now_millis();
        true
    }

    /// Record the outcome of one generator call, successful or not.
    ///
    /// Returns `true` if the document changed.
    pub fn record_generation<E>(
        &mut self,
        prompt: &str,
        attachment: Option<String>,
        result: &Result<Generation, E>,
    ) -> bool {
        match result {
            Ok(generation) => {
                let changed = generation.html != self.current_code;
                self.commit_generation(prompt, attachment, generation);
                changed
            }
            Err(_) => {
                self.record_failed_generation(prompt, attachment);
                false
            }
        }
    }

    /// Record a successful generation: both chat entries, a history entry,
    /// the new document, and a name derived from the first prompt.
    pub fn commit_generation(
        &mut self,
        prompt: &str,
        attachment: Option<String>,
        generation: &Generation,
    ) {
        if self.messages.is_empty() && self.name == UNTITLED_PROJECT {
            self.name = derive_name(prompt);
        }

        let version = self.history.len() as u32 + 1;
        self.messages.push(Message::user(prompt, attachment));
        self.messages.push(Message::assistant(generation.explanation.clone()));
        self.history.push(GeneratedApp {
            html: generation.html.clone(),
            explanation: generation.explanation.clone(),
            timestamp: now_millis(),
            version,
        });
        self.current_code = generation.html.clone();
        self.updated_at = now_millis();
    }

    /// Record a failed generation. The document is left as it was.
    pub fn record_failed_generation(&mut self, prompt: &str, attachment: Option<String>) {
        self.messages.push(Message::user(prompt, attachment));
        self.messages.push(Message::assistant(GENERATION_ERROR_MESSAGE));
    }

    /// Make an earlier version current again.
    pub fn restore_version(&mut self, version: u32) -> bool {
        let Some(entry) = self.history.iter().find(|app| app.version == version) else {
            return false;
        };
        let html = entry.html.clone();
        self.commit(html)
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.updated_at = now_millis();
    }
}

/// First four words of the prompt followed by an ellipsis.
fn derive_name(prompt: &str) -> String {
    let words: Vec<&str> = prompt.split(' ').take(4).collect();
    format!("{}...", words.join(" "))
}

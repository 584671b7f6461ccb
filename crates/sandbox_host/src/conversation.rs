//! Conversation transcript entries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
    /// Correction generated from a sandbox failure event.
    SystemError,
    /// Local failure, such as an agent call that errored.
    Error,
}

impl Role {
    /// Whether entries with this role are part of the history sent to the agent.
    pub const fn is_agent_visible(self) -> bool {
        matches!(self, Self::User | Self::Model)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content)
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self::new(Role::Error, content)
    }

    /// Correction shown after the sandbox rejected a script.
    pub fn correction(reason: &str) -> Self {
        Self::new(
            Role::SystemError,
            format!(
                "System Correction: Your previous script failed because it did not follow the \
                 required format.\n\nReason: {reason}\n\nPlease try the action again, making sure \
                 your script starts with the comment\n// Target App: <app-id>\n."
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn roles_use_snake_case_tags() {
        let raw = serde_json::to_value(ConversationMessage::correction("no target"))
            .expect("serialize");
        assert_eq!(raw["role"], "system_error");
        assert!(raw["content"]
            .as_str()
            .expect("content")
            .contains("Reason: no target"));
    }

    #[test]
    fn only_user_and_model_reach_the_agent() {
        assert!(Role::User.is_agent_visible());
        assert!(Role::Model.is_agent_visible());
        assert!(!Role::SystemError.is_agent_visible());
        assert!(!Role::Error.is_agent_visible());
    }
}

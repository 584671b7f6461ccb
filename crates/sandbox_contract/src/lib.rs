//! Shared wire contract between the host process and the sandboxed app surface.
//!
//! Every interaction between the two sides is an envelope of shape `{ "type", "payload" }`
//! carried over the [`channel`] endpoints. This crate is runtime-agnostic: it defines the app
//! identifiers, app definitions and envelope enums without depending on the window manager or
//! the host controller.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod channel;

use serde::{Deserialize, Serialize};

pub use channel::{channel, ChannelError, Endpoint, HostEndpoint, Received, SandboxEndpoint};

/// Longest accepted app identifier.
pub const MAX_APP_ID_LEN: usize = 120;

/// Stable identifier for one agent-authored app and its window.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AppId(String);

impl AppId {
    /// Returns an app identifier when `raw` looks like a markup element id.
    pub fn new(raw: impl Into<String>) -> Result<Self, String> {
        let raw = raw.into();
        if is_valid_app_id(&raw) {
            Ok(Self(raw))
        } else {
            Err(format!(
                "invalid app id `{raw}`; expected letters, digits, `-`, `_`, `:` or `.`"
            ))
        }
    }

    /// Creates an id without validation for runtime-generated values.
    pub fn trusted(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Builds the runtime-assigned id for the `sequence`-th generated window.
    pub fn generated(sequence: u64) -> Self {
        Self(format!("app-{sequence}"))
    }

    /// Returns the string form of the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn is_valid_app_id(raw: &str) -> bool {
    if raw.is_empty() || raw.len() > MAX_APP_ID_LEN {
        return false;
    }
    let starts_alpha = raw
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic())
        .unwrap_or(false);
    starts_alpha
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
}

/// Visual definition of a new app as authored by the agent.
///
/// The untagged form accepts either a bare markup string or a `{ title, html }` object, which
/// is the shape used by both `ADD_APP` and `RESTORE_APPS` payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AppDefinition {
    /// Markup with an explicit display title.
    Titled {
        /// Window title.
        title: String,
        /// App body markup (may embed `<style>` and `<script>` elements).
        #[serde(alias = "bodyMarkup", alias = "body_markup")]
        html: String,
    },
    /// Self-describing markup; id, title and geometry are read from the root element.
    Markup(String),
}

impl AppDefinition {
    /// Creates a markup-only definition.
    pub fn markup(html: impl Into<String>) -> Self {
        Self::Markup(html.into())
    }

    /// Creates a definition with an explicit title.
    pub fn titled(title: impl Into<String>, html: impl Into<String>) -> Self {
        Self::Titled {
            title: title.into(),
            html: html.into(),
        }
    }

    /// Returns the markup body.
    pub fn html(&self) -> &str {
        match self {
            Self::Titled { html, .. } => html,
            Self::Markup(html) => html,
        }
    }

    /// Returns the explicit title when one was supplied.
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Titled { title, .. } => Some(title),
            Self::Markup(_) => None,
        }
    }
}

/// Commands the host posts to the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostCommand {
    /// Mount a new app window.
    AddApp(AppDefinition),
    /// Dispatch an interaction script to its target app.
    RunScript(String),
    /// Wipe every window, icon, readiness entry and queued script.
    Clear,
    /// Mount each definition in list order.
    RestoreApps(Vec<AppDefinition>),
}

impl HostCommand {
    /// Stable envelope type tag for logging.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AddApp(_) => "ADD_APP",
            Self::RunScript(_) => "RUN_SCRIPT",
            Self::Clear => "CLEAR",
            Self::RestoreApps(_) => "RESTORE_APPS",
        }
    }
}

/// Events the sandbox posts back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SandboxEvent {
    /// The sandbox finished booting and accepts commands.
    #[serde(rename = "IFRAME_READY")]
    SandboxReady,
    /// An interaction script could not be routed to an app.
    InteractionFailed {
        /// Human-readable explanation for the agent.
        reason: String,
    },
}

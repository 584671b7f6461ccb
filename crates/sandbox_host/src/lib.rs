//! Host side of the agent sandbox: reply extraction, the readiness-gated sandbox controller,
//! the conversation transcript and its durable session storage.
//!
//! The host never reaches into sandbox state. Everything it does travels as `HostCommand`
//! envelopes over a [`sandbox_contract::HostEndpoint`], and everything it learns arrives as
//! `SandboxEvent` envelopes.

#![warn(rustdoc::broken_intra_doc_links)]

pub mod config;
pub mod controller;
pub mod conversation;
pub mod extract;
pub mod session;
pub mod storage;

pub use config::{ConfigError, ConfigLoader, HostConfig, DEFAULT_ACKNOWLEDGEMENT};
pub use controller::SandboxController;
pub use conversation::{ConversationMessage, Role};
pub use extract::{extract_response, ExtractedResponse, ResponseExtractor};
pub use session::HostSession;
pub use storage::{
    load_installed_apps, load_transcript, save_installed_apps, save_transcript, KeyValueFuture,
    KeyValueStore, MemoryKeyValueStore, StorageError,
};

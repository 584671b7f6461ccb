//! Sandbox side of the app surface: window manager, readiness registry and script dispatch.
//!
//! [`Sandbox`] owns all state and is driven by its embedder through [`Sandbox::pump`] for host
//! envelopes and [`Sandbox::dispatch`] for pointer and chrome events. Window-manager transitions
//! are pure and live in [`reducer`] so they can be tested without a channel.

pub mod app_runtime;
pub mod config;
pub mod dispatcher;
pub mod executor;
pub mod markup;
pub mod model;
pub mod reducer;
pub mod sandbox;
pub mod window_manager;

pub use app_runtime::AppRuntimeState;
pub use config::{ConfigError, SandboxConfig, Size, UntargetedScripts};
pub use dispatcher::{resolve_target, ResolveError, ResolvedTarget, TargetSource};
pub use executor::{
    ExecutedScript, NoopScriptExecutor, ReadyNotifier, RecordingScriptExecutor, ScriptExecutor,
    ScriptFault, ScriptRun, ScriptScope,
};
pub use model::*;
pub use reducer::{reduce_sandbox, ReducerError, RuntimeEffect, SandboxAction};
pub use sandbox::Sandbox;

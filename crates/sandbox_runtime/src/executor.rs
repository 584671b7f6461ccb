//! Script execution boundary.
//!
//! The sandbox never interprets script text itself. An embedder supplies a [`ScriptExecutor`]
//! that runs source against one app's document, and scripts report readiness through the
//! [`ReadyNotifier`] in their [`ScriptScope`].

use std::{cell::RefCell, rc::Rc, sync::OnceLock};

use futures::channel::mpsc::UnboundedSender;
use regex::Regex;
use sandbox_contract::AppId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Event name apps dispatch once their init script has wired the UI.
pub const APP_READY_EVENT: &str = "app-ready";

/// Sandbox-internal notifications. These never cross the host channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InternalSignal {
    /// An app finished initializing.
    AppReady(AppId),
}

/// Handle scripts use to announce that an app is ready.
#[derive(Debug, Clone)]
pub struct ReadyNotifier {
    tx: UnboundedSender<InternalSignal>,
}

impl ReadyNotifier {
    pub(crate) fn new(tx: UnboundedSender<InternalSignal>) -> Self {
        Self { tx }
    }

    /// Queues a readiness signal. It is processed on a later sandbox turn, never inline.
    pub fn notify(&self, app_id: AppId) {
        if self
            .tx
            .unbounded_send(InternalSignal::AppReady(app_id))
            .is_err()
        {
            tracing::debug!("ready signal dropped: sandbox loop is gone");
        }
    }
}

/// Where a script came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptRun {
    /// Embedded in the app markup; runs once when the window mounts.
    Init,
    /// Sent by the host as a `RUN_SCRIPT` command.
    Interaction,
}

/// What a script may touch while it runs: its own app and the ready notifier.
pub struct ScriptScope<'a> {
    app_id: &'a AppId,
    title: &'a str,
    content: &'a mut String,
    notifier: &'a ReadyNotifier,
}

impl<'a> ScriptScope<'a> {
    pub(crate) fn new(
        app_id: &'a AppId,
        title: &'a str,
        content: &'a mut String,
        notifier: &'a ReadyNotifier,
    ) -> Self {
        Self {
            app_id,
            title,
            content,
            notifier,
        }
    }

    pub fn app_id(&self) -> &AppId {
        self.app_id
    }

    pub fn title(&self) -> &str {
        self.title
    }

    /// Current document markup of the app.
    pub fn content(&self) -> &str {
        self.content.as_str()
    }

    /// Mutable document markup, for executors that apply DOM changes back to the window.
    pub fn content_mut(&mut self) -> &mut String {
        self.content
    }

    /// Announces readiness for the app in scope.
    pub fn signal_ready(&self) {
        self.notifier.notify(self.app_id.clone());
    }

    /// Announces readiness for the app named in an `app-ready` event detail.
    pub fn signal_ready_for(&self, app_id: AppId) {
        self.notifier.notify(app_id);
    }
}

/// Failures raised by a script. They are logged and never stop the sandbox loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScriptFault {
    #[error("script raised: {0}")]
    Raised(String),
    #[error("script panicked: {0}")]
    Panicked(String),
}

/// Runs script source inside one app's scope.
pub trait ScriptExecutor {
    /// Executes `source` for the app in `scope`.
    ///
    /// # Errors
    ///
    /// Returns a [`ScriptFault`] when the script raises.
    fn execute(
        &mut self,
        run: ScriptRun,
        source: &str,
        scope: &mut ScriptScope<'_>,
    ) -> Result<(), ScriptFault>;
}

/// Executor that accepts every script and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScriptExecutor;

impl ScriptExecutor for NoopScriptExecutor {
    fn execute(
        &mut self,
        _run: ScriptRun,
        _source: &str,
        _scope: &mut ScriptScope<'_>,
    ) -> Result<(), ScriptFault> {
        Ok(())
    }
}

/// One script run observed by [`RecordingScriptExecutor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedScript {
    pub run: ScriptRun,
    pub app_id: AppId,
    pub source: String,
}

fn ready_dispatch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(&format!(
            r#"(?s)['"]{APP_READY_EVENT}['"].*?appId\s*:\s*['"]([^'"]+)['"]"#
        ))
        .expect("ready dispatch pattern is valid")
    })
}

/// Executor that records every run instead of executing it.
///
/// Init scripts that dispatch `app-ready` with a literal `appId` are honored, so readiness
/// flows the same way it does with a real document. Any script containing the configured
/// failure marker raises.
#[derive(Debug, Clone, Default)]
pub struct RecordingScriptExecutor {
    log: Rc<RefCell<Vec<ExecutedScript>>>,
    fail_marker: Option<String>,
}

impl RecordingScriptExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes scripts containing `marker` raise after being recorded.
    pub fn failing_on(mut self, marker: impl Into<String>) -> Self {
        self.fail_marker = Some(marker.into());
        self
    }

    /// Snapshot of runs so far, oldest first. Clones share one log.
    pub fn executed(&self) -> Vec<ExecutedScript> {
        self.log.borrow().clone()
    }

    /// Sources run for `app_id`, oldest first.
    pub fn sources_for(&self, app_id: &AppId) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter(|entry| &entry.app_id == app_id)
            .map(|entry| entry.source.clone())
            .collect()
    }
}

impl ScriptExecutor for RecordingScriptExecutor {
    fn execute(
        &mut self,
        run: ScriptRun,
        source: &str,
        scope: &mut ScriptScope<'_>,
    ) -> Result<(), ScriptFault> {
        self.log.borrow_mut().push(ExecutedScript {
            run,
            app_id: scope.app_id().clone(),
            source: source.to_string(),
        });

        if let Some(marker) = &self.fail_marker {
            if source.contains(marker.as_str()) {
                return Err(ScriptFault::Raised(format!("hit `{marker}`")));
            }
        }

        for caps in ready_dispatch_pattern().captures_iter(source) {
            if let Some(Ok(app_id)) = caps.get(1).map(|m| AppId::new(m.as_str())) {
                scope.signal_ready_for(app_id);
            }
        }
        Ok(())
    }
}

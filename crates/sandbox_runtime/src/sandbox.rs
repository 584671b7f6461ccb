//! The sandbox event loop: host commands in, window-manager transitions, script dispatch and
//! readiness tracking, failure events out.

use std::panic::{catch_unwind, AssertUnwindSafe};

use futures::{
    channel::mpsc::{unbounded, UnboundedReceiver},
    FutureExt, StreamExt,
};
use sandbox_contract::{
    AppDefinition, AppId, ChannelError, HostCommand, Received, SandboxEndpoint, SandboxEvent,
};
use tracing::{debug, info, warn};

use crate::{
    app_runtime::AppRuntimeState,
    config::{SandboxConfig, UntargetedScripts},
    dispatcher::{resolve_target, ResolvedTarget, TargetSource},
    executor::{InternalSignal, ReadyNotifier, ScriptExecutor, ScriptFault, ScriptRun, ScriptScope},
    markup::{init_scripts, request_from_definition},
    model::{PointerInteraction, SandboxState},
    reducer::{reduce_sandbox, ReducerError, RuntimeEffect, SandboxAction},
};

/// Sandbox side of the system, driven one turn at a time by its embedder.
pub struct Sandbox<E> {
    config: SandboxConfig,
    state: SandboxState,
    interaction: PointerInteraction,
    apps: AppRuntimeState,
    executor: E,
    endpoint: SandboxEndpoint,
    notifier: ReadyNotifier,
    signals: UnboundedReceiver<InternalSignal>,
}

impl<E: ScriptExecutor> Sandbox<E> {
    pub fn new(endpoint: SandboxEndpoint, executor: E, config: SandboxConfig) -> Self {
        let (tx, signals) = unbounded();
        Self {
            state: SandboxState::new(config.base_z_order),
            interaction: PointerInteraction::default(),
            apps: AppRuntimeState::default(),
            notifier: ReadyNotifier::new(tx),
            config,
            executor,
            endpoint,
            signals,
        }
    }

    /// Announces to the host that the sandbox can accept commands.
    ///
    /// # Errors
    ///
    /// Fails when the host endpoint is gone.
    pub fn boot(&self) -> Result<(), ChannelError> {
        info!("sandbox booted");
        self.endpoint.post(&SandboxEvent::SandboxReady)
    }

    pub fn state(&self) -> &SandboxState {
        &self.state
    }

    pub fn interaction(&self) -> &PointerInteraction {
        &self.interaction
    }

    pub fn apps(&self) -> &AppRuntimeState {
        &self.apps
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Handle for posting readiness from outside a script run.
    pub fn ready_notifier(&self) -> ReadyNotifier {
        self.notifier.clone()
    }

    /// Processes every queued host envelope and readiness signal.
    ///
    /// Readiness signals raised while handling one envelope are processed before the next
    /// envelope. Returns the number of host envelopes handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            self.drain_signals();
            match self.endpoint.try_recv() {
                Received::Message(command) => {
                    handled += 1;
                    self.handle_command(command);
                }
                Received::Unrecognized(raw) => {
                    handled += 1;
                    debug!(envelope = %raw, "ignoring unrecognized host envelope");
                }
                Received::Empty => break,
                Received::Closed => {
                    debug!("host endpoint closed");
                    break;
                }
            }
        }
        self.drain_signals();
        handled
    }

    /// Applies one host command.
    pub fn handle_command(&mut self, command: HostCommand) {
        debug!(kind = command.kind(), "host command");
        match command {
            HostCommand::AddApp(definition) => self.add_app(&definition),
            HostCommand::RestoreApps(definitions) => {
                for definition in &definitions {
                    self.add_app(definition);
                }
            }
            HostCommand::RunScript(script) => self.dispatch_script(script),
            HostCommand::Clear => self.dispatch(SandboxAction::Clear),
        }
    }

    /// Applies a user-originated window-manager action such as a pointer or chrome event.
    pub fn dispatch(&mut self, action: SandboxAction) {
        match reduce_sandbox(&mut self.state, &mut self.interaction, &self.config, action) {
            Ok(effects) => {
                for effect in effects {
                    self.run_runtime_effect(effect);
                }
            }
            Err(err @ ReducerError::DuplicateWindow(_)) => warn!("sandbox reducer error: {err}"),
            Err(err @ ReducerError::WindowNotFound(_)) => debug!("sandbox reducer error: {err}"),
        }
    }

    /// Records readiness for `app_id` and runs its queued scripts in arrival order.
    ///
    /// Signals for apps without a live window are ignored.
    pub fn mark_ready(&mut self, app_id: &AppId) {
        if self.state.window(app_id).is_none() {
            debug!(app = %app_id, "ready signal for unknown app ignored");
            return;
        }
        let queued = self.apps.mark_ready(app_id);
        if !queued.is_empty() {
            debug!(app = %app_id, count = queued.len(), "flushing queued scripts");
        }
        for script in queued {
            self.execute(app_id, ScriptRun::Interaction, &script);
        }
    }

    /// Routes an interaction script to its target app.
    ///
    /// Unroutable scripts produce exactly one `INTERACTION_FAILED` event. Scripts for an app
    /// without a live window are dropped.
    pub fn dispatch_script(&mut self, script: String) {
        let target = match resolve_target(&script, |id| self.state.window(id).is_some()) {
            Ok(target) => target,
            Err(err) => match self.fallback_target() {
                Some(target) => target,
                None => {
                    warn!("script rejected: {err}");
                    self.report_failure(err.to_string());
                    return;
                }
            },
        };

        let app_id = target.app_id;
        if self.state.window(&app_id).is_none() {
            debug!(app = %app_id, "script target is not open; dropping script");
            return;
        }
        if self.apps.is_ready(&app_id) {
            self.execute(&app_id, ScriptRun::Interaction, &script);
        } else {
            debug!(app = %app_id, "app not ready; queueing script");
            self.apps.enqueue(&app_id, script);
        }
    }

    fn fallback_target(&self) -> Option<ResolvedTarget> {
        if self.config.untargeted_scripts != UntargetedScripts::MostRecentWindow {
            return None;
        }
        let app_id = self.state.frontmost_window_id()?.clone();
        warn!(app = %app_id, "untargeted script routed to frontmost window (deprecated)");
        Some(ResolvedTarget {
            app_id,
            source: TargetSource::MostRecentWindow,
        })
    }

    fn add_app(&mut self, definition: &AppDefinition) {
        self.dispatch(SandboxAction::CreateWindow(request_from_definition(
            definition,
        )));
    }

    fn run_runtime_effect(&mut self, effect: RuntimeEffect) {
        match effect {
            RuntimeEffect::WindowMounted(app_id) => self.run_init_scripts(&app_id),
            RuntimeEffect::ForgetApp(app_id) => self.apps.forget(&app_id),
            RuntimeEffect::ResetApps => {
                self.apps.clear();
                // Signals raised by apps that no longer exist must not leak into the next session.
                while let Some(Some(_)) = self.signals.next().now_or_never() {}
            }
        }
    }

    fn run_init_scripts(&mut self, app_id: &AppId) {
        let Some(window) = self.state.window(app_id) else {
            return;
        };
        let scripts = init_scripts(&window.content);
        if scripts.is_empty() {
            if self.config.auto_ready_without_script {
                self.notifier.notify(app_id.clone());
            }
            return;
        }
        for script in scripts {
            self.execute(app_id, ScriptRun::Init, &script);
        }
    }

    fn drain_signals(&mut self) {
        while let Some(Some(signal)) = self.signals.next().now_or_never() {
            match signal {
                InternalSignal::AppReady(app_id) => self.mark_ready(&app_id),
            }
        }
    }

    fn execute(&mut self, app_id: &AppId, run: ScriptRun, source: &str) {
        let Some(window) = self.state.windows.get_mut(app_id) else {
            return;
        };
        let executor = &mut self.executor;
        let notifier = &self.notifier;
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut scope = ScriptScope::new(&window.id, &window.title, &mut window.content, notifier);
            executor.execute(run, source, &mut scope)
        }))
        .unwrap_or_else(|payload| Err(ScriptFault::Panicked(panic_message(payload.as_ref()))));

        if let Err(fault) = outcome {
            warn!(app = %app_id, ?run, "script fault: {fault}");
        }
    }

    fn report_failure(&self, reason: String) {
        if let Err(err) = self
            .endpoint
            .post(&SandboxEvent::InteractionFailed { reason })
        {
            warn!("interaction failure report not delivered: {err}");
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

//! Durable host session: the conversation transcript and the apps installed in the sandbox.
//!
//! Both lists are written to the [`KeyValueStore`] after every mutation and read back at
//! startup. When the sandbox announces readiness the installed apps are replayed with
//! `RESTORE_APPS`.

use sandbox_contract::{AppDefinition, HostCommand, SandboxEvent};
use tracing::warn;

use crate::{
    config::HostConfig,
    controller::SandboxController,
    conversation::ConversationMessage,
    extract::{ExtractedResponse, ResponseExtractor},
    storage::{
        load_installed_apps, load_transcript, save_installed_apps, save_transcript, KeyValueStore,
    },
};

pub struct HostSession<S> {
    store: S,
    config: HostConfig,
    extractor: ResponseExtractor,
    transcript: Vec<ConversationMessage>,
    installed_apps: Vec<AppDefinition>,
}

impl<S: KeyValueStore> HostSession<S> {
    /// Reads the persisted transcript and apps. Unreadable entries start empty.
    pub async fn load(store: S, config: HostConfig) -> Self {
        let transcript = load_transcript(&store, &config.transcript_key)
            .await
            .unwrap_or_else(|err| {
                warn!("transcript load failed: {err}");
                Vec::new()
            });
        let installed_apps = load_installed_apps(&store, &config.apps_key)
            .await
            .unwrap_or_else(|err| {
                warn!("installed apps load failed: {err}");
                Vec::new()
            });

        let mut session = Self {
            extractor: ResponseExtractor::from_config(&config),
            store,
            config,
            transcript,
            installed_apps,
        };
        session.trim_transcript();
        session
    }

    pub fn transcript(&self) -> &[ConversationMessage] {
        &self.transcript
    }

    pub fn installed_apps(&self) -> &[AppDefinition] {
        &self.installed_apps
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Transcript entries sent to the agent: user and model turns only.
    pub fn agent_history(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.transcript
            .iter()
            .filter(|message| message.role.is_agent_visible())
    }

    pub async fn push_user_message(&mut self, content: impl Into<String>) {
        self.push(ConversationMessage::user(content));
        self.persist_transcript().await;
    }

    /// Records a failed agent call as an `error` entry.
    pub async fn record_agent_error(&mut self, message: impl Into<String>) {
        self.push(ConversationMessage::error(message));
        self.persist_transcript().await;
    }

    /// Splits an agent reply, records its narrative and forwards any app and script.
    ///
    /// New apps are persisted immediately. While the sandbox is not ready they are not sent
    /// on their own; the restore on readiness carries them.
    pub async fn apply_agent_turn(
        &mut self,
        controller: &mut SandboxController,
        reply: &str,
    ) -> ExtractedResponse {
        let extracted = self.extractor.extract(reply);
        self.push(ConversationMessage::model(extracted.narrative_text.clone()));
        self.persist_transcript().await;

        if let Some(app) = extracted.app_definition() {
            self.installed_apps.push(app.clone());
            self.persist_apps().await;
            if controller.is_ready() {
                send_logged(controller, HostCommand::AddApp(app));
            }
        }
        if let Some(script) = &extracted.script {
            send_logged(controller, HostCommand::RunScript(script.clone()));
        }
        extracted
    }

    /// Empties the transcript and installed apps and clears the sandbox.
    pub async fn clear_conversation(&mut self, controller: &mut SandboxController) {
        self.transcript.clear();
        self.installed_apps.clear();
        self.persist_transcript().await;
        self.persist_apps().await;
        send_logged(controller, HostCommand::Clear);
    }

    /// Replays installed apps into a freshly ready sandbox.
    ///
    /// Call this before the controller handles the readiness event, so the restore precedes
    /// any held script.
    pub fn on_sandbox_ready(&self, controller: &mut SandboxController) {
        if !self.installed_apps.is_empty() {
            send_logged(
                controller,
                HostCommand::RestoreApps(self.installed_apps.clone()),
            );
        }
    }

    /// Handles every queued sandbox event and appends resulting corrections to the transcript.
    pub async fn pump(&mut self, controller: &mut SandboxController) -> Vec<SandboxEvent> {
        let mut events = Vec::new();
        while let Some(event) = controller.recv_event() {
            if event == SandboxEvent::SandboxReady {
                self.on_sandbox_ready(controller);
            }
            controller.handle_event(&event);
            events.push(event);
        }

        let corrections = controller.drain_corrections();
        if !corrections.is_empty() {
            for correction in corrections {
                self.push(correction);
            }
            self.persist_transcript().await;
        }
        events
    }

    fn push(&mut self, message: ConversationMessage) {
        self.transcript.push(message);
        self.trim_transcript();
    }

    fn trim_transcript(&mut self) {
        let limit = self.config.max_transcript.max(1);
        if self.transcript.len() > limit {
            let excess = self.transcript.len() - limit;
            self.transcript.drain(..excess);
        }
    }

    async fn persist_transcript(&self) {
        if let Err(err) =
            save_transcript(&self.store, &self.config.transcript_key, &self.transcript).await
        {
            warn!("persist transcript failed: {err}");
        }
    }

    async fn persist_apps(&self) {
        if let Err(err) =
            save_installed_apps(&self.store, &self.config.apps_key, &self.installed_apps).await
        {
            warn!("persist installed apps failed: {err}");
        }
    }
}

fn send_logged(controller: &mut SandboxController, command: HostCommand) {
    let kind = command.kind();
    if let Err(err) = controller.send(command) {
        warn!(kind, "command not delivered: {err}");
    }
}

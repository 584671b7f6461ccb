//! Host side of the channel: gates outbound commands on sandbox readiness and turns failure
//! events into correction messages.

use sandbox_contract::{
    AppDefinition, ChannelError, HostCommand, HostEndpoint, Received, SandboxEvent,
};
use tracing::{debug, info, warn};

use crate::conversation::ConversationMessage;

/// Commands held while the sandbox has not announced readiness, one slot per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct PendingCommands {
    clear: bool,
    restore: Option<Vec<AppDefinition>>,
    add: Option<AppDefinition>,
    script: Option<String>,
}

impl PendingCommands {
    fn hold(&mut self, command: HostCommand) {
        match command {
            HostCommand::Clear => {
                // Anything held so far would be wiped by the clear anyway.
                *self = Self {
                    clear: true,
                    ..Self::default()
                };
            }
            HostCommand::RestoreApps(apps) => self.restore = Some(apps),
            HostCommand::AddApp(app) => self.add = Some(app),
            HostCommand::RunScript(script) => self.script = Some(script),
        }
    }

    /// Held commands in flush order.
    fn take(&mut self) -> Vec<HostCommand> {
        let pending = std::mem::take(self);
        let mut commands = Vec::new();
        if pending.clear {
            commands.push(HostCommand::Clear);
        }
        commands.extend(pending.restore.map(HostCommand::RestoreApps));
        commands.extend(pending.add.map(HostCommand::AddApp));
        commands.extend(pending.script.map(HostCommand::RunScript));
        commands
    }

    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct SandboxController {
    endpoint: HostEndpoint,
    ready: bool,
    pending: PendingCommands,
    corrections: Vec<ConversationMessage>,
}

impl SandboxController {
    pub fn new(endpoint: HostEndpoint) -> Self {
        Self {
            endpoint,
            ready: false,
            pending: PendingCommands::default(),
            corrections: Vec::new(),
        }
    }

    /// Whether the sandbox has announced readiness.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Posts `command` now, or holds it until the sandbox is ready.
    ///
    /// While held, a later command of the same kind replaces the earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError`] when posting to a ready sandbox fails.
    pub fn send(&mut self, command: HostCommand) -> Result<(), ChannelError> {
        if self.ready {
            debug!(kind = command.kind(), "posting command");
            self.endpoint.post(&command)
        } else {
            debug!(kind = command.kind(), "sandbox not ready; holding command");
            self.pending.hold(command);
            Ok(())
        }
    }

    /// Takes the next inbound event without handling it. Unknown envelopes are skipped.
    pub fn recv_event(&mut self) -> Option<SandboxEvent> {
        loop {
            match self.endpoint.try_recv() {
                Received::Message(event) => return Some(event),
                Received::Unrecognized(raw) => {
                    debug!(envelope = %raw, "ignoring unrecognized sandbox envelope");
                }
                Received::Empty | Received::Closed => return None,
            }
        }
    }

    /// Applies one sandbox event.
    pub fn handle_event(&mut self, event: &SandboxEvent) {
        match event {
            SandboxEvent::SandboxReady => {
                if self.ready {
                    info!("sandbox announced readiness again");
                }
                self.ready = true;
                self.flush();
            }
            SandboxEvent::InteractionFailed { reason } => {
                warn!("sandbox rejected script: {reason}");
                self.corrections
                    .push(ConversationMessage::correction(reason));
            }
        }
    }

    /// Receives and handles every queued event, returning them in arrival order.
    pub fn poll_inbound(&mut self) -> Vec<SandboxEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv_event() {
            self.handle_event(&event);
            events.push(event);
        }
        events
    }

    /// Correction messages produced since the last call.
    pub fn drain_corrections(&mut self) -> Vec<ConversationMessage> {
        std::mem::take(&mut self.corrections)
    }

    fn flush(&mut self) {
        for command in self.pending.take() {
            if let Err(err) = self.endpoint.post(&command) {
                warn!(kind = command.kind(), "held command not delivered: {err}");
            }
        }
    }
}

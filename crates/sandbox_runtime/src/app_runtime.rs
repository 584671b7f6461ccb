//! App readiness registry and per-app script queues owned by the sandbox loop.

use std::collections::{BTreeSet, HashMap, VecDeque};

use sandbox_contract::AppId;

/// Readiness and pending-script state for every app in the current sandbox session.
#[derive(Debug, Default)]
pub struct AppRuntimeState {
    ready: BTreeSet<AppId>,
    queues: HashMap<AppId, VecDeque<String>>,
}

impl AppRuntimeState {
    pub fn is_ready(&self, app_id: &AppId) -> bool {
        self.ready.contains(app_id)
    }

    /// Records readiness and hands back the scripts queued for `app_id`, oldest first.
    ///
    /// The queue entry is gone once this returns, whatever happens to the scripts.
    pub fn mark_ready(&mut self, app_id: &AppId) -> Vec<String> {
        self.ready.insert(app_id.clone());
        self.queues
            .remove(app_id)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Appends `script` to the queue for `app_id`, creating the queue on first use.
    pub fn enqueue(&mut self, app_id: &AppId, script: String) {
        self.queues.entry(app_id.clone()).or_default().push_back(script);
    }

    pub fn queued_len(&self, app_id: &AppId) -> usize {
        self.queues.get(app_id).map(VecDeque::len).unwrap_or(0)
    }

    /// Drops readiness and pending scripts for a closed app.
    pub fn forget(&mut self, app_id: &AppId) {
        self.ready.remove(app_id);
        self.queues.remove(app_id);
    }

    pub fn clear(&mut self) {
        self.ready.clear();
        self.queues.clear();
    }

    pub fn ready_apps(&self) -> impl Iterator<Item = &AppId> {
        self.ready.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.queues.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn id(raw: &str) -> AppId {
        AppId::trusted(raw)
    }

    #[test]
    fn mark_ready_drains_queue_in_fifo_order() {
        let mut runtime = AppRuntimeState::default();
        runtime.enqueue(&id("calc"), "one()".to_string());
        runtime.enqueue(&id("calc"), "two()".to_string());
        runtime.enqueue(&id("notes"), "other()".to_string());

        assert!(!runtime.is_ready(&id("calc")));
        let drained = runtime.mark_ready(&id("calc"));
        assert_eq!(drained, vec!["one()".to_string(), "two()".to_string()]);
        assert!(runtime.is_ready(&id("calc")));
        assert_eq!(runtime.queued_len(&id("calc")), 0);
        assert_eq!(runtime.queued_len(&id("notes")), 1);
        assert!(runtime.mark_ready(&id("calc")).is_empty());
    }

    #[test]
    fn forget_discards_readiness_and_pending_scripts() {
        let mut runtime = AppRuntimeState::default();
        runtime.enqueue(&id("calc"), "late()".to_string());
        runtime.forget(&id("calc"));
        assert!(runtime.mark_ready(&id("calc")).is_empty());

        runtime.forget(&id("calc"));
        assert!(!runtime.is_ready(&id("calc")));
    }

    #[test]
    fn clear_empties_everything() {
        let mut runtime = AppRuntimeState::default();
        runtime.mark_ready(&id("a"));
        runtime.enqueue(&id("b"), "x()".to_string());
        runtime.clear();
        assert!(runtime.is_empty());
        assert_eq!(runtime.ready_apps().count(), 0);
    }
}

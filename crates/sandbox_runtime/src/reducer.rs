//! Reducer actions, side-effect intents, and transition logic for the sandbox window manager.

use sandbox_contract::AppId;
use thiserror::Error;

use crate::{
    config::SandboxConfig,
    model::{
        ChromeButton, CreateWindowRequest, DragSession, IconDragSession, PointerInteraction,
        PointerPosition, PointerTarget, ResizeSession, SandboxState, Window, WindowState,
    },
    window_manager::{self, initial_geometry, resize_geometry},
};

#[derive(Debug, Clone, PartialEq)]
/// Actions accepted by [`reduce_sandbox`] to mutate [`SandboxState`].
pub enum SandboxAction {
    /// Mount a new window.
    CreateWindow(CreateWindowRequest),
    /// Raise a window above every other window.
    BringToFront { window_id: AppId },
    /// Hide a window behind a desktop icon.
    Minimize { window_id: AppId },
    /// Expand a window to fill the sandbox surface.
    Maximize { window_id: AppId },
    /// Return a minimized or maximized window to normal.
    Restore { window_id: AppId },
    /// Remove a window, its icon and its runtime bookkeeping.
    Close { window_id: AppId },
    /// Click on one of the header buttons.
    ChromeButton {
        window_id: AppId,
        /// Which header button was pressed.
        button: ChromeButton,
    },
    /// Pointer press inside a window.
    PointerDown {
        window_id: AppId,
        /// Part of the window under the pointer; decides drag, resize or raise only.
        target: PointerTarget,
        pointer: PointerPosition,
    },
    /// Pointer motion while a button is held.
    PointerMove {
        /// Current pointer position in surface units.
        pointer: PointerPosition,
    },
    /// Pointer release; ends any drag or resize.
    PointerUp,
    /// Pointer press on a desktop icon.
    IconPointerDown {
        window_id: AppId,
        pointer: PointerPosition,
    },
    /// Double activation of a desktop icon.
    ActivateIcon { window_id: AppId },
    /// Remove every window and icon.
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Side-effect intents emitted by [`reduce_sandbox`] for the sandbox loop to execute.
pub enum RuntimeEffect {
    /// A window was mounted; its init scripts should run.
    WindowMounted(AppId),
    /// Drop readiness and queued scripts for a closed app.
    ForgetApp(AppId),
    /// Drop all readiness and queued scripts.
    ResetApps,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Reducer errors for actions that cannot apply to the current state.
pub enum ReducerError {
    #[error("window `{0}` not found")]
    WindowNotFound(AppId),
    #[error("window `{0}` already exists")]
    DuplicateWindow(AppId),
}

/// Applies a [`SandboxAction`] to the window-manager state and collects resulting side effects.
///
/// # Errors
///
/// Returns [`ReducerError::WindowNotFound`] when an action names a missing window and
/// [`ReducerError::DuplicateWindow`] when a create request reuses a live id.
pub fn reduce_sandbox(
    state: &mut SandboxState,
    interaction: &mut PointerInteraction,
    config: &SandboxConfig,
    action: SandboxAction,
) -> Result<Vec<RuntimeEffect>, ReducerError> {
    let mut effects = Vec::new();
    match action {
        SandboxAction::CreateWindow(req) => {
            let window_id = match req.id {
                Some(id) if state.windows.contains_key(&id) => {
                    return Err(ReducerError::DuplicateWindow(id));
                }
                Some(id) => id,
                None => next_window_id(state),
            };
            let geometry = initial_geometry(req.geometry, state.windows_created, config);
            state.windows_created += 1;
            state.highest_z_order += 1;
            state.windows.insert(
                window_id.clone(),
                Window {
                    id: window_id.clone(),
                    title: req.title,
                    content: req.content,
                    state: WindowState::Normal,
                    geometry,
                    saved: None,
                    z_order: state.highest_z_order,
                },
            );
            effects.push(RuntimeEffect::WindowMounted(window_id));
        }
        SandboxAction::BringToFront { window_id } => {
            window_manager::bring_to_front(state, &window_id)?;
        }
        SandboxAction::Minimize { window_id } => {
            end_session_for(interaction, &window_id);
            window_manager::minimize(state, &window_id, config)?;
        }
        SandboxAction::Maximize { window_id } => {
            end_session_for(interaction, &window_id);
            window_manager::maximize(state, &window_id, config)?;
        }
        SandboxAction::Restore { window_id } => {
            window_manager::restore(state, &window_id)?;
        }
        SandboxAction::Close { window_id } => {
            if state.windows.remove(&window_id).is_none() {
                return Err(ReducerError::WindowNotFound(window_id));
            }
            state.icons.retain(|icon| icon.window_id != window_id);
            end_session_for(interaction, &window_id);
            effects.push(RuntimeEffect::ForgetApp(window_id));
        }
        SandboxAction::ChromeButton { window_id, button } => match button {
            ChromeButton::Minimize => {
                return reduce_sandbox(
                    state,
                    interaction,
                    config,
                    SandboxAction::Minimize { window_id },
                );
            }
            ChromeButton::MaximizeOrRestore => {
                let maximized = state
                    .window(&window_id)
                    .map(|w| w.state == WindowState::Maximized)
                    .ok_or_else(|| ReducerError::WindowNotFound(window_id.clone()))?;
                if maximized {
                    window_manager::restore(state, &window_id)?;
                    window_manager::bring_to_front(state, &window_id)?;
                } else {
                    end_session_for(interaction, &window_id);
                    window_manager::maximize(state, &window_id, config)?;
                }
            }
            ChromeButton::Close => {
                return reduce_sandbox(
                    state,
                    interaction,
                    config,
                    SandboxAction::Close { window_id },
                );
            }
        },
        SandboxAction::PointerDown {
            window_id,
            target,
            pointer,
        } => {
            window_manager::bring_to_front(state, &window_id)?;
            let Some(window) = state.window(&window_id) else {
                return Err(ReducerError::WindowNotFound(window_id));
            };
            match target {
                PointerTarget::Header => {
                    *interaction = PointerInteraction::Dragging(DragSession {
                        window_id,
                        pointer_start: pointer,
                        geometry_start: window.geometry,
                    });
                }
                PointerTarget::ResizeHandle(edge) if window.state == WindowState::Normal => {
                    *interaction = PointerInteraction::Resizing(ResizeSession {
                        window_id,
                        edge,
                        pointer_start: pointer,
                        geometry_start: window.geometry,
                    });
                }
                PointerTarget::ResizeHandle(_) | PointerTarget::Control | PointerTarget::Body => {}
            }
        }
        SandboxAction::PointerMove { pointer } => {
            apply_pointer_move(state, interaction, config, pointer);
        }
        SandboxAction::PointerUp => {
            *interaction = PointerInteraction::Idle;
        }
        SandboxAction::IconPointerDown { window_id, pointer } => {
            let icon = state
                .icon(&window_id)
                .ok_or_else(|| ReducerError::WindowNotFound(window_id.clone()))?;
            *interaction = PointerInteraction::DraggingIcon(IconDragSession {
                pointer_start: pointer,
                position_start: icon.position,
                window_id,
            });
        }
        SandboxAction::ActivateIcon { window_id } => {
            end_session_for(interaction, &window_id);
            window_manager::restore(state, &window_id)?;
            window_manager::bring_to_front(state, &window_id)?;
        }
        SandboxAction::Clear => {
            state.windows.clear();
            state.icons.clear();
            state.windows_created = 0;
            *interaction = PointerInteraction::Idle;
            effects.push(RuntimeEffect::ResetApps);
        }
    }

    Ok(effects)
}

fn apply_pointer_move(
    state: &mut SandboxState,
    interaction: &mut PointerInteraction,
    config: &SandboxConfig,
    pointer: PointerPosition,
) {
    match interaction {
        PointerInteraction::Idle => {}
        PointerInteraction::Dragging(session) => {
            let dx = pointer.x.saturating_sub(session.pointer_start.x);
            let dy = pointer.y.saturating_sub(session.pointer_start.y);
            match state.windows.get_mut(&session.window_id) {
                Some(window) if window.state == WindowState::Normal => {
                    window.geometry = session.geometry_start.offset(dx, dy);
                }
                Some(_) => {}
                None => *interaction = PointerInteraction::Idle,
            }
        }
        PointerInteraction::Resizing(session) => {
            let dx = pointer.x.saturating_sub(session.pointer_start.x);
            let dy = pointer.y.saturating_sub(session.pointer_start.y);
            match state.windows.get_mut(&session.window_id) {
                Some(window) if window.state == WindowState::Normal => {
                    window.geometry = resize_geometry(
                        session.geometry_start,
                        session.edge,
                        dx,
                        dy,
                        config.min_window.width,
                        config.min_window.height,
                    );
                }
                Some(_) => {}
                None => *interaction = PointerInteraction::Idle,
            }
        }
        PointerInteraction::DraggingIcon(session) => {
            let dx = pointer.x.saturating_sub(session.pointer_start.x);
            let dy = pointer.y.saturating_sub(session.pointer_start.y);
            match state
                .icons
                .iter_mut()
                .find(|icon| icon.window_id == session.window_id)
            {
                Some(icon) => icon.position = session.position_start.offset(dx, dy),
                None => *interaction = PointerInteraction::Idle,
            }
        }
    }
}

fn end_session_for(interaction: &mut PointerInteraction, window_id: &AppId) {
    if interaction.window_id() == Some(window_id) {
        *interaction = PointerInteraction::Idle;
    }
}

fn next_window_id(state: &mut SandboxState) -> AppId {
    loop {
        let id = AppId::generated(state.next_generated_id);
        state.next_generated_id = state.next_generated_id.saturating_add(1);
        if !state.windows.contains_key(&id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{Geometry, IconPosition, ResizeEdge};

    struct Harness {
        state: SandboxState,
        interaction: PointerInteraction,
        config: SandboxConfig,
    }

    impl Harness {
        fn new() -> Self {
            let config = SandboxConfig::default();
            Self {
                state: SandboxState::new(config.base_z_order),
                interaction: PointerInteraction::default(),
                config,
            }
        }

        fn apply(&mut self, action: SandboxAction) -> Result<Vec<RuntimeEffect>, ReducerError> {
            reduce_sandbox(&mut self.state, &mut self.interaction, &self.config, action)
        }

        fn open(&mut self, title: &str) -> AppId {
            let effects = self
                .apply(SandboxAction::CreateWindow(CreateWindowRequest::new(
                    title, "<div></div>",
                )))
                .expect("create window");
            match effects.as_slice() {
                [RuntimeEffect::WindowMounted(id)] => id.clone(),
                other => panic!("unexpected effects {other:?}"),
            }
        }

        fn window(&self, id: &AppId) -> &Window {
            self.state.window(id).expect("window present")
        }
    }

    fn pointer(x: i32, y: i32) -> PointerPosition {
        PointerPosition { x, y }
    }

    #[test]
    fn create_window_cascades_and_stacks_new_windows_on_top() {
        let mut h = Harness::new();
        let first = h.open("One");
        let second = h.open("Two");

        assert_eq!(h.window(&first).geometry.top, 20);
        assert_eq!(h.window(&second).geometry.top, 50);
        assert!(h.window(&second).z_order > h.window(&first).z_order);
        assert_eq!(h.state.frontmost_window_id(), Some(&second));
        assert_eq!(h.state.stacking_order(), vec![first, second]);
    }

    #[test]
    fn create_window_keeps_declared_id_and_rejects_duplicates() {
        let mut h = Harness::new();
        let mut req = CreateWindowRequest::new("Calc", "<div id=\"calc\"></div>");
        req.id = Some(AppId::trusted("calc"));
        h.apply(SandboxAction::CreateWindow(req.clone())).expect("create");
        assert!(h.state.window(&AppId::trusted("calc")).is_some());

        let err = h
            .apply(SandboxAction::CreateWindow(req))
            .expect_err("duplicate id");
        assert_eq!(err, ReducerError::DuplicateWindow(AppId::trusted("calc")));
        assert_eq!(h.state.windows.len(), 1);
    }

    #[test]
    fn generated_ids_skip_ids_taken_by_declared_windows() {
        let mut h = Harness::new();
        let mut req = CreateWindowRequest::new("Taken", "");
        req.id = Some(AppId::generated(1));
        h.apply(SandboxAction::CreateWindow(req)).expect("create");
        let next = h.open("Next");
        assert_eq!(next, AppId::generated(2));
    }

    #[test]
    fn bring_to_front_is_strictly_monotonic() {
        let mut h = Harness::new();
        let a = h.open("A");
        let b = h.open("B");
        let mut last = h.state.highest_z_order;
        for id in [&a, &a, &b, &a] {
            h.apply(SandboxAction::BringToFront {
                window_id: id.clone(),
            })
            .expect("raise");
            let z = h.window(id).z_order;
            assert!(z > last);
            last = z;
        }
    }

    #[test]
    fn minimize_then_restore_returns_exact_geometry_and_z_order() {
        let mut h = Harness::new();
        let a = h.open("A");
        let _b = h.open("B");
        let before = h.window(&a).clone();

        h.apply(SandboxAction::Minimize {
            window_id: a.clone(),
        })
        .expect("minimize");
        assert_eq!(h.window(&a).state, WindowState::Minimized);
        let icon = h.state.icon(&a).expect("icon exists while minimized");
        assert_eq!(icon.title, "A");
        assert_eq!(icon.position, IconPosition { top: 20, left: 20 });

        h.apply(SandboxAction::Restore {
            window_id: a.clone(),
        })
        .expect("restore");
        let after = h.window(&a);
        assert_eq!(after.state, WindowState::Normal);
        assert_eq!(after.geometry, before.geometry);
        assert_eq!(after.z_order, before.z_order);
        assert_eq!(after.saved, None);
        assert!(h.state.icons.is_empty());
    }

    #[test]
    fn maximize_then_restore_returns_exact_geometry_and_z_order() {
        let mut h = Harness::new();
        let a = h.open("A");
        let before = h.window(&a).clone();

        h.apply(SandboxAction::Maximize {
            window_id: a.clone(),
        })
        .expect("maximize");
        assert_eq!(h.window(&a).geometry, h.config.surface_geometry());
        assert!(h.window(&a).z_order > before.z_order);

        h.apply(SandboxAction::Restore {
            window_id: a.clone(),
        })
        .expect("restore");
        assert_eq!(h.window(&a).geometry, before.geometry);
        assert_eq!(h.window(&a).z_order, before.z_order);
        assert_eq!(h.window(&a).state, WindowState::Normal);
    }

    #[test]
    fn repeated_minimize_and_maximize_are_noops() {
        let mut h = Harness::new();
        let a = h.open("A");
        h.apply(SandboxAction::Minimize {
            window_id: a.clone(),
        })
        .unwrap();
        h.apply(SandboxAction::Minimize {
            window_id: a.clone(),
        })
        .unwrap();
        assert_eq!(h.state.icons.len(), 1);

        h.apply(SandboxAction::Restore {
            window_id: a.clone(),
        })
        .unwrap();
        h.apply(SandboxAction::Maximize {
            window_id: a.clone(),
        })
        .unwrap();
        let saved = h.window(&a).saved;
        h.apply(SandboxAction::Maximize {
            window_id: a.clone(),
        })
        .unwrap();
        assert_eq!(h.window(&a).saved, saved);
    }

    #[test]
    fn maximizing_a_minimized_window_passes_through_normal() {
        let mut h = Harness::new();
        let a = h.open("A");
        let original = h.window(&a).geometry;
        h.apply(SandboxAction::Minimize {
            window_id: a.clone(),
        })
        .unwrap();
        h.apply(SandboxAction::Maximize {
            window_id: a.clone(),
        })
        .unwrap();

        assert_eq!(h.window(&a).state, WindowState::Maximized);
        assert!(h.state.icon(&a).is_none());
        assert_eq!(h.window(&a).saved.map(|s| s.geometry), Some(original));
    }

    #[test]
    fn minimizing_a_maximized_window_keeps_the_pre_maximize_geometry() {
        let mut h = Harness::new();
        let a = h.open("A");
        let original = h.window(&a).geometry;
        h.apply(SandboxAction::Maximize {
            window_id: a.clone(),
        })
        .unwrap();
        h.apply(SandboxAction::Minimize {
            window_id: a.clone(),
        })
        .unwrap();
        h.apply(SandboxAction::Restore {
            window_id: a.clone(),
        })
        .unwrap();
        assert_eq!(h.window(&a).geometry, original);
        assert_eq!(h.window(&a).state, WindowState::Normal);
    }

    #[test]
    fn icons_pack_by_current_minimized_count() {
        let mut h = Harness::new();
        let a = h.open("A");
        let b = h.open("B");
        for id in [&a, &b] {
            h.apply(SandboxAction::Minimize {
                window_id: id.clone(),
            })
            .unwrap();
        }
        assert_eq!(
            h.state.icon(&b).map(|icon| icon.position),
            Some(IconPosition { top: 20, left: 120 })
        );
    }

    #[test]
    fn new_icon_takes_the_cell_a_restored_icon_left() {
        let mut h = Harness::new();
        let a = h.open("A");
        let b = h.open("B");
        let c = h.open("C");
        for id in [&a, &b] {
            h.apply(SandboxAction::Minimize {
                window_id: id.clone(),
            })
            .unwrap();
        }
        h.apply(SandboxAction::ActivateIcon {
            window_id: a.clone(),
        })
        .unwrap();
        h.apply(SandboxAction::Minimize {
            window_id: c.clone(),
        })
        .unwrap();

        assert_eq!(
            h.state.icon(&b).map(|icon| icon.position),
            Some(IconPosition { top: 20, left: 120 })
        );
        assert_eq!(
            h.state.icon(&c).map(|icon| icon.position),
            Some(IconPosition { top: 20, left: 20 })
        );
    }

    #[test]
    fn maximize_button_toggles_and_icon_activation_raises() {
        let mut h = Harness::new();
        let a = h.open("A");
        let b = h.open("B");

        h.apply(SandboxAction::ChromeButton {
            window_id: a.clone(),
            button: ChromeButton::MaximizeOrRestore,
        })
        .unwrap();
        assert_eq!(h.window(&a).state, WindowState::Maximized);
        h.apply(SandboxAction::ChromeButton {
            window_id: a.clone(),
            button: ChromeButton::MaximizeOrRestore,
        })
        .unwrap();
        assert_eq!(h.window(&a).state, WindowState::Normal);
        assert_eq!(h.state.frontmost_window_id(), Some(&a));

        h.apply(SandboxAction::ChromeButton {
            window_id: b.clone(),
            button: ChromeButton::Minimize,
        })
        .unwrap();
        h.apply(SandboxAction::ActivateIcon {
            window_id: b.clone(),
        })
        .unwrap();
        assert_eq!(h.window(&b).state, WindowState::Normal);
        assert_eq!(h.state.frontmost_window_id(), Some(&b));
    }

    #[test]
    fn header_drag_moves_window_until_release() {
        let mut h = Harness::new();
        let a = h.open("A");
        let original = h.window(&a).geometry;

        h.apply(SandboxAction::PointerDown {
            window_id: a.clone(),
            target: PointerTarget::Header,
            pointer: pointer(10, 10),
        })
        .unwrap();
        h.apply(SandboxAction::PointerMove {
            pointer: pointer(35, 50),
        })
        .unwrap();
        assert_eq!(h.window(&a).geometry, original.offset(25, 40));

        h.apply(SandboxAction::PointerUp).unwrap();
        assert_eq!(h.interaction, PointerInteraction::Idle);
        h.apply(SandboxAction::PointerMove {
            pointer: pointer(500, 500),
        })
        .unwrap();
        assert_eq!(h.window(&a).geometry, original.offset(25, 40));
    }

    #[test]
    fn drag_with_extreme_pointer_travel_saturates() {
        let mut h = Harness::new();
        let a = h.open("A");
        h.apply(SandboxAction::PointerDown {
            window_id: a.clone(),
            target: PointerTarget::Header,
            pointer: pointer(-10, 0),
        })
        .unwrap();
        h.apply(SandboxAction::PointerMove {
            pointer: pointer(i32::MAX, 0),
        })
        .unwrap();
        assert_eq!(h.window(&a).geometry.left, i32::MAX);
    }

    #[test]
    fn pointer_down_on_controls_raises_without_dragging() {
        let mut h = Harness::new();
        let a = h.open("A");
        let _b = h.open("B");
        h.apply(SandboxAction::PointerDown {
            window_id: a.clone(),
            target: PointerTarget::Control,
            pointer: pointer(0, 0),
        })
        .unwrap();
        assert_eq!(h.interaction, PointerInteraction::Idle);
        assert_eq!(h.state.frontmost_window_id(), Some(&a));
    }

    #[test]
    fn resize_handle_updates_geometry_from_start_rect() {
        let mut h = Harness::new();
        let a = h.open("A");
        let start = h.window(&a).geometry;
        h.apply(SandboxAction::PointerDown {
            window_id: a.clone(),
            target: PointerTarget::ResizeHandle(ResizeEdge::SouthEast),
            pointer: pointer(100, 100),
        })
        .unwrap();
        h.apply(SandboxAction::PointerMove {
            pointer: pointer(110, 105),
        })
        .unwrap();
        h.apply(SandboxAction::PointerMove {
            pointer: pointer(130, 140),
        })
        .unwrap();
        assert_eq!(
            h.window(&a).geometry,
            Geometry {
                width: start.width + 30,
                height: start.height + 40,
                ..start
            }
        );
    }

    #[test]
    fn maximized_windows_ignore_drag_and_resize() {
        let mut h = Harness::new();
        let a = h.open("A");
        h.apply(SandboxAction::Maximize {
            window_id: a.clone(),
        })
        .unwrap();
        h.apply(SandboxAction::PointerDown {
            window_id: a.clone(),
            target: PointerTarget::Header,
            pointer: pointer(0, 0),
        })
        .unwrap();
        h.apply(SandboxAction::PointerMove {
            pointer: pointer(40, 40),
        })
        .unwrap();
        assert_eq!(h.window(&a).geometry, h.config.surface_geometry());
    }

    #[test]
    fn icons_drag_independently_of_their_window() {
        let mut h = Harness::new();
        let a = h.open("A");
        let window_geometry = h.window(&a).geometry;
        h.apply(SandboxAction::Minimize {
            window_id: a.clone(),
        })
        .unwrap();
        h.apply(SandboxAction::IconPointerDown {
            window_id: a.clone(),
            pointer: pointer(30, 30),
        })
        .unwrap();
        h.apply(SandboxAction::PointerMove {
            pointer: pointer(80, 130),
        })
        .unwrap();
        h.apply(SandboxAction::PointerUp).unwrap();

        assert_eq!(
            h.state.icon(&a).map(|icon| icon.position),
            Some(IconPosition { top: 120, left: 70 })
        );
        assert_eq!(h.window(&a).geometry, window_geometry);
    }

    #[test]
    fn close_removes_window_icon_and_emits_forget() {
        let mut h = Harness::new();
        let a = h.open("A");
        h.apply(SandboxAction::Minimize {
            window_id: a.clone(),
        })
        .unwrap();
        let effects = h
            .apply(SandboxAction::ChromeButton {
                window_id: a.clone(),
                button: ChromeButton::Close,
            })
            .expect("close");
        assert_eq!(effects, vec![RuntimeEffect::ForgetApp(a.clone())]);
        assert!(h.state.window(&a).is_none());
        assert!(h.state.icons.is_empty());

        let err = h
            .apply(SandboxAction::Restore {
                window_id: a.clone(),
            })
            .expect_err("closed window");
        assert_eq!(err, ReducerError::WindowNotFound(a));
    }

    #[test]
    fn clear_wipes_windows_icons_and_resets_cascade() {
        let mut h = Harness::new();
        let a = h.open("A");
        h.open("B");
        h.apply(SandboxAction::Minimize { window_id: a }).unwrap();
        let z_before = h.state.highest_z_order;

        let effects = h.apply(SandboxAction::Clear).unwrap();
        assert_eq!(effects, vec![RuntimeEffect::ResetApps]);
        assert!(h.state.windows.is_empty());
        assert!(h.state.icons.is_empty());

        let fresh = h.open("C");
        assert_eq!(h.window(&fresh).geometry.top, 20);
        assert!(h.window(&fresh).z_order > z_before);
    }
}

//! Shared window-manager transition helpers used by the sandbox reducer.

use sandbox_contract::AppId;

use crate::{
    config::SandboxConfig,
    model::{
        DesktopIcon, Geometry, GeometryHint, IconPosition, ResizeEdge, SandboxState,
        SavedGeometry, WindowState,
    },
    reducer::ReducerError,
};

/// Default rectangle for the `index`-th window created since the last clear.
///
/// Each window steps down and right by `cascade_step`, wrapping every `cascade_cycle` windows.
pub fn cascade_geometry(index: u64, config: &SandboxConfig) -> Geometry {
    let cycle = u64::from(config.cascade_cycle.max(1));
    let offset = (index % cycle) as i32 * config.cascade_step;
    Geometry {
        top: config.cascade_origin + offset,
        left: config.cascade_origin + offset,
        width: config.default_window.width,
        height: config.default_window.height,
    }
}

/// Resolves declared geometry, filling missing position from the cascade and missing size from
/// the default window size.
pub fn initial_geometry(hint: GeometryHint, index: u64, config: &SandboxConfig) -> Geometry {
    let cascade = cascade_geometry(index, config);
    Geometry {
        top: hint.top.unwrap_or(cascade.top),
        left: hint.left.unwrap_or(cascade.left),
        width: hint.width.unwrap_or(cascade.width),
        height: hint.height.unwrap_or(cascade.height),
    }
    .clamped_min(config.min_window.width, config.min_window.height)
}

/// Lowest grid slot no current icon occupies.
pub fn next_free_icon_slot(state: &SandboxState) -> usize {
    (0..)
        .find(|slot| !state.icons.iter().any(|icon| icon.slot == *slot))
        .unwrap_or(state.icons.len())
}

/// Position of grid slot `slot`, filling rows left to right.
pub fn icon_slot(slot: usize, config: &SandboxConfig) -> IconPosition {
    let per_row = config.icons_per_row.max(1) as usize;
    IconPosition {
        left: (slot % per_row) as i32 * config.icon_cell.width + config.icon_origin,
        top: (slot / per_row) as i32 * config.icon_cell.height + config.icon_origin,
    }
}

/// Applies a resize drag of `(dx, dy)` to `start`.
///
/// Only the edges named by `edge` move; the opposite edges stay anchored even when the size is
/// clamped to the minimum.
pub fn resize_geometry(
    start: Geometry,
    edge: ResizeEdge,
    dx: i32,
    dy: i32,
    min_w: i32,
    min_h: i32,
) -> Geometry {
    let mut next = start;
    if edge.moves_right() {
        next.width = start.width.saturating_add(dx).max(min_w);
    }
    if edge.moves_left() {
        next.width = start.width.saturating_sub(dx).max(min_w);
        next.left = start
            .left
            .saturating_add(start.width)
            .saturating_sub(next.width);
    }
    if edge.moves_bottom() {
        next.height = start.height.saturating_add(dy).max(min_h);
    }
    if edge.moves_top() {
        next.height = start.height.saturating_sub(dy).max(min_h);
        next.top = start
            .top
            .saturating_add(start.height)
            .saturating_sub(next.height);
    }
    next
}

/// Allocates a new maximum z-order for `window_id` and returns it.
pub fn bring_to_front(state: &mut SandboxState, window_id: &AppId) -> Result<u64, ReducerError> {
    let window = state
        .windows
        .get_mut(window_id)
        .ok_or_else(|| ReducerError::WindowNotFound(window_id.clone()))?;
    state.highest_z_order += 1;
    window.z_order = state.highest_z_order;
    Ok(window.z_order)
}

/// Hides `window_id` behind a desktop icon. Returns `false` when already minimized.
pub fn minimize(
    state: &mut SandboxState,
    window_id: &AppId,
    config: &SandboxConfig,
) -> Result<bool, ReducerError> {
    match window_state(state, window_id)? {
        WindowState::Minimized => return Ok(false),
        WindowState::Maximized => {
            restore(state, window_id)?;
        }
        WindowState::Normal => {}
    }

    let slot = next_free_icon_slot(state);
    let window = state
        .windows
        .get_mut(window_id)
        .ok_or_else(|| ReducerError::WindowNotFound(window_id.clone()))?;
    window.saved = Some(SavedGeometry {
        geometry: window.geometry,
        z_order: window.z_order,
    });
    window.state = WindowState::Minimized;
    state.icons.push(DesktopIcon {
        window_id: window_id.clone(),
        title: window.title.clone(),
        slot,
        position: icon_slot(slot, config),
    });
    Ok(true)
}

/// Expands `window_id` to the full surface and raises it. Returns `false` when already maximized.
pub fn maximize(
    state: &mut SandboxState,
    window_id: &AppId,
    config: &SandboxConfig,
) -> Result<bool, ReducerError> {
    match window_state(state, window_id)? {
        WindowState::Maximized => return Ok(false),
        WindowState::Minimized => {
            restore(state, window_id)?;
        }
        WindowState::Normal => {}
    }

    let window = state
        .windows
        .get_mut(window_id)
        .ok_or_else(|| ReducerError::WindowNotFound(window_id.clone()))?;
    window.saved = Some(SavedGeometry {
        geometry: window.geometry,
        z_order: window.z_order,
    });
    window.geometry = config.surface_geometry();
    window.state = WindowState::Maximized;
    bring_to_front(state, window_id)?;
    Ok(true)
}

/// Returns `window_id` to [`WindowState::Normal`], reapplying the saved geometry and z-order
/// exactly. Returns `false` when the window was already normal.
pub fn restore(state: &mut SandboxState, window_id: &AppId) -> Result<bool, ReducerError> {
    let window = state
        .windows
        .get_mut(window_id)
        .ok_or_else(|| ReducerError::WindowNotFound(window_id.clone()))?;
    if window.state == WindowState::Normal {
        return Ok(false);
    }
    if window.state == WindowState::Minimized {
        state.icons.retain(|icon| &icon.window_id != window_id);
    }
    if let Some(saved) = window.saved.take() {
        window.geometry = saved.geometry;
        window.z_order = saved.z_order;
    }
    window.state = WindowState::Normal;
    Ok(true)
}

fn window_state(state: &SandboxState, window_id: &AppId) -> Result<WindowState, ReducerError> {
    state
        .windows
        .get(window_id)
        .map(|w| w.state)
        .ok_or_else(|| ReducerError::WindowNotFound(window_id.clone()))
}

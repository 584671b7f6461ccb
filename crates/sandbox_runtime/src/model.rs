//! Window, icon and pointer-session state owned by the sandbox window manager.

use std::collections::BTreeMap;

use sandbox_contract::AppId;
use serde::{Deserialize, Serialize};

/// On-surface rectangle of a window, in surface units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub top: i32,
    pub left: i32,
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            top: self.top.saturating_add(dy),
            left: self.left.saturating_add(dx),
            ..self
        }
    }

    pub fn clamped_min(self, min_w: i32, min_h: i32) -> Self {
        Self {
            width: self.width.max(min_w),
            height: self.height.max(min_h),
            ..self
        }
    }
}

/// Geometry fields an app definition declared for itself; any may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GeometryHint {
    pub top: Option<i32>,
    pub left: Option<i32>,
    pub width: Option<i32>,
    pub height: Option<i32>,
}

impl GeometryHint {
    pub fn is_empty(&self) -> bool {
        self.top.is_none() && self.left.is_none() && self.width.is_none() && self.height.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowState {
    #[default]
    Normal,
    Minimized,
    Maximized,
}

/// Geometry and z-order captured when a window leaves [`WindowState::Normal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedGeometry {
    pub geometry: Geometry,
    pub z_order: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub id: AppId,
    pub title: String,
    /// App body markup; the visual subtree scripts targeting this app operate on.
    pub content: String,
    pub state: WindowState,
    pub geometry: Geometry,
    /// Present only while minimized or maximized.
    pub saved: Option<SavedGeometry>,
    pub z_order: u64,
}

impl Window {
    pub fn is_visible(&self) -> bool {
        self.state != WindowState::Minimized
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconPosition {
    pub top: i32,
    pub left: i32,
}

impl IconPosition {
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            top: self.top.saturating_add(dy),
            left: self.left.saturating_add(dx),
        }
    }
}

/// Desktop stand-in for a minimized window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesktopIcon {
    pub window_id: AppId,
    pub title: String,
    /// Grid cell the icon was placed in; stays reserved while the icon is dragged.
    pub slot: usize,
    pub position: IconPosition,
}

/// Everything the window manager owns inside the sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxState {
    pub windows: BTreeMap<AppId, Window>,
    pub icons: Vec<DesktopIcon>,
    /// Highest z-order handed out so far.
    pub highest_z_order: u64,
    /// Windows created since the last clear; drives the cascade.
    pub windows_created: u64,
    pub next_generated_id: u64,
}

impl SandboxState {
    pub fn new(base_z_order: u64) -> Self {
        Self {
            windows: BTreeMap::new(),
            icons: Vec::new(),
            highest_z_order: base_z_order,
            windows_created: 0,
            next_generated_id: 1,
        }
    }

    pub fn window(&self, id: &AppId) -> Option<&Window> {
        self.windows.get(id)
    }

    pub fn icon(&self, id: &AppId) -> Option<&DesktopIcon> {
        self.icons.iter().find(|icon| &icon.window_id == id)
    }

    /// Visible window with the highest z-order.
    pub fn frontmost_window_id(&self) -> Option<&AppId> {
        self.windows
            .values()
            .filter(|w| w.is_visible())
            .max_by_key(|w| w.z_order)
            .map(|w| &w.id)
    }

    /// Window ids ordered back to front.
    pub fn stacking_order(&self) -> Vec<AppId> {
        let mut windows: Vec<&Window> = self.windows.values().collect();
        windows.sort_by_key(|w| w.z_order);
        windows.into_iter().map(|w| w.id.clone()).collect()
    }
}

impl Default for SandboxState {
    fn default() -> Self {
        Self::new(crate::config::SandboxConfig::default().base_z_order)
    }
}

/// Fully parsed request to mount a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateWindowRequest {
    pub id: Option<AppId>,
    pub title: String,
    pub content: String,
    pub geometry: GeometryHint,
}

impl CreateWindowRequest {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            geometry: GeometryHint::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerPosition {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeEdge {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl ResizeEdge {
    pub const ALL: [ResizeEdge; 8] = [
        Self::NorthWest,
        Self::North,
        Self::NorthEast,
        Self::West,
        Self::East,
        Self::SouthWest,
        Self::South,
        Self::SouthEast,
    ];

    pub fn moves_top(self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    pub fn moves_bottom(self) -> bool {
        matches!(self, Self::South | Self::SouthEast | Self::SouthWest)
    }

    pub fn moves_left(self) -> bool {
        matches!(self, Self::West | Self::NorthWest | Self::SouthWest)
    }

    pub fn moves_right(self) -> bool {
        matches!(self, Self::East | Self::NorthEast | Self::SouthEast)
    }
}

/// The three fixed chrome buttons in every window header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChromeButton {
    Minimize,
    /// Maximizes a normal window, restores a maximized one.
    MaximizeOrRestore,
    Close,
}

/// Where inside a window a pointer press landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerTarget {
    /// The title bar, outside any control.
    Header,
    /// An interactive child control (button, input, textarea, select).
    Control,
    /// App content.
    Body,
    ResizeHandle(ResizeEdge),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub window_id: AppId,
    pub pointer_start: PointerPosition,
    pub geometry_start: Geometry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeSession {
    pub window_id: AppId,
    pub edge: ResizeEdge,
    pub pointer_start: PointerPosition,
    pub geometry_start: Geometry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconDragSession {
    pub window_id: AppId,
    pub pointer_start: PointerPosition,
    pub position_start: IconPosition,
}

/// Pointer state machine shared by every draggable or resizable entity.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PointerInteraction {
    #[default]
    Idle,
    Dragging(DragSession),
    Resizing(ResizeSession),
    DraggingIcon(IconDragSession),
}

impl PointerInteraction {
    /// Window the active session manipulates, if any.
    pub fn window_id(&self) -> Option<&AppId> {
        match self {
            Self::Idle => None,
            Self::Dragging(session) => Some(&session.window_id),
            Self::Resizing(session) => Some(&session.window_id),
            Self::DraggingIcon(session) => Some(&session.window_id),
        }
    }
}

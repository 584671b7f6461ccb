//! Tunables for the sandbox window manager and script dispatcher.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Geometry;

/// Errors raised while reading sandbox configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The TOML document did not match [`SandboxConfig`].
    #[error("failed to parse sandbox config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A value parsed but violates a layout constraint.
    #[error("invalid sandbox config: {0}")]
    Invalid(String),
}

/// Width/height pair used for surface, default window and icon cell sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

/// What the dispatcher does with a script whose target cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UntargetedScripts {
    /// Never execute; report `INTERACTION_FAILED` to the host.
    #[default]
    Reject,
    /// Deprecated permissive variant: run against the frontmost live window.
    MostRecentWindow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Full drawable area; maximized windows fill it.
    pub surface: Size,
    pub default_window: Size,
    pub min_window: Size,
    /// Offset of the first cascaded window from the surface origin.
    pub cascade_origin: i32,
    pub cascade_step: i32,
    /// Number of windows after which the cascade wraps back to the origin.
    pub cascade_cycle: u32,
    /// First z-order handed out; every later allocation is strictly greater.
    pub base_z_order: u64,
    pub icon_cell: Size,
    pub icon_origin: i32,
    pub icons_per_row: u32,
    pub untargeted_scripts: UntargetedScripts,
    /// Mark apps ready on mount when their markup carries no init script.
    pub auto_ready_without_script: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            surface: Size {
                width: 1280,
                height: 800,
            },
            default_window: Size {
                width: 450,
                height: 350,
            },
            min_window: Size {
                width: 220,
                height: 140,
            },
            cascade_origin: 20,
            cascade_step: 30,
            cascade_cycle: 10,
            base_z_order: 1000,
            icon_cell: Size {
                width: 100,
                height: 120,
            },
            icon_origin: 20,
            icons_per_row: 10,
            untargeted_scripts: UntargetedScripts::Reject,
            auto_ready_without_script: true,
        }
    }
}

impl SandboxConfig {
    /// Parses a TOML document; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and [`ConfigError::Invalid`] when the
    /// layout values cannot produce a usable desktop.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks layout constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.surface.width <= 0 || self.surface.height <= 0 {
            return Err(ConfigError::Invalid("surface must have a positive size".into()));
        }
        if self.min_window.width <= 0 || self.min_window.height <= 0 {
            return Err(ConfigError::Invalid("min_window must have a positive size".into()));
        }
        if self.cascade_cycle == 0 {
            return Err(ConfigError::Invalid("cascade_cycle must be at least 1".into()));
        }
        if self.icons_per_row == 0 {
            return Err(ConfigError::Invalid("icons_per_row must be at least 1".into()));
        }
        Ok(())
    }

    /// Rectangle a maximized window occupies.
    pub fn surface_geometry(&self) -> Geometry {
        Geometry {
            top: 0,
            left: 0,
            width: self.surface.width,
            height: self.surface.height,
        }
    }
}

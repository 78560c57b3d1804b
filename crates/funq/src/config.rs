//! Activation settings read from the environment.
//!
//! Settings are resolved once, when activation runs, and never change
//! afterwards. Resolution goes through a lookup function so callers (and tests)
//! can supply variables without touching the process environment.

use std::{env, fmt};

/// Must equal `"1"` for activation when activation is required.
pub const ENV_ACTIVATION: &str = "FUNQ_ACTIVATION";

/// Selects pick mode when equal to `"1"`; player mode otherwise.
pub const ENV_MODE_PICK: &str = "FUNQ_MODE_PICK";

/// Overrides the command channel port; must be a positive integer.
pub const ENV_PORT: &str = "FUNQ_PORT";

/// Command channel port used when no valid override is given.
pub const DEFAULT_PORT: u16 = 9999;

/// Which collaborator the coordinator drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Expose a TCP command channel for a remote driver.
    Player,
    /// Observe every event for interactive element picking.
    Pick,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "player"),
            Self::Pick => write!(f, "pick"),
        }
    }
}

/// Resolved activation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Activation needs an explicit `FUNQ_ACTIVATION=1`.
    pub activation_required: bool,
    /// `FUNQ_ACTIVATION` was set to `"1"`.
    pub activation_enabled: bool,
    /// `FUNQ_MODE_PICK` was set to `"1"`.
    pub pick_mode: bool,
    /// Port for the command channel.
    pub port: u16,
}

impl Config {
    /// Resolve settings from the process environment.
    pub fn from_env(activation_required: bool) -> Self {
        Self::from_lookup(activation_required, |key| env::var(key).ok())
    }

    /// Resolve settings through `lookup`, which maps a variable name to its
    /// value.
    pub fn from_lookup<F>(activation_required: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            activation_required,
            activation_enabled: is_enabled(lookup(ENV_ACTIVATION).as_deref()),
            pick_mode: is_enabled(lookup(ENV_MODE_PICK).as_deref()),
            port: resolve_port(lookup(ENV_PORT).as_deref()),
        }
    }

    /// Whether the hook should be installed at all.
    pub fn should_activate(&self) -> bool {
        !self.activation_required || self.activation_enabled
    }

    /// The mode selected by these settings.
    pub fn mode(&self) -> Mode {
        if self.pick_mode {
            Mode::Pick
        } else {
            Mode::Player
        }
    }
}

/// Boolean switches are on only for the exact value `"1"`.
fn is_enabled(value: Option<&str>) -> bool {
    value == Some("1")
}

/// Parse a port override, falling back to [`DEFAULT_PORT`] unless the value is
/// a positive integer that fits a TCP port.
pub fn resolve_port(value: Option<&str>) -> u16 {
    value
        .and_then(|s| s.trim().parse::<u16>().ok())
        .filter(|p| *p > 0)
        .unwrap_or(DEFAULT_PORT)
}

/// Port from `FUNQ_PORT`, or the default.
pub fn port_from_env() -> u16 {
    resolve_port(env::var(ENV_PORT).ok().as_deref())
}

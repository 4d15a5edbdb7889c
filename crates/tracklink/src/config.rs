#![forbid(unsafe_code)]

//! Bridge configuration.
//!
//! [`BindConfig`] is a plain struct with `Default` and `with_*` builders.
//! [`BindConfig::from_env`] overlays two environment variables:
//!
//! | Variable | Values | Field |
//! |---|---|---|
//! | `TRACKLINK_ENV` | `client`, `server` | [`environment`](BindConfig::environment) |
//! | `TRACKLINK_CURSOR_WARNINGS` | `1`/`true`/`on`, `0`/`false`/`off` | [`cursor_warnings`](BindConfig::cursor_warnings) |

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BindError, Result};

/// Environment variable selecting [`Environment`].
pub const ENV_ENVIRONMENT: &str = "TRACKLINK_ENV";
/// Environment variable toggling cursor warnings.
pub const ENV_CURSOR_WARNINGS: &str = "TRACKLINK_CURSOR_WARNINGS";

/// Where components are being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Interactive rendering: data is tracked and re-rendered on change.
    #[default]
    Client,
    /// One-shot rendering: data is fetched directly, nothing is tracked.
    Server,
}

impl Environment {
    #[must_use]
    pub const fn is_server(self) -> bool {
        matches!(self, Self::Server)
    }
}

impl FromStr for Environment {
    type Err = BindError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            _ => Err(BindError::InvalidConfig {
                key: ENV_ENVIRONMENT,
                value: s.to_string(),
            }),
        }
    }
}

/// Configuration shared by every component a factory mounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    /// Client (tracked) or server (direct) data fetching.
    pub environment: Environment,
    /// Default for `with_tracker(..).pure(..)`: skip renders when props and
    /// state are unchanged.
    pub pure: bool,
    /// Warn when a snapshot embeds a live cursor. Needs a cursor probe.
    pub cursor_warnings: bool,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Client,
            pure: true,
            cursor_warnings: true,
        }
    }
}

impl BindConfig {
    /// Defaults with server-side rendering selected.
    #[must_use]
    pub fn server() -> Self {
        Self {
            environment: Environment::Server,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_pure(mut self, pure: bool) -> Self {
        self.pure = pure;
        self
    }

    #[must_use]
    pub fn with_cursor_warnings(mut self, enabled: bool) -> Self {
        self.cursor_warnings = enabled;
        self
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_ENVIRONMENT) {
            config.environment = value.parse()?;
        }
        if let Some(value) = lookup(ENV_CURSOR_WARNINGS) {
            config.cursor_warnings = parse_flag(ENV_CURSOR_WARNINGS, &value)?;
        }
        Ok(config)
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(BindError::InvalidConfig {
            key,
            value: value.to_string(),
        }),
    }
}

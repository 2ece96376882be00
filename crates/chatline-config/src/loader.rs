// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./chatline.toml` > `~/.config/chatline/chatline.toml` >
//! `/etc/chatline/chatline.toml` with environment variable overrides via `CHATLINE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::diagnostic::SCHEMA;
use crate::model::ChatlineConfig;


/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatline/chatline.toml` (system-wide)
/// 3. `~/.config/chatline/chatline.toml` (user XDG config)
/// 4. `./chatline.toml` (local directory)
/// 5. `CHATLINE_*` environment variables
pub fn load_config() -> Result<ChatlineConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ChatlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatlineConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChatlineConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatlineConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ChatlineConfig::default()))
        .merge(Toml::file("/etc/chatline/chatline.toml"))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file("chatline.toml"))
        .merge(env_provider())
}

/// Path of the per-user config file.
pub fn user_config_path() -> std::path::PathBuf {
    dirs::config_dir()
        .map(|d| d.join("chatline/chatline.toml"))
        .unwrap_or_default()
}

/// Environment provider mapping the first `_`-separated segment to a section.
///
/// Uses `Env::map()` rather than `Env::split("_")` so that keys containing
/// underscores survive: `CHATLINE_GREETING_LEASE_TTL_MS` must become
/// `greeting.lease_ttl_ms`, not `greeting.lease.ttl.ms`.
fn env_provider() -> Env {
    Env::prefixed("CHATLINE_").map(|key| {
        let key_str = key.as_str().to_ascii_lowercase();
        for (section, _) in SCHEMA {
            if let Some(rest) = key_str
                .strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
            {
                return format!("{section}.{rest}").into();
            }
        }
        key_str.into()
    })
}

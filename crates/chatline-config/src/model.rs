// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Chatline sync core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Chatline configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatlineConfig {
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Visitor identity persistence.
    #[serde(default)]
    pub visitor: VisitorConfig,

    /// Session record defaults.
    #[serde(default)]
    pub session: SessionConfig,

    /// Automated greeting settings.
    #[serde(default)]
    pub greeting: GreetingConfig,

    /// Media attachment policy.
    #[serde(default)]
    pub media: MediaConfig,

    /// Reference store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error). `RUST_LOG` wins if set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Where and under which key the visitor identity is persisted.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VisitorConfig {
    /// Path of the JSON file backing durable client storage.
    #[serde(default = "default_identity_path")]
    pub identity_path: String,

    /// Key the visitor id is stored under.
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

impl Default for VisitorConfig {
    fn default() -> Self {
        Self {
            identity_path: default_identity_path(),
            storage_key: default_storage_key(),
        }
    }
}

fn default_identity_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chatline").join("identity.json"))
        .unwrap_or_else(|| std::path::PathBuf::from("chatline-identity.json"))
        .to_string_lossy()
        .into_owned()
}

fn default_storage_key() -> String {
    "chatline_visitor_id".to_string()
}

/// Defaults applied when a session record is first created.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Prefix of the generated display name, e.g. `Visitor 3f9a1c`.
    #[serde(default = "default_display_name_prefix")]
    pub display_name_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name_prefix: default_display_name_prefix(),
        }
    }
}

fn default_display_name_prefix() -> String {
    "Visitor".to_string()
}

/// Automated greeting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GreetingConfig {
    /// Run the greeting engine when a session is activated.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lifetime of the in-memory greeting lease in milliseconds.
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: u64,

    /// Name the generic greeting introduces the support team with.
    #[serde(default = "default_support_name")]
    pub support_name: String,
}

impl Default for GreetingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lease_ttl_ms: default_lease_ttl_ms(),
            support_name: default_support_name(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_lease_ttl_ms() -> u64 {
    10_000
}

fn default_support_name() -> String {
    "Support".to_string()
}

/// Media attachment policy enforced before any upload.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MediaConfig {
    /// Largest accepted image in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    /// Largest accepted video in bytes.
    #[serde(default = "default_max_video_bytes")]
    pub max_video_bytes: u64,

    /// Accepted image MIME types.
    #[serde(default = "default_image_types")]
    pub allowed_image_types: Vec<String>,

    /// Accepted video MIME types.
    #[serde(default = "default_video_types")]
    pub allowed_video_types: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: default_max_image_bytes(),
            max_video_bytes: default_max_video_bytes(),
            allowed_image_types: default_image_types(),
            allowed_video_types: default_video_types(),
        }
    }
}

fn default_max_image_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_max_video_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_image_types() -> Vec<String> {
    ["image/jpeg", "image/png", "image/gif", "image/webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_video_types() -> Vec<String> {
    ["video/mp4", "video/webm", "video/quicktime"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Settings for the in-process reference store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Base URL prepended to uploaded media paths.
    #[serde(default = "default_media_base_url")]
    pub media_base_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            media_base_url: default_media_base_url(),
        }
    }
}

fn default_media_base_url() -> String {
    "memory://chat-media".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = ChatlineConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.visitor.storage_key, "chatline_visitor_id");
        assert!(config.visitor.identity_path.ends_with("identity.json"));
        assert!(config.greeting.enabled);
        assert_eq!(config.greeting.lease_ttl_ms, 10_000);
        assert_eq!(config.media.max_image_bytes, 10 * 1024 * 1024);
        assert!(config.media.allowed_video_types.contains(&"video/mp4".to_string()));
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: ChatlineConfig = toml::from_str("").unwrap();
        assert_eq!(config.session.display_name_prefix, "Visitor");
        assert_eq!(config.store.media_base_url, "memory://chat-media");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: ChatlineConfig = toml::from_str(
            r#"
[greeting]
support_name = "Gem Desk"
"#,
        )
        .unwrap();
        assert_eq!(config.greeting.support_name, "Gem Desk");
        assert!(config.greeting.enabled);
        assert_eq!(config.greeting.lease_ttl_ms, 10_000);
    }

    #[test]
    fn unknown_section_field_is_rejected() {
        let result = toml::from_str::<ChatlineConfig>(
            r#"
[media]
max_gif_bytes = 5
"#,
        );
        assert!(result.is_err());
    }
}

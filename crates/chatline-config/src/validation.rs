// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::ChatlineConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &ChatlineConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |key: &'static str, message: String| errors.push(ConfigError::invalid(key, message));

    let level = config.logging.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        fail(
            "logging.level",
            format!("`{}` is not a log level", config.logging.level),
        );
    }

    if config.visitor.identity_path.trim().is_empty() {
        fail("visitor.identity_path", "must not be empty".to_string());
    }

    if config.visitor.storage_key.trim().is_empty() {
        fail("visitor.storage_key", "must not be empty".to_string());
    }

    if config.greeting.lease_ttl_ms == 0 {
        fail("greeting.lease_ttl_ms", "must be greater than 0".to_string());
    }

    if config.media.max_image_bytes == 0 {
        fail("media.max_image_bytes", "must be greater than 0".to_string());
    }

    if config.media.max_video_bytes == 0 {
        fail("media.max_video_bytes", "must be greater than 0".to_string());
    }

    for mime in &config.media.allowed_image_types {
        if !mime.starts_with("image/") {
            fail(
                "media.allowed_image_types",
                format!("`{mime}` is not an image MIME type"),
            );
        }
    }

    for mime in &config.media.allowed_video_types {
        if !mime.starts_with("video/") {
            fail(
                "media.allowed_video_types",
                format!("`{mime}` is not a video MIME type"),
            );
        }
    }

    if config.store.media_base_url.trim().is_empty() {
        fail("store.media_base_url", "must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

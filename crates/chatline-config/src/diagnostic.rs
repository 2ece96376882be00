// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config diagnostics: figment errors and validation failures rendered as
//! miette reports pointing into `chatline.toml`.
//!
//! Every key is resolved against [`SCHEMA`], so a typo gets a nearby spelling
//! and a key written under the wrong section is pointed at its real one.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Every config section with its keys.
pub const SCHEMA: &[(&str, &[&str])] = &[
    ("logging", &["level"]),
    ("visitor", &["identity_path", "storage_key"]),
    ("session", &["display_name_prefix"]),
    ("greeting", &["enabled", "lease_ttl_ms", "support_name"]),
    (
        "media",
        &[
            "max_image_bytes",
            "max_video_bytes",
            "allowed_image_types",
            "allowed_video_types",
        ],
    ),
    ("store", &["media_base_url"]),
];

/// Jaro-Winkler score above which a spelling is offered.
const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(code(chatline::config::unknown_key))]
    UnknownKey {
        key: String,
        /// Closest valid key of the same section, if any.
        suggestion: Option<String>,
        #[help]
        hint: String,
        #[label("not a key of this section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(code(chatline::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that parsed but cannot be used.
    #[error("invalid `{key}`: {message}")]
    #[diagnostic(code(chatline::config::validation))]
    Validation {
        /// Dotted `section.key` path.
        key: &'static str,
        message: String,
        #[help]
        hint: Option<&'static str>,
        #[label("set here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("configuration error: {0}")]
    #[diagnostic(code(chatline::config::other))]
    Other(String),
}

impl ConfigError {
    /// A validation failure for `key`, with its standing hint.
    pub fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        ConfigError::Validation {
            key,
            message: message.into(),
            hint: key_hint(key),
            span: None,
            src: None,
        }
    }

    /// Dotted path of the offending key, when the error names one.
    pub fn key(&self) -> Option<&str> {
        match self {
            ConfigError::UnknownKey { key, .. } | ConfigError::InvalidType { key, .. } => {
                Some(key.as_str())
            }
            ConfigError::Validation { key, .. } => Some(*key),
            ConfigError::Other(_) => None,
        }
    }
}

/// Fixed advice for keys whose constraints are not obvious from the name.
fn key_hint(key: &str) -> Option<&'static str> {
    match key {
        "logging.level" => Some("one of trace, debug, info, warn, error; RUST_LOG overrides it"),
        "visitor.identity_path" => Some("the visitor id file; defaults to <data_dir>/chatline/identity.json"),
        "greeting.lease_ttl_ms" => Some("milliseconds a greeting lease blocks duplicates; 10000 is the default"),
        "media.max_image_bytes" | "media.max_video_bytes" => Some("a byte count, e.g. 10485760 for 10 MiB"),
        "media.allowed_image_types" => Some("entries look like \"image/png\""),
        "media.allowed_video_types" => Some("entries look like \"video/mp4\""),
        "store.media_base_url" => Some("uploaded media URLs are built as <media_base_url>/chat_media/..."),
        _ => None,
    }
}

/// Sections in which `key` is valid.
fn sections_with(key: &str) -> impl Iterator<Item = &'static str> + '_ {
    SCHEMA
        .iter()
        .filter(move |(_, keys)| keys.contains(&key))
        .map(|(section, _)| *section)
}

/// Closest spelling of `unknown` among `valid`.
pub fn suggest_key(unknown: &str, valid: &[&str]) -> Option<String> {
    valid
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

fn unknown_key_hint(key: &str, section: Option<&str>, suggestion: Option<&str>, valid: &[&str]) -> String {
    if let Some(home) = sections_with(key).find(|home| Some(*home) != section) {
        return format!("`{key}` belongs in the [{home}] section");
    }
    match (suggestion, section) {
        (Some(s), _) => format!("did you mean `{s}`?"),
        (None, Some(section)) => format!("[{section}] accepts: {}", valid.join(", ")),
        (None, None) => format!(
            "known sections: {}",
            SCHEMA.iter().map(|(s, _)| *s).collect::<Vec<_>>().join(", ")
        ),
    }
}

/// Convert a `figment::Error` into diagnostics.
///
/// `toml_sources` holds `(path, content)` pairs; file errors are matched by
/// path, and a single source (inline TOML) is used for every error.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let source = error_source(&error, toml_sources);
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    // skip the field itself if figment put it on the path
                    let section = error
                        .path
                        .iter()
                        .map(String::as_str)
                        .find(|segment| *segment != field.as_str());
                    let suggestion = suggest_key(field, expected);
                    let hint = unknown_key_hint(field, section, suggestion.as_deref(), expected);
                    let (span, src) = locate(source, section, field);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion,
                        hint,
                        span,
                        src,
                    }
                }
                Kind::InvalidType(actual, expected) => {
                    let key = error.path.join(".");
                    let (section, field) = split_key(&key);
                    let (span, src) = locate(source, section, field);
                    ConfigError::InvalidType {
                        key,
                        found: actual.to_string(),
                        expected: expected.to_string(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Points validation errors at the line that set the offending key, using
/// the first source that mentions it.
pub fn attach_sources(errors: &mut [ConfigError], toml_sources: &[(String, String)]) {
    for error in errors {
        let ConfigError::Validation { key, span, src, .. } = error else {
            continue;
        };
        let (section, field) = split_key(*key);
        if let Some((found_span, found_src)) = toml_sources.iter().find_map(|source| {
            match locate(Some(source), section, field) {
                (Some(span), Some(src)) => Some((span, src)),
                _ => None,
            }
        }) {
            *span = Some(found_span);
            *src = Some(found_src);
        }
    }
}

fn split_key(key: &str) -> (Option<&str>, &str) {
    match key.rsplit_once('.') {
        Some((section, field)) => (Some(section), field),
        None => (None, key),
    }
}

fn error_source<'a>(
    error: &figment::error::Error,
    toml_sources: &'a [(String, String)],
) -> Option<&'a (String, String)> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    match file {
        Some(path) => toml_sources.iter().find(|(p, _)| *p == path),
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    }
}

fn locate(
    source: Option<&(String, String)>,
    section: Option<&str>,
    field: &str,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some((path, content)) = source else {
        return (None, None);
    };
    match find_key_offset(content, section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field = ...` inside the `[section]` table of a TOML
/// document (top level when `section` is `None`).
pub fn find_key_offset(content: &str, section: Option<&str>, field: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let trimmed = line.trim_start();

        if let Some(header) = trimmed.strip_prefix('[') {
            current = header.split(']').next().map(str::trim);
            continue;
        }
        if current != section {
            continue;
        }
        let Some((name, _)) = trimmed.split_once('=') else {
            continue;
        };
        if name.trim_end() == field {
            return Some(start + (line.len() - trimmed.len()));
        }
    }
    None
}

/// Render every error to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_lease_ttl_for_typo() {
        let valid = &["enabled", "lease_ttl_ms", "support_name"];
        assert_eq!(
            suggest_key("lease_tll_ms", valid),
            Some("lease_ttl_ms".to_string())
        );
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn misplaced_key_points_at_its_section() {
        let hint = unknown_key_hint("lease_ttl_ms", Some("media"), None, &["max_image_bytes"]);
        assert_eq!(hint, "`lease_ttl_ms` belongs in the [greeting] section");

        let hint = unknown_key_hint("colour", Some("logging"), None, &["level"]);
        assert_eq!(hint, "[logging] accepts: level");
    }

    #[test]
    fn offset_is_scoped_to_the_section_table() {
        let content = "[visitor]\nstorage_key = \"a\"\n\n[greeting]\n  support_name=\"x\"\n";
        let offset = find_key_offset(content, Some("greeting"), "support_name").unwrap();
        assert_eq!(&content[offset..offset + 12], "support_name");
        assert!(find_key_offset(content, Some("greeting"), "storage_key").is_none());
        assert!(find_key_offset(content, None, "storage_key").is_none());
    }

    #[test]
    fn key_prefix_does_not_match() {
        let content = "[media]\nmax_image_bytes_extra = 1\nmax_image_bytes = 0\n";
        let offset = find_key_offset(content, Some("media"), "max_image_bytes").unwrap();
        assert_eq!(offset, content.find("max_image_bytes = 0").unwrap());
    }

    #[test]
    fn validation_errors_gain_span_and_hint() {
        let sources = vec![(
            "chatline.toml".to_string(),
            "[greeting]\nlease_ttl_ms = 0\n".to_string(),
        )];
        let mut errors = vec![ConfigError::invalid("greeting.lease_ttl_ms", "must be greater than 0")];
        attach_sources(&mut errors, &sources);

        let ConfigError::Validation { hint, span, src, .. } = &errors[0] else {
            panic!("expected validation error");
        };
        assert!(hint.unwrap().contains("10000"));
        assert_eq!(span.unwrap().offset(), sources[0].1.find("lease_ttl_ms").unwrap());
        assert!(src.is_some());
        assert_eq!(errors[0].key(), Some("greeting.lease_ttl_ms"));
    }
}

// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment load failures into miette diagnostics.
//!
//! A single `figment::Error` can carry several failures (one per bad key).
//! Each one becomes a [`ConfigError`]. When the offending value came from a
//! TOML file we still have in memory, the diagnostic points at the exact
//! line so the operator sees the typo in context. Values that arrived via
//! `FIELDSYNC_*` environment variables have no source span; the help text
//! names the variable instead.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a known key must beat before it is offered as a
/// "did you mean?" correction. Below this, typos like `zzz` produce noise.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error with rich diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A key that no fieldsync section declares.
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(fieldsync::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        /// The key as written by the operator.
        key: String,
        /// Closest known key in the same section, if one is close enough.
        suggestion: Option<String>,
        /// Comma-separated keys the section accepts.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that parsed as TOML but has the wrong shape, e.g. a string
    /// where `sync.interval_secs` wants an integer.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(
        code(fieldsync::config::invalid_type),
        help("expected {expected} (or set {})", env_var_for(key))
    )]
    InvalidType {
        /// Dotted path, e.g. `sync.interval_secs`.
        key: String,
        /// What figment found versus what it wanted.
        detail: String,
        expected: String,
        #[label("expected {expected}")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key with no default that nothing supplied.
    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(fieldsync::config::missing_key),
        help("add `{key} = <value>` to fieldsync.toml or set {}", env_var_for(key))
    )]
    MissingKey { key: String },

    /// Deserialized fine but failed a semantic check in `validation`.
    #[error("validation error: {message}")]
    #[diagnostic(code(fieldsync::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(fieldsync::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Environment variable the loader maps onto a dotted key.
///
/// `sync.interval_secs` becomes `FIELDSYNC_SYNC_INTERVAL_SECS`.
pub fn env_var_for(dotted_key: &str) -> String {
    format!("FIELDSYNC_{}", dotted_key.replace('.', "_").to_uppercase())
}

fn dotted_path(error: &figment::Error) -> String {
    error.path.join(".")
}

/// Convert a `figment::Error` (which may hold several errors) into diagnostics.
///
/// `toml_sources` pairs each loaded file's display path with its contents.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    let locator = SourceLocator::new(toml_sources);

    err.into_iter()
        .map(|error| match &error.kind {
            Kind::UnknownField(field, expected) => {
                let (span, src) = locator.locate(&error, &error.path, field);
                ConfigError::UnknownKey {
                    key: field.clone(),
                    suggestion: suggest_key(field, expected),
                    valid_keys: expected.join(", "),
                    span,
                    src,
                }
            }
            Kind::MissingField(field) => {
                let key = if error.path.is_empty() {
                    field.to_string()
                } else {
                    format!("{}.{field}", dotted_path(&error))
                };
                ConfigError::MissingKey { key }
            }
            Kind::InvalidType(actual, expected) => {
                // For type errors the path already ends with the bad key.
                let (span, src) = match error.path.split_last() {
                    Some((field, section)) => locator.locate(&error, section, field),
                    None => (None, None),
                };
                ConfigError::InvalidType {
                    key: dotted_path(&error),
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.to_string(),
                    span,
                    src,
                }
            }
            _ => ConfigError::Other(error.to_string()),
        })
        .collect()
}

/// Finds which in-memory TOML file a figment error came from.
struct SourceLocator<'a> {
    sources: &'a [(String, String)],
}

impl<'a> SourceLocator<'a> {
    fn new(sources: &'a [(String, String)]) -> Self {
        Self { sources }
    }

    fn source_for(&self, error: &figment::Error) -> Option<&'a (String, String)> {
        let file = error
            .metadata
            .as_ref()
            .and_then(|m| m.source.as_ref())
            .and_then(|s| match s {
                figment::Source::File(path) => Some(path.display().to_string()),
                _ => None,
            });

        match file {
            Some(path) => self.sources.iter().find(|(p, _)| *p == path),
            // Inline strings carry no file metadata.
            None if self.sources.len() == 1 => self.sources.first(),
            None => None,
        }
    }

    fn locate(
        &self,
        error: &figment::Error,
        section: &[String],
        field: &str,
    ) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
        self.source_for(error)
            .and_then(|(path, content)| {
                let offset = find_key_offset(content, section, field)?;
                Some((
                    Some(SourceSpan::new(offset.into(), field.len())),
                    Some(NamedSource::new(path, content.clone())),
                ))
            })
            .unwrap_or((None, None))
    }
}

/// Byte offset of `field` inside the `[section[0]]` table of `content`, or
/// from the start of the document for top-level keys.
///
/// Matches only a key at the start of a line followed by `=` or whitespace,
/// so `max_retry` never matches inside `max_retry_delay`.
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let body_start = match section.first() {
        Some(table) => {
            let header = format!("[{table}]");
            content.find(&header)? + header.len()
        }
        None => 0,
    };

    content[body_start..]
        .split_inclusive('\n')
        .scan(body_start, |line_start, line| {
            let start = *line_start;
            *line_start += line.len();
            Some((start, line))
        })
        .find_map(|(start, line)| {
            let indent = line.len() - line.trim_start().len();
            let rest = line[indent..].strip_prefix(field)?;
            rest.starts_with([' ', '\t', '='])
                .then_some(start + indent)
        })
}

/// Best Jaro-Winkler match above the threshold, if any.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|&key| (strsim::jaro_winkler(unknown, key), key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render diagnostics to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

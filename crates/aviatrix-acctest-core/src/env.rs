//! Explicit environment snapshot with typed, lenient getters.
//!
//! Every component in this crate reads its inputs from an [`EnvSnapshot`]
//! handed to it by the caller instead of consulting the process environment
//! directly. Tests build snapshots from literal pairs, which keeps them
//! independent of each other and avoids `std::env::set_var`.
//!
//! Parsing is deliberately forgiving: a malformed boolean, integer, or
//! duration falls back to the supplied default without raising an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Immutable key/value view of the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the current process environment. Non-UTF-8 entries are skipped.
    #[must_use]
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Build a snapshot from explicit pairs. Later duplicates win.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self { vars }
    }

    /// Return a copy with `key` set to `value`, replacing any previous value.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Return a copy without `key`.
    #[must_use]
    pub fn without(mut self, key: &str) -> Self {
        self.vars.remove(key);
        self
    }

    /// Fill keys that are unset (or empty) from `defaults`; set keys are kept.
    #[must_use]
    pub fn with_fallbacks<'a>(mut self, defaults: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (key, value) in defaults {
            if self.get(key).is_none() {
                self.vars.insert(key.to_string(), value.to_string());
            }
        }
        self
    }

    /// Overlay a `.env` style file. Keys already set in the snapshot win.
    ///
    /// # Errors
    /// Returns [`ConfigError::EnvFile`] when the file cannot be read.
    pub fn with_env_file(self, path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::EnvFile {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = parse_dotenv_contents(&contents);
        tracing::debug!(path = %path.display(), keys = parsed.len(), "loaded env file");
        Ok(self.with_fallbacks(parsed.iter().map(|(k, v)| (k.as_str(), v.as_str()))))
    }

    /// Raw value, including empty strings.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Value when set and non-empty.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw(key).filter(|v| !v.is_empty())
    }

    /// Value or `""` when unset.
    #[must_use]
    pub fn get_or_empty(&self, key: &str) -> &str {
        self.raw(key).unwrap_or("")
    }

    #[must_use]
    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    #[must_use]
    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).map_or(default, |v| parse_bool(v, default))
    }

    #[must_use]
    pub fn int_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    #[must_use]
    pub fn duration_or(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(parse_duration)
            .unwrap_or(default)
    }

    /// `true` when the variable is exactly `"yes"` (skip-flag convention).
    #[must_use]
    pub fn is_yes(&self, key: &str) -> bool {
        self.raw(key) == Some("yes")
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Lenient boolean parse; unknown tokens yield `default`.
#[must_use]
pub fn parse_bool(value: &str, default: bool) -> bool {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" => true,
        "0" | "false" | "f" | "no" | "n" => false,
        _ => default,
    }
}

/// Parse Go-style duration strings (`30m`, `1h30m`, `90s`, `250ms`).
///
/// Returns `None` for anything `humantime` cannot read.
#[must_use]
pub fn parse_duration(value: &str) -> Option<Duration> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    humantime::parse_duration(trimmed).ok()
}

/// Parse `.env` contents into key/value pairs.
///
/// Lines without `=` or with an empty key are ignored. Later keys win.
#[must_use]
pub fn parse_dotenv_contents(contents: &str) -> BTreeMap<String, String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), dotenv_value(value.trim())))
        })
        .collect()
}

/// Quoted values are taken verbatim (double quotes understand `\n`, `\t`,
/// `\"` and `\\`); anything else loses a ` # comment` tail.
fn dotenv_value(raw: &str) -> String {
    let quoted = match raw.chars().next() {
        Some(quote @ ('"' | '\'')) => unquote(&raw[1..], quote),
        _ => None,
    };
    quoted.unwrap_or_else(|| strip_inline_comment(raw).to_string())
}

/// `None` when the closing quote is missing or followed by anything but a comment.
fn unquote(body: &str, quote: char) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            let tail = body[i + 1..].trim_start();
            return (tail.is_empty() || tail.starts_with('#')).then_some(out);
        }
        if c == '\\' && quote == '"' {
            match chars.next().map(|(_, escaped)| escaped) {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    None
}

fn strip_inline_comment(value: &str) -> &str {
    value
        .char_indices()
        .find(|&(i, c)| c == '#' && value[..i].chars().next_back().is_none_or(char::is_whitespace))
        .map_or(value, |(i, _)| value[..i].trim_end())
}

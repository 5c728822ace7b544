// SPDX-License-Identifier: GPL-3.0-or-later

//! This module is responsible for making file names comparable.
//!
//! Data files recorded by different processes (maybe on different machines,
//! maybe in different directories) refer to the same source file by
//! different names. Before the data is merged, every name is turned into a
//! canonical form:
//!
//! 1. made absolute, relative to the directory of the process which recorded it,
//! 2. resolved on the filesystem (symbolic links, `.` and `..` segments),
//!    or lexically when the file is already gone,
//! 3. case folded on platforms where the filesystem ignores case,
//! 4. rewritten by the first alias rule which matches its beginning.
//!
//! The alias rules come from the configuration. A rule has a canonical
//! directory and a list of glob patterns:
//!
//! ```yaml
//! paths:
//!   - canonical: src
//!     patterns: ["*/d1", "/ci/build/*/src"]
//! ```
//!
//! In a pattern `*` matches inside a single path component, `?` matches one
//! character, and `**` matches across components. A leading `*/` matches
//! any number of leading directories. Patterns always match whole leading
//! components of a path.

use crate::config;
use regex_lite::Regex;
use std::path::{Component, MAIN_SEPARATOR, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathResolutionError {
    #[error("Empty path can't be canonicalized")]
    Empty,
    #[error("Invalid path alias pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex_lite::Error,
    },
}

/// A rewrite rule for the beginning of file names.
#[derive(Debug, Clone)]
pub struct AliasRule {
    pattern: String,
    regex: Regex,
    canonical: String,
}

impl AliasRule {
    /// Compiles a pattern. Relative names are taken relative to `base`.
    pub fn new(pattern: &str, canonical: &Path, base: &Path) -> Result<Self, PathResolutionError> {
        let pattern = prepare_pattern(pattern, base);
        let regex = Regex::new(&glob_to_regex(&pattern))
            .map_err(|source| PathResolutionError::Pattern { pattern: pattern.clone(), source })?;

        let canonical = normalize_lexically(&base.join(canonical));
        let canonical = fold_case(canonical.to_string_lossy().into_owned());
        let canonical = canonical.trim_end_matches(['/', '\\']).to_string();

        Ok(Self { pattern, regex, canonical })
    }

    /// Rewrites the path when the pattern matches its beginning.
    fn apply(&self, path: &str) -> Option<String> {
        let found = self.regex.find(path)?;
        let remainder = path[found.end()..].trim_start_matches(['/', '\\']);
        Some(format!("{}{}{}", self.canonical, MAIN_SEPARATOR, remainder))
    }
}

/// The ordered list of alias rules.
#[derive(Debug, Clone, Default)]
pub struct Aliases {
    rules: Vec<AliasRule>,
}

impl Aliases {
    pub fn new(rules: Vec<AliasRule>) -> Self {
        Self { rules }
    }

    /// Compiles the alias configuration, relative names taken to `base`.
    pub fn from_config(
        config: &[config::PathAlias],
        base: &Path,
    ) -> Result<Self, PathResolutionError> {
        let mut rules = Vec::new();
        for alias in config {
            for pattern in &alias.patterns {
                rules.push(AliasRule::new(pattern, &alias.canonical, base)?);
            }
        }
        Ok(Self::new(rules))
    }

    /// Rewrites the path until no rule changes it anymore.
    ///
    /// The canonical directory of a rule can be matched by another rule, so
    /// a single rewrite is not final. Cyclic tables stop after every rule
    /// had a chance to apply.
    pub fn map(&self, path: &str) -> Option<String> {
        let mut current = self.map_once(path)?;
        for _ in 0..self.rules.len() {
            match self.map_once(&current) {
                Some(next) if next != current => current = next,
                _ => return Some(current),
            }
        }
        log::warn!("Path aliases do not settle for '{path}', using '{current}'");
        Some(current)
    }

    /// Rewrites the path by the first matching rule.
    fn map_once(&self, path: &str) -> Option<String> {
        self.rules.iter().find_map(|rule| {
            let result = rule.apply(path);
            if let Some(mapped) = &result {
                log::debug!("Path '{path}' matched alias '{}', mapped to '{mapped}'", rule.pattern);
            }
            result
        })
    }
}

/// Turns file names into their canonical form.
#[derive(Debug, Clone, Default)]
pub struct Canonicalizer {
    aliases: Aliases,
}

impl Canonicalizer {
    pub fn new(aliases: Aliases) -> Self {
        Self { aliases }
    }

    /// Computes the canonical name of a file.
    ///
    /// Relative names are taken relative to `origin`, the directory of the
    /// process which recorded the name. Does not fail when the file does not
    /// exist anymore.
    pub fn canonicalize(&self, path: &Path, origin: &Path) -> Result<PathBuf, PathResolutionError> {
        if path.as_os_str().is_empty() {
            return Err(PathResolutionError::Empty);
        }

        let absolute = if path.is_absolute() { path.to_path_buf() } else { origin.join(path) };
        let resolved = absolute.canonicalize().unwrap_or_else(|_| normalize_lexically(&absolute));
        let folded = fold_case(resolved.to_string_lossy().into_owned());

        match self.aliases.map(&folded) {
            Some(mapped) => Ok(PathBuf::from(mapped)),
            None => Ok(PathBuf::from(folded)),
        }
    }
}

/// Removes `.` segments and folds `..` segments into their parent.
///
/// Works on the name only, the filesystem is not consulted. A `..` at the
/// root stays at the root.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match result.components().next_back() {
                Some(Component::Normal(_)) => {
                    result.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => result.push(component),
            },
            other => result.push(other),
        }
    }
    result
}

#[cfg(any(target_os = "macos", windows))]
const CASE_INSENSITIVE: bool = true;
#[cfg(not(any(target_os = "macos", windows)))]
const CASE_INSENSITIVE: bool = false;

fn fold_case(path: String) -> String {
    if CASE_INSENSITIVE { path.to_lowercase() } else { path }
}

/// Makes the pattern absolute (unless it starts with a wildcard) and
/// restricts it to whole components.
fn prepare_pattern(pattern: &str, base: &Path) -> String {
    let trimmed = pattern.trim_end_matches(['/', '\\']);

    let mut result = if trimmed.starts_with('*') || Path::new(trimmed).is_absolute() {
        trimmed.to_string()
    } else {
        normalize_lexically(&base.join(trimmed)).to_string_lossy().into_owned()
    };
    result.push(MAIN_SEPARATOR);
    result
}

fn glob_to_regex(pattern: &str) -> String {
    let mut regex = String::from(if CASE_INSENSITIVE { "(?i)^" } else { "^" });

    let mut rest = pattern;
    let stars = rest.len() - rest.trim_start_matches('*').len();
    if stars > 0 && rest[stars..].starts_with(['/', '\\']) {
        regex.push_str(r"(?:.*[/\\])?");
        rest = &rest[stars + 1..];
    }

    let mut characters = rest.chars().peekable();
    while let Some(character) = characters.next() {
        match character {
            '*' if characters.peek() == Some(&'*') => {
                characters.next();
                regex.push_str(".*");
            }
            '*' => regex.push_str(r"[^/\\]*"),
            '?' => regex.push_str(r"[^/\\]"),
            '/' | '\\' => regex.push_str(r"[/\\]"),
            other => regex.push_str(&regex_lite::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    regex
}

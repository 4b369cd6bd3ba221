//! Requirement matching
//!
//! Requirements are object name patterns with shell glob syntax. They are
//! matched against the objects known at the start of a pass, so a pattern
//! may start matching once the object it names has been declared by some
//! other manifest.

use glob::Pattern;
use std::collections::HashSet;

/// Object names matched by one requirement pattern.
pub fn find_matches<'a>(pattern: &str, names: &'a [String]) -> Vec<&'a str> {
    let found = match_pattern(pattern, names);
    if !found.is_empty() {
        return found;
    }
    // `__motd/` names the singleton `__motd`
    match pattern.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => match_pattern(trimmed, names),
        _ => found,
    }
}

fn match_pattern<'a>(pattern: &str, names: &'a [String]) -> Vec<&'a str> {
    match Pattern::new(pattern) {
        Ok(glob) => names
            .iter()
            .filter(|name| glob.matches(name))
            .map(String::as_str)
            .collect(),
        Err(e) => {
            log::debug!("Requirement {pattern} is not a valid glob ({e}), matching literally");
            names
                .iter()
                .filter(|name| name.as_str() == pattern)
                .map(String::as_str)
                .collect()
        }
    }
}

/// Outstanding dependencies of one object.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Unfinished {
    /// Matched objects that are not done yet.
    pub pending: Vec<String>,
    /// Patterns that matched no object.
    pub unmatched: Vec<String>,
}

impl Unfinished {
    pub fn is_satisfied(&self) -> bool {
        self.pending.is_empty() && self.unmatched.is_empty()
    }
}

/// Check requirement patterns against the known and the finished objects.
pub fn unfinished(patterns: &[String], names: &[String], done: &HashSet<String>) -> Unfinished {
    let mut result = Unfinished::default();
    for pattern in patterns {
        let found = find_matches(pattern, names);
        if found.is_empty() {
            result.unmatched.push(pattern.clone());
            continue;
        }
        for name in found {
            if !done.contains(name) && !result.pending.iter().any(|p| p == name) {
                result.pending.push(name.to_string());
            }
        }
    }
    result
}

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::error::{AppError, AppResult};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PatternMatch {
    Match,
    NoMatch,
    /// Stored pattern does not compile; callers skip it.
    Invalid,
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern).case_insensitive(true).build()
}

/// Literal patterns compare exactly. Regex patterns search anywhere in the title, ignoring case.
pub fn evaluate(title: &str, pattern: &str, is_regex: bool) -> PatternMatch {
    if !is_regex {
        return if title == pattern { PatternMatch::Match } else { PatternMatch::NoMatch };
    }
    match compile(pattern) {
        Ok(re) if re.is_match(title) => PatternMatch::Match,
        Ok(_) => PatternMatch::NoMatch,
        Err(_) => PatternMatch::Invalid,
    }
}

/// `Invalid` patterns never match and are logged so corrupt rows can be found.
pub fn matches(title: &str, pattern: &str, is_regex: bool) -> bool {
    match evaluate(title, pattern, is_regex) {
        PatternMatch::Match => true,
        PatternMatch::NoMatch => false,
        PatternMatch::Invalid => {
            warn!(pattern = %pattern, "skipping stored pattern that does not compile");
            false
        },
    }
}

pub fn validate_regex(pattern: &str) -> AppResult<()> {
    compile(pattern)
        .map(|_| ())
        .map_err(|_| AppError::validation(format!("`{pattern}` is not a valid regex pattern")))
}

//! Error type shared by the pattern compiler, the template compiler and the
//! Perl-style front end.

use std::sync::atomic::{AtomicBool, Ordering};

/// Errors produced while compiling a pattern or a replacement template.
///
/// "No match" is never an error; match calls report it through `bool` or
/// `Option`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexError {
    /// The pattern or template is malformed.
    Syntax(String),
    /// The text is well formed but asks for something that cannot be done,
    /// such as quantifying an anchor or naming an undefined extension.
    Unsupported(String),
    /// A `s/.../.../` or `m/.../` string could not be split.
    PerlCode(String),
}

impl RegexError {
    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::Syntax(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Syntax(m) | Self::Unsupported(m) | Self::PerlCode(m) => m,
        }
    }
}

impl std::fmt::Display for RegexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax(m) => write!(f, "Syntax error in pattern: {m}"),
            Self::Unsupported(m) => write!(f, "Unsupported construct: {m}"),
            Self::PerlCode(m) => write!(f, "Bad perl code: {m}"),
        }
    }
}

impl std::error::Error for RegexError {}

static ABORT_ON_SYNTAX_ERROR: AtomicBool = AtomicBool::new(false);

/// Make compile errors panic instead of being returned.
///
/// Intended for programs that only compile trusted, pre-validated patterns.
/// Off by default.
pub fn set_abort_on_syntax_error(abort: bool) {
    ABORT_ON_SYNTAX_ERROR.store(abort, Ordering::Relaxed);
}

pub fn abort_on_syntax_error() -> bool {
    ABORT_ON_SYNTAX_ERROR.load(Ordering::Relaxed)
}

/// Pass a compile error through the abort switch.
pub(crate) fn escalate(err: RegexError) -> RegexError {
    if abort_on_syntax_error() {
        panic!("{err}");
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_kind() {
        assert_eq!(
            RegexError::syntax("Unclosed ()").to_string(),
            "Syntax error in pattern: Unclosed ()"
        );
        assert_eq!(
            RegexError::unsupported("x").to_string(),
            "Unsupported construct: x"
        );
        assert_eq!(RegexError::PerlCode("y".into()).message(), "y");
    }

    #[test]
    fn escalate_is_transparent_by_default() {
        let e = escalate(RegexError::syntax("boom"));
        assert_eq!(e, RegexError::syntax("boom"));
    }

    /// Turns the abort switch off again, even while unwinding.
    struct AbortGuard;

    impl Drop for AbortGuard {
        fn drop(&mut self) {
            set_abort_on_syntax_error(false);
        }
    }

    #[test]
    #[should_panic(expected = "Syntax error in pattern: boom")]
    fn escalate_panics_when_aborting() {
        let _guard = AbortGuard;
        set_abort_on_syntax_error(true);
        assert!(abort_on_syntax_error());
        escalate(RegexError::syntax("boom"));
    }
}

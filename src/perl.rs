//! Perl-style front end: `s/pattern/replacement/flags`, `m/pattern/flags`
//! and `/pattern/flags`, plus the `\Q \U \L \u \l \E` case directives that
//! both patterns and these strings accept.

use crate::error::{RegexError, escalate};
use crate::pattern::cursor::ESC;
use crate::regex::{Flags, Regex};
use crate::replace::ReplaceRule;
use crate::unicode::{to_lower, to_upper};

/// Apply case directives to `text`.
///
/// `\Q` escapes every following unit that is not an ASCII letter, digit or
/// `_`; `\U` and `\L` convert case until `\E`; `\u` and `\l` convert the
/// next unit only. With `keep_backslashes` other escapes are passed through
/// unchanged, otherwise they lose their backslash. Returns `None` when
/// nothing had to change.
pub fn codify(text: &[u16], keep_backslashes: bool) -> Option<Vec<u16>> {
    let mut out = Vec::with_capacity(text.len());
    let (mut upper, mut lower, mut literal) = (false, false, false);
    let (mut upper_one, mut lower_one) = (false, false);
    let mut modified = false;
    let mut i = 0;
    while i < text.len() {
        let mut c = text[i];
        i += 1;
        if c == ESC {
            let Some(&next) = text.get(i) else {
                out.push(ESC);
                break;
            };
            i += 1;
            let directive = char::from_u32(u32::from(next))
                .filter(|&d| matches!(d, 'Q' | 'U' | 'L' | 'u' | 'l' | 'E'));
            if let Some(d) = directive {
                match d {
                    'Q' => literal = true,
                    'U' => upper = true,
                    'L' => lower = true,
                    'u' => upper_one = true,
                    'l' => lower_one = true,
                    _ => {
                        (upper, lower, literal) = (false, false, false);
                        (upper_one, lower_one) = (false, false);
                    }
                }
                modified = true;
                continue;
            }
            if keep_backslashes {
                out.extend([ESC, next]);
                continue;
            }
            modified = true;
            c = next;
        }
        if lower_one {
            c = to_lower(c);
            lower_one = false;
        } else if upper_one {
            c = to_upper(c);
            upper_one = false;
        } else if upper {
            c = to_upper(c);
        } else if lower {
            c = to_lower(c);
        }
        if literal && !is_plain(c) {
            out.push(ESC);
        }
        out.push(c);
    }
    modified.then_some(out)
}

fn is_plain(c: u16) -> bool {
    matches!(c, 0x30..=0x39 | 0x41..=0x5A | 0x61..=0x7A | 0x5F)
}

/// The parts of a Perl-style match or substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerlCode {
    pub pattern: String,
    /// `None` for `m//` and `//`.
    pub replacement: Option<String>,
    /// The replacement was delimited by `'` and is used as is.
    pub literal_replacement: bool,
    pub flags: Flags,
}

fn closer(open: char) -> char {
    match open {
        '<' => '>',
        '[' => ']',
        '(' => ')',
        '{' => '}',
        c => c,
    }
}

fn perl_error(msg: impl Into<String>) -> RegexError {
    escalate(RegexError::PerlCode(msg.into()))
}

/// Read up to the unnested `close`, leaving escapes in place.
fn section(chars: &[char], i: &mut usize, open: char, close: char) -> Option<String> {
    let mut out = String::new();
    let mut depth = 0usize;
    while let Some(&c) = chars.get(*i) {
        *i += 1;
        if c == '\\' {
            out.push(c);
            if let Some(&next) = chars.get(*i) {
                out.push(next);
                *i += 1;
            }
            continue;
        }
        if c == close && depth == 0 {
            return Some(out);
        }
        if open != close {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
            }
        }
        out.push(c);
    }
    None
}

/// Remove whitespace and `#` comments, as the `x` flag asks.
pub fn strip(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '#' => {
                for d in chars.by_ref() {
                    if d == '\n' {
                        break;
                    }
                }
            }
            '\\' => {
                out.push(c);
                if let Some(d) = chars.next() {
                    out.push(d);
                }
            }
            c if c.is_whitespace() => {}
            c => out.push(c),
        }
    }
    out
}

/// Split `code` into pattern, replacement and flags.
pub fn parse(code: &str) -> Result<PerlCode, RegexError> {
    let chars: Vec<char> = code.chars().collect();
    let (substitute, mut i) = match chars.as_slice() {
        ['s', _, _, ..] => (true, 1),
        ['m', _, ..] => (false, 1),
        ['/', ..] => (false, 0),
        _ => {
            return Err(perl_error(
                "expected s/pattern/replacement/, m/pattern/ or /pattern/",
            ));
        }
    };
    let mut open = chars[i];
    let mut close = closer(open);
    i += 1;
    let pattern = section(&chars, &mut i, open, close)
        .ok_or_else(|| perl_error(format!("pattern needs a closing {close}")))?;

    let mut replacement = None;
    if substitute {
        if open != close {
            while chars.get(i).is_some_and(|c| c.is_whitespace()) {
                i += 1;
            }
            let Some(&next) = chars.get(i) else {
                return Err(perl_error(format!("s{open} needs {close}")));
            };
            open = next;
            close = closer(open);
            i += 1;
        }
        replacement = Some(
            section(&chars, &mut i, open, close)
                .ok_or_else(|| perl_error(format!("replacement needs a closing {close}")))?,
        );
    }

    let mut flags = Flags::default();
    let mut extended = false;
    for &c in &chars[i..] {
        match c {
            'x' => extended = true,
            'i' => flags.ignore_case = true,
            'o' => flags.optimize = true,
            's' => flags.dot_all = true,
            'm' => flags.multiline = true,
            'g' => flags.global = true,
            c => return Err(perl_error(format!("Illegal flag to pattern: {c}"))),
        }
    }
    let (pattern, replacement) = if extended {
        (strip(&pattern), replacement.as_deref().map(strip))
    } else {
        (pattern, replacement)
    };
    Ok(PerlCode {
        pattern,
        replacement,
        literal_replacement: open == '\'',
        flags,
    })
}

/// Compile a Perl-style match or substitution.
pub fn compile(code: &str) -> Result<Regex, RegexError> {
    let parsed = parse(code)?;
    log::debug!("perl code {code:?} -> {parsed:?}");
    let mut regex = Regex::compile(&parsed.pattern)?;
    let flags = parsed.flags;
    if flags.ignore_case {
        regex.set_ignore_case(true);
    }
    if flags.global {
        regex.set_global(true);
    }
    if flags.dot_all {
        regex.set_dot_all(true);
    }
    if flags.multiline {
        regex.set_multiline(true);
    }
    if flags.optimize {
        regex.optimize();
    }
    match &parsed.replacement {
        Some(text) if parsed.literal_replacement => {
            regex.set_replace_rule(ReplaceRule::literal(text));
        }
        Some(template) => {
            regex.set_replacement(template)?;
        }
        None => {}
    }
    Ok(regex)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn codified(s: &str, keep: bool) -> Option<String> {
        codify(&units(s), keep).map(|u| String::from_utf16_lossy(&u))
    }

    fn perl_err(code: &str) -> String {
        match parse(code) {
            Err(RegexError::PerlCode(m)) => m,
            other => panic!("expected a perl code error for {code:?}, got {other:?}"),
        }
    }

    // --- Case directives ---

    #[test]
    fn codify_leaves_plain_text_alone() {
        assert_eq!(codified("abc", true), None);
        assert_eq!(codified(r"a\d+", true), None);
    }

    #[test]
    fn codify_directives() {
        assert_eq!(codified(r"\Qa.b\E.c", true).as_deref(), Some(r"a\.b.c"));
        assert_eq!(codified(r"\Uab\Ec", true).as_deref(), Some("ABc"));
        assert_eq!(codified(r"\LAB", true).as_deref(), Some("ab"));
        assert_eq!(codified(r"\uab\lCD", true).as_deref(), Some("AbcD"));
    }

    #[test]
    fn codify_drops_backslashes_on_request() {
        assert_eq!(codified(r"a\.b", false).as_deref(), Some("a.b"));
        assert_eq!(codified(r"\Ua\.b", true).as_deref(), Some(r"A\.B"));
    }

    // --- Splitting ---

    #[test]
    fn substitution_with_slashes() {
        let p = parse("s/a(b)/x$1/g").unwrap();
        assert_eq!(p.pattern, "a(b)");
        assert_eq!(p.replacement.as_deref(), Some("x$1"));
        assert!(p.flags.global);
        assert!(!p.literal_replacement);
    }

    #[test]
    fn escaped_delimiters_stay_escaped() {
        let p = parse(r"s/a\/b/c\/d/").unwrap();
        assert_eq!(p.pattern, r"a\/b");
        assert_eq!(p.replacement.as_deref(), Some(r"c\/d"));
    }

    #[test]
    fn bracket_delimiters_nest() {
        let p = parse("s{a{2}}{b}").unwrap();
        assert_eq!(p.pattern, "a{2}");
        assert_eq!(p.replacement.as_deref(), Some("b"));
        let p = parse("s(x) <y>i").unwrap();
        assert_eq!(p.pattern, "x");
        assert_eq!(p.replacement.as_deref(), Some("y"));
        assert!(p.flags.ignore_case);
    }

    #[test]
    fn match_forms() {
        let p = parse("m{abc}s").unwrap();
        assert_eq!(p.pattern, "abc");
        assert!(p.flags.dot_all);
        let p = parse("/abc/mo").unwrap();
        assert_eq!(p.pattern, "abc");
        assert!(p.flags.multiline && p.flags.optimize);
        assert_eq!(p.replacement, None);
    }

    #[test]
    fn extended_flag_strips() {
        let p = parse("/a b # note\n c \\ d/x").unwrap();
        assert_eq!(p.pattern, r"abc\ d");
    }

    #[test]
    fn malformed_code() {
        assert_eq!(perl_err("s/a/b/z"), "Illegal flag to pattern: z");
        assert_eq!(perl_err("s{a}"), "s{ needs }");
        assert!(perl_err("abc").starts_with("expected"));
        assert!(perl_err("s/abc").contains("closing /"));
    }

    // --- Compiling ---

    #[test]
    fn compiled_substitution() {
        let r = compile("s/(\\w+)@(\\w+)/$2 at $1/").unwrap();
        assert_eq!(r.replace_all("me@home"), "home at me");
    }

    #[test]
    fn single_quotes_keep_the_replacement_literal() {
        let r = compile("s'a'$&'").unwrap();
        assert_eq!(r.replace_all("bab"), "b$&b");
    }

    #[test]
    fn flags_reach_the_regex() {
        let mut r = compile("m/abc/igo").unwrap();
        assert!(r.flags().ignore_case && r.flags().global);
        assert!(r.optimized());
        assert!(r.search("xxABC"));
        assert_eq!(r.result().matched_from(), Some(2));
    }

    #[test]
    fn pattern_errors_pass_through() {
        assert!(matches!(compile("s/(a/b/"), Err(RegexError::Syntax(_))));
    }

    #[test]
    fn replacement_errors_pass_through() {
        assert!(matches!(
            compile("s/a/${nosuch}/"),
            Err(RegexError::Unsupported(_))
        ));
        assert!(matches!(compile("s/a/x${y/"), Err(RegexError::Syntax(_))));
        assert_eq!(compile("s'a'${nosuch}'").unwrap().replace_all("ab"), "${nosuch}b");
    }
}

//! Applying replacement rules to successive matches.

use std::sync::Arc;

use crate::regex::QuoteMask;
use crate::source::{CharSource, Text};

use super::rule::{RuleBuffer, RuleItem};
use super::{Hit, Searcher};

/// An entry on the pattern stack.
enum Active<'a> {
    Borrowed(&'a dyn Searcher),
    Shared(Arc<dyn Searcher>),
}

impl Active<'_> {
    fn get(&self) -> &dyn Searcher {
        match self {
            Active::Borrowed(s) => *s,
            Active::Shared(s) => s.as_ref(),
        }
    }
}

/// Rewrites text match by match, copying the gaps between matches and
/// replacing each match by the rule of the pattern that found it.
///
/// The pattern searched with is the top of a stack that `${+name}`,
/// `${POP}` and `${=name}` directives change as matches are replaced. The
/// stack persists between calls on the same replacer.
pub struct Replacer<'a> {
    stack: Vec<Active<'a>>,
    want_more_enabled: bool,
    want_more: bool,
    last_matched_to: usize,
}

impl<'a> Replacer<'a> {
    pub fn new(searcher: &'a dyn Searcher) -> Self {
        Self {
            stack: vec![Active::Borrowed(searcher)],
            want_more_enabled: false,
            want_more: false,
            last_matched_to: 0,
        }
    }

    /// Let `${WANT_MORE_TEXT}` stop a replacement.
    pub fn enable_want_more_text(&mut self, on: bool) -> &mut Self {
        self.want_more_enabled = on;
        self
    }

    /// True when the last replacement stopped at `${WANT_MORE_TEXT}`.
    pub fn want_more_text(&self) -> bool {
        self.want_more
    }

    /// Offset in the last input up to which the output is final.
    pub fn last_matched_to(&self) -> usize {
        self.last_matched_to
    }

    /// Number of patterns on the stack.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Return to the pattern the replacer was created with.
    pub fn reset(&mut self) {
        self.stack.truncate(1);
    }

    fn current(&self) -> &dyn Searcher {
        match self.stack.last() {
            Some(active) => active.get(),
            None => unreachable!("the replacer stack is never empty"),
        }
    }

    // ─── Entry points ───────────────────────────────────────────────────────

    pub fn replace_first(&mut self, text: impl Into<Text>) -> String {
        let text = text.into();
        let end = text.len();
        self.run(text, 0, end, true)
    }

    pub fn replace_first_from(&mut self, text: impl Into<Text>, start: usize) -> String {
        let text = text.into();
        let end = text.len();
        self.run(text, start, end, true)
    }

    /// Replace the first match starting in `start..=end`.
    pub fn replace_first_region(&mut self, text: impl Into<Text>, start: usize, end: usize) -> String {
        self.run(text.into(), start, end, true)
    }

    pub fn replace_all(&mut self, text: impl Into<Text>) -> String {
        let text = text.into();
        let end = text.len();
        self.run(text, 0, end, false)
    }

    pub fn replace_all_from(&mut self, text: impl Into<Text>, start: usize) -> String {
        let text = text.into();
        let end = text.len();
        self.run(text, start, end, false)
    }

    /// Replace every match starting in `start..=end`.
    pub fn replace_all_region(&mut self, text: impl Into<Text>, start: usize, end: usize) -> String {
        self.run(text.into(), start, end, false)
    }

    // ─── Loop ───────────────────────────────────────────────────────────────

    fn run(&mut self, text: Text, start: usize, end: usize, first: bool) -> String {
        self.want_more = false;
        self.last_matched_to = 0;
        let masks = QuoteMask::new(&text);
        let mut out = RuleBuffer::new();
        let mut copied = 0;
        let mut from = start;
        let mut last_end = 0;
        let mut replaced = 0usize;
        while from <= end {
            let Some(hit) = self.current().find(&text, &masks, from, end, last_end) else {
                break;
            };
            let Some((m_start, m_end)) = hit.res.span(0) else {
                break;
            };
            self.apply(&mut out, &text, &mut copied, &hit);
            replaced += 1;
            last_end = m_end;
            // An empty match moves on by one unit.
            from = if m_start == m_end { m_end + 1 } else { m_end };
            if first || self.want_more {
                break;
            }
        }
        if replaced == 0 {
            return text.to_string();
        }
        out.push_source(&text, copied, text.len());
        self.last_matched_to = copied;
        log::debug!(
            "replaced {replaced} match(es) in {} units{}",
            text.len(),
            if self.want_more { ", wants more text" } else { "" }
        );
        String::from_utf16_lossy(&out.into_units())
    }

    /// Copy the gap before the match, then run the rule.
    fn apply(&mut self, out: &mut RuleBuffer, text: &Text, copied: &mut usize, hit: &Hit) {
        if hit.rule.is_identity() {
            return;
        }
        let Some((m_start, m_end)) = hit.res.span(0) else {
            return;
        };
        out.push_source(text, *copied, m_start);
        *copied = (*copied).max(m_start);
        for item in hit.rule.items() {
            item.apply(out, &hit.res);
            match item {
                RuleItem::WantMoreText if self.want_more_enabled => self.want_more = true,
                RuleItem::Push { name, target } => {
                    log::trace!("push ${{+{name}}} at {m_start}");
                    self.stack.push(Active::Shared(Arc::clone(target)));
                }
                RuleItem::Pop => {
                    if self.stack.len() > 1 {
                        self.stack.pop();
                    }
                }
                RuleItem::Change { name, target } => {
                    log::trace!("change to ${{={name}}} at {m_start}");
                    if let Some(top) = self.stack.last_mut() {
                        *top = Active::Shared(Arc::clone(target));
                    }
                }
                _ => {}
            }
        }
        out.reset_mode();
        if !self.want_more {
            *copied = (*copied).max(m_end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regex::Regex;
    use crate::replace::{ReplaceRule, RuleRegistry, Transformer};

    fn rx(pat: &str, template: &str) -> Regex {
        Regex::with_replacement(pat, template).unwrap()
    }

    fn rx_with(pat: &str, template: &str, reg: &RuleRegistry) -> Regex {
        let mut r = Regex::compile(pat).unwrap();
        r.set_replace_rule(ReplaceRule::compile(template, reg).unwrap());
        r
    }

    // --- Basic replacement ---

    #[test]
    fn gaps_are_copied_verbatim() {
        let r = rx(r"(\d+)", "<$1>");
        assert_eq!(r.replace_all("a1b22c"), "a<1>b<22>c");
        assert_eq!(r.replace_first("a1b22c"), "a<1>b22c");
        assert_eq!(r.replace_all("none"), "none");
    }

    #[test]
    fn empty_matches_progress() {
        let r = rx("x*", "-");
        assert_eq!(r.replace_all("abc"), "-a-b-c-");
        assert_eq!(r.replace_all(""), "-");
        let r = rx("b*", "-");
        assert_eq!(r.replace_all("abc"), "-a--c-");
    }

    #[test]
    fn regions_bound_match_starts() {
        let r = rx("a", "b");
        assert_eq!(r.replace_all_region("aaaa", 1, 2), "abba");
        assert_eq!(r.replace_all_from("aaaa", 3), "aaab");
        assert_eq!(r.replace_first_from("aaaa", 1), "abaa");
        assert_eq!(r.replace_first_region("aaaa", 2, 3), "aaba");
    }

    #[test]
    fn case_mode_ends_with_the_rule() {
        let r = rx(r"\w+", r"\U$&");
        assert_eq!(r.replace_all("ab, cd"), "AB, CD");
        let r = rx("b", r"\Ux");
        assert_eq!(r.replace_all("abc"), "aXc");
    }

    #[test]
    fn replacement_is_idempotent_when_it_cannot_match() {
        let r = rx("cat", "dog");
        let once = r.replace_all("cat scatter cat");
        assert_eq!(once, "dog sdogter dog");
        assert_eq!(r.replace_all(once.as_str()), once);
    }

    #[test]
    fn resume_anchor_tracks_previous_match() {
        let r = rx(r"\Ga", "b");
        assert_eq!(r.replace_all("aab a"), "bbb a");
    }

    // --- Rule stack ---

    #[test]
    fn push_and_pop() {
        let mut reg = RuleRegistry::new();
        let closing = rx_with("\"", "$&${POP}", &reg);
        reg.define_regex("quoted", closing);
        let mut t = Transformer::new(false);
        t.add(rx_with("\"", "$&${+quoted}", &reg));
        t.add(rx("a", "A"));
        let mut rep = Replacer::new(&t);
        assert_eq!(rep.replace_all(r#"a"a"a"#), r#"A"a"A"#);
        assert_eq!(rep.depth(), 1);
    }

    #[test]
    fn stack_persists_across_calls() {
        let mut reg = RuleRegistry::new();
        reg.define_regex("digits", rx(r"\d", "#"));
        let base = rx_with("!", "${+digits}", &reg);
        let mut rep = Replacer::new(&base);
        assert_eq!(rep.replace_all("a!b1"), "ab#");
        assert_eq!(rep.depth(), 2);
        assert_eq!(rep.replace_all("!2"), "!#");
        rep.reset();
        assert_eq!(rep.replace_all("!2"), "2");
    }

    #[test]
    fn change_replaces_the_active_pattern() {
        let mut reg = RuleRegistry::new();
        reg.define_regex("other", rx("a", "c"));
        let base = rx_with("a", "b${=other}", &reg);
        let mut rep = Replacer::new(&base);
        assert_eq!(rep.replace_all("aaa"), "bcc");
        assert_eq!(rep.depth(), 1);
    }

    // --- Want more text ---

    #[test]
    fn want_more_text_stops_when_enabled() {
        let r = rx("x", "${WANT_MORE_TEXT}");
        let mut rep = r.replacer();
        assert_eq!(rep.replace_all("abxcdx"), "abcd");
        assert!(!rep.want_more_text());

        rep.enable_want_more_text(true);
        assert_eq!(rep.replace_all("abxcdx"), "abxcdx");
        assert!(rep.want_more_text());
        assert_eq!(rep.last_matched_to(), 2);
    }
}

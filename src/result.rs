//! The outcome of a match attempt.

use std::fmt;

use crate::pattern::matcher::Found;
use crate::source::{CharSource, Text};

/// A match result: the overall span, group spans and the text they index.
///
/// Group `0` is the whole match; groups `1..=num_subs()` are the capture
/// groups in order of their opening parenthesis. Accessors return `None`
/// when the match failed or the group did not take part.
#[derive(Clone, Default)]
pub struct RegRes {
    text: Option<Text>,
    matched: bool,
    start: usize,
    end: usize,
    marks: Vec<isize>,
    n_subs: usize,
}

impl RegRes {
    pub(crate) fn from_found(text: Text, found: Found, n_subs: usize) -> Self {
        Self {
            text: Some(text),
            matched: true,
            start: found.start,
            end: found.end,
            marks: found.marks,
            n_subs,
        }
    }

    /// A failed attempt against `text`.
    pub(crate) fn failed(text: Text, n_subs: usize) -> Self {
        Self {
            text: Some(text),
            n_subs,
            ..Self::default()
        }
    }

    pub fn did_match(&self) -> bool {
        self.matched
    }

    /// Number of capture groups in the pattern that produced this result.
    pub fn num_subs(&self) -> usize {
        self.n_subs
    }

    /// The text searched, if any search has run.
    pub fn text(&self) -> Option<&Text> {
        self.text.as_ref()
    }

    // ─── Whole match ────────────────────────────────────────────────────────

    pub fn matched_from(&self) -> Option<usize> {
        self.matched.then_some(self.start)
    }

    pub fn matched_to(&self) -> Option<usize> {
        self.matched.then_some(self.end)
    }

    pub fn chars_matched(&self) -> Option<usize> {
        self.matched.then(|| self.end - self.start)
    }

    pub fn string_matched(&self) -> Option<String> {
        self.group(0)
    }

    /// Everything before the match.
    pub fn left(&self) -> Option<String> {
        self.left_of(0)
    }

    /// Everything after the match.
    pub fn right(&self) -> Option<String> {
        self.right_of(0)
    }

    // ─── Groups ─────────────────────────────────────────────────────────────

    /// The span of group `i`.
    pub fn span(&self, i: usize) -> Option<(usize, usize)> {
        if !self.matched || i > self.n_subs {
            return None;
        }
        if i == 0 {
            return Some((self.start, self.end));
        }
        let from = *self.marks.get(i)?;
        let to = *self.marks.get(i + self.n_subs)?;
        (from >= 0 && to >= from).then_some((from as usize, to as usize))
    }

    pub fn group_from(&self, i: usize) -> Option<usize> {
        self.span(i).map(|(from, _)| from)
    }

    pub fn group_to(&self, i: usize) -> Option<usize> {
        self.span(i).map(|(_, to)| to)
    }

    pub fn group_len(&self, i: usize) -> Option<usize> {
        self.span(i).map(|(from, to)| to - from)
    }

    /// The text of group `i`.
    pub fn group(&self, i: usize) -> Option<String> {
        let (from, to) = self.span(i)?;
        Some(self.text.as_ref()?.substring(from, to))
    }

    /// The text before group `i`.
    pub fn left_of(&self, i: usize) -> Option<String> {
        let (from, _) = self.span(i)?;
        Some(self.text.as_ref()?.substring(0, from))
    }

    /// The text after group `i`.
    pub fn right_of(&self, i: usize) -> Option<String> {
        let (_, to) = self.span(i)?;
        let text = self.text.as_ref()?;
        Some(text.substring(to, text.len()))
    }

    /// Append the units of `from..to` in the searched text to `out`.
    pub(crate) fn copy_units(&self, from: usize, to: usize, out: &mut Vec<u16>) {
        if let Some(text) = &self.text {
            text.copy_units(from, to, out);
        }
    }
}

impl PartialEq for RegRes {
    /// Equal when both results index the same text with the same spans.
    fn eq(&self, other: &Self) -> bool {
        let same_text = match (&self.text, &other.text) {
            (Some(a), Some(b)) => a.same_source(b),
            (None, None) => true,
            _ => false,
        };
        same_text
            && self.matched == other.matched
            && self.n_subs == other.n_subs
            && (0..=self.n_subs).all(|i| self.span(i) == other.span(i))
    }
}

impl fmt::Display for RegRes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some((from, to)) = self.span(0) else {
            return f.write_str("match=none");
        };
        write!(f, "match={from}:{}", to - from)?;
        for i in 1..=self.n_subs {
            match self.span(i) {
                Some((from, to)) => write!(f, " sub({i})={from}:{}", to - from)?,
                None => write!(f, " sub({i})=none")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RegRes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegRes({self})")
    }
}

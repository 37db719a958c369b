//! Compiled patterns and the search API.
//!
//! A [`Regex`] owns its pattern graph, its flags, the prefilter built by
//! [`Regex::optimize`] and the result of the last search. Searches take
//! anything convertible into a [`Text`]; global (`g`) searches continue
//! after the previous match only when handed the same `Text` again.

use std::cell::OnceCell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{RegexError, escalate};
use crate::pattern::cursor::{ESC, re_escape};
use crate::pattern::graph::{Graph, NodeKind};
use crate::pattern::matcher::{Found, MatchFlags, MatchState, quote_mask};
use crate::pattern::optimizer;
use crate::pattern::parser;
use crate::pattern::skip::{self, Skip};
use crate::pattern::validator::{ExtensionRegistry, with_default_registry};
use crate::perl;
use crate::quant::Bound;
use crate::replace::{Hit, ReplaceRule, Replacer, Searcher};
use crate::result::RegRes;
use crate::source::{CharSource, Text};

static DEFAULT_MULTILINE: AtomicBool = AtomicBool::new(false);
static DEFAULT_DOT_ALL: AtomicBool = AtomicBool::new(false);

/// Turn on multiline anchors for every search in the process.
pub fn set_default_multiline(on: bool) {
    DEFAULT_MULTILINE.store(on, Ordering::Relaxed);
}

pub fn default_multiline() -> bool {
    DEFAULT_MULTILINE.load(Ordering::Relaxed)
}

/// Let `.` match `\n` in every search in the process.
pub fn set_default_dot_matches_newline(on: bool) {
    DEFAULT_DOT_ALL.store(on, Ordering::Relaxed);
}

pub fn default_dot_matches_newline() -> bool {
    DEFAULT_DOT_ALL.load(Ordering::Relaxed)
}

/// Pattern flags, as set by `(?imsgoQ)` or the `set_*` methods.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Flags {
    /// `i`
    pub ignore_case: bool,
    /// `Q`: units inside `"…"` or `'…'` cannot be matched by literals or
    /// classes.
    pub dont_match_in_quotes: bool,
    /// `o`
    pub optimize: bool,
    /// `g`: repeated searches of one text continue after the last match.
    pub global: bool,
    /// `s`
    pub dot_all: bool,
    /// `m`
    pub multiline: bool,
}

impl Flags {
    /// Every flag set in either.
    pub fn union(self, other: Flags) -> Flags {
        Flags {
            ignore_case: self.ignore_case || other.ignore_case,
            dont_match_in_quotes: self.dont_match_in_quotes || other.dont_match_in_quotes,
            optimize: self.optimize || other.optimize,
            global: self.global || other.global,
            dot_all: self.dot_all || other.dot_all,
            multiline: self.multiline || other.multiline,
        }
    }

    fn match_flags(self) -> MatchFlags {
        MatchFlags {
            ignore_case: self.ignore_case,
            dot_all: self.dot_all || default_dot_matches_newline(),
            multiline: self.multiline || default_multiline(),
        }
    }
}

/// A quote mask for one text, computed on first use.
pub struct QuoteMask<'t> {
    text: &'t Text,
    mask: OnceCell<Vec<bool>>,
}

impl<'t> QuoteMask<'t> {
    pub fn new(text: &'t Text) -> Self {
        Self {
            text,
            mask: OnceCell::new(),
        }
    }

    pub fn get(&self) -> &[bool] {
        self.mask.get_or_init(|| quote_mask(self.text))
    }
}

/// A compiled pattern.
pub struct Regex {
    pattern: String,
    esc: u16,
    graph: Graph,
    /// The graph as compiled, kept once optimized so flag changes can
    /// optimize again from scratch.
    plain: Option<Box<Graph>>,
    n_groups: usize,
    flags: Flags,
    optimized: bool,
    skip: Option<Skip>,
    min_match: usize,
    rule: ReplaceRule,
    last: RegRes,
    /// Where the next global search of the same text resumes.
    resume: Option<(Text, usize)>,
    mask_cache: Option<(Text, Arc<[bool]>)>,
}

impl Regex {
    /// Compile `pattern` against the process-wide extension registry.
    pub fn compile(pattern: &str) -> Result<Self, RegexError> {
        with_default_registry(|registry| Self::compile_with(pattern, '\\', registry))
    }

    /// Compile `pattern`, written with `esc` as its escape character.
    pub fn compile_with(
        pattern: &str,
        esc: char,
        registry: &ExtensionRegistry,
    ) -> Result<Self, RegexError> {
        let esc = u16::try_from(u32::from(esc)).map_err(|_| {
            escalate(RegexError::unsupported(format!(
                "escape character {esc:?} is outside the 16-bit range"
            )))
        })?;
        let units: Vec<u16> = pattern.encode_utf16().collect();
        let units = if esc == ESC {
            perl::codify(&units, true).unwrap_or(units)
        } else {
            units
        };
        let compiled = parser::compile(&units, esc, registry).map_err(escalate)?;
        log::debug!(
            "compiled {pattern:?}: {} groups, flags {:?}",
            compiled.n_groups,
            compiled.flags
        );
        let mut regex = Self {
            pattern: pattern.to_string(),
            esc,
            graph: compiled.graph,
            plain: None,
            n_groups: compiled.n_groups,
            flags: compiled.flags,
            optimized: false,
            skip: None,
            min_match: 0,
            rule: ReplaceRule::matched(),
            last: RegRes::default(),
            resume: None,
            mask_cache: None,
        };
        if regex.flags.optimize {
            regex.optimize();
        }
        Ok(regex)
    }

    /// Compile `pattern` with a replacement template.
    pub fn with_replacement(pattern: &str, template: &str) -> Result<Self, RegexError> {
        let mut regex = Self::compile(pattern)?;
        regex.set_replacement(template)?;
        Ok(regex)
    }

    /// Compile `s/pattern/replacement/flags`, `m/pattern/flags` or
    /// `/pattern/flags`.
    pub fn perl_code(code: &str) -> Result<Self, RegexError> {
        perl::compile(code)
    }

    /// The pattern as given to the compiler.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    // ─── Flags ──────────────────────────────────────────────────────────────

    pub fn set_ignore_case(&mut self, on: bool) -> &mut Self {
        self.update_flags(|f| f.ignore_case = on)
    }

    pub fn set_dont_match_in_quotes(&mut self, on: bool) -> &mut Self {
        self.update_flags(|f| f.dont_match_in_quotes = on)
    }

    pub fn set_global(&mut self, on: bool) -> &mut Self {
        self.update_flags(|f| f.global = on)
    }

    pub fn set_dot_all(&mut self, on: bool) -> &mut Self {
        self.update_flags(|f| f.dot_all = on)
    }

    pub fn set_multiline(&mut self, on: bool) -> &mut Self {
        self.update_flags(|f| f.multiline = on)
    }

    /// Apply a flag change. The optimized graph depends on case folding and
    /// quote masking, so changing either re-optimizes from the plain graph.
    fn update_flags(&mut self, change: impl FnOnce(&mut Flags)) -> &mut Self {
        let before = self.flags;
        change(&mut self.flags);
        let reshaped = before.ignore_case != self.flags.ignore_case
            || before.dont_match_in_quotes != self.flags.dont_match_in_quotes;
        if reshaped && let Some(plain) = self.plain.take() {
            self.graph = *plain;
            self.skip = None;
            self.min_match = 0;
            self.optimized = false;
            self.optimize();
        }
        self
    }

    // ─── Optimization ───────────────────────────────────────────────────────

    /// Rewrite the graph into its faster forms and build the prefilter.
    /// Calling it again does nothing.
    pub fn optimize(&mut self) {
        if self.optimized {
            return;
        }
        self.plain = Some(Box::new(self.graph.compacted()));
        optimizer::optimize(
            &mut self.graph,
            self.flags.ignore_case,
            self.flags.dont_match_in_quotes,
        );
        self.skip = skip::find_skip(
            &mut self.graph,
            self.flags.ignore_case,
            !self.flags.dont_match_in_quotes,
        );
        self.min_match = if self.graph.has_rewind() {
            0
        } else {
            self.min_chars().value()
        };
        self.optimized = true;
        self.flags.optimize = true;
        log::debug!(
            "optimized {:?}: min match {}, prefilter {}",
            self.pattern,
            self.min_match,
            self.skip.is_some()
        );
    }

    pub fn optimized(&self) -> bool {
        self.optimized
    }

    // ─── Introspection ──────────────────────────────────────────────────────

    /// Number of capture groups.
    pub fn num_subs(&self) -> usize {
        self.n_groups
    }

    /// True when the pattern is a plain run of literal units.
    pub fn is_literal(&self) -> bool {
        self.graph.chain(self.graph.start()).all(|id| {
            matches!(
                self.graph.kind(id),
                NodeKind::Char { .. } | NodeKind::ExactChar(_) | NodeKind::Skipped(_)
            )
        })
    }

    /// Fewest units any match consumes.
    pub fn min_chars(&self) -> Bound {
        self.graph.chain_min(self.graph.start())
    }

    /// Most units any match consumes.
    pub fn max_chars(&self) -> Bound {
        self.graph.chain_max(self.graph.start())
    }

    /// The result of the last match call.
    pub fn result(&self) -> &RegRes {
        &self.last
    }

    // ─── Searching ──────────────────────────────────────────────────────────

    /// Match starting exactly at `pos`.
    pub fn match_at(&mut self, text: impl Into<Text>, pos: usize) -> bool {
        let text = text.into();
        let mask = self.mask_for(&text);
        let last_end = self.resume_anchor(&text);
        let found = {
            let mut state = self.state(&text, mask.as_deref(), last_end);
            state.attempt(pos)
        };
        self.record(text, found, false)
    }

    /// Leftmost match anywhere in `text`.
    pub fn search(&mut self, text: impl Into<Text>) -> bool {
        let text = text.into();
        let end = text.len();
        self.search_in(text, 0, end)
    }

    /// Leftmost match starting at or after `start`.
    pub fn search_from(&mut self, text: impl Into<Text>, start: usize) -> bool {
        let text = text.into();
        let end = text.len();
        self.search_in(text, start, end)
    }

    /// Leftmost match starting in `start..=end`.
    pub fn search_region(&mut self, text: impl Into<Text>, start: usize, end: usize) -> bool {
        self.search_in(text.into(), start, end)
    }

    /// Rightmost match, scanning start offsets downwards from the end.
    pub fn reverse_search(&mut self, text: impl Into<Text>) -> bool {
        let text = text.into();
        let mut end = text.len();
        if let Some(next) = self.global_resume(&text) {
            match next.checked_sub(1) {
                Some(e) => end = e,
                None => return self.record(text, None, true),
            }
        }
        let mask = self.mask_for(&text);
        let last_end = self.resume_anchor(&text);
        let found = {
            let mut state = self.state(&text, mask.as_deref(), last_end);
            state.search_reverse(0, end)
        };
        self.record(text, found, true)
    }

    fn search_in(&mut self, text: Text, start: usize, end: usize) -> bool {
        let start = self.global_resume(&text).unwrap_or(start);
        if start > text.len() {
            return self.record(text, None, false);
        }
        let mask = self.mask_for(&text);
        let last_end = self.resume_anchor(&text);
        let found = self.find_found(&text, mask.as_deref(), start, end, last_end);
        self.record(text, found, false)
    }

    fn state<'a>(
        &'a self,
        text: &'a Text,
        mask: Option<&'a [bool]>,
        last_end: usize,
    ) -> MatchState<'a> {
        MatchState::new(
            &self.graph,
            text,
            self.n_groups,
            self.flags.match_flags(),
            mask,
            last_end,
        )
    }

    fn find_found(
        &self,
        text: &Text,
        mask: Option<&[bool]>,
        start: usize,
        end: usize,
        last_end: usize,
    ) -> Option<Found> {
        let mut state = self.state(text, mask, last_end);
        state.search(self.skip.as_ref(), self.min_match, start, end)
    }

    /// Where a global search of `text` resumes. Any search clears it.
    fn global_resume(&mut self, text: &Text) -> Option<usize> {
        let resume = self.resume.take()?;
        (self.flags.global && resume.0.same_source(text)).then_some(resume.1)
    }

    /// The offset `\G` matches at: the end of the last match on `text`.
    fn resume_anchor(&self, text: &Text) -> usize {
        match self.last.text() {
            Some(t) if t.same_source(text) => self.last.matched_to().unwrap_or(0),
            _ => 0,
        }
    }

    fn mask_for(&mut self, text: &Text) -> Option<Arc<[bool]>> {
        if !self.flags.dont_match_in_quotes {
            return None;
        }
        if let Some((cached, mask)) = &self.mask_cache
            && cached.same_source(text)
        {
            return Some(Arc::clone(mask));
        }
        let mask: Arc<[bool]> = quote_mask(text).into();
        self.mask_cache = Some((text.clone(), Arc::clone(&mask)));
        Some(mask)
    }

    fn record(&mut self, text: Text, found: Option<Found>, reverse: bool) -> bool {
        let Some(found) = found else {
            self.last = RegRes::failed(text, self.n_groups);
            return false;
        };
        let next = if reverse {
            found.start
        } else if found.start == found.end {
            // An empty match is not found again at the same offset.
            found.end + 1
        } else {
            found.end
        };
        self.resume = Some((text.clone(), next));
        self.last = RegRes::from_found(text, found, self.n_groups);
        true
    }

    // ─── Replacement ────────────────────────────────────────────────────────

    pub fn replace_rule(&self) -> &ReplaceRule {
        &self.rule
    }

    pub fn set_replace_rule(&mut self, rule: ReplaceRule) -> &mut Self {
        self.rule = rule;
        self
    }

    /// Compile `template` against the process-wide rule registry and use it
    /// as the replacement. On error the current rule is kept.
    pub fn set_replacement(&mut self, template: &str) -> Result<&mut Self, RegexError> {
        self.rule = ReplaceRule::parse(template)?;
        Ok(self)
    }

    /// A replacer that starts out searching with this pattern.
    pub fn replacer(&self) -> Replacer<'_> {
        Replacer::new(self)
    }

    pub fn replace_first(&self, text: impl Into<Text>) -> String {
        self.replacer().replace_first(text)
    }

    pub fn replace_first_from(&self, text: impl Into<Text>, start: usize) -> String {
        self.replacer().replace_first_from(text, start)
    }

    pub fn replace_first_region(&self, text: impl Into<Text>, start: usize, end: usize) -> String {
        self.replacer().replace_first_region(text, start, end)
    }

    pub fn replace_all(&self, text: impl Into<Text>) -> String {
        self.replacer().replace_all(text)
    }

    pub fn replace_all_from(&self, text: impl Into<Text>, start: usize) -> String {
        self.replacer().replace_all_from(text, start)
    }

    pub fn replace_all_region(&self, text: impl Into<Text>, start: usize, end: usize) -> String {
        self.replacer().replace_all_region(text, start, end)
    }
}

impl Searcher for Regex {
    fn find(
        &self,
        text: &Text,
        masks: &QuoteMask<'_>,
        start: usize,
        end: usize,
        last_end: usize,
    ) -> Option<Hit> {
        let mask = self.flags.dont_match_in_quotes.then(|| masks.get());
        let found = self.find_found(text, mask, start, end, last_end)?;
        Some(Hit {
            res: RegRes::from_found(text.clone(), found, self.n_groups),
            rule: self.rule.clone(),
        })
    }
}

impl Clone for Regex {
    /// An independent copy holding only the live part of the graph.
    fn clone(&self) -> Self {
        Self {
            pattern: self.pattern.clone(),
            esc: self.esc,
            graph: self.graph.compacted(),
            plain: self.plain.as_ref().map(|g| Box::new(g.compacted())),
            n_groups: self.n_groups,
            flags: self.flags,
            optimized: self.optimized,
            skip: self.skip.clone(),
            min_match: self.min_match,
            rule: self.rule.clone(),
            last: self.last.clone(),
            resume: self.resume.clone(),
            mask_cache: self.mask_cache.clone(),
        }
    }
}

impl fmt::Display for Regex {
    /// Decompile to a pattern that compiles back to an equivalent regex.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.esc != ESC {
            f.write_str("(?e=")?;
            f.write_str(&String::from_utf16_lossy(&[self.esc]))?;
            f.write_str(")")?;
        }
        let fl = self.flags;
        let dot_all = fl.dot_all || default_dot_matches_newline();
        let letters: String = [
            (fl.ignore_case, 'i'),
            (fl.multiline, 'm'),
            (dot_all, 's'),
            (fl.dont_match_in_quotes, 'Q'),
            (self.optimized, 'o'),
            (fl.global, 'g'),
        ]
        .iter()
        .filter(|(on, _)| *on)
        .map(|&(_, c)| c)
        .collect();
        if !letters.is_empty() {
            write!(f, "(?{letters})")?;
        }
        let body = self.graph.to_string();
        if self.esc == ESC {
            f.write_str(&body)
        } else {
            let units: Vec<u16> = body.encode_utf16().collect();
            f.write_str(&String::from_utf16_lossy(&re_escape(&units, ESC, self.esc)))
        }
    }
}

impl fmt::Debug for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Regex")
            .field("pattern", &self.pattern)
            .field("flags", &self.flags)
            .field("optimized", &self.optimized)
            .field("groups", &self.n_groups)
            .finish()
    }
}

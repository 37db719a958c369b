//! Backtracking matcher over a compiled [`Graph`].
//!
//! Matching is continuation passing: a node that succeeds goes on to match
//! its logical successor, so a call returns only once the whole pattern has
//! matched (the end offset) or every alternative below it has failed
//! (`None`). Per-activation state such as a repetition count lives in
//! [`Frame`]s on the Rust stack, linked to the frame of the enclosing
//! activation.
//!
//! All positions are **UTF-16 code unit** indices.

use crate::quant::Bound;
use crate::source::CharSource;
use crate::unicode::eq_ignore_case;

use super::char_class::{ClassItem, bracket_matches, is_word_unit};
use super::graph::{Graph, NodeId, NodeKind, RepeatSpec, Step};
use super::skip::Skip;

/// Runtime switches that change how nodes match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchFlags {
    pub ignore_case: bool,
    /// `.` also matches `\n`.
    pub dot_all: bool,
    /// `^` and `$` also match around `\n`.
    pub multiline: bool,
}

/// A successful match: the overall span and the group marks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub start: usize,
    pub end: usize,
    /// `2 * (n_groups + 1)` slots; group `g` starts at `g` and ends at
    /// `g + n_groups`, `-1` when it did not take part.
    pub marks: Vec<isize>,
}

/// What to do once the chain owned by an activation runs out.
#[derive(Clone, Copy)]
enum Frame<'f> {
    /// The top of a match, or of a sub-match run on its own.
    Accept,
    /// Continue after the owner.
    Resume { owner: NodeId, up: &'f Frame<'f> },
    /// Close the group, then continue after the owner.
    Capture {
        owner: NodeId,
        group: usize,
        up: &'f Frame<'f>,
    },
    /// One iteration of a repetition ended.
    Repeat {
        owner: NodeId,
        count: usize,
        iter_start: usize,
        up: &'f Frame<'f>,
    },
    /// The body of a custom extension started at `start`.
    Custom {
        owner: NodeId,
        start: usize,
        up: &'f Frame<'f>,
    },
}

/// Mark every unit from an opening `"` or `'` up to and including its
/// closing quote. A `\` inside quotes also masks the unit after it.
pub fn quote_mask(src: &dyn CharSource) -> Vec<bool> {
    let len = src.len();
    let mut mask = vec![false; len];
    let mut quote: Option<u16> = None;
    let mut i = 0;
    while i < len {
        let c = src.unit_at(i);
        match quote {
            None => {
                if c == b'"' as u16 || c == b'\'' as u16 {
                    quote = Some(c);
                    mask[i] = true;
                }
            }
            Some(q) => {
                mask[i] = true;
                if c == q {
                    quote = None;
                } else if c == b'\\' as u16 && i + 1 < len {
                    i += 1;
                    mask[i] = true;
                }
            }
        }
        i += 1;
    }
    mask
}

pub struct MatchState<'a> {
    graph: &'a Graph,
    src: &'a dyn CharSource,
    len: usize,
    flags: MatchFlags,
    mask: Option<&'a [bool]>,
    marks: Vec<isize>,
    n_groups: usize,
    last_end: usize,
    no_check: bool,
}

impl<'a> MatchState<'a> {
    /// `last_end` is the offset `\G` matches at.
    pub fn new(
        graph: &'a Graph,
        src: &'a dyn CharSource,
        n_groups: usize,
        flags: MatchFlags,
        mask: Option<&'a [bool]>,
        last_end: usize,
    ) -> Self {
        Self {
            graph,
            src,
            len: src.len(),
            flags,
            mask,
            marks: vec![-1; 2 * (n_groups + 1)],
            n_groups,
            last_end,
            no_check: false,
        }
    }

    // ─── Public API ─────────────────────────────────────────────────────────

    /// Try to match starting exactly at `pos`.
    pub fn attempt(&mut self, pos: usize) -> Option<Found> {
        if pos > self.len {
            return None;
        }
        self.marks.fill(-1);
        let graph = self.graph;
        let r = self.at(graph.start(), pos, &Frame::Accept)?;
        // A rewind can leave the match ending before it began.
        let (start, end) = if r < pos { (r + 1, pos) } else { (pos, r) };
        Some(Found {
            start,
            end,
            marks: self.marks.clone(),
        })
    }

    /// Leftmost match starting in `start..=end`.
    ///
    /// Start offsets that leave fewer than `min_match` units before the end
    /// of the text are not tried. With a prefilter only its candidates are
    /// tried and literal runs it verified are not checked again.
    pub fn search(
        &mut self,
        skip: Option<&Skip>,
        min_match: usize,
        start: usize,
        end: usize,
    ) -> Option<Found> {
        let end = end.min(self.len);
        let mut up = end.min(self.len.saturating_sub(min_match));
        if min_match > self.len || (up < start && end >= start) {
            up = start;
        }
        self.no_check = skip.is_some();
        let mut i = start;
        let found = loop {
            if i > up {
                break None;
            }
            if let Some(skip) = skip {
                match skip.find(self.src, i, up) {
                    Some(candidate) => i = candidate,
                    None => break None,
                }
            }
            if let Some(found) = self.attempt(i) {
                break Some(found);
            }
            i += 1;
        };
        self.no_check = false;
        found
    }

    /// Rightmost match starting in `start..=end`, scanning downwards.
    pub fn search_reverse(&mut self, start: usize, end: usize) -> Option<Found> {
        let end = end.min(self.len);
        (start..=end).rev().find_map(|i| self.attempt(i))
    }

    // ─── Node dispatch ──────────────────────────────────────────────────────

    fn masked(&self, pos: usize) -> bool {
        self.mask.is_some_and(|m| m.get(pos).copied().unwrap_or(false))
    }

    /// The unit at `pos` if it may be matched by a maskable node.
    fn unmasked_unit(&self, pos: usize) -> Option<u16> {
        (pos < self.len && !self.masked(pos)).then(|| self.src.unit_at(pos))
    }

    fn is_word_at(&self, pos: isize) -> bool {
        pos >= 0 && (pos as usize) < self.len && is_word_unit(self.src.unit_at(pos as usize))
    }

    /// Run `f`, restoring the marks if it fails.
    fn trial(&mut self, f: impl FnOnce(&mut Self) -> Option<usize>) -> Option<usize> {
        let saved = self.marks.clone();
        let r = f(self);
        if r.is_none() {
            self.marks.copy_from_slice(&saved);
        }
        r
    }

    /// Match whatever follows `id`.
    fn next(&mut self, id: NodeId, pos: usize, k: &Frame<'_>) -> Option<usize> {
        match self.graph.successor(id) {
            Step::Node(n) => self.at(n, pos, k),
            Step::Exit(_) | Step::End => self.finish(pos, k),
        }
    }

    /// The chain of the innermost activation is done at `pos`.
    fn finish(&mut self, pos: usize, k: &Frame<'_>) -> Option<usize> {
        match *k {
            Frame::Accept => Some(pos),
            Frame::Resume { owner, up } | Frame::Custom { owner, up, .. } => {
                self.next(owner, pos, up)
            }
            Frame::Capture { owner, group, up } => {
                let slot = group + self.n_groups;
                let old = self.marks[slot];
                self.marks[slot] = pos as isize;
                let r = self.next(owner, pos, up);
                if r.is_none() {
                    self.marks[slot] = old;
                }
                r
            }
            Frame::Repeat {
                owner,
                count,
                iter_start,
                up,
            } => {
                if pos == iter_start {
                    // An empty iteration would repeat forever.
                    return self.next(owner, pos, up);
                }
                self.repeat(owner, count, pos, up)
            }
        }
    }

    fn at(&mut self, id: NodeId, pos: usize, k: &Frame<'_>) -> Option<usize> {
        let graph = self.graph;
        match graph.kind(id) {
            NodeKind::Char { unit, alt } => {
                let c = self.unmasked_unit(pos)?;
                let hit = c == *unit || (self.flags.ignore_case && (c == alt.0 || c == alt.1));
                if hit { self.next(id, pos + 1, k) } else { None }
            }
            NodeKind::ExactChar(unit) => {
                if pos < self.len && self.src.unit_at(pos) == *unit {
                    self.next(id, pos + 1, k)
                } else {
                    None
                }
            }
            NodeKind::Skipped(units) => {
                let end = pos + units.len();
                if end > self.len {
                    return None;
                }
                let ok = self.no_check
                    || units.iter().enumerate().all(|(i, &u)| {
                        let c = self.src.unit_at(pos + i);
                        c == u || (self.flags.ignore_case && eq_ignore_case(u, c))
                    });
                if ok { self.next(id, end, k) } else { None }
            }
            NodeKind::Range { lo, hi } => {
                let c = self.unmasked_unit(pos)?;
                if ClassItem::span(*lo, *hi).contains(c, self.flags.ignore_case) {
                    self.next(id, pos + 1, k)
                } else {
                    None
                }
            }
            NodeKind::Any => {
                if pos < self.len && (self.flags.dot_all || self.src.unit_at(pos) != b'\n' as u16)
                {
                    self.next(id, pos + 1, k)
                } else {
                    None
                }
            }
            NodeKind::Bracket { negated, items } => {
                let c = self.unmasked_unit(pos)?;
                if bracket_matches(*negated, items, c, self.flags.ignore_case) {
                    self.next(id, pos + 1, k)
                } else {
                    None
                }
            }
            NodeKind::FastBracket(set) => {
                let c = self.unmasked_unit(pos)?;
                if set.contains(c) { self.next(id, pos + 1, k) } else { None }
            }
            NodeKind::Class(alts) => {
                let frame = Frame::Resume { owner: id, up: k };
                alts.iter()
                    .find_map(|&alt| self.trial(|s| s.at(alt, pos, &frame)))
            }
            NodeKind::Capture { group, alts } => self.capture(id, *group, alts, pos, k),
            NodeKind::LookAhead { negate, alts } => self.look_ahead(id, *negate, alts, pos, k),
            NodeKind::Dispatch { table, .. } => {
                let c = self.unmasked_unit(pos)?;
                let target = *table.get(&c)?;
                self.at(target, pos + 1, k)
            }
            NodeKind::Repeat { .. } => self.repeat(id, 0, pos, k),
            NodeKind::FastRepeat { spec, body, step } => {
                self.fixed_repeat(id, spec, pos, k, *step, |s, p| {
                    s.at(*body, p, &Frame::Accept)
                })
            }
            NodeKind::DotRepeat(spec) => self.fixed_repeat(id, spec, pos, k, 1, |s, p| {
                (p < s.len && (s.flags.dot_all || s.src.unit_at(p) != b'\n' as u16))
                    .then_some(p + 1)
            }),
            NodeKind::Start { line } => {
                let at_line_start = *line
                    && self.flags.multiline
                    && pos > 0
                    && self.src.unit_at(pos - 1) == b'\n' as u16;
                if pos == 0 || at_line_start {
                    self.next(id, pos, k)
                } else {
                    None
                }
            }
            NodeKind::End { line } => {
                let at_line_end = *line
                    && self.flags.multiline
                    && pos < self.len
                    && self.src.unit_at(pos) == b'\n' as u16;
                if pos == self.len || at_line_end {
                    self.next(id, pos, k)
                } else {
                    None
                }
            }
            NodeKind::WordBoundary | NodeKind::NotWordBoundary => {
                let p = pos as isize;
                let boundary = self.is_word_at(p - 1) != self.is_word_at(p);
                if boundary == matches!(graph.kind(id), NodeKind::WordBoundary) {
                    self.next(id, pos, k)
                } else {
                    None
                }
            }
            NodeKind::ResumeAnchor => {
                if pos == self.last_end {
                    self.next(id, pos, k)
                } else {
                    None
                }
            }
            NodeKind::Backup(n) => {
                let target = pos as isize - *n;
                if target < 0 || target as usize > self.len {
                    return None;
                }
                self.next(id, target as usize, k)
            }
            NodeKind::BackRef(group) => self.back_ref(id, *group, pos, k),
            NodeKind::Balanced { open, close } => self.balanced(id, *open, *close, pos, k),
            NodeKind::Custom { body, .. } => {
                let frame = Frame::Custom {
                    owner: id,
                    start: pos,
                    up: k,
                };
                self.at(*body, pos, &frame)
            }
            NodeKind::CustomEnd { custom } => {
                let Frame::Custom { start, .. } = *k else {
                    debug_assert!(false, "custom endpoint reached outside its body");
                    return None;
                };
                let NodeKind::Custom { validator, .. } = graph.kind(*custom) else {
                    unreachable!("custom endpoint paired with a non-custom node");
                };
                let end = validator.validate(self.src, start, pos)?;
                if end > self.len {
                    return None;
                }
                self.next(id, end, k)
            }
            NodeKind::Null => self.next(id, pos, k),
            NodeKind::NoPattern => None,
        }
    }

    // ─── Groups ─────────────────────────────────────────────────────────────

    fn capture(
        &mut self,
        id: NodeId,
        group: usize,
        alts: &[NodeId],
        pos: usize,
        k: &Frame<'_>,
    ) -> Option<usize> {
        let old_start = self.marks[group];
        self.marks[group] = pos as isize;
        let frame = Frame::Capture {
            owner: id,
            group,
            up: k,
        };
        for &alt in alts {
            if let Some(r) = self.trial(|s| s.at(alt, pos, &frame)) {
                self.normalize_span(group);
                return Some(r);
            }
        }
        self.marks[group] = old_start;
        None
    }

    /// A rewind inside a group can close it before it opened; such a span
    /// is reported as the units between the two marks.
    fn normalize_span(&mut self, group: usize) {
        let end_slot = group + self.n_groups;
        let (start, end) = (self.marks[group], self.marks[end_slot]);
        if start >= 0 && end >= 0 && start > end {
            self.marks[group] = end + 1;
            self.marks[end_slot] = start + 1;
        }
    }

    fn look_ahead(
        &mut self,
        id: NodeId,
        negate: bool,
        alts: &[NodeId],
        pos: usize,
        k: &Frame<'_>,
    ) -> Option<usize> {
        let saved = self.marks.clone();
        let hit = alts
            .iter()
            .any(|&alt| self.trial(|s| s.at(alt, pos, &Frame::Accept)).is_some());
        if negate {
            self.marks.copy_from_slice(&saved);
            return if hit { None } else { self.next(id, pos, k) };
        }
        if !hit {
            return None;
        }
        let r = self.next(id, pos, k);
        if r.is_none() {
            self.marks.copy_from_slice(&saved);
        }
        r
    }

    fn back_ref(&mut self, id: NodeId, group: usize, pos: usize, k: &Frame<'_>) -> Option<usize> {
        if group == 0 || group > self.n_groups {
            return None;
        }
        let (start, end) = (self.marks[group], self.marks[group + self.n_groups]);
        if start < 0 || end < start {
            return None;
        }
        let (start, n) = (start as usize, (end - start) as usize);
        if pos + n > self.len {
            return None;
        }
        if (0..n).all(|i| self.src.unit_at(start + i) == self.src.unit_at(pos + i)) {
            self.next(id, pos + n, k)
        } else {
            None
        }
    }

    fn balanced(
        &mut self,
        id: NodeId,
        open: u16,
        close: u16,
        pos: usize,
        k: &Frame<'_>,
    ) -> Option<usize> {
        if self.unmasked_unit(pos)? != open {
            return None;
        }
        let mut depth = 1usize;
        let mut i = pos + 1;
        while i < self.len {
            if !self.masked(i) {
                let c = self.src.unit_at(i);
                if c == b'\\' as u16 {
                    i += 2;
                    continue;
                }
                if c == close {
                    depth -= 1;
                    if depth == 0 {
                        return self.next(id, i + 1, k);
                    }
                } else if c == open {
                    depth += 1;
                }
            }
            i += 1;
        }
        None
    }

    // ─── Repetition ─────────────────────────────────────────────────────────

    /// Generic repetition with `count` iterations done so far.
    fn repeat(&mut self, id: NodeId, count: usize, pos: usize, k: &Frame<'_>) -> Option<usize> {
        let NodeKind::Repeat { spec, body } = self.graph.kind(id) else {
            unreachable!("repeat frame owned by a non-repeat node");
        };
        let (spec, body) = (*spec, *body);
        let can_stop = count >= spec.min.value();
        let at_max = spec.max == Bound::Finite(count);
        if can_stop && (spec.lazy || at_max) {
            if let Some(r) = self.trial(|s| s.next(id, pos, k)) {
                return Some(r);
            }
            if at_max {
                return None;
            }
        }
        if spec.max.admits(count + 1) {
            let frame = Frame::Repeat {
                owner: id,
                count: count + 1,
                iter_start: pos,
                up: k,
            };
            if let Some(r) = self.trial(|s| s.at(body, pos, &frame)) {
                return Some(r);
            }
        }
        if can_stop && !spec.lazy {
            return self.next(id, pos, k);
        }
        None
    }

    /// Repetition of a body that always consumes `step` units and never
    /// needs to be re-entered. `body` returns the end of one iteration.
    fn fixed_repeat(
        &mut self,
        id: NodeId,
        spec: &RepeatSpec,
        pos: usize,
        k: &Frame<'_>,
        step: usize,
        body: impl Fn(&mut Self, usize) -> Option<usize>,
    ) -> Option<usize> {
        let min = spec.min.value();
        if spec.lazy {
            let (mut count, mut p) = (0usize, pos);
            loop {
                if count >= min
                    && let Some(r) = self.trial(|s| s.next(id, p, k))
                {
                    return Some(r);
                }
                if !spec.max.admits(count + 1) {
                    return None;
                }
                match body(self, p) {
                    Some(e) if e > p => {
                        p = e;
                        count += 1;
                    }
                    _ => return None,
                }
            }
        }
        let (mut count, mut p) = (0usize, pos);
        while spec.max.admits(count + 1) {
            match body(self, p) {
                Some(e) if e > p => {
                    p = e;
                    count += 1;
                }
                _ => break,
            }
        }
        if count < min {
            return None;
        }
        loop {
            if let Some(r) = self.trial(|s| s.next(id, p, k)) {
                return Some(r);
            }
            if count == min {
                return None;
            }
            count -= 1;
            p -= step;
        }
    }
}

//! Recursive descent compiler from pattern text to a [`Graph`].
//!
//! Every element handler is entered with the cursor on the element's first
//! unit and leaves it on the element's last unit; the sequence loop steps
//! past it.

use phf::{Map, phf_map};

use crate::error::RegexError;
use crate::quant::Bound;
use crate::regex::Flags;

use super::char_class::{self, ClassItem};
use super::cursor::{ESC, PatCursor, re_escape};
use super::graph::{Graph, NodeId, NodeKind, RepeatSpec};
use super::validator::{Extension, ExtensionRegistry};

/// Nesting limit for extensions that invoke other extensions.
const MAX_EXTENSION_DEPTH: usize = 32;

/// Single-letter escapes that stand for one control character.
static CONTROL_ESCAPES: Map<u8, u16> = phf_map! {
    b'f' => 12u16,
    b'a' => 7u16,
    b't' => 9u16,
    b'n' => 10u16,
    b'r' => 13u16,
    b'e' => 27u16,
};

/// The output of a successful compile.
#[derive(Debug, Clone)]
pub struct Compiled {
    pub graph: Graph,
    /// Number of capture groups.
    pub n_groups: usize,
    /// Flags switched on by `(?imsgoQ)` inside the pattern.
    pub flags: Flags,
}

/// Compile `pattern`, written with `esc` as its escape unit.
///
/// A leading `(?e=X)` directive switches the escape unit to `X` for the rest
/// of the pattern.
pub fn compile(
    pattern: &[u16],
    esc: u16,
    registry: &ExtensionRegistry,
) -> Result<Compiled, RegexError> {
    let normalized = normalize_escape(pattern, esc);
    let mut parser = Parser {
        graph: Graph::new(),
        registry,
        next_group: 1,
        flags: Flags::default(),
        ext_depth: 0,
    };
    let mut cur = PatCursor::new(&normalized);
    let alts = parser.alternatives(&mut cur, false, false)?;
    let start = parser.join(alts);
    parser.graph.set_start(start);
    log::trace!(
        "compiled {:?}: {} nodes, {} groups",
        String::from_utf16_lossy(pattern),
        parser.graph.len(),
        parser.next_group - 1
    );
    Ok(Compiled {
        graph: parser.graph,
        n_groups: parser.next_group - 1,
        flags: parser.flags,
    })
}

/// Rewrite the pattern to use the default escape unit.
fn normalize_escape(pattern: &[u16], esc: u16) -> Vec<u16> {
    let directive: Vec<u16> = "(?e=".encode_utf16().collect();
    if pattern.len() >= 6 && pattern.starts_with(&directive) && pattern[5] == b')' as u16 {
        return re_escape(&pattern[6..], pattern[4], ESC);
    }
    re_escape(pattern, esc, ESC)
}

/// Perl's `\cX`: the upper-cased letter with bit 6 flipped.
pub(crate) fn control_char(c: u16) -> u16 {
    if c < 0x80 {
        (c as u8).to_ascii_uppercase() as u16 ^ 0x40
    } else {
        c
    }
}

fn hex_value(cur: &PatCursor<'_>) -> Option<u16> {
    if cur.eos() || cur.escaped() {
        return None;
    }
    char::from_u32(cur.c() as u32)?
        .to_digit(16)
        .map(|d| d as u16)
}

fn is_octal(cur: &PatCursor<'_>, escaped: bool) -> bool {
    !cur.eos() && cur.escaped() == escaped && (b'0' as u16..=b'7' as u16).contains(&cur.c())
}

fn is_digit(cur: &PatCursor<'_>) -> bool {
    !cur.eos() && (b'0' as u16..=b'9' as u16).contains(&cur.c())
}

/// `\xHH`: an escaped `x` followed by two unescaped hex digits.
fn hex_escape(cur: &mut PatCursor<'_>) -> Option<u16> {
    if !cur.esc_is(b'x') {
        return None;
    }
    let first = cur.peek();
    let hi = hex_value(&first)?;
    let lo = hex_value(&first.peek())?;
    cur.inc();
    cur.inc();
    Some(hi * 16 + lo)
}

/// An escaped octal digit followed by one or two unescaped octal digits.
fn octal_escape(cur: &mut PatCursor<'_>) -> Option<u16> {
    if !is_octal(cur, true) || !is_octal(&cur.peek(), false) {
        return None;
    }
    let mut d = cur.c() - b'0' as u16;
    cur.inc();
    d = d * 8 + cur.c() - b'0' as u16;
    if is_octal(&cur.peek(), false) {
        cur.inc();
        d = d * 8 + cur.c() - b'0' as u16;
    }
    Some(d)
}

struct Parser<'r> {
    graph: Graph,
    registry: &'r ExtensionRegistry,
    next_group: usize,
    flags: Flags,
    ext_depth: usize,
}

impl Parser<'_> {
    /// Parse `a|b|...` up to the end of the pattern, or up to the `)` that
    /// closes the current group when `in_group` is set. Returns the head of
    /// each alternative.
    fn alternatives(
        &mut self,
        cur: &mut PatCursor<'_>,
        in_group: bool,
        no_back_refs: bool,
    ) -> Result<Vec<NodeId>, RegexError> {
        let mut alts = Vec::new();
        let mut seq = Vec::new();
        loop {
            if cur.eos() {
                if in_group {
                    return Err(RegexError::syntax("Unclosed ()"));
                }
                break;
            }
            if in_group && cur.is(b')') {
                break;
            }
            if cur.is(b'|') {
                alts.push(self.link(std::mem::take(&mut seq)));
            } else {
                self.element(cur, &mut seq, no_back_refs)?;
            }
            cur.inc();
        }
        alts.push(self.link(seq));
        Ok(alts)
    }

    /// Chain the elements of one alternative; an empty one becomes `Null`.
    fn link(&mut self, seq: Vec<NodeId>) -> NodeId {
        let Some(&head) = seq.first() else {
            return self.graph.add(NodeKind::Null);
        };
        for pair in seq.windows(2) {
            self.graph.node_mut(pair[0]).next = Some(pair[1]);
        }
        head
    }

    /// A single alternative as-is, several wrapped in a non-capturing group.
    fn join(&mut self, alts: Vec<NodeId>) -> NodeId {
        if let [only] = alts[..] {
            return only;
        }
        self.owner(NodeKind::Class(alts.clone()), &alts)
    }

    /// Add a node that owns the chains at `heads`.
    fn owner(&mut self, kind: NodeKind, heads: &[NodeId]) -> NodeId {
        let id = self.graph.add(kind);
        for &h in heads {
            self.graph.set_parent(h, Some(id));
        }
        id
    }

    fn element(
        &mut self,
        cur: &mut PatCursor<'_>,
        seq: &mut Vec<NodeId>,
        no_back_refs: bool,
    ) -> Result<(), RegexError> {
        if cur.is(b'[') {
            cur.inc();
            let id = self.bracket(cur)?;
            seq.push(id);
            return Ok(());
        }
        if cur.inc_match("(?<") {
            let n = self.backup_count(cur, "(?<")?;
            seq.push(self.graph.add(NodeKind::Backup(n)));
            return Ok(());
        }
        if cur.inc_match("(?>") {
            let n = self.backup_count(cur, "(?>")?;
            seq.push(self.graph.add(NodeKind::Backup(-n)));
            return Ok(());
        }
        if cur.inc_match("(?@") {
            let open = cur.c();
            cur.inc();
            let close = cur.c();
            cur.inc();
            if !cur.is(b')') {
                return Err(RegexError::syntax("(?@ does not have closing paren"));
            }
            seq.push(self.graph.add(NodeKind::Balanced { open, close }));
            return Ok(());
        }
        if cur.inc_match("(?#") {
            while !cur.is(b')') {
                if cur.eos() {
                    return Err(RegexError::syntax("Unterminated (?# comment"));
                }
                cur.inc();
            }
            return Ok(());
        }
        if cur.escaped() {
            if let Some(id) = self.escape_class(cur.c()) {
                seq.push(id);
                return Ok(());
            }
            if let Some(d) = octal_escape(cur) {
                seq.push(self.graph.add(NodeKind::char(d)));
                return Ok(());
            }
            if (b'1' as u16..=b'9' as u16).contains(&cur.c()) {
                let mut group = (cur.c() - b'0' as u16) as usize;
                let next = cur.peek();
                if !next.escaped() && is_digit(&next) {
                    group = group * 10 + (next.c() - b'0' as u16) as usize;
                    cur.inc();
                }
                seq.push(self.graph.add(NodeKind::BackRef(group)));
                return Ok(());
            }
        }
        let anchor = if cur.esc_is(b'b') || cur.is(0x08) {
            Some(NodeKind::WordBoundary)
        } else if cur.is(b'$') {
            Some(NodeKind::End { line: true })
        } else if cur.esc_is(b'Z') {
            Some(NodeKind::End { line: false })
        } else if cur.is(b'.') {
            Some(NodeKind::Any)
        } else {
            None
        };
        if let Some(kind) = anchor {
            seq.push(self.graph.add(kind));
            return Ok(());
        }
        if cur.inc_match("(??") {
            let id = self.extension(cur)?;
            seq.push(id);
            return Ok(());
        }
        if cur.is(b'(') {
            if let Some(id) = self.group(cur, no_back_refs)? {
                seq.push(id);
            }
            return Ok(());
        }
        if cur.is(b'^') {
            seq.push(self.graph.add(NodeKind::Start { line: true }));
            return Ok(());
        }
        if cur.esc_is(b'A') {
            seq.push(self.graph.add(NodeKind::Start { line: false }));
            return Ok(());
        }
        if cur.is(b'*') {
            return self.quantify(seq, Bound::ZERO, Bound::Infinite);
        }
        if cur.is(b'+') {
            return self.quantify(seq, Bound::ONE, Bound::Infinite);
        }
        if cur.is(b'?') {
            return self.quantify(seq, Bound::ZERO, Bound::ONE);
        }
        if cur.is(b'{') {
            let save = cur.clone();
            if let Some((min, max)) = brace_bounds(cur) {
                return self.quantify(seq, min, max);
            }
            *cur = save;
            seq.push(self.graph.add(NodeKind::char(cur.c())));
            return Ok(());
        }
        if let Some(d) = hex_escape(cur) {
            seq.push(self.graph.add(NodeKind::char(d)));
            return Ok(());
        }
        if cur.esc_is(b'c') {
            cur.inc();
            seq.push(self.graph.add(NodeKind::char(control_char(cur.c()))));
            return Ok(());
        }
        if cur.escaped()
            && let Some(&u) = u8::try_from(cur.c())
                .ok()
                .and_then(|b| CONTROL_ESCAPES.get(&b))
        {
            seq.push(self.graph.add(NodeKind::char(u)));
            return Ok(());
        }
        if cur.is(b')') {
            return Err(RegexError::syntax("Unmatched right paren in pattern"));
        }
        seq.push(self.graph.add(NodeKind::char(cur.c())));
        Ok(())
    }

    /// `\w \s \d \W \S \D \G \B` outside brackets.
    fn escape_class(&mut self, letter: u16) -> Option<NodeId> {
        let kind = match u8::try_from(letter).ok()? {
            b'd' => NodeKind::Range {
                lo: b'0' as u16,
                hi: b'9' as u16,
            },
            b'G' => NodeKind::ResumeAnchor,
            b'B' => NodeKind::NotWordBoundary,
            _ => {
                let (negated, items) = char_class::shorthand(letter)?;
                NodeKind::Bracket {
                    negated,
                    items: items.to_vec(),
                }
            }
        };
        Some(self.graph.add(kind))
    }

    fn backup_count(&mut self, cur: &mut PatCursor<'_>, opener: &str) -> Result<isize, RegexError> {
        let Some(Bound::Finite(n)) = cur.get_bound() else {
            return Err(RegexError::syntax(format!("No int after {opener}")));
        };
        if !cur.is(b')') {
            return Err(RegexError::syntax(format!("No ) after {opener}")));
        }
        isize::try_from(n).map_err(|_| RegexError::syntax(format!("Count too large in {opener}")))
    }

    /// `(`, `(?:`, `(?=`, `(?!` and `(?flags)`. Flag groups produce no node.
    fn group(
        &mut self,
        cur: &mut PatCursor<'_>,
        no_back_refs: bool,
    ) -> Result<Option<NodeId>, RegexError> {
        enum Opener {
            Plain,
            Look(bool),
            Capture,
        }
        let opener = if cur.inc_match("(?:") {
            Opener::Plain
        } else if cur.inc_match("(?=") {
            Opener::Look(false)
        } else if cur.inc_match("(?!") {
            Opener::Look(true)
        } else if cur.inc_match("(?") {
            self.inline_flags(cur)?;
            return Ok(None);
        } else {
            cur.inc();
            Opener::Capture
        };
        let group = match opener {
            Opener::Capture if !no_back_refs => {
                let g = self.next_group;
                self.next_group += 1;
                Some(g)
            }
            _ => None,
        };
        let alts = self.alternatives(cur, true, no_back_refs)?;
        let kind = match (opener, group) {
            (Opener::Look(negate), _) => NodeKind::LookAhead {
                negate,
                alts: alts.clone(),
            },
            (_, Some(group)) => NodeKind::Capture {
                group,
                alts: alts.clone(),
            },
            _ => NodeKind::Class(alts.clone()),
        };
        Ok(Some(self.owner(kind, &alts)))
    }

    fn inline_flags(&mut self, cur: &mut PatCursor<'_>) -> Result<(), RegexError> {
        loop {
            if cur.eos() {
                return Err(RegexError::syntax("Unclosed ()"));
            }
            if cur.is(b')') {
                return Ok(());
            }
            match u8::try_from(cur.c()).unwrap_or(0) {
                b'i' => self.flags.ignore_case = true,
                b'Q' => self.flags.dont_match_in_quotes = true,
                b'o' => self.flags.optimize = true,
                b'g' => self.flags.global = true,
                b's' => self.flags.dot_all = true,
                b'm' => self.flags.multiline = true,
                _ => {}
            }
            cur.inc();
        }
    }

    /// Apply a quantifier to the last element of `seq`.
    fn quantify(&mut self, seq: &mut [NodeId], min: Bound, max: Bound) -> Result<(), RegexError> {
        let Some(target) = seq.last_mut() else {
            return Err(RegexError::syntax("Quantifier with nothing to repeat"));
        };
        let lazy_mark = min == Bound::ZERO && max == Bound::ONE;
        if let Some(spec) = self.graph.node_mut(*target).kind.repeat_spec_mut() {
            if lazy_mark && !spec.lazy {
                spec.lazy = true;
                return Ok(());
            }
            return Err(RegexError::syntax("Double quantifier"));
        }
        if self.graph.max_chars(*target) == Bound::ZERO {
            return Err(RegexError::unsupported(
                "Quantifier applied to a zero-width element",
            ));
        }
        if !min.is_finite() {
            return Err(RegexError::syntax("Quantifier minimum cannot be inf"));
        }
        if min > max {
            return Err(RegexError::syntax(format!(
                "Quantifier bounds out of order: {{{min},{max}}}"
            )));
        }
        let spec = RepeatSpec {
            min,
            max,
            lazy: false,
        };
        if matches!(self.graph.kind(*target), NodeKind::Any) {
            self.graph.node_mut(*target).kind = NodeKind::DotRepeat(spec);
            return Ok(());
        }
        let body = *target;
        *target = self.owner(NodeKind::Repeat { spec, body }, &[body]);
        Ok(())
    }

    // --- Brackets ---

    /// Parse the members of `[...]`; the cursor starts after the `[`.
    fn bracket(&mut self, cur: &mut PatCursor<'_>) -> Result<NodeId, RegexError> {
        let negated = cur.is(b'^');
        if negated {
            cur.inc();
        }
        if cur.is(b']') {
            return Err(RegexError::syntax("Unmatched []"));
        }
        let mut items = Vec::new();
        loop {
            if cur.eos() {
                return Err(RegexError::syntax("Unterminated ["));
            }
            if cur.is(b']') {
                break;
            }
            if cur.esc_is(b'Q') {
                cur.inc();
                while !cur.esc_is(b'E') {
                    if cur.eos() {
                        return Err(RegexError::syntax("Unterminated \\Q in []"));
                    }
                    items.push(ClassItem::Unit(cur.c()));
                    cur.inc();
                }
            } else if let Some(set) = cur
                .escaped()
                .then(|| char_class::bracket_shorthand(cur.c()))
                .flatten()
            {
                items.extend(set);
            } else {
                let lo = class_atom(cur);
                let dash = cur.peek();
                let after = dash.peek();
                if dash.is(b'-') && !after.is(b']') && !after.eos() {
                    *cur = after;
                    if cur.escaped() && char_class::shorthand(cur.c()).is_some() {
                        return Err(RegexError::syntax("Class shorthand used as range end"));
                    }
                    let hi = class_atom(cur);
                    if hi < lo {
                        return Err(RegexError::syntax(format!(
                            "Invalid range in []: {}-{}",
                            String::from_utf16_lossy(&[lo]),
                            String::from_utf16_lossy(&[hi])
                        )));
                    }
                    items.push(ClassItem::span(lo, hi));
                } else {
                    items.push(ClassItem::Unit(lo));
                }
            }
            cur.inc();
        }
        Ok(self.graph.add(NodeKind::Bracket { negated, items }))
    }

    // --- Extensions ---

    /// `(??name)` or `(??name:arg)`; the cursor starts after `(??`.
    fn extension(&mut self, cur: &mut PatCursor<'_>) -> Result<NodeId, RegexError> {
        let mut name = Vec::new();
        while !cur.is(b')') && !cur.is(b':') {
            if cur.eos() {
                return Err(RegexError::syntax("Unterminated (??"));
            }
            name.push(cur.c());
            cur.inc();
        }
        let mut arg = None;
        if cur.inc_match(":") {
            let mut units = Vec::new();
            while !cur.is(b')') {
                if cur.eos() {
                    return Err(RegexError::syntax("Unterminated (??"));
                }
                units.push(cur.c());
                cur.inc();
            }
            arg = Some(String::from_utf16_lossy(&units));
        }
        let name = String::from_utf16_lossy(&name);
        if self.ext_depth >= MAX_EXTENSION_DEPTH {
            return Err(RegexError::unsupported(format!(
                "Extension (??{name}) nests too deeply"
            )));
        }
        let registry = self.registry;
        match registry.get(&name) {
            Some(Extension::Shorthand(pattern)) => {
                let alts = self.inline(pattern)?;
                Ok(self.owner(NodeKind::Class(alts.clone()), &alts))
            }
            Some(Extension::Custom {
                prototype,
                validator,
            }) => {
                let validator = arg
                    .as_deref()
                    .and_then(|a| validator.with_arg(a))
                    .unwrap_or_else(|| validator.clone());
                let alts = self.inline(prototype)?;
                let body = self.join(alts);
                let end = self.graph.add(NodeKind::CustomEnd { custom: body });
                self.graph.append(body, end);
                let custom = self.owner(
                    NodeKind::Custom {
                        name,
                        arg,
                        validator,
                        body,
                    },
                    &[body],
                );
                self.graph.node_mut(end).kind = NodeKind::CustomEnd { custom };
                Ok(custom)
            }
            None => Err(RegexError::unsupported(format!(
                "Undefined extension (??{name})"
            ))),
        }
    }

    /// Compile an extension's pattern into this graph. Its groups do not
    /// capture and its inline flags are ignored.
    fn inline(&mut self, pattern: &str) -> Result<Vec<NodeId>, RegexError> {
        let units: Vec<u16> = pattern.encode_utf16().collect();
        let mut cur = PatCursor::new(&units);
        let saved = self.flags;
        self.ext_depth += 1;
        let alts = self.alternatives(&mut cur, false, true);
        self.ext_depth -= 1;
        self.flags = saved;
        alts
    }
}

/// Parse `{m}`, `{m,}`, `{m,n}` or `{,n}`; the cursor starts on `{` and
/// ends on `}`. `None` means the brace is not a quantifier.
fn brace_bounds(cur: &mut PatCursor<'_>) -> Option<(Bound, Bound)> {
    cur.inc();
    let min = cur.get_bound();
    if cur.is(b'}') {
        let m = min?;
        return Some((m, m));
    }
    if !cur.is(b',') {
        return None;
    }
    cur.inc();
    let max = if cur.is(b'}') {
        min.map(|_| Bound::Infinite)
    } else {
        let m = cur.get_bound();
        if !cur.is(b'}') {
            return None;
        }
        m
    };
    Some((min.unwrap_or(Bound::ZERO), max?))
}

/// One member unit of a bracket, decoding escapes. The cursor ends on the
/// atom's last unit.
fn class_atom(cur: &mut PatCursor<'_>) -> u16 {
    if !cur.escaped() {
        return cur.c();
    }
    if let Some(d) = hex_escape(cur) {
        return d;
    }
    if let Some(d) = octal_escape(cur) {
        return d;
    }
    if cur.esc_is(b'c') {
        cur.inc();
        return control_char(cur.c());
    }
    if cur.esc_is(b'b') {
        return 0x08;
    }
    u8::try_from(cur.c())
        .ok()
        .and_then(|b| CONTROL_ESCAPES.get(&b).copied())
        .unwrap_or(cur.c())
}

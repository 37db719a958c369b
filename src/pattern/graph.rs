//! The compiled pattern: an arena of matcher nodes.
//!
//! Nodes form chains through `next`. A node that owns sub-chains (the
//! alternatives of a group, the body of a repetition) records their heads;
//! the last node of each sub-chain carries a `parent` link back to the owner
//! so the matcher can find what follows when the sub-chain runs out. Links
//! are plain indices, so the structure has no ownership cycles.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::quant::Bound;
use crate::unicode::case_variants;

use super::char_class::{self, ClassItem, FastSet};
use super::validator::Validator;

/// Index of a node in its [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Repetition bounds shared by the three repetition forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatSpec {
    pub min: Bound,
    pub max: Bound,
    pub lazy: bool,
}

#[derive(Clone)]
pub enum NodeKind {
    /// One unit; `alt` holds the case variants tried when ignoring case.
    Char { unit: u16, alt: (u16, u16) },
    /// One unit compared exactly.
    ExactChar(u16),
    /// A literal run already verified by the prefilter.
    Skipped(Vec<u16>),
    /// `lo-hi` outside a bracket, as produced by `\d`.
    Range { lo: u16, hi: u16 },
    Any,
    /// `(?:a|b)`.
    Class(Vec<NodeId>),
    Bracket { negated: bool, items: Vec<ClassItem> },
    FastBracket(FastSet),
    LookAhead { negate: bool, alts: Vec<NodeId> },
    Capture { group: usize, alts: Vec<NodeId> },
    /// Alternation keyed on the first unit. `keys` keeps insertion order;
    /// case variants of one branch share a target.
    Dispatch { keys: Vec<u16>, table: HashMap<u16, NodeId> },
    Repeat { spec: RepeatSpec, body: NodeId },
    /// A repetition whose body always consumes exactly `step` units.
    FastRepeat { spec: RepeatSpec, body: NodeId, step: usize },
    DotRepeat(RepeatSpec),
    /// `^` when `line`, `\A` otherwise.
    Start { line: bool },
    /// `$` when `line`, `\Z` otherwise.
    End { line: bool },
    WordBoundary,
    NotWordBoundary,
    /// `\G`.
    ResumeAnchor,
    /// `(?<N)` rewinds `N` units; `(?>N)` is stored as `-N` and advances.
    Backup(isize),
    BackRef(usize),
    /// `(?@oc)`.
    Balanced { open: u16, close: u16 },
    Custom {
        name: String,
        arg: Option<String>,
        validator: Arc<dyn Validator>,
        body: NodeId,
    },
    /// Closes the body of the paired [`NodeKind::Custom`].
    CustomEnd { custom: NodeId },
    Null,
    NoPattern,
}

impl NodeKind {
    pub fn char(unit: u16) -> Self {
        Self::Char {
            unit,
            alt: case_variants(unit),
        }
    }

    /// The literal unit, for nodes that match exactly one fixed unit.
    pub fn literal(&self) -> Option<u16> {
        match *self {
            Self::Char { unit, .. } | Self::ExactChar(unit) => Some(unit),
            _ => None,
        }
    }

    pub fn is_repeat(&self) -> bool {
        matches!(
            self,
            Self::Repeat { .. } | Self::FastRepeat { .. } | Self::DotRepeat(_)
        )
    }

    pub fn repeat_spec_mut(&mut self) -> Option<&mut RepeatSpec> {
        match self {
            Self::Repeat { spec, .. } | Self::FastRepeat { spec, .. } | Self::DotRepeat(spec) => {
                Some(spec)
            }
            _ => None,
        }
    }
}

impl fmt::Debug for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char { unit, .. } => write!(f, "Char({unit:#x})"),
            Self::ExactChar(u) => write!(f, "ExactChar({u:#x})"),
            Self::Skipped(units) => write!(f, "Skipped({})", String::from_utf16_lossy(units)),
            Self::Range { lo, hi } => write!(f, "Range({lo:#x}, {hi:#x})"),
            Self::Any => f.write_str("Any"),
            Self::Class(alts) => write!(f, "Class({alts:?})"),
            Self::Bracket { negated, items } => write!(f, "Bracket({negated}, {items:?})"),
            Self::FastBracket(set) => write!(f, "FastBracket({set:?})"),
            Self::LookAhead { negate, alts } => write!(f, "LookAhead({negate}, {alts:?})"),
            Self::Capture { group, alts } => write!(f, "Capture({group}, {alts:?})"),
            Self::Dispatch { keys, .. } => write!(f, "Dispatch({keys:?})"),
            Self::Repeat { spec, body } => write!(f, "Repeat({spec:?}, {body:?})"),
            Self::FastRepeat { spec, body, step } => {
                write!(f, "FastRepeat({spec:?}, {body:?}, {step})")
            }
            Self::DotRepeat(spec) => write!(f, "DotRepeat({spec:?})"),
            Self::Start { line } => write!(f, "Start({line})"),
            Self::End { line } => write!(f, "End({line})"),
            Self::WordBoundary => f.write_str("WordBoundary"),
            Self::NotWordBoundary => f.write_str("NotWordBoundary"),
            Self::ResumeAnchor => f.write_str("ResumeAnchor"),
            Self::Backup(n) => write!(f, "Backup({n})"),
            Self::BackRef(g) => write!(f, "BackRef({g})"),
            Self::Balanced { open, close } => write!(f, "Balanced({open:#x}, {close:#x})"),
            Self::Custom { name, arg, body, .. } => write!(f, "Custom({name}, {arg:?}, {body:?})"),
            Self::CustomEnd { custom } => write!(f, "CustomEnd({custom:?})"),
            Self::Null => f.write_str("Null"),
            Self::NoPattern => f.write_str("NoPattern"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub next: Option<NodeId>,
    pub parent: Option<NodeId>,
}

/// Where control goes after a node succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Node(NodeId),
    /// The sub-chain owned by this node is finished.
    Exit(NodeId),
    /// The top-level chain is finished.
    End,
}

#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<Node>,
    start: NodeId,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    /// A graph holding only the never-matching sentinel.
    pub fn new() -> Self {
        let mut g = Self {
            nodes: Vec::new(),
            start: NodeId(0),
        };
        g.start = g.add(NodeKind::NoPattern);
        g
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn set_start(&mut self, id: NodeId) {
        self.start = id;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            kind,
            next: None,
            parent: None,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].next
    }

    /// The last node of the chain starting at `head`.
    pub fn last(&self, head: NodeId) -> NodeId {
        let mut id = head;
        while let Some(n) = self.next(id) {
            id = n;
        }
        id
    }

    /// Iterate the chain starting at `head`.
    pub fn chain(&self, head: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(head), move |&id| self.next(id))
    }

    /// Append `tail` after the chain at `head`. The parent link moves from
    /// the old last node to the new one.
    pub fn append(&mut self, head: NodeId, tail: NodeId) {
        let last = self.last(head);
        let parent = self.nodes[last.index()].parent.take();
        self.nodes[last.index()].next = Some(tail);
        let new_last = self.last(tail);
        self.nodes[new_last.index()].parent = parent;
    }

    /// Mark the chain at `head` as a sub-chain of `owner`.
    pub fn set_parent(&mut self, head: NodeId, owner: Option<NodeId>) {
        let last = self.last(head);
        self.nodes[last.index()].parent = owner;
    }

    /// The logical successor of `id`: its `next`, or, at the end of a
    /// sub-chain, the owner. Dispatch tables are transparent, so the end of
    /// a dispatch branch continues with the table's own successor.
    pub fn successor(&self, id: NodeId) -> Step {
        let mut cur = id;
        loop {
            let node = &self.nodes[cur.index()];
            if let Some(next) = node.next {
                return Step::Node(next);
            }
            match node.parent {
                None => return Step::End,
                Some(owner) if matches!(self.kind(owner), NodeKind::Dispatch { .. }) => cur = owner,
                Some(owner) => return Step::Exit(owner),
            }
        }
    }

    // --- Length bounds ---

    /// Fewest units the node itself can consume.
    pub fn min_chars(&self, id: NodeId) -> Bound {
        match self.kind(id) {
            NodeKind::Char { .. }
            | NodeKind::ExactChar(_)
            | NodeKind::Range { .. }
            | NodeKind::Any
            | NodeKind::Bracket { .. }
            | NodeKind::FastBracket(_) => Bound::ONE,
            NodeKind::Skipped(units) => Bound::Finite(units.len()),
            NodeKind::Class(alts) | NodeKind::Capture { alts, .. } => alts
                .iter()
                .map(|&a| self.chain_min(a))
                .min()
                .unwrap_or(Bound::ZERO),
            NodeKind::Dispatch { table, .. } => table
                .values()
                .map(|&t| self.chain_min(t).inc())
                .min()
                .unwrap_or(Bound::ZERO),
            NodeKind::Repeat { spec, body } | NodeKind::FastRepeat { spec, body, .. } => {
                if spec.min == Bound::ZERO {
                    Bound::ZERO
                } else {
                    spec.min.mul(self.chain_min(*body))
                }
            }
            NodeKind::DotRepeat(spec) => spec.min,
            NodeKind::Backup(n) if *n < 0 => Bound::Finite(n.unsigned_abs()),
            NodeKind::Balanced { .. } => Bound::Finite(2),
            NodeKind::Custom { validator, .. } => validator.min_chars(),
            NodeKind::LookAhead { .. }
            | NodeKind::Start { .. }
            | NodeKind::End { .. }
            | NodeKind::WordBoundary
            | NodeKind::NotWordBoundary
            | NodeKind::ResumeAnchor
            | NodeKind::Backup(_)
            | NodeKind::BackRef(_)
            | NodeKind::CustomEnd { .. }
            | NodeKind::Null
            | NodeKind::NoPattern => Bound::ZERO,
        }
    }

    /// Most units the node itself can consume.
    pub fn max_chars(&self, id: NodeId) -> Bound {
        match self.kind(id) {
            NodeKind::Char { .. }
            | NodeKind::ExactChar(_)
            | NodeKind::Range { .. }
            | NodeKind::Any
            | NodeKind::Bracket { .. }
            | NodeKind::FastBracket(_) => Bound::ONE,
            NodeKind::Skipped(units) => Bound::Finite(units.len()),
            NodeKind::Class(alts) | NodeKind::Capture { alts, .. } => alts
                .iter()
                .map(|&a| self.chain_max(a))
                .max()
                .unwrap_or(Bound::ZERO),
            NodeKind::Dispatch { table, .. } => table
                .values()
                .map(|&t| self.chain_max(t).inc())
                .max()
                .unwrap_or(Bound::ZERO),
            NodeKind::Repeat { spec, body } | NodeKind::FastRepeat { spec, body, .. } => {
                spec.max.mul(self.chain_max(*body))
            }
            NodeKind::DotRepeat(spec) => spec.max,
            NodeKind::Backup(n) if *n < 0 => Bound::Finite(n.unsigned_abs()),
            NodeKind::BackRef(_) | NodeKind::Balanced { .. } => Bound::Infinite,
            NodeKind::Custom { validator, .. } => validator.max_chars(),
            NodeKind::LookAhead { .. }
            | NodeKind::Start { .. }
            | NodeKind::End { .. }
            | NodeKind::WordBoundary
            | NodeKind::NotWordBoundary
            | NodeKind::ResumeAnchor
            | NodeKind::Backup(_)
            | NodeKind::CustomEnd { .. }
            | NodeKind::Null
            | NodeKind::NoPattern => Bound::ZERO,
        }
    }

    pub fn chain_min(&self, head: NodeId) -> Bound {
        self.chain(head)
            .fold(Bound::ZERO, |acc, id| acc.add(self.min_chars(id)))
    }

    pub fn chain_max(&self, head: NodeId) -> Bound {
        self.chain(head)
            .fold(Bound::ZERO, |acc, id| acc.add(self.max_chars(id)))
    }

    /// Sub-chain heads owned by `id`.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        match self.kind(id) {
            NodeKind::Class(alts)
            | NodeKind::Capture { alts, .. }
            | NodeKind::LookAhead { alts, .. } => alts.clone(),
            NodeKind::Dispatch { keys, table } => {
                let mut seen = Vec::new();
                for k in keys {
                    if let Some(&t) = table.get(k)
                        && !seen.contains(&t)
                    {
                        seen.push(t);
                    }
                }
                seen
            }
            NodeKind::Repeat { body, .. }
            | NodeKind::FastRepeat { body, .. }
            | NodeKind::Custom { body, .. } => vec![*body],
            _ => Vec::new(),
        }
    }

    /// True when any node reachable from the start rewinds the position.
    pub fn has_rewind(&self) -> bool {
        let mut stack = vec![self.start];
        while let Some(head) = stack.pop() {
            for id in self.chain(head) {
                if matches!(self.kind(id), NodeKind::Backup(n) if *n > 0) {
                    return true;
                }
                stack.extend(self.children(id));
            }
        }
        false
    }

    // --- Copying ---

    /// Copy the chain at `head` from `src` into `self`, threading `map`
    /// (source id to copied id) through the whole copy so that shared
    /// targets and paired nodes stay paired.
    pub fn copy_chain(
        &mut self,
        src: &Graph,
        head: NodeId,
        map: &mut HashMap<NodeId, NodeId>,
    ) -> NodeId {
        let mut first = None;
        let mut prev: Option<NodeId> = None;
        for id in src.chain(head) {
            let copied = self.copy_node(src, id, map);
            match prev {
                Some(p) => self.nodes[p.index()].next = Some(copied),
                None => first = Some(copied),
            }
            prev = Some(copied);
        }
        if let Some(last) = prev
            && let Some(owner) = src.node(src.last(head)).parent
        {
            self.nodes[last.index()].parent = map.get(&owner).copied();
        }
        first.unwrap_or(head)
    }

    fn copy_node(&mut self, src: &Graph, id: NodeId, map: &mut HashMap<NodeId, NodeId>) -> NodeId {
        if let Some(&done) = map.get(&id) {
            return done;
        }
        let new_id = self.add(NodeKind::Null);
        map.insert(id, new_id);
        let kind = match src.kind(id) {
            NodeKind::Class(alts) => NodeKind::Class(self.copy_all(src, alts, map)),
            NodeKind::LookAhead { negate, alts } => NodeKind::LookAhead {
                negate: *negate,
                alts: self.copy_all(src, alts, map),
            },
            NodeKind::Capture { group, alts } => NodeKind::Capture {
                group: *group,
                alts: self.copy_all(src, alts, map),
            },
            NodeKind::Dispatch { keys, table } => {
                let mut copied = HashMap::with_capacity(table.len());
                for k in keys {
                    if let Some(&t) = table.get(k) {
                        copied.insert(*k, self.copy_chain(src, t, map));
                    }
                }
                NodeKind::Dispatch {
                    keys: keys.clone(),
                    table: copied,
                }
            }
            NodeKind::Repeat { spec, body } => NodeKind::Repeat {
                spec: *spec,
                body: self.copy_chain(src, *body, map),
            },
            NodeKind::FastRepeat { spec, body, step } => NodeKind::FastRepeat {
                spec: *spec,
                body: self.copy_chain(src, *body, map),
                step: *step,
            },
            NodeKind::Custom {
                name,
                arg,
                validator,
                body,
            } => NodeKind::Custom {
                name: name.clone(),
                arg: arg.clone(),
                validator: Arc::clone(validator),
                body: self.copy_chain(src, *body, map),
            },
            NodeKind::CustomEnd { custom } => NodeKind::CustomEnd {
                custom: map.get(custom).copied().unwrap_or(*custom),
            },
            other => other.clone(),
        };
        self.nodes[new_id.index()].kind = kind;
        new_id
    }

    fn copy_all(
        &mut self,
        src: &Graph,
        heads: &[NodeId],
        map: &mut HashMap<NodeId, NodeId>,
    ) -> Vec<NodeId> {
        heads
            .iter()
            .map(|&h| self.copy_chain(src, h, map))
            .collect()
    }

    /// A copy holding only the nodes reachable from the start.
    pub fn compacted(&self) -> Graph {
        let mut out = Graph {
            nodes: Vec::with_capacity(self.nodes.len()),
            start: NodeId(0),
        };
        let mut map = HashMap::new();
        out.start = out.copy_chain(self, self.start, &mut map);
        out
    }

    // --- Decompile ---

    /// Write the chain at `head` in pattern syntax.
    pub fn write_chain(&self, f: &mut fmt::Formatter<'_>, head: NodeId) -> fmt::Result {
        for id in self.chain(head) {
            self.write_node(f, id)?;
        }
        Ok(())
    }

    fn write_alts(&self, f: &mut fmt::Formatter<'_>, open: &str, alts: &[NodeId]) -> fmt::Result {
        f.write_str(open)?;
        for (i, &a) in alts.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            self.write_chain(f, a)?;
        }
        f.write_str(")")
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId) -> fmt::Result {
        match self.kind(id) {
            NodeKind::Char { unit, .. } | NodeKind::ExactChar(unit) => write_unit(f, *unit),
            NodeKind::Skipped(units) => units.iter().try_for_each(|&u| write_unit(f, u)),
            NodeKind::Range { lo, hi } => {
                f.write_str("[")?;
                char_class::write_items(f, &[ClassItem::span(*lo, *hi)])?;
                f.write_str("]")
            }
            NodeKind::Any => f.write_str("."),
            NodeKind::Class(alts) => self.write_alts(f, "(?:", alts),
            NodeKind::Bracket { negated, items } => {
                f.write_str(if *negated { "[^" } else { "[" })?;
                char_class::write_items(f, items)?;
                f.write_str("]")
            }
            NodeKind::FastBracket(set) => {
                f.write_str(if set.is_negated() { "[^" } else { "[" })?;
                char_class::write_items(f, &set.items())?;
                f.write_str("]")
            }
            NodeKind::LookAhead { negate, alts } => {
                self.write_alts(f, if *negate { "(?!" } else { "(?=" }, alts)
            }
            NodeKind::Capture { alts, .. } => self.write_alts(f, "(", alts),
            NodeKind::Dispatch { keys, table } => {
                f.write_str("(?:")?;
                let mut written: Vec<NodeId> = Vec::new();
                for k in keys {
                    let Some(&target) = table.get(k) else {
                        continue;
                    };
                    if written.contains(&target) {
                        continue;
                    }
                    if !written.is_empty() {
                        f.write_str("|")?;
                    }
                    written.push(target);
                    write_unit(f, *k)?;
                    self.write_chain(f, target)?;
                }
                f.write_str(")")
            }
            NodeKind::Repeat { spec, body } | NodeKind::FastRepeat { spec, body, .. } => {
                if self.next(*body).is_none() && is_atom(self.kind(*body)) {
                    self.write_node(f, *body)?;
                } else {
                    f.write_str("(?:")?;
                    self.write_chain(f, *body)?;
                    f.write_str(")")?;
                }
                write_quantifier(f, spec)
            }
            NodeKind::DotRepeat(spec) => {
                f.write_str(".")?;
                write_quantifier(f, spec)
            }
            NodeKind::Start { line: true } => f.write_str("^"),
            NodeKind::Start { line: false } => f.write_str("\\A"),
            NodeKind::End { line: true } => f.write_str("$"),
            NodeKind::End { line: false } => f.write_str("\\Z"),
            NodeKind::WordBoundary => f.write_str("\\b"),
            NodeKind::NotWordBoundary => f.write_str("\\B"),
            NodeKind::ResumeAnchor => f.write_str("\\G"),
            NodeKind::Backup(n) if *n < 0 => write!(f, "(?>{})", n.unsigned_abs()),
            NodeKind::Backup(n) => write!(f, "(?<{n})"),
            NodeKind::BackRef(g) => {
                let digit_follows = self
                    .next(id)
                    .and_then(|n| self.kind(n).literal())
                    .is_some_and(|u| (b'0' as u16..=b'9' as u16).contains(&u));
                if digit_follows {
                    write!(f, "(?:\\{g})")
                } else {
                    write!(f, "\\{g}")
                }
            }
            NodeKind::Balanced { open, close } => {
                f.write_str("(?@")?;
                write_raw(f, *open)?;
                write_raw(f, *close)?;
                f.write_str(")")
            }
            NodeKind::Custom { name, arg, .. } => match arg {
                Some(a) => write!(f, "(??{name}:{a})"),
                None => write!(f, "(??{name})"),
            },
            NodeKind::CustomEnd { .. } | NodeKind::Null => Ok(()),
            NodeKind::NoPattern => f.write_str("(?!)"),
        }
    }
}

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_chain(f, self.start)
    }
}

/// Units that must be escaped to be read back as literals.
const PROTECT: &[u8] = b"[]{}()$-\"^.*+?|\\";

fn write_unit(f: &mut fmt::Formatter<'_>, u: u16) -> fmt::Result {
    if u < 0x80 && PROTECT.contains(&(u as u8)) {
        write!(f, "\\{}", u as u8 as char)
    } else if u < 0x20 {
        write!(f, "\\x{u:02x}")
    } else {
        write_raw(f, u)
    }
}

fn write_raw(f: &mut fmt::Formatter<'_>, u: u16) -> fmt::Result {
    write!(
        f,
        "{}",
        char::from_u32(u as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
    )
}

fn is_atom(kind: &NodeKind) -> bool {
    matches!(
        kind,
        NodeKind::Char { .. }
            | NodeKind::ExactChar(_)
            | NodeKind::Range { .. }
            | NodeKind::Any
            | NodeKind::Class(_)
            | NodeKind::Bracket { .. }
            | NodeKind::FastBracket(_)
            | NodeKind::Capture { .. }
            | NodeKind::Dispatch { .. }
            | NodeKind::BackRef(_)
            | NodeKind::Balanced { .. }
            | NodeKind::Custom { .. }
    )
}

fn write_quantifier(f: &mut fmt::Formatter<'_>, spec: &RepeatSpec) -> fmt::Result {
    match (spec.min, spec.max) {
        (Bound::Finite(0), Bound::Infinite) => f.write_str("*")?,
        (Bound::Finite(1), Bound::Infinite) => f.write_str("+")?,
        (Bound::Finite(0), Bound::Finite(1)) => f.write_str("?")?,
        (min, max) if min == max => write!(f, "{{{min}}}")?,
        (min, max) => write!(f, "{{{min},{max}}}")?,
    }
    if spec.lazy {
        f.write_str("?")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_of(g: &mut Graph, s: &str) -> NodeId {
        let ids: Vec<NodeId> = s.encode_utf16().map(|u| g.add(NodeKind::char(u))).collect();
        for w in ids.windows(2) {
            g.node_mut(w[0]).next = Some(w[1]);
        }
        ids[0]
    }

    #[test]
    fn successor_falls_back_to_owner() {
        let mut g = Graph::new();
        let body = chain_of(&mut g, "ab");
        let class = g.add(NodeKind::Class(vec![body]));
        g.set_parent(body, Some(class));
        let tail = chain_of(&mut g, "c");
        g.node_mut(class).next = Some(tail);
        g.set_start(class);

        let b = g.next(body).unwrap();
        assert_eq!(g.successor(body), Step::Node(b));
        assert_eq!(g.successor(b), Step::Exit(class));
        assert_eq!(g.successor(class), Step::Node(tail));
        assert_eq!(g.successor(tail), Step::End);
    }

    #[test]
    fn dispatch_is_transparent() {
        let mut g = Graph::new();
        let rest = chain_of(&mut g, "x");
        let d = g.add(NodeKind::Dispatch {
            keys: vec!['a' as u16],
            table: HashMap::from([('a' as u16, rest)]),
        });
        g.set_parent(rest, Some(d));
        let after = chain_of(&mut g, "y");
        g.node_mut(d).next = Some(after);
        assert_eq!(g.successor(rest), Step::Node(after));
    }

    #[test]
    fn append_moves_parent_link() {
        let mut g = Graph::new();
        let body = chain_of(&mut g, "a");
        let owner = g.add(NodeKind::Class(vec![body]));
        g.set_parent(body, Some(owner));
        let more = chain_of(&mut g, "b");
        g.append(body, more);
        assert_eq!(g.node(body).parent, None);
        assert_eq!(g.node(more).parent, Some(owner));
    }

    #[test]
    fn length_bounds() {
        let mut g = Graph::new();
        let body = chain_of(&mut g, "ab");
        let rep = g.add(NodeKind::Repeat {
            spec: RepeatSpec {
                min: Bound::Finite(2),
                max: Bound::Finite(3),
                lazy: false,
            },
            body,
        });
        g.set_parent(body, Some(rep));
        assert_eq!(g.min_chars(rep), Bound::Finite(4));
        assert_eq!(g.max_chars(rep), Bound::Finite(6));
        let back = g.add(NodeKind::BackRef(1));
        assert_eq!(g.max_chars(back), Bound::Infinite);
    }

    #[test]
    fn compacted_copy_keeps_custom_pairing() {
        use crate::pattern::validator::AcceptAll;
        let mut g = Graph::new();
        let _garbage = chain_of(&mut g, "zzz");
        let end = g.add(NodeKind::CustomEnd { custom: NodeId(0) });
        let custom = g.add(NodeKind::Custom {
            name: "x".into(),
            arg: None,
            validator: Arc::new(AcceptAll),
            body: end,
        });
        g.node_mut(end).kind = NodeKind::CustomEnd { custom };
        g.set_parent(end, Some(custom));
        g.set_start(custom);

        let c = g.compacted();
        assert_eq!(c.len(), 2);
        let NodeKind::Custom { body, .. } = c.kind(c.start()) else {
            panic!("expected custom");
        };
        let NodeKind::CustomEnd { custom: paired } = c.kind(*body) else {
            panic!("expected endpoint");
        };
        assert_eq!(*paired, c.start());
        assert_eq!(c.successor(*body), Step::Exit(c.start()));
    }

    #[test]
    fn decompile_protects_specials() {
        let mut g = Graph::new();
        let head = chain_of(&mut g, "a.b*");
        g.set_start(head);
        assert_eq!(g.to_string(), "a\\.b\\*");
    }
}

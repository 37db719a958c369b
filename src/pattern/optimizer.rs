//! Graph rewrites that make matching faster without changing what matches.
//!
//! * brackets become bitsets or single intervals,
//! * literals become exact compares when case and quotes do not matter,
//! * one-alternative groups are flattened into the enclosing chain,
//! * runs of alternatives that start with a literal become dispatch tables,
//! * repetitions of fixed-width bodies become iterative.
//!
//! Every rewrite is local, so running the pass twice changes nothing more.

use std::collections::HashMap;

use itertools::Itertools;

use crate::unicode::case_variants;

use super::char_class::{self, ClassItem, FastSet};
use super::graph::{Graph, NodeId, NodeKind};

pub struct Optimizer<'g> {
    graph: &'g mut Graph,
    ignore_case: bool,
    /// Quote masking is on; literals must keep their mask check.
    masked: bool,
}

/// Optimize `graph` in place for matching with the given flags.
pub fn optimize(graph: &mut Graph, ignore_case: bool, masked: bool) {
    let before = graph.len();
    let start = graph.start();
    let mut opt = Optimizer {
        graph,
        ignore_case,
        masked,
    };
    let start = opt.chain(start);
    opt.graph.set_start(start);
    log::debug!(
        "optimized pattern ({} nodes allocated, {} now): {}",
        before,
        opt.graph.len(),
        opt.graph
    );
}

impl Optimizer<'_> {
    /// Optimize the chain at `head`, returning its new head. The last node
    /// keeps the chain's parent link.
    fn chain(&mut self, head: NodeId) -> NodeId {
        let ids: Vec<NodeId> = self.graph.chain(head).collect();
        let Some(&last) = ids.last() else {
            return head;
        };
        let owner = self.graph.node(last).parent;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            self.node(id, &mut out);
        }
        self.relink(&out, owner)
    }

    fn relink(&mut self, seq: &[NodeId], owner: Option<NodeId>) -> NodeId {
        for pair in seq.windows(2) {
            let node = self.graph.node_mut(pair[0]);
            node.next = Some(pair[1]);
            node.parent = None;
        }
        if let Some(&last) = seq.last() {
            let node = self.graph.node_mut(last);
            node.next = None;
            node.parent = owner;
        }
        seq[0]
    }

    fn set_kind(&mut self, id: NodeId, kind: NodeKind) {
        self.graph.node_mut(id).kind = kind;
    }

    /// Optimize one node, pushing whatever replaces it onto `out`.
    fn node(&mut self, id: NodeId, out: &mut Vec<NodeId>) {
        match self.graph.kind(id).clone() {
            NodeKind::Bracket { negated, items } => {
                let kind = self.bracket(negated, items);
                self.set_kind(id, kind);
            }
            NodeKind::Char { unit, .. } if !self.ignore_case && !self.masked => {
                self.set_kind(id, NodeKind::ExactChar(unit));
            }
            NodeKind::Class(alts) => {
                let alts = self.alternatives(id, &alts);
                if let [only] = alts[..] {
                    out.extend(self.graph.chain(only));
                    return;
                }
                self.set_kind(id, NodeKind::Class(alts));
            }
            NodeKind::Capture { group, alts } => {
                let alts = self.alternatives(id, &alts);
                self.set_kind(id, NodeKind::Capture { group, alts });
            }
            NodeKind::LookAhead { negate, alts } => {
                let alts = self.alternatives(id, &alts);
                self.set_kind(id, NodeKind::LookAhead { negate, alts });
            }
            NodeKind::Repeat { spec, body } => {
                let fixed = self.fixed_width(body);
                let step = self.graph.chain_min(body).value();
                let body = self.chain(body);
                let kind = if fixed && step > 0 {
                    NodeKind::FastRepeat { spec, body, step }
                } else {
                    NodeKind::Repeat { spec, body }
                };
                self.set_kind(id, kind);
            }
            NodeKind::FastRepeat { spec, body, step } => {
                let body = self.chain(body);
                self.set_kind(id, NodeKind::FastRepeat { spec, body, step });
            }
            NodeKind::Custom {
                name,
                arg,
                validator,
                body,
            } => {
                let body = self.chain(body);
                self.set_kind(
                    id,
                    NodeKind::Custom {
                        name,
                        arg,
                        validator,
                        body,
                    },
                );
            }
            _ => {}
        }
        out.push(id);
    }

    fn bracket(&self, negated: bool, items: Vec<ClassItem>) -> NodeKind {
        let merged = char_class::merge(items.iter().copied(), self.ignore_case);
        let inverse = char_class::complement(&merged);
        if !self.ignore_case {
            if merged.len() == 1 {
                return NodeKind::Bracket {
                    negated,
                    items: merged,
                };
            }
            if inverse.len() == 1 {
                return NodeKind::Bracket {
                    negated: !negated,
                    items: inverse,
                };
            }
        }
        if let Some(set) =
            FastSet::new(&merged, negated).or_else(|| FastSet::new(&inverse, !negated))
        {
            return NodeKind::FastBracket(set);
        }
        if self.ignore_case {
            NodeKind::Bracket { negated, items }
        } else {
            NodeKind::Bracket {
                negated,
                items: merged,
            }
        }
    }

    /// Nodes a repetition can step over without ever backtracking into.
    fn fixed_width(&self, head: NodeId) -> bool {
        self.graph.chain(head).all(|id| match self.graph.kind(id) {
            NodeKind::Char { .. }
            | NodeKind::ExactChar(_)
            | NodeKind::Range { .. }
            | NodeKind::Any
            | NodeKind::Bracket { .. }
            | NodeKind::FastBracket(_) => true,
            NodeKind::Custom { validator, .. } => validator.is_unicode_property(),
            NodeKind::Class(_) | NodeKind::Dispatch { .. } => {
                self.graph.min_chars(id) == self.graph.max_chars(id)
                    && self
                        .graph
                        .children(id)
                        .into_iter()
                        .all(|alt| self.fixed_width(alt))
            }
            _ => false,
        })
    }

    // --- Dispatch tables ---

    /// The units that select an alternative starting with a literal, or
    /// `None` when the alternative cannot go in a table.
    fn selector(&self, head: NodeId) -> Option<Vec<u16>> {
        let unit = self.graph.kind(head).literal()?;
        if !self.ignore_case {
            return Some(vec![unit]);
        }
        let keys = case_set(unit);
        // Every variant must select exactly the same set.
        keys.iter()
            .all(|&k| sorted(&case_set(k)) == sorted(&keys))
            .then_some(keys)
    }

    /// Optimize the alternatives owned by `owner`, folding each run of two
    /// or more literal-led alternatives into one dispatch alternative.
    fn alternatives(&mut self, owner: NodeId, alts: &[NodeId]) -> Vec<NodeId> {
        let selectors: Vec<Option<Vec<u16>>> = alts.iter().map(|&a| self.selector(a)).collect();
        let mut out = Vec::with_capacity(alts.len());
        let mut run: Vec<(NodeId, Vec<u16>)> = Vec::new();
        for (i, &alt) in alts.iter().enumerate() {
            if let Some(keys) = &selectors[i]
                && (!run.is_empty() || selectors.get(i + 1).is_some_and(Option::is_some))
            {
                run.push((alt, keys.clone()));
                continue;
            }
            if !run.is_empty() {
                let merged = self.dispatch(owner, std::mem::take(&mut run));
                out.push(merged);
            }
            out.push(self.chain(alt));
        }
        if !run.is_empty() {
            out.push(self.dispatch(owner, run));
        }
        out
    }

    /// Build the alternative that replaces `run`. Alternatives sharing a
    /// selector keep their order inside one target.
    fn dispatch(&mut self, owner: NodeId, run: Vec<(NodeId, Vec<u16>)>) -> NodeId {
        let mut groups: Vec<(Vec<u16>, Vec<NodeId>)> = Vec::new();
        for (head, keys) in &run {
            let rest = match self.graph.next(*head) {
                Some(rest) => rest,
                None => self.graph.add(NodeKind::Null),
            };
            let node = self.graph.node_mut(*head);
            node.next = None;
            node.parent = None;
            match groups
                .iter_mut()
                .find(|(k, _)| sorted(k) == sorted(keys))
            {
                Some((_, rests)) => rests.push(rest),
                None => groups.push((keys.clone(), vec![rest])),
            }
        }

        if let [(_, rests)] = &groups[..] {
            // One selector: the literal followed by the alternation of what
            // follows it in each alternative.
            let rests = rests.clone();
            let head = run[0].0;
            let target = self.alternation(&rests);
            self.graph.node_mut(head).next = Some(target);
            self.graph.set_parent(target, Some(owner));
            return self.chain(head);
        }

        let id = self.graph.add(NodeKind::Null);
        let mut keys = Vec::new();
        let mut table = HashMap::new();
        for (selector, rests) in groups {
            let target = self.alternation(&rests);
            self.graph.set_parent(target, Some(id));
            let target = self.chain(target);
            for k in selector {
                if table.insert(k, target).is_none() {
                    keys.push(k);
                }
            }
        }
        log::trace!("dispatch on {} keys", keys.len());
        let node = self.graph.node_mut(id);
        node.kind = NodeKind::Dispatch { keys, table };
        node.parent = Some(owner);
        id
    }

    /// One chain head matching any of `rests`, in order.
    fn alternation(&mut self, rests: &[NodeId]) -> NodeId {
        if let [only] = rests {
            return *only;
        }
        let class = self.graph.add(NodeKind::Class(rests.to_vec()));
        for &r in rests {
            self.graph.set_parent(r, Some(class));
        }
        class
    }
}

/// `unit` and its case variants, first occurrence order.
fn case_set(unit: u16) -> Vec<u16> {
    let (a, b) = case_variants(unit);
    [unit, a, b].into_iter().unique().collect()
}

fn sorted(units: &[u16]) -> Vec<u16> {
    units.iter().copied().sorted().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::cursor::ESC;
    use crate::pattern::matcher::{MatchFlags, MatchState};
    use crate::pattern::parser::{Compiled, compile};
    use crate::pattern::validator::ExtensionRegistry;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn optimized(pat: &str, ignore_case: bool) -> Compiled {
        let mut c = compile(&units(pat), ESC, &ExtensionRegistry::with_builtins()).unwrap();
        optimize(&mut c.graph, ignore_case, false);
        c
    }

    fn start_kind(c: &Compiled) -> &NodeKind {
        c.graph.kind(c.graph.start())
    }

    fn fwd(c: &Compiled, text: &str, ignore_case: bool) -> Option<(usize, usize)> {
        let src = units(text);
        let flags = MatchFlags {
            ignore_case,
            ..MatchFlags::default()
        };
        let mut state = MatchState::new(&c.graph, &src, c.n_groups, flags, None, 0);
        state.search(None, 0, 0, src.len()).map(|f| (f.start, f.end))
    }

    // --- Leaves ---

    #[test]
    fn literals_become_exact() {
        let c = optimized("ab", false);
        assert!(matches!(start_kind(&c), NodeKind::ExactChar(0x61)));
        let c = optimized("ab", true);
        assert!(matches!(start_kind(&c), NodeKind::Char { .. }));
    }

    #[test]
    fn brackets_become_bitsets_or_intervals() {
        let c = optimized("[abcx]", false);
        assert!(matches!(start_kind(&c), NodeKind::FastBracket(_)));
        assert_eq!(c.graph.to_string(), "[a-cx]");
        let c = optimized("[a-fb-z]", false);
        assert!(matches!(start_kind(&c), NodeKind::Bracket { items, .. } if items.len() == 1));
        assert_eq!(c.graph.to_string(), "[a-z]");
        let c = optimized("[^abc]", false);
        assert_eq!(c.graph.to_string(), "[^a-c]");
    }

    #[test]
    fn ignore_case_bitset_holds_variants() {
        let c = optimized("[ab]x", true);
        assert_eq!(fwd(&c, "zBX", true), Some((1, 3)));
    }

    // --- Groups ---

    #[test]
    fn lone_group_is_flattened() {
        let c = optimized("(?:ab)c", false);
        assert_eq!(c.graph.to_string(), "abc");
        assert_eq!(c.graph.chain(c.graph.start()).count(), 3);
    }

    #[test]
    fn literal_alternatives_dispatch() {
        let c = optimized("(?:ab|cd|ef)", false);
        assert!(matches!(start_kind(&c), NodeKind::Dispatch { keys, .. } if keys.len() == 3));
        assert_eq!(c.graph.to_string(), "(?:ab|cd|ef)");
        assert_eq!(fwd(&c, "xxcd", false), Some((2, 4)));
        assert_eq!(fwd(&c, "xxce", false), None);
    }

    #[test]
    fn shared_first_unit_is_factored() {
        let c = optimized("(?:ab|ac)", false);
        assert_eq!(c.graph.to_string(), "a(?:b|c)");
        assert_eq!(fwd(&c, "ac", false), Some((0, 2)));
    }

    #[test]
    fn shared_key_keeps_alternative_order() {
        let c = optimized("(?:ab|abc|x)", false);
        assert_eq!(fwd(&c, "abc", false), Some((0, 2)));
        let c = optimized("(?:ab|abc|x)d", false);
        assert_eq!(fwd(&c, "abcd", false), Some((0, 4)));
    }

    #[test]
    fn non_literal_alternatives_stay_in_place() {
        let c = optimized("(?:ab|x*|cd)", false);
        assert!(matches!(start_kind(&c), NodeKind::Class(alts) if alts.len() == 3));
        let c = optimized("(?:ab|cd|x*)", false);
        assert!(matches!(start_kind(&c), NodeKind::Class(alts) if alts.len() == 2));
        assert_eq!(c.graph.to_string(), "(?:(?:ab|cd)|x*)");
    }

    #[test]
    fn dispatch_inside_capture() {
        let c = optimized("(ab|cd)", false);
        let NodeKind::Capture { alts, .. } = start_kind(&c) else {
            panic!("expected capture");
        };
        assert!(matches!(c.graph.kind(alts[0]), NodeKind::Dispatch { .. }));
    }

    #[test]
    fn ignore_case_dispatch_keys_variants() {
        let c = optimized("(?:ab|cd)", true);
        assert!(matches!(start_kind(&c), NodeKind::Dispatch { keys, .. } if keys.len() == 4));
        assert_eq!(fwd(&c, "xCD", true), Some((1, 3)));
    }

    // --- Repetition ---

    #[test]
    fn fixed_width_repeats_become_fast() {
        let c = optimized("[a-c]+", false);
        assert!(matches!(start_kind(&c), NodeKind::FastRepeat { step: 1, .. }));
        let c = optimized("(?:ab|cd)*", false);
        assert!(matches!(start_kind(&c), NodeKind::FastRepeat { step: 2, .. }));
        assert_eq!(c.graph.to_string(), "(?:ab|cd)*");
        assert_eq!(fwd(&c, "abcdab!", false), Some((0, 6)));
    }

    #[test]
    fn variable_or_capturing_bodies_stay_generic() {
        let c = optimized("(?:a|bc)*", false);
        assert!(matches!(start_kind(&c), NodeKind::Repeat { .. }));
        let c = optimized("(a)*", false);
        assert!(matches!(start_kind(&c), NodeKind::Repeat { .. }));
    }

    #[test]
    fn unicode_property_repeats_are_fast() {
        let c = optimized("(??w)+", false);
        assert!(matches!(start_kind(&c), NodeKind::FastRepeat { step: 1, .. }));
        assert_eq!(fwd(&c, "!! ab1 ", false), Some((3, 6)));
    }

    #[test]
    fn optimizing_twice_is_stable() {
        let mut c = optimized("(?:ab|ac|d)[xyz]+(?:q)", false);
        let once = c.graph.to_string();
        optimize(&mut c.graph, false, false);
        assert_eq!(c.graph.to_string(), once);
    }
}

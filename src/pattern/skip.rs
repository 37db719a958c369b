//! Literal prefilter: find candidate start offsets by scanning for a literal
//! the pattern must contain at a fixed distance from its start.

use crate::source::CharSource;
use crate::unicode::{case_variants, eq_ignore_case};

use super::graph::{Graph, NodeId, NodeKind};

/// Slots in the Horspool shift table; units are folded with `& (SLOTS - 1)`.
const SLOTS: usize = 64;

#[derive(Debug, Clone)]
enum Scan {
    /// One unit.
    One,
    /// Two consecutive units.
    Two,
    /// Three or more units, Boyer-Moore-Horspool with a T-search jump.
    Horspool {
        shift: [usize; SLOTS],
        jump_ahead: usize,
    },
}

/// A literal searched for at `offset` units past each candidate start.
#[derive(Debug, Clone)]
pub struct Skip {
    literal: Vec<u16>,
    offset: usize,
    ignore_case: bool,
    scan: Scan,
}

impl Skip {
    /// Choose the scan for `literal` by its length.
    pub fn new(literal: Vec<u16>, ignore_case: bool, offset: usize) -> Self {
        let scan = match literal.len() {
            0 | 1 => Scan::One,
            2 => Scan::Two,
            _ => Self::horspool(&literal, ignore_case),
        };
        Self {
            literal,
            offset,
            ignore_case,
            scan,
        }
    }

    fn horspool(literal: &[u16], ignore_case: bool) -> Scan {
        let m = literal.len();
        let last = literal[m - 1];
        let mut shift = [m; SLOTS];
        for (k, &u) in literal[..m - 1].iter().enumerate() {
            let d = m - k - 1;
            shift[u as usize & (SLOTS - 1)] = d;
            if ignore_case {
                let (a, b) = case_variants(u);
                shift[a as usize & (SLOTS - 1)] = d;
                shift[b as usize & (SLOTS - 1)] = d;
            }
        }
        // Distance back to the previous occurrence of the last unit.
        let jump_ahead = (0..m - 1)
            .find(|&k| {
                let y = literal[m - 2 - k];
                y == last || (ignore_case && eq_ignore_case(last, y))
            })
            .unwrap_or(m - 1);
        Scan::Horspool { shift, jump_ahead }
    }

    pub fn literal(&self) -> &[u16] {
        &self.literal
    }

    /// Distance from a match start to the literal.
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn unit_eq(&self, want: u16, got: u16) -> bool {
        want == got || (self.ignore_case && eq_ignore_case(want, got))
    }

    /// True when `literal[..n]` occurs at `at`.
    fn prefix_at(&self, src: &dyn CharSource, at: usize, n: usize) -> bool {
        self.literal[..n]
            .iter()
            .enumerate()
            .all(|(i, &u)| self.unit_eq(u, src.unit_at(at + i)))
    }

    /// The first candidate start in `start..=end`, or `None`.
    pub fn find(&self, src: &dyn CharSource, start: usize, end: usize) -> Option<usize> {
        let m = self.literal.len();
        if start > end || m == 0 || src.len() < m {
            return None;
        }
        match &self.scan {
            Scan::One | Scan::Two => {
                let last = (src.len() - m).min(end + self.offset);
                (start + self.offset..=last)
                    .find(|&i| self.prefix_at(src, i, m))
                    .map(|i| i - self.offset)
            }
            Scan::Horspool { shift, jump_ahead } => {
                let sm1 = m - 1;
                let last_unit = self.literal[sm1];
                let vend = (src.len() - 1).min(end + sm1 + self.offset);
                let mut k = start + self.offset + sm1;
                while k <= vend {
                    if self.unit_eq(last_unit, src.unit_at(k)) {
                        if self.prefix_at(src, k - sm1, sm1) {
                            return Some(k - sm1 - self.offset);
                        }
                        k += jump_ahead;
                        if k > vend {
                            return None;
                        }
                    }
                    k += shift[src.unit_at(k) as usize & (SLOTS - 1)];
                }
                None
            }
        }
    }
}

/// Derive a prefilter from the fixed-width prefix of `graph`.
///
/// With `truncate`, a run of three or more literal units is shortened to
/// its first unit followed by a [`NodeKind::Skipped`] node holding the rest,
/// which prefiltered searches then do not check again.
pub fn find_skip(graph: &mut Graph, ignore_case: bool, truncate: bool) -> Option<Skip> {
    let start = graph.start();
    let skip = find_in_chain(graph, start, ignore_case, truncate);
    if let Some(s) = &skip {
        log::debug!(
            "prefilter {:?} at offset {} ({} units)",
            String::from_utf16_lossy(s.literal()),
            s.offset(),
            s.literal().len()
        );
    }
    skip
}

fn find_in_chain(
    graph: &mut Graph,
    head: NodeId,
    ignore_case: bool,
    truncate: bool,
) -> Option<Skip> {
    let mut offset = 0usize;
    let mut single: Option<(u16, usize)> = None;
    let mut cur = Some(head);
    while let Some(id) = cur {
        if let Some(unit) = graph.kind(id).literal() {
            single = Some((unit, offset));
            let run: Vec<NodeId> = graph
                .chain(id)
                .take_while(|&n| graph.kind(n).literal().is_some())
                .collect();
            if run.len() >= 2 {
                let units: Vec<u16> =
                    run.iter().filter_map(|&n| graph.kind(n).literal()).collect();
                if truncate && units.len() > 2 {
                    splice_skipped(graph, &run, units[1..].to_vec());
                }
                return Some(Skip::new(units, ignore_case, offset));
            }
        }
        let kind = graph.kind(id);
        let lone_alt = match kind {
            NodeKind::Class(alts) | NodeKind::Capture { alts, .. } => {
                (alts.len() == 1).then(|| alts[0])
            }
            NodeKind::LookAhead { negate: false, alts } => (alts.len() == 1).then(|| alts[0]),
            _ => None,
        };
        if let Some(alt) = lone_alt
            && let Some(mut sub) = find_in_chain(graph, alt, ignore_case, truncate)
        {
            sub.offset += offset;
            return Some(sub);
        }
        let (min, max) = (graph.min_chars(id), graph.max_chars(id));
        let rewinds = matches!(graph.kind(id), NodeKind::Backup(n) if *n > 0);
        if min != max || rewinds {
            break;
        }
        offset += min.value();
        cur = graph.next(id);
    }
    single.map(|(unit, off)| Skip::new(vec![unit], ignore_case, off))
}

/// Replace `run[1..]` with one `Skipped` node holding `rest`.
fn splice_skipped(graph: &mut Graph, run: &[NodeId], rest: Vec<u16>) {
    let (first, last) = (run[0], run[run.len() - 1]);
    let (after, parent) = {
        let node = graph.node(last);
        (node.next, node.parent)
    };
    let skipped = graph.add(NodeKind::Skipped(rest));
    let node = graph.node_mut(skipped);
    node.next = after;
    node.parent = parent;
    graph.node_mut(first).next = Some(skipped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::cursor::ESC;
    use crate::pattern::parser::compile;
    use crate::pattern::validator::ExtensionRegistry;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn skip_for(pat: &str, ignore_case: bool, truncate: bool) -> (Option<Skip>, Graph) {
        let mut graph = compile(&units(pat), ESC, &ExtensionRegistry::with_builtins())
            .unwrap()
            .graph;
        let skip = find_skip(&mut graph, ignore_case, truncate);
        (skip, graph)
    }

    fn find(lit: &str, ignore_case: bool, text: &str) -> Option<usize> {
        let text = units(text);
        Skip::new(units(lit), ignore_case, 0).find(&text, 0, text.len())
    }

    // --- Scans ---

    #[test]
    fn one_and_two_unit_scans() {
        assert_eq!(find("c", false, "abcabc"), Some(2));
        assert_eq!(find("ca", false, "abcabc"), Some(2));
        assert_eq!(find("cb", false, "abcabc"), None);
        assert_eq!(find("CA", true, "abcabc"), Some(2));
    }

    #[test]
    fn horspool_scan() {
        assert_eq!(find("abc", false, "xxabcabc"), Some(2));
        assert_eq!(find("aba", false, "xaaba"), Some(2));
        assert_eq!(find("needle", false, "haystack with a needle in it"), Some(16));
        assert_eq!(find("needle", false, "haystack"), None);
        assert_eq!(find("NeEdLe", true, "a needle"), Some(2));
    }

    #[test]
    fn horspool_agrees_with_naive_search() {
        let hay = "abaabababbaababaabbbabaaabab";
        for lit in ["aab", "bab", "abab", "bbb", "aaab", "baba", "abba"] {
            let naive = hay.find(lit);
            assert_eq!(find(lit, false, hay), naive, "{lit}");
        }
    }

    #[test]
    fn region_bounds_the_candidates() {
        let text = units("abcabcabc");
        let s = Skip::new(units("abc"), false, 0);
        assert_eq!(s.find(&text, 1, 9), Some(3));
        assert_eq!(s.find(&text, 1, 2), None);
        assert_eq!(s.find(&text, 4, 3), None);
    }

    // --- Derivation ---

    #[test]
    fn literal_after_fixed_prefix() {
        let (skip, _) = skip_for("..abc", false, false);
        let skip = skip.unwrap();
        assert_eq!(skip.literal(), units("abc"));
        assert_eq!(skip.offset(), 2);
        let text = units("zzzzabc");
        assert_eq!(skip.find(&text, 0, text.len()), Some(2));
    }

    #[test]
    fn single_literal_before_variable_width() {
        let (skip, _) = skip_for(r"x\d+y", false, false);
        let skip = skip.unwrap();
        assert_eq!(skip.literal(), units("x"));
        assert_eq!(skip.offset(), 0);
        let (skip, _) = skip_for("a+b", false, false);
        assert!(skip.is_none());
    }

    #[test]
    fn descends_into_lone_groups() {
        let (skip, _) = skip_for("a(bcd)", false, false);
        let skip = skip.unwrap();
        assert_eq!(skip.literal(), units("bcd"));
        assert_eq!(skip.offset(), 1);
        let (skip, _) = skip_for("(?!ab)c", false, false);
        assert_eq!(skip.unwrap().literal(), units("c"));
    }

    #[test]
    fn truncation_splices_skipped_run() {
        let (skip, graph) = skip_for("abcd.*", false, true);
        assert_eq!(skip.unwrap().literal(), units("abcd"));
        let kinds: Vec<_> = graph.chain(graph.start()).map(|n| graph.kind(n).clone()).collect();
        assert!(matches!(kinds[1], NodeKind::Skipped(ref u) if *u == units("bcd")));
        assert_eq!(kinds.len(), 3);
    }

    #[test]
    fn rewinds_end_the_walk() {
        let (skip, _) = skip_for("a(?<1)bcd", false, false);
        let skip = skip.unwrap();
        assert_eq!(skip.literal(), units("a"));
        assert_eq!(skip.offset(), 0);
    }
}

//! Bracket members, the ASCII shorthand classes and the bitset used by
//! optimized brackets.

use std::fmt;

use itertools::Itertools;

use crate::unicode::case_variants;

/// One member of a `[...]` class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassItem {
    Unit(u16),
    Range(u16, u16),
}

impl ClassItem {
    /// Build a member from an inclusive interval, collapsing a one-unit
    /// interval to [`ClassItem::Unit`].
    pub fn span(lo: u16, hi: u16) -> Self {
        if lo == hi {
            Self::Unit(lo)
        } else {
            Self::Range(lo, hi)
        }
    }

    pub fn lo(self) -> u16 {
        match self {
            Self::Unit(u) | Self::Range(u, _) => u,
        }
    }

    pub fn hi(self) -> u16 {
        match self {
            Self::Unit(u) | Self::Range(_, u) => u,
        }
    }

    /// Membership test. With `ignore_case` a unit also matches its case
    /// variants and a range also matches the interval between the variants
    /// of its endpoints.
    pub fn contains(self, c: u16, ignore_case: bool) -> bool {
        match self {
            Self::Unit(u) => {
                if c == u {
                    return true;
                }
                if !ignore_case {
                    return false;
                }
                let (a, b) = case_variants(u);
                c == a || c == b
            }
            Self::Range(lo, hi) => {
                if lo <= c && c <= hi {
                    return true;
                }
                if !ignore_case {
                    return false;
                }
                let (alo, ahi) = (case_variants(lo).0, case_variants(hi).0);
                alo <= c && c <= ahi
            }
        }
    }
}

/// Test `c` against a bracket's members and negation flag.
pub fn bracket_matches(negated: bool, items: &[ClassItem], c: u16, ignore_case: bool) -> bool {
    items.iter().any(|i| i.contains(c, ignore_case)) != negated
}

// --- Shorthand classes ---

const DIGIT: &[ClassItem] = &[ClassItem::Range(b'0' as u16, b'9' as u16)];

/// `\s`: space, backspace through newline, carriage return.
const SPACE: &[ClassItem] = &[
    ClassItem::Unit(b' ' as u16),
    ClassItem::Range(8, 10),
    ClassItem::Unit(13),
];

const WORD: &[ClassItem] = &[
    ClassItem::Range(b'a' as u16, b'z' as u16),
    ClassItem::Range(b'A' as u16, b'Z' as u16),
    ClassItem::Range(b'0' as u16, b'9' as u16),
    ClassItem::Unit(b'_' as u16),
];

/// Members and negation flag for one of `d s w D S W`, as used outside
/// brackets.
pub fn shorthand(letter: u16) -> Option<(bool, &'static [ClassItem])> {
    let set = match letter as u8 {
        b'd' | b'D' => DIGIT,
        b's' | b'S' => SPACE,
        b'w' | b'W' => WORD,
        _ => return None,
    };
    Some(((letter as u8).is_ascii_uppercase(), set))
}

/// Members contributed by a shorthand inside a bracket. Negated shorthands
/// expand to the complement so they can be mixed with other members.
pub fn bracket_shorthand(letter: u16) -> Option<Vec<ClassItem>> {
    let (negated, set) = shorthand(letter)?;
    if negated {
        Some(complement(&merge(set.iter().copied(), false)))
    } else {
        Some(set.to_vec())
    }
}

pub fn is_word_unit(c: u16) -> bool {
    WORD.iter().any(|i| i.contains(c, false))
}

// --- Range algebra ---

/// Sort and coalesce the members into disjoint, non-adjacent intervals.
/// With `ignore_case` each member's case variants are added first.
pub fn merge(items: impl IntoIterator<Item = ClassItem>, ignore_case: bool) -> Vec<ClassItem> {
    let mut spans: Vec<(u16, u16)> = Vec::new();
    for item in items {
        spans.push((item.lo(), item.hi()));
        if ignore_case {
            match item {
                ClassItem::Unit(u) => {
                    let (a, b) = case_variants(u);
                    spans.push((a, a));
                    spans.push((b, b));
                }
                ClassItem::Range(lo, hi) => {
                    let (alo, ahi) = (case_variants(lo).0, case_variants(hi).0);
                    if alo <= ahi {
                        spans.push((alo, ahi));
                    }
                }
            }
        }
    }
    spans
        .into_iter()
        .sorted()
        .coalesce(|(alo, ahi), (blo, bhi)| {
            if ahi as u32 + 1 >= blo as u32 {
                Ok((alo, ahi.max(bhi)))
            } else {
                Err(((alo, ahi), (blo, bhi)))
            }
        })
        .map(|(lo, hi)| ClassItem::span(lo, hi))
        .collect()
}

/// Complement of a merged interval list over the whole 16-bit range.
pub fn complement(merged: &[ClassItem]) -> Vec<ClassItem> {
    let mut out = Vec::new();
    let mut next: u32 = 0;
    for item in merged {
        if (item.lo() as u32) > next {
            out.push(ClassItem::span(next as u16, item.lo() - 1));
        }
        next = item.hi() as u32 + 1;
    }
    if next <= u16::MAX as u32 {
        out.push(ClassItem::span(next as u16, u16::MAX));
    }
    out
}

// --- Bitset form ---

/// Widest interval a [`FastSet`] may cover.
pub const FAST_SET_SPAN: u32 = 256;

/// A bitset over at most 256 consecutive code units plus a negation flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastSet {
    base: u16,
    bits: [u64; 4],
    negated: bool,
}

impl FastSet {
    /// Build from merged intervals, or `None` when they span more than
    /// [`FAST_SET_SPAN`] units.
    pub fn new(merged: &[ClassItem], negated: bool) -> Option<Self> {
        let (first, last) = (merged.first()?, merged.last()?);
        let base = first.lo();
        if last.hi() as u32 - base as u32 >= FAST_SET_SPAN {
            return None;
        }
        let mut bits = [0u64; 4];
        for item in merged {
            for u in item.lo()..=item.hi() {
                let off = (u - base) as usize;
                bits[off / 64] |= 1 << (off % 64);
            }
        }
        Some(Self {
            base,
            bits,
            negated,
        })
    }

    pub fn contains(&self, c: u16) -> bool {
        let hit = c >= self.base && {
            let off = (c - self.base) as u32;
            off < FAST_SET_SPAN && self.bits[(off / 64) as usize] & (1 << (off % 64)) != 0
        };
        hit != self.negated
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// The set bits as intervals, for decompiling.
    pub fn items(&self) -> Vec<ClassItem> {
        let members = (0..FAST_SET_SPAN)
            .filter(|off| self.bits[(off / 64) as usize] & (1 << (off % 64)) != 0)
            .map(|off| ClassItem::Unit(self.base + off as u16));
        merge(members, false)
    }
}

// --- Decompile helpers ---

/// Write a unit for use inside `[...]`.
pub fn write_class_unit(f: &mut fmt::Formatter<'_>, u: u16) -> fmt::Result {
    match u {
        0x5D | 0x5B | 0x5E | 0x2D | 0x5C => write!(f, "\\{}", u as u8 as char),
        0..0x20 => write!(f, "\\x{u:02x}"),
        _ => write!(
            f,
            "{}",
            char::from_u32(u as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
        ),
    }
}

pub fn write_items(f: &mut fmt::Formatter<'_>, items: &[ClassItem]) -> fmt::Result {
    for item in items {
        match *item {
            ClassItem::Unit(u) => write_class_unit(f, u)?,
            ClassItem::Range(lo, hi) => {
                write_class_unit(f, lo)?;
                f.write_str("-")?;
                write_class_unit(f, hi)?;
            }
        }
    }
    Ok(())
}

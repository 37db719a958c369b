//! Escape-aware cursor over the code units of a pattern.

use crate::quant::Bound;

/// The escape unit patterns are compiled with.
pub const ESC: u16 = b'\\' as u16;

/// A position in a pattern. An escape unit is folded into the unit that
/// follows it: the cursor then reports that unit with `escaped` set. A
/// doubled escape reads as one unescaped escape unit.
#[derive(Debug, Clone)]
pub struct PatCursor<'a> {
    src: &'a [u16],
    pos: isize,
    c: u16,
    escaped: bool,
    eos: bool,
}

impl<'a> PatCursor<'a> {
    pub fn new(src: &'a [u16]) -> Self {
        let mut cur = Self {
            src,
            pos: -1,
            c: 0,
            escaped: false,
            eos: false,
        };
        cur.inc();
        cur
    }

    /// The current unit, or 0 at end of pattern.
    pub fn c(&self) -> u16 {
        self.c
    }

    pub fn escaped(&self) -> bool {
        self.escaped
    }

    pub fn eos(&self) -> bool {
        self.eos
    }

    /// Offset of the current unit in the pattern.
    pub fn pos(&self) -> usize {
        self.pos.max(0) as usize
    }

    pub fn inc(&mut self) -> &mut Self {
        self.pos += 1;
        let len = self.src.len() as isize;
        if self.pos >= len {
            self.eos = true;
            self.escaped = false;
            self.c = 0;
            return self;
        }
        self.eos = false;
        self.c = self.src[self.pos as usize];
        self.escaped = false;
        if self.c == ESC && self.pos + 1 < len {
            self.pos += 1;
            self.c = self.src[self.pos as usize];
            self.escaped = self.c != ESC;
        }
        self
    }

    /// The unit after this one, as a separate cursor.
    pub fn peek(&self) -> Self {
        let mut next = self.clone();
        next.inc();
        next
    }

    /// True on an unescaped `ch`.
    pub fn is(&self, ch: u8) -> bool {
        !self.escaped && !self.eos && self.c == ch as u16
    }

    /// True on an escaped `ch`.
    pub fn esc_is(&self, ch: u8) -> bool {
        self.escaped && !self.eos && self.c == ch as u16
    }

    /// Advance past `lit` if the cursor is on it (all unescaped), leaving
    /// the cursor on the unit that follows. Otherwise nothing moves.
    pub fn inc_match(&mut self, lit: &str) -> bool {
        let mut probe = self.clone();
        for b in lit.bytes() {
            if !probe.is(b) {
                return false;
            }
            probe.inc();
        }
        *self = probe;
        true
    }

    /// Read `inf` or a run of decimal digits, leaving the cursor after it.
    pub fn get_bound(&mut self) -> Option<Bound> {
        if self.inc_match("inf") {
            return Some(Bound::Infinite);
        }
        let mut probe = self.clone();
        let mut n: usize = 0;
        let mut digits = 0;
        while !probe.eos && (b'0' as u16..=b'9' as u16).contains(&probe.c) {
            n = n.saturating_mul(10).saturating_add((probe.c - b'0' as u16) as usize);
            digits += 1;
            probe.inc();
        }
        if digits == 0 {
            return None;
        }
        *self = probe;
        Some(Bound::Finite(n))
    }
}

/// Rewrite `pat` so that escapes written with `old` use `new` instead. A
/// literal `new` in the input is doubled so it stays literal.
pub fn re_escape(pat: &[u16], old: u16, new: u16) -> Vec<u16> {
    if old == new {
        return pat.to_vec();
    }
    let mut out = Vec::with_capacity(pat.len());
    let mut i = 0;
    while i < pat.len() {
        let c = pat[i];
        if c == old && i + 1 < pat.len() {
            if pat[i + 1] == old {
                out.push(old);
            } else {
                out.push(new);
                out.push(pat[i + 1]);
            }
            i += 2;
            continue;
        }
        if c == new {
            out.push(new);
        }
        out.push(c);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn escapes_fold_into_next_unit() {
        let p = units(r"a\bc\\");
        let mut c = PatCursor::new(&p);
        assert!(c.is(b'a'));
        c.inc();
        assert!(c.esc_is(b'b'));
        assert!(!c.is(b'b'));
        c.inc();
        assert!(c.is(b'c'));
        c.inc();
        assert!(c.is(b'\\'));
        c.inc();
        assert!(c.eos());
    }

    #[test]
    fn trailing_escape_is_literal() {
        let p = units("a\\");
        let mut c = PatCursor::new(&p);
        c.inc();
        assert!(c.is(b'\\'));
    }

    #[test]
    fn inc_match_is_all_or_nothing() {
        let p = units("(?:x");
        let mut c = PatCursor::new(&p);
        assert!(!c.inc_match("(?="));
        assert!(c.is(b'('));
        assert!(c.inc_match("(?:"));
        assert!(c.is(b'x'));
    }

    #[test]
    fn bounds() {
        let p = units("12,inf}");
        let mut c = PatCursor::new(&p);
        assert_eq!(c.get_bound(), Some(Bound::Finite(12)));
        assert!(c.is(b','));
        c.inc();
        assert_eq!(c.get_bound(), Some(Bound::Infinite));
        assert!(c.is(b'}'));
        assert_eq!(c.get_bound(), None);
    }

    #[test]
    fn re_escape_swaps_escape_unit() {
        let out = re_escape(&units(r"#d+\#"), '#' as u16, ESC);
        assert_eq!(String::from_utf16_lossy(&out), r"\d+\\#");
        let back = re_escape(&units(r"\d\\"), ESC, '#' as u16);
        assert_eq!(String::from_utf16_lossy(&back), r"#d\");
    }
}

//! Character sources the engine can search.
//!
//! All offsets are **UTF-16 code unit** indices. A source must not change
//! length or content while a match is running.

use std::fmt;
use std::sync::Arc;

use ropey::Rope;

/// Random access to a fixed sequence of 16-bit code units.
pub trait CharSource {
    /// Number of code units.
    fn len(&self) -> usize;

    /// The code unit at `i`. Callers only pass `i < len()`.
    fn unit_at(&self, i: usize) -> u16;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode `from..to` into a `String`, replacing unpaired surrogates.
    fn substring(&self, from: usize, to: usize) -> String {
        let units: Vec<u16> = (from..to).map(|i| self.unit_at(i)).collect();
        String::from_utf16_lossy(&units)
    }

    /// Copy `from..to` into `out`.
    fn copy_units(&self, from: usize, to: usize, out: &mut Vec<u16>) {
        out.extend((from..to).map(|i| self.unit_at(i)));
    }
}

impl CharSource for [u16] {
    fn len(&self) -> usize {
        <[u16]>::len(self)
    }

    fn unit_at(&self, i: usize) -> u16 {
        self[i]
    }

    fn copy_units(&self, from: usize, to: usize, out: &mut Vec<u16>) {
        out.extend_from_slice(&self[from..to]);
    }
}

impl CharSource for Vec<u16> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn unit_at(&self, i: usize) -> u16 {
        self[i]
    }

    fn copy_units(&self, from: usize, to: usize, out: &mut Vec<u16>) {
        out.extend_from_slice(&self[from..to]);
    }
}

/// An owned UTF-16 buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Utf16Text {
    units: Vec<u16>,
}

impl Utf16Text {
    pub fn new(units: Vec<u16>) -> Self {
        Self { units }
    }

    pub fn units(&self) -> &[u16] {
        &self.units
    }
}

impl From<&str> for Utf16Text {
    fn from(s: &str) -> Self {
        Self {
            units: s.encode_utf16().collect(),
        }
    }
}

impl CharSource for Utf16Text {
    fn len(&self) -> usize {
        self.units.len()
    }

    fn unit_at(&self, i: usize) -> u16 {
        self.units[i]
    }

    fn copy_units(&self, from: usize, to: usize, out: &mut Vec<u16>) {
        out.extend_from_slice(&self.units[from..to]);
    }
}

impl fmt::Display for Utf16Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf16_lossy(&self.units))
    }
}

/// A rope viewed as UTF-16 code units.
///
/// Each access converts through ropey's UTF-16 index, so single-unit reads
/// cost `O(log n)`.
#[derive(Debug, Clone)]
pub struct RopeSource {
    rope: Rope,
    len: usize,
}

impl RopeSource {
    pub fn new(rope: Rope) -> Self {
        let len = rope.len_utf16_cu();
        Self { rope, len }
    }

    pub fn rope(&self) -> &Rope {
        &self.rope
    }
}

impl CharSource for RopeSource {
    fn len(&self) -> usize {
        self.len
    }

    fn unit_at(&self, i: usize) -> u16 {
        let char_idx = self.rope.utf16_cu_to_char(i);
        let first_unit = self.rope.char_to_utf16_cu(char_idx);
        let mut buf = [0u16; 2];
        let encoded = self.rope.char(char_idx).encode_utf16(&mut buf);
        encoded[(i - first_unit).min(encoded.len() - 1)]
    }

    fn substring(&self, from: usize, to: usize) -> String {
        let start = self.rope.utf16_cu_to_char(from);
        let end = self.rope.utf16_cu_to_char(to);
        self.rope.slice(start..end).to_string()
    }
}

/// A cheaply clonable handle to a source, shared between a [`Regex`] and the
/// results it produces.
///
/// [`Regex`]: crate::Regex
#[derive(Clone)]
pub struct Text {
    inner: Arc<dyn CharSource + Send + Sync>,
}

impl Text {
    pub fn new<S: CharSource + Send + Sync + 'static>(source: S) -> Self {
        Self {
            inner: Arc::new(source),
        }
    }

    pub fn from_units(units: Vec<u16>) -> Self {
        Self::new(Utf16Text::new(units))
    }

    pub fn from_rope(rope: Rope) -> Self {
        Self::new(RopeSource::new(rope))
    }

    /// Identity comparison: true when both handles share one source.
    pub fn same_source(&self, other: &Text) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn source(&self) -> &(dyn CharSource + Send + Sync) {
        self.inner.as_ref()
    }
}

impl CharSource for Text {
    fn len(&self) -> usize {
        self.inner.len()
    }

    fn unit_at(&self, i: usize) -> u16 {
        self.inner.unit_at(i)
    }

    fn substring(&self, from: usize, to: usize) -> String {
        self.inner.substring(from, to)
    }

    fn copy_units(&self, from: usize, to: usize, out: &mut Vec<u16>) {
        self.inner.copy_units(from, to, out)
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::new(Utf16Text::from(s))
    }
}

impl From<&Text> for Text {
    fn from(t: &Text) -> Self {
        t.clone()
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Text::from(s.as_str())
    }
}

impl From<Vec<u16>> for Text {
    fn from(units: Vec<u16>) -> Self {
        Text::from_units(units)
    }
}

impl From<Rope> for Text {
    fn from(rope: Rope) -> Self {
        Text::from_rope(rope)
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.substring(0, self.len()))
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Text({:?})", self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_text_indexes_code_units() {
        let t = Utf16Text::from("a\u{1F600}b");
        assert_eq!(t.len(), 4);
        assert_eq!(t.unit_at(0), 'a' as u16);
        assert_eq!(t.unit_at(3), 'b' as u16);
        assert_eq!(t.substring(1, 3), "\u{1F600}");
    }

    #[test]
    fn rope_source_matches_utf16_text() {
        let s = "héllo \u{1F600} world";
        let rope = RopeSource::new(Rope::from_str(s));
        let flat = Utf16Text::from(s);
        assert_eq!(rope.len(), flat.len());
        for i in 0..flat.len() {
            assert_eq!(rope.unit_at(i), flat.unit_at(i), "unit {i}");
        }
        assert_eq!(rope.substring(0, 5), "héllo");
    }

    #[test]
    fn text_identity() {
        let a = Text::from("abc");
        let b = a.clone();
        let c = Text::from("abc");
        assert!(a.same_source(&b));
        assert!(!a.same_source(&c));
        assert_eq!(c.to_string(), "abc");
    }
}

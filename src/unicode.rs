//! Case mapping on single code units and the Unicode classification oracle.
//!
//! The engine works on UTF-16 code units, so a case mapping that would
//! produce more than one unit (or an astral character) leaves the unit
//! unchanged.

use phf::{Map, phf_map};

/// Title-case forms that differ from the upper-case form.
static TITLE_CASE: Map<u16, u16> = phf_map! {
    0x01C4u16 => 0x01C5u16,
    0x01C5u16 => 0x01C5u16,
    0x01C6u16 => 0x01C5u16,
    0x01C7u16 => 0x01C8u16,
    0x01C8u16 => 0x01C8u16,
    0x01C9u16 => 0x01C8u16,
    0x01CAu16 => 0x01CBu16,
    0x01CBu16 => 0x01CBu16,
    0x01CCu16 => 0x01CBu16,
    0x01F1u16 => 0x01F2u16,
    0x01F2u16 => 0x01F2u16,
    0x01F3u16 => 0x01F2u16,
};

fn map_single<I: Iterator<Item = char>>(unit: u16, f: impl Fn(char) -> I) -> u16 {
    let Some(ch) = char::from_u32(unit as u32) else {
        return unit;
    };
    let mut mapped = f(ch);
    match (mapped.next(), mapped.next()) {
        (Some(m), None) if (m as u32) <= 0xFFFF => m as u32 as u16,
        _ => unit,
    }
}

pub fn to_upper(unit: u16) -> u16 {
    map_single(unit, char::to_uppercase)
}

pub fn to_lower(unit: u16) -> u16 {
    map_single(unit, char::to_lowercase)
}

pub fn to_title(unit: u16) -> u16 {
    TITLE_CASE
        .get(&unit)
        .copied()
        .unwrap_or_else(|| to_upper(unit))
}

/// The two alternative case forms of `unit`, as tried by case-insensitive
/// matching.
///
/// For an upper-case unit these are its lower and title forms, for a
/// lower-case unit its upper and title forms, and for a title-case unit its
/// lower and upper forms.
pub fn case_variants(unit: u16) -> (u16, u16) {
    let upper = to_upper(unit);
    let lower = to_lower(unit);
    let title = to_title(unit);
    if unit == upper {
        (lower, title)
    } else if unit == lower {
        (upper, title)
    } else {
        (lower, upper)
    }
}

/// True when `a` and `b` are equal ignoring case.
pub fn eq_ignore_case(a: u16, b: u16) -> bool {
    if a == b {
        return true;
    }
    let (x, y) = case_variants(a);
    b == x || b == y
}

/// Character classification used by the built-in Unicode validators.
pub trait UnicodeOracle: Send + Sync {
    fn is_digit(&self, unit: u16) -> bool;
    fn is_letter(&self, unit: u16) -> bool;
    fn is_white(&self, unit: u16) -> bool;
    fn is_punct(&self, unit: u16) -> bool;
    fn is_currency(&self, unit: u16) -> bool;
    fn is_math(&self, unit: u16) -> bool;

    fn is_upper(&self, unit: u16) -> bool {
        unit == to_upper(unit) && unit != to_lower(unit)
    }

    fn is_lower(&self, unit: u16) -> bool {
        unit != to_upper(unit) && unit == to_lower(unit)
    }
}

/// Classification backed by `char`'s own predicates plus small range tables
/// for the categories `char` does not expose.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdOracle;

const PUNCT: &[(u16, u16)] = &[
    (0x21, 0x23),
    (0x25, 0x2A),
    (0x2C, 0x2F),
    (0x3A, 0x3B),
    (0x3F, 0x40),
    (0x5B, 0x5D),
    (0x5F, 0x5F),
    (0x7B, 0x7B),
    (0x7D, 0x7D),
    (0xA1, 0xA1),
    (0xA7, 0xA7),
    (0xAB, 0xAB),
    (0xB6, 0xB7),
    (0xBB, 0xBB),
    (0xBF, 0xBF),
    (0x037E, 0x037E),
    (0x0387, 0x0387),
    (0x055A, 0x055F),
    (0x0589, 0x058A),
    (0x05BE, 0x05BE),
    (0x05C0, 0x05C0),
    (0x05C3, 0x05C3),
    (0x05C6, 0x05C6),
    (0x05F3, 0x05F4),
    (0x060C, 0x060D),
    (0x061B, 0x061B),
    (0x061F, 0x061F),
    (0x066A, 0x066D),
    (0x06D4, 0x06D4),
    (0x0964, 0x0965),
    (0x0970, 0x0970),
    (0x0E4F, 0x0E4F),
    (0x0E5A, 0x0E5B),
    (0x2010, 0x2027),
    (0x2030, 0x2043),
    (0x2045, 0x2051),
    (0x2053, 0x205E),
    (0x207D, 0x207E),
    (0x208D, 0x208E),
    (0x2308, 0x230B),
    (0x2329, 0x232A),
    (0x2768, 0x2775),
    (0x27C5, 0x27C6),
    (0x27E6, 0x27EF),
    (0x2983, 0x2998),
    (0x29D8, 0x29DB),
    (0x29FC, 0x29FD),
    (0x2E00, 0x2E4F),
    (0x3001, 0x3003),
    (0x3008, 0x3011),
    (0x3014, 0x301F),
    (0x3030, 0x3030),
    (0x303D, 0x303D),
    (0x30A0, 0x30A0),
    (0x30FB, 0x30FB),
    (0xFD3E, 0xFD3F),
    (0xFE10, 0xFE19),
    (0xFE30, 0xFE52),
    (0xFE54, 0xFE61),
    (0xFE63, 0xFE63),
    (0xFE68, 0xFE68),
    (0xFE6A, 0xFE6B),
    (0xFF01, 0xFF03),
    (0xFF05, 0xFF0A),
    (0xFF0C, 0xFF0F),
    (0xFF1A, 0xFF1B),
    (0xFF1F, 0xFF20),
    (0xFF3B, 0xFF3D),
    (0xFF3F, 0xFF3F),
    (0xFF5B, 0xFF5B),
    (0xFF5D, 0xFF5D),
    (0xFF5F, 0xFF65),
];

const CURRENCY: &[(u16, u16)] = &[
    (0x24, 0x24),
    (0xA2, 0xA5),
    (0x058F, 0x058F),
    (0x060B, 0x060B),
    (0x09F2, 0x09F3),
    (0x09FB, 0x09FB),
    (0x0AF1, 0x0AF1),
    (0x0BF9, 0x0BF9),
    (0x0E3F, 0x0E3F),
    (0x17DB, 0x17DB),
    (0x20A0, 0x20C0),
    (0xA838, 0xA838),
    (0xFDFC, 0xFDFC),
    (0xFE69, 0xFE69),
    (0xFF04, 0xFF04),
    (0xFFE0, 0xFFE1),
    (0xFFE5, 0xFFE6),
];

const MATH: &[(u16, u16)] = &[
    (0x2B, 0x2B),
    (0x3C, 0x3E),
    (0x7C, 0x7C),
    (0x7E, 0x7E),
    (0xAC, 0xAC),
    (0xB1, 0xB1),
    (0xD7, 0xD7),
    (0xF7, 0xF7),
    (0x03F6, 0x03F6),
    (0x0606, 0x0608),
    (0x2044, 0x2044),
    (0x2052, 0x2052),
    (0x207A, 0x207C),
    (0x208A, 0x208C),
    (0x2118, 0x2118),
    (0x2140, 0x2144),
    (0x214B, 0x214B),
    (0x2190, 0x2194),
    (0x219A, 0x219B),
    (0x21A0, 0x21A0),
    (0x21A3, 0x21A3),
    (0x21A6, 0x21A6),
    (0x21AE, 0x21AE),
    (0x21CE, 0x21CF),
    (0x21D2, 0x21D2),
    (0x21D4, 0x21D4),
    (0x21F4, 0x22FF),
    (0x2320, 0x2321),
    (0x237C, 0x237C),
    (0x239B, 0x23B3),
    (0x23DC, 0x23E1),
    (0x25B7, 0x25B7),
    (0x25C1, 0x25C1),
    (0x25F8, 0x25FF),
    (0x266F, 0x266F),
    (0x27C0, 0x27C4),
    (0x27C7, 0x27E5),
    (0x27F0, 0x27FF),
    (0x2900, 0x2982),
    (0x2999, 0x29D7),
    (0x29DC, 0x29FB),
    (0x29FE, 0x2AFF),
    (0x2B30, 0x2B44),
    (0x2B47, 0x2B4C),
    (0xFB29, 0xFB29),
    (0xFE62, 0xFE62),
    (0xFE64, 0xFE66),
    (0xFF0B, 0xFF0B),
    (0xFF1C, 0xFF1E),
    (0xFF5C, 0xFF5C),
    (0xFF5E, 0xFF5E),
    (0xFFE2, 0xFFE2),
    (0xFFE9, 0xFFEC),
];

fn in_table(table: &[(u16, u16)], unit: u16) -> bool {
    table
        .binary_search_by(|&(lo, hi)| {
            if hi < unit {
                std::cmp::Ordering::Less
            } else if lo > unit {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        })
        .is_ok()
}

fn as_char(unit: u16) -> Option<char> {
    char::from_u32(unit as u32)
}

impl UnicodeOracle for StdOracle {
    fn is_digit(&self, unit: u16) -> bool {
        as_char(unit).is_some_and(|c| c.is_numeric() && !c.is_alphabetic())
    }

    fn is_letter(&self, unit: u16) -> bool {
        as_char(unit).is_some_and(char::is_alphabetic)
    }

    fn is_white(&self, unit: u16) -> bool {
        as_char(unit).is_some_and(char::is_whitespace)
    }

    fn is_punct(&self, unit: u16) -> bool {
        in_table(PUNCT, unit)
    }

    fn is_currency(&self, unit: u16) -> bool {
        in_table(CURRENCY, unit)
    }

    fn is_math(&self, unit: u16) -> bool {
        in_table(MATH, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(c: char) -> u16 {
        c as u16
    }

    #[test]
    fn ascii_case_variants() {
        assert_eq!(case_variants(u('a')), (u('A'), u('A')));
        assert_eq!(case_variants(u('A')), (u('a'), u('A')));
        assert_eq!(case_variants(u('1')), (u('1'), u('1')));
    }

    #[test]
    fn title_case_digraphs() {
        // DŽ / Dž / dž
        assert_eq!(to_title(0x01C4), 0x01C5);
        assert_eq!(case_variants(0x01C5), (0x01C6, 0x01C4));
        assert!(eq_ignore_case(0x01C6, 0x01C5));
    }

    #[test]
    fn multi_unit_mappings_are_left_alone() {
        // 'ß' upper-cases to "SS"
        assert_eq!(to_upper(0xDF), 0xDF);
        // lone surrogate
        assert_eq!(to_upper(0xD800), 0xD800);
    }

    #[test]
    fn oracle_tables() {
        let o = StdOracle;
        assert!(o.is_punct(u('!')));
        assert!(!o.is_punct(u('$')));
        assert!(o.is_currency(u('$')));
        assert!(o.is_currency(0x20AC));
        assert!(o.is_math(u('+')));
        assert!(o.is_math(0x2200));
        assert!(o.is_digit(u('7')));
        assert!(o.is_letter(u('é')));
        assert!(o.is_white(u('\t')));
        assert!(o.is_upper(u('Q')));
        assert!(o.is_lower(u('q')));
        assert!(!o.is_upper(u('3')));
    }
}

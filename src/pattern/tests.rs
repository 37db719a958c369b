//! Behaviour suite: every pattern in the table is run plain, optimized,
//! cloned and recompiled from its decompiled form, and all of them must
//! agree with each other and with the expected match.

use crate::pattern::validator::ExtensionRegistry;
use crate::regex::Regex;
use crate::replace::Transformer;
use crate::source::{CharSource, Text};

type Spans = Vec<Option<(usize, usize)>>;

/// (pattern, text, expected match)
const CASES: &[(&str, &str, Option<&str>)] = &[
    // literals
    ("abc", "xxabcabc", Some("abc")),
    ("abd", "xxabcabc", None),
    ("abcab", "ababcabcab", Some("abcab")),
    ("hello world", "well, hello world!", Some("hello world")),
    ("hello", "say HeLLo", None),
    ("(?i)hello", "say HeLLo", Some("HeLLo")),
    ("(?i)hello world", "HELLO WORLD", Some("HELLO WORLD")),
    // dot
    ("a.c", "abc", Some("abc")),
    (".*", "", Some("")),
    ("a.*", "xa\nb", Some("a")),
    ("(?s)a.*", "xa\nb", Some("a\nb")),
    ("abc.*def", "xxabcZZZdefyy", Some("abcZZZdef")),
    ("abc.*def", "xxabcZZZdeyy", None),
    ("<.+?>", "<a><b>", Some("<a>")),
    // classes
    (r"[a-f]+\d", "zzbead7", Some("bead7")),
    ("[^a-c]+", "abcxyzabc", Some("xyz")),
    ("[0-9]+x", "123 45x", Some("45x")),
    ("x[abc]{3}y", "xabcy", Some("xabcy")),
    ("x[abc]{3}y", "xabdy", None),
    (r"\s+$", "trail   ", Some("   ")),
    (r"\w+@\w+", "mail bob@host now", Some("bob@host")),
    ("(?i)[a-c]+", "xxBaCd", Some("BaC")),
    // alternation
    ("x(a|b)y", "xay", Some("xay")),
    ("cat|car|dog", "my dog", Some("dog")),
    ("cat|car|dog", "a car", Some("car")),
    ("(?i)cat|car|dog", "A CAR", Some("CAR")),
    ("(?:ab|ac|b)+", "xacabbz", Some("acabb")),
    ("(?:a|b)*abb", "babaabb", Some("babaabb")),
    ("(a|ab)(c|bcd)(d*)", "abcd", Some("abcd")),
    ("a|", "b", Some("")),
    // repetition
    ("a*?", "aaa", Some("")),
    ("a*", "aaa", Some("aaa")),
    (r"\d{2,3}", "1 12345", Some("123")),
    ("a{,2}b", "aaab", Some("aab")),
    ("(?:ab){2,}", "abababx", Some("ababab")),
    ("colou?r", "the color", Some("color")),
    ("(a+)+b", "aaab", Some("aaab")),
    ("(a?)*b", "aab", Some("aab")),
    // anchors and look-ahead
    (r"\bfoo\b", "foobar foo", Some("foo")),
    ("^abc", "abcabc", Some("abc")),
    ("^abc", "xabc", None),
    ("(?m)^b$", "a\nb\nc", Some("b")),
    ("q(?!u)", "quit qat", Some("q")),
    ("foo(?=bar)", "foobaz foobar", Some("foo")),
    // back references and special groups
    (r"(\w)\1", "abccd", Some("cc")),
    (r"(\w+) \1", "say hello hello", Some("hello hello")),
    ("(?@())", "x(a(b)c)y", Some("(a(b)c)")),
    ("abc(?<2)bc", "xabc", Some("abc")),
    ("(??p)+", "ab!?c", Some("!?")),
];

fn spans(r: &mut Regex, text: &Text) -> Option<Spans> {
    if !r.search(text) {
        return None;
    }
    let res = r.result();
    Some((0..=r.num_subs()).map(|i| res.span(i)).collect())
}

fn every_match(r: &mut Regex, text: &Text) -> Vec<(usize, usize)> {
    r.set_global(true);
    let mut all = Vec::new();
    while all.len() <= text.len() && r.search(text) {
        all.extend(r.result().span(0));
    }
    all
}

fn compile_ok(pat: &str) -> Regex {
    Regex::compile(pat).unwrap_or_else(|e| panic!("{pat:?}: {e}"))
}

/// The plain regex and its optimized, cloned and recompiled variants.
fn variants(pat: &str) -> Vec<(&'static str, Regex)> {
    let plain = compile_ok(pat);
    let mut fast = compile_ok(pat);
    fast.optimize();
    let cloned = fast.clone();
    let recompiled = compile_ok(&plain.to_string());
    vec![
        ("plain", plain),
        ("optimized", fast),
        ("cloned", cloned),
        ("recompiled", recompiled),
    ]
}

// ─── Table ──────────────────────────────────────────────────────────────────

#[test]
fn table_matches_expected() {
    for &(pat, text, expected) in CASES {
        let text = Text::from(text);
        for (label, mut r) in variants(pat) {
            let matched = r
                .search(&text)
                .then(|| r.result().string_matched())
                .flatten();
            assert_eq!(matched.as_deref(), expected, "{label} {pat:?} on {text:?}");
        }
    }
}

#[test]
fn variants_agree_on_groups() {
    for &(pat, text, _) in CASES {
        let text = Text::from(text);
        let mut all = variants(pat);
        let (_, base) = &mut all[0];
        let want = spans(base, &text);
        for (label, r) in &mut all[1..] {
            assert_eq!(spans(r, &text), want, "{label} {pat:?} on {text:?}");
        }
    }
}

#[test]
fn variants_agree_on_every_match() {
    for &(pat, text, _) in CASES {
        let text = Text::from(text);
        let mut all = variants(pat);
        let (_, base) = &mut all[0];
        let want = every_match(base, &text);
        for (label, r) in &mut all[1..] {
            assert_eq!(every_match(r, &text), want, "{label} {pat:?} on {text:?}");
        }
    }
}

#[test]
fn variants_agree_in_reverse() {
    for &(pat, text, _) in CASES {
        let text = Text::from(text);
        let mut all = variants(pat);
        let (_, base) = &mut all[0];
        let want = base
            .reverse_search(&text)
            .then(|| base.result().span(0))
            .flatten();
        for (label, r) in &mut all[1..] {
            let got = r.reverse_search(&text).then(|| r.result().span(0)).flatten();
            assert_eq!(got, want, "{label} {pat:?} on {text:?}");
        }
    }
}

// ─── Properties ─────────────────────────────────────────────────────────────

#[test]
fn leftmost_wins_over_longest() {
    let mut r = compile_ok("b+|a");
    assert!(r.search("abbb"));
    assert_eq!(r.result().span(0), Some((0, 1)));
}

#[test]
fn groups_report_the_last_iteration() {
    let mut r = compile_ok("(?:(a)|(b))+");
    assert!(r.search("ab"));
    assert_eq!(r.result().group(2).as_deref(), Some("b"));
    let mut r = compile_ok("x(a|b)y");
    assert!(r.search("xay"));
    assert_eq!(r.result().group(1).as_deref(), Some("a"));
}

#[test]
fn prefilter_agrees_with_naive_scan() {
    let text = "xxabcZZZdefyy abcdef abc";
    let mut plain = compile_ok("abc.*def");
    let mut fast = compile_ok("abc.*def");
    fast.optimize();
    for start in 0..text.len() {
        assert_eq!(
            plain.search_from(text, start),
            fast.search_from(text, start),
            "from {start}"
        );
        assert_eq!(plain.result().span(0), fast.result().span(0), "from {start}");
    }
}

#[test]
fn flag_changes_after_optimize() {
    for pat in ["cat|car", "hello world", "x[a-c]+y"] {
        let mut r = compile_ok(pat);
        r.optimize();
        r.set_ignore_case(true);
        let mut fresh = compile_ok(&format!("(?i){pat}"));
        for text in ["CAR", "Hello World", "XaBcY", "none"] {
            assert_eq!(r.search(text), fresh.search(text), "{pat} on {text}");
            assert_eq!(r.result().span(0), fresh.result().span(0));
        }
    }
}

#[test]
fn shorthand_extension_in_a_local_registry() {
    let mut reg = ExtensionRegistry::with_builtins();
    reg.define_shorthand("num", "[0-9]+");
    let mut r = Regex::compile_with(r"(??num)-(??num)", '\\', &reg).unwrap();
    let mut fast = r.clone();
    fast.optimize();
    for re in [&mut r, &mut fast] {
        assert!(re.search("a 12-345"));
        assert_eq!(re.result().string_matched().as_deref(), Some("12-345"));
        assert_eq!(re.num_subs(), 0);
    }
}

// ─── Replacement ────────────────────────────────────────────────────────────

#[test]
fn zero_width_replacement_progresses() {
    for pat in ["", "x*", r"\b", "(?=a)"] {
        let r = Regex::with_replacement(pat, "|").unwrap();
        let out = r.replace_all("aaa");
        assert!(out.len() > 3, "{pat}: {out}");
        assert_eq!(out.replace('|', ""), "aaa");
    }
}

#[test]
fn replacement_that_cannot_rematch_is_idempotent() {
    for (pat, template, text) in [
        ("cat", "dog", "cat scatter"),
        (r"\d+", "#", "a1b22c333"),
        ("(?i)hello", "bye", "HELLO hello"),
    ] {
        let r = Regex::with_replacement(pat, template).unwrap();
        let once = r.replace_all(text);
        assert_eq!(r.replace_all(once.as_str()), once, "{pat}");
    }
}

#[test]
fn optimized_replacement_agrees() {
    let plain = Regex::with_replacement(r"(\w+)@(\w+)", "$2 at $1").unwrap();
    let mut fast = plain.clone();
    fast.optimize();
    let text = "mail bob@host or ann@box";
    assert_eq!(plain.replace_all(text), "mail host at bob or box at ann");
    assert_eq!(fast.replace_all(text), plain.replace_all(text));
}

#[test]
fn transformer_prefers_the_earliest_match() {
    let mut t = Transformer::new(true);
    t.add_all(["s/a+/A/", "s/b/B/", "s/ab/X/"]).unwrap();
    assert_eq!(t.replace_all("aab cab"), "AB cAB");
}

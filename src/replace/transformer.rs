//! A set of patterns searched together, each with its own replacement.

use crate::error::RegexError;
use crate::regex::{QuoteMask, Regex};
use crate::source::Text;

use super::{Hit, Replacer, Searcher};

/// Ordered patterns tried together. At each search the match that starts
/// earliest wins; among matches starting at the same offset the pattern
/// added first wins. The winner's replacement rule is applied.
#[derive(Debug, Clone, Default)]
pub struct Transformer {
    regexes: Vec<Regex>,
    auto_optimize: bool,
}

impl Transformer {
    /// An empty transformer. With `auto_optimize` every added pattern is
    /// optimized.
    pub fn new(auto_optimize: bool) -> Self {
        Self {
            regexes: Vec::new(),
            auto_optimize,
        }
    }

    pub fn add(&mut self, mut regex: Regex) -> &mut Self {
        if self.auto_optimize && !regex.optimized() {
            regex.optimize();
        }
        self.regexes.push(regex);
        self
    }

    /// Add `s/pattern/replacement/flags` or `m/pattern/flags`.
    pub fn add_perl(&mut self, code: &str) -> Result<&mut Self, RegexError> {
        let regex = Regex::perl_code(code)?;
        Ok(self.add(regex))
    }

    /// Add several Perl-style rules, stopping at the first that fails.
    pub fn add_all<'c>(
        &mut self,
        codes: impl IntoIterator<Item = &'c str>,
    ) -> Result<&mut Self, RegexError> {
        for code in codes {
            self.add_perl(code)?;
        }
        Ok(self)
    }

    /// Number of patterns.
    pub fn patterns(&self) -> usize {
        self.regexes.len()
    }

    pub fn regex_at(&self, i: usize) -> Option<&Regex> {
        self.regexes.get(i)
    }

    /// Replace the pattern at `i`, returning the old one.
    pub fn set_regex_at(&mut self, i: usize, regex: Regex) -> Option<Regex> {
        let slot = self.regexes.get_mut(i)?;
        Some(std::mem::replace(slot, regex))
    }

    /// Largest group count among the patterns.
    pub fn num_subs(&self) -> usize {
        self.regexes.iter().map(Regex::num_subs).max().unwrap_or(0)
    }

    pub fn replacer(&self) -> Replacer<'_> {
        Replacer::new(self)
    }

    pub fn replace_first(&self, text: impl Into<Text>) -> String {
        self.replacer().replace_first(text)
    }

    pub fn replace_first_from(&self, text: impl Into<Text>, start: usize) -> String {
        self.replacer().replace_first_from(text, start)
    }

    pub fn replace_first_region(&self, text: impl Into<Text>, start: usize, end: usize) -> String {
        self.replacer().replace_first_region(text, start, end)
    }

    pub fn replace_all(&self, text: impl Into<Text>) -> String {
        self.replacer().replace_all(text)
    }

    pub fn replace_all_from(&self, text: impl Into<Text>, start: usize) -> String {
        self.replacer().replace_all_from(text, start)
    }

    pub fn replace_all_region(&self, text: impl Into<Text>, start: usize, end: usize) -> String {
        self.replacer().replace_all_region(text, start, end)
    }
}

impl Searcher for Transformer {
    fn find(
        &self,
        text: &Text,
        masks: &QuoteMask<'_>,
        start: usize,
        end: usize,
        last_end: usize,
    ) -> Option<Hit> {
        let mut best: Option<(usize, Hit)> = None;
        for regex in &self.regexes {
            // Later patterns must start strictly earlier to win.
            let bound = match &best {
                Some((at, _)) if *at == start => break,
                Some((at, _)) => at - 1,
                None => end,
            };
            let Some(hit) = regex.find(text, masks, start, bound, last_end) else {
                continue;
            };
            if let Some((at, _)) = hit.res.span(0) {
                best = Some((at, hit));
            }
        }
        let (at, hit) = best?;
        log::trace!("transformer hit at {at}: {}", hit.res);
        Some(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rx(pat: &str, template: &str) -> Regex {
        Regex::with_replacement(pat, template).unwrap()
    }

    #[test]
    fn earliest_start_wins() {
        let mut t = Transformer::new(false);
        t.add(rx("b", "B")).add(rx("a", "A"));
        assert_eq!(t.replace_all("abcab"), "ABcAB");
        assert_eq!(t.replace_first("cab"), "cAb");
    }

    #[test]
    fn ties_go_to_the_first_added() {
        let mut t = Transformer::new(false);
        t.add(rx("ab", "1")).add(rx("abc", "2"));
        assert_eq!(t.replace_all("abc"), "1c");

        let mut t = Transformer::new(false);
        t.add(rx("abc", "2")).add(rx("ab", "1"));
        assert_eq!(t.replace_all("abc"), "2");
    }

    #[test]
    fn identity_rule_protects_text() {
        let mut t = Transformer::new(true);
        t.add_all(["s{//.*}{$&}", "s/hello/goodbye/"]).unwrap();
        assert_eq!(t.replace_all("hello // hello"), "goodbye // hello");
        assert_eq!(t.patterns(), 2);
        assert!(t.regex_at(0).is_some_and(Regex::optimized));
    }

    #[test]
    fn bad_code_is_reported() {
        let mut t = Transformer::new(false);
        assert!(matches!(
            t.add_perl("s/a/b/z"),
            Err(RegexError::PerlCode(_))
        ));
        assert_eq!(t.patterns(), 0);
    }

    #[test]
    fn patterns_can_be_swapped() {
        let mut t = Transformer::new(false);
        t.add(rx("a", "x"));
        let old = t.set_regex_at(0, rx("(b)(c)", "$2$1"));
        assert_eq!(old.map(|r| r.pattern().to_string()).as_deref(), Some("a"));
        assert!(t.set_regex_at(3, rx("a", "x")).is_none());
        assert_eq!(t.num_subs(), 2);
        assert_eq!(t.replace_all("abc"), "acb");
    }
}

//! Replacement rules and the template compiler.

use std::fmt;
use std::sync::Arc;

use crate::error::{RegexError, escalate};
use crate::pattern::parser::control_char;
use crate::result::RegRes;
use crate::source::CharSource;
use crate::unicode::{to_lower, to_upper};

use super::Searcher;
use super::registry::{Definition, RuleRegistry, with_default_rules};

/// How a [`RuleBuffer`] transforms the units pushed into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaseMode {
    /// `\E`: as is.
    #[default]
    Plain,
    /// `\U`
    Upper,
    /// `\L`
    Lower,
    /// `\u`: upper-case the next unit only.
    UpperNext,
    /// `\l`: lower-case the next unit only.
    LowerNext,
    /// `\Q`: backslash before anything not alphanumeric.
    Quote,
}

impl CaseMode {
    pub fn from_letter(c: u16) -> Option<Self> {
        let mode = match u8::try_from(c).ok()? {
            b'E' => Self::Plain,
            b'U' => Self::Upper,
            b'L' => Self::Lower,
            b'u' => Self::UpperNext,
            b'l' => Self::LowerNext,
            b'Q' => Self::Quote,
            _ => return None,
        };
        Some(mode)
    }

    pub fn letter(self) -> char {
        match self {
            Self::Plain => 'E',
            Self::Upper => 'U',
            Self::Lower => 'L',
            Self::UpperNext => 'u',
            Self::LowerNext => 'l',
            Self::Quote => 'Q',
        }
    }
}

/// Output of a replacement, with the current case mode applied to every
/// unit pushed.
#[derive(Debug, Clone, Default)]
pub struct RuleBuffer {
    out: Vec<u16>,
    mode: CaseMode,
    /// The mode to return to after a one-unit mode.
    saved: Option<CaseMode>,
}

impl RuleBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, u: u16) {
        match self.mode {
            CaseMode::Plain => self.out.push(u),
            CaseMode::Upper => self.out.push(to_upper(u)),
            CaseMode::Lower => self.out.push(to_lower(u)),
            CaseMode::UpperNext => {
                self.mode = self.saved.take().unwrap_or_default();
                self.out.push(to_upper(u));
            }
            CaseMode::LowerNext => {
                self.mode = self.saved.take().unwrap_or_default();
                self.out.push(to_lower(u));
            }
            CaseMode::Quote => {
                if !(u < 0x80 && (u as u8).is_ascii_alphanumeric()) {
                    self.out.push(b'\\' as u16);
                }
                self.out.push(u);
            }
        }
    }

    pub fn push_units(&mut self, units: &[u16]) {
        units.iter().for_each(|&u| self.push(u));
    }

    pub fn push_str(&mut self, s: &str) {
        s.encode_utf16().for_each(|u| self.push(u));
    }

    /// Push `from..to` of the searched text.
    pub fn push_span(&mut self, res: &RegRes, from: usize, to: usize) {
        let mut units = Vec::with_capacity(to.saturating_sub(from));
        res.copy_units(from, to, &mut units);
        self.push_units(&units);
    }

    /// Copy `from..to` of `src` as is, ignoring the case mode.
    pub(crate) fn push_source(&mut self, src: &dyn CharSource, from: usize, to: usize) {
        if from < to {
            src.copy_units(from, to, &mut self.out);
        }
    }

    pub fn set_mode(&mut self, mode: CaseMode) {
        if matches!(mode, CaseMode::UpperNext | CaseMode::LowerNext) && self.saved.is_none() {
            self.saved = Some(self.mode);
        }
        self.mode = mode;
    }

    /// Drop any case mode left over from the last rule.
    pub(crate) fn reset_mode(&mut self) {
        self.mode = CaseMode::Plain;
        self.saved = None;
    }

    pub fn units(&self) -> &[u16] {
        &self.out
    }

    pub fn into_units(self) -> Vec<u16> {
        self.out
    }
}

/// A user-supplied replacement action, invoked as `${name}` or
/// `${name:arg}` once defined in a [`RuleRegistry`].
pub trait CustomRule: Send + Sync {
    fn apply(&self, out: &mut RuleBuffer, res: &RegRes);

    /// A variant configured by the `:arg` of a reference. `None` keeps
    /// this rule unchanged.
    fn with_arg(&self, _arg: &str) -> Option<Arc<dyn CustomRule>> {
        None
    }
}

/// One step of a replacement.
#[derive(Clone)]
pub enum RuleItem {
    Literal(Vec<u16>),
    /// `$&`
    Matched,
    /// `` $` ``
    Prematch,
    /// `$'`
    Postmatch,
    /// `$N`
    Group(usize),
    /// `\U`, `\L`, `\u`, `\l`, `\Q`, `\E`
    Case(CaseMode),
    /// `${+name}`: search with `target` until popped.
    Push {
        name: String,
        target: Arc<dyn Searcher>,
    },
    /// `${=name}`: replace the active pattern with `target`.
    Change {
        name: String,
        target: Arc<dyn Searcher>,
    },
    /// `${POP}`
    Pop,
    /// `${WANT_MORE_TEXT}`
    WantMoreText,
    Custom {
        name: String,
        rule: Arc<dyn CustomRule>,
    },
}

impl RuleItem {
    /// Directives that steer the replacer rather than produce text.
    pub fn is_special(&self) -> bool {
        matches!(
            self,
            Self::Case(_) | Self::Push { .. } | Self::Change { .. } | Self::Pop | Self::WantMoreText
        )
    }

    pub fn apply(&self, out: &mut RuleBuffer, res: &RegRes) {
        match self {
            Self::Literal(units) => out.push_units(units),
            Self::Matched => {
                if let Some((from, to)) = res.span(0) {
                    out.push_span(res, from, to);
                }
            }
            Self::Prematch => {
                if let Some(from) = res.matched_from() {
                    out.push_span(res, 0, from);
                }
            }
            Self::Postmatch => {
                if let (Some(to), Some(text)) = (res.matched_to(), res.text()) {
                    out.push_span(res, to, text.len());
                }
            }
            Self::Group(g) => {
                if let Some((from, to)) = res.span(*g) {
                    out.push_span(res, from, to);
                }
            }
            Self::Case(mode) => out.set_mode(*mode),
            Self::Custom { rule, .. } => rule.apply(out, res),
            Self::Push { .. } | Self::Change { .. } | Self::Pop | Self::WantMoreText => {}
        }
    }
}

impl fmt::Display for RuleItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(units) => f.write_str(&String::from_utf16_lossy(units)),
            Self::Matched => f.write_str("$&"),
            Self::Prematch => f.write_str("$`"),
            Self::Postmatch => f.write_str("$'"),
            Self::Group(g) if *g < 10 => write!(f, "${g}"),
            Self::Group(g) => write!(f, "${{{g}}}"),
            Self::Case(mode) => write!(f, "\\{}", mode.letter()),
            Self::Push { name, .. } => write!(f, "${{+{name}}}"),
            Self::Change { name, .. } => write!(f, "${{={name}}}"),
            Self::Pop => f.write_str("${POP}"),
            Self::WantMoreText => f.write_str("${WANT_MORE_TEXT}"),
            Self::Custom { name, .. } => write!(f, "${{{name}}}"),
        }
    }
}

impl fmt::Debug for RuleItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuleItem({self})")
    }
}

/// A compiled replacement: a chain of [`RuleItem`]s applied in order.
/// Clones share the chain.
#[derive(Clone)]
pub struct ReplaceRule {
    items: Arc<[RuleItem]>,
}

impl ReplaceRule {
    pub fn new(items: Vec<RuleItem>) -> Self {
        Self {
            items: items.into(),
        }
    }

    /// Insert `text` verbatim, with no interpolation.
    pub fn literal(text: &str) -> Self {
        Self::new(vec![RuleItem::Literal(text.encode_utf16().collect())])
    }

    /// `$&`: leave every match as it was.
    pub fn matched() -> Self {
        Self::new(vec![RuleItem::Matched])
    }

    pub fn custom(name: &str, rule: Arc<dyn CustomRule>) -> Self {
        Self::new(vec![RuleItem::Custom {
            name: name.to_string(),
            rule,
        }])
    }

    /// Compile `template` against the process-wide rule registry.
    pub fn parse(template: &str) -> Result<Self, RegexError> {
        with_default_rules(|registry| Self::compile(template, registry))
    }

    /// [`ReplaceRule::compile_lenient`] against the process-wide registry.
    pub fn parse_lenient(template: &str) -> Self {
        with_default_rules(|registry| Self::compile_lenient(template, registry))
    }

    /// Compile `template`, resolving `${name}` references in `registry`.
    ///
    /// An unclosed or empty `${` is a syntax error. A name the registry
    /// does not define, or one used in a way its definition does not allow,
    /// is unsupported.
    pub fn compile(template: &str, registry: &RuleRegistry) -> Result<Self, RegexError> {
        Self::scan(template, registry, false).map_err(escalate)
    }

    /// Compile `template` without rejecting anything: unknown names are
    /// copied as `${name}` and a `$` that starts nothing is plain text.
    pub fn compile_lenient(template: &str, registry: &RuleRegistry) -> Self {
        Self::scan(template, registry, true).unwrap_or_else(|_| Self::literal(template))
    }

    fn scan(template: &str, registry: &RuleRegistry, lenient: bool) -> Result<Self, RegexError> {
        let units: Vec<u16> = template.encode_utf16().collect();
        let mut scan = TemplateScan {
            t: &units,
            registry,
            lenient,
            items: Vec::new(),
            text: Vec::new(),
        };
        scan.run()?;
        let rule = Self::new(scan.items);
        log::trace!("replacement {template:?} compiled to {} items", rule.items.len());
        Ok(rule)
    }

    pub fn items(&self) -> &[RuleItem] {
        &self.items
    }

    /// This rule followed by `other`.
    pub fn then(&self, other: &ReplaceRule) -> ReplaceRule {
        Self::new(self.items.iter().chain(other.items.iter()).cloned().collect())
    }

    /// True when the chain holds a directive.
    pub fn is_special(&self) -> bool {
        self.items.iter().any(RuleItem::is_special)
    }

    /// True for a lone `$&`, which leaves the text unchanged.
    pub fn is_identity(&self) -> bool {
        matches!(&*self.items, [RuleItem::Matched])
    }

    /// Append the replacement for `res` to `out`.
    pub fn apply(&self, out: &mut RuleBuffer, res: &RegRes) {
        self.items.iter().for_each(|item| item.apply(out, res));
    }
}

impl Default for ReplaceRule {
    fn default() -> Self {
        Self::matched()
    }
}

impl fmt::Display for ReplaceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.items.iter().try_for_each(|item| write!(f, "{item}"))
    }
}

impl fmt::Debug for ReplaceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplaceRule({:?})", self.to_string())
    }
}

// --- Template compiler ---

const BACKSLASH: u16 = b'\\' as u16;
const DOLLAR: u16 = b'$' as u16;

fn is_ascii(u: u16, pred: impl Fn(&u8) -> bool) -> bool {
    u8::try_from(u).is_ok_and(|b| pred(&b))
}

fn hex_digit(u: u16) -> Option<u16> {
    char::from_u32(u32::from(u))?
        .to_digit(16)
        .map(|d| d as u16)
}

struct TemplateScan<'a> {
    t: &'a [u16],
    registry: &'a RuleRegistry,
    /// Copy what cannot be resolved instead of failing.
    lenient: bool,
    items: Vec<RuleItem>,
    /// Literal text not yet flushed into `items`.
    text: Vec<u16>,
}

impl TemplateScan<'_> {
    fn run(&mut self) -> Result<(), RegexError> {
        let mut i = 0;
        while i < self.t.len() {
            let consumed = match self.t[i] {
                BACKSLASH => self.escape(i + 1),
                DOLLAR => self.variable(i + 1)?,
                _ => None,
            };
            match consumed {
                Some(next) => i = next,
                None => {
                    self.text.push(self.t[i]);
                    i += 1;
                }
            }
        }
        self.flush();
        Ok(())
    }

    fn flush(&mut self) {
        if !self.text.is_empty() {
            self.items
                .push(RuleItem::Literal(std::mem::take(&mut self.text)));
        }
    }

    fn item(&mut self, item: RuleItem) {
        self.flush();
        self.items.push(item);
    }

    fn digits_from(&self, i: usize) -> usize {
        self.t[i..]
            .iter()
            .take_while(|&&u| is_ascii(u, u8::is_ascii_digit))
            .count()
    }

    /// A single digit names a group; more digits are an octal character
    /// code.
    fn digit_ref(&mut self, digits: &[u16]) {
        if let [d] = digits {
            self.item(RuleItem::Group(usize::from(d - b'0' as u16)));
        } else {
            let code = digits.iter().fold(0u32, |acc, &d| {
                acc.wrapping_mul(8).wrapping_add(u32::from(d - b'0' as u16))
            });
            self.text.push(code as u16);
        }
    }

    /// After a backslash at `i - 1`. Returns the offset past the escape.
    fn escape(&mut self, i: usize) -> Option<usize> {
        let c = *self.t.get(i)?;
        let n = self.digits_from(i);
        if n > 0 {
            let digits = self.t[i..i + n].to_vec();
            self.digit_ref(&digits);
            return Some(i + n);
        }
        let control = match u8::try_from(c).unwrap_or(0) {
            b'n' => Some(10),
            b'r' => Some(13),
            b't' => Some(9),
            b'b' => Some(8),
            b'a' => Some(7),
            b'e' => Some(27),
            b'f' => Some(12),
            _ => None,
        };
        if let Some(u) = control {
            self.text.push(u);
            return Some(i + 1);
        }
        if c == b'c' as u16
            && let Some(&x) = self.t.get(i + 1)
        {
            self.text.push(control_char(x));
            return Some(i + 2);
        }
        if c == b'x' as u16
            && let (Some(hi), Some(lo)) = (
                self.t.get(i + 1).and_then(|&u| hex_digit(u)),
                self.t.get(i + 2).and_then(|&u| hex_digit(u)),
            )
        {
            self.text.push(hi * 16 + lo);
            return Some(i + 3);
        }
        match CaseMode::from_letter(c) {
            Some(mode) => self.item(RuleItem::Case(mode)),
            None => self.text.push(c),
        }
        Some(i + 1)
    }

    /// After a `$` at `i - 1`. `None` leaves the `$` as text.
    fn variable(&mut self, i: usize) -> Result<Option<usize>, RegexError> {
        let Some(&c) = self.t.get(i) else {
            return Ok(None);
        };
        let n = self.digits_from(i);
        if n > 0 {
            let digits = self.t[i..i + n].to_vec();
            self.digit_ref(&digits);
            return Ok(Some(i + n));
        }
        let word = self.t[i..]
            .iter()
            .take_while(|&&u| u == b'_' as u16 || is_ascii(u, u8::is_ascii_alphanumeric))
            .count();
        if word > 0 {
            let name = String::from_utf16_lossy(&self.t[i..i + word]);
            self.named(&name)?;
            return Ok(Some(i + word));
        }
        if c == b'&' as u16 || c == b'\'' as u16 || c == b'`' as u16 {
            self.named(&String::from_utf16_lossy(&[c]))?;
            return Ok(Some(i + 1));
        }
        if c != b'{' as u16 {
            return Ok(None);
        }
        let body = &self.t[i + 1..];
        let len = body
            .iter()
            .take_while(|&&u| u != b'}' as u16 && u != b'\n' as u16 && u != BACKSLASH)
            .count();
        if len == 0 || body.get(len) != Some(&(b'}' as u16)) {
            if self.lenient {
                return Ok(None);
            }
            let shown = String::from_utf16_lossy(&body[..len]);
            return Err(if len == 0 && body.first() == Some(&(b'}' as u16)) {
                RegexError::syntax("Empty ${} in replacement")
            } else {
                RegexError::syntax(format!("Missing }} after ${{{shown} in replacement"))
            });
        }
        let inner = body[..len].to_vec();
        if inner.iter().all(|&u| is_ascii(u, u8::is_ascii_digit)) {
            self.digit_ref(&inner);
        } else {
            self.named(&String::from_utf16_lossy(&inner))?;
        }
        Ok(Some(i + 1 + len + 1))
    }

    fn named(&mut self, var: &str) -> Result<(), RegexError> {
        let (name, arg) = match var.find(':') {
            Some(pc) if pc > 0 => (&var[..pc], Some(&var[pc + 1..])),
            _ => (var, None),
        };
        let item = match name {
            "&" | "MATCH" => Some(RuleItem::Matched),
            "`" | "PREMATCH" => Some(RuleItem::Prematch),
            "'" | "POSTMATCH" => Some(RuleItem::Postmatch),
            "WANT_MORE_TEXT" => Some(RuleItem::WantMoreText),
            "POP" => Some(RuleItem::Pop),
            _ => None,
        };
        if let Some(item) = item {
            self.item(item);
            return Ok(());
        }
        if let Some(target_name) = name.strip_prefix('+')
            && let Some(target) = self.registry.searcher(target_name)
        {
            self.item(RuleItem::Push {
                name: target_name.to_string(),
                target,
            });
            return Ok(());
        }
        if let Some(target_name) = name.strip_prefix('=')
            && let Some(target) = self.registry.searcher(target_name)
        {
            self.item(RuleItem::Change {
                name: target_name.to_string(),
                target,
            });
            return Ok(());
        }
        if let Some(Definition::Rule(rule)) = self.registry.get(name) {
            let rule = rule.clone();
            self.splice(&rule, arg);
            return Ok(());
        }
        if !self.lenient {
            let bare = name.trim_start_matches(['+', '=']);
            let msg = match self.registry.get(bare) {
                None => format!("Undefined replacement name ${{{name}}}"),
                Some(Definition::Rule(_)) => format!("${{{name}}}: {bare} is not a pattern"),
                Some(_) => format!("${{{name}}}: {bare} is a pattern, use ${{+{bare}}}"),
            };
            return Err(RegexError::unsupported(msg));
        }
        self.text.extend("${".encode_utf16());
        self.text.extend(var.encode_utf16());
        self.text.push(b'}' as u16);
        Ok(())
    }

    /// Insert a registered rule. A lone custom rule is asked for its `arg`
    /// variant first.
    fn splice(&mut self, rule: &ReplaceRule, arg: Option<&str>) {
        if let (Some(arg), [RuleItem::Custom { name, rule: custom }]) = (arg, rule.items())
            && let Some(variant) = custom.with_arg(arg)
        {
            self.item(RuleItem::Custom {
                name: name.clone(),
                rule: variant,
            });
            return;
        }
        for item in rule.items() {
            self.item(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::matcher::Found;
    use crate::source::Text;
    use crate::regex::Regex;

    /// A result for `text` matching `start..end` with the given groups.
    fn res(text: &str, start: usize, end: usize, groups: &[(usize, usize)]) -> RegRes {
        let n = groups.len();
        let mut marks = vec![-1isize; 2 * (n + 1)];
        for (g, &(from, to)) in groups.iter().enumerate() {
            marks[g + 1] = from as isize;
            marks[g + 1 + n] = to as isize;
        }
        RegRes::from_found(Text::from(text), Found { start, end, marks }, n)
    }

    fn expand(template: &str, r: &RegRes) -> String {
        let rule = ReplaceRule::compile(template, &RuleRegistry::new())
            .unwrap_or_else(|e| panic!("{template:?}: {e}"));
        let mut out = RuleBuffer::new();
        rule.apply(&mut out, r);
        String::from_utf16_lossy(out.units())
    }

    struct Stars(usize);

    impl CustomRule for Stars {
        fn apply(&self, out: &mut RuleBuffer, _res: &RegRes) {
            out.push_str(&"*".repeat(self.0));
        }

        fn with_arg(&self, arg: &str) -> Option<Arc<dyn CustomRule>> {
            arg.parse().ok().map(|n| Arc::new(Stars(n)) as Arc<dyn CustomRule>)
        }
    }

    // --- References ---

    #[test]
    fn match_and_group_references() {
        let r = res("say id42 now", 4, 8, &[(6, 8)]);
        assert_eq!(expand("$&-$1", &r), "id42-42");
        assert_eq!(expand(r"[\1]", &r), "[42]");
        assert_eq!(expand("${1}x", &r), "42x");
        assert_eq!(expand("${MATCH}", &r), "id42");
        assert_eq!(expand("<$`|$'>", &r), "<say | now>");
        assert_eq!(expand("${PREMATCH}${POSTMATCH}", &r), "say  now");
        assert_eq!(expand("$0", &r), "id42");
    }

    #[test]
    fn missing_groups_expand_to_nothing() {
        let r = res("abc", 0, 1, &[]);
        assert_eq!(expand("[$1]", &r), "[]");
    }

    #[test]
    fn multi_digit_references_are_octal_codes() {
        let r = res("abc", 0, 1, &[]);
        assert_eq!(expand("$101", &r), "A");
        assert_eq!(expand(r"\101!", &r), "A!");
        assert_eq!(expand("${101}", &r), "A");
    }

    // --- Escapes ---

    #[test]
    fn escapes() {
        let r = res("abc", 0, 1, &[]);
        assert_eq!(expand(r"a\tb\n", &r), "a\tb\n");
        assert_eq!(expand(r"\x41\cA\e", &r), "A\u{1}\u{1b}");
        assert_eq!(expand(r"\$1\\", &r), "$1\\");
        assert_eq!(expand(r"\xZ", &r), "xZ");
        assert_eq!(expand("cost: $", &r), "cost: $");
    }

    fn compile_err(template: &str, reg: &RuleRegistry) -> RegexError {
        match ReplaceRule::compile(template, reg) {
            Err(e) => e,
            Ok(rule) => panic!("{template:?} compiled to {rule:?}"),
        }
    }

    // --- Errors ---

    #[test]
    fn undefined_names_are_unsupported() {
        let reg = RuleRegistry::new();
        for t in ["<${nosuch}>", "$nope!", "${nope:3}", "${+nosuch}", "${=nosuch}"] {
            let e = compile_err(t, &reg);
            assert!(matches!(e, RegexError::Unsupported(_)), "{t:?}: {e:?}");
        }
        assert_eq!(
            compile_err("${nosuch}", &reg).message(),
            "Undefined replacement name ${nosuch}"
        );
    }

    #[test]
    fn names_must_be_used_as_defined() {
        let mut reg = RuleRegistry::new();
        reg.define_rule("lit", ReplaceRule::literal("x"));
        reg.define_regex("digits", Regex::compile(r"\d+").unwrap());
        assert!(matches!(compile_err("${+lit}", &reg), RegexError::Unsupported(_)));
        assert!(matches!(compile_err("${digits}", &reg), RegexError::Unsupported(_)));
        assert!(ReplaceRule::compile("${+digits}${=digits}", &reg).is_ok());
    }

    #[test]
    fn malformed_braces_are_syntax_errors() {
        let reg = RuleRegistry::new();
        for t in ["${oops", "a${", "${}", "${a\nb}", r"${a\}"] {
            let e = compile_err(t, &reg);
            assert!(matches!(e, RegexError::Syntax(_)), "{t:?}: {e:?}");
        }
    }

    #[test]
    fn lenient_form_copies_what_it_cannot_resolve() {
        let reg = RuleRegistry::new();
        let r = res("abc", 0, 1, &[]);
        let run = |template: &str| {
            let mut out = RuleBuffer::new();
            ReplaceRule::compile_lenient(template, &reg).apply(&mut out, &r);
            String::from_utf16_lossy(out.units())
        };
        assert_eq!(run("<${nosuch}>"), "<${nosuch}>");
        assert_eq!(run("$nope!"), "${nope}!");
        assert_eq!(run("${nope:3}"), "${nope:3}");
        assert_eq!(run("${oops"), "${oops");
        assert_eq!(run("[$&]"), "[a]");
    }

    // --- Case directives ---

    #[test]
    fn case_directives() {
        let r = res("hello world", 0, 11, &[(0, 5), (6, 11)]);
        assert_eq!(expand(r"\U$1\E $2", &r), "HELLO world");
        assert_eq!(expand(r"\u$1 \L\uWORLD", &r), "Hello World");
        assert_eq!(expand(r"\Q$&\E", &r), "hello\\ world");
        assert_eq!(expand(r"\Uab\Ecd", &r), "ABcd");
    }

    // --- Registry ---

    #[test]
    fn registered_rules_expand_inline() {
        let mut reg = RuleRegistry::new();
        reg.define_rule("stars", ReplaceRule::custom("stars", Arc::new(Stars(2))));
        reg.define_rule("wrap", ReplaceRule::compile("[$&]", &RuleRegistry::new()).unwrap());
        let r = res("abc", 1, 2, &[]);
        let run = |template: &str| {
            let mut out = RuleBuffer::new();
            ReplaceRule::compile(template, &reg).unwrap().apply(&mut out, &r);
            String::from_utf16_lossy(out.units())
        };
        assert_eq!(run("${stars}"), "**");
        assert_eq!(run("${stars:4}"), "****");
        assert_eq!(run("${stars:x}"), "**");
        assert_eq!(run("$wrap!"), "[b]!");
    }

    #[test]
    fn directives_are_special() {
        let reg = RuleRegistry::new();
        assert!(ReplaceRule::compile(r"\Ux", &reg).unwrap().is_special());
        assert!(ReplaceRule::compile("${POP}", &reg).unwrap().is_special());
        assert!(ReplaceRule::compile("${WANT_MORE_TEXT}", &reg).unwrap().is_special());
        assert!(!ReplaceRule::compile("$&-$1", &reg).unwrap().is_special());
        assert!(ReplaceRule::compile("$&", &reg).unwrap().is_identity());
    }

    #[test]
    fn display_restores_the_template() {
        let reg = RuleRegistry::new();
        for t in ["$&-$1", r"\Ux\E", "${POP}", "a$`b$'c", "${WANT_MORE_TEXT}"] {
            assert_eq!(ReplaceRule::compile(t, &reg).unwrap().to_string(), t);
        }
        assert_eq!(ReplaceRule::compile(r"a\tb", &reg).unwrap().to_string(), "a\tb");
    }
}

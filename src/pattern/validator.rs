//! User extensions invoked with `(??name)` and `(??name:arg)`.
//!
//! An extension is either a shorthand, a pattern compiled inline in place of
//! the invocation, or a validator paired with a prototype pattern: the
//! prototype is matched first and the validator then accepts, rejects or
//! moves the end of the span it matched.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock};

use phf::{Map, phf_map};

use crate::quant::Bound;
use crate::source::CharSource;
use crate::unicode::{StdOracle, UnicodeOracle};

pub trait Validator: Send + Sync {
    /// Check `start..end`, the span the prototype matched. Returns the end
    /// offset to continue from, or `None` to reject.
    fn validate(&self, src: &dyn CharSource, start: usize, end: usize) -> Option<usize>;

    /// A variant configured by the `:arg` of an invocation. `None` keeps
    /// this validator unchanged.
    fn with_arg(&self, _arg: &str) -> Option<Arc<dyn Validator>> {
        None
    }

    fn min_chars(&self) -> Bound {
        Bound::ZERO
    }

    fn max_chars(&self) -> Bound {
        Bound::Infinite
    }

    /// True for single-unit property tests, which fixed-step repetition
    /// can iterate without backtracking into.
    fn is_unicode_property(&self) -> bool {
        false
    }
}

/// Accepts whatever the prototype matched.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn validate(&self, _src: &dyn CharSource, _start: usize, end: usize) -> Option<usize> {
        Some(end)
    }
}

// --- Built-in Unicode properties ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Property {
    Punct,
    White,
    Word,
    Digit,
    Math,
    Currency,
    Alpha,
    Upper,
    Lower,
}

/// Built-in property names: the property and whether it is negated.
static PROPERTIES: Map<&'static str, (Property, bool)> = phf_map! {
    "p" => (Property::Punct, false),
    "P" => (Property::Punct, true),
    "s" => (Property::White, false),
    "S" => (Property::White, true),
    "w" => (Property::Word, false),
    "W" => (Property::Word, true),
    "d" => (Property::Digit, false),
    "D" => (Property::Digit, true),
    "m" => (Property::Math, false),
    "M" => (Property::Math, true),
    "c" => (Property::Currency, false),
    "C" => (Property::Currency, true),
    "a" => (Property::Alpha, false),
    "A" => (Property::Alpha, true),
    "uc" => (Property::Upper, false),
    "lc" => (Property::Lower, false),
};

/// The prototype of every built-in property: advance over one unit.
pub const PROPERTY_PROTOTYPE: &str = "(?>1)";

/// Tests the unit at the start of the span against a Unicode property.
#[derive(Debug, Clone, Copy)]
pub struct UnicodeProperty {
    property: Property,
    negated: bool,
}

impl UnicodeProperty {
    fn holds(&self, unit: u16) -> bool {
        let o = StdOracle;
        match self.property {
            Property::Punct => o.is_punct(unit),
            Property::White => o.is_white(unit),
            Property::Word => o.is_letter(unit) || o.is_digit(unit) || unit == b'_' as u16,
            Property::Digit => o.is_digit(unit),
            Property::Math => o.is_math(unit),
            Property::Currency => o.is_currency(unit),
            Property::Alpha => o.is_letter(unit),
            Property::Upper => o.is_upper(unit),
            Property::Lower => o.is_lower(unit),
        }
    }
}

impl Validator for UnicodeProperty {
    fn validate(&self, src: &dyn CharSource, start: usize, end: usize) -> Option<usize> {
        (start < src.len() && self.holds(src.unit_at(start)) != self.negated).then_some(end)
    }

    fn min_chars(&self) -> Bound {
        Bound::ONE
    }

    fn max_chars(&self) -> Bound {
        Bound::ONE
    }

    fn is_unicode_property(&self) -> bool {
        true
    }
}

// --- Registry ---

#[derive(Clone)]
pub enum Extension {
    Shorthand(String),
    Custom {
        prototype: String,
        validator: Arc<dyn Validator>,
    },
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shorthand(p) => write!(f, "Shorthand({p:?})"),
            Self::Custom { prototype, .. } => write!(f, "Custom({prototype:?})"),
        }
    }
}

/// Named extensions available to the compiler.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    entries: HashMap<String, Extension>,
}

impl ExtensionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in Unicode properties.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        for (name, &(property, negated)) in PROPERTIES.entries() {
            reg.define(
                name,
                PROPERTY_PROTOTYPE,
                Arc::new(UnicodeProperty { property, negated }),
            );
        }
        reg
    }

    pub fn define(&mut self, name: &str, prototype: &str, validator: Arc<dyn Validator>) {
        self.entries.insert(
            name.to_string(),
            Extension::Custom {
                prototype: prototype.to_string(),
                validator,
            },
        );
    }

    pub fn define_shorthand(&mut self, name: &str, pattern: &str) {
        self.entries
            .insert(name.to_string(), Extension::Shorthand(pattern.to_string()));
    }

    pub fn undefine(&mut self, name: &str) {
        self.entries.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Extension> {
        self.entries.get(name)
    }
}

static DEFAULT_EXTENSIONS: LazyLock<RwLock<ExtensionRegistry>> =
    LazyLock::new(|| RwLock::new(ExtensionRegistry::with_builtins()));

/// Run `f` against the process-wide registry used by [`Regex::compile`].
///
/// [`Regex::compile`]: crate::Regex::compile
pub fn with_default_registry<R>(f: impl FnOnce(&ExtensionRegistry) -> R) -> R {
    match DEFAULT_EXTENSIONS.read() {
        Ok(guard) => f(&guard),
        Err(poisoned) => f(&poisoned.into_inner()),
    }
}

fn update_default(f: impl FnOnce(&mut ExtensionRegistry)) {
    match DEFAULT_EXTENSIONS.write() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

/// Define a validator extension in the process-wide registry.
pub fn define(name: &str, prototype: &str, validator: Arc<dyn Validator>) {
    log::debug!("defining extension (??{name}) over {prototype:?}");
    update_default(|r| r.define(name, prototype, validator));
}

/// Define a shorthand extension in the process-wide registry.
pub fn define_shorthand(name: &str, pattern: &str) {
    log::debug!("defining shorthand (??{name}) = {pattern:?}");
    update_default(|r| r.define_shorthand(name, pattern));
}

pub fn undefine(name: &str) {
    update_default(|r| r.undefine(name));
}

pub fn is_defined(name: &str) -> bool {
    with_default_registry(|r| r.is_defined(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn property(name: &str) -> Arc<dyn Validator> {
        let reg = ExtensionRegistry::with_builtins();
        match reg.get(name) {
            Some(Extension::Custom { validator, .. }) => Arc::clone(validator),
            other => panic!("expected validator for {name}, got {other:?}"),
        }
    }

    #[test]
    fn builtins_are_registered() {
        let reg = ExtensionRegistry::with_builtins();
        for name in ["p", "P", "s", "S", "w", "W", "d", "D", "uc", "lc"] {
            assert!(reg.is_defined(name), "{name}");
        }
        assert!(!reg.is_defined("x"));
    }

    #[test]
    fn properties_test_the_first_unit() {
        let text = src("a1!$ É");
        let w = property("w");
        assert_eq!(w.validate(&text, 0, 1), Some(1));
        assert_eq!(w.validate(&text, 2, 3), None);
        assert_eq!(property("W").validate(&text, 2, 3), Some(3));
        assert_eq!(property("p").validate(&text, 2, 3), Some(3));
        assert_eq!(property("c").validate(&text, 3, 4), Some(4));
        assert_eq!(property("s").validate(&text, 4, 5), Some(5));
        assert_eq!(property("uc").validate(&text, 5, 6), Some(6));
        assert_eq!(property("lc").validate(&text, 5, 6), None);
        assert_eq!(w.validate(&text, 6, 6), None);
        assert!(w.is_unicode_property());
        assert_eq!(w.min_chars(), Bound::ONE);
    }

    #[test]
    fn shorthands_and_undefine() {
        let mut reg = ExtensionRegistry::new();
        reg.define_shorthand("num", r"\d+");
        assert!(matches!(reg.get("num"), Some(Extension::Shorthand(p)) if p == r"\d+"));
        reg.undefine("num");
        assert!(!reg.is_defined("num"));
    }

    #[test]
    fn default_validator_bounds() {
        assert_eq!(AcceptAll.min_chars(), Bound::ZERO);
        assert_eq!(AcceptAll.max_chars(), Bound::Infinite);
        assert!(AcceptAll.with_arg("x").is_none());
    }
}

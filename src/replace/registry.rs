//! Names usable in replacement templates: `${name}` expands a rule,
//! `${+name}` and `${=name}` switch to a pattern or transformer.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, RwLock};

use crate::regex::Regex;

use super::Searcher;
use super::rule::ReplaceRule;
use super::transformer::Transformer;

#[derive(Clone)]
pub enum Definition {
    Rule(ReplaceRule),
    Regex(Arc<Regex>),
    Transformer(Arc<Transformer>),
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rule(r) => write!(f, "Rule({r})"),
            Self::Regex(r) => write!(f, "Regex({r})"),
            Self::Transformer(t) => write!(f, "Transformer({} patterns)", t.patterns()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    entries: HashMap<String, Definition>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_rule(&mut self, name: &str, rule: ReplaceRule) {
        self.entries.insert(name.to_string(), Definition::Rule(rule));
    }

    pub fn define_regex(&mut self, name: &str, regex: Regex) {
        self.entries
            .insert(name.to_string(), Definition::Regex(Arc::new(regex)));
    }

    pub fn define_transformer(&mut self, name: &str, transformer: Transformer) {
        self.entries.insert(
            name.to_string(),
            Definition::Transformer(Arc::new(transformer)),
        );
    }

    pub fn undefine(&mut self, name: &str) {
        self.entries.remove(name);
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.entries.get(name)
    }

    /// The pattern or transformer defined as `name`.
    pub fn searcher(&self, name: &str) -> Option<Arc<dyn Searcher>> {
        match self.entries.get(name)? {
            Definition::Regex(r) => Some(Arc::clone(r) as Arc<dyn Searcher>),
            Definition::Transformer(t) => Some(Arc::clone(t) as Arc<dyn Searcher>),
            Definition::Rule(_) => None,
        }
    }
}

static DEFAULT_RULES: LazyLock<RwLock<RuleRegistry>> =
    LazyLock::new(|| RwLock::new(RuleRegistry::new()));

/// Run `f` against the process-wide registry used by [`ReplaceRule::parse`].
pub fn with_default_rules<R>(f: impl FnOnce(&RuleRegistry) -> R) -> R {
    match DEFAULT_RULES.read() {
        Ok(guard) => f(&guard),
        Err(poisoned) => f(&poisoned.into_inner()),
    }
}

fn update_default(f: impl FnOnce(&mut RuleRegistry)) {
    match DEFAULT_RULES.write() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

pub fn define_rule(name: &str, rule: ReplaceRule) {
    log::debug!("defining rule ${{{name}}} = {rule}");
    update_default(|r| r.define_rule(name, rule));
}

pub fn define_regex(name: &str, regex: Regex) {
    log::debug!("defining pattern ${{+{name}}} = {regex}");
    update_default(|r| r.define_regex(name, regex));
}

pub fn define_transformer(name: &str, transformer: Transformer) {
    log::debug!(
        "defining transformer ${{+{name}}} over {} patterns",
        transformer.patterns()
    );
    update_default(|r| r.define_transformer(name, transformer));
}

pub fn undefine(name: &str) {
    update_default(|r| r.undefine(name));
}

pub fn is_defined(name: &str) -> bool {
    with_default_rules(|r| r.is_defined(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegexError;

    #[test]
    fn define_and_undefine() {
        let mut reg = RuleRegistry::new();
        reg.define_rule("r", ReplaceRule::literal("x"));
        reg.define_regex("p", Regex::compile("a").unwrap());
        assert!(reg.is_defined("r"));
        assert!(reg.searcher("r").is_none());
        assert!(reg.searcher("p").is_some());
        reg.undefine("p");
        assert!(!reg.is_defined("p"));
        assert!(reg.searcher("p").is_none());
    }

    #[test]
    fn process_registry_feeds_parse() {
        define_rule("registry_test_greeting", ReplaceRule::literal("hi"));
        assert!(is_defined("registry_test_greeting"));
        assert_eq!(
            ReplaceRule::parse("${registry_test_greeting}!")
                .unwrap()
                .to_string(),
            "hi!"
        );
        undefine("registry_test_greeting");
        assert!(matches!(
            ReplaceRule::parse("${registry_test_greeting}"),
            Err(RegexError::Unsupported(_))
        ));
        assert_eq!(
            ReplaceRule::parse_lenient("${registry_test_greeting}").to_string(),
            "${registry_test_greeting}"
        );
    }
}

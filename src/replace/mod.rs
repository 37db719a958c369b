//! Substitution: replacement templates, the rule registry, the replacer and
//! the transformer.
//!
//! # Template syntax
//!
//! | Item                       | Output                                       |
//! |----------------------------|----------------------------------------------|
//! | `$&`, `${MATCH}`           | the match                                    |
//! | `` $` ``, `${PREMATCH}`    | text before the match                        |
//! | `$'`, `${POSTMATCH}`       | text after the match                         |
//! | `$N`, `\N`, `${N}`         | group `N` (one digit); more digits: the octal character code |
//! | `${name}`, `${name:arg}`   | a rule from the registry                     |
//! | `\U` `\L` `\u` `\l` `\Q` `\E` | case and quoting directives               |
//! | `${+name}`, `${=name}`     | push / change the active pattern             |
//! | `${POP}`                   | return to the previous pattern               |
//! | `${WANT_MORE_TEXT}`        | stop and ask the caller for more input       |
//! | `\n \t \r \b \a \e \f`     | control characters                           |
//! | `\cX`, `\xHH`              | control / hex character                      |
//! | `\X`                       | `X`                                          |
//!
//! An unclosed `${` is a syntax error and a name the registry does not
//! define is unsupported. [`ReplaceRule::compile_lenient`] copies both into
//! the output instead.

use std::fmt;

use crate::regex::QuoteMask;
use crate::result::RegRes;
use crate::source::Text;

pub mod registry;
pub mod replacer;
pub mod rule;
pub mod transformer;

pub use registry::{Definition, RuleRegistry};
pub use replacer::Replacer;
pub use rule::{CaseMode, CustomRule, ReplaceRule, RuleBuffer, RuleItem};
pub use transformer::Transformer;

/// A match found by a [`Searcher`] together with the rule to apply to it.
#[derive(Debug, Clone)]
pub struct Hit {
    pub res: RegRes,
    pub rule: ReplaceRule,
}

/// Something a [`Replacer`] can search with: a single pattern or a
/// transformer over several.
pub trait Searcher: fmt::Debug + Send + Sync {
    /// The leftmost match starting in `start..=end`. `last_end` is where
    /// `\G` matches.
    fn find(
        &self,
        text: &Text,
        masks: &QuoteMask<'_>,
        start: usize,
        end: usize,
        last_end: usize,
    ) -> Option<Hit>;
}

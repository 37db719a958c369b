//! Pattern engine: compiler, match engine, optimizer and prefilter.
//!
//! A pattern compiles to a [`graph::Graph`] of nodes. The matcher walks it
//! with continuation passing; the optimizer rewrites it into faster forms
//! and the prefilter finds candidate start offsets by literal search.
//!
//! # Pattern syntax
//!
//! | Token                        | Meaning                                   |
//! |------------------------------|-------------------------------------------|
//! | `x`                          | the unit `x`                              |
//! | `.`                          | any unit (but `\n` unless `s`)            |
//! | `[a-z]`, `[^…]`              | bracket class, negated bracket            |
//! | `\d \s \w`, `\D \S \W`       | ASCII classes and their complements       |
//! | `\b`, `\B`                   | word boundary, not a word boundary        |
//! | `^ $`, `\A \Z`               | line anchors (with `m`), text anchors     |
//! | `\G`                         | end of the previous match                 |
//! | `\1`..`\99`                  | back reference                            |
//! | `\0NN`, `\xHH`, `\cX`        | octal, hex, control unit                  |
//! | `\Q…\E`, `\U \L \u \l`       | literal run, case directives              |
//! | `(…)`, `(?:…)`               | capture group, plain group                |
//! | `(?=…)`, `(?!…)`             | look-ahead                                |
//! | `(?imsgoQ)`                  | flags for the whole pattern               |
//! | `(?#…)`                      | comment                                   |
//! | `(?@oc)`                     | balanced `o`…`c` run                      |
//! | `(?<N)`, `(?>N)`             | move back / forward `N` units             |
//! | `(??name)`, `(??name:arg)`   | registered extension                      |
//! | `(?e=X)`                     | `X` is the escape character from here on  |
//! | `* + ?`, `{m}` `{m,}` `{m,n}` `{,n}` | quantifiers; a trailing `?` makes them lazy |
//! | `a\|b`                       | alternation                               |

pub mod char_class;
pub mod cursor;
pub mod graph;
pub mod matcher;
pub mod optimizer;
pub mod parser;
pub mod skip;
pub mod validator;

#[cfg(test)]
mod tests;

pub use parser::{Compiled, compile};
pub use validator::{ExtensionRegistry, UnicodeProperty, Validator};

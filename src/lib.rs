//! A Perl-style regular expression engine over 16-bit code units, with a
//! substitution engine on top.
//!
//! # Example
//!
//! ```rust
//! use patrex::Regex;
//!
//! let mut re = Regex::compile(r"(\w+)@(\w+)").unwrap();
//! assert!(re.search("mail me@home now"));
//! assert_eq!(re.result().group(2).as_deref(), Some("home"));
//!
//! let swap = Regex::perl_code("s/(\\w+)@(\\w+)/$2 at $1/g").unwrap();
//! assert_eq!(swap.replace_all("me@home"), "home at me");
//! ```
//!
//! Offsets everywhere are UTF-16 code unit indices. Any
//! [`CharSource`] can be searched; `&str`, `String`, `Vec<u16>` and
//! [`ropey::Rope`] convert into the shared [`Text`] handle.

pub mod error;
pub mod pattern;
pub mod perl;
pub mod quant;
pub mod regex;
pub mod replace;
pub mod result;
pub mod source;
pub mod unicode;

pub use error::{RegexError, set_abort_on_syntax_error};
pub use pattern::validator::{self as extensions, ExtensionRegistry, Validator};
pub use quant::Bound;
pub use regex::{Flags, Regex, set_default_dot_matches_newline, set_default_multiline};
pub use replace::registry as rules;
pub use replace::{CustomRule, ReplaceRule, Replacer, RuleBuffer, RuleRegistry, Transformer};
pub use result::RegRes;
pub use source::{CharSource, RopeSource, Text, Utf16Text};

//! Routing directives embedded in SQL comments

mod directive;
mod grammar;

pub use directive::{HintDirective, HINT_TYPE_KEY};
pub use grammar::{HintGrammar, HintMatch, HintSpan, HintSyntax, DEFAULT_ANNOTATION, KEYWORDS};

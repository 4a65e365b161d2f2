use std::collections::HashMap;

use super::grammar::HintSyntax;

/// Map key holding the directive type in [`HintDirective::raw_map`]
pub const HINT_TYPE_KEY: &str = "_hint_type";

/// A parsed routing directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintDirective {
    pub syntax: HintSyntax,
    /// Lower-cased directive type (`sql`, `master`, `uproxy_dest`, ...)
    pub directive_type: String,
    /// Directive value; for bare keywords, the keyword itself
    pub value: String,
}

impl HintDirective {
    /// Split a directive body on the first `separator`
    ///
    /// The left side becomes the directive type and the right side its value,
    /// with one layer of surrounding single quotes removed. A body without a
    /// separator is a bare keyword whose value is the keyword.
    pub fn parse(syntax: HintSyntax, body: &str, separator: char) -> Self {
        match body.split_once(separator) {
            Some((key, value)) => Self {
                syntax,
                directive_type: key.trim().to_lowercase(),
                value: strip_quotes(value.trim()).trim().to_string(),
            },
            None => {
                let keyword = body.trim().to_lowercase();
                Self {
                    syntax,
                    directive_type: keyword.clone(),
                    value: keyword,
                }
            }
        }
    }

    /// Parse using the separator of the directive's syntax
    pub fn from_body(syntax: HintSyntax, body: &str) -> Self {
        Self::parse(syntax, body, syntax.separator())
    }

    pub fn is_value_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Untyped view: `{ _hint_type: type, type: value }`
    pub fn raw_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::with_capacity(2);
        map.insert(HINT_TYPE_KEY.to_string(), self.directive_type.clone());
        map.insert(self.directive_type.clone(), self.value.clone());
        map
    }
}

fn strip_quotes(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

//! Detection of routing directives embedded in a leading SQL comment.
//!
//! Two syntaxes coexist:
//!
//! - structured: `/*!dble:type=value*/` or `/*#dble:type=value*/`
//! - keyword: `/*master*/`, `/*slave*/`, `/*uproxy_dest:value*/`
//!
//! Both are recognised by the same small scanner. After `/*` and any spaces,
//! the structured form requires a `!` or `#` marker. The scanner then aligns
//! the cursor: if the byte under the cursor already equals the first byte of
//! the literal, it steps back one position so the next byte read is that
//! byte. Otherwise the byte under the cursor is skipped, so one stray byte
//! before a keyword still locates the directive. Keyword bodies start right
//! after `/*`, which keeps that byte and makes `/*Xslave*/` an unknown type.
//!
//! Matching is rejected unless more than six bytes follow the cursor. For
//! keywords this ends the whole scan, not just the current keyword.

/// Keywords accepted by the keyword syntax, tried in order
pub const KEYWORDS: &[&str] = &["master", "slave", "uproxy_dest"];

/// Default literal identifying the structured syntax
pub const DEFAULT_ANNOTATION: &str = "dble:";

/// Minimum number of bytes that must remain after the cursor
const MIN_REMAINING: usize = 6;

/// Which directive syntax matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintSyntax {
    /// `/*!<annotation>type=value*/`
    Structured,
    /// `/*keyword*/` or `/*keyword:value*/`
    Keyword,
}

impl HintSyntax {
    /// Separator between directive type and value
    pub fn separator(&self) -> char {
        match self {
            HintSyntax::Structured => '=',
            HintSyntax::Keyword => ':',
        }
    }
}

/// Location of a detected directive marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintMatch {
    pub syntax: HintSyntax,
    /// Offset of the first byte of the matched literal
    pub literal_start: usize,
    /// Offset immediately after the matched literal
    pub marker_end: usize,
}

/// A directive split out of a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintSpan<'a> {
    pub syntax: HintSyntax,
    /// Directive text between the marker and `*/`, trimmed
    pub body: &'a str,
    /// Statement text after `*/`, trimmed
    pub residual: &'a str,
}

/// Result of scanning for one literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
    /// Offset just past the literal
    Matched(usize),
    Mismatch,
    /// Too few bytes after the cursor to hold a directive
    TooShort,
}

#[derive(Debug, Clone, Copy)]
enum ScanState {
    ExpectSlash,
    ExpectStar,
    SkipSpaces,
    ExpectMarker,
    MatchLiteral,
}

/// Scanner for directive comments
#[derive(Debug, Clone)]
pub struct HintGrammar {
    annotation: String,
}

impl HintGrammar {
    pub fn new(annotation: impl Into<String>) -> Self {
        let annotation = annotation.into();
        let annotation = if annotation.is_empty() {
            DEFAULT_ANNOTATION.to_string()
        } else {
            annotation
        };
        Self { annotation }
    }

    pub fn annotation(&self) -> &str {
        &self.annotation
    }

    /// Detect a directive at the start of `sql`
    ///
    /// The structured syntax is tried first; keywords only when it fails.
    pub fn detect(&self, sql: &str) -> Option<HintMatch> {
        let bytes = sql.as_bytes();

        if let Scan::Matched(end) = scan(bytes, self.annotation.as_bytes(), true) {
            return Some(HintMatch {
                syntax: HintSyntax::Structured,
                literal_start: end - self.annotation.len(),
                marker_end: end,
            });
        }

        for keyword in KEYWORDS {
            match scan(bytes, keyword.as_bytes(), false) {
                Scan::Matched(end) => {
                    return Some(HintMatch {
                        syntax: HintSyntax::Keyword,
                        literal_start: end - keyword.len(),
                        marker_end: end,
                    })
                }
                Scan::TooShort => return None,
                Scan::Mismatch => {}
            }
        }
        None
    }

    /// Offset just past the directive marker, or -1 when there is none
    pub fn hint_offset(&self, sql: &str) -> i32 {
        self.detect(sql)
            .map(|m| m.marker_end as i32)
            .unwrap_or(-1)
    }

    /// Detect a directive and split the statement around its closing `*/`
    ///
    /// Returns `None` when there is no directive or the comment is never
    /// closed; such statements are routed as ordinary SQL.
    pub fn split<'a>(&self, sql: &'a str) -> Option<HintSpan<'a>> {
        let m = self.detect(sql)?;
        let end = sql.find("*/").filter(|&end| end >= m.marker_end)?;

        let body_start = match m.syntax {
            HintSyntax::Structured => m.marker_end,
            // everything after "/*": "master", "uproxy_dest:dn1", "xslave"
            HintSyntax::Keyword => 2,
        };

        Some(HintSpan {
            syntax: m.syntax,
            body: sql[body_start..end].trim(),
            residual: sql[end + 2..].trim(),
        })
    }
}

impl Default for HintGrammar {
    fn default() -> Self {
        Self::new(DEFAULT_ANNOTATION)
    }
}

/// Run the scanner for one literal
fn scan(sql: &[u8], literal: &[u8], require_marker: bool) -> Scan {
    let len = sql.len();
    let mut cursor = 0usize;
    let mut state = ScanState::ExpectSlash;

    loop {
        state = match state {
            ScanState::ExpectSlash => {
                if sql.get(cursor) != Some(&b'/') {
                    return Scan::Mismatch;
                }
                cursor += 1;
                ScanState::ExpectStar
            }
            ScanState::ExpectStar => {
                if sql.get(cursor) != Some(&b'*') {
                    return Scan::Mismatch;
                }
                cursor += 1;
                ScanState::SkipSpaces
            }
            ScanState::SkipSpaces => {
                while sql.get(cursor) == Some(&b' ') {
                    cursor += 1;
                }
                if require_marker {
                    ScanState::ExpectMarker
                } else {
                    ScanState::MatchLiteral
                }
            }
            ScanState::ExpectMarker => match sql.get(cursor) {
                Some(b'!') | Some(b'#') => ScanState::MatchLiteral,
                _ => return Scan::Mismatch,
            },
            ScanState::MatchLiteral => {
                if sql.get(cursor) == literal.first() {
                    cursor -= 1;
                }
                if cursor + MIN_REMAINING >= len {
                    return Scan::TooShort;
                }
                for expected in literal {
                    cursor += 1;
                    if sql.get(cursor) != Some(expected) {
                        return Scan::Mismatch;
                    }
                }
                return Scan::Matched(cursor + 1);
            }
        };
    }
}

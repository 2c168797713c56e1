//! Line classification by prefix.
//!
//! Each prefix list is compiled once into an anchored Aho-Corasick automaton,
//! so classifying a line costs one pass over its first few bytes no matter
//! how many prefixes are configured.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};

use crate::config::Syntax;

/// A set of line prefixes, matched only at the start of a line.
#[derive(Debug, Clone)]
pub struct PrefixSet {
    matcher: Option<AhoCorasick>,
}

impl PrefixSet {
    pub fn new(prefixes: &[String]) -> Self {
        let matcher = (!prefixes.is_empty()).then(|| {
            AhoCorasickBuilder::new()
                .anchored(true)
                .match_kind(MatchKind::LeftmostFirst)
                .build(prefixes)
        });
        PrefixSet { matcher }
    }

    /// Byte length of the prefix `line` starts with, if any.  When several
    /// prefixes match, the one listed first wins.
    pub fn match_len(&self, line: &str) -> Option<usize> {
        self.matcher.as_ref()?.find(line).map(|m| m.end())
    }

    pub fn matches(&self, line: &str) -> bool {
        self.match_len(line).is_some()
    }
}

/// How the directive state machine should treat one input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// Starts with an ignore prefix: dropped.
    Ignored,
    /// Starts with an escape prefix; carries the text after it.
    Directive(&'a str),
    /// Anything else.
    Text,
}

/// Ignore and escape prefix sets, checked in that order.
#[derive(Debug, Clone)]
pub struct Classifier {
    ignore: PrefixSet,
    escape: PrefixSet,
}

impl Classifier {
    pub fn new(syntax: &Syntax) -> Self {
        Classifier {
            ignore: PrefixSet::new(syntax.ignore()),
            escape: PrefixSet::new(syntax.escape()),
        }
    }

    pub fn classify<'a>(&self, line: &'a str) -> LineKind<'a> {
        if self.ignore.matches(line) {
            return LineKind::Ignored;
        }
        match self.escape.match_len(line) {
            Some(end) => LineKind::Directive(&line[end..]),
            None => LineKind::Text,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn set(prefixes: &[&str]) -> PrefixSet {
        PrefixSet::new(&prefixes.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn anchored_at_line_start() {
        let s = set(&["<PyPP#"]);
        assert!(s.matches("<PyPP#/><!--\n"));
        assert!(!s.matches(" <PyPP#\n"));
        assert!(!s.matches("text <PyPP#\n"));
    }

    #[test]
    fn first_listed_prefix_wins() {
        let s = set(&["ab", "abc"]);
        assert_eq!(s.match_len("abcd"), Some(2));
    }

    #[test]
    fn empty_set_matches_nothing() {
        assert!(!set(&[]).matches("anything"));
    }

    #[test]
    fn classify_default_syntax() {
        let c = Classifier::new(&Syntax::default());
        assert_eq!(c.classify("<PyPP# hidden\n"), LineKind::Ignored);
        assert_eq!(c.classify("### PyPP divert\n"), LineKind::Directive("divert\n"));
        assert_eq!(c.classify("/// PyPP end\n"), LineKind::Directive("end\n"));
        assert_eq!(c.classify("### PyPPdivert\n"), LineKind::Text);
        assert_eq!(c.classify("plain PyPP_X\n"), LineKind::Text);
    }
}

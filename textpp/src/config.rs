//! Directive syntax and processing options.
//!
//! | Prefix kind | Default | Effect |
//! |-------------|---------|--------|
//! | ignore | `<PyPP#` | line is dropped |
//! | inline | `PyPP_`, `M4_` | `PREFIXKEY` is replaced from the store |
//! | escape | `### PyPP `, `/// PyPP ` | line is a directive |
//!
//! Escape prefixes are fixed-width: the directive text always starts at
//! character [`ESCAPE_WIDTH`], so every escape prefix must be exactly that
//! long.

use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Width of every escape prefix, in characters.
pub const ESCAPE_WIDTH: usize = 9;

/// Default bound on nested inclusion.
pub const DEFAULT_MAX_DEPTH: u32 = 10;

/// Extra search directories, appended after the configured ones.
pub const PATH_ENV: &str = "TEXTPP_PATH";

// ── Syntax ────────────────────────────────────────────────────────────────────

/// The three prefix lists that drive line classification and substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syntax {
    ignore: Vec<String>,
    inline: Vec<String>,
    escape: Vec<String>,
}

impl Default for Syntax {
    fn default() -> Self {
        Syntax {
            ignore: vec!["<PyPP#".to_owned()],
            inline: vec!["PyPP_".to_owned(), "M4_".to_owned()],
            escape: vec!["### PyPP ".to_owned(), "/// PyPP ".to_owned()],
        }
    }
}

impl Syntax {
    /// Build a validated syntax.  Empty prefixes are rejected everywhere and
    /// escape prefixes must be [`ESCAPE_WIDTH`] characters long.
    pub fn new<S: Into<String>>(
        ignore: impl IntoIterator<Item = S>,
        inline: impl IntoIterator<Item = S>,
        escape: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let collect = |kind: &str, items: Vec<String>| -> Result<Vec<String>> {
            if items.iter().any(String::is_empty) {
                return Err(Error::Config(format!("empty {kind} prefix")));
            }
            Ok(items)
        };
        let ignore = collect("ignore", ignore.into_iter().map(Into::into).collect())?;
        let inline = collect("inline", inline.into_iter().map(Into::into).collect())?;
        let escape = collect("escape", escape.into_iter().map(Into::into).collect())?;
        if let Some(bad) = escape.iter().find(|p| p.chars().count() != ESCAPE_WIDTH) {
            return Err(Error::Config(format!(
                "escape prefix {bad:?} must be exactly {ESCAPE_WIDTH} characters"
            )));
        }
        Ok(Syntax {
            ignore,
            inline,
            escape,
        })
    }

    pub fn ignore(&self) -> &[String] {
        &self.ignore
    }

    pub fn inline(&self) -> &[String] {
        &self.inline
    }

    pub fn escape(&self) -> &[String] {
        &self.escape
    }
}

// ── Options ───────────────────────────────────────────────────────────────────

/// Everything a top-level [`Preprocessor`](crate::Preprocessor) is built from.
#[derive(Debug, Clone)]
pub struct Options {
    pub syntax: Syntax,
    /// Nested inclusion levels allowed below the top level.
    pub max_depth: u32,
    /// Include search path, consulted in order.
    pub include_dirs: Vec<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            syntax: Syntax::default(),
            max_depth: DEFAULT_MAX_DEPTH,
            include_dirs: vec![PathBuf::from(".")],
        }
    }
}

impl Options {
    /// Defaults plus the directories named by `TEXTPP_PATH`.
    pub fn from_env() -> Self {
        let mut options = Options::default();
        options
            .include_dirs
            .extend(env_include_dirs(std::env::var_os(PATH_ENV)));
        options
    }
}

/// Split a platform path list (`a:b` on Unix, `a;b` on Windows), skipping
/// empty entries.
pub fn env_include_dirs(value: Option<OsString>) -> Vec<PathBuf> {
    match value {
        Some(v) => std::env::split_paths(&v)
            .filter(|p| !p.as_os_str().is_empty())
            .collect(),
        None => Vec::new(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_syntax_is_valid() {
        let d = Syntax::default();
        let rebuilt = Syntax::new(d.ignore().to_vec(), d.inline().to_vec(), d.escape().to_vec()).unwrap();
        assert_eq!(rebuilt, d);
    }

    #[test]
    fn escape_width_enforced() {
        let err = Syntax::new(["#"], ["X_"], ["@@ "]).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("9 characters")));
        assert!(Syntax::new(["#"], ["X_"], ["%% macro "]).is_ok());
    }

    #[test]
    fn empty_prefix_rejected() {
        assert!(Syntax::new([""], ["X_"], ["%% macro "]).is_err());
        assert!(Syntax::new(Vec::<String>::new(), vec![], vec![]).is_ok());
    }

    #[test]
    fn default_options() {
        let o = Options::default();
        assert_eq!(o.max_depth, 10);
        assert_eq!(o.include_dirs, [PathBuf::from(".")]);
    }

    #[test]
    fn env_path_list() {
        assert!(env_include_dirs(None).is_empty());
        let joined = std::env::join_paths(["/a", "/b/c"]).unwrap();
        assert_eq!(
            env_include_dirs(Some(joined)),
            [PathBuf::from("/a"), PathBuf::from("/b/c")]
        );
    }
}

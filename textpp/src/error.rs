//! Crate-wide error type.
//!
//! Every variant except the diagnostics recorded by the substitution engine
//! is fatal: the run stops and nothing is exported.

use std::path::PathBuf;

/// Errors raised while preprocessing a document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Directive structure ──────────────────────────────────────────────────
    #[error("divert inside an exec block")]
    DivertInExec,

    #[error("divert inside a divert block")]
    DoubleDivert,

    #[error("exec inside an exec block")]
    DoubleExec,

    #[error("exec inside a divert block")]
    ExecInDivert,

    #[error("end without an open divert or exec block: {line:?}")]
    UnmatchedEnd { line: String },

    #[error("unexpected directive inside an open block: {line:?}")]
    DirectiveInBlock { line: String },

    #[error("input ended inside an open {mode} block")]
    UnterminatedBlock { mode: &'static str },

    // ── Embedded code ────────────────────────────────────────────────────────
    #[error("forbidden construct in embedded code: {construct}")]
    Forbidden { construct: String },

    #[error("embedded code, line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("embedded code: {0}")]
    Runtime(String),

    // ── Inclusion ────────────────────────────────────────────────────────────
    #[error("file not found: {name} (searched {searched:?})")]
    NotFound { name: String, searched: Vec<PathBuf> },

    #[error("inclusion depth exceeded while including {name}")]
    DepthExceeded { name: String },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ── Configuration ────────────────────────────────────────────────────────
    #[error("configuration: {0}")]
    Config(String),

    /// Wraps an error raised while handling one line of a named input.
    #[error("{source_name}:{line}: {source}")]
    Located {
        source_name: String,
        line: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Innermost error, looking through any [`Error::Located`] wrappers.
    pub fn root(&self) -> &Error {
        let mut err = self;
        while let Error::Located { source, .. } = err {
            err = source;
        }
        err
    }

    pub(crate) fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_unwraps_nested_locations() {
        let err = Error::Located {
            source_name: "a.txt".into(),
            line: 3,
            source: Box::new(Error::Located {
                source_name: "b.txt".into(),
                line: 7,
                source: Box::new(Error::DoubleExec),
            }),
        };
        assert!(matches!(err.root(), Error::DoubleExec));
        assert_eq!(
            err.to_string(),
            "a.txt:3: b.txt:7: exec inside an exec block"
        );
    }

    #[test]
    fn root_of_plain_error_is_itself() {
        let err = Error::Runtime("boom".into());
        assert!(matches!(err.root(), Error::Runtime(m) if m == "boom"));
    }
}

//! Include resolution: search path, input sources and the recursion fuse.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};

// ── Fuse ──────────────────────────────────────────────────────────────────────

/// Remaining nested-inclusion budget.  A child always gets one less than its
/// parent; nothing ever hands budget back up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fuse(u32);

impl Fuse {
    pub fn new(levels: u32) -> Self {
        Fuse(levels)
    }

    pub fn remaining(self) -> u32 {
        self.0
    }

    /// Budget for a nested inclusion of `name`, or `DepthExceeded` once spent.
    pub fn burn(self, name: &str) -> Result<Fuse> {
        match self.0.checked_sub(1) {
            Some(left) => Ok(Fuse(left)),
            None => Err(Error::DepthExceeded {
                name: name.to_owned(),
            }),
        }
    }
}

// ── SearchPath ────────────────────────────────────────────────────────────────

/// Ordered include directories; the first directory holding the name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new(dirs: impl IntoIterator<Item = PathBuf>) -> Self {
        SearchPath {
            dirs: dirs.into_iter().collect(),
        }
    }

    pub fn push(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.push(dir.into());
    }

    /// Open `name` relative to each directory in turn.  Only "not found" moves
    /// on to the next directory; any other I/O failure is reported.
    pub fn open(&self, name: &str) -> Result<(PathBuf, File)> {
        for dir in &self.dirs {
            let candidate = dir.join(name);
            match File::open(&candidate) {
                Ok(file) => {
                    debug!(path = %candidate.display(), "resolved include");
                    return Ok((candidate, file));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::io(candidate.display().to_string(), e)),
            }
        }
        Err(Error::NotFound {
            name: name.to_owned(),
            searched: self.dirs.clone(),
        })
    }
}

// ── Source ────────────────────────────────────────────────────────────────────

/// Something to preprocess: a name looked up on the search path, or an
/// already-open stream.
pub enum Source {
    Named(String),
    Reader {
        name: String,
        reader: Box<dyn BufRead>,
    },
}

impl Source {
    pub fn named(name: impl Into<String>) -> Self {
        Source::Named(name.into())
    }

    pub fn reader(name: impl Into<String>, reader: impl Read + 'static) -> Self {
        Source::Reader {
            name: name.into(),
            reader: Box::new(BufReader::new(reader)),
        }
    }

    pub fn stdin() -> Self {
        Source::reader("<stdin>", io::stdin())
    }

    /// Source text held in memory, e.g. for tests or `process_str`.
    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Source::Reader {
            name: name.into(),
            reader: Box::new(io::Cursor::new(text.into().into_bytes())),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Source::Named(name) | Source::Reader { name, .. } => name,
        }
    }

    /// Resolve against `path` and return a display name plus a line reader.
    pub(crate) fn open(self, path: &SearchPath) -> Result<Lines> {
        match self {
            Source::Named(name) => {
                let (resolved, file) = path.open(&name)?;
                Ok(Lines::new(display_name(&resolved), Box::new(BufReader::new(file))))
            }
            Source::Reader { name, reader } => Ok(Lines::new(name, reader)),
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Source::Reader { name, .. } => f.debug_struct("Reader").field("name", name).finish(),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.strip_prefix(".").unwrap_or(path).display().to_string()
}

/// Line reader that keeps line terminators, so output is byte-for-byte.
pub(crate) struct Lines {
    pub name: String,
    reader: Box<dyn BufRead>,
    line_no: usize,
}

impl Lines {
    fn new(name: String, reader: Box<dyn BufRead>) -> Self {
        Lines {
            name,
            reader,
            line_no: 0,
        }
    }

    /// Next line including its terminator, with its 1-based number.
    pub fn next_line(&mut self) -> Result<Option<(usize, String)>> {
        let mut line = String::new();
        let n = self
            .reader
            .read_line(&mut line)
            .map_err(|e| Error::io(self.name.clone(), e))?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;
        Ok(Some((self.line_no, line)))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn fuse_burns_down_to_error() {
        let f = Fuse::new(2);
        let f = f.burn("a").unwrap();
        assert_eq!(f.remaining(), 1);
        let f = f.burn("b").unwrap();
        assert_eq!(f.remaining(), 0);
        assert!(matches!(f.burn("c"), Err(Error::DepthExceeded { ref name }) if name == "c"));
    }

    #[test]
    fn first_directory_wins() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        fs::write(a.path().join("x.txt"), "from a").unwrap();
        fs::write(b.path().join("x.txt"), "from b").unwrap();
        fs::write(b.path().join("y.txt"), "only b").unwrap();
        let path = SearchPath::new([a.path().to_path_buf(), b.path().to_path_buf()]);
        let (found, _) = path.open("x.txt").unwrap();
        assert!(found.starts_with(a.path()));
        let (found, _) = path.open("y.txt").unwrap();
        assert!(found.starts_with(b.path()));
    }

    #[test]
    fn not_found_lists_searched_dirs() {
        let a = tempfile::tempdir().unwrap();
        let path = SearchPath::new([a.path().to_path_buf()]);
        match path.open("nope.txt") {
            Err(Error::NotFound { name, searched }) => {
                assert_eq!(name, "nope.txt");
                assert_eq!(searched, [a.path().to_path_buf()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn lines_keep_terminators() {
        let mut lines = Source::text("t", "a\nb\r\nc").open(&SearchPath::default()).unwrap();
        assert_eq!(lines.next_line().unwrap(), Some((1, "a\n".to_owned())));
        assert_eq!(lines.next_line().unwrap(), Some((2, "b\r\n".to_owned())));
        assert_eq!(lines.next_line().unwrap(), Some((3, "c".to_owned())));
        assert_eq!(lines.next_line().unwrap(), None);
    }
}

//! Command-line argument parsing.
//!
//! Usage:
//!   textpp [-Dname[=text]] [-dname[=int]] [-Idir[,dir…]] [file | -]…
//!
//! Arguments take effect in the order given: a definition or include
//! directory only applies to inputs named after it.

use std::path::PathBuf;

use crate::config::Options;
use crate::error::{Error, Result};
use crate::include::Source;
use crate::machine::Preprocessor;
use crate::script::Value;

pub const USAGE: &str = "Usage: textpp [-Dname[=text]] [-dname[=int]] [-Idir[,dir...]] [--] [file | -]...";

// ── Public types ──────────────────────────────────────────────────────────────

/// One step of the command line, applied in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// `-D` / `-d`: bind a variable.
    Define(String, Value),
    /// `-I`: append a search directory.
    AddDir(PathBuf),
    /// A file name, or `-` for standard input.
    Input(Input),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    File(String),
    Stdin,
}

/// Parsed command-line arguments.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CliArgs {
    pub actions: Vec<Action>,
}

impl CliArgs {
    /// Whether any input was named; without one, standard input is read.
    pub fn has_input(&self) -> bool {
        self.actions.iter().any(|a| matches!(a, Action::Input(_)))
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()`.
pub fn parse_args() -> Result<CliArgs> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    parse_argv(&raw)
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs> {
    let mut args = CliArgs::default();
    let mut iter = argv.iter();

    while let Some(arg) = iter.next() {
        // `--` ends flag processing.
        if arg == "--" {
            args.actions
                .extend(iter.by_ref().map(|a| Action::Input(Input::File(a.clone()))));
            break;
        }
        if arg == "-" {
            args.actions.push(Action::Input(Input::Stdin));
            continue;
        }
        if !arg.starts_with('-') {
            args.actions.push(Action::Input(Input::File(arg.clone())));
            continue;
        }

        if let Some(def) = arg.strip_prefix("-D") {
            let (name, value) = match def.split_once('=') {
                Some((name, text)) => (name, Value::from(text)),
                None => (def, Value::Bool(true)),
            };
            if !name.is_empty() {
                args.actions.push(Action::Define(name.to_owned(), value));
            }
        } else if let Some(def) = arg.strip_prefix("-d") {
            let (name, value) = match def.split_once('=') {
                Some((name, text)) => {
                    let n: i64 = text.trim().parse().map_err(|_| {
                        Error::Config(format!("malformed integer in {arg:?}"))
                    })?;
                    (name, Value::Int(n))
                }
                None => (def, Value::Int(0)),
            };
            if !name.is_empty() {
                args.actions.push(Action::Define(name.to_owned(), value));
            }
        } else if let Some(dirs) = arg.strip_prefix("-I") {
            args.actions.extend(
                dirs.split(',')
                    .filter(|d| !d.is_empty())
                    .map(|d| Action::AddDir(PathBuf::from(d))),
            );
        } else {
            return Err(Error::Config(format!("unrecognized argument {arg:?}")));
        }
    }

    Ok(args)
}

// ── Running ───────────────────────────────────────────────────────────────────

/// Apply `args` to a fresh top-level preprocessor and process every input.
/// Inputs share one machine, so no fuse is spent on them.
pub fn run(args: &CliArgs, options: Options) -> Result<Preprocessor> {
    let mut pp = Preprocessor::new(options);
    for action in &args.actions {
        match action {
            Action::Define(name, value) => pp.set(name, value.clone()),
            Action::AddDir(dir) => pp.add_include_dir(dir.clone()),
            Action::Input(Input::File(name)) => pp.include(Source::named(name.as_str()))?,
            Action::Input(Input::Stdin) => pp.include(Source::stdin())?,
        }
    }
    if !args.has_input() {
        pp.include(Source::stdin())?;
    }
    pp.finish()?;
    Ok(pp)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        args.iter().map(|&s| s.to_owned()).collect()
    }

    fn parse(args: &[&str]) -> Vec<Action> {
        parse_argv(&argv(args)).unwrap().actions
    }

    #[test]
    fn empty_args_read_stdin() {
        let a = parse_argv(&argv(&[])).unwrap();
        assert!(a.actions.is_empty());
        assert!(!a.has_input());
    }

    #[test]
    fn string_defines() {
        assert_eq!(
            parse(&["-DTITLE=Hello", "-DFLAG", "-D=ignored", "-Durl=a=b"]),
            [
                Action::Define("TITLE".into(), "Hello".into()),
                Action::Define("FLAG".into(), Value::Bool(true)),
                Action::Define("url".into(), "a=b".into()),
            ]
        );
    }

    #[test]
    fn integer_defines() {
        assert_eq!(
            parse(&["-dN=42", "-dZERO"]),
            [
                Action::Define("N".into(), Value::Int(42)),
                Action::Define("ZERO".into(), Value::Int(0)),
            ]
        );
        assert!(matches!(parse_argv(&argv(&["-dN=x"])), Err(Error::Config(_))));
    }

    #[test]
    fn include_dirs_split_on_commas() {
        assert_eq!(
            parse(&["-Ia,b", "-I", "-Ic"]),
            [
                Action::AddDir("a".into()),
                Action::AddDir("b".into()),
                Action::AddDir("c".into()),
            ]
        );
    }

    #[test]
    fn inputs_keep_their_position() {
        let actions = parse(&["-DX=1", "one.txt", "-", "-DX=2", "--", "-two.txt"]);
        assert_eq!(
            actions,
            [
                Action::Define("X".into(), "1".into()),
                Action::Input(Input::File("one.txt".into())),
                Action::Input(Input::Stdin),
                Action::Define("X".into(), "2".into()),
                Action::Input(Input::File("-two.txt".into())),
            ]
        );
    }

    #[test]
    fn unknown_option_rejected() {
        let err = parse_argv(&argv(&["-x"])).unwrap_err();
        assert!(err.to_string().contains("-x"));
    }

    #[test]
    fn run_applies_defines_before_later_inputs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "A=PyPP_X\n").unwrap();
        std::fs::write(dir.path().join("b.txt"), "B=PyPP_X\n").unwrap();
        let args = parse_argv(&argv(&["-DX=1", "a.txt", "-DX=2", "b.txt"])).unwrap();
        let options = Options {
            include_dirs: vec![dir.path().to_path_buf()],
            ..Options::default()
        };
        let pp = run(&args, options).unwrap();
        assert_eq!(pp.into_string(), "A=1\nB=2\n");
    }
}

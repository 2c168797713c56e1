//! The embedded scripting language run by exec directives and exec blocks.
//!
//! A small, indentation-structured, Python-flavoured language:
//!
//! - Expressions, assignment, `if` / `while` / `for`, `def` and `lambda`
//! - Lists, tuples, ranges, comprehensions, slicing
//! - Built-ins (`str`, `len`, `range`, `sorted`, …) and the `math`, `time`
//!   and `re` libraries
//! - `out(text)`, `include(name)` and the variable store as `d` / `defines`
//!
//! Every block goes through [`evaluate`]: parse, a static safety check that
//! rejects imports and dunder names, then execution in a fresh scope.
//!
//! # Quick start
//!
//! ```rust
//! use textpp::script::{evaluate, Host};
//! use textpp::{Result, SharedVars, VarStore};
//!
//! struct Sink(String, SharedVars);
//!
//! impl Host for Sink {
//!     fn out(&mut self, text: &str) { self.0.push_str(text) }
//!     fn include(&mut self, _name: &str, _call_depth: usize) -> Result<()> { Ok(()) }
//!     fn vars(&self) -> SharedVars { self.1.clone() }
//! }
//!
//! let mut sink = Sink(String::new(), VarStore::shared());
//! evaluate("d.x = 6\nout(str(d.x * 7))", &mut sink).unwrap();
//! assert_eq!(sink.0, "42");
//! ```

pub mod builtins;
pub mod check;
pub mod expr;
pub mod interp;
pub mod lexer;
pub mod libs;
pub mod stmt;
pub mod value;

pub use interp::{Env, Function, Host, Interpreter};
pub use value::{NativeFn, Value};

use crate::error::Result;

/// Headroom left on the current stack before a recursive step moves onto a
/// freshly allocated segment.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_SEGMENT: usize = 4 * 1024 * 1024;

/// Run one level of a recursive walk (parser, interpreter, value formatting)
/// on a stack guaranteed to have room for it.
pub(crate) fn grow<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, f)
}

/// Parse, safety-check and run `code` against `host`.
pub fn evaluate(code: &str, host: &mut dyn Host) -> Result<()> {
    let program = stmt::parse_program(code)?;
    check::check_program(&program)?;
    Interpreter::new(host).run(&program, &Env::new(None))
}

/// Call a script value (a store entry holding a function) from the host side.
pub fn call_value(f: &Value, args: Vec<Value>, host: &mut dyn Host) -> Result<Value> {
    Interpreter::new(host).call(f, args)
}

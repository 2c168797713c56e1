//! The directive state machine.
//!
//! A [`Preprocessor`] consumes input one line at a time.  Each line is
//! classified by prefix and then, depending on the current [`Mode`],
//! substituted into the output, captured for later evaluation, discarded,
//! or executed as a directive.
//!
//! ```text
//!             divert                     exec
//!   Diverting <──────── Normal ────────> CapturingExec
//!             ────────>        <────────
//!               end                 end (evaluate captured code)
//! ```
//!
//! Nested inclusion (from embedded code) runs a child machine that shares
//! the variable store, syntax and search path, with one less unit of fuse.
//! The child's output is spliced into the parent's buffer when it finishes.

use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::{Options, Syntax};
use crate::error::{Error, Result};
use crate::include::{Fuse, SearchPath, Source};
use crate::output::OutputBuffer;
use crate::prefix::{Classifier, LineKind};
use crate::script::{self, Host, Value};
use crate::store::{SharedVars, VarStore};
use crate::substitute::substitute;

/// Processing mode of one machine.  Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Diverting,
    CapturingExec,
}

impl Mode {
    fn block_name(self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Diverting => "divert",
            Mode::CapturingExec => "exec",
        }
    }
}

/// Syntax and its compiled classifier, shared by a whole include tree.
#[derive(Debug)]
struct Rules {
    syntax: Syntax,
    classifier: Classifier,
}

pub struct Preprocessor {
    rules: Rc<Rules>,
    vars: SharedVars,
    search: Rc<SearchPath>,
    fuse: Fuse,
    mode: Mode,
    /// Code collected by the open exec block.
    captured: String,
    output: OutputBuffer,
    unresolved: Vec<String>,
    /// Name and last line number of the most recently finished input.
    last_read: Option<(String, usize)>,
    /// Script calls active in the machine that included this one.
    call_depth: usize,
}

impl Preprocessor {
    pub fn new(options: Options) -> Self {
        Self::with_vars(options, VarStore::shared())
    }

    /// Build a machine over an existing variable store.
    pub fn with_vars(options: Options, vars: SharedVars) -> Self {
        let classifier = Classifier::new(&options.syntax);
        Preprocessor {
            rules: Rc::new(Rules {
                syntax: options.syntax,
                classifier,
            }),
            vars,
            search: Rc::new(SearchPath::new(options.include_dirs)),
            fuse: Fuse::new(options.max_depth),
            mode: Mode::Normal,
            captured: String::new(),
            output: OutputBuffer::new(),
            unresolved: Vec::new(),
            last_read: None,
            call_depth: 0,
        }
    }

    fn child(&self, fuse: Fuse, call_depth: usize) -> Self {
        Preprocessor {
            rules: Rc::clone(&self.rules),
            vars: Rc::clone(&self.vars),
            search: Rc::clone(&self.search),
            fuse,
            mode: Mode::Normal,
            captured: String::new(),
            output: OutputBuffer::new(),
            unresolved: Vec::new(),
            last_read: None,
            call_depth,
        }
    }

    // ── Configuration ─────────────────────────────────────────────────────────

    /// Bind `name` (case-insensitively) in the shared store.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.vars.borrow_mut().set(name, value);
    }

    pub fn vars(&self) -> SharedVars {
        Rc::clone(&self.vars)
    }

    pub fn add_include_dir(&mut self, dir: impl Into<PathBuf>) {
        Rc::make_mut(&mut self.search).push(dir);
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.search
    }

    pub fn syntax(&self) -> &Syntax {
        &self.rules.syntax
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn fuse(&self) -> Fuse {
        self.fuse
    }

    // ── Input ─────────────────────────────────────────────────────────────────

    /// Feed one line, terminator included.
    pub fn process(&mut self, line: &str) -> Result<()> {
        match self.rules.classifier.classify(line) {
            LineKind::Ignored => Ok(()),
            LineKind::Directive(rest) => self.directive(rest, line),
            LineKind::Text => self.text(line),
        }
    }

    /// Process every line of `source` in this machine.  Used for top-level
    /// inputs: no fuse is spent and an open block may continue into the next
    /// input.
    pub fn include(&mut self, source: Source) -> Result<()> {
        let mut lines = source.open(&self.search)?;
        debug!(source = %lines.name, "processing input");
        let mut last = 0;
        while let Some((line_no, line)) = lines.next_line()? {
            last = line_no;
            self.process(&line).map_err(|e| Error::Located {
                source_name: lines.name.clone(),
                line: line_no,
                source: Box::new(e),
            })?;
        }
        self.last_read = Some((lines.name, last));
        Ok(())
    }

    pub fn include_name(&mut self, name: &str) -> Result<()> {
        self.include(Source::named(name))
    }

    /// Check the machine ended in normal mode.
    pub fn finish(&mut self) -> Result<()> {
        if self.mode == Mode::Normal {
            return Ok(());
        }
        let err = Error::UnterminatedBlock {
            mode: self.mode.block_name(),
        };
        Err(match &self.last_read {
            Some((name, line)) => Error::Located {
                source_name: name.clone(),
                line: *line,
                source: Box::new(err),
            },
            None => err,
        })
    }

    /// Include `source` one level down: a child machine with the fuse burnt
    /// by one, whose output is spliced in here once it finishes cleanly.
    pub fn include_nested(&mut self, source: Source) -> Result<()> {
        self.include_at_depth(source, self.call_depth)
    }

    fn include_at_depth(&mut self, source: Source, call_depth: usize) -> Result<()> {
        let fuse = self.fuse.burn(source.name())?;
        debug!(name = source.name(), remaining = fuse.remaining(), call_depth, "nested include");
        let mut child = self.child(fuse, call_depth);
        script::grow(|| {
            child.include(source)?;
            child.finish()
        })?;
        self.unresolved.append(&mut child.unresolved);
        self.output.splice(child.output);
        Ok(())
    }

    // ── Output ────────────────────────────────────────────────────────────────

    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    /// Every `prefix + key` reference that could not be resolved, in order.
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }

    pub fn export<W: Write>(&self, out: &mut W) -> Result<()> {
        self.output
            .export(out)
            .map_err(|e| Error::io("<output>", e))
    }

    pub fn into_output(self) -> OutputBuffer {
        self.output
    }

    pub fn into_string(self) -> String {
        self.output.into_string()
    }

    // ── Line handling ─────────────────────────────────────────────────────────

    fn set_mode(&mut self, mode: Mode) {
        trace!(from = ?self.mode, to = ?mode, "mode change");
        self.mode = mode;
    }

    fn directive(&mut self, rest: &str, line: &str) -> Result<()> {
        if rest.starts_with("divert") {
            match self.mode {
                Mode::CapturingExec => return Err(Error::DivertInExec),
                Mode::Diverting => return Err(Error::DoubleDivert),
                Mode::Normal => self.set_mode(Mode::Diverting),
            }
        } else if rest.starts_with("exec") {
            match self.mode {
                Mode::CapturingExec => return Err(Error::DoubleExec),
                Mode::Diverting => return Err(Error::ExecInDivert),
                Mode::Normal => {
                    self.captured.clear();
                    self.set_mode(Mode::CapturingExec);
                }
            }
        } else if rest.starts_with("end") {
            match self.mode {
                Mode::Diverting => self.set_mode(Mode::Normal),
                Mode::CapturingExec => {
                    self.set_mode(Mode::Normal);
                    let code = std::mem::take(&mut self.captured);
                    self.evaluate(&code)?;
                }
                Mode::Normal => {
                    return Err(Error::UnmatchedEnd {
                        line: line.trim_end().to_owned(),
                    })
                }
            }
        } else if self.mode == Mode::Normal {
            self.evaluate(rest)?;
        } else {
            return Err(Error::DirectiveInBlock {
                line: line.trim_end().to_owned(),
            });
        }
        Ok(())
    }

    fn text(&mut self, line: &str) -> Result<()> {
        match self.mode {
            Mode::CapturingExec => {
                let code = line
                    .strip_prefix(". ")
                    .or_else(|| line.strip_prefix('.'))
                    .unwrap_or(line);
                self.captured.push_str(code);
            }
            Mode::Diverting => {}
            Mode::Normal => {
                let rules = Rc::clone(&self.rules);
                let result = substitute(line, rules.syntax.inline(), |key| self.resolve(key))?;
                self.unresolved.extend(result.unresolved);
                self.output.push(result.text);
            }
        }
        Ok(())
    }

    fn evaluate(&mut self, code: &str) -> Result<()> {
        debug!(bytes = code.len(), "evaluating embedded code");
        script::evaluate(code, self)
    }

    /// Text for macro `key`.  Unbound keys and keys bound to `None` are
    /// unresolved.  Callables are invoked: with the store if they take an
    /// argument, bare otherwise.
    fn resolve(&mut self, key: &str) -> Result<Option<String>> {
        let value = self.vars.borrow().get(key).cloned();
        match value {
            None | Some(Value::None) => Ok(None),
            Some(f) if f.is_callable() => {
                let args = match &f {
                    Value::Func(func) if func.arity() == 0 => Vec::new(),
                    _ => vec![Value::Vars],
                };
                let result = script::call_value(&f, args, self)?;
                Ok(Some(result.to_string()))
            }
            Some(v) => Ok(Some(v.to_string())),
        }
    }
}

impl Host for Preprocessor {
    fn out(&mut self, text: &str) {
        self.output.push(text);
    }

    fn include(&mut self, name: &str, call_depth: usize) -> Result<()> {
        self.include_at_depth(Source::named(name), call_depth)
    }

    fn vars(&self) -> SharedVars {
        Rc::clone(&self.vars)
    }

    fn call_depth(&self) -> usize {
        self.call_depth
    }
}

impl std::fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preprocessor")
            .field("mode", &self.mode)
            .field("fuse", &self.fuse)
            .field("fragments", &self.output.len())
            .finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::NativeFn;

    fn pp() -> Preprocessor {
        Preprocessor::new(Options::default())
    }

    fn feed(p: &mut Preprocessor, text: &str) -> Result<()> {
        for line in text.split_inclusive('\n') {
            p.process(line)?;
        }
        Ok(())
    }

    fn run(text: &str) -> String {
        let mut p = pp();
        feed(&mut p, text).expect("processing failed");
        p.finish().expect("unterminated");
        p.into_string()
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(run("hello\nworld\n"), "hello\nworld\n");
    }

    #[test]
    fn ignore_lines_dropped() {
        assert_eq!(run("<PyPP#/><!--\nkeep\n"), "keep\n");
    }

    #[test]
    fn inline_macro_from_store() {
        let mut p = pp();
        p.set("FOO", "hello");
        feed(&mut p, "PyPP_FOO bar\n").unwrap();
        assert_eq!(p.into_string(), "hello bar\n");
    }

    #[test]
    fn inline_directive_output_has_no_newline() {
        assert_eq!(run("### PyPP out(\"computed:\" + str(1+1))\n"), "computed:2");
    }

    #[test]
    fn divert_suppresses_everything() {
        assert_eq!(run("a\n### PyPP divert\nPyPP_X\nhidden\n/// PyPP end\nb\n"), "a\nb\n");
    }

    #[test]
    fn exec_block_output_lands_in_place() {
        let doc = "before\n### PyPP exec\nout(\"X\")\n### PyPP end\nafter\n";
        let mut p = pp();
        feed(&mut p, doc).unwrap();
        assert_eq!(p.output().fragments(), ["before\n", "X", "after\n"]);
    }

    #[test]
    fn exec_block_dot_prefixes_stripped() {
        let doc = "### PyPP exec\n. for i in range(3):\n.     out(str(i))\n### PyPP end\n";
        assert_eq!(run(doc), "012");
    }

    #[test]
    fn exec_block_sets_variables_for_later_lines() {
        let doc = "### PyPP exec\nd.name = 'World'\n### PyPP end\nHello PyPP_NAME!\n";
        assert_eq!(run(doc), "Hello World!\n");
    }

    #[test]
    fn structural_errors() {
        let cases: [(&str, fn(&Error) -> bool); 6] = [
            ("### PyPP exec\n### PyPP divert\n", |e| matches!(e, Error::DivertInExec)),
            ("### PyPP divert\n### PyPP divert\n", |e| matches!(e, Error::DoubleDivert)),
            ("### PyPP exec\n### PyPP exec\n", |e| matches!(e, Error::DoubleExec)),
            ("### PyPP divert\n### PyPP exec\n", |e| matches!(e, Error::ExecInDivert)),
            ("### PyPP end\n", |e| matches!(e, Error::UnmatchedEnd { .. })),
            ("### PyPP divert\n### PyPP out('x')\n", |e| matches!(e, Error::DirectiveInBlock { .. })),
        ];
        for (doc, check) in cases {
            let err = feed(&mut pp(), doc).unwrap_err();
            assert!(check(&err), "{doc:?} gave {err:?}");
        }
    }

    #[test]
    fn unterminated_block_is_fatal() {
        let mut p = pp();
        feed(&mut p, "### PyPP exec\nout('x')\n").unwrap();
        assert!(matches!(p.finish(), Err(Error::UnterminatedBlock { mode: "exec" })));
    }

    #[test]
    fn unresolved_keys_are_recorded() {
        let mut p = pp();
        feed(&mut p, "x PyPP_NOPE M4_ALSO\n").unwrap();
        assert_eq!(p.unresolved(), ["PyPP_NOPE", "M4_ALSO"]);
        assert_eq!(p.into_string(), "x PyPP_NOPE M4_ALSO\n");
    }

    #[test]
    fn none_value_counts_as_unresolved() {
        let mut p = pp();
        p.set("EMPTY", Value::None);
        feed(&mut p, "PyPP_EMPTY\n").unwrap();
        assert_eq!(p.unresolved(), ["PyPP_EMPTY"]);
    }

    #[test]
    fn computed_values() {
        let mut p = pp();
        p.set("n", 4i64);
        p.set(
            "double",
            Value::Native(NativeFn::new(|vars: &VarStore| {
                let n = vars.get("n").and_then(|v| v.as_int().ok()).unwrap_or(0);
                (n * 2).to_string()
            })),
        );
        let doc = "\
### PyPP exec
def shout(v):
    return str(v.n) + '!'
d.shout = shout
d.answer = lambda: 42
### PyPP end
PyPP_DOUBLE PyPP_SHOUT PyPP_ANSWER
";
        feed(&mut p, doc).unwrap();
        assert_eq!(p.into_string(), "8 4! 42\n");
    }

    #[test]
    fn forbidden_code_is_fatal() {
        let err = feed(&mut pp(), "### PyPP import os\n").unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));
        let err = feed(&mut pp(), "### PyPP out(().__class__)\n").unwrap_err();
        assert!(matches!(err, Error::Forbidden { .. }));
    }

    #[test]
    fn nested_include_spends_fuse() {
        let mut p = Preprocessor::new(Options {
            max_depth: 0,
            ..Options::default()
        });
        let err = feed(&mut p, "### PyPP include('anything.txt')\n").unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { ref name } if name == "anything.txt"));
    }

    #[test]
    fn located_errors_name_the_input() {
        let mut p = pp();
        let err = p
            .include(Source::text("doc.txt", "ok\n### PyPP end\n"))
            .unwrap_err();
        assert!(matches!(err, Error::Located { ref source_name, line: 2, .. } if source_name == "doc.txt"));
        assert!(matches!(err.root(), Error::UnmatchedEnd { .. }));
    }
}

//! Tree-walking interpreter for embedded code.
//!
//! The [`Interpreter`] borrows a [`Host`] for the duration of one block.  The
//! host supplies the three capabilities embedded code has beyond pure
//! computation: appending text to the output, including another file, and
//! the shared variable store.  Everything else (`math`, `re`, built-ins)
//! is side-effect free.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::builtins::{self, Builtin};
use super::expr::{BinOp, CmpOp, Expr, Target, UnaryOp};
use super::libs::{self, Module};
use super::stmt::{FuncBody, FuncDef, Stmt, StmtKind};
use super::value::{check_items, Value};
use crate::error::{Error, Result};
use crate::store::SharedVars;

/// Nested script function calls allowed before a `RecursionError`.  The
/// count carries across `include()` so mutually including files share it.
pub const MAX_CALL_DEPTH: usize = 64;

// ── Host ──────────────────────────────────────────────────────────────────────

/// What the interpreter can ask of the preprocessor that runs it.
pub trait Host {
    /// Append text to the output exactly as given.
    fn out(&mut self, text: &str);
    /// Preprocess another file and splice its output in place.  Scripts in
    /// the included file start at `call_depth` nested calls.
    fn include(&mut self, name: &str, call_depth: usize) -> Result<()>;
    /// The variable store shared with macro substitution.
    fn vars(&self) -> SharedVars;
    /// Nested calls already active when this host's scripts start.
    fn call_depth(&self) -> usize {
        0
    }
}

// ── ControlFlow ───────────────────────────────────────────────────────────────

/// Non-error control-flow signals that unwind out of a block.
#[derive(Debug)]
pub enum ControlFlow {
    Break,
    Continue,
    Return(Value),
}

// ── Scopes and functions ──────────────────────────────────────────────────────

/// A lexical scope.  Each executed block gets a fresh root scope; function
/// calls and comprehensions push a child of the scope they close over.
#[derive(Debug, Default)]
pub struct Env {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Env>>,
}

impl Env {
    pub fn new(parent: Option<Rc<Env>>) -> Rc<Env> {
        Rc::new(Env {
            vars: RefCell::new(HashMap::new()),
            parent,
        })
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.vars.borrow().get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    fn set(&self, name: &str, value: Value) {
        self.vars.borrow_mut().insert(name.to_owned(), value);
    }
}

/// A user-defined function or lambda together with its closure.
pub struct Function {
    pub def: Rc<FuncDef>,
    /// Default values, evaluated at definition time, aligned with `def.params`.
    defaults: Vec<Option<Value>>,
    closure: Rc<Env>,
}

impl Function {
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Positional parameters a caller may supply.
    pub fn arity(&self) -> usize {
        self.def.params.len()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.def.name).finish()
    }
}

/// Names resolved after local scopes and before the built-in table.
fn capability(name: &str) -> Option<Value> {
    match name {
        "d" | "defines" => Some(Value::Vars),
        _ => Module::from_name(name).map(Value::Module),
    }
}

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter<'h> {
    host: &'h mut dyn Host,
    depth: usize,
    /// Line of the statement being executed, relative to the block.
    line: usize,
}

impl<'h> Interpreter<'h> {
    pub fn new(host: &'h mut dyn Host) -> Self {
        let depth = host.call_depth();
        Interpreter {
            host,
            depth,
            line: 0,
        }
    }

    fn rt(&self, message: impl fmt::Display) -> Error {
        Error::Runtime(format!("line {}: {message}", self.line))
    }

    /// Run a whole program in `env`.  `return` and `break` at top level have
    /// already been rejected by the parser.
    pub fn run(&mut self, stmts: &[Stmt], env: &Rc<Env>) -> Result<()> {
        self.exec_block(stmts, env).map(|_| ())
    }

    pub fn exec_block(&mut self, stmts: &[Stmt], env: &Rc<Env>) -> Result<Option<ControlFlow>> {
        super::grow(|| self.exec_stmts(stmts, env))
    }

    fn exec_stmts(&mut self, stmts: &[Stmt], env: &Rc<Env>) -> Result<Option<ControlFlow>> {
        for stmt in stmts {
            if let Some(cf) = self.exec_stmt(stmt, env)? {
                return Ok(Some(cf));
            }
        }
        Ok(None)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &Rc<Env>) -> Result<Option<ControlFlow>> {
        self.line = stmt.line;
        match &stmt.kind {
            StmtKind::Expr(e) => {
                self.eval(e, env)?;
            }
            StmtKind::Assign { targets, value } => {
                let v = self.eval(value, env)?;
                for target in targets {
                    self.assign(target, v.clone(), env)?;
                }
            }
            StmtKind::AugAssign { target, op, value } => self.aug_assign(target, *op, value, env)?,
            StmtKind::If {
                branches,
                else_block,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond, env)?.truthy() {
                        return self.exec_block(body, env);
                    }
                }
                return self.exec_block(else_block, env);
            }
            StmtKind::While { cond, body } => {
                while self.eval(cond, env)?.truthy() {
                    match self.exec_block(body, env)? {
                        Some(ControlFlow::Break) => break,
                        Some(ControlFlow::Continue) | None => {}
                        ret @ Some(ControlFlow::Return(_)) => return Ok(ret),
                    }
                }
            }
            StmtKind::For { target, iter, body } => {
                let items = self.eval(iter, env)?.iterate().map_err(|e| self.rt(e))?;
                for item in items {
                    self.assign(target, item, env)?;
                    match self.exec_block(body, env)? {
                        Some(ControlFlow::Break) => break,
                        Some(ControlFlow::Continue) | None => {}
                        ret @ Some(ControlFlow::Return(_)) => return Ok(ret),
                    }
                }
            }
            StmtKind::Def(def) => {
                let func = self.make_function(def, env)?;
                env.set(&def.name, func);
            }
            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => self.eval(e, env)?,
                    None => Value::None,
                };
                return Ok(Some(ControlFlow::Return(v)));
            }
            StmtKind::Assert { cond, message } => {
                if !self.eval(cond, env)?.truthy() {
                    let msg = match message {
                        Some(m) => format!("AssertionError: {}", self.eval(m, env)?),
                        None => "AssertionError".to_owned(),
                    };
                    return Err(self.rt(msg));
                }
            }
            StmtKind::Break => return Ok(Some(ControlFlow::Break)),
            StmtKind::Continue => return Ok(Some(ControlFlow::Continue)),
            StmtKind::Pass => {}
            StmtKind::Import { module } => {
                return Err(Error::Forbidden {
                    construct: format!("import of '{module}' on line {}", stmt.line),
                })
            }
        }
        Ok(None)
    }

    fn make_function(&mut self, def: &Rc<FuncDef>, env: &Rc<Env>) -> Result<Value> {
        let defaults = def
            .params
            .iter()
            .map(|p| p.default.as_ref().map(|e| self.eval(e, env)).transpose())
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Func(Rc::new(Function {
            def: Rc::clone(def),
            defaults,
            closure: Rc::clone(env),
        })))
    }

    // ── Assignment ────────────────────────────────────────────────────────────

    fn assign(&mut self, target: &Target, value: Value, env: &Rc<Env>) -> Result<()> {
        match target {
            Target::Name(name) => env.set(name, value),
            Target::Attr(obj, name) => {
                let obj = self.eval(obj, env)?;
                self.set_attr(&obj, name, value)?;
            }
            Target::Index(obj, index) => {
                let obj = self.eval(obj, env)?;
                let index = self.eval(index, env)?;
                obj.set_item(&index, value).map_err(|e| self.rt(e))?;
            }
            Target::Tuple(targets) => {
                let items = value.collect_items().map_err(|e| self.rt(e))?;
                if items.len() != targets.len() {
                    let kind = if items.len() < targets.len() {
                        "not enough"
                    } else {
                        "too many"
                    };
                    return Err(self.rt(format!(
                        "ValueError: {kind} values to unpack (expected {}, got {})",
                        targets.len(),
                        items.len()
                    )));
                }
                for (t, v) in targets.iter().zip(items) {
                    self.assign(t, v, env)?;
                }
            }
        }
        Ok(())
    }

    fn aug_assign(&mut self, target: &Target, op: BinOp, value: &Expr, env: &Rc<Env>) -> Result<()> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(name, env)?;
                let rhs = self.eval(value, env)?;
                let new = self.augmented(op, current, &rhs)?;
                env.set(name, new);
            }
            Target::Attr(obj, name) => {
                let obj = self.eval(obj, env)?;
                let current = self.get_attr(&obj, name)?;
                let rhs = self.eval(value, env)?;
                let new = self.augmented(op, current, &rhs)?;
                self.set_attr(&obj, name, new)?;
            }
            Target::Index(obj, index) => {
                let obj = self.eval(obj, env)?;
                let index = self.eval(index, env)?;
                let current = obj.get_item(&index).map_err(|e| self.rt(e))?;
                let rhs = self.eval(value, env)?;
                let new = self.augmented(op, current, &rhs)?;
                obj.set_item(&index, new).map_err(|e| self.rt(e))?;
            }
            Target::Tuple(_) => {
                return Err(self.rt("SyntaxError: illegal expression for augmented assignment"))
            }
        }
        Ok(())
    }

    /// `list += iterable` extends in place; everything else rebinds.
    fn augmented(&self, op: BinOp, current: Value, rhs: &Value) -> Result<Value> {
        if let (BinOp::Add, Value::List(items)) = (op, &current) {
            let extra = rhs.collect_items().map_err(|e| self.rt(e))?;
            check_items(items.borrow().len().saturating_add(extra.len())).map_err(|e| self.rt(e))?;
            items.borrow_mut().extend(extra);
            return Ok(current);
        }
        self.binary(op, &current, rhs)
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    fn lookup(&self, name: &str, env: &Rc<Env>) -> Result<Value> {
        env.lookup(name)
            .or_else(|| capability(name))
            .or_else(|| Builtin::from_name(name).map(Value::Builtin))
            .ok_or_else(|| self.rt(format!("NameError: name '{name}' is not defined")))
    }

    pub fn eval(&mut self, expr: &Expr, env: &Rc<Env>) -> Result<Value> {
        super::grow(|| self.eval_expr(expr, env))
    }

    fn eval_expr(&mut self, expr: &Expr, env: &Rc<Env>) -> Result<Value> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Name(name) => self.lookup(name, env),
            Expr::List(items) => Ok(Value::list(self.eval_all(items, env)?)),
            Expr::Tuple(items) => Ok(Value::tuple(self.eval_all(items, env)?)),
            Expr::ListComp {
                elem,
                target,
                iter,
                cond,
            } => {
                let items = self.eval(iter, env)?.iterate().map_err(|e| self.rt(e))?;
                let scope = Env::new(Some(Rc::clone(env)));
                let mut out = Vec::new();
                for item in items {
                    self.assign(target, item, &scope)?;
                    if let Some(cond) = cond {
                        if !self.eval(cond, &scope)?.truthy() {
                            continue;
                        }
                    }
                    out.push(self.eval(elem, &scope)?);
                }
                Ok(Value::list(out))
            }
            Expr::Attr(obj, name) => {
                let obj = self.eval(obj, env)?;
                self.get_attr(&obj, name)
            }
            Expr::Index(obj, index) => {
                let obj = self.eval(obj, env)?;
                let index = self.eval(index, env)?;
                obj.get_item(&index).map_err(|e| self.rt(e))
            }
            Expr::Slice {
                value,
                start,
                stop,
                step,
            } => {
                let value = self.eval(value, env)?;
                let mut bound = |e: &Option<Box<Expr>>| -> Result<Option<i64>> {
                    match e {
                        None => Ok(None),
                        Some(e) => match self.eval(e, env)? {
                            Value::None => Ok(None),
                            v => v.as_int().map(Some).map_err(|m| self.rt(m)),
                        },
                    }
                };
                let (start, stop, step) = (bound(start)?, bound(stop)?, bound(step)?);
                value.slice(start, stop, step).map_err(|e| self.rt(e))
            }
            Expr::Call(callee, args) => {
                if let Expr::Attr(obj, name) = callee.as_ref() {
                    let obj = self.eval(obj, env)?;
                    let args = self.eval_all(args, env)?;
                    return self.call_method(obj, name, args);
                }
                let f = self.eval(callee, env)?;
                let args = self.eval_all(args, env)?;
                self.call(&f, args)
            }
            Expr::Unary(op, inner) => {
                let v = self.eval(inner, env)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
                    UnaryOp::Neg => v.neg().map_err(|e| self.rt(e)),
                    UnaryOp::Pos => v.as_float().map(|_| v.clone()).map_err(|e| self.rt(e)),
                    UnaryOp::BitNot => v.as_int().map(|n| Value::Int(!n)).map_err(|e| self.rt(e)),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs, env)?;
                let r = self.eval(rhs, env)?;
                self.binary(*op, &l, &r)
            }
            Expr::Compare(first, rest) => {
                let mut left = self.eval(first, env)?;
                for (op, e) in rest {
                    let right = self.eval(e, env)?;
                    if !self.compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::And(lhs, rhs) => {
                let l = self.eval(lhs, env)?;
                if !l.truthy() {
                    return Ok(l);
                }
                self.eval(rhs, env)
            }
            Expr::Or(lhs, rhs) => {
                let l = self.eval(lhs, env)?;
                if l.truthy() {
                    return Ok(l);
                }
                self.eval(rhs, env)
            }
            Expr::IfElse { cond, then, else_ } => {
                if self.eval(cond, env)?.truthy() {
                    self.eval(then, env)
                } else {
                    self.eval(else_, env)
                }
            }
            Expr::Lambda(def) => self.make_function(def, env),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr], env: &Rc<Env>) -> Result<Vec<Value>> {
        exprs.iter().map(|e| self.eval(e, env)).collect()
    }

    fn binary(&self, op: BinOp, l: &Value, r: &Value) -> Result<Value> {
        let result = match op {
            BinOp::Add => l.add(r),
            BinOp::Sub => l.sub(r),
            BinOp::Mul => l.mul(r),
            BinOp::Div => l.div(r),
            BinOp::FloorDiv => l.floor_div(r),
            BinOp::Rem => match l {
                Value::Str(template) => builtins::percent_format(template, r).map(Value::Str),
                _ => l.rem(r),
            },
            BinOp::Pow => l.pow(r),
            BinOp::BitAnd => l.bit_op(r, "&"),
            BinOp::BitOr => l.bit_op(r, "|"),
            BinOp::BitXor => l.bit_op(r, "^"),
            BinOp::Shl => l.bit_op(r, "<<"),
            BinOp::Shr => l.bit_op(r, ">>"),
        };
        result.map_err(|e| self.rt(e))
    }

    fn compare(&self, op: CmpOp, l: &Value, r: &Value) -> Result<bool> {
        use std::cmp::Ordering::*;
        let ord = |l: &Value, r: &Value| l.compare(r).map_err(|e| self.rt(e));
        Ok(match op {
            CmpOp::Eq => l.equals(r).map_err(|e| self.rt(e))?,
            CmpOp::Ne => !l.equals(r).map_err(|e| self.rt(e))?,
            CmpOp::Lt => ord(l, r)? == Less,
            CmpOp::Le => ord(l, r)? != Greater,
            CmpOp::Gt => ord(l, r)? == Greater,
            CmpOp::Ge => ord(l, r)? != Less,
            CmpOp::In => self.contains(r, l)?,
            CmpOp::NotIn => !self.contains(r, l)?,
            CmpOp::Is => l.is(r),
            CmpOp::IsNot => !l.is(r),
        })
    }

    /// `item in container`; `"x" in d` tests the variable store.
    fn contains(&self, container: &Value, item: &Value) -> Result<bool> {
        if let Value::Vars = container {
            let key = item.as_str().map_err(|e| self.rt(e))?;
            return Ok(self.host.vars().borrow().contains(key));
        }
        container.contains(item).map_err(|e| self.rt(e))
    }

    // ── Attributes ────────────────────────────────────────────────────────────

    fn get_attr(&self, obj: &Value, name: &str) -> Result<Value> {
        match obj {
            Value::Vars => self
                .host
                .vars()
                .borrow()
                .get(name)
                .cloned()
                .ok_or_else(|| self.rt(format!("AttributeError: 'defines' object has no attribute '{name}'"))),
            Value::Module(m) => libs::get_attr(*m, name).map_err(|e| self.rt(e)),
            other => Err(self.rt(format!(
                "AttributeError: '{}' object has no attribute '{name}'",
                other.type_name()
            ))),
        }
    }

    fn set_attr(&self, obj: &Value, name: &str, value: Value) -> Result<()> {
        match obj {
            Value::Vars => {
                self.host.vars().borrow_mut().set(name, value);
                Ok(())
            }
            other => Err(self.rt(format!(
                "AttributeError: '{}' object attribute '{name}' is read-only",
                other.type_name()
            ))),
        }
    }

    fn call_method(&mut self, obj: Value, name: &str, args: Vec<Value>) -> Result<Value> {
        let handled = match &obj {
            Value::Module(m) => Some(libs::call(*m, name, &args)),
            Value::Str(s) => builtins::call_str_method(s, name, args.clone()),
            Value::List(items) => builtins::call_list_method(items, name, args.clone()),
            Value::Tuple(items) => match name {
                "index" | "count" => {
                    let cell = RefCell::new(items.as_ref().clone());
                    builtins::call_list_method(&cell, name, args.clone())
                }
                _ => None,
            },
            _ => None,
        };
        match handled {
            Some(result) => result.map_err(|e| self.rt(e)),
            None => {
                let f = self.get_attr(&obj, name)?;
                self.call(&f, args)
            }
        }
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    pub fn call(&mut self, callee: &Value, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::Func(f) => self.call_function(f, args),
            Value::Native(native) => {
                let store = self.host.vars();
                let text = (native.0)(&store.borrow());
                Ok(Value::Str(text))
            }
            Value::Builtin(b) => self.call_builtin(*b, args),
            other => Err(self.rt(format!(
                "TypeError: '{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    fn call_function(&mut self, f: &Rc<Function>, args: Vec<Value>) -> Result<Value> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(self.rt("RecursionError: maximum recursion depth exceeded"));
        }
        let params = &f.def.params;
        if args.len() > params.len() {
            return Err(self.rt(format!(
                "TypeError: {}() takes {} positional argument(s) but {} were given",
                f.name(),
                params.len(),
                args.len()
            )));
        }
        let scope = Env::new(Some(Rc::clone(&f.closure)));
        let mut args = args.into_iter();
        for (param, default) in params.iter().zip(&f.defaults) {
            let v = match args.next().or_else(|| default.clone()) {
                Some(v) => v,
                None => {
                    return Err(self.rt(format!(
                        "TypeError: {}() missing required argument: '{}'",
                        f.name(),
                        param.name
                    )))
                }
            };
            scope.set(&param.name, v);
        }

        self.depth += 1;
        let caller_line = self.line;
        let result = super::grow(|| match &f.def.body {
            FuncBody::Block(body) => self.exec_block(body, &scope).map(|cf| match cf {
                Some(ControlFlow::Return(v)) => v,
                _ => Value::None,
            }),
            FuncBody::Expr(e) => self.eval(e, &scope),
        });
        self.depth -= 1;
        if result.is_ok() {
            self.line = caller_line;
        }
        result
    }

    fn call_builtin(&mut self, b: Builtin, args: Vec<Value>) -> Result<Value> {
        match b {
            Builtin::Out => {
                let [text] = args.as_slice() else {
                    return Err(self.rt(format!("TypeError: out() takes 1 argument ({} given)", args.len())));
                };
                self.host.out(&text.to_string());
                Ok(Value::None)
            }
            Builtin::Include => {
                let [name] = args.as_slice() else {
                    return Err(self.rt(format!("TypeError: include() takes 1 argument ({} given)", args.len())));
                };
                self.host.include(&name.to_string(), self.depth)?;
                Ok(Value::None)
            }
            Builtin::Map => {
                let [f, iterable] = args.as_slice() else {
                    return Err(self.rt("TypeError: map() takes 2 arguments"));
                };
                let items = iterable.iterate().map_err(|e| self.rt(e))?;
                let mut out = Vec::new();
                for item in items {
                    out.push(self.call(f, vec![item])?);
                }
                Ok(Value::list(out))
            }
            Builtin::Filter => {
                let [f, iterable] = args.as_slice() else {
                    return Err(self.rt("TypeError: filter() takes 2 arguments"));
                };
                let items = iterable.iterate().map_err(|e| self.rt(e))?;
                let mut out = Vec::new();
                for item in items {
                    let keep = match f {
                        Value::None => item.truthy(),
                        f => self.call(f, vec![item.clone()])?.truthy(),
                    };
                    if keep {
                        out.push(item);
                    }
                }
                Ok(Value::list(out))
            }
            Builtin::Getattr => match args.as_slice() {
                [obj, name] => {
                    let name = name.as_str().map_err(|e| self.rt(e))?;
                    self.get_attr(obj, name)
                }
                [obj, name, default] => {
                    let name = name.as_str().map_err(|e| self.rt(e))?;
                    Ok(self.get_attr(obj, name).unwrap_or_else(|_| default.clone()))
                }
                _ => Err(self.rt("TypeError: getattr() takes 2 or 3 arguments")),
            },
            Builtin::Hasattr => {
                let [obj, name] = args.as_slice() else {
                    return Err(self.rt("TypeError: hasattr() takes 2 arguments"));
                };
                let name = name.as_str().map_err(|e| self.rt(e))?;
                Ok(Value::Bool(self.get_attr(obj, name).is_ok()))
            }
            Builtin::Setattr => {
                let [obj, name, value] = args.as_slice() else {
                    return Err(self.rt("TypeError: setattr() takes 3 arguments"));
                };
                let name = name.as_str().map_err(|e| self.rt(e))?;
                self.set_attr(obj, name, value.clone())?;
                Ok(Value::None)
            }
            pure => builtins::call_builtin(pure, args).map_err(|e| self.rt(e)),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{check::check_program, stmt::parse_program};
    use crate::store::VarStore;

    #[derive(Default)]
    struct TestHost {
        output: String,
        included: Vec<(String, usize)>,
        vars: SharedVars,
        call_depth: usize,
    }

    impl Host for TestHost {
        fn out(&mut self, text: &str) {
            self.output.push_str(text);
        }

        fn include(&mut self, name: &str, call_depth: usize) -> Result<()> {
            self.included.push((name.to_owned(), call_depth));
            Ok(())
        }

        fn vars(&self) -> SharedVars {
            Rc::clone(&self.vars)
        }

        fn call_depth(&self) -> usize {
            self.call_depth
        }
    }

    fn run_with(host: &mut TestHost, src: &str) -> Result<()> {
        let program = parse_program(src)?;
        check_program(&program)?;
        Interpreter::new(host).run(&program, &Env::new(None))
    }

    fn run(src: &str) -> String {
        let mut host = TestHost::default();
        run_with(&mut host, src).expect("script failed");
        host.output
    }

    #[test]
    fn out_appends_text_verbatim() {
        assert_eq!(run("out('a')\nout(\"b\\n\")\n"), "ab\n");
        assert_eq!(run("out(\"computed:\" + str(1+1))"), "computed:2");
    }

    #[test]
    fn loops_and_conditionals() {
        let src = "\
total = 0
for i in range(10):
    if i % 2:
        continue
    if i > 6:
        break
    total += i
out(str(total))
";
        assert_eq!(run(src), "12");
        assert_eq!(run("n = 3\nwhile n:\n    out(str(n))\n    n -= 1\n"), "321");
    }

    #[test]
    fn functions_closures_and_defaults() {
        let src = "\
def greet(name, punct='!'):
    return 'hi ' + name + punct
def counter(start):
    return lambda step=1: start + step
out(greet('bob'))
out(greet('al', '?'))
out(str(counter(10)(5)))
";
        assert_eq!(run(src), "hi bob!hi al?15");
    }

    #[test]
    fn recursion_and_depth_limit() {
        let src = "def fact(n):\n    return 1 if n <= 1 else n * fact(n - 1)\nout(str(fact(10)))\n";
        assert_eq!(run(src), "3628800");

        let mut host = TestHost::default();
        let err = run_with(&mut host, "def f(n):\n    return f(n + 1)\nf(0)\n").unwrap_err();
        assert!(err.to_string().contains("RecursionError"), "{err}");
    }

    #[test]
    fn call_depth_starts_from_the_host() {
        let mut host = TestHost {
            call_depth: MAX_CALL_DEPTH - 2,
            ..TestHost::default()
        };
        run_with(&mut host, "def f(n):\n    return 0 if n == 0 else f(n - 1)\nout(str(f(1)))\n").unwrap();
        assert_eq!(host.output, "0");
        let err = run_with(&mut host, "def f(n):\n    return 0 if n == 0 else f(n - 1)\nf(2)\n").unwrap_err();
        assert!(err.to_string().contains("RecursionError"), "{err}");
    }

    #[test]
    fn include_reports_the_active_call_depth() {
        let mut host = TestHost::default();
        run_with(&mut host, "include('top')\ndef f():\n    include('inner')\nf()\n").unwrap();
        assert_eq!(host.included, [("top".to_owned(), 0), ("inner".to_owned(), 1)]);
    }

    #[test]
    fn comprehensions_and_builtins() {
        assert_eq!(run("out(str([x * x for x in range(5) if x % 2 == 0]))"), "[0, 4, 16]");
        assert_eq!(run("out(','.join(map(str, filter(None, [0, 1, 2]))))"), "1,2");
        assert_eq!(run("a, b = 1, 2\na, b = b, a\nout('%d-%d' % (a, b))"), "2-1");
        assert_eq!(run("xs = [3, 1]\nxs += [2]\nxs.sort()\nout(str(xs))"), "[1, 2, 3]");
        assert_eq!(run("out('{}|{:>3}'.format('a', 7))"), "a|  7");
    }

    #[test]
    fn store_access_through_d_and_defines() {
        let mut host = TestHost::default();
        host.vars.borrow_mut().set("Greeting", "hello");
        run_with(
            &mut host,
            "out(d.greeting)\ndefines.Count = 3\nd.count += 1\nout(str('greeting' in d))\n",
        )
        .unwrap();
        assert_eq!(host.output, "helloTrue");
        assert_eq!(host.vars.borrow().get("COUNT"), Some(&Value::Int(4)));
        assert_eq!(host.vars.borrow().get("count"), Some(&Value::Int(4)));
    }

    #[test]
    fn store_functions_are_callable() {
        let mut host = TestHost::default();
        run_with(&mut host, "def f(v):\n    return 'x' + str(v.n)\nd.n = 1\nd.f = f\nout(d.f(d))\n").unwrap();
        assert_eq!(host.output, "x1");
    }

    #[test]
    fn missing_attribute_is_runtime_error() {
        let mut host = TestHost::default();
        let err = run_with(&mut host, "x = 1\nout(d.nothing)\n").unwrap_err();
        assert!(matches!(err, Error::Runtime(ref m) if m.starts_with("line 2:") && m.contains("nothing")));
    }

    #[test]
    fn include_goes_through_host() {
        let mut host = TestHost::default();
        run_with(&mut host, "for n in ['a.txt', 'b.txt']:\n    include(n)\n").unwrap();
        let names: Vec<_> = host.included.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt"]);
    }

    #[test]
    fn libraries_are_reachable() {
        assert_eq!(run("out(str(math.floor(math.pi)))"), "3");
        assert_eq!(run("out(re.sub('o', '0', 'foo'))"), "f00");
    }

    #[test]
    fn blocks_do_not_share_locals() {
        let mut host = TestHost::default();
        run_with(&mut host, "x = 1\n").unwrap();
        assert!(run_with(&mut host, "out(str(x))\n").is_err());
    }

    #[test]
    fn errors_carry_python_names() {
        let mut host = TestHost::default();
        let cases = [
            ("1 / 0\n", "ZeroDivisionError"),
            ("undefined_name\n", "NameError"),
            ("[1][5]\n", "IndexError"),
            ("assert 1 == 2, 'nope'\n", "AssertionError: nope"),
            ("a, b = [1]\n", "ValueError"),
            ("'a' + 1\n", "TypeError"),
        ];
        for (src, want) in cases {
            let err = run_with(&mut host, src).unwrap_err().to_string();
            assert!(err.contains(want), "{src:?} gave {err}");
        }
    }

    #[test]
    fn native_values_see_the_store() {
        let mut host = TestHost::default();
        host.vars.borrow_mut().set("n", 2i64);
        host.vars
            .borrow_mut()
            .set("twice", Value::Native(crate::script::NativeFn::new(|v: &VarStore| {
                format!("{}", v.get("n").cloned().unwrap_or_default()).repeat(2)
            })));
        run_with(&mut host, "out(d.twice())").unwrap();
        assert_eq!(host.output, "22");
    }

    #[test]
    fn boundary_scripts_succeed_or_fail_cleanly() {
        let ok = [
            ("l = [1]\nl.append(l)\nout(str(l))\n", "[1, [...]]"),
            ("l = [1]\nl.append(l)\nout(str(l == l))\n", "True"),
            ("out(str(round(2.5, -9223372036854775807)))\n", "0.0"),
            ("out(str(len(range(0, 9223372036854775807, 4611686018427387904))))\n", "2"),
            ("out('abc'[::9223372036854775807])\n", "a"),
            ("out(str((-9223372036854775807 - 1) % -1))\n", "0"),
            ("out(str(5 in range(-9223372036854775807, 9223372036854775807)))\n", "True"),
        ];
        for (src, want) in ok {
            let mut host = TestHost::default();
            run_with(&mut host, src).unwrap_or_else(|e| panic!("{src:?} failed: {e}"));
            assert_eq!(host.output, want, "{src:?}");
        }

        let failing = [
            ("out(str(len(range(-9223372036854775807, 9223372036854775807))))\n", "OverflowError"),
            ("out('ab' * 9223372036854775807)\n", "MemoryError"),
            ("out(str([0] * 9223372036854775807))\n", "MemoryError"),
            ("xs = [0]\nxs += range(1 << 40)\n", "MemoryError"),
            ("out(str(list(range(1 << 40))))\n", "MemoryError"),
            ("out('x'.center(9223372036854775807))\n", "MemoryError"),
            ("out('x'.zfill(9223372036854775807))\n", "MemoryError"),
            ("out('%.1000000000000f' % 1.0)\n", "precision too big"),
            ("out('{:.99999999999999999999}'.format(1.0))\n", "Too many decimal digits"),
            ("out(str(int(1e300)))\n", "OverflowError"),
            ("out(str(round(1e300)))\n", "OverflowError"),
            ("out('%c' % 1114112)\n", "ValueError: %c arg not in range(0x110000)"),
            ("out(chr(1114112))\n", "ValueError: chr() arg not in range(0x110000)"),
            ("out(str(1 << 9223372036854775807))\n", "OverflowError"),
            ("a = [1]\nb = [1]\na.append(b)\nb.append(a)\nout(str(a == b))\n", "RecursionError"),
        ];
        for (src, want) in failing {
            let mut host = TestHost::default();
            let err = run_with(&mut host, src).unwrap_err().to_string();
            assert!(err.contains(want), "{src:?} gave {err}");
        }
    }
}

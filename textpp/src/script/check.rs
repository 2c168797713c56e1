//! Static safety check run over every block before it executes.
//!
//! Embedded code may only produce text, touch the variable store and include
//! files.  Module imports and dunder names (`__import__`, `__class__`, …) are
//! the two routes out of that surface, so both are rejected up front.

use super::expr::{Expr, Target};
use super::stmt::{FuncBody, FuncDef, Stmt, StmtKind};
use crate::error::{Error, Result};

/// Walk `stmts` and fail on the first forbidden construct.
pub fn check_program(stmts: &[Stmt]) -> Result<()> {
    stmts.iter().try_for_each(check_stmt)
}

fn forbidden(construct: String) -> Error {
    Error::Forbidden { construct }
}

fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn check_name(name: &str) -> Result<()> {
    if is_dunder(name) {
        return Err(forbidden(format!("access to '{name}'")));
    }
    Ok(())
}

fn check_stmt(stmt: &Stmt) -> Result<()> {
    super::grow(|| check_stmt_node(stmt))
}

fn check_stmt_node(stmt: &Stmt) -> Result<()> {
    match &stmt.kind {
        StmtKind::Import { module } => Err(forbidden(format!(
            "import of '{module}' on line {}",
            stmt.line
        ))),
        StmtKind::Expr(e) => check_expr(e),
        StmtKind::Assign { targets, value } => {
            targets.iter().try_for_each(check_target)?;
            check_expr(value)
        }
        StmtKind::AugAssign { target, value, .. } => {
            check_target(target)?;
            check_expr(value)
        }
        StmtKind::If {
            branches,
            else_block,
        } => {
            for (cond, body) in branches {
                check_expr(cond)?;
                check_program(body)?;
            }
            check_program(else_block)
        }
        StmtKind::While { cond, body } => {
            check_expr(cond)?;
            check_program(body)
        }
        StmtKind::For { target, iter, body } => {
            check_target(target)?;
            check_expr(iter)?;
            check_program(body)
        }
        StmtKind::Def(def) => {
            check_name(&def.name)?;
            check_func(def)
        }
        StmtKind::Return(value) => value.iter().try_for_each(check_expr),
        StmtKind::Assert { cond, message } => {
            check_expr(cond)?;
            message.iter().try_for_each(check_expr)
        }
        StmtKind::Break | StmtKind::Continue | StmtKind::Pass => Ok(()),
    }
}

fn check_func(def: &FuncDef) -> Result<()> {
    for param in &def.params {
        check_name(&param.name)?;
        param.default.iter().try_for_each(check_expr)?;
    }
    match &def.body {
        FuncBody::Block(body) => check_program(body),
        FuncBody::Expr(e) => check_expr(e),
    }
}

fn check_target(target: &Target) -> Result<()> {
    match target {
        Target::Name(name) => check_name(name),
        Target::Attr(obj, name) => {
            check_name(name)?;
            check_expr(obj)
        }
        Target::Index(obj, index) => {
            check_expr(obj)?;
            check_expr(index)
        }
        Target::Tuple(items) => items.iter().try_for_each(check_target),
    }
}

fn check_expr(expr: &Expr) -> Result<()> {
    super::grow(|| check_expr_node(expr))
}

fn check_expr_node(expr: &Expr) -> Result<()> {
    match expr {
        Expr::Literal(_) => Ok(()),
        Expr::Name(name) => check_name(name),
        Expr::List(items) | Expr::Tuple(items) => items.iter().try_for_each(check_expr),
        Expr::ListComp {
            elem,
            target,
            iter,
            cond,
        } => {
            check_expr(elem)?;
            check_target(target)?;
            check_expr(iter)?;
            cond.iter().try_for_each(|c| check_expr(c))
        }
        Expr::Attr(obj, name) => {
            check_name(name)?;
            check_expr(obj)
        }
        Expr::Index(obj, index) => {
            check_expr(obj)?;
            check_expr(index)
        }
        Expr::Slice {
            value,
            start,
            stop,
            step,
        } => {
            check_expr(value)?;
            [start, stop, step]
                .into_iter()
                .flatten()
                .try_for_each(|e| check_expr(e))
        }
        Expr::Call(callee, args) => {
            check_expr(callee)?;
            args.iter().try_for_each(check_expr)
        }
        Expr::Unary(_, inner) => check_expr(inner),
        Expr::Binary(_, lhs, rhs) | Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
            check_expr(lhs)?;
            check_expr(rhs)
        }
        Expr::Compare(first, rest) => {
            check_expr(first)?;
            rest.iter().try_for_each(|(_, e)| check_expr(e))
        }
        Expr::IfElse { cond, then, else_ } => {
            check_expr(cond)?;
            check_expr(then)?;
            check_expr(else_)
        }
        Expr::Lambda(def) => check_func(def),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::stmt::parse_program;

    fn check(src: &str) -> Result<()> {
        check_program(&parse_program(src).expect("parse failed"))
    }

    #[test]
    fn plain_code_passes() {
        assert!(check("for i in range(3):\n    out(str(i))\nd.x = math.sqrt(4)\n").is_ok());
    }

    #[test]
    fn top_level_import_rejected() {
        let err = check("import os\n").unwrap_err();
        assert!(matches!(err, Error::Forbidden { ref construct } if construct.contains("os")));
    }

    #[test]
    fn nested_imports_rejected() {
        assert!(check("if 1:\n    from subprocess import run\n").is_err());
        assert!(check("def f():\n    import sys\n    return 1\n").is_err());
        assert!(check("while 0:\n    for x in []:\n        import socket\n").is_err());
    }

    #[test]
    fn dunder_access_rejected() {
        assert!(check("__import__('os')\n").is_err());
        assert!(check("x = ''.__class__\n").is_err());
        assert!(check("f = lambda: d.__dict__\n").is_err());
        assert!(check("[c for c in ().__class__.__bases__]\n").is_err());
    }

    #[test]
    fn single_underscore_names_allowed() {
        assert!(check("_x = 1\n__private = 2\n").is_ok());
    }
}

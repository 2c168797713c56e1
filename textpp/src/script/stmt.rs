//! Statement AST and the block-level parser.
//!
//! An embedded-code block is a sequence of statements structured by
//! indentation.  Simple statements may share a line separated by `;`, and a
//! compound statement may carry a one-line body after its colon:
//!
//! ```text
//! for i in range(3):
//!     out(str(i) + "\n")
//! if d.debug: out("debug build\n")
//! ```

use std::rc::Rc;

use super::expr::{show, BinOp, Expr, Parser, Target};
use super::lexer::{tokenize, Keyword, Token};
use crate::error::Result;

/// A function definition shared by `def` statements and `lambda` expressions.
#[derive(Debug)]
pub struct FuncDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: FuncBody,
}

#[derive(Debug)]
pub struct Param {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug)]
pub enum FuncBody {
    Block(Vec<Stmt>),
    Expr(Expr),
}

/// A statement together with the line it started on.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub line: usize,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    /// `a = b = value` — every target receives the same value.
    Assign { targets: Vec<Target>, value: Expr },
    AugAssign { target: Target, op: BinOp, value: Expr },
    If {
        branches: Vec<(Expr, Vec<Stmt>)>,
        else_block: Vec<Stmt>,
    },
    While { cond: Expr, body: Vec<Stmt> },
    For { target: Target, iter: Expr, body: Vec<Stmt> },
    Def(Rc<FuncDef>),
    Return(Option<Expr>),
    Assert { cond: Expr, message: Option<Expr> },
    Break,
    Continue,
    Pass,
    /// `import m` / `from m import x` — parsed so the safety check can
    /// reject it with a precise message.
    Import { module: String },
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Parse embedded code into a list of statements.
pub fn parse_program(src: &str) -> Result<Vec<Stmt>> {
    let mut parser = Parser::new(tokenize(src)?);
    let mut stmts = Vec::new();
    loop {
        match parser.peek() {
            Token::Eof => break,
            Token::Newline => {
                parser.advance();
            }
            Token::Indent => return Err(parser.error("unexpected indent")),
            _ => stmts.extend(parser.parse_statement()?),
        }
    }
    Ok(stmts)
}

fn aug_op(tok: &Token) -> Option<BinOp> {
    Some(match tok {
        Token::Op("+=") => BinOp::Add,
        Token::Op("-=") => BinOp::Sub,
        Token::Op("*=") => BinOp::Mul,
        Token::Op("/=") => BinOp::Div,
        Token::Op("//=") => BinOp::FloorDiv,
        Token::Op("%=") => BinOp::Rem,
        Token::Op("**=") => BinOp::Pow,
        Token::Op("&=") => BinOp::BitAnd,
        Token::Op("|=") => BinOp::BitOr,
        Token::Op("^=") => BinOp::BitXor,
        Token::Op("<<=") => BinOp::Shl,
        Token::Op(">>=") => BinOp::Shr,
        _ => return None,
    })
}

impl Parser {
    fn parse_statement(&mut self) -> Result<Vec<Stmt>> {
        let line = self.line();
        let kind = match self.peek() {
            Token::Keyword(Keyword::If) => self.parse_if()?,
            Token::Keyword(Keyword::While) => self.parse_while()?,
            Token::Keyword(Keyword::For) => self.parse_for()?,
            Token::Keyword(Keyword::Def) => self.parse_def()?,
            _ => return self.parse_simple_line(),
        };
        Ok(vec![Stmt { line, kind }])
    }

    /// One or more `;`-separated simple statements terminated by a newline.
    fn parse_simple_line(&mut self) -> Result<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            let line = self.line();
            let kind = self.parse_small()?;
            stmts.push(Stmt { line, kind });
            if !self.eat_op(";") || matches!(self.peek(), Token::Newline | Token::Eof) {
                break;
            }
        }
        match self.advance() {
            Token::Newline | Token::Eof => Ok(stmts),
            other => Err(self.error(format!("unexpected {}", show(&other)))),
        }
    }

    fn parse_small(&mut self) -> Result<StmtKind> {
        match self.peek().clone() {
            Token::Keyword(Keyword::Pass) => {
                self.advance();
                Ok(StmtKind::Pass)
            }
            Token::Keyword(Keyword::Break) => {
                if self.loop_depth == 0 {
                    return Err(self.error("'break' outside loop"));
                }
                self.advance();
                Ok(StmtKind::Break)
            }
            Token::Keyword(Keyword::Continue) => {
                if self.loop_depth == 0 {
                    return Err(self.error("'continue' not properly in loop"));
                }
                self.advance();
                Ok(StmtKind::Continue)
            }
            Token::Keyword(Keyword::Return) => {
                if self.func_depth == 0 {
                    return Err(self.error("'return' outside function"));
                }
                self.advance();
                let value = if self.starts_expr() {
                    Some(self.parse_expr_list()?)
                } else {
                    None
                };
                Ok(StmtKind::Return(value))
            }
            Token::Keyword(Keyword::Assert) => {
                self.advance();
                let cond = self.parse_test()?;
                let message = if self.eat_op(",") {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                Ok(StmtKind::Assert { cond, message })
            }
            Token::Keyword(Keyword::Import) | Token::Keyword(Keyword::From) => self.parse_import(),
            Token::Keyword(Keyword::Unsupported(word)) => {
                Err(self.error(format!("'{word}' statements are not supported")))
            }
            Token::Keyword(Keyword::Elif) | Token::Keyword(Keyword::Else) => {
                Err(self.error("'elif'/'else' without a matching 'if'"))
            }
            _ => self.parse_expr_or_assign(),
        }
    }

    fn parse_expr_or_assign(&mut self) -> Result<StmtKind> {
        let line = self.line();
        let first = self.parse_expr_list()?;

        if let Some(op) = aug_op(self.peek()) {
            self.advance();
            if matches!(first, Expr::Tuple(_) | Expr::List(_)) {
                return Err(self.error("illegal expression for augmented assignment"));
            }
            let target = Target::from_expr(first, line)?;
            let value = self.parse_expr_list()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }

        if !self.at_op("=") {
            return Ok(StmtKind::Expr(first));
        }
        let mut exprs = vec![first];
        while self.eat_op("=") {
            exprs.push(self.parse_expr_list()?);
        }
        let value = exprs.pop().ok_or_else(|| self.error("missing assignment value"))?;
        let targets = exprs
            .into_iter()
            .map(|e| Target::from_expr(e, line))
            .collect::<Result<Vec<_>>>()?;
        Ok(StmtKind::Assign { targets, value })
    }

    /// Consume an import statement without interpreting it.
    fn parse_import(&mut self) -> Result<StmtKind> {
        self.advance();
        let mut module = String::new();
        while !matches!(self.peek(), Token::Newline | Token::Eof | Token::Op(";")) {
            match self.advance() {
                Token::Name(n) if module.is_empty() || module.ends_with('.') => module.push_str(&n),
                Token::Op(".") if !module.contains(' ') => module.push('.'),
                _ => {
                    if !module.is_empty() && !module.ends_with(' ') {
                        module.push(' ');
                    }
                }
            }
        }
        let module = module.trim().to_owned();
        if module.is_empty() {
            return Err(self.error("expected a module name"));
        }
        Ok(StmtKind::Import { module })
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>> {
        self.nested(Parser::parse_block_body)
    }

    fn parse_block_body(&mut self) -> Result<Vec<Stmt>> {
        self.expect_op(":")?;
        if !matches!(self.peek(), Token::Newline) {
            return self.parse_simple_line();
        }
        self.advance();
        if !matches!(self.peek(), Token::Indent) {
            return Err(self.error("expected an indented block"));
        }
        self.advance();
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                Token::Dedent => {
                    self.advance();
                    break;
                }
                Token::Eof => break,
                Token::Newline => {
                    self.advance();
                }
                Token::Indent => return Err(self.error("unexpected indent")),
                _ => stmts.extend(self.parse_statement()?),
            }
        }
        Ok(stmts)
    }

    fn parse_if(&mut self) -> Result<StmtKind> {
        self.advance();
        let mut branches = Vec::new();
        let cond = self.parse_test()?;
        branches.push((cond, self.parse_block()?));
        let mut else_block = Vec::new();
        loop {
            if self.eat_kw(Keyword::Elif) {
                let cond = self.parse_test()?;
                branches.push((cond, self.parse_block()?));
            } else if self.eat_kw(Keyword::Else) {
                else_block = self.parse_block()?;
                break;
            } else {
                break;
            }
        }
        Ok(StmtKind::If {
            branches,
            else_block,
        })
    }

    fn parse_loop_body(&mut self) -> Result<Vec<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        body
    }

    fn parse_while(&mut self) -> Result<StmtKind> {
        self.advance();
        let cond = self.parse_test()?;
        let body = self.parse_loop_body()?;
        Ok(StmtKind::While { cond, body })
    }

    fn parse_for(&mut self) -> Result<StmtKind> {
        self.advance();
        let target = self.parse_target_list()?;
        self.expect_kw(Keyword::In)?;
        let iter = self.parse_expr_list()?;
        let body = self.parse_loop_body()?;
        Ok(StmtKind::For { target, iter, body })
    }

    fn parse_def(&mut self) -> Result<StmtKind> {
        self.advance();
        let name = self.expect_name()?;
        self.expect_op("(")?;
        let params = self.parse_params(")")?;
        self.expect_op(")")?;
        if self.eat_op("->") {
            self.parse_test()?;
        }
        // Loops do not extend into the function body.
        let saved_loops = std::mem::take(&mut self.loop_depth);
        self.func_depth += 1;
        let body = self.parse_block();
        self.func_depth -= 1;
        self.loop_depth = saved_loops;
        Ok(StmtKind::Def(Rc::new(FuncDef {
            name,
            params,
            body: FuncBody::Block(body?),
        })))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

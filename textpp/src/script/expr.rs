//! Expression AST and the expression half of the parser.
//!
//! Operator precedence (lowest → highest):
//!   lambda  →  conditional  →  or  →  and  →  not  →  comparison  →
//!   `|`  →  `^`  →  `&`  →  shift  →  additive  →  multiplicative  →
//!   unary  →  power  →  postfix  →  atom

use std::rc::Rc;

use super::lexer::{Keyword, Spanned, Token};
use super::stmt::{FuncBody, FuncDef, Param};
use super::value::Value;
use crate::error::{Error, Result};

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    BitNot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    ListComp {
        elem: Box<Expr>,
        target: Box<Target>,
        iter: Box<Expr>,
        cond: Option<Box<Expr>>,
    },
    Attr(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Slice {
        value: Box<Expr>,
        start: Option<Box<Expr>>,
        stop: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
    Call(Box<Expr>, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    IfElse {
        cond: Box<Expr>,
        then: Box<Expr>,
        else_: Box<Expr>,
    },
    Lambda(Rc<FuncDef>),
}

/// Left-hand side of an assignment or loop variable.
#[derive(Debug, Clone)]
pub enum Target {
    Name(String),
    Attr(Expr, String),
    Index(Expr, Expr),
    Tuple(Vec<Target>),
}

impl Target {
    pub(super) fn from_expr(expr: Expr, line: usize) -> Result<Target> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Attr(obj, name) => Ok(Target::Attr(*obj, name)),
            Expr::Index(obj, index) => Ok(Target::Index(*obj, *index)),
            Expr::Tuple(items) | Expr::List(items) => items
                .into_iter()
                .map(|e| Target::from_expr(e, line))
                .collect::<Result<Vec<_>>>()
                .map(Target::Tuple),
            other => Err(Error::Parse {
                line,
                message: format!("cannot assign to {}", describe(&other)),
            }),
        }
    }
}

fn describe(expr: &Expr) -> &'static str {
    match expr {
        Expr::Literal(_) => "literal",
        Expr::Call(..) => "function call",
        Expr::Slice { .. } => "slice",
        Expr::Lambda(_) => "lambda",
        Expr::ListComp { .. } => "list comprehension",
        Expr::IfElse { .. } => "conditional expression",
        Expr::Compare(..) => "comparison",
        _ => "expression",
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Depth of nested brackets, unary operators, operator chains and indented
/// blocks the parser accepts.
pub const MAX_PARSE_NESTING: usize = 1000;

pub(super) struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    pub(super) loop_depth: usize,
    pub(super) func_depth: usize,
    nesting: usize,
}

impl Parser {
    pub(super) fn new(tokens: Vec<Spanned>) -> Self {
        Parser {
            tokens,
            pos: 0,
            loop_depth: 0,
            func_depth: 0,
            nesting: 0,
        }
    }

    /// Parse one level deeper than the current one.
    pub(super) fn nested<T>(&mut self, level: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.nested_by(1, level)
    }

    fn nested_by<T>(&mut self, levels: usize, level: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let base = self.nesting;
        if base + levels > MAX_PARSE_NESTING {
            return Err(self.error("too many nested parentheses, operators or blocks"));
        }
        self.nesting = base + levels;
        let result = super::grow(|| level(self));
        self.nesting = base;
        result
    }

    pub(super) fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    pub(super) fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    pub(super) fn advance(&mut self) -> Token {
        let t = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    pub(super) fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            line: self.line(),
            message: message.into(),
        }
    }

    pub(super) fn at_op(&self, op: &str) -> bool {
        matches!(self.peek(), Token::Op(o) if *o == op)
    }

    pub(super) fn eat_op(&mut self, op: &str) -> bool {
        if self.at_op(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(super) fn expect_op(&mut self, op: &str) -> Result<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{op}', found {}", show(self.peek()))))
        }
    }

    pub(super) fn at_kw(&self, kw: Keyword) -> bool {
        matches!(self.peek(), Token::Keyword(k) if *k == kw)
    }

    pub(super) fn eat_kw(&mut self, kw: Keyword) -> bool {
        if self.at_kw(kw) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(super) fn expect_kw(&mut self, kw: Keyword) -> Result<()> {
        if self.eat_kw(kw) {
            Ok(())
        } else {
            Err(self.error(format!("expected {kw:?}, found {}", show(self.peek()))))
        }
    }

    pub(super) fn expect_name(&mut self) -> Result<String> {
        match self.advance() {
            Token::Name(name) => Ok(name),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected a name, found {}", show(&other))))
            }
        }
    }

    /// Whether the next token can begin an expression.
    pub(super) fn starts_expr(&self) -> bool {
        match self.peek() {
            Token::Int(_) | Token::Float(_) | Token::Str(_) | Token::Name(_) => true,
            Token::Keyword(k) => matches!(
                k,
                Keyword::True | Keyword::False | Keyword::None | Keyword::Not | Keyword::Lambda
            ),
            Token::Op(op) => matches!(*op, "(" | "[" | "{" | "-" | "+" | "~"),
            _ => false,
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    /// Comma-separated expressions; more than one (or a trailing comma)
    /// yields a tuple.
    pub(super) fn parse_expr_list(&mut self) -> Result<Expr> {
        let first = self.parse_test()?;
        if !self.at_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if !self.starts_expr() {
                break;
            }
            items.push(self.parse_test()?);
        }
        Ok(Expr::Tuple(items))
    }

    /// Loop targets stop below comparisons so that `in` is left alone.
    pub(super) fn parse_target_list(&mut self) -> Result<Target> {
        let line = self.line();
        let first = self.parse_bitor()?;
        if !self.at_op(",") {
            return Target::from_expr(first, line);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if !self.starts_expr() {
                break;
            }
            items.push(self.parse_bitor()?);
        }
        Target::from_expr(Expr::Tuple(items), line)
    }

    pub(super) fn parse_test(&mut self) -> Result<Expr> {
        self.nested(Parser::parse_conditional)
    }

    fn parse_conditional(&mut self) -> Result<Expr> {
        if self.eat_kw(Keyword::Lambda) {
            return self.parse_lambda();
        }
        let value = self.parse_or()?;
        if self.eat_kw(Keyword::If) {
            let cond = self.parse_or()?;
            self.expect_kw(Keyword::Else)?;
            let else_ = self.parse_test()?;
            return Ok(Expr::IfElse {
                cond: Box::new(cond),
                then: Box::new(value),
                else_: Box::new(else_),
            });
        }
        Ok(value)
    }

    fn parse_lambda(&mut self) -> Result<Expr> {
        let params = self.parse_params(":")?;
        self.expect_op(":")?;
        let body = self.parse_test()?;
        Ok(Expr::Lambda(Rc::new(FuncDef {
            name: "<lambda>".into(),
            params,
            body: FuncBody::Expr(body),
        })))
    }

    /// Parameter list up to (not including) `close`.
    pub(super) fn parse_params(&mut self, close: &str) -> Result<Vec<Param>> {
        let mut params: Vec<Param> = Vec::new();
        while !self.at_op(close) {
            let name = self.expect_name()?;
            if params.iter().any(|p| p.name == name) {
                return Err(self.error(format!("duplicate argument '{name}'")));
            }
            let default = if self.eat_op("=") {
                Some(self.parse_test()?)
            } else {
                if params.iter().any(|p| p.default.is_some()) {
                    return Err(self.error("non-default argument follows default argument"));
                }
                None
            };
            params.push(Param { name, default });
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(params)
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        let mut chain = 0;
        while self.eat_kw(Keyword::Or) {
            chain += 1;
            let rhs = self.nested_by(chain, Parser::parse_and)?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_not()?;
        let mut chain = 0;
        while self.eat_kw(Keyword::And) {
            chain += 1;
            let rhs = self.nested_by(chain, Parser::parse_not)?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.eat_kw(Keyword::Not) {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.nested(Parser::parse_not)?)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let lhs = self.parse_bitor()?;
        let mut ops = Vec::new();
        loop {
            let op = match self.peek() {
                Token::Op("==") => CmpOp::Eq,
                Token::Op("!=") => CmpOp::Ne,
                Token::Op("<") => CmpOp::Lt,
                Token::Op("<=") => CmpOp::Le,
                Token::Op(">") => CmpOp::Gt,
                Token::Op(">=") => CmpOp::Ge,
                Token::Keyword(Keyword::In) => CmpOp::In,
                Token::Keyword(Keyword::Not)
                    if matches!(self.peek_at(1), Token::Keyword(Keyword::In)) =>
                {
                    self.pos += 1;
                    CmpOp::NotIn
                }
                Token::Keyword(Keyword::Is) => {
                    if matches!(self.peek_at(1), Token::Keyword(Keyword::Not)) {
                        self.pos += 1;
                        CmpOp::IsNot
                    } else {
                        CmpOp::Is
                    }
                }
                _ => break,
            };
            self.pos += 1;
            ops.push((op, self.parse_bitor()?));
        }
        if ops.is_empty() {
            Ok(lhs)
        } else {
            Ok(Expr::Compare(Box::new(lhs), ops))
        }
    }

    fn parse_binary_level(
        &mut self,
        ops: &[(&str, BinOp)],
        next: fn(&mut Parser) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut lhs = next(self)?;
        // A left-associative chain nests its left operand once per operator.
        let mut chain = 0;
        'outer: loop {
            for (tok, op) in ops {
                if self.eat_op(tok) {
                    chain += 1;
                    let rhs = self.nested_by(chain, next)?;
                    lhs = Expr::Binary(*op, Box::new(lhs), Box::new(rhs));
                    continue 'outer;
                }
            }
            return Ok(lhs);
        }
    }

    pub(super) fn parse_bitor(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[("|", BinOp::BitOr)], Parser::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[("^", BinOp::BitXor)], Parser::parse_bitand)
    }

    fn parse_bitand(&mut self) -> Result<Expr> {
        self.parse_binary_level(&[("&", BinOp::BitAnd)], Parser::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[("<<", BinOp::Shl), (">>", BinOp::Shr)],
            Parser::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[("+", BinOp::Add), ("-", BinOp::Sub)],
            Parser::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        self.parse_binary_level(
            &[
                ("*", BinOp::Mul),
                ("//", BinOp::FloorDiv),
                ("/", BinOp::Div),
                ("%", BinOp::Rem),
            ],
            Parser::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            Token::Op("-") => UnaryOp::Neg,
            Token::Op("+") => UnaryOp::Pos,
            Token::Op("~") => UnaryOp::BitNot,
            _ => return self.parse_power(),
        };
        self.pos += 1;
        Ok(Expr::Unary(op, Box::new(self.nested(Parser::parse_unary)?)))
    }

    /// `**` is right-associative and binds tighter than a unary minus on its
    /// left: `-2 ** 2 == -4`.
    fn parse_power(&mut self) -> Result<Expr> {
        let base = self.parse_postfix()?;
        if self.eat_op("**") {
            let exp = self.nested(Parser::parse_unary)?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let expr = self.parse_atom()?;
        let base = self.nesting;
        let result = self.parse_trailers(expr);
        self.nesting = base;
        result
    }

    fn parse_trailers(&mut self, mut expr: Expr) -> Result<Expr> {
        loop {
            if self.nesting >= MAX_PARSE_NESTING {
                return Err(self.error("too many nested parentheses, operators or blocks"));
            }
            self.nesting += 1;
            if self.eat_op("(") {
                let mut args = Vec::new();
                while !self.at_op(")") {
                    if matches!(self.peek(), Token::Name(_)) && matches!(self.peek_at(1), Token::Op("=")) {
                        return Err(self.error("keyword arguments are not supported"));
                    }
                    args.push(self.parse_test()?);
                    if !self.eat_op(",") {
                        break;
                    }
                }
                self.expect_op(")")?;
                expr = Expr::Call(Box::new(expr), args);
            } else if self.eat_op(".") {
                let name = self.expect_name()?;
                expr = Expr::Attr(Box::new(expr), name);
            } else if self.eat_op("[") {
                expr = self.parse_subscript(expr)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_subscript(&mut self, value: Expr) -> Result<Expr> {
        let start = if self.at_op(":") {
            None
        } else {
            Some(Box::new(self.parse_test()?))
        };
        if !self.eat_op(":") {
            self.expect_op("]")?;
            let index = start.ok_or_else(|| self.error("empty subscript"))?;
            return Ok(Expr::Index(Box::new(value), index));
        }
        let stop = if self.at_op(":") || self.at_op("]") {
            None
        } else {
            Some(Box::new(self.parse_test()?))
        };
        let step = if self.eat_op(":") && !self.at_op("]") {
            Some(Box::new(self.parse_test()?))
        } else {
            None
        };
        self.expect_op("]")?;
        Ok(Expr::Slice {
            value: Box::new(value),
            start,
            stop,
            step,
        })
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        let tok = self.advance();
        match tok {
            Token::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Token::Float(x) => Ok(Expr::Literal(Value::Float(x))),
            Token::Str(mut s) => {
                // Adjacent literals concatenate.
                while let Token::Str(next) = self.peek() {
                    s.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::Literal(Value::Str(s)))
            }
            Token::Name(name) => Ok(Expr::Name(name)),
            Token::Keyword(Keyword::True) => Ok(Expr::Literal(Value::Bool(true))),
            Token::Keyword(Keyword::False) => Ok(Expr::Literal(Value::Bool(false))),
            Token::Keyword(Keyword::None) => Ok(Expr::Literal(Value::None)),
            Token::Op("(") => {
                if self.eat_op(")") {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let inner = self.parse_expr_list()?;
                self.expect_op(")")?;
                Ok(inner)
            }
            Token::Op("[") => self.parse_list_display(),
            Token::Op("{") => Err(self.error("dict and set displays are not supported")),
            other => {
                self.pos -= 1;
                Err(self.error(format!("unexpected {}", show(&other))))
            }
        }
    }

    fn parse_list_display(&mut self) -> Result<Expr> {
        if self.eat_op("]") {
            return Ok(Expr::List(Vec::new()));
        }
        let first = self.parse_test()?;
        if self.eat_kw(Keyword::For) {
            let target = self.parse_target_list()?;
            self.expect_kw(Keyword::In)?;
            let iter = self.parse_or()?;
            let cond = if self.eat_kw(Keyword::If) {
                Some(Box::new(self.parse_or()?))
            } else {
                None
            };
            self.expect_op("]")?;
            return Ok(Expr::ListComp {
                elem: Box::new(first),
                target: Box::new(target),
                iter: Box::new(iter),
                cond,
            });
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.at_op("]") {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect_op("]")?;
        Ok(Expr::List(items))
    }
}

pub(super) fn show(tok: &Token) -> String {
    match tok {
        Token::Int(n) => format!("number {n}"),
        Token::Float(x) => format!("number {x}"),
        Token::Str(_) => "string literal".into(),
        Token::Name(n) => format!("name '{n}'"),
        Token::Keyword(Keyword::Unsupported(k)) => format!("'{k}'"),
        Token::Keyword(k) => format!("keyword {k:?}"),
        Token::Op(op) => format!("'{op}'"),
        Token::Newline => "end of line".into(),
        Token::Indent => "unexpected indent".into(),
        Token::Dedent => "dedent".into(),
        Token::Eof => "end of code".into(),
    }
}

/// Parse a standalone expression.
pub fn parse_expr(src: &str) -> Result<Expr> {
    let mut parser = Parser::new(super::lexer::tokenize(src)?);
    let expr = parser.parse_expr_list()?;
    parser.eat_op(";");
    while matches!(parser.peek(), Token::Newline) {
        parser.advance();
    }
    if !matches!(parser.peek(), Token::Eof) {
        return Err(parser.error(format!("unexpected {}", show(parser.peek()))));
    }
    Ok(expr)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Expr {
        parse_expr(src).expect("parse failed")
    }

    #[test]
    fn precedence() {
        match parse("1 + 2 * 3") {
            Expr::Binary(BinOp::Add, _, rhs) => {
                assert!(matches!(*rhs, Expr::Binary(BinOp::Mul, _, _)))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        match parse("-2 ** 2") {
            Expr::Unary(UnaryOp::Neg, inner) => {
                assert!(matches!(*inner, Expr::Binary(BinOp::Pow, _, _)))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn chained_comparison() {
        match parse("a < b <= c") {
            Expr::Compare(_, ops) => {
                assert_eq!(ops.iter().map(|(op, _)| *op).collect::<Vec<_>>(), vec![CmpOp::Lt, CmpOp::Le])
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn not_in_and_is_not() {
        match parse("x not in y") {
            Expr::Compare(_, ops) => assert_eq!(ops[0].0, CmpOp::NotIn),
            other => panic!("unexpected {other:?}"),
        }
        match parse("x is not None") {
            Expr::Compare(_, ops) => assert_eq!(ops[0].0, CmpOp::IsNot),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn postfix_chain() {
        match parse("d.items[0](1)") {
            Expr::Call(callee, args) => {
                assert_eq!(args.len(), 1);
                assert!(matches!(*callee, Expr::Index(..)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn slices() {
        assert!(matches!(parse("s[1:]"), Expr::Slice { stop: None, step: None, .. }));
        assert!(matches!(parse("s[::-1]"), Expr::Slice { start: None, stop: None, step: Some(_), .. }));
        assert!(matches!(parse("s[2]"), Expr::Index(..)));
    }

    #[test]
    fn tuples_and_lists() {
        assert!(matches!(parse("()"), Expr::Tuple(ref v) if v.is_empty()));
        assert!(matches!(parse("(1,)"), Expr::Tuple(ref v) if v.len() == 1));
        assert!(matches!(parse("(1)"), Expr::Literal(Value::Int(1))));
        assert!(matches!(parse("1, 2"), Expr::Tuple(ref v) if v.len() == 2));
        assert!(matches!(parse("[1, 2,]"), Expr::List(ref v) if v.len() == 2));
        assert!(matches!(parse("[x for x in y if x]"), Expr::ListComp { cond: Some(_), .. }));
    }

    #[test]
    fn conditional_and_lambda() {
        assert!(matches!(parse("a if c else b"), Expr::IfElse { .. }));
        match parse("lambda v, n=1: v") {
            Expr::Lambda(def) => {
                assert_eq!(def.params.len(), 2);
                assert!(def.params[1].default.is_some());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn string_concatenation() {
        assert!(matches!(parse("'a' \"b\""), Expr::Literal(Value::Str(ref s)) if s == "ab"));
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(parse_expr("1 +").is_err());
        assert!(parse_expr("f(x=1)").is_err());
        assert!(parse_expr("{1: 2}").is_err());
        assert!(parse_expr("a b").is_err());
    }

    fn is_nesting_error(src: &str) -> bool {
        matches!(parse_expr(src), Err(Error::Parse { ref message, .. }) if message.contains("nested"))
    }

    #[test]
    fn deep_nesting_is_a_parse_error() {
        let parens = format!("{}1{}", "(".repeat(5000), ")".repeat(5000));
        assert!(is_nesting_error(&parens));
        assert!(is_nesting_error(&format!("{}1", "-".repeat(20000))));
        assert!(is_nesting_error(&format!("{}1", "not ".repeat(5000))));
        assert!(is_nesting_error(&format!("1{}", " + 1".repeat(5000))));
        assert!(is_nesting_error(&format!("f{}", "()".repeat(5000))));
        assert!(is_nesting_error(&format!("2{}", " ** 2".repeat(5000))));
    }

    #[test]
    fn moderate_nesting_still_parses() {
        let parens = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(parse(&parens), Expr::Literal(Value::Int(1))));
        assert!(parse_expr(&format!("1{}", " + 1".repeat(500))).is_ok());
        assert!(parse_expr(&format!("{}1", "-".repeat(500))).is_ok());
    }
}

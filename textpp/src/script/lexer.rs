//! Embedded-code lexer.
//!
//! Produces a flat token stream in which block structure is already resolved
//! into `Indent` / `Dedent` tokens, so the parser never looks at whitespace.
//! Newlines inside brackets and after a trailing backslash are joined.

use crate::error::{Error, Result};

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    False,
    None,
    True,
    And,
    As,
    Assert,
    Break,
    Continue,
    Def,
    Elif,
    Else,
    For,
    From,
    If,
    Import,
    In,
    Is,
    Lambda,
    Not,
    Or,
    Pass,
    Return,
    While,
    /// Reserved words the language recognises but does not implement.
    Unsupported(&'static str),
}

impl Keyword {
    fn from_ident(s: &str) -> Option<Keyword> {
        Some(match s {
            "False" => Keyword::False,
            "None" => Keyword::None,
            "True" => Keyword::True,
            "and" => Keyword::And,
            "as" => Keyword::As,
            "assert" => Keyword::Assert,
            "break" => Keyword::Break,
            "continue" => Keyword::Continue,
            "def" => Keyword::Def,
            "elif" => Keyword::Elif,
            "else" => Keyword::Else,
            "for" => Keyword::For,
            "from" => Keyword::From,
            "if" => Keyword::If,
            "import" => Keyword::Import,
            "in" => Keyword::In,
            "is" => Keyword::Is,
            "lambda" => Keyword::Lambda,
            "not" => Keyword::Not,
            "or" => Keyword::Or,
            "pass" => Keyword::Pass,
            "return" => Keyword::Return,
            "while" => Keyword::While,
            "async" => Keyword::Unsupported("async"),
            "await" => Keyword::Unsupported("await"),
            "class" => Keyword::Unsupported("class"),
            "del" => Keyword::Unsupported("del"),
            "except" => Keyword::Unsupported("except"),
            "finally" => Keyword::Unsupported("finally"),
            "global" => Keyword::Unsupported("global"),
            "nonlocal" => Keyword::Unsupported("nonlocal"),
            "raise" => Keyword::Unsupported("raise"),
            "try" => Keyword::Unsupported("try"),
            "with" => Keyword::Unsupported("with"),
            "yield" => Keyword::Unsupported("yield"),
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Name(String),
    Keyword(Keyword),
    /// Operator or delimiter, e.g. `"+"`, `"//="`, `"("`.
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

/// A token plus the 1-based source line it started on.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

/// Longest operators first so that `//=` wins over `//` and `/`.
const OPERATORS: &[&str] = &[
    "//=", "**=", ">>=", "<<=", "**", "//", "==", "!=", "<=", ">=", "<<", ">>", "+=", "-=",
    "*=", "/=", "%=", "&=", "|=", "^=", "->", "+", "-", "*", "/", "%", "<", ">", "=", "(", ")",
    "[", "]", "{", "}", ",", ":", ".", ";", "&", "|", "^", "~", "@",
];

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer {
    src: Vec<char>,
    pos: usize,
    line: usize,
    indents: Vec<usize>,
    depth: usize,
    tokens: Vec<Spanned>,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer {
            src: src.chars().collect(),
            pos: 0,
            line: 1,
            indents: vec![0],
            depth: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.pos += 1;
            if c == '\n' {
                self.line += 1;
            }
        }
        c
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn push(&mut self, token: Token, line: usize) {
        self.tokens.push(Spanned { token, line });
    }

    fn last_is_newline(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| &t.token),
            None | Some(Token::Newline) | Some(Token::Indent) | Some(Token::Dedent)
        )
    }

    fn skip_comment(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.pos += 1;
        }
    }

    /// Measure the indentation of a logical line start and emit block tokens.
    /// Returns `false` for blank and comment-only lines, which are skipped.
    fn handle_line_start(&mut self) -> Result<bool> {
        let mut width = 0;
        while let Some(c) = self.peek() {
            match c {
                ' ' => width += 1,
                '\t' => width = (width / 8 + 1) * 8,
                '\x0c' => width = 0,
                _ => break,
            }
            self.pos += 1;
        }
        match self.peek() {
            None => return Ok(false),
            Some('#') => {
                self.skip_comment();
                self.advance();
                return Ok(false);
            }
            Some('\n') => {
                self.advance();
                return Ok(false);
            }
            Some('\r') if self.peek_at(1) == Some('\n') => {
                self.pos += 1;
                self.advance();
                return Ok(false);
            }
            _ => {}
        }

        let current = *self.indents.last().unwrap_or(&0);
        if width > current {
            self.indents.push(width);
            self.push(Token::Indent, self.line);
        } else if width < current {
            while width < *self.indents.last().unwrap_or(&0) {
                self.indents.pop();
                self.push(Token::Dedent, self.line);
            }
            if width != *self.indents.last().unwrap_or(&0) {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(true)
    }

    fn run(mut self) -> Result<Vec<Spanned>> {
        let mut at_line_start = true;
        loop {
            if at_line_start && self.depth == 0 {
                if self.peek().is_none() {
                    break;
                }
                if !self.handle_line_start()? {
                    continue;
                }
                at_line_start = false;
            }

            let line = self.line;
            let Some(c) = self.peek() else { break };
            match c {
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.pos += 1;
                }
                '#' => self.skip_comment(),
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.pos += 1;
                    self.advance();
                }
                '\\' if self.peek_at(1) == Some('\r') && self.peek_at(2) == Some('\n') => {
                    self.pos += 2;
                    self.advance();
                }
                '\n' => {
                    self.advance();
                    if self.depth == 0 {
                        self.push(Token::Newline, line);
                        at_line_start = true;
                    }
                }
                '0'..='9' => {
                    let tok = self.read_number()?;
                    self.push(tok, line);
                }
                '.' if matches!(self.peek_at(1), Some('0'..='9')) => {
                    let tok = self.read_number()?;
                    self.push(tok, line);
                }
                '"' | '\'' => {
                    let s = self.read_string(false)?;
                    self.push(Token::Str(s), line);
                }
                'r' | 'R' if matches!(self.peek_at(1), Some('"' | '\'')) => {
                    self.pos += 1;
                    let s = self.read_string(true)?;
                    self.push(Token::Str(s), line);
                }
                c if c.is_alphabetic() || c == '_' => {
                    let start = self.pos;
                    while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
                        self.pos += 1;
                    }
                    let ident: String = self.src[start..self.pos].iter().collect();
                    let tok = match Keyword::from_ident(&ident) {
                        Some(kw) => Token::Keyword(kw),
                        None => Token::Name(ident),
                    };
                    self.push(tok, line);
                }
                _ => {
                    let op = OPERATORS
                        .iter()
                        .find(|op| {
                            op.chars()
                                .enumerate()
                                .all(|(i, oc)| self.peek_at(i) == Some(oc))
                        })
                        .copied()
                        .ok_or_else(|| self.error(format!("invalid character {c:?}")))?;
                    self.pos += op.chars().count();
                    match op {
                        "(" | "[" | "{" => self.depth += 1,
                        ")" | "]" | "}" => {
                            self.depth = self
                                .depth
                                .checked_sub(1)
                                .ok_or_else(|| self.error(format!("unmatched '{op}'")))?;
                        }
                        _ => {}
                    }
                    self.push(Token::Op(op), line);
                }
            }
        }

        if self.depth > 0 {
            return Err(self.error("unexpected end of code inside brackets"));
        }
        if !self.last_is_newline() {
            self.push(Token::Newline, self.line);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(Token::Dedent, self.line);
        }
        self.push(Token::Eof, self.line);
        Ok(self.tokens)
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.pos;
        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x' | 'X') => Some(16),
                Some('o' | 'O') => Some(8),
                Some('b' | 'B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits_start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_digit(radix) || c == '_') {
                    self.pos += 1;
                }
                let digits: String = self.src[digits_start..self.pos]
                    .iter()
                    .filter(|&&c| c != '_')
                    .collect();
                return i64::from_str_radix(&digits, radix)
                    .map(Token::Int)
                    .map_err(|_| self.error("invalid integer literal"));
            }
        }

        let mut is_float = false;
        while matches!(self.peek(), Some('0'..='9' | '_')) {
            self.pos += 1;
        }
        if self.peek() == Some('.') {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some('0'..='9' | '_')) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some('e' | 'E'))
            && (matches!(self.peek_at(1), Some('0'..='9'))
                || (matches!(self.peek_at(1), Some('+' | '-'))
                    && matches!(self.peek_at(2), Some('0'..='9'))))
        {
            is_float = true;
            self.pos += 2;
            while matches!(self.peek(), Some('0'..='9')) {
                self.pos += 1;
            }
        }
        let text: String = self.src[start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();
        if is_float {
            text.parse()
                .map(Token::Float)
                .map_err(|_| self.error(format!("invalid float literal {text:?}")))
        } else {
            text.parse()
                .map(Token::Int)
                .map_err(|_| self.error(format!("integer literal too large: {text}")))
        }
    }

    fn read_string(&mut self, raw: bool) -> Result<String> {
        let quote = self.advance().unwrap_or('"');
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.pos += 2;
        }
        let mut s = String::new();
        loop {
            if !triple && self.peek() == Some('\n') {
                return Err(self.error("unterminated string literal"));
            }
            let Some(c) = self.advance() else {
                return Err(self.error("unterminated string literal"));
            };
            match c {
                c if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                        self.pos += 2;
                        break;
                    }
                    s.push(c);
                }
                '\\' if raw => {
                    s.push('\\');
                    if let Some(next) = self.advance() {
                        s.push(next);
                    }
                }
                '\\' => self.read_escape(&mut s)?,
                c => s.push(c),
            }
        }
        Ok(s)
    }

    fn read_escape(&mut self, s: &mut String) -> Result<()> {
        let Some(c) = self.advance() else {
            return Err(self.error("unterminated string literal"));
        };
        match c {
            '\n' => {}
            'n' => s.push('\n'),
            't' => s.push('\t'),
            'r' => s.push('\r'),
            '0' => s.push('\0'),
            '\\' => s.push('\\'),
            '\'' => s.push('\''),
            '"' => s.push('"'),
            'x' | 'u' => {
                let len = if c == 'x' { 2 } else { 4 };
                let hex: String = (0..len).filter_map(|_| self.advance()).collect();
                let ch = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| self.error(format!("invalid \\{c} escape")))?;
                s.push(ch);
            }
            other => {
                s.push('\\');
                s.push(other);
            }
        }
        Ok(())
    }
}

/// Tokenize embedded code.
pub fn tokenize(src: &str) -> Result<Vec<Spanned>> {
    Lexer::new(src).run()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<Token> {
        tokenize(src)
            .expect("tokenize failed")
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn simple_call() {
        assert_eq!(
            tokens("out(\"x\")\n"),
            vec![
                Token::Name("out".into()),
                Token::Op("("),
                Token::Str("x".into()),
                Token::Op(")"),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn indentation_produces_block_tokens() {
        let toks = tokens("if x:\n    y\nz\n");
        assert_eq!(
            toks,
            vec![
                Token::Keyword(Keyword::If),
                Token::Name("x".into()),
                Token::Op(":"),
                Token::Newline,
                Token::Indent,
                Token::Name("y".into()),
                Token::Newline,
                Token::Dedent,
                Token::Name("z".into()),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn missing_final_newline_still_closes_blocks() {
        let toks = tokens("while 1:\n  pass");
        assert_eq!(&toks[toks.len() - 3..], &[Token::Newline, Token::Dedent, Token::Eof]);
    }

    #[test]
    fn brackets_join_lines() {
        let toks = tokens("f(1,\n  2)\n");
        assert!(!toks[..toks.len() - 2].contains(&Token::Newline));
    }

    #[test]
    fn blank_and_comment_lines_are_ignored() {
        assert_eq!(tokens("\n# c\n   \nx\n"), vec![Token::Name("x".into()), Token::Newline, Token::Eof]);
    }

    #[test]
    fn numbers() {
        assert_eq!(tokens("0xff")[0], Token::Int(255));
        assert_eq!(tokens("1_000")[0], Token::Int(1000));
        assert_eq!(tokens("2.5")[0], Token::Float(2.5));
        assert_eq!(tokens("1e3")[0], Token::Float(1000.0));
        assert_eq!(tokens(".5")[0], Token::Float(0.5));
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(tokens(r#""a\tb""#)[0], Token::Str("a\tb".into()));
        assert_eq!(tokens(r#"r"a\tb""#)[0], Token::Str("a\\tb".into()));
        assert_eq!(tokens("'''x\ny'''")[0], Token::Str("x\ny".into()));
        assert_eq!(tokens(r#""\x41\u00e9""#)[0], Token::Str("Aé".into()));
    }

    #[test]
    fn longest_operator_wins() {
        assert_eq!(tokens("a //= 2")[1], Token::Op("//="));
        assert_eq!(tokens("a ** 2")[1], Token::Op("**"));
    }

    #[test]
    fn errors_report_line() {
        match tokenize("x = 1\ny = 'open\n") {
            Err(Error::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!(tokenize("if x:\n    a\n  b\n").is_err());
        assert!(tokenize("f(1\n").is_err());
        assert!(tokenize("x = $\n").is_err());
    }
}

use super::ast::{BinaryOp, CompareOp, Expr, Program, Statement, Stmt, UnaryOp};
use super::{Result, ScriptError};

const KEYWORDS: &[&str] = &[
    "if", "elif", "else", "while", "for", "in", "break", "continue", "pass", "import", "and",
    "or", "not", "True", "False", "None",
];

/// Parse guest source text into a [`Program`].
pub fn parse_program(name: &str, source: &str) -> Result<Program> {
    let tokens = Lexer::new(source).tokenize()?;
    let mut parser = Parser { tokens, index: 0 };
    let mut body = Vec::new();
    while !parser.at_eof() {
        parser.parse_statement_into(&mut body)?;
    }
    Ok(Program::new(name, source, body))
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Name(String),
    Integer(i64),
    Float(f64),
    String(String),
    Op(&'static str),
    Newline,
    Indent,
    Dedent,
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    line: usize,
}

const TWO_CHAR_OPS: &[&str] = &["==", "!=", "<=", ">=", "//", "+=", "-=", "*=", "/="];
const ONE_CHAR_OPS: &[&str] = &[
    "+", "-", "*", "/", "%", "<", ">", "=", "(", ")", "[", "]", ",", ".", ":", ";",
];

struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    index: usize,
    line: usize,
    indents: Vec<usize>,
    depth: usize,
    at_line_start: bool,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            index: 0,
            line: 1,
            indents: vec![0],
            depth: 0,
            at_line_start: true,
            tokens: Vec::new(),
        }
    }

    fn eof(&self) -> bool {
        self.index >= self.bytes.len()
    }

    fn current(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek_byte(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn current_char(&self) -> Option<char> {
        self.src[self.index..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.index += ch.len_utf8();
        }
    }

    fn push(&mut self, kind: TokenKind) {
        self.tokens.push(Token {
            kind,
            line: self.line,
        });
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        while !self.eof() {
            if self.at_line_start {
                self.at_line_start = false;
                self.measure_indent()?;
                continue;
            }

            let Some(ch) = self.current() else {
                break;
            };
            match ch {
                b'\n' => {
                    self.advance();
                    self.end_line();
                }
                b' ' | b'\t' | b'\r' => self.advance(),
                b'#' => {
                    while let Some(ch) = self.current() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                b'\\' if self.peek_byte() == Some(b'\n') => {
                    self.index += 2;
                    self.line += 1;
                }
                b'"' | b'\'' => self.lex_string(ch)?,
                b'0'..=b'9' => self.lex_number()?,
                c if c == b'_' || c.is_ascii_alphabetic() => self.lex_name(),
                _ => self.lex_operator()?,
            }
        }

        if !matches!(
            self.tokens.last().map(|token| &token.kind),
            None | Some(TokenKind::Newline)
        ) {
            self.push(TokenKind::Newline);
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent);
        }
        self.push(TokenKind::Eof);
        Ok(self.tokens)
    }

    fn end_line(&mut self) {
        if self.depth == 0 {
            if !matches!(
                self.tokens.last().map(|token| &token.kind),
                None | Some(TokenKind::Newline)
            ) {
                self.tokens.push(Token {
                    kind: TokenKind::Newline,
                    line: self.line,
                });
            }
            self.at_line_start = true;
        }
        self.line += 1;
    }

    fn measure_indent(&mut self) -> Result<()> {
        let mut width = 0;
        while let Some(ch) = self.current() {
            match ch {
                b' ' => width += 1,
                b'\t' => width += 4,
                _ => break,
            }
            self.advance();
        }

        // Blank and comment-only lines never affect indentation.
        if matches!(self.current(), None | Some(b'\n') | Some(b'\r') | Some(b'#')) {
            return Ok(());
        }

        let top = self.indents.last().copied().unwrap_or(0);
        if width > top {
            self.indents.push(width);
            self.push(TokenKind::Indent);
        } else if width < top {
            while self.indents.last().is_some_and(|&level| level > width) {
                self.indents.pop();
                self.push(TokenKind::Dedent);
            }
            if self.indents.last().copied().unwrap_or(0) != width {
                return Err(self.error("unindent does not match any outer indentation level"));
            }
        }
        Ok(())
    }

    fn lex_string(&mut self, quote: u8) -> Result<()> {
        self.advance();
        let mut buf = String::new();
        while let Some(ch) = self.current_char() {
            self.advance();
            match ch {
                c if c as u32 == quote as u32 => {
                    self.push(TokenKind::String(buf));
                    return Ok(());
                }
                '\n' => break,
                '\\' => {
                    let escaped = self
                        .current_char()
                        .ok_or_else(|| self.error("incomplete escape"))?;
                    self.advance();
                    let value = match escaped {
                        '"' => '"',
                        '\'' => '\'',
                        '\\' => '\\',
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        '0' => '\0',
                        other => {
                            return Err(self.error(&format!("unknown escape: \\{}", other)));
                        }
                    };
                    buf.push(value);
                }
                other => buf.push(other),
            }
        }
        Err(self.error("unterminated string literal"))
    }

    fn lex_number(&mut self) -> Result<()> {
        let start = self.index;
        while self.current().is_some_and(|ch| ch.is_ascii_digit()) {
            self.advance();
        }

        let mut is_float = false;
        if self.current() == Some(b'.') && self.peek_byte().is_some_and(|ch| ch.is_ascii_digit()) {
            is_float = true;
            self.advance();
            while self.current().is_some_and(|ch| ch.is_ascii_digit()) {
                self.advance();
            }
        }

        let text = &self.src[start..self.index];
        let kind = if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error("invalid float literal"))?
        } else {
            text.parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|_| self.error("integer literal too large"))?
        };
        self.push(kind);
        Ok(())
    }

    fn lex_name(&mut self) {
        let start = self.index;
        while self
            .current()
            .is_some_and(|ch| ch == b'_' || ch.is_ascii_alphanumeric())
        {
            self.advance();
        }
        let text = self.src[start..self.index].to_string();
        self.push(TokenKind::Name(text));
    }

    fn lex_operator(&mut self) -> Result<()> {
        let rest = &self.src[self.index..];
        if let Some(op) = TWO_CHAR_OPS.iter().find(|op| rest.starts_with(**op)) {
            self.index += 2;
            self.push(TokenKind::Op(op));
            return Ok(());
        }
        if let Some(op) = ONE_CHAR_OPS.iter().find(|op| rest.starts_with(**op)) {
            self.index += 1;
            match *op {
                "(" | "[" => self.depth += 1,
                ")" | "]" => self.depth = self.depth.saturating_sub(1),
                _ => {}
            }
            self.push(TokenKind::Op(op));
            return Ok(());
        }
        let ch = self.current_char().unwrap_or('\0');
        Err(self.error(&format!("unexpected character '{}'", ch)))
    }

    fn error(&self, message: &str) -> ScriptError {
        ScriptError::Syntax(format!("{} on line {}", message, self.line))
    }
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.index)
            .map(|token| &token.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.index + offset)
            .map(|token| &token.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.index)
            .or_else(|| self.tokens.last())
            .map(|token| token.line)
            .unwrap_or(1)
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), TokenKind::Eof)
    }

    fn advance(&mut self) -> TokenKind {
        let kind = self.peek().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        kind
    }

    fn is_op(&self, op: &str) -> bool {
        matches!(self.peek(), TokenKind::Op(current) if *current == op)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if self.is_op(op) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, op: &str) -> Result<()> {
        if self.eat_op(op) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", op)))
        }
    }

    fn is_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), TokenKind::Name(name) if name == keyword)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.is_keyword(keyword) {
            self.index += 1;
            true
        } else {
            false
        }
    }

    fn expect_name(&mut self) -> Result<String> {
        match self.peek() {
            TokenKind::Name(name) if !KEYWORDS.contains(&name.as_str()) => {
                let name = name.clone();
                self.index += 1;
                Ok(name)
            }
            _ => Err(self.error("expected a name")),
        }
    }

    fn parse_statement_into(&mut self, out: &mut Vec<Statement>) -> Result<()> {
        while matches!(self.peek(), TokenKind::Newline) {
            self.index += 1;
        }
        let line = self.line();
        match self.peek() {
            TokenKind::Eof => Ok(()),
            TokenKind::Indent => Err(self.error("unexpected indent")),
            TokenKind::Dedent => {
                self.index += 1;
                Ok(())
            }
            TokenKind::Name(name) if name == "if" => {
                let stmt = self.parse_if()?;
                out.push(Statement::new(line, stmt));
                Ok(())
            }
            TokenKind::Name(name) if name == "while" => {
                self.index += 1;
                let condition = self.parse_expr()?;
                self.expect_op(":")?;
                let body = self.parse_block()?;
                out.push(Statement::new(line, Stmt::While { condition, body }));
                Ok(())
            }
            TokenKind::Name(name) if name == "for" => {
                self.index += 1;
                let target = self.expect_name()?;
                if !self.eat_keyword("in") {
                    return Err(self.error("expected 'in'"));
                }
                let iterable = self.parse_expr()?;
                self.expect_op(":")?;
                let body = self.parse_block()?;
                out.push(Statement::new(
                    line,
                    Stmt::For {
                        target,
                        iterable,
                        body,
                    },
                ));
                Ok(())
            }
            _ => self.parse_simple_line(out),
        }
    }

    fn parse_if(&mut self) -> Result<Stmt> {
        // consume 'if'
        self.index += 1;
        let mut branches = Vec::new();
        let condition = self.parse_expr()?;
        self.expect_op(":")?;
        branches.push((condition, self.parse_block()?));

        let mut otherwise = None;
        loop {
            if self.eat_keyword("elif") {
                let condition = self.parse_expr()?;
                self.expect_op(":")?;
                branches.push((condition, self.parse_block()?));
            } else if self.eat_keyword("else") {
                self.expect_op(":")?;
                otherwise = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If {
            branches,
            otherwise,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>> {
        let mut body = Vec::new();
        if !matches!(self.peek(), TokenKind::Newline) {
            self.parse_simple_line(&mut body)?;
            return Ok(body);
        }
        self.index += 1;
        if !matches!(self.peek(), TokenKind::Indent) {
            return Err(self.error("expected an indented block"));
        }
        self.index += 1;
        while !matches!(self.peek(), TokenKind::Dedent | TokenKind::Eof) {
            self.parse_statement_into(&mut body)?;
        }
        if matches!(self.peek(), TokenKind::Dedent) {
            self.index += 1;
        }
        Ok(body)
    }

    fn parse_simple_line(&mut self, out: &mut Vec<Statement>) -> Result<()> {
        loop {
            let line = self.line();
            let stmt = self.parse_simple()?;
            out.push(Statement::new(line, stmt));
            if self.eat_op(";") {
                if matches!(self.peek(), TokenKind::Newline | TokenKind::Eof) {
                    break;
                }
                continue;
            }
            break;
        }
        match self.peek() {
            TokenKind::Newline => {
                self.index += 1;
                Ok(())
            }
            TokenKind::Eof | TokenKind::Dedent => Ok(()),
            _ => Err(self.error("invalid syntax")),
        }
    }

    fn parse_simple(&mut self) -> Result<Stmt> {
        if self.eat_keyword("pass") {
            return Ok(Stmt::Pass);
        }
        if self.eat_keyword("break") {
            return Ok(Stmt::Break);
        }
        if self.eat_keyword("continue") {
            return Ok(Stmt::Continue);
        }
        if self.eat_keyword("import") {
            return Ok(Stmt::Import(self.expect_name()?));
        }

        if let TokenKind::Name(name) = self.peek() {
            if !KEYWORDS.contains(&name.as_str()) {
                let target = name.clone();
                let augmented = match self.peek_at(1) {
                    TokenKind::Op("=") => Some(None),
                    TokenKind::Op("+=") => Some(Some(BinaryOp::Add)),
                    TokenKind::Op("-=") => Some(Some(BinaryOp::Sub)),
                    TokenKind::Op("*=") => Some(Some(BinaryOp::Mul)),
                    TokenKind::Op("/=") => Some(Some(BinaryOp::Div)),
                    _ => None,
                };
                if let Some(op) = augmented {
                    self.index += 2;
                    let rhs = self.parse_expr()?;
                    let value = match op {
                        None => rhs,
                        Some(op) => Expr::Binary {
                            op,
                            left: Box::new(Expr::Name(target.clone())),
                            right: Box::new(rhs),
                        },
                    };
                    return Ok(Stmt::Assign { target, value });
                }
            }
        }

        Ok(Stmt::Expr(self.parse_expr()?))
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat_keyword("or") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_not()?;
        while self.eat_keyword("and") {
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr> {
        if self.eat_keyword("not") {
            let operand = self.parse_not()?;
            return Ok(Expr::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        self.parse_comparison()
    }

    fn comparison_op(&self) -> Option<CompareOp> {
        match self.peek() {
            TokenKind::Op("==") => Some(CompareOp::Eq),
            TokenKind::Op("!=") => Some(CompareOp::Ne),
            TokenKind::Op("<") => Some(CompareOp::Lt),
            TokenKind::Op("<=") => Some(CompareOp::Le),
            TokenKind::Op(">") => Some(CompareOp::Gt),
            TokenKind::Op(">=") => Some(CompareOp::Ge),
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_additive()?;
        let Some(op) = self.comparison_op() else {
            return Ok(left);
        };
        self.index += 1;
        let right = self.parse_additive()?;
        if self.comparison_op().is_some() {
            return Err(self.error("chained comparisons are not supported"));
        }
        Ok(Expr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Op("+") => BinaryOp::Add,
                TokenKind::Op("-") => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.index += 1;
            let right = self.parse_term()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Op("*") => BinaryOp::Mul,
                TokenKind::Op("/") => BinaryOp::Div,
                TokenKind::Op("//") => BinaryOp::FloorDiv,
                TokenKind::Op("%") => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.index += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let op = match self.peek() {
            TokenKind::Op("-") => UnaryOp::Negate,
            TokenKind::Op("+") => UnaryOp::Plus,
            _ => return self.parse_postfix(),
        };
        self.index += 1;
        let operand = self.parse_unary()?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr> {
        let mut expr = self.parse_atom()?;
        loop {
            if self.eat_op("(") {
                let args = self.parse_sequence(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                };
            } else if self.eat_op("[") {
                let index = self.parse_expr()?;
                self.expect_op("]")?;
                expr = Expr::Index {
                    value: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat_op(".") {
                let name = self.expect_name()?;
                expr = Expr::Attribute {
                    value: Box::new(expr),
                    name,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_sequence(&mut self, close: &str) -> Result<Vec<Expr>> {
        let mut items = Vec::new();
        while !self.is_op(close) {
            items.push(self.parse_expr()?);
            if !self.eat_op(",") {
                break;
            }
        }
        self.expect_op(close)?;
        Ok(items)
    }

    fn parse_atom(&mut self) -> Result<Expr> {
        match self.advance() {
            TokenKind::Integer(value) => Ok(Expr::Integer(value)),
            TokenKind::Float(value) => Ok(Expr::Float(value)),
            TokenKind::String(text) => Ok(Expr::String(text)),
            TokenKind::Name(name) => match name.as_str() {
                "True" => Ok(Expr::Boolean(true)),
                "False" => Ok(Expr::Boolean(false)),
                "None" => Ok(Expr::None),
                keyword if KEYWORDS.contains(&keyword) => {
                    self.index -= 1;
                    Err(self.error("invalid syntax"))
                }
                _ => Ok(Expr::Name(name)),
            },
            TokenKind::Op("(") => {
                let expr = self.parse_expr()?;
                self.expect_op(")")?;
                Ok(expr)
            }
            TokenKind::Op("[") => Ok(Expr::List(self.parse_sequence("]")?)),
            TokenKind::Eof => Err(self.error("unexpected end of input")),
            _ => {
                self.index -= 1;
                Err(self.error("invalid syntax"))
            }
        }
    }

    fn error(&self, message: &str) -> ScriptError {
        ScriptError::Syntax(format!("{} on line {}", message, self.line()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Program {
        parse_program("<stdin>", src).expect("parse")
    }

    #[test]
    fn parses_semicolon_separated_statements() {
        let program = parse("sleep(1); print(\"done\")");
        assert_eq!(program.body.len(), 2);
        assert!(matches!(program.body[0].kind, Stmt::Expr(Expr::Call { .. })));
        assert_eq!(program.body[1].line, 1);
    }

    #[test]
    fn parses_assignment_from_call() {
        let program = parse("x = input(\"name? \")\nprint(x)\n");
        match &program.body[0].kind {
            Stmt::Assign { target, value } => {
                assert_eq!(target, "x");
                assert!(matches!(value, Expr::Call { .. }));
            }
            other => panic!("expected assignment, got {:?}", other),
        }
        assert_eq!(program.body[1].line, 2);
    }

    #[test]
    fn parses_indented_blocks() {
        let src = "i = 0\nwhile i < 3:\n    if i == 1:\n        pass\n    else:\n        print(i)\n    i += 1\nprint('end')\n";
        let program = parse(src);
        assert_eq!(program.body.len(), 3);
        match &program.body[1].kind {
            Stmt::While { body, .. } => assert_eq!(body.len(), 2),
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn parses_elif_chain_and_inline_body() {
        let src = "if a: x = 1\nelif b: x = 2\nelse: x = 3\n";
        let program = parse(src);
        match &program.body[0].kind {
            Stmt::If {
                branches,
                otherwise,
            } => {
                assert_eq!(branches.len(), 2);
                assert!(otherwise.is_some());
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn ignores_comments_blank_lines_and_bracket_newlines() {
        let src = "# heading\n\nitems = [1,\n   2, 3]  # trailing\n\nfor item in items:\n    print(item)\n";
        let program = parse(src);
        assert_eq!(program.body.len(), 2);
    }

    #[test]
    fn rejects_unexpected_indent() {
        let err = parse_program("<stdin>", "x = 1\n    y = 2\n").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax(msg) if msg.contains("unexpected indent")));
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = parse_program("<stdin>", "print(\"oops)\n").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax(msg) if msg.contains("unterminated")));
    }

    #[test]
    fn rejects_inconsistent_dedent() {
        let err = parse_program("<stdin>", "if x:\n    a = 1\n  b = 2\n").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax(msg) if msg.contains("unindent")));
    }

    #[test]
    fn parses_module_attribute_calls() {
        let program = parse("import random\nn = random.randint(1, 6)\n");
        assert!(matches!(&program.body[0].kind, Stmt::Import(name) if name == "random"));
        match &program.body[1].kind {
            Stmt::Assign { value: Expr::Call { callee, args }, .. } => {
                assert!(matches!(callee.as_ref(), Expr::Attribute { name, .. } if name == "randint"));
                assert_eq!(args.len(), 2);
            }
            other => panic!("expected call assignment, got {:?}", other),
        }
    }
}

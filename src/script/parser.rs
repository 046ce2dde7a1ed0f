//! Recursive-descent parser for the script dialect.

use std::rc::Rc;

use super::ast::*;
use super::error::{Pos, ScriptError};
use super::lexer::{tokenize, Lexeme, Token};

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parse a whole script into statements.
pub fn parse(source: &str) -> Result<Vec<Stmt>, ScriptError> {
    let mut parser = Parser::new(tokenize(source)?);
    parser.file()
}

/// Parse a single expression, allowing surrounding whitespace and newlines.
pub fn parse_expr(source: &str) -> Result<Expr, ScriptError> {
    let mut parser = Parser::new(tokenize(source)?);
    parser.skip_newlines();
    let expr = parser.test_list()?;
    parser.skip_newlines();
    parser.expect(Token::Eof)?;
    Ok(expr)
}

// ============================================================================
// PARSER
// ============================================================================

struct Parser {
    tokens: Vec<Lexeme>,
    cursor: usize,
    function_depth: usize,
    loop_depth: usize,
}

type PResult<T> = Result<T, ScriptError>;

impl Parser {
    fn new(tokens: Vec<Lexeme>) -> Self {
        Self {
            tokens,
            cursor: 0,
            function_depth: 0,
            loop_depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    fn peek_at(&self, ahead: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.cursor + ahead).min(last)].token
    }

    fn pos(&self) -> Pos {
        let last = self.tokens.len() - 1;
        self.tokens[self.cursor.min(last)].pos
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> PResult<()> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.unexpected(&token.describe()))
        }
    }

    fn unexpected(&self, wanted: &str) -> ScriptError {
        ScriptError::at(
            format!("got {}, want {}", self.peek().describe(), wanted),
            self.pos(),
        )
    }

    fn expect_name(&mut self) -> PResult<String> {
        match self.peek().clone() {
            Token::Name(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(&Token::Newline) {}
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn file(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_newlines();
            if *self.peek() == Token::Eof {
                return Ok(stmts);
            }
            self.statement(&mut stmts)?;
        }
    }

    fn statement(&mut self, out: &mut Vec<Stmt>) -> PResult<()> {
        match self.peek() {
            Token::Def => {
                let stmt = self.def_stmt()?;
                out.push(stmt);
                Ok(())
            }
            Token::If => {
                let stmt = self.if_stmt()?;
                out.push(stmt);
                Ok(())
            }
            Token::For => {
                let stmt = self.for_stmt()?;
                out.push(stmt);
                Ok(())
            }
            Token::Indent => Err(ScriptError::at("unexpected indent", self.pos())),
            _ => self.simple_stmt(out),
        }
    }

    fn simple_stmt(&mut self, out: &mut Vec<Stmt>) -> PResult<()> {
        loop {
            out.push(self.small_stmt()?);
            if !self.eat(&Token::Semicolon) {
                break;
            }
            if matches!(self.peek(), Token::Newline | Token::Eof) {
                break;
            }
        }
        if *self.peek() == Token::Eof {
            return Ok(());
        }
        self.expect(Token::Newline)
    }

    fn small_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos();
        let kind = match self.peek().clone() {
            Token::Return => {
                self.advance();
                if self.function_depth == 0 {
                    return Err(ScriptError::at("return statement not within a function", pos));
                }
                if matches!(self.peek(), Token::Newline | Token::Semicolon | Token::Eof) {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.test_list()?))
                }
            }
            Token::Pass => {
                self.advance();
                StmtKind::Pass
            }
            Token::Break | Token::Continue => {
                let token = self.advance();
                if self.loop_depth == 0 {
                    return Err(ScriptError::at(
                        format!("{} not in a loop", token.describe()),
                        pos,
                    ));
                }
                if token == Token::Break {
                    StmtKind::Break
                } else {
                    StmtKind::Continue
                }
            }
            Token::Name(name) if name == "load" && *self.peek_at(1) == Token::LParen => {
                self.load_stmt()?
            }
            _ => self.expr_stmt()?,
        };
        Ok(Stmt { kind, pos })
    }

    fn load_stmt(&mut self) -> PResult<StmtKind> {
        let pos = self.pos();
        self.advance();
        self.expect(Token::LParen)?;
        let module = match self.advance() {
            Token::Str(module) => module,
            _ => return Err(ScriptError::at("load: first argument must be a module name", pos)),
        };
        let mut bindings = Vec::new();
        while self.eat(&Token::Comma) {
            if *self.peek() == Token::RParen {
                break;
            }
            match self.advance() {
                Token::Str(name) => bindings.push((name.clone(), name)),
                Token::Name(local) => {
                    self.expect(Token::Eq)?;
                    match self.advance() {
                        Token::Str(exported) => bindings.push((local, exported)),
                        _ => return Err(ScriptError::at("load: alias must name a string", pos)),
                    }
                }
                _ => return Err(ScriptError::at("load: expected a name to import", pos)),
            }
        }
        self.expect(Token::RParen)?;
        if bindings.is_empty() {
            return Err(ScriptError::at("load statement must import at least 1 symbol", pos));
        }
        Ok(StmtKind::Load { module, bindings })
    }

    fn expr_stmt(&mut self) -> PResult<StmtKind> {
        let pos = self.pos();
        let lhs = self.test_list()?;
        let aug = match self.peek() {
            Token::PlusEq => Some(BinOp::Add),
            Token::MinusEq => Some(BinOp::Sub),
            Token::StarEq => Some(BinOp::Mul),
            Token::SlashEq => Some(BinOp::Div),
            Token::SlashSlashEq => Some(BinOp::FloorDiv),
            Token::PercentEq => Some(BinOp::Mod),
            _ => None,
        };
        if let Some(op) = aug {
            self.advance();
            let target = to_target(lhs)?;
            if matches!(target, Target::Tuple(_)) {
                return Err(ScriptError::at("invalid target for augmented assignment", pos));
            }
            let value = self.test()?;
            return Ok(StmtKind::AugAssign { target, op, value });
        }
        if self.eat(&Token::Eq) {
            let target = to_target(lhs)?;
            let value = self.test_list()?;
            return Ok(StmtKind::Assign { target, value });
        }
        Ok(StmtKind::Expr(lhs))
    }

    fn def_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos();
        self.expect(Token::Def)?;
        let name = self.expect_name()?;
        self.expect(Token::LParen)?;
        let (params, varargs, kwargs) = self.params(&Token::RParen)?;
        self.expect(Token::RParen)?;
        self.expect(Token::Colon)?;
        self.function_depth += 1;
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.suite();
        self.loop_depth = saved_loops;
        self.function_depth -= 1;
        Ok(Stmt {
            kind: StmtKind::Def(Rc::new(FunctionDef {
                name,
                params,
                varargs,
                kwargs,
                body: body?,
                pos,
            })),
            pos,
        })
    }

    /// Parameter list up to (not including) `close`.
    fn params(&mut self, close: &Token) -> PResult<(Vec<Param>, Option<String>, Option<String>)> {
        let mut params = Vec::new();
        let mut varargs = None;
        let mut kwargs = None;
        while self.peek() != close {
            if self.eat(&Token::StarStar) {
                kwargs = Some(self.expect_name()?);
            } else if self.eat(&Token::Star) {
                varargs = Some(self.expect_name()?);
            } else {
                let param = self.expect_name()?;
                let default = if self.eat(&Token::Eq) {
                    Some(self.test()?)
                } else {
                    if params.iter().any(|p: &Param| p.default.is_some()) {
                        return Err(ScriptError::at(
                            "required parameter may not follow optional",
                            self.pos(),
                        ));
                    }
                    None
                };
                params.push(Param {
                    name: param,
                    default,
                });
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        Ok((params, varargs, kwargs))
    }

    fn lambda(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        self.expect(Token::Lambda)?;
        let (params, varargs, kwargs) = self.params(&Token::Colon)?;
        self.expect(Token::Colon)?;
        let body = self.test()?;
        let body_pos = body.pos;
        Ok(Expr {
            kind: ExprKind::Lambda(Rc::new(FunctionDef {
                name: "lambda".to_string(),
                params,
                varargs,
                kwargs,
                body: vec![Stmt {
                    kind: StmtKind::Return(Some(body)),
                    pos: body_pos,
                }],
                pos,
            })),
            pos,
        })
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos();
        self.expect(Token::If)?;
        let mut branches = Vec::new();
        let cond = self.test()?;
        self.expect(Token::Colon)?;
        branches.push((cond, self.suite()?));
        let mut otherwise = Vec::new();
        loop {
            if self.eat(&Token::Elif) {
                let cond = self.test()?;
                self.expect(Token::Colon)?;
                branches.push((cond, self.suite()?));
                continue;
            }
            if self.eat(&Token::Else) {
                self.expect(Token::Colon)?;
                otherwise = self.suite()?;
            }
            break;
        }
        Ok(Stmt {
            kind: StmtKind::If {
                branches,
                otherwise,
            },
            pos,
        })
    }

    fn for_stmt(&mut self) -> PResult<Stmt> {
        let pos = self.pos();
        self.expect(Token::For)?;
        let target = self.loop_target()?;
        self.expect(Token::In)?;
        let iter = self.test_list()?;
        self.expect(Token::Colon)?;
        self.loop_depth += 1;
        let body = self.suite();
        self.loop_depth -= 1;
        Ok(Stmt {
            kind: StmtKind::For {
                target,
                iter,
                body: body?,
            },
            pos,
        })
    }

    fn loop_target(&mut self) -> PResult<Target> {
        let pos = self.pos();
        let mut items = vec![self.primary()?];
        while self.eat(&Token::Comma) {
            if *self.peek() == Token::In {
                break;
            }
            items.push(self.primary()?);
        }
        let expr = if items.len() == 1 {
            items.remove(0)
        } else {
            Expr {
                kind: ExprKind::Tuple(items),
                pos,
            }
        };
        to_target(expr)
    }

    fn suite(&mut self) -> PResult<Vec<Stmt>> {
        let mut body = Vec::new();
        if !self.eat(&Token::Newline) {
            self.simple_stmt(&mut body)?;
            return Ok(body);
        }
        self.skip_newlines();
        self.expect(Token::Indent)?;
        loop {
            self.skip_newlines();
            if self.eat(&Token::Dedent) || *self.peek() == Token::Eof {
                return Ok(body);
            }
            self.statement(&mut body)?;
        }
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn test_list(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        let first = self.test()?;
        if *self.peek() != Token::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if !self.starts_expr() {
                break;
            }
            items.push(self.test()?);
        }
        Ok(Expr {
            kind: ExprKind::Tuple(items),
            pos,
        })
    }

    fn starts_expr(&self) -> bool {
        !matches!(
            self.peek(),
            Token::Newline
                | Token::Eof
                | Token::Eq
                | Token::RParen
                | Token::RBracket
                | Token::RBrace
                | Token::Colon
                | Token::Semicolon
                | Token::In
                | Token::Dedent
                | Token::Indent
        )
    }

    fn test(&mut self) -> PResult<Expr> {
        if *self.peek() == Token::Lambda {
            return self.lambda();
        }
        let pos = self.pos();
        let value = self.or_expr()?;
        if *self.peek() == Token::If && self.inline_if_allowed() {
            self.advance();
            let cond = self.or_expr()?;
            self.expect(Token::Else)?;
            let otherwise = self.test()?;
            return Ok(Expr {
                kind: ExprKind::Cond {
                    cond: Box::new(cond),
                    then: Box::new(value),
                    otherwise: Box::new(otherwise),
                },
                pos,
            });
        }
        Ok(value)
    }

    /// Distinguishes `a if b else c` from a comprehension's `if` clause.
    fn inline_if_allowed(&self) -> bool {
        let mut depth = 0usize;
        let mut ahead = 1;
        loop {
            match self.peek_at(ahead) {
                Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
                Token::RParen | Token::RBracket | Token::RBrace => {
                    if depth == 0 {
                        return false;
                    }
                    depth -= 1;
                }
                Token::Else if depth == 0 => return true,
                Token::For | Token::If if depth == 0 => return false,
                Token::Newline | Token::Eof => return false,
                _ => {}
            }
            ahead += 1;
        }
    }

    fn or_expr(&mut self) -> PResult<Expr> {
        let mut lhs = self.and_expr()?;
        while *self.peek() == Token::Or {
            let pos = self.pos();
            self.advance();
            let rhs = self.and_expr()?;
            lhs = Expr {
                kind: ExprKind::Logical {
                    op: LogicalOp::Or,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                pos,
            };
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> PResult<Expr> {
        let mut lhs = self.not_expr()?;
        while *self.peek() == Token::And {
            let pos = self.pos();
            self.advance();
            let rhs = self.not_expr()?;
            lhs = Expr {
                kind: ExprKind::Logical {
                    op: LogicalOp::And,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                pos,
            };
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> PResult<Expr> {
        if *self.peek() == Token::Not {
            let pos = self.pos();
            self.advance();
            let operand = self.not_expr()?;
            return Ok(Expr {
                kind: ExprKind::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                pos,
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let lhs = self.arith()?;
        let pos = self.pos();
        let op = match self.peek() {
            Token::EqEq => BinOp::Eq,
            Token::NotEq => BinOp::NotEq,
            Token::Lt => BinOp::Lt,
            Token::LtEq => BinOp::LtEq,
            Token::Gt => BinOp::Gt,
            Token::GtEq => BinOp::GtEq,
            Token::In => BinOp::In,
            Token::Not if *self.peek_at(1) == Token::In => {
                self.advance();
                BinOp::NotIn
            }
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.arith()?;
        Ok(Expr {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            pos,
        })
    }

    fn arith(&mut self) -> PResult<Expr> {
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => return Ok(lhs),
            };
            let pos = self.pos();
            self.advance();
            let rhs = self.term()?;
            lhs = binary(op, lhs, rhs, pos);
        }
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::SlashSlash => BinOp::FloorDiv,
                Token::Percent => BinOp::Mod,
                _ => return Ok(lhs),
            };
            let pos = self.pos();
            self.advance();
            let rhs = self.unary()?;
            lhs = binary(op, lhs, rhs, pos);
        }
    }

    fn unary(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        let op = match self.peek() {
            Token::Minus => UnaryOp::Neg,
            Token::Plus => UnaryOp::Plus,
            _ => return self.primary(),
        };
        self.advance();
        let operand = self.unary()?;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            pos,
        })
    }

    fn primary(&mut self) -> PResult<Expr> {
        let mut expr = self.atom()?;
        loop {
            let pos = self.pos();
            match self.peek() {
                Token::LParen => {
                    self.advance();
                    let args = self.call_args()?;
                    expr = Expr {
                        kind: ExprKind::Call {
                            func: Box::new(expr),
                            args,
                        },
                        pos,
                    };
                }
                Token::Dot => {
                    self.advance();
                    let name = self.expect_name()?;
                    expr = Expr {
                        kind: ExprKind::Attr {
                            object: Box::new(expr),
                            name,
                        },
                        pos,
                    };
                }
                Token::LBracket => {
                    self.advance();
                    expr = self.subscript(expr, pos)?;
                }
                _ => return Ok(expr),
            }
        }
    }

    fn call_args(&mut self) -> PResult<Vec<Arg>> {
        let mut args = Vec::new();
        while *self.peek() != Token::RParen {
            if self.eat(&Token::StarStar) {
                args.push(Arg::StarStar(self.test()?));
            } else if self.eat(&Token::Star) {
                args.push(Arg::Star(self.test()?));
            } else if matches!(self.peek(), Token::Name(_)) && *self.peek_at(1) == Token::Eq {
                let name = self.expect_name()?;
                self.advance();
                args.push(Arg::Keyword(name, self.test()?));
            } else {
                args.push(Arg::Positional(self.test()?));
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        Ok(args)
    }

    fn subscript(&mut self, object: Expr, pos: Pos) -> PResult<Expr> {
        let start = if *self.peek() == Token::Colon {
            None
        } else {
            Some(Box::new(self.test()?))
        };
        if self.eat(&Token::RBracket) {
            let index = start.ok_or_else(|| self.unexpected("index"))?;
            return Ok(Expr {
                kind: ExprKind::Index {
                    object: Box::new(object),
                    index,
                },
                pos,
            });
        }
        self.expect(Token::Colon)?;
        let stop = if matches!(self.peek(), Token::Colon | Token::RBracket) {
            None
        } else {
            Some(Box::new(self.test()?))
        };
        let step = if self.eat(&Token::Colon) && *self.peek() != Token::RBracket {
            Some(Box::new(self.test()?))
        } else {
            None
        };
        self.expect(Token::RBracket)?;
        Ok(Expr {
            kind: ExprKind::Slice {
                object: Box::new(object),
                start,
                stop,
                step,
            },
            pos,
        })
    }

    fn atom(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        let kind = match self.peek().clone() {
            Token::Name(name) => {
                self.advance();
                ExprKind::Name(name)
            }
            Token::Int(n) => {
                self.advance();
                ExprKind::Literal(Literal::Int(n))
            }
            Token::Float(x) => {
                self.advance();
                ExprKind::Literal(Literal::Float(x))
            }
            Token::Str(first) => {
                self.advance();
                let mut text = first;
                while let Token::Str(next) = self.peek().clone() {
                    self.advance();
                    text.push_str(&next);
                }
                ExprKind::Literal(Literal::Str(text))
            }
            Token::True => {
                self.advance();
                ExprKind::Literal(Literal::Bool(true))
            }
            Token::False => {
                self.advance();
                ExprKind::Literal(Literal::Bool(false))
            }
            Token::None => {
                self.advance();
                ExprKind::Literal(Literal::None)
            }
            Token::LParen => {
                self.advance();
                if self.eat(&Token::RParen) {
                    ExprKind::Tuple(Vec::new())
                } else {
                    let inner = self.test_list_in_parens()?;
                    self.expect(Token::RParen)?;
                    return Ok(inner);
                }
            }
            Token::LBracket => {
                self.advance();
                return self.list_display(pos);
            }
            Token::LBrace => {
                self.advance();
                return self.dict_display(pos);
            }
            _ => return Err(self.unexpected("primary expression")),
        };
        Ok(Expr { kind, pos })
    }

    /// Parenthesized expression; a trailing comma makes a one-element tuple.
    fn test_list_in_parens(&mut self) -> PResult<Expr> {
        let pos = self.pos();
        let first = self.test()?;
        if *self.peek() != Token::Comma {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if *self.peek() == Token::RParen {
                break;
            }
            items.push(self.test()?);
        }
        Ok(Expr {
            kind: ExprKind::Tuple(items),
            pos,
        })
    }

    fn list_display(&mut self, pos: Pos) -> PResult<Expr> {
        if self.eat(&Token::RBracket) {
            return Ok(Expr {
                kind: ExprKind::List(Vec::new()),
                pos,
            });
        }
        let first = self.test()?;
        if *self.peek() == Token::For {
            let clauses = self.comp_clauses()?;
            self.expect(Token::RBracket)?;
            return Ok(Expr {
                kind: ExprKind::ListComp {
                    element: Box::new(first),
                    clauses,
                },
                pos,
            });
        }
        let mut items = vec![first];
        while self.eat(&Token::Comma) {
            if *self.peek() == Token::RBracket {
                break;
            }
            items.push(self.test()?);
        }
        self.expect(Token::RBracket)?;
        Ok(Expr {
            kind: ExprKind::List(items),
            pos,
        })
    }

    fn dict_display(&mut self, pos: Pos) -> PResult<Expr> {
        let mut entries = Vec::new();
        while *self.peek() != Token::RBrace {
            let key = self.test()?;
            self.expect(Token::Colon)?;
            let value = self.test()?;
            if entries.is_empty() && *self.peek() == Token::For {
                let clauses = self.comp_clauses()?;
                self.expect(Token::RBrace)?;
                return Ok(Expr {
                    kind: ExprKind::DictComp {
                        key: Box::new(key),
                        value: Box::new(value),
                        clauses,
                    },
                    pos,
                });
            }
            entries.push((key, value));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RBrace)?;
        Ok(Expr {
            kind: ExprKind::Dict(entries),
            pos,
        })
    }

    fn comp_clauses(&mut self) -> PResult<Vec<CompClause>> {
        let mut clauses = Vec::new();
        loop {
            if self.eat(&Token::For) {
                let target = self.loop_target()?;
                self.expect(Token::In)?;
                let iter = self.or_expr()?;
                clauses.push(CompClause::For { target, iter });
            } else if self.eat(&Token::If) {
                clauses.push(CompClause::If(self.or_expr()?));
            } else {
                return Ok(clauses);
            }
        }
    }
}

fn binary(op: BinOp, lhs: Expr, rhs: Expr, pos: Pos) -> Expr {
    Expr {
        kind: ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        pos,
    }
}

fn to_target(expr: Expr) -> PResult<Target> {
    match expr.kind {
        ExprKind::Name(name) => Ok(Target::Name(name)),
        ExprKind::Index { object, index } => Ok(Target::Index {
            object: *object,
            index: *index,
        }),
        ExprKind::Tuple(items) | ExprKind::List(items) => Ok(Target::Tuple(
            items.into_iter().map(to_target).collect::<PResult<_>>()?,
        )),
        ExprKind::Attr { name, .. } => Err(ScriptError::at(
            format!("cannot assign to field .{}", name),
            expr.pos,
        )),
        _ => Err(ScriptError::at("invalid assignment target", expr.pos)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_function_definition() {
        let stmts = parse("def transform(ds, ctx):\n  ds.set_body([\"1\"])\n").unwrap();
        assert_eq!(stmts.len(), 1);
        let StmtKind::Def(def) = &stmts[0].kind else {
            panic!("expected def");
        };
        assert_eq!(def.name, "transform");
        assert_eq!(def.params.len(), 2);
        assert_eq!(def.body.len(), 1);
    }

    #[test]
    fn test_parse_call_assignment() {
        let stmts = parse("result = transform(ds, ctx)").unwrap();
        let StmtKind::Assign { target, value } = &stmts[0].kind else {
            panic!("expected assignment");
        };
        assert_eq!(*target, Target::Name("result".to_string()));
        assert!(matches!(value.kind, ExprKind::Call { .. }));
    }

    #[test]
    fn test_parse_load_with_alias() {
        let stmts = parse("load(\"http.star\", \"http\", fetch=\"get\")").unwrap();
        let StmtKind::Load { module, bindings } = &stmts[0].kind else {
            panic!("expected load");
        };
        assert_eq!(module, "http.star");
        assert_eq!(
            bindings,
            &vec![
                ("http".to_string(), "http".to_string()),
                ("fetch".to_string(), "get".to_string())
            ]
        );
    }

    #[test]
    fn test_parse_if_elif_else_and_for() {
        let source = "\
for x in items:
    if x > 1:
        total += x
    elif x == 0:
        continue
    else:
        pass
";
        let stmts = parse(source).unwrap();
        let StmtKind::For { body, .. } = &stmts[0].kind else {
            panic!("expected for");
        };
        let StmtKind::If { branches, otherwise } = &body[0].kind else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(otherwise.len(), 1);
    }

    #[test]
    fn test_parse_comprehension_and_conditional() {
        let expr = parse_expr("[x * 2 for x in xs if x]").unwrap();
        assert!(matches!(expr.kind, ExprKind::ListComp { .. }));
        let expr = parse_expr("a if cond else b").unwrap();
        assert!(matches!(expr.kind, ExprKind::Cond { .. }));
    }

    #[test]
    fn test_parse_dict_comprehension() {
        let expr = parse_expr("{k: len(k) for k in keys if k}").unwrap();
        let ExprKind::DictComp { clauses, .. } = expr.kind else {
            panic!("expected dict comprehension");
        };
        assert_eq!(clauses.len(), 2);
        assert!(matches!(parse_expr("{'a': 1, 'b': 2}").unwrap().kind, ExprKind::Dict(_)));
    }

    #[test]
    fn test_parse_lambda() {
        let expr = parse_expr("lambda x, y=1: x + y").unwrap();
        let ExprKind::Lambda(def) = expr.kind else {
            panic!("expected lambda");
        };
        assert_eq!(def.params.len(), 2);
        assert!(matches!(def.body[0].kind, StmtKind::Return(Some(_))));

        let stmts = parse("rows = sorted(rows, key=lambda r: r[1])").unwrap();
        assert!(matches!(stmts[0].kind, StmtKind::Assign { .. }));
    }

    #[test]
    fn test_parse_slices() {
        let expr = parse_expr("xs[1:]").unwrap();
        let ExprKind::Slice { start, stop, step, .. } = expr.kind else {
            panic!("expected slice");
        };
        assert!(start.is_some() && stop.is_none() && step.is_none());
    }

    #[test]
    fn test_return_outside_function_rejected() {
        let err = parse("return 1").unwrap_err();
        assert!(err.message.contains("not within a function"));
    }

    #[test]
    fn test_unexpected_token_reports_position() {
        let err = parse("x = (1, 2\ny = 3").unwrap_err();
        assert!(err.pos.is_some());
    }

    #[test]
    fn test_parse_expr_accepts_multiline_list() {
        let expr = parse_expr("[\n  \"a\",\n  \"b\",\n]\n").unwrap();
        let ExprKind::List(items) = expr.kind else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);
    }
}

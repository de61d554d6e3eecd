//! C Parser - recursive descent with precedence climbing
//!
//! Typedef declarations side-effect a parser-local alias table and emit no
//! AST node; a registered alias is thereafter recognized wherever a type
//! token may start. The first unexpected token aborts the parse with the
//! offending line and lexeme; there is no recovery.

use std::collections::HashMap;

use crate::ast::*;
use crate::error::{CompileError, CompileResult};
use crate::token::{Token, TokenKind};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    type_aliases: HashMap<String, DataType>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let tokens = if tokens.is_empty() {
            vec![Token::new(TokenKind::Eof, "", 0, 0)]
        } else {
            tokens
        };
        Self {
            tokens,
            current: 0,
            type_aliases: HashMap::new(),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.current].clone();
        if self.current < self.tokens.len() - 1 {
            self.current += 1;
        }
        tok
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> CompileResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }

    fn error(&self, message: &str) -> CompileError {
        let tok = self.peek();
        CompileError::Parse {
            line: tok.line,
            lexeme: tok.lexeme.clone(),
            message: message.to_string(),
        }
    }

    /// Parse a complete program: typedefs and function declarations.
    pub fn parse(mut self) -> CompileResult<Program> {
        let mut functions = Vec::new();
        while !self.check(TokenKind::Eof) {
            if self.check(TokenKind::Typedef) {
                self.parse_typedef()?;
                continue;
            }
            functions.push(self.parse_function_decl()?);
        }
        Ok(Program { functions })
    }

    /// `typedef T name ;` records the alias and produces no node.
    fn parse_typedef(&mut self) -> CompileResult<()> {
        self.expect(TokenKind::Typedef, "Expected 'typedef'")?;
        let base = self.parse_type()?;
        let alias = self.expect(TokenKind::Ident, "Expected type alias name")?;
        self.expect(TokenKind::Semicolon, "Expected ';' after typedef")?;
        self.type_aliases.insert(alias.lexeme, base);
        Ok(())
    }

    fn parse_type(&mut self) -> CompileResult<DataType> {
        // `unsigned int`, `unsigned long`, and bare `unsigned` all flatten
        // to UInt in this subset
        if self.match_kind(TokenKind::Unsigned) {
            let _ = self.match_kind(TokenKind::Int) || self.match_kind(TokenKind::Long);
            return Ok(DataType::UInt);
        }
        if self.match_kind(TokenKind::Int) {
            return Ok(DataType::Int);
        }
        if self.match_kind(TokenKind::Long) {
            return Ok(DataType::Long);
        }
        if self.match_kind(TokenKind::Float) {
            return Ok(DataType::Float);
        }
        if self.match_kind(TokenKind::Void) {
            return Ok(DataType::Void);
        }

        if self.check(TokenKind::Ident) {
            if let Some(&ty) = self.type_aliases.get(&self.peek().lexeme) {
                self.advance();
                return Ok(ty);
            }
        }

        Err(self.error("Expected type"))
    }

    /// Does the current token start a type (including registered aliases)?
    fn is_type_token(&self) -> bool {
        match self.peek().kind {
            TokenKind::Int
            | TokenKind::Long
            | TokenKind::Float
            | TokenKind::Unsigned
            | TokenKind::Void => true,
            TokenKind::Ident => self.type_aliases.contains_key(&self.peek().lexeme),
            _ => false,
        }
    }

    fn parse_function_decl(&mut self) -> CompileResult<FunctionDecl> {
        let return_type = self.parse_type()?;
        let name = self.expect(TokenKind::Ident, "Expected function name")?.lexeme;
        self.expect(TokenKind::LParen, "Expected '('")?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            loop {
                let ty = self.parse_type()?;
                let param_name = self.expect(TokenKind::Ident, "Expected parameter name")?.lexeme;
                let array_dims = self.parse_array_dims()?;
                params.push(Parameter {
                    name: param_name,
                    ty,
                    array_dims,
                });
                if !self.match_kind(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "Expected ')'")?;

        let body = self.parse_block()?;

        Ok(FunctionDecl {
            name,
            params,
            return_type,
            body,
        })
    }

    /// `[N]` or `[]` suffixes; an omitted length is recorded as -1.
    fn parse_array_dims(&mut self) -> CompileResult<Vec<i32>> {
        let mut dims = Vec::new();
        while self.match_kind(TokenKind::LBracket) {
            if self.check(TokenKind::Num) {
                let tok = self.advance();
                dims.push(tok.lexeme.parse().unwrap_or(-1));
            } else {
                dims.push(-1);
            }
            self.expect(TokenKind::RBracket, "Expected ']'")?;
        }
        Ok(dims)
    }

    fn parse_statement(&mut self) -> CompileResult<Stmt> {
        if self.is_type_token() {
            return self.parse_var_decl();
        }
        if self.check(TokenKind::If) {
            return self.parse_if_stmt();
        }
        if self.check(TokenKind::While) {
            return self.parse_while_stmt();
        }
        if self.check(TokenKind::For) {
            return self.parse_for_stmt();
        }
        if self.check(TokenKind::LBrace) {
            return Ok(Stmt::Block {
                statements: self.parse_block()?,
            });
        }
        if self.check(TokenKind::Return) {
            return self.parse_return_stmt();
        }

        let expr = self.parse_expression()?;

        if self.match_kind(TokenKind::Eq) {
            let value = self.parse_expression()?;
            self.match_kind(TokenKind::Semicolon);
            return Ok(Stmt::Assign {
                target: expr,
                value,
            });
        }

        self.match_kind(TokenKind::Semicolon);
        Ok(Stmt::Expr { expression: expr })
    }

    fn parse_var_decl(&mut self) -> CompileResult<Stmt> {
        let ty = self.parse_type()?;
        let name = self.expect(TokenKind::Ident, "Expected variable name")?.lexeme;
        let array_dims = self.parse_array_dims()?;

        let initializer = if self.match_kind(TokenKind::Eq) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.match_kind(TokenKind::Semicolon);

        Ok(Stmt::VarDecl {
            is_mutable: true,
            name,
            ty,
            initializer,
            array_dims,
        })
    }

    fn parse_if_stmt(&mut self) -> CompileResult<Stmt> {
        self.expect(TokenKind::If, "Expected 'if'")?;
        self.expect(TokenKind::LParen, "Expected '('")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen, "Expected ')'")?;

        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_kind(TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn parse_while_stmt(&mut self) -> CompileResult<Stmt> {
        self.expect(TokenKind::While, "Expected 'while'")?;
        self.expect(TokenKind::LParen, "Expected '('")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RParen, "Expected ')'")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While { condition, body })
    }

    /// `for (type v = E0; Ec; Einc) S` is lowered here to a counted loop.
    ///
    /// When `Ec` is `v < E` or `v <= E` the right operand becomes the
    /// exclusive upper bound; any other shape falls back to the literal 10.
    /// The increment expression is skipped over; the step is implicitly 1.
    fn parse_for_stmt(&mut self) -> CompileResult<Stmt> {
        self.expect(TokenKind::For, "Expected 'for'")?;
        self.expect(TokenKind::LParen, "Expected '('")?;

        self.parse_type()?;
        let var_name = self.expect(TokenKind::Ident, "Expected loop variable")?.lexeme;
        self.expect(TokenKind::Eq, "Expected '='")?;
        let start = self.parse_expression()?;
        self.expect(TokenKind::Semicolon, "Expected ';'")?;

        let condition = self.parse_expression()?;
        self.expect(TokenKind::Semicolon, "Expected ';'")?;

        // Skip the increment clause
        while !self.check(TokenKind::RParen) && !self.check(TokenKind::Eof) {
            self.advance();
        }
        self.expect(TokenKind::RParen, "Expected ')'")?;

        let body = Box::new(self.parse_statement()?);

        let end = match condition.kind {
            ExprKind::Binary {
                op: BinOp::Lt | BinOp::Le,
                right,
                ..
            } => *right,
            _ => Expr::literal("10", DataType::Int),
        };

        Ok(Stmt::For {
            var_name,
            start,
            end,
            body,
        })
    }

    fn parse_block(&mut self) -> CompileResult<Vec<Stmt>> {
        self.expect(TokenKind::LBrace, "Expected '{'")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            statements.push(self.parse_statement()?);
        }
        self.expect(TokenKind::RBrace, "Expected '}'")?;
        Ok(statements)
    }

    fn parse_return_stmt(&mut self) -> CompileResult<Stmt> {
        self.expect(TokenKind::Return, "Expected 'return'")?;

        let value = if !self.check(TokenKind::Semicolon)
            && !self.check(TokenKind::RBrace)
            && !self.check(TokenKind::Eof)
        {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.match_kind(TokenKind::Semicolon);

        Ok(Stmt::Return { value })
    }

    // Expression grammar, lowest precedence first

    fn parse_expression(&mut self) -> CompileResult<Expr> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> CompileResult<Expr> {
        let condition = self.parse_logical_or()?;

        if self.match_kind(TokenKind::Question) {
            let true_expr = self.parse_expression()?;
            self.expect(TokenKind::Colon, "Expected ':' in ternary expression")?;
            let false_expr = self.parse_expression()?;
            return Ok(Expr::new(ExprKind::Ternary {
                condition: Box::new(condition),
                true_expr: Box::new(true_expr),
                false_expr: Box::new(false_expr),
            }));
        }

        Ok(condition)
    }

    fn parse_logical_or(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_logical_and()?;
        while self.match_kind(TokenKind::PipePipe) {
            let right = self.parse_logical_and()?;
            left = binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.match_kind(TokenKind::AmpAmp) {
            let right = self.parse_equality()?;
            left = binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_relational()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::BangEq => BinOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::LtEq => BinOp::Le,
                TokenKind::GtEq => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> CompileResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> CompileResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Bang => Some(UnOp::Not),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::new(ExprKind::Unary {
                op,
                operand: Box::new(operand),
            }));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> CompileResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            if self.check(TokenKind::LBracket) {
                let mut indices = Vec::new();
                while self.match_kind(TokenKind::LBracket) {
                    indices.push(self.parse_expression()?);
                    self.expect(TokenKind::RBracket, "Expected ']'")?;
                }
                expr = Expr::new(ExprKind::ArrayAccess {
                    array: Box::new(expr),
                    indices,
                });
            } else if self.check(TokenKind::LParen) {
                // Calls only on a plain identifier base; this subset has no
                // first-class function values
                let name = match &expr.kind {
                    ExprKind::Identifier { name } => name.clone(),
                    _ => break,
                };
                self.advance();
                let mut args = Vec::new();
                if !self.check(TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.match_kind(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen, "Expected ')'")?;
                expr = Expr::new(ExprKind::Call { name, args });
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_primary(&mut self) -> CompileResult<Expr> {
        match self.peek().kind {
            TokenKind::Num => {
                let tok = self.advance();
                Ok(Expr::literal(tok.lexeme, DataType::Int))
            }
            TokenKind::FloatLit => {
                let tok = self.advance();
                Ok(Expr::literal(tok.lexeme, DataType::Float))
            }
            TokenKind::StringLit => {
                let tok = self.advance();
                Ok(Expr::literal(tok.lexeme, DataType::Str))
            }
            TokenKind::Ident => {
                let tok = self.advance();
                Ok(Expr::new(ExprKind::Identifier { name: tok.lexeme }))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RParen, "Expected ')'")?;
                Ok(expr)
            }
            _ => Err(self.error("Unexpected token")),
        }
    }
}

fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
    Expr::new(ExprKind::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

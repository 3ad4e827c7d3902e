// program        → declaration* EOF ;
// declaration    → funcDecl | varDecl | statement ;
// funcDecl       → "func" IDENTIFIER "(" parameters? ")" block ;
// varDecl        → "var" IDENTIFIER ( "=" expression )? ";" ;
// statement      → forStmt | ifStmt | printStmt | returnStmt | whileStmt | block | exprStmt ;
// forStmt        → "for" "(" ( varDecl | exprStmt | ";" ) expression? ";" expression? ")" statement ;
// ifStmt         → "if" "(" expression ")" statement ( "else" statement )? ;
// block          → "{" declaration* "}" ;
//
// expression     → assignment ;
// assignment     → IDENTIFIER "=" assignment | logic_or ;
// logic_or       → logic_and ( "or" logic_and )* ;
// logic_and      → equality ( "and" equality )* ;
// equality       → comparison ( ( "!=" | "==" ) comparison )* ;
// comparison     → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
// term           → factor ( ( "-" | "+" ) factor )* ;
// factor         → unary ( ( "/" | "*" ) unary )* ;
// unary          → ( "!" | "-" ) unary | call ;
// call           → primary ( "(" arguments? ")" )* ;
// primary        → NUMBER | STRING | "true" | "false" | "nil" | IDENTIFIER | "(" expression ")" ;

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use tracing::debug;

use crate::ast::{Expr, FunctionDecl, Stmt};
use crate::error::ParseError;
use crate::token::{Literal, Token, TokenType};

const MAX_ARGUMENTS: usize = 255;
/// Combined depth of nested statements and expressions the parser accepts.
const MAX_NESTING: usize = 100;

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<ParseError>,
    /// Names bound in each enclosing scope. `Some(arity)` when the binding
    /// is known to be a declared function, `None` otherwise.
    scopes: Vec<HashMap<String, Option<usize>>>,
    /// Names assigned to anywhere in the source. Calls through them are
    /// only arity-checked at runtime.
    reassigned: HashSet<String>,
    function_depth: usize,
    depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| t.kind) != Some(TokenType::Eof) {
            let line = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::eof(line));
        }

        let reassigned = assigned_names(&tokens);

        Self {
            tokens,
            current: 0,
            errors: Vec::new(),
            scopes: vec![HashMap::new()],
            reassigned,
            function_depth: 0,
            depth: 0,
        }
    }

    /// Parses every declaration it can. Malformed declarations are reported
    /// to [`Parser::errors`] and skipped; an error at the end of input stops
    /// parsing and keeps what was already built.
    pub fn parse(&mut self) -> Vec<Stmt> {
        let mut statements = vec![];
        while !self.is_at_end() {
            match self.declaration() {
                Ok(Some(stmt)) => statements.push(stmt),
                Ok(None) => {}
                Err(error) => {
                    self.report(error);
                    break;
                }
            }
        }
        statements
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    fn report(&mut self, error: ParseError) {
        debug!(line = error.line(), "{error}");
        self.errors.push(error);
    }

    fn declaration(&mut self) -> ParseResult<Option<Stmt>> {
        match self.declaration_inner() {
            Ok(stmt) => Ok(Some(stmt)),
            Err(error) if error.at_end() => Err(error),
            Err(error) => {
                self.report(error);
                self.synchronize();
                Ok(None)
            }
        }
    }

    fn declaration_inner(&mut self) -> ParseResult<Stmt> {
        if self.match_types(&[TokenType::Func]) {
            return self.function("function");
        }
        if self.match_types(&[TokenType::Var]) {
            return self.var_declaration();
        }
        self.statement()
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        self.nested("Statement", Self::statement_inner)
    }

    fn statement_inner(&mut self) -> ParseResult<Stmt> {
        if self.match_types(&[TokenType::For]) {
            self.for_statement()
        } else if self.match_types(&[TokenType::If]) {
            self.if_statement()
        } else if self.match_types(&[TokenType::Print]) {
            self.print_statement()
        } else if self.match_types(&[TokenType::Return]) {
            self.return_statement()
        } else if self.match_types(&[TokenType::While]) {
            self.while_statement()
        } else if self.match_types(&[TokenType::LeftBrace]) {
            Ok(Stmt::Block(self.block()?))
        } else {
            self.expression_statement()
        }
    }

    fn return_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        if self.function_depth == 0 {
            return Err(ParseError::new(&keyword, "Can't return from top-level code."));
        }

        let value = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let value = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;

        let initializer = if self.match_types(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        self.declare(&name, None);
        Ok(Stmt::Var { name, initializer })
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.scopes.push(HashMap::new());
        let statements = self.block_body();
        self.scopes.pop();
        statements
    }

    fn block_body(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = vec![];

        while !self.check(TokenType::RightBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration()? {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after if condition.")?;

        // `else` binds to the nearest `if` that has none.
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_types(&[TokenType::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::While { condition, body })
    }

    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        // The loop variable is scoped to the loop.
        self.scopes.push(HashMap::new());
        let stmt = self.for_clauses();
        self.scopes.pop();
        stmt
    }

    // for (init; cond; incr) body  =>  { init; while (cond) { body; incr; } }
    fn for_clauses(&mut self) -> ParseResult<Stmt> {
        let initializer = if self.match_types(&[TokenType::Semicolon]) {
            None
        } else if self.match_types(&[TokenType::Var]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if !self.check(TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenType::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        body = Stmt::While {
            condition: condition.unwrap_or(Expr::Literal(Literal::Boolean(true))),
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn function(&mut self, kind: &str) -> ParseResult<Stmt> {
        let name = self.consume(TokenType::Identifier, &format!("Expect {kind} name."))?;
        self.consume(TokenType::LeftParen, &format!("Expect '(' after {kind} name."))?;
        let mut params = vec![];

        if !self.check(TokenType::RightParen) {
            loop {
                if params.len() >= MAX_ARGUMENTS {
                    let error = ParseError::new(self.peek(), "Can't have more than 255 parameters.");
                    self.report(error);
                }
                params.push(self.consume(TokenType::Identifier, "Expect parameter name.")?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenType::LeftBrace, &format!("Expect '{{' before {kind} body."))?;

        // Declared before the body so recursive calls are arity-checked too.
        let arity = (!self.reassigned.contains(&name.lexeme)).then_some(params.len());
        self.declare(&name, arity);
        self.scopes
            .push(params.iter().map(|p| (p.lexeme.clone(), None)).collect());
        self.function_depth += 1;
        let body = self.nested("Statement", Self::block);
        self.function_depth -= 1;
        self.scopes.pop();
        let body = body?;

        debug!(name = %name.lexeme, arity = params.len(), "parsed {kind}");
        Ok(Stmt::Function(Rc::new(FunctionDecl { name, params, body })))
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.nested("Expression", Self::assignment)
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if self.match_types(&[TokenType::Equal]) {
            let equals = self.previous().clone();
            let value = self.nested("Expression", Self::assignment)?;

            if let Expr::Variable(name) = expr {
                return Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                });
            }

            return Err(ParseError::new(&equals, "Invalid assignment target."));
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;

        while self.match_types(&[TokenType::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;

        while self.match_types(&[TokenType::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;

        while self.match_types(&[TokenType::BangEqual, TokenType::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;

        while self.match_types(&[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;

        while self.match_types(&[TokenType::Minus, TokenType::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;

        while self.match_types(&[TokenType::Slash, TokenType::Star]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_types(&[TokenType::Bang, TokenType::Minus]) {
            let operator = self.previous().clone();
            let right = self.nested("Expression", Self::unary)?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> ParseResult<Expr> {
        let mut expr = self.primary()?;
        while self.match_types(&[TokenType::LeftParen]) {
            expr = self.finish_call(expr)?;
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> ParseResult<Expr> {
        let mut arguments = vec![];

        if !self.check(TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGUMENTS {
                    let error = ParseError::new(self.peek(), "Can't have more than 255 arguments.");
                    self.report(error);
                }
                arguments.push(self.expression()?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenType::RightParen, "Expect ')' after arguments.")?;

        if let Expr::Variable(name) = &callee {
            if let Some(expected) = self.known_arity(&name.lexeme) {
                if expected != arguments.len() {
                    return Err(ParseError::new(
                        &paren,
                        format!("Expected {expected} arguments but got {}.", arguments.len()),
                    ));
                }
            }
        }

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let expr = match token.kind {
            TokenType::False => Expr::Literal(Literal::Boolean(false)),
            TokenType::True => Expr::Literal(Literal::Boolean(true)),
            TokenType::Nil => Expr::Literal(Literal::Nil),
            TokenType::Number | TokenType::String => match token.literal {
                Some(ref literal) => Expr::Literal(literal.clone()),
                None => return Err(ParseError::new(&token, "Malformed literal.")),
            },
            TokenType::Identifier => Expr::Variable(token),
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                return Ok(Expr::Grouping(Box::new(expr)));
            }
            _ => return Err(ParseError::new(&token, "Expect expression.")),
        };

        self.advance();
        Ok(expr)
    }

    fn declare(&mut self, name: &Token, arity: Option<usize>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), arity);
        }
    }

    fn known_arity(&self, name: &str) -> Option<usize> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name))
            .copied()
            .flatten()
    }

    fn nested<T>(
        &mut self,
        what: &str,
        parse: impl FnOnce(&mut Self) -> ParseResult<T>,
    ) -> ParseResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new(self.peek(), format!("{what} nested too deeply.")));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    /// Discards tokens until the start of the next statement.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().kind == TokenType::Semicolon {
                return;
            }
            if self.peek().kind.starts_statement() {
                return;
            }
            self.advance();
        }
    }

    fn match_types(&mut self, types: &[TokenType]) -> bool {
        for t in types {
            if self.check(*t) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> ParseResult<Token> {
        if self.check(token_type) {
            Ok(self.advance())
        } else {
            Err(ParseError::new(self.peek(), message))
        }
    }

    fn check(&self, token_type: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().kind == token_type
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }
}

/// Identifiers that appear as an assignment target (`name =`, not `var name =`).
fn assigned_names(tokens: &[Token]) -> HashSet<String> {
    tokens
        .windows(2)
        .enumerate()
        .filter(|(i, pair)| {
            pair[0].kind == TokenType::Identifier
                && pair[1].kind == TokenType::Equal
                && (*i == 0 || tokens[i - 1].kind != TokenType::Var)
        })
        .map(|(_, pair)| pair[0].lexeme.clone())
        .collect()
}

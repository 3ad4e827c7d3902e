use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::ast::{Expr, Stmt};
use crate::callable::{Callable, Function};
use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Deepest chain of active calls before `Stack overflow.` is raised. Keeps
/// recursion inside the 2 MiB stack of a default spawned thread.
const MAX_CALL_DEPTH: usize = 100;

/// How a statement finished. `Return` unwinds to the nearest call boundary
/// and is never confused with an error.
#[derive(Debug, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<'a> {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    out: &'a mut dyn Write,
    call_depth: usize,
}

impl<'a> Interpreter<'a> {
    /// Creates an interpreter whose `print` statements write to `out`.
    pub fn new(out: &'a mut dyn Write) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        Interpreter {
            environment: globals.clone(),
            globals,
            out,
            call_depth: 0,
        }
    }

    pub fn globals(&self) -> &Rc<RefCell<Environment>> {
        &self.globals
    }

    /// Runs a program. Stops at the first runtime error; statements after
    /// it are not executed. Global bindings survive between calls.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), RuntimeError> {
        debug!(statements = statements.len(), "interpreting");
        for stmt in statements {
            self.execute(stmt)?;
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{value}")?;
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment
                    .borrow_mut()
                    .define(name.lexeme.clone(), value);
            }
            Stmt::Block(statements) => {
                let environment = Environment::with_enclosing(self.environment.clone());
                return self.execute_block(statements, Rc::new(RefCell::new(environment)));
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                }
                if let Some(else_branch) = else_branch {
                    return self.execute(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            Stmt::Function(declaration) => {
                debug!(name = %declaration.name.lexeme, arity = declaration.arity(), "define function");
                let function = Function::new(declaration.clone(), self.environment.clone());
                self.environment.borrow_mut().define(
                    declaration.name.lexeme.clone(),
                    Value::Callable(Rc::new(function)),
                );
            }
            Stmt::Return { keyword, value } => {
                if self.call_depth == 0 {
                    return Err(RuntimeError::ReturnOutsideFunction {
                        token: keyword.clone(),
                    });
                }
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    /// Executes `statements` in `environment`, restoring the current scope
    /// afterwards however the block exits.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<Flow, RuntimeError> {
        let previous = std::mem::replace(&mut self.environment, environment);
        let result = self.execute_all(statements);
        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Literal(lit) => Ok(Value::from(lit)),
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.kind {
                    TokenType::Minus => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(RuntimeError::type_error(operator, "Operand must be a number.")),
                    },
                    TokenType::Bang => Ok(Value::Boolean(!right.is_truthy())),
                    _ => Err(RuntimeError::type_error(
                        operator,
                        format!("Unknown unary operator '{}'.", operator.lexeme),
                    )),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(operator, left, right)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let short_circuit = match operator.kind {
                    TokenType::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if short_circuit {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            Expr::Variable(name) => self.environment.borrow().get(name),
            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.environment.borrow_mut().assign(name, value.clone())?;
                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let function = match self.evaluate(callee)? {
                    Value::Callable(function) => function,
                    other => {
                        return Err(RuntimeError::NotCallable {
                            token: paren.clone(),
                            type_name: other.type_name(),
                        })
                    }
                };

                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.call(function.as_ref(), paren, values)
            }
        }
    }

    fn call(
        &mut self,
        function: &dyn Callable,
        paren: &Token,
        arguments: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        if arguments.len() != function.arity() {
            return Err(RuntimeError::Arity {
                token: paren.clone(),
                expected: function.arity(),
                got: arguments.len(),
            });
        }

        if self.call_depth >= MAX_CALL_DEPTH {
            debug!(function = function.name(), depth = self.call_depth, "call depth exceeded");
            return Err(RuntimeError::StackOverflow {
                token: paren.clone(),
            });
        }

        self.call_depth += 1;
        let result = function.call(self, arguments);
        self.call_depth -= 1;
        trace!(function = function.name(), ok = result.is_ok(), "returned");
        result
    }
}

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match operator.kind {
        TokenType::Plus => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            _ => Err(RuntimeError::type_error(
                operator,
                "Operands must be two numbers or two strings.",
            )),
        },
        TokenType::Minus => binary_number_op(operator, left, right, |a, b| a - b),
        TokenType::Star => binary_number_op(operator, left, right, |a, b| a * b),
        TokenType::Slash => binary_number_op(operator, left, right, |a, b| a / b),

        TokenType::Greater => binary_cmp_op(operator, left, right, |a, b| a > b),
        TokenType::GreaterEqual => binary_cmp_op(operator, left, right, |a, b| a >= b),
        TokenType::Less => binary_cmp_op(operator, left, right, |a, b| a < b),
        TokenType::LessEqual => binary_cmp_op(operator, left, right, |a, b| a <= b),

        TokenType::EqualEqual => Ok(Value::Boolean(left == right)),
        TokenType::BangEqual => Ok(Value::Boolean(left != right)),

        _ => Err(RuntimeError::type_error(
            operator,
            format!("Unknown binary operator '{}'.", operator.lexeme),
        )),
    }
}

fn binary_number_op<F>(operator: &Token, left: Value, right: Value, op: F) -> Result<Value, RuntimeError>
where
    F: Fn(f64, f64) -> f64,
{
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(op(a, b))),
        _ => Err(RuntimeError::type_error(operator, "Operands must be numbers.")),
    }
}

fn binary_cmp_op<F>(operator: &Token, left: Value, right: Value, op: F) -> Result<Value, RuntimeError>
where
    F: Fn(f64, f64) -> bool,
{
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Boolean(op(a, b))),
        _ => Err(RuntimeError::type_error(operator, "Operands must be numbers.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::scanner::scan;

    fn parse(source: &str) -> Vec<Stmt> {
        let mut parser = Parser::new(scan(source));
        let statements = parser.parse();
        assert!(parser.errors().is_empty(), "parse errors: {:?}", parser.errors());
        statements
    }

    fn run(source: &str) -> (String, Result<(), RuntimeError>) {
        let statements = parse(source);
        let mut out = Vec::new();
        let result = Interpreter::new(&mut out).interpret(&statements);
        (String::from_utf8(out).unwrap(), result)
    }

    fn output(source: &str) -> String {
        let (out, result) = run(source);
        if let Err(err) = result {
            panic!("runtime error: {err}");
        }
        out
    }

    fn eval(source: &str) -> Result<Value, RuntimeError> {
        let statements = parse(&format!("{source};"));
        let Some(Stmt::Expression(expr)) = statements.first() else {
            panic!("Expected a single expression");
        };
        let mut out = Vec::new();
        let value = Interpreter::new(&mut out).evaluate(expr);
        value
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval("1 + 2 * 3").unwrap(), Value::Number(7.0));
        assert_eq!(eval("(1 + 2) * 3").unwrap(), Value::Number(9.0));
        assert_eq!(eval("10 / 4 - 1").unwrap(), Value::Number(1.5));
    }

    #[test]
    fn test_unary() {
        assert_eq!(eval("-5").unwrap(), Value::Number(-5.0));
        assert_eq!(eval("!false").unwrap(), Value::Boolean(true));
        assert_eq!(eval("!nil").unwrap(), Value::Boolean(true));
        assert_eq!(eval("!0").unwrap(), Value::Boolean(false));
        assert_eq!(eval("--3").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_equality() {
        assert_eq!(eval("1 == 1").unwrap(), Value::Boolean(true));
        assert_eq!(eval("2 != 3").unwrap(), Value::Boolean(true));
        assert_eq!(eval("nil == nil").unwrap(), Value::Boolean(true));
        assert_eq!(eval("nil == false").unwrap(), Value::Boolean(false));
        assert_eq!(eval("\"a\" == \"a\"").unwrap(), Value::Boolean(true));
        assert_eq!(eval("1 == \"1\"").unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_comparison() {
        assert_eq!(eval("1 < 2").unwrap(), Value::Boolean(true));
        assert_eq!(eval("2 <= 2").unwrap(), Value::Boolean(true));
        assert_eq!(eval("3 > 4").unwrap(), Value::Boolean(false));
        assert_eq!(eval("3 >= 4").unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_string_concatenation() {
        assert_eq!(eval("\"a\" + \"b\"").unwrap(), Value::String("ab".into()));
    }

    #[test]
    fn test_operand_type_errors() {
        let err = eval("1 + \"b\"").unwrap_err();
        assert!(matches!(err, RuntimeError::Type { ref token, .. } if token.kind == TokenType::Plus));
        assert_eq!(err.to_string(), "Operands must be two numbers or two strings.");

        let err = eval("-\"a\"").unwrap_err();
        assert_eq!(err.to_string(), "Operand must be a number.");

        let err = eval("1 < nil").unwrap_err();
        assert_eq!(err.to_string(), "Operands must be numbers.");

        assert!(eval("true * 2").is_err());
    }

    #[test]
    fn test_logical_returns_operand() {
        assert_eq!(eval("nil or \"x\"").unwrap(), Value::String("x".into()));
        assert_eq!(eval("0 and 2").unwrap(), Value::Number(2.0));
        assert_eq!(eval("\"\" or 1").unwrap(), Value::String(String::new()));
    }

    #[test]
    fn test_logical_short_circuits() {
        assert_eq!(eval("false and missing").unwrap(), Value::Boolean(false));
        assert_eq!(eval("true or missing").unwrap(), Value::Boolean(true));
        assert!(eval("true and missing").is_err());
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let statements = parse("(1 + 2) * 4 - 6 / 3;");
        let Stmt::Expression(expr) = &statements[0] else {
            panic!("Expected expression statement");
        };
        let mut out = Vec::new();
        let mut interpreter = Interpreter::new(&mut out);
        let first = interpreter.evaluate(expr).unwrap();
        let second = interpreter.evaluate(expr).unwrap();
        assert_eq!(first, Value::Number(10.0));
        assert_eq!(first, second);
    }

    #[test]
    fn test_print_and_variables() {
        assert_eq!(output("var a = 1; var b = 2; print a + b;"), "3\n");
        assert_eq!(output("var a; print a;"), "nil\n");
        assert_eq!(output("var a = 1; a = a + 1; print a;"), "2\n");
    }

    #[test]
    fn test_block_scoping() {
        assert_eq!(
            output("var a = 1; { var a = 2; print a; } print a;"),
            "2\n1\n"
        );
        assert_eq!(output("var a = 1; { a = 2; } print a;"), "2\n");
    }

    #[test]
    fn test_block_restores_scope_after_error() {
        let mut out = Vec::new();
        let mut interpreter = Interpreter::new(&mut out);

        assert!(interpreter.interpret(&parse("{ var a = 1; print b; }")).is_err());
        assert!(interpreter.interpret(&parse("var c = 3; print c;")).is_ok());

        let err = interpreter.interpret(&parse("print a;")).unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedVariable { .. }));
        assert!(interpreter.globals().borrow().get(&Token::new(TokenType::Identifier, "c", 1)).is_ok());
    }

    #[test]
    fn test_if_else() {
        assert_eq!(output("if (1 < 2) print \"yes\"; else print \"no\";"), "yes\n");
        assert_eq!(output("if (nil) print \"yes\"; else print \"no\";"), "no\n");
        assert_eq!(output("if (false) print 1;"), "");
    }

    #[test]
    fn test_dangling_else() {
        assert_eq!(output("if (true) if (false) print 1; else print 2;"), "2\n");
    }

    #[test]
    fn test_while_loop() {
        assert_eq!(
            output("var i = 0; while (i < 3) { print i; i = i + 1; }"),
            "0\n1\n2\n"
        );
    }

    #[test]
    fn test_for_loop() {
        assert_eq!(
            output("for (var i = 0; i < 3; i = i + 1) print i * 10;"),
            "0\n10\n20\n"
        );
    }

    #[test]
    fn test_function_call() {
        assert_eq!(
            output("func f(a, b) { return a * b; } print f(3, 4);"),
            "12\n"
        );
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(output("func f() { 1 + 1; } print f();"), "nil\n");
        assert_eq!(output("func f() { return; } print f();"), "nil\n");
    }

    #[test]
    fn test_return_unwinds_loops_and_blocks() {
        let source = "
            func find() {
                var i = 0;
                while (true) {
                    { if (i == 3) return i; }
                    i = i + 1;
                }
            }
            print find();
        ";
        assert_eq!(output(source), "3\n");
    }

    #[test]
    fn test_recursion() {
        let source = "
            func fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(10);
        ";
        assert_eq!(output(source), "55\n");
    }

    #[test]
    fn test_closure_counter() {
        let source = "
            func make() {
                var x = 0;
                func inc() { x = x + 1; return x; }
                return inc;
            }
            var counter = make();
            print counter();
            print counter();
        ";
        assert_eq!(output(source), "1\n2\n");
    }

    #[test]
    fn test_closures_do_not_share_instances() {
        let source = "
            func make() {
                var x = 0;
                func inc() { x = x + 1; return x; }
                return inc;
            }
            var a = make();
            var b = make();
            a();
            a();
            print b();
        ";
        assert_eq!(output(source), "1\n");
    }

    #[test]
    fn test_closure_uses_declaring_scope() {
        let source = "
            var a = \"global\";
            func show() { print a; }
            func caller() { var a = \"local\"; show(); }
            caller();
        ";
        assert_eq!(output(source), "global\n");
    }

    #[test]
    fn test_closure_sees_later_mutation() {
        let source = "
            var message = \"before\";
            func show() { print message; }
            message = \"after\";
            show();
        ";
        assert_eq!(output(source), "after\n");
    }

    #[test]
    fn test_print_function_value() {
        assert_eq!(output("func greet() {} print greet;"), "<fn greet>\n");
    }

    #[test]
    fn test_arguments_evaluated_left_to_right() {
        let source = "
            var log = \"\";
            func mark(s) { log = log + s; return s; }
            func join(a, b, c) { return a + b + c; }
            print join(mark(\"a\"), mark(\"b\"), mark(\"c\"));
            print log;
        ";
        assert_eq!(output(source), "abc\nabc\n");
    }

    #[test]
    fn test_calling_non_callable() {
        let (out, result) = run("print 1;\n\"abc\"();");
        assert_eq!(out, "1\n");
        match result {
            Err(RuntimeError::NotCallable { token, type_name }) => {
                assert_eq!(token.kind, TokenType::RightParen);
                assert_eq!(token.line, 2);
                assert_eq!(type_name, "string");
            }
            other => panic!("Expected NotCallable, got {other:?}"),
        }
    }

    #[test]
    fn test_callee_checked_before_arguments() {
        let (_, result) = run("nil(missing);");
        assert!(matches!(result, Err(RuntimeError::NotCallable { .. })));
    }

    #[test]
    fn test_arity_checked_at_call_time() {
        let (_, result) = run("var f; func g(a) {} f = g; f();");
        assert!(matches!(
            result,
            Err(RuntimeError::Arity {
                expected: 1,
                got: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_unbounded_recursion_overflows() {
        let (out, result) = run("func f(n) { return f(n + 1); } f(0); print 1;");
        assert_eq!(out, "");
        let err = result.unwrap_err();
        assert!(matches!(err, RuntimeError::StackOverflow { .. }));
        assert_eq!(err.to_string(), "Stack overflow.");
        assert_eq!(err.line(), Some(1));
    }

    #[test]
    fn test_call_depth_unwinds_after_overflow() {
        let mut out = Vec::new();
        let mut interpreter = Interpreter::new(&mut out);
        let result = interpreter.interpret(&parse("func f() { f(); } f();"));
        assert!(matches!(result, Err(RuntimeError::StackOverflow { .. })));
        assert_eq!(interpreter.call_depth, 0);

        let source = "func sum(n) { if (n == 0) return 0; return n + sum(n - 1); } print sum(50);";
        interpreter.interpret(&parse(source)).unwrap();
        drop(interpreter);
        assert_eq!(String::from_utf8(out).unwrap(), "1275\n");
    }

    #[test]
    fn test_halts_on_first_error() {
        let (out, result) = run("print 1; print x; print 2;");
        assert_eq!(out, "1\n");
        assert!(matches!(result, Err(RuntimeError::UndefinedVariable { .. })));
    }

    #[test]
    fn test_assign_undeclared_fails() {
        let (_, result) = run("y = 1;");
        assert!(matches!(result, Err(RuntimeError::UndefinedVariable { ref token }) if token.lexeme == "y"));
    }

    #[test]
    fn test_return_outside_function_at_runtime() {
        let keyword = Token::new(TokenType::Return, "return", 1);
        let statements = vec![Stmt::Return {
            keyword,
            value: None,
        }];
        let mut out = Vec::new();
        let result = Interpreter::new(&mut out).interpret(&statements);
        assert!(matches!(result, Err(RuntimeError::ReturnOutsideFunction { .. })));
    }

    #[test]
    fn test_globals_persist_between_runs() {
        let mut out = Vec::new();
        let mut interpreter = Interpreter::new(&mut out);
        interpreter.interpret(&parse("var a = 40;")).unwrap();
        interpreter.interpret(&parse("print a + 2;")).unwrap();
        drop(interpreter);
        assert_eq!(String::from_utf8(out).unwrap(), "42\n");
    }
}

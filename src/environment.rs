use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;

/// One lexical scope. Scopes are shared (`Rc<RefCell<_>>`) between the block
/// executing in them and every closure that captured them.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Binds `name` in this scope, replacing any previous binding here.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(value) = self.values.get(&name.lexeme) {
            return Ok(value.clone());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow().get(name),
            None => Err(RuntimeError::undefined(name)),
        }
    }

    /// Updates the innermost existing binding of `name`. Never creates one.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            return Ok(());
        }

        match &self.enclosing {
            Some(enclosing) => enclosing.borrow_mut().assign(name, value),
            None => Err(RuntimeError::undefined(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token {
        Token::new(TokenType::Identifier, name, 1)
    }

    #[test]
    fn test_define_and_get() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        assert_eq!(env.get(&ident("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_redefine_overwrites() {
        let mut env = Environment::new();
        env.define("a", Value::Number(1.0));
        env.define("a", Value::String("two".into()));
        assert_eq!(env.get(&ident("a")).unwrap(), Value::String("two".into()));
    }

    #[test]
    fn test_get_undefined() {
        let env = Environment::new();
        let err = env.get(&ident("missing")).unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedVariable { ref token } if token.lexeme == "missing"));
    }

    #[test]
    fn test_assign_undefined_fails() {
        let mut env = Environment::new();
        let err = env.assign(&ident("x"), Value::Nil).unwrap_err();
        assert!(matches!(err, RuntimeError::UndefinedVariable { .. }));
        assert!(env.get(&ident("x")).is_err());
    }

    #[test]
    fn test_lookup_walks_enclosing_scopes() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::Number(1.0));

        let middle = Rc::new(RefCell::new(Environment::with_enclosing(globals.clone())));
        let inner = Environment::with_enclosing(middle);

        assert_eq!(inner.get(&ident("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_shadowing_does_not_touch_outer() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(globals.clone());
        inner.define("a", Value::Number(2.0));

        assert_eq!(inner.get(&ident("a")).unwrap(), Value::Number(2.0));
        assert_eq!(globals.borrow().get(&ident("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_assign_updates_defining_scope() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::Number(1.0));

        let mut inner = Environment::with_enclosing(globals.clone());
        inner.assign(&ident("a"), Value::Number(5.0)).unwrap();

        assert_eq!(globals.borrow().get(&ident("a")).unwrap(), Value::Number(5.0));
        assert!(inner.values.is_empty());
    }

    #[test]
    fn test_shared_scope_sees_mutation() {
        let shared = Rc::new(RefCell::new(Environment::new()));
        shared.borrow_mut().define("count", Value::Number(0.0));

        let captured = shared.clone();
        shared
            .borrow_mut()
            .assign(&ident("count"), Value::Number(3.0))
            .unwrap();

        assert_eq!(captured.borrow().get(&ident("count")).unwrap(), Value::Number(3.0));
    }
}

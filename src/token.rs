use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen, RightParen,
    LeftBrace, RightBrace,
    Comma, Dot, Minus, Plus,
    Semicolon, Slash, Star,

    // One or two character tokens.
    Bang, BangEqual,
    Equal, EqualEqual,
    Greater, GreaterEqual,
    Less, LessEqual,

    // Literals.
    Identifier,
    String,
    Number,

    // Keywords.
    And, Class, Else, False,
    Func, For, If, Nil, Or,
    Print, Return, Super,
    This, True, Var, While,

    Eof,
}

impl TokenType {
    /// Keywords that open a statement. The parser resumes in front of one
    /// of these after a syntax error.
    pub fn starts_statement(self) -> bool {
        matches!(
            self,
            TokenType::Class
                | TokenType::Func
                | TokenType::Var
                | TokenType::If
                | TokenType::For
                | TokenType::While
                | TokenType::Print
                | TokenType::Return
        )
    }
}

/// Reserved words, looked up after an identifier has been scanned.
const KEYWORDS: [(&str, TokenType); 16] = [
    ("and", TokenType::And),
    ("class", TokenType::Class),
    ("else", TokenType::Else),
    ("false", TokenType::False),
    ("for", TokenType::For),
    ("func", TokenType::Func),
    ("if", TokenType::If),
    ("nil", TokenType::Nil),
    ("or", TokenType::Or),
    ("print", TokenType::Print),
    ("return", TokenType::Return),
    ("super", TokenType::Super),
    ("this", TokenType::This),
    ("true", TokenType::True),
    ("var", TokenType::Var),
    ("while", TokenType::While),
];

pub fn keyword(text: &str) -> Option<TokenType> {
    KEYWORDS
        .iter()
        .find(|(word, _)| *word == text)
        .map(|(_, kind)| *kind)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenType,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub line: usize,
}

impl Token {
    pub fn new(kind: TokenType, lexeme: impl Into<String>, line: usize) -> Self {
        Token {
            kind,
            lexeme: lexeme.into(),
            literal: None,
            line,
        }
    }

    pub fn eof(line: usize) -> Self {
        Token::new(TokenType::Eof, "", line)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.literal {
            Some(literal) => write!(f, "[{:?} {} {}]", self.kind, self.lexeme, literal),
            None => write!(f, "[{:?} {}]", self.kind, self.lexeme),
        }
    }
}

/// Primitive value carried by a literal token and by `Expr::Literal`.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    String(String),
    Boolean(bool),
    Nil,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::String(s) => write!(f, "{s}"),
            Literal::Boolean(b) => write!(f, "{b}"),
            Literal::Nil => write!(f, "nil"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(keyword("func"), Some(TokenType::Func));
        assert_eq!(keyword("while"), Some(TokenType::While));
        assert_eq!(keyword("fun"), None);
        assert_eq!(keyword("Print"), None);
    }

    #[test]
    fn test_statement_starters() {
        assert!(TokenType::Return.starts_statement());
        assert!(TokenType::Class.starts_statement());
        assert!(!TokenType::Else.starts_statement());
        assert!(!TokenType::Semicolon.starts_statement());
    }

    #[test]
    fn test_token_display() {
        let mut token = Token::new(TokenType::Number, "1.5", 3);
        token.literal = Some(Literal::Number(1.5));
        assert_eq!(token.to_string(), "[Number 1.5 1.5]");
        assert_eq!(Token::eof(1).to_string(), "[Eof ]");
    }
}

use logos::Logos;
use std::fmt;
use thiserror::Error;

use crate::Span;

/// Carlae has only three kinds of token: the two parentheses and "words".
/// A word is a maximal run of characters that are not whitespace, not a
/// parenthesis and not the start of a `#` comment. Whether a word is a number
/// or a symbol is decided by the parser.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"\s+")] // Skip whitespace
#[logos(skip r"#[^\n]*")] // Skip comments, up to but excluding the newline
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex(r"[^\s()#]+", |lex| lex.slice().to_string())]
    Word(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Token { kind, span }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::LParen => write!(f, "("),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Word(word) => write!(f, "{}", word),
        }
    }
}

// Every character is covered by one of the rules above, so logos only needs
// this for its error type.
#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[default]
    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error} at {span}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
}

type LexerResult<T> = Result<T, LexerError>;

/// Splits a line of Carlae source into tokens.
pub fn tokenize(input: &str) -> LexerResult<Vec<Token>> {
    TokenKind::lexer(input)
        .spanned()
        .map(|(result, range)| match result {
            Ok(kind) => Ok(Token::new(kind, range.into())),
            Err(error) => Err(LexerError {
                error,
                span: range.into(),
            }),
        })
        .collect()
}

/// True for lines with nothing to evaluate: only whitespace and comments.
pub fn is_blank(input: &str) -> bool {
    matches!(tokenize(input), Ok(tokens) if tokens.is_empty())
}

/// Open parentheses minus closing ones, ignoring comments. Positive means
/// the input needs more lines to complete a form.
pub fn paren_balance(input: &str) -> isize {
    TokenKind::lexer(input).fold(0, |balance, token| match token {
        Ok(TokenKind::LParen) => balance + 1,
        Ok(TokenKind::RParen) => balance - 1,
        _ => balance,
    })
}

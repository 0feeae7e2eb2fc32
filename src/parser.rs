use crate::Span;
use crate::lexer::{LexerError, Token, TokenKind};
use crate::types::{Node, Sexpr};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Unexpected token '{}' at {}, expected {expected}", .found.kind, .found.span)]
    UnexpectedToken { found: Token, expected: String },
    #[error("Unexpected end of input, expected {0}")]
    UnexpectedEof(String),
    #[error("Expected a single expression but found {count} tokens without enclosing parentheses")]
    BareSequence { count: usize, span: Span },
    #[error("Expressions nested more than {limit} deep at {span}")]
    TooDeep { limit: usize, span: Span },
    #[error("Lexer Error during parse: {0}")]
    LexerError(#[from] LexerError),
}

type ParseResult<T> = Result<T, ParseError>;

/// Deepest list nesting accepted in one expression. Parsing and evaluation
/// both recurse once per level, so this keeps hostile input off the host stack.
pub const MAX_NESTING_DEPTH: usize = 64;

pub struct Parser {
    tokens: Vec<Token>,
    // Index of the next token to consume
    pos: usize,
    // Lists currently open
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    /// Parses a single expression starting at the cursor.
    pub fn parse_expr(&mut self) -> ParseResult<Node> {
        match self.next_token() {
            Some(Token {
                kind: TokenKind::LParen,
                span,
            }) => {
                if self.depth >= MAX_NESTING_DEPTH {
                    return Err(ParseError::TooDeep {
                        limit: MAX_NESTING_DEPTH,
                        span,
                    });
                }
                self.depth += 1;
                let list = self.parse_list(span);
                self.depth -= 1;
                list
            }
            Some(Token {
                kind: TokenKind::Word(word),
                span,
            }) => Ok(parse_atom(word, span)),
            Some(found) => Err(ParseError::UnexpectedToken {
                found,
                expected: "an atom or '('".to_string(),
            }),
            None => Err(ParseError::UnexpectedEof("an expression".to_string())),
        }
    }

    /// Parses the elements of a list whose `(` has already been consumed.
    fn parse_list(&mut self, open: Span) -> ParseResult<Node> {
        let mut elements = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::RParen) => {
                    let close = self.tokens[self.pos].span;
                    self.pos += 1;
                    return Ok(Node::new_list(elements, open.merge(close)));
                }
                Some(_) => elements.push(self.parse_expr()?),
                None => return Err(ParseError::UnexpectedEof("')'".to_string())),
            }
        }
    }

    /// Parses the whole token sequence as exactly one top-level expression.
    pub fn parse(mut self) -> ParseResult<Node> {
        if let [first, .., last] = &self.tokens[..] {
            if first.kind != TokenKind::LParen {
                return Err(ParseError::BareSequence {
                    count: self.tokens.len(),
                    span: first.span.merge(last.span),
                });
            }
        }

        let expr = self.parse_expr()?;

        // Only one top-level form per parse
        if let Some(found) = self.next_token() {
            Err(ParseError::UnexpectedToken {
                found,
                expected: "end of input".to_string(),
            })
        } else {
            Ok(expr)
        }
    }
}

fn parse_atom(word: String, span: Span) -> Node {
    match parse_number(&word) {
        Some(n) => Node::new(Sexpr::Number(n), span),
        None => Node::new(Sexpr::Symbol(word), span),
    }
}

/// Numbers are an optional `-`, at least one digit, then optionally a `.`
/// followed by any number of digits. `1e5`, `+1` and `.5` are symbols.
fn parse_number(word: &str) -> Option<f64> {
    let unsigned = word.strip_prefix('-').unwrap_or(word);
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() || !all_digits(whole) || !all_digits(fraction) {
        return None;
    }
    word.parse().ok()
}

/// Parses one token sequence produced by [`crate::lexer::tokenize`].
pub fn parse(tokens: Vec<Token>) -> ParseResult<Node> {
    Parser::new(tokens).parse()
}

/// Lexes and parses a source line.
pub fn parse_str(input: &str) -> ParseResult<Node> {
    let tokens = crate::lexer::tokenize(input)?;
    parse(tokens)
}

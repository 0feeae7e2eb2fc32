pub mod config;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod source;
pub mod types;

pub use config::{Config, ConfigError, EditMode};
pub use environment::{EnvError, Environment};
pub use error::{CarlaeError, ErrorKind};
pub use evaluator::{EvalError, EvalResult, evaluate, evaluate_top_level};
pub use lexer::{LexerError, Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse, parse_str};
pub use source::Span;
pub use types::{Node, Sexpr, Value};

use crate::environment::EnvError;
use crate::evaluator::EvalError;
use crate::lexer::LexerError;
use crate::parser::ParseError;
use crate::source::Span;
use thiserror::Error;

/// The three ways a top-level evaluation can fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    Name,
    Evaluation,
}

/// Any error from reading or evaluating one top-level expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CarlaeError {
    #[error("Syntax Error: {0}")]
    Syntax(#[from] ParseError),
    #[error("Name Error: {0}")]
    Name(#[from] EnvError),
    #[error("Evaluation Error: {0}")]
    Evaluation(EvalError),
}

impl From<EvalError> for CarlaeError {
    fn from(err: EvalError) -> Self {
        match err {
            // Lookups surface as name errors wherever they happen
            EvalError::EnvError(env_err) => CarlaeError::Name(env_err),
            other => CarlaeError::Evaluation(other),
        }
    }
}

impl From<LexerError> for CarlaeError {
    fn from(err: LexerError) -> Self {
        CarlaeError::Syntax(err.into())
    }
}

impl CarlaeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CarlaeError::Syntax(_) => ErrorKind::Syntax,
            CarlaeError::Name(_) => ErrorKind::Name,
            CarlaeError::Evaluation(_) => ErrorKind::Evaluation,
        }
    }

    /// The part of the input the error points at. Running out of input has no
    /// span of its own and points just past the end of `input_len` bytes.
    pub fn span(&self, input_len: usize) -> Span {
        match self {
            CarlaeError::Syntax(ParseError::UnexpectedToken { found, .. }) => found.span,
            CarlaeError::Syntax(ParseError::UnexpectedEof(_)) => Span::new(input_len, input_len),
            CarlaeError::Syntax(ParseError::BareSequence { span, .. }) => *span,
            CarlaeError::Syntax(ParseError::TooDeep { span, .. }) => *span,
            CarlaeError::Syntax(ParseError::LexerError(lex_err)) => lex_err.span,
            CarlaeError::Name(EnvError::UnboundVariable(_, span)) => *span,
            CarlaeError::Evaluation(eval_err) => eval_err.span(),
        }
    }
}

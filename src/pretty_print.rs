use crate::{CarlaeError, EnvError, EvalError, ParseError};
use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use std::io;
use std::ops::Range;

impl CarlaeError {
    fn report<'a>(
        &self,
        source_id: &'a str,
        input: &str,
        config: Config,
    ) -> Report<'static, (&'a str, Range<usize>)> {
        let mut range = self.span(input.len()).to_range();
        if range.is_empty() {
            // Point at the last character rather than past the end
            if let Some((last, _)) = input[..range.start].char_indices().next_back() {
                range.start = last;
            }
        }
        let span = (source_id, range);
        let (message, label) = match self {
            CarlaeError::Syntax(ParseError::UnexpectedToken { found, expected }) => (
                format!("Unexpected token: {}", found.kind),
                format!("Expected {}", expected),
            ),
            CarlaeError::Syntax(ParseError::UnexpectedEof(expected)) => (
                "Unexpected end of input".to_string(),
                format!("Expected {}", expected),
            ),
            CarlaeError::Syntax(ParseError::BareSequence { count, .. }) => (
                format!("{} expressions on one line", count),
                "Wrap these in parentheses to make a single expression".to_string(),
            ),
            CarlaeError::Syntax(ParseError::TooDeep { limit, .. }) => (
                format!("Expressions nested more than {} deep", limit),
                "Nesting limit reached here".to_string(),
            ),
            CarlaeError::Syntax(ParseError::LexerError(lex_err)) => {
                ("Lexer Error".to_string(), lex_err.error.to_string())
            }
            CarlaeError::Name(EnvError::UnboundVariable(symbol, _)) => (
                format!("Unbound variable: '{}'", symbol),
                "This symbol is not defined in the current scope".to_string(),
            ),
            CarlaeError::Evaluation(eval_err) => {
                let label = match eval_err {
                    EvalError::NotAProcedure { .. } => {
                        "This expression cannot be called as a function"
                    }
                    EvalError::ArityMismatch { .. } => "Called here",
                    EvalError::InvalidSpecialForm(..) => {
                        "This special form is malformed or incomplete"
                    }
                    EvalError::RecursionLimit { .. } => "The call that went too deep",
                    _ => "Error occurred here",
                };
                (eval_err.to_string(), label.to_string())
            }
        };

        Report::build(ReportKind::Error, span.clone())
            .with_config(config.with_index_type(IndexType::Byte))
            .with_message(message)
            .with_label(Label::new(span).with_message(label))
            .finish()
    }

    /// Prints a source-annotated diagnostic for this error to stderr.
    pub fn pretty_print(&self, source_id: &str, input: &str) -> io::Result<()> {
        self.report(source_id, input, Config::default())
            .eprint((source_id, Source::from(input)))
    }

    /// Renders the diagnostic as plain text, without colour.
    pub fn render(&self, source_id: &str, input: &str) -> String {
        let mut out = Vec::new();
        match self
            .report(source_id, input, Config::default().with_color(false))
            .write((source_id, Source::from(input)), &mut out)
        {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use carlae::evaluator::{self, set_max_call_depth};
use carlae::lexer::is_blank;
use carlae::{Config, EditMode, Environment, TokenKind, evaluate_top_level, tokenize};
use log::info;
use rustyline::error::ReadlineError;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, Completer, Context, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};
use rustyline::{Helper, Highlighter, Hinter, Validator};

struct CarlaeCompleter {
    env: Rc<RefCell<Environment>>,
}

impl rustyline::completion::Completer for CarlaeCompleter {
    type Candidate = String;
    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let prefix = match tokenize(&line[..pos]) {
            Ok(tokens) => match tokens.last() {
                Some(token) if token.span.end == pos => match &token.kind {
                    TokenKind::Word(word) => word.clone(),
                    _ => return Ok((pos, vec![])),
                },
                _ => return Ok((pos, vec![])),
            },
            Err(_) => return Ok((pos, vec![])),
        };
        let mut candidates: Vec<String> = self
            .env
            .borrow()
            .get_identifiers()
            .union(&evaluator::special_form_identifiers())
            .filter_map(|id| id.strip_prefix(prefix.as_str()).map(str::to_string))
            .filter(|rest| !rest.is_empty())
            .collect();
        candidates.sort();
        Ok((pos, candidates))
    }
}

#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
struct ReplHelper {
    #[rustyline(Validator)]
    validator: CarlaeValidator,
    #[rustyline(Highlighter)]
    highlighter: CarlaeHighlighter,
    #[rustyline(Completer)]
    completer: CarlaeCompleter,
}

/// Byte positions of matched `(`/`)` pairs and of unmatched parentheses.
/// Parentheses inside `#` comments are ignored.
#[derive(Debug, Default, PartialEq)]
struct Brackets {
    pairs: Vec<(usize, usize)>,
    unmatched_open: Vec<usize>,
    unmatched_close: Vec<usize>,
    comments: Vec<(usize, usize)>,
}

fn scan_brackets(line: &str) -> Brackets {
    let mut brackets = Brackets::default();
    let mut stack = Vec::new();
    let mut comment_start = None;

    for (i, c) in line.char_indices() {
        if let Some(start) = comment_start {
            if c == '\n' {
                brackets.comments.push((start, i));
                comment_start = None;
            }
            continue;
        }
        match c {
            '#' => comment_start = Some(i),
            '(' => stack.push(i),
            ')' => match stack.pop() {
                Some(open) => brackets.pairs.push((open, i)),
                None => brackets.unmatched_close.push(i),
            },
            _ => {}
        }
    }
    if let Some(start) = comment_start {
        brackets.comments.push((start, line.len()));
    }
    brackets.unmatched_open = stack;
    brackets
}

struct CarlaeValidator;

impl Validator for CarlaeValidator {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        let brackets = scan_brackets(ctx.input());
        if let Some(i) = brackets.unmatched_close.first() {
            Ok(ValidationResult::Invalid(Some(format!(
                "  - Unmatched ')' at position {}",
                i
            ))))
        } else if !brackets.unmatched_open.is_empty() {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

struct CarlaeHighlighter;

impl Highlighter for CarlaeHighlighter {
    fn highlight<'l>(&self, line: &'l str, pos: usize) -> Cow<'l, str> {
        let brackets = scan_brackets(line);
        // The pair touching the cursor, if any
        let active = brackets.pairs.iter().find(|(open, close)| {
            [*open, *close]
                .iter()
                .any(|&b| b == pos || b + 1 == pos)
        });
        let in_comment = |i: usize| brackets.comments.iter().any(|&(s, e)| s <= i && i < e);

        let mut highlighted = String::with_capacity(line.len());
        for (i, c) in line.char_indices() {
            if in_comment(i) {
                highlighted.push_str(&format!("\x1b[90m{}\x1b[0m", c)); // Grey for comments
            } else if active.is_some_and(|&(open, close)| i == open || i == close) {
                highlighted.push_str(&format!("\x1b[1;34m{}\x1b[0m", c)); // Blue for the matching pair
            } else if brackets.unmatched_close.contains(&i) {
                highlighted.push_str(&format!("\x1b[31m{}\x1b[0m", c)); // Red for unmatched closing
            } else {
                highlighted.push(c);
            }
        }
        Cow::Owned(highlighted)
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn main() -> rustyline::Result<()> {
    env_logger::init();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration Error: {}", e);
            std::process::exit(2);
        }
    };
    set_max_call_depth(config.max_call_depth);

    println!("Carlae REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl-D to quit.");

    let session = Environment::new_global();
    let h = ReplHelper {
        highlighter: CarlaeHighlighter,
        validator: CarlaeValidator,
        completer: CarlaeCompleter {
            env: session.clone(),
        },
    };
    let edit_mode = match config.edit_mode {
        EditMode::Vi => rustyline::EditMode::Vi,
        EditMode::Emacs => rustyline::EditMode::Emacs,
    };
    let rl_config = rustyline::config::Config::builder()
        .edit_mode(edit_mode)
        .build();
    let mut rl = Editor::with_config(rl_config)?;
    rl.set_helper(Some(h));
    rl.bind_sequence(
        KeyEvent(KeyCode::Char('s'), Modifiers::CTRL),
        EventHandler::Simple(Cmd::Newline),
    );
    if rl.load_history(&config.history_file).is_err() {
        println!("No previous history.");
    }
    info!("history file: {}", config.history_file.display());

    loop {
        match rl.readline(&config.prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let trimmed_input = line.trim();
                if trimmed_input == "exit" {
                    break;
                }
                if is_blank(trimmed_input) {
                    continue;
                }

                match evaluate_top_level(trimmed_input, Some(session.clone())) {
                    Ok((value, _)) => println!("{}", value),
                    Err(e) => {
                        if e.pretty_print("REPL", trimmed_input).is_err() {
                            eprintln!("{}", e);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl-C
                println!("Interrupted. Type 'exit' or Ctrl-D to quit.");
            }
            Err(ReadlineError::Eof) => {
                // Ctrl-D
                println!("\nExiting.");
                break;
            }
            Err(err) => {
                eprintln!("Readline Error: {:?}", err);
                break;
            }
        }
    }
    rl.save_history(&config.history_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_balanced() {
        let brackets = scan_brackets("(f (g x))");
        assert_eq!(brackets.pairs, vec![(3, 7), (0, 8)]);
        assert!(brackets.unmatched_open.is_empty());
        assert!(brackets.unmatched_close.is_empty());
    }

    #[test]
    fn test_scan_unbalanced() {
        let brackets = scan_brackets("(def (f x)");
        assert_eq!(brackets.unmatched_open, vec![0]);
        let brackets = scan_brackets("x))");
        assert_eq!(brackets.unmatched_close, vec![1, 2]);
    }

    #[test]
    fn test_scan_ignores_comments() {
        let brackets = scan_brackets("(+ 1 2) # (unclosed\n(x)");
        assert!(brackets.unmatched_open.is_empty());
        assert_eq!(brackets.pairs, vec![(0, 6), (20, 22)]);
        assert_eq!(brackets.comments, vec![(8, 19)]);
    }

    #[test]
    fn test_highlight_plain_text_unchanged() {
        assert_eq!(CarlaeHighlighter.highlight("abc", 0), "abc");
    }

    #[test]
    fn test_highlight_matching_pair() {
        let highlighted = CarlaeHighlighter.highlight("(x)", 3);
        assert_eq!(highlighted, "\x1b[1;34m(\x1b[0mx\x1b[1;34m)\x1b[0m");
    }
}

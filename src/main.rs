use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use carlae::evaluator::set_max_call_depth;
use carlae::lexer::{is_blank, paren_balance};
use carlae::{Config, Environment, evaluate_top_level};
use clap::Parser;
use log::{debug, info};

#[derive(Parser)]
#[command(
    version,
    about = "Evaluate Carlae source, one top-level form at a time",
    long_about = "Evaluate Carlae source, one top-level form at a time. A form starts on a new line and continues onto following lines until its parentheses balance. A line reading `exit` stops the run."
)]
struct CliArgs {
    /// Source file to run; standard input is read when omitted
    input: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = CliArgs::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    set_max_call_depth(config.max_call_depth);

    let (source_id, source) = match read_source(&args) {
        Ok(read) => read,
        Err(e) => {
            eprintln!("Could not read input: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if run(&source_id, &source) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn read_source(args: &CliArgs) -> io::Result<(String, String)> {
    match &args.input {
        Some(path) => Ok((path.display().to_string(), fs::read_to_string(path)?)),
        None => Ok(("stdin".to_string(), io::read_to_string(io::stdin())?)),
    }
}

/// One top-level form and the line it starts on.
#[derive(Debug, PartialEq)]
struct Form {
    line: usize,
    text: String,
}

/// Groups source lines into forms. A form with unclosed parentheses carries
/// on into the following lines. An `exit` line outside a form ends the input.
fn split_forms(source: &str) -> Vec<Form> {
    let mut forms = Vec::new();
    let mut pending: Option<Form> = None;
    let mut balance = 0;

    for (index, line) in source.lines().enumerate() {
        match pending.as_mut() {
            Some(form) => {
                form.text.push('\n');
                form.text.push_str(line);
            }
            None => {
                if line.trim() == "exit" {
                    debug!("exit on line {}", index + 1);
                    break;
                }
                if is_blank(line) {
                    continue;
                }
                pending = Some(Form {
                    line: index + 1,
                    text: line.to_string(),
                });
            }
        }
        balance += paren_balance(line);
        if balance <= 0 {
            forms.extend(pending.take());
            balance = 0;
        }
    }
    // An unclosed form at the end still gets evaluated, and reported
    forms.extend(pending);
    forms
}

/// Evaluates every form in one session. Returns false if any form failed.
fn run(source_id: &str, source: &str) -> bool {
    let session = Environment::new_global();
    let mut all_ok = true;
    info!("running {}", source_id);

    for form in split_forms(source) {
        match evaluate_top_level(&form.text, Some(session.clone())) {
            Ok((value, _)) => println!("{}", value),
            Err(e) => {
                all_ok = false;
                let form_id = format!("{}:{}", source_id, form.line);
                if e.pretty_print(&form_id, &form.text).is_err() {
                    eprintln!("{}: {}", form_id, e);
                }
            }
        }
    }
    all_ok
}

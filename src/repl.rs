use crate::ast::Stmt;
use crate::evaluator::Evaluator;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::value::Closure;
use std::io::{self, BufRead, Write};

/// Interactive mode. One evaluator and one global scope live for the whole
/// session, so classes and variables persist between snippets. A line
/// ending in `:` opens a block that is read until a blank line, mirroring
/// how the language itself nests by indentation.
pub fn start() {
    println!("minipy interpreter v{}", env!("CARGO_PKG_VERSION"));
    println!("Type 'exit' or press Ctrl+D to quit");
    println!();

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    // The stdout lock is reentrant, so the prompt macros below still work.
    let mut handle = stdout.lock();
    let mut evaluator = Evaluator::new(&mut handle);
    let mut globals = Closure::new();

    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            break;
        }

        let snippet = match read_snippet(&mut input) {
            Some(snippet) => snippet,
            None => {
                println!();
                break;
            }
        };
        let trimmed = snippet.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" || trimmed == "quit" {
            break;
        }

        run_snippet(&snippet, &mut evaluator, &mut globals);
    }
}

/// Reads one snippet: a single line, or — when the line opens a block with
/// a trailing `:` — every continuation line up to the first blank one.
fn read_snippet(input: &mut impl BufRead) -> Option<String> {
    let mut snippet = String::new();
    if input.read_line(&mut snippet).ok()? == 0 {
        return None;
    }

    if snippet.trim_end().ends_with(':') {
        loop {
            print!("... ");
            io::stdout().flush().ok()?;
            let mut line = String::new();
            if input.read_line(&mut line).ok()? == 0 || line.trim().is_empty() {
                break;
            }
            snippet.push_str(&line);
        }
    }
    Some(snippet)
}

fn run_snippet<W: Write>(source: &str, evaluator: &mut Evaluator<'_, W>, globals: &mut Closure) {
    let lexer = match Lexer::new(source.to_string()) {
        Ok(lexer) => lexer,
        Err(error) => {
            error.report(source, None);
            return;
        }
    };
    let mut parser = Parser::new(lexer);
    let program = match parser.parse() {
        Ok(program) => program,
        Err(error) => {
            error.report(source, None);
            return;
        }
    };

    // A lone expression echoes its value; `None` results stay silent.
    if program.statements.len() == 1 {
        if let Stmt::Expression { expr, .. } = &program.statements[0] {
            match evaluator.evaluate_expression_in(expr, globals) {
                Ok(value) => {
                    if !value.is_none() {
                        match evaluator.render_value(&value, expr.span()) {
                            Ok(rendered) => println!("{}", rendered),
                            Err(error) => error.report(source, None),
                        }
                    }
                }
                Err(error) => error.report(source, None),
            }
            return;
        }
    }

    if let Err(error) = evaluator.evaluate_program_in(&program, globals) {
        error.report(source, None);
    }
}

use crate::error::MinipyError;
use crate::evaluator::Evaluator;
use crate::lexer::Lexer;
use crate::parser::Parser;
use std::io::{self, Write};

/// Lexes, parses and evaluates `source`, sending guest output to `output`.
pub fn interpret<W: Write>(source: &str, output: &mut W) -> Result<(), MinipyError> {
    let lexer = Lexer::new(source.to_string())?;
    let mut parser = Parser::new(lexer);
    let program = parser.parse()?;
    let mut evaluator = Evaluator::new(output);
    evaluator.evaluate_program(&program)
}

/// Runs a script against stdout, reporting any error against the source
/// text. Returns whether execution succeeded, for the process exit code.
pub fn run(source: &str, filename: Option<&str>) -> bool {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    match interpret(source, &mut handle) {
        Ok(()) => true,
        Err(error) => {
            error.report(source, filename);
            false
        }
    }
}

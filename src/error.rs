//! Shared error type for the compilation pipeline.
//!
//! Parse errors are fatal at the first offending token and carry the source
//! line plus the lexeme that broke the grammar. Semantic errors are collected
//! across the whole analysis pass and reported as one batch. Driver-level
//! I/O failures are reported by the driver itself.

use snafu::Snafu;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
pub enum CompileError {
    #[snafu(display("Parse error at line {line}: {message} (got {lexeme})"))]
    Parse {
        line: usize,
        lexeme: String,
        message: String,
    },

    #[snafu(display("Semantic errors found:\n{report}"))]
    Semantic { report: String },
}

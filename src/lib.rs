//! cc64 - a small C compiler for x86-64
//!
//! Four-stage pipeline over a disciplined C subset:
//! - `lexer` turns source text into a flat token stream.
//! - `parser` owns the grammar (with typedef aliases) and builds the AST.
//! - `semantic` resolves names, checks types, and plans stack frames.
//! - `codegen` re-walks the AST and emits AT&T x86-64 assembly.
//!
//! Semantic analysis must finish without errors before code generation
//! starts; the generator plans frame layout again with its own symbol table.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod semantic;
pub mod symtab;
pub mod token;

pub use error::{CompileError, CompileResult};

/// Compile a source string into x86-64 assembly text.
pub fn compile(source: &str) -> CompileResult<String> {
    let tokens = lexer::Lexer::new(source).tokenize();
    let mut program = parser::Parser::new(tokens).parse()?;
    semantic::SemanticAnalyzer::new().analyze(&mut program)?;
    let mut generator = codegen::CodeGenerator::new();
    Ok(generator.generate(&program))
}

use std::env;
use std::fs;
use std::process;

use cc64::codegen::CodeGenerator;
use cc64::lexer::Lexer;
use cc64::parser::Parser;
use cc64::semantic::SemanticAnalyzer;

fn print_usage(program: &str) {
    eprintln!("Usage: {program} <input.c> [-o <output.s>]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o <file>     Output file (default: output.s)");
    eprintln!("  -h, --help    Show this help");
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program_name = args.first().map(String::as_str).unwrap_or("cc64");

    let mut input_file: Option<String> = None;
    let mut output_file = "output.s".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-o" => {
                i += 1;
                if i >= args.len() {
                    eprintln!("Error: -o requires an argument");
                    process::exit(1);
                }
                output_file = args[i].clone();
            }
            "-h" | "--help" => {
                print_usage(program_name);
                return;
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown option: {arg}");
                print_usage(program_name);
                process::exit(1);
            }
            _ => {
                input_file = Some(args[i].clone());
            }
        }
        i += 1;
    }

    let Some(input_file) = input_file else {
        print_usage(program_name);
        process::exit(1);
    };

    eprintln!("Reading source file: {input_file}");
    let source = match fs::read_to_string(&input_file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: Could not read {input_file}: {e}");
            process::exit(1);
        }
    };

    eprintln!("Performing lexical analysis...");
    let tokens = Lexer::new(&source).tokenize();
    eprintln!("Tokens generated: {}", tokens.len());

    eprintln!("Performing syntax analysis...");
    let mut program = match Parser::new(tokens).parse() {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    eprintln!("Performing semantic analysis...");
    if let Err(e) = SemanticAnalyzer::new().analyze(&mut program) {
        eprintln!("{e}");
        process::exit(1);
    }

    eprintln!("Generating x86-64 assembly code...");
    let mut codegen = CodeGenerator::new();
    codegen.set_optimizations(true, true);
    let assembly = codegen.generate(&program);

    eprintln!("Writing assembly to: {output_file}");
    if let Err(e) = fs::write(&output_file, assembly) {
        eprintln!("Error: Could not write {output_file}: {e}");
        process::exit(1);
    }

    println!("Compilation successful!");
    println!("Assembly file generated: {output_file}");
    println!();
    println!("To assemble and run:");
    println!("  gcc -no-pie {output_file} -o program");
    println!("  ./program");
}

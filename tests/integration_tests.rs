// Integration tests for the cc64 compiler
// Each test compiles a C program through the full pipeline and verifies
// structural properties of the generated x86-64 assembly.

use cc64::{compile, CompileError};

fn assemble(source: &str) -> String {
    compile(source).expect("compilation should succeed")
}

fn compile_err(source: &str) -> CompileError {
    compile(source).expect_err("compilation should fail")
}

// ============================================================
// End-to-end scenarios
// ============================================================

#[test]
fn test_sum_of_locals() {
    let source = r#"
        int main() {
            int x = 10;
            int y = 20;
            printf("%d\n", x + y);
            return 0;
        }
    "#;
    let asm = assemble(source);
    assert!(asm.contains(".global main"));
    assert!(asm.contains("movq $10, %rax"));
    assert!(asm.contains("movq $20, %rax"));
    assert!(asm.contains("addq %rbx, %rax"));
    assert!(asm.contains("call printf@PLT"));
}

#[test]
fn test_recursive_factorial() {
    let source = r#"
        int f(int n) {
            if (n <= 1) return 1;
            return n * f(n - 1);
        }
        int main() {
            printf("%d\n", f(5));
            return 0;
        }
    "#;
    let asm = assemble(source);
    assert!(asm.contains("f:\n"));
    assert!(asm.contains("call f"));
    assert!(asm.contains("imulq %rbx, %rax"));
    assert!(asm.contains("setle %al"));
}

#[test]
fn test_for_loop_sum() {
    let source = r#"
        int main() {
            int s = 0;
            for (int i = 0; i < 10; i++) s = s + i;
            printf("%d\n", s);
            return 0;
        }
    "#;
    let asm = assemble(source);
    // Counted loop: exclusive bound check and unit increment
    assert!(asm.contains("cmpq %rax, %rbx"));
    assert!(asm.contains("jge .L"));
    assert!(asm.contains("incq %rax"));
}

#[test]
fn test_ternary_max() {
    let source = r#"
        int main() {
            int x = 10;
            int y = 5;
            printf("%d\n", (x > y) ? x : y);
            return 0;
        }
    "#;
    let asm = assemble(source);
    assert!(asm.contains("setg %al"));
    assert!(asm.contains("jz .L"));
    assert!(asm.contains("jmp .L"));
}

#[test]
fn test_typedef_alias() {
    let source = r#"
        typedef int entero;
        int main() {
            entero z = 30;
            printf("%d\n", z);
            return 0;
        }
    "#;
    let asm = assemble(source);
    assert!(asm.contains("movq $30, %rax"));
}

#[test]
fn test_dead_branch_absent_from_text_section() {
    let source = r#"
        int main() {
            if (0) { printf("%d\n", 100); } else { printf("%d\n", 30); }
            return 0;
        }
    "#;
    let asm = assemble(source);
    assert!(asm.contains("movq $30, %rax"));
    assert!(!asm.contains("movq $100, %rax"));
    // Only the surviving format string reaches the data section
    assert!(asm.contains(".STR0"));
    assert!(!asm.contains(".STR1"));
}

// ============================================================
// Optimization boundaries
// ============================================================

#[test]
fn test_constant_folding_emits_single_mov() {
    let asm = assemble(r#"int main() { printf("%d\n", 6 * 7); return 0; }"#);
    assert!(asm.contains("movq $42, %rax"));
    assert!(!asm.contains("imulq %rbx, %rax"));
}

#[test]
fn test_folding_covers_all_five_operators() {
    let asm = assemble(
        r#"
        int main() {
            println(2 + 3);
            println(7 - 4);
            println(6 * 7);
            println(9 / 3);
            println(9 % 4);
            return 0;
        }
    "#,
    );
    for folded in ["$5", "$3", "$42", "$1"] {
        assert!(
            asm.contains(&format!("movq {folded}, %rax")),
            "missing folded constant {folded}"
        );
    }
    assert!(!asm.contains("idivq"));
}

#[test]
fn test_zero_divisor_disables_fold() {
    let asm = assemble("int main() { return 10 / 0; }");
    assert!(asm.contains("cqto"));
    assert!(asm.contains("idivq %rbx"));
}

#[test]
fn test_zero_modulus_disables_fold() {
    let asm = assemble("int main() { return 10 % 0; }");
    assert!(asm.contains("idivq %rbx"));
    assert!(asm.contains("movq %rdx, %rax"));
}

// ============================================================
// Calling convention
// ============================================================

#[test]
fn test_printf_with_float_argument_sets_eax_one() {
    let asm = assemble(r#"int main() { printf("%f\n", 2.5); return 0; }"#);
    assert!(asm.contains("movl $1, %eax"));
    assert!(asm.contains(".double 2.5"));
}

#[test]
fn test_printf_without_float_argument_sets_eax_zero() {
    let asm = assemble(r#"int main() { printf("%d %d\n", 1, 2); return 0; }"#);
    assert!(asm.contains("movl $0, %eax"));
    assert!(!asm.contains("movl $1, %eax"));
}

#[test]
fn test_println_reuses_integer_format() {
    let asm = assemble("int main() { println(7); return 0; }");
    assert!(asm.contains("leaq int_fmt(%rip), %rdi"));
    assert!(asm.contains("movq %rax, %rsi"));
}

#[test]
fn test_arguments_delivered_in_sysv_registers() {
    let source = r#"
        int f(int a, int b, int c) { return a + b + c; }
        int main() { return f(1, 2, 3); }
    "#;
    let asm = assemble(source);
    assert!(asm.contains("movq %rax, %rdi"));
    assert!(asm.contains("movq %rax, %rsi"));
    assert!(asm.contains("movq %rax, %rdx"));
    // Callee spills its arguments into the frame
    assert!(asm.contains("movq %rdi, -8(%rbp)"));
    assert!(asm.contains("movq %rsi, -16(%rbp)"));
    assert!(asm.contains("movq %rdx, -24(%rbp)"));
}

#[test]
fn test_frame_sizes_are_multiples_of_16() {
    let source = r#"
        int one() { int a = 1; return a; }
        int five(int p) { int a = 1; int b = 2; int c = 3; int d = 4; return p; }
        int main() { return one() + five(9); }
    "#;
    let asm = assemble(source);
    // Frame reservations are the subq instructions directly after the
    // prologue's mov; call-site padding is not one of them
    let lines: Vec<&str> = asm.lines().map(str::trim).collect();
    let mut reservations = 0;
    for pair in lines.windows(2) {
        if pair[0] != "movq %rsp, %rbp" {
            continue;
        }
        if let Some(amount) = pair[1]
            .strip_prefix("subq $")
            .and_then(|rest| rest.strip_suffix(", %rsp"))
        {
            let amount: i64 = amount.parse().unwrap();
            assert_eq!(amount % 16, 0, "unaligned frame reservation: {}", pair[1]);
            reservations += 1;
        }
    }
    assert!(reservations >= 2);
}

// ============================================================
// Types
// ============================================================

#[test]
fn test_unsigned_comparison_uses_unsigned_set() {
    let source = r#"
        int main() {
            unsigned int a = 1;
            unsigned int b = 2;
            if (a < b) return 1;
            if (a >= b) return 2;
            return 0;
        }
    "#;
    let asm = assemble(source);
    assert!(asm.contains("setb %al"));
    assert!(asm.contains("setae %al"));
    assert!(!asm.contains("setl %al"));
    assert!(!asm.contains("setge %al"));
}

#[test]
fn test_float_arithmetic_uses_sse() {
    let source = r#"
        int main() {
            float a = 1.5;
            float b = 2.5;
            float c = a + b;
            printf("%f\n", c);
            return 0;
        }
    "#;
    let asm = assemble(source);
    assert!(asm.contains("addsd %xmm1, %xmm0"));
    assert!(asm.contains(".double 1.5"));
    assert!(asm.contains(".double 2.5"));
}

#[test]
fn test_int_initializer_converted_to_float_slot() {
    let asm = assemble("int main() { float x = 3; return 0; }");
    assert!(asm.contains("cvtsi2sdq %rax, %xmm0"));
}

#[test]
fn test_multidimensional_array_indexing() {
    let source = r#"
        int main() {
            int m[3][4];
            m[1][2] = 9;
            return m[1][2];
        }
    "#;
    let asm = assemble(source);
    // Row index scaled by the trailing dimension, element by 8 bytes
    assert!(asm.contains("imulq $4, %rax"));
    assert!(asm.contains("imulq $8, %rax"));
    assert!(asm.contains("leaq -96(%rbp), %rbx"));
}

// ============================================================
// Lowering boundaries
// ============================================================

#[test]
fn test_for_condition_fallback_bound_is_ten() {
    // A condition that is not `v < E` / `v <= E` falls back to bound 10
    let source = "int main() { int s = 0; for (int i = 0; i != 3; i++) s = s + 1; return s; }";
    let asm = assemble(source);
    assert!(asm.contains("movq $10, %rax"));
}

#[test]
fn test_shadowed_names_resolve_to_innermost() {
    let source = r#"
        int main() {
            int x = 1;
            { int x = 2; printf("%d\n", x); }
            return x;
        }
    "#;
    assert!(compile(source).is_ok());
}

#[test]
fn test_preprocessor_lines_and_comments_ignored() {
    let source = "#include <stdio.h>\n// comment\nint main() { /* block */ return 0; }";
    assert!(compile(source).is_ok());
}

// ============================================================
// Diagnostics
// ============================================================

#[test]
fn test_parse_error_reports_line_and_lexeme() {
    let err = compile_err("int main() {\n  int x = * 2;\n}");
    let message = err.to_string();
    assert!(message.contains("Parse error at line 2"));
    assert!(message.contains("*"));
}

#[test]
fn test_semantic_errors_are_batched() {
    let err = compile_err("int main() { return a + b; }");
    let message = err.to_string();
    assert!(message.contains("Undefined variable: a"));
    assert!(message.contains("Undefined variable: b"));
}

#[test]
fn test_missing_main_is_an_error() {
    let err = compile_err("int helper() { return 1; }");
    assert!(err.to_string().contains("No main function defined"));
}

#[test]
fn test_demo_program_compiles() {
    let asm = assemble(include_str!("../demos/example_complete.c"));
    assert!(asm.contains("factorial:"));
    assert!(asm.contains("call printf@PLT"));
}

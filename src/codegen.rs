//! x86-64 Code Generator
//!
//! Emits AT&T-syntax assembly for the System V AMD64 ABI, assembleable with
//! `gcc -no-pie` against the host C library. A fixed accumulator scheme is
//! used instead of register allocation: %rax holds every expression result
//! and function return value, %rbx the right operand of a binary operation,
//! %xmm0/%xmm1 float temporaries. Incoming arguments arrive in
//! %rdi..%r9 and are spilled to local slots in the prologue.
//!
//! The generator re-plans frame layout with its own symbol table; a whole
//! function's locals are pre-declared before the prologue so the frame can
//! be reserved with a single 16-byte-aligned `subq`.

use crate::ast::*;
use crate::symtab::{Symbol, SymbolTable};

/// Integer argument registers, in System V AMD64 order.
const ARG_REGS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

pub struct CodeGenerator {
    table: SymbolTable,
    code: String,
    data: String,
    label_counter: u32,
    string_counter: u32,
    fold_constants: bool,
    eliminate_dead_code: bool,
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self {
            table: SymbolTable::new(),
            code: String::new(),
            data: String::new(),
            label_counter: 0,
            string_counter: 0,
            fold_constants: true,
            eliminate_dead_code: true,
        }
    }

    pub fn set_optimizations(&mut self, fold_constants: bool, eliminate_dead_code: bool) {
        self.fold_constants = fold_constants;
        self.eliminate_dead_code = eliminate_dead_code;
    }

    /// Generate the complete assembly text for a program.
    pub fn generate(&mut self, program: &Program) -> String {
        self.code.push_str(".text\n");
        self.code.push_str(".global main\n\n");

        for func in &program.functions {
            self.gen_function(func);
            self.code.push('\n');
        }

        self.code.push_str("print_int:\n");
        self.code.push_str("    pushq %rbp\n");
        self.code.push_str("    movq %rsp, %rbp\n");
        self.code.push_str("    movq %rdi, %rsi\n");
        self.code.push_str("    leaq int_fmt(%rip), %rdi\n");
        self.code.push_str("    movl $0, %eax\n");
        self.code.push_str("    call printf@PLT\n");
        self.code.push_str("    leave\n");
        self.code.push_str("    ret\n\n");

        self.code.push_str(".data\n");
        self.code.push_str("int_fmt: .asciz \"%ld\\n\"\n");
        self.code.push_str(&self.data);
        self.code.push_str(".section .note.GNU-stack,\"\",@progbits\n");

        self.code.clone()
    }

    fn new_label(&mut self) -> String {
        let label = format!(".L{}", self.label_counter);
        self.label_counter += 1;
        label
    }

    fn new_string_label(&mut self) -> String {
        let label = format!(".STR{}", self.string_counter);
        self.string_counter += 1;
        label
    }

    fn emit(&mut self, instruction: &str) {
        self.code.push_str("    ");
        self.code.push_str(instruction);
        self.code.push('\n');
    }

    fn emit_label(&mut self, label: &str) {
        self.code.push_str(label);
        self.code.push_str(":\n");
    }

    fn prologue(&mut self, name: &str, stack_size: i32) {
        self.emit_label(name);
        self.emit("pushq %rbp");
        self.emit("movq %rsp, %rbp");
        let aligned = (stack_size + 15) & !15;
        if aligned > 0 {
            self.emit(&format!("subq ${aligned}, %rsp"));
        }
    }

    fn epilogue(&mut self) {
        self.emit("leave");
        self.emit("ret");
    }

    // A lookup miss makes loads and stores a silent no-op.

    fn load_variable(&mut self, name: &str, ty: DataType) {
        let Some(offset) = self.table.lookup(name).map(|sym| sym.offset) else {
            return;
        };
        self.emit(&format!("movq {offset}(%rbp), %rax"));
        if ty == DataType::Float {
            self.emit("movq %rax, %xmm0");
        }
    }

    fn store_variable(&mut self, name: &str, ty: DataType) {
        let Some(offset) = self.table.lookup(name).map(|sym| sym.offset) else {
            return;
        };
        if ty == DataType::Float {
            self.emit("movq %xmm0, %rax");
        }
        self.emit(&format!("movq %rax, {offset}(%rbp)"));
    }

    /// Numeric conversion of the value in %rax (float values also live in
    /// %xmm0) to the declared type.
    fn convert_type(&mut self, from: DataType, to: DataType) {
        if from == to {
            return;
        }
        match (from, to) {
            (DataType::Int | DataType::Long | DataType::UInt, DataType::Float) => {
                self.emit("cvtsi2sdq %rax, %xmm0");
            }
            (DataType::Float, DataType::Int | DataType::Long | DataType::UInt) => {
                self.emit("cvttsd2siq %xmm0, %rax");
            }
            (DataType::Int, DataType::Long) => self.emit("cltq"),
            (DataType::UInt, DataType::Long) => self.emit("movl %eax, %eax"),
            _ => {}
        }
    }

    /// Leave the linearized element offset (index * 8) in %rax.
    ///
    /// Horner-style unrolling over the dimension list: each step multiplies
    /// the accumulator by the product of the remaining dimensions and adds
    /// the next index.
    fn array_offset(&mut self, indices: &[Expr], dims: &[i32]) {
        if indices.is_empty() {
            return;
        }

        self.gen_expr(&indices[0]);
        self.emit("pushq %rax");

        for i in 1..indices.len() {
            let dim_product: i64 = dims.iter().skip(i).map(|&d| d as i64).product();

            self.emit("popq %rax");
            self.emit(&format!("imulq ${dim_product}, %rax"));
            self.emit("pushq %rax");

            self.gen_expr(&indices[i]);
            self.emit("popq %rbx");
            self.emit("addq %rbx, %rax");
            self.emit("pushq %rax");
        }

        self.emit("popq %rax");
        self.emit("imulq $8, %rax");
    }

    fn gen_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Binary { op, left, right } => self.gen_binary(expr.ty, *op, left, right),
            ExprKind::Unary { op, operand } => self.gen_unary(expr.ty, *op, operand),
            ExprKind::Ternary {
                condition,
                true_expr,
                false_expr,
            } => {
                let false_label = self.new_label();
                let end_label = self.new_label();

                self.gen_expr(condition);
                self.emit("testq %rax, %rax");
                self.emit(&format!("jz {false_label}"));

                self.gen_expr(true_expr);
                self.emit(&format!("jmp {end_label}"));

                self.emit_label(&false_label);
                self.gen_expr(false_expr);

                self.emit_label(&end_label);
            }
            ExprKind::Literal { value } => self.gen_literal(value, expr.ty),
            ExprKind::Identifier { name } => {
                if let Some(ty) = self.table.lookup(name).map(|sym| sym.ty) {
                    self.load_variable(name, ty);
                }
            }
            ExprKind::ArrayAccess { array, indices } => {
                let ExprKind::Identifier { name } = &array.kind else {
                    return;
                };
                let Some(sym) = self.table.lookup(name).cloned() else {
                    return;
                };

                self.array_offset(indices, &sym.array_dims);

                // Array parameters hold the caller's base address; local
                // arrays live in the frame itself
                if sym.is_parameter {
                    self.emit(&format!("movq {}(%rbp), %rbx", sym.offset));
                } else {
                    self.emit(&format!("leaq {}(%rbp), %rbx", sym.offset));
                }
                self.emit("addq %rax, %rbx");
                self.emit("movq (%rbx), %rax");
            }
            ExprKind::Call { name, args } => self.gen_call(name, args),
        }
    }

    fn gen_binary(&mut self, ty: DataType, op: BinOp, left: &Expr, right: &Expr) {
        if self.fold_constants {
            if let Some(value) = fold(ty, op, left, right) {
                self.emit(&format!("movq ${value}, %rax"));
                return;
            }
        }

        self.gen_expr(left);
        self.emit("pushq %rax");
        self.gen_expr(right);
        self.emit("movq %rax, %rbx");
        self.emit("popq %rax");

        if ty == DataType::Float {
            self.emit("movq %rax, %xmm0");
            self.emit("movq %rbx, %xmm1");
            match op {
                BinOp::Add => self.emit("addsd %xmm1, %xmm0"),
                BinOp::Sub => self.emit("subsd %xmm1, %xmm0"),
                BinOp::Mul => self.emit("mulsd %xmm1, %xmm0"),
                BinOp::Div => self.emit("divsd %xmm1, %xmm0"),
                _ => {}
            }
            self.emit("movq %xmm0, %rax");
            return;
        }

        // Unsigned condition codes when the left operand is unsigned
        let unsigned = left.ty == DataType::UInt;
        match op {
            BinOp::Add => self.emit("addq %rbx, %rax"),
            BinOp::Sub => self.emit("subq %rbx, %rax"),
            BinOp::Mul => self.emit("imulq %rbx, %rax"),
            BinOp::Div => {
                self.emit("cqto");
                self.emit("idivq %rbx");
            }
            BinOp::Mod => {
                self.emit("cqto");
                self.emit("idivq %rbx");
                self.emit("movq %rdx, %rax");
            }
            BinOp::Lt => self.compare(if unsigned { "b" } else { "l" }),
            BinOp::Le => self.compare(if unsigned { "be" } else { "le" }),
            BinOp::Gt => self.compare(if unsigned { "a" } else { "g" }),
            BinOp::Ge => self.compare(if unsigned { "ae" } else { "ge" }),
            BinOp::Eq => self.compare("e"),
            BinOp::Ne => self.compare("ne"),
            // Operands are already normalized 0/1 comparison results
            BinOp::And => self.emit("andq %rbx, %rax"),
            BinOp::Or => self.emit("orq %rbx, %rax"),
        }
    }

    fn compare(&mut self, cc: &str) {
        self.emit("cmpq %rbx, %rax");
        self.emit(&format!("set{cc} %al"));
        self.emit("movzbq %al, %rax");
    }

    fn gen_unary(&mut self, ty: DataType, op: UnOp, operand: &Expr) {
        self.gen_expr(operand);

        match op {
            UnOp::Neg => {
                if ty == DataType::Float {
                    self.emit("movq %rax, %xmm0");
                    self.emit("xorpd %xmm1, %xmm1");
                    self.emit("subsd %xmm0, %xmm1");
                    self.emit("movq %xmm1, %rax");
                } else {
                    self.emit("negq %rax");
                }
            }
            UnOp::Not => {
                self.emit("testq %rax, %rax");
                self.emit("setz %al");
                self.emit("movzbq %al, %rax");
            }
        }
    }

    fn gen_literal(&mut self, value: &str, ty: DataType) {
        match ty {
            DataType::Float => {
                let label = self.new_string_label();
                self.data.push_str(&format!("{label}: .double {value}\n"));
                self.emit(&format!("movsd {label}(%rip), %xmm0"));
                self.emit("movq %xmm0, %rax");
            }
            DataType::Str => {
                let label = self.new_string_label();
                let escaped = escape_string(value);
                self.data
                    .push_str(&format!("{label}: .asciz \"{escaped}\"\n"));
                self.emit(&format!("leaq {label}(%rip), %rax"));
            }
            _ => self.emit(&format!("movq ${value}, %rax")),
        }
    }

    fn gen_call(&mut self, name: &str, args: &[Expr]) {
        if name == "println" {
            if let Some(arg) = args.first() {
                self.gen_expr(arg);
                self.emit("movq %rax, %rsi");
                self.emit("leaq int_fmt(%rip), %rdi");
                self.emit("movl $0, %eax");
                self.emit("subq $8, %rsp");
                self.emit("call printf@PLT");
                self.emit("addq $8, %rsp");
            }
            return;
        }

        if name == "printf" {
            let has_float_arg = args.iter().skip(1).any(|arg| arg.ty == DataType::Float);

            // One float value: it travels in %xmm0 and %al announces one
            // vector register to the variadic callee
            if has_float_arg && args.len() >= 2 {
                self.gen_expr(&args[0]);
                self.emit("movq %rax, %rdi");
                self.gen_expr(&args[1]);
                self.emit("movq %rax, %xmm0");
                self.emit("movl $1, %eax");
                self.emit("call printf@PLT");
                return;
            }

            for i in (0..args.len()).rev() {
                self.gen_expr(&args[i]);
                if i < ARG_REGS.len() {
                    self.emit(&format!("movq %rax, %{}", ARG_REGS[i]));
                } else {
                    self.emit("pushq %rax");
                }
            }
            self.emit("movl $0, %eax");
            self.emit("call printf@PLT");
            return;
        }

        let num_args = args.len();
        for i in (0..num_args).rev() {
            self.gen_expr(&args[i]);
            if i < ARG_REGS.len() {
                self.emit(&format!("movq %rax, %{}", ARG_REGS[i]));
            } else {
                self.emit("pushq %rax");
            }
        }

        // Keep %rsp 16-byte aligned at the call site
        let need_alignment = num_args <= ARG_REGS.len() && num_args % 2 == 1;
        if need_alignment {
            self.emit("subq $8, %rsp");
        }
        self.emit(&format!("call {name}"));
        if need_alignment {
            self.emit("addq $8, %rsp");
        }
    }

    fn gen_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl {
                name,
                ty,
                initializer,
                array_dims,
                ..
            } => {
                if self.table.lookup(name).is_none() {
                    let offset = self.table.allocate_stack_space(slot_size(array_dims));
                    self.table.declare_variable(
                        name,
                        Symbol {
                            name: name.clone(),
                            ty: *ty,
                            is_mutable: true,
                            is_parameter: false,
                            offset,
                            array_dims: array_dims.clone(),
                        },
                    );
                }

                if let Some(init) = initializer {
                    self.gen_expr(init);
                    self.convert_type(init.ty, *ty);
                    self.store_variable(name, *ty);
                }
            }
            Stmt::Assign { target, value } => {
                self.gen_expr(value);
                self.emit("pushq %rax");

                match &target.kind {
                    ExprKind::ArrayAccess { array, indices } => {
                        let ExprKind::Identifier { name } = &array.kind else {
                            return;
                        };
                        let Some(sym) = self.table.lookup(name).cloned() else {
                            return;
                        };

                        self.array_offset(indices, &sym.array_dims);

                        if sym.is_parameter {
                            self.emit(&format!("movq {}(%rbp), %rbx", sym.offset));
                        } else {
                            self.emit(&format!("leaq {}(%rbp), %rbx", sym.offset));
                        }
                        self.emit("addq %rax, %rbx");
                        self.emit("popq %rax");
                        self.emit("movq %rax, (%rbx)");
                    }
                    ExprKind::Identifier { name } => {
                        self.emit("popq %rax");
                        if let Some(ty) = self.table.lookup(name).map(|sym| sym.ty) {
                            self.store_variable(name, ty);
                        }
                    }
                    _ => {}
                }
            }
            Stmt::Expr { expression } => self.gen_expr(expression),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                // A constant condition keeps only the taken branch
                if self.eliminate_dead_code {
                    if let Some(value) = literal_condition(condition) {
                        if value == 0 {
                            if let Some(else_branch) = else_branch {
                                self.gen_stmt(else_branch);
                            }
                        } else {
                            self.gen_stmt(then_branch);
                        }
                        return;
                    }
                }

                self.gen_expr(condition);
                self.emit("testq %rax, %rax");

                match else_branch {
                    Some(else_branch) => {
                        let else_label = self.new_label();
                        let end_label = self.new_label();
                        self.emit(&format!("jz {else_label}"));
                        self.gen_stmt(then_branch);
                        self.emit(&format!("jmp {end_label}"));
                        self.emit_label(&else_label);
                        self.gen_stmt(else_branch);
                        self.emit_label(&end_label);
                    }
                    None => {
                        let end_label = self.new_label();
                        self.emit(&format!("jz {end_label}"));
                        self.gen_stmt(then_branch);
                        self.emit_label(&end_label);
                    }
                }
            }
            Stmt::While { condition, body } => {
                let start_label = self.new_label();
                let end_label = self.new_label();

                self.emit_label(&start_label);
                self.gen_expr(condition);
                self.emit("testq %rax, %rax");
                self.emit(&format!("jz {end_label}"));

                self.gen_stmt(body);
                self.emit(&format!("jmp {start_label}"));

                self.emit_label(&end_label);
            }
            Stmt::For {
                var_name,
                start,
                end,
                body,
            } => {
                let start_label = self.new_label();
                let end_label = self.new_label();

                self.gen_expr(start);
                self.store_variable(var_name, DataType::Int);

                self.emit_label(&start_label);

                // The upper bound is re-evaluated on every iteration
                self.load_variable(var_name, DataType::Int);
                self.emit("pushq %rax");
                self.gen_expr(end);
                self.emit("popq %rbx");
                self.emit("cmpq %rax, %rbx");
                self.emit(&format!("jge {end_label}"));

                self.gen_stmt(body);

                self.load_variable(var_name, DataType::Int);
                self.emit("incq %rax");
                self.store_variable(var_name, DataType::Int);

                self.emit(&format!("jmp {start_label}"));
                self.emit_label(&end_label);
            }
            Stmt::Block { statements } => {
                for stmt in statements {
                    self.gen_stmt(stmt);
                }
            }
            Stmt::Return { value } => {
                if let Some(value) = value {
                    self.gen_expr(value);
                }
                self.epilogue();
            }
        }
    }

    /// Walk a statement tree and allocate a slot for every declaration it
    /// contains, so the frame size is known before the prologue. Names are
    /// deduplicated per function.
    fn predeclare_variables(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl {
                name,
                ty,
                array_dims,
                ..
            } => {
                if self.table.lookup(name).is_none() {
                    let offset = self.table.allocate_stack_space(slot_size(array_dims));
                    self.table.declare_variable(
                        name,
                        Symbol {
                            name: name.clone(),
                            ty: *ty,
                            is_mutable: true,
                            is_parameter: false,
                            offset,
                            array_dims: array_dims.clone(),
                        },
                    );
                }
            }
            Stmt::Block { statements } => {
                for stmt in statements {
                    self.predeclare_variables(stmt);
                }
            }
            Stmt::If {
                then_branch,
                else_branch,
                ..
            } => {
                self.predeclare_variables(then_branch);
                if let Some(else_branch) = else_branch {
                    self.predeclare_variables(else_branch);
                }
            }
            Stmt::While { body, .. } => self.predeclare_variables(body),
            Stmt::For {
                var_name, body, ..
            } => {
                if self.table.lookup(var_name).is_none() {
                    let offset = self.table.allocate_stack_space(8);
                    self.table.declare_variable(
                        var_name,
                        Symbol {
                            name: var_name.clone(),
                            ty: DataType::Int,
                            is_mutable: true,
                            is_parameter: false,
                            offset,
                            array_dims: Vec::new(),
                        },
                    );
                }
                self.predeclare_variables(body);
            }
            _ => {}
        }
    }

    fn gen_function(&mut self, func: &FunctionDecl) {
        self.table.enter_scope();
        self.table.reset_offset();

        // Incoming register arguments become ordinary spilled locals
        for param in func.params.iter().take(ARG_REGS.len()) {
            let offset = self.table.allocate_stack_space(8);
            self.table.declare_variable(
                &param.name,
                Symbol {
                    name: param.name.clone(),
                    ty: param.ty,
                    is_mutable: true,
                    is_parameter: false,
                    offset,
                    array_dims: param.array_dims.clone(),
                },
            );
        }

        for stmt in &func.body {
            self.predeclare_variables(stmt);
        }
        let stack_size = -self.table.current_offset();

        self.prologue(&func.name, stack_size);

        for (i, param) in func.params.iter().take(ARG_REGS.len()).enumerate() {
            if let Some(offset) = self.table.lookup(&param.name).map(|sym| sym.offset) {
                self.emit(&format!("movq %{}, {}(%rbp)", ARG_REGS[i], offset));
            }
        }

        for stmt in &func.body {
            self.gen_stmt(stmt);
        }

        // A void function falls off its end without an explicit return
        if func.return_type == DataType::Void {
            self.epilogue();
        }

        self.table.exit_scope();
    }
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame bytes for one declaration: 8 per scalar, 8 * product of positive
/// dimensions for an array.
fn slot_size(array_dims: &[i32]) -> i32 {
    let mut size = 8;
    for &dim in array_dims {
        if dim > 0 {
            size *= dim;
        }
    }
    size
}

/// Compile-time value of an integer-literal arithmetic expression, when both
/// operands are integer literals and the result type is not float. Division
/// and modulo by a zero literal disable the fold.
fn fold(ty: DataType, op: BinOp, left: &Expr, right: &Expr) -> Option<i64> {
    if ty == DataType::Float {
        return None;
    }
    let l = left.int_literal()?;
    let r = right.int_literal()?;
    match op {
        BinOp::Add => Some(l.wrapping_add(r)),
        BinOp::Sub => Some(l.wrapping_sub(r)),
        BinOp::Mul => Some(l.wrapping_mul(r)),
        BinOp::Div if r != 0 => Some(l.wrapping_div(r)),
        BinOp::Mod if r != 0 => Some(l.wrapping_rem(r)),
        _ => None,
    }
}

/// A literal `if` condition's truth value: zero, or non-zero (unparseable
/// literals count as taken).
fn literal_condition(expr: &Expr) -> Option<i64> {
    match &expr.kind {
        ExprKind::Literal { value } => Some(
            value
                .parse::<i64>()
                .or_else(|_| value.parse::<f64>().map(|f| f as i64))
                .unwrap_or(1),
        ),
        _ => None,
    }
}

/// Render control characters back into assembly-source escapes.
fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => result.push_str("\\n"),
            '\t' => result.push_str("\\t"),
            '\r' => result.push_str("\\r"),
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            _ => result.push(c),
        }
    }
    result
}

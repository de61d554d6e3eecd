//! Semantic analysis: name resolution, type checking, frame planning
//!
//! One pre-order traversal that binds identifiers to symbols, annotates every
//! expression with its resolved type, checks operator/call/assignment
//! compatibility, and assigns a stack offset to every parameter and local.
//! Errors accumulate so a single run surfaces every diagnostic; the caller
//! aborts before code generation if any were recorded.

use crate::ast::*;
use crate::error::{CompileError, CompileResult};
use crate::symtab::{FunctionSymbol, Symbol, SymbolTable};

pub struct SemanticAnalyzer {
    table: SymbolTable,
    current_return_type: DataType,
    errors: Vec<String>,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        let mut table = SymbolTable::new();

        // Builtins: println prints one integer; printf is variadic, so its
        // fixed prefix is the format string and the value arguments carry no
        // declared types
        table.declare_function(
            "println",
            FunctionSymbol {
                name: "println".to_string(),
                return_type: DataType::Void,
                param_types: vec![DataType::Int],
                param_names: vec!["value".to_string()],
                is_variadic: false,
            },
        );
        table.declare_function(
            "printf",
            FunctionSymbol {
                name: "printf".to_string(),
                return_type: DataType::Int,
                param_types: vec![DataType::Str],
                param_names: vec!["format".to_string()],
                is_variadic: true,
            },
        );

        Self {
            table,
            current_return_type: DataType::Void,
            errors: Vec::new(),
        }
    }

    /// Analyze a whole program, annotating the AST in place.
    pub fn analyze(&mut self, program: &mut Program) -> CompileResult<()> {
        for func in &mut program.functions {
            self.check_function(func);
        }

        if self.table.lookup_function("main").is_none() {
            self.error("No main function defined");
        }

        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CompileError::Semantic {
                report: self
                    .errors
                    .iter()
                    .map(|e| format!("Semantic error: {e}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
            })
        }
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// `actual` may be used where `expected` is required: equal types, the
    /// promotions INT->LONG, INT/LONG->FLOAT, UINT->LONG, and the cross-sign
    /// relaxations INT<->UINT.
    fn compatible(expected: DataType, actual: DataType) -> bool {
        if expected == actual {
            return true;
        }
        matches!(
            (expected, actual),
            (DataType::Long, DataType::Int)
                | (DataType::Float, DataType::Int)
                | (DataType::Float, DataType::Long)
                | (DataType::Long, DataType::UInt)
                | (DataType::UInt, DataType::Int)
                | (DataType::Int, DataType::UInt)
        )
    }

    /// The common type of a binary expression's operands.
    fn common_type(t1: DataType, t2: DataType) -> DataType {
        if t1 == t2 {
            return t1;
        }
        if t1 == DataType::Float || t2 == DataType::Float {
            return DataType::Float;
        }
        if t1 == DataType::Long || t2 == DataType::Long {
            return DataType::Long;
        }
        // Mixed signedness widens to signed long
        if matches!(
            (t1, t2),
            (DataType::UInt, DataType::Int) | (DataType::Int, DataType::UInt)
        ) {
            return DataType::Long;
        }
        t1
    }

    fn check_function(&mut self, func: &mut FunctionDecl) {
        let symbol = FunctionSymbol {
            name: func.name.clone(),
            return_type: func.return_type,
            param_types: func.params.iter().map(|p| p.ty).collect(),
            param_names: func.params.iter().map(|p| p.name.clone()).collect(),
            is_variadic: false,
        };
        if !self.table.declare_function(&func.name, symbol) {
            self.error(format!("Function already declared: {}", func.name));
        }

        self.table.enter_scope();
        self.table.reset_offset();
        self.current_return_type = func.return_type;

        // Parameters live above the saved base pointer and return address
        let mut param_offset = 16;
        for param in &func.params {
            self.table.declare_variable(
                &param.name,
                Symbol {
                    name: param.name.clone(),
                    ty: param.ty,
                    is_mutable: true,
                    is_parameter: true,
                    offset: param_offset,
                    array_dims: param.array_dims.clone(),
                },
            );
            param_offset += 8;
        }

        // The body block opens its own scope inside the parameter scope
        self.table.enter_scope();
        for stmt in &mut func.body {
            self.check_stmt(stmt);
        }
        self.table.exit_scope();

        self.table.exit_scope();
    }

    fn check_stmt(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::VarDecl {
                name,
                ty,
                initializer,
                array_dims,
                is_mutable,
            } => {
                if let Some(init) = initializer {
                    self.check_expr(init);
                    if !Self::compatible(*ty, init.ty) {
                        self.error(format!("Type mismatch in variable declaration: {name}"));
                    }
                }

                // 8 bytes per scalar slot; arrays take 8 * product of their
                // (positive) dimensions
                let mut size = 8;
                for &dim in array_dims.iter() {
                    if dim > 0 {
                        size *= dim;
                    }
                }
                let offset = self.table.allocate_stack_space(size);

                let declared = self.table.declare_variable(
                    name,
                    Symbol {
                        name: name.clone(),
                        ty: *ty,
                        is_mutable: *is_mutable,
                        is_parameter: false,
                        offset,
                        array_dims: array_dims.clone(),
                    },
                );
                if !declared {
                    self.error(format!("Variable already declared: {name}"));
                }
            }
            Stmt::Assign { target, value } => {
                self.check_expr(target);
                self.check_expr(value);

                if !target.is_lvalue {
                    self.error("Left side of assignment must be an lvalue");
                }
                if !Self::compatible(target.ty, value.ty) {
                    self.error("Type mismatch in assignment");
                }
            }
            Stmt::Expr { expression } => self.check_expr(expression),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_expr(condition);
                self.check_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.check_stmt(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.check_expr(condition);
                self.check_stmt(body);
            }
            Stmt::For {
                var_name,
                start,
                end,
                body,
            } => {
                // The loop header opens a scope holding the counter
                self.table.enter_scope();
                let offset = self.table.allocate_stack_space(8);
                self.table.declare_variable(
                    var_name,
                    Symbol {
                        name: var_name.clone(),
                        ty: DataType::Int,
                        is_mutable: false,
                        is_parameter: false,
                        offset,
                        array_dims: Vec::new(),
                    },
                );

                self.check_expr(start);
                self.check_expr(end);
                self.check_stmt(body);

                self.table.exit_scope();
            }
            Stmt::Block { statements } => {
                self.table.enter_scope();
                for stmt in statements {
                    self.check_stmt(stmt);
                }
                self.table.exit_scope();
            }
            Stmt::Return { value } => match value {
                Some(value) => {
                    self.check_expr(value);
                    if !Self::compatible(self.current_return_type, value.ty) {
                        self.error("Return type mismatch");
                    }
                }
                None => {
                    if self.current_return_type != DataType::Void {
                        self.error("Function must return a value");
                    }
                }
            },
        }
    }

    fn check_expr(&mut self, expr: &mut Expr) {
        let ty = match &mut expr.kind {
            ExprKind::Binary { op, left, right } => {
                self.check_expr(left);
                self.check_expr(right);
                if op.is_arithmetic() {
                    Self::common_type(left.ty, right.ty)
                } else {
                    // Relational, equality, and logical results are 0/1 ints
                    DataType::Int
                }
            }
            ExprKind::Unary { operand, .. } => {
                self.check_expr(operand);
                operand.ty
            }
            ExprKind::Ternary {
                condition,
                true_expr,
                false_expr,
            } => {
                self.check_expr(condition);
                self.check_expr(true_expr);
                self.check_expr(false_expr);
                Self::common_type(true_expr.ty, false_expr.ty)
            }
            // Literal types are fixed at construction
            ExprKind::Literal { .. } => expr.ty,
            ExprKind::Identifier { name } => match self.table.lookup(name) {
                Some(sym) => sym.ty,
                None => {
                    let message = format!("Undefined variable: {name}");
                    self.error(message);
                    DataType::Unknown
                }
            },
            ExprKind::ArrayAccess { array, indices } => {
                self.check_expr(array);

                for index in indices.iter_mut() {
                    self.check_expr(index);
                    if index.ty != DataType::Int && index.ty != DataType::Long {
                        self.error("Array index must be of integer type");
                    }
                }

                // An element has the base symbol's type
                match &array.kind {
                    ExprKind::Identifier { name } => match self.table.lookup(name) {
                        Some(sym) => sym.ty,
                        None => DataType::Unknown,
                    },
                    _ => DataType::Unknown,
                }
            }
            ExprKind::Call { name, args } => {
                let Some(func) = self.table.lookup_function(name).cloned() else {
                    let message = format!("Undefined function: {name}");
                    for arg in args.iter_mut() {
                        self.check_expr(arg);
                    }
                    self.error(message);
                    expr.ty = DataType::Unknown;
                    return;
                };

                if !func.is_variadic && func.param_types.len() != args.len() {
                    self.error(format!(
                        "Function {} expects {} arguments, got {}",
                        name,
                        func.param_types.len(),
                        args.len()
                    ));
                }

                let name = name.clone();
                for (i, arg) in args.iter_mut().enumerate() {
                    self.check_expr(arg);
                    // The fixed prefix is always checked; a variadic callee's
                    // extra arguments have no declared types to check against
                    if i < func.param_types.len() {
                        if !Self::compatible(func.param_types[i], arg.ty) {
                            self.error(format!(
                                "Type mismatch in argument {} of function {}",
                                i + 1,
                                name
                            ));
                        }
                    }
                }

                func.return_type
            }
        };
        expr.ty = ty;
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

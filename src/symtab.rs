//! Scoped symbol table and stack-frame offset allocator
//!
//! A stack of scope maps plus a flat global function table. The scope stack
//! is never empty: the table is born with the global scope already pushed.
//! `current_offset` decreases monotonically while a function's frame is laid
//! out and is reset to 0 at function entry; its final absolute value is the
//! frame size before 16-byte rounding.

use std::collections::HashMap;

use crate::ast::DataType;

/// A variable binding with its frame slot.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: DataType,
    pub is_mutable: bool,
    pub is_parameter: bool,
    /// Byte offset relative to %rbp; negative for locals.
    pub offset: i32,
    pub array_dims: Vec<i32>,
}

/// A function signature in the global function table.
#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    pub name: String,
    pub return_type: DataType,
    pub param_types: Vec<DataType>,
    pub param_names: Vec<String>,
    /// Variadic callees are exempt from arity checks past the fixed prefix.
    pub is_variadic: bool,
}

pub struct SymbolTable {
    scopes: Vec<HashMap<String, Symbol>>,
    functions: HashMap<String, FunctionSymbol>,
    current_offset: i32,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            scopes: vec![HashMap::new()], // global scope
            functions: HashMap::new(),
            current_offset: 0,
        }
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn exit_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Bind a variable in the innermost scope. Returns false when the name
    /// is already declared in that scope (shadowing outer scopes is fine).
    pub fn declare_variable(&mut self, name: &str, symbol: Symbol) -> bool {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(name.to_string(), symbol);
        true
    }

    /// Resolve a name, walking the scope stack from innermost outward.
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn declare_function(&mut self, name: &str, func: FunctionSymbol) -> bool {
        if self.functions.contains_key(name) {
            return false;
        }
        self.functions.insert(name.to_string(), func);
        true
    }

    pub fn lookup_function(&self, name: &str) -> Option<&FunctionSymbol> {
        self.functions.get(name)
    }

    /// Carve `size` bytes out of the current frame, returning the new slot's
    /// (negative) offset.
    pub fn allocate_stack_space(&mut self, size: i32) -> i32 {
        self.current_offset -= size;
        self.current_offset
    }

    pub fn reset_offset(&mut self) {
        self.current_offset = 0;
    }

    pub fn current_offset(&self) -> i32 {
        self.current_offset
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, ty: DataType, offset: i32) -> Symbol {
        Symbol {
            name: name.to_string(),
            ty,
            is_mutable: true,
            is_parameter: false,
            offset,
            array_dims: Vec::new(),
        }
    }

    #[test]
    fn test_shadowing_restores_outer_binding() {
        let mut table = SymbolTable::new();
        assert!(table.declare_variable("x", sym("x", DataType::Int, -8)));

        table.enter_scope();
        assert!(table.declare_variable("x", sym("x", DataType::Float, -16)));
        assert_eq!(table.lookup("x").unwrap().ty, DataType::Float);
        table.exit_scope();

        // The outer declaration is visible again, not overwritten
        let outer = table.lookup("x").unwrap();
        assert_eq!(outer.ty, DataType::Int);
        assert_eq!(outer.offset, -8);
    }

    #[test]
    fn test_duplicate_in_same_scope_rejected() {
        let mut table = SymbolTable::new();
        assert!(table.declare_variable("x", sym("x", DataType::Int, -8)));
        assert!(!table.declare_variable("x", sym("x", DataType::Int, -16)));
    }

    #[test]
    fn test_offsets_decrease_monotonically() {
        let mut table = SymbolTable::new();
        assert_eq!(table.allocate_stack_space(8), -8);
        assert_eq!(table.allocate_stack_space(8), -16);
        assert_eq!(table.allocate_stack_space(24), -40);
        table.reset_offset();
        assert_eq!(table.current_offset(), 0);
        assert_eq!(table.allocate_stack_space(8), -8);
    }

    #[test]
    fn test_function_table_is_flat() {
        let mut table = SymbolTable::new();
        let func = FunctionSymbol {
            name: "f".to_string(),
            return_type: DataType::Int,
            param_types: vec![DataType::Int],
            param_names: vec!["n".to_string()],
            is_variadic: false,
        };
        assert!(table.declare_function("f", func.clone()));
        assert!(!table.declare_function("f", func));

        table.enter_scope();
        assert!(table.lookup_function("f").is_some());
        table.exit_scope();
    }
}

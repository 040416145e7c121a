//! Symbol and label tables used during assembly.
//!
//! Two separate namespaces: `symbols` holds the values bound by the
//! `DC`/`DS`/`EQU` pseudo-instructions (data addresses or plain values),
//! `labels` holds instruction indices for jump targets. Both are discarded
//! once the fix-up pass has run; nothing of them survives into the
//! [`Program`](crate::asm::Program).

use std::collections::HashMap;

use crate::asm::program::DataConstant;

/// Name tables scoped to a single assembly pass.
///
/// Keys are owned lowercase strings so the tables do not borrow from the
/// source buffer.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: HashMap<String, i32>,
    labels: HashMap<String, i16>,

    /// Initial values for the words declared with `DC`, in declaration order.
    pub values: Vec<DataConstant>,

    /// Bump pointer for the data section. Starts at 1: address 0 is the
    /// zero-register alias slot and is never handed out to data.
    pub total_num_bytes: i32,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable {
            symbols: HashMap::new(),
            labels: HashMap::new(),
            values: Vec::new(),
            total_num_bytes: 1,
        }
    }

    /// Binds `name` to a value. Fails if the name is already bound in the
    /// symbol namespace.
    pub fn define_symbol(&mut self, name: &str, value: i32) -> Result<(), ()> {
        if self.symbols.contains_key(name) {
            return Err(());
        }

        self.symbols.insert(name.to_string(), value);
        Ok(())
    }

    /// Binds `name` to an instruction index. Fails on duplicates.
    pub fn define_label(&mut self, name: &str, index: i16) -> Result<(), ()> {
        if self.labels.contains_key(name) {
            return Err(());
        }

        self.labels.insert(name.to_string(), index);
        Ok(())
    }

    pub fn symbol(&self, name: &str) -> Option<i32> {
        self.symbols.get(name).copied()
    }

    pub fn label(&self, name: &str) -> Option<i16> {
        self.labels.get(name).copied()
    }
}

impl Default for SymbolTable {
    fn default() -> SymbolTable {
        SymbolTable::new()
    }
}

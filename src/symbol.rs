//! The ordered symbol table and its binding kinds.

use std::collections::BTreeMap;

use crate::diag::{Diagnostic, Severity, SourceLoc};
use crate::label::Label;

/// What a symbol currently means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Referenced but not yet defined (pass 1 forward reference).
    Undefined,
    /// An ordinary code/data address.
    Address,
    /// Fixed once by `EQU`; cannot be redefined.
    Equate,
    /// Redefinable by repeated `SET`.
    Set,
    /// Exported for other modules (`PUBLIC`); value semantics as `Address`/`Equate`.
    Public,
    /// An external placeholder declared by `EXTERN`/`EXTDP`.
    Extern,
}

/// One entry in the symbol table, keyed by its effective (post local-label-expansion) name.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// Current binding kind.
    pub binding: Binding,
    /// Current 16-bit value.
    pub value: u16,
    /// Source file this symbol was (re)defined in.
    pub file: String,
    /// Source line this symbol was (re)defined on.
    pub line: u32,
    /// Intended bit width (8 or 16) used for direct-page analysis; 0 if unknown.
    pub bits: u8,
    /// Number of times referenced during pass 2.
    pub refs: u32,
}

impl Symbol {
    fn new(binding: Binding, value: u16, file: String, line: u32, bits: u8) -> Self {
        Self {
            binding,
            value,
            file,
            line,
            bits,
            refs: 0,
        }
    }
}

/// Ordered label→symbol map. Iteration order matches [`Label`]'s byte-wise comparator, which is
/// what the listing's symbol-table dump wants.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: BTreeMap<Label, Symbol>,
}

impl SymbolTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact-key lookup.
    pub fn find(&self, name: &Label) -> Option<&Symbol> {
        self.entries.get(name)
    }

    /// Exact-key lookup, mutable.
    pub fn find_mut(&mut self, name: &Label) -> Option<&mut Symbol> {
        self.entries.get_mut(name)
    }

    /// Define (or, for `Set`, redefine) a symbol with an explicit bit-width hint.
    ///
    /// Mirrors `symbol_add`: a fresh name is inserted as `Address` (or the caller's requested
    /// binding) with `bits` set from the caller; an existing `Set` symbol is overwritten in
    /// place; any other existing binding is a redefinition error.
    pub fn define(
        &mut self,
        name: Label,
        binding: Binding,
        value: u16,
        file: &str,
        line: u32,
        bits: u8,
    ) -> Result<&mut Symbol, Diagnostic> {
        if let Some(existing) = self.entries.get(&name) {
            match existing.binding {
                Binding::Set => {}
                Binding::Undefined => {}
                _ => {
                    return Err(Diagnostic::new(
                        Severity::Error,
                        "E0049",
                        SourceLoc::at(file.to_string(), line),
                        format!(
                            "'{name}' already defined on line {}",
                            existing.line
                        ),
                    ))
                }
            }
        }
        let sym = Symbol::new(binding, value, file.to_string(), line, bits);
        self.entries.insert(name.clone(), sym);
        Ok(self.entries.get_mut(&name).unwrap())
    }

    /// Record a forward reference: insert an `Undefined` placeholder if the name is unseen.
    pub fn reference_forward(&mut self, name: &Label) {
        self.entries.entry(name.clone()).or_insert_with(|| {
            Symbol::new(Binding::Undefined, 0, String::new(), 0, 0)
        });
    }

    /// Iterate symbols in label order, for listing output.
    pub fn iter(&self) -> impl Iterator<Item = (&Label, &Symbol)> {
        self.entries.iter()
    }

    /// Drop every symbol. Exists for parity with the original's explicit `freeAll`; in Rust this
    /// is just `*self = SymbolTable::new()`, kept as a named operation because callers reset the
    /// table between independent assemble() invocations rather than relying on `Drop` timing.
    pub fn free_all(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_then_find_round_trips() {
        let mut t = SymbolTable::new();
        t.define(Label::new("FOO"), Binding::Equate, 5, "a.asm", 2, 8)
            .unwrap();
        let sym = t.find(&Label::new("FOO")).unwrap();
        assert_eq!(sym.value, 5);
        assert_eq!(sym.binding, Binding::Equate);
    }

    #[test]
    fn redefining_non_set_symbol_errors() {
        let mut t = SymbolTable::new();
        t.define(Label::new("FOO"), Binding::Equate, 5, "a.asm", 2, 8)
            .unwrap();
        let err = t
            .define(Label::new("FOO"), Binding::Equate, 6, "a.asm", 3, 8)
            .unwrap_err();
        assert_eq!(err.code, "E0049");
    }

    #[test]
    fn set_symbols_may_be_redefined() {
        let mut t = SymbolTable::new();
        t.define(Label::new("FOO"), Binding::Set, 5, "a.asm", 2, 8)
            .unwrap();
        t.define(Label::new("FOO"), Binding::Set, 9, "a.asm", 3, 8)
            .unwrap();
        assert_eq!(t.find(&Label::new("FOO")).unwrap().value, 9);
    }

    #[test]
    fn iteration_is_label_ordered() {
        let mut t = SymbolTable::new();
        t.define(Label::new("B"), Binding::Address, 1, "a.asm", 1, 16)
            .unwrap();
        t.define(Label::new("A"), Binding::Address, 2, "a.asm", 2, 16)
            .unwrap();
        let names: Vec<_> = t.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }
}

use std::collections::BTreeMap;

use crate::{
    diagnostics::InternalError,
    frontend::ast::NodeId,
    middle::{
        resolve::{Symbol, SymbolId},
        ty::Type,
        type_check::TypeAnalysis,
    },
};

use super::{Label, Opd, Procedure};

/// The whole program in IR form: procedures in source order, global
/// storage, the string pool, and the generators for program-unique label
/// and string names. Keeps the type analysis so lowering (and the backend
/// after it) can ask for node types and operand widths.
#[derive(Debug)]
pub struct IrProgram {
    types: TypeAnalysis,
    procedures: Vec<Procedure>,
    globals: BTreeMap<SymbolId, Opd>,
    /// (name, raw literal bytes) in insertion order; later passes address
    /// entries by the generated `strN` name
    strings: Vec<(String, String)>,
    next_label: usize,
    next_string: usize,
}

impl IrProgram {
    pub(crate) fn new(types: TypeAnalysis) -> Self {
        Self {
            types,
            procedures: Vec::new(),
            globals: BTreeMap::new(),
            strings: Vec::new(),
            next_label: 0,
            next_string: 0,
        }
    }

    /// A new procedure with its entry and leave labels wired. The caller
    /// fills the body and hands it back through [`Self::add_proc`].
    pub fn make_proc(&mut self, name: &str) -> Procedure {
        let leave_label = self.make_label();
        Procedure::new(name, leave_label)
    }

    pub fn add_proc(&mut self, procedure: Procedure) {
        self.procedures.push(procedure);
    }

    pub fn procedures(&self) -> &[Procedure] {
        &self.procedures
    }

    /// Allocates global storage for a symbol at its natural width.
    /// Idempotent per symbol.
    pub fn gather_global(&mut self, id: SymbolId, symbol: &Symbol) -> Result<(), InternalError> {
        if self.globals.contains_key(&id) {
            return Ok(());
        }

        let width = Opd::width_of(&symbol.ty)?;
        self.globals.insert(
            id,
            Opd::Sym {
                name: symbol.name.clone(),
                width,
            },
        );
        Ok(())
    }

    pub fn get_global(&self, id: SymbolId) -> Option<&Opd> {
        self.globals.get(&id)
    }

    pub fn globals(&self) -> &BTreeMap<SymbolId, Opd> {
        &self.globals
    }

    /// Interns a string literal into the pool and returns the operand that
    /// refers to it.
    pub fn make_string(&mut self, bytes: &str) -> Opd {
        let name = format!("str{}", self.next_string);
        self.next_string += 1;

        self.strings.push((name.clone(), bytes.to_string()));
        Opd::Str { name }
    }

    pub fn strings(&self) -> &[(String, String)] {
        &self.strings
    }

    /// A fresh label, unique across the program.
    pub fn make_label(&mut self) -> Label {
        let label = Label::new(format!("lbl{}", self.next_label));
        self.next_label += 1;
        label
    }

    pub fn type_analysis(&self) -> &TypeAnalysis {
        &self.types
    }

    /// The type the checker recorded for a node. Lowering only runs after a
    /// successful analysis, so a missing entry is a broken invariant.
    pub fn node_type(&self, id: NodeId) -> Result<Type, InternalError> {
        self.types
            .node_type(id)
            .cloned()
            .ok_or_else(|| InternalError::new(format!("no type recorded for node {id:?}")))
    }

    /// Width of the value a node produces: 1 byte for byte/bool, 8 bytes
    /// otherwise; arrays report the sum of their element widths.
    pub fn op_width(&self, id: NodeId) -> Result<usize, InternalError> {
        let ty = self.node_type(id)?;

        if ty.is_byte() || ty.is_bool() {
            return Ok(1);
        }

        if ty.is_array() {
            return Ok(ty.size());
        }

        Ok(8)
    }
}

use std::collections::BTreeMap;

use crate::{
    diagnostics::InternalError,
    middle::resolve::{Symbol, SymbolId},
};

use super::{Label, Opd, Quad, QuadKind};

/// One procedure's worth of IR: the formal and local storage it owns, its
/// temporaries, and its body quads bracketed by an enter and a leave. Every
/// return path in the body jumps to the leave label, so the procedure has
/// exactly one exit.
#[derive(Debug)]
pub struct Procedure {
    name: String,
    enter: Quad,
    leave: Quad,
    leave_label: Label,
    /// Formal operands in declaration order (the calling convention indexes
    /// them 1..N in this order)
    formals: Vec<(SymbolId, Opd)>,
    locals: BTreeMap<SymbolId, Opd>,
    temps: Vec<Opd>,
    addr_opds: Vec<Opd>,
    body: Vec<Quad>,
    next_tmp: usize,
}

impl Procedure {
    /// Constructed through [`super::IrProgram::make_proc`], which owns the
    /// label counter the leave label comes from.
    pub(crate) fn new(name: &str, leave_label: Label) -> Self {
        let enter = Quad::with_label(
            QuadKind::Enter {
                proc: name.to_string(),
            },
            Label::entry(name),
        );

        let leave = Quad::with_label(
            QuadKind::Leave {
                proc: name.to_string(),
            },
            leave_label.clone(),
        );

        Self {
            name: name.to_string(),
            enter,
            leave,
            leave_label,
            formals: Vec::new(),
            locals: BTreeMap::new(),
            temps: Vec::new(),
            addr_opds: Vec::new(),
            body: Vec::new(),
            next_tmp: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enter(&self) -> &Quad {
        &self.enter
    }

    pub fn leave(&self) -> &Quad {
        &self.leave
    }

    /// The single label on the leave quad; the common return target.
    pub fn leave_label(&self) -> &Label {
        &self.leave_label
    }

    pub fn formals(&self) -> &[(SymbolId, Opd)] {
        &self.formals
    }

    pub fn locals(&self) -> &BTreeMap<SymbolId, Opd> {
        &self.locals
    }

    pub fn temps(&self) -> &[Opd] {
        &self.temps
    }

    pub fn addr_opds(&self) -> &[Opd] {
        &self.addr_opds
    }

    pub fn body(&self) -> &[Quad] {
        &self.body
    }

    /// Allocates the storage operand for a formal at its natural width.
    pub fn gather_formal(
        &mut self,
        id: SymbolId,
        symbol: &Symbol,
    ) -> Result<(), InternalError> {
        let width = Opd::width_of(&symbol.ty)?;
        self.formals.push((
            id,
            Opd::Sym {
                name: symbol.name.clone(),
                width,
            },
        ));
        Ok(())
    }

    /// Allocates the storage operand for a local at its natural width.
    pub fn gather_local(&mut self, id: SymbolId, symbol: &Symbol) -> Result<(), InternalError> {
        let width = Opd::width_of(&symbol.ty)?;
        self.locals.insert(
            id,
            Opd::Sym {
                name: symbol.name.clone(),
                width,
            },
        );
        Ok(())
    }

    /// The operand already gathered for a symbol: formals first, then
    /// locals. Globals are the program's business. Never creates.
    pub fn get_sym_opd(&self, id: SymbolId) -> Option<&Opd> {
        self.formals
            .iter()
            .find_map(|(formal_id, opd)| (*formal_id == id).then_some(opd))
            .or_else(|| self.locals.get(&id))
    }

    /// A fresh anonymous temporary of the given width.
    pub fn make_tmp(&mut self, width: usize) -> Opd {
        let name = format!("varTmp{}", self.next_tmp);
        self.next_tmp += 1;

        let opd = Opd::Aux { name, width };
        self.temps.push(opd.clone());
        opd
    }

    /// A fresh address operand whose dereferenced width is `width`.
    pub fn make_addr_opd(&mut self, width: usize) -> Opd {
        let name = format!("addrTmp{}", self.next_tmp);
        self.next_tmp += 1;

        let opd = Opd::Addr { name, width };
        self.addr_opds.push(opd.clone());
        opd
    }

    pub fn add_quad(&mut self, quad: Quad) {
        self.body.push(quad);
    }
}

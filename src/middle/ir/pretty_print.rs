//! Textual rendering of the IR.
//!
//! Each quad renders as `<labels>: <operation>` with a 12-column label
//! gutter (two spaces when unlabeled). Named operands appear in brackets
//! when used as values and bare when used as locations. A procedure dump is
//! a header block of its storage followed by the enter quad, the body, and
//! the leave quad; the program dump opens with the globals and string pool.

use itertools::Itertools;

use super::{IrProgram, Opd, Procedure, Quad, QuadKind};

/// Width of the label gutter in front of every quad.
const LABEL_GUTTER: usize = 12;

impl Quad {
    /// The operation without its label gutter.
    pub fn repr(&self) -> String {
        match &self.kind {
            QuadKind::Enter { proc } => format!("enter {proc}"),
            QuadKind::Leave { proc } => format!("leave {proc}"),
            QuadKind::Assign { dst, src } => {
                format!("{} := {}", dst.val_string(), src.val_string())
            }
            QuadKind::BinOp { dst, op, lhs, rhs } => format!(
                "{} := {} {} {}",
                dst.val_string(),
                lhs.val_string(),
                op,
                rhs.val_string()
            ),
            QuadKind::UnaryOp { dst, op, src } => {
                format!("{} := {} {}", dst.val_string(), op, src.val_string())
            }
            QuadKind::Jmp { target } => format!("goto {target}"),
            QuadKind::JmpIf { cond, target } => {
                format!("IFZ {} GOTO {}", cond.val_string(), target)
            }
            QuadKind::Nop => "nop".to_string(),
            QuadKind::Call { target } => format!("call {target}"),
            QuadKind::SetArg { index, opd } => {
                format!("setarg {} {}", index, opd.val_string())
            }
            QuadKind::GetArg { index, opd } => {
                format!("getarg {} {}", index, opd.val_string())
            }
            QuadKind::SetRet { opd } => format!("setret {}", opd.val_string()),
            QuadKind::GetRet { opd } => format!("getret {}", opd.val_string()),
            QuadKind::Read { opd, .. } => format!("READ {}", opd.val_string()),
            QuadKind::Write { opd, .. } => format!("WRITE {}", opd.val_string()),
            QuadKind::Havoc { dst } => format!("HAVOC {}", dst.val_string()),
            QuadKind::Index { dst, base, offset } => format!(
                "{} := {} ADD64 {}",
                dst.loc_string(),
                base.val_string(),
                offset.val_string()
            ),
        }
    }

    pub fn to_text(&self, verbose: bool) -> String {
        let mut res = if self.labels().is_empty() {
            "  ".to_string()
        } else {
            format!("{}: ", self.labels().iter().join(","))
        };

        while res.len() < LABEL_GUTTER {
            res.push(' ');
        }

        res.push_str(&self.repr());

        if verbose {
            if let Some(comment) = self.comment() {
                res.push_str("  #");
                res.push_str(comment);
            }
        }

        res
    }
}

impl core::fmt::Display for Quad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text(false))
    }
}

impl Procedure {
    pub fn to_text(&self, verbose: bool) -> String {
        let mut res = String::new();

        res.push_str(&format!("[BEGIN {} LOCALS]\n", self.name()));

        for (_, formal) in self.formals() {
            res.push_str(&format!(
                "{} (formal arg of {} bytes)\n",
                formal.loc_string(),
                formal.width()
            ));
        }

        for local in self.locals().values() {
            res.push_str(&format!(
                "{} (local var of {} bytes)\n",
                local.loc_string(),
                local.width()
            ));
        }

        for tmp in self.temps() {
            res.push_str(&format!(
                "{} (tmp var of {} bytes)\n",
                tmp.loc_string(),
                tmp.width()
            ));
        }

        for addr in self.addr_opds() {
            res.push_str(&format!(
                "{} (addr opd of {} bytes)\n",
                addr.loc_string(),
                addr.width()
            ));
        }

        res.push_str(&format!("[END {} LOCALS]\n", self.name()));

        res.push_str(&self.enter().to_text(verbose));
        res.push('\n');

        for quad in self.body() {
            res.push_str(&quad.to_text(verbose));
            res.push('\n');
        }

        res.push_str(&self.leave().to_text(verbose));
        res.push('\n');

        res
    }
}

impl IrProgram {
    pub fn to_text(&self, verbose: bool) -> String {
        let mut res = String::new();

        res.push_str("[BEGIN GLOBALS]\n");

        for global in self.globals().values() {
            res.push_str(&format!(
                "{} (global var of {} bytes)\n",
                global.loc_string(),
                global.width()
            ));
        }

        for (name, bytes) in self.strings() {
            res.push_str(&format!("{name} {bytes}\n"));
        }

        res.push_str("[END GLOBALS]\n");

        for procedure in self.procedures() {
            res.push('\n');
            res.push_str(&procedure.to_text(verbose));
        }

        res
    }
}

impl core::fmt::Display for Opd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.val_string())
    }
}

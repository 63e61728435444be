//! The three-address IR.
//!
//! A program is a list of procedures plus program-wide storage (globals and
//! the string pool). A procedure is a linear body of labeled quadruples over
//! typed operands; abstract control flow has been flattened into labels and
//! jumps and expression trees into ordered temporaries by the time this
//! representation exists.

use crate::{diagnostics::InternalError, middle::ty::Type};

pub mod lowering;
pub mod pretty_print;
pub mod proc;
pub mod program;

pub use lowering::lower_to_ir;
pub use proc::Procedure;
pub use program::IrProgram;

/// A value referenced by a quadruple. Every operand has a width in bytes:
/// 1 or 8 for scalars, the full storage size for array variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Opd {
    /// A named storage location (local, formal, or global)
    Sym { name: String, width: usize },
    /// An anonymous temporary (`varTmpN`)
    Aux { name: String, width: usize },
    /// An address-holding temporary (`addrTmpN`); `width` is the width of
    /// the location it points at, and writes through it are dereferenced
    /// stores
    Addr { name: String, width: usize },
    /// An immediate literal in textual form
    Lit { text: String, width: usize },
    /// An immediate reference to a pooled string literal (`strN`)
    Str { name: String },
}

/// Width of a pooled-string reference (a pointer).
pub const STR_WIDTH: usize = 8;

impl Opd {
    pub fn width(&self) -> usize {
        match self {
            Opd::Sym { width, .. }
            | Opd::Aux { width, .. }
            | Opd::Addr { width, .. }
            | Opd::Lit { width, .. } => *width,
            Opd::Str { .. } => STR_WIDTH,
        }
    }

    /// Storage width of a value of the given type: 1 byte for byte/bool,
    /// 8 bytes for the other scalars, and the summed element widths for
    /// arrays. Function and poison types have no width.
    pub fn width_of(ty: &Type) -> Result<usize, InternalError> {
        if ty.as_basic().is_some() {
            return Ok(if ty.is_byte() || ty.is_bool() { 1 } else { 8 });
        }

        if ty.is_array() {
            return Ok(ty.size());
        }

        Err(InternalError::new(format!(
            "no operand width for type {ty}"
        )))
    }

    /// The operand as a value reference: named operands in brackets,
    /// literals as their text.
    pub fn val_string(&self) -> String {
        match self {
            Opd::Sym { name, .. } | Opd::Aux { name, .. } | Opd::Addr { name, .. } => {
                format!("[{name}]")
            }
            Opd::Str { name } => format!("[{name}]"),
            Opd::Lit { text, .. } => text.clone(),
        }
    }

    /// The operand as a storage location: the bare name.
    pub fn loc_string(&self) -> String {
        match self {
            Opd::Sym { name, .. }
            | Opd::Aux { name, .. }
            | Opd::Addr { name, .. }
            | Opd::Str { name } => name.clone(),
            // A literal has no location; nothing renders one.
            Opd::Lit { text, .. } => text.clone(),
        }
    }
}

/// A named branch target. `main` and `fun_<name>` are reserved for procedure
/// entries; every other label is generated and unique within the program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label(String);

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The entry label of the procedure with the given name.
    pub fn entry(proc_name: &str) -> Self {
        if proc_name == "main" {
            Self::new("main")
        } else {
            Self::new(format!("fun_{proc_name}"))
        }
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Width-tagged binary opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum BinOp {
    Add8,
    Add64,
    Sub8,
    Sub64,
    Mult8,
    Mult64,
    Div8,
    Div64,
    Eq8,
    Eq64,
    Neq8,
    Neq64,
    Lt8,
    Lt64,
    Gt8,
    Gt64,
    Lte8,
    Lte64,
    Gte8,
    Gte64,
    And8,
    Or8,
}

impl BinOp {
    /// Whether this is a 64-bit variant.
    pub fn is_wide(self) -> bool {
        matches!(
            self,
            Self::Add64
                | Self::Sub64
                | Self::Mult64
                | Self::Div64
                | Self::Eq64
                | Self::Neq64
                | Self::Lt64
                | Self::Gt64
                | Self::Lte64
                | Self::Gte64
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum UnaryOp {
    Neg64,
    Not8,
}

/// A labeled operation with an optional comment. Multiple branch targets may
/// be merged onto one quadruple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quad {
    labels: Vec<Label>,
    comment: Option<String>,
    pub kind: QuadKind,
}

impl Quad {
    pub fn new(kind: QuadKind) -> Self {
        Self {
            labels: Vec::new(),
            comment: None,
            kind,
        }
    }

    pub fn with_label(kind: QuadKind, label: Label) -> Self {
        let mut quad = Self::new(kind);
        quad.add_label(label);
        quad
    }

    pub fn add_label(&mut self, label: Label) {
        self.labels.push(label);
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = Some(comment.into());
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuadKind {
    /// Procedure prologue; carries the entry label (`main` / `fun_<name>`)
    Enter { proc: String },
    /// Procedure epilogue and common return target
    Leave { proc: String },
    Assign {
        dst: Opd,
        src: Opd,
    },
    BinOp {
        dst: Opd,
        op: BinOp,
        lhs: Opd,
        rhs: Opd,
    },
    UnaryOp {
        dst: Opd,
        op: UnaryOp,
        src: Opd,
    },
    Jmp {
        target: Label,
    },
    /// Branches when the condition is ZERO (inverted sense)
    JmpIf {
        cond: Opd,
        target: Label,
    },
    /// Anchors labels at merge points
    Nop,
    Call {
        target: Label,
    },
    /// Caller places the i-th argument (1-indexed)
    SetArg {
        index: usize,
        opd: Opd,
    },
    /// Callee retrieves the i-th formal (1-indexed)
    GetArg {
        index: usize,
        opd: Opd,
    },
    /// Callee publishes the return value
    SetRet {
        opd: Opd,
    },
    /// Caller reads the return value
    GetRet {
        opd: Opd,
    },
    /// The type is the source-level type of the destination, so the backend
    /// can pick the right runtime routine
    Read {
        opd: Opd,
        ty: Type,
    },
    Write {
        opd: Opd,
        ty: Type,
    },
    /// Writes a nondeterministic boolean
    Havoc {
        dst: Opd,
    },
    /// Address computation: `dst := base ADD64 offset`
    Index {
        dst: Opd,
        base: Opd,
        offset: Opd,
    },
}

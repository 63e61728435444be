//! AST -> IR translation.
//!
//! Expressions flatten bottom-up into operands, with one quad per operation
//! in evaluation order. Control flow lowers onto the `IFZ` convention: a
//! conditional jump is taken when its condition is zero, so `if` and `while`
//! branch *around* their bodies and merge points are anchored by labeled
//! nops. All returns funnel through the procedure's single leave label.

use crate::{
    diagnostics::InternalError,
    frontend::ast::{
        self, Decl, DeclKind, Expression, ExpressionKind, FnDecl, Identifier, NodeId, Program,
        Statement, StatementKind,
    },
    middle::{
        resolve::{NameAnalysis, SymbolId},
        type_check::TypeAnalysis,
    },
};

use super::{BinOp, IrProgram, Label, Opd, Procedure, Quad, QuadKind, UnaryOp};

/// Lowers a fully analyzed program. Only called once both name and type
/// analysis have passed; anything missing at this point is a compiler bug,
/// not a user error.
pub fn lower_to_ir(
    program: &Program,
    names: &NameAnalysis,
    types: TypeAnalysis,
) -> Result<IrProgram, InternalError> {
    let mut lowerer = Lowerer {
        names,
        program: IrProgram::new(types),
    };

    for decl in &program.globals {
        lowerer.lower_global(decl)?;
    }

    Ok(lowerer.program)
}

struct Lowerer<'a> {
    names: &'a NameAnalysis,
    program: IrProgram,
}

impl<'a> Lowerer<'a> {
    fn resolution(&self, id: NodeId) -> Result<SymbolId, InternalError> {
        self.names
            .resolution(id)
            .ok_or_else(|| InternalError::new("identifier with no symbol reached lowering"))
    }

    /// The storage operand for a symbol: the procedure's formals, then its
    /// locals, then the program globals.
    fn get_sym_opd(&self, proc: &Procedure, id: SymbolId) -> Result<Opd, InternalError> {
        proc.get_sym_opd(id)
            .or_else(|| self.program.get_global(id))
            .cloned()
            .ok_or_else(|| InternalError::new("no storage gathered for symbol"))
    }

    fn lower_global(&mut self, decl: &Decl) -> Result<(), InternalError> {
        match &decl.kind {
            DeclKind::Var(var) => {
                let id = self.resolution(var.name.id)?;
                self.program.gather_global(id, self.names.symbol(id))
            }
            DeclKind::Fn(function) => self.lower_function(function),
        }
    }

    fn lower_function(&mut self, function: &FnDecl) -> Result<(), InternalError> {
        let mut proc = self.program.make_proc(&function.name.name);

        for formal in &function.formals {
            let id = self.resolution(formal.name.id)?;
            proc.gather_formal(id, self.names.symbol(id))?;
        }

        // The calling convention materializes every argument into its
        // formal before the body runs.
        let formal_opds = proc
            .formals()
            .iter()
            .map(|(_, opd)| opd.clone())
            .collect::<Vec<_>>();

        for (i, opd) in formal_opds.into_iter().enumerate() {
            proc.add_quad(Quad::new(QuadKind::GetArg { index: i + 1, opd }));
        }

        for statement in &function.body {
            self.lower_statement(&mut proc, statement)?;
        }

        self.program.add_proc(proc);
        Ok(())
    }

    fn lower_body(
        &mut self,
        proc: &mut Procedure,
        body: &[Statement],
    ) -> Result<(), InternalError> {
        for statement in body {
            self.lower_statement(proc, statement)?;
        }
        Ok(())
    }

    fn lower_statement(
        &mut self,
        proc: &mut Procedure,
        statement: &Statement,
    ) -> Result<(), InternalError> {
        match &statement.kind {
            StatementKind::VarDecl(var) => {
                let id = self.resolution(var.name.id)?;
                proc.gather_local(id, self.names.symbol(id))
            }
            StatementKind::Assign(expression) => {
                self.flatten(proc, expression)?;
                Ok(())
            }
            StatementKind::Call(expression) => {
                let ExpressionKind::Call { callee, arguments } = &expression.kind else {
                    return Err(InternalError::new("call statement without a call"));
                };

                self.flatten_call(proc, callee, arguments)?;
                Ok(())
            }
            StatementKind::PostIncrement(target) => {
                self.lower_step(proc, target, BinOp::Add64)
            }
            StatementKind::PostDecrement(target) => {
                self.lower_step(proc, target, BinOp::Sub64)
            }
            StatementKind::Read(target) => {
                let opd = self.flatten(proc, target)?;
                let ty = self.program.node_type(target.id)?;
                proc.add_quad(Quad::new(QuadKind::Read { opd, ty }));
                Ok(())
            }
            StatementKind::Write(source) => {
                let opd = self.flatten(proc, source)?;
                let ty = self.program.node_type(source.id)?;
                proc.add_quad(Quad::new(QuadKind::Write { opd, ty }));
                Ok(())
            }
            StatementKind::If { condition, body } => {
                let cond = self.flatten(proc, condition)?;
                let exit = self.program.make_label();

                // Skip the body when the condition is zero
                proc.add_quad(Quad::new(QuadKind::JmpIf {
                    cond,
                    target: exit.clone(),
                }));

                self.lower_body(proc, body)?;
                proc.add_quad(Quad::with_label(QuadKind::Nop, exit));
                Ok(())
            }
            StatementKind::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                let cond = self.flatten(proc, condition)?;
                let else_label = self.program.make_label();
                let end_label = self.program.make_label();

                proc.add_quad(Quad::new(QuadKind::JmpIf {
                    cond,
                    target: else_label.clone(),
                }));

                self.lower_body(proc, then_body)?;
                proc.add_quad(Quad::new(QuadKind::Jmp {
                    target: end_label.clone(),
                }));

                proc.add_quad(Quad::with_label(QuadKind::Nop, else_label));
                self.lower_body(proc, else_body)?;
                proc.add_quad(Quad::with_label(QuadKind::Nop, end_label));
                Ok(())
            }
            StatementKind::While { condition, body } => {
                let head = self.program.make_label();
                let exit = self.program.make_label();

                proc.add_quad(Quad::with_label(QuadKind::Nop, head.clone()));

                let cond = self.flatten(proc, condition)?;
                proc.add_quad(Quad::new(QuadKind::JmpIf {
                    cond,
                    target: exit.clone(),
                }));

                self.lower_body(proc, body)?;
                proc.add_quad(Quad::new(QuadKind::Jmp { target: head }));
                proc.add_quad(Quad::with_label(QuadKind::Nop, exit));
                Ok(())
            }
            StatementKind::Return(value) => {
                if let Some(value) = value {
                    let opd = self.flatten(proc, value)?;
                    proc.add_quad(Quad::new(QuadKind::SetRet { opd }));
                }

                proc.add_quad(Quad::new(QuadKind::Jmp {
                    target: proc.leave_label().clone(),
                }));
                Ok(())
            }
        }
    }

    /// `x++` / `x--`
    fn lower_step(
        &mut self,
        proc: &mut Procedure,
        target: &Expression,
        op: BinOp,
    ) -> Result<(), InternalError> {
        let opd = self.flatten(proc, target)?;

        proc.add_quad(Quad::new(QuadKind::BinOp {
            dst: opd.clone(),
            op,
            lhs: opd,
            rhs: Opd::Lit {
                text: "1".to_string(),
                width: 8,
            },
        }));
        Ok(())
    }

    /// Flattens an expression to the operand standing for its result, then
    /// applies any recorded Byte -> Int widening: an immediate is re-tagged
    /// at 8 bytes, anything else is copied into a fresh 8-byte temporary
    /// (the width-changing assign).
    fn flatten(
        &mut self,
        proc: &mut Procedure,
        expression: &Expression,
    ) -> Result<Opd, InternalError> {
        let opd = self.flatten_raw(proc, expression)?;

        if self
            .program
            .type_analysis()
            .coercion(expression.id)
            .is_none()
        {
            return Ok(opd);
        }

        if let Opd::Lit { text, .. } = opd {
            return Ok(Opd::Lit { text, width: 8 });
        }

        let tmp = proc.make_tmp(8);
        proc.add_quad(Quad::new(QuadKind::Assign {
            dst: tmp.clone(),
            src: opd,
        }));
        Ok(tmp)
    }

    fn flatten_raw(
        &mut self,
        proc: &mut Procedure,
        expression: &Expression,
    ) -> Result<Opd, InternalError> {
        match &expression.kind {
            ExpressionKind::IntLiteral(value) => {
                let ty = self.program.node_type(expression.id)?;
                let width = if ty.is_byte() { 1 } else { 8 };

                Ok(Opd::Lit {
                    text: value.to_string(),
                    width,
                })
            }
            ExpressionKind::StrLiteral(text) => Ok(self.program.make_string(text)),
            ExpressionKind::True => Ok(Opd::Lit {
                text: "1".to_string(),
                width: 1,
            }),
            ExpressionKind::False => Ok(Opd::Lit {
                text: "0".to_string(),
                width: 1,
            }),
            ExpressionKind::Havoc => {
                let dst = proc.make_tmp(1);
                proc.add_quad(Quad::new(QuadKind::Havoc { dst: dst.clone() }));
                Ok(dst)
            }
            ExpressionKind::Identifier(_) => {
                let id = self.resolution(expression.id)?;
                self.get_sym_opd(proc, id)
            }
            ExpressionKind::Index { base, index } => {
                self.flatten_index(proc, expression, base, index)
            }
            ExpressionKind::Call { callee, arguments } => self
                .flatten_call(proc, callee, arguments)?
                .ok_or_else(|| InternalError::new("void call used as a value")),
            ExpressionKind::Assignment { target, value } => {
                // RHS first: the target may contain side-effecting index
                // expressions that must not run before the value.
                let src = self.flatten(proc, value)?;
                let dst = self.flatten(proc, target)?;

                let mut quad = Quad::new(QuadKind::Assign {
                    dst: dst.clone(),
                    src,
                });
                quad.set_comment("assignment");
                proc.add_quad(quad);

                Ok(dst)
            }
            ExpressionKind::Binary { op, lhs, rhs } => {
                let lhs_opd = self.flatten(proc, lhs)?;
                let rhs_opd = self.flatten(proc, rhs)?;

                // Logical ops are always 8-bit; everything else picks the
                // 64-bit variant exactly when both operands are 8 bytes
                // wide.
                let (opcode, width) = match op {
                    ast::BinaryOp::And => (BinOp::And8, 1),
                    ast::BinaryOp::Or => (BinOp::Or8, 1),
                    _ => {
                        let wide = lhs_opd.width() == 8 && rhs_opd.width() == 8;
                        (sized_binop(*op, wide), if wide { 8 } else { 1 })
                    }
                };

                let dst = proc.make_tmp(width);
                proc.add_quad(Quad::new(QuadKind::BinOp {
                    dst: dst.clone(),
                    op: opcode,
                    lhs: lhs_opd,
                    rhs: rhs_opd,
                }));
                Ok(dst)
            }
            ExpressionKind::Unary { op, operand } => {
                let src = self.flatten(proc, operand)?;

                let (opcode, width) = match op {
                    ast::UnaryOp::Negate => (UnaryOp::Neg64, 8),
                    ast::UnaryOp::Not => (UnaryOp::Not8, 1),
                };

                let dst = proc.make_tmp(width);
                proc.add_quad(Quad::new(QuadKind::UnaryOp {
                    dst: dst.clone(),
                    op: opcode,
                    src,
                }));
                Ok(dst)
            }
        }
    }

    /// `a[i]`: the returned address operand stands for the element location;
    /// the backend treats reads and writes through it as dereferences. Word
    /// elements scale the offset by 8 first.
    fn flatten_index(
        &mut self,
        proc: &mut Procedure,
        expression: &Expression,
        base: &Expression,
        index: &Expression,
    ) -> Result<Opd, InternalError> {
        let base_opd = self.flatten(proc, base)?;
        let offset = self.flatten(proc, index)?;

        let element_width = self.program.op_width(expression.id)?;

        let (dst, offset) = if element_width == 1 {
            (proc.make_addr_opd(1), offset)
        } else {
            let scaled = proc.make_tmp(8);
            proc.add_quad(Quad::new(QuadKind::BinOp {
                dst: scaled.clone(),
                op: BinOp::Mult64,
                lhs: offset,
                rhs: Opd::Lit {
                    text: "8".to_string(),
                    width: 8,
                },
            }));
            (proc.make_addr_opd(8), scaled)
        };

        proc.add_quad(Quad::new(QuadKind::Index {
            dst: dst.clone(),
            base: base_opd,
            offset,
        }));
        Ok(dst)
    }

    /// Arguments flatten left to right, then `setarg 1..N` in order, then
    /// the call; a non-void callee's result is read into a fresh 8-byte
    /// temporary. Returns None for a void call.
    fn flatten_call(
        &mut self,
        proc: &mut Procedure,
        callee: &Identifier,
        arguments: &[Expression],
    ) -> Result<Option<Opd>, InternalError> {
        let mut opds = Vec::with_capacity(arguments.len());
        for argument in arguments {
            opds.push(self.flatten(proc, argument)?);
        }

        for (i, opd) in opds.into_iter().enumerate() {
            proc.add_quad(Quad::new(QuadKind::SetArg { index: i + 1, opd }));
        }

        let id = self.resolution(callee.id)?;
        let symbol = self.names.symbol(id);

        proc.add_quad(Quad::new(QuadKind::Call {
            target: Label::entry(&symbol.name),
        }));

        let signature = symbol
            .ty
            .as_fn()
            .ok_or_else(|| InternalError::new("call target is not a function"))?;

        if signature.ret.is_void() {
            return Ok(None);
        }

        let dst = proc.make_tmp(8);
        proc.add_quad(Quad::new(QuadKind::GetRet { opd: dst.clone() }));
        Ok(Some(dst))
    }
}

fn sized_binop(op: ast::BinaryOp, wide: bool) -> BinOp {
    match (op, wide) {
        (ast::BinaryOp::Add, true) => BinOp::Add64,
        (ast::BinaryOp::Add, false) => BinOp::Add8,
        (ast::BinaryOp::Subtract, true) => BinOp::Sub64,
        (ast::BinaryOp::Subtract, false) => BinOp::Sub8,
        (ast::BinaryOp::Multiply, true) => BinOp::Mult64,
        (ast::BinaryOp::Multiply, false) => BinOp::Mult8,
        (ast::BinaryOp::Divide, true) => BinOp::Div64,
        (ast::BinaryOp::Divide, false) => BinOp::Div8,
        (ast::BinaryOp::Equals, true) => BinOp::Eq64,
        (ast::BinaryOp::Equals, false) => BinOp::Eq8,
        (ast::BinaryOp::NotEquals, true) => BinOp::Neq64,
        (ast::BinaryOp::NotEquals, false) => BinOp::Neq8,
        (ast::BinaryOp::Less, true) => BinOp::Lt64,
        (ast::BinaryOp::Less, false) => BinOp::Lt8,
        (ast::BinaryOp::LessEq, true) => BinOp::Lte64,
        (ast::BinaryOp::LessEq, false) => BinOp::Lte8,
        (ast::BinaryOp::Greater, true) => BinOp::Gt64,
        (ast::BinaryOp::Greater, false) => BinOp::Gt8,
        (ast::BinaryOp::GreaterEq, true) => BinOp::Gte64,
        (ast::BinaryOp::GreaterEq, false) => BinOp::Gte8,
        (ast::BinaryOp::And, _) => BinOp::And8,
        (ast::BinaryOp::Or, _) => BinOp::Or8,
    }
}

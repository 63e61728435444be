//! Type analysis.
//!
//! A post-order walk over the resolved AST that gives every declaration,
//! statement, and expression node a type in a side map. Implicit Byte -> Int
//! widening is recorded as a "coerce-as" annotation on the widened node
//! rather than by rewriting the tree; lowering applies the annotation after
//! flattening the node.
//!
//! A broken expression gets the poison type, which silences any further
//! complaint about it from enclosing nodes: one mistake, one diagnostic. The
//! walk always finishes so a single run reports every error in the program.

use hashbrown::HashMap;

use crate::{
    diagnostics::{report_fatal, Position},
    frontend::{
        ast::{
            BinaryOp, BinaryOpClass, Decl, DeclKind, Expression, ExpressionKind, FnDecl,
            Identifier, NodeId, Program, Statement, StatementKind, UnaryOp, VarDecl,
        },
        lexer::Span,
        SourceFile,
    },
    middle::{
        resolve::NameAnalysis,
        ty::{self, BasicKind, Type},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticErrorKind {
    MathOperand,
    LogicOperand,
    RelationalOperand,
    EqualityOperand,
    EqualityOperation,
    AssignOperand,
    AssignOperation,
    IndexBase,
    IndexType,
    Callee,
    ArgCount,
    ArgMismatch,
    MissingReturnValue,
    ReturnValueInVoid,
    BadReturnValue,
    IfCondition,
    WhileCondition,
    ReadFunction,
    ReadOther,
    WriteFunction,
    WriteVoid,
    WriteArray,
}

impl core::fmt::Display for SemanticErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let message = match self {
            Self::MathOperand => "Arithmetic operator applied to invalid operand",
            Self::LogicOperand => "Logical operator applied to non-bool operand",
            Self::RelationalOperand => "Relational operator applied to non-numeric operand",
            Self::EqualityOperand => "Invalid equality operand",
            Self::EqualityOperation => "Invalid equality operation",
            Self::AssignOperand => "Invalid assignment operand",
            Self::AssignOperation => "Invalid assignment operation",
            Self::IndexBase => "Attempt to index a non-array",
            Self::IndexType => "Bad index type",
            Self::Callee => "Attempt to call a non-function",
            Self::ArgCount => "Function call with wrong number of args",
            Self::ArgMismatch => "Type of actual does not match type of formal",
            Self::MissingReturnValue => "Missing return value",
            Self::ReturnValueInVoid => "Return with a value in void function",
            Self::BadReturnValue => "Bad return value",
            Self::IfCondition => "Non-bool expression used as an if condition",
            Self::WhileCondition => "Non-bool expression used as a while condition",
            Self::ReadFunction => "Attempt to read a function",
            Self::ReadOther => "Attempt to read to illegal type",
            Self::WriteFunction => "Attempt to output a function",
            Self::WriteVoid => "Attempt to write void",
            Self::WriteArray => "Attempt to write array",
        };

        f.write_str(message)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SemanticError {
    pub kind: SemanticErrorKind,
    pub pos: Position,
}

/// The output of type analysis.
#[derive(Debug)]
pub struct TypeAnalysis {
    node_types: HashMap<NodeId, Type>,
    /// Nodes whose value is widened Byte -> Int after evaluation, and the
    /// type they widen to.
    coercions: HashMap<NodeId, Type>,
    pub errors: Vec<SemanticError>,
    has_error: bool,
}

impl TypeAnalysis {
    pub fn check(program: &Program, names: &NameAnalysis) -> TypeAnalysis {
        let mut checker = TypeChecker {
            source: program.source_file,
            names,
            current_ret: None,
            result: TypeAnalysis {
                node_types: HashMap::new(),
                coercions: HashMap::new(),
                errors: Vec::new(),
                has_error: false,
            },
        };

        for decl in &program.globals {
            checker.check_decl(decl);
        }

        checker.result
    }

    pub fn passed(&self) -> bool {
        !self.has_error
    }

    pub fn node_type(&self, id: NodeId) -> Option<&Type> {
        self.node_types.get(&id)
    }

    pub fn coercion(&self, id: NodeId) -> Option<&Type> {
        self.coercions.get(&id)
    }
}

struct TypeChecker<'a> {
    source: &'a SourceFile,
    names: &'a NameAnalysis,
    /// Return type of the function being checked
    current_ret: Option<Type>,
    result: TypeAnalysis,
}

impl<'a> TypeChecker<'a> {
    fn report(&mut self, kind: SemanticErrorKind, span: Span) {
        let pos = self.source.position_of_span(span);
        report_fatal(pos, &kind.to_string());
        self.result.errors.push(SemanticError { kind, pos });
        self.result.has_error = true;
    }

    fn set_type(&mut self, id: NodeId, ty: Type) -> Type {
        self.result.node_types.insert(id, ty.clone());
        ty
    }

    /// Marks a node as widened Byte -> Int. Never applied to a node that is
    /// already Int.
    fn widen(&mut self, expression: &Expression) {
        self.result
            .coercions
            .insert(expression.id, ty::basic(BasicKind::Int));
    }

    /// Type of a resolved identifier node, or poison when name analysis had
    /// nothing for it (it already complained).
    fn symbol_type(&self, id: NodeId) -> Type {
        match self.names.resolution(id) {
            Some(symbol) => self.names.symbol(symbol).ty.clone(),
            None => ty::error(),
        }
    }

    fn check_decl(&mut self, decl: &Decl) {
        match &decl.kind {
            DeclKind::Var(var) => {
                let declared = self.check_var_decl(var);
                self.set_type(decl.id, declared);
            }
            DeclKind::Fn(function) => {
                let fn_type = self.symbol_type(function.name.id);
                self.set_type(decl.id, fn_type);
                self.check_fn_decl(function);
            }
        }
    }

    fn check_var_decl(&mut self, var: &VarDecl) -> Type {
        let declared = self.symbol_type(var.name.id);
        self.set_type(var.ty.id, declared.clone());
        declared
    }

    fn check_fn_decl(&mut self, function: &FnDecl) {
        let fn_type = self.symbol_type(function.name.id);

        let ret = match fn_type.as_fn() {
            Some(signature) => signature.ret.clone(),
            // Name analysis poisoned the declaration; checking the body
            // against an unknown return type still surfaces local errors.
            None => ty::error(),
        };

        for formal in &function.formals {
            let declared = self.symbol_type(formal.name.id);
            self.set_type(formal.id, declared);
        }

        self.current_ret = Some(ret);

        for statement in &function.body {
            self.check_statement(statement);
        }

        self.current_ret = None;
    }

    fn check_body(&mut self, body: &[Statement]) {
        for statement in body {
            self.check_statement(statement);
        }
    }

    fn check_statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::VarDecl(var) => {
                let declared = self.check_var_decl(var);
                self.set_type(statement.id, declared);
            }
            StatementKind::Assign(expression) | StatementKind::Call(expression) => {
                let ty = self.check_expression(expression);
                let stmt_ty = if ty.is_error() {
                    ty::error()
                } else {
                    ty::basic(BasicKind::Void)
                };
                self.set_type(statement.id, stmt_ty);
            }
            StatementKind::PostIncrement(target) | StatementKind::PostDecrement(target) => {
                let ty = self.check_expression(target);

                if !(ty.is_error() || ty.is_int() || ty.is_byte()) {
                    self.report(SemanticErrorKind::MathOperand, target.span);
                    self.set_type(statement.id, ty::error());
                } else {
                    self.set_type(statement.id, ty::basic(BasicKind::Void));
                }
            }
            StatementKind::Read(target) => self.check_read(statement, target),
            StatementKind::Write(source) => self.check_write(statement, source),
            StatementKind::If { condition, body } => {
                let good = self.check_condition(condition, SemanticErrorKind::IfCondition);
                self.check_body(body);

                let stmt_ty = if good {
                    ty::basic(BasicKind::Void)
                } else {
                    ty::error()
                };
                self.set_type(statement.id, stmt_ty);
            }
            StatementKind::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                let good = self.check_condition(condition, SemanticErrorKind::IfCondition);
                self.check_body(then_body);
                self.check_body(else_body);

                let stmt_ty = if good {
                    ty::basic(BasicKind::Void)
                } else {
                    ty::error()
                };
                self.set_type(statement.id, stmt_ty);
            }
            StatementKind::While { condition, body } => {
                let good = self.check_condition(condition, SemanticErrorKind::WhileCondition);
                self.check_body(body);

                let stmt_ty = if good {
                    ty::basic(BasicKind::Void)
                } else {
                    ty::error()
                };
                self.set_type(statement.id, stmt_ty);
            }
            StatementKind::Return(value) => self.check_return(statement, value.as_ref()),
        }
    }

    /// Types a loop or branch condition; true when it is a usable bool.
    fn check_condition(&mut self, condition: &Expression, kind: SemanticErrorKind) -> bool {
        let ty = self.check_expression(condition);

        if ty.is_error() {
            return false;
        }

        if !ty.is_bool() {
            self.report(kind, condition.span);
            return false;
        }

        true
    }

    fn check_read(&mut self, statement: &Statement, target: &Expression) {
        let ty = self.check_expression(target);

        if ty.is_error() {
            self.set_type(statement.id, ty::error());
            return;
        }

        if ty.is_bool() || ty.is_int() {
            self.set_type(statement.id, ty::basic(BasicKind::Void));
            return;
        }

        if let Some((base, _)) = ty.as_array() {
            if base == BasicKind::Byte {
                self.set_type(statement.id, ty::basic(BasicKind::Void));
                return;
            }
        }

        if ty.as_fn().is_some() {
            self.report(SemanticErrorKind::ReadFunction, target.span);
        } else {
            self.report(SemanticErrorKind::ReadOther, target.span);
        }

        self.set_type(statement.id, ty::error());
    }

    fn check_write(&mut self, statement: &Statement, source: &Expression) {
        let ty = self.check_expression(source);

        if ty.is_error() {
            self.set_type(statement.id, ty::error());
            return;
        }

        if ty.is_void() {
            self.report(SemanticErrorKind::WriteVoid, source.span);
            self.set_type(statement.id, ty::error());
            return;
        }

        if ty.as_fn().is_some() {
            self.report(SemanticErrorKind::WriteFunction, source.span);
            self.set_type(statement.id, ty::error());
            return;
        }

        if let Some((base, _)) = ty.as_array() {
            if base != BasicKind::Byte {
                self.report(SemanticErrorKind::WriteArray, source.span);
                self.set_type(statement.id, ty::error());
                return;
            }
        }

        self.set_type(statement.id, ty::basic(BasicKind::Void));
    }

    fn check_return(&mut self, statement: &Statement, value: Option<&Expression>) {
        let expected = self
            .current_ret
            .clone()
            .unwrap_or_else(ty::error);

        if expected.is_void() {
            match value {
                Some(value) => {
                    self.check_expression(value);
                    self.report(SemanticErrorKind::ReturnValueInVoid, value.span);
                    self.set_type(statement.id, ty::error());
                }
                None => {
                    self.set_type(statement.id, ty::basic(BasicKind::Void));
                }
            }
            return;
        }

        let Some(value) = value else {
            self.report(SemanticErrorKind::MissingReturnValue, statement.span);
            self.set_type(statement.id, ty::error());
            return;
        };

        let actual = self.check_expression(value);

        if actual.is_error() {
            self.set_type(statement.id, ty::error());
            return;
        }

        if actual.is_byte() && expected.is_int() {
            self.widen(value);
            self.set_type(statement.id, ty::basic(BasicKind::Void));
            return;
        }

        if actual != expected {
            self.report(SemanticErrorKind::BadReturnValue, value.span);
            self.set_type(statement.id, ty::error());
            return;
        }

        self.set_type(statement.id, ty::basic(BasicKind::Void));
    }

    fn check_expression(&mut self, expression: &Expression) -> Type {
        let ty = match &expression.kind {
            ExpressionKind::IntLiteral(value) => {
                if *value < 256 {
                    ty::basic(BasicKind::Byte)
                } else {
                    ty::basic(BasicKind::Int)
                }
            }
            ExpressionKind::StrLiteral(_) => ty::array(BasicKind::Byte, 0),
            ExpressionKind::True | ExpressionKind::False | ExpressionKind::Havoc => {
                ty::basic(BasicKind::Bool)
            }
            ExpressionKind::Identifier(_) => self.symbol_type(expression.id),
            ExpressionKind::Index { base, index } => self.check_index(base, index),
            ExpressionKind::Call { callee, arguments } => {
                self.check_call(callee, arguments)
            }
            ExpressionKind::Assignment { target, value } => {
                self.check_assignment(expression, target, value)
            }
            ExpressionKind::Binary { op, lhs, rhs } => {
                self.check_binary(expression, *op, lhs, rhs)
            }
            ExpressionKind::Unary { op, operand } => self.check_unary(*op, operand),
        };

        self.set_type(expression.id, ty)
    }

    fn check_index(&mut self, base: &Expression, index: &Expression) -> Type {
        let base_ty = self.check_expression(base);
        let index_ty = self.check_expression(index);

        if base_ty.is_error() || index_ty.is_error() {
            return ty::error();
        }

        let element = match base_ty.as_array() {
            Some((element, _)) => ty::basic(element),
            None => {
                self.report(SemanticErrorKind::IndexBase, base.span);
                ty::error()
            }
        };

        if index_ty.is_int() || index_ty.is_byte() {
            return element;
        }

        self.report(SemanticErrorKind::IndexType, index.span);
        ty::error()
    }

    fn check_call(&mut self, callee: &Identifier, arguments: &[Expression]) -> Type {
        let argument_types = arguments
            .iter()
            .map(|argument| self.check_expression(argument))
            .collect::<Vec<_>>();

        let callee_ty = self.symbol_type(callee.id);

        if callee_ty.is_error() {
            return ty::error();
        }

        let Some(signature) = callee_ty.as_fn() else {
            self.report(SemanticErrorKind::Callee, callee.span);
            return ty::error();
        };

        let signature = signature.clone();

        if argument_types.len() != signature.formals.len() {
            self.report(SemanticErrorKind::ArgCount, callee.span);
            // The call still has the declared return type so one bad arity
            // does not ripple through the enclosing expression.
            return signature.ret;
        }

        for ((argument, actual), formal) in arguments
            .iter()
            .zip(argument_types.iter())
            .zip(signature.formals.iter())
        {
            if actual.is_error() || formal.is_error() {
                continue;
            }

            if actual == formal {
                continue;
            }

            if let (Some((actual_base, _)), Some((formal_base, _))) =
                (actual.as_array(), formal.as_array())
            {
                if actual_base == formal_base {
                    continue;
                }
            }

            if formal.is_int() && actual.is_byte() {
                self.widen(argument);
                continue;
            }

            self.report(SemanticErrorKind::ArgMismatch, argument.span);
        }

        signature.ret
    }

    /// A side of an assignment must be a non-void basic type or an array.
    /// Poisoned sides fail silently; anything else is reported here.
    fn assign_operand(&mut self, operand: &Expression) -> Option<Type> {
        let ty = self.check_expression(operand);

        if ty.is_error() {
            return None;
        }

        if let Some(kind) = ty.as_basic() {
            if kind == BasicKind::Void {
                self.report(SemanticErrorKind::AssignOperand, operand.span);
                return None;
            }
            return Some(ty);
        }

        if ty.is_array() {
            return Some(ty);
        }

        self.report(SemanticErrorKind::AssignOperand, operand.span);
        None
    }

    fn check_assignment(
        &mut self,
        expression: &Expression,
        target: &Expression,
        value: &Expression,
    ) -> Type {
        let target_ty = self.assign_operand(target);
        let value_ty = self.assign_operand(value);

        let (Some(target_ty), Some(value_ty)) = (target_ty, value_ty) else {
            return ty::error();
        };

        if target_ty == value_ty {
            return target_ty;
        }

        if let (Some((target_base, _)), Some((value_base, _))) =
            (target_ty.as_array(), value_ty.as_array())
        {
            if target_base == value_base {
                return target_ty;
            }
        }

        if target_ty.is_int() && value_ty.is_byte() {
            self.widen(value);
            return ty::basic(BasicKind::Int);
        }

        self.report(SemanticErrorKind::AssignOperation, expression.span);
        ty::error()
    }

    /// An arithmetic or relational operand must be int or byte. Poisoned
    /// operands fail silently.
    fn numeric_operand(&mut self, operand: &Expression, kind: SemanticErrorKind) -> Option<Type> {
        let ty = self.check_expression(operand);

        if ty.is_int() || ty.is_byte() {
            return Some(ty);
        }

        if ty.is_error() {
            return None;
        }

        self.report(kind, operand.span);
        None
    }

    /// An equality operand must be int, byte, or bool; arrays are explicitly
    /// not comparable.
    fn equality_operand(&mut self, operand: &Expression) -> Option<Type> {
        let ty = self.check_expression(operand);

        if ty.is_int() || ty.is_byte() || ty.is_bool() {
            return Some(ty);
        }

        if ty.is_error() {
            return None;
        }

        self.report(SemanticErrorKind::EqualityOperand, operand.span);
        None
    }

    fn logic_operand(&mut self, operand: &Expression) -> Option<Type> {
        let ty = self.check_expression(operand);

        if ty.is_bool() {
            return Some(ty);
        }

        if ty.is_error() {
            return None;
        }

        self.report(SemanticErrorKind::LogicOperand, operand.span);
        None
    }

    fn check_binary(
        &mut self,
        expression: &Expression,
        op: BinaryOp,
        lhs: &Expression,
        rhs: &Expression,
    ) -> Type {
        match op.class() {
            BinaryOpClass::Arithmetic => {
                let lhs_ty = self.numeric_operand(lhs, SemanticErrorKind::MathOperand);
                let rhs_ty = self.numeric_operand(rhs, SemanticErrorKind::MathOperand);

                let (Some(lhs_ty), Some(rhs_ty)) = (lhs_ty, rhs_ty) else {
                    return ty::error();
                };

                if lhs_ty.is_byte() && rhs_ty.is_byte() {
                    return ty::basic(BasicKind::Byte);
                }

                if lhs_ty.is_byte() {
                    self.widen(lhs);
                }
                if rhs_ty.is_byte() {
                    self.widen(rhs);
                }

                ty::basic(BasicKind::Int)
            }
            BinaryOpClass::Relational => {
                let lhs_ty = self.numeric_operand(lhs, SemanticErrorKind::RelationalOperand);
                let rhs_ty = self.numeric_operand(rhs, SemanticErrorKind::RelationalOperand);

                let (Some(lhs_ty), Some(rhs_ty)) = (lhs_ty, rhs_ty) else {
                    return ty::error();
                };

                if lhs_ty.is_byte() && rhs_ty.is_int() {
                    self.widen(lhs);
                }
                if lhs_ty.is_int() && rhs_ty.is_byte() {
                    self.widen(rhs);
                }

                ty::basic(BasicKind::Bool)
            }
            BinaryOpClass::Equality => {
                let lhs_ty = self.equality_operand(lhs);
                let rhs_ty = self.equality_operand(rhs);

                let (Some(lhs_ty), Some(rhs_ty)) = (lhs_ty, rhs_ty) else {
                    return ty::error();
                };

                if lhs_ty == rhs_ty {
                    return ty::basic(BasicKind::Bool);
                }

                if lhs_ty.is_byte() && rhs_ty.is_int() {
                    self.widen(lhs);
                    return ty::basic(BasicKind::Bool);
                }

                if lhs_ty.is_int() && rhs_ty.is_byte() {
                    self.widen(rhs);
                    return ty::basic(BasicKind::Bool);
                }

                self.report(SemanticErrorKind::EqualityOperation, expression.span);
                ty::error()
            }
            BinaryOpClass::Logical => {
                let lhs_ty = self.logic_operand(lhs);
                let rhs_ty = self.logic_operand(rhs);

                if lhs_ty.is_none() || rhs_ty.is_none() {
                    return ty::error();
                }

                ty::basic(BasicKind::Bool)
            }
        }
    }

    fn check_unary(&mut self, op: UnaryOp, operand: &Expression) -> Type {
        let operand_ty = self.check_expression(operand);

        if operand_ty.is_error() {
            return ty::error();
        }

        match op {
            UnaryOp::Negate => {
                if operand_ty.is_int() {
                    return ty::basic(BasicKind::Int);
                }

                if operand_ty.is_byte() {
                    self.widen(operand);
                    return ty::basic(BasicKind::Int);
                }

                self.report(SemanticErrorKind::MathOperand, operand.span);
                ty::error()
            }
            UnaryOp::Not => {
                if operand_ty.is_bool() {
                    return operand_ty;
                }

                self.report(SemanticErrorKind::LogicOperand, operand.span);
                ty::error()
            }
        }
    }
}

//! Canonical unparse of the AST.
//!
//! Renders the tree back to source form with one statement per line and tab
//! indentation. With a name analysis attached, every identifier prints as
//! `name(type)` so resolved symbols are visible in the output.

use crate::middle::resolve::NameAnalysis;

use super::ast::{
    Decl, DeclKind, Expression, ExpressionKind, FnDecl, NodeId, Program, Statement, StatementKind,
    TypeSpec, TypeSpecKind, VarDecl,
};

pub fn unparse_program(program: &Program, names: Option<&NameAnalysis>) -> String {
    let mut unparser = Unparser {
        out: String::new(),
        names,
    };

    for decl in &program.globals {
        unparser.decl(decl, 0);
    }

    unparser.out
}

struct Unparser<'a> {
    out: String,
    names: Option<&'a NameAnalysis>,
}

impl<'a> Unparser<'a> {
    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push('\t');
        }
    }

    fn identifier(&mut self, name: &str, id: NodeId) {
        self.out.push_str(name);

        if let Some(names) = self.names {
            if let Some(symbol) = names.resolution(id) {
                let ty = &names.symbol(symbol).ty;
                self.out.push_str(&format!("({ty})"));
            }
        }
    }

    fn type_spec(&mut self, spec: &TypeSpec) {
        match &spec.kind {
            TypeSpecKind::Int => self.out.push_str("int"),
            TypeSpecKind::Byte => self.out.push_str("byte"),
            TypeSpecKind::Bool => self.out.push_str("bool"),
            TypeSpecKind::Void => self.out.push_str("void"),
            TypeSpecKind::Array { base, length } => {
                self.type_spec(base);
                self.out.push_str(&format!(" array[{length}]"));
            }
        }
    }

    fn decl(&mut self, decl: &Decl, depth: usize) {
        match &decl.kind {
            DeclKind::Var(var) => self.var_decl(var, depth),
            DeclKind::Fn(function) => self.fn_decl(function, depth),
        }
    }

    fn var_decl(&mut self, var: &VarDecl, depth: usize) {
        self.indent(depth);
        self.identifier(&var.name.name, var.name.id);
        self.out.push(':');
        self.type_spec(&var.ty);
        self.out.push_str(";\n");
    }

    fn fn_decl(&mut self, function: &FnDecl, depth: usize) {
        self.indent(depth);
        self.identifier(&function.name.name, function.name.id);
        self.out.push(':');
        self.type_spec(&function.ret);
        self.out.push('(');

        for (i, formal) in function.formals.iter().enumerate() {
            if i > 0 {
                self.out.push_str(", ");
            }

            self.identifier(&formal.name.name, formal.name.id);
            self.out.push(':');
            self.type_spec(&formal.ty);
        }

        self.out.push_str("){\n");

        for statement in &function.body {
            self.statement(statement, depth + 1);
        }

        self.indent(depth);
        self.out.push_str("}\n");
    }

    fn block(&mut self, body: &[Statement], depth: usize) {
        for statement in body {
            self.statement(statement, depth + 1);
        }
        self.indent(depth);
    }

    fn statement(&mut self, statement: &Statement, depth: usize) {
        match &statement.kind {
            StatementKind::VarDecl(var) => self.var_decl(var, depth),
            StatementKind::Assign(expression) | StatementKind::Call(expression) => {
                self.indent(depth);
                self.expression(expression, false);
                self.out.push_str(";\n");
            }
            StatementKind::PostIncrement(target) => {
                self.indent(depth);
                self.expression(target, false);
                self.out.push_str("++;\n");
            }
            StatementKind::PostDecrement(target) => {
                self.indent(depth);
                self.expression(target, false);
                self.out.push_str("--;\n");
            }
            StatementKind::Read(target) => {
                self.indent(depth);
                self.out.push_str("read ");
                self.expression(target, false);
                self.out.push_str(";\n");
            }
            StatementKind::Write(source) => {
                self.indent(depth);
                self.out.push_str("write ");
                self.expression(source, false);
                self.out.push_str(";\n");
            }
            StatementKind::If { condition, body } => {
                self.indent(depth);
                self.out.push_str("if (");
                self.expression(condition, false);
                self.out.push_str("){\n");
                self.block(body, depth);
                self.out.push_str("}\n");
            }
            StatementKind::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                self.indent(depth);
                self.out.push_str("if (");
                self.expression(condition, false);
                self.out.push_str("){\n");
                self.block(then_body, depth);
                self.out.push_str("} else {\n");
                self.block(else_body, depth);
                self.out.push_str("}\n");
            }
            StatementKind::While { condition, body } => {
                self.indent(depth);
                self.out.push_str("while (");
                self.expression(condition, false);
                self.out.push_str("){\n");
                self.block(body, depth);
                self.out.push_str("}\n");
            }
            StatementKind::Return(value) => {
                self.indent(depth);
                self.out.push_str("return");

                if let Some(value) = value {
                    self.out.push(' ');
                    self.expression(value, false);
                }

                self.out.push_str(";\n");
            }
        }
    }

    /// `nested` wraps compound expressions in parens, the way they print as
    /// operands of an enclosing expression.
    fn expression(&mut self, expression: &Expression, nested: bool) {
        let compound = matches!(
            expression.kind,
            ExpressionKind::Binary { .. }
                | ExpressionKind::Unary { .. }
                | ExpressionKind::Assignment { .. }
        );

        if nested && compound {
            self.out.push('(');
        }

        match &expression.kind {
            ExpressionKind::IntLiteral(value) => self.out.push_str(&value.to_string()),
            ExpressionKind::StrLiteral(text) => self.out.push_str(text),
            ExpressionKind::True => self.out.push_str("true"),
            ExpressionKind::False => self.out.push_str("false"),
            ExpressionKind::Havoc => self.out.push_str("havoc"),
            ExpressionKind::Identifier(name) => self.identifier(name, expression.id),
            ExpressionKind::Index { base, index } => {
                self.expression(base, false);
                self.out.push('[');
                self.expression(index, false);
                self.out.push(']');
            }
            ExpressionKind::Call { callee, arguments } => {
                self.identifier(&callee.name, callee.id);
                self.out.push('(');

                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expression(argument, false);
                }

                self.out.push(')');
            }
            ExpressionKind::Assignment { target, value } => {
                self.expression(target, true);
                self.out.push_str(" = ");
                self.expression(value, true);
            }
            ExpressionKind::Binary { op, lhs, rhs } => {
                self.expression(lhs, true);
                self.out.push_str(&format!(" {op} "));
                self.expression(rhs, true);
            }
            ExpressionKind::Unary { op, operand } => {
                self.out.push_str(&op.to_string());
                self.expression(operand, true);
            }
        }

        if nested && compound {
            self.out.push(')');
        }
    }
}

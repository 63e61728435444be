//! Name analysis.
//!
//! Walks the program with a stack of scopes, binding every declaration to a
//! fresh symbol and every identifier use to the symbol it names. The tree is
//! not mutated; resolutions live in a `NodeId -> SymbolId` side map. Errors
//! are reported as they are found and the walk continues, so one run surfaces
//! every bad name.

use hashbrown::HashMap;

use crate::{
    diagnostics::{report_fatal, Position},
    frontend::{
        ast::{
            Decl, DeclKind, Expression, ExpressionKind, FnDecl, Identifier, NodeId, Program,
            Statement, StatementKind, TypeSpec, TypeSpecKind, VarDecl,
        },
        lexer::Span,
        SourceFile,
    },
    index::{simple_index, IndexVec},
    middle::ty::{self, BasicKind, Type},
};

simple_index! {
    /// Identifies a symbol produced by name analysis. Symbols are compared
    /// and used as map keys through this id, which is identity.
    pub struct SymbolId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Function,
}

#[derive(Debug)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub ty: Type,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: IndexVec<SymbolId, Symbol>,
}

impl SymbolTable {
    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    fn declare(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameErrorKind {
    Undeclared,
    MultiplyDeclared,
    BadDeclaredType,
}

impl core::fmt::Display for NameErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undeclared => write!(f, "Undeclared identifier"),
            Self::MultiplyDeclared => write!(f, "Multiply declared identifier"),
            Self::BadDeclaredType => write!(f, "Invalid type in declaration"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NameError {
    pub kind: NameErrorKind,
    pub pos: Position,
}

/// The output of name analysis: the symbol table, the resolution side map,
/// and whatever went wrong.
#[derive(Debug)]
pub struct NameAnalysis {
    pub symbols: SymbolTable,
    resolutions: HashMap<NodeId, SymbolId>,
    pub errors: Vec<NameError>,
}

impl NameAnalysis {
    pub fn build(program: &Program) -> NameAnalysis {
        let mut resolver = Resolver {
            source: program.source_file,
            scopes: vec![HashMap::new()],
            result: NameAnalysis {
                symbols: SymbolTable::default(),
                resolutions: HashMap::new(),
                errors: Vec::new(),
            },
        };

        for decl in &program.globals {
            resolver.resolve_decl(decl);
        }

        resolver.result
    }

    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn resolution(&self, id: NodeId) -> Option<SymbolId> {
        self.resolutions.get(&id).copied()
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        self.symbols.get(id)
    }
}

struct Resolver<'p> {
    source: &'p SourceFile,
    /// Innermost scope last. Globals live in the first entry.
    scopes: Vec<HashMap<String, SymbolId>>,
    result: NameAnalysis,
}

impl<'p> Resolver<'p> {
    fn report(&mut self, kind: NameErrorKind, span: Span) {
        let pos = self.source.position_of_span(span);
        report_fatal(pos, &kind.to_string());
        self.result.errors.push(NameError { kind, pos });
    }

    fn lookup(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    /// Binds a new symbol in the innermost scope, reporting a conflict with
    /// any existing binding in that same scope (shadowing an outer scope is
    /// fine).
    fn declare(&mut self, name: &Identifier, kind: SymbolKind, ty: Type) -> Option<SymbolId> {
        if self.scopes.last().unwrap().contains_key(&name.name) {
            self.report(NameErrorKind::MultiplyDeclared, name.span);
            return None;
        }

        let id = self.result.symbols.declare(Symbol {
            name: name.name.clone(),
            kind,
            ty,
        });

        self.scopes
            .last_mut()
            .unwrap()
            .insert(name.name.clone(), id);
        self.result.resolutions.insert(name.id, id);

        Some(id)
    }

    /// The interned type a type spec names, or None for an array over void
    /// (which the universe refuses to construct).
    fn spec_type(&self, spec: &TypeSpec) -> Option<Type> {
        match &spec.kind {
            TypeSpecKind::Int => Some(ty::basic(BasicKind::Int)),
            TypeSpecKind::Byte => Some(ty::basic(BasicKind::Byte)),
            TypeSpecKind::Bool => Some(ty::basic(BasicKind::Bool)),
            TypeSpecKind::Void => Some(ty::basic(BasicKind::Void)),
            TypeSpecKind::Array { base, length } => match base.kind {
                TypeSpecKind::Int => Some(ty::array(BasicKind::Int, *length)),
                TypeSpecKind::Byte => Some(ty::array(BasicKind::Byte, *length)),
                TypeSpecKind::Bool => Some(ty::array(BasicKind::Bool, *length)),
                _ => None,
            },
        }
    }

    /// Type of a variable or formal declaration; reports and poisons invalid
    /// ones so later uses do not cascade into undeclared-identifier noise.
    fn declared_var_type(&mut self, spec: &TypeSpec) -> Type {
        match self.spec_type(spec) {
            Some(declared) if declared.valid_var_type() => declared,
            _ => {
                self.report(NameErrorKind::BadDeclaredType, spec.span);
                ty::error()
            }
        }
    }

    fn resolve_decl(&mut self, decl: &Decl) {
        match &decl.kind {
            DeclKind::Var(var) => self.resolve_var_decl(var),
            DeclKind::Fn(function) => self.resolve_fn_decl(function),
        }
    }

    fn resolve_var_decl(&mut self, var: &VarDecl) {
        let declared = self.declared_var_type(&var.ty);
        self.declare(&var.name, SymbolKind::Variable, declared);
    }

    fn resolve_fn_decl(&mut self, function: &FnDecl) {
        // The function's own name goes into the enclosing scope first so the
        // body can recurse.
        let ret = match self.spec_type(&function.ret) {
            Some(ret) => ret,
            None => {
                self.report(NameErrorKind::BadDeclaredType, function.ret.span);
                ty::error()
            }
        };

        let formal_types = function
            .formals
            .iter()
            .map(|formal| match self.spec_type(&formal.ty) {
                Some(declared) if declared.valid_var_type() => declared,
                _ => ty::error(),
            })
            .collect::<Vec<_>>();

        let fn_type = ty::function(formal_types, ret);
        self.declare(&function.name, SymbolKind::Function, fn_type);

        // Formals and body share one scope.
        self.scopes.push(HashMap::new());

        for formal in &function.formals {
            let declared = self.declared_var_type(&formal.ty);
            self.declare(&formal.name, SymbolKind::Variable, declared);
        }

        for statement in &function.body {
            self.resolve_statement(statement);
        }

        self.scopes.pop();
    }

    fn resolve_block(&mut self, body: &[Statement]) {
        self.scopes.push(HashMap::new());

        for statement in body {
            self.resolve_statement(statement);
        }

        self.scopes.pop();
    }

    fn resolve_statement(&mut self, statement: &Statement) {
        match &statement.kind {
            StatementKind::VarDecl(var) => self.resolve_var_decl(var),
            StatementKind::Assign(expression)
            | StatementKind::PostIncrement(expression)
            | StatementKind::PostDecrement(expression)
            | StatementKind::Read(expression)
            | StatementKind::Write(expression)
            | StatementKind::Call(expression) => self.resolve_expression(expression),
            StatementKind::If { condition, body } => {
                self.resolve_expression(condition);
                self.resolve_block(body);
            }
            StatementKind::IfElse {
                condition,
                then_body,
                else_body,
            } => {
                self.resolve_expression(condition);
                self.resolve_block(then_body);
                self.resolve_block(else_body);
            }
            StatementKind::While { condition, body } => {
                self.resolve_expression(condition);
                self.resolve_block(body);
            }
            StatementKind::Return(value) => {
                if let Some(value) = value {
                    self.resolve_expression(value);
                }
            }
        }
    }

    fn resolve_expression(&mut self, expression: &Expression) {
        match &expression.kind {
            ExpressionKind::IntLiteral(_)
            | ExpressionKind::StrLiteral(_)
            | ExpressionKind::True
            | ExpressionKind::False
            | ExpressionKind::Havoc => {}
            ExpressionKind::Identifier(name) => {
                match self.lookup(name) {
                    Some(symbol) => {
                        self.result.resolutions.insert(expression.id, symbol);
                    }
                    None => self.report(NameErrorKind::Undeclared, expression.span),
                };
            }
            ExpressionKind::Index { base, index } => {
                self.resolve_expression(base);
                self.resolve_expression(index);
            }
            ExpressionKind::Call { callee, arguments } => {
                match self.lookup(&callee.name) {
                    Some(symbol) => {
                        self.result.resolutions.insert(callee.id, symbol);
                    }
                    None => self.report(NameErrorKind::Undeclared, callee.span),
                };

                for argument in arguments {
                    self.resolve_expression(argument);
                }
            }
            ExpressionKind::Assignment { target, value } => {
                // Source order: the target reads before the value in the
                // text even though lowering evaluates the value first.
                self.resolve_expression(target);
                self.resolve_expression(value);
            }
            ExpressionKind::Binary { lhs, rhs, .. } => {
                self.resolve_expression(lhs);
                self.resolve_expression(rhs);
            }
            ExpressionKind::Unary { operand, .. } => self.resolve_expression(operand),
        }
    }
}

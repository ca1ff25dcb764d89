//! Reference rewriter
//!
//! Re-qualifies identifier references bound to imports through the symbol
//! table. Rewriting splices replacements into the original text by span, so
//! everything else (comments and formatting included) is kept verbatim.
//!
//! Shadowing is lexical: a reference is left alone only when a binding of the
//! same name is visible from it (program, function, arrow, block, catch or
//! loop head). Declarations are hoisted to the start of their scope.

use std::collections::HashSet;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, BlockStatement, CatchClause, Declaration, Expression,
    ForInStatement, ForOfStatement, ForStatement, ForStatementInit, ForStatementLeft, Function,
    ImportDeclaration, MethodDefinition, MethodDefinitionKind, ObjectProperty, Program,
    Statement, StaticMemberExpression, VariableDeclaration,
};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::Span;
use oxc_syntax::scope::ScopeFlags;

use crate::heritage::member_path;
use crate::parse::source_type;
use crate::symbols::SymbolTable;

const MEMBER_PREFIX: &str = "class __RewriteTarget extends Object {\n";
const MEMBER_SUFFIX: &str = "\n}";
const EXPRESSION_PREFIX: &str = "(";
const EXPRESSION_SUFFIX: &str = "\n)";

pub struct ReferenceRewriter<'r> {
    symbols: &'r SymbolTable,
    skip_super: bool,
}

impl<'r> ReferenceRewriter<'r> {
    pub fn new(symbols: &'r SymbolTable) -> Self {
        ReferenceRewriter {
            symbols,
            skip_super: false,
        }
    }

    /// Drop a leading `super(...)` statement from constructor bodies.
    pub fn skip_super(mut self, skip: bool) -> Self {
        self.skip_super = skip;
        self
    }

    /// Rewrite a sequence of top-level statements.
    pub fn rewrite_program(&self, code: &str) -> String {
        self.rewrite_wrapped("", code, "")
    }

    /// Rewrite one class member (method, field or accessor).
    pub fn rewrite_member(&self, code: &str) -> String {
        self.rewrite_wrapped(MEMBER_PREFIX, code, MEMBER_SUFFIX)
    }

    pub fn rewrite_expression(&self, code: &str) -> String {
        self.rewrite_wrapped(EXPRESSION_PREFIX, code, EXPRESSION_SUFFIX)
    }

    /// Unparseable input comes back unchanged.
    fn rewrite_wrapped(&self, prefix: &str, code: &str, suffix: &str) -> String {
        if self.symbols.is_empty() && !self.skip_super {
            return code.to_string();
        }
        let wrapped = format!("{}{}{}", prefix, code, suffix);
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, &wrapped, source_type()).parse();
        if !ret.errors.is_empty() {
            tracing::trace!(code, "rewrite skipped: snippet does not parse");
            return code.to_string();
        }

        let mut collector = RewriteCollector {
            symbols: self.symbols,
            scopes: Vec::new(),
            skip_super: self.skip_super,
            source: &wrapped,
            replacements: Vec::new(),
            removals: Vec::new(),
        };
        collector.visit_program(&ret.program);

        let RewriteCollector {
            mut replacements,
            removals,
            ..
        } = collector;
        replacements.retain(|(start, end, _)| {
            !removals
                .iter()
                .any(|(r_start, r_end)| start >= r_start && end <= r_end)
        });
        replacements.extend(removals.into_iter().map(|(s, e)| (s, e, String::new())));
        replacements.sort_by(|a, b| b.0.cmp(&a.0));

        let mut result = wrapped.clone();
        for (start, end, replacement) in replacements {
            result.replace_range((start as usize)..(end as usize), &replacement);
        }
        result[prefix.len()..result.len() - suffix.len()].to_string()
    }
}

/// Binding names under one node. Imports are not bindings here.
#[derive(Default)]
struct BindingNames {
    names: HashSet<String>,
}

impl<'a> Visit<'a> for BindingNames {
    fn visit_binding_identifier(&mut self, ident: &oxc_ast::ast::BindingIdentifier<'a>) {
        self.names.insert(ident.name.to_string());
    }

    fn visit_import_declaration(&mut self, _decl: &ImportDeclaration<'a>) {}
}

impl BindingNames {
    fn variables(&mut self, decl: &VariableDeclaration<'_>) {
        for declarator in &decl.declarations {
            self.visit_binding_pattern(&declarator.id);
        }
    }

    /// Declarations made directly by a statement list, nested scopes excluded.
    fn statements(&mut self, statements: &[Statement<'_>]) {
        for stmt in statements {
            match stmt {
                Statement::VariableDeclaration(decl) => self.variables(decl),
                Statement::FunctionDeclaration(func) => self.function_name(func),
                Statement::ClassDeclaration(class) => {
                    if let Some(id) = &class.id {
                        self.names.insert(id.name.to_string());
                    }
                }
                Statement::ExportNamedDeclaration(export) => match &export.declaration {
                    Some(Declaration::VariableDeclaration(decl)) => self.variables(decl),
                    Some(Declaration::FunctionDeclaration(func)) => self.function_name(func),
                    Some(Declaration::ClassDeclaration(class)) => {
                        if let Some(id) = &class.id {
                            self.names.insert(id.name.to_string());
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }
    }

    fn function_name(&mut self, func: &Function<'_>) {
        if let Some(id) = &func.id {
            self.names.insert(id.name.to_string());
        }
    }
}

struct RewriteCollector<'c> {
    symbols: &'c SymbolTable,
    scopes: Vec<HashSet<String>>,
    skip_super: bool,
    source: &'c str,
    replacements: Vec<(u32, u32, String)>,
    removals: Vec<(u32, u32)>,
}

impl<'c> RewriteCollector<'c> {
    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains(name))
    }

    fn target(&self, name: &str) -> Option<&'c str> {
        if self.is_local(name) {
            return None;
        }
        self.symbols.resolve(name).filter(|full| *full != name)
    }

    fn push_scope(&mut self, bindings: BindingNames) {
        self.scopes.push(bindings.names);
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    /// Statement span extended over the whitespace that follows it.
    fn removal_span(&self, span: Span) -> (u32, u32) {
        let rest = self.source.get(span.end as usize..).unwrap_or_default();
        let trailing = rest.len() - rest.trim_start().len();
        (span.start, span.end + trailing as u32)
    }
}

impl<'a, 'c> Visit<'a> for RewriteCollector<'c> {
    fn visit_program(&mut self, program: &Program<'a>) {
        let mut bindings = BindingNames::default();
        bindings.statements(&program.body);
        self.push_scope(bindings);
        oxc_ast_visit::walk::walk_program(self, program);
        self.pop_scope();
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        let mut bindings = BindingNames::default();
        bindings.function_name(func);
        bindings.visit_formal_parameters(&func.params);
        if let Some(body) = &func.body {
            bindings.statements(&body.statements);
        }
        self.push_scope(bindings);
        oxc_ast_visit::walk::walk_function(self, func, flags);
        self.pop_scope();
    }

    fn visit_arrow_function_expression(&mut self, arrow: &ArrowFunctionExpression<'a>) {
        let mut bindings = BindingNames::default();
        bindings.visit_formal_parameters(&arrow.params);
        bindings.statements(&arrow.body.statements);
        self.push_scope(bindings);
        oxc_ast_visit::walk::walk_arrow_function_expression(self, arrow);
        self.pop_scope();
    }

    fn visit_block_statement(&mut self, block: &BlockStatement<'a>) {
        let mut bindings = BindingNames::default();
        bindings.statements(&block.body);
        self.push_scope(bindings);
        oxc_ast_visit::walk::walk_block_statement(self, block);
        self.pop_scope();
    }

    fn visit_catch_clause(&mut self, clause: &CatchClause<'a>) {
        let mut bindings = BindingNames::default();
        if let Some(param) = &clause.param {
            bindings.visit_binding_pattern(&param.pattern);
        }
        self.push_scope(bindings);
        oxc_ast_visit::walk::walk_catch_clause(self, clause);
        self.pop_scope();
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        let mut bindings = BindingNames::default();
        if let Some(ForStatementInit::VariableDeclaration(decl)) = &stmt.init {
            bindings.variables(decl);
        }
        self.push_scope(bindings);
        oxc_ast_visit::walk::walk_for_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        let mut bindings = BindingNames::default();
        if let ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
            bindings.variables(decl);
        }
        self.push_scope(bindings);
        oxc_ast_visit::walk::walk_for_in_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        let mut bindings = BindingNames::default();
        if let ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
            bindings.variables(decl);
        }
        self.push_scope(bindings);
        oxc_ast_visit::walk::walk_for_of_statement(self, stmt);
        self.pop_scope();
    }

    fn visit_identifier_reference(&mut self, ident: &oxc_ast::ast::IdentifierReference<'a>) {
        if let Some(full) = self.target(&ident.name) {
            self.replacements
                .push((ident.span.start, ident.span.end, full.to_string()));
        }
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if prop.shorthand {
            if let Expression::Identifier(ident) = &prop.value {
                if let Some(full) = self.target(&ident.name) {
                    // `{ a }` becomes `{ a: Full.A }`
                    self.replacements.push((
                        ident.span.start,
                        ident.span.end,
                        format!("{}: {}", ident.name, full),
                    ));
                }
                return;
            }
        }
        oxc_ast_visit::walk::walk_object_property(self, prop);
    }

    fn visit_static_member_expression(&mut self, expr: &StaticMemberExpression<'a>) {
        // Already qualified: `Full.A` where `Full` is also an alias mapping to `Full.A`.
        if let Some(path) = member_path(expr) {
            let head = path.split('.').next().unwrap_or_default();
            if self.target(head) == Some(path.as_str()) {
                return;
            }
        }
        oxc_ast_visit::walk::walk_static_member_expression(self, expr);
    }

    fn visit_method_definition(&mut self, method: &MethodDefinition<'a>) {
        if self.skip_super && method.kind == MethodDefinitionKind::Constructor {
            if let Some(body) = &method.value.body {
                if let Some(Statement::ExpressionStatement(stmt)) = body.statements.first() {
                    if let Expression::CallExpression(call) = &stmt.expression {
                        if matches!(call.callee, Expression::Super(_)) {
                            let removal = self.removal_span(stmt.span);
                            self.removals.push(removal);
                        }
                    }
                }
            }
        }
        oxc_ast_visit::walk::walk_method_definition(self, method);
    }

    fn visit_import_declaration(&mut self, _decl: &ImportDeclaration<'a>) {}
}

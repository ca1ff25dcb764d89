//! Source front-end
//!
//! Parses one TypeScript file with oxc and lowers its top-level statements into
//! the closed [`Declaration`] variant the rest of the pipeline matches on. Every
//! node keeps the source text it came from so emission can reuse it verbatim.

use std::collections::HashSet;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    ArrowFunctionExpression, Class, ClassElement, Decorator, ExportDefaultDeclarationKind,
    Expression, FormalParameters, MethodDefinition, MethodDefinitionKind, ModuleExportName,
    PropertyDefinition, PropertyKey, Statement, TSAccessibility, TSInterfaceDeclaration,
};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{GetSpan, SourceType, Span};
use serde::Serialize;

use crate::error::{CompileErrorKind, CompilerError};
use crate::heritage::{dotted_name, HeritageExpr};
use crate::model::{Literal, MethodKind, Parameter, SourceLocation};
use crate::static_eval;

// ═══════════════════════════════════════════════════════════════════════════════
// DECLARATIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceUnit {
    pub file_path: String,
    pub source: String,
    pub quote_char: char,
    pub declarations: Vec<Declaration>,
    /// Top-level names bound by this file (classes, interfaces, functions, variables).
    pub declared_names: HashSet<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Declaration {
    Import(ImportDecl),
    InterfaceLike(InterfaceDecl),
    ClassLike(ClassDecl),
    Other(OtherDecl),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDecl {
    pub module_path: String,
    pub bindings: Vec<ImportBinding>,
    pub text: String,
}

impl ImportDecl {
    /// Module path without the `#Namespace` fragment.
    pub fn path(&self) -> &str {
        self.module_path
            .split_once('#')
            .map_or(self.module_path.as_str(), |(path, _)| path)
    }

    /// Markup imports become `<link rel="import">` tags instead of script imports.
    pub fn is_markup(&self) -> bool {
        let path = self.path();
        path.starts_with("link!") || path.ends_with(".html")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBinding {
    pub local: String,
    /// `None` for default and namespace imports.
    pub imported: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDecl {
    pub name: String,
    pub heritage: Vec<HeritageExpr>,
    pub text: String,
    pub doc: Option<String>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDecl {
    pub name: String,
    pub heritage: Option<HeritageExpr>,
    pub heritage_text: Option<String>,
    /// `export `, `export default ` or empty.
    pub export_prefix: String,
    pub decorators: Vec<DecoratorNode>,
    pub members: Vec<Member>,
    /// Class text, leading comments included.
    pub text: String,
    pub doc: Option<String>,
    /// Comments before the doc block (or before the class when there is none).
    pub leading_comments: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherDecl {
    pub name: Option<String>,
    pub text: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MEMBERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Member {
    Property(PropertyNode),
    Method(MethodNode),
    Other(OtherMember),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyNode {
    pub name: String,
    pub is_static: bool,
    pub is_private: bool,
    pub readonly: bool,
    pub type_annotation: Option<String>,
    pub initializer: Option<String>,
    pub decorators: Vec<DecoratorNode>,
    /// Member text without decorators.
    pub text: String,
    /// Comments before the member, with the indentation that follows them.
    pub leading_comments: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodNode {
    pub name: String,
    pub kind: MethodKind,
    pub is_static: bool,
    pub parameters: Vec<Parameter>,
    pub decorators: Vec<DecoratorNode>,
    /// Member text without decorators.
    pub text: String,
    pub leading_comments: String,
    /// Byte ranges into `text`.
    pub name_range: (usize, usize),
    pub body_range: Option<(usize, usize)>,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtherMember {
    /// Leading comments included.
    pub text: String,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECORATORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoratorNode {
    pub name: String,
    /// `None` for the bare form `@name`, `Some` for a call `@name(...)`.
    pub arguments: Option<Vec<DecoratorArgument>>,
    pub text: String,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoratorArgument {
    pub text: String,
    pub shape: ArgumentShape,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ArgumentShape {
    Identifier { name: String },
    /// Arrow function or function expression; `body` is always a block.
    Function {
        parameters: Vec<Parameter>,
        body: String,
    },
    Literal { value: Literal },
    Expression { free_identifiers: Vec<String> },
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY
// ═══════════════════════════════════════════════════════════════════════════════

pub fn source_type() -> SourceType {
    SourceType::default().with_typescript(true).with_module(true)
}

pub fn parse_unit(source: &str, file_path: &str) -> Result<SourceUnit, CompilerError> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, source_type()).parse();
    let lowerer = Lowerer::new(source);

    if let Some(error) = ret.errors.first() {
        return Err(CompilerError::new(
            CompileErrorKind::Syntax,
            format!("invalid syntax: {}", error),
            file_path,
        ));
    }

    let mut quote = QuoteFinder {
        source,
        first: None,
    };
    quote.visit_program(&ret.program);

    let mut declarations = Vec::new();
    let mut declared_names = HashSet::new();
    for stmt in &ret.program.body {
        let decl = lowerer.statement(stmt);
        match &decl {
            Declaration::ClassLike(class) => {
                declared_names.insert(class.name.clone());
            }
            Declaration::InterfaceLike(iface) => {
                declared_names.insert(iface.name.clone());
            }
            Declaration::Other(OtherDecl { name: Some(name), .. }) => {
                declared_names.insert(name.clone());
            }
            _ => {}
        }
        declarations.push(decl);
    }

    tracing::debug!(
        file = file_path,
        declarations = declarations.len(),
        "parsed source unit"
    );

    Ok(SourceUnit {
        file_path: file_path.to_string(),
        source: source.to_string(),
        quote_char: quote.first.unwrap_or('"'),
        declarations,
        declared_names,
    })
}

struct QuoteFinder<'s> {
    source: &'s str,
    first: Option<char>,
}

impl<'a, 's> Visit<'a> for QuoteFinder<'s> {
    fn visit_string_literal(&mut self, lit: &oxc_ast::ast::StringLiteral<'a>) {
        if self.first.is_none() {
            self.first = self
                .source
                .get(lit.span.start as usize..)
                .and_then(|rest| rest.chars().next())
                .filter(|c| *c == '"' || *c == '\'');
        }
    }
}

struct InterfaceHeritageCollector<'s> {
    source: &'s str,
    heritage: Vec<HeritageExpr>,
}

impl<'a, 's> Visit<'a> for InterfaceHeritageCollector<'s> {
    fn visit_ts_interface_heritage(&mut self, it: &oxc_ast::ast::TSInterfaceHeritage<'a>) {
        self.heritage
            .push(HeritageExpr::from_expression(&it.expression, self.source));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

struct Lowerer<'s> {
    source: &'s str,
    line_starts: Vec<usize>,
}

impl<'s> Lowerer<'s> {
    fn new(source: &'s str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Lowerer {
            source,
            line_starts,
        }
    }

    fn location(&self, offset: u32) -> SourceLocation {
        let offset = offset as usize;
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        SourceLocation {
            line: line as u32 + 1,
            column: (offset - self.line_starts[line]) as u32 + 1,
        }
    }

    fn text(&self, span: Span) -> &'s str {
        self.slice(span.start as usize, span.end as usize)
    }

    fn slice(&self, start: usize, end: usize) -> &'s str {
        self.source.get(start..end).unwrap_or_default()
    }

    /// Start of the comments directly above `start`: block comments and
    /// whole-line `//` comments, blank lines allowed between them.
    fn comment_start(&self, start: usize) -> usize {
        let mut start = start;
        loop {
            let trimmed = self.slice(0, start).trim_end();
            let line_begin = trimmed.rfind('\n').map_or(0, |i| i + 1);
            let line = trimmed[line_begin..].trim_start();
            let next = if trimmed.ends_with("*/") {
                trimmed.rfind("/*")
            } else if line.starts_with("//") {
                Some(trimmed.len() - line.len())
            } else {
                None
            };
            match next {
                Some(next) if next < start => start = next,
                _ => return start,
            }
        }
    }

    /// Comments above a member, up to the member's first decorator or keyword.
    fn member_comments(&self, span: Span, decorators: &[Decorator]) -> String {
        let first = decorators
            .first()
            .map_or(span.start, |d| d.span.start.min(span.start)) as usize;
        self.slice(self.comment_start(first), first).to_string()
    }

    /// `/** ... */` block ending right before `start`, if any.
    fn leading_doc(&self, start: usize) -> Option<String> {
        let before = self.source.get(..start)?.trim_end();
        if !before.ends_with("*/") {
            return None;
        }
        let open = before.rfind("/**")?;
        Some(before[open..].to_string())
    }

    fn statement(&self, stmt: &Statement) -> Declaration {
        match stmt {
            Statement::ImportDeclaration(import) => {
                let mut bindings = Vec::new();
                if let Some(specifiers) = &import.specifiers {
                    for spec in specifiers {
                        bindings.push(import_binding(spec));
                    }
                }
                let start = self.comment_start(import.span.start as usize);
                Declaration::Import(ImportDecl {
                    module_path: import.source.value.to_string(),
                    bindings,
                    text: self.slice(start, import.span.end as usize).to_string(),
                })
            }
            Statement::TSInterfaceDeclaration(iface) => {
                self.interface(iface, iface.span.start as usize)
            }
            Statement::ClassDeclaration(class) => {
                self.class(class, "", class.span.start as usize, class.span.end as usize)
            }
            Statement::ExportNamedDeclaration(export) => match &export.declaration {
                Some(oxc_ast::ast::Declaration::ClassDeclaration(class)) => self.class(
                    class,
                    "export ",
                    export.span.start as usize,
                    export.span.end as usize,
                ),
                Some(oxc_ast::ast::Declaration::TSInterfaceDeclaration(iface)) => {
                    self.interface(iface, export.span.start as usize)
                }
                Some(decl) => Declaration::Other(OtherDecl {
                    name: declaration_name(decl),
                    text: self.slice(
                        self.comment_start(export.span.start as usize),
                        export.span.end as usize,
                    )
                    .to_string(),
                }),
                None => self.other(stmt),
            },
            Statement::ExportDefaultDeclaration(export) => match &export.declaration {
                ExportDefaultDeclarationKind::ClassDeclaration(class) if class.id.is_some() => {
                    self.class(
                        class,
                        "export default ",
                        export.span.start as usize,
                        export.span.end as usize,
                    )
                }
                _ => self.other(stmt),
            },
            _ => self.other(stmt),
        }
    }

    fn other(&self, stmt: &Statement) -> Declaration {
        let name = match stmt {
            Statement::VariableDeclaration(_)
            | Statement::FunctionDeclaration(_)
            | Statement::TSEnumDeclaration(_)
            | Statement::TSModuleDeclaration(_)
            | Statement::TSTypeAliasDeclaration(_) => stmt.as_declaration().and_then(declaration_name),
            _ => None,
        };
        let span = stmt.span();
        Declaration::Other(OtherDecl {
            name,
            text: self
                .slice(self.comment_start(span.start as usize), span.end as usize)
                .to_string(),
        })
    }

    fn interface(&self, iface: &TSInterfaceDeclaration, start: usize) -> Declaration {
        let mut collector = InterfaceHeritageCollector {
            source: self.source,
            heritage: vec![],
        };
        collector.visit_ts_interface_declaration(iface);
        Declaration::InterfaceLike(InterfaceDecl {
            name: iface.id.name.to_string(),
            heritage: collector.heritage,
            text: self
                .slice(self.comment_start(start), iface.span.end as usize)
                .to_string(),
            doc: self.leading_doc(start),
            location: self.location(start as u32),
        })
    }

    fn class(&self, class: &Class, export_prefix: &str, stmt_start: usize, end: usize) -> Declaration {
        let name = class
            .id
            .as_ref()
            .map(|id| id.name.to_string())
            .unwrap_or_default();
        let start = class
            .decorators
            .first()
            .map(|d| (d.span.start as usize).min(stmt_start))
            .unwrap_or(stmt_start);

        let comments = self.comment_start(start);
        let doc = self.leading_doc(start);
        let doc_start = match &doc {
            Some(_) => self.slice(0, start).rfind("/**").unwrap_or(start),
            None => start,
        };

        let members = class
            .body
            .body
            .iter()
            .filter_map(|element| self.member(element))
            .collect();

        Declaration::ClassLike(ClassDecl {
            name,
            heritage: class
                .super_class
                .as_ref()
                .map(|expr| HeritageExpr::from_expression(expr, self.source)),
            heritage_text: class
                .super_class
                .as_ref()
                .map(|expr| self.text(expr.span()).to_string()),
            export_prefix: export_prefix.to_string(),
            decorators: class.decorators.iter().map(|d| self.decorator(d)).collect(),
            members,
            text: self.slice(comments, end).to_string(),
            doc,
            leading_comments: self.slice(comments, doc_start).to_string(),
            location: self.location(start as u32),
        })
    }

    /// Start of the member text after its decorators.
    fn member_start(&self, span: Span, decorators: &[Decorator]) -> usize {
        let after = decorators
            .last()
            .map(|d| d.span.end as usize)
            .unwrap_or(span.start as usize)
            .max(span.start as usize);
        let rest = self.slice(after, span.end as usize);
        after + (rest.len() - rest.trim_start().len())
    }

    fn member(&self, element: &ClassElement) -> Option<Member> {
        match element {
            ClassElement::PropertyDefinition(prop) => Some(Member::Property(self.property(prop))),
            ClassElement::MethodDefinition(method) => {
                // Overload signatures carry no body and produce no output.
                method.value.body.as_ref()?;
                Some(Member::Method(self.method(method)))
            }
            ClassElement::TSIndexSignature(_) => None,
            other => {
                let span = other.span();
                Some(Member::Other(OtherMember {
                    text: self
                        .slice(self.comment_start(span.start as usize), span.end as usize)
                        .to_string(),
                }))
            }
        }
    }

    fn property(&self, prop: &PropertyDefinition) -> PropertyNode {
        let start = self.member_start(prop.span, &prop.decorators);
        let (name, is_hash_private) = self.key_name(&prop.key);
        PropertyNode {
            name,
            is_static: prop.r#static,
            is_private: is_hash_private
                || matches!(prop.accessibility, Some(TSAccessibility::Private)),
            readonly: prop.readonly,
            type_annotation: prop
                .type_annotation
                .as_ref()
                .map(|ta| self.text(ta.type_annotation.span()).to_string()),
            initializer: prop.value.as_ref().map(|v| self.text(v.span()).to_string()),
            decorators: prop.decorators.iter().map(|d| self.decorator(d)).collect(),
            text: self.slice(start, prop.span.end as usize).to_string(),
            leading_comments: self.member_comments(prop.span, &prop.decorators),
            location: self.location(start as u32),
        }
    }

    fn method(&self, method: &MethodDefinition) -> MethodNode {
        let start = self.member_start(method.span, &method.decorators);
        let (name, _) = self.key_name(&method.key);
        let key_span = method.key.span();
        let relative = |span: Span| (span.start as usize - start, span.end as usize - start);
        MethodNode {
            name,
            kind: match method.kind {
                MethodDefinitionKind::Constructor => MethodKind::Constructor,
                MethodDefinitionKind::Method => MethodKind::Method,
                MethodDefinitionKind::Get => MethodKind::Getter,
                MethodDefinitionKind::Set => MethodKind::Setter,
            },
            is_static: method.r#static,
            parameters: self.parameters(&method.value.params),
            decorators: method.decorators.iter().map(|d| self.decorator(d)).collect(),
            text: self.slice(start, method.span.end as usize).to_string(),
            leading_comments: self.member_comments(method.span, &method.decorators),
            name_range: relative(key_span),
            body_range: method.value.body.as_ref().map(|body| relative(body.span)),
            location: self.location(start as u32),
        }
    }

    fn key_name(&self, key: &PropertyKey) -> (String, bool) {
        match key {
            PropertyKey::StaticIdentifier(id) => (id.name.to_string(), false),
            PropertyKey::PrivateIdentifier(id) => (format!("#{}", id.name), true),
            PropertyKey::StringLiteral(s) => (s.value.to_string(), false),
            other => (self.text(other.span()).to_string(), false),
        }
    }

    fn parameters(&self, params: &FormalParameters) -> Vec<Parameter> {
        let mut out: Vec<Parameter> = params
            .items
            .iter()
            .map(|p| parameter(self.text(p.span)))
            .collect();
        if let Some(rest) = &params.rest {
            out.push(parameter(self.text(rest.span())));
        }
        out
    }

    fn decorator(&self, decorator: &Decorator) -> DecoratorNode {
        let location = self.location(decorator.span.start);
        let text = self.text(decorator.span).to_string();
        match &decorator.expression {
            Expression::CallExpression(call) => DecoratorNode {
                name: dotted_name(&call.callee)
                    .unwrap_or_else(|| self.text(call.callee.span()).to_string()),
                arguments: Some(
                    call.arguments
                        .iter()
                        .map(|arg| match arg.as_expression() {
                            Some(expr) => self.argument(expr),
                            None => DecoratorArgument {
                                text: self.text(arg.span()).to_string(),
                                shape: ArgumentShape::Expression {
                                    free_identifiers: vec![],
                                },
                            },
                        })
                        .collect(),
                ),
                text,
                location,
            },
            other => DecoratorNode {
                name: dotted_name(other).unwrap_or_else(|| self.text(other.span()).to_string()),
                arguments: None,
                text,
                location,
            },
        }
    }

    fn argument(&self, expr: &Expression) -> DecoratorArgument {
        let text = self.text(expr.span()).to_string();
        let shape = match expr {
            Expression::Identifier(id) => ArgumentShape::Identifier {
                name: id.name.to_string(),
            },
            Expression::ArrowFunctionExpression(arrow) => ArgumentShape::Function {
                parameters: self.parameters(&arrow.params),
                body: self.arrow_body(arrow),
            },
            Expression::FunctionExpression(func) => ArgumentShape::Function {
                parameters: self.parameters(&func.params),
                body: func
                    .body
                    .as_ref()
                    .map(|b| self.text(b.span).to_string())
                    .unwrap_or_else(|| "{}".to_string()),
            },
            Expression::StringLiteral(s) => ArgumentShape::Literal {
                value: Literal::String(s.value.to_string()),
            },
            Expression::NumericLiteral(n) => ArgumentShape::Literal {
                value: Literal::Number(n.value),
            },
            Expression::BooleanLiteral(b) => ArgumentShape::Literal {
                value: Literal::Bool(b.value),
            },
            Expression::NullLiteral(_) => ArgumentShape::Literal {
                value: Literal::Null,
            },
            other => ArgumentShape::Expression {
                free_identifiers: static_eval::free_identifiers(other),
            },
        };
        DecoratorArgument { text, shape }
    }

    fn arrow_body(&self, arrow: &ArrowFunctionExpression) -> String {
        if arrow.expression {
            if let Some(Statement::ExpressionStatement(stmt)) = arrow.body.statements.first() {
                return format!(
                    "{{\n    return {};\n  }}",
                    self.text(stmt.expression.span())
                );
            }
        }
        self.text(arrow.body.span).to_string()
    }
}

fn import_binding(spec: &oxc_ast::ast::ImportDeclarationSpecifier) -> ImportBinding {
    use oxc_ast::ast::ImportDeclarationSpecifier as Spec;
    match spec {
        Spec::ImportSpecifier(s) => ImportBinding {
            local: s.local.name.to_string(),
            imported: Some(match &s.imported {
                ModuleExportName::IdentifierName(id) => id.name.to_string(),
                ModuleExportName::IdentifierReference(id) => id.name.to_string(),
                ModuleExportName::StringLiteral(lit) => lit.value.to_string(),
            }),
        },
        Spec::ImportDefaultSpecifier(s) => ImportBinding {
            local: s.local.name.to_string(),
            imported: None,
        },
        Spec::ImportNamespaceSpecifier(s) => ImportBinding {
            local: s.local.name.to_string(),
            imported: None,
        },
    }
}

fn declaration_name(decl: &oxc_ast::ast::Declaration) -> Option<String> {
    use oxc_ast::ast::Declaration as D;
    match decl {
        D::VariableDeclaration(var) => var.declarations.first().and_then(|d| {
            d.id.get_binding_identifier().map(|id| id.name.to_string())
        }),
        D::FunctionDeclaration(func) => func.id.as_ref().map(|id| id.name.to_string()),
        D::ClassDeclaration(class) => class.id.as_ref().map(|id| id.name.to_string()),
        D::TSInterfaceDeclaration(iface) => Some(iface.id.name.to_string()),
        D::TSEnumDeclaration(e) => Some(e.id.name.to_string()),
        D::TSTypeAliasDeclaration(t) => Some(t.id.name.to_string()),
        D::TSModuleDeclaration(m) => match &m.id {
            oxc_ast::ast::TSModuleDeclarationName::Identifier(id) => Some(id.name.to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// Parameter from its declaration text, e.g. `public readonly value: string = ''`.
pub fn parameter(text: &str) -> Parameter {
    let mut rest = text.trim();
    loop {
        let stripped = ["public ", "private ", "protected ", "readonly ", "..."]
            .iter()
            .find_map(|prefix| rest.strip_prefix(prefix));
        match stripped {
            Some(s) => rest = s.trim_start(),
            None => break,
        }
    }
    let name: String = if rest.starts_with(['{', '[']) {
        crate::infer::split_top_level(rest, &[':', '='])[0].trim().to_string()
    } else {
        rest.chars()
            .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
            .collect()
    };
    Parameter {
        name,
        text: text.trim().to_string(),
    }
}

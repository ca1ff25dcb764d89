//! Heritage flattening: `extends` clauses down to an ordered list of names.
//!
//! `Mixin(Other(Base), Extra)` flattens to `[Mixin, Other, Base, Extra]`,
//! with each name rewritten through the file's symbol table.

use oxc_ast::ast::{Expression, StaticMemberExpression};
use oxc_span::GetSpan;
use serde::Serialize;

use crate::symbols::SymbolTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum HeritageExpr {
    /// Identifier or dotted path.
    Name { name: String },
    Call {
        callee: String,
        arguments: Vec<HeritageExpr>,
    },
    /// Anything else, kept as source text.
    Opaque { text: String },
}

impl HeritageExpr {
    pub fn name(name: impl Into<String>) -> Self {
        HeritageExpr::Name { name: name.into() }
    }

    pub fn from_expression(expr: &Expression, source: &str) -> Self {
        if let Some(name) = dotted_name(expr) {
            return HeritageExpr::Name { name };
        }
        match expr {
            Expression::ParenthesizedExpression(paren) => {
                HeritageExpr::from_expression(&paren.expression, source)
            }
            Expression::CallExpression(call) => match dotted_name(&call.callee) {
                Some(callee) => HeritageExpr::Call {
                    callee,
                    arguments: call
                        .arguments
                        .iter()
                        .map(|arg| match arg.as_expression() {
                            Some(e) => HeritageExpr::from_expression(e, source),
                            None => HeritageExpr::Opaque {
                                text: span_text(source, arg.span()),
                            },
                        })
                        .collect(),
                },
                None => HeritageExpr::Opaque {
                    text: span_text(source, call.span),
                },
            },
            other => HeritageExpr::Opaque {
                text: span_text(source, other.span()),
            },
        }
    }
}

/// `Identifier` or a chain of static member accesses rooted at one.
pub fn dotted_name(expr: &Expression) -> Option<String> {
    match expr {
        Expression::Identifier(id) => Some(id.name.to_string()),
        Expression::StaticMemberExpression(member) => member_path(member),
        _ => None,
    }
}

/// `a.b.c` for a static member chain rooted at an identifier.
pub fn member_path(member: &StaticMemberExpression) -> Option<String> {
    let object = dotted_name(&member.object)?;
    Some(format!("{}.{}", object, member.property.name))
}

fn span_text(source: &str, span: oxc_span::Span) -> String {
    source
        .get(span.start as usize..span.end as usize)
        .unwrap_or_default()
        .to_string()
}

/// Depth-first, left-to-right flattening. Names are rewritten through
/// `symbols` at every level of the recursion.
pub fn flatten(expr: &HeritageExpr, symbols: Option<&SymbolTable>) -> Vec<String> {
    let mut out = Vec::new();
    flatten_into(expr, symbols, &mut out);
    out
}

fn flatten_into(expr: &HeritageExpr, symbols: Option<&SymbolTable>, out: &mut Vec<String>) {
    match expr {
        HeritageExpr::Name { name } => out.push(rewrite(name, symbols)),
        HeritageExpr::Call { callee, arguments } => {
            out.push(rewrite(callee, symbols));
            for arg in arguments {
                flatten_into(arg, symbols, out);
            }
        }
        HeritageExpr::Opaque { text } => out.push(text.clone()),
    }
}

fn rewrite(name: &str, symbols: Option<&SymbolTable>) -> String {
    match symbols {
        Some(table) => table.rewrite_name(name),
        None => name.to_string(),
    }
}

pub fn flatten_all(exprs: &[HeritageExpr], symbols: Option<&SymbolTable>) -> Vec<String> {
    exprs.iter().flat_map(|e| flatten(e, symbols)).collect()
}

pub fn inherits_from(flattened: &[String], name: &str) -> bool {
    flattened.iter().any(|n| n == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{ImportBinding, ImportDecl};
    use crate::symbols::Import;

    fn call(callee: &str, arguments: Vec<HeritageExpr>) -> HeritageExpr {
        HeritageExpr::Call {
            callee: callee.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_single_name() {
        assert_eq!(
            flatten(&HeritageExpr::name("Polymer.Element"), None),
            vec!["Polymer.Element"]
        );
    }

    #[test]
    fn test_nested_calls_depth_first() {
        let expr = call(
            "f",
            vec![call("g", vec![HeritageExpr::name("x")]), HeritageExpr::name("y")],
        );
        assert_eq!(flatten(&expr, None), vec!["f", "g", "x", "y"]);
    }

    #[test]
    fn test_rewrites_through_symbols_at_every_level() {
        let mut symbols = SymbolTable::new();
        let decl = ImportDecl {
            module_path: "bower:polymer/polymer.html#Polymer".to_string(),
            bindings: vec![],
            text: String::new(),
        };
        symbols.register(Import::from_binding(
            &decl,
            &ImportBinding {
                local: "El".to_string(),
                imported: Some("Element".to_string()),
            },
        ));
        let expr = call("Mixin", vec![HeritageExpr::name("El")]);
        let flat = flatten(&expr, Some(&symbols));
        assert_eq!(flat, vec!["Mixin", "Polymer.Element"]);
        assert!(inherits_from(&flat, "Polymer.Element"));
    }

    #[test]
    fn test_opaque_kept_verbatim() {
        let expr = HeritageExpr::Opaque {
            text: "cond ? A : B".to_string(),
        };
        assert_eq!(flatten(&expr, None), vec!["cond ? A : B"]);
    }
}

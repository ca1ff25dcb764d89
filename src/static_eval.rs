//! Compile-time expression evaluator.
//!
//! Decorator arguments are plain expressions over literals and a set of bound
//! identifiers. Evaluation happens on the parsed AST, so anything the parser
//! accepts but the evaluator does not model reports `Unsupported` instead of
//! guessing.

use std::collections::HashMap;

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BinaryOperator, Expression, LogicalOperator, ObjectPropertyKind, PropertyKey, UnaryOperator,
};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::GetSpan;
use thiserror::Error;

use crate::model::{format_number, Literal};
use crate::parse::source_type;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("invalid expression syntax: {0}")]
    Syntax(String),
    #[error("cannot evaluate `{0}` at compile time")]
    Unsupported(String),
    #[error("unbound identifier `{0}`")]
    UnboundIdentifier(String),
}

const GLOBAL_VALUES: &[&str] = &["undefined", "NaN", "Infinity"];

/// Parse and evaluate `source` with `bindings` in scope.
pub fn evaluate(source: &str, bindings: &HashMap<String, Literal>) -> Result<Literal, EvalError> {
    let allocator = Allocator::default();
    let expr = Parser::new(&allocator, source, source_type())
        .parse_expression()
        .map_err(|errors| {
            EvalError::Syntax(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;
    Evaluator { source, bindings }.eval(&expr)
}

/// Identifier references in `expr`, first-use order, without duplicates.
/// Property names in member accesses and object keys are not references.
pub fn free_identifiers(expr: &Expression) -> Vec<String> {
    let mut collector = FreeIdentifierCollector { names: vec![] };
    collector.visit_expression(expr);
    collector.names
}

struct FreeIdentifierCollector {
    names: Vec<String>,
}

impl<'a> Visit<'a> for FreeIdentifierCollector {
    fn visit_identifier_reference(&mut self, ident: &oxc_ast::ast::IdentifierReference<'a>) {
        let name = ident.name.as_str();
        if GLOBAL_VALUES.contains(&name) || self.names.iter().any(|n| n == name) {
            return;
        }
        self.names.push(name.to_string());
    }
}

struct Evaluator<'s> {
    source: &'s str,
    bindings: &'s HashMap<String, Literal>,
}

impl<'s> Evaluator<'s> {
    fn unsupported(&self, expr: &Expression) -> EvalError {
        let span = expr.span();
        EvalError::Unsupported(
            self.source
                .get(span.start as usize..span.end as usize)
                .unwrap_or_default()
                .to_string(),
        )
    }

    fn eval(&self, expr: &Expression) -> Result<Literal, EvalError> {
        match expr {
            Expression::NullLiteral(_) => Ok(Literal::Null),
            Expression::BooleanLiteral(b) => Ok(Literal::Bool(b.value)),
            Expression::NumericLiteral(n) => Ok(Literal::Number(n.value)),
            Expression::StringLiteral(s) => Ok(Literal::String(s.value.to_string())),
            Expression::TemplateLiteral(tpl) => {
                let mut out = String::new();
                for (i, quasi) in tpl.quasis.iter().enumerate() {
                    match &quasi.value.cooked {
                        Some(cooked) => out.push_str(cooked.as_str()),
                        None => out.push_str(quasi.value.raw.as_str()),
                    }
                    if let Some(e) = tpl.expressions.get(i) {
                        out.push_str(&self.eval(e)?.to_js_string());
                    }
                }
                Ok(Literal::String(out))
            }
            Expression::Identifier(id) => match id.name.as_str() {
                name if self.bindings.contains_key(name) => Ok(self.bindings[name].clone()),
                "undefined" => Ok(Literal::Undefined),
                "NaN" => Ok(Literal::Number(f64::NAN)),
                "Infinity" => Ok(Literal::Number(f64::INFINITY)),
                name => Err(EvalError::UnboundIdentifier(name.to_string())),
            },
            Expression::ParenthesizedExpression(p) => self.eval(&p.expression),
            Expression::TSAsExpression(t) => self.eval(&t.expression),
            Expression::TSSatisfiesExpression(t) => self.eval(&t.expression),
            Expression::TSNonNullExpression(t) => self.eval(&t.expression),
            Expression::UnaryExpression(u) => {
                let value = self.eval(&u.argument)?;
                match u.operator {
                    UnaryOperator::UnaryNegation => Ok(Literal::Number(-self.number(&value, expr)?)),
                    UnaryOperator::UnaryPlus => Ok(Literal::Number(self.number(&value, expr)?)),
                    UnaryOperator::LogicalNot => Ok(Literal::Bool(!truthy(&value))),
                    UnaryOperator::Void => Ok(Literal::Undefined),
                    UnaryOperator::Typeof => Ok(Literal::String(type_of(&value, expr, self)?)),
                    _ => Err(self.unsupported(expr)),
                }
            }
            Expression::BinaryExpression(b) => {
                let left = self.eval(&b.left)?;
                let right = self.eval(&b.right)?;
                self.binary(b.operator, &left, &right, expr)
            }
            Expression::LogicalExpression(l) => {
                let left = self.eval(&l.left)?;
                match l.operator {
                    LogicalOperator::And if !truthy(&left) => Ok(left),
                    LogicalOperator::Or if truthy(&left) => Ok(left),
                    LogicalOperator::Coalesce
                        if !matches!(left, Literal::Null | Literal::Undefined) =>
                    {
                        Ok(left)
                    }
                    _ => self.eval(&l.right),
                }
            }
            Expression::ConditionalExpression(c) => {
                if truthy(&self.eval(&c.test)?) {
                    self.eval(&c.consequent)
                } else {
                    self.eval(&c.alternate)
                }
            }
            Expression::ArrayExpression(arr) => {
                let mut items = Vec::with_capacity(arr.elements.len());
                for elem in &arr.elements {
                    match elem.as_expression() {
                        Some(e) => items.push(self.eval(e)?),
                        None => return Err(self.unsupported(expr)),
                    }
                }
                Ok(Literal::Array(items))
            }
            Expression::ObjectExpression(obj) => {
                let mut entries: Vec<(String, Literal)> = Vec::with_capacity(obj.properties.len());
                for prop in &obj.properties {
                    let ObjectPropertyKind::ObjectProperty(p) = prop else {
                        return Err(self.unsupported(expr));
                    };
                    if p.method {
                        return Err(self.unsupported(expr));
                    }
                    let key = if p.computed {
                        match p.key.as_expression() {
                            Some(k) => self.eval(k)?.to_js_string(),
                            None => return Err(self.unsupported(expr)),
                        }
                    } else {
                        match &p.key {
                            PropertyKey::StaticIdentifier(id) => id.name.to_string(),
                            PropertyKey::StringLiteral(s) => s.value.to_string(),
                            PropertyKey::NumericLiteral(n) => format_number(n.value),
                            _ => return Err(self.unsupported(expr)),
                        }
                    };
                    let value = self.eval(&p.value)?;
                    match entries.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = value,
                        None => entries.push((key, value)),
                    }
                }
                Ok(Literal::Object(entries))
            }
            Expression::StaticMemberExpression(m) => {
                let object = self.eval(&m.object)?;
                Ok(member(&object, m.property.name.as_str()))
            }
            Expression::ComputedMemberExpression(m) => {
                let object = self.eval(&m.object)?;
                let key = self.eval(&m.expression)?;
                match (&object, &key) {
                    (Literal::Array(items), Literal::Number(n)) => Ok(items
                        .get(*n as usize)
                        .filter(|_| n.fract() == 0.0 && *n >= 0.0)
                        .cloned()
                        .unwrap_or(Literal::Undefined)),
                    (Literal::Ident(_), _) => Err(self.unsupported(expr)),
                    _ => Ok(member(&object, &key.to_js_string())),
                }
            }
            _ => Err(self.unsupported(expr)),
        }
    }

    fn number(&self, value: &Literal, expr: &Expression) -> Result<f64, EvalError> {
        to_number(value).ok_or_else(|| self.unsupported(expr))
    }

    fn binary(
        &self,
        op: BinaryOperator,
        left: &Literal,
        right: &Literal,
        expr: &Expression,
    ) -> Result<Literal, EvalError> {
        let symbolic = matches!(left, Literal::Ident(_)) || matches!(right, Literal::Ident(_));
        if symbolic {
            return Err(self.unsupported(expr));
        }
        match op {
            BinaryOperator::Addition => {
                let stringy = |l: &Literal| {
                    matches!(l, Literal::String(_) | Literal::Array(_) | Literal::Object(_))
                };
                if stringy(left) || stringy(right) {
                    Ok(Literal::String(format!(
                        "{}{}",
                        left.to_js_string(),
                        right.to_js_string()
                    )))
                } else {
                    Ok(Literal::Number(
                        self.number(left, expr)? + self.number(right, expr)?,
                    ))
                }
            }
            BinaryOperator::Subtraction
            | BinaryOperator::Multiplication
            | BinaryOperator::Division
            | BinaryOperator::Remainder
            | BinaryOperator::Exponential => {
                let (l, r) = (self.number(left, expr)?, self.number(right, expr)?);
                Ok(Literal::Number(match op {
                    BinaryOperator::Subtraction => l - r,
                    BinaryOperator::Multiplication => l * r,
                    BinaryOperator::Division => l / r,
                    BinaryOperator::Remainder => l % r,
                    _ => l.powf(r),
                }))
            }
            BinaryOperator::StrictEquality => Ok(Literal::Bool(strict_equals(left, right))),
            BinaryOperator::StrictInequality => Ok(Literal::Bool(!strict_equals(left, right))),
            BinaryOperator::Equality => Ok(Literal::Bool(loose_equals(left, right))),
            BinaryOperator::Inequality => Ok(Literal::Bool(!loose_equals(left, right))),
            BinaryOperator::LessThan
            | BinaryOperator::LessEqualThan
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterEqualThan => {
                let ordering = match (left, right) {
                    (Literal::String(l), Literal::String(r)) => l.partial_cmp(r),
                    _ => self
                        .number(left, expr)?
                        .partial_cmp(&self.number(right, expr)?),
                };
                let result = match ordering {
                    None => false,
                    Some(ord) => match op {
                        BinaryOperator::LessThan => ord.is_lt(),
                        BinaryOperator::LessEqualThan => ord.is_le(),
                        BinaryOperator::GreaterThan => ord.is_gt(),
                        _ => ord.is_ge(),
                    },
                };
                Ok(Literal::Bool(result))
            }
            _ => Err(self.unsupported(expr)),
        }
    }
}

fn member(object: &Literal, key: &str) -> Literal {
    match object {
        Literal::Ident(path) => Literal::Ident(format!("{}.{}", path, key)),
        Literal::Object(_) => object.get(key).cloned().unwrap_or(Literal::Undefined),
        Literal::Array(items) if key == "length" => Literal::Number(items.len() as f64),
        Literal::String(s) if key == "length" => Literal::Number(s.encode_utf16().count() as f64),
        _ => Literal::Undefined,
    }
}

fn truthy(value: &Literal) -> bool {
    match value {
        Literal::Null | Literal::Undefined => false,
        Literal::Bool(b) => *b,
        Literal::Number(n) => *n != 0.0 && !n.is_nan(),
        Literal::String(s) => !s.is_empty(),
        Literal::Array(_) | Literal::Object(_) | Literal::Ident(_) => true,
    }
}

fn to_number(value: &Literal) -> Option<f64> {
    match value {
        Literal::Null => Some(0.0),
        Literal::Undefined => Some(f64::NAN),
        Literal::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Literal::Number(n) => Some(*n),
        Literal::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                Some(trimmed.parse::<f64>().unwrap_or(f64::NAN))
            }
        }
        Literal::Array(_) | Literal::Object(_) => Some(f64::NAN),
        Literal::Ident(_) => None,
    }
}

fn strict_equals(left: &Literal, right: &Literal) -> bool {
    match (left, right) {
        (Literal::Number(l), Literal::Number(r)) => l == r,
        (Literal::Array(_), _) | (Literal::Object(_), _) => false,
        _ => left == right,
    }
}

fn loose_equals(left: &Literal, right: &Literal) -> bool {
    match (left, right) {
        (Literal::Null | Literal::Undefined, Literal::Null | Literal::Undefined) => true,
        (Literal::Null | Literal::Undefined, _) | (_, Literal::Null | Literal::Undefined) => false,
        (Literal::String(l), Literal::String(r)) => l == r,
        _ if std::mem::discriminant(left) == std::mem::discriminant(right) => {
            strict_equals(left, right)
        }
        _ => match (to_number(left), to_number(right)) {
            (Some(l), Some(r)) => l == r,
            _ => false,
        },
    }
}

fn type_of(value: &Literal, expr: &Expression, evaluator: &Evaluator) -> Result<String, EvalError> {
    Ok(match value {
        Literal::Null | Literal::Array(_) | Literal::Object(_) => "object",
        Literal::Undefined => "undefined",
        Literal::Bool(_) => "boolean",
        Literal::Number(_) => "number",
        Literal::String(_) => "string",
        Literal::Ident(_) => return Err(evaluator.unsupported(expr)),
    }
    .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(source: &str) -> Result<Literal, EvalError> {
        evaluate(source, &HashMap::new())
    }

    #[test]
    fn test_primitives() {
        assert_eq!(eval("'abc'"), Ok(Literal::String("abc".into())));
        assert_eq!(eval("1 + 2 * 3"), Ok(Literal::Number(7.0)));
        assert_eq!(eval("!true"), Ok(Literal::Bool(false)));
        assert_eq!(eval("null ?? 'x'"), Ok(Literal::String("x".into())));
        assert_eq!(eval("void 0"), Ok(Literal::Undefined));
    }

    #[test]
    fn test_string_concat_and_template() {
        assert_eq!(eval("'a' + 1"), Ok(Literal::String("a1".into())));
        assert_eq!(eval("`x-${1 + 1}-y`"), Ok(Literal::String("x-2-y".into())));
    }

    #[test]
    fn test_object_and_member_access() {
        let lit = eval("({ name: 'x-el', 'the-key': [1, 2] })").unwrap();
        assert_eq!(lit.get("name"), Some(&Literal::String("x-el".into())));
        assert_eq!(eval("({ a: { b: 3 } }).a.b"), Ok(Literal::Number(3.0)));
        assert_eq!(eval("[4, 5][1]"), Ok(Literal::Number(5.0)));
        assert_eq!(eval("'abcd'.length"), Ok(Literal::Number(4.0)));
    }

    #[test]
    fn test_bound_identifiers_stay_symbolic() {
        let mut bindings = HashMap::new();
        bindings.insert("Enum".to_string(), Literal::Ident("Lib.Enum".to_string()));
        let lit = evaluate("{ kind: Enum.Value, n: 2 }", &bindings).unwrap();
        assert_eq!(lit.get("kind"), Some(&Literal::Ident("Lib.Enum.Value".into())));
        assert!(matches!(
            evaluate("Enum + 1", &bindings),
            Err(EvalError::Unsupported(_))
        ));
    }

    #[test]
    fn test_unbound_identifier() {
        assert_eq!(
            eval("missing"),
            Err(EvalError::UnboundIdentifier("missing".into()))
        );
    }

    #[test]
    fn test_type_assertions_are_transparent() {
        assert_eq!(eval("(3 as number)"), Ok(Literal::Number(3.0)));
    }

    #[test]
    fn test_functions_are_unsupported() {
        assert!(matches!(eval("() => 1"), Err(EvalError::Unsupported(_))));
    }

    #[test]
    fn test_free_identifiers_skip_property_names() {
        let allocator = Allocator::default();
        let source = "{ a: b.c, d, e: [f, b] }";
        let expr = Parser::new(&allocator, source, source_type())
            .parse_expression()
            .unwrap();
        assert_eq!(free_identifiers(&expr), vec!["b", "d", "f"]);
    }
}

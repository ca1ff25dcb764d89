//! Decorator resolution engine
//!
//! Turns raw decorator occurrences into [`ParsedDecorator`]s and applies their
//! handlers to one target in declaration order, accumulating the extras and
//! diagnostics the builder consumes.

use std::collections::{HashMap, HashSet};

use crate::annotations::{DecoratorExtras, HandlerContext, HandlerError, Registry, Target};
use crate::error::{CompileErrorKind, CompilerError};
use crate::model::{Literal, Method, OpaqueAnnotation, SourceLocation};
use crate::parse::{ArgumentShape, DecoratorArgument, DecoratorNode};
use crate::static_eval;
use crate::symbols::SymbolTable;

#[derive(Debug, Clone)]
pub enum ResolvedArgument {
    Literal(Literal),
    /// Bare identifier as written. `parameters` is set when it names a method
    /// of the class being built.
    SymbolReference {
        name: String,
        parameters: Option<Vec<String>>,
    },
    /// Function literal turned into a method of the component.
    SynthesizedMethod(Method),
    Evaluated(Literal),
}

impl ResolvedArgument {
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            ResolvedArgument::Literal(lit) | ResolvedArgument::Evaluated(lit) => Some(lit),
            _ => None,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            ResolvedArgument::Literal(lit) | ResolvedArgument::Evaluated(lit) => lit.to_js('"'),
            ResolvedArgument::SymbolReference { name, .. } => name.clone(),
            ResolvedArgument::SynthesizedMethod(method) => method.name.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ParsedDecorator {
    pub name: String,
    pub arguments: Vec<ResolvedArgument>,
    pub location: SourceLocation,
}

/// Everything one target's decorators produced.
#[derive(Debug, Default)]
pub struct Application {
    pub extras: DecoratorExtras,
    pub opaque: Vec<OpaqueAnnotation>,
    pub diagnostics: Vec<CompilerError>,
}

pub struct DecoratorEngine<'e> {
    registry: &'e Registry,
    symbols: &'e SymbolTable,
    declared_names: &'e HashSet<String>,
    quote_char: char,
    file_path: &'e str,
    /// Method name -> parameter names, for identifier arguments naming a method.
    class_methods: HashMap<String, Vec<String>>,
}

impl<'e> DecoratorEngine<'e> {
    pub fn new(
        registry: &'e Registry,
        symbols: &'e SymbolTable,
        declared_names: &'e HashSet<String>,
        quote_char: char,
        file_path: &'e str,
    ) -> Self {
        DecoratorEngine {
            registry,
            symbols,
            declared_names,
            quote_char,
            file_path,
            class_methods: HashMap::new(),
        }
    }

    pub fn with_class_methods(mut self, methods: HashMap<String, Vec<String>>) -> Self {
        self.class_methods = methods;
        self
    }

    fn malformed(&self, decorator: &DecoratorNode, member: &str, message: String) -> CompilerError {
        CompilerError::new(
            CompileErrorKind::MalformedDecoratorArguments,
            message,
            self.file_path,
        )
        .at(decorator.location)
        .with_context(decorator.text.clone())
        .with_hint(format!("while applying `@{}` to `{}`", decorator.name, member))
    }

    pub fn resolve(
        &self,
        decorator: &DecoratorNode,
        member: &str,
    ) -> Result<ParsedDecorator, CompilerError> {
        let arguments = decorator
            .arguments
            .iter()
            .flatten()
            .map(|arg| self.resolve_argument(arg, member))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|message| self.malformed(decorator, member, message))?;
        Ok(ParsedDecorator {
            name: decorator.name.clone(),
            arguments,
            location: decorator.location,
        })
    }

    fn resolve_argument(&self, arg: &DecoratorArgument, member: &str) -> Result<ResolvedArgument, String> {
        match &arg.shape {
            ArgumentShape::Literal { value } => Ok(ResolvedArgument::Literal(value.clone())),
            ArgumentShape::Identifier { name } => Ok(ResolvedArgument::SymbolReference {
                name: name.clone(),
                parameters: self.class_methods.get(name).cloned(),
            }),
            ArgumentShape::Function { parameters, body } => {
                Ok(ResolvedArgument::SynthesizedMethod(Method::synthesized(
                    format!("_{}Computed", member),
                    parameters.clone(),
                    body,
                )))
            }
            ArgumentShape::Expression { free_identifiers } => {
                let bindings = free_identifiers
                    .iter()
                    .map(|name| (name.clone(), Literal::Ident(self.symbols.rewrite_name(name))))
                    .collect::<HashMap<_, _>>();
                static_eval::evaluate(&arg.text, &bindings)
                    .map(ResolvedArgument::Evaluated)
                    .map_err(|e| e.to_string())
            }
        }
    }

    /// Apply `decorators` to `target` top to bottom. Fatal problems abort with
    /// an error; unknown names and unresolved behaviors become diagnostics.
    pub fn apply(
        &self,
        decorators: &[DecoratorNode],
        member: &str,
        mut target: Target,
    ) -> Result<Application, CompilerError> {
        let mut application = Application::default();
        for decorator in decorators {
            let Some(handler) = self.registry.get(&decorator.name) else {
                tracing::warn!(decorator = %decorator.name, member, "unknown annotation kept as metadata");
                application.opaque.push(OpaqueAnnotation {
                    name: decorator.name.clone(),
                    target: member.to_string(),
                    arguments: decorator
                        .arguments
                        .iter()
                        .flatten()
                        .map(|a| a.text.clone())
                        .collect(),
                });
                application.diagnostics.push(
                    CompilerError::new(
                        CompileErrorKind::UnknownAnnotation,
                        format!("unknown annotation `@{}` on `{}`", decorator.name, member),
                        self.file_path,
                    )
                    .at(decorator.location),
                );
                continue;
            };

            let parsed = self.resolve(decorator, member)?;
            let ctx = HandlerContext {
                decorator: &parsed.name,
                quote_char: self.quote_char,
                source_file: self.file_path,
                symbols: self.symbols,
                declared_names: self.declared_names,
            };
            tracing::debug!(decorator = %parsed.name, member, target = target.kind(), "applying decorator");
            match handler(&ctx, target.reborrow(), &parsed.arguments) {
                Ok(extras) => application.extras.extend(extras),
                Err(HandlerError::UnresolvedBehavior(name)) => {
                    tracing::warn!(behavior = %name, member, "unresolved behavior attaches nothing");
                    application.diagnostics.push(
                        CompilerError::new(
                            CompileErrorKind::AmbiguousHeritage,
                            format!("behavior `{}` of `{}` cannot be resolved", name, member),
                            self.file_path,
                        )
                        .at(decorator.location),
                    );
                }
                Err(err) => return Err(self.malformed(decorator, member, err.to_string())),
            }
        }
        Ok(application)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Component, Property};
    use crate::parse::{parse_unit, Declaration, Member};

    fn decorators_of(source: &str) -> Vec<Vec<DecoratorNode>> {
        let unit = parse_unit(source, "t.ts").unwrap();
        let Some(Declaration::ClassLike(class)) = unit.declarations.into_iter().next() else {
            panic!("expected class");
        };
        class
            .members
            .into_iter()
            .map(|m| match m {
                Member::Property(p) => p.decorators,
                Member::Method(m) => m.decorators,
                Member::Other(_) => vec![],
            })
            .collect()
    }

    #[test]
    fn test_function_argument_becomes_synthesized_method() {
        let decorators = decorators_of("class A { @compute((a: number, b) => a + b) total: number; }");
        let symbols = SymbolTable::new();
        let declared = HashSet::new();
        let engine = DecoratorEngine::new(Registry::builtin(), &symbols, &declared, '"', "t.ts");
        let parsed = engine.resolve(&decorators[0][0], "total").unwrap();
        let ResolvedArgument::SynthesizedMethod(method) = &parsed.arguments[0] else {
            panic!("expected synthesized method");
        };
        assert_eq!(method.name, "_totalComputed");
        assert_eq!(method.arguments_no_type, vec!["a", "b"]);
        assert!(method.text.starts_with("_totalComputed(a: number, b) {"));
    }

    #[test]
    fn test_identifier_naming_class_method_carries_parameters() {
        let decorators = decorators_of("class A { @compute(sum) total: number; }");
        let symbols = SymbolTable::new();
        let declared = HashSet::new();
        let mut methods = HashMap::new();
        methods.insert("sum".to_string(), vec!["x".to_string(), "y".to_string()]);
        let engine = DecoratorEngine::new(Registry::builtin(), &symbols, &declared, '"', "t.ts")
            .with_class_methods(methods);

        let mut prop = Property::new("total", "Number");
        let application = engine
            .apply(&decorators[0], "total", Target::Property(&mut prop))
            .unwrap();
        assert!(application.extras.methods.is_empty());
        assert_eq!(prop.computed.as_deref(), Some("\"sum(x, y)\""));
    }

    #[test]
    fn test_decorators_apply_in_order_and_unknown_is_opaque() {
        let decorators = decorators_of("class A { @attr @custom(1, 'x') @notify name: string; }");
        let symbols = SymbolTable::new();
        let declared = HashSet::new();
        let engine = DecoratorEngine::new(Registry::builtin(), &symbols, &declared, '"', "t.ts");
        let mut prop = Property::new("name", "String");
        let application = engine
            .apply(&decorators[0], "name", Target::Property(&mut prop))
            .unwrap();
        assert!(prop.reflect_to_attribute);
        assert!(prop.notify);
        assert_eq!(application.opaque.len(), 1);
        assert_eq!(application.opaque[0].arguments, vec!["1", "'x'"]);
        assert_eq!(application.diagnostics.len(), 1);
        assert!(!application.diagnostics[0].is_fatal());
    }

    #[test]
    fn test_expression_arguments_are_evaluated_with_free_identifiers() {
        let decorators =
            decorators_of("class A { @CustomElement({ name: 'my-' + 'el', mode: Modes.Fast }) x: string; }");
        let symbols = SymbolTable::new();
        let declared = HashSet::new();
        let engine = DecoratorEngine::new(Registry::builtin(), &symbols, &declared, '"', "t.ts");
        let mut component = Component::new("A");
        engine
            .apply(&decorators[0], "A", Target::Component(&mut component))
            .unwrap();
        assert_eq!(
            component.config_value("name"),
            Some(&Literal::String("my-el".into()))
        );
        assert_eq!(
            component.config_value("mode"),
            Some(&Literal::Ident("Modes.Fast".into()))
        );
    }

    #[test]
    fn test_malformed_arguments_are_fatal_with_member_hint() {
        let decorators = decorators_of("class A { @listen(42) onTap() {} }");
        let symbols = SymbolTable::new();
        let declared = HashSet::new();
        let engine = DecoratorEngine::new(Registry::builtin(), &symbols, &declared, '"', "t.ts");
        let mut method = Method::synthesized("onTap", vec![], "{}");
        let err = engine
            .apply(&decorators[0], "onTap", Target::Method(&mut method))
            .unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::MalformedDecoratorArguments);
        assert!(err.hints[0].contains("`@listen` to `onTap`"));
    }
}

//! Component model builder
//!
//! Walks one parsed unit, creates a [`Component`] for every class whose
//! flattened heritage reaches the configured base marker, and folds decorator
//! output into its tables.

use std::collections::HashMap;

use serde::Serialize;

use crate::annotations::{resolvable_behavior, DecoratorExtras, Registry, Target};
use crate::engine::DecoratorEngine;
use crate::error::{CompileErrorKind, CompilerError};
use crate::heritage;
use crate::infer;
use crate::model::{Component, Method, MethodKind, Property, PropertyValue, RegisteredEvent};
use crate::options::CompileOptions;
use crate::parse::{
    ClassDecl, Declaration, ImportDecl, InterfaceDecl, Member, MethodNode, PropertyNode,
    SourceUnit,
};
use crate::static_eval;
use crate::symbols::SymbolTable;

/// Top-level output slot, in source order.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum UnitItem {
    /// Index into [`UnitModel::components`].
    Component(usize),
    /// Declaration text emitted after reference rewriting.
    Passthrough(String),
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitModel {
    pub components: Vec<Component>,
    pub items: Vec<UnitItem>,
    pub imports: Vec<ImportDecl>,
    pub events: Vec<RegisteredEvent>,
    #[serde(skip)]
    pub diagnostics: Vec<CompilerError>,
}

enum Slot {
    Component(usize),
    Interface { name: String, text: String },
    Text(String),
}

struct UnitBuilder<'b> {
    unit: &'b SourceUnit,
    symbols: &'b SymbolTable,
    options: &'b CompileOptions,
    registry: &'b Registry,
    components: Vec<Component>,
    /// Component name -> index, for interface merging in either order.
    by_name: HashMap<String, usize>,
    /// Behaviors declared by interfaces seen before their class.
    pending: HashMap<String, Vec<String>>,
    slots: Vec<Slot>,
    imports: Vec<ImportDecl>,
    events: Vec<RegisteredEvent>,
    diagnostics: Vec<CompilerError>,
}

pub fn build_unit(
    unit: &SourceUnit,
    symbols: &SymbolTable,
    options: &CompileOptions,
    registry: &Registry,
) -> Result<UnitModel, CompilerError> {
    let mut builder = UnitBuilder {
        unit,
        symbols,
        options,
        registry,
        components: vec![],
        by_name: HashMap::new(),
        pending: HashMap::new(),
        slots: vec![],
        imports: vec![],
        events: vec![],
        diagnostics: vec![],
    };
    for decl in &unit.declarations {
        builder.declaration(decl)?;
    }
    Ok(builder.finish())
}

impl<'b> UnitBuilder<'b> {
    fn declaration(&mut self, decl: &Declaration) -> Result<(), CompilerError> {
        match decl {
            Declaration::Import(import) => {
                self.imports.push(import.clone());
                if !import.is_markup() {
                    self.slots.push(Slot::Text(import.text.clone()));
                }
            }
            Declaration::InterfaceLike(iface) => self.interface(iface),
            Declaration::ClassLike(class) => {
                let flattened = class
                    .heritage
                    .as_ref()
                    .map(|h| heritage::flatten(h, Some(self.symbols)))
                    .unwrap_or_default();
                if heritage::inherits_from(&flattened, &self.options.base_class) {
                    let component = self.component(class, flattened)?;
                    let index = self.components.len();
                    self.by_name.insert(component.name.clone(), index);
                    self.components.push(component);
                    self.slots.push(Slot::Component(index));
                } else {
                    self.slots.push(Slot::Text(class.text.clone()));
                }
            }
            Declaration::Other(other) => self.slots.push(Slot::Text(other.text.clone())),
        }
        Ok(())
    }

    fn interface(&mut self, iface: &InterfaceDecl) {
        let raw = heritage::flatten_all(&iface.heritage, None);
        self.slots.push(Slot::Interface {
            name: iface.name.clone(),
            text: iface.text.clone(),
        });

        let rewritten: Vec<String> = raw.iter().map(|n| self.symbols.rewrite_name(n)).collect();
        let is_event = self
            .options
            .event_base_types
            .iter()
            .any(|base| heritage::inherits_from(&rewritten, base) || heritage::inherits_from(&raw, base));
        if is_event {
            tracing::debug!(event = %iface.name, "registered custom event");
            self.events.push(RegisteredEvent {
                name: iface.name.clone(),
                doc: iface.doc.clone(),
            });
            return;
        }
        if raw.is_empty() {
            return;
        }
        let existing = self.by_name.get(&iface.name).copied();
        match existing {
            Some(index) => {
                let behaviors = self.resolve_behaviors(&iface.name, &raw);
                self.components[index].add_behaviors(behaviors);
            }
            None => self
                .pending
                .entry(iface.name.clone())
                .or_default()
                .extend(raw),
        }
    }

    /// Rewritten behavior names; unresolvable ones are reported and dropped.
    fn resolve_behaviors(&mut self, owner: &str, raw: &[String]) -> Vec<String> {
        let mut out = Vec::new();
        for name in raw {
            if resolvable_behavior(name, self.symbols, &self.unit.declared_names) {
                out.push(self.symbols.rewrite_name(name));
            } else {
                tracing::warn!(behavior = %name, component = owner, "unresolved behavior attaches nothing");
                self.diagnostics.push(CompilerError::new(
                    CompileErrorKind::AmbiguousHeritage,
                    format!("behavior `{}` of `{}` cannot be resolved", name, owner),
                    &self.unit.file_path,
                ));
            }
        }
        out
    }

    fn component(&mut self, class: &ClassDecl, flattened: Vec<String>) -> Result<Component, CompilerError> {
        tracing::debug!(component = %class.name, "building component");
        let mut component = Component::new(class.name.clone());
        component.heritage = class.heritage_text.clone();
        component.add_ancestors(flattened);
        component.export_prefix = class.export_prefix.clone();
        component.doc = class.doc.clone();
        component.leading_comments = class.leading_comments.clone();
        component.location = class.location;

        if let Some(raw) = self.pending.remove(&class.name) {
            let behaviors = self.resolve_behaviors(&class.name, &raw);
            component.add_behaviors(behaviors);
        }

        let class_methods = class
            .members
            .iter()
            .filter_map(|m| match m {
                Member::Method(m) => Some((
                    m.name.clone(),
                    m.parameters.iter().map(|p| p.name.clone()).collect(),
                )),
                _ => None,
            })
            .collect();
        let engine = DecoratorEngine::new(
            self.registry,
            self.symbols,
            &self.unit.declared_names,
            self.unit.quote_char,
            &self.unit.file_path,
        )
        .with_class_methods(class_methods);

        let mut extras = DecoratorExtras::default();

        let application = engine.apply(&class.decorators, &class.name, Target::Component(&mut component))?;
        extras.extend(application.extras);
        component.annotations.extend(application.opaque);
        self.diagnostics.extend(application.diagnostics);

        for member in &class.members {
            match member {
                Member::Property(node) if self.is_property(node) => {
                    let mut property = declared_property(node);
                    let application =
                        engine.apply(&node.decorators, &node.name, Target::Property(&mut property))?;
                    extras.extend(application.extras);
                    component.annotations.extend(application.opaque);
                    self.diagnostics.extend(application.diagnostics);
                    component.properties.insert(property);
                }
                Member::Property(node) => component
                    .extra_members
                    .push(format!("{}{}", node.leading_comments, node.text)),
                Member::Method(node) => {
                    let mut method = declared_method(node);
                    let application =
                        engine.apply(&node.decorators, &node.name, Target::Method(&mut method))?;
                    extras.extend(application.extras);
                    component.annotations.extend(application.opaque);
                    self.diagnostics.extend(application.diagnostics);
                    component.methods.push(method);
                }
                Member::Other(other) => component.extra_members.push(other.text.clone()),
            }
        }

        self.check_unique_methods(&component)?;
        self.merge_extras(&mut component, extras)?;
        normalize_observers(&mut component);
        Ok(component)
    }

    /// Declared methods after annotation renames. A getter and a setter may share a name.
    fn check_unique_methods(&self, component: &Component) -> Result<(), CompilerError> {
        for (index, method) in component.methods.iter().enumerate() {
            let earlier = component.methods[..index].iter().find(|other| {
                other.name == method.name
                    && other.is_static == method.is_static
                    && !is_accessor_pair(other.kind, method.kind)
            });
            if let Some(earlier) = earlier {
                return Err(CompilerError::new(
                    CompileErrorKind::NameCollision,
                    format!(
                        "method `{}` of `{}` is defined twice (lines {} and {})",
                        method.name, component.name, earlier.location.line, method.location.line
                    ),
                    &self.unit.file_path,
                )
                .at(method.location)
                .with_hint("an annotation may have renamed one of them; rename the other"));
            }
        }
        Ok(())
    }

    fn is_property(&self, node: &PropertyNode) -> bool {
        if node.is_static || node.is_private {
            return false;
        }
        !node.decorators.is_empty() || self.options.implicit_properties
    }

    fn merge_extras(&self, component: &mut Component, extras: DecoratorExtras) -> Result<(), CompilerError> {
        for method in extras.methods {
            if let Some(existing) = component.method(&method.name) {
                return Err(CompilerError::new(
                    CompileErrorKind::NameCollision,
                    format!(
                        "synthesized method `{}` collides with an existing method of `{}`",
                        method.name, component.name
                    ),
                    &self.unit.file_path,
                )
                .at(existing.location)
                .with_hint("rename the existing method or pass the resolver by name"));
            }
            component.methods.push(method);
        }
        for patch in &extras.properties {
            component.properties.merge(patch);
        }
        component.observers.extend(extras.observers);
        for hook in extras.hooks {
            component.hooks.push(hook);
        }
        Ok(())
    }

    fn finish(mut self) -> UnitModel {
        for component in &mut self.components {
            component.events = self.events.clone();
        }
        let by_name = self.by_name;
        let items = self
            .slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Component(index) => Some(UnitItem::Component(index)),
                Slot::Interface { name, .. } if by_name.contains_key(&name) => None,
                Slot::Interface { text, .. } | Slot::Text(text) => Some(UnitItem::Passthrough(text)),
            })
            .collect();
        UnitModel {
            components: self.components,
            items,
            imports: self.imports,
            events: self.events,
            diagnostics: self.diagnostics,
        }
    }
}

fn is_accessor_pair(a: MethodKind, b: MethodKind) -> bool {
    matches!(
        (a, b),
        (MethodKind::Getter, MethodKind::Setter) | (MethodKind::Setter, MethodKind::Getter)
    )
}

fn declared_property(node: &PropertyNode) -> Property {
    let type_name = match (&node.type_annotation, &node.initializer) {
        (Some(annotation), _) => infer::type_from_annotation(annotation),
        (None, Some(init)) => infer::type_from_initializer(init),
        (None, None) => "Object",
    };
    let mut property = Property::new(node.name.clone(), type_name);
    property.read_only = node.readonly;
    property.value = node.initializer.as_ref().map(|init| {
        match static_eval::evaluate(init, &HashMap::new()) {
            Ok(lit) if lit.is_primitive() => PropertyValue::Literal(lit),
            _ => PropertyValue::Initializer(init.clone()),
        }
    });
    property
}

fn declared_method(node: &MethodNode) -> Method {
    let mut method = Method::declared(
        node.name.clone(),
        node.kind,
        node.is_static,
        node.parameters.clone(),
        node.text.clone(),
        node.name_range,
        node.body_range,
        node.location,
    );
    method.leading_comments = node.leading_comments.clone();
    method
}

/// A property keeps at most one of `computed` and `observer`; a conflicting
/// observer moves to the observers list.
fn normalize_observers(component: &mut Component) {
    let mut moved = Vec::new();
    for property in component.properties.iter_mut() {
        if property.computed.is_some() {
            if let Some(observer) = property.observer.take() {
                let name = observer.trim_matches(|c| c == '"' || c == '\'');
                moved.push(format!("{}({})", name, property.name));
            }
        }
    }
    component.observers.extend(moved);
}

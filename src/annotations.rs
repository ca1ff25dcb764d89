//! Annotation registry
//!
//! Maps decorator names to handler functions. A handler mutates its target in
//! place and returns a [`DecoratorExtras`] delta that the builder folds into the
//! component once every member has been visited.

use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::engine::ResolvedArgument;
use crate::model::{
    Component, InsertionPlace, Link, Literal, Method, MethodHook, Property, PropertyPatch,
    PropertyValue, Style, Template,
};
use crate::symbols::SymbolTable;

lazy_static! {
    static ref SHARED_STYLE_MODULE: Regex = Regex::new(r"^[\w\d]+(-[\w\d]+)+$").unwrap();
    static ref BUILTIN: Registry = Registry::with_builtins();
}

/// Event names registered through the gesture system rather than `addEventListener`.
pub const GESTURE_EVENTS: &[&str] = &["down", "up", "track", "tap"];

pub const CONNECTED_CALLBACK: &str = "connectedCallback";
pub const DISCONNECTED_CALLBACK: &str = "disconnectedCallback";

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLER CONTRACT
// ═══════════════════════════════════════════════════════════════════════════════

pub enum Target<'t> {
    Property(&'t mut Property),
    Method(&'t mut Method),
    Component(&'t mut Component),
}

impl<'t> Target<'t> {
    pub fn reborrow(&mut self) -> Target<'_> {
        match self {
            Target::Property(p) => Target::Property(&mut **p),
            Target::Method(m) => Target::Method(&mut **m),
            Target::Component(c) => Target::Component(&mut **c),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Target::Property(_) => "property",
            Target::Method(_) => "method",
            Target::Component(_) => "class",
        }
    }
}

/// Declaration-site facts a handler may consult.
pub struct HandlerContext<'c> {
    pub decorator: &'c str,
    pub quote_char: char,
    pub source_file: &'c str,
    pub symbols: &'c SymbolTable,
    pub declared_names: &'c HashSet<String>,
}

impl<'c> HandlerContext<'c> {
    pub fn quoted(&self, text: &str) -> String {
        format!("{q}{}{q}", text, q = self.quote_char)
    }

    fn malformed(&self, reason: impl Into<String>) -> HandlerError {
        HandlerError::Malformed {
            decorator: self.decorator.to_string(),
            reason: reason.into(),
        }
    }

    fn wrong_target(&self, target: &Target) -> HandlerError {
        HandlerError::WrongTarget {
            decorator: self.decorator.to_string(),
            found: target.kind(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DecoratorExtras {
    pub methods: Vec<Method>,
    pub properties: Vec<PropertyPatch>,
    pub observers: Vec<String>,
    pub hooks: Vec<MethodHook>,
}

impl DecoratorExtras {
    pub fn extend(&mut self, other: DecoratorExtras) {
        self.methods.extend(other.methods);
        self.properties.extend(other.properties);
        self.observers.extend(other.observers);
        self.hooks.extend(other.hooks);
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
            && self.properties.is_empty()
            && self.observers.is_empty()
            && self.hooks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    #[error("`@{decorator}` cannot decorate a {found}")]
    WrongTarget {
        decorator: String,
        found: &'static str,
    },
    #[error("`@{decorator}`: {reason}")]
    Malformed { decorator: String, reason: String },
    /// Non-fatal: the named behavior attaches nothing.
    #[error("behavior `{0}` is neither imported nor declared in this file")]
    UnresolvedBehavior(String),
}

pub type Handler =
    fn(&HandlerContext, Target, &[ResolvedArgument]) -> Result<DecoratorExtras, HandlerError>;

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, Handler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut registry = Registry::new();
        registry.register("attr", attr);
        registry.register("notify", notify);
        registry.register("property", property);
        registry.register("observe", observe);
        registry.register("compute", compute);
        registry.register("computed", computed);
        registry.register("listen", listen);
        registry.register("style", style);
        registry.register("template", template);
        registry.register("behavior", behavior);
        registry.register("CustomElement", custom_element);
        registry
    }

    /// Shared registry holding the built-in handlers.
    pub fn builtin() -> &'static Registry {
        &BUILTIN
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Handler) {
        self.handlers.insert(name.into(), handler);
    }

    /// Looks up `name`, then its last dotted segment (`@decorators.attr`).
    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).copied().or_else(|| {
            name.rsplit_once('.')
                .and_then(|(_, last)| self.handlers.get(last).copied())
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ARGUMENT HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn string_arg<'a>(arg: Option<&'a ResolvedArgument>) -> Option<&'a str> {
    arg.and_then(ResolvedArgument::as_literal).and_then(Literal::as_str)
}

/// Dependency names from string arguments (`"a, b"`) or string arrays.
fn dependency_list(
    ctx: &HandlerContext,
    args: &[ResolvedArgument],
) -> Result<Vec<String>, HandlerError> {
    let mut deps = Vec::new();
    for arg in args {
        match arg.as_literal() {
            Some(Literal::String(s)) => push_split(&mut deps, s),
            Some(Literal::Array(items)) => {
                for item in items {
                    match item {
                        Literal::String(s) => push_split(&mut deps, s),
                        other => {
                            return Err(ctx.malformed(format!(
                                "dependency `{}` is not a string",
                                other.to_js(ctx.quote_char)
                            )))
                        }
                    }
                }
            }
            _ => {
                return Err(ctx.malformed(format!(
                    "cannot read a dependency list from `{}`",
                    arg.describe()
                )))
            }
        }
    }
    Ok(deps)
}

fn push_split(deps: &mut Vec<String>, s: &str) {
    deps.extend(
        s.split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string),
    );
}

/// First character upper case, the rest lower case: `computedProp` -> `Computedprop`.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// A behavior name is usable when it is imported, declared in the same file, or
/// already a namespaced path.
pub fn resolvable_behavior(name: &str, symbols: &SymbolTable, declared: &HashSet<String>) -> bool {
    let head = name.split('.').next().unwrap_or(name);
    name.contains('.') || symbols.contains(head) || declared.contains(head)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTY HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn attr(
    ctx: &HandlerContext,
    target: Target,
    _args: &[ResolvedArgument],
) -> Result<DecoratorExtras, HandlerError> {
    match target {
        Target::Property(prop) => {
            prop.reflect_to_attribute = true;
            Ok(DecoratorExtras::default())
        }
        other => Err(ctx.wrong_target(&other)),
    }
}

fn notify(
    ctx: &HandlerContext,
    target: Target,
    _args: &[ResolvedArgument],
) -> Result<DecoratorExtras, HandlerError> {
    match target {
        Target::Property(prop) => {
            prop.notify = true;
            Ok(DecoratorExtras::default())
        }
        other => Err(ctx.wrong_target(&other)),
    }
}

fn property(
    ctx: &HandlerContext,
    target: Target,
    args: &[ResolvedArgument],
) -> Result<DecoratorExtras, HandlerError> {
    let prop = match target {
        Target::Property(prop) => prop,
        other => return Err(ctx.wrong_target(&other)),
    };
    let entries = match args.first().and_then(ResolvedArgument::as_literal) {
        Some(Literal::Object(entries)) => entries,
        None if args.is_empty() => return Ok(DecoratorExtras::default()),
        _ => return Err(ctx.malformed("expects a configuration object")),
    };
    for (key, value) in entries {
        let flag = || {
            value
                .as_bool()
                .ok_or_else(|| ctx.malformed(format!("`{}` must be a boolean", key)))
        };
        match key.as_str() {
            "type" => match value {
                Literal::Ident(name) | Literal::String(name) => prop.type_name = name.clone(),
                _ => return Err(ctx.malformed("`type` must name a constructor")),
            },
            "value" => prop.value = Some(PropertyValue::Literal(value.clone())),
            "notify" => prop.notify = flag()?,
            "readOnly" => prop.read_only = flag()?,
            "reflectToAttribute" => prop.reflect_to_attribute = flag()?,
            "observer" | "computed" => {
                let text = match value {
                    Literal::String(s) => ctx.quoted(s),
                    other => other.to_js(ctx.quote_char),
                };
                if key == "observer" {
                    prop.observer = Some(text);
                } else {
                    prop.computed = Some(text);
                }
            }
            other => tracing::trace!(key = other, "ignoring unknown property option"),
        }
    }
    Ok(DecoratorExtras::default())
}

fn compute(
    ctx: &HandlerContext,
    target: Target,
    args: &[ResolvedArgument],
) -> Result<DecoratorExtras, HandlerError> {
    let prop = match target {
        Target::Property(prop) => prop,
        other => return Err(ctx.wrong_target(&other)),
    };
    let explicit = dependency_list(ctx, args.get(1..).unwrap_or(&[]))?;
    let mut extras = DecoratorExtras::default();

    let (name, defaults) = match args.first() {
        Some(ResolvedArgument::SynthesizedMethod(method)) => {
            extras.methods.push(method.clone());
            (method.name.clone(), method.arguments_no_type.clone())
        }
        Some(ResolvedArgument::SymbolReference { name, parameters }) => {
            (name.clone(), parameters.clone().unwrap_or_default())
        }
        Some(arg) => match arg.as_literal() {
            Some(Literal::String(name)) => (name.clone(), vec![]),
            _ => return Err(ctx.malformed("expects a resolver method or method name")),
        },
        None => return Err(ctx.malformed("expects a resolver method or method name")),
    };
    let deps = if explicit.is_empty() { defaults } else { explicit };
    prop.computed = Some(ctx.quoted(&format!("{}({})", name, deps.join(", "))));
    Ok(extras)
}

// ═══════════════════════════════════════════════════════════════════════════════
// METHOD HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn observe(
    ctx: &HandlerContext,
    target: Target,
    args: &[ResolvedArgument],
) -> Result<DecoratorExtras, HandlerError> {
    let method = match target {
        Target::Method(method) => method,
        other => return Err(ctx.wrong_target(&other)),
    };
    let mut deps = dependency_list(ctx, args)?;
    if deps.is_empty() {
        deps = method.arguments_no_type.clone();
    }
    if deps.is_empty() {
        return Err(ctx.malformed(format!(
            "`{}` has no parameters and no dependencies were given",
            method.name
        )));
    }

    let mut extras = DecoratorExtras::default();
    if deps.len() == 1 && !deps[0].contains('.') {
        let mut patch = PropertyPatch::named(deps[0].clone());
        patch.observer = Some(ctx.quoted(&method.name));
        extras.properties.push(patch);
    } else {
        extras
            .observers
            .push(format!("{}({})", method.name, deps.join(", ")));
    }
    Ok(extras)
}

/// Turns the method into the resolver of a computed property of the same name.
fn computed(
    ctx: &HandlerContext,
    target: Target,
    args: &[ResolvedArgument],
) -> Result<DecoratorExtras, HandlerError> {
    let method = match target {
        Target::Method(method) => method,
        other => return Err(ctx.wrong_target(&other)),
    };
    let mut deps = dependency_list(ctx, args)?;
    if deps.is_empty() {
        deps = method.arguments_no_type.clone();
    }
    let property_name = method.name.clone();
    let resolver = format!("_compute{}", capitalize(&property_name));
    method.rename(&resolver);

    let mut patch = PropertyPatch::named(property_name);
    patch.computed = Some(ctx.quoted(&format!("{}({})", resolver, deps.join(", "))));
    Ok(DecoratorExtras {
        properties: vec![patch],
        ..Default::default()
    })
}

fn listen(
    ctx: &HandlerContext,
    target: Target,
    args: &[ResolvedArgument],
) -> Result<DecoratorExtras, HandlerError> {
    let method = match target {
        Target::Method(method) => method,
        other => return Err(ctx.wrong_target(&other)),
    };
    let event = string_arg(args.first()).ok_or_else(|| ctx.malformed("expects an event name"))?;
    let once = match args.get(1) {
        None => false,
        Some(arg) => arg
            .as_literal()
            .and_then(Literal::as_bool)
            .ok_or_else(|| ctx.malformed("`once` must be a boolean"))?,
    };

    let name = &method.name;
    let gesture = GESTURE_EVENTS.contains(&event);
    let remove = if gesture {
        format!(
            "Polymer.Gestures.removeListener(this, \"{}\", this._{}Bound);",
            event, name
        )
    } else {
        format!("this.removeEventListener(\"{}\", this._{}Bound);", event, name)
    };
    let handler = if once {
        format!("(...args) => {{ this.{}(...args); {} }}", name, remove)
    } else {
        format!("this.{}.bind(this)", name)
    };
    let add = if gesture {
        format!(
            "Polymer.Gestures.addListener(this, \"{}\", this._{}Bound = {});",
            event, name, handler
        )
    } else {
        format!(
            "this.addEventListener(\"{}\", this._{}Bound = {});",
            event, name, handler
        )
    };

    let mut hooks = vec![MethodHook {
        lifecycle_callback: CONNECTED_CALLBACK.to_string(),
        place: InsertionPlace::Start,
        statement: add,
    }];
    if !once {
        hooks.push(MethodHook {
            lifecycle_callback: DISCONNECTED_CALLBACK.to_string(),
            place: InsertionPlace::Start,
            statement: remove,
        });
    }
    Ok(DecoratorExtras {
        hooks,
        ..Default::default()
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT HANDLERS
// ═══════════════════════════════════════════════════════════════════════════════

fn style_from_source(ctx: &HandlerContext, source: &str) -> Style {
    if source.ends_with(".css") {
        Style::Link(Link::new(source, ctx.source_file))
    } else if SHARED_STYLE_MODULE.is_match(source) {
        Style::SharedModule(source.to_string())
    } else {
        Style::Css(source.to_string())
    }
}

fn styles_from_literals<'l>(
    ctx: &HandlerContext,
    values: impl Iterator<Item = &'l Literal>,
) -> Result<Vec<Style>, HandlerError> {
    let mut styles = Vec::new();
    for value in values {
        match value {
            Literal::String(source) => styles.push(style_from_source(ctx, source)),
            Literal::Array(items) => styles.extend(styles_from_literals(ctx, items.iter())?),
            _ => return Err(ctx.malformed("style sources must be strings")),
        }
    }
    Ok(styles)
}

fn template_from_source(ctx: &HandlerContext, source: &str) -> Template {
    if source.ends_with(".html") {
        Template::Link(Link::new(source, ctx.source_file))
    } else {
        Template::Markup(source.to_string())
    }
}

/// Each application replaces the style list; sources within one call accumulate.
fn style(
    ctx: &HandlerContext,
    target: Target,
    args: &[ResolvedArgument],
) -> Result<DecoratorExtras, HandlerError> {
    let component = match target {
        Target::Component(component) => component,
        other => return Err(ctx.wrong_target(&other)),
    };
    let mut literals = Vec::with_capacity(args.len());
    for arg in args {
        literals.push(
            arg.as_literal()
                .ok_or_else(|| ctx.malformed("style sources must be strings"))?,
        );
    }
    component.styles = styles_from_literals(ctx, literals.into_iter())?;
    Ok(DecoratorExtras::default())
}

fn template(
    ctx: &HandlerContext,
    target: Target,
    args: &[ResolvedArgument],
) -> Result<DecoratorExtras, HandlerError> {
    let component = match target {
        Target::Component(component) => component,
        other => return Err(ctx.wrong_target(&other)),
    };
    let source = string_arg(args.first()).ok_or_else(|| ctx.malformed("expects a template string"))?;
    component.template = Some(template_from_source(ctx, source));
    Ok(DecoratorExtras::default())
}

fn behavior(
    ctx: &HandlerContext,
    target: Target,
    args: &[ResolvedArgument],
) -> Result<DecoratorExtras, HandlerError> {
    let component = match target {
        Target::Component(component) => component,
        other => return Err(ctx.wrong_target(&other)),
    };
    for arg in args {
        let name = match arg {
            ResolvedArgument::SymbolReference { name, .. } => name.clone(),
            other => match other.as_literal() {
                Some(Literal::Ident(path)) => path.clone(),
                _ => return Err(ctx.malformed("expects a behavior reference")),
            },
        };
        if !resolvable_behavior(&name, ctx.symbols, ctx.declared_names) {
            return Err(HandlerError::UnresolvedBehavior(name));
        }
        component.add_behaviors([ctx.symbols.rewrite_name(&name)]);
    }
    Ok(DecoratorExtras::default())
}

/// Shallow-merges a configuration object; `template` and `styles` are routed
/// through their own handlers.
fn custom_element(
    ctx: &HandlerContext,
    target: Target,
    args: &[ResolvedArgument],
) -> Result<DecoratorExtras, HandlerError> {
    let component = match target {
        Target::Component(component) => component,
        other => return Err(ctx.wrong_target(&other)),
    };
    let entries = match args.first().and_then(ResolvedArgument::as_literal) {
        Some(Literal::Object(entries)) => entries,
        Some(Literal::String(name)) => {
            component.merge_config(&[("name".to_string(), Literal::String(name.clone()))]);
            return Ok(DecoratorExtras::default());
        }
        None if args.is_empty() => return Ok(DecoratorExtras::default()),
        _ => return Err(ctx.malformed("expects a configuration object")),
    };
    let mut rest = Vec::new();
    for (key, value) in entries {
        match (key.as_str(), value) {
            ("template", Literal::String(source)) => {
                component.template = Some(template_from_source(ctx, source));
            }
            ("styles" | "style", value) => {
                component.styles = styles_from_literals(ctx, std::iter::once(value))?;
            }
            _ => rest.push((key.clone(), value.clone())),
        }
    }
    component.merge_config(&rest);
    Ok(DecoratorExtras::default())
}

//! Component emitter
//!
//! Renders one finalized [`Component`] as a class definition for the element
//! runtime: generated `is`/`properties`/`observers` accessors, declared members
//! rewritten through the symbol table, and lifecycle hooks spliced into (or
//! synthesized as) their callbacks. Style and template links are resolved here.

use serde::Serialize;

use crate::error::{CompileErrorKind, CompilerError};
use crate::links::LinkResolver;
use crate::model::{
    is_identifier_name, quote_js_string, Component, Link, Method, Property, PropertyValue,
    RegisteredEvent, Style, Template,
};
use crate::options::CompileOptions;
use crate::renamer::ReferenceRewriter;
use crate::symbols::SymbolTable;

/// Style entry after link resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "source", rename_all = "camelCase")]
pub enum ResolvedStyle {
    Css(String),
    /// Shared style module, rendered as `<style include="...">`.
    Include(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledComponent {
    pub name: String,
    pub element_name: String,
    pub code: String,
    pub template: Option<String>,
    pub styles: Vec<ResolvedStyle>,
    pub model: Component,
}

pub struct EmitContext<'e> {
    pub symbols: &'e SymbolTable,
    pub options: &'e CompileOptions,
    pub resolver: &'e dyn LinkResolver,
    pub quote_char: char,
    pub file_path: &'e str,
}

pub fn emit_component(
    component: &Component,
    ctx: &EmitContext,
) -> Result<CompiledComponent, CompilerError> {
    tracing::debug!(component = %component.name, "emitting component");
    let rewriter = ReferenceRewriter::new(ctx.symbols).skip_super(ctx.options.skip_super);
    let element_name = element_name(component);
    let q = ctx.quote_char;

    // 1. Heritage
    let base = component
        .heritage
        .as_deref()
        .map(|text| rewriter.rewrite_expression(text))
        .unwrap_or_else(|| ctx.options.base_class.clone());
    let heritage = if component.behaviors.is_empty() {
        base
    } else {
        format!(
            "Polymer.mixinBehaviors([{}], {})",
            component.behaviors.join(", "),
            base
        )
    };

    // 2. Generated accessors
    let mut members = vec![format!(
        "static get is() {{ return {}; }}",
        quote_js_string(&element_name, q)
    )];
    if !component.properties.is_empty() {
        let entries = component
            .properties
            .iter()
            .map(|p| format!("      {}: {}", property_key(&p.name, q), property_descriptor(p, &rewriter, q)))
            .collect::<Vec<_>>();
        members.push(format!(
            "static get properties() {{\n    return {{\n{}\n    }};\n  }}",
            entries.join(",\n")
        ));
    }
    if !component.observers.is_empty() {
        let entries = component
            .observers
            .iter()
            .map(|o| format!("      {}", quote_js_string(o, q)))
            .collect::<Vec<_>>();
        members.push(format!(
            "static get observers() {{\n    return [\n{}\n    ];\n  }}",
            entries.join(",\n")
        ));
    }

    // 3. Verbatim members
    for text in &component.extra_members {
        members.push(rewriter.rewrite_member(text));
    }

    // 4. Methods, with hooks spliced into existing callbacks
    for method in &component.methods {
        let text = method.text_with_hooks(component.hooks.get(&method.name));
        members.push(format!(
            "{}{}",
            method.leading_comments,
            rewriter.rewrite_member(&text)
        ));
    }

    // 5. Callbacks that only exist to carry hooks
    for group in component.hooks.groups() {
        if component.method(&group.callback).is_some() {
            continue;
        }
        tracing::trace!(callback = %group.callback, "synthesizing lifecycle callback");
        let callback = Method::synthesized(group.callback.clone(), vec![], "{}");
        members.push(rewriter.rewrite_member(&callback.text_with_hooks(&group.hooks)));
    }

    // 6. Assembly
    let mut code = component.leading_comments.clone();
    if let Some(doc) = doc_block(component.doc.as_deref(), &component.events) {
        code.push_str(&doc);
    }
    code.push_str(&format!(
        "{}class {} extends {} {{\n",
        component.export_prefix, component.name, heritage
    ));
    code.push_str(
        &members
            .iter()
            .map(|m| format!("  {}\n", m))
            .collect::<Vec<_>>()
            .join("\n"),
    );
    code.push_str("}\n");
    if ctx.options.define_elements {
        code.push_str(&format!(
            "\ncustomElements.define({name}.is, {name});\n",
            name = component.name
        ));
    }

    // 7. External text
    let template = match &component.template {
        None => None,
        Some(Template::Markup(markup)) => Some(markup.clone()),
        Some(Template::Link(link)) => Some(resolve_link(link, component, ctx)?),
    };
    let styles = component
        .styles
        .iter()
        .map(|style| match style {
            Style::Css(css) => Ok(ResolvedStyle::Css(css.clone())),
            Style::SharedModule(module) => Ok(ResolvedStyle::Include(module.clone())),
            Style::Link(link) => resolve_link(link, component, ctx).map(ResolvedStyle::Css),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CompiledComponent {
        name: component.name.clone(),
        element_name,
        code,
        template,
        styles,
        model: component.clone(),
    })
}

fn resolve_link(
    link: &Link,
    component: &Component,
    ctx: &EmitContext,
) -> Result<String, CompilerError> {
    link.resolve(ctx.resolver).map_err(|err| {
        CompilerError::new(
            CompileErrorKind::UnresolvableLink,
            format!("cannot resolve `{}` for `{}`: {}", link.uri, component.name, err),
            ctx.file_path,
        )
        .at(component.location)
        .with_context(link.uri.clone())
    })
}

/// Config `name` when given as a string, else the kebab-cased class name.
pub fn element_name(component: &Component) -> String {
    match component.config_value("name").and_then(|v| v.as_str()) {
        Some(name) => name.to_string(),
        None => kebab_case(&component.name),
    }
}

pub fn kebab_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.map_or(false, |n| n.is_lowercase()),
                _ => false,
            };
            if boundary {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else if c == '_' {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}

fn property_key(name: &str, q: char) -> String {
    if is_identifier_name(name) {
        name.to_string()
    } else {
        quote_js_string(name, q)
    }
}

/// Bare type token, or a descriptor holding only the fields that are set.
fn property_descriptor(property: &Property, rewriter: &ReferenceRewriter, q: char) -> String {
    if property.is_bare() {
        return property.type_name.clone();
    }
    let mut fields = vec![format!("type: {}", property.type_name)];
    match &property.value {
        Some(PropertyValue::Literal(lit)) if lit.is_primitive() => {
            fields.push(format!("value: {}", lit.to_js(q)));
        }
        Some(PropertyValue::Literal(lit)) => {
            fields.push(format!("value: function () {{ return {}; }}", lit.to_js(q)));
        }
        Some(PropertyValue::Initializer(text)) => fields.push(format!(
            "value: function () {{ return {}; }}",
            rewriter.rewrite_expression(text)
        )),
        None => {}
    }
    if let Some(computed) = &property.computed {
        fields.push(format!("computed: {}", computed));
    }
    if property.notify {
        fields.push("notify: true".to_string());
    }
    if let Some(observer) = &property.observer {
        fields.push(format!("observer: {}", observer));
    }
    if property.read_only {
        fields.push("readOnly: true".to_string());
    }
    if property.reflect_to_attribute {
        fields.push("reflectToAttribute: true".to_string());
    }
    format!(
        "{{\n{}\n      }}",
        fields
            .iter()
            .map(|f| format!("        {}", f))
            .collect::<Vec<_>>()
            .join(",\n")
    )
}

/// Class doc comment with one `@event` line per registered event.
fn doc_block(doc: Option<&str>, events: &[RegisteredEvent]) -> Option<String> {
    let mut lines: Vec<String> = doc.map(doc_lines).unwrap_or_default();
    if !events.is_empty() {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.extend(events.iter().map(|e| format!("@event {}", e.name)));
    }
    if lines.is_empty() {
        return None;
    }
    let body = lines
        .iter()
        .map(|l| if l.is_empty() { " *".to_string() } else { format!(" * {}", l) })
        .collect::<Vec<_>>()
        .join("\n");
    Some(format!("/**\n{}\n */\n", body))
}

fn doc_lines(doc: &str) -> Vec<String> {
    let inner = doc
        .trim()
        .trim_start_matches("/**")
        .trim_end_matches("*/");
    let mut lines: Vec<String> = inner
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line.strip_prefix('*').unwrap_or(line);
            line.strip_prefix(' ').unwrap_or(line).trim_end().to_string()
        })
        .collect();
    while lines.first().map_or(false, |l| l.is_empty()) {
        lines.remove(0);
    }
    while lines.last().map_or(false, |l| l.is_empty()) {
        lines.pop();
    }
    lines
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::links::MemoryLinkResolver;
    use crate::model::{InsertionPlace, Literal, MethodHook};

    fn emit(component: &Component, options: &CompileOptions) -> Result<CompiledComponent, CompilerError> {
        let symbols = SymbolTable::new();
        let resolver = MemoryLinkResolver::new().with("style.css", ":host { display: block; }");
        let ctx = EmitContext {
            symbols: &symbols,
            options,
            resolver: &resolver,
            quote_char: '"',
            file_path: "src/x.ts",
        };
        emit_component(component, &ctx)
    }

    #[test]
    fn test_kebab_case() {
        assert_eq!(kebab_case("MyElement"), "my-element");
        assert_eq!(kebab_case("XMLViewer"), "xml-viewer");
        assert_eq!(kebab_case("Element2Go"), "element2-go");
    }

    #[test]
    fn test_bare_component_has_no_property_accessors() {
        let mut component = Component::new("PlainElement");
        component.heritage = Some("Polymer.Element".to_string());
        let compiled = emit(&component, &CompileOptions::default()).unwrap();
        assert!(compiled
            .code
            .starts_with("class PlainElement extends Polymer.Element {\n  static get is() { return \"plain-element\"; }\n}"));
        assert!(!compiled.code.contains("properties"));
        assert!(!compiled.code.contains("observers"));
        assert!(compiled.code.ends_with("customElements.define(PlainElement.is, PlainElement);\n"));
    }

    #[test]
    fn test_property_descriptors() {
        let mut component = Component::new("XEl");
        component.heritage = Some("Polymer.Element".to_string());
        component.properties.insert(Property::new("plain", "String"));
        let mut flagged = Property::new("count", "Number");
        flagged.value = Some(PropertyValue::Literal(Literal::Number(3.0)));
        flagged.notify = true;
        component.properties.insert(flagged);
        let mut list = Property::new("items", "Array");
        list.value = Some(PropertyValue::Initializer("[1, 2]".to_string()));
        component.properties.insert(list);

        let compiled = emit(&component, &CompileOptions::default()).unwrap();
        assert!(compiled.code.contains("      plain: String,\n"));
        assert!(compiled
            .code
            .contains("      count: {\n        type: Number,\n        value: 3,\n        notify: true\n      },\n"));
        assert!(compiled
            .code
            .contains("value: function () { return [1, 2]; }"));
    }

    #[test]
    fn test_behaviors_wrap_heritage() {
        let mut component = Component::new("XEl");
        component.heritage = Some("Polymer.Element".to_string());
        component.add_behaviors(vec!["Polymer.IronA11yKeysBehavior".to_string()]);
        let compiled = emit(&component, &CompileOptions::default()).unwrap();
        assert!(compiled.code.contains(
            "class XEl extends Polymer.mixinBehaviors([Polymer.IronA11yKeysBehavior], Polymer.Element) {"
        ));
    }

    #[test]
    fn test_hooks_synthesize_missing_callback() {
        let mut component = Component::new("XEl");
        component.heritage = Some("Polymer.Element".to_string());
        component.hooks.push(MethodHook {
            lifecycle_callback: "connectedCallback".to_string(),
            place: InsertionPlace::Start,
            statement: "this.addEventListener(\"click\", this._onClickBound = this.onClick.bind(this));".to_string(),
        });
        let compiled = emit(&component, &CompileOptions::default()).unwrap();
        assert!(compiled.code.contains(
            "  connectedCallback() {\n    this.addEventListener(\"click\", this._onClickBound = this.onClick.bind(this));\n  }\n"
        ));
    }

    #[test]
    fn test_events_and_config_name() {
        let mut component = Component::new("XEl");
        component.heritage = Some("Polymer.Element".to_string());
        component.doc = Some("/**\n * A test element.\n */".to_string());
        component.events.push(RegisteredEvent {
            name: "ChangedEvent".to_string(),
            doc: None,
        });
        component.merge_config(&[("name".to_string(), Literal::String("custom-name".to_string()))]);
        let compiled = emit(&component, &CompileOptions::default()).unwrap();
        assert_eq!(compiled.element_name, "custom-name");
        assert!(compiled
            .code
            .starts_with("/**\n * A test element.\n *\n * @event ChangedEvent\n */\nclass XEl"));
    }

    #[test]
    fn test_links_resolve_or_fail() {
        let mut component = Component::new("XEl");
        component.heritage = Some("Polymer.Element".to_string());
        component.styles = vec![
            Style::Link(Link::new("style.css", "src/x.ts")),
            Style::SharedModule("shared-styles".to_string()),
        ];
        let compiled = emit(&component, &CompileOptions::default()).unwrap();
        assert_eq!(
            compiled.styles,
            vec![
                ResolvedStyle::Css(":host { display: block; }".to_string()),
                ResolvedStyle::Include("shared-styles".to_string()),
            ]
        );

        component.template = Some(Template::Link(Link::new("missing.html", "src/x.ts")));
        let err = emit(&component, &CompileOptions::default()).unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::UnresolvableLink);
        assert_eq!(err.context.as_deref(), Some("missing.html"));
    }
}

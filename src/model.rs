//! Component model: the normalized tables every later stage reads from.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::links::{LinkError, LinkResolver};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

// ═══════════════════════════════════════════════════════════════════════════════
// LITERALS
// ═══════════════════════════════════════════════════════════════════════════════

/// Compile-time value produced by the constant evaluator.
///
/// `Ident` is a symbolic reference (a free identifier or a dotted path rooted at
/// one); it renders back as raw source text.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Literal>),
    Object(Vec<(String, Literal)>),
    Ident(String),
}

impl Literal {
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Literal::Null | Literal::Bool(_) | Literal::Number(_) | Literal::String(_)
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Literal> {
        match self {
            Literal::Object(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// JavaScript string conversion, as used by `+` and template interpolation.
    pub fn to_js_string(&self) -> String {
        match self {
            Literal::Null => "null".to_string(),
            Literal::Undefined => "undefined".to_string(),
            Literal::Bool(b) => b.to_string(),
            Literal::Number(n) => format_number(*n),
            Literal::String(s) => s.clone(),
            Literal::Array(items) => items
                .iter()
                .map(|item| match item {
                    Literal::Null | Literal::Undefined => String::new(),
                    other => other.to_js_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Literal::Object(_) => "[object Object]".to_string(),
            Literal::Ident(path) => path.clone(),
        }
    }

    /// Source text for this value, with strings quoted by `quote`.
    pub fn to_js(&self, quote: char) -> String {
        match self {
            Literal::String(s) => quote_js_string(s, quote),
            Literal::Array(items) => format!(
                "[{}]",
                items
                    .iter()
                    .map(|item| item.to_js(quote))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Literal::Object(entries) if entries.is_empty() => "{}".to_string(),
            Literal::Object(entries) => format!(
                "{{ {} }}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", object_key(k, quote), v.to_js(quote)))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            other => other.to_js_string(),
        }
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Literal::Null | Literal::Undefined => serializer.serialize_none(),
            Literal::Bool(b) => serializer.serialize_bool(*b),
            Literal::Number(n) => serializer.serialize_f64(*n),
            Literal::String(s) | Literal::Ident(s) => serializer.serialize_str(s),
            Literal::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Literal::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

pub fn quote_js_string(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

pub fn is_identifier_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn object_key(key: &str, quote: char) -> String {
    if is_identifier_name(key) {
        key.to_string()
    } else {
        quote_js_string(key, quote)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTERNAL TEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Reference to externally stored text, read lazily through a [`LinkResolver`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub uri: String,
    pub source_file: String,
}

impl Link {
    pub fn new(uri: impl Into<String>, source_file: impl Into<String>) -> Self {
        Link {
            uri: uri.into(),
            source_file: source_file.into(),
        }
    }

    pub fn resolve(&self, resolver: &dyn LinkResolver) -> Result<String, LinkError> {
        resolver.resolve(&self.uri, &self.source_file)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "source", rename_all = "camelCase")]
pub enum Style {
    Css(String),
    SharedModule(String),
    Link(Link),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "source", rename_all = "camelCase")]
pub enum Template {
    Markup(String),
    Link(Link),
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPERTIES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum PropertyValue {
    Literal(Literal),
    /// Initializer source text, emitted wrapped in a factory function.
    Initializer(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: Option<PropertyValue>,
    pub computed: Option<String>,
    pub notify: bool,
    pub observer: Option<String>,
    pub read_only: bool,
    pub reflect_to_attribute: bool,
}

impl Property {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Property {
            name: name.into(),
            type_name: type_name.into(),
            value: None,
            computed: None,
            notify: false,
            observer: None,
            read_only: false,
            reflect_to_attribute: false,
        }
    }

    /// True when nothing beyond `type` is set, so the record serializes as a bare token.
    pub fn is_bare(&self) -> bool {
        self.value.is_none()
            && self.computed.is_none()
            && !self.notify
            && self.observer.is_none()
            && !self.read_only
            && !self.reflect_to_attribute
    }

    /// Field-wise merge: only the fields a patch sets are overwritten.
    pub fn apply(&mut self, patch: &PropertyPatch) {
        if let Some(type_name) = &patch.type_name {
            self.type_name = type_name.clone();
        }
        if let Some(value) = &patch.value {
            self.value = Some(value.clone());
        }
        if let Some(computed) = &patch.computed {
            self.computed = Some(computed.clone());
        }
        if let Some(notify) = patch.notify {
            self.notify = notify;
        }
        if let Some(observer) = &patch.observer {
            self.observer = Some(observer.clone());
        }
        if let Some(read_only) = patch.read_only {
            self.read_only = read_only;
        }
        if let Some(reflect) = patch.reflect_to_attribute {
            self.reflect_to_attribute = reflect;
        }
    }
}

/// Partial property record returned by decorator handlers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyPatch {
    pub name: String,
    pub type_name: Option<String>,
    pub value: Option<PropertyValue>,
    pub computed: Option<String>,
    pub notify: Option<bool>,
    pub observer: Option<String>,
    pub read_only: Option<bool>,
    pub reflect_to_attribute: Option<bool>,
}

impl PropertyPatch {
    pub fn named(name: impl Into<String>) -> Self {
        PropertyPatch {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Insertion-ordered property mapping keyed by name.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PropertyTable {
    entries: Vec<Property>,
}

impl PropertyTable {
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.entries.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.entries.iter_mut().find(|p| p.name == name)
    }

    pub fn insert(&mut self, property: Property) {
        match self.get_mut(&property.name) {
            Some(existing) => *existing = property,
            None => self.entries.push(property),
        }
    }

    /// Merge a patch into the named property, creating it (typed `Object`) if absent.
    pub fn merge(&mut self, patch: &PropertyPatch) {
        if let Some(existing) = self.get_mut(&patch.name) {
            existing.apply(patch);
            return;
        }
        let mut property = Property::new(patch.name.clone(), "Object");
        property.apply(patch);
        self.entries.push(property);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Property> {
        self.entries.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// METHODS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MethodKind {
    Constructor,
    Method,
    Getter,
    Setter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    /// Declaration text including any type annotation or default.
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Method {
    pub name: String,
    pub kind: MethodKind,
    pub is_static: bool,
    pub parameters: Vec<Parameter>,
    pub arguments_no_type: Vec<String>,
    pub body: String,
    /// Full member text (modifiers, signature, body) without decorators.
    pub text: String,
    /// Comments written above the member, emitted verbatim before it.
    pub leading_comments: String,
    pub synthesized: bool,
    pub location: SourceLocation,
    #[serde(skip)]
    name_range: (usize, usize),
    #[serde(skip)]
    body_range: Option<(usize, usize)>,
}

impl Method {
    /// `name_range` and `body_range` are byte ranges into `text`; `body_range`
    /// spans the braces of the body block.
    pub fn declared(
        name: impl Into<String>,
        kind: MethodKind,
        is_static: bool,
        parameters: Vec<Parameter>,
        text: impl Into<String>,
        name_range: (usize, usize),
        body_range: Option<(usize, usize)>,
        location: SourceLocation,
    ) -> Self {
        let text = text.into();
        let body_range = body_range.filter(|&(open, close)| {
            close > open
                && text.as_bytes().get(open) == Some(&b'{')
                && text.as_bytes().get(close - 1) == Some(&b'}')
        });
        let body = body_range
            .map(|(open, close)| text[open..close].to_string())
            .unwrap_or_default();
        Method {
            name: name.into(),
            kind,
            is_static,
            arguments_no_type: parameters.iter().map(|p| p.name.clone()).collect(),
            parameters,
            body,
            text,
            leading_comments: String::new(),
            synthesized: false,
            location,
            name_range,
            body_range,
        }
    }

    /// Build a plain method from a parameter list and a block body.
    pub fn synthesized(name: impl Into<String>, parameters: Vec<Parameter>, body: &str) -> Self {
        let name = name.into();
        let head = format!(
            "{}({}) ",
            name,
            parameters
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        let text = format!("{}{}", head, body);
        let body_range = Some((head.len(), text.len()));
        let mut method = Method::declared(
            name.clone(),
            MethodKind::Method,
            false,
            parameters,
            text,
            (0, name.len()),
            body_range,
            SourceLocation::default(),
        );
        method.synthesized = true;
        method
    }

    pub fn rename(&mut self, new_name: &str) {
        let (start, end) = self.name_range;
        if self.text.get(start..end) == Some(self.name.as_str()) {
            self.text.replace_range(start..end, new_name);
            let delta = new_name.len() as isize - (end - start) as isize;
            self.name_range = (start, start + new_name.len());
            if let Some((open, close)) = self.body_range {
                if open >= end {
                    self.body_range = Some((
                        (open as isize + delta) as usize,
                        (close as isize + delta) as usize,
                    ));
                }
            }
        }
        self.name = new_name.to_string();
    }

    /// Member text with hook statements spliced at the start or end of the body.
    pub fn text_with_hooks(&self, hooks: &[MethodHook]) -> String {
        let (open, close) = match self.body_range {
            Some(range) if !hooks.is_empty() => range,
            _ => return self.text.clone(),
        };
        let close_brace = close - 1;
        let inner = &self.text[open + 1..close_brace];
        let indent = body_indent(inner).unwrap_or_else(|| "    ".to_string());

        let starts: String = hooks
            .iter()
            .filter(|h| h.place == InsertionPlace::Start)
            .map(|h| format!("\n{}{}", indent, h.statement))
            .collect();
        let ends: String = hooks
            .iter()
            .filter(|h| h.place == InsertionPlace::End)
            .map(|h| format!("\n{}{}", indent, h.statement))
            .collect();

        let end_at = open + 1 + inner.trim_end().len();
        let mut out = String::with_capacity(self.text.len() + starts.len() + ends.len() + 8);
        out.push_str(&self.text[..open + 1]);
        out.push_str(&starts);
        out.push_str(&self.text[open + 1..end_at]);
        out.push_str(&ends);
        if inner.trim().is_empty() {
            out.push('\n');
            out.push_str(&indent[..indent.len().saturating_sub(2)]);
            out.push_str(&self.text[close_brace..]);
        } else {
            out.push_str(&self.text[end_at..]);
        }
        out
    }
}

fn body_indent(inner: &str) -> Option<String> {
    inner
        .lines()
        .skip(1)
        .find(|line| !line.trim().is_empty())
        .map(|line| line[..line.len() - line.trim_start().len()].to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOOKS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum InsertionPlace {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodHook {
    pub lifecycle_callback: String,
    pub place: InsertionPlace,
    pub statement: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookGroup {
    pub callback: String,
    pub hooks: Vec<MethodHook>,
}

/// Hooks grouped per lifecycle callback, callbacks in first-registration order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct HookTable {
    groups: Vec<HookGroup>,
}

impl HookTable {
    pub fn push(&mut self, hook: MethodHook) {
        match self
            .groups
            .iter_mut()
            .find(|g| g.callback == hook.lifecycle_callback)
        {
            Some(group) => group.hooks.push(hook),
            None => self.groups.push(HookGroup {
                callback: hook.lifecycle_callback.clone(),
                hooks: vec![hook],
            }),
        }
    }

    pub fn get(&self, callback: &str) -> &[MethodHook] {
        self.groups
            .iter()
            .find(|g| g.callback == callback)
            .map(|g| g.hooks.as_slice())
            .unwrap_or(&[])
    }

    pub fn groups(&self) -> &[HookGroup] {
        &self.groups
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredEvent {
    pub name: String,
    pub doc: Option<String>,
}

/// Annotation with no registered handler, kept for downstream tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpaqueAnnotation {
    pub name: String,
    pub target: String,
    pub arguments: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    /// `extends` expression text as written.
    pub heritage: Option<String>,
    pub ancestor_names: Vec<String>,
    pub behaviors: Vec<String>,
    pub properties: PropertyTable,
    pub methods: Vec<Method>,
    pub observers: Vec<String>,
    pub hooks: HookTable,
    pub styles: Vec<Style>,
    pub template: Option<Template>,
    pub events: Vec<RegisteredEvent>,
    pub config: Vec<(String, Literal)>,
    pub annotations: Vec<OpaqueAnnotation>,
    /// Class members that are not part of the property or method tables.
    pub extra_members: Vec<String>,
    pub export_prefix: String,
    pub doc: Option<String>,
    /// Comments above the class other than its doc block.
    pub leading_comments: String,
    pub location: SourceLocation,
}

impl Component {
    pub fn new(name: impl Into<String>) -> Self {
        Component {
            name: name.into(),
            heritage: None,
            ancestor_names: vec![],
            behaviors: vec![],
            properties: PropertyTable::default(),
            methods: vec![],
            observers: vec![],
            hooks: HookTable::default(),
            styles: vec![],
            template: None,
            events: vec![],
            config: vec![],
            annotations: vec![],
            extra_members: vec![],
            export_prefix: String::new(),
            doc: None,
            leading_comments: String::new(),
            location: SourceLocation::default(),
        }
    }

    pub fn add_ancestors<I: IntoIterator<Item = String>>(&mut self, names: I) {
        for name in names {
            if !self.ancestor_names.contains(&name) {
                self.ancestor_names.push(name);
            }
        }
    }

    pub fn add_behaviors<I: IntoIterator<Item = String>>(&mut self, names: I) {
        for name in names {
            if !self.behaviors.contains(&name) {
                self.behaviors.push(name.clone());
            }
            if !self.ancestor_names.contains(&name) {
                self.ancestor_names.push(name);
            }
        }
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn config_value(&self, key: &str) -> Option<&Literal> {
        self.config.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Shallow merge: later keys overwrite earlier ones in place.
    pub fn merge_config(&mut self, entries: &[(String, Literal)]) {
        for (key, value) in entries {
            match self.config.iter_mut().find(|(k, _)| k == key) {
                Some(slot) => slot.1 = value.clone(),
                None => self.config.push((key.clone(), value.clone())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_rendering() {
        let lit = Literal::Object(vec![
            ("a".to_string(), Literal::Bool(true)),
            ("b-c".to_string(), Literal::String("it's".to_string())),
            ("n".to_string(), Literal::Array(vec![Literal::Number(1.0), Literal::Number(2.5)])),
        ]);
        assert_eq!(lit.to_js('\''), "{ a: true, 'b-c': 'it\\'s', n: [1, 2.5] }");
        assert_eq!(Literal::Ident("ENUM.A".to_string()).to_js('"'), "ENUM.A");
    }

    #[test]
    fn test_literal_serializes_as_json() {
        let lit = Literal::Object(vec![
            ("name".to_string(), Literal::String("x-el".to_string())),
            ("n".to_string(), Literal::Null),
        ]);
        assert_eq!(
            serde_json::to_string(&lit).unwrap(),
            r#"{"name":"x-el","n":null}"#
        );
    }

    #[test]
    fn test_property_patch_merges_per_field() {
        let mut table = PropertyTable::default();
        let mut declared = Property::new("greetings", "Array");
        declared.reflect_to_attribute = true;
        table.insert(declared);

        let mut patch = PropertyPatch::named("greetings");
        patch.observer = Some("\"observerAuto\"".to_string());
        table.merge(&patch);

        let merged = table.get("greetings").unwrap();
        assert_eq!(merged.type_name, "Array");
        assert!(merged.reflect_to_attribute);
        assert_eq!(merged.observer.as_deref(), Some("\"observerAuto\""));
    }

    #[test]
    fn test_merge_creates_missing_property() {
        let mut table = PropertyTable::default();
        let mut patch = PropertyPatch::named("late");
        patch.notify = Some(true);
        table.merge(&patch);
        assert_eq!(table.get("late").unwrap().type_name, "Object");
        assert!(table.get("late").unwrap().notify);
    }

    #[test]
    fn test_rename_keeps_body_range() {
        let text = "public computedProp(val: string) {\n    return val + '!';\n  }";
        let mut method = Method::declared(
            "computedProp",
            MethodKind::Method,
            false,
            vec![Parameter {
                name: "val".to_string(),
                text: "val: string".to_string(),
            }],
            text,
            (7, 19),
            Some((33, text.len())),
            SourceLocation::default(),
        );
        method.rename("_computeComputedProp");
        assert!(method.text.starts_with("public _computeComputedProp(val: string) {"));

        let hooks = vec![MethodHook {
            lifecycle_callback: "_computeComputedProp".to_string(),
            place: InsertionPlace::Start,
            statement: "first();".to_string(),
        }];
        let spliced = method.text_with_hooks(&hooks);
        assert!(spliced.contains("{\n    first();\n    return val + '!';"));
    }

    #[test]
    fn test_hooks_in_empty_body() {
        let method = Method::synthesized("connectedCallback", vec![], "{}");
        let hooks = vec![
            MethodHook {
                lifecycle_callback: "connectedCallback".to_string(),
                place: InsertionPlace::End,
                statement: "b();".to_string(),
            },
            MethodHook {
                lifecycle_callback: "connectedCallback".to_string(),
                place: InsertionPlace::Start,
                statement: "a();".to_string(),
            },
        ];
        assert_eq!(
            method.text_with_hooks(&hooks),
            "connectedCallback() {\n    a();\n    b();\n  }"
        );
    }

    #[test]
    fn test_hook_table_groups_in_registration_order() {
        let mut table = HookTable::default();
        for (cb, stmt) in [("connected", "a"), ("disconnected", "b"), ("connected", "c")] {
            table.push(MethodHook {
                lifecycle_callback: cb.to_string(),
                place: InsertionPlace::Start,
                statement: stmt.to_string(),
            });
        }
        assert_eq!(table.groups().len(), 2);
        let connected: Vec<_> = table.get("connected").iter().map(|h| h.statement.as_str()).collect();
        assert_eq!(connected, vec!["a", "c"]);
    }
}

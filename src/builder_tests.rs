use crate::annotations::Registry;
use crate::builder::{build_unit, UnitItem, UnitModel};
use crate::error::{CompileErrorKind, CompilerError};
use crate::model::{Component, InsertionPlace, Literal, PropertyValue};
use crate::options::CompileOptions;
use crate::parse::parse_unit;
use crate::symbols::SymbolTable;

fn try_build(source: &str, options: &CompileOptions) -> Result<UnitModel, CompilerError> {
    let unit = parse_unit(source, "src/x-el.ts").unwrap();
    let symbols = SymbolTable::from_unit(&unit);
    build_unit(&unit, &symbols, options, Registry::builtin())
}

fn build(source: &str) -> UnitModel {
    try_build(source, &CompileOptions::default()).unwrap()
}

fn only_component(model: &UnitModel) -> &Component {
    assert_eq!(model.components.len(), 1);
    &model.components[0]
}

/// No observers entry duplicates a single-dependency observer folded onto a property.
fn assert_observers_exclusive(component: &Component) {
    for property in component.properties.iter() {
        assert!(
            property.computed.is_none() || property.observer.is_none(),
            "`{}` has both computed and observer",
            property.name
        );
        if let Some(observer) = &property.observer {
            let name = observer.trim_matches(|c| c == '"' || c == '\'');
            let entry = format!("{}({})", name, property.name);
            assert!(!component.observers.contains(&entry), "duplicated observer {}", entry);
        }
    }
}

#[test]
fn test_only_base_class_descendants_become_components() {
    let model = build(
        "class Helper {}\n\
         class XEl extends Polymer.Element {}\n",
    );
    assert_eq!(only_component(&model).name, "XEl");
    assert!(matches!(&model.items[0], UnitItem::Passthrough(text) if text == "class Helper {}"));
    assert!(matches!(model.items[1], UnitItem::Component(0)));
}

#[test]
fn test_mixin_heritage_reaches_base() {
    let model = build("class XEl extends Mixin(Other(Polymer.Element)) {}");
    assert_eq!(
        only_component(&model).ancestor_names,
        vec!["Mixin", "Other", "Polymer.Element"]
    );
}

#[test]
fn test_interface_after_class_adds_behaviors() {
    let model = build(
        "class XEl extends Polymer.Element {}\n\
         interface XEl extends Polymer.IronResizableBehavior {}\n",
    );
    let component = only_component(&model);
    assert_eq!(component.behaviors, vec!["Polymer.IronResizableBehavior"]);
    assert!(component
        .ancestor_names
        .contains(&"Polymer.IronResizableBehavior".to_string()));
    // The merged interface is not emitted on its own.
    assert_eq!(model.items.len(), 1);
}

#[test]
fn test_interface_before_class_adds_behaviors() {
    let model = build(
        "interface XEl extends Polymer.IronResizableBehavior {}\n\
         class XEl extends Polymer.Element {}\n",
    );
    assert_eq!(
        only_component(&model).behaviors,
        vec!["Polymer.IronResizableBehavior"]
    );
    assert_eq!(model.items.len(), 1);
}

#[test]
fn test_unresolvable_behavior_attaches_nothing() {
    let model = build(
        "class XEl extends Polymer.Element {}\n\
         interface XEl extends NowhereBehavior {}\n",
    );
    assert!(only_component(&model).behaviors.is_empty());
    assert_eq!(model.diagnostics.len(), 1);
    assert_eq!(model.diagnostics[0].kind, CompileErrorKind::AmbiguousHeritage);
    assert!(!model.diagnostics[0].is_fatal());
}

#[test]
fn test_events_broadcast_to_every_component() {
    let model = build(
        "class AEl extends Polymer.Element {}\n\
         interface ChangedEvent extends CustomEvent {}\n\
         class BEl extends Polymer.Element {}\n",
    );
    assert_eq!(model.events.len(), 1);
    for component in &model.components {
        assert_eq!(component.events.len(), 1);
        assert_eq!(component.events[0].name, "ChangedEvent");
    }
}

#[test]
fn test_undecorated_members_produce_no_accessors() {
    let model = build(
        "class XEl extends Polymer.Element {\n\
           name: string = \"x\";\n\
           greet() { return this.name; }\n\
         }\n",
    );
    let component = only_component(&model);
    assert!(component.properties.is_empty());
    assert!(component.observers.is_empty());
    assert_eq!(component.methods.len(), 1);
    assert_eq!(component.extra_members.len(), 1);
}

#[test]
fn test_implicit_properties_option() {
    let options = CompileOptions {
        implicit_properties: true,
        ..Default::default()
    };
    let model = try_build(
        "class XEl extends Polymer.Element {\n\
           name = \"x\";\n\
           static shared = 1;\n\
           private secret = 2;\n\
         }\n",
        &options,
    )
    .unwrap();
    let component = only_component(&model);
    let name = component.properties.get("name").unwrap();
    assert_eq!(name.type_name, "String");
    assert_eq!(
        name.value,
        Some(PropertyValue::Literal(Literal::String("x".to_string())))
    );
    assert_eq!(component.properties.len(), 1);
    assert_eq!(component.extra_members.len(), 2);
}

#[test]
fn test_declared_property_flags_and_types() {
    let model = build(
        "class XEl extends Polymer.Element {\n\
           @attr greetings: Array<string>;\n\
           @notify profile: any;\n\
           @attr readonly items = [1, 2];\n\
         }\n",
    );
    let component = only_component(&model);
    let greetings = component.properties.get("greetings").unwrap();
    assert_eq!(greetings.type_name, "Array");
    assert!(greetings.reflect_to_attribute);
    assert!(component.properties.get("profile").unwrap().notify);

    let items = component.properties.get("items").unwrap();
    assert_eq!(items.type_name, "Array");
    assert!(items.read_only);
    assert_eq!(
        items.value,
        Some(PropertyValue::Initializer("[1, 2]".to_string()))
    );
}

#[test]
fn test_observe_path_goes_to_observers() {
    let model = build(
        "class XEl extends Polymer.Element {\n\
           @notify profile: any;\n\
           @observe(\"profile.prop\") observer(val: string) {\n    console.log(val);\n  }\n\
         }\n",
    );
    let component = only_component(&model);
    assert_eq!(component.observers, vec!["observer(profile.prop)"]);
    assert!(component.properties.get("profile.prop").is_none());
    assert_observers_exclusive(component);
}

#[test]
fn test_bare_observe_folds_onto_parameter_property() {
    let model = build(
        "class XEl extends Polymer.Element {\n\
           @attr greetings: Array<string>;\n\
           @observe observerAuto(greetings: Array<string>) {}\n\
         }\n",
    );
    let component = only_component(&model);
    let greetings = component.properties.get("greetings").unwrap();
    assert_eq!(greetings.observer.as_deref(), Some("\"observerAuto\""));
    assert!(greetings.reflect_to_attribute);
    assert!(component.observers.is_empty());
    assert_observers_exclusive(component);
}

#[test]
fn test_computed_method_becomes_resolver() {
    let model = build(
        "class XEl extends Polymer.Element {\n\
           @computed(\"test\") computedProp(val: string) {\n    return val + \"!\";\n  }\n\
         }\n",
    );
    let component = only_component(&model);
    let property = component.properties.get("computedProp").unwrap();
    assert_eq!(
        property.computed.as_deref(),
        Some("\"_computeComputedprop(test)\"")
    );
    assert!(component.method("computedProp").is_none());
    let resolver = component.method("_computeComputedprop").unwrap();
    assert!(resolver.text.starts_with("_computeComputedprop(val: string) {"));
}

#[test]
fn test_compute_with_function_literal_adds_method() {
    let model = build(
        "class XEl extends Polymer.Element {\n\
           @attr first: string;\n\
           @attr last: string;\n\
           @compute((first: string, last: string) => first + \" \" + last) full: string;\n\
         }\n",
    );
    let component = only_component(&model);
    assert_eq!(
        component.properties.get("full").unwrap().computed.as_deref(),
        Some("\"_fullComputed(first, last)\"")
    );
    let method = component.method("_fullComputed").unwrap();
    assert!(method.synthesized);
    assert_eq!(method.arguments_no_type, vec!["first", "last"]);
}

#[test]
fn test_synthesized_method_collision_is_fatal() {
    let err = try_build(
        "class XEl extends Polymer.Element {\n\
           @compute((a: number) => a * 2) total: number;\n\
           _totalComputed() { return 0; }\n\
         }\n",
        &CompileOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::NameCollision);
    assert!(err.message.contains("_totalComputed"));
}

#[test]
fn test_renamed_resolver_collision_is_fatal() {
    let err = try_build(
        "class XEl extends Polymer.Element {\n\
           @computed(\"a\") foo(a: string) { return a; }\n\
           _computeFoo() { return 1; }\n\
         }\n",
        &CompileOptions::default(),
    )
    .unwrap_err();
    assert_eq!(err.kind, CompileErrorKind::NameCollision);
    assert!(err.message.contains("_computeFoo"));
    assert!(err.message.contains("lines 2 and 3"));
}

#[test]
fn test_accessor_pair_is_not_a_collision() {
    let model = build(
        "class XEl extends Polymer.Element {\n\
           get label() { return this._label; }\n\
           set label(value: string) { this._label = value; }\n\
           static label() { return 1; }\n\
         }\n",
    );
    assert_eq!(only_component(&model).methods.len(), 3);
}

#[test]
fn test_computed_and_observer_are_mutually_exclusive() {
    let model = build(
        "class XEl extends Polymer.Element {\n\
           @compute(\"sum\", \"a, b\") @property({ observer: \"totalChanged\" }) total: number;\n\
         }\n",
    );
    let component = only_component(&model);
    let total = component.properties.get("total").unwrap();
    assert_eq!(total.computed.as_deref(), Some("\"sum(a, b)\""));
    assert!(total.observer.is_none());
    assert_eq!(component.observers, vec!["totalChanged(total)"]);
    assert_observers_exclusive(component);
}

#[test]
fn test_listen_gesture_pairs_hooks() {
    let model = build(
        "class XEl extends Polymer.Element {\n\
           @listen(\"tap\") onTap() {}\n\
         }\n",
    );
    let hooks = &only_component(&model).hooks;
    let connected = hooks.get("connectedCallback");
    let disconnected = hooks.get("disconnectedCallback");
    assert_eq!(connected.len(), 1);
    assert_eq!(disconnected.len(), 1);
    assert_eq!(connected[0].place, InsertionPlace::Start);
    assert!(connected[0].statement.starts_with("Polymer.Gestures.addListener(this, \"tap\""));
    assert!(disconnected[0]
        .statement
        .starts_with("Polymer.Gestures.removeListener(this, \"tap\""));
}

#[test]
fn test_listen_once_has_no_disconnect_hook() {
    let model = build(
        "class XEl extends Polymer.Element {\n\
           @listen(\"tap\", true) onTap() {}\n\
         }\n",
    );
    let hooks = &only_component(&model).hooks;
    assert_eq!(hooks.get("connectedCallback").len(), 1);
    assert!(hooks.get("disconnectedCallback").is_empty());
    assert!(hooks.get("connectedCallback")[0]
        .statement
        .contains("this.onTap(...args); Polymer.Gestures.removeListener"));
}

#[test]
fn test_unknown_decorator_is_opaque() {
    let model = build(
        "class XEl extends Polymer.Element {\n\
           @tracked @attr name: string;\n\
         }\n",
    );
    let component = only_component(&model);
    assert!(component.properties.get("name").unwrap().reflect_to_attribute);
    assert_eq!(component.annotations.len(), 1);
    assert_eq!(component.annotations[0].name, "tracked");
    assert_eq!(model.diagnostics[0].kind, CompileErrorKind::UnknownAnnotation);
}

#[test]
fn test_class_decorators_set_template_and_styles() {
    let model = build(
        "@template(\"<h1>[[test]]</h1>\")\n\
         @style(\"h1 {color: red;}\")\n\
         @style(\"style.css\", \"shared-style\")\n\
         class XEl extends Polymer.Element {}\n",
    );
    let component = only_component(&model);
    assert!(component.template.is_some());
    // The last occurrence replaces the list.
    assert_eq!(component.styles.len(), 2);
}

use serde::{Deserialize, Serialize};

/// Knobs for a compilation run. Every field has a default so a partial JSON
/// document (or none at all) is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Heritage name marking a class as a component.
    pub base_class: String,
    /// Heritage names marking an interface as a custom event payload.
    pub event_base_types: Vec<String>,
    /// Drop a leading `super()` call from constructor bodies.
    pub skip_super: bool,
    /// Register undecorated public fields as properties too.
    pub implicit_properties: bool,
    /// Emit `customElements.define(...)` after each component class.
    pub define_elements: bool,
    pub bower_dir: String,
    pub npm_dir: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            base_class: "Polymer.Element".to_string(),
            event_base_types: vec!["CustomEvent".to_string(), "Event".to_string()],
            skip_super: false,
            implicit_properties: false,
            define_elements: true,
            bower_dir: "bower_components".to_string(),
            npm_dir: "node_modules".to_string(),
        }
    }
}

impl CompileOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = CompileOptions::from_json(r#"{ "skipSuper": true, "bowerDir": "deps" }"#)
            .unwrap();
        assert!(options.skip_super);
        assert_eq!(options.bower_dir, "deps");
        assert_eq!(options.base_class, "Polymer.Element");
        assert_eq!(options.event_base_types, vec!["CustomEvent", "Event"]);
    }

    #[test]
    fn test_empty_object() {
        let options = CompileOptions::from_json("{}").unwrap();
        assert!(options.define_elements);
        assert!(!options.implicit_properties);
    }
}

//! Per-file import table: local alias -> fully qualified name.

use std::collections::HashMap;

use serde::Serialize;

use crate::parse::{Declaration, ImportBinding, ImportDecl, SourceUnit};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Import {
    pub alias: String,
    pub module_path: String,
    /// `None` for namespace and default imports.
    pub exported_name: Option<String>,
    pub full_identifier: String,
}

impl Import {
    pub fn from_binding(decl: &ImportDecl, binding: &ImportBinding) -> Self {
        let (path, fragment) = match decl.module_path.split_once('#') {
            Some((path, fragment)) if !fragment.is_empty() => (path, Some(fragment)),
            _ => (decl.module_path.as_str(), None),
        };
        let exported_name = binding.imported.clone();
        let full_identifier = match (fragment, &exported_name) {
            (Some(ns), Some(exported)) => format!("{}.{}", ns, exported),
            (Some(ns), None) => ns.to_string(),
            (None, Some(exported)) => exported.clone(),
            (None, None) => binding.local.clone(),
        };
        Import {
            alias: binding.local.clone(),
            module_path: path.to_string(),
            exported_name,
            full_identifier,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolTable {
    imports: HashMap<String, Import>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_unit(unit: &SourceUnit) -> Self {
        let mut table = SymbolTable::new();
        for decl in &unit.declarations {
            if let Declaration::Import(import) = decl {
                for binding in &import.bindings {
                    table.register(Import::from_binding(import, binding));
                }
            }
        }
        tracing::debug!(file = %unit.file_path, imports = table.len(), "symbol table built");
        table
    }

    /// Later registrations for the same alias replace earlier ones.
    pub fn register(&mut self, import: Import) {
        self.imports.insert(import.alias.clone(), import);
    }

    pub fn get(&self, alias: &str) -> Option<&Import> {
        self.imports.get(alias)
    }

    pub fn resolve(&self, alias: &str) -> Option<&str> {
        self.imports.get(alias).map(|i| i.full_identifier.as_str())
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.imports.contains_key(alias)
    }

    /// Rewrite a possibly dotted name through its first segment.
    pub fn rewrite_name(&self, name: &str) -> String {
        let (head, rest) = match name.find('.') {
            Some(i) => (&name[..i], &name[i..]),
            None => (name, ""),
        };
        match self.resolve(head) {
            Some(full) => format!("{}{}", full, rest),
            None => name.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(path: &str, local: &str, imported: Option<&str>) -> Import {
        let decl = ImportDecl {
            module_path: path.to_string(),
            bindings: vec![],
            text: String::new(),
        };
        Import::from_binding(
            &decl,
            &ImportBinding {
                local: local.to_string(),
                imported: imported.map(str::to_string),
            },
        )
    }

    #[test]
    fn test_namespace_fragment() {
        let i = import("bower:some/behaviors.html#Polymer", "B", Some("MyBehavior"));
        assert_eq!(i.full_identifier, "Polymer.MyBehavior");
        assert_eq!(i.module_path, "bower:some/behaviors.html");
    }

    #[test]
    fn test_plain_named_import() {
        let i = import("./other", "Local", Some("Remote"));
        assert_eq!(i.full_identifier, "Remote");
    }

    #[test]
    fn test_namespace_import_without_fragment_keeps_alias() {
        let i = import("./ns", "NS", None);
        assert_eq!(i.full_identifier, "NS");
        let i = import("./ns#Lib", "NS", None);
        assert_eq!(i.full_identifier, "Lib");
    }

    #[test]
    fn test_last_registration_wins() {
        let mut table = SymbolTable::new();
        table.register(import("a#One", "X", Some("A")));
        table.register(import("b#Two", "X", Some("B")));
        assert_eq!(table.resolve("X"), Some("Two.B"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_rewrite_dotted_name() {
        let mut table = SymbolTable::new();
        table.register(import("lib#Polymer", "P", None));
        assert_eq!(table.rewrite_name("P.Element"), "Polymer.Element");
        assert_eq!(table.rewrite_name("Unknown.Thing"), "Unknown.Thing");
        assert_eq!(table.resolve("Unknown"), None);
    }
}

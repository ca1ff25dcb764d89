//! HTML module rendering
//!
//! Packs a compiled file into the module shape the element runtime loads:
//! markup imports as `<link rel="import">`, one `<dom-module>` per component
//! carrying its styles and template, and a single `<script>` with the code.

use std::collections::HashSet;

use crate::codegen::{CompiledComponent, ResolvedStyle};
use crate::options::CompileOptions;
use crate::parse::ImportDecl;
use crate::{CompiledFile, OutputItem};

pub fn render_module(file: &CompiledFile, options: &CompileOptions) -> String {
    let mut sections = Vec::new();

    // 1. Markup imports, first occurrence wins
    let mut seen = HashSet::new();
    let links = file
        .imports
        .iter()
        .filter(|import| import.is_markup())
        .map(|import| import_href(import, options))
        .filter(|href| seen.insert(href.clone()))
        .map(|href| format!("<link rel=\"import\" href=\"{}\">", escape_attr(&href)))
        .collect::<Vec<_>>();
    if !links.is_empty() {
        sections.push(links.join("\n"));
    }

    // 2. Templates and styles
    for component in file.components() {
        if let Some(module) = dom_module(component) {
            sections.push(module);
        }
    }

    // 3. Script
    let script = file
        .items
        .iter()
        .map(|item| match item {
            OutputItem::Component(component) => component.code.trim_end().to_string(),
            OutputItem::Passthrough(text) => text.trim_end().to_string(),
        })
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>();
    if !script.is_empty() {
        sections.push(format!("<script>\n{}\n</script>", script.join("\n\n")));
    }

    let mut html = sections.join("\n\n");
    html.push('\n');
    html
}

/// `href` for a markup import: `link!` is stripped, `bower:` and `npm:` map to
/// the configured package directories.
pub fn import_href(import: &ImportDecl, options: &CompileOptions) -> String {
    let path = import.path();
    if let Some(rest) = path.strip_prefix("link!") {
        rest.to_string()
    } else if let Some(rest) = path.strip_prefix("bower:") {
        format!("{}/{}", options.bower_dir.trim_end_matches('/'), rest)
    } else if let Some(rest) = path.strip_prefix("npm:") {
        format!("{}/{}", options.npm_dir.trim_end_matches('/'), rest)
    } else {
        path.to_string()
    }
}

fn dom_module(component: &CompiledComponent) -> Option<String> {
    if component.template.is_none() && component.styles.is_empty() {
        return None;
    }
    let mut body = Vec::new();
    for style in &component.styles {
        body.push(match style {
            ResolvedStyle::Css(css) => format!("    <style>{}</style>", css.trim()),
            ResolvedStyle::Include(module) => {
                format!("    <style include=\"{}\"></style>", escape_attr(module))
            }
        });
    }
    if let Some(template) = &component.template {
        let markup = template.trim();
        if !markup.is_empty() {
            body.push(
                markup
                    .lines()
                    .map(|line| {
                        if line.trim().is_empty() {
                            String::new()
                        } else {
                            format!("    {}", line)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n"),
            );
        }
    }
    Some(format!(
        "<dom-module id=\"{}\">\n  <template>\n{}\n  </template>\n</dom-module>",
        escape_attr(&component.element_name),
        body.join("\n")
    ))
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn import(path: &str) -> ImportDecl {
        ImportDecl {
            module_path: path.to_string(),
            bindings: vec![],
            text: format!("import \"{}\";", path),
        }
    }

    #[test]
    fn test_import_href() {
        let options = CompileOptions {
            bower_dir: "deps/".to_string(),
            ..Default::default()
        };
        assert_eq!(
            import_href(&import("link!bower_components/polymer/polymer.html"), &options),
            "bower_components/polymer/polymer.html"
        );
        assert_eq!(
            import_href(&import("bower:polymer/polymer.html#Polymer"), &options),
            "deps/polymer/polymer.html"
        );
        assert_eq!(
            import_href(&import("npm:esp/dist/esp.html"), &options),
            "node_modules/esp/dist/esp.html"
        );
        assert_eq!(import_href(&import("./local.html"), &options), "./local.html");
    }

    #[test]
    fn test_render_module_layout() {
        let component = CompiledComponent {
            name: "XEl".to_string(),
            element_name: "x-el".to_string(),
            code: "class XEl extends Polymer.Element {\n}\n".to_string(),
            template: Some("<h1>Hi</h1>\n".to_string()),
            styles: vec![
                ResolvedStyle::Css("h1 { color: red; }".to_string()),
                ResolvedStyle::Include("shared-style".to_string()),
            ],
            model: crate::model::Component::new("XEl"),
        };
        let file = CompiledFile {
            file_path: "x.ts".to_string(),
            imports: vec![
                import("link!bower_components/polymer/polymer.html"),
                import("link!bower_components/polymer/polymer.html"),
                import("./util"),
            ],
            items: vec![
                OutputItem::Passthrough("import { a } from \"./util\";".to_string()),
                OutputItem::Component(component),
            ],
            diagnostics: vec![],
        };
        let html = render_module(&file, &CompileOptions::default());
        assert_eq!(
            html,
            "<link rel=\"import\" href=\"bower_components/polymer/polymer.html\">\n\n\
             <dom-module id=\"x-el\">\n  <template>\n    <style>h1 { color: red; }</style>\n    \
             <style include=\"shared-style\"></style>\n    <h1>Hi</h1>\n  </template>\n</dom-module>\n\n\
             <script>\nimport { a } from \"./util\";\n\nclass XEl extends Polymer.Element {\n}\n</script>\n"
        );
    }

    #[test]
    fn test_no_dom_module_without_template_or_styles() {
        let component = CompiledComponent {
            name: "XEl".to_string(),
            element_name: "x-el".to_string(),
            code: "class XEl {}".to_string(),
            template: None,
            styles: vec![],
            model: crate::model::Component::new("XEl"),
        };
        let file = CompiledFile {
            file_path: "x.ts".to_string(),
            imports: vec![],
            items: vec![OutputItem::Component(component)],
            diagnostics: vec![],
        };
        assert_eq!(
            render_module(&file, &CompileOptions::default()),
            "<script>\nclass XEl {}\n</script>\n"
        );
    }
}

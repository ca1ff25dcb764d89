//! # Polymer TypeScript Compiler
//!
//! Compiles decorator-annotated TypeScript classes into element definitions
//! for the Polymer runtime.
//!
//! ## Pipeline
//!
//! 1. **Parse** (`parse`): oxc parses the file; top-level statements are
//!    lowered to the closed [`parse::Declaration`] variants.
//! 2. **Symbols** (`symbols`): import aliases map to fully qualified names.
//! 3. **Build** (`builder`): classes whose flattened heritage reaches the base
//!    class become components. Every decorator goes through the registry
//!    (`annotations`) via the resolution engine (`engine`), and handler output
//!    is folded into the component tables.
//! 4. **Emit** (`codegen`): accessors are generated, members are rewritten
//!    through the symbol table (`renamer`), hooks are spliced and links resolved.
//! 5. **Finalize** (`finalize`): optional HTML module packaging.
//!
//! ## Failure model
//!
//! A fatal [`CompilerError`] aborts the file being compiled. Non-fatal ones
//! (unknown annotations, unresolved behaviors) are collected on
//! [`CompiledFile::diagnostics`]. Files in a batch never affect each other.

pub mod annotations;
pub mod builder;
pub mod codegen;
pub mod engine;
pub mod error;
pub mod finalize;
pub mod heritage;
pub mod infer;
pub mod links;
pub mod model;
pub mod options;
pub mod parse;
pub mod renamer;
pub mod static_eval;
pub mod symbols;

#[cfg(test)]
mod builder_tests;

use rayon::prelude::*;
use serde::Serialize;

use crate::annotations::Registry;
use crate::builder::UnitItem;
use crate::codegen::{CompiledComponent, EmitContext};
use crate::parse::ImportDecl;
use crate::renamer::ReferenceRewriter;
use crate::symbols::SymbolTable;

pub use crate::error::{CompileErrorKind, CompilerError};
pub use crate::finalize::render_module;
pub use crate::links::{FsLinkResolver, LinkError, LinkResolver, MemoryLinkResolver};
pub use crate::options::CompileOptions;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum OutputItem {
    Component(CompiledComponent),
    /// Non-component declaration, references rewritten.
    Passthrough(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledFile {
    pub file_path: String,
    pub imports: Vec<ImportDecl>,
    /// Output in source order.
    pub items: Vec<OutputItem>,
    pub diagnostics: Vec<CompilerError>,
}

impl CompiledFile {
    pub fn components(&self) -> impl Iterator<Item = &CompiledComponent> {
        self.items.iter().filter_map(|item| match item {
            OutputItem::Component(component) => Some(component),
            OutputItem::Passthrough(_) => None,
        })
    }

    pub fn component(&self, name: &str) -> Option<&CompiledComponent> {
        self.components().find(|c| c.name == name)
    }

    /// Script text of every item, joined in source order.
    pub fn code(&self) -> String {
        self.items
            .iter()
            .map(|item| match item {
                OutputItem::Component(component) => component.code.trim_end(),
                OutputItem::Passthrough(text) => text.trim_end(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Compile one source file with the built-in annotation registry.
pub fn compile_source(
    source: &str,
    file_path: &str,
    options: &CompileOptions,
    resolver: &dyn LinkResolver,
) -> Result<CompiledFile, CompilerError> {
    compile_with_registry(source, file_path, options, resolver, Registry::builtin())
}

pub fn compile_with_registry(
    source: &str,
    file_path: &str,
    options: &CompileOptions,
    resolver: &dyn LinkResolver,
    registry: &Registry,
) -> Result<CompiledFile, CompilerError> {
    tracing::debug!(file = file_path, "compiling");

    // 1. Parse
    let unit = parse::parse_unit(source, file_path)?;

    // 2. Symbols
    let symbols = SymbolTable::from_unit(&unit);

    // 3. Component model
    let model = builder::build_unit(&unit, &symbols, options, registry)?;
    for diagnostic in &model.diagnostics {
        tracing::warn!(code = %diagnostic.code, "{}", diagnostic.message);
    }

    // 4. Emission
    let ctx = EmitContext {
        symbols: &symbols,
        options,
        resolver,
        quote_char: unit.quote_char,
        file_path,
    };
    let rewriter = ReferenceRewriter::new(&symbols).skip_super(options.skip_super);
    let mut items = Vec::with_capacity(model.items.len());
    for item in &model.items {
        items.push(match item {
            UnitItem::Component(index) => {
                OutputItem::Component(codegen::emit_component(&model.components[*index], &ctx)?)
            }
            UnitItem::Passthrough(text) => OutputItem::Passthrough(rewriter.rewrite_program(text)),
        });
    }

    tracing::debug!(
        file = file_path,
        components = model.components.len(),
        diagnostics = model.diagnostics.len(),
        "compiled"
    );
    Ok(CompiledFile {
        file_path: file_path.to_string(),
        imports: model.imports,
        items,
        diagnostics: model.diagnostics,
    })
}

/// Compile independent `(path, source)` pairs in parallel. Results keep input order.
pub fn compile_batch(
    inputs: &[(String, String)],
    options: &CompileOptions,
    resolver: &dyn LinkResolver,
) -> Vec<Result<CompiledFile, CompilerError>> {
    inputs
        .par_iter()
        .map(|(path, source)| {
            let result = compile_source(source, path, options, resolver);
            if let Err(err) = &result {
                tracing::warn!(file = %path, code = %err.code, "compilation failed: {}", err.message);
            }
            result
        })
        .collect()
}

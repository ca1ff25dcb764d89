use serde::Serialize;
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_SYNTAX: &str = "PTC-ERR-SYNTAX-001";
pub const WARN_AMBIGUOUS_HERITAGE: &str = "PTC-WARN-HERITAGE-001";
pub const ERR_NAME_COLLISION: &str = "PTC-ERR-COLLISION-001";
pub const ERR_UNRESOLVABLE_LINK: &str = "PTC-ERR-LINK-001";
pub const WARN_UNKNOWN_ANNOTATION: &str = "PTC-WARN-ANNOTATION-001";
pub const ERR_MALFORMED_ARGUMENTS: &str = "PTC-ERR-ARGUMENTS-001";

/// Every condition the pipeline reports, fatal or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CompileErrorKind {
    Syntax,
    AmbiguousHeritage,
    NameCollision,
    UnresolvableLink,
    UnknownAnnotation,
    MalformedDecoratorArguments,
}

impl CompileErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            CompileErrorKind::Syntax => ERR_SYNTAX,
            CompileErrorKind::AmbiguousHeritage => WARN_AMBIGUOUS_HERITAGE,
            CompileErrorKind::NameCollision => ERR_NAME_COLLISION,
            CompileErrorKind::UnresolvableLink => ERR_UNRESOLVABLE_LINK,
            CompileErrorKind::UnknownAnnotation => WARN_UNKNOWN_ANNOTATION,
            CompileErrorKind::MalformedDecoratorArguments => ERR_MALFORMED_ARGUMENTS,
        }
    }

    /// Fatal kinds abort the current file. The rest are collected as diagnostics.
    pub fn is_fatal(self) -> bool {
        !matches!(
            self,
            CompileErrorKind::AmbiguousHeritage | CompileErrorKind::UnknownAnnotation
        )
    }

    fn guarantee(self) -> &'static str {
        match self {
            CompileErrorKind::Syntax => "Only syntactically valid sources reach the component builder.",
            CompileErrorKind::AmbiguousHeritage => {
                "Unresolvable heritage attaches nothing to the component."
            }
            CompileErrorKind::NameCollision => {
                "Every method name in a component's method table is unique."
            }
            CompileErrorKind::UnresolvableLink => {
                "Every style and template link is resolved before emission."
            }
            CompileErrorKind::UnknownAnnotation => {
                "Unknown annotations are preserved as opaque metadata."
            }
            CompileErrorKind::MalformedDecoratorArguments => {
                "Decorator arguments always yield a well-formed dependency list."
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message} ({file}:{line}:{column})")]
pub struct CompilerError {
    pub kind: CompileErrorKind,
    pub code: String,
    pub message: String,
    pub guarantee: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(kind: CompileErrorKind, message: impl Into<String>, file: &str) -> Self {
        CompilerError {
            kind,
            code: kind.code().to_string(),
            message: message.into(),
            guarantee: kind.guarantee().to_string(),
            file: file.to_string(),
            line: 1,
            column: 1,
            context: None,
            hints: vec![],
        }
    }

    pub fn at(mut self, location: crate::model::SourceLocation) -> Self {
        self.line = location.line;
        self.column = location.column;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.kind.is_fatal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceLocation;

    #[test]
    fn test_fatality_split() {
        assert!(CompileErrorKind::NameCollision.is_fatal());
        assert!(CompileErrorKind::UnresolvableLink.is_fatal());
        assert!(CompileErrorKind::MalformedDecoratorArguments.is_fatal());
        assert!(!CompileErrorKind::UnknownAnnotation.is_fatal());
        assert!(!CompileErrorKind::AmbiguousHeritage.is_fatal());
    }

    #[test]
    fn test_display_carries_code_and_position() {
        let err = CompilerError::new(CompileErrorKind::NameCollision, "duplicate `foo`", "a.ts")
            .at(SourceLocation { line: 3, column: 5 });
        assert_eq!(
            err.to_string(),
            "[PTC-ERR-COLLISION-001] duplicate `foo` (a.ts:3:5)"
        );
    }
}

//! Property type tokens inferred from type annotations and initializers.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NUMERIC_LITERAL: Regex = Regex::new(r"^-?(\d[\d_]*(\.\d*)?|\.\d+)([eE][+-]?\d+)?$").unwrap();
    static ref NUMERIC_ARITHMETIC: Regex = Regex::new(r"^[\d\s._+\-*/%()eE]+$").unwrap();
    static ref NEW_DATE: Regex = Regex::new(r"^new\s+Date\b").unwrap();
    static ref NEW_ARRAY: Regex = Regex::new(r"^(new\s+)?Array\b").unwrap();
}

/// Types that never decide the token of a union.
const TRANSPARENT_TYPES: &[&str] = &["any", "void", "never", "null", "undefined"];

pub fn type_from_annotation(annotation: &str) -> &'static str {
    let annotation = strip_parens(annotation.trim());
    let parts = split_top_level(annotation, &['|', '&']);
    let mut tokens: Vec<&'static str> = Vec::new();
    for part in parts {
        if let Some(token) = single_type(strip_parens(part.trim())) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
    }
    match tokens.as_slice() {
        [single] => *single,
        _ => "Object",
    }
}

fn single_type(ty: &str) -> Option<&'static str> {
    if TRANSPARENT_TYPES.contains(&ty) || ty.is_empty() {
        return None;
    }
    let token = match ty {
        "string" | "String" => "String",
        "number" | "Number" => "Number",
        "boolean" | "Boolean" | "true" | "false" => "Boolean",
        "Date" => "Date",
        _ if ty.starts_with(['"', '\'', '`']) => "String",
        _ if NUMERIC_LITERAL.is_match(ty) => "Number",
        _ if ty.ends_with("[]")
            || ty.starts_with('[')
            || ty.starts_with("Array<")
            || ty.starts_with("ReadonlyArray<") =>
        {
            "Array"
        }
        _ => "Object",
    };
    Some(token)
}

pub fn type_from_initializer(initializer: &str) -> &'static str {
    let init = strip_parens(initializer.trim());
    if init.starts_with(['"', '\'', '`']) {
        "String"
    } else if init == "true" || init == "false" {
        "Boolean"
    } else if NUMERIC_LITERAL.is_match(init)
        || (NUMERIC_ARITHMETIC.is_match(init) && init.chars().any(|c| c.is_ascii_digit()))
    {
        "Number"
    } else if NEW_DATE.is_match(init) {
        "Date"
    } else if init.starts_with('[') || NEW_ARRAY.is_match(init) {
        "Array"
    } else {
        "Object"
    }
}

fn strip_parens(mut s: &str) -> &str {
    while s.starts_with('(') && s.ends_with(')') && closes_at_end(s) {
        s = s[1..s.len() - 1].trim();
    }
    s
}

/// True when the opening paren at 0 is closed by the final character.
fn closes_at_end(s: &str) -> bool {
    let mut depth = 0i32;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return i == s.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Split on any of `separators` outside brackets and string literals.
pub fn split_top_level<'s>(s: &'s str, separators: &[char]) -> Vec<&'s str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '>' if depth > 0 => depth -= 1,
            c if depth == 0 && separators.contains(&c) => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_tokens() {
        assert_eq!(type_from_annotation("string"), "String");
        assert_eq!(type_from_annotation("number"), "Number");
        assert_eq!(type_from_annotation("boolean"), "Boolean");
        assert_eq!(type_from_annotation("Date"), "Date");
        assert_eq!(type_from_annotation("string[]"), "Array");
        assert_eq!(type_from_annotation("Array<Map<string, number>>"), "Array");
        assert_eq!(type_from_annotation("[number, string]"), "Array");
        assert_eq!(type_from_annotation("{ a: string }"), "Object");
        assert_eq!(type_from_annotation("HTMLElement"), "Object");
    }

    #[test]
    fn test_unions_drop_transparent_types() {
        assert_eq!(type_from_annotation("string | null"), "String");
        assert_eq!(type_from_annotation("'a' | 'b'"), "String");
        assert_eq!(type_from_annotation("1 | 2 | undefined"), "Number");
        assert_eq!(type_from_annotation("string | number"), "Object");
        assert_eq!(type_from_annotation("(string | undefined)"), "String");
        assert_eq!(type_from_annotation("Array<string | number>"), "Array");
    }

    #[test]
    fn test_initializer_tokens() {
        assert_eq!(type_from_initializer("'hello'"), "String");
        assert_eq!(type_from_initializer("`t`"), "String");
        assert_eq!(type_from_initializer("42"), "Number");
        assert_eq!(type_from_initializer("60 * 60 * 1000"), "Number");
        assert_eq!(type_from_initializer("false"), "Boolean");
        assert_eq!(type_from_initializer("new Date()"), "Date");
        assert_eq!(type_from_initializer("[1, 2]"), "Array");
        assert_eq!(type_from_initializer("new Array(3)"), "Array");
        assert_eq!(type_from_initializer("{}"), "Object");
        assert_eq!(type_from_initializer("someCall()"), "Object");
    }

    #[test]
    fn test_split_ignores_nested_separators() {
        assert_eq!(
            split_top_level("a | Foo<b | c> | 'x|y'", &['|']),
            vec!["a ", " Foo<b | c> ", " 'x|y'"]
        );
    }
}

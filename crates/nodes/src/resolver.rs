//! Variable resolver (C2) — `{{ path }}` substitution against the layered
//! [`ExecutionContext`] scope.
//!
//! Grounded on spec §4.2. Deliberately a hand-rolled navigator, not a
//! templating crate: the resolver never executes code, it only walks a
//! value tree, so pulling in a general-purpose template engine would add
//! surface area for no benefit (same reasoning spec §9 gives for the
//! expression evaluator).

use serde_json::Value;

use crate::scope::ExecutionContext;

/// Whether an unresolved path is reported as an error or silently
/// substituted with an empty string (spec §4.2's error policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    Lenient,
    Strict,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unresolved variable path: {0}")]
pub struct UnresolvedVariable(pub String);

/// Find every `{{ path }}` token in `template`.
fn find_tokens(template: &str) -> Vec<(usize, usize, &str)> {
    let mut tokens = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'{' && bytes[i + 1] == b'{' {
            if let Some(end) = template[i + 2..].find("}}") {
                let path = template[i + 2..i + 2 + end].trim();
                tokens.push((i, i + 2 + end + 2, path));
                i += 2 + end + 2;
                continue;
            }
        }
        i += 1;
    }
    tokens
}

fn split_path(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split('.').map(str::trim).collect()
}

/// Navigate `root` by the path segments after the scope selector.
fn navigate(root: Value, segments: &[&str]) -> Option<Value> {
    let mut current = root;
    for seg in segments {
        current = match current {
            Value::Object(ref map) => map.get(*seg).cloned()?,
            Value::Array(ref arr) => {
                let idx: usize = seg.parse().ok()?;
                arr.get(idx).cloned()?
            }
            _ => return None,
        };
    }
    Some(current)
}

/// Resolve a single `path` (without the `{{ }}` wrapper) against `ctx`.
pub fn resolve_path(path: &str, ctx: &ExecutionContext) -> Option<Value> {
    let segments = split_path(path);
    let (scope_name, rest) = segments.split_first()?;
    let root = ctx.scope_value(scope_name)?;
    if rest.is_empty() {
        Some(root)
    } else {
        navigate(root, rest)
    }
}

fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Substitute every `{{ path }}` token in `template`.
///
/// When the whole template is exactly one token and the resolved value is
/// non-string, the original type is preserved (so [`resolve_map`] can pass
/// numbers/booleans/structures through untouched). Otherwise the result is
/// always a string, with each token replaced by the string form of its
/// resolved value.
pub fn resolve(template: &str, ctx: &ExecutionContext, mode: ResolveMode) -> Result<Value, UnresolvedVariable> {
    let tokens = find_tokens(template);

    if tokens.len() == 1 && tokens[0].0 == 0 && tokens[0].1 == template.len() {
        let path = tokens[0].2;
        return match resolve_path(path, ctx) {
            Some(v) => Ok(v),
            None if mode == ResolveMode::Strict => Err(UnresolvedVariable(path.to_string())),
            None => Ok(Value::String(String::new())),
        };
    }

    if tokens.is_empty() {
        return Ok(Value::String(template.to_string()));
    }

    let mut out = String::with_capacity(template.len());
    let mut cursor = 0;
    for (start, end, path) in tokens {
        out.push_str(&template[cursor..start]);
        let resolved = resolve_path(path, ctx);
        match resolved {
            Some(v) => out.push_str(&value_to_string(&v)),
            None if mode == ResolveMode::Strict => return Err(UnresolvedVariable(path.to_string())),
            None => {}
        }
        cursor = end;
    }
    out.push_str(&template[cursor..]);
    Ok(Value::String(out))
}

/// Resolve every string leaf in `value`, recursing through objects and
/// arrays and leaving non-string leaves untouched.
pub fn resolve_map(value: &Value, ctx: &ExecutionContext, mode: ResolveMode) -> Result<Value, UnresolvedVariable> {
    match value {
        Value::String(s) => resolve(s, ctx, mode),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), resolve_map(v, ctx, mode)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(arr) => {
            let mut out = Vec::with_capacity(arr.len());
            for v in arr {
                out.push(resolve_map(v, ctx, mode)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ExecutionContext;
    use serde_json::json;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn ctx_with_input(input: Value) -> ExecutionContext {
        ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), None, input, serde_json::Map::new(), HashMap::new())
    }

    #[test]
    fn resolves_single_token_preserving_type() {
        let ctx = ctx_with_input(json!({ "count": 42 }));
        let resolved = resolve("{{input.count}}", &ctx, ResolveMode::Lenient).unwrap();
        assert_eq!(resolved, json!(42));
    }

    #[test]
    fn unresolved_path_is_empty_string_in_lenient_mode() {
        let ctx = ctx_with_input(json!({}));
        let resolved = resolve("{{input.missing}}", &ctx, ResolveMode::Lenient).unwrap();
        assert_eq!(resolved, json!(""));
    }

    #[test]
    fn unresolved_path_errors_in_strict_mode() {
        let ctx = ctx_with_input(json!({}));
        assert!(resolve("{{input.missing}}", &ctx, ResolveMode::Strict).is_err());
    }

    #[test]
    fn mixed_template_always_stringifies() {
        let ctx = ctx_with_input(json!({ "name": "world" }));
        let resolved = resolve("hello {{input.name}}!", &ctx, ResolveMode::Lenient).unwrap();
        assert_eq!(resolved, json!("hello world!"));
    }

    #[test]
    fn unknown_scope_resolves_to_empty() {
        let ctx = ctx_with_input(json!({}));
        let resolved = resolve("{{nonexistent.path}}", &ctx, ResolveMode::Lenient).unwrap();
        assert_eq!(resolved, json!(""));
    }

    #[test]
    fn resolve_map_descends_nested_structures() {
        let ctx = ctx_with_input(json!({ "x": 1 }));
        let template = json!({ "a": "{{input.x}}", "b": [ "static", "{{input.x}}" ], "c": 7 });
        let resolved = resolve_map(&template, &ctx, ResolveMode::Lenient).unwrap();
        assert_eq!(resolved, json!({ "a": 1, "b": ["static", 1], "c": 7 }));
    }

    #[test]
    fn is_total_over_arbitrary_templates() {
        let ctx = ctx_with_input(Value::Null);
        for s in ["", "{{", "}}", "{{}}", "{{.}}", "plain text", "{{a.b.c.d.e}}"] {
            assert!(resolve(s, &ctx, ResolveMode::Lenient).is_ok());
        }
    }
}

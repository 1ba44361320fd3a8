/// Runtime variable resolution over the execution context
///
/// Inputs may reference earlier step results with `{{path}}` templates,
/// where the path is a dot-separated walk into the context (e.g.
/// `{{node_1.TX_HASH}}`). Resolution is pure apart from diagnostic logging.

use crate::workflow::types::ExecutionContext;
use serde_json::Value;

/// Resolve a single input value against the context
///
/// - Non-string inputs pass through unchanged.
/// - A string that is exactly one `{{path}}` token returns the raw resolved
///   value of any type, so math and logic nodes receive real numbers and
///   objects. A miss yields `null` (and a warning), distinct from a
///   resolved-but-falsy value.
/// - A string with interleaved tokens is interpolated: each token becomes
///   its stringified value (objects JSON-encoded); an unresolved token is
///   left verbatim so the miss stays visible in the output.
pub fn resolve(input: &Value, context: &ExecutionContext) -> Value {
    let text = match input {
        Value::String(s) => s,
        other => return other.clone(),
    };

    if let Some(path) = exact_token(text) {
        return match lookup(path, context) {
            Some(value) => value.clone(),
            None => {
                tracing::warn!(path, "template variable not found in context");
                Value::Null
            }
        };
    }

    Value::String(interpolate(text, context))
}

/// The path inside a string that is exactly one `{{path}}` token, if any
fn exact_token(text: &str) -> Option<&str> {
    let inner = text.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.is_empty() || inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner)
}

/// Walk a dot-separated path into the context
///
/// Segments are whitespace-trimmed (`{{ node_1.TX_HASH }}` is fine). A
/// missing segment or a non-object intermediate yields `None`.
fn lookup<'a>(path: &str, context: &'a ExecutionContext) -> Option<&'a Value> {
    let mut parts = path.split('.').map(str::trim);

    let first = parts.next()?;
    let mut current = context.get(first)?;

    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn interpolate(text: &str, context: &ExecutionContext) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];

        let Some(close) = after.find("}}") else {
            // Unterminated token; keep the tail as-is.
            out.push_str("{{");
            rest = after;
            break;
        };

        let path = &after[..close];
        match lookup(path, context) {
            Some(value) if !path.is_empty() => out.push_str(&display(value)),
            _ => {
                if !path.is_empty() {
                    tracing::warn!(path, "template variable not found in context");
                }
                // Leave the placeholder verbatim rather than blanking it.
                out.push_str("{{");
                out.push_str(path);
                out.push_str("}}");
            }
        }
        rest = &after[close + 2..];
    }

    out.push_str(rest);
    out
}

/// Stringify a resolved value for interpolation: strings stay raw,
/// objects and arrays are JSON-encoded.
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
        other => other.to_string(),
    }
}

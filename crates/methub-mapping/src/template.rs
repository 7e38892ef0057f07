use serde_json::Value;

use crate::path;

/// Render a `{{path}}` template against a payload.
///
/// Every placeholder is replaced with the stringified resolved value, or
/// the empty string when the path is absent. Strings are inserted raw
/// (unquoted); compound values are inserted as compact JSON.
pub fn render(template: &str, payload: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let expr = after[..end].trim();
                if let Some(value) = path::lookup(payload, expr) {
                    out.push_str(&stringify(value));
                }
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated placeholder: emit the rest verbatim.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

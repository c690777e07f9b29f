//! Argument and result values, and their trace renderings.

pub use serde_json::Value;

/// Render a value the way it appears inside a default unit rendering.
///
/// Strings are quoted like Python's `repr`: single quotes, or double quotes
/// when the string contains `'` but no `"`. Everything else is compact JSON.
pub fn repr(value: &Value) -> String {
    match value {
        Value::String(s) => quote(s),
        other => other.to_string(),
    }
}

/// Render a value for template substitution: strings unquoted, the rest as
/// [`repr`].
pub fn display_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => repr(other),
    }
}

fn quote(s: &str) -> String {
    let delim = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push(delim);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn repr_quotes_strings() {
        assert_eq!(repr(&json!("us")), "'us'");
        assert_eq!(repr(&json!("it's")), "\"it's\"");
        assert_eq!(repr(&json!("say \"it's\"")), "'say \"it\\'s\"'");
        assert_eq!(repr(&json!("a\\b\n")), "'a\\\\b\\n'");
    }

    #[test]
    fn repr_keeps_non_strings_as_json() {
        assert_eq!(repr(&json!(3)), "3");
        assert_eq!(repr(&json!(true)), "true");
        assert_eq!(repr(&Value::Null), "null");
        assert_eq!(repr(&json!(["a", 1])), "[\"a\",1]");
    }

    #[test]
    fn display_str_leaves_strings_bare() {
        assert_eq!(display_str(&json!("eu")), "eu");
        assert_eq!(display_str(&json!(2.5)), "2.5");
    }
}

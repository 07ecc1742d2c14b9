use regex::Regex;
use serde_json::Value;

lazy_static::lazy_static! {
    static ref SCRIPT_BLOCK: Regex = Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap();
    /// The colon may arrive entity-encoded, which an `href` decodes back.
    static ref SCRIPT_SCHEME: Regex =
        Regex::new(r"(?i)(?:javascript|vbscript)\s*(?::|&#0*58;?|&#x0*3a;?|&colon;)").unwrap();
    static ref EVENT_HANDLER: Regex = Regex::new(r"(?i)\bon[a-z]+\s*=").unwrap();
    static ref ENTITY: Regex =
        Regex::new(r"^&(?:#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,31});").unwrap();
}

/// Makes an untrusted string safe to embed in HTML.
///
/// Script blocks, `javascript:`/`vbscript:` schemes and inline `on*=` handlers are
/// removed until none remain, then the HTML special characters are entity-encoded.
/// Existing entities are kept as they are, so the function is idempotent.
pub fn sanitize_str(input: &str) -> String {
    let mut current = input.to_string();
    // Removing one match can splice together another, e.g. "javajavascript:script:".
    loop {
        let stripped = strip_active_content(&current);
        if stripped == current {
            break;
        }
        current = stripped;
    }
    encode_entities(&current)
}

/// Sanitizes every string inside a JSON value, keeping keys, order and non-string leaves.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, sanitize(v))).collect()),
        other => other,
    }
}

fn strip_active_content(input: &str) -> String {
    let s = SCRIPT_BLOCK.replace_all(input, "");
    let s = SCRIPT_SCHEME.replace_all(&s, "");
    EVENT_HANDLER.replace_all(&s, "").into_owned()
}

fn encode_entities(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + input.len() / 8);
    for (idx, c) in input.char_indices() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '&' if ENTITY.is_match(&input[idx..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            _ => out.push(c),
        }
    }
    out
}

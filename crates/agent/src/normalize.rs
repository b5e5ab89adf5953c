//! Argument normalizer: maps whatever the model sent into the posting tool's
//! input shape.

use postclaw_core::tool::ToolCall;
use serde_json::Value;

/// Keys that carry the payload, after the canonical key.
const PAYLOAD_KEYS: [&str; 4] = ["status", "text", "content", "message"];

/// Extract the posting payload from a call's arguments.
///
/// Resolution order:
/// 1. the first present payload key, trying `canonical_key` first
/// 2. the longest string property of an object (first wins a tie)
/// 3. the JSON text of an object with no string properties
/// 4. a bare string as-is, anything else as JSON text
pub fn normalize(call: &ToolCall, canonical_key: &str) -> String {
    match &call.args {
        Value::Object(map) => {
            let known = std::iter::once(canonical_key)
                .chain(PAYLOAD_KEYS)
                .find_map(|key| map.get(key).filter(|v| !v.is_null()));
            if let Some(value) = known {
                return value_text(value);
            }

            let longest = map
                .values()
                .filter_map(Value::as_str)
                .fold(None::<&str>, |best, s| match best {
                    Some(b) if b.chars().count() >= s.chars().count() => Some(b),
                    _ => Some(s),
                });

            match longest {
                Some(s) => s.to_string(),
                None => call.args.to_string(),
            }
        }
        other => value_text(other),
    }
}

/// Arguments as they go to the registry.
///
/// The posting tool gets `{canonical_key: payload}`; every other tool gets
/// its arguments untouched.
pub fn normalize_arguments(call: &ToolCall, posting_tool: &str, canonical_key: &str) -> Value {
    if call.name == posting_tool {
        let mut map = serde_json::Map::new();
        map.insert(canonical_key.to_string(), Value::String(normalize(call, canonical_key)));
        Value::Object(map)
    } else {
        call.args.clone()
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn post(args: Value) -> ToolCall {
        ToolCall::new("createPost", args)
    }

    #[test]
    fn status_key_is_used_directly() {
        assert_eq!(normalize(&post(json!({"status": "hello"})), "status"), "hello");
    }

    #[test]
    fn alternate_keys_in_priority_order() {
        assert_eq!(normalize(&post(json!({"message": "m", "text": "t"})), "status"), "t");
        assert_eq!(normalize(&post(json!({"content": "c", "message": "m"})), "status"), "c");
        assert_eq!(normalize(&post(json!({"message": "m"})), "status"), "m");
    }

    #[test]
    fn canonical_key_wins() {
        let call = post(json!({"status": "s", "body": "b"}));
        assert_eq!(normalize(&call, "body"), "b");
    }

    #[test]
    fn longest_string_property_is_used() {
        let call = post(json!({"title": "short", "draft": "a much longer draft", "n": 3}));
        assert_eq!(normalize(&call, "status"), "a much longer draft");
    }

    #[test]
    fn longest_string_tie_goes_to_first() {
        let call = post(json!({"b": "same", "a": "size"}));
        assert_eq!(normalize(&call, "status"), "same");
    }

    #[test]
    fn object_without_strings_is_serialized() {
        let call = post(json!({"n": 1, "ok": true}));
        assert_eq!(normalize(&call, "status"), r#"{"n":1,"ok":true}"#);
    }

    #[test]
    fn bare_string_and_other_values() {
        assert_eq!(normalize(&post(json!("just post this")), "status"), "just post this");
        assert_eq!(normalize(&post(json!(42)), "status"), "42");
        assert_eq!(normalize(&post(json!(["a", "b"])), "status"), r#"["a","b"]"#);
    }

    #[test]
    fn non_string_payload_key_is_serialized() {
        assert_eq!(normalize(&post(json!({"status": 7})), "status"), "7");
    }

    #[test]
    fn posting_tool_gets_canonical_shape() {
        let call = post(json!({"text": "hello"}));
        assert_eq!(
            normalize_arguments(&call, "createPost", "status"),
            json!({"status": "hello"})
        );
    }

    #[test]
    fn other_tools_pass_through() {
        let call = ToolCall::new("addTwoNumbers", json!({"a": 1, "b": 2}));
        assert_eq!(normalize_arguments(&call, "createPost", "status"), json!({"a": 1, "b": 2}));
    }
}

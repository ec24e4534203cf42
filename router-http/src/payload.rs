use serde_json::Value;

/// Prepends a system prompt as the first `messages` entry, the way
/// `ChatCompletionRequest::from_cfg` inserts an optional system message —
/// generalized here from "single prompt string" to "arbitrary normalized
/// payload" since the pipeline may already have built a multi-message body.
pub fn prepend_system_prompt(payload: &mut Value, system_prompt: &str) {
    let Some(obj) = payload.as_object_mut() else {
        return;
    };
    let messages = obj
        .entry("messages")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Some(arr) = messages.as_array_mut() else {
        return;
    };
    arr.insert(
        0,
        serde_json::json!({ "role": "system", "content": system_prompt }),
    );
}

/// Indices of every `role: "user"` entry in the payload's `messages` array.
pub fn user_message_indices(payload: &Value) -> Vec<usize> {
    payload
        .get("messages")
        .and_then(Value::as_array)
        .map(|messages| {
            messages
                .iter()
                .enumerate()
                .filter(|(_, m)| m.get("role").and_then(Value::as_str) == Some("user"))
                .map(|(i, _)| i)
                .collect()
        })
        .unwrap_or_default()
}

/// Builds one single-user-message payload per user message, keeping every
/// non-user message (e.g. a leading system prompt) and exactly one of the
/// user messages, preserving the original messages' relative order.
pub fn split_by_user_message(payload: &Value) -> Vec<Value> {
    let Some(messages) = payload.get("messages").and_then(Value::as_array) else {
        return vec![payload.clone()];
    };
    let user_indices = user_message_indices(payload);

    user_indices
        .iter()
        .map(|&target| {
            let mut sub = payload.clone();
            let filtered: Vec<Value> = messages
                .iter()
                .enumerate()
                .filter(|(i, m)| {
                    *i == target || m.get("role").and_then(Value::as_str) != Some("user")
                })
                .map(|(_, m)| m.clone())
                .collect();
            if let Some(obj) = sub.as_object_mut() {
                obj.insert("messages".to_string(), Value::Array(filtered));
            }
            sub
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_inserts_system_message_first() {
        let mut payload = serde_json::json!({ "messages": [{"role": "user", "content": "hi"}] });
        prepend_system_prompt(&mut payload, "be terse");
        let messages = payload["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "be terse");
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn split_keeps_system_message_in_every_sub_payload() {
        let payload = serde_json::json!({
            "messages": [
                {"role": "system", "content": "sys"},
                {"role": "user", "content": "one"},
                {"role": "user", "content": "two"},
            ]
        });
        let parts = split_by_user_message(&payload);
        assert_eq!(parts.len(), 2);
        for part in &parts {
            let messages = part["messages"].as_array().unwrap();
            assert_eq!(messages.len(), 2);
            assert_eq!(messages[0]["role"], "system");
        }
        assert_eq!(parts[0]["messages"][1]["content"], "one");
        assert_eq!(parts[1]["messages"][1]["content"], "two");
    }
}

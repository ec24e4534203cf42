//! Coordination-store key schema. Centralized here so every strategy and
//! the keep-alive scheduler agree on exactly the same key shapes.

/// Redis-disallowed characters (`:` and whitespace) replaced with `_` inside
/// a model name before it is embedded in a key, mirroring the original
/// `_get_redis_key` sanitation.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c == ':' || c.is_whitespace() { '_' } else { c })
        .collect()
}

pub fn model_key(model_name: &str) -> String {
    format!("model:{}", sanitize(model_name))
}

pub fn model_init_flag_key(model_name: &str) -> String {
    format!("model:{}:initialized", sanitize(model_name))
}

pub fn host_key(host: &str) -> String {
    format!("host:{}", sanitize(host))
}

pub fn last_host_key(model_name: &str) -> String {
    format!("{}:last_host", model_key(model_name))
}

pub fn model_hosts_set_key(model_name: &str) -> String {
    format!("{}:hosts", model_key(model_name))
}

pub fn provider_field(provider_id: &str) -> String {
    format!("{}:is_chosen", provider_id)
}

pub fn availability_key(model_name: &str) -> String {
    format!("availability:{}", sanitize(model_name))
}

pub fn monitor_providers_key(model_name: &str) -> String {
    format!("monitor:providers:{}", sanitize(model_name))
}

pub fn keepalive_provider_key(model_name: &str, host: &str) -> String {
    format!("keepalive:provider:{}:{}", sanitize(model_name), sanitize(host))
}

pub const KEEPALIVE_WAKEUPS_KEY: &str = "keepalive:providers:next_wakeup";

pub fn keepalive_member(model_name: &str, host: &str) -> String {
    format!("{}|{}", model_name, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes_match_schema() {
        assert_eq!(model_key("m1"), "model:m1");
        assert_eq!(last_host_key("m1"), "model:m1:last_host");
        assert_eq!(model_hosts_set_key("m1"), "model:m1:hosts");
        assert_eq!(provider_field("p1"), "p1:is_chosen");
        assert_eq!(availability_key("m1"), "availability:m1");
        assert_eq!(keepalive_member("m1", "h1"), "m1|h1");
    }
}

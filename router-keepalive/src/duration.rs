/// Parses an idle-warmup duration string (`"120s"`, `"45m"`, `"2h"`,
/// case-insensitive unit) into seconds. Anything that doesn't parse means
/// "do not schedule a keep-alive for this provider" rather than an error.
pub fn parse_keep_alive(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw.len() < 2 {
        return None;
    }
    let (digits, unit) = raw.split_at(raw.len() - 1);
    let n: u64 = digits.parse().ok()?;
    match unit.to_ascii_lowercase().as_str() {
        "s" => Some(n),
        "m" => Some(n * 60),
        "h" => Some(n * 3600),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(parse_keep_alive("120s"), Some(120));
        assert_eq!(parse_keep_alive("45m"), Some(2700));
        assert_eq!(parse_keep_alive("2h"), Some(7200));
        assert_eq!(parse_keep_alive("2H"), Some(7200));
    }

    #[test]
    fn rejects_unparseable_strings() {
        assert_eq!(parse_keep_alive(""), None);
        assert_eq!(parse_keep_alive("forever"), None);
        assert_eq!(parse_keep_alive("5"), None);
    }
}

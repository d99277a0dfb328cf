/// Room names are normalized before they reach the membership core:
/// lowercased, trimmed, inner whitespace collapsed to single hyphens.
pub fn normalize(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

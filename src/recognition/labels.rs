/// Canonicalizes a raw classifier label into display/query text.
///
/// Classifier labels come back as `snake_case` class names (`"fried_rice"`), sometimes with
/// stray padding. Underscores become spaces, whitespace runs collapse to a single space and
/// the result is trimmed, so `" fried__rice "` and `"fried rice"` compare equal.
pub fn normalize_label(raw: &str) -> String {
    raw.replace('_', " ")
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

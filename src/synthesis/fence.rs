//! Markdown code-fence removal for model output.

const FENCE: &str = "```";

/// Removes markdown code fences wrapping `text`.
///
/// Text that does not start (after leading whitespace) with a fence is
/// returned unchanged. Otherwise the opening fence and an optional language
/// tag are removed, along with everything from the last closing fence onward
/// and surrounding whitespace. Nested fences are peeled until none remain, so
/// `strip_code_fence(&strip_code_fence(s)) == strip_code_fence(s)`.
pub fn strip_code_fence(text: &str) -> String {
    let mut current = text.to_string();
    while let Some(inner) = strip_once(&current) {
        current = inner;
    }
    current
}

fn strip_once(text: &str) -> Option<String> {
    let rest = text.trim_start().strip_prefix(FENCE)?;

    let body = match rest.split_once('\n') {
        Some((first, remainder)) if is_language_tag(first.trim()) => remainder,
        _ => rest,
    };
    let body = match body.rfind(FENCE) {
        Some(end) => &body[..end],
        None => body,
    };
    Some(body.trim().to_string())
}

fn is_language_tag(line: &str) -> bool {
    line.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '.' | '-'))
}

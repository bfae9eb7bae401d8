const LOG_PREVIEW_CHARS: usize = 50;

/// Shortens text for log lines, keeping at most 50 characters.
pub fn preview_text(text: &str) -> String {
    if text.chars().count() <= LOG_PREVIEW_CHARS {
        return text.to_string();
    }

    let mut preview: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

/// Joins the first `count` whitespace-separated words of `text` with single spaces.
pub fn leading_words(text: &str, count: usize) -> String {
    text.split_whitespace()
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}

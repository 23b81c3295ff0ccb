// Output formatting: terminal display and file export.

pub mod csv;
pub mod terminal;

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Participant names come from user-edited profiles, so this respects UTF-8
/// character boundaries rather than slicing bytes.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_multibyte_characters() {
        assert_eq!(truncate_chars("Zoë 🎉 Quinn", 5), "Zoë 🎉...");
        assert_eq!(truncate_chars("Alex", 10), "Alex");
    }
}

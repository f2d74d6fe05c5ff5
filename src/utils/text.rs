/// Convert a user-facing label into a safe filesystem slug.
///
/// Letters and digits of any script are kept, spaces become `_`, and other
/// punctuation is dropped.
pub fn sanitize_file_stem(name: &str) -> Option<String> {
    let mut slug = String::new();

    for ch in name.trim().chars() {
        if ch.is_alphanumeric() {
            slug.push(ch);
        } else if matches!(ch, ' ' | '-' | '_') {
            slug.push(if ch == ' ' { '_' } else { ch });
        }
    }

    if slug.is_empty() {
        None
    } else {
        Some(slug.to_lowercase())
    }
}

/// Truncate `text` to at most `max` characters, marking the cut with `…`.
pub fn ellipsize(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{kept}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_keeps_hangul_and_drops_punctuation() {
        assert_eq!(
            sanitize_file_stem("기준금리 (월)").as_deref(),
            Some("기준금리_월")
        );
        assert_eq!(sanitize_file_stem("CPI-2020").as_deref(), Some("cpi-2020"));
        assert_eq!(sanitize_file_stem(" ?! "), None);
    }

    #[test]
    fn ellipsize_counts_characters() {
        assert_eq!(ellipsize("서울특별시", 10), "서울특별시");
        assert_eq!(ellipsize("서울특별시 종로구", 4), "서울특…");
    }
}

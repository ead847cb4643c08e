use crate::models::Language;

fn is_cyrillic(c: char) -> bool {
    matches!(c, 'а'..='я' | 'А'..='Я' | 'ё' | 'Ё')
}

/// Classify a span by the scripts it contains.
pub fn classify(text: &str) -> Language {
    if text.trim().is_empty() {
        return Language::Unknown;
    }

    let cyrillic = text.chars().any(is_cyrillic);
    let latin = text.chars().any(|c| c.is_ascii_alphabetic());

    match (cyrillic, latin) {
        (true, false) => Language::Cyrillic,
        (false, true) => Language::Latin,
        (true, true) => Language::Mixed,
        (false, false) => Language::Unknown,
    }
}

/// Lowercases `text` and deletes every character that is neither alphanumeric
/// nor whitespace. Punctuation is removed, not replaced, so `"don't"` becomes
/// `"dont"` and `"U.S."` becomes `"us"`.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized terms of `text` in order of appearance. Empty or
/// punctuation-only input yields no terms.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text).split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_strips_punctuation() {
        assert_eq!(tokenize("The Bill-of-Lading, dated 5/1!"), ["the", "billoflading", "dated", "51"]);
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(tokenize("  shipped\ton\n\nboard  "), ["shipped", "on", "board"]);
    }

    #[test]
    fn empty_and_symbol_only_inputs() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("... -- !!").is_empty());
    }

    #[test]
    fn keeps_unicode_letters_and_digits() {
        assert_eq!(tokenize("Übergabe № 42 DÉJÀ"), ["übergabe", "42", "déjà"]);
    }

    #[test]
    fn underscores_are_punctuation() {
        assert_eq!(tokenize("port_of_loading"), ["portofloading"]);
    }
}

//! Case- and accent-insensitive text matching for product names
//!
//! Product names arrive in mixed case with Portuguese diacritics
//! ("GRÃO DE BICO", "Maçã Gala"). Keyword matching folds both sides to
//! lowercase ASCII-ish text before comparing.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lowercase and strip diacritics
///
/// Input is decomposed first, so precomposed ("ã") and combining ("a" +
/// U+0303) spellings fold to the same text.
pub fn fold(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// True if `haystack` contains `needle`, ignoring case and accents
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    fold(haystack).contains(&fold(needle))
}

/// Collapse runs of whitespace into single spaces and trim
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_portuguese() {
        assert_eq!(fold("GRÃO DE BICO"), "grao de bico");
        assert_eq!(fold("Maçã Gala"), "maca gala");
        assert_eq!(fold("Brócolos"), "brocolos");
        assert_eq!(fold("AÇAÍ"), "acai");
    }

    #[test]
    fn test_fold_decomposed_and_unlisted_marks() {
        // Base letters followed by combining accents
        assert_eq!(fold("Mac\u{0327}a\u{0303} Gala"), "maca gala");
        assert_eq!(fold("GRA\u{0303}O"), "grao");
        // Marks outside Portuguese still fold
        assert_eq!(fold("Crème Brûlée"), "creme brulee");
        assert_eq!(fold("Ōmega Š"), "omega s");
        assert!(contains_folded("Feija\u{0303}o Preto", "feijão"));
        assert!(contains_folded("FEIJÃO", "Feija\u{0303}o"));
    }

    #[test]
    fn test_contains_folded() {
        assert!(contains_folded("FEIJÃO PRETO", "feijao"));
        assert!(contains_folded("feijao preto", "feijão"));
        assert!(contains_folded("Limões Bio", "LIMÕES"));
        assert!(!contains_folded("Leite", "lima"));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  c "), "a b c");
    }
}

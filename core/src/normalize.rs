//! Label normalizer — canonical keys for free-text labels and names.
//!
//! Two folds:
//!
//! `normalize` is for KPI labels, so "7.1 - Transações", "TRANSACOES"
//! and "transações " all land on the same key.
//!   - lower-case, diacritics stripped
//!   - every non-alphanumeric character becomes a separator
//!   - leading purely numeric tokens are dropped ("7.1 - " prefixes)
//!   - tokens are joined by a single space
//!
//! `scope_key` is for names (segments, subchannels, tribes, record
//! kinds). It only folds case, diacritics and whitespace, so "144",
//! "1 - Loja" and "2 - Loja" stay distinct.
//!
//! Both are fixed points: `f(f(x)) == f(x)`.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Canonical key for `label`. Never fails; garbage in gives "" out.
pub fn normalize(label: &str) -> String {
    let folded: String = fold_chars(label)
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    folded
        .split_whitespace()
        .skip_while(|tok| tok.chars().all(|c| c.is_numeric()))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `normalize` for nullable cells. `None` is the empty key.
pub fn normalize_opt(label: Option<&str>) -> String {
    label.map(normalize).unwrap_or_default()
}

/// Key for a segment, subchannel or tribe name: case, diacritics and
/// runs of whitespace folded, everything else kept.
pub fn scope_key(name: &str) -> String {
    let folded: String = fold_chars(name).collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `scope_key` for nullable cells. `None` is the empty key.
pub fn scope_key_opt(name: Option<&str>) -> String {
    name.map(scope_key).unwrap_or_default()
}

/// Case- and space-insensitive name equality. The empty key equals nothing.
pub fn same_key(a: &str, b: &str) -> bool {
    let a = scope_key(a);
    !a.is_empty() && a == scope_key(b)
}

// Lower-case, decomposed, combining marks dropped.
fn fold_chars(s: &str) -> impl Iterator<Item = char> + '_ {
    s.nfd()
        .flat_map(char::to_lowercase)
        .nfd()
        .filter(|c| !is_combining_mark(*c))
}

/// True when every token of `pattern` appears, contiguously and in order,
/// among the tokens of `label`. Both sides must already be normalized.
/// An empty pattern or an empty label never matches.
pub fn contains_tokens(label: &str, pattern: &str) -> bool {
    if label.is_empty() || pattern.is_empty() {
        return false;
    }
    let hay: Vec<&str> = label.split(' ').collect();
    let needle: Vec<&str> = pattern.split(' ').collect();
    needle.len() <= hay.len() && hay.windows(needle.len()).any(|w| w == needle.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn strips_numeric_prefix_and_accents() {
        assert_eq!(normalize("7.1 - Transações"), "transacoes");
        assert_eq!(normalize("6 - Acessos"), "acessos");
        assert_eq!(normalize("  MÓVEL "), "movel");
    }

    #[test]
    fn punctuation_becomes_single_spaces() {
        assert_eq!(normalize("UU/CPF -- (Únicos)"), "uu cpf unicos");
        assert_eq!(normalize("a\t\tb\n c"), "a b c");
    }

    #[test]
    fn keeps_digits_after_the_first_word() {
        assert_eq!(normalize("3 - Top 10 Acessos"), "top 10 acessos");
    }

    #[test]
    fn empty_and_none_normalize_to_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" - 7.1 - "), "");
        assert_eq!(normalize_opt(None), "");
    }

    #[test]
    fn same_key_ignores_case_and_space() {
        assert!(same_key(" dMa ", "DMA"));
        assert!(!same_key("", ""));
        assert!(!same_key("Bot", "Dma"));
    }

    #[test]
    fn token_matching_respects_word_boundaries() {
        assert!(contains_tokens("acessos unicos", "acessos"));
        assert!(contains_tokens("usuarios unicos app", "usuarios unicos"));
        assert!(!contains_tokens("transacoesx", "transacoes"));
        assert!(!contains_tokens("acessos", ""));
        assert!(!contains_tokens("", "acessos"));
    }

    #[test]
    fn scope_key_keeps_numbers_and_punctuation() {
        assert_eq!(scope_key("144"), "144");
        assert_eq!(scope_key(" 1 -  Loja "), "1 - loja");
        assert_ne!(scope_key("1 - Loja"), scope_key("2 - Loja"));
        assert_eq!(scope_key("MÓVEL"), scope_key("movel"));
        assert_eq!(scope_key_opt(None), "");
    }

    #[test]
    fn same_key_does_not_merge_numbered_names() {
        assert!(same_key("144", " 144 "));
        assert!(!same_key("1 - Loja", "Loja"));
    }

    proptest! {
        #[test]
        fn scope_key_is_idempotent(s in "\\PC{0,40}") {
            let once = scope_key(&s);
            prop_assert_eq!(scope_key(&once), once);
        }

        #[test]
        fn normalize_is_idempotent(s in "\\PC{0,40}") {
            let once = normalize(&s);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn normalized_keys_have_no_edge_spaces(s in "\\PC{0,40}") {
            let key = normalize(&s);
            prop_assert!(!key.starts_with(' ') && !key.ends_with(' '));
            prop_assert!(!key.contains("  "));
        }
    }
}

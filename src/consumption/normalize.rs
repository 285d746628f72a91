use unicode_normalization::UnicodeNormalization as _;

/// Decomposes `value` (NFKD) and drops every non-ASCII code point, so `Districte`
/// and `Districté` fold to the same text. Case is preserved; a missing value
/// yields an empty string.
pub fn normalize_text(value: Option<&str>) -> String {
    value
        .map(|s| s.nfkd().filter(char::is_ascii).collect())
        .unwrap_or_default()
}

/// Key used for tolerant header matching: folded, lowercased and trimmed.
pub fn match_key(value: &str) -> String {
    normalize_text(Some(value)).to_lowercase().trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accents_are_folded() {
        assert_eq!(normalize_text(Some("Tipus_ús")), "Tipus_us");
        assert_eq!(normalize_text(Some("Secció censal")), "Seccio censal");
    }

    #[test]
    fn test_case_is_preserved() {
        assert_eq!(normalize_text(Some("DISTRICTE")), "DISTRICTE");
    }

    #[test]
    fn test_missing_is_empty() {
        assert_eq!(normalize_text(None), "");
    }

    #[test]
    fn test_match_key_strips_bom_and_whitespace() {
        assert_eq!(match_key("\u{feff} Consum_Litres_Per_Dia "), "consum_litres_per_dia");
        assert_eq!(match_key("Númèro_de_comptadors"), "numero_de_comptadors");
    }
}

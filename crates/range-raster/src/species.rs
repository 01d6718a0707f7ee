//! Species name normalization.

/// Normalize a binomial to the underscore convention used for tree tips.
///
/// Leading and trailing whitespace is dropped, and every run of spaces,
/// dots or underscores between words becomes a single underscore:
/// `"Stenella attenuata"`, `"Stenella.attenuata"` and `" Stenella__attenuata "`
/// all become `"Stenella_attenuata"`. Case is preserved, because tips are
/// matched exactly.
pub fn normalize_species_name(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '.' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separators_become_underscores() {
        assert_eq!(normalize_species_name("Stenella.attenuata"), "Stenella_attenuata");
        assert_eq!(normalize_species_name("Stenella attenuata"), "Stenella_attenuata");
        assert_eq!(normalize_species_name("  Stenella \t attenuata\n"), "Stenella_attenuata");
        assert_eq!(normalize_species_name("Stenella__attenuata"), "Stenella_attenuata");
        assert_eq!(normalize_species_name("Stenella_attenuata"), "Stenella_attenuata");
    }

    #[test]
    fn test_trinomials_and_hyphens() {
        assert_eq!(
            normalize_species_name("Tursiops truncatus gephyreus"),
            "Tursiops_truncatus_gephyreus"
        );
        assert_eq!(normalize_species_name("Megaptera novae-angliae"), "Megaptera_novae-angliae");
    }

    #[test]
    fn test_case_is_preserved() {
        assert_eq!(normalize_species_name("stenella Attenuata"), "stenella_Attenuata");
        assert_eq!(normalize_species_name(""), "");
    }
}

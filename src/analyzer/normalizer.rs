use std::collections::HashSet;

/// Post-processing for theme labels coming back from the model.
///
/// The graph treats themes as exact labels, so "Time Travel" and
/// "time travel." must be folded together before they are stored.
pub struct ThemeNormalizer;

impl ThemeNormalizer {
    /// Normalizes a single theme label.
    ///
    /// - Converts to lowercase
    /// - Collapses whitespace runs to a single space
    /// - Strips leading/trailing characters that are not alphanumeric
    ///
    /// ```
    /// use vaulta::analyzer::ThemeNormalizer;
    ///
    /// assert_eq!(ThemeNormalizer::normalize_theme("  Time   Travel! "), "time travel");
    /// assert_eq!(ThemeNormalizer::normalize_theme("#worldbuilding"), "worldbuilding");
    /// assert_eq!(ThemeNormalizer::normalize_theme("self-care"), "self-care");
    /// ```
    #[must_use]
    pub fn normalize_theme(theme: &str) -> String {
        let collapsed = theme
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        collapsed
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_string()
    }

    /// Normalizes a list of themes, dropping empties and later duplicates.
    ///
    /// ```
    /// use vaulta::analyzer::ThemeNormalizer;
    ///
    /// let themes = vec!["Memory".to_string(), "memory.".to_string(), "  ".to_string()];
    /// assert_eq!(ThemeNormalizer::normalize_themes(themes), vec!["memory"]);
    /// ```
    #[must_use]
    pub fn normalize_themes(themes: Vec<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        themes
            .into_iter()
            .map(|theme| Self::normalize_theme(&theme))
            .filter(|theme| !theme.is_empty() && seen.insert(theme.clone()))
            .collect()
    }
}

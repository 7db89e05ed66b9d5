//! Resolves an incoming message to a picture category.

use crate::config::{Category, CategoryRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedVia {
    Command,
    Alias,
}

/// A resolved category for one message. Lives for the duration of the reply.
#[derive(Debug)]
pub struct CategoryMatch<'a> {
    pub name: &'a str,
    pub category: &'a Category,
    pub via: MatchedVia,
}

/// Extract a command token from message text.
///
/// `/cats` and `/cats@nyabot` (when `bot_username` is `nyabot`, any case) both
/// yield `cats`; a command addressed to a different bot yields nothing.
pub fn command_token<'a>(text: &'a str, bot_username: Option<&str>) -> Option<&'a str> {
    let first_word = text.split_whitespace().next()?;
    let command = first_word.strip_prefix('/')?;
    if command.is_empty() {
        return None;
    }
    match command.split_once('@') {
        Some((command, mention)) => {
            let addressed_to_us =
                bot_username.is_some_and(|username| username.eq_ignore_ascii_case(mention));
            (addressed_to_us && !command.is_empty()).then_some(command)
        }
        None => Some(command),
    }
}

/// Match a message against the registry.
///
/// A command token equal to a category name wins outright; only then is the
/// text scanned for alias words. Aliases match as case-insensitive prefixes of
/// whitespace-split words, first category in declaration order wins.
pub fn classify<'a>(
    text: &str,
    bot_username: Option<&str>,
    registry: &'a CategoryRegistry,
) -> Option<CategoryMatch<'a>> {
    if let Some(token) = command_token(text, bot_username) {
        if let Some((name, category)) = registry.resolve_command(token) {
            return Some(CategoryMatch { name, category, via: MatchedVia::Command });
        }
    }

    let words: Vec<String> = text.split_whitespace().map(str::to_lowercase).collect();
    for (name, category) in registry.iter() {
        for alias in &category.aliases {
            let alias = alias.to_lowercase();
            if words.iter().any(|word| word.starts_with(&alias)) {
                return Some(CategoryMatch { name, category, via: MatchedVia::Alias });
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(aliases: &[&str]) -> Category {
        Category {
            sources: Vec::new(),
            aliases: aliases.iter().map(|s| s.to_string()).collect(),
            captions: Vec::new(),
            hidden: false,
            nsfw: false,
        }
    }

    fn registry(entries: &[(&str, &[&str])]) -> CategoryRegistry {
        CategoryRegistry::from_entries(
            entries
                .iter()
                .map(|&(name, aliases)| (name.to_string(), category(aliases)))
                .collect(),
        )
    }

    #[test]
    fn test_command_token_plain() {
        assert_eq!(command_token("/cats", None), Some("cats"));
        assert_eq!(command_token("/cats please", None), Some("cats"));
        assert_eq!(command_token("cats", None), None);
        assert_eq!(command_token("hello /cats", None), None);
        assert_eq!(command_token("/", None), None);
    }

    #[test]
    fn test_command_token_mention() {
        assert_eq!(command_token("/cats@nyabot", Some("nyabot")), Some("cats"));
        assert_eq!(command_token("/cats@NyaBot", Some("nyabot")), Some("cats"));
        assert_eq!(command_token("/cats@otherbot", Some("nyabot")), None);
        assert_eq!(command_token("/cats@nyabot", None), None);
    }

    #[test]
    fn test_command_match() {
        let registry = registry(&[("cats", &[]), ("dogs", &[])]);
        let matched = classify("/dogs", None, &registry).unwrap();
        assert_eq!(matched.name, "dogs");
        assert_eq!(matched.via, MatchedVia::Command);
    }

    #[test]
    fn test_command_match_case_insensitive() {
        let registry = registry(&[("Cats", &[])]);
        let matched = classify("/cATS", None, &registry).unwrap();
        assert_eq!(matched.name, "Cats");
        assert_eq!(matched.via, MatchedVia::Command);
    }

    #[test]
    fn test_command_beats_alias() {
        // The text mentions an alias of another category, but the command wins.
        let registry = registry(&[("cats", &["kitty"]), ("dogs", &["pup"])]);
        let matched = classify("/dogs kitty", None, &registry).unwrap();
        assert_eq!(matched.name, "dogs");
        assert_eq!(matched.via, MatchedVia::Command);
    }

    #[test]
    fn test_unknown_command_falls_back_to_aliases() {
        let registry = registry(&[("cats", &["kitty"])]);
        let matched = classify("/unknown kitty", None, &registry).unwrap();
        assert_eq!(matched.name, "cats");
        assert_eq!(matched.via, MatchedVia::Alias);
    }

    #[test]
    fn test_alias_prefix_match() {
        let registry = registry(&[("cats", &["kitty"])]);
        let matched = classify("kittycat", None, &registry).unwrap();
        assert_eq!(matched.name, "cats");
        assert_eq!(matched.via, MatchedVia::Alias);
    }

    #[test]
    fn test_alias_case_insensitive() {
        let lower_alias = registry(&[("cats", &["kitty"])]);
        assert!(classify("KITTYcat incoming", None, &lower_alias).is_some());

        let upper_alias = registry(&[("cats", &["KITTY"])]);
        assert!(classify("kittycat", None, &upper_alias).is_some());
    }

    #[test]
    fn test_alias_not_substring_match() {
        // Aliases match word prefixes, not arbitrary substrings.
        let registry = registry(&[("cats", &["kitty"])]);
        assert!(classify("mykitty", None, &registry).is_none());
    }

    #[test]
    fn test_declaration_order_breaks_ties() {
        let registry = registry(&[("first", &["paw"]), ("second", &["paw"])]);
        let matched = classify("paws everywhere", None, &registry).unwrap();
        assert_eq!(matched.name, "first");
    }

    #[test]
    fn test_cyrillic_alias() {
        let registry = registry(&[("cats", &["котик"])]);
        let matched = classify("Котики!", None, &registry).unwrap();
        assert_eq!(matched.name, "cats");
    }

    #[test]
    fn test_no_match() {
        let registry = registry(&[("cats", &["kitty"])]);
        assert!(classify("just a normal message", None, &registry).is_none());
        assert!(classify("", None, &registry).is_none());
    }
}

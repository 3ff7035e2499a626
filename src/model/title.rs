//! Shortening window titles into overlay labels.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::common::collections::HashMap;

/// Separators tried, in order, when a rule does not name its own.
pub const DEFAULT_SEPARATORS: &[&str] = &[" — ", " – ", " - ", " | ", " · "];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TitleStrategy {
    #[default]
    FullTitle,
    /// Text before the first separator.
    BeforeSeparator,
    /// Text after the first separator.
    AfterSeparator,
    /// First whitespace-delimited word.
    FirstToken,
    /// Last whitespace-delimited word.
    LastToken,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleRule {
    #[serde(default)]
    pub strategy: TitleStrategy,
    /// Overrides [`DEFAULT_SEPARATORS`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

impl TitleRule {
    pub fn new(strategy: TitleStrategy, separator: Option<&str>) -> Self {
        Self {
            strategy,
            separator: separator.map(str::to_owned),
        }
    }

    /// Applies the rule. Never returns an empty label for a non-empty title.
    pub fn apply(&self, title: &str) -> String {
        let extracted = match self.strategy {
            TitleStrategy::FullTitle => None,
            TitleStrategy::BeforeSeparator => {
                self.split_first(title).map(|(before, _)| before)
            }
            TitleStrategy::AfterSeparator => self.split_first(title).map(|(_, after)| after),
            TitleStrategy::FirstToken => title.split_whitespace().next(),
            TitleStrategy::LastToken => title.split_whitespace().next_back(),
        };
        match extracted.map(str::trim) {
            Some(label) if !label.is_empty() => label.to_owned(),
            _ => title.trim().to_owned(),
        }
    }

    fn split_first<'a>(&self, title: &'a str) -> Option<(&'a str, &'a str)> {
        match self.separator.as_deref() {
            Some("") => None,
            Some(sep) => title.split_once(sep),
            None => DEFAULT_SEPARATORS
                .iter()
                .filter_map(|sep| title.find(sep).map(|pos| (pos, sep.len())))
                .min_by_key(|(pos, _)| *pos)
                .map(|(pos, len)| (&title[..pos], &title[pos + len..])),
        }
    }
}

/// Turns a raw window title into the label shown for it.
///
/// Implementations may return the title unchanged.
pub trait TitleExtractor: Send + Sync {
    fn extract(&self, title: &str, bundle_id: Option<&str>) -> String;
}

/// Per-application rules keyed by bundle identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TitleRules {
    default: TitleRule,
    per_app: HashMap<String, TitleRule>,
}

impl TitleRules {
    pub fn new(default: TitleRule, per_app: impl IntoIterator<Item = (String, TitleRule)>) -> Self {
        Self {
            default,
            per_app: per_app.into_iter().collect(),
        }
    }

    pub fn rule_for(&self, bundle_id: Option<&str>) -> &TitleRule {
        bundle_id.and_then(|id| self.per_app.get(id)).unwrap_or(&self.default)
    }
}

impl TitleExtractor for TitleRules {
    fn extract(&self, title: &str, bundle_id: Option<&str>) -> String {
        self.rule_for(bundle_id).apply(title)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn before_custom_separator() {
        let rule = TitleRule::new(TitleStrategy::BeforeSeparator, Some(" — "));
        assert_eq!(rule.apply("index.ts — myproj — Edited"), "index.ts");
    }

    #[test]
    fn after_first_separator() {
        let rule = TitleRule::new(TitleStrategy::AfterSeparator, Some(" — "));
        assert_eq!(rule.apply("index.ts — myproj — Edited"), "myproj — Edited");
    }

    #[test]
    fn default_separators_pick_the_earliest() {
        let rule = TitleRule::new(TitleStrategy::BeforeSeparator, None);
        assert_eq!(rule.apply("Inbox | Mail - Work"), "Inbox");
        assert_eq!(rule.apply("notes.md - vim"), "notes.md");
    }

    #[test]
    fn tokens_split_on_whitespace() {
        let first = TitleRule::new(TitleStrategy::FirstToken, None);
        let last = TitleRule::new(TitleStrategy::LastToken, None);
        assert_eq!(first.apply("  zsh  ~/src/project "), "zsh");
        assert_eq!(last.apply("  zsh  ~/src/project "), "~/src/project");
    }

    #[test]
    fn falls_back_to_the_full_title() {
        let rule = TitleRule::new(TitleStrategy::BeforeSeparator, Some(" :: "));
        assert_eq!(rule.apply("No separator here"), "No separator here");
        let rule = TitleRule::new(TitleStrategy::BeforeSeparator, Some(" — "));
        assert_eq!(rule.apply(" — trailing"), "— trailing");
        let rule = TitleRule::new(TitleStrategy::AfterSeparator, Some(""));
        assert_eq!(rule.apply("a b"), "a b");
    }

    #[test]
    fn per_app_rules_override_the_default() {
        let rules = TitleRules::new(TitleRule::default(), [(
            "com.microsoft.VSCode".to_string(),
            TitleRule::new(TitleStrategy::BeforeSeparator, Some(" — ")),
        )]);
        assert_eq!(
            rules.extract("index.ts — myproj", Some("com.microsoft.VSCode")),
            "index.ts"
        );
        assert_eq!(rules.extract("index.ts — myproj", Some("com.apple.Safari")), "index.ts — myproj");
        assert_eq!(rules.extract("index.ts — myproj", None), "index.ts — myproj");
    }

    #[test]
    fn strategies_parse_from_snake_case() {
        assert_eq!(
            "before_separator".parse::<TitleStrategy>().unwrap(),
            TitleStrategy::BeforeSeparator
        );
        assert_eq!(TitleStrategy::LastToken.to_string(), "last_token");
    }
}

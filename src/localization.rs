//! # Localization Module
//!
//! Fluent bundles for the user-facing import messages. Japanese and English
//! are bundled into the binary; unknown languages fall back to English.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use fluent_bundle::{FluentArgs, FluentBundle, FluentResource, FluentValue};
use tracing::warn;
use unic_langid::LanguageIdentifier;

pub const DEFAULT_LANGUAGE: &str = "en";

const RESOURCES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en/main.ftl")),
    ("ja", include_str!("../locales/ja/main.ftl")),
];

/// Localized message lookup for one preferred language
pub struct LocalizationManager {
    language: String,
    bundles: HashMap<String, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Load every bundled language; `language` is used when a call does not name one
    pub fn new(language: &str) -> Result<Self> {
        let mut bundles = HashMap::new();

        for (code, source) in RESOURCES {
            bundles.insert(code.to_string(), Self::create_bundle(code, source)?);
        }

        let language = if bundles.contains_key(language) {
            language.to_string()
        } else {
            warn!(language, "Unsupported language, falling back to {}", DEFAULT_LANGUAGE);
            DEFAULT_LANGUAGE.to_string()
        };

        Ok(Self { language, bundles })
    }

    fn create_bundle(code: &str, source: &str) -> Result<FluentBundle<FluentResource>> {
        let locale: LanguageIdentifier = code.parse()?;
        let mut bundle = FluentBundle::new(vec![locale]);
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid {} resource: {:?}", code, errors))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate messages in {} resource: {:?}", code, errors))?;

        Ok(bundle)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn supports(&self, language: &str) -> bool {
        self.bundles.contains_key(language)
    }

    /// Message in the manager's language
    pub fn get_message(&self, key: &str, args: Option<&FluentArgs>) -> String {
        self.get_message_in_language(key, &self.language, args)
    }

    /// Message in `language`, falling back to English for unknown languages or keys
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&FluentArgs>,
    ) -> String {
        let bundle = self
            .bundles
            .get(language)
            .filter(|bundle| bundle.has_message(key))
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE));

        let Some(bundle) = bundle else {
            return format!("Missing translation: {}", key);
        };

        let Some(pattern) = bundle.get_message(key).and_then(|msg| msg.value()) else {
            return format!("Missing translation: {}", key);
        };

        let mut errors = vec![];
        let value = bundle.format_pattern(pattern, args, &mut errors);
        if !errors.is_empty() {
            warn!(key, language, ?errors, "Message formatted with errors");
        }

        value.into_owned()
    }

    /// Message with plain string arguments
    pub fn get_message_with_args(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, FluentValue::from(*value));
        }
        self.get_message(key, Some(&fluent_args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_languages_load() {
        let manager = LocalizationManager::new("ja").unwrap();
        assert_eq!(manager.language(), "ja");
        assert!(manager.supports("en"));
        assert!(manager.supports("ja"));
        assert!(!manager.supports("fr"));
    }

    #[test]
    fn test_unsupported_language_falls_back() {
        let manager = LocalizationManager::new("fr").unwrap();
        assert_eq!(manager.language(), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_missing_key() {
        let manager = LocalizationManager::new("en").unwrap();
        assert_eq!(manager.get_message("no-such-key", None), "Missing translation: no-such-key");
    }

    #[test]
    fn test_arguments_are_not_isolated() {
        let manager = LocalizationManager::new("en").unwrap();
        let message =
            manager.get_message_with_args("import-error-duplicate", &[("name", "Negroni")]);
        assert!(message.contains("Negroni"));
        assert!(!message.contains('\u{2068}'));
    }
}

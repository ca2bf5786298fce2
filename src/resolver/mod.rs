//! Resolution of a page's per-language provider table to a single link.
//!
//! The site's markup drifts, so every step has a fallback: the language table
//! comes from the first of several markup patterns that matches, an unknown
//! language is replaced by the first one the page offers, and a missing
//! provider entry falls back to any element mentioning the provider by name.

mod language;

pub use language::{LanguageMap, RawLanguageTable, extract_language_map, extract_raw_table};

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, warn};

use crate::error::ResolveError;

static PROVIDER_TEXT_CANDIDATES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a, div, li").expect("valid candidate selector"));

static LANGUAGE_ITEMS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li[data-lang-key]").expect("valid language item selector"));

static PROVIDER_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h4").expect("valid heading selector"));

fn link_of<'a>(element: &ElementRef<'a>) -> Option<&'a str> {
    ["data-link-target", "href"]
        .iter()
        .filter_map(|name| element.value().attr(name))
        .find(|value| !value.is_empty())
}

/// Link of the first `a`, `div` or `li` whose own text mentions the provider
fn find_by_provider_text(document: &Html, provider: &str) -> Option<String> {
    let needle = provider.to_lowercase();
    document
        .select(&PROVIDER_TEXT_CANDIDATES)
        .filter(|element| {
            let own_text: String = element
                .children()
                .filter_map(|child| child.value().as_text().map(|t| t.to_string()))
                .collect();
            own_text.to_lowercase().contains(&needle)
        })
        .find_map(|element| link_of(&element).map(str::to_string))
}

/// Link of the `<li data-lang-key=key>` whose `<h4>` names the provider
fn find_in_language_list(document: &Html, lang_key: &str, provider: &str) -> Option<String> {
    document
        .select(&LANGUAGE_ITEMS)
        .filter(|item| item.value().attr("data-lang-key") == Some(lang_key))
        .find(|item| {
            item.select(&PROVIDER_HEADING).next().is_some_and(|h4| {
                h4.text()
                    .collect::<String>()
                    .trim()
                    .eq_ignore_ascii_case(provider)
            })
        })
        .and_then(|item| item.value().attr("data-link-target").map(str::to_string))
}

/// Resolve the link for a `(language, provider)` pair on an episode page
pub fn resolve_provider_link(
    html: &str,
    language: &str,
    provider: &str,
) -> Result<String, ResolveError> {
    let document = Html::parse_document(html);
    let languages = extract_language_map(&document);

    if languages.is_empty() {
        if let Some(href) = find_by_provider_text(&document, provider) {
            warn!(provider, "No language mapping found, using first available provider link");
            return Ok(href);
        }
        error!(language, "No language mapping or provider links found");
        return Err(ResolveError::LanguageUnavailable {
            language: language.to_string(),
        });
    }

    debug!(language, available = ?languages.labels(), "Resolving language key");

    let lang_key = match languages.get(language) {
        Some(key) => key,
        None => {
            let (first_label, first_key) =
                languages
                    .first()
                    .ok_or_else(|| ResolveError::LanguageUnavailable {
                        language: language.to_string(),
                    })?;
            warn!(
                language,
                available = ?languages.labels(),
                substitute = first_label,
                "Language not found, using first available language"
            );
            first_key
        }
    };

    if let Some(href) = find_in_language_list(&document, lang_key, provider) {
        return Ok(href);
    }

    if let Some(href) = find_by_provider_text(&document, provider) {
        warn!(provider, "Using alternative provider link");
        return Ok(href);
    }

    error!(language, provider, "No matching download found");
    Err(ResolveError::ProviderUnavailable {
        language: language.to_string(),
        provider: provider.to_string(),
    })
}

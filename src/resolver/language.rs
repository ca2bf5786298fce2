use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Labels recognized when the page carries no language markup at all
const DEFAULT_LANGUAGES: [(&str, &str); 4] = [
    ("Deutsch", "german"),
    ("Ger-Sub", "german-sub"),
    ("English", "english"),
    ("Eng-Sub", "english-sub"),
];

/// Raw `label -> key` pairs as scraped; a label may be a comma-joined list
pub type RawLanguageTable = Vec<(String, String)>;

/// Unambiguous mapping from language label to the page's internal language key
///
/// Entries keep the order in which their keys first appeared on the page, so
/// [`LanguageMap::first`] is the page's first language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageMap {
    entries: Vec<(String, String)>,
}

impl LanguageMap {
    /// Build a map from a raw table.
    ///
    /// Comma-joined labels are split and trimmed. Labels listed for the same key
    /// are merged. A label claimed by two different keys is dropped.
    pub fn normalize(raw: &[(String, String)]) -> Self {
        let mut by_key: Vec<(String, Vec<String>)> = Vec::new();
        for (labels, key) in raw {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            let index = match by_key.iter().position(|(k, _)| k == key) {
                Some(index) => index,
                None => {
                    by_key.push((key.to_string(), Vec::new()));
                    by_key.len() - 1
                }
            };
            let slot = &mut by_key[index].1;
            for label in labels.split(',').map(str::trim).filter(|l| !l.is_empty()) {
                if !slot.iter().any(|existing| existing == label) {
                    slot.push(label.to_string());
                }
            }
        }

        let mut entries: Vec<(String, String)> = Vec::new();
        let mut ambiguous: Vec<String> = Vec::new();
        for (key, labels) in by_key {
            for label in labels {
                if ambiguous.contains(&label) {
                    continue;
                }
                if let Some(index) = entries.iter().position(|(l, _)| *l == label) {
                    entries.remove(index);
                    ambiguous.push(label);
                    continue;
                }
                entries.push((label, key.clone()));
            }
        }

        Self { entries }
    }

    /// Key for a language label (exact match)
    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, key)| key.as_str())
    }

    /// First available `(label, key)` pair
    pub fn first(&self) -> Option<(&str, &str)> {
        self.entries
            .first()
            .map(|(label, key)| (label.as_str(), key.as_str()))
    }

    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|(label, _)| label.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The map as a raw table again, one label per row
    pub fn to_raw(&self) -> RawLanguageTable {
        self.entries.clone()
    }
}

static SWITCHER_IMAGES: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("div.changeLanguageBox img").expect("valid switcher selector")
});

static LANGUAGE_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.language-link, a.lang-select, button.language-button, button.lang-btn")
        .expect("valid language link selector")
});

fn first_attr<'a>(element: &ElementRef<'a>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| element.value().attr(name))
        .find(|value| !value.trim().is_empty())
}

/// Language switcher block: `<div class="changeLanguageBox"><img alt title data-lang-key>`
fn from_switcher_block(document: &Html) -> RawLanguageTable {
    document
        .select(&SWITCHER_IMAGES)
        .filter_map(|img| {
            let key = img.value().attr("data-lang-key")?.trim();
            if key.is_empty() {
                return None;
            }
            let alt = img.value().attr("alt").unwrap_or("");
            let title = img.value().attr("title").unwrap_or("");
            Some((format!("{},{}", alt, title), key.to_string()))
        })
        .collect()
}

/// Generic language links and buttons keyed by data attributes or id
fn from_language_links(document: &Html) -> RawLanguageTable {
    document
        .select(&LANGUAGE_LINKS)
        .filter_map(|element| {
            let label = element.text().collect::<String>().trim().to_string();
            let key = first_attr(&element, &["data-lang", "data-language", "id"])?;
            (!label.is_empty()).then(|| (label, key.trim().to_string()))
        })
        .collect()
}

/// Static defaults, kept only when their label or key shows up in the page text
fn from_page_text(document: &Html) -> RawLanguageTable {
    let content = document.root_element().text().collect::<String>().to_lowercase();
    DEFAULT_LANGUAGES
        .iter()
        .filter(|(label, key)| content.contains(&label.to_lowercase()) || content.contains(key))
        .map(|(label, key)| (label.to_string(), key.to_string()))
        .collect()
}

/// Scrape the raw table from the first markup pattern that yields entries
pub fn extract_raw_table(document: &Html) -> RawLanguageTable {
    let table = from_switcher_block(document);
    if !table.is_empty() {
        return table;
    }

    let table = from_language_links(document);
    if !table.is_empty() {
        return table;
    }

    from_page_text(document)
}

/// Scrape and normalize the language map of a page
pub fn extract_language_map(document: &Html) -> LanguageMap {
    let map = LanguageMap::normalize(&extract_raw_table(document));
    debug!(languages = ?map.labels(), "Restructured language mapping");
    map
}

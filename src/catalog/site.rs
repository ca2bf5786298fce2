// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use super::cache::{extract_cache_url, script_redirect};
use super::{Catalog, RedirectLink};
use crate::config::Provider;
use crate::error::CatalogError;
use crate::http::HttpClient;
use crate::resolver::resolve_provider_link;

/// Catalog backed by the live site, scraping just enough markup to drive a run
#[derive(Clone)]
pub struct SiteCatalog<C> {
    client: C,
    site_url: String,
}

impl<C: HttpClient> SiteCatalog<C> {
    pub fn new(client: C, site_url: impl Into<String>) -> Self {
        Self {
            client,
            site_url: site_url.into(),
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<String, CatalogError> {
        let bytes = self
            .client
            .get_bytes(url)
            .await
            .map_err(|e| CatalogError::FetchFailed {
                url: url.to_string(),
                source: e,
            })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Highest number captured by `pattern` in any link on the page
fn max_link_number(page: &str, pattern: &str) -> u32 {
    let Ok(regex) = Regex::new(pattern) else {
        return 0;
    };
    regex
        .captures_iter(page)
        .filter_map(|c| c.get(1)?.as_str().parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

static START_DATE: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"span[itemprop="startDate"]"#).expect("valid start date selector")
});

fn parse_year(page: &str) -> Option<String> {
    let document = Html::parse_document(page);
    let text = document
        .select(&START_DATE)
        .next()?
        .text()
        .collect::<String>();
    let year = text.trim();
    (!year.is_empty()).then(|| year.to_string())
}

#[async_trait]
impl<C: HttpClient> Catalog for SiteCatalog<C> {
    async fn season_count(&self, show_url: &str) -> Result<u32, CatalogError> {
        let page = self.fetch_page(show_url).await?;
        Ok(max_link_number(&page, r"/staffel-(\d+)"))
    }

    async fn movie_count(&self, show_url: &str) -> Result<u32, CatalogError> {
        let movies_url = format!("{}filme", show_url);
        match self.fetch_page(&movies_url).await {
            Ok(page) => Ok(max_link_number(&page, r"/filme/film-(\d+)")),
            Err(e) => {
                debug!(url = %movies_url, error = %e, "No movie listing available");
                Ok(0)
            }
        }
    }

    async fn episode_count(&self, show_url: &str, season: u32) -> Result<u32, CatalogError> {
        let page = self
            .fetch_page(&format!("{}staffel-{}", show_url, season))
            .await?;
        Ok(max_link_number(
            &page,
            &format!(r"/staffel-{}/episode-(\d+)", season),
        ))
    }

    async fn year(&self, show_url: &str) -> Result<String, CatalogError> {
        let page = self.fetch_page(show_url).await?;
        Ok(parse_year(&page).unwrap_or_else(|| "unknown".to_string()))
    }

    async fn redirect_link(
        &self,
        page_url: &str,
        language: &str,
        provider: Provider,
    ) -> Result<RedirectLink, CatalogError> {
        let page = self.fetch_page(page_url).await?;
        let href = resolve_provider_link(&page, language, provider.name())?;

        let base = Url::parse(&self.site_url).map_err(|e| CatalogError::InvalidUrl {
            url: self.site_url.clone(),
            source: e,
        })?;
        let url = base.join(&href).map_err(|e| CatalogError::InvalidUrl {
            url: href.clone(),
            source: e,
        })?;

        Ok(RedirectLink {
            url: url.to_string(),
            provider,
        })
    }

    async fn find_cache_url(&self, redirect: &RedirectLink) -> Option<String> {
        let page = match self.fetch_page(&redirect.url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(provider = %redirect.provider, error = %e, "Failed to load embed page");
                return None;
            }
        };

        if let Some(url) = extract_cache_url(redirect.provider, &page) {
            return Some(url);
        }

        let target = script_redirect(&page)?;
        debug!(provider = %redirect.provider, target = %target, "Following script redirect");
        let page = self.fetch_page(&target).await.ok()?;
        extract_cache_url(redirect.provider, &page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpResponse;
    use bytes::Bytes;
    use std::collections::HashMap;

    #[derive(Clone, Default)]
    struct PageClient {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl HttpClient for PageClient {
        async fn head(&self, _url: &str) -> Result<u16, reqwest::Error> {
            Ok(200)
        }

        async fn get_bytes(&self, url: &str) -> Result<Bytes, reqwest::Error> {
            Ok(Bytes::from(self.pages.get(url).cloned().unwrap_or_default()))
        }

        async fn get_stream(&self, _url: &str) -> Result<HttpResponse, reqwest::Error> {
            unreachable!("catalog never streams")
        }
    }

    const SHOW: &str = "https://aniworld.to/anime/stream/demo/";

    fn catalog(pages: &[(&str, &str)]) -> SiteCatalog<PageClient> {
        let pages = pages
            .iter()
            .map(|(url, body)| (url.to_string(), body.to_string()))
            .collect();
        SiteCatalog::new(PageClient { pages }, "https://aniworld.to")
    }

    #[tokio::test]
    async fn counts_seasons_and_episodes_from_links() {
        let catalog = catalog(&[
            (
                SHOW,
                r#"<a href="/anime/stream/demo/staffel-1">1</a><a href="/anime/stream/demo/staffel-3">3</a>
                   <span itemprop="startDate"><a>2019</a></span>"#,
            ),
            (
                "https://aniworld.to/anime/stream/demo/staffel-2",
                r#"<a href="/anime/stream/demo/staffel-2/episode-1"></a><a href="/anime/stream/demo/staffel-2/episode-12"></a>"#,
            ),
        ]);

        assert_eq!(catalog.season_count(SHOW).await.unwrap(), 3);
        assert_eq!(catalog.episode_count(SHOW, 2).await.unwrap(), 12);
        assert_eq!(catalog.year(SHOW).await.unwrap(), "2019");
        assert_eq!(catalog.movie_count(SHOW).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn redirect_link_is_joined_with_site() {
        let episode = "https://aniworld.to/anime/stream/demo/staffel-1/episode-1";
        let catalog = catalog(&[(
            episode,
            r#"<div class="changeLanguageBox"><img alt="Deutsch" title="German" data-lang-key="german"></div>
               <li data-lang-key="german" data-link-target="/redirect/42"><h4>VOE</h4></li>"#,
        )]);

        let link = catalog
            .redirect_link(episode, "Deutsch", Provider::Voe)
            .await
            .unwrap();

        assert_eq!(link.url, "https://aniworld.to/redirect/42");
        assert_eq!(link.provider, Provider::Voe);
    }

    #[tokio::test]
    async fn redirect_link_surfaces_language_error() {
        let episode = "https://aniworld.to/anime/stream/demo/staffel-1/episode-2";
        let catalog = catalog(&[(episode, "<p>removed</p>")]);

        let err = catalog
            .redirect_link(episode, "Deutsch", Provider::Voe)
            .await
            .unwrap_err();

        assert!(matches!(err, CatalogError::Resolve(_)));
    }

    #[tokio::test]
    async fn cache_url_follows_script_redirect() {
        let catalog = catalog(&[
            (
                "https://aniworld.to/redirect/42",
                "<script>window.location.href = 'https://voe.example/e/1';</script>",
            ),
            ("https://voe.example/e/1", "{'hls': 'https://cdn.example/a.m3u8'}"),
        ]);
        let redirect = RedirectLink {
            url: "https://aniworld.to/redirect/42".to_string(),
            provider: Provider::Voe,
        };

        assert_eq!(
            catalog.find_cache_url(&redirect).await.as_deref(),
            Some("https://cdn.example/a.m3u8")
        );
    }
}

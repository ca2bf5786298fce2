//! Catalog collaborators: show metadata and per-episode link lookup.

mod cache;
mod site;

pub use cache::extract_cache_url;
pub use site::SiteCatalog;

use async_trait::async_trait;

use crate::config::Provider;
use crate::error::CatalogError;

/// Provider embed link resolved from an episode page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectLink {
    pub url: String,
    pub provider: Provider,
}

/// Source of show structure and download links
///
/// Everything the scheduler needs to know about the remote site goes through
/// this trait, so runs can be driven against canned data in tests.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Number of seasons of the show
    async fn season_count(&self, show_url: &str) -> Result<u32, CatalogError>;

    /// Number of movies/specials of the show
    async fn movie_count(&self, show_url: &str) -> Result<u32, CatalogError>;

    /// Number of episodes in a season
    async fn episode_count(&self, show_url: &str, season: u32) -> Result<u32, CatalogError>;

    /// Release year, only used to name the output directory
    async fn year(&self, show_url: &str) -> Result<String, CatalogError>;

    /// Resolve an episode or movie page to the provider's embed link.
    ///
    /// Fails with [`CatalogError::Resolve`] when the page offers no usable
    /// language or provider entry.
    async fn redirect_link(
        &self,
        page_url: &str,
        language: &str,
        provider: Provider,
    ) -> Result<RedirectLink, CatalogError>;

    /// Final media URL behind an embed link, if one can be located
    async fn find_cache_url(&self, redirect: &RedirectLink) -> Option<String>;
}

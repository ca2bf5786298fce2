// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::transport::RetryPolicy;

/// Placeholder show name; a run refuses to start while it is still set
pub const DEFAULT_NAME: &str = "Name-Goes-Here";

/// Which catalog site a show lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Anime,
    Serie,
}

impl MediaType {
    /// Base URL of the catalog site
    pub fn site_url(&self) -> &'static str {
        match self {
            MediaType::Anime => "https://aniworld.to",
            MediaType::Serie => "https://s.to",
        }
    }

    /// Path segment used in show URLs and in the output layout
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Anime => "anime",
            MediaType::Serie => "serie",
        }
    }
}

impl FromStr for MediaType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anime" => Ok(MediaType::Anime),
            "serie" | "series" => Ok(MediaType::Serie),
            _ => Err(ConfigError::InvalidValue {
                field: "media type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a provider's cache URL has to be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Plain file, streamed over HTTP
    Direct,
    /// HLS playlist, remuxed into a container by the external media tool
    Hls,
}

/// Third-party video host embedding the actual stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Voe,
    Streamtape,
    Vidoza,
}

impl Provider {
    /// Name as it appears in the site's markup
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Voe => "VOE",
            Provider::Streamtape => "Streamtape",
            Provider::Vidoza => "Vidoza",
        }
    }

    pub fn transport(&self) -> TransportKind {
        match self {
            Provider::Voe => TransportKind::Hls,
            Provider::Streamtape | Provider::Vidoza => TransportKind::Direct,
        }
    }
}

impl FromStr for Provider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "voe" => Ok(Provider::Voe),
            "streamtape" => Ok(Provider::Streamtape),
            "vidoza" => Ok(Provider::Vidoza),
            _ => Err(ConfigError::InvalidValue {
                field: "provider",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which groups of a show a run downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadMode {
    Series,
    Movies,
    All,
}

impl DownloadMode {
    pub fn includes_series(&self) -> bool {
        matches!(self, DownloadMode::Series | DownloadMode::All)
    }

    pub fn includes_movies(&self) -> bool {
        matches!(self, DownloadMode::Movies | DownloadMode::All)
    }
}

impl FromStr for DownloadMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "series" => Ok(DownloadMode::Series),
            "movies" => Ok(DownloadMode::Movies),
            "all" => Ok(DownloadMode::All),
            _ => Err(ConfigError::InvalidValue {
                field: "download mode",
                value: s.to_string(),
            }),
        }
    }
}

/// Restricts which seasons are visited
///
/// Parsed from `N` (only season N), `N+` (season N and every later one) or `0` (all seasons).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeasonOverride {
    #[default]
    None,
    Only(u32),
    From(u32),
}

impl SeasonOverride {
    /// Seasons to visit given the show's season count
    pub fn seasons(&self, season_count: u32) -> Vec<u32> {
        match *self {
            SeasonOverride::None => (1..=season_count).collect(),
            SeasonOverride::Only(season) => vec![season],
            SeasonOverride::From(first) => (first.max(1)..=season_count).collect(),
        }
    }
}

impl FromStr for SeasonOverride {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidValue {
            field: "season override",
            value: s.to_string(),
        };

        let trimmed = s.trim();
        if let Some(start) = trimmed.strip_suffix('+') {
            let season: u32 = start.parse().map_err(|_| invalid())?;
            return Ok(if season <= 1 {
                SeasonOverride::None
            } else {
                SeasonOverride::From(season)
            });
        }

        match trimmed.parse::<u32>().map_err(|_| invalid())? {
            0 => Ok(SeasonOverride::None),
            season => Ok(SeasonOverride::Only(season)),
        }
    }
}

/// Admission control settings for the scheduler
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Dispatches allowed before a cooldown
    pub burst_limit: usize,
    /// Sleep after a full burst
    pub cooldown: Duration,
    /// Ceiling for concurrently running download tasks
    pub max_live_tasks: usize,
    /// Poll interval while waiting for live tasks to drain
    pub poll_interval: Duration,
    /// Enables the live-task ceiling after each cooldown
    pub secondary_cap: bool,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            burst_limit: 5,
            cooldown: Duration::from_secs(60),
            max_live_tasks: 5,
            poll_interval: Duration::from_secs(30),
            secondary_cap: true,
        }
    }
}

/// Immutable settings for one run, built once at startup
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub media_type: MediaType,
    /// Show slug as used in the site URL
    pub name: String,
    /// Preferred language label, e.g. "Deutsch"
    pub language: String,
    pub provider: Provider,
    pub mode: DownloadMode,
    pub season_override: SeasonOverride,
    /// Download only this episode (series only)
    pub episode_override: Option<u32>,
    pub output_root: PathBuf,
    /// File whose read/write access stands in for output directory permissions
    pub guard_file: PathBuf,
    /// Where the run ledger is persisted
    pub ledger_dir: PathBuf,
    pub throttle: ThrottleConfig,
    pub retry: RetryPolicy,
    /// Explicit media tool path; discovered automatically when unset
    pub remux_tool: Option<PathBuf>,
}

impl RunConfig {
    /// Create a configuration with default settings for a show
    pub fn new(media_type: MediaType, name: impl Into<String>) -> Self {
        let output_root = PathBuf::from("output");
        Self {
            media_type,
            name: name.into(),
            language: "Deutsch".to_string(),
            provider: Provider::Voe,
            mode: DownloadMode::Series,
            season_override: SeasonOverride::None,
            episode_override: None,
            ledger_dir: output_root.clone(),
            output_root,
            guard_file: PathBuf::from("DO_NOT_DELETE.txt"),
            throttle: ThrottleConfig::default(),
            retry: RetryPolicy::default(),
            remux_tool: None,
        }
    }

    pub fn site_url(&self) -> &'static str {
        self.media_type.site_url()
    }

    /// `{site}/{media_type}/stream/{name}/`
    pub fn show_url(&self) -> String {
        format!(
            "{}/{}/stream/{}/",
            self.site_url(),
            self.media_type.as_str(),
            self.name
        )
    }

    pub fn episode_url(&self, season: u32, episode: u32) -> String {
        format!("{}staffel-{}/episode-{}", self.show_url(), season, episode)
    }

    pub fn movie_url(&self, index: u32) -> String {
        format!("{}filme/film-{}", self.show_url(), index)
    }

    /// `{output_root}/{media_type}/{name}_({year})`
    pub fn show_dir(&self, year: &str) -> PathBuf {
        self.output_root
            .join(self.media_type.as_str())
            .join(format!("{}_({})", sanitize_filename::sanitize(&self.name), year))
    }

    pub fn has_default_name(&self) -> bool {
        self.name.trim().is_empty() || self.name == DEFAULT_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_override_parses_all_forms() {
        assert_eq!("0".parse::<SeasonOverride>().unwrap(), SeasonOverride::None);
        assert_eq!("3".parse::<SeasonOverride>().unwrap(), SeasonOverride::Only(3));
        assert_eq!("2+".parse::<SeasonOverride>().unwrap(), SeasonOverride::From(2));
        assert_eq!("1+".parse::<SeasonOverride>().unwrap(), SeasonOverride::None);
        assert!("x".parse::<SeasonOverride>().is_err());
    }

    #[test]
    fn season_override_selects_seasons() {
        assert_eq!(SeasonOverride::None.seasons(3), vec![1, 2, 3]);
        assert_eq!(SeasonOverride::Only(2).seasons(3), vec![2]);
        assert_eq!(SeasonOverride::From(2).seasons(4), vec![2, 3, 4]);
        assert!(SeasonOverride::From(5).seasons(4).is_empty());
    }

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!("voe".parse::<Provider>().unwrap(), Provider::Voe);
        assert_eq!("STREAMTAPE".parse::<Provider>().unwrap(), Provider::Streamtape);
        assert_eq!("Vidoza".parse::<Provider>().unwrap(), Provider::Vidoza);
        assert!("doodstream".parse::<Provider>().is_err());
    }

    #[test]
    fn only_voe_uses_hls() {
        assert_eq!(Provider::Voe.transport(), TransportKind::Hls);
        assert_eq!(Provider::Streamtape.transport(), TransportKind::Direct);
        assert_eq!(Provider::Vidoza.transport(), TransportKind::Direct);
    }

    #[test]
    fn urls_follow_site_layout() {
        let config = RunConfig::new(MediaType::Anime, "one-piece");
        assert_eq!(config.show_url(), "https://aniworld.to/anime/stream/one-piece/");
        assert_eq!(
            config.episode_url(2, 5),
            "https://aniworld.to/anime/stream/one-piece/staffel-2/episode-5"
        );
        assert_eq!(
            config.movie_url(1),
            "https://aniworld.to/anime/stream/one-piece/filme/film-1"
        );
    }

    #[test]
    fn show_dir_includes_year() {
        let mut config = RunConfig::new(MediaType::Serie, "dark");
        config.output_root = PathBuf::from("out");
        assert_eq!(config.show_dir("2017"), PathBuf::from("out/serie/dark_(2017)"));
    }

    #[test]
    fn default_name_is_detected() {
        assert!(RunConfig::new(MediaType::Anime, DEFAULT_NAME).has_default_name());
        assert!(!RunConfig::new(MediaType::Anime, "naruto").has_default_name());
    }
}

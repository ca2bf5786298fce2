use std::path::{Path, PathBuf};

use crate::config::{Provider, RunConfig};

/// Whether an item is a regular episode or a movie/special
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Series,
    Movie,
}

/// An enumerated episode or movie, before its download link is known
#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub kind: MediaKind,
    pub season: u32,
    pub index: u32,
    /// Episode or movie page on the catalog site
    pub page_url: String,
    /// Identity of the item; used for the already-downloaded check
    pub destination: PathBuf,
    /// Short label for logs and progress output
    pub title: String,
}

/// A resolved item, handed to exactly one transport
#[derive(Debug, Clone)]
pub struct DownloadTarget {
    pub source_url: String,
    pub destination: PathBuf,
    pub provider: Provider,
    pub media_kind: MediaKind,
}

/// Items that are dispatched together and joined before the next group starts
#[derive(Debug, Clone)]
pub struct Group {
    pub label: String,
    pub dir: PathBuf,
    pub items: Vec<PlannedItem>,
}

fn file_part(value: &str) -> String {
    sanitize_filename::sanitize(value)
}

pub fn season_dir(show_dir: &Path, season: u32) -> PathBuf {
    show_dir.join(format!("Season {:02}", season))
}

pub fn movies_dir(show_dir: &Path) -> PathBuf {
    show_dir.join("Movies")
}

/// `Season {NN}/{name} - s{SS}e{EE} - {language}.mp4`
pub fn episode_path(show_dir: &Path, name: &str, season: u32, episode: u32, language: &str) -> PathBuf {
    season_dir(show_dir, season).join(format!(
        "{} - s{:02}e{:02} - {}.mp4",
        file_part(name),
        season,
        episode,
        file_part(language)
    ))
}

/// `Movies/{name}-{index}.mp4`
pub fn movie_path(show_dir: &Path, name: &str, index: u32) -> PathBuf {
    movies_dir(show_dir).join(format!("{}-{}.mp4", file_part(name), index))
}

fn episode_item(config: &RunConfig, show_dir: &Path, season: u32, episode: u32) -> PlannedItem {
    PlannedItem {
        kind: MediaKind::Series,
        season,
        index: episode,
        page_url: config.episode_url(season, episode),
        destination: episode_path(show_dir, &config.name, season, episode, &config.language),
        title: format!("{} - s{:02}e{:02}", config.name, season, episode),
    }
}

/// All episodes of one season, in episode order
pub fn season_group(config: &RunConfig, show_dir: &Path, season: u32, episode_count: u32) -> Group {
    Group {
        label: format!("Season {:02}", season),
        dir: season_dir(show_dir, season),
        items: (1..=episode_count)
            .map(|episode| episode_item(config, show_dir, season, episode))
            .collect(),
    }
}

/// A single episode, for ad-hoc requests
pub fn single_episode_group(config: &RunConfig, show_dir: &Path, season: u32, episode: u32) -> Group {
    Group {
        label: format!("Season {:02} Episode {:02}", season, episode),
        dir: season_dir(show_dir, season),
        items: vec![episode_item(config, show_dir, season, episode)],
    }
}

/// All movies/specials, in index order
pub fn movie_group(config: &RunConfig, show_dir: &Path, movie_count: u32) -> Group {
    Group {
        label: "Movies".to_string(),
        dir: movies_dir(show_dir),
        items: (1..=movie_count)
            .map(|index| PlannedItem {
                kind: MediaKind::Movie,
                season: 0,
                index,
                page_url: config.movie_url(index),
                destination: movie_path(show_dir, &config.name, index),
                title: format!("{}-{}", config.name, index),
            })
            .collect(),
    }
}

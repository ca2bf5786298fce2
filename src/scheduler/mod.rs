// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod plan;
mod throttle;

pub use plan::{
    DownloadTarget, Group, MediaKind, PlannedItem, episode_path, movie_group, movie_path,
    season_group, single_episode_group,
};
pub use throttle::{LiveTaskGuard, LiveTasks, Throttle};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::config::{DownloadMode, RunConfig, SeasonOverride, TransportKind};
use crate::error::{CatalogError, PreconditionError, ResolveError, RunError};
use crate::ledger::RunLedger;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::state::{already_downloaded, check_guard_file, ensure_dir};
use crate::transport::{DownloadContext, Transports, check_remux_tool, fetch, locate_remux_tool};

/// What a `LanguageUnavailable` resolution means for the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguagePolicy {
    /// Skip the item, keep going with the rest of the group
    SkipItem,
    /// The language was explicitly requested; stop the run
    AbortRun,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Items downloaded successfully in this run
    pub downloaded: usize,
    /// Items already present on disk
    pub already_present: usize,
    /// Items skipped because no link or cache URL could be resolved
    pub unresolved: usize,
    /// Items whose download failed for good
    pub failed: usize,
    /// Destinations that failed in this run
    pub failed_paths: Vec<PathBuf>,
}

/// Check everything that must hold before a single download starts.
///
/// Returns the media tool to use for HLS downloads.
pub async fn preflight(config: &RunConfig) -> Result<PathBuf, PreconditionError> {
    check_guard_file(&config.guard_file)?;

    if !config.output_root.exists() {
        info!(path = %config.output_root.display(), "Output folder does not exist, creating it");
    }
    ensure_dir(&config.output_root)?;

    if config.has_default_name() {
        return Err(PreconditionError::DefaultName);
    }

    let tool = match &config.remux_tool {
        Some(tool) => tool.clone(),
        None => locate_remux_tool(Path::new(".")),
    };
    if config.provider.transport() == TransportKind::Hls {
        check_remux_tool(&tool).await?;
    }

    Ok(tool)
}

/// Download every group of the configured show.
///
/// Groups run strictly one after another; within a group, downloads run
/// concurrently under the throttle. The ledger is flushed after each group.
pub async fn run_show(
    config: &RunConfig,
    catalog: &dyn Catalog,
    transports: Transports,
    ledger: Arc<RunLedger>,
    reporter: SharedProgressReporter,
) -> Result<RunSummary, RunError> {
    Scheduler::new(config, catalog, transports, ledger, reporter)
        .run()
        .await
}

/// Drives one run across all groups of a show
pub struct Scheduler<'a> {
    config: &'a RunConfig,
    catalog: &'a dyn Catalog,
    transports: Transports,
    ledger: Arc<RunLedger>,
    reporter: SharedProgressReporter,
    throttle: Throttle,
    live: LiveTasks,
    next_download_id: usize,
    summary: RunSummary,
}

impl<'a> Scheduler<'a> {
    pub fn new(
        config: &'a RunConfig,
        catalog: &'a dyn Catalog,
        transports: Transports,
        ledger: Arc<RunLedger>,
        reporter: SharedProgressReporter,
    ) -> Self {
        Self {
            config,
            catalog,
            transports,
            ledger,
            reporter,
            throttle: Throttle::new(config.throttle.clone()),
            live: LiveTasks::new(),
            next_download_id: 0,
            summary: RunSummary::default(),
        }
    }

    /// Enumerate the show's groups and download them one after another
    pub async fn run(mut self) -> Result<RunSummary, RunError> {
        let config = self.config;
        let show_url = config.show_url();
        info!(show = %config.name, url = %show_url, mode = ?config.mode, "Run started");

        let year = self.catalog.year(&show_url).await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not read release year");
            "unknown".to_string()
        });
        let show_dir = config.show_dir(&year);
        ensure_dir(&show_dir)?;

        let single_episode = match config.episode_override {
            Some(episode) if config.mode == DownloadMode::Series => Some(episode),
            Some(episode) => {
                warn!(
                    episode,
                    mode = ?config.mode,
                    "Episode override only applies to series mode, ignoring it"
                );
                None
            }
            None => None,
        };

        let season_count = match config.season_override {
            _ if !config.mode.includes_series() => 0,
            SeasonOverride::Only(_) => 0,
            _ => self.catalog.season_count(&show_url).await.unwrap_or_else(|e| {
                warn!(error = %e, "Could not count seasons");
                0
            }),
        };
        self.reporter.report(ProgressEvent::ShowResolved {
            name: config.name.clone(),
            year: year.clone(),
            season_count,
        });

        if config.mode.includes_movies() {
            match self.catalog.movie_count(&show_url).await {
                Ok(movie_count) => {
                    info!(movie_count, "Show has movies/specials");
                    let group = movie_group(config, &show_dir, movie_count);
                    self.run_group(group, LanguagePolicy::SkipItem).await?;
                }
                Err(e) => warn!(error = %e, "Could not count movies, skipping them"),
            }
        }

        if config.mode.includes_series() {
            if config.season_override == SeasonOverride::None {
                info!(season_count, "No season override detected");
            } else {
                info!(season_override = ?config.season_override, "Season override detected");
            }

            for season in config.season_override.seasons(season_count) {
                let (group, policy) = match single_episode {
                    Some(episode) => {
                        info!(season, episode, "Single episode requested");
                        (
                            single_episode_group(config, &show_dir, season, episode),
                            LanguagePolicy::AbortRun,
                        )
                    }
                    None => match self.catalog.episode_count(&show_url, season).await {
                        Ok(episode_count) => {
                            info!(season, episode_count, "Season episodes");
                            (
                                season_group(config, &show_dir, season, episode_count),
                                LanguagePolicy::SkipItem,
                            )
                        }
                        Err(e) => {
                            warn!(season, error = %e, "Could not count episodes, skipping season");
                            continue;
                        }
                    },
                };
                self.run_group(group, policy).await?;
            }
        }

        self.finish()
    }

    fn finish(self) -> Result<RunSummary, RunError> {
        self.ledger.flush()?;
        self.reporter.report(ProgressEvent::RunCompleted {
            downloaded_count: self.summary.downloaded,
            skipped_count: self.summary.already_present + self.summary.unresolved,
            failed_count: self.summary.failed,
        });
        info!(
            downloaded = self.summary.downloaded,
            already_present = self.summary.already_present,
            unresolved = self.summary.unresolved,
            failed = self.summary.failed,
            "Run finished"
        );
        Ok(self.summary)
    }

    fn skip(&mut self, item: &PlannedItem, reason: String) {
        self.summary.unresolved += 1;
        self.reporter.report(ProgressEvent::ItemSkipped {
            title: item.title.clone(),
            reason,
        });
    }

    /// Resolve and dispatch every item of a group, then join all its tasks
    async fn run_group(&mut self, group: Group, policy: LanguagePolicy) -> Result<(), RunError> {
        ensure_dir(&group.dir)?;
        self.reporter.report(ProgressEvent::GroupStarted {
            label: group.label.clone(),
            item_count: group.items.len() as u32,
        });

        let mut tasks: JoinSet<(PathBuf, bool)> = JoinSet::new();
        let mut aborted = None;

        for item in &group.items {
            debug!(path = %item.destination.display(), "File name will be");

            if already_downloaded(&item.destination) {
                self.summary.already_present += 1;
                self.reporter.report(ProgressEvent::ItemSkipped {
                    title: item.title.clone(),
                    reason: "already downloaded".to_string(),
                });
                continue;
            }

            let redirect = match self
                .catalog
                .redirect_link(&item.page_url, &self.config.language, self.config.provider)
                .await
            {
                Ok(redirect) => redirect,
                Err(CatalogError::Resolve(e @ ResolveError::LanguageUnavailable { .. }))
                    if policy == LanguagePolicy::AbortRun =>
                {
                    error!(title = %item.title, error = %e, "Requested language unavailable");
                    aborted = Some((item.season, item.index, e));
                    break;
                }
                Err(e) => {
                    warn!(title = %item.title, error = %e, "Skipping item");
                    self.skip(item, e.to_string());
                    continue;
                }
            };

            self.throttle.admit(&self.live, &self.reporter).await;

            let Some(source_url) = self.catalog.find_cache_url(&redirect).await else {
                error!(
                    provider = %redirect.provider,
                    season = item.season,
                    index = item.index,
                    "Could not find cache url"
                );
                self.skip(item, format!("no cache url on {}", redirect.provider));
                continue;
            };
            debug!(provider = %redirect.provider, url = %source_url, "Cache URL found");

            let target = DownloadTarget {
                source_url,
                destination: item.destination.clone(),
                provider: redirect.provider,
                media_kind: item.kind,
            };
            self.dispatch(&mut tasks, target, item.title.clone());
        }

        let (succeeded, failed) = self.join_group(&mut tasks).await;
        self.ledger.flush()?;
        self.reporter.report(ProgressEvent::GroupFinished {
            label: group.label.clone(),
            succeeded,
            failed,
        });

        match aborted {
            Some((season, episode, source)) => Err(RunError::EpisodeAborted {
                season,
                episode,
                source,
            }),
            None => Ok(()),
        }
    }

    fn dispatch(&mut self, tasks: &mut JoinSet<(PathBuf, bool)>, target: DownloadTarget, title: String) {
        let transport = self.transports.for_kind(target.provider.transport());
        let context = DownloadContext {
            download_id: self.next_download_id,
            title,
            reporter: self.reporter.clone(),
            ledger: self.ledger.clone(),
            retry: self.config.retry.clone(),
        };
        self.next_download_id += 1;

        info!(
            provider = %target.provider,
            kind = ?target.media_kind,
            path = %target.destination.display(),
            "Added to download queue"
        );

        let live = self.live.enter();
        tasks.spawn(async move {
            let _live = live;
            let ok = fetch(
                transport.as_ref(),
                &target.source_url,
                &target.destination,
                &context,
            )
            .await;
            (target.destination, ok)
        });
    }

    /// Wait for every task of the group; returns (succeeded, failed)
    async fn join_group(&mut self, tasks: &mut JoinSet<(PathBuf, bool)>) -> (usize, usize) {
        let mut succeeded = 0;
        let mut failed = 0;

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, true)) => succeeded += 1,
                Ok((destination, false)) => {
                    failed += 1;
                    self.summary.failed_paths.push(destination);
                }
                Err(e) => {
                    error!(error = %e, "Download task panicked");
                    failed += 1;
                }
            }
        }

        self.summary.downloaded += succeeded;
        self.summary.failed += failed;
        (succeeded, failed)
    }
}

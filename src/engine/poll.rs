//! Passes over all repositories and the polling loop

use super::{EngineSettings, PassSummary, RepoSummary, handle_pull_request};
use crate::error::Result;
use crate::platform::PlatformService;
use crate::rebase::Rebaser;
use crate::tracking::RecencyCache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Drives passes over every configured repository
pub struct Engine {
    settings: EngineSettings,
    cache: RecencyCache,
    rebaser: Arc<dyn Rebaser>,
    repositories: Vec<Box<dyn PlatformService>>,
}

impl Engine {
    /// Create an engine over repositories in configuration order
    pub fn new(
        settings: EngineSettings,
        rebaser: Arc<dyn Rebaser>,
        repositories: Vec<Box<dyn PlatformService>>,
    ) -> Self {
        Self {
            settings,
            cache: RecencyCache::new(),
            rebaser,
            repositories,
        }
    }

    /// Markers remembered from earlier passes
    pub const fn cache(&self) -> &RecencyCache {
        &self.cache
    }

    /// Number of repositories polled per pass
    pub fn repository_count(&self) -> usize {
        self.repositories.len()
    }

    /// One pass: every repository, every open pull request, in order
    ///
    /// Failures are logged and counted; they never stop the pass.
    pub async fn poll_once(&mut self) -> PassSummary {
        let mut summary = PassSummary::default();

        for platform in &self.repositories {
            let key = platform.config().key();
            let mut tally = RepoSummary::default();

            match platform.list_open_pull_requests().await {
                Ok(prs) => {
                    for pr in &prs {
                        match handle_pull_request(
                            platform.as_ref(),
                            self.rebaser.as_ref(),
                            &mut self.cache,
                            &self.settings,
                            pr,
                        )
                        .await
                        {
                            Ok(action) => {
                                debug!(repo = %key, pr_number = pr.number, action = %action, "evaluated");
                                tally.record(action);
                            }
                            Err(e) => {
                                error!(repo = %key, pr_number = pr.number, error = %e, "failed to handle {pr}");
                                tally.failures += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(repo = %key, error = %e, "failed to list pull requests");
                    tally.listing_failed = true;
                }
            }

            summary.repositories.push((key, tally));
        }

        for (key, tally) in &summary.repositories {
            let actions: Vec<String> = tally
                .actions
                .iter()
                .map(|(action, n)| format!("{action}={n}"))
                .collect();
            info!(
                repo = %key,
                actions = %actions.join(" "),
                failures = tally.failures,
                listing_failed = tally.listing_failed,
                "pass finished"
            );
        }
        summary
    }

    /// Run passes until Ctrl-C, waiting `interval` after each one finishes
    pub async fn run(&mut self, interval: Duration) -> Result<()> {
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            self.poll_once().await;

            tokio::select! {
                () = tokio::time::sleep(interval) => {}
                result = &mut shutdown => {
                    result?;
                    info!("shutdown requested, stopping");
                    return Ok(());
                }
            }
        }
    }
}

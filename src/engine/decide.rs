//! The per-pull-request decision sequence

use super::{Action, EngineSettings};
use crate::error::{Error, Result};
use crate::platform::{CONFLICT_COMMENT, PlatformService};
use crate::rebase::{RebaseOutcome, Rebaser};
use crate::tracking::RecencyCache;
use crate::types::PullRequest;
use tracing::{debug, info};

/// Evaluate one pull request and take at most one action
///
/// Checks run in a fixed order and stop at the first that decides:
///
/// 1. blacklisted source branch: ignored, nothing recorded
/// 2. marker unchanged since last pass (with change detection): skipped
/// 3. no green build: recorded as seen
/// 4. diverged from destination: rebased; a conflict gets one comment
/// 5. not approved: recorded as seen
/// 6. otherwise merged, and the repository's cache is cleared
pub async fn handle_pull_request(
    platform: &dyn PlatformService,
    rebaser: &dyn Rebaser,
    cache: &mut RecencyCache,
    settings: &EngineSettings,
    pr: &PullRequest,
) -> Result<Action> {
    let repo = platform.config();
    let key = repo.key();
    debug!(repo = %key, pr_number = pr.number, "processing {pr}");

    if settings.branch_blacklist.is_match(&pr.source) {
        debug!(repo = %key, pr_number = pr.number, branch = %pr.source, "branch is blacklisted");
        return Ok(Action::Ignored);
    }

    if settings.change_detection && cache.is_unchanged(&key, pr) {
        info!(
            repo = %key,
            pr_number = pr.number,
            "{pr} is unchanged since last run (last change: {})",
            pr.updated
        );
        return Ok(Action::Unchanged);
    }

    if !platform.has_green_build(pr).await? {
        info!(repo = %key, pr_number = pr.number, "waiting for green build of {pr}");
        cache.mark_seen(&key, pr);
        return Ok(Action::WaitingForBuild);
    }

    if platform.has_diverged_from_destination(pr).await? {
        if cache.is_known_conflict(&key, pr) {
            info!(repo = %key, pr_number = pr.number, "{pr} still needs a manual conflict fix");
            return Ok(Action::AwaitingManualFix);
        }

        return match rebaser.rebase(repo, pr).await? {
            RebaseOutcome::Succeeded { pushed } => {
                // The push changed the marker; store the new one
                let refreshed = platform.refresh_pull_request(pr).await?;
                cache.mark_seen(&key, &refreshed);
                info!(repo = %key, pr_number = pr.number, pushed, "rebased {pr}");
                Ok(Action::Rebased)
            }
            RebaseOutcome::Conflict => {
                platform.comment(pr, CONFLICT_COMMENT).await?;
                let refreshed = platform.refresh_pull_request(pr).await?;
                cache.mark_conflicted(&key, &refreshed);
                info!(repo = %key, pr_number = pr.number, "{pr} needs a manual conflict fix");
                Ok(Action::RebaseConflict)
            }
            RebaseOutcome::Escalated { reason } => Err(Error::Git {
                command: format!("git rebase origin/{}", pr.destination),
                stderr: reason,
            }),
        };
    }

    if !platform.is_approved(pr).await? {
        info!(repo = %key, pr_number = pr.number, "waiting for approval of {pr}");
        cache.mark_seen(&key, pr);
        return Ok(Action::WaitingForApproval);
    }

    info!(repo = %key, pr_number = pr.number, "merging {pr}");
    platform.merge(pr).await?;
    cache.clear_repository(&key);
    Ok(Action::Merged)
}
